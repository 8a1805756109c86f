//! Shared data model and collaborator interfaces for the `jvmcore` thread scheduler.
//!
//! This crate holds the pieces that both the scheduler core (`jvmcore`) and its test doubles
//! (`jvmcore_test_util`) need to agree on: the value surrogate, the thread status state machine,
//! exception table entries, and the collaborator traits (`Method`, `Class`, `ClassLoader`,
//! `Opcode`, `Monitor`) that the core treats as external.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::unwrap_in_result)]

mod collaborators;
mod descriptor;
mod exception_handler;
mod frame_ref;
mod status;
mod thread_ref;
mod value;

pub use collaborators::{Class, ClassLoader, Method, Monitor, NativeFunction, Opcode, StackTraceEntry};
pub use descriptor::{reference_class_name, return_arity, ReturnArity};
pub use exception_handler::{CatchType, ExceptionHandler};
pub use frame_ref::BytecodeFrameOps;
pub use status::{is_legal_transition, ThreadStatus};
pub use thread_ref::{ResumeCallback, ThreadRef};
pub use value::{ObjectRef, ReturnSlot, Value};
