//! Cooperative single-threaded JVM thread scheduler and stack-frame execution core.
//!
//! This crate implements the three subsystems described by the collaborator traits in
//! [`jvmcore_types`]: the stack frame execution model ([`StackFrame`]), the per-thread state
//! machine and runtime glue ([`ThreadState`]), and the pool scheduler ([`ThreadPool`]).
//! Bytecode semantics, class loading, monitors, and the native-method registry are external
//! collaborators - see `jvmcore_test_util` for test-double implementations of each.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::unwrap_in_result)]

mod error;
mod event_loop;
mod frame;
mod sanity;
mod thread;
mod thread_pool;

pub use error::{Error, Result};
pub use event_loop::EventLoop;
pub use frame::{BytecodeFrame, InternalFrame, NativeFrame, StackFrame};
pub use sanity::{check_return_value, host_fault};
pub use thread::{ResumeCallback, ThreadHandle, ThreadState};
pub use thread_pool::ThreadPool;
