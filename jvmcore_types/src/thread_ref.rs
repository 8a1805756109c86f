//! The abstract view of a [`Thread`] that collaborators are allowed to see.
//!
//! Collaborator traits (`Monitor`, `ClassLoader`, `Opcode`, `Method`) live in this crate and are
//! implemented against concrete frame/thread types that live in `jvmcore`. To avoid a circular
//! crate dependency, they depend on this trait rather than on `jvmcore::Thread` directly -
//! `jvmcore::ThreadHandle` implements it.

use std::fmt;
use std::rc::Rc;

use crate::collaborators::{Method, Monitor};
use crate::status::ThreadStatus;
use crate::value::{ReturnSlot, Value};

/// Invoked once when a `runMethod` continuation completes: `(exception, value)`, exactly one of
/// which is `Some`.
pub type ResumeCallback = Box<dyn FnOnce(Option<Value>, Option<Value>)>;

/// The thread-facing operations that collaborators (monitors, class loaders, opcodes, native
/// functions) are allowed to invoke.
pub trait ThreadRef: fmt::Debug {
    /// The thread's stable identity, used as the key for monitor ownership and park counts.
    fn ref_id(&self) -> u64;

    fn status(&self) -> ThreadStatus;

    /// Transition to `status`, applying the state machine's legality rules and post-transition
    /// side effects. `monitor` is required when `status.requires_monitor()`.
    fn set_status(&self, status: ThreadStatus, monitor: Option<Rc<dyn Monitor>>);

    fn is_interrupted(&self) -> bool;
    fn set_interrupted(&self, interrupted: bool);

    /// Push a frame for `method` (bytecode or native, by `method.is_native()`), optionally
    /// preceded by an internal continuation frame wrapping `callback`, then transition to
    /// `RUNNABLE`.
    fn run_method(&self, method: Rc<dyn Method>, args: Vec<Value>, callback: Option<ResumeCallback>);

    /// Pop the top frame, run the return-value sanity check on non-internal frames, resume the
    /// new top frame with `(rv1, rv2)`, and transition to `RUNNABLE`.
    fn async_return(&self, rv1: Option<Value>, rv2: ReturnSlot);

    /// Unwind the stack looking for a handler, invoking uncaught-exception dispatch if none is
    /// found.
    fn throw_exception(&self, exception: Value);
}
