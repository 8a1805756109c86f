//! External collaborator interfaces.
//!
//! Bytecode semantics, class loading and resolution, monitor/lock primitives, and the
//! native-method registry all live behind these traits rather than in the scheduler itself.
//! The scheduler core depends only on these traits; `jvmcore_test_util` provides the only
//! implementations this workspace ships, since a real class loader and bytecode verifier are
//! out of scope here.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::exception_handler::ExceptionHandler;
use crate::frame_ref::BytecodeFrameOps;
use crate::thread_ref::ThreadRef;
use crate::value::Value;

/// One bytecode instruction.
pub trait Opcode: fmt::Debug {
    /// A short mnemonic, used in diagnostics and stack traces.
    fn name(&self) -> &str;

    /// Execute this instruction against `frame`, owned by `thread`. Implementations are
    /// responsible for advancing the program counter (directly, or by delegating to
    /// [`Opcode::inc_pc`]), mutating the operand stack/locals, and calling
    /// `frame.set_return_to_thread_loop(true)` whenever the instruction performs an action that
    /// must yield control back to the thread's dispatch loop.
    fn execute(&self, thread: &Rc<dyn ThreadRef>, frame: &Rc<RefCell<dyn BytecodeFrameOps>>);

    /// Advance the program counter past this instruction, without re-executing it. Used by
    /// `StackFrame::scheduleResume` after a nested call returns.
    fn inc_pc(&self, frame: &Rc<RefCell<dyn BytecodeFrameOps>>);
}

/// A native (non-bytecode) function implementation, as returned by
/// [`Method::native_function`].
pub trait NativeFunction: fmt::Debug {
    /// Invoke the native function synchronously, returning its raw result (`None` for `void`).
    /// The descriptor-driven return-type adaptation described in §4.2 happens in
    /// `NativeFrame::run`, not here.
    fn call(&self, thread: &Rc<dyn ThreadRef>, args: Vec<Value>) -> Option<Value>;
}

/// A resolved JVM method.
pub trait Method: fmt::Debug {
    fn is_native(&self) -> bool;
    fn is_synchronized(&self) -> bool;
    fn is_abstract(&self) -> bool;

    fn max_locals(&self) -> usize;
    fn code(&self) -> Vec<Rc<dyn Opcode>>;
    fn exception_handlers(&self) -> Vec<ExceptionHandler>;

    /// This method's name-and-descriptor, e.g. `"run()V"` - the key `Class::method_lookup`
    /// searches by. Distinct from [`Method::full_signature`], which is qualified by class name
    /// for diagnostics.
    fn signature(&self) -> &str;

    /// The monitor that a synchronized invocation of this method must hold: the class's monitor
    /// for a `static synchronized` method, the receiver's for an instance method. Lock-object
    /// selection is the collaborator's responsibility; the scheduler just calls this once per
    /// frame.
    fn monitor(&self) -> Rc<dyn Monitor>;

    fn native_function(&self) -> Option<Rc<dyn NativeFunction>>;
    fn convert_args(&self, thread: &Rc<dyn ThreadRef>, args: Vec<Value>) -> Vec<Value>;

    /// The JVM return descriptor, e.g. `"V"`, `"I"`, `"Ljava/lang/String;"`.
    fn return_descriptor(&self) -> &str;
    fn full_signature(&self) -> String;

    fn class(&self) -> Rc<dyn Class>;
}

/// A loaded JVM class.
pub trait Class: fmt::Debug {
    fn name(&self) -> &str;
    fn loader(&self) -> Rc<dyn ClassLoader>;

    /// Whether an instance of `self` can be assigned to a variable of type `other` (i.e. `self`
    /// is `other` or a subtype of it).
    fn is_castable(&self, other: &dyn Class) -> bool;

    fn method_lookup(&self, thread: &Rc<dyn ThreadRef>, signature: &str) -> Option<Rc<dyn Method>>;

    /// Allocate a fresh, zeroed instance of this class. Object-model construction detail, left to
    /// the collaborator - used only by `throw_new_exception`.
    fn allocate(&self) -> Value;
}

/// A class loader: resolves class names to [`Class`] handles, synchronously when already
/// resolved/initialized, or asynchronously via a one-shot callback otherwise.
pub trait ClassLoader: fmt::Debug {
    /// A class that has been resolved (linked) but not necessarily initialized, if any.
    fn resolved_class(&self, name: &str) -> Option<Rc<dyn Class>>;

    /// A class that has completed initialization, if any.
    fn initialized_class(&self, name: &str) -> Option<Rc<dyn Class>>;

    /// Resolve every class in `names`, then invoke `on_complete`. The callback must always
    /// eventually fire (see Open Question §11); it is never invoked synchronously from
    /// within this call.
    fn resolve_classes(&self, names: Vec<String>, on_complete: Box<dyn FnOnce()>);

    /// Initialize the named class (running its `<clinit>`, if not already run), then invoke
    /// `on_complete`. `bootstrap` indicates the request originated from the bootstrap loader
    /// (relevant to the collaborator's own resolution order, not to the scheduler).
    fn initialize_class(&self, name: &str, bootstrap: bool, on_complete: Box<dyn FnOnce()>);
}

/// A JVM monitor (intrinsic lock), as entered by `monitorenter`/synchronized methods and waited
/// on by `Object.wait`/`notify`.
pub trait Monitor: fmt::Debug {
    /// Attempt to acquire the monitor for `thread`. Returns `true` if acquired (synchronously,
    /// including reentrant acquisition by the current holder); returns `false` if the thread was
    /// blocked (the monitor is responsible for calling
    /// `thread.set_status(Blocked, Some(self))` itself before returning `false`, and for
    /// transitioning the thread back to `Runnable` once the lock becomes available).
    fn enter(&self, thread: &Rc<dyn ThreadRef>) -> bool;

    /// Release one level of this thread's hold on the monitor.
    fn exit(&self, thread: &Rc<dyn ThreadRef>);

    fn is_waiting(&self, thread_ref: u64) -> bool;
    fn is_timed_waiting(&self, thread_ref: u64) -> bool;
    fn is_blocked(&self, thread_ref: u64) -> bool;
}

/// A captured frame of a thread's call stack, taken at `Thread::stack_trace` time.
///
/// `stack_snapshot`/`locals_snapshot` are independent copies: later mutation of the live frame
/// does not affect a previously captured entry.
#[derive(Debug, Clone)]
pub struct StackTraceEntry {
    pub method: Rc<dyn Method>,
    pub pc: u32,
    pub stack_snapshot: Vec<Value>,
    pub locals_snapshot: Vec<Value>,
}
