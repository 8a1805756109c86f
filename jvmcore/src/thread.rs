//! The per-thread state machine and runtime glue: §4.4.
//!
//! `ThreadState` implements [`jvmcore_types::ThreadRef`] directly, so an `Rc<ThreadState>`
//! coerces to `Rc<dyn ThreadRef>` wherever a collaborator needs the abstract view. `ThreadHandle`
//! is the concrete handle the rest of this crate passes around.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use jvmcore_types::{Class, ClassLoader, Method, Monitor, ReturnSlot, ThreadRef, ThreadStatus, Value, is_legal_transition};

use crate::frame::StackFrame;
use crate::sanity::{check_return_value, host_fault};
use crate::thread_pool::ThreadPoolState;

/// Invoked once when a `run_method` continuation completes.
pub type ResumeCallback = jvmcore_types::ResumeCallback;

/// The concrete handle to a scheduled JVM thread.
pub type ThreadHandle = Rc<ThreadState>;

/// A single JVM thread: a call stack, a status, and the state machine that governs it.
pub struct ThreadState {
    ref_id: u64,
    thread_object: Value,
    class_loader: Rc<dyn ClassLoader>,
    pool: Weak<RefCell<ThreadPoolState>>,
    self_ref: RefCell<Weak<ThreadState>>,
    status: Cell<ThreadStatus>,
    monitor: RefCell<Option<Rc<dyn Monitor>>>,
    stack: RefCell<Vec<StackFrame>>,
    interrupted: Cell<bool>,
}

impl fmt::Debug for ThreadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadState")
            .field("ref_id", &self.ref_id)
            .field("status", &self.status.get())
            .field("depth", &self.stack.borrow().len())
            .field("interrupted", &self.interrupted.get())
            .finish_non_exhaustive()
    }
}

impl ThreadState {
    pub(crate) fn new(
        ref_id: u64,
        thread_object: Value,
        class_loader: Rc<dyn ClassLoader>,
        pool: Weak<RefCell<ThreadPoolState>>,
    ) -> ThreadHandle {
        Rc::new_cyclic(|weak| ThreadState {
            ref_id,
            thread_object,
            class_loader,
            pool,
            self_ref: RefCell::new(weak.clone()),
            status: Cell::new(ThreadStatus::New),
            monitor: RefCell::new(None),
            stack: RefCell::new(Vec::new()),
            interrupted: Cell::new(false),
        })
    }

    fn self_handle(&self) -> ThreadHandle {
        self.self_ref
            .borrow()
            .upgrade()
            .unwrap_or_else(|| host_fault("thread has no surviving strong reference to itself"))
    }

    pub(crate) fn push_frame(&self, frame: StackFrame) {
        self.stack.borrow_mut().push(frame);
    }

    pub(crate) fn pop_frame(&self) -> Option<StackFrame> {
        self.stack.borrow_mut().pop()
    }

    pub(crate) fn top_frame(&self) -> Option<StackFrame> {
        self.stack.borrow().last().cloned()
    }

    /// The call stack, top frame last, as of now.
    #[must_use]
    pub fn stack_trace(&self) -> Vec<jvmcore_types::StackTraceEntry> {
        self.stack
            .borrow()
            .iter()
            .rev()
            .filter_map(StackFrame::stack_trace_frame)
            .collect()
    }

    /// The method owning the currently executing (topmost) frame, if any.
    #[must_use]
    pub fn current_method(&self) -> Option<Rc<dyn Method>> {
        self.stack.borrow().last().and_then(StackFrame::method)
    }

    /// The monitor this thread is currently recorded against, if its status requires one
    /// (`BLOCKED`, `WAITING`, `TIMED_WAITING`, `UNINTERRUPTABLY_BLOCKED`).
    #[must_use]
    pub fn monitor_block(&self) -> Option<Rc<dyn Monitor>> {
        self.monitor.borrow().clone()
    }

    /// Construct and throw a fresh exception of the named class, as `throwException` would once
    /// the instance exists. If the class is not yet initialized, defers via class initialization
    /// and retries once it completes.
    pub fn throw_new_exception(&self, class_name: &str, message: &str) {
        let loader = self.class_loader.clone();
        if let Some(class) = loader.initialized_class(class_name) {
            self.construct_and_throw(class, message);
            return;
        }

        self.set_status(ThreadStatus::AsyncWaiting, None);
        let thread = self.self_handle();
        let class_name = class_name.to_string();
        let message = message.to_string();
        loader.initialize_class(
            &class_name.clone(),
            true,
            Box::new(move || thread.throw_new_exception(&class_name, &message)),
        );
    }

    fn construct_and_throw(&self, class: Rc<dyn Class>, message: &str) {
        let instance = class.allocate();
        let lookup_thread: Rc<dyn ThreadRef> = self.self_handle();
        let Some(constructor) = class.method_lookup(&lookup_thread, "<init>(Ljava/lang/String;)V") else {
            host_fault(&format!("class {} has no <init>(Ljava/lang/String;)V", class.name()));
        };

        let thread = self.self_handle();
        let thrown_instance = instance.clone();
        self.run_method(
            constructor,
            vec![instance, Value::Str(Rc::from(message))],
            Some(Box::new(move |construction_error, _value| match construction_error {
                Some(error) => thread.throw_exception(error),
                None => thread.throw_exception(thrown_instance),
            })),
        );
    }

    fn handle_uncaught_exception(&self, exception: Value) {
        let loader = self.class_loader.clone();
        let Some(thread_class) = loader.initialized_class("java/lang/Thread") else {
            host_fault("java/lang/Thread is not initialized; cannot dispatch an uncaught exception");
        };
        let lookup_thread: Rc<dyn ThreadRef> = self.self_handle();
        let Some(dispatch) =
            thread_class.method_lookup(&lookup_thread, "dispatchUncaughtException(Ljava/lang/Throwable;)V")
        else {
            host_fault("java/lang/Thread has no dispatchUncaughtException(Ljava/lang/Throwable;)V");
        };
        self.run_method(dispatch, vec![self.thread_object.clone(), exception], None);
    }

    /// The dispatch loop: run the top frame while `RUNNING` and the stack is non-empty.
    /// Self-invoked as the post-transition side effect of becoming `RUNNING`.
    fn run(&self) {
        while self.status.get() == ThreadStatus::Running {
            let Some(top) = self.top_frame() else { break };
            top.run(&self.self_handle());
        }
        if self.stack.borrow().is_empty() {
            self.apply_transition(ThreadStatus::Terminated, None);
        }
    }

    fn apply_transition(&self, target: ThreadStatus, monitor: Option<Rc<dyn Monitor>>) {
        let current = self.status.get();

        if current == target {
            return;
        }
        if current == ThreadStatus::Running && target == ThreadStatus::Runnable {
            return;
        }
        if current == ThreadStatus::Terminated && target != ThreadStatus::New {
            self.apply_transition(ThreadStatus::New, None);
            self.apply_transition(target, monitor);
            return;
        }
        if !is_legal_transition(current, target) {
            host_fault(&format!("illegal thread status transition {current:?} -> {target:?}"));
        }

        if target.requires_monitor() {
            let monitor =
                monitor.unwrap_or_else(|| host_fault(&format!("transition to {target:?} requires a monitor")));
            *self.monitor.borrow_mut() = Some(monitor);
        } else {
            *self.monitor.borrow_mut() = None;
        }

        if tracing::event_enabled!(tracing::Level::DEBUG) {
            tracing::debug!(thread = self.ref_id, from = ?current, to = ?target, "thread status transition");
        }
        self.status.set(target);

        match target {
            ThreadStatus::Runnable => self.notify_pool_runnable(),
            ThreadStatus::Running => self.run(),
            ThreadStatus::Terminated => self.notify_pool_terminated(),
            ThreadStatus::Blocked
            | ThreadStatus::Waiting
            | ThreadStatus::TimedWaiting
            | ThreadStatus::Parked
            | ThreadStatus::AsyncWaiting
            | ThreadStatus::UninterruptablyBlocked => self.notify_pool_suspended(),
            ThreadStatus::New => {}
        }
    }

    fn notify_pool_runnable(&self) {
        if let Some(pool) = self.pool.upgrade() {
            crate::thread_pool::notify_runnable(&pool, &self.self_handle());
        }
    }

    fn notify_pool_suspended(&self) {
        if let Some(pool) = self.pool.upgrade() {
            crate::thread_pool::notify_suspended(&pool, &self.self_handle());
        }
    }

    fn notify_pool_terminated(&self) {
        if let Some(pool) = self.pool.upgrade() {
            crate::thread_pool::notify_terminated(&pool, &self.self_handle());
        }
    }
}

impl ThreadRef for ThreadState {
    fn ref_id(&self) -> u64 {
        self.ref_id
    }

    fn status(&self) -> ThreadStatus {
        self.status.get()
    }

    fn set_status(&self, status: ThreadStatus, monitor: Option<Rc<dyn Monitor>>) {
        self.apply_transition(status, monitor);
    }

    fn is_interrupted(&self) -> bool {
        self.interrupted.get()
    }

    fn set_interrupted(&self, interrupted: bool) {
        self.interrupted.set(interrupted);
    }

    fn run_method(&self, method: Rc<dyn Method>, args: Vec<Value>, callback: Option<ResumeCallback>) {
        let current = self.status.get();
        if !matches!(
            current,
            ThreadStatus::New | ThreadStatus::Running | ThreadStatus::Runnable | ThreadStatus::AsyncWaiting | ThreadStatus::Terminated
        ) {
            host_fault(&format!("run_method called while thread status is {current:?}"));
        }

        if let Some(callback) = callback {
            self.push_frame(StackFrame::internal(callback));
        }
        let frame = if method.is_native() {
            StackFrame::native(method, args)
        } else {
            StackFrame::bytecode(method, args)
        };
        self.push_frame(frame);
        self.set_status(ThreadStatus::Runnable, None);
    }

    fn async_return(&self, rv1: Option<Value>, rv2: ReturnSlot) {
        let current = self.status.get();
        if !matches!(current, ThreadStatus::Running | ThreadStatus::Runnable | ThreadStatus::AsyncWaiting) {
            host_fault(&format!("async_return called while thread status is {current:?}"));
        }

        let popped = self
            .pop_frame()
            .unwrap_or_else(|| host_fault("async_return called with an empty stack"));
        popped.release_monitor_if_held(&self.self_handle());
        if let Some(method) = popped.method() {
            check_return_value(&method, &rv1, &rv2, &self.class_loader);
        }

        if let Some(top) = self.top_frame() {
            top.schedule_resume(&self.self_handle(), rv1, rv2);
        }
        self.set_status(ThreadStatus::Runnable, None);
    }

    fn throw_exception(&self, exception: Value) {
        let current = self.status.get();
        if !matches!(current, ThreadStatus::Running | ThreadStatus::Runnable | ThreadStatus::AsyncWaiting) {
            host_fault(&format!("throw_exception called while thread status is {current:?}"));
        }
        if self.stack.borrow().is_empty() {
            host_fault("throw_exception called with an empty stack");
        }
        if matches!(self.top_frame(), Some(StackFrame::Internal(_))) {
            self.pop_frame();
        }
        self.set_status(ThreadStatus::Runnable, None);

        loop {
            let Some(top) = self.top_frame() else {
                self.handle_uncaught_exception(exception);
                return;
            };
            match top.schedule_exception(&self.self_handle(), exception.clone()) {
                Ok(true) => return,
                Ok(false) => self.pop_frame(),
                Err(error) => host_fault(&error.to_string()),
            };
        }
    }
}
