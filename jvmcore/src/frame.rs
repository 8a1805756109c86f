//! The stack frame execution model: §4.1-4.3.
//!
//! `StackFrame` is a thin, cheaply-cloned tagged enum over three `Rc<RefCell<_>>` variants. Each
//! variant owns its own mutable state so the dispatch loop can hold a short-lived clone of "the
//! top frame" without holding a borrow of the thread's frame stack while calling into it - the
//! double-mutable-borrow `&mut Thread` / `&mut Frame` pairing would otherwise force on us.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use jvmcore_types::{
    BytecodeFrameOps, CatchType, ExceptionHandler, Method, Opcode, ReturnArity, ReturnSlot,
    StackTraceEntry, ThreadRef, ThreadStatus, Value, return_arity,
};

use crate::error::Error;
use crate::sanity::host_fault;
use crate::thread::{ResumeCallback, ThreadHandle};

/// One activation record on a thread's call stack.
#[derive(Debug, Clone)]
pub enum StackFrame {
    Bytecode(Rc<RefCell<BytecodeFrame>>),
    Native(Rc<RefCell<NativeFrame>>),
    Internal(Rc<RefCell<InternalFrame>>),
}

impl StackFrame {
    #[must_use]
    pub fn bytecode(method: Rc<dyn Method>, args: Vec<Value>) -> Self {
        let max_locals = method.max_locals();
        let code = method.code();
        let mut locals = args;
        locals.resize(max_locals, Value::Reference(None));
        StackFrame::Bytecode(Rc::new(RefCell::new(BytecodeFrame {
            method,
            code,
            pc: 0,
            locals,
            operand_stack: Vec::new(),
            return_to_thread_loop: false,
            locked_method_lock: false,
        })))
    }

    #[must_use]
    pub fn native(method: Rc<dyn Method>, args: Vec<Value>) -> Self {
        StackFrame::Native(Rc::new(RefCell::new(NativeFrame {
            method,
            args,
            used: false,
        })))
    }

    #[must_use]
    pub fn internal(callback: ResumeCallback) -> Self {
        StackFrame::Internal(Rc::new(RefCell::new(InternalFrame {
            callback: Some(callback),
            outcome: None,
        })))
    }

    pub fn run(&self, thread: &ThreadHandle) {
        match self {
            StackFrame::Bytecode(frame) => BytecodeFrame::run(frame, thread),
            StackFrame::Native(frame) => NativeFrame::run(frame, thread),
            StackFrame::Internal(frame) => InternalFrame::run(frame, thread),
        }
    }

    pub fn schedule_resume(&self, thread: &ThreadHandle, rv1: Option<Value>, rv2: ReturnSlot) {
        match self {
            StackFrame::Bytecode(frame) => BytecodeFrame::schedule_resume(frame, rv1, rv2),
            StackFrame::Native(_) => {}
            StackFrame::Internal(frame) => InternalFrame::schedule_resume(frame, rv1),
        }
        let _ = thread;
    }

    pub fn schedule_exception(&self, thread: &ThreadHandle, exception: Value) -> crate::error::Result<bool> {
        match self {
            StackFrame::Bytecode(frame) => BytecodeFrame::schedule_exception(frame, thread, exception),
            StackFrame::Native(_) => Ok(false),
            StackFrame::Internal(frame) => Ok(InternalFrame::schedule_exception(frame, exception)),
        }
    }

    #[must_use]
    pub fn stack_trace_frame(&self) -> Option<StackTraceEntry> {
        match self {
            StackFrame::Bytecode(frame) => Some(frame.borrow().stack_trace_frame()),
            StackFrame::Native(frame) => Some(frame.borrow().stack_trace_frame()),
            StackFrame::Internal(_) => None,
        }
    }

    #[must_use]
    pub fn method(&self) -> Option<Rc<dyn Method>> {
        match self {
            StackFrame::Bytecode(frame) => Some(frame.borrow().method.clone()),
            StackFrame::Native(frame) => Some(frame.borrow().method.clone()),
            StackFrame::Internal(_) => None,
        }
    }

    /// Release this frame's synchronized-method lock if it is still held. Called once a frame
    /// is popped by a normal return - the no-handler branch of `schedule_exception` releases the
    /// lock itself, for the unwinding-past-this-frame case.
    pub(crate) fn release_monitor_if_held(&self, thread: &ThreadHandle) {
        if let StackFrame::Bytecode(frame) = self {
            BytecodeFrame::release_monitor(frame, thread);
        }
    }
}

/// A bytecode interpreter activation.
#[derive(Debug)]
pub struct BytecodeFrame {
    method: Rc<dyn Method>,
    code: Vec<Rc<dyn Opcode>>,
    pc: u32,
    locals: Vec<Value>,
    operand_stack: Vec<Value>,
    return_to_thread_loop: bool,
    locked_method_lock: bool,
}

impl BytecodeFrameOps for BytecodeFrame {
    fn method(&self) -> Rc<dyn Method> {
        self.method.clone()
    }

    fn pc(&self) -> u32 {
        self.pc
    }

    fn set_pc(&mut self, pc: u32) {
        self.pc = pc;
    }

    fn local(&self, index: usize) -> Value {
        self.locals[index].clone()
    }

    fn set_local(&mut self, index: usize, value: Value) {
        self.locals[index] = value;
    }

    fn push_operand(&mut self, value: Value) {
        self.operand_stack.push(value);
    }

    fn pop_operand(&mut self) -> Option<Value> {
        self.operand_stack.pop()
    }

    fn clear_operands(&mut self) {
        self.operand_stack.clear();
    }

    fn operand_stack(&self) -> &[Value] {
        &self.operand_stack
    }

    fn set_return_to_thread_loop(&mut self, value: bool) {
        self.return_to_thread_loop = value;
    }
}

impl BytecodeFrame {
    fn stack_trace_frame(&self) -> StackTraceEntry {
        StackTraceEntry {
            method: self.method.clone(),
            pc: self.pc,
            stack_snapshot: self.operand_stack.clone(),
            locals_snapshot: self.locals.clone(),
        }
    }

    fn run(frame_rc: &Rc<RefCell<BytecodeFrame>>, thread: &ThreadHandle) {
        let method = frame_rc.borrow().method.clone();
        if method.is_synchronized() && !frame_rc.borrow().locked_method_lock {
            let thread_dyn: Rc<dyn ThreadRef> = thread.clone();
            if !method.monitor().enter(&thread_dyn) {
                return;
            }
            frame_rc.borrow_mut().locked_method_lock = true;
        }

        frame_rc.borrow_mut().return_to_thread_loop = false;
        loop {
            let pc = frame_rc.borrow().pc as usize;
            let op = frame_rc.borrow().code.get(pc).cloned().unwrap_or_else(|| {
                host_fault(&format!(
                    "pc {pc} out of range for method {}",
                    method.full_signature()
                ))
            });
            let thread_dyn: Rc<dyn ThreadRef> = thread.clone();
            let frame_dyn: Rc<RefCell<dyn BytecodeFrameOps>> = frame_rc.clone();
            op.execute(&thread_dyn, &frame_dyn);
            if frame_rc.borrow().return_to_thread_loop {
                break;
            }
        }
    }

    fn schedule_resume(frame_rc: &Rc<RefCell<BytecodeFrame>>, rv1: Option<Value>, rv2: ReturnSlot) {
        let (method, pc) = {
            let frame = frame_rc.borrow();
            (frame.method.clone(), frame.pc)
        };
        let op = frame_rc.borrow().code.get(pc as usize).cloned().unwrap_or_else(|| {
            host_fault(&format!(
                "pc {pc} out of range resuming method {}",
                method.full_signature()
            ))
        });
        let frame_dyn: Rc<RefCell<dyn BytecodeFrameOps>> = frame_rc.clone();
        op.inc_pc(&frame_dyn);

        let mut frame = frame_rc.borrow_mut();
        if let Some(value) = rv1 {
            frame.operand_stack.push(value);
        }
        match rv2 {
            ReturnSlot::Absent => {}
            ReturnSlot::Null => frame.operand_stack.push(Value::Reference(None)),
            ReturnSlot::Value(value) => frame.operand_stack.push(value),
        }
    }

    fn schedule_exception(
        frame_rc: &Rc<RefCell<BytecodeFrame>>,
        thread: &ThreadHandle,
        exception: Value,
    ) -> crate::error::Result<bool> {
        let (method, pc) = {
            let frame = frame_rc.borrow();
            (frame.method.clone(), frame.pc)
        };
        let loader = method.class().loader();
        let covering: Vec<ExceptionHandler> = method
            .exception_handlers()
            .into_iter()
            .filter(|handler| handler.covers(pc))
            .collect();

        for (index, handler) in covering.iter().enumerate() {
            match &handler.catch_type {
                CatchType::Any => {
                    Self::select_handler(frame_rc, handler, exception)?;
                    return Ok(true);
                }
                CatchType::Class(name) => {
                    if let Some(catch_class) = loader.resolved_class(name) {
                        let matches = exception
                            .object_class()
                            .is_some_and(|exception_class| exception_class.is_castable(catch_class.as_ref()));
                        if matches {
                            Self::select_handler(frame_rc, handler, exception)?;
                            return Ok(true);
                        }
                        continue;
                    }

                    let unresolved: Vec<String> = covering[index..]
                        .iter()
                        .filter_map(|remaining| match &remaining.catch_type {
                            CatchType::Class(remaining_name) if loader.resolved_class(remaining_name).is_none() => {
                                Some(remaining_name.clone())
                            }
                            _ => None,
                        })
                        .collect();

                    thread.set_status(ThreadStatus::AsyncWaiting, None);
                    let thread_for_retry = thread.clone();
                    loader.resolve_classes(
                        unresolved,
                        Box::new(move || thread_for_retry.throw_exception(exception)),
                    );
                    return Ok(true);
                }
            }
        }

        Self::release_monitor(frame_rc, thread);
        Ok(false)
    }

    /// Release this frame's monitor if its synchronized method is still holding it. A no-op for
    /// non-synchronized methods and for frames that never acquired the lock (blocked on entry).
    fn release_monitor(frame_rc: &Rc<RefCell<BytecodeFrame>>, thread: &ThreadHandle) {
        let (method, locked) = {
            let frame = frame_rc.borrow();
            (frame.method.clone(), frame.locked_method_lock)
        };
        if method.is_synchronized() && locked {
            let thread_dyn: Rc<dyn ThreadRef> = thread.clone();
            method.monitor().exit(&thread_dyn);
            frame_rc.borrow_mut().locked_method_lock = false;
        }
    }

    /// Move execution to `handler`'s target, rejecting a `handler_pc` outside the method's code -
    /// a malformed exception table, not a runtime condition a retry could fix.
    fn select_handler(
        frame_rc: &Rc<RefCell<BytecodeFrame>>,
        handler: &ExceptionHandler,
        exception: Value,
    ) -> crate::error::Result<()> {
        let mut frame = frame_rc.borrow_mut();
        if handler.handler_pc as usize >= frame.code.len() {
            return Err(Error::InvalidExceptionHandler(format!(
                "handler_pc {} out of range for method {} ({} instructions)",
                handler.handler_pc,
                frame.method.full_signature(),
                frame.code.len()
            )));
        }
        frame.operand_stack.clear();
        frame.operand_stack.push(exception);
        frame.pc = handler.handler_pc;
        Ok(())
    }
}

/// A native method activation. Single-use: `run` must execute the native function exactly once.
#[derive(Debug)]
pub struct NativeFrame {
    method: Rc<dyn Method>,
    args: Vec<Value>,
    used: bool,
}

impl NativeFrame {
    fn stack_trace_frame(&self) -> StackTraceEntry {
        StackTraceEntry {
            method: self.method.clone(),
            pc: 0,
            stack_snapshot: Vec::new(),
            locals_snapshot: self.args.clone(),
        }
    }

    fn run(frame_rc: &Rc<RefCell<NativeFrame>>, thread: &ThreadHandle) {
        let (method, args) = {
            let mut frame = frame_rc.borrow_mut();
            if frame.used {
                host_fault(&format!(
                    "native frame for {} run more than once",
                    frame.method.full_signature()
                ));
            }
            frame.used = true;
            (frame.method.clone(), frame.args.clone())
        };

        let native_fn = method
            .native_function()
            .unwrap_or_else(|| host_fault(&format!("method {} has no native function", method.full_signature())));
        let thread_dyn: Rc<dyn ThreadRef> = thread.clone();
        let converted_args = method.convert_args(&thread_dyn, args);
        let raw = native_fn.call(&thread_dyn, converted_args);

        if thread.status() != ThreadStatus::Running {
            return;
        }
        match thread.top_frame() {
            Some(StackFrame::Native(top)) if Rc::ptr_eq(&top, frame_rc) => {}
            _ => return,
        }

        let (rv1, rv2) = adapt_native_return(method.return_descriptor(), raw);
        thread.async_return(rv1, rv2);
    }
}

fn adapt_native_return(descriptor: &str, raw: Option<Value>) -> (Option<Value>, ReturnSlot) {
    match return_arity(descriptor) {
        ReturnArity::Void => (None, ReturnSlot::Absent),
        ReturnArity::Wide => (raw, ReturnSlot::Null),
        ReturnArity::Boolean => {
            let coerced = raw.map(|value| match value {
                Value::Int(n) => Value::Int(i32::from(n != 0)),
                other => other,
            });
            (coerced, ReturnSlot::Absent)
        }
        ReturnArity::Single => (raw, ReturnSlot::Absent),
    }
}

/// A continuation boundary letting host code call a JVM method and be notified on completion.
pub struct InternalFrame {
    callback: Option<ResumeCallback>,
    outcome: Option<(bool, Option<Value>)>,
}

impl fmt::Debug for InternalFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InternalFrame")
            .field("has_callback", &self.callback.is_some())
            .field("outcome", &self.outcome)
            .finish()
    }
}

impl InternalFrame {
    fn schedule_resume(frame_rc: &Rc<RefCell<InternalFrame>>, value: Option<Value>) {
        frame_rc.borrow_mut().outcome = Some((false, value));
    }

    fn schedule_exception(frame_rc: &Rc<RefCell<InternalFrame>>, exception: Value) -> bool {
        frame_rc.borrow_mut().outcome = Some((true, Some(exception)));
        true
    }

    fn run(frame_rc: &Rc<RefCell<InternalFrame>>, thread: &ThreadHandle) {
        thread.pop_frame();
        thread.set_status(ThreadStatus::AsyncWaiting, None);

        let (callback, outcome) = {
            let mut frame = frame_rc.borrow_mut();
            (frame.callback.take(), frame.outcome.take())
        };
        let callback = callback.unwrap_or_else(|| host_fault("internal frame run without a callback"));
        let (is_exception, value) = outcome.unwrap_or_else(|| host_fault("internal frame run without a stashed outcome"));
        if is_exception {
            callback(value, None);
        } else {
            callback(None, value);
        }
    }
}
