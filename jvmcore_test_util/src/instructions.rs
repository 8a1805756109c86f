//! A minimal fixed opcode set, sufficient to script realistic thread-scheduling scenarios:
//! `push_const`, `return_value` (and its void sibling), `invoke`, `athrow`, `goto`.

use std::cell::RefCell;
use std::rc::Rc;

use jvmcore_types::{BytecodeFrameOps, Method, Opcode, ReturnSlot, ThreadRef, Value};

fn advance(frame: &Rc<RefCell<dyn BytecodeFrameOps>>) {
    let pc = frame.borrow().pc();
    frame.borrow_mut().set_pc(pc + 1);
}

#[derive(Debug)]
struct PushConst(Value);

impl Opcode for PushConst {
    fn name(&self) -> &str {
        "push_const"
    }

    fn execute(&self, _thread: &Rc<dyn ThreadRef>, frame: &Rc<RefCell<dyn BytecodeFrameOps>>) {
        frame.borrow_mut().push_operand(self.0.clone());
        self.inc_pc(frame);
    }

    fn inc_pc(&self, frame: &Rc<RefCell<dyn BytecodeFrameOps>>) {
        advance(frame);
    }
}

/// Push a constant value onto the operand stack, then advance the program counter.
#[must_use]
pub fn push_const(value: Value) -> Rc<dyn Opcode> {
    Rc::new(PushConst(value))
}

#[derive(Debug)]
struct ReturnValue;

impl Opcode for ReturnValue {
    fn name(&self) -> &str {
        "return_value"
    }

    fn execute(&self, thread: &Rc<dyn ThreadRef>, frame: &Rc<RefCell<dyn BytecodeFrameOps>>) {
        let value = frame.borrow_mut().pop_operand();
        frame.borrow_mut().set_return_to_thread_loop(true);
        thread.async_return(value, ReturnSlot::Absent);
    }

    fn inc_pc(&self, frame: &Rc<RefCell<dyn BytecodeFrameOps>>) {
        advance(frame);
    }
}

/// Pop the operand stack and return the popped value to the caller.
#[must_use]
pub fn return_value() -> Rc<dyn Opcode> {
    Rc::new(ReturnValue)
}

#[derive(Debug)]
struct ReturnVoid;

impl Opcode for ReturnVoid {
    fn name(&self) -> &str {
        "return_void"
    }

    fn execute(&self, thread: &Rc<dyn ThreadRef>, frame: &Rc<RefCell<dyn BytecodeFrameOps>>) {
        frame.borrow_mut().set_return_to_thread_loop(true);
        thread.async_return(None, ReturnSlot::Absent);
    }

    fn inc_pc(&self, frame: &Rc<RefCell<dyn BytecodeFrameOps>>) {
        advance(frame);
    }
}

/// Return without a value.
#[must_use]
pub fn return_void() -> Rc<dyn Opcode> {
    Rc::new(ReturnVoid)
}

#[derive(Debug)]
struct Goto(u32);

impl Opcode for Goto {
    fn name(&self) -> &str {
        "goto"
    }

    fn execute(&self, _thread: &Rc<dyn ThreadRef>, frame: &Rc<RefCell<dyn BytecodeFrameOps>>) {
        frame.borrow_mut().set_pc(self.0);
    }

    fn inc_pc(&self, frame: &Rc<RefCell<dyn BytecodeFrameOps>>) {
        advance(frame);
    }
}

/// Unconditionally jump to `target`.
#[must_use]
pub fn goto(target: u32) -> Rc<dyn Opcode> {
    Rc::new(Goto(target))
}

#[derive(Debug)]
struct Athrow;

impl Opcode for Athrow {
    fn name(&self) -> &str {
        "athrow"
    }

    fn execute(&self, thread: &Rc<dyn ThreadRef>, frame: &Rc<RefCell<dyn BytecodeFrameOps>>) {
        let exception = frame
            .borrow_mut()
            .pop_operand()
            .expect("athrow executed with an empty operand stack");
        frame.borrow_mut().set_return_to_thread_loop(true);
        thread.throw_exception(exception);
    }

    fn inc_pc(&self, frame: &Rc<RefCell<dyn BytecodeFrameOps>>) {
        advance(frame);
    }
}

/// Pop the operand stack and throw the popped value as an exception.
#[must_use]
pub fn athrow() -> Rc<dyn Opcode> {
    Rc::new(Athrow)
}

#[derive(Debug)]
struct Invoke {
    method: Rc<dyn Method>,
    arg_count: usize,
}

impl Opcode for Invoke {
    fn name(&self) -> &str {
        "invoke"
    }

    fn execute(&self, thread: &Rc<dyn ThreadRef>, frame: &Rc<RefCell<dyn BytecodeFrameOps>>) {
        let mut args = Vec::with_capacity(self.arg_count);
        {
            let mut frame = frame.borrow_mut();
            for _ in 0..self.arg_count {
                if let Some(value) = frame.pop_operand() {
                    args.push(value);
                }
            }
        }
        args.reverse();
        frame.borrow_mut().set_return_to_thread_loop(true);
        thread.run_method(self.method.clone(), args, None);
    }

    fn inc_pc(&self, frame: &Rc<RefCell<dyn BytecodeFrameOps>>) {
        advance(frame);
    }
}

/// Pop `arg_count` operands (in declaration order) and invoke `method` with them.
#[must_use]
pub fn invoke(method: Rc<dyn Method>, arg_count: usize) -> Rc<dyn Opcode> {
    Rc::new(Invoke { method, arg_count })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell as StdRefCell;

    #[derive(Debug, Default)]
    struct RecordingFrame {
        pc: u32,
        operands: Vec<Value>,
    }

    impl BytecodeFrameOps for RecordingFrame {
        fn method(&self) -> Rc<dyn Method> {
            unimplemented!("not exercised by these opcode unit tests")
        }
        fn pc(&self) -> u32 {
            self.pc
        }
        fn set_pc(&mut self, pc: u32) {
            self.pc = pc;
        }
        fn local(&self, _index: usize) -> Value {
            Value::Reference(None)
        }
        fn set_local(&mut self, _index: usize, _value: Value) {}
        fn push_operand(&mut self, value: Value) {
            self.operands.push(value);
        }
        fn pop_operand(&mut self) -> Option<Value> {
            self.operands.pop()
        }
        fn clear_operands(&mut self) {
            self.operands.clear();
        }
        fn operand_stack(&self) -> &[Value] {
            &self.operands
        }
        fn set_return_to_thread_loop(&mut self, _value: bool) {}
    }

    #[test]
    fn push_const_appends_and_advances_pc() {
        let frame: Rc<StdRefCell<dyn BytecodeFrameOps>> = Rc::new(StdRefCell::new(RecordingFrame::default()));
        let op = push_const(Value::Int(7));
        op.execute(&fake_thread(), &frame);
        assert!(matches!(frame.borrow().operand_stack(), [Value::Int(7)]));
        assert_eq!(frame.borrow().pc(), 1);
    }

    #[test]
    fn goto_sets_pc_without_advancing_further() {
        let frame: Rc<StdRefCell<dyn BytecodeFrameOps>> = Rc::new(StdRefCell::new(RecordingFrame::default()));
        let op = goto(42);
        op.execute(&fake_thread(), &frame);
        assert_eq!(frame.borrow().pc(), 42);
    }

    fn fake_thread() -> Rc<dyn ThreadRef> {
        use crate::class_loader::TestClassLoader;
        use jvmcore::{EventLoop, ThreadPool};
        let event_loop = EventLoop::new();
        let loader = TestClassLoader::new(event_loop.clone());
        let pool = ThreadPool::new(event_loop);
        pool.new_thread(Value::Reference(None), loader)
    }
}
