//! The abstract view of a bytecode frame that the `Opcode` collaborator is allowed to mutate.

use std::fmt;
use std::rc::Rc;

use crate::collaborators::Method;
use crate::value::Value;

/// The operations an [`crate::collaborators::Opcode`] needs on the bytecode frame it executes
/// against. Implemented by `jvmcore::BytecodeFrame`.
pub trait BytecodeFrameOps: fmt::Debug {
    fn method(&self) -> Rc<dyn Method>;

    fn pc(&self) -> u32;
    fn set_pc(&mut self, pc: u32);

    fn local(&self, index: usize) -> Value;
    fn set_local(&mut self, index: usize, value: Value);

    fn push_operand(&mut self, value: Value);
    fn pop_operand(&mut self) -> Option<Value>;
    fn clear_operands(&mut self);
    fn operand_stack(&self) -> &[Value];

    /// Opcodes call this once they have performed an action that must yield back to the thread's
    /// dispatch loop (invoke, return, throw, blocking call, async resolution).
    fn set_return_to_thread_loop(&mut self, value: bool);
}
