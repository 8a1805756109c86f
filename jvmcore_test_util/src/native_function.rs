use std::fmt;
use std::rc::Rc;

use jvmcore_types::{NativeFunction, ThreadRef, Value};

/// A fixture native function backed by an arbitrary closure.
pub struct TestNativeFunction {
    func: Box<dyn Fn(&Rc<dyn ThreadRef>, Vec<Value>) -> Option<Value>>,
}

impl fmt::Debug for TestNativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestNativeFunction").finish_non_exhaustive()
    }
}

impl TestNativeFunction {
    pub fn new(func: impl Fn(&Rc<dyn ThreadRef>, Vec<Value>) -> Option<Value> + 'static) -> Rc<Self> {
        Rc::new(TestNativeFunction { func: Box::new(func) })
    }
}

impl NativeFunction for TestNativeFunction {
    fn call(&self, thread: &Rc<dyn ThreadRef>, args: Vec<Value>) -> Option<Value> {
        (self.func)(thread, args)
    }
}
