use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use jvmcore_types::{Class, ClassLoader, Method, ThreadRef, Value};

use crate::class_loader::TestClassLoader;
use crate::object::TestObject;

/// A fixture class: a name, a flat list of supertype names for castability, and a method table.
pub struct TestClass {
    pub(crate) name: String,
    pub(crate) supertypes: Vec<String>,
    pub(crate) loader: Weak<TestClassLoader>,
    pub(crate) self_ref: RefCell<Weak<TestClass>>,
    pub(crate) methods: RefCell<HashMap<String, Rc<dyn Method>>>,
}

impl fmt::Debug for TestClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestClass").field("name", &self.name).finish_non_exhaustive()
    }
}

impl TestClass {
    /// Register `method` under its full signature, so `method_lookup` can find it.
    pub fn add_method(&self, method: Rc<dyn Method>) {
        self.methods.borrow_mut().insert(method.signature().to_string(), method);
    }
}

impl Class for TestClass {
    fn name(&self) -> &str {
        &self.name
    }

    fn loader(&self) -> Rc<dyn ClassLoader> {
        self.loader.upgrade().expect("test class outlived its loader")
    }

    fn is_castable(&self, other: &dyn Class) -> bool {
        self.name == other.name() || self.supertypes.iter().any(|supertype| supertype == other.name())
    }

    fn method_lookup(&self, _thread: &Rc<dyn ThreadRef>, signature: &str) -> Option<Rc<dyn Method>> {
        self.methods.borrow().get(signature).cloned()
    }

    fn allocate(&self) -> Value {
        let class = self.self_ref.borrow().clone();
        Value::Reference(Some(Rc::new(TestObject::new(class))))
    }
}
