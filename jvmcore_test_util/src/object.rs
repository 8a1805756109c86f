use std::fmt;
use std::rc::{Rc, Weak};

use jvmcore_types::{Class, ObjectRef};

use crate::class::TestClass;

/// A fixture object: just enough to answer `ObjectRef::class`.
pub struct TestObject {
    class: Weak<TestClass>,
}

impl TestObject {
    pub(crate) fn new(class: Weak<TestClass>) -> Self {
        TestObject { class }
    }
}

impl fmt::Debug for TestObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestObject").finish_non_exhaustive()
    }
}

impl ObjectRef for TestObject {
    fn class(&self) -> Rc<dyn Class> {
        self.class.upgrade().expect("test object outlived its class")
    }
}
