use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use jvmcore::EventLoop;
use jvmcore_types::{Class, ClassLoader};

use crate::class::TestClass;

/// A fixture class loader. Classes are "known" as soon as they are registered; `register_known`
/// models a class that exists but has not yet been resolved, so tests can exercise the
/// asynchronous handler-resolution path. Every callback this loader owes is deferred through
/// `event_loop`, never invoked synchronously - class resolution must always eventually
/// complete, but never on the same tick that requested it.
pub struct TestClassLoader {
    event_loop: Rc<EventLoop>,
    known: RefCell<HashMap<String, Rc<TestClass>>>,
    resolved: RefCell<HashMap<String, Rc<TestClass>>>,
    initialized: RefCell<HashMap<String, Rc<TestClass>>>,
    self_ref: RefCell<Weak<TestClassLoader>>,
}

impl fmt::Debug for TestClassLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestClassLoader")
            .field("known", &self.known.borrow().len())
            .field("resolved", &self.resolved.borrow().len())
            .field("initialized", &self.initialized.borrow().len())
            .finish()
    }
}

impl TestClassLoader {
    #[must_use]
    pub fn new(event_loop: Rc<EventLoop>) -> Rc<Self> {
        Rc::new_cyclic(|weak| TestClassLoader {
            event_loop,
            known: RefCell::new(HashMap::new()),
            resolved: RefCell::new(HashMap::new()),
            initialized: RefCell::new(HashMap::new()),
            self_ref: RefCell::new(weak.clone()),
        })
    }

    fn make_class(self: &Rc<Self>, name: &str, supertypes: Vec<String>) -> Rc<TestClass> {
        Rc::new_cyclic(|weak| TestClass {
            name: name.to_string(),
            supertypes,
            loader: self.self_ref.borrow().clone(),
            self_ref: RefCell::new(weak.clone()),
            methods: RefCell::new(HashMap::new()),
        })
    }

    /// Register a class the loader knows about but has not yet resolved. `resolve_classes` or
    /// `initialize_class` will resolve it, on a deferred tick, the first time it is requested.
    pub fn register_known(self: &Rc<Self>, name: &str, supertypes: Vec<String>) -> Rc<TestClass> {
        let class = self.make_class(name, supertypes);
        self.known.borrow_mut().insert(name.to_string(), class.clone());
        class
    }

    /// Register a class as already resolved (but not initialized).
    pub fn register_resolved(self: &Rc<Self>, name: &str, supertypes: Vec<String>) -> Rc<TestClass> {
        let class = self.register_known(name, supertypes);
        self.resolved.borrow_mut().insert(class.name.clone(), class.clone());
        class
    }

    /// Register a class as already resolved and initialized.
    pub fn register_initialized(self: &Rc<Self>, name: &str, supertypes: Vec<String>) -> Rc<TestClass> {
        let class = self.register_resolved(name, supertypes);
        self.initialized.borrow_mut().insert(class.name.clone(), class.clone());
        class
    }
}

impl ClassLoader for TestClassLoader {
    fn resolved_class(&self, name: &str) -> Option<Rc<dyn Class>> {
        self.resolved.borrow().get(name).cloned().map(|class| class as Rc<dyn Class>)
    }

    fn initialized_class(&self, name: &str) -> Option<Rc<dyn Class>> {
        self.initialized.borrow().get(name).cloned().map(|class| class as Rc<dyn Class>)
    }

    fn resolve_classes(&self, names: Vec<String>, on_complete: Box<dyn FnOnce()>) {
        for name in &names {
            if let Some(class) = self.known.borrow().get(name).cloned() {
                self.resolved.borrow_mut().insert(name.clone(), class);
            }
        }
        self.event_loop.schedule(on_complete);
    }

    fn initialize_class(&self, name: &str, _bootstrap: bool, on_complete: Box<dyn FnOnce()>) {
        if let Some(class) = self.known.borrow().get(name).cloned() {
            self.resolved.borrow_mut().insert(name.to_string(), class.clone());
            self.initialized.borrow_mut().insert(name.to_string(), class);
        }
        self.event_loop.schedule(on_complete);
    }
}
