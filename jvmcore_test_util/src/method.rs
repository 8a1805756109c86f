use std::fmt;
use std::rc::Rc;

use jvmcore::EventLoop;
use jvmcore_types::{Class, ExceptionHandler, Method, Monitor, NativeFunction, Opcode, ThreadRef, Value};

use crate::class_loader::TestClassLoader;
use crate::monitor::TestMonitor;

/// A fixture method: enough state to drive `BytecodeFrame`/`NativeFrame` dispatch without a real
/// class file. Build one with [`TestMethodBuilder`].
pub struct TestMethod {
    signature: String,
    return_descriptor: String,
    max_locals: usize,
    code: Vec<Rc<dyn Opcode>>,
    exception_handlers: Vec<ExceptionHandler>,
    synchronized: bool,
    native_function: Option<Rc<dyn NativeFunction>>,
    monitor: Rc<dyn Monitor>,
    class: Rc<dyn Class>,
}

impl fmt::Debug for TestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestMethod").field("signature", &self.signature).finish_non_exhaustive()
    }
}

impl Method for TestMethod {
    fn is_native(&self) -> bool {
        self.native_function.is_some()
    }

    fn is_synchronized(&self) -> bool {
        self.synchronized
    }

    fn is_abstract(&self) -> bool {
        false
    }

    fn max_locals(&self) -> usize {
        self.max_locals
    }

    fn code(&self) -> Vec<Rc<dyn Opcode>> {
        self.code.clone()
    }

    fn exception_handlers(&self) -> Vec<ExceptionHandler> {
        self.exception_handlers.clone()
    }

    fn signature(&self) -> &str {
        &self.signature
    }

    fn monitor(&self) -> Rc<dyn Monitor> {
        self.monitor.clone()
    }

    fn native_function(&self) -> Option<Rc<dyn NativeFunction>> {
        self.native_function.clone()
    }

    fn convert_args(&self, _thread: &Rc<dyn ThreadRef>, args: Vec<Value>) -> Vec<Value> {
        args
    }

    fn return_descriptor(&self) -> &str {
        &self.return_descriptor
    }

    fn full_signature(&self) -> String {
        format!("{}.{}", self.class.name(), self.signature)
    }

    fn class(&self) -> Rc<dyn Class> {
        self.class.clone()
    }
}

/// Builds a [`TestMethod`] behind the `Method` trait object `jvmcore` consumes.
#[derive(Debug)]
pub struct TestMethodBuilder {
    signature: String,
    max_locals: usize,
    code: Vec<Rc<dyn Opcode>>,
    exception_handlers: Vec<ExceptionHandler>,
    synchronized: bool,
    native_function: Option<Rc<dyn NativeFunction>>,
    monitor: Option<Rc<dyn Monitor>>,
    class: Option<Rc<dyn Class>>,
}

impl TestMethodBuilder {
    #[must_use]
    pub fn new(signature: &str) -> Self {
        TestMethodBuilder {
            signature: signature.to_string(),
            max_locals: 0,
            code: Vec::new(),
            exception_handlers: Vec::new(),
            synchronized: false,
            native_function: None,
            monitor: None,
            class: None,
        }
    }

    #[must_use]
    pub fn code(mut self, code: Vec<Rc<dyn Opcode>>) -> Self {
        self.code = code;
        self
    }

    #[must_use]
    pub fn max_locals(mut self, max_locals: usize) -> Self {
        self.max_locals = max_locals;
        self
    }

    #[must_use]
    pub fn synchronized(mut self) -> Self {
        self.synchronized = true;
        self
    }

    #[must_use]
    pub fn native(mut self, native_function: Rc<dyn NativeFunction>) -> Self {
        self.native_function = Some(native_function);
        self
    }

    #[must_use]
    pub fn exception_handler(mut self, handler: ExceptionHandler) -> Self {
        self.exception_handlers.push(handler);
        self
    }

    #[must_use]
    pub fn monitor(mut self, monitor: Rc<dyn Monitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    #[must_use]
    pub fn owner_class(mut self, class: Rc<dyn Class>) -> Self {
        self.class = Some(class);
        self
    }

    #[must_use]
    pub fn build(self) -> Rc<dyn Method> {
        let return_descriptor = match self.signature.find(')') {
            Some(index) => self.signature[index + 1..].to_string(),
            None => "V".to_string(),
        };
        let class = self.class.unwrap_or_else(default_class);
        let monitor = self.monitor.unwrap_or_else(|| TestMonitor::new() as Rc<dyn Monitor>);
        Rc::new(TestMethod {
            signature: self.signature,
            return_descriptor,
            max_locals: self.max_locals,
            code: self.code,
            exception_handlers: self.exception_handlers,
            synchronized: self.synchronized,
            native_function: self.native_function,
            monitor,
            class,
        })
    }
}

fn default_class() -> Rc<dyn Class> {
    let loader = TestClassLoader::new(EventLoop::new());
    loader.register_initialized("Test", Vec::new())
}
