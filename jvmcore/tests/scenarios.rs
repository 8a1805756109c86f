//! Cross-module scenario tests driving the scheduler, frame execution, and thread pool together
//! through `jvmcore_test_util`'s collaborator fixtures.

use std::cell::RefCell;
use std::rc::Rc;

use jvmcore::{EventLoop, ThreadPool};
use jvmcore_test_util::{instructions, TestClassLoader, TestMethodBuilder, TestMonitor, TestNativeFunction};
use jvmcore_types::{CatchType, Class, ClassLoader, ExceptionHandler, Monitor, ReturnSlot, ThreadRef, ThreadStatus, Value};

#[test]
fn synchronized_method_uncontested_lock_runs_to_termination_and_releases() {
    let event_loop = EventLoop::new();
    let pool = ThreadPool::new(event_loop.clone());
    let loader = TestClassLoader::new(event_loop.clone());
    let class = loader.register_initialized("Test", Vec::new());
    let monitor = TestMonitor::new();
    let monitor_dyn: Rc<dyn Monitor> = monitor.clone();

    let method = TestMethodBuilder::new("run()V")
        .code(vec![instructions::return_void()])
        .synchronized()
        .monitor(monitor_dyn.clone())
        .owner_class(class.clone() as Rc<dyn Class>)
        .build();

    let fired = Rc::new(RefCell::new(false));
    let fired_clone = fired.clone();
    pool.set_empty_callback(move || *fired_clone.borrow_mut() = true);

    let loader_dyn: Rc<dyn ClassLoader> = loader.clone();
    let thread = pool.new_thread(Value::Reference(None), loader_dyn);
    thread.run_method(method, Vec::new(), None);
    event_loop.run_until_idle();

    assert_eq!(thread.status(), ThreadStatus::Terminated);
    assert!(pool.threads().is_empty());
    assert!(*fired.borrow());

    // The lock was released on normal return: a fresh acquire succeeds immediately.
    let other: Rc<dyn ThreadRef> = pool.new_thread(Value::Reference(None), loader as Rc<dyn ClassLoader>);
    assert!(monitor.enter(&other));
    monitor.exit(&other);
}

#[test]
fn exception_caught_by_an_already_resolved_handler_resumes_and_terminates_normally() {
    let event_loop = EventLoop::new();
    let pool = ThreadPool::new(event_loop.clone());
    let loader = TestClassLoader::new(event_loop.clone());
    let exception_class = loader.register_resolved("TestException", Vec::new());
    let exception = exception_class.allocate();

    let method = TestMethodBuilder::new("run()Ljava/lang/Throwable;")
        .code(vec![
            instructions::push_const(exception),
            instructions::athrow(),
            instructions::return_value(),
        ])
        .exception_handler(ExceptionHandler {
            start_pc: 0,
            end_pc: 2,
            handler_pc: 2,
            catch_type: CatchType::Class("TestException".to_string()),
        })
        .build();

    let thread = pool.new_thread(Value::Reference(None), loader as Rc<dyn ClassLoader>);
    thread.run_method(method, Vec::new(), None);
    event_loop.run_until_idle();

    // A failed catch would fall through to uncaught-exception dispatch, which host-faults here
    // because `java/lang/Thread` was never registered - reaching TERMINATED proves the handler
    // matched and execution resumed at `handler_pc`.
    assert_eq!(thread.status(), ThreadStatus::Terminated);
}

#[test]
fn exception_with_an_unresolved_handler_class_suspends_then_resumes_once_resolved() {
    let event_loop = EventLoop::new();
    let pool = ThreadPool::new(event_loop.clone());
    let loader = TestClassLoader::new(event_loop.clone());
    let exception_class = loader.register_known("TestException", Vec::new());
    let exception = exception_class.allocate();

    let method = TestMethodBuilder::new("run()Ljava/lang/Throwable;")
        .code(vec![
            instructions::push_const(exception),
            instructions::athrow(),
            instructions::return_value(),
        ])
        .exception_handler(ExceptionHandler {
            start_pc: 0,
            end_pc: 2,
            handler_pc: 2,
            catch_type: CatchType::Class("TestException".to_string()),
        })
        .build();

    let thread = pool.new_thread(Value::Reference(None), loader as Rc<dyn ClassLoader>);
    thread.run_method(method, Vec::new(), None);

    event_loop.run_one();
    assert_eq!(thread.status(), ThreadStatus::AsyncWaiting);

    event_loop.run_until_idle();
    assert_eq!(thread.status(), ThreadStatus::Terminated);
}

#[test]
fn uncaught_exception_dispatches_to_the_thread_and_then_terminates() {
    let event_loop = EventLoop::new();
    let pool = ThreadPool::new(event_loop.clone());
    let loader = TestClassLoader::new(event_loop.clone());

    let thread_class = loader.register_initialized("java/lang/Thread", Vec::new());
    let dispatched = Rc::new(RefCell::new(false));
    let dispatched_clone = dispatched.clone();
    let dispatch_native = TestNativeFunction::new(move |_thread, _args| {
        *dispatched_clone.borrow_mut() = true;
        None
    });
    let dispatch_method = TestMethodBuilder::new("dispatchUncaughtException(Ljava/lang/Throwable;)V")
        .native(dispatch_native)
        .owner_class(thread_class.clone() as Rc<dyn Class>)
        .build();
    thread_class.add_method(dispatch_method);

    let exception_class = loader.register_resolved("TestException", Vec::new());
    let exception = exception_class.allocate();

    let method = TestMethodBuilder::new("run()V")
        .code(vec![instructions::push_const(exception), instructions::athrow()])
        .build();

    let thread = pool.new_thread(Value::Reference(None), loader as Rc<dyn ClassLoader>);
    thread.run_method(method, Vec::new(), None);
    event_loop.run_until_idle();

    assert!(*dispatched.borrow());
    assert_eq!(thread.status(), ThreadStatus::Terminated);
}

#[test]
fn unpark_before_park_leaves_the_thread_runnable_with_park_count_cleared() {
    let event_loop = EventLoop::new();
    let pool = ThreadPool::new(event_loop.clone());
    let loader = TestClassLoader::new(event_loop);
    let thread = pool.new_thread(Value::Reference(None), loader as Rc<dyn ClassLoader>);

    pool.unpark(&thread);
    pool.park(&thread);

    assert_eq!(thread.status(), ThreadStatus::Runnable);
    assert!(!pool.is_parked(&thread));
}

#[test]
fn a_terminated_thread_resurrects_through_new_when_given_more_work() {
    let event_loop = EventLoop::new();
    let pool = ThreadPool::new(event_loop.clone());
    let loader = TestClassLoader::new(event_loop.clone());

    let loader_dyn: Rc<dyn ClassLoader> = loader;
    let thread = pool.new_thread(Value::Reference(None), loader_dyn);
    let first_run = TestMethodBuilder::new("run()V").code(vec![instructions::return_void()]).build();
    thread.run_method(first_run, Vec::new(), None);
    event_loop.run_until_idle();
    assert_eq!(thread.status(), ThreadStatus::Terminated);
    assert!(pool.threads().is_empty());

    let second_run = TestMethodBuilder::new("run()V").code(vec![instructions::return_void()]).build();
    pool.resurrect_thread(&thread);
    thread.run_method(second_run, Vec::new(), None);
    event_loop.run_until_idle();

    assert_eq!(thread.status(), ThreadStatus::Terminated);
    assert!(pool.threads().is_empty());
}

#[test]
fn a_contended_monitor_blocks_the_second_thread_until_the_first_exits() {
    let event_loop = EventLoop::new();
    let pool = ThreadPool::new(event_loop.clone());
    let loader = TestClassLoader::new(event_loop.clone());
    let class = loader.register_initialized("Test", Vec::new());
    let monitor = TestMonitor::new();
    let monitor_dyn: Rc<dyn Monitor> = monitor.clone();

    let suspend_native = TestNativeFunction::new(|thread, _args| {
        thread.set_status(ThreadStatus::AsyncWaiting, None);
        None
    });
    let suspend_method = TestMethodBuilder::new("suspend()V")
        .native(suspend_native)
        .owner_class(class.clone() as Rc<dyn Class>)
        .build();

    let method_a = TestMethodBuilder::new("critical()V")
        .code(vec![instructions::invoke(suspend_method, 0), instructions::return_void()])
        .synchronized()
        .monitor(monitor_dyn.clone())
        .owner_class(class.clone() as Rc<dyn Class>)
        .build();
    let method_b = TestMethodBuilder::new("critical()V")
        .code(vec![instructions::return_void()])
        .synchronized()
        .monitor(monitor_dyn)
        .owner_class(class as Rc<dyn Class>)
        .build();

    let loader_dyn: Rc<dyn ClassLoader> = loader;
    let thread_a = pool.new_thread(Value::Reference(None), loader_dyn.clone());
    let thread_b = pool.new_thread(Value::Reference(None), loader_dyn);

    thread_a.run_method(method_a, Vec::new(), None);
    event_loop.run_until_idle();
    assert_eq!(thread_a.status(), ThreadStatus::AsyncWaiting);

    thread_b.run_method(method_b, Vec::new(), None);
    event_loop.run_until_idle();
    assert_eq!(thread_b.status(), ThreadStatus::Blocked);
    let thread_b_ref: Rc<dyn ThreadRef> = thread_b.clone();
    assert!(monitor.is_blocked(thread_b_ref.ref_id()));

    // Simulate the suspended native call completing asynchronously.
    thread_a.async_return(None, ReturnSlot::Absent);
    event_loop.run_until_idle();

    assert_eq!(thread_a.status(), ThreadStatus::Terminated);
    assert_eq!(thread_b.status(), ThreadStatus::Terminated);
}

#[test]
fn a_native_frame_that_throws_instead_of_returning_does_not_also_complete_normally() {
    let event_loop = EventLoop::new();
    let pool = ThreadPool::new(event_loop.clone());
    let loader = TestClassLoader::new(event_loop.clone());

    let native = TestNativeFunction::new(|thread, _args| {
        thread.throw_exception(Value::Str(Rc::from("boom")));
        None
    });
    let native_method = TestMethodBuilder::new("nativeThrow()V").native(native).build();

    let method = TestMethodBuilder::new("run()Ljava/lang/Throwable;")
        .code(vec![instructions::invoke(native_method, 0), instructions::return_value()])
        .exception_handler(ExceptionHandler {
            start_pc: 0,
            end_pc: 1,
            handler_pc: 1,
            catch_type: CatchType::Any,
        })
        .build();

    let outcome: Rc<RefCell<Option<(bool, Option<Value>)>>> = Rc::new(RefCell::new(None));
    let outcome_clone = outcome.clone();

    let thread = pool.new_thread(Value::Reference(None), loader as Rc<dyn ClassLoader>);
    thread.run_method(
        method,
        Vec::new(),
        Some(Box::new(move |exception, value| {
            *outcome_clone.borrow_mut() = Some((exception.is_some(), value));
        })),
    );
    event_loop.run_until_idle();

    assert_eq!(thread.status(), ThreadStatus::Terminated);
    let outcome = outcome.borrow();
    match outcome.as_ref() {
        Some((false, Some(Value::Str(message)))) => assert_eq!(message.as_ref(), "boom"),
        other => panic!("expected a normally-returned caught exception value, got {other:?}"),
    }
}
