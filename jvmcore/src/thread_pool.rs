//! The thread pool scheduler: §4.5.
//!
//! Admission, park/unpark bookkeeping, and a minimal round-robin-ish promotion policy. Every
//! promotion is deferred to the next [`EventLoop`] tick - `notify_runnable`/`notify_suspended`/
//! `notify_terminated` never promote a thread inline with the transition that triggered them.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use jvmcore_types::{ClassLoader, ThreadRef, ThreadStatus, Value};

use crate::error::{Error, Result};
use crate::event_loop::EventLoop;
use crate::thread::{ThreadHandle, ThreadState};

pub(crate) struct ThreadPoolState {
    threads: Vec<ThreadHandle>,
    running: Option<ThreadHandle>,
    park_counts: HashMap<u64, i64>,
    empty_callback: Option<Box<dyn FnOnce()>>,
    event_loop: Rc<EventLoop>,
    next_ref_id: u64,
    schedule_pending: bool,
}

impl fmt::Debug for ThreadPoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPoolState")
            .field("threads", &self.threads.len())
            .field("running", &self.running.as_ref().map(|t| t.ref_id()))
            .field("schedule_pending", &self.schedule_pending)
            .finish_non_exhaustive()
    }
}

/// A handle to the scheduler's thread pool. Cheap to clone (clones an `Rc`).
#[derive(Debug, Clone)]
pub struct ThreadPool(Rc<RefCell<ThreadPoolState>>);

impl ThreadPool {
    #[must_use]
    pub fn new(event_loop: Rc<EventLoop>) -> Self {
        ThreadPool(Rc::new(RefCell::new(ThreadPoolState {
            threads: Vec::new(),
            running: None,
            park_counts: HashMap::new(),
            empty_callback: None,
            event_loop,
            next_ref_id: 1,
            schedule_pending: false,
        })))
    }

    /// Create and admit a new thread, with `thread_object` as the `java.lang.Thread` instance
    /// `handleUncaughtException` will pass to its dispatcher, and `class_loader` as the thread's
    /// bootstrap class loader.
    pub fn new_thread(&self, thread_object: Value, class_loader: Rc<dyn ClassLoader>) -> ThreadHandle {
        let ref_id = {
            let mut state = self.0.borrow_mut();
            let ref_id = state.next_ref_id;
            state.next_ref_id += 1;
            ref_id
        };
        let pool_weak = Rc::downgrade(&self.0);
        let thread = ThreadState::new(ref_id, thread_object, class_loader, pool_weak);
        self.0.borrow_mut().threads.push(thread.clone());
        thread
    }

    /// Re-admit a previously terminated thread to the pool's tracked set.
    pub fn resurrect_thread(&self, thread: &ThreadHandle) {
        let mut state = self.0.borrow_mut();
        if !state.threads.iter().any(|existing| Rc::ptr_eq(existing, thread)) {
            state.threads.push(thread.clone());
        }
    }

    #[must_use]
    pub fn threads(&self) -> Vec<ThreadHandle> {
        self.0.borrow().threads.clone()
    }

    /// Register the callback fired the next time the pool's thread set becomes empty while a
    /// promotion is attempted. Fires at most once; re-register after it fires if needed again.
    pub fn set_empty_callback(&self, callback: impl FnOnce() + 'static) {
        self.0.borrow_mut().empty_callback = Some(Box::new(callback));
    }

    pub fn park(&self, thread: &ThreadHandle) {
        let count = {
            let mut state = self.0.borrow_mut();
            let entry = state.park_counts.entry(thread.ref_id()).or_insert(0);
            *entry += 1;
            *entry
        };
        if count > 0 {
            thread.set_status(ThreadStatus::Parked, None);
        }
    }

    /// Asymmetric with `park`: an `unpark` preceding a `park` leaves the counter negative, so the
    /// following `park` is pre-satisfied and becomes a no-op transition.
    pub fn unpark(&self, thread: &ThreadHandle) {
        let count = {
            let mut state = self.0.borrow_mut();
            let entry = state.park_counts.entry(thread.ref_id()).or_insert(0);
            *entry -= 1;
            *entry
        };
        if count <= 0 {
            thread.set_status(ThreadStatus::Runnable, None);
        }
    }

    /// Force the park count to zero and transition to `RUNNABLE`, unconditionally - even if the
    /// thread was not parked.
    pub fn completely_unpark(&self, thread: &ThreadHandle) {
        self.0.borrow_mut().park_counts.insert(thread.ref_id(), 0);
        thread.set_status(ThreadStatus::Runnable, None);
    }

    #[must_use]
    pub fn is_parked(&self, thread: &ThreadHandle) -> bool {
        self.0.borrow().park_counts.get(&thread.ref_id()).copied().unwrap_or(0) > 0
    }

    /// Attempt to promote the next runnable thread to `RUNNING`, or fire the empty callback if
    /// the pool has gone idle. Normally triggered automatically from the event loop; exposed so
    /// a caller driving the pool directly observes the same failure a scheduled tick would only
    /// log: `Err(Error::NoThreadsRegistered)` when the pool has no threads and no empty callback
    /// registered to observe that.
    pub fn pump(&self) -> Result<()> {
        promote_next(&self.0)
    }
}

pub(crate) fn notify_runnable(pool: &Rc<RefCell<ThreadPoolState>>, _thread: &ThreadHandle) {
    schedule_if_idle(pool);
}

pub(crate) fn notify_suspended(pool: &Rc<RefCell<ThreadPoolState>>, thread: &ThreadHandle) {
    clear_if_running(pool, thread);
    schedule_if_idle(pool);
}

pub(crate) fn notify_terminated(pool: &Rc<RefCell<ThreadPoolState>>, thread: &ThreadHandle) {
    {
        let mut state = pool.borrow_mut();
        state.threads.retain(|existing| !Rc::ptr_eq(existing, thread));
    }
    clear_if_running(pool, thread);
    schedule_if_idle(pool);
}

fn clear_if_running(pool: &Rc<RefCell<ThreadPoolState>>, thread: &ThreadHandle) {
    let mut state = pool.borrow_mut();
    if state.running.as_ref().is_some_and(|running| Rc::ptr_eq(running, thread)) {
        state.running = None;
    }
}

fn schedule_if_idle(pool: &Rc<RefCell<ThreadPoolState>>) {
    let should_schedule = {
        let mut state = pool.borrow_mut();
        if state.running.is_some() || state.schedule_pending {
            false
        } else {
            state.schedule_pending = true;
            true
        }
    };
    if !should_schedule {
        return;
    }
    let pool_for_tick = pool.clone();
    let event_loop = pool.borrow().event_loop.clone();
    event_loop.schedule(move || {
        if let Err(error) = promote_next(&pool_for_tick) {
            tracing::warn!(%error, "thread pool tick found nothing to promote");
        }
    });
}

fn promote_next(pool: &Rc<RefCell<ThreadPoolState>>) -> Result<()> {
    let next = {
        let mut state = pool.borrow_mut();
        state.schedule_pending = false;
        if state.running.is_some() {
            return Ok(());
        }
        state.threads.iter().find(|thread| thread.status() == ThreadStatus::Runnable).cloned()
    };

    match next {
        Some(thread) => {
            pool.borrow_mut().running = Some(thread.clone());
            thread.set_status(ThreadStatus::Running, None);
            Ok(())
        }
        None => {
            if !pool.borrow().threads.is_empty() {
                return Ok(());
            }
            match pool.borrow_mut().empty_callback.take() {
                Some(callback) => {
                    callback();
                    Ok(())
                }
                None => Err(Error::NoThreadsRegistered),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jvmcore_test_util::TestClassLoader;

    fn loader() -> Rc<dyn ClassLoader> {
        TestClassLoader::new(EventLoop::new())
    }

    #[test]
    fn park_then_unpark_leaves_park_count_unchanged() {
        let pool = ThreadPool::new(EventLoop::new());
        let thread = pool.new_thread(Value::Reference(None), loader());
        pool.park(&thread);
        assert!(pool.is_parked(&thread));
        pool.unpark(&thread);
        assert!(!pool.is_parked(&thread));
    }

    #[test]
    fn unpark_before_park_pre_satisfies_the_next_park() {
        let pool = ThreadPool::new(EventLoop::new());
        let thread = pool.new_thread(Value::Reference(None), loader());
        pool.unpark(&thread);
        pool.park(&thread);
        assert!(!pool.is_parked(&thread));
    }

    #[test]
    fn completely_unpark_forces_runnable_even_when_not_parked() {
        let pool = ThreadPool::new(EventLoop::new());
        let thread = pool.new_thread(Value::Reference(None), loader());
        assert!(!pool.is_parked(&thread));
        pool.completely_unpark(&thread);
        assert_eq!(thread.status(), ThreadStatus::Runnable);
        assert!(!pool.is_parked(&thread));
    }

    #[test]
    fn empty_callback_fires_once_the_pool_has_no_threads() {
        let event_loop = EventLoop::new();
        let pool = ThreadPool::new(event_loop.clone());
        let fired = Rc::new(RefCell::new(false));
        let fired_clone = fired.clone();
        pool.set_empty_callback(move || *fired_clone.borrow_mut() = true);

        let thread = pool.new_thread(Value::Reference(None), loader());
        thread.set_status(ThreadStatus::AsyncWaiting, None);
        thread.set_status(ThreadStatus::Terminated, None);
        event_loop.run_until_idle();

        assert!(*fired.borrow());
    }

    #[test]
    fn pump_with_no_threads_and_no_callback_reports_the_collaborator_error() {
        let pool = ThreadPool::new(EventLoop::new());
        assert!(matches!(pool.pump(), Err(Error::NoThreadsRegistered)));
    }
}
