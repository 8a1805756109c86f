use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use jvmcore_types::{Monitor, ThreadRef, ThreadStatus};

/// A fixture monitor with real reentrant-lock and waiter-queue semantics, so contended-monitor
/// scenarios can be exercised against the real scheduler.
pub struct TestMonitor {
    self_ref: RefCell<Weak<TestMonitor>>,
    holder: RefCell<Option<u64>>,
    depth: Cell<u32>,
    waiters: RefCell<VecDeque<Rc<dyn ThreadRef>>>,
}

impl fmt::Debug for TestMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestMonitor")
            .field("holder", &self.holder.borrow())
            .field("depth", &self.depth.get())
            .field("waiters", &self.waiters.borrow().len())
            .finish()
    }
}

impl TestMonitor {
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new_cyclic(|weak| TestMonitor {
            self_ref: RefCell::new(weak.clone()),
            holder: RefCell::new(None),
            depth: Cell::new(0),
            waiters: RefCell::new(VecDeque::new()),
        })
    }

    fn self_handle(&self) -> Rc<dyn Monitor> {
        self.self_ref.borrow().upgrade().expect("test monitor outlived its own Rc")
    }
}

impl Monitor for TestMonitor {
    fn enter(&self, thread: &Rc<dyn ThreadRef>) -> bool {
        let id = thread.ref_id();
        {
            let mut holder = self.holder.borrow_mut();
            match *holder {
                None => {
                    *holder = Some(id);
                    self.depth.set(1);
                    return true;
                }
                Some(current) if current == id => {
                    self.depth.set(self.depth.get() + 1);
                    return true;
                }
                Some(_) => {}
            }
        }
        self.waiters.borrow_mut().push_back(thread.clone());
        thread.set_status(ThreadStatus::Blocked, Some(self.self_handle()));
        false
    }

    fn exit(&self, thread: &Rc<dyn ThreadRef>) {
        let id = thread.ref_id();
        {
            let mut holder = self.holder.borrow_mut();
            if *holder != Some(id) {
                return;
            }
            let remaining = self.depth.get() - 1;
            self.depth.set(remaining);
            if remaining > 0 {
                return;
            }
            *holder = None;
        }
        // Wake the next waiter without pre-assigning it the lock: its own resumed frame retries
        // `enter` when it re-dispatches, which performs the actual acquire. Pre-assigning here
        // would double-count depth once that retry also runs.
        if let Some(next) = self.waiters.borrow_mut().pop_front() {
            next.set_status(ThreadStatus::Runnable, None);
        }
    }

    fn is_waiting(&self, _thread_ref: u64) -> bool {
        false
    }

    fn is_timed_waiting(&self, _thread_ref: u64) -> bool {
        false
    }

    fn is_blocked(&self, thread_ref: u64) -> bool {
        self.waiters.borrow().iter().any(|waiter| waiter.ref_id() == thread_ref)
    }
}
