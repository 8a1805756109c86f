//! The "next event tick" the scheduler defers to.
//!
//! Scheduling a new thread onto the executor never happens inline with the transition that
//! triggered it - this is what stands in for a browser's
//! microtask queue or a single-threaded async runtime in a real host. Collaborator fixtures
//! (class resolution, monitor wake-ups) post their completions through the same queue, so tests
//! can drive the whole system by repeatedly calling [`EventLoop::run_until_idle`].

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// A FIFO queue of deferred thunks, shared by the scheduler and any collaborator that needs to
/// complete asynchronously.
#[derive(Default)]
pub struct EventLoop {
    tasks: RefCell<VecDeque<Box<dyn FnOnce()>>>,
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoop")
            .field("pending", &self.tasks.borrow().len())
            .finish()
    }
}

impl EventLoop {
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Post `task` to run on a future tick. Never runs `task` inline.
    pub fn schedule(&self, task: impl FnOnce() + 'static) {
        self.tasks.borrow_mut().push_back(Box::new(task));
    }

    /// Run every currently-queued task, including any tasks newly scheduled by a task that just
    /// ran, until the queue is empty.
    pub fn run_until_idle(&self) {
        loop {
            let next = self.tasks.borrow_mut().pop_front();
            let Some(task) = next else { break };
            task();
        }
    }

    /// Run at most one queued task. Returns whether a task ran.
    pub fn run_one(&self) -> bool {
        let next = self.tasks.borrow_mut().pop_front();
        match next {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.tasks.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn tasks_do_not_run_until_drained() {
        let event_loop = EventLoop::new();
        let ran = Rc::new(Cell::new(false));
        let ran_clone = ran.clone();
        event_loop.schedule(move || ran_clone.set(true));
        assert!(!ran.get());
        event_loop.run_until_idle();
        assert!(ran.get());
    }

    #[test]
    fn a_task_scheduling_another_task_is_drained_in_the_same_run() {
        let event_loop = EventLoop::new();
        let count = Rc::new(Cell::new(0));
        let count_clone = count.clone();
        let event_loop_clone = event_loop.clone();
        event_loop.schedule(move || {
            count_clone.set(count_clone.get() + 1);
            let count_inner = count_clone.clone();
            event_loop_clone.schedule(move || count_inner.set(count_inner.get() + 1));
        });
        event_loop.run_until_idle();
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn run_one_drains_a_single_task() {
        let event_loop = EventLoop::new();
        let count = Rc::new(Cell::new(0));
        for _ in 0..3 {
            let count_clone = count.clone();
            event_loop.schedule(move || count_clone.set(count_clone.get() + 1));
        }
        assert!(event_loop.run_one());
        assert_eq!(count.get(), 1);
        assert!(!event_loop.is_idle());
    }
}
