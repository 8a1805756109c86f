//! The JVM thread status state machine.
//!
//! See [`ThreadStatus`] for the states and [`is_legal_transition`] for the transition table.

/// The lifecycle state of a single JVM thread.
///
/// # References
///
/// Mirrors `java.lang.Thread.State`, extended with the VM-internal states
/// (`ASYNC_WAITING`, `PARKED`, `UNINTERRUPTABLY_BLOCKED`) that this scheduler needs but that
/// are not part of the public Java API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadStatus {
    New,
    Runnable,
    Running,
    Blocked,
    Waiting,
    TimedWaiting,
    UninterruptablyBlocked,
    AsyncWaiting,
    Parked,
    Terminated,
}

impl ThreadStatus {
    /// Whether a thread in this status is expected to hold a non-null monitor reference.
    #[must_use]
    pub fn requires_monitor(self) -> bool {
        matches!(
            self,
            ThreadStatus::Blocked
                | ThreadStatus::Waiting
                | ThreadStatus::TimedWaiting
                | ThreadStatus::UninterruptablyBlocked
        )
    }
}

/// Returns whether transitioning directly from `from` to `to` is legal.
///
/// This excludes the two transitions handled specially by the caller before consulting this
/// table: the no-op `X -> X` case, and the `RUNNING -> RUNNABLE` collapse (which is silently
/// absorbed rather than treated as a transition at all).
#[must_use]
pub fn is_legal_transition(from: ThreadStatus, to: ThreadStatus) -> bool {
    use ThreadStatus::{
        AsyncWaiting, Blocked, New, Parked, Runnable, Running, Terminated, TimedWaiting,
        UninterruptablyBlocked, Waiting,
    };

    matches!(
        (from, to),
        (New, Runnable)
            | (New, AsyncWaiting)
            | (Running, Terminated)
            | (Running, Blocked)
            | (Running, Waiting)
            | (Running, TimedWaiting)
            | (Running, AsyncWaiting)
            | (Running, Parked)
            | (Runnable, AsyncWaiting)
            | (Runnable, Running)
            | (AsyncWaiting, Runnable)
            | (AsyncWaiting, Terminated)
            | (Waiting, UninterruptablyBlocked)
            | (Waiting, Runnable)
            | (TimedWaiting, UninterruptablyBlocked)
            | (TimedWaiting, Runnable)
            | (Blocked, Runnable)
            | (Parked, Runnable)
            | (UninterruptablyBlocked, Runnable)
            | (Terminated, New)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_can_become_runnable_or_async_waiting() {
        assert!(is_legal_transition(ThreadStatus::New, ThreadStatus::Runnable));
        assert!(is_legal_transition(ThreadStatus::New, ThreadStatus::AsyncWaiting));
        assert!(!is_legal_transition(ThreadStatus::New, ThreadStatus::Running));
    }

    #[test]
    fn terminated_can_only_resurrect_through_new() {
        assert!(is_legal_transition(ThreadStatus::Terminated, ThreadStatus::New));
        assert!(!is_legal_transition(ThreadStatus::Terminated, ThreadStatus::Runnable));
    }

    #[test]
    fn suspended_states_only_return_to_runnable() {
        for state in [
            ThreadStatus::Blocked,
            ThreadStatus::Parked,
            ThreadStatus::UninterruptablyBlocked,
        ] {
            assert!(is_legal_transition(state, ThreadStatus::Runnable));
            assert!(!is_legal_transition(state, ThreadStatus::Running));
        }
    }

    #[test]
    fn waiting_states_can_become_uninterruptably_blocked() {
        assert!(is_legal_transition(
            ThreadStatus::Waiting,
            ThreadStatus::UninterruptablyBlocked
        ));
        assert!(is_legal_transition(
            ThreadStatus::TimedWaiting,
            ThreadStatus::UninterruptablyBlocked
        ));
    }

    #[test]
    fn requires_monitor_matches_the_blocking_states() {
        assert!(ThreadStatus::Blocked.requires_monitor());
        assert!(ThreadStatus::Waiting.requires_monitor());
        assert!(ThreadStatus::TimedWaiting.requires_monitor());
        assert!(ThreadStatus::UninterruptablyBlocked.requires_monitor());
        assert!(!ThreadStatus::Running.requires_monitor());
        assert!(!ThreadStatus::Parked.requires_monitor());
        assert!(!ThreadStatus::AsyncWaiting.requires_monitor());
    }
}
