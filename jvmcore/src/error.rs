//! Error handling for the `jvmcore` scheduler.
//!
//! This module covers only the "collaborator/host-integration" error plane: failures in
//! wiring the scheduler itself. JVM exceptions are represented
//! as [`jvmcore_types::Value`] and propagated by [`crate::Thread::throw_exception`]; host-side
//! invariant violations (illegal status transitions, return-value mismatches) are fatal and
//! abort the process rather than returning an `Err` - see [`crate::sanity::host_fault`].

/// `jvmcore` result type.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Errors that can occur while wiring up or driving the scheduler.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A method's exception table referenced a program-counter range or handler target outside
    /// the method's code.
    #[error("Invalid exception handler: {0}")]
    InvalidExceptionHandler(String),
    /// A caller attempted to run the scheduler with no registered threads and no empty-callback
    /// to observe the resulting idle pool.
    #[error("Thread pool has no threads and no empty callback")]
    NoThreadsRegistered,
    /// A class loader or monitor fixture reported a configuration problem.
    #[error("Collaborator error: {0}")]
    CollaboratorError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_exception_handler_formats_its_message() {
        let error = Error::InvalidExceptionHandler("handler_pc out of range".to_string());
        assert_eq!(
            error.to_string(),
            "Invalid exception handler: handler_pc out of range"
        );
    }
}
