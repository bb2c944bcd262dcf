//! Typed failure classification.
//!
//! Errors carry their own class through the [`ClassifyError`] trait rather
//! than being sniffed out of message strings. Most classes are recorded for
//! diagnostics only; [`ErrorClass::ResourceExhaustion`] is the exception
//! and forces the circuit open on a single occurrence, since such errors
//! indicate a systemic rather than transient problem.

/// Broad failure categories the breaker understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Browser-level resource exhaustion (connection refused, out of
    /// sockets, insufficient resources). One occurrence opens the circuit.
    ResourceExhaustion,
    /// Ordinary network failure (reset, aborted, unreachable peer).
    Network,
    /// The operation's own timeout fired.
    Timeout,
    /// The upstream answered with a server-side failure (5xx equivalent).
    Server,
    /// Anything else.
    Other,
}

impl ErrorClass {
    /// Stable label for logging and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::ResourceExhaustion => "resource_exhaustion",
            ErrorClass::Network => "network",
            ErrorClass::Timeout => "timeout",
            ErrorClass::Server => "server",
            ErrorClass::Other => "other",
        }
    }
}

/// Attaches an [`ErrorClass`] to an error type.
///
/// Implement this on the error type of guarded operations; the default
/// implementation tags everything [`ErrorClass::Other`], which disables the
/// immediate-open shortcut but keeps ordinary failure counting intact.
pub trait ClassifyError {
    fn error_class(&self) -> ErrorClass {
        ErrorClass::Other
    }
}

impl ClassifyError for std::io::Error {
    fn error_class(&self) -> ErrorClass {
        use std::io::ErrorKind;
        match self.kind() {
            ErrorKind::ConnectionRefused | ErrorKind::OutOfMemory => {
                ErrorClass::ResourceExhaustion
            }
            ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::NotConnected
            | ErrorKind::AddrNotAvailable => ErrorClass::Network,
            ErrorKind::TimedOut | ErrorKind::WouldBlock => ErrorClass::Timeout,
            _ => ErrorClass::Other,
        }
    }
}

impl ClassifyError for std::convert::Infallible {
    fn error_class(&self) -> ErrorClass {
        match *self {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn io_errors_map_to_classes() {
        let refused = Error::from(ErrorKind::ConnectionRefused);
        assert_eq!(refused.error_class(), ErrorClass::ResourceExhaustion);

        let reset = Error::from(ErrorKind::ConnectionReset);
        assert_eq!(reset.error_class(), ErrorClass::Network);

        let timed_out = Error::from(ErrorKind::TimedOut);
        assert_eq!(timed_out.error_class(), ErrorClass::Timeout);

        let other = Error::from(ErrorKind::InvalidData);
        assert_eq!(other.error_class(), ErrorClass::Other);
    }

    #[test]
    fn default_classification_is_other() {
        struct PlainError;
        impl ClassifyError for PlainError {}
        assert_eq!(PlainError.error_class(), ErrorClass::Other);
    }
}
