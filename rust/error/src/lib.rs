// Error codes shared by every mapsync crate. They follow the gRPC status
// vocabulary so callers can classify failures without matching on concrete
// error types.
use std::error::Error;

#[cfg(feature = "http")]
mod http;

#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash)]
pub enum ErrorCodes {
    // The caller supplied something unusable, e.g. a malformed schema document.
    InvalidArgument,
    // A referenced index, type or file does not exist.
    NotFound,
    // The index we were asked to create is already there.
    AlreadyExists,
    // The live schema is in a state the requested strategy cannot reconcile.
    FailedPrecondition,
    // The engine rejected credentials.
    Unauthenticated,
    // The engine refused the operation for the given credentials.
    PermissionDenied,
    // The engine did not answer in time.
    DeadlineExceeded,
    // The engine could not be reached or answered with a server error.
    Unavailable,
    // A bug on our side.
    Internal,
    // Anything we could not classify.
    Unknown,
}

impl ErrorCodes {
    pub fn name(&self) -> &'static str {
        match self {
            ErrorCodes::InvalidArgument => "InvalidArgumentError",
            ErrorCodes::NotFound => "NotFoundError",
            ErrorCodes::AlreadyExists => "AlreadyExistsError",
            ErrorCodes::FailedPrecondition => "FailedPreconditionError",
            ErrorCodes::Unavailable => "UnavailableError",
            ErrorCodes::Internal => "InternalError",
            _ => "MapsyncError",
        }
    }

    /// Whether retrying the whole startup could plausibly succeed without a
    /// schema change.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorCodes::Unavailable | ErrorCodes::DeadlineExceeded | ErrorCodes::Unknown
        )
    }
}

pub trait MapsyncError: Error + Send {
    fn code(&self) -> ErrorCodes;
    fn boxed(self) -> Box<dyn MapsyncError>
    where
        Self: Sized + 'static,
    {
        Box::new(self)
    }
}

impl Error for Box<dyn MapsyncError> {}

impl MapsyncError for Box<dyn MapsyncError> {
    fn code(&self) -> ErrorCodes {
        self.as_ref().code()
    }
}

impl MapsyncError for std::io::Error {
    fn code(&self) -> ErrorCodes {
        match self.kind() {
            std::io::ErrorKind::NotFound => ErrorCodes::NotFound,
            std::io::ErrorKind::PermissionDenied => ErrorCodes::PermissionDenied,
            _ => ErrorCodes::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_codes() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "schema.json");
        assert_eq!(err.code(), ErrorCodes::NotFound);
        let boxed = err.boxed();
        assert_eq!(boxed.code(), ErrorCodes::NotFound);
        assert_eq!(boxed.code().name(), "NotFoundError");
    }

    #[test]
    fn test_transient_codes() {
        assert!(ErrorCodes::Unavailable.is_transient());
        assert!(!ErrorCodes::FailedPrecondition.is_transient());
        assert!(!ErrorCodes::AlreadyExists.is_transient());
    }
}
