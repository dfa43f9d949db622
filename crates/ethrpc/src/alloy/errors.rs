use alloy::transports::{RpcError, TransportError};

pub trait TransportErrorExt {
    /// Returns whether the node received the request and answered it with a
    /// JSON-RPC error, i.e. it understood and refused it. Resending the same
    /// request will not change the outcome.
    fn is_rejection(&self) -> bool;

    /// Returns whether the error happened while talking to the node
    /// (connection problems, malformed or missing responses, rate limits).
    fn is_transport_failure(&self) -> bool {
        !self.is_rejection()
    }
}

impl TransportErrorExt for TransportError {
    fn is_rejection(&self) -> bool {
        match self {
            RpcError::ErrorResp(err) => {
                // Rate limiting is reported as an error response by most
                // providers but says nothing about the request itself.
                let retryable = err.is_retry_err();
                tracing::debug!(?err, %retryable, "rpc error response");
                !retryable
            }
            _ => false,
        }
    }
}

/// Create an arbitrary error that classifies as a transport failure.
/// Useful for testing.
#[cfg(any(test, feature = "test-util"))]
pub fn testing_transport_error() -> TransportError {
    alloy::transports::TransportErrorKind::custom_str("connection refused")
}

/// Create an arbitrary error that classifies as a rejection.
/// Useful for testing.
#[cfg(any(test, feature = "test-util"))]
pub fn testing_rejection_error() -> TransportError {
    RpcError::ErrorResp(alloy::rpc::json_rpc::ErrorPayload {
        code: -32000,
        message: "insufficient funds for gas * price + value".into(),
        data: None,
    })
}

#[cfg(test)]
mod tests {
    use {super::*, alloy::rpc::json_rpc::ErrorPayload};

    #[test]
    fn transport_errors_are_not_rejections() {
        assert!(testing_transport_error().is_transport_failure());
        assert!(!testing_transport_error().is_rejection());
    }

    #[test]
    fn error_responses_are_rejections() {
        assert!(testing_rejection_error().is_rejection());
        assert!(!testing_rejection_error().is_transport_failure());
    }

    #[test]
    fn rate_limits_are_transport_failures() {
        let err: TransportError = RpcError::ErrorResp(ErrorPayload {
            code: 429,
            message: "Too Many Requests".into(),
            data: None,
        });
        assert!(err.is_transport_failure());
    }

    #[test]
    fn null_responses_are_transport_failures() {
        let err: TransportError = RpcError::NullResp;
        assert!(err.is_transport_failure());
    }
}
