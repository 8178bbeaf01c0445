//! Gateway error taxonomy and its wire projections.

use axum::http::StatusCode;
use thiserror::Error;

/// Every failure the request path can surface to a client.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GatewayError {
    #[error("no model pool registered for type {0}")]
    UnknownModel(u32),

    #[error("model pool for type {0} is disabled")]
    Disabled(u32),

    #[error("all model instances for type {0} are busy")]
    Busy(u32),

    #[error("image payload could not be decoded: {0}")]
    BadImage(String),

    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error("inference failed: {0}")]
    InferenceFailed(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn http_status(&self) -> StatusCode {
        match self {
            GatewayError::UnknownModel(_) => StatusCode::NOT_FOUND,
            GatewayError::Disabled(_) | GatewayError::Busy(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::BadImage(_) | GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::InferenceFailed(_) | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// gRPC status code for the kinds that map to a non-OK status.
    /// `Disabled` and `Busy` are reported in-band (`success=false` with an
    /// OK status), so they have no code here.
    pub fn rpc_code(&self) -> Option<tonic::Code> {
        match self {
            GatewayError::UnknownModel(_) => Some(tonic::Code::NotFound),
            GatewayError::Disabled(_) | GatewayError::Busy(_) => None,
            GatewayError::BadImage(_) | GatewayError::BadRequest(_) => {
                Some(tonic::Code::InvalidArgument)
            }
            GatewayError::InferenceFailed(_) | GatewayError::Internal(_) => {
                Some(tonic::Code::Internal)
            }
        }
    }
}
