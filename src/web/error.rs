use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;

use crate::errors::MarketError;

impl ResponseError for MarketError {
    fn status_code(&self) -> StatusCode {
        match self {
            MarketError::Unauthenticated => StatusCode::UNAUTHORIZED,
            MarketError::NotFound(_) => StatusCode::NOT_FOUND,
            MarketError::ValidationError(_) | MarketError::MissingContactInfo(_) => StatusCode::UNPROCESSABLE_ENTITY,
            MarketError::InvalidCheckoutState(_) | MarketError::InvalidTransition { .. } => StatusCode::CONFLICT,
            MarketError::InvalidSignature(_) => StatusCode::BAD_REQUEST,
            MarketError::MalformedMetadata(_) => StatusCode::INTERNAL_SERVER_ERROR,
            MarketError::PersistenceFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
            MarketError::Forbidden(_) => StatusCode::FORBIDDEN,
            MarketError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, kind = self.kind(), "Responding with server error");
        } else {
            tracing::debug!(error = %self, kind = self.kind(), "Responding with client error");
        }

        // Storage details stay in the logs
        let message = match self {
            MarketError::PersistenceFailure(_) => "storage temporarily unavailable".to_string(),
            other => other.to_string(),
        };

        HttpResponse::build(status).json(json!({
            "error": self.kind(),
            "message": message,
        }))
    }
}
