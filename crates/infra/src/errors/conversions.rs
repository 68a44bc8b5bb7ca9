//! Conversions from external infrastructure errors into domain errors.

use flowsync_domain::ApiError;
use reqwest::Error as HttpError;
use serde_json::Error as JsonError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub ApiError);

impl From<InfraError> for ApiError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<ApiError> for InfraError {
    fn from(value: ApiError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoApiError {
    fn into_api_error(self) -> ApiError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → ApiError */
/* -------------------------------------------------------------------------- */

impl IntoApiError for HttpError {
    fn into_api_error(self) -> ApiError {
        if self.is_timeout() {
            return ApiError::Network("HTTP request timed out".into());
        }

        #[cfg(not(target_arch = "wasm32"))]
        if self.is_connect() {
            return ApiError::Network(format!("HTTP connection failure: {self}"));
        }

        if self.is_decode() || self.is_body() {
            return ApiError::Parse(format!("failed to read response body: {self}"));
        }

        if self.is_builder() {
            return ApiError::Config(format!("invalid HTTP request: {self}"));
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                401 | 403 => ApiError::Auth { status: code, message },
                404 => ApiError::NotFound { resource: None, message },
                429 => ApiError::RateLimited {
                    retry_after_secs: flowsync_domain::constants::DEFAULT_RETRY_AFTER_SECS,
                    message,
                },
                500..=599 => ApiError::Server { status: code, message },
                _ => ApiError::Api { status: code, message },
            };
        }

        ApiError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_api_error())
    }
}

/* -------------------------------------------------------------------------- */
/* serde_json::Error → ApiError */
/* -------------------------------------------------------------------------- */

impl IntoApiError for JsonError {
    fn into_api_error(self) -> ApiError {
        ApiError::Parse(format!("invalid JSON at line {} column {}: {self}", self.line(), self.column()))
    }
}

impl From<JsonError> for InfraError {
    fn from(value: JsonError) -> Self {
        InfraError(value.into_api_error())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
