//! Checkout gateway error types

use std::fmt;

/// Errors that can occur when talking to the remote checkout gateway
#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    /// 401 Unauthorized - token invalid or session expired
    Unauthorized { resource: String },
    /// 403 Forbidden - token lacks required permissions
    Forbidden { resource: String },
    /// 404 Not Found - checkout, cart or consignment no longer exists
    NotFound { resource: String },
    /// 429 Rate Limited
    RateLimited {
        resource: String,
        retry_after_secs: Option<u64>,
    },
    /// Network or timeout error
    NetworkError { resource: String, message: String },
    /// Other non-2xx responses, carrying the platform's human-readable message
    HttpError {
        resource: String,
        status: u16,
        message: String,
    },
    /// Response body could not be decoded
    DecodeError { resource: String, message: String },
}

impl ApiError {
    /// Check if this is an authentication error (401 or 403)
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            ApiError::Unauthorized { .. } | ApiError::Forbidden { .. }
        )
    }

    /// Check if retrying the same call later could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::RateLimited { .. } | ApiError::NetworkError { .. } => true,
            ApiError::HttpError { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Human-readable message suitable for showing to the shopper
    pub fn user_message(&self) -> String {
        match self {
            ApiError::HttpError { message, .. } if !message.is_empty() => message.clone(),
            _ if self.is_auth_error() => {
                "Your checkout session has expired. Please reload the page.".to_string()
            }
            ApiError::NetworkError { .. } => {
                "We could not reach the checkout service. Please try again.".to_string()
            }
            ApiError::RateLimited { .. } => {
                "Too many requests. Please wait a moment and try again.".to_string()
            }
            ApiError::NotFound { .. } => {
                "This checkout has changed. Please refresh and try again.".to_string()
            }
            _ => "Something went wrong with the checkout. Please try again.".to_string(),
        }
    }

    pub fn unauthorized(resource: impl Into<String>) -> Self {
        ApiError::Unauthorized {
            resource: resource.into(),
        }
    }

    pub fn forbidden(resource: impl Into<String>) -> Self {
        ApiError::Forbidden {
            resource: resource.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        ApiError::NotFound {
            resource: resource.into(),
        }
    }

    pub fn rate_limited(resource: impl Into<String>, retry_after: Option<u64>) -> Self {
        ApiError::RateLimited {
            resource: resource.into(),
            retry_after_secs: retry_after,
        }
    }

    pub fn network(resource: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::NetworkError {
            resource: resource.into(),
            message: message.into(),
        }
    }

    pub fn http(resource: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        ApiError::HttpError {
            resource: resource.into(),
            status,
            message: message.into(),
        }
    }

    pub fn decode(resource: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::DecodeError {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Map a non-2xx status and response body onto an error
    ///
    /// The body is searched for the platform's `detail`, `title` or `message`
    /// field; the raw body is used when none is present.
    pub fn from_status(resource: &str, status: u16, body: &str) -> Self {
        match status {
            401 => ApiError::unauthorized(resource),
            403 => ApiError::forbidden(resource),
            404 => ApiError::not_found(resource),
            429 => ApiError::rate_limited(resource, None),
            _ => ApiError::http(resource, status, extract_message(body)),
        }
    }
}

fn extract_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|v| {
            ["detail", "title", "message"]
                .iter()
                .find_map(|key| v.get(key).and_then(|m| m.as_str()))
        })
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string())
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Unauthorized { resource } => write!(f, "{}: Unauthorized (401)", resource),
            ApiError::Forbidden { resource } => {
                write!(f, "{}: Forbidden (403) - insufficient permissions", resource)
            }
            ApiError::NotFound { resource } => write!(f, "{}: Not found (404)", resource),
            ApiError::RateLimited {
                resource,
                retry_after_secs,
            } => {
                if let Some(secs) = retry_after_secs {
                    write!(f, "{}: Rate limited - retry after {}s", resource, secs)
                } else {
                    write!(f, "{}: Rate limited", resource)
                }
            }
            ApiError::NetworkError { resource, message } => {
                write!(f, "{}: Network error - {}", resource, message)
            }
            ApiError::HttpError {
                resource,
                status,
                message,
            } => write!(f, "{}: HTTP {} - {}", resource, status, message),
            ApiError::DecodeError { resource, message } => {
                write!(f, "{}: Invalid response - {}", resource, message)
            }
        }
    }
}

impl std::error::Error for ApiError {}
