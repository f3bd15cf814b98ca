use reqwest::StatusCode;
use thiserror::Error;

/// Classified failure of an external action connector.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectorError {
    #[error("not authenticated: {0}")]
    NotAuthenticated(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("{0}")]
    Other(String),
}

impl ConnectorError {
    pub fn from_status(status: StatusCode, body: impl Into<String>) -> Self {
        let body = body.into();
        let detail = if body.trim().is_empty() {
            format!("HTTP {status}")
        } else {
            format!("HTTP {status}: {body}")
        };
        match status.as_u16() {
            401 => Self::NotAuthenticated(detail),
            403 => Self::PermissionDenied(detail),
            404 => Self::NotFound(detail),
            408 | 504 => Self::Timeout(detail),
            _ => Self::Other(detail),
        }
    }

    /// Reads a non-success response body and classifies it.
    pub async fn from_response(resp: reqwest::Response) -> Self {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        Self::from_status(status, body)
    }
}

impl From<reqwest::Error> for ConnectorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout(err.to_string());
        }
        match err.status() {
            Some(status) => Self::from_status(status, err.to_string()),
            None => Self::Other(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ConnectorError {
    fn from(err: serde_json::Error) -> Self {
        Self::Other(format!("invalid response: {err}"))
    }
}

/// Failure to deliver an outbound message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// Provider rate limit; the reply should be replayed on the next inbound call.
    #[error("delivery throttled: {0}")]
    Throttled(String),
    #[error("delivery failed: {0}")]
    Failed(String),
}

impl DeliveryError {
    pub fn is_throttled(&self) -> bool {
        matches!(self, Self::Throttled(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_status_classifies_auth_scope_and_missing() {
        assert!(matches!(
            ConnectorError::from_status(StatusCode::UNAUTHORIZED, "expired"),
            ConnectorError::NotAuthenticated(_)
        ));
        assert!(matches!(
            ConnectorError::from_status(StatusCode::FORBIDDEN, "scope"),
            ConnectorError::PermissionDenied(_)
        ));
        assert!(matches!(
            ConnectorError::from_status(StatusCode::NOT_FOUND, ""),
            ConnectorError::NotFound(_)
        ));
        assert!(matches!(
            ConnectorError::from_status(StatusCode::GATEWAY_TIMEOUT, ""),
            ConnectorError::Timeout(_)
        ));
        assert!(matches!(
            ConnectorError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "boom"),
            ConnectorError::Other(_)
        ));
    }

    #[test]
    fn from_status_keeps_body_in_detail() {
        let err = ConnectorError::from_status(StatusCode::BAD_REQUEST, "bad field");
        assert_eq!(err.to_string(), "HTTP 400 Bad Request: bad field");
        let err = ConnectorError::from_status(StatusCode::BAD_REQUEST, "  ");
        assert_eq!(err.to_string(), "HTTP 400 Bad Request");
    }

    #[test]
    fn delivery_error_throttled_flag() {
        assert!(DeliveryError::Throttled("63038".into()).is_throttled());
        assert!(!DeliveryError::Failed("x".into()).is_throttled());
    }
}
