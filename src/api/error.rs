//! Error kinds surfaced by the API client.

use thiserror::Error;

/// Failure of a request against the control API.
///
/// Clone is required so a single in-flight fetch can hand the same outcome to
/// every consumer waiting on it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
  /// The server answered with a non-2xx status
  #[error("{message}")]
  RequestFailed { status: u16, message: String },

  /// No response could be obtained (DNS, refused connection, timeout...)
  #[error("network unavailable: {0}")]
  NetworkUnavailable(String),

  /// A 2xx response carried a body we could not decode
  #[error("invalid response: {0}")]
  Decode(String),

  /// The request could not be built, so nothing was sent
  #[error("invalid request: {0}")]
  InvalidRequest(String),
}

impl ApiError {
  /// HTTP status for server rejections
  pub fn status(&self) -> Option<u16> {
    match self {
      ApiError::RequestFailed { status, .. } => Some(*status),
      _ => None,
    }
  }

  pub fn is_network(&self) -> bool {
    matches!(self, ApiError::NetworkUnavailable(_))
  }
}

impl From<reqwest::Error> for ApiError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_decode() {
      ApiError::Decode(e.to_string())
    } else {
      ApiError::NetworkUnavailable(e.to_string())
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_request_failed_displays_message_verbatim() {
    let err = ApiError::RequestFailed {
      status: 400,
      message: "Usuario ya existe".to_string(),
    };
    assert_eq!(err.to_string(), "Usuario ya existe");
    assert_eq!(err.status(), Some(400));
    assert!(!err.is_network());
  }

  #[test]
  fn test_network_error_has_no_status() {
    let err = ApiError::NetworkUnavailable("connection refused".to_string());
    assert_eq!(err.status(), None);
    assert!(err.is_network());
  }
}
