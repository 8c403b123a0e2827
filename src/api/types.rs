//! Serde types for the session endpoints.
//!
//! Entity records are generic (see `entity::Record`); only the session
//! payloads have fixed shapes.

use serde::{Deserialize, Serialize};

/// The signed-in user as returned by `/api/login` and `/api/user`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
  pub id: i64,
  pub username: String,
  #[serde(default)]
  pub email: Option<String>,
  #[serde(default)]
  pub nombre: Option<String>,
  #[serde(default)]
  pub role_id: Option<i64>,
}

impl User {
  /// Name shown in the header
  pub fn display_name(&self) -> &str {
    self
      .nombre
      .as_deref()
      .filter(|n| !n.trim().is_empty())
      .unwrap_or(&self.username)
  }
}

/// Body of `POST /api/login`
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
  pub username: String,
  pub password: String,
}

/// Body of `POST /api/register`
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
  pub username: String,
  pub email: String,
  pub password: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub nombre: Option<String>,
}

/// Login responses come either as the bare user or wrapped with session info.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ApiSessionResponse {
  Wrapped { user: User },
  Bare(User),
}

impl ApiSessionResponse {
  pub(crate) fn into_user(self) -> User {
    match self {
      ApiSessionResponse::Wrapped { user } => user,
      ApiSessionResponse::Bare(user) => user,
    }
  }
}

/// Error body shape used by the API for rejected requests
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
  pub message: Option<String>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_session_response_accepts_both_shapes() {
    let bare: ApiSessionResponse =
      serde_json::from_str(r#"{"id": 1, "username": "admin"}"#).unwrap();
    assert_eq!(bare.into_user().username, "admin");

    let wrapped: ApiSessionResponse =
      serde_json::from_str(r#"{"user": {"id": 2, "username": "ana", "nombre": "Ana"}}"#).unwrap();
    let user = wrapped.into_user();
    assert_eq!(user.id, 2);
    assert_eq!(user.display_name(), "Ana");
  }

  #[test]
  fn test_display_name_falls_back_to_username() {
    let user = User {
      id: 1,
      username: "admin".to_string(),
      email: None,
      nombre: Some("  ".to_string()),
      role_id: None,
    };
    assert_eq!(user.display_name(), "admin");
  }
}
