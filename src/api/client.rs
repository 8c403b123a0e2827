use color_eyre::{eyre::eyre, Result};
use reqwest::{header, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::error::ApiError;
use super::types::{ApiErrorBody, ApiSessionResponse, Credentials, RegisterRequest, User};
use crate::cache::ResourceKey;
use crate::config::Config;
use crate::entity::{EntityKind, Record};

/// Thin HTTP wrapper around the control API.
///
/// All endpoints live under `{base}/api/`. The session cookie set by
/// `login` is kept by the client's cookie store, so clones share the session.
#[derive(Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base: Url,
}

impl ApiClient {
  pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
    let mut base =
      Url::parse(base_url).map_err(|e| eyre!("Invalid API url '{}': {}", base_url, e))?;
    // Url::join replaces the last segment unless the path ends in '/'
    if !base.path().ends_with('/') {
      let path = format!("{}/", base.path());
      base.set_path(&path);
    }

    let mut builder = reqwest::Client::builder().cookie_store(true);
    if let Some(timeout) = timeout {
      builder = builder.timeout(timeout);
    }
    let http = builder
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { http, base })
  }

  pub fn from_config(config: &Config) -> Result<Self> {
    Self::new(&config.api.url, config.api.timeout())
  }

  pub fn base_url(&self) -> &Url {
    &self.base
  }

  fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
    let relative = format!("api/{}", path.trim_start_matches('/'));
    self
      .base
      .join(&relative)
      .map_err(|e| ApiError::InvalidRequest(format!("endpoint {}: {}", relative, e)))
  }

  /// Send a request and decode the JSON response.
  ///
  /// An empty 2xx body decodes as JSON `null`, so `()` and `Value` targets
  /// accept it.
  pub async fn request<T, B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, ApiError>
  where
    T: DeserializeOwned,
    B: Serialize + ?Sized,
  {
    let url = self.endpoint(path)?;
    debug!("{} {}", method, url);

    let mut request = self
      .http
      .request(method.clone(), url.clone())
      .header(header::ACCEPT, "application/json")
      .header(header::CONTENT_TYPE, "application/json");
    if let Some(body) = body {
      request = request.json(body);
    }

    let response = request.send().await?;
    let status = response.status();
    debug!("{} {} -> {}", method, url, status);

    if !status.is_success() {
      return Err(failure(response).await);
    }

    let bytes = response.bytes().await?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
      return serde_json::from_value(Value::Null).map_err(|e| ApiError::Decode(e.to_string()));
    }
    serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
  }

  /// Fetch a whole collection
  pub async fn list(&self, kind: EntityKind) -> Result<Vec<Record>, ApiError> {
    self.list_key(&ResourceKey::from(kind)).await
  }

  /// Fetch a collection, honoring the key's query arguments
  pub async fn list_key(&self, key: &ResourceKey) -> Result<Vec<Record>, ApiError> {
    self.request::<_, ()>(Method::GET, &key.path(), None).await
  }

  pub async fn create(&self, kind: EntityKind, payload: &Map<String, Value>) -> Result<Value, ApiError> {
    self
      .request(Method::POST, kind.resource(), Some(payload))
      .await
  }

  pub async fn update(
    &self,
    kind: EntityKind,
    id: i64,
    payload: &Map<String, Value>,
  ) -> Result<Value, ApiError> {
    let path = format!("{}/{}", kind.resource(), id);
    self.request(Method::PUT, &path, Some(payload)).await
  }

  pub async fn delete(&self, kind: EntityKind, id: i64) -> Result<(), ApiError> {
    let path = format!("{}/{}", kind.resource(), id);
    let _: Value = self.request::<_, ()>(Method::DELETE, &path, None).await?;
    Ok(())
  }

  pub async fn login(&self, credentials: &Credentials) -> Result<User, ApiError> {
    let response: ApiSessionResponse = self
      .request(Method::POST, "login", Some(credentials))
      .await?;
    Ok(response.into_user())
  }

  pub async fn register(&self, user: &RegisterRequest) -> Result<(), ApiError> {
    let _: Value = self.request(Method::POST, "register", Some(user)).await?;
    Ok(())
  }

  pub async fn logout(&self) -> Result<(), ApiError> {
    let _: Value = self.request::<_, ()>(Method::POST, "logout", None).await?;
    Ok(())
  }

  /// The signed-in user, or None when there is no session or the request fails
  pub async fn current_user(&self) -> Option<User> {
    match self
      .request::<ApiSessionResponse, ()>(Method::GET, "user", None)
      .await
    {
      Ok(response) => Some(response.into_user()),
      Err(e) => {
        debug!("no current user: {}", e);
        None
      }
    }
  }
}

/// Turn a non-2xx response into an error, reading the body once.
///
/// JSON bodies surface their `message`; anything else is reported as raw
/// text, or as the status line when the body is empty.
async fn failure(response: reqwest::Response) -> ApiError {
  let status = response.status();
  let is_json = response
    .headers()
    .get(header::CONTENT_TYPE)
    .and_then(|v| v.to_str().ok())
    .is_some_and(|ct| ct.contains("json"));
  let text = response.text().await.unwrap_or_default();

  let message = if is_json {
    serde_json::from_str::<ApiErrorBody>(&text)
      .ok()
      .and_then(|body| body.message)
      .filter(|m| !m.trim().is_empty())
  } else {
    None
  };

  ApiError::RequestFailed {
    status: status.as_u16(),
    message: message.unwrap_or_else(|| fallback_message(status, &text)),
  }
}

fn fallback_message(status: StatusCode, text: &str) -> String {
  let text = text.trim();
  if text.is_empty() {
    status.to_string()
  } else {
    text.to_string()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use wiremock::matchers::{body_json, header as header_matcher, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn client(server: &MockServer) -> ApiClient {
    ApiClient::new(&server.uri(), None).unwrap()
  }

  fn payload(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
  }

  #[test]
  fn test_base_url_keeps_path_prefix() {
    let client = ApiClient::new("http://localhost:3000/sce", None).unwrap();
    assert_eq!(
      client.endpoint("estados").unwrap().as_str(),
      "http://localhost:3000/sce/api/estados"
    );
    assert_eq!(
      client.endpoint("/centros?parroquia_id=2").unwrap().as_str(),
      "http://localhost:3000/sce/api/centros?parroquia_id=2"
    );
  }

  #[test]
  fn test_unjoinable_base_is_not_a_network_error() {
    let client = ApiClient::new("mailto:admin@example.org", None).unwrap();
    let err = client.endpoint("estados").unwrap_err();
    assert!(matches!(err, ApiError::InvalidRequest(_)));
    assert!(!err.is_network());
  }

  #[tokio::test]
  async fn test_requests_without_body_send_json_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/roles"))
      .and(header_matcher("content-type", "application/json"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
      .expect(1)
      .mount(&server)
      .await;
    Mock::given(method("DELETE"))
      .and(path("/api/roles/3"))
      .and(header_matcher("content-type", "application/json"))
      .respond_with(ResponseTemplate::new(204))
      .expect(1)
      .mount(&server)
      .await;

    let client = client(&server);
    assert!(client.list(EntityKind::Roles).await.unwrap().is_empty());
    client.delete(EntityKind::Roles, 3).await.unwrap();
  }

  #[tokio::test]
  async fn test_list_decodes_records() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/estados"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([
        {"id": 1, "nombre": "Zulia", "codigo": "ZU"},
        {"id": 2, "nombre": "Lara", "codigo": "LA"}
      ])))
      .expect(1)
      .mount(&server)
      .await;

    let records = client(&server).list(EntityKind::Estados).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].text("nombre").as_deref(), Some("Lara"));
  }

  #[tokio::test]
  async fn test_create_sends_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/api/estados"))
      .and(header_matcher("content-type", "application/json"))
      .and(body_json(json!({"nombre": "Falcón", "codigo": "FA"})))
      .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 9})))
      .expect(1)
      .mount(&server)
      .await;

    let created = client(&server)
      .create(
        EntityKind::Estados,
        &payload(json!({"nombre": "Falcón", "codigo": "FA"})),
      )
      .await
      .unwrap();
    assert_eq!(created["id"], 9);
  }

  #[tokio::test]
  async fn test_update_and_delete_target_record_path() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
      .and(path("/api/centros/4"))
      .and(body_json(json!({"mesas": 3})))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 4})))
      .expect(1)
      .mount(&server)
      .await;
    Mock::given(method("DELETE"))
      .and(path("/api/centros/4"))
      .respond_with(ResponseTemplate::new(204))
      .expect(1)
      .mount(&server)
      .await;

    let api = client(&server);
    api
      .update(EntityKind::Centros, 4, &payload(json!({"mesas": 3})))
      .await
      .unwrap();
    // Empty body on success is fine
    api.delete(EntityKind::Centros, 4).await.unwrap();
  }

  #[tokio::test]
  async fn test_json_error_surfaces_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/api/register"))
      .respond_with(ResponseTemplate::new(400).set_body_json(json!({"message": "Usuario ya existe"})))
      .mount(&server)
      .await;

    let err = client(&server)
      .register(&RegisterRequest {
        username: "ana".to_string(),
        email: "ana@example.org".to_string(),
        password: "secreto".to_string(),
        nombre: None,
      })
      .await
      .unwrap_err();
    assert_eq!(
      err,
      ApiError::RequestFailed {
        status: 400,
        message: "Usuario ya existe".to_string()
      }
    );
  }

  #[tokio::test]
  async fn test_text_error_surfaces_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/roles"))
      .respond_with(ResponseTemplate::new(500).set_body_string("Internal Error"))
      .mount(&server)
      .await;

    let err = client(&server).list(EntityKind::Roles).await.unwrap_err();
    assert_eq!(err.to_string(), "Internal Error");
    assert_eq!(err.status(), Some(500));
  }

  #[tokio::test]
  async fn test_empty_error_body_uses_status_line() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
      .and(path("/api/roles/1"))
      .respond_with(ResponseTemplate::new(404))
      .mount(&server)
      .await;

    let err = client(&server).delete(EntityKind::Roles, 1).await.unwrap_err();
    assert_eq!(err.to_string(), "404 Not Found");
  }

  #[tokio::test]
  async fn test_json_error_without_message_falls_back_to_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/roles"))
      .respond_with(ResponseTemplate::new(422).set_body_json(json!({"error": "bad"})))
      .mount(&server)
      .await;

    let err = client(&server).list(EntityKind::Roles).await.unwrap_err();
    assert_eq!(err.to_string(), r#"{"error":"bad"}"#);
  }

  #[tokio::test]
  async fn test_login_keeps_session_cookie() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/api/login"))
      .and(body_json(json!({"username": "admin", "password": "clave"})))
      .respond_with(
        ResponseTemplate::new(200)
          .insert_header("set-cookie", "sid=abc123; Path=/")
          .set_body_json(json!({"user": {"id": 1, "username": "admin", "nombre": "Admin"}})),
      )
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/api/user"))
      .and(header_matcher("cookie", "sid=abc123"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "username": "admin"})))
      .mount(&server)
      .await;

    let api = client(&server);
    let user = api
      .login(&Credentials {
        username: "admin".to_string(),
        password: "clave".to_string(),
      })
      .await
      .unwrap();
    assert_eq!(user.display_name(), "Admin");
    assert_eq!(api.current_user().await.map(|u| u.id), Some(1));
  }

  #[tokio::test]
  async fn test_current_user_is_none_when_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/user"))
      .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "No autenticado"})))
      .mount(&server)
      .await;

    assert!(client(&server).current_user().await.is_none());
  }

  #[tokio::test]
  async fn test_current_user_is_none_when_unreachable() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let api = ApiClient::new(&format!("http://127.0.0.1:{}", port), None).unwrap();
    assert!(api.current_user().await.is_none());

    let err = api.list(EntityKind::Estados).await.unwrap_err();
    assert!(err.is_network());
  }
}
