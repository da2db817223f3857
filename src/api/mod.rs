pub mod auth;
pub mod http;

use reqwest::{Method, StatusCode};
use serde::{Deserialize, Deserializer, Serialize};
use std::future::Future;
use thiserror::Error;

/// A user record as returned by the server.
///
/// Every attribute is optional: the detail endpoint omits `age`, and the
/// server is the only authority on what a user looks like.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(default, deserialize_with = "opaque_text", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "opaque_text", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "opaque_text", skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "opaque_text", skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "opaque_text", skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
}

/// Body of create and update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserForm {
    pub name: String,
    pub age: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub username: String,
    pub password: String,
    pub name: String,
    pub email: String,
}

/// Ids and ages come back as strings or numbers depending on the server.
/// Both are kept as text.
fn opaque_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Opaque {
        Text(String),
        Int(i64),
        Float(f64),
        Bool(bool),
    }

    Ok(Option::<Opaque>::deserialize(deserializer)?.map(|value| match value {
        Opaque::Text(s) => s,
        Opaque::Int(n) => n.to_string(),
        Opaque::Float(n) => n.to_string(),
        Opaque::Bool(b) => b.to_string(),
    }))
}

/// Request paths, relative to the base url
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    /// GET, collection read
    pub list: String,
    /// GET, single-record read
    pub detail: String,
    /// POST, create
    pub collection: String,
    /// PUT/DELETE, `{id}` is replaced with the user id
    pub item: String,
    /// POST, registration
    pub register: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        // The server mixes `/api/user/` and `/api/users/`; both are kept as-is.
        Self {
            list: "/api/user/".to_string(),
            detail: "/api/user/".to_string(),
            collection: "/api/users/".to_string(),
            item: "/api/users/{id}/".to_string(),
            register: "/api/user/register/".to_string(),
        }
    }
}

impl Endpoints {
    pub fn item_path(&self, id: &str) -> String {
        self.item.replace("{id}", id)
    }
}

/// One outgoing HTTP request
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
    pub authorization: Option<String>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            authorization: None,
        }
    }

    /// Attach a JSON body (sent with `Content-Type: application/json`)
    pub fn json<B: Serialize>(mut self, body: &B) -> Self {
        match serde_json::to_value(body) {
            Ok(value) => self.body = Some(value),
            Err(e) => tracing::error!("Failed to encode request body for {}: {}", self.path, e),
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Network-level failures. Any HTTP status, including 4xx/5xx, is a response,
/// not an error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else {
            TransportError::Request(e.to_string())
        }
    }
}

/// Sends one request and yields its response.
pub trait Transport: Send + Sync + 'static {
    fn send(
        &self,
        request: ApiRequest,
    ) -> impl Future<Output = Result<ApiResponse, TransportError>> + Send;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_accepts_numeric_id_and_missing_age() {
        let user: User = serde_json::from_str(
            r#"{"id": 5, "name": "Homer Simpson", "email": "homer@x.com", "username": "homer"}"#,
        )
        .unwrap();

        assert_eq!(user.id.as_deref(), Some("5"));
        assert_eq!(user.username.as_deref(), Some("homer"));
        assert!(user.age.is_none());
    }

    #[test]
    fn test_user_ignores_unknown_fields_and_nulls() {
        let user: User =
            serde_json::from_str(r#"{"name": null, "age": "39", "password": "1234"}"#).unwrap();

        assert!(user.name.is_none());
        assert_eq!(user.age.as_deref(), Some("39"));
    }

    #[test]
    fn test_default_endpoints() {
        let endpoints = Endpoints::default();
        assert_eq!(endpoints.list, "/api/user/");
        assert_eq!(endpoints.collection, "/api/users/");
        assert_eq!(endpoints.item_path("5"), "/api/users/5/");
        assert_eq!(endpoints.register, "/api/user/register/");
    }

    #[test]
    fn test_request_json_body() {
        let form = UserForm {
            name: "Marge".to_string(),
            age: "36".to_string(),
        };
        let request = ApiRequest::new(Method::POST, "/api/users/").json(&form);

        assert_eq!(
            request.body,
            Some(serde_json::json!({"name": "Marge", "age": "36"}))
        );
    }

    #[test]
    fn test_request_body_keeps_field_order() {
        let registration = Registration {
            username: "homer".to_string(),
            password: "1234".to_string(),
            name: "Homer".to_string(),
            email: "homer@x.com".to_string(),
        };
        let request = ApiRequest::new(Method::POST, "/api/user/register/").json(&registration);

        assert_eq!(
            serde_json::to_string(&request.body).unwrap(),
            r#"{"username":"homer","password":"1234","name":"Homer","email":"homer@x.com"}"#
        );

        let form = UserForm {
            name: "Marge".to_string(),
            age: "36".to_string(),
        };
        let request = ApiRequest::new(Method::POST, "/api/users/").json(&form);
        assert_eq!(
            serde_json::to_string(&request.body).unwrap(),
            r#"{"name":"Marge","age":"36"}"#
        );
    }
}
