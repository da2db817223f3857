//! Basic-auth credentials for read requests

use base64::{prelude::BASE64_STANDARD, Engine};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ApiRequest;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("credential contains {0:?}, which is outside Latin-1 and cannot be encoded")]
    NotLatin1(char),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new("homer", "1234")
    }
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Build the `Authorization` header value: `Basic base64(username:password)`
    ///
    /// The pair is encoded one byte per char like a browser's `btoa`, so any
    /// char above U+00FF is rejected.
    pub fn header_value(&self) -> Result<String, CredentialError> {
        let pair = format!("{}:{}", self.username, self.password);
        let mut bytes = Vec::with_capacity(pair.len());
        for c in pair.chars() {
            let code = u32::from(c);
            if code > 0xFF {
                return Err(CredentialError::NotLatin1(c));
            }
            bytes.push(code as u8);
        }
        Ok(format!("Basic {}", BASE64_STANDARD.encode(bytes)))
    }
}

/// Attach the credential to a request, best effort.
///
/// A credential that cannot be encoded is logged and the request goes out
/// without the header.
pub fn authorize(request: &mut ApiRequest, credentials: Option<&Credentials>) {
    let Some(credentials) = credentials else {
        return;
    };

    match credentials.header_value() {
        Ok(value) => request.authorization = Some(value),
        Err(e) => {
            tracing::warn!("Failed to set authorization header: {}", e);
            request.authorization = None;
        }
    }
}
