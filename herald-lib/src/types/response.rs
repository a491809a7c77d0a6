use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::Method;
use reqwest::Response;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::types::{Result, TransportError, TransportErrorKind};

/// The decoded body of a successful API call
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// A structured JSON payload
    Json(Value),
    /// Binary content, e.g. an image
    Binary(Bytes),
    /// The response had no body (e.g. `204 No Content`)
    Empty,
}

impl ResponseBody {
    /// Decode a [`Response`] according to its content type.
    pub(crate) async fn from_response(response: Response, method: &Method, path: &str) -> Result<Self> {
        let is_json = is_json(&response);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::from_reqwest(&e, method, path))?;

        if bytes.is_empty() {
            Ok(Self::Empty)
        } else if is_json {
            let value = serde_json::from_slice(&bytes).map_err(|e| {
                TransportError::new(TransportErrorKind::Decode, method, path, None, e)
            })?;
            Ok(Self::Json(value))
        } else {
            Ok(Self::Binary(bytes))
        }
    }

    /// Decode the JSON payload into `T`.
    ///
    /// An empty body is decoded as JSON `null`, so `Option<T>` and `()`
    /// targets accept it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ErrorKind::Json`] if the body is binary or
    /// doesn't match `T`.
    pub fn json<T: DeserializeOwned>(self) -> Result<T> {
        match self {
            Self::Json(value) => Ok(serde_json::from_value(value)?),
            Self::Empty => Ok(serde_json::from_value(Value::Null)?),
            Self::Binary(bytes) => Ok(serde_json::from_slice(&bytes)?),
        }
    }

    /// Returns the JSON payload, if any
    #[must_use]
    pub const fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Returns `true` if the response had no body
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

pub(crate) fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Channel {
        id: String,
        name: String,
    }

    #[test]
    fn test_json_decoding() {
        let body = ResponseBody::Json(json!({"id": "1", "name": "general"}));
        let channel: Channel = body.json().unwrap();
        assert_eq!(
            channel,
            Channel {
                id: "1".into(),
                name: "general".into()
            }
        );
    }

    #[test]
    fn test_empty_decodes_as_null() {
        let unit: Option<Channel> = ResponseBody::Empty.json().unwrap();
        assert!(unit.is_none());
        assert!(ResponseBody::Empty.is_empty());
    }

    #[test]
    fn test_binary_is_not_json() {
        let body = ResponseBody::Binary(Bytes::from_static(&[0x89, 0x50, 0x4e, 0x47]));
        assert!(body.as_json().is_none());
        assert!(body.json::<Channel>().is_err());
    }
}
