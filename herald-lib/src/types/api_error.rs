//! Decoding of structured error bodies.
//!
//! The API answers rejected requests with a body of the shape
//! `{ "message": string, "code": int, "errors": tree }` where the optional
//! `errors` tree mirrors the shape of the submitted payload. Leaves are either
//! `{ "_errors": [{ "message": ... }] }`, `{ "code": ..., "message": ... }` or
//! plain strings.

use http::Method;
use reqwest::Response;
use serde_json::{Map, Value};

use super::{ApiError, ErrorKind, TransportError, TransportErrorKind, is_json};

impl ApiError {
    /// Turn a rejected response into an error.
    ///
    /// A JSON body that can't be parsed, or a body that can't be read at
    /// all, is reported as a [`TransportError`] instead.
    pub(crate) async fn from_response(response: Response, method: &Method, path: &str) -> ErrorKind {
        let status = response.status().as_u16();
        let json = is_json(&response);
        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => return TransportError::from_reqwest(&e, method, path).into(),
        };

        if !json {
            return Self::from_text(path, method, status, &String::from_utf8_lossy(&bytes)).into();
        }

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(body) => Self::from_body(path, method, status, &body).into(),
            Err(e) => {
                TransportError::new(TransportErrorKind::Decode, method, path, Some(status), e).into()
            }
        }
    }

    /// Build an [`ApiError`] from a decoded error body.
    pub(crate) fn from_body(path: &str, method: &Method, http_status: u16, body: &Value) -> Self {
        let field_errors = match body.get("errors") {
            Some(errors) => flatten_errors(errors),
            None => flatten_errors(body),
        };
        let top = body.get("message").and_then(Value::as_str).unwrap_or_default();
        let flattened = field_errors.join("\n");
        let message = match (top.is_empty(), flattened.is_empty()) {
            (false, false) => format!("{top}\n{flattened}"),
            (false, true) => top.to_string(),
            _ => flattened,
        };

        Self {
            path: path.to_string(),
            method: method.clone(),
            http_status,
            code: body.get("code").and_then(Value::as_u64).unwrap_or_default(),
            message,
            field_errors,
        }
    }

    /// Build an [`ApiError`] for a rejection whose body is not JSON.
    pub(crate) fn from_text(path: &str, method: &Method, http_status: u16, text: &str) -> Self {
        Self {
            path: path.to_string(),
            method: method.clone(),
            http_status,
            code: 0,
            message: text.trim().to_string(),
            field_errors: Vec::new(),
        }
    }
}

/// Flatten a nested error tree into `<path>: <message>` lines.
///
/// Object keys are joined with `.`, numeric keys (array indices or
/// numeric object keys) with `[index]`.
#[must_use]
pub fn flatten_errors(tree: &Value) -> Vec<String> {
    let mut messages = Vec::new();
    match tree {
        Value::Object(map) => flatten_object(map, "", &mut messages),
        Value::Array(items) => flatten_array(items, "", &mut messages),
        _ => {}
    }
    messages
}

fn flatten_object(map: &Map<String, Value>, key: &str, messages: &mut Vec<String>) {
    for (k, v) in map {
        if k == "message" {
            continue;
        }
        flatten_entry(&child_key(key, k), v, messages);
    }
}

fn flatten_array(items: &[Value], key: &str, messages: &mut Vec<String>) {
    for (index, v) in items.iter().enumerate() {
        flatten_entry(&child_key(key, &index.to_string()), v, messages);
    }
}

fn flatten_entry(key: &str, value: &Value, messages: &mut Vec<String>) {
    if let Some(errors) = value.get("_errors").filter(|e| is_truthy(e)) {
        let joined = errors
            .as_array()
            .map(|errors| {
                errors
                    .iter()
                    .filter_map(|e| e.get("message").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();
        messages.push(format!("{key}: {joined}"));
        return;
    }

    let code = value.get("code").filter(|c| is_truthy(c));
    let message = value.get("message").filter(|m| is_truthy(m));
    if code.is_some() || message.is_some() {
        let prefix = code.map(|c| format!("{}: ", display(c))).unwrap_or_default();
        let message = message.map(display).unwrap_or_default();
        messages.push(format!("{prefix}{message}").trim().to_string());
        return;
    }

    match value {
        Value::String(s) => messages.push(s.clone()),
        Value::Object(map) => flatten_object(map, key, messages),
        Value::Array(items) => flatten_array(items, key, messages),
        _ => {}
    }
}

fn child_key(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else if key.parse::<f64>().is_ok() {
        format!("{parent}[{key}]")
    } else {
        format!("{parent}.{key}")
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_flatten_nested_field_errors() {
        let body = json!({
            "message": "Invalid Form Body",
            "code": 50035,
            "errors": {
                "embed": {
                    "fields": {
                        "0": {
                            "name": {"_errors": [{"code": "BASE_TYPE_MAX_LENGTH", "message": "too long"}]}
                        }
                    }
                }
            }
        });

        let error = ApiError::from_body("/channels/1/messages", &Method::POST, 400, &body);
        assert_eq!(error.code, 50035);
        assert_eq!(error.http_status, 400);
        assert_eq!(error.field_errors, vec!["embed.fields[0].name: too long"]);
        assert_eq!(
            error.message,
            "Invalid Form Body\nembed.fields[0].name: too long"
        );
    }

    #[test]
    fn test_flatten_array_and_multiple_messages() {
        let tree = json!({
            "content": {"_errors": [{"message": "first"}, {"message": "second"}]},
            "roles": [{"_errors": [{"message": "unknown role"}]}]
        });
        assert_eq!(
            flatten_errors(&tree),
            vec!["content: first second", "roles[0]: unknown role"]
        );
    }

    #[test]
    fn test_flatten_code_message_and_string_leaves() {
        let tree = json!({
            "a": {"code": 10003, "message": "Unknown Channel"},
            "b": {"message": "just a message"},
            "c": "plain string"
        });
        assert_eq!(
            flatten_errors(&tree),
            vec!["10003: Unknown Channel", "just a message", "plain string"]
        );
    }

    #[test]
    fn test_message_without_errors() {
        let body = json!({"message": "Missing Access", "code": 50001});
        let error = ApiError::from_body("/guilds/1", &Method::GET, 403, &body);
        assert!(error.field_errors.is_empty());
        assert_eq!(error.message, "Missing Access");
        assert_eq!(error.code, 50001);
    }

    #[test]
    fn test_non_json_rejection() {
        let error = ApiError::from_text("/x", &Method::GET, 404, " Not Found \n");
        assert_eq!(error.code, 0);
        assert_eq!(error.message, "Not Found");
    }
}
