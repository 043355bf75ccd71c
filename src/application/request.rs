// ============================================================
// Layer 2 — Encode Requests & Responses
// ============================================================
// The wire shapes of the encode path. A request body is a
// JSON object with one of:
//
//   {"text": "loving it :)"}
//   {"tokens": ["loving", "it", "<smile>"]}
//
// `text` is normalized before tokenizing; `tokens` are taken
// as already normalized. A body with neither key, or with a
// blank value, is rejected with a typed RequestError.
//
// Responses use camelCase keys and always echo the request's
// `text` / `tokens` back under `parameters`:
//
//   ok:    {tokens, wordIds, charIds, tagIds, numTokens, parameters}
//   error: {errorCode, errorMessage, parameters}
//
// Reference: serde crate documentation (rename_all)

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub const NO_TEXT_MESSAGE:      &str = "Text key missing from body of POST request.";
pub const INVALID_TEXT_MESSAGE: &str = "Text must be longer than 0 excluding space characters.";

/// Keys echoed back as `parameters`.
const PARAMETER_KEYS: [&str; 2] = ["text", "tokens"];

// ─── EncodeRequest ────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeRequest {
    Text(String),
    Tokens(Vec<String>),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("Text key missing from body of POST request.")]
    MissingField,

    #[error("{0}")]
    InvalidField(String),
}

impl RequestError {
    pub fn invalid_text() -> Self {
        RequestError::InvalidField(INVALID_TEXT_MESSAGE.to_string())
    }

    pub fn error_code(&self) -> u16 {
        0
    }

    pub fn to_response(&self, parameters: Map<String, Value>) -> ErrorResponse {
        ErrorResponse {
            error_code:    self.error_code(),
            error_message: self.to_string(),
            parameters,
        }
    }
}

/// Validate a raw request body.
pub fn parse_request(body: &str) -> Result<(EncodeRequest, Map<String, Value>), RequestError> {
    let value: Value = serde_json::from_str(body).map_err(|_| RequestError::MissingField)?;
    let object = match value {
        Value::Object(map) => map,
        _ => return Err(RequestError::MissingField),
    };
    let parameters = echo_parameters(&object);

    if let Some(text) = object.get("text") {
        let text = text.as_str().ok_or_else(RequestError::invalid_text)?;
        if text.trim().is_empty() {
            return Err(RequestError::invalid_text());
        }
        return Ok((EncodeRequest::Text(text.to_string()), parameters));
    }

    if let Some(tokens) = object.get("tokens") {
        let list = tokens.as_array().ok_or_else(RequestError::invalid_text)?;
        let tokens = list
            .iter()
            .map(|t| t.as_str().map(str::trim))
            .collect::<Option<Vec<&str>>>()
            .ok_or_else(RequestError::invalid_text)?;
        let tokens: Vec<String> = tokens.into_iter().filter(|t| !t.is_empty()).map(String::from).collect();
        if tokens.is_empty() {
            return Err(RequestError::invalid_text());
        }
        return Ok((EncodeRequest::Tokens(tokens), parameters));
    }

    Err(RequestError::MissingField)
}

/// The subset of `body` that is reported back to the caller.
pub fn echo_parameters(body: &Map<String, Value>) -> Map<String, Value> {
    PARAMETER_KEYS
        .iter()
        .filter_map(|&k| body.get(k).map(|v| (k.to_string(), v.clone())))
        .collect()
}

// ─── Responses ────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodeResponse {
    pub tokens:     Vec<String>,
    pub word_ids:   Vec<usize>,
    pub char_ids:   Vec<Vec<usize>>,
    pub tag_ids:    Vec<usize>,
    pub num_tokens: usize,
    pub parameters: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error_code:    u16,
    pub error_message: String,
    pub parameters:    Map<String, Value>,
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_request() {
        let (req, params) = parse_request(r#"{"text": "hi there", "extra": 1}"#).unwrap();
        assert_eq!(req, EncodeRequest::Text("hi there".into()));
        assert_eq!(params.len(), 1);
        assert_eq!(params["text"], "hi there");
    }

    #[test]
    fn test_tokens_request_drops_blank_tokens() {
        let (req, _) = parse_request(r#"{"tokens": ["a", "  ", "b"]}"#).unwrap();
        assert_eq!(req, EncodeRequest::Tokens(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn test_missing_key() {
        assert_eq!(parse_request(r#"{"body": "x"}"#).unwrap_err(), RequestError::MissingField);
        assert_eq!(parse_request("not json").unwrap_err(),        RequestError::MissingField);
        assert_eq!(parse_request("[1, 2]").unwrap_err(),          RequestError::MissingField);
        assert_eq!(RequestError::MissingField.to_string(), NO_TEXT_MESSAGE);
    }

    #[test]
    fn test_blank_values_are_invalid() {
        for body in [r#"{"text": "   "}"#, r#"{"text": 5}"#, r#"{"tokens": []}"#, r#"{"tokens": [" ", 3]}"#] {
            let err = parse_request(body).unwrap_err();
            assert_eq!(err.to_string(), INVALID_TEXT_MESSAGE, "body {body}");
        }
    }

    #[test]
    fn test_error_response_shape() {
        let mut body = Map::new();
        body.insert("text".into(), Value::String(" ".into()));
        let resp = RequestError::invalid_text().to_response(echo_parameters(&body));
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["errorCode"], 0);
        assert_eq!(json["errorMessage"], INVALID_TEXT_MESSAGE);
        assert_eq!(json["parameters"]["text"], " ");
    }
}
