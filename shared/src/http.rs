//! HTTP helpers for Lambda functions.

use lambda_http::{Body, Response};
use serde::Serialize;

use crate::models::Item;
use crate::{Error, Result};

/// Body returned for every failed request.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl From<&Error> for ErrorBody {
    fn from(error: &Error) -> Self {
        let id = match error {
            Error::NotFound(id) => Some(id.clone()),
            _ => None,
        };

        Self {
            message: error.to_string(),
            id,
        }
    }
}

/// Create a JSON response with the given status code and data.
pub fn json_response<T: Serialize>(status: u16, data: &T) -> Result<Response<Body>> {
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(data)?))
        .map_err(|e| Error::Internal(format!("Failed to build response: {}", e)))
}

/// Create an error response carrying the error's status code and message.
pub fn error_response(error: &Error) -> Result<Response<Body>> {
    json_response(error.status_code(), &ErrorBody::from(error))
}

/// Parse a request body as a JSON object; an empty body is an empty object.
pub fn parse_item(body: &Body) -> Result<Item> {
    let bytes: &[u8] = body.as_ref();
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Item::new());
    }

    serde_json::from_slice(bytes)
        .map_err(|e| Error::validation(format!("Invalid request body: {}", e)))
}
