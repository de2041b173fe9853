use std::time::Duration;

use reqwest::{Client, Response};
use serde::Deserialize;

use crate::error::{ClientError, Result};

const DISABLE_SYSTEM_PROXY_ENV: &str = "PARLEY_DISABLE_SYSTEM_PROXY";
const MAX_ERROR_BODY: usize = 512;

/// No total timeout is set here: it would also bound streamed bodies.
pub(crate) fn build_http_client(connect_timeout: Duration) -> Result<Client> {
    let mut builder = Client::builder().connect_timeout(connect_timeout);
    if should_disable_system_proxy() {
        builder = builder.no_proxy();
    }
    Ok(builder.build()?)
}

fn should_disable_system_proxy() -> bool {
    if std::env::var_os(DISABLE_SYSTEM_PROXY_ENV).is_some() {
        return true;
    }

    cfg!(test)
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: String,
}

/// Pass 2xx responses through; turn anything else into [`ClientError::Server`].
pub(crate) async fn check_status(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    Err(response_to_error(response).await)
}

pub(crate) async fn response_to_error(response: Response) -> ClientError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();

    ClientError::Server {
        status,
        message: normalize_error_body(status, &body),
    }
}

fn normalize_error_body(status: u16, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body)
        && !parsed.detail.trim().is_empty()
    {
        return parsed.detail;
    }

    let body = body.trim();
    if body.is_empty() {
        return format!("Server error (status {status})");
    }

    // Truncate to keep large HTML error pages out of the transcript.
    if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("Server error (status {status}): {}... [truncated]", &body[..end])
    } else {
        format!("Server error (status {status}): {body}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_is_preferred() {
        let message = normalize_error_body(500, r#"{"detail":"Error processing message: boom"}"#);
        assert_eq!(message, "Error processing message: boom");
    }

    #[test]
    fn test_empty_body_gets_generic_message() {
        assert_eq!(normalize_error_body(502, "  "), "Server error (status 502)");
    }

    #[test]
    fn test_plain_body_is_kept() {
        assert_eq!(
            normalize_error_body(503, "upstream unavailable"),
            "Server error (status 503): upstream unavailable"
        );
    }

    #[test]
    fn test_long_body_is_truncated_on_char_boundary() {
        let body = "é".repeat(400);
        let message = normalize_error_body(500, &body);
        assert!(message.ends_with("... [truncated]"));
        assert!(message.len() < body.len());
    }
}
