use serde::Deserialize;

/// Client-side API error.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP {status} {code}: {message}")]
    Server {
        status: u16,
        code: String,
        message: String,
    },

    #[error("network: {0}")]
    Network(#[from] reqwest::Error),

    #[error("auth: {0}")]
    Auth(String),

    #[error("decode: {0}")]
    Decode(String),
}

/// Server error body: `{code, message, errors?}`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ErrorBody {
    code: String,
    message: String,
}

impl ApiError {
    /// Build a `Server` error from a non-success status and its body.
    pub(crate) fn from_body(status: u16, body: &str) -> Self {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_else(|_| ErrorBody {
            code: String::new(),
            message: body.to_string(),
        });
        ApiError::Server {
            status,
            code: parsed.code,
            message: parsed.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_error_body_is_parsed() {
        let err = ApiError::from_body(404, r#"{"code":"NOT_FOUND","message":"user u1"}"#);
        match err {
            ApiError::Server { status, code, message } => {
                assert_eq!(status, 404);
                assert_eq!(code, "NOT_FOUND");
                assert_eq!(message, "user u1");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn non_json_body_becomes_message() {
        let err = ApiError::from_body(502, "bad gateway");
        assert_eq!(err.to_string(), "HTTP 502 : bad gateway");
    }
}
