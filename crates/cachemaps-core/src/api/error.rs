use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("No imagery for this request: {0}")]
    NotFound(String),

    #[error("Rate limited by the map service")]
    RateLimited,

    #[error("Map service rejected the key: {0}")]
    AccessDenied(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl FetchError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!(
                "{}... (truncated, {} total bytes)",
                &body[..end],
                body.len()
            )
        }
    }

    pub fn from_status(status: u16, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status {
            401 | 403 => FetchError::AccessDenied(truncated),
            404 => FetchError::NotFound(truncated),
            429 => FetchError::RateLimited,
            500..=599 => FetchError::ServerError(truncated),
            _ => FetchError::Status {
                status,
                body: truncated,
            },
        }
    }
}
