use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    RateLimited,
    Server,
    Network,
    Timeout,
    Client,
    Deserialize,
    Cancelled,
    Unknown,
}

impl FetchErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            FetchErrorKind::RateLimited
                | FetchErrorKind::Server
                | FetchErrorKind::Network
                | FetchErrorKind::Timeout
        )
    }
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} returned {status}: {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
        retry_after: Option<u64>,
    },

    #[error("failed to parse response from {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("request to {url} cancelled")]
    Cancelled { url: String },
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::Status { status, .. } => classify_status(*status),
            FetchError::Transport { source, .. } => {
                if source.is_timeout() {
                    FetchErrorKind::Timeout
                } else if source.is_connect() || source.is_body() || source.is_request() {
                    FetchErrorKind::Network
                } else if source.is_decode() {
                    FetchErrorKind::Deserialize
                } else {
                    FetchErrorKind::Unknown
                }
            }
            FetchError::Parse { .. } => FetchErrorKind::Deserialize,
            FetchError::Cancelled { .. } => FetchErrorKind::Cancelled,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    pub fn retry_after(&self) -> Option<u64> {
        match self {
            FetchError::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

pub fn classify_status(status: StatusCode) -> FetchErrorKind {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return FetchErrorKind::RateLimited;
    }
    if status == StatusCode::REQUEST_TIMEOUT {
        return FetchErrorKind::Timeout;
    }
    if status.is_server_error() {
        return FetchErrorKind::Server;
    }
    if status.is_client_error() {
        return FetchErrorKind::Client;
    }
    FetchErrorKind::Unknown
}
