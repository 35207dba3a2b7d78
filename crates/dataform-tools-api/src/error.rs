//! API errors

use serde::Deserialize;
use std::fmt;

/// Canonical Google RPC status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcCode {
    Ok,
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    DataLoss,
    Unauthenticated,
}

impl RpcCode {
    const ALL: [RpcCode; 17] = [
        Self::Ok,
        Self::Cancelled,
        Self::Unknown,
        Self::InvalidArgument,
        Self::DeadlineExceeded,
        Self::NotFound,
        Self::AlreadyExists,
        Self::PermissionDenied,
        Self::ResourceExhausted,
        Self::FailedPrecondition,
        Self::Aborted,
        Self::OutOfRange,
        Self::Unimplemented,
        Self::Internal,
        Self::Unavailable,
        Self::DataLoss,
        Self::Unauthenticated,
    ];

    /// Numeric code, e.g. 6 for `ALREADY_EXISTS`
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        usize::try_from(code).ok().and_then(|i| Self::ALL.get(i).copied())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Cancelled => "CANCELLED",
            Self::Unknown => "UNKNOWN",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Self::NotFound => "NOT_FOUND",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::ResourceExhausted => "RESOURCE_EXHAUSTED",
            Self::FailedPrecondition => "FAILED_PRECONDITION",
            Self::Aborted => "ABORTED",
            Self::OutOfRange => "OUT_OF_RANGE",
            Self::Unimplemented => "UNIMPLEMENTED",
            Self::Internal => "INTERNAL",
            Self::Unavailable => "UNAVAILABLE",
            Self::DataLoss => "DATA_LOSS",
            Self::Unauthenticated => "UNAUTHENTICATED",
        }
    }

    /// Parse a status name such as `ALREADY_EXISTS`
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == name)
    }

    /// Best-effort mapping of an HTTP status when the body carries no status name
    pub fn from_http_status(status: u16) -> Self {
        match status {
            200..=299 => Self::Ok,
            400 => Self::InvalidArgument,
            401 => Self::Unauthenticated,
            403 => Self::PermissionDenied,
            404 => Self::NotFound,
            409 => Self::AlreadyExists,
            429 => Self::ResourceExhausted,
            499 => Self::Cancelled,
            501 => Self::Unimplemented,
            503 => Self::Unavailable,
            504 => Self::DeadlineExceeded,
            500..=599 => Self::Internal,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for RpcCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_str(), self.code())
    }
}

/// Errors returned by the Dataform API client
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A required argument was empty; raised before any request is sent
    #[error("{0}")]
    MissingArgument(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Network error: {0}")]
    Network(String),

    /// The API answered with an error status
    #[error("Dataform API error {code}: {message}")]
    Rpc {
        code: RpcCode,
        http_status: u16,
        message: String,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    pub fn missing(message: impl Into<String>) -> Self {
        Self::MissingArgument(message.into())
    }

    pub fn rpc(code: RpcCode, message: impl Into<String>) -> Self {
        Self::Rpc {
            code,
            http_status: 0,
            message: message.into(),
        }
    }

    /// RPC status code, for errors reported by the API
    pub fn rpc_code(&self) -> Option<RpcCode> {
        match self {
            Self::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_already_exists(&self) -> bool {
        self.rpc_code() == Some(RpcCode::AlreadyExists)
    }

    /// Build an error from an HTTP error response. Google APIs answer with
    /// `{"error": {"code": 409, "message": "...", "status": "ALREADY_EXISTS"}}`.
    pub fn from_response(http_status: u16, body: &str) -> Self {
        #[derive(Deserialize)]
        struct Envelope {
            error: Status,
        }

        #[derive(Deserialize)]
        struct Status {
            #[serde(default)]
            message: String,
            #[serde(default)]
            status: Option<String>,
        }

        match serde_json::from_str::<Envelope>(body) {
            Ok(Envelope { error }) => Self::Rpc {
                code: error
                    .status
                    .as_deref()
                    .and_then(RpcCode::from_name)
                    .unwrap_or_else(|| RpcCode::from_http_status(http_status)),
                http_status,
                message: error.message,
            },
            Err(_) => Self::Rpc {
                code: RpcCode::from_http_status(http_status),
                http_status,
                message: body.trim().to_string(),
            },
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::InvalidResponse(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidResponse(e.to_string())
    }
}
