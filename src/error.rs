//! # Errors
//!
//! Every failure in halnav is a value. Callers branch on [`Error::code`]
//! instead of matching on message text:
//!
//! ```text
//! 0000  no endpoint configured          0020  action has no URL
//! 0001  homepage fetch failed           0021  action fetch failed
//! 0002  homepage body not JSON          0030  response body invalid JSON
//! 0011  request timeout                 0031  response body already consumed
//! ```
//!
//! An error that came out of an HTTP exchange keeps the response in `xhr`.
//! A timeout never has one, which is how "never got a response" is told
//! apart from "got an error response".

use std::fmt;

use crate::transport::Response;

/// Stable four-digit error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The client was created without an endpoint.
    NoEndpoint,
    /// The homepage request got a non-2xx answer (or none at all).
    HomepageFailed,
    /// The homepage body was not a JSON object.
    HomepageInvalid,
    /// The request did not settle before its timeout.
    Timeout,
    /// The action resolved to an empty URL.
    NoActionUrl,
    /// The action request got a non-2xx answer (or none at all).
    ActionFailed,
    /// A response body could not be parsed as JSON.
    InvalidJson,
    /// A response body was read twice.
    StreamUsed,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::NoEndpoint => "0000",
            ErrorCode::HomepageFailed => "0001",
            ErrorCode::HomepageInvalid => "0002",
            ErrorCode::Timeout => "0011",
            ErrorCode::NoActionUrl => "0020",
            ErrorCode::ActionFailed => "0021",
            ErrorCode::InvalidJson => "0030",
            ErrorCode::StreamUsed => "0031",
        }
    }

    fn message(self) -> &'static str {
        match self {
            ErrorCode::NoEndpoint => "API endpoint was not provided",
            ErrorCode::HomepageFailed => "Failed to retrieve homepage",
            ErrorCode::HomepageInvalid => "Could not parse homepage",
            ErrorCode::Timeout => "Fetch timeout",
            ErrorCode::NoActionUrl => "Url is not provided for this action",
            ErrorCode::ActionFailed => "Failed to retrieve action",
            ErrorCode::InvalidJson => "Response is invalid JSON",
            ErrorCode::StreamUsed => "Stream already used",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure carried by every `Err` in this crate.
#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub msg: String,
    /// Name of the action that failed, when an action was involved.
    pub action: Option<String>,
    /// Timeout in milliseconds, set on `0011`.
    pub timeout: Option<u64>,
    /// Raw body text, set on `0030`.
    pub text: Option<String>,
    /// The HTTP response that caused the failure, if there was one.
    pub xhr: Option<Response>,
}

impl Error {
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            msg: code.message().to_string(),
            action: None,
            timeout: None,
            text: None,
            xhr: None,
        }
    }

    pub fn timeout(ms: u64) -> Self {
        Self {
            timeout: Some(ms),
            ..Self::new(ErrorCode::Timeout)
        }
    }

    pub fn with_action(mut self, name: impl Into<String>) -> Self {
        self.action = Some(name.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_xhr(mut self, response: Response) -> Self {
        self.xhr = Some(response);
        self
    }

    /// The response attached to this error, if any.
    pub fn response(&self) -> Option<&Response> {
        self.xhr.as_ref()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.msg)?;
        if let Some(action) = &self.action {
            write!(f, " (action: {action})")?;
        }
        if let Some(response) = &self.xhr {
            write!(f, " (HTTP {})", response.status())?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
