// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use std::fmt;

use http::StatusCode;
use thiserror::Error;

/// The error type for volcsign operations
#[derive(Error, Debug)]
#[error("{message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
    action: Option<String>,
    code: Option<String>,
    request_id: Option<String>,
    status: Option<StatusCode>,
    #[source]
    source: Option<anyhow::Error>,
}

/// The kind of error that occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Credentials exist but are invalid/malformed
    CredentialInvalid,

    /// Request cannot be canonicalized or signed (malformed query, header or path)
    RequestInvalid,

    /// Configuration error (missing fields, invalid values)
    ConfigInvalid,

    /// The network call failed: connection refused, reset, or an undecodable response
    Transport,

    /// The network call did not finish within the caller-specified timeout
    Timeout,

    /// The service reported that the addressed resource does not exist
    NotFound,

    /// The service reported that the resource to create already exists
    AlreadyExists,

    /// The service rejected the signature, the credential or the caller's permissions
    AccessDenied,

    /// Any other error reported by the service in the response envelope
    RemoteApi,

    /// Unexpected errors
    Unexpected,
}

impl Error {
    /// Create a new error with the given kind and message
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            action: None,
            code: None,
            request_id: None,
            status: None,
            source: None,
        }
    }

    /// Add a source error
    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Attach the API action this error belongs to
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Attach the HTTP status of the response
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    /// Attach the request id returned by the service
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The API action that failed, if known
    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    /// The error code reported by the service, only set for remote errors
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// The request id reported by the service
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// The HTTP status of the response, if a response was received
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Check if this is a credential error
    pub fn is_credential_error(&self) -> bool {
        self.kind == ErrorKind::CredentialInvalid
    }

    /// Check if the service itself rejected the request
    pub fn is_remote(&self) -> bool {
        self.code.is_some()
    }

    /// Check if the error happened on the wire and may be retried with backoff
    pub fn is_transport(&self) -> bool {
        matches!(self.kind, ErrorKind::Transport | ErrorKind::Timeout)
    }
}

// Convenience constructors
impl Error {
    /// Create a credential invalid error
    pub fn credential_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CredentialInvalid, message)
    }

    /// Create a request invalid error
    pub fn request_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RequestInvalid, message)
    }

    /// Create a config invalid error
    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigInvalid, message)
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    /// Create an unexpected error
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unexpected, message)
    }

    /// Create an error reported by the remote service.
    ///
    /// The kind is derived from `code` (and `status` when present) so callers can branch on
    /// [`ErrorKind::NotFound`] and friends instead of matching on message text.
    pub fn remote(
        action: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
        status: Option<StatusCode>,
    ) -> Self {
        let action = action.into();
        let code = code.into();
        let message = message.into();

        let mut err = Self::new(
            ErrorKind::from_remote(&code, status),
            format!("{action} failed: {code}: {message}"),
        );
        err.action = Some(action);
        err.code = Some(code);
        err.status = status;
        err
    }
}

impl ErrorKind {
    /// Classify an error code from the response envelope.
    pub fn from_remote(code: &str, status: Option<StatusCode>) -> Self {
        const ACCESS_DENIED_CODES: &[&str] = &[
            "SignatureDoesNotMatch",
            "InvalidAccessKey",
            "InvalidCredential",
            "InvalidAuthorization",
            "AccessDenied",
            "Forbidden",
            "RequestExpired",
            "InvalidTimestamp",
        ];

        if code.contains("NotFound") || code.contains("NotExist") {
            return ErrorKind::NotFound;
        }
        if code.contains("AlreadyExist") {
            return ErrorKind::AlreadyExists;
        }
        if ACCESS_DENIED_CODES.iter().any(|c| code.starts_with(c)) {
            return ErrorKind::AccessDenied;
        }

        match status {
            Some(StatusCode::NOT_FOUND) => ErrorKind::NotFound,
            Some(StatusCode::UNAUTHORIZED) | Some(StatusCode::FORBIDDEN) => ErrorKind::AccessDenied,
            _ => ErrorKind::RemoteApi,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::CredentialInvalid => write!(f, "invalid credentials"),
            ErrorKind::RequestInvalid => write!(f, "invalid request"),
            ErrorKind::ConfigInvalid => write!(f, "invalid configuration"),
            ErrorKind::Transport => write!(f, "transport error"),
            ErrorKind::Timeout => write!(f, "request timed out"),
            ErrorKind::NotFound => write!(f, "resource not found"),
            ErrorKind::AlreadyExists => write!(f, "resource already exists"),
            ErrorKind::AccessDenied => write!(f, "access denied"),
            ErrorKind::RemoteApi => write!(f, "remote api error"),
            ErrorKind::Unexpected => write!(f, "unexpected error"),
        }
    }
}

/// Convenience type alias for Results
pub type Result<T> = std::result::Result<T, Error>;

// Common From implementations
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::unexpected(err.to_string()).with_source(err)
    }
}

impl From<std::fmt::Error> for Error {
    fn from(err: std::fmt::Error) -> Self {
        Self::unexpected(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::Error> for Error {
    fn from(err: http::Error) -> Self {
        Self::request_invalid(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::header::InvalidHeaderValue> for Error {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Self::request_invalid(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::header::InvalidHeaderName> for Error {
    fn from(err: http::header::InvalidHeaderName) -> Self {
        Self::request_invalid(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::header::ToStrError> for Error {
    fn from(err: http::header::ToStrError) -> Self {
        Self::request_invalid(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::uri::InvalidUri> for Error {
    fn from(err: http::uri::InvalidUri) -> Self {
        Self::request_invalid(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::uri::InvalidUriParts> for Error {
    fn from(err: http::uri::InvalidUriParts) -> Self {
        Self::request_invalid(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::method::InvalidMethod> for Error {
    fn from(err: http::method::InvalidMethod) -> Self {
        Self::request_invalid(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::transport(format!("failed to decode json: {err}")).with_source(anyhow::Error::from(err))
    }
}
