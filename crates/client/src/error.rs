// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Categorized API error taxonomy for the client SDK.
//!
//! Callers branch on the category, not on transport details: credential and
//! network failures propagate to the call site, session expiry is handled
//! globally by the interceptor, and cache failures never surface at all.

use std::fmt;

/// Error returned by every SDK operation that talks to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Login rejected by the backend; message is surfaced verbatim.
    Credential(String),
    /// The request could not complete (DNS, connect, timeout, bad body).
    Network(String),
    /// An authenticated call returned 401. Recovery has already been
    /// triggered globally; this error is inert at the call site.
    SessionExpired,
    /// 403 from the backend; session state is untouched.
    Forbidden(String),
    /// 5xx from the backend.
    Server(String),
    /// Any other backend rejection, propagated unchanged.
    Rejected { status: u16, message: String },
}

impl ApiError {
    /// Stable category string for logging and UI dispatch.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Credential(_) => "credential",
            Self::Network(_) => "network",
            Self::SessionExpired => "session_expired",
            Self::Forbidden(_) => "forbidden",
            Self::Server(_) => "server",
            Self::Rejected { .. } => "rejected",
        }
    }

    /// True when the caller should show the message as-is to the user.
    pub fn is_user_visible(&self) -> bool {
        matches!(self, Self::Credential(_) | Self::Forbidden(_) | Self::Server(_))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Credential(msg) => write!(f, "login failed: {msg}"),
            Self::Network(msg) => write!(f, "network error: {msg}"),
            Self::SessionExpired => f.write_str("session expired"),
            Self::Forbidden(msg) => write!(f, "forbidden: {msg}"),
            Self::Server(msg) => write!(f, "server error: {msg}"),
            Self::Rejected { status, message } => write!(f, "request rejected ({status}): {message}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
