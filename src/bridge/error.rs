//! Bridge error types.

use axum::http::StatusCode;
use thiserror::Error;

use crate::bridge::request::DecodeError;
use crate::bridge::response::PseudoResponse;
use crate::bridge::scope::ScopeError;
use crate::bridge::session::SessionState;

/// A request rejected by the bridge before reaching the pipeline.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RejectError {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("path restriction: {0}")]
    Scope(#[from] ScopeError),
}

impl RejectError {
    /// Status of the synthetic response sent in place of a pipeline answer.
    pub fn status(&self) -> StatusCode {
        match self {
            RejectError::Decode(_) | RejectError::Scope(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Label used in logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            RejectError::Decode(_) => "decode",
            RejectError::Scope(_) => "scope",
        }
    }

    pub fn to_response(&self) -> PseudoResponse {
        PseudoResponse::error(self.status(), self.to_string())
    }
}

/// Errors raised by an exchange session.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("illegal session transition from {from:?} to {to:?}")]
    IllegalTransition { from: SessionState, to: SessionState },

    #[error("connection writer closed")]
    WriterClosed,
}
