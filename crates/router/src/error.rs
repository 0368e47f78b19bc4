//! Error types of the router.
//!
//! Registration problems are reported through [`RouteError`] and surface synchronously while the
//! router is being assembled. Request time problems never reach the caller as errors: the
//! dispatcher turns every [`DispatchError`] into a response.

use http::Method;
use std::error::Error;
use thiserror::Error;

/// The failure type every handler and middleware returns.
pub type HandlerError = Box<dyn Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum RouteError {
    #[error("invalid path pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("route declaration should be in the form 'METHOD /path', got: '{declaration}'")]
    InvalidDeclaration { declaration: String },

    #[error("invalid http method '{method}' in route declaration '{declaration}'")]
    InvalidMethod { method: String, declaration: String },

    #[error("condition {condition} of group '{group}' has no effect")]
    IneffectiveCondition { group: String, condition: String },

    #[error("basic auth credentials should be in the form 'username:password'")]
    InvalidCredentials,
}

impl RouteError {
    pub fn invalid_pattern<P: ToString, R: ToString>(pattern: P, reason: R) -> Self {
        Self::InvalidPattern { pattern: pattern.to_string(), reason: reason.to_string() }
    }

    pub fn invalid_declaration<S: ToString>(declaration: S) -> Self {
        Self::InvalidDeclaration { declaration: declaration.to_string() }
    }

    pub fn invalid_method<M: ToString, D: ToString>(method: M, declaration: D) -> Self {
        Self::InvalidMethod { method: method.to_string(), declaration: declaration.to_string() }
    }

    pub fn ineffective_condition<G: ToString, C: ToString>(group: G, condition: C) -> Self {
        Self::IneffectiveCondition { group: group.to_string(), condition: condition.to_string() }
    }
}

/// Request time failures, recovered by the dispatcher into a response.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("no route matched {method} {path}")]
    NoRouteMatched { method: Method, path: String },

    #[error("{cause}")]
    HandlerFailure { cause: HandlerError },
}

impl DispatchError {
    pub fn no_route_matched<S: ToString>(method: Method, path: S) -> Self {
        Self::NoRouteMatched { method, path: path.to_string() }
    }

    pub fn handler_failure<E: Into<HandlerError>>(cause: E) -> Self {
        Self::HandlerFailure { cause: cause.into() }
    }
}

#[derive(Error, Debug)]
pub enum BindError {
    #[error("unsupported content type: {content_type}")]
    UnsupportedContentType { content_type: String },

    #[error("invalid json body: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("invalid form body: {source}")]
    Form {
        #[from]
        source: serde_urlencoded::de::Error,
    },
}

impl BindError {
    pub fn unsupported_content_type<S: ToString>(content_type: S) -> Self {
        Self::UnsupportedContentType { content_type: content_type.to_string() }
    }
}
