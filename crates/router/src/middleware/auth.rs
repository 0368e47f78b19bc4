use crate::RequestContext;
use crate::error::{HandlerError, RouteError};
use crate::middleware::{Middleware, Next};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use http::{HeaderValue, StatusCode};
use tracing::debug;

/// HTTP basic authentication against a single `username:password` pair.
#[derive(Debug, Clone)]
pub struct BasicAuth {
    expected: String,
}

impl BasicAuth {
    pub fn new(credentials: &str) -> Result<Self, RouteError> {
        if !credentials.contains(':') {
            return Err(RouteError::InvalidCredentials);
        }
        Ok(Self { expected: STANDARD.encode(credentials) })
    }

    fn reject(ctx: &mut RequestContext) {
        ctx.text(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
}

#[async_trait]
impl Middleware for BasicAuth {
    async fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> Result<(), HandlerError> {
        let Some(provided) = ctx.header(AUTHORIZATION.as_str()).and_then(|auth| auth.strip_prefix("Basic ")) else {
            debug!(path = %ctx.uri().path(), "missing basic credentials");
            Self::reject(ctx);
            ctx.response_mut()
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Basic realm=\"Restricted\""));
            return Ok(());
        };

        if provided != self.expected {
            debug!(path = %ctx.uri().path(), "basic credentials rejected");
            Self::reject(ctx);
            return Ok(());
        }

        next.run(ctx).await
    }
}
