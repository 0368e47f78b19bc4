//! Middlewares wrap a handler with behavior that runs before and after it.
//!
//! A middleware receives the request context together with [`Next`], the rest of the chain. It may
//! run code, call [`Next::run`] once, run more code on the way out, or return without calling it at
//! all, which short-circuits every layer further in, including the terminal handler.
//!
//! Chains are composed by [`build_chain`]; the first global middleware is the outermost layer.

mod auth;
mod chain;
mod rate_limit;

pub use auth::BasicAuth;
pub use chain::build_chain;
pub use rate_limit::RateLimit;

use crate::RequestContext;
use crate::error::HandlerError;
use crate::handler::{BoxedHandler, RequestHandler};
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> Result<(), HandlerError>;
}

pub type BoxedMiddleware = Arc<dyn Middleware>;

#[async_trait]
impl<T: Middleware + ?Sized> Middleware for Arc<T> {
    async fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> Result<(), HandlerError> {
        self.as_ref().handle(ctx, next).await
    }
}

/// The remaining layers of a chain, as seen from one middleware.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    inner: &'a dyn RequestHandler,
}

impl<'a> Next<'a> {
    pub(crate) fn new(inner: &'a dyn RequestHandler) -> Self {
        Self { inner }
    }

    /// Runs the rest of the chain
    pub async fn run(self, ctx: &mut RequestContext) -> Result<(), HandlerError> {
        self.inner.invoke(ctx).await
    }
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next").finish_non_exhaustive()
    }
}

/// Wraps `inner` with `middleware`, producing the handler of the combined layer.
pub fn wrap(middleware: BoxedMiddleware, inner: BoxedHandler) -> BoxedHandler {
    Arc::new(Layer { middleware, inner })
}

struct Layer {
    middleware: BoxedMiddleware,
    inner: BoxedHandler,
}

#[async_trait]
impl RequestHandler for Layer {
    async fn invoke(&self, ctx: &mut RequestContext) -> Result<(), HandlerError> {
        self.middleware.handle(ctx, Next::new(self.inner.as_ref())).await
    }
}

/// An async fn middleware, see [`HandlerFn`](crate::handler::HandlerFn).
pub trait MiddlewareFn<'a>: Send + Sync {
    type Future: Future<Output = Result<(), HandlerError>> + Send + 'a;

    fn call(&self, ctx: &'a mut RequestContext, next: Next<'a>) -> Self::Future;
}

impl<'a, F, Fut> MiddlewareFn<'a> for F
where
    F: Fn(&'a mut RequestContext, Next<'a>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'a,
{
    type Future = Fut;

    #[inline]
    fn call(&self, ctx: &'a mut RequestContext, next: Next<'a>) -> Self::Future {
        (self)(ctx, next)
    }
}

pub struct FnMiddleware<F> {
    f: F,
}

/// Turns `async fn(&mut RequestContext, Next<'_>) -> Result<(), HandlerError>` into a middleware
pub fn middleware_fn<F>(f: F) -> FnMiddleware<F>
where
    F: for<'a> MiddlewareFn<'a>,
{
    FnMiddleware { f }
}

#[async_trait]
impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> MiddlewareFn<'a> + Send + Sync,
{
    async fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> Result<(), HandlerError> {
        self.f.call(ctx, next).await
    }
}

impl<F> fmt::Debug for FnMiddleware<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnMiddleware").field("f", &std::any::type_name::<F>()).finish()
    }
}
