use crate::RequestContext;
use crate::error::HandlerError;
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// The terminal step of a route, and the shape every middleware layer takes once composed.
///
/// A handler writes its response into the [`RequestContext`] and signals completion or failure.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn invoke(&self, ctx: &mut RequestContext) -> Result<(), HandlerError>;
}

pub type BoxedHandler = Arc<dyn RequestHandler>;

#[async_trait]
impl<T: RequestHandler + ?Sized> RequestHandler for Arc<T> {
    async fn invoke(&self, ctx: &mut RequestContext) -> Result<(), HandlerError> {
        self.as_ref().invoke(ctx).await
    }
}

/// An async fn taking the request context, for every lifetime of the borrow.
///
/// This is implemented for `async fn(&mut RequestContext) -> Result<(), HandlerError>`; it only
/// exists to name the future such a fn returns.
pub trait HandlerFn<'a>: Send + Sync {
    type Future: Future<Output = Result<(), HandlerError>> + Send + 'a;

    fn call(&self, ctx: &'a mut RequestContext) -> Self::Future;
}

impl<'a, F, Fut> HandlerFn<'a> for F
where
    F: Fn(&'a mut RequestContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'a,
{
    type Future = Fut;

    #[inline]
    fn call(&self, ctx: &'a mut RequestContext) -> Self::Future {
        (self)(ctx)
    }
}

/// a [`HandlerFn`] holder which represents any async fn handler
pub struct FnHandler<F> {
    f: F,
}

pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: for<'a> HandlerFn<'a>,
{
    FnHandler { f }
}

#[async_trait]
impl<F> RequestHandler for FnHandler<F>
where
    F: for<'a> HandlerFn<'a> + Send + Sync,
{
    async fn invoke(&self, ctx: &mut RequestContext) -> Result<(), HandlerError> {
        self.f.call(ctx).await
    }
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").field("f", &std::any::type_name::<F>()).finish()
    }
}
