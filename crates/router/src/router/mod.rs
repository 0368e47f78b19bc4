//! Route registration, lookup and dispatch.
//!
//! Routes live in a [`RouteTable`] in registration order and are looked up with a linear scan: the
//! first entry whose method and pattern both match wins. Registering the same method and pattern
//! twice is allowed, the later entry is then shadowed by the earlier one.
//!
//! # Example
//!
//! ```
//! use micro_router::error::HandlerError;
//! use micro_router::router::{get, route, Condition, Group};
//! use micro_router::{handler_fn, RequestContext, Router};
//! use http::StatusCode;
//!
//! async fn show_user(ctx: &mut RequestContext) -> Result<(), HandlerError> {
//!     let id = ctx.param("id").unwrap_or_default().to_owned();
//!     ctx.text(StatusCode::OK, format!("user {id}"));
//!     Ok(())
//! }
//!
//! # fn main() -> Result<(), micro_router::error::RouteError> {
//! let router = Router::builder()
//!     .route(route("GET /users/:id", handler_fn(show_user))?)
//!     .group(Group::new("admin").given(Condition::path_prefix("/admin")).route(get("/users/:id", handler_fn(show_user))))?
//!     .build()?;
//!
//! assert_eq!(router.routes().len(), 2);
//! # Ok(())
//! # }
//! ```

mod declaration;
mod group;

pub use declaration::{RouteDeclaration, connect, delete, get, head, options, patch, post, put, route, trace};
pub use group::{Condition, Group};

use crate::body::ResponseBody;
use crate::error::{DispatchError, RouteError};
use crate::handler::{BoxedHandler, RequestHandler};
use crate::middleware::{BoxedMiddleware, Middleware, build_chain};
use crate::pattern::PathPattern;
use crate::request::{PathParams, RequestContext};
use crate::responder::Responder;
use bytes::Bytes;
use futures::FutureExt;
use http::{Method, Request, Response};
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// One registered route.
pub struct RouteEntry {
    method: Method,
    pattern: PathPattern,
    handler: BoxedHandler,
    middlewares: Vec<BoxedMiddleware>,
    chain: BoxedHandler,
}

impl RouteEntry {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    /// Gets the terminal handler of this route
    pub fn handler(&self) -> &dyn RequestHandler {
        self.handler.as_ref()
    }

    /// Gets the route specific middlewares, outermost first
    pub fn middlewares(&self) -> &[BoxedMiddleware] {
        &self.middlewares
    }

    /// Gets the handler composed of global middlewares, route middlewares and the terminal handler
    pub fn chain(&self) -> &dyn RequestHandler {
        self.chain.as_ref()
    }

    fn matches(&self, method: &Method, path: &str) -> Option<PathParams> {
        if !self.method.as_str().eq_ignore_ascii_case(method.as_str()) {
            return None;
        }
        self.pattern.matches(path)
    }
}

impl fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntry")
            .field("method", &self.method)
            .field("pattern", &self.pattern.as_str())
            .field("middlewares", &self.middlewares.len())
            .finish_non_exhaustive()
    }
}

/// Result of a successful lookup: the winning entry and the parameters captured from the path.
#[derive(Debug)]
pub struct RouteMatch<'router> {
    entry: &'router RouteEntry,
    params: PathParams,
}

impl<'router> RouteMatch<'router> {
    pub fn entry(&self) -> &'router RouteEntry {
        self.entry
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    pub fn into_params(self) -> PathParams {
        self.params
    }
}

/// Append-only, ordered collection of routes.
#[derive(Debug, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, entry: RouteEntry) {
        self.entries.push(entry);
    }

    /// Returns the first registered entry matching both `method` and `path`
    pub fn find(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        self.entries
            .iter()
            .find_map(|entry| entry.matches(method, path).map(|params| RouteMatch { entry, params }))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteEntry> {
        self.entries.iter()
    }
}

/// Main router structure that handles HTTP request routing.
///
/// A router is immutable once built; share it through an `Arc` to serve requests concurrently.
pub struct Router {
    table: RouteTable,
    middlewares: Vec<BoxedMiddleware>,
}

impl Router {
    /// Creates a new router builder
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// Matches a request method and path against the registered routes
    pub fn at(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        self.table.find(method, path)
    }

    pub fn routes(&self) -> &RouteTable {
        &self.table
    }

    /// Gets the global middlewares, outermost first
    pub fn middlewares(&self) -> &[BoxedMiddleware] {
        &self.middlewares
    }

    /// Runs `request` through the chain of the first matching route.
    ///
    /// Never fails: an unmatched request becomes a `404` response without entering any chain, and
    /// a chain that fails or panics becomes a `500` response carrying the failure message.
    pub async fn dispatch(&self, request: Request<Bytes>) -> Response<ResponseBody> {
        let Some(route_match) = self.table.find(request.method(), request.uri().path()) else {
            warn!(method = %request.method(), path = %request.uri().path(), "no route matched");
            return DispatchError::no_route_matched(request.method().clone(), request.uri().path()).into_response();
        };

        let entry = route_match.entry();
        debug!(method = %entry.method, pattern = %entry.pattern, path = %request.uri().path(), "route matched");

        let mut ctx = RequestContext::new(request, route_match.into_params());
        let result = AssertUnwindSafe(entry.chain.invoke(&mut ctx))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(panic_message(panic.as_ref()).into()));

        match result {
            Ok(()) => ctx.into_response(),
            Err(cause) => {
                error!(method = %entry.method, pattern = %entry.pattern, cause = %cause, "handler failed");
                DispatchError::handler_failure(cause).into_response()
            }
        }
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router").field("table", &self.table).field("middlewares", &self.middlewares.len()).finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("handler panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("handler panicked: {message}")
    } else {
        "handler panicked".to_string()
    }
}

/// Collects route declarations and global middlewares, then freezes them into a [`Router`].
pub struct RouterBuilder {
    routes: Vec<RouteDeclaration>,
    middlewares: Vec<BoxedMiddleware>,
}

impl RouterBuilder {
    fn new() -> Self {
        Self { routes: Vec::new(), middlewares: Vec::new() }
    }

    pub fn route(mut self, route: RouteDeclaration) -> Self {
        self.routes.push(route);
        self
    }

    pub fn routes(mut self, routes: impl IntoIterator<Item = RouteDeclaration>) -> Self {
        self.routes.extend(routes);
        self
    }

    /// Applies the group's conditions and registers the resulting routes
    pub fn group(mut self, group: Group) -> Result<Self, RouteError> {
        self.routes.extend(group.into_routes()?);
        Ok(self)
    }

    /// Adds a global middleware; the first one added is the outermost layer of every route
    pub fn wrap<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Compiles every pattern, composes every chain and builds the router
    pub fn build(self) -> Result<Router, RouteError> {
        let mut table = RouteTable::new();

        for route in self.routes {
            let (method, path, handler, middlewares) = route.into_parts();
            let pattern = PathPattern::compile(path)?;
            let chain = build_chain(Arc::clone(&handler), &middlewares, &self.middlewares);

            debug!(method = %method, pattern = %pattern, "route registered");
            table.register(RouteEntry { method, pattern, handler, middlewares, chain });
        }

        Ok(Router { table, middlewares: self.middlewares })
    }
}

impl fmt::Debug for RouterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterBuilder")
            .field("routes", &self.routes)
            .field("middlewares", &self.middlewares.len())
            .finish()
    }
}
