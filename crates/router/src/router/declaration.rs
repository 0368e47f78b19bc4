use crate::error::RouteError;
use crate::handler::{BoxedHandler, RequestHandler};
use crate::middleware::{BoxedMiddleware, Middleware};
use http::Method;
use std::fmt;
use std::sync::Arc;

/// A route as declared by the integrator, before it is compiled into the route table.
#[derive(Clone)]
pub struct RouteDeclaration {
    method: Method,
    path: String,
    handler: BoxedHandler,
    middlewares: Vec<BoxedMiddleware>,
}

impl RouteDeclaration {
    pub fn new<H: RequestHandler + 'static>(method: Method, path: impl Into<String>, handler: H) -> Self {
        Self { method, path: path.into(), handler: Arc::new(handler), middlewares: Vec::new() }
    }

    /// Parses a `"METHOD /path"` declaration.
    ///
    /// The method is split off at the first space and upper-cased, the rest is the path pattern.
    pub fn parse<H: RequestHandler + 'static>(declaration: &str, handler: H) -> Result<Self, RouteError> {
        let (method, path) = declaration.split_once(' ').ok_or_else(|| RouteError::invalid_declaration(declaration))?;

        let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
            .map_err(|_| RouteError::invalid_method(method, declaration))?;

        Ok(Self::new(method, path, handler))
    }

    /// Attaches a middleware to this route; middlewares run in attachment order
    pub fn with<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn set_path(&mut self, path: String) {
        self.path = path;
    }

    pub(crate) fn prepend_middlewares(&mut self, middlewares: &[BoxedMiddleware]) {
        self.middlewares.splice(0..0, middlewares.iter().map(Arc::clone));
    }

    pub(crate) fn into_parts(self) -> (Method, String, BoxedHandler, Vec<BoxedMiddleware>) {
        (self.method, self.path, self.handler, self.middlewares)
    }
}

impl fmt::Debug for RouteDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDeclaration")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("middlewares", &self.middlewares.len())
            .finish_non_exhaustive()
    }
}

/// Parses a `"METHOD /path"` declaration, see [`RouteDeclaration::parse`]
pub fn route<H: RequestHandler + 'static>(declaration: &str, handler: H) -> Result<RouteDeclaration, RouteError> {
    RouteDeclaration::parse(declaration, handler)
}

macro_rules! method_route {
    ($method:ident, $upper_case_method:ident) => {
        #[doc = concat!("Declares a ", stringify!($upper_case_method), " route.")]
        pub fn $method<H: RequestHandler + 'static>(path: impl Into<String>, handler: H) -> RouteDeclaration {
            RouteDeclaration::new(Method::$upper_case_method, path, handler)
        }
    };
}

method_route!(get, GET);
method_route!(post, POST);
method_route!(put, PUT);
method_route!(delete, DELETE);
method_route!(head, HEAD);
method_route!(options, OPTIONS);
method_route!(connect, CONNECT);
method_route!(patch, PATCH);
method_route!(trace, TRACE);
