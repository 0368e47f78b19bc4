use bytes::Bytes;
use http::{Method, Request, StatusCode};
use micro_router::error::{HandlerError, RouteError};
use micro_router::router::route;
use micro_router::{RequestContext, Router, handler_fn};

#[derive(Debug, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    routes: Vec<String>,
    request: (Method, String),
}

impl TestCase {
    pub fn new(name: &'static str, group: TestGroup, routes: Vec<String>, method: Method, path: &str) -> Self {
        Self { name, group, routes, request: (method, path.to_string()) }
    }

    pub fn small(name: &'static str, routes: Vec<String>, method: Method, path: &str) -> Self {
        Self::new(name, TestGroup::Small, routes, method, path)
    }

    pub fn normal(name: &'static str, routes: Vec<String>, method: Method, path: &str) -> Self {
        Self::new(name, TestGroup::Normal, routes, method, path)
    }

    pub fn large(name: &'static str, routes: Vec<String>, method: Method, path: &str) -> Self {
        Self::new(name, TestGroup::Large, routes, method, path)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    /// Number of registered routes
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    pub fn method(&self) -> &Method {
        &self.request.0
    }

    pub fn path(&self) -> &str {
        &self.request.1
    }

    /// Builds a router where every declaration answers `200 OK`
    pub fn router(&self) -> Result<Router, RouteError> {
        let mut builder = Router::builder();
        for declaration in &self.routes {
            builder = builder.route(route(declaration, handler_fn(ok))?);
        }
        builder.build()
    }

    pub fn request(&self) -> Request<Bytes> {
        let mut request = Request::new(Bytes::new());
        *request.method_mut() = self.request.0.clone();
        // fixture paths are always valid uris
        *request.uri_mut() = self.request.1.parse().unwrap_or_default();
        request
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TestGroup {
    Small,
    Normal,
    Large,
}

async fn ok(ctx: &mut RequestContext) -> Result<(), HandlerError> {
    ctx.text(StatusCode::OK, "ok");
    Ok(())
}

/// A handful of static routes
pub fn static_routes() -> Vec<String> {
    ["GET /", "GET /health", "GET /about", "POST /login", "GET /logout"].map(String::from).to_vec()
}

/// A REST style api with nested parameters
pub fn api_routes() -> Vec<String> {
    let mut routes = Vec::new();
    for resource in ["users", "repos", "orgs", "teams", "issues"] {
        routes.push(format!("GET /{resource}"));
        routes.push(format!("POST /{resource}"));
        routes.push(format!("GET /{resource}/:id"));
        routes.push(format!("PUT /{resource}/:id"));
        routes.push(format!("DELETE /{resource}/:id"));
        routes.push(format!("GET /{resource}/:id/events/:eventId"));
    }
    routes
}

/// `count` distinct parameterized routes
pub fn generated_routes(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("GET /section{i}/:id/item/:itemId")).collect()
}
