//! Route groups and the conditions applied to them.
//!
//! A [`Group`] bundles several declarations with shared [`Condition`]s and middlewares. Conditions
//! are pure transformations over the declared routes and run exactly once, when the group is
//! handed to the [`RouterBuilder`](super::RouterBuilder), never per request.

use super::RouteDeclaration;
use crate::error::RouteError;
use crate::middleware::{BoxedMiddleware, Middleware};
use http::Method;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// Mounts every route of the group below `prefix`
    PathPrefix(String),
    /// Keeps only the routes declared with one of these methods
    Methods(Vec<Method>),
}

impl Condition {
    pub fn path_prefix(prefix: impl Into<String>) -> Self {
        Self::PathPrefix(prefix.into())
    }

    pub fn methods(methods: impl IntoIterator<Item = Method>) -> Self {
        Self::Methods(methods.into_iter().collect())
    }

    fn apply(&self, group: &str, routes: Vec<RouteDeclaration>) -> Result<Vec<RouteDeclaration>, RouteError> {
        match self {
            Condition::PathPrefix(prefix) => {
                let prefix = prefix.trim_end_matches('/');
                if prefix.is_empty() {
                    return Err(RouteError::ineffective_condition(group, self));
                }
                if !prefix.starts_with('/') {
                    return Err(RouteError::invalid_pattern(prefix, "path prefix must start with '/'"));
                }

                routes
                    .into_iter()
                    .map(|mut route| {
                        if !route.path().starts_with('/') {
                            return Err(RouteError::invalid_pattern(route.path(), "pattern must start with '/'"));
                        }
                        let path = if route.path() == "/" { prefix.to_owned() } else { format!("{prefix}{}", route.path()) };
                        route.set_path(path);
                        Ok(route)
                    })
                    .collect()
            }
            Condition::Methods(methods) => {
                if methods.is_empty() {
                    return Err(RouteError::ineffective_condition(group, self));
                }
                Ok(routes.into_iter().filter(|route| methods.contains(route.method())).collect())
            }
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::PathPrefix(prefix) => write!(f, "path_prefix('{prefix}')"),
            Condition::Methods(methods) => {
                let methods = methods.iter().map(Method::as_str).collect::<Vec<_>>();
                write!(f, "methods({})", methods.join(", "))
            }
        }
    }
}

/// A named set of routes sharing conditions and middlewares.
pub struct Group {
    name: String,
    conditions: Vec<Condition>,
    middlewares: Vec<BoxedMiddleware>,
    routes: Vec<RouteDeclaration>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), conditions: Vec::new(), middlewares: Vec::new(), routes: Vec::new() }
    }

    /// Adds a condition; conditions are applied in the order they are given
    pub fn given(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Adds a middleware that wraps every route of the group, outside the route's own middlewares
    pub fn with<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    pub fn route(mut self, route: RouteDeclaration) -> Self {
        self.routes.push(route);
        self
    }

    pub fn routes(mut self, routes: impl IntoIterator<Item = RouteDeclaration>) -> Self {
        self.routes.extend(routes);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Applies the conditions and middlewares, returning the effective declarations
    pub(crate) fn into_routes(self) -> Result<Vec<RouteDeclaration>, RouteError> {
        let mut routes = self.routes;
        for condition in &self.conditions {
            routes = condition.apply(&self.name, routes)?;
        }

        for route in &mut routes {
            route.prepend_middlewares(&self.middlewares);
        }

        debug!(group = %self.name, routes = routes.len(), "group applied");
        Ok(routes)
    }
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("name", &self.name)
            .field("conditions", &self.conditions)
            .field("middlewares", &self.middlewares.len())
            .field("routes", &self.routes)
            .finish()
    }
}
