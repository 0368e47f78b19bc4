//! A minimal HTTP router: method plus path-pattern matching with `:name` parameters, first match
//! wins, and onion-style middleware composed once when the router is built.
//!
//! The routing core ([`Router`], [`router::Group`], [`middleware`]) knows nothing about sockets;
//! [`Server`] adapts it to HTTP/1.1 connections.

mod body;
mod handler;
mod pattern;
mod request;
mod responder;
mod server;

pub mod error;
pub mod middleware;
pub mod router;

pub use body::ResponseBody;
pub use handler::{BoxedHandler, FnHandler, HandlerFn, RequestHandler, handler_fn};
pub use middleware::{Middleware, Next, middleware_fn};
pub use pattern::PathPattern;
pub use request::{PathParams, RemoteAddr, RequestContext};
pub use responder::{Html, Responder};
pub use router::Router;
pub use server::{Server, ServerBuildError, ServerBuilder, ServerConfig, ServerError};
