//! Request handling module that provides access to HTTP request information and path parameters.
//!
//! This module contains the per request types of the router:
//! - `RequestContext`: owns the inbound request, the extracted path parameters, a key/value store
//!   shared by the middlewares of one request, and the outbound response
//! - `PathParams`: the named values captured from the request path

use crate::body::ResponseBody;
use crate::error::BindError;
use crate::responder::{Html, Responder};
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{Extensions, HeaderMap, HeaderValue, Method, Request, Response, StatusCode, Uri, Version};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

/// Peer address of the connection a request arrived on, stored in the request extensions by the
/// server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteAddr(pub SocketAddr);

/// The context of one request.
///
/// A context is created by the dispatcher for every matched request and dropped once the response
/// has been taken out of it. It is never shared between requests, so nothing in it is synchronized.
pub struct RequestContext {
    request: Request<Bytes>,
    path_params: PathParams,
    store: HashMap<String, Box<dyn Any + Send + Sync>>,
    response: Response<ResponseBody>,
}

impl RequestContext {
    /// Creates a new RequestContext with the given request and path parameters
    pub fn new(request: Request<Bytes>, path_params: PathParams) -> Self {
        Self { request, path_params, store: HashMap::new(), response: Response::new(ResponseBody::empty()) }
    }

    /// Returns the inbound request
    pub fn request(&self) -> &Request<Bytes> {
        &self.request
    }

    /// Returns the HTTP method of the request
    pub fn method(&self) -> &Method {
        self.request.method()
    }

    /// Returns the URI of the request
    pub fn uri(&self) -> &Uri {
        self.request.uri()
    }

    /// Returns the HTTP version of the request
    pub fn version(&self) -> Version {
        self.request.version()
    }

    /// Returns the HTTP headers of the request
    pub fn headers(&self) -> &HeaderMap {
        self.request.headers()
    }

    /// Returns the request extensions, the channel through which the transport hands over
    /// connection data such as [`RemoteAddr`] or a deadline
    pub fn extensions(&self) -> &Extensions {
        self.request.extensions()
    }

    /// Returns the raw request body
    pub fn body(&self) -> &Bytes {
        self.request.body()
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.extensions().get::<RemoteAddr>().map(|addr| addr.0)
    }

    /// Returns a reference to the path parameters extracted from the request URL
    pub fn path_params(&self) -> &PathParams {
        &self.path_params
    }

    /// Returns the value of a path parameter, as it appeared in the path
    pub fn param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name)
    }

    /// Returns the first decoded value of a query parameter
    pub fn query(&self, name: &str) -> Option<String> {
        let query = self.uri().query()?;
        first_value(query.as_bytes(), name)
    }

    /// Returns the first value of a form field, looking at an url-encoded body before the query
    pub fn form(&self, name: &str) -> Option<String> {
        if self.content_type_is(&mime::APPLICATION_WWW_FORM_URLENCODED) {
            if let Some(value) = first_value(self.body(), name) {
                return Some(value);
            }
        }
        self.query(name)
    }

    /// Returns a request header as a string, `None` if it is absent or not visible ascii
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers().get(name).and_then(|value| value.to_str().ok())
    }

    /// Deserializes the request body according to its content type.
    ///
    /// `application/json` and `application/x-www-form-urlencoded` are supported.
    pub fn bind<T: DeserializeOwned>(&self) -> Result<T, BindError> {
        if self.content_type_is(&mime::APPLICATION_JSON) {
            return Ok(serde_json::from_slice(self.body())?);
        }

        if self.content_type_is(&mime::APPLICATION_WWW_FORM_URLENCODED) {
            return Ok(serde_urlencoded::from_bytes(self.body())?);
        }

        Err(BindError::unsupported_content_type(self.header(CONTENT_TYPE.as_str()).unwrap_or_default()))
    }

    fn content_type_is(&self, expected: &mime::Mime) -> bool {
        self.header(CONTENT_TYPE.as_str())
            .and_then(|value| value.parse::<mime::Mime>().ok())
            .is_some_and(|mime| mime.essence_str() == expected.essence_str())
    }

    /// Stores a value for the middlewares and handler further down the chain
    pub fn set<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.store.insert(key.into(), Box::new(value));
    }

    /// Returns a stored value if it exists and has type `T`
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.store.get(key).and_then(|value| value.downcast_ref::<T>())
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.store.remove(key).is_some()
    }

    /// Returns the response written so far
    pub fn response(&self) -> &Response<ResponseBody> {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Response<ResponseBody> {
        &mut self.response
    }

    /// Replaces the response with the one produced by `responder`
    pub fn respond<R: Responder>(&mut self, responder: R) {
        self.response = responder.into_response();
    }

    /// Writes a `text/plain` response
    pub fn text(&mut self, status: StatusCode, text: impl Into<String>) {
        self.respond((status, text.into()));
    }

    /// Writes a `text/html` response
    pub fn html(&mut self, status: StatusCode, html: impl Into<String>) {
        self.respond((status, Html(html.into())));
    }

    /// Writes an `application/json` response, leaving the current response untouched if `value`
    /// cannot be serialized
    pub fn json<T: Serialize + ?Sized>(&mut self, status: StatusCode, value: &T) -> Result<(), serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        let mut response = Response::new(ResponseBody::once(Bytes::from(body)));
        *response.status_mut() = status;
        response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.response = response;
        Ok(())
    }

    /// Consumes the context and returns the response
    pub fn into_response(self) -> Response<ResponseBody> {
        self.response
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("method", self.method())
            .field("uri", self.uri())
            .field("path_params", &self.path_params)
            .field("store_keys", &self.store.keys().collect::<Vec<_>>())
            .field("status", &self.response.status())
            .finish_non_exhaustive()
    }
}

fn first_value(input: &[u8], name: &str) -> Option<String> {
    serde_urlencoded::from_bytes::<Vec<(String, String)>>(input)
        .ok()?
        .into_iter()
        .find_map(|(key, value)| (key == name).then_some(value))
}

/// Represents path parameters extracted from the URL path of an HTTP request.
///
/// Path parameters are named segments in the URL path that can be accessed by name. For example,
/// in the pattern "/users/:id", "id" is a path parameter. Keys are unique and values are kept
/// exactly as they appeared in the path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    params: Vec<(Arc<str>, String)>,
}

impl PathParams {
    #[inline]
    pub(crate) fn new(params: Vec<(Arc<str>, String)>) -> Self {
        Self { params }
    }

    /// Creates an empty PathParams instance with no parameters
    #[inline]
    pub fn empty() -> Self {
        Self { params: Vec::new() }
    }

    /// Returns true if there are no path parameters
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Returns the number of path parameters
    #[inline]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Gets the value of a path parameter by its name
    /// Returns None if the parameter doesn't exist
    #[inline]
    pub fn get(&self, key: impl AsRef<str>) -> Option<&str> {
        let key = key.as_ref();
        self.params.iter().find(|(name, _)| name.as_ref() == key).map(|(_, value)| value.as_str())
    }

    /// Iterates over `(name, value)` pairs in pattern order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(name, value)| (name.as_ref(), value.as_str()))
    }
}
