//! Response building module that converts values into HTTP responses.
//!
//! The [`Responder`] trait defines how a value becomes a complete response. Handlers use it through
//! [`RequestContext::respond`](crate::RequestContext::respond) and the `text`/`html` shortcuts, and
//! the dispatcher uses it to turn a [`DispatchError`] into the `404`/`500` responses.

use crate::body::ResponseBody;
use crate::error::DispatchError;
use http::header::{CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS};
use http::{HeaderValue, Response, StatusCode};

const TEXT_PLAIN_UTF_8: &str = "text/plain; charset=utf-8";
const TEXT_HTML_UTF_8: &str = "text/html; charset=utf-8";

/// A trait for types that can be converted into HTTP responses.
pub trait Responder {
    fn into_response(self) -> Response<ResponseBody>;
}

/// Markup content, sent as `text/html`.
#[derive(Debug, Clone)]
pub struct Html<T>(pub T);

/// Implementation for Response allows passing through pre-built responses.
impl<B> Responder for Response<B>
where
    B: Into<ResponseBody>,
{
    fn into_response(self) -> Response<ResponseBody> {
        self.map(Into::into)
    }
}

/// Implementation for (StatusCode, T) tuple allows setting a status code
/// along with the response content.
impl<T: Responder> Responder for (StatusCode, T) {
    fn into_response(self) -> Response<ResponseBody> {
        let (status, responder) = self;
        let mut response = responder.into_response();
        *response.status_mut() = status;
        response
    }
}

impl<T: Responder> Responder for Option<T> {
    fn into_response(self) -> Response<ResponseBody> {
        match self {
            Some(t) => t.into_response(),
            None => Response::new(ResponseBody::empty()),
        }
    }
}

impl Responder for () {
    fn into_response(self) -> Response<ResponseBody> {
        Response::new(ResponseBody::empty())
    }
}

impl Responder for &'static str {
    fn into_response(self) -> Response<ResponseBody> {
        with_content_type(ResponseBody::from(self), TEXT_PLAIN_UTF_8)
    }
}

impl Responder for String {
    fn into_response(self) -> Response<ResponseBody> {
        with_content_type(ResponseBody::from(self), TEXT_PLAIN_UTF_8)
    }
}

impl<T: Into<ResponseBody>> Responder for Html<T> {
    fn into_response(self) -> Response<ResponseBody> {
        with_content_type(self.0.into(), TEXT_HTML_UTF_8)
    }
}

impl Responder for DispatchError {
    fn into_response(self) -> Response<ResponseBody> {
        match self {
            DispatchError::NoRouteMatched { .. } => (StatusCode::NOT_FOUND, "404 page not found\n").into_response(),
            DispatchError::HandlerFailure { cause } => {
                let mut response = (StatusCode::INTERNAL_SERVER_ERROR, format!("{cause}\n")).into_response();
                response.headers_mut().insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
                response
            }
        }
    }
}

fn with_content_type(body: ResponseBody, content_type: &'static str) -> Response<ResponseBody> {
    let mut response = Response::new(body);
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}
