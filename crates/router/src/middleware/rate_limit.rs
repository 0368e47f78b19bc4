//! Fixed window rate limiting per client.

use crate::RequestContext;
use crate::error::HandlerError;
use crate::middleware::{Middleware, Next};
use async_trait::async_trait;
use http::StatusCode;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::net::IpAddr;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::warn;

struct Window {
    requests: u32,
    started: Instant,
}

/// Admits at most `limit` requests per client within each window.
///
/// Clients are keyed by peer ip. The counters are shared by every request going through the same
/// instance, so one `RateLimit` wrapped in an `Arc` can guard several routes.
///
/// The first request of a client without a tracked window is always admitted, even with a `limit`
/// of zero. Elapsed windows are evicted, at most once per window length.
#[derive(Debug)]
pub struct RateLimit {
    limit: u32,
    window: Duration,
    clients: Mutex<Clients>,
}

#[derive(Debug)]
struct Clients {
    windows: HashMap<Option<IpAddr>, Window>,
    swept: Instant,
}

impl RateLimit {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window, clients: Mutex::new(Clients { windows: HashMap::new(), swept: Instant::now() }) }
    }

    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    /// Counts one request for `client`, returns false if the client is over its limit
    fn try_acquire(&self, client: Option<IpAddr>, now: Instant) -> bool {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);

        if now.saturating_duration_since(clients.swept) > self.window {
            let window = self.window;
            clients.windows.retain(|_, tracked| now.saturating_duration_since(tracked.started) <= window);
            clients.swept = now;
        }

        let tracked = match clients.windows.entry(client) {
            Entry::Vacant(vacant) => {
                vacant.insert(Window { requests: 1, started: now });
                return true;
            }
            Entry::Occupied(occupied) => occupied.into_mut(),
        };

        if now.saturating_duration_since(tracked.started) > self.window {
            tracked.requests = 0;
            tracked.started = now;
        }

        if tracked.requests >= self.limit {
            return false;
        }
        tracked.requests += 1;
        true
    }

    #[cfg(test)]
    fn tracked_clients(&self) -> usize {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner).windows.len()
    }
}

impl std::fmt::Debug for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Window").field("requests", &self.requests).finish_non_exhaustive()
    }
}

#[async_trait]
impl Middleware for RateLimit {
    async fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> Result<(), HandlerError> {
        let client = ctx.remote_addr().map(|addr| addr.ip());
        if !self.try_acquire(client, Instant::now()) {
            warn!(client = ?client, limit = self.limit, "rate limit exceeded");
            ctx.text(StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded");
            return Ok(());
        }
        next.run(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::RateLimit;
    use crate::error::HandlerError;
    use crate::handler::{BoxedHandler, RequestHandler, handler_fn};
    use crate::middleware::build_chain;
    use crate::request::{PathParams, RemoteAddr, RequestContext};
    use bytes::Bytes;
    use http::{Request, StatusCode};
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    async fn ok(ctx: &mut RequestContext) -> Result<(), HandlerError> {
        ctx.text(StatusCode::OK, "ok");
        Ok(())
    }

    async fn status(chain: &dyn RequestHandler, client: &str) -> StatusCode {
        let mut request = Request::get("/").body(Bytes::new()).unwrap();
        request.extensions_mut().insert(RemoteAddr(client.parse().unwrap()));

        let mut ctx = RequestContext::new(request, PathParams::empty());
        chain.invoke(&mut ctx).await.unwrap();
        ctx.response().status()
    }

    fn chain(limiter: RateLimit) -> BoxedHandler {
        let terminal: BoxedHandler = Arc::new(handler_fn(ok));
        build_chain(terminal, &[Arc::new(limiter)], &[])
    }

    #[tokio::test]
    async fn test_limit_per_client() {
        let chain = chain(RateLimit::per_minute(2));

        assert_eq!(status(chain.as_ref(), "10.0.0.1:1000").await, StatusCode::OK);
        // another port of the same host counts towards the same client
        assert_eq!(status(chain.as_ref(), "10.0.0.1:2000").await, StatusCode::OK);
        assert_eq!(status(chain.as_ref(), "10.0.0.1:3000").await, StatusCode::TOO_MANY_REQUESTS);

        assert_eq!(status(chain.as_ref(), "10.0.0.2:1000").await, StatusCode::OK);
    }

    #[test]
    fn test_window_reset() {
        let limiter = RateLimit::new(1, Duration::from_secs(10));
        let client = Some("10.0.0.1".parse().unwrap());
        let start = Instant::now();

        assert!(limiter.try_acquire(client, start));
        assert!(!limiter.try_acquire(client, start + Duration::from_secs(5)));
        assert!(!limiter.try_acquire(client, start + Duration::from_secs(10)));
        assert!(limiter.try_acquire(client, start + Duration::from_secs(11)));
        assert!(!limiter.try_acquire(client, start + Duration::from_secs(12)));
    }

    #[test]
    fn test_elapsed_windows_are_evicted() {
        let limiter = RateLimit::per_minute(5);
        let start = Instant::now();

        for i in 0..10_000u32 {
            let client = Some(IpAddr::from(Ipv4Addr::from(i)));
            assert!(limiter.try_acquire(client, start));
        }
        assert_eq!(limiter.tracked_clients(), 10_000);

        let active = Some("10.0.0.1".parse().unwrap());
        assert!(limiter.try_acquire(active, start + Duration::from_secs(3600)));
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn test_live_windows_survive_eviction() {
        let limiter = RateLimit::new(1, Duration::from_secs(10));
        let start = Instant::now();
        let stale = Some("10.0.0.1".parse().unwrap());
        let live = Some("10.0.0.2".parse().unwrap());

        assert!(limiter.try_acquire(stale, start));
        assert!(limiter.try_acquire(live, start + Duration::from_secs(8)));
        assert!(limiter.try_acquire(Some("10.0.0.3".parse().unwrap()), start + Duration::from_secs(15)));

        assert_eq!(limiter.tracked_clients(), 2);
        assert!(!limiter.try_acquire(live, start + Duration::from_secs(16)));
    }

    #[test]
    fn test_first_request_admitted_with_zero_limit() {
        let limiter = RateLimit::per_minute(0);
        let client = Some("10.0.0.1".parse().unwrap());
        let start = Instant::now();

        assert!(limiter.try_acquire(client, start));
        assert!(!limiter.try_acquire(client, start + Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn test_shared_across_concurrent_requests() {
        let chain = chain(RateLimit::per_minute(10));

        let tasks = (0..50)
            .map(|i| {
                let chain = Arc::clone(&chain);
                tokio::spawn(async move { status(chain.as_ref(), &format!("10.0.0.1:{}", 1000 + i)).await })
            })
            .collect::<Vec<_>>();

        let mut admitted = 0;
        for task in tasks {
            if task.await.unwrap() == StatusCode::OK {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 10);
    }
}
