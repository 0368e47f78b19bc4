use crate::handler::BoxedHandler;
use crate::middleware::{BoxedMiddleware, wrap};
use std::sync::Arc;

/// Composes `terminal` with the route and global middlewares into one handler.
///
/// Route middlewares are applied from last to first around the terminal handler, then the global
/// middlewares from last to first around that, so a request travels
/// `global[0] -> global[1] -> .. -> route[0] -> route[1] -> .. -> terminal` and unwinds in reverse.
pub fn build_chain(
    terminal: BoxedHandler,
    route_middlewares: &[BoxedMiddleware],
    global_middlewares: &[BoxedMiddleware],
) -> BoxedHandler {
    let handler = route_middlewares.iter().rev().fold(terminal, |inner, middleware| wrap(Arc::clone(middleware), inner));
    global_middlewares.iter().rev().fold(handler, |inner, middleware| wrap(Arc::clone(middleware), inner))
}

#[cfg(test)]
mod tests {
    use super::build_chain;
    use crate::error::HandlerError;
    use crate::handler::{BoxedHandler, RequestHandler};
    use crate::middleware::{BoxedMiddleware, Middleware, Next, middleware_fn};
    use crate::request::{PathParams, RequestContext};
    use async_trait::async_trait;
    use bytes::Bytes;
    use http::{Request, StatusCode};
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        name: &'static str,
        log: Log,
    }

    #[async_trait]
    impl Middleware for Recorder {
        async fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> Result<(), HandlerError> {
            self.log.lock().unwrap().push(format!("{}:before", self.name));
            let result = next.run(ctx).await;
            self.log.lock().unwrap().push(format!("{}:after", self.name));
            result
        }
    }

    struct Gate {
        log: Log,
    }

    #[async_trait]
    impl Middleware for Gate {
        async fn handle(&self, ctx: &mut RequestContext, _next: Next<'_>) -> Result<(), HandlerError> {
            self.log.lock().unwrap().push("gate".to_string());
            ctx.text(StatusCode::UNAUTHORIZED, "Unauthorized");
            Ok(())
        }
    }

    struct Terminal {
        log: Log,
    }

    #[async_trait]
    impl RequestHandler for Terminal {
        async fn invoke(&self, ctx: &mut RequestContext) -> Result<(), HandlerError> {
            self.log.lock().unwrap().push("terminal".to_string());
            ctx.text(StatusCode::OK, "done");
            Ok(())
        }
    }

    fn recorder(name: &'static str, log: &Log) -> BoxedMiddleware {
        Arc::new(Recorder { name, log: Arc::clone(log) })
    }

    fn context() -> RequestContext {
        RequestContext::new(Request::get("/").body(Bytes::new()).unwrap(), PathParams::empty())
    }

    #[tokio::test]
    async fn test_onion_order() {
        let log = Log::default();
        let terminal: BoxedHandler = Arc::new(Terminal { log: Arc::clone(&log) });

        let chain = build_chain(
            terminal,
            &[recorder("R1", &log), recorder("R2", &log)],
            &[recorder("G1", &log), recorder("G2", &log)],
        );
        chain.invoke(&mut context()).await.unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "G1:before",
                "G2:before",
                "R1:before",
                "R2:before",
                "terminal",
                "R2:after",
                "R1:after",
                "G2:after",
                "G1:after",
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_chain_is_terminal() {
        let log = Log::default();
        let chain = build_chain(Arc::new(Terminal { log: Arc::clone(&log) }), &[], &[]);

        let mut ctx = context();
        chain.invoke(&mut ctx).await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["terminal"]);
        assert_eq!(ctx.response().body().as_bytes(), b"done");
    }

    #[tokio::test]
    async fn test_short_circuit() {
        let log = Log::default();
        let terminal: BoxedHandler = Arc::new(Terminal { log: Arc::clone(&log) });
        let gate: BoxedMiddleware = Arc::new(Gate { log: Arc::clone(&log) });

        let chain = build_chain(terminal, &[gate, recorder("R2", &log)], &[recorder("G1", &log)]);

        let mut ctx = context();
        chain.invoke(&mut ctx).await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["G1:before", "gate", "G1:after"]);
        assert_eq!(ctx.response().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ctx.response().body().as_bytes(), b"Unauthorized");
    }

    #[tokio::test]
    async fn test_error_unwinds_through_outer_layers() {
        async fn failing(_ctx: &mut RequestContext, _next: Next<'_>) -> Result<(), HandlerError> {
            Err("denied".into())
        }

        let log = Log::default();
        let terminal: BoxedHandler = Arc::new(Terminal { log: Arc::clone(&log) });

        let chain = build_chain(terminal, &[Arc::new(middleware_fn(failing))], &[recorder("G1", &log)]);
        let error = chain.invoke(&mut context()).await.unwrap_err();

        assert_eq!(error.to_string(), "denied");
        assert_eq!(*log.lock().unwrap(), vec!["G1:before", "G1:after"]);
    }

    #[tokio::test]
    async fn test_chain_is_reusable() {
        let log = Log::default();
        let chain = build_chain(
            Arc::new(Terminal { log: Arc::clone(&log) }),
            &[recorder("R1", &log)],
            &[recorder("G1", &log)],
        );

        for _ in 0..3 {
            chain.invoke(&mut context()).await.unwrap();
        }

        assert_eq!(log.lock().unwrap().len(), 15);
    }
}
