use http::StatusCode;
use micro_router::error::HandlerError;
use micro_router::middleware::{BasicAuth, RateLimit};
use micro_router::router::{Condition, Group, get, post, route};
use micro_router::{Html, Next, RequestContext, Router, Server, ServerConfig, handler_fn, middleware_fn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

#[derive(Deserialize, Serialize, Debug)]
pub struct User {
    name: String,
    zip: String,
}

// curl -v http://127.0.0.1:8080/users/42/posts/7
async fn show_post(ctx: &mut RequestContext) -> Result<(), HandlerError> {
    let user = ctx.param("id").unwrap_or_default().to_owned();
    let post = ctx.param("postId").unwrap_or_default().to_owned();
    ctx.text(StatusCode::OK, format!("post {post} of user {user}\r\n"));
    Ok(())
}

// curl -v -d "name=hello&zip=world" http://127.0.0.1:8080/users
// curl -v -H 'Content-Type: application/json' -d '{"name":"hello","zip":"world"}' http://127.0.0.1:8080/users
async fn create_user(ctx: &mut RequestContext) -> Result<(), HandlerError> {
    let user: User = ctx.bind()?;
    ctx.json(StatusCode::CREATED, &user)?;
    Ok(())
}

// curl -v -u admin:s3cret http://127.0.0.1:8080/admin
async fn dashboard(ctx: &mut RequestContext) -> Result<(), HandlerError> {
    let started = ctx.get::<Instant>("started").map(|started| started.elapsed());
    ctx.respond(Html(format!("<h1>dashboard</h1><p>{started:?}</p>")));
    Ok(())
}

async fn timing(ctx: &mut RequestContext, next: Next<'_>) -> Result<(), HandlerError> {
    ctx.set("started", Instant::now());
    let result = next.run(ctx).await;
    info!(path = %ctx.uri().path(), status = %ctx.response().status(), "request served");
    result
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let limiter = Arc::new(RateLimit::per_minute(60));

    let admin = Group::new("admin")
        .given(Condition::path_prefix("/admin"))
        .with(BasicAuth::new("admin:s3cret")?)
        .route(get("/", handler_fn(dashboard)));

    let router = Router::builder()
        .wrap(middleware_fn(timing))
        .route(route("GET /users/:id/posts/:postId", handler_fn(show_post))?)
        .route(post("/users", handler_fn(create_user)).with(Arc::clone(&limiter)))
        .group(admin)?
        .build()?;

    let config: ServerConfig = serde_json::from_str(r#"{ "address": "127.0.0.1:8080" }"#)?;
    let server = Server::builder().router(router).config(config).build()?;

    server.start().await?;
    Ok(())
}
