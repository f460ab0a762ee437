//! Minimal isomorph server — a toy renderer, health checks, an error handler.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!   ISOMORPH__RENDER__DEVELOPMENT=true cargo run --example basic   # diagnostic pages
//!
//! Try:
//!   curl -i http://localhost:3000/users
//!   curl -i http://localhost:3000/old-page
//!   curl -i http://localhost:3000/secure
//!   curl -i -H 'accept-language: fr;q=0.9, en;q=0.5' http://localhost:3000/
//!   curl http://localhost:3000/healthz

use async_trait::async_trait;
use http::{Method, StatusCode};
use isomorph::middleware::Trace;
use isomorph::{
    ErrorContext, Localization, Pipeline, RenderContext, RenderError, RenderOptions, RenderResult,
    Renderer, Router, Server, health,
};

struct App;

#[async_trait]
impl Renderer for App {
    async fn render(&self, ctx: &mut RenderContext) -> Result<RenderResult, RenderError> {
        ctx.preload().await?;

        match ctx.request().path() {
            "/old-page" => Ok(RenderResult::redirect("/new-page")),
            "/secure" if ctx.access_token().is_none() => {
                Err(RenderError::http(StatusCode::FORBIDDEN, "Forbidden"))
            }
            "/crash" => Err(RenderError::other("renderer crashed")),
            path => {
                let locale = ctx.localize().map_or_else(|| "en".to_owned(), |l| l.locale);
                let scripts: String = ctx
                    .assets()
                    .javascript
                    .iter()
                    .map(|src| format!(r#"<script src="{src}"></script>"#))
                    .collect();
                let head = ctx.html().head.clone().unwrap_or_default();
                Ok(RenderResult::content(format!(
                    r#"<!DOCTYPE html><html lang="{locale}"><head>{head}</head><body><div id="app">{path}</div>{scripts}</body></html>"#
                )))
            }
        }
    }
}

fn localize(preferred: &[String]) -> Option<Localization> {
    let locale = preferred
        .iter()
        .map(|tag| tag.split('-').next().unwrap_or(tag).to_ascii_lowercase())
        .find(|tag| tag == "en" || tag == "fr")?;
    Some(Localization { locale, messages: serde_json::json!({}) })
}

async fn on_error(error: RenderError, ctx: ErrorContext) -> Result<isomorph::Response, RenderError> {
    if error.status() == Some(StatusCode::FORBIDDEN) {
        return Ok(ctx.redirect(&format!("/login?next={}", ctx.url)));
    }
    Err(error)
}

#[tokio::main]
async fn main() -> Result<(), isomorph::Error> {
    let settings = isomorph::config::load(None)?;
    isomorph::telemetry::init(&settings.logging)?;

    let options = RenderOptions::builder(App)
        .settings(&settings.render)?
        .localize(localize)
        .middleware(Trace)
        .catch(on_error)
        .build();

    let app = Router::new()
        .on(Method::GET, "/healthz", health::liveness)
        .on(Method::GET, "/readyz", health::readiness)
        .render(Pipeline::new(options));

    Server::bind(settings.server.addr).serve(app).await
}
