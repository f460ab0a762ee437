use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use http::StatusCode;
use isomorph::diagnostic::{Diagnostic, DiagnosticRenderer, FailedRequest};
use isomorph::middleware::Next;
use isomorph::monitor::{ERROR, ERROR_HANDLED, REQUEST, TIME};
use isomorph::{
    ErrorContext, Monitor, Pipeline, RenderContext, RenderError, RenderOptions,
    RenderOptionsBuilder, RenderResult, Renderer, Request, Response, Timer,
};

// ── Doubles ───────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Recording {
    counters: Mutex<Vec<String>>,
    started: Mutex<Vec<String>>,
    stopped: Arc<Mutex<Vec<String>>>,
}

impl Recording {
    fn counters(&self) -> Vec<String> {
        self.counters.lock().unwrap().clone()
    }

    fn stopped(&self) -> Vec<String> {
        self.stopped.lock().unwrap().clone()
    }

    fn counted(&self, name: &str) -> usize {
        self.counters().iter().filter(|c| *c == name).count()
    }
}

impl Monitor for Recording {
    fn increment(&self, name: &str) {
        self.counters.lock().unwrap().push(name.to_owned());
    }

    fn started(&self, name: &str) -> Timer {
        self.started.lock().unwrap().push(name.to_owned());
        let stopped = Arc::clone(&self.stopped);
        let name = name.to_owned();
        Timer::new(move |_| stopped.lock().unwrap().push(name))
    }
}

/// Renders through a plain function of the context.
struct Scripted(fn(&mut RenderContext) -> Result<RenderResult, RenderError>);

#[async_trait]
impl Renderer for Scripted {
    async fn render(&self, ctx: &mut RenderContext) -> Result<RenderResult, RenderError> {
        (self.0)(ctx)
    }
}

struct Broken;

impl DiagnosticRenderer for Broken {
    fn render(&self, _: &FailedRequest<'_>) -> Result<Diagnostic, RenderError> {
        Err(RenderError::other("template exploded"))
    }
}

struct Unavailable;

impl DiagnosticRenderer for Unavailable {
    fn render(&self, failure: &FailedRequest<'_>) -> Result<Diagnostic, RenderError> {
        Ok(Diagnostic {
            status: Some(StatusCode::SERVICE_UNAVAILABLE),
            html: format!("<pre>{}</pre>", failure.error),
        })
    }
}

/// Answers every diagnostic page with `500`, whatever the error says.
struct AlwaysInternal;

impl DiagnosticRenderer for AlwaysInternal {
    fn render(&self, failure: &FailedRequest<'_>) -> Result<Diagnostic, RenderError> {
        Ok(Diagnostic {
            status: Some(StatusCode::INTERNAL_SERVER_ERROR),
            html: format!("<h1>{}</h1>", failure.error),
        })
    }
}

fn get(uri: &str) -> Request {
    http::Request::builder().uri(uri).body(Bytes::new()).unwrap().into()
}

fn forbidden(_: &mut RenderContext) -> Result<RenderResult, RenderError> {
    Err(RenderError::http(StatusCode::FORBIDDEN, "Forbidden"))
}

fn setup(
    render: fn(&mut RenderContext) -> Result<RenderResult, RenderError>,
    configure: impl FnOnce(RenderOptionsBuilder) -> RenderOptionsBuilder,
) -> (Pipeline, Arc<Recording>) {
    let monitor = Arc::new(Recording::default());
    let builder = RenderOptions::builder(Scripted(render)).monitor(Arc::clone(&monitor));
    (Pipeline::new(configure(builder).build()), monitor)
}

fn body(res: &Response) -> &str {
    std::str::from_utf8(res.body()).unwrap()
}

// ── Success and redirect ──────────────────────────────────────────────────────

#[tokio::test]
async fn renders_content_and_times_the_request() {
    let (pipeline, monitor) = setup(
        |_| Ok(RenderResult::with_status(StatusCode::OK, "<html>Users</html>")),
        |b| b,
    );

    let res = pipeline.handle(get("/users?")).await;

    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(body(&res), "<html>Users</html>");
    assert_eq!(res.header("content-type"), Some("text/html; charset=utf-8"));
    assert_eq!(monitor.counters(), vec![REQUEST.to_owned(), "ssr.request:/users".to_owned()]);
    let mut stopped = monitor.stopped();
    stopped.sort();
    assert_eq!(stopped, vec![TIME.to_owned(), "ssr.time:/users".to_owned()]);
}

#[tokio::test]
async fn status_override_replaces_default() {
    let (pipeline, _) = setup(
        |_| Ok(RenderResult::with_status(StatusCode::NOT_FOUND, "<h1>Not found</h1>")),
        |b| b,
    );
    let res = pipeline.handle(get("/missing")).await;
    assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(body(&res), "<h1>Not found</h1>");
}

#[tokio::test]
async fn redirect_sends_location_only() {
    let (pipeline, monitor) = setup(|_| Ok(RenderResult::redirect("/new-page")), |b| b);

    let res = pipeline.handle(get("/old-page")).await;

    assert_eq!(res.status_code(), StatusCode::FOUND);
    assert_eq!(res.header("location"), Some("/new-page"));
    assert!(res.body().is_empty());
    assert_eq!(monitor.stopped().len(), 2);
}

#[tokio::test]
async fn queued_cookies_reach_the_response() {
    let (pipeline, _) = setup(
        |ctx| {
            let token = ctx.access_token().unwrap_or_default();
            ctx.cookies_mut().set("session", &format!("refreshed-{token}"));
            Ok(RenderResult::redirect("/home"))
        },
        |b| b,
    );
    let req: Request = http::Request::builder()
        .uri("/login")
        .header("authorization", "Bearer t0k")
        .body(Bytes::new())
        .unwrap()
        .into();

    let res = pipeline.handle(req).await;

    assert_eq!(res.header("set-cookie"), Some("session=refreshed-t0k; Path=/"));
    assert!(res.is_redirect());
}

// ── Failures ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn production_error_uses_status_and_message() {
    let (pipeline, monitor) = setup(forbidden, |b| b);

    let res = pipeline.handle(get("/secure")).await;

    assert_eq!(res.status_code(), StatusCode::FORBIDDEN);
    assert_eq!(body(&res), "Forbidden");
    assert_eq!(monitor.counted(ERROR_HANDLED), 1);
    assert_eq!(monitor.counted(ERROR), 1);
    assert_eq!(monitor.stopped().len(), 2);
}

#[tokio::test]
async fn production_error_without_details_is_generic_500() {
    let (pipeline, _) = setup(|_| Err(RenderError::other("")), |b| b);

    let res = pipeline.handle(get("/")).await;

    assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body(&res), "Internal error");
}

#[tokio::test]
async fn development_error_renders_diagnostic_page() {
    let (pipeline, _) = setup(forbidden, |b| b.development(true));

    let res = pipeline.handle(get("/secure")).await;

    assert_eq!(res.status_code(), StatusCode::FORBIDDEN);
    assert_eq!(res.header("content-type"), Some("text/html; charset=utf-8"));
    assert!(body(&res).contains("<h1>Forbidden</h1>"));
    assert!(body(&res).contains("GET /secure"));
}

#[tokio::test]
async fn development_error_without_status_defaults_to_500() {
    let (pipeline, _) = setup(|_| Err(RenderError::other("database unreachable")), |b| b.development(true));

    let res = pipeline.handle(get("/")).await;

    assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body(&res).contains("database unreachable"));
}

#[tokio::test]
async fn diagnostic_status_wins_over_error_status() {
    let (pipeline, _) = setup(forbidden, |b| b.development(true).diagnostics(Unavailable));

    let res = pipeline.handle(get("/secure")).await;

    assert_eq!(res.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body(&res), "<pre>Forbidden</pre>");
}

#[tokio::test]
async fn diagnostic_renderer_can_answer_500_for_a_403() {
    let (pipeline, _) = setup(forbidden, |b| b.development(true).diagnostics(AlwaysInternal));

    let res = pipeline.handle(get("/secure")).await;

    assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body(&res), "<h1>Forbidden</h1>");
}

#[tokio::test]
async fn print_error_adds_the_trace_to_the_diagnostic_page() {
    let (quiet, _) = setup(forbidden, |b| b.development(true));
    let (verbose, _) = setup(forbidden, |b| b.development(true).print_error(true));

    let quiet = quiet.handle(get("/secure")).await;
    let verbose = verbose.handle(get("/secure")).await;

    assert!(!body(&quiet).contains("<h2>Trace</h2>"));
    assert!(body(&verbose).contains("<h2>Trace</h2>"));
    assert!(body(&verbose).contains("Http {"));
}

#[tokio::test]
async fn broken_diagnostics_fall_back_to_generic_response() {
    let (pipeline, _) = setup(forbidden, |b| b.development(true).diagnostics(Broken));

    let res = pipeline.handle(get("/secure")).await;

    assert_eq!(res.status_code(), StatusCode::FORBIDDEN);
    assert_eq!(body(&res), "Forbidden");
}

#[tokio::test]
async fn error_handler_response_is_final() {
    let (pipeline, monitor) = setup(forbidden, |b| {
        b.catch(|_err: RenderError, ctx: ErrorContext| async move {
            Ok::<_, RenderError>(ctx.redirect("/error?code=500"))
        })
    });

    let res = pipeline.handle(get("/secure")).await;

    assert_eq!(res.status_code(), StatusCode::FOUND);
    assert_eq!(res.header("location"), Some("/error?code=500"));
    assert_eq!(monitor.counted(ERROR_HANDLED), 1);
    assert_eq!(monitor.counted(ERROR), 0);
    assert_eq!(monitor.stopped().len(), 2);
}

#[tokio::test]
async fn error_handler_sees_request_url() {
    let (pipeline, _) = setup(forbidden, |b| {
        b.catch(|err: RenderError, ctx: ErrorContext| async move {
            Ok::<_, RenderError>(Response::text(format!("{} {} {}", ctx.method, ctx.url, err)))
        })
    });

    let res = pipeline.handle(get("/secure?tab=2")).await;

    assert_eq!(body(&res), "GET /secure?tab=2 Forbidden");
}

#[tokio::test]
async fn failing_error_handler_reaches_outer_boundary() {
    let (pipeline, monitor) = setup(forbidden, |b| {
        b.catch(|_err: RenderError, _ctx: ErrorContext| async move {
            Err::<Response, _>(RenderError::http(StatusCode::BAD_GATEWAY, "handler down"))
        })
    });

    let res = pipeline.handle(get("/secure")).await;

    assert_eq!(res.status_code(), StatusCode::BAD_GATEWAY);
    assert_eq!(body(&res), "handler down");
    assert_eq!(monitor.counted(ERROR), 1);
}

#[tokio::test]
async fn failures_reach_the_injected_logger() {
    let logged = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&logged);
    let (pipeline, _) = setup(forbidden, move |b| {
        b.print_error(true)
            .log(move |err: &RenderError| sink.lock().unwrap().push(err.to_string()))
    });

    pipeline.handle(get("/secure")).await;

    assert_eq!(*logged.lock().unwrap(), vec!["Forbidden".to_owned()]);
}

#[tokio::test]
async fn panicking_renderer_answers_500_and_stops_timers() {
    let (pipeline, monitor) = setup(
        |_| {
            let pages: Vec<&str> = Vec::new();
            Ok(RenderResult::content(pages[3]))
        },
        |b| b,
    );

    let res = tokio::spawn(async move { pipeline.handle(get("/users")).await })
        .await
        .expect("the request task itself must not panic");

    assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body(&res), "Internal error");
    assert_eq!(monitor.counted(ERROR), 1);
    let mut stopped = monitor.stopped();
    stopped.sort();
    assert_eq!(stopped, vec![TIME.to_owned(), "ssr.time:/users".to_owned()]);
}

#[tokio::test]
async fn panicking_error_handler_answers_500() {
    let (pipeline, monitor) = setup(forbidden, |b| {
        b.catch(|_err: RenderError, _ctx: ErrorContext| async move {
            if true {
                panic!("handler bug");
            }
            Ok::<Response, RenderError>(Response::text("unreachable"))
        })
    });

    let res = pipeline.handle(get("/secure")).await;

    assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(monitor.counted(ERROR_HANDLED), 1);
    assert_eq!(monitor.counted(ERROR), 1);
    assert_eq!(monitor.stopped().len(), 2);
}

// ── Middleware ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn middleware_runs_in_order_before_render() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let (first, second) = (Arc::clone(&order), Arc::clone(&order));
    let (pipeline, _) = setup(|_| Ok(RenderResult::content("rendered")), move |b| {
        b.middleware(move |req: Request, next: Next| {
            let order = Arc::clone(&first);
            async move {
                order.lock().unwrap().push("first");
                next.run(req).await
            }
        })
        .middleware(move |req: Request, next: Next| {
            let order = Arc::clone(&second);
            async move {
                order.lock().unwrap().push("second");
                next.run(req).await
            }
        })
    });

    let res = pipeline.handle(get("/")).await;

    assert_eq!(body(&res), "rendered");
    assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
}

#[tokio::test]
async fn middleware_can_short_circuit() {
    let (pipeline, monitor) = setup(
        |_| panic!("render must not run"),
        |b| {
            b.middleware(|_req: Request, _next: Next| async move {
                Ok::<_, RenderError>(Response::html("<h1>Back soon</h1>"))
            })
        },
    );

    let res = pipeline.handle(get("/anything")).await;

    assert_eq!(body(&res), "<h1>Back soon</h1>");
    assert_eq!(monitor.stopped().len(), 2);
}

#[tokio::test]
async fn middleware_errors_skip_the_error_handler() {
    let (pipeline, monitor) = setup(
        |_| Ok(RenderResult::content("unreachable")),
        |b| {
            b.middleware(|_req: Request, _next: Next| async move {
                Err::<Response, _>(RenderError::http(StatusCode::UNAUTHORIZED, "Unauthorized"))
            })
            .catch(|_err: RenderError, ctx: ErrorContext| async move {
                Ok::<_, RenderError>(ctx.redirect("/login"))
            })
        },
    );

    let res = pipeline.handle(get("/account")).await;

    assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(monitor.counted(ERROR_HANDLED), 0);
    assert_eq!(monitor.counted(ERROR), 1);
}

#[tokio::test]
async fn trace_middleware_is_transparent() {
    let (pipeline, _) = setup(
        |_| Ok(RenderResult::with_status(StatusCode::ACCEPTED, "ok")),
        |b| b.middleware(isomorph::middleware::Trace),
    );

    let res = pipeline.handle(get("/")).await;

    assert_eq!(res.status_code(), StatusCode::ACCEPTED);
}
