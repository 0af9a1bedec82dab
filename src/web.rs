//! Local control surface: edit the manifest URL and start/stop polling.

use std::fmt::Write as _;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Json, Redirect};
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::display::{DisplayedImage, Gallery};
use crate::events::PollStatus;
use crate::state::ConfigState;
use crate::tasks::poller::PollScheduler;

#[derive(Clone)]
struct AppState {
    scheduler: Arc<PollScheduler>,
    gallery: Gallery,
}

impl AppState {
    fn config(&self) -> &ConfigState {
        self.scheduler.state()
    }
}

pub fn router(scheduler: Arc<PollScheduler>, gallery: Gallery) -> Router {
    let state = AppState { scheduler, gallery };
    Router::new()
        .route("/", get(index))
        .route("/url", post(update_url))
        .route("/start", post(start_polling))
        .route("/stop", post(stop_polling))
        .route("/status.json", get(status_json))
        .with_state(state)
}

pub fn spawn(router: Router, cancel: CancellationToken, bind_addr: SocketAddr) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(%bind_addr, "starting control web server");
        match TcpListener::bind(bind_addr).await {
            Ok(listener) => {
                let shutdown = cancel.clone();
                if let Err(err) = axum::serve(
                    listener,
                    router.into_make_service_with_connect_info::<SocketAddr>(),
                )
                .with_graceful_shutdown(async move {
                    shutdown.cancelled().await;
                })
                .await
                {
                    tracing::error!(error = %err, "control web server failed");
                }
            }
            Err(err) => {
                tracing::error!(error = %err, %bind_addr, "failed to bind control web server");
            }
        }
    })
}

#[derive(Deserialize)]
struct UrlForm {
    url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct StatusBody {
    manifest_url: String,
    #[serde(flatten)]
    poll: PollStatus,
    images: Vec<DisplayedImage>,
}

async fn index(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Result<Html<String>, (StatusCode, Html<String>)> {
    ensure_local(addr)?;
    let body = render_index(
        &state.config().url(),
        &state.scheduler.status(),
        &state.gallery.images(),
    );
    Ok(Html(layout(&body)))
}

async fn update_url(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
    Form(form): Form<UrlForm>,
) -> Result<impl IntoResponse, (StatusCode, Html<String>)> {
    ensure_local(addr)?;
    state.config().set_url(form.url);
    Ok(Redirect::to("/"))
}

async fn start_polling(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, (StatusCode, Html<String>)> {
    ensure_local(addr)?;
    state.scheduler.start().map_err(|err| {
        tracing::error!(error = %err, "failed to start polling");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(layout(&format!(
                "<h2>Error</h2><p>{}</p>",
                escape_html(&err.to_string())
            ))),
        )
    })?;
    Ok(Redirect::to("/"))
}

async fn stop_polling(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, (StatusCode, Html<String>)> {
    ensure_local(addr)?;
    state.scheduler.stop();
    Ok(Redirect::to("/"))
}

async fn status_json(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Result<Json<StatusBody>, (StatusCode, Html<String>)> {
    ensure_local(addr)?;
    Ok(Json(StatusBody {
        manifest_url: state.config().url(),
        poll: state.scheduler.status(),
        images: state.gallery.images(),
    }))
}

fn ensure_local(addr: SocketAddr) -> Result<(), (StatusCode, Html<String>)> {
    if is_local(addr.ip()) {
        Ok(())
    } else {
        Err((
            StatusCode::FORBIDDEN,
            Html(layout("<h2>Access denied</h2><p>This interface is only available on the local network.</p>")),
        ))
    }
}

fn is_local(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => v4.is_loopback() || v4.is_private(),
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unique_local(),
    }
}

fn render_index(url: &str, status: &PollStatus, images: &[DisplayedImage]) -> String {
    let mut body = String::new();
    let _ = write!(
        body,
        "<h2>Manifest</h2>\
<form method='post' action='/url'>\
<label>Paste the manifest URL: <input name='url' size='60' value='{}'></label>\
<button type='submit'>Save</button></form>",
        escape_html(url)
    );

    let (state_label, action, button) = if status.running {
        ("listening", "/stop", "Stop listening")
    } else {
        ("stopped", "/start", "Start listening")
    };
    let _ = write!(
        body,
        "<h2>Polling</h2><p>State: <strong>{state_label}</strong> &middot; ticks: {} &middot; reloads: {}</p>\
<form method='post' action='{action}'><button type='submit'>{button}</button></form>",
        status.ticks, status.reconciliations
    );
    if let Some(outcome) = status.last_outcome {
        let _ = write!(body, "<p>Last tick: {outcome}</p>");
    }
    if let Some(err) = &status.last_error {
        let _ = write!(body, "<p class='error'>{}</p>", escape_html(err));
    }

    body.push_str("<h2>Displayed images</h2>");
    if images.is_empty() {
        body.push_str("<p>None</p>");
    } else {
        body.push_str("<ol>");
        for image in images {
            let _ = write!(
                body,
                "<li><code>{}</code> ({}&times;{})</li>",
                escape_html(&image.locator),
                image.width,
                image.height
            );
        }
        body.push_str("</ol>");
    }
    body
}

fn layout(body: &str) -> String {
    format!(
        "<!doctype html><html lang='en'><head><meta charset='utf-8'>\
<meta http-equiv='refresh' content='5'><title>Manifest listener</title>\
<style>body{{font-family:sans-serif;margin:2em;max-width:50em}}.error{{color:#b00}}</style>\
</head><body><h1>Manifest listener</h1>{body}</body></html>"
    )
}

fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
