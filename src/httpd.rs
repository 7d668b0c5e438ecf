// HTTP Server Module - Web form and API endpoints
use anyhow::{Context, Result};
use async_stream::stream;
use axum::{
    extract::{Json, Request, State},
    http::{header::{AUTHORIZATION, WWW_AUTHENTICATE}, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response, sse::{Event as SseEvent, KeepAlive, Sse}},
    routing::{get, post},
    Router,
};
use base64::{Engine as _, engine::general_purpose};
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::Value;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::form::AddonConfigForm;
use crate::schema::{self, AddonGroup};
use crate::source::ConfigSource;

const WEB_UI_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Add-Ons Configuration</title>
    <style>
        * { margin: 0; padding: 0; box-sizing: border-box; }
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Oxygen, Ubuntu, Cantarell, sans-serif;
            background: #1a1a1a;
            color: #e0e0e0;
            padding: 20px;
            line-height: 1.6;
        }
        .container { max-width: 900px; margin: 0 auto; }
        h1 { color: #00aaff; margin-bottom: 10px; font-size: 2em; }
        .section {
            background: #2a2a2a;
            border: 1px solid #404040;
            border-radius: 8px;
            padding: 20px;
            margin-bottom: 20px;
        }
        .section-header {
            display: flex;
            justify-content: space-between;
            align-items: center;
            color: #00aaff;
            font-size: 1.3em;
            font-weight: 600;
            margin-bottom: 12px;
        }
        .section-header label { font-size: 0.65em; color: #b0b0b0; display: flex; gap: 8px; align-items: center; }
        .fields { display: grid; grid-template-columns: repeat(auto-fill, minmax(220px, 1fr)); gap: 15px; }
        .fields[hidden] { display: none; }
        .config-item label {
            display: block;
            color: #b0b0b0;
            margin-bottom: 6px;
            font-size: 0.85em;
            text-transform: uppercase;
            letter-spacing: 0.5px;
        }
        input[type="number"], select {
            width: 100%;
            background: #1a1a1a;
            border: 1px solid #505050;
            color: #e0e0e0;
            padding: 8px 10px;
            border-radius: 4px;
            font-size: 1em;
        }
        input.invalid, select.invalid { border: 2px solid #ff4444; background: #3a1a1a; }
        input[type="checkbox"] { width: 20px; height: 20px; cursor: pointer; }
        .error { color: #ff9090; font-size: 0.85em; margin-top: 4px; }
        .help-text { font-size: 0.85em; color: #808080; margin-bottom: 10px; }
        button {
            background: #00aaff;
            color: white;
            border: none;
            padding: 10px 20px;
            border-radius: 4px;
            cursor: pointer;
            font-size: 0.9em;
            font-weight: 600;
        }
        button:hover { background: #0088cc; }
        .alert { margin-left: 15px; font-weight: 500; }
        .banner { background: #5a1a1a; border: 1px solid #902020; color: #ff9090; padding: 10px 15px; border-radius: 4px; margin-bottom: 20px; }
    </style>
</head>
<body>
    <div class="container">
        <div id="banner"></div>
        <div class="section">
            <h1 id="title">Add-Ons Configuration</h1>
            <p id="intro"></p>
        </div>
        <form id="form" novalidate>
            <div id="sections"></div>
            <div>
                <button type="submit">Save</button>
                <span id="status" class="alert"></span>
            </div>
        </form>
    </div>

    <script>
        let view = null;

        function escapeHtml(text) {
            return String(text).replace(/[&<>"']/g, c => ({'&': '&amp;', '<': '&lt;', '>': '&gt;', '"': '&quot;', "'": '&#39;'}[c]));
        }

        function renderField(field) {
            const invalid = field.error ? 'invalid' : '';
            const value = field.value === null ? '' : field.value;
            let control;
            if (field.control === 'select') {
                control = `<select name="${field.name}" class="${invalid}" onchange="changeField(this.name, this.value)">` +
                    field.options.map(o => `<option value="${o.value}" ${String(o.value) === String(value) ? 'selected' : ''}>${escapeHtml(o.label)}</option>`).join('') +
                    `</select>`;
            } else {
                const min = field.min !== undefined ? `min="${field.min}"` : '';
                const max = field.max !== undefined ? `max="${field.max}"` : '';
                control = `<input type="number" name="${field.name}" class="${invalid}" value="${escapeHtml(value)}" ${min} ${max} onchange="changeField(this.name, this.value)">`;
            }
            const error = field.error ? `<div class="error">${escapeHtml(field.error)}</div>` : '';
            return `<div class="config-item"><label>${escapeHtml(field.label)}</label>${control}${error}</div>`;
        }

        function renderSection(section) {
            const note = section.note ? `<p class="help-text">${escapeHtml(section.note)}</p>` : '';
            return `<div class="section">
                <div class="section-header">
                    <span>${escapeHtml(section.title)}</span>
                    <label><input type="checkbox" ${section.enabled ? 'checked' : ''} onchange="toggleGroup('${section.group}')"> Enabled</label>
                </div>
                <div ${section.enabled ? '' : 'hidden'}>
                    ${note}
                    <div class="fields">${section.fields.map(renderField).join('')}</div>
                </div>
            </div>`;
        }

        function render(next) {
            view = next;
            document.getElementById('title').textContent = view.title;
            document.getElementById('intro').textContent = view.intro;
            document.getElementById('banner').innerHTML = view.load_failed
                ? '<div class="banner">Could not read the current add-on options from the device. Showing defaults.</div>'
                : '';
            document.getElementById('sections').innerHTML = view.sections.map(renderSection).join('');
            document.getElementById('status').textContent = view.status || '';
        }

        async function post(url, body) {
            const res = await fetch(url, {
                method: 'POST',
                headers: { 'Content-Type': 'application/json' },
                body: JSON.stringify(body || {})
            });
            render(await res.json());
        }

        function changeField(name, value) { return post('/api/field', { field: name, value: value }); }
        function toggleGroup(group) { return post('/api/toggle', { group: group }); }

        async function loadForm() {
            const res = await fetch('/api/form');
            render(await res.json());
        }

        document.getElementById('form').addEventListener('submit', e => {
            e.preventDefault();
            post('/api/submit');
        });

        const events = new EventSource('/api/form/events');
        events.addEventListener('form-changed', loadForm);
        events.onerror = () => events.close();

        loadForm();
    </script>
</body>
</html>
"#;

#[derive(Clone)]
pub struct AppState {
    form: Arc<Mutex<AddonConfigForm>>,
    source: Arc<dyn ConfigSource>,
    changes: broadcast::Sender<()>,
    auth: Option<(String, String)>,
}

impl AppState {
    pub fn new(form: AddonConfigForm, source: Arc<dyn ConfigSource>, config: &AppConfig) -> Self {
        let (changes, _) = broadcast::channel(100);
        let auth = config
            .auth_active()
            .then(|| (config.httpd_auth_user.clone(), config.httpd_auth_pass.clone()));
        AppState {
            form: Arc::new(Mutex::new(form)),
            source,
            changes,
            auth,
        }
    }

    fn notify(&self) {
        // No subscribers is fine
        let _ = self.changes.send(());
    }
}

#[derive(Deserialize)]
struct UpdateField {
    field: String,
    value: Value,
}

#[derive(Deserialize)]
struct ToggleGroup {
    group: AddonGroup,
}

async fn serve_index() -> impl IntoResponse {
    Html(WEB_UI_HTML)
}

async fn get_form(State(state): State<AppState>) -> impl IntoResponse {
    let form = state.form.lock().await;
    Json(form.view())
}

async fn update_field(
    State(state): State<AppState>,
    Json(payload): Json<UpdateField>,
) -> Response {
    if schema::field(&payload.field).is_none() {
        return (StatusCode::BAD_REQUEST, format!("Unknown field: {}", payload.field)).into_response();
    }

    let view = {
        let mut form = state.form.lock().await;
        if let Some(error) = form.change(&payload.field, payload.value) {
            info!(field = %payload.field, "{}", error);
        }
        form.view()
    };
    state.notify();
    Json(view).into_response()
}

async fn toggle_group(
    State(state): State<AppState>,
    Json(payload): Json<ToggleGroup>,
) -> impl IntoResponse {
    let view = {
        let mut form = state.form.lock().await;
        let enabled = form.toggle(payload.group);
        info!(group = %payload.group, enabled, "add-on toggled");
        form.view()
    };
    state.notify();
    Json(view)
}

// The form lock is never held across a device round trip
async fn submit_form(State(state): State<AppState>) -> impl IntoResponse {
    let prepared = state.form.lock().await.prepare_submit();
    let (status, view) = match prepared {
        Err(_) => (StatusCode::UNPROCESSABLE_ENTITY, state.form.lock().await.view()),
        Ok(payload) => {
            let saved = state.source.save(&payload).await;
            let mut form = state.form.lock().await;
            form.finish_submit(saved);
            (StatusCode::OK, form.view())
        }
    };
    state.notify();
    (status, Json(view))
}

async fn reload_form(State(state): State<AppState>) -> impl IntoResponse {
    let loaded = state.source.load().await;
    let view = {
        let mut form = state.form.lock().await;
        form.apply_load(loaded);
        form.view()
    };
    state.notify();
    Json(view)
}

// SSE handler - tells open pages to refetch the form after any edit
async fn form_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let mut rx = state.changes.subscribe();

    let event_stream = stream! {
        loop {
            match rx.recv().await {
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {
                    yield Ok(SseEvent::default().event("form-changed").data("reload"));
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    Sse::new(event_stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

async fn basic_auth_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let Some((user, pass)) = state.auth.as_ref() else {
        return next.run(req).await;
    };

    let authorized = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Basic "))
        .and_then(|encoded| general_purpose::STANDARD.decode(encoded).ok())
        .and_then(|decoded| String::from_utf8(decoded).ok())
        .map(|credentials| match credentials.split_once(':') {
            Some((u, p)) => u == user && p == pass,
            None => false,
        })
        .unwrap_or(false);

    if authorized {
        return next.run(req).await;
    }

    let mut response = (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    response.headers_mut().insert(
        WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"addonconf\""),
    );
    response
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(serve_index))
        .route("/api/form", get(get_form))
        .route("/api/form/events", get(form_events))
        .route("/api/field", post(update_field))
        .route("/api/toggle", post(toggle_group))
        .route("/api/submit", post(submit_form))
        .route("/api/reload", post(reload_form))
        .layer(middleware::from_fn_with_state(state.clone(), basic_auth_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_http_server(config: &AppConfig, state: AppState) -> Result<()> {
    let addr = format!("{}:{}", config.httpd_ip, config.httpd_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    if state.auth.is_none() && config.httpd_auth_enabled {
        warn!("httpd_auth_enabled is set but user or password is empty, auth disabled");
    }
    println!("🌐 Add-on form listening on http://{}", addr);
    info!(%addr, device = %config.device_url, "HTTP server started");

    axum::serve(listener, router(state))
        .await
        .context("HTTP server error")?;
    Ok(())
}
