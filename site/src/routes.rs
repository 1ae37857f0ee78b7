//! Request routing and handlers.

use lambda_http::{Body, Error, Request, RequestExt, Response};
use shared::http::{
    decode_path_segment, form_map, html_response, parse_form, redirect, safe_redirect_target,
    with_query,
};
use shared::render::{self, Notice};
use shared::{catalog, guestbook, tickets, GuestbookForm};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::AppState;

enum Route<'a> {
    Catalog,
    Event(&'a str),
    Guestbook,
    Unknown,
}

fn route(path: &str) -> Route<'_> {
    let path = path.trim_end_matches('/');
    match path {
        "" | "/events" => Route::Catalog,
        "/api/guestbook" => Route::Guestbook,
        _ => match path.strip_prefix("/events/") {
            Some(id) if !id.is_empty() && !id.contains('/') => Route::Event(id),
            _ => Route::Unknown,
        },
    }
}

/// Query parameter from the Lambda event, falling back to the raw URI query.
fn query_param(event: &Request, key: &str) -> Option<String> {
    if let Some(value) = event.query_string_parameters_ref().and_then(|q| q.first(key)) {
        return Some(value.to_string());
    }
    let query = event.uri().query()?;
    parse_form(query.as_bytes())
        .into_iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v)
}

pub async fn handler(state: Arc<AppState>, event: Request) -> Result<Response<Body>, Error> {
    let path = event.uri().path().to_string();
    let method = event.method().as_str();

    info!("Received request: method={}, path={}", method, path);

    let is_get = matches!(method, "GET" | "HEAD");

    let response = match (route(&path), is_get, method) {
        (Route::Catalog, true, _) => list_events(&state).await,
        (Route::Event(id), true, _) => {
            let id = decode_path_segment(id);
            show_event(&state, &event, &id).await
        }
        (Route::Guestbook, _, "POST") => sign_guestbook(&state, &event).await,
        (Route::Unknown, _, _) => html_response(404, render::not_found_page()),
        _ => {
            let mut response = html_response(405, render::method_not_allowed_page())?;
            let allow = if matches!(route(&path), Route::Guestbook) {
                "POST"
            } else {
                "GET, HEAD"
            };
            response.headers_mut().insert("allow", allow.parse()?);
            Ok(response)
        }
    }?;

    if method == "HEAD" {
        let (parts, _) = response.into_parts();
        return Ok(Response::from_parts(parts, Body::Empty));
    }
    Ok(response)
}

async fn list_events(state: &AppState) -> Result<Response<Body>, Error> {
    match catalog::list_events(state.store.as_ref(), &state.config).await {
        Ok(events) => html_response(200, render::catalog_page(&events)),
        Err(e) => {
            error!("Failed to list events: {}", e);
            error_page(state, &e, &[])
        }
    }
}

async fn show_event(state: &AppState, event: &Request, event_id: &str) -> Result<Response<Body>, Error> {
    let notice = Notice::from_query(
        query_param(event, "guestbook").as_deref(),
        query_param(event, "reason").as_deref(),
    );

    let record = match catalog::get_event(state.store.as_ref(), &state.config, event_id).await {
        Ok(record) => record,
        Err(e) => {
            if e.status_code() != 404 {
                error!("Failed to load event {}: {}", event_id, e);
            }
            return error_page(state, &e, &[("event_id".to_string(), event_id.to_string())]);
        }
    };

    let ticket_status = tickets::provision(
        state.store.as_ref(),
        state.payments.as_ref(),
        state.memo,
        &state.config,
        &record,
    )
    .await;

    html_response(
        200,
        render::event_page(&record, &ticket_status, notice, &state.config.currency),
    )
}

async fn sign_guestbook(state: &AppState, event: &Request) -> Result<Response<Body>, Error> {
    let fields = parse_form(event.body().as_ref());
    let form = GuestbookForm::from_fields(&form_map(&fields));
    let event_path = format!("/events/{}", urlencoding::encode(&form.event_id));

    match guestbook::submit(state.store.as_ref(), &state.config, &form).await {
        Ok(submission) => {
            if !submission.warnings.is_empty() {
                warn!(
                    "Guestbook entry {} saved with warnings: {}",
                    submission.guest_id,
                    submission.warnings.join("; ")
                );
            }
            let target = query_param(event, "redirect")
                .and_then(|r| safe_redirect_target(&r))
                .unwrap_or_else(|| with_query(&event_path, &[("guestbook", "thanks")]));
            redirect(&target)
        }
        Err(e) if e.is_schema_mismatch() => {
            error!("Guestbook rejected by Notion schema: {}", e);
            redirect(&with_query(
                &event_path,
                &[("guestbook", "error"), ("reason", "schema")],
            ))
        }
        Err(e) => {
            if e.status_code() == 400 {
                warn!("Rejected guestbook submission: {}", e);
            } else {
                error!("Failed to save guestbook entry: {}", e);
            }
            error_page(state, &e, &fields)
        }
    }
}

fn error_page(
    state: &AppState,
    err: &shared::Error,
    input: &[(String, String)],
) -> Result<Response<Body>, Error> {
    let status = err.status_code();
    if status == 404 {
        return html_response(404, render::not_found_page());
    }

    let secrets: Vec<(&str, &str)> = if state.config.debug_pages {
        vec![
            ("NOTION_TOKEN", state.credentials.notion_token.as_str()),
            ("STRIPE_SECRET_KEY", state.credentials.stripe_secret_key.as_str()),
        ]
    } else {
        Vec::new()
    };

    html_response(
        status,
        render::debug_page(status, &err.to_string(), input, &secrets),
    )
}
