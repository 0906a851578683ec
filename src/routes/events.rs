use actix_files::NamedFile;
use actix_web::{http::header, middleware::from_fn, web, HttpResponse, Result};
use actix_web_httpauth::middleware::HttpAuthentication;
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::{
    auth::{logout_guard, staff_validator},
    state::{AppState, ServerEvent},
};

#[derive(Deserialize)]
struct EventFilter {
    branch: Option<String>,
    status: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/events")
            .wrap(HttpAuthentication::basic(staff_validator))
            .wrap(from_fn(logout_guard))
            .route(web::get().to(stream_events)),
    )
    .service(web::resource("/status/{id}/events").route(web::get().to(stream_status_events)))
    .service(web::resource("/sw.js").route(web::get().to(service_worker)));
}

async fn service_worker() -> Result<NamedFile> {
    Ok(NamedFile::open("./static/sw.js")?)
}

/// Staff dashboards subscribe here and keep their lists live. Optional
/// branch and status filters are applied per event, so one channel serves
/// every dashboard.
async fn stream_events(
    state: web::Data<AppState>,
    query: web::Query<EventFilter>,
) -> HttpResponse {
    let filter = query.into_inner();
    let rx = state.events.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |result| {
        let event = match result {
            Ok(event) => event,
            Err(_) => return None,
        };
        if let Some(branch) = &filter.branch {
            if event.branch_id.as_deref() != Some(branch.as_str()) {
                return None;
            }
        }
        if let Some(status) = &filter.status {
            if event.status.as_deref() != Some(status.as_str()) {
                return None;
            }
        }
        Some(Ok::<web::Bytes, actix_web::Error>(event_to_bytes(&event)))
    });

    HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, "text/event-stream"))
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(stream)
}

fn event_to_bytes(event: &ServerEvent) -> web::Bytes {
    let payload = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    web::Bytes::from(format!("event: update\ndata: {}\n\n", payload))
}

#[derive(serde::Serialize)]
struct PublicStatusEvent {
    appointment_id: Option<String>,
    status: Option<String>,
    date: Option<String>,
    time: Option<String>,
}

/// Public per-appointment stream for the status page; only the fields a
/// client may see.
async fn stream_status_events(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> HttpResponse {
    let appointment_id = path.into_inner();
    let rx = state.events.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |result| {
        let event = match result {
            Ok(event) => event,
            Err(_) => return None,
        };
        if event.appointment_id.as_deref() != Some(&appointment_id) {
            return None;
        }
        let public = PublicStatusEvent {
            appointment_id: event.appointment_id,
            status: event.status,
            date: event.date,
            time: event.time,
        };
        Some(Ok::<web::Bytes, actix_web::Error>(public_event_to_bytes(&public)))
    });

    HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, "text/event-stream"))
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(stream)
}

fn public_event_to_bytes(event: &PublicStatusEvent) -> web::Bytes {
    let payload = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    web::Bytes::from(format!("event: update\ndata: {}\n\n", payload))
}
