use actix_web::{http::header, middleware::from_fn, web, HttpResponse, Result};
use actix_web_httpauth::middleware::HttpAuthentication;
use askama::Template;
use chrono::{Duration, Utc};

use crate::{
    auth::{logout_guard, stylist_validator, AuthUser},
    models::AppointmentRow,
    services::{appointments, schedules},
    state::AppState,
    templates::render,
};

#[derive(Clone, Debug)]
struct AssignmentView {
    date: String,
    time: String,
    client_name: String,
    services: String,
    status: String,
}

#[derive(Clone, Debug)]
struct OverrideView {
    date: String,
    start_time: String,
    end_time: String,
    status: String,
    notes: String,
}

#[derive(Template)]
#[template(path = "stylist_dashboard.html")]
struct StylistDashboardTemplate {
    stylist_name: String,
    assignments: Vec<AssignmentView>,
    overrides: Vec<OverrideView>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/stylist")
            .wrap(HttpAuthentication::basic(stylist_validator))
            .wrap(from_fn(logout_guard))
            .service(web::resource("").route(web::get().to(index)))
            .service(web::resource("/").route(web::get().to(index)))
            .service(web::resource("/dashboard").route(web::get().to(dashboard))),
    );
}

async fn index() -> HttpResponse {
    HttpResponse::Found()
        .append_header((header::LOCATION, "/stylist/dashboard"))
        .finish()
}

async fn dashboard(state: web::Data<AppState>, auth: web::ReqData<AuthUser>) -> Result<HttpResponse> {
    let assignments = match &auth.branch_id {
        Some(branch_id) => appointments::appointments_for_stylist(&state.db, branch_id, &auth.id)
            .await
            .unwrap_or_default(),
        None => Vec::new(),
    };

    let today = Utc::now().date_naive();
    let from = today.format("%Y-%m-%d").to_string();
    let to = (today + Duration::days(13)).format("%Y-%m-%d").to_string();
    let overrides = schedules::stylist_schedules(&state.db, &auth.id, &from, &to)
        .await
        .unwrap_or_default();

    Ok(render(StylistDashboardTemplate {
        stylist_name: auth.display_name.clone(),
        assignments: assignments.iter().map(|row| assignment_view(row, &auth.id)).collect(),
        overrides: overrides
            .into_iter()
            .map(|row| OverrideView {
                date: row.date,
                start_time: row.start_time,
                end_time: row.end_time,
                status: row.status,
                notes: row.notes.unwrap_or_default(),
            })
            .collect(),
    }))
}

fn assignment_view(row: &AppointmentRow, stylist_id: &str) -> AssignmentView {
    let services = row
        .stylists
        .0
        .iter()
        .filter(|entry| entry.stylist_id == stylist_id)
        .map(|entry| entry.service_name.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    AssignmentView {
        date: row.date.clone(),
        time: row.time.clone(),
        client_name: row.client_name(),
        services,
        status: row.status.clone(),
    }
}
