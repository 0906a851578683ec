use actix_web::{http::header, middleware::from_fn, web, HttpResponse, Result};
use actix_web_httpauth::middleware::HttpAuthentication;
use askama::Template;
use serde::Deserialize;

use crate::{
    auth::{logout_guard, reception_validator, AuthUser},
    db::log_activity,
    models::{
        AppointmentRow, StylistAssignment, APPOINTMENT_STATUSES, ROLE_CLIENT, SLOT_AVAILABLE,
        STATUS_COMPLETED, STATUS_CONFIRMED, STATUS_PENDING,
    },
    push,
    services::{appointments, branches, schedules, staff_services, users},
    state::{AppState, ServerEvent},
    templates::render,
};

#[derive(Clone, Debug)]
struct StatCard {
    label: String,
    value: i64,
}

#[derive(Clone, Debug)]
struct AppointmentView {
    id: String,
    client_name: String,
    client_phone: String,
    client_email: String,
    has_email: bool,
    date: String,
    time: String,
    services: String,
    stylists: String,
    status: String,
    total_cost: String,
    notes: String,
    has_notes: bool,
}

#[derive(Clone, Debug)]
struct StatusOption {
    value: String,
    selected: bool,
}

#[derive(Clone, Debug)]
struct ServiceLine {
    service_id: String,
    service_name: String,
    stylist_name: String,
    assigned: bool,
}

#[derive(Clone, Debug)]
struct StylistOption {
    id: String,
    display_name: String,
}

#[derive(Template)]
#[template(path = "reception_dashboard.html")]
struct ReceptionDashboardTemplate {
    staff_name: String,
    branch_name: String,
    stats: Vec<StatCard>,
    today: Vec<AppointmentView>,
}

#[derive(Template)]
#[template(path = "reception_appointments.html")]
struct ReceptionAppointmentsTemplate {
    appointments: Vec<AppointmentView>,
    status_filter: String,
    date_filter: String,
    branch_id: String,
}

#[derive(Template)]
#[template(path = "reception_appointment_detail.html")]
struct ReceptionAppointmentDetailTemplate {
    appointment: AppointmentView,
    statuses: Vec<StatusOption>,
    lines: Vec<ServiceLine>,
    stylists: Vec<StylistOption>,
}

#[derive(Deserialize)]
struct AppointmentFilter {
    status: Option<String>,
    date: Option<String>,
    branch: Option<String>,
}

#[derive(Deserialize)]
struct StatusForm {
    status: String,
}

#[derive(Deserialize)]
struct AssignForm {
    service_id: String,
    stylist_id: String,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/reception")
            .wrap(HttpAuthentication::basic(reception_validator))
            .wrap(from_fn(logout_guard))
            .service(web::resource("").route(web::get().to(index)))
            .service(web::resource("/").route(web::get().to(index)))
            .service(web::resource("/dashboard").route(web::get().to(dashboard)))
            .service(web::resource("/appointments").route(web::get().to(list_appointments)))
            .service(web::resource("/appointments/{id}").route(web::get().to(appointment_detail)))
            .service(web::resource("/appointments/{id}/status").route(web::post().to(update_status)))
            .service(web::resource("/appointments/{id}/assign").route(web::post().to(assign_stylist)))
            .service(web::resource("/appointments/{id}/delete").route(web::post().to(delete_appointment))),
    );
}

async fn index() -> HttpResponse {
    HttpResponse::Found()
        .append_header((header::LOCATION, "/reception/dashboard"))
        .finish()
}

/// Receptionists are pinned to their branch; chain-level roles fall back to
/// an explicit query parameter or the first branch.
async fn resolve_branch(
    state: &web::Data<AppState>,
    auth: &AuthUser,
    requested: Option<&str>,
) -> Option<String> {
    if let Some(branch) = &auth.branch_id {
        return Some(branch.clone());
    }
    if let Some(requested) = requested {
        return Some(requested.to_string());
    }
    branches::all_branches(&state.db)
        .await
        .ok()?
        .first()
        .map(|b| b.id.clone())
}

async fn dashboard(state: web::Data<AppState>, auth: web::ReqData<AuthUser>) -> Result<HttpResponse> {
    let Some(branch_id) = resolve_branch(&state, &auth, None).await else {
        return Ok(HttpResponse::NotFound().body("No branch configured"));
    };
    let branch_name = branches::branch_by_id(&state.db, &branch_id)
        .await
        .unwrap_or(None)
        .map(|b| b.name)
        .unwrap_or_default();

    let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
    let all = appointments::appointments_by_branch(&state.db, &branch_id, None, None)
        .await
        .unwrap_or_default();
    let todays = appointments::appointments_by_branch(&state.db, &branch_id, Some(&today), None)
        .await
        .unwrap_or_default();

    let pending = all.iter().filter(|a| a.status == STATUS_PENDING).count() as i64;
    let confirmed = all.iter().filter(|a| a.status == STATUS_CONFIRMED).count() as i64;
    let completed = all.iter().filter(|a| a.status == STATUS_COMPLETED).count() as i64;

    let stats = vec![
        StatCard {
            label: "Total appointments".to_string(),
            value: all.len() as i64,
        },
        StatCard {
            label: "Pending review".to_string(),
            value: pending,
        },
        StatCard {
            label: "Confirmed".to_string(),
            value: confirmed,
        },
        StatCard {
            label: "Completed".to_string(),
            value: completed,
        },
    ];

    Ok(render(ReceptionDashboardTemplate {
        staff_name: auth.display_name.clone(),
        branch_name,
        stats,
        today: todays.into_iter().map(to_view).collect(),
    }))
}

async fn list_appointments(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    query: web::Query<AppointmentFilter>,
) -> Result<HttpResponse> {
    let Some(branch_id) = resolve_branch(&state, &auth, query.branch.as_deref()).await else {
        return Ok(HttpResponse::NotFound().body("No branch configured"));
    };

    let status_filter = query.status.clone().unwrap_or_default();
    let date_filter = query.date.clone().unwrap_or_default();

    let rows = appointments::appointments_by_branch(
        &state.db,
        &branch_id,
        Some(date_filter.as_str()).filter(|d| !d.is_empty()),
        Some(status_filter.as_str()).filter(|s| !s.is_empty()),
    )
    .await
    .unwrap_or_default();

    Ok(render(ReceptionAppointmentsTemplate {
        appointments: rows.into_iter().map(to_view).collect(),
        status_filter,
        date_filter,
        branch_id,
    }))
}

async fn appointment_detail(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let appointment_id = path.into_inner();
    let row = appointments::appointment_by_id(&state.db, &appointment_id)
        .await
        .unwrap_or(None);

    let Some(row) = row else {
        return Ok(HttpResponse::NotFound().body("Appointment not found"));
    };

    let statuses = APPOINTMENT_STATUSES
        .iter()
        .map(|value| StatusOption {
            value: value.to_string(),
            selected: row.status == *value,
        })
        .collect();

    let lines = row
        .services
        .0
        .iter()
        .map(|service| {
            let assignment = row
                .stylists
                .0
                .iter()
                .find(|entry| entry.service_id == service.id);
            ServiceLine {
                service_id: service.id.clone(),
                service_name: service.name.clone(),
                stylist_name: assignment
                    .map(|entry| entry.stylist_name.clone())
                    .unwrap_or_else(|| "Unassigned".to_string()),
                assigned: assignment.is_some(),
            }
        })
        .collect();

    // Stylists with a schedule exception that day are still selectable, but
    // the option says so.
    let mut stylists = Vec::new();
    for user in users::stylists_by_branch(&state.db, Some(row.branch_id.as_str()), None)
        .await
        .unwrap_or_default()
    {
        let status = schedules::effective_status(&state.db, &user.id, &row.date)
            .await
            .unwrap_or_else(|_| SLOT_AVAILABLE.to_string());
        let display_name = if status == SLOT_AVAILABLE {
            user.display_name()
        } else {
            format!("{} ({status} that day)", user.display_name())
        };
        stylists.push(StylistOption {
            id: user.id,
            display_name,
        });
    }

    Ok(render(ReceptionAppointmentDetailTemplate {
        appointment: to_view(row),
        statuses,
        lines,
        stylists,
    }))
}

async fn update_status(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
    form: web::Form<StatusForm>,
) -> Result<HttpResponse> {
    let appointment_id = path.into_inner();
    let status = form.into_inner().status;
    if !APPOINTMENT_STATUSES.contains(&status.as_str()) {
        return Ok(HttpResponse::BadRequest().body("Invalid status"));
    }

    let updated = appointments::update_status(&state.db, &appointment_id, &status)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    let Some(updated) = updated else {
        return Ok(HttpResponse::NotFound().body("Appointment not found"));
    };

    log_activity(
        &state.db,
        "appointment_status_update",
        &format!(
            "{} set appointment {} to {}.",
            auth.display_name, appointment_id, status
        ),
        Some(&auth.id),
        Some(&appointment_id),
    )
    .await;

    let status_url = format!("/status/{appointment_id}");
    push::notify_appointment(
        &state,
        &appointment_id,
        "Appointment updated",
        &format!("Status changed to {}.", status),
        Some(status_url.as_str()),
    )
    .await;

    // Registered clients earn a point per currency unit when the visit
    // completes.
    if status == STATUS_COMPLETED {
        if let Some(email) = updated.client_email.as_deref() {
            if let Ok(Some(client)) = users::client_by_email(&state.db, email).await {
                if client.role == ROLE_CLIENT {
                    let points = updated.total_cost.floor() as i64;
                    if points > 0 {
                        if let Err(err) = users::award_loyalty(
                            &state.db,
                            &client.id,
                            Some(&appointment_id),
                            points,
                            "appointment completed",
                        )
                        .await
                        {
                            log::warn!("Loyalty award failed for {}: {err}", client.id);
                        }
                    }
                }
            }
        }
    }

    let _ = state
        .events
        .send(ServerEvent::from_appointment("appointment_updated", &updated));

    Ok(HttpResponse::SeeOther()
        .append_header((header::LOCATION, format!("/reception/appointments/{appointment_id}")))
        .finish())
}

async fn assign_stylist(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
    form: web::Form<AssignForm>,
) -> Result<HttpResponse> {
    let appointment_id = path.into_inner();
    let form = form.into_inner();

    let row = appointments::appointment_by_id(&state.db, &appointment_id)
        .await
        .unwrap_or(None);
    let Some(row) = row else {
        return Ok(HttpResponse::NotFound().body("Appointment not found"));
    };

    let Some(service) = row
        .services
        .0
        .iter()
        .find(|service| service.id == form.service_id)
    else {
        return Ok(HttpResponse::BadRequest().body("Service is not part of this appointment"));
    };

    let stylist = users::user_by_id(&state.db, &form.stylist_id)
        .await
        .unwrap_or(None);
    let Some(stylist) = stylist else {
        return Ok(HttpResponse::NotFound().body("Stylist not found"));
    };

    // Warn-only check: the grid allows overriding the skill matrix but the
    // mismatch is logged for the branch manager.
    let qualified = staff_services::services_for_staff(&state.db, &stylist.id)
        .await
        .unwrap_or_default()
        .iter()
        .any(|link| link.service_id == service.id);
    if !qualified {
        log::warn!(
            "Stylist {} assigned to service {} without a staff_services link.",
            stylist.id,
            service.id
        );
    }

    let updated = appointments::assign_stylist(
        &state.db,
        &appointment_id,
        StylistAssignment {
            service_id: service.id.clone(),
            service_name: service.name.clone(),
            stylist_id: stylist.id.clone(),
            stylist_name: stylist.display_name(),
        },
    )
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;

    log_activity(
        &state.db,
        "stylist_assigned",
        &format!(
            "{} assigned {} to {} on appointment {}.",
            auth.display_name,
            stylist.display_name(),
            service.name,
            appointment_id
        ),
        Some(&auth.id),
        Some(&appointment_id),
    )
    .await;

    if let Some(updated) = updated {
        let _ = state
            .events
            .send(ServerEvent::from_appointment("appointment_updated", &updated));
    }

    Ok(HttpResponse::SeeOther()
        .append_header((header::LOCATION, format!("/reception/appointments/{appointment_id}")))
        .finish())
}

async fn delete_appointment(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let appointment_id = path.into_inner();

    let row = appointments::appointment_by_id(&state.db, &appointment_id)
        .await
        .unwrap_or(None);
    let Some(row) = row else {
        return Ok(HttpResponse::NotFound().body("Appointment not found"));
    };

    appointments::delete_appointment(&state.db, &appointment_id)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    log_activity(
        &state.db,
        "appointment_deleted",
        &format!("{} deleted appointment {}.", auth.display_name, appointment_id),
        Some(&auth.id),
        Some(&appointment_id),
    )
    .await;

    let _ = state
        .events
        .send(ServerEvent::from_appointment("appointment_deleted", &row));

    Ok(HttpResponse::SeeOther()
        .append_header((header::LOCATION, "/reception/appointments"))
        .finish())
}

fn to_view(row: AppointmentRow) -> AppointmentView {
    let notes = row.notes.clone().unwrap_or_default();
    let client_email = row.client_email.clone().unwrap_or_default();
    let services = row
        .services
        .0
        .iter()
        .map(|s| s.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let stylists = if row.stylists.0.is_empty() {
        "Unassigned".to_string()
    } else {
        row.stylists
            .0
            .iter()
            .map(|s| s.stylist_name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };

    AppointmentView {
        id: row.id,
        client_name: format!("{} {}", row.client_first_name, row.client_last_name),
        client_phone: row.client_phone,
        has_email: !client_email.trim().is_empty(),
        client_email,
        date: row.date,
        time: row.time,
        services,
        stylists,
        status: row.status,
        total_cost: format!("{:.2}", row.total_cost),
        has_notes: !notes.trim().is_empty(),
        notes,
    }
}
