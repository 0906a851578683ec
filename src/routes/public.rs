use actix_web::{http::header, web, HttpRequest, HttpResponse, Result};
use actix_web::http::header::Header;
use actix_web_httpauth::headers::authorization::{Authorization, Basic};
use askama::Template;
use serde::Deserialize;
use serde_json::json;

use crate::{
    auth::{
        authenticate_credentials, clear_logout_cookie, dashboard_for_role, logout_cookie,
        AUTH_REALM,
    },
    db::log_activity,
    models::{BookedService, BranchRow, ServiceRow, StylistAssignment, UserRow, ROLE_CLIENT},
    push,
    services::{appointments, branches, catalog, users},
    state::{AppState, ServerEvent},
    templates::render,
};

#[derive(Clone, Debug)]
struct BranchCard {
    id: String,
    name: String,
    address: String,
    phone: String,
    selected: bool,
}

#[derive(Clone, Debug)]
struct ServiceView {
    id: String,
    name: String,
    category: String,
    duration: i64,
    price: String,
    description: String,
    selected: bool,
}

#[derive(Clone, Debug)]
struct StylistCard {
    id: String,
    display_name: String,
    initials: String,
    skills: String,
    selected: bool,
}

#[derive(Template)]
#[template(path = "home.html")]
struct HomeTemplate {
    branches: Vec<BranchCard>,
    services: Vec<ServiceView>,
}

#[derive(Clone, Debug, Default)]
struct BookingView {
    client_first_name: String,
    client_last_name: String,
    client_phone: String,
    client_email: String,
    date: String,
    time: String,
    notes: String,
}

#[derive(Template)]
#[template(path = "book.html")]
struct BookingTemplate {
    branches: Vec<BranchCard>,
    services: Vec<ServiceView>,
    stylists: Vec<StylistCard>,
    form: BookingView,
    errors: Vec<String>,
    vapid_public_key: String,
}

#[derive(Template)]
#[template(path = "book_success.html")]
struct BookingSuccessTemplate {
    appointment_id: String,
    vapid_public_key: String,
}

#[derive(Template)]
#[template(path = "status.html")]
struct StatusTemplate {
    appointment_id: String,
    found: bool,
    client_name: String,
    date: String,
    time: String,
    services: String,
    stylists: String,
    status: String,
    total_cost: String,
}

#[derive(Template)]
#[template(path = "stylists.html")]
struct StylistsTemplate {
    stylists: Vec<StylistCard>,
}

#[derive(Deserialize)]
struct BookingForm {
    branch_id: String,
    date: String,
    time: String,
    client_first_name: String,
    client_last_name: String,
    client_phone: String,
    client_email: Option<String>,
    service_ids: String,
    preferred_stylist_id: Option<String>,
    notes: Option<String>,
    push_subscription: Option<String>,
}

#[derive(Deserialize)]
struct BookingQuery {
    branch: Option<String>,
}

#[derive(Deserialize)]
struct SlotsQuery {
    date: String,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(home)))
        .service(
            web::resource("/book")
                .route(web::get().to(show_booking))
                .route(web::post().to(create_booking)),
        )
        .service(web::resource("/stylists").route(web::get().to(list_stylists)))
        .service(web::resource("/branches/{id}/slots").route(web::get().to(branch_slots)))
        .service(web::resource("/status/{id}").route(web::get().to(status_page)))
        .service(web::resource("/status/{id}/subscribe").route(web::post().to(subscribe_notifications)))
        .service(web::resource("/login").route(web::get().to(login)))
        .service(web::resource("/logout").route(web::get().to(logout)))
        .service(web::resource("/health").route(web::get().to(health)));
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().body("ok")
}

async fn logout(req: HttpRequest) -> HttpResponse {
    HttpResponse::SeeOther()
        .append_header((header::LOCATION, "/"))
        .cookie(logout_cookie(&req))
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .finish()
}

#[derive(Deserialize)]
struct LoginQuery {
    next: Option<String>,
}

async fn login(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<LoginQuery>,
) -> HttpResponse {
    let auth = match Authorization::<Basic>::parse(&req) {
        Ok(auth) => auth,
        Err(_) => return auth_challenge(),
    };
    let credentials = auth.into_scheme();
    let email = credentials.user_id();
    let password = credentials.password().unwrap_or_default();

    let user = match authenticate_credentials(&state, email, password).await {
        Some(user) => user,
        None => return auth_challenge(),
    };

    let fallback = dashboard_for_role(&user.role);
    let requested = query.next.as_deref().unwrap_or("");
    let redirect = if user.role != ROLE_CLIENT
        && requested.starts_with('/')
        && scope_prefix(fallback).is_some_and(|prefix| requested.starts_with(prefix))
    {
        requested
    } else {
        fallback
    };

    HttpResponse::SeeOther()
        .append_header((header::LOCATION, redirect))
        .cookie(clear_logout_cookie(&req))
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .finish()
}

/// "/reception/dashboard" -> "/reception"
fn scope_prefix(dashboard: &str) -> Option<&str> {
    dashboard.strip_suffix("/dashboard")
}

fn auth_challenge() -> HttpResponse {
    HttpResponse::Unauthorized()
        .insert_header((header::WWW_AUTHENTICATE, format!("Basic realm=\"{}\"", AUTH_REALM)))
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .finish()
}

async fn home(state: web::Data<AppState>) -> Result<HttpResponse> {
    let branches = branches::all_branches(&state.db).await.unwrap_or_default();
    let services = catalog::global_services(&state.db).await.unwrap_or_default();

    Ok(render(HomeTemplate {
        branches: branches.iter().map(|b| branch_card(b, None)).collect(),
        services: services.iter().map(|s| service_view(s, &[])).collect(),
    }))
}

async fn list_stylists(state: web::Data<AppState>) -> Result<HttpResponse> {
    let stylists = users::stylists_by_branch(&state.db, None, None)
        .await
        .unwrap_or_default();
    Ok(render(StylistsTemplate {
        stylists: stylists.iter().map(|u| stylist_card(u, None)).collect(),
    }))
}

async fn show_booking(
    state: web::Data<AppState>,
    query: web::Query<BookingQuery>,
) -> Result<HttpResponse> {
    let branch_rows = branches::all_branches(&state.db).await.unwrap_or_default();
    let selected_branch = query
        .branch
        .clone()
        .or_else(|| branch_rows.first().map(|b| b.id.clone()));

    let services = match selected_branch.as_deref() {
        Some(branch_id) => catalog::services_by_branch(&state.db, branch_id)
            .await
            .unwrap_or_default(),
        None => Vec::new(),
    };
    let stylists = users::stylists_by_branch(&state.db, selected_branch.as_deref(), None)
        .await
        .unwrap_or_default();

    Ok(render(BookingTemplate {
        branches: branch_rows
            .iter()
            .map(|b| branch_card(b, selected_branch.as_deref()))
            .collect(),
        services: services.iter().map(|s| service_view(s, &[])).collect(),
        stylists: stylists.iter().map(|u| stylist_card(u, None)).collect(),
        form: BookingView::default(),
        errors: Vec::new(),
        vapid_public_key: state.push.public_key.clone(),
    }))
}

async fn create_booking(
    state: web::Data<AppState>,
    form: web::Form<BookingForm>,
) -> Result<HttpResponse> {
    let form = form.into_inner();
    let mut errors = Vec::new();

    if form.client_first_name.trim().is_empty() {
        errors.push("First name is required.".to_string());
    }
    if form.client_last_name.trim().is_empty() {
        errors.push("Last name is required.".to_string());
    }
    if form.client_phone.trim().is_empty() {
        errors.push("Phone number is required.".to_string());
    }
    if form.date.trim().is_empty() {
        errors.push("Please pick a date.".to_string());
    }

    let service_ids: Vec<String> = form
        .service_ids
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();
    if service_ids.is_empty() {
        errors.push("Please select at least one service.".to_string());
    }

    let branch = branches::branch_by_id(&state.db, &form.branch_id)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;
    let Some(branch) = branch else {
        errors.push("Please select a branch.".to_string());
        return rerender_booking(&state, form, errors).await;
    };

    if !form.date.trim().is_empty() {
        let slots = branches::time_slots_for(&branch, form.date.trim());
        if slots.is_empty() {
            errors.push("The branch is closed on that date.".to_string());
        } else if !slots.iter().any(|slot| slot == form.time.trim()) {
            errors.push("Please pick a time inside the branch's opening hours.".to_string());
        }
    }

    let mut booked = Vec::new();
    for id in &service_ids {
        match catalog::service_by_id(&state.db, id)
            .await
            .map_err(actix_web::error::ErrorInternalServerError)?
        {
            Some(service) if service.archived == 0 => booked.push(BookedService {
                id: service.id,
                name: service.name,
                duration: service.duration_minutes,
                price: service.price,
            }),
            _ => errors.push("One of the selected services is unavailable.".to_string()),
        }
    }

    if !errors.is_empty() {
        return rerender_booking(&state, form, errors).await;
    }

    let stylists = match form.preferred_stylist_id.as_deref().filter(|id| !id.trim().is_empty()) {
        Some(stylist_id) => {
            match users::user_by_id(&state.db, stylist_id)
                .await
                .map_err(actix_web::error::ErrorInternalServerError)?
            {
                Some(stylist) => booked
                    .iter()
                    .map(|service| StylistAssignment {
                        service_id: service.id.clone(),
                        service_name: service.name.clone(),
                        stylist_id: stylist.id.clone(),
                        stylist_name: stylist.display_name(),
                    })
                    .collect(),
                None => Vec::new(),
            }
        }
        None => Vec::new(),
    };

    let appointment = appointments::create_appointment(
        &state.db,
        appointments::NewAppointment {
            branch_id: branch.id.clone(),
            date: form.date.trim().to_string(),
            time: form.time.trim().to_string(),
            client_first_name: form.client_first_name.trim().to_string(),
            client_last_name: form.client_last_name.trim().to_string(),
            client_phone: form.client_phone.trim().to_string(),
            client_email: form
                .client_email
                .as_deref()
                .map(str::trim)
                .filter(|email| !email.is_empty())
                .map(str::to_string),
            services: booked,
            stylists,
            status: None,
            total_cost: None,
            notes: form.notes.clone(),
        },
    )
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;

    log_activity(
        &state.db,
        "appointment_created",
        &format!(
            "New appointment requested by {} at {}.",
            appointment.client_name(),
            branch.name
        ),
        None,
        Some(&appointment.id),
    )
    .await;

    if let Some(subscription) = form
        .push_subscription
        .as_deref()
        .filter(|value| !value.trim().is_empty())
    {
        let _ = push::store_subscription(&state.db, &appointment.id, subscription).await;
        let status_url = format!("/status/{}", appointment.id);
        push::notify_appointment(
            &state,
            &appointment.id,
            "Appointment request received",
            "We received your booking request. We'll confirm shortly.",
            Some(status_url.as_str()),
        )
        .await;
    }

    let _ = state
        .events
        .send(ServerEvent::from_appointment("appointment_created", &appointment));

    Ok(render(BookingSuccessTemplate {
        appointment_id: appointment.id,
        vapid_public_key: state.push.public_key.clone(),
    }))
}

async fn rerender_booking(
    state: &web::Data<AppState>,
    form: BookingForm,
    errors: Vec<String>,
) -> Result<HttpResponse> {
    let branch_rows = branches::all_branches(&state.db).await.unwrap_or_default();
    let selected: Vec<String> = form
        .service_ids
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();

    let services = catalog::services_by_branch(&state.db, &form.branch_id)
        .await
        .unwrap_or_default();
    let stylists = users::stylists_by_branch(&state.db, Some(form.branch_id.as_str()), None)
        .await
        .unwrap_or_default();

    Ok(render(BookingTemplate {
        branches: branch_rows
            .iter()
            .map(|b| branch_card(b, Some(form.branch_id.as_str())))
            .collect(),
        services: services.iter().map(|s| service_view(s, &selected)).collect(),
        stylists: stylists
            .iter()
            .map(|u| stylist_card(u, form.preferred_stylist_id.as_deref()))
            .collect(),
        form: BookingView {
            client_first_name: form.client_first_name,
            client_last_name: form.client_last_name,
            client_phone: form.client_phone,
            client_email: form.client_email.unwrap_or_default(),
            date: form.date,
            time: form.time,
            notes: form.notes.unwrap_or_default(),
        },
        errors,
        vapid_public_key: state.push.public_key.clone(),
    }))
}

async fn branch_slots(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<SlotsQuery>,
) -> Result<HttpResponse> {
    let branch_id = path.into_inner();
    let branch = branches::branch_by_id(&state.db, &branch_id)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    let Some(branch) = branch else {
        return Ok(HttpResponse::NotFound().finish());
    };

    let slots = branches::time_slots_for(&branch, &query.date);
    Ok(HttpResponse::Ok().json(json!({
        "branch_id": branch.id,
        "date": query.date,
        "slots": slots,
    })))
}

async fn status_page(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
    let appointment_id = path.into_inner();
    let row = appointments::appointment_by_id(&state.db, &appointment_id)
        .await
        .unwrap_or(None);

    let template = match row {
        Some(row) => StatusTemplate {
            appointment_id,
            found: true,
            client_name: row.client_name(),
            date: row.date.clone(),
            time: row.time.clone(),
            services: row
                .services
                .0
                .iter()
                .map(|s| s.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            stylists: if row.stylists.0.is_empty() {
                "Unassigned".to_string()
            } else {
                row.stylists
                    .0
                    .iter()
                    .map(|s| s.stylist_name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            },
            status: row.status,
            total_cost: format!("{:.2}", row.total_cost),
        },
        None => StatusTemplate {
            appointment_id,
            found: false,
            client_name: String::new(),
            date: String::new(),
            time: String::new(),
            services: String::new(),
            stylists: String::new(),
            status: String::new(),
            total_cost: String::new(),
        },
    };

    Ok(render(template))
}

async fn subscribe_notifications(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Bytes,
) -> Result<HttpResponse> {
    let appointment_id = path.into_inner();
    if appointments::appointment_by_id(&state.db, &appointment_id)
        .await
        .unwrap_or(None)
        .is_none()
    {
        return Ok(HttpResponse::NotFound().finish());
    }

    let raw = String::from_utf8(body.to_vec()).unwrap_or_default();
    if raw.trim().is_empty() {
        return Ok(HttpResponse::BadRequest().finish());
    }

    let _ = push::store_subscription(&state.db, &appointment_id, &raw).await;
    let status_url = format!("/status/{appointment_id}");
    push::notify_appointment(
        &state,
        &appointment_id,
        "Notifications enabled",
        "You'll receive updates about your appointment.",
        Some(status_url.as_str()),
    )
    .await;

    Ok(HttpResponse::Ok().json(json!({ "ok": true })))
}

fn branch_card(branch: &BranchRow, selected: Option<&str>) -> BranchCard {
    BranchCard {
        id: branch.id.clone(),
        name: branch.name.clone(),
        address: branch.address.clone(),
        phone: branch.phone.clone(),
        selected: selected == Some(branch.id.as_str()),
    }
}

fn service_view(service: &ServiceRow, selected: &[String]) -> ServiceView {
    ServiceView {
        id: service.id.clone(),
        name: service.name.clone(),
        category: service.category.clone().unwrap_or_default(),
        duration: service.duration_minutes,
        price: format!("{:.2}", service.price),
        description: service.description.clone().unwrap_or_default(),
        selected: selected.contains(&service.id),
    }
}

fn stylist_card(user: &UserRow, selected: Option<&str>) -> StylistCard {
    let display_name = user.display_name();
    let initials = display_name
        .split_whitespace()
        .filter_map(|part| part.chars().next())
        .take(2)
        .collect::<String>()
        .to_uppercase();
    StylistCard {
        id: user.id.clone(),
        display_name,
        initials,
        skills: user.skill_list().join(", "),
        selected: selected == Some(user.id.as_str()),
    }
}
