use std::collections::BTreeMap;

use actix_web::{http::header, middleware::from_fn, web, HttpResponse, Result};
use actix_web_httpauth::middleware::HttpAuthentication;
use askama::Template;
use chrono::{Duration, Utc};
use serde::Deserialize;

use crate::{
    auth::{logout_guard, manager_validator, AuthUser},
    db::log_activity,
    models::{ScheduleRow, ServiceRow, SLOT_STATUSES},
    services::{branches, catalog, schedules, staff_services, users},
    state::{AppState, ServerEvent},
    templates::render,
};

const WEEKDAYS: &[&str] = &[
    "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday",
];

#[derive(Clone, Debug)]
struct HoursRow {
    day: String,
    entry: String,
}

#[derive(Clone, Debug)]
struct ServiceView {
    id: String,
    name: String,
    category: String,
    price: String,
    duration: i64,
    archived_at: String,
}

#[derive(Clone, Debug)]
struct ScheduleView {
    stylist_name: String,
    date: String,
    start_time: String,
    end_time: String,
    status: String,
    notes: String,
}

#[derive(Clone, Debug)]
struct StylistOption {
    id: String,
    display_name: String,
}

#[derive(Clone, Debug)]
struct StatusOption {
    value: String,
}

#[derive(Template)]
#[template(path = "manager_dashboard.html")]
struct ManagerDashboardTemplate {
    manager_name: String,
    branch_name: String,
    stylist_count: usize,
    service_count: usize,
    today_exceptions: Vec<ScheduleView>,
}

#[derive(Template)]
#[template(path = "manager_hours.html")]
struct ManagerHoursTemplate {
    branch_name: String,
    rows: Vec<HoursRow>,
    errors: Vec<String>,
    saved: bool,
}

#[derive(Clone, Debug)]
struct SkillLink {
    staff_id: String,
    service_id: String,
    stylist_name: String,
    service_name: String,
}

#[derive(Template)]
#[template(path = "manager_services.html")]
struct ManagerServicesTemplate {
    active: Vec<ServiceView>,
    archived: Vec<ServiceView>,
    stylists: Vec<StylistOption>,
    links: Vec<SkillLink>,
    errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "manager_schedule.html")]
struct ManagerScheduleTemplate {
    branch_id: String,
    from: String,
    to: String,
    overrides: Vec<ScheduleView>,
    stylists: Vec<StylistOption>,
    statuses: Vec<StatusOption>,
}

#[derive(Deserialize)]
struct HoursForm {
    monday: String,
    tuesday: String,
    wednesday: String,
    thursday: String,
    friday: String,
    saturday: String,
    sunday: String,
}

#[derive(Deserialize)]
struct ServiceForm {
    name: String,
    description: Option<String>,
    category: Option<String>,
    price: String,
    duration_minutes: String,
}

#[derive(Deserialize)]
struct ScheduleRange {
    from: Option<String>,
    to: Option<String>,
}

#[derive(Deserialize)]
struct SlotForm {
    stylist_id: String,
    date: String,
    start_time: String,
    end_time: String,
    status: String,
    notes: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/manager")
            .wrap(HttpAuthentication::basic(manager_validator))
            .wrap(from_fn(logout_guard))
            .service(web::resource("").route(web::get().to(index)))
            .service(web::resource("/").route(web::get().to(index)))
            .service(web::resource("/dashboard").route(web::get().to(dashboard)))
            .service(
                web::resource("/hours")
                    .route(web::get().to(show_hours))
                    .route(web::post().to(save_hours)),
            )
            .service(
                web::resource("/services")
                    .route(web::get().to(list_services))
                    .route(web::post().to(create_service)),
            )
            .service(web::resource("/services/{id}").route(web::post().to(update_service)))
            .service(web::resource("/skills/assign").route(web::post().to(assign_skill)))
            .service(web::resource("/skills/unassign").route(web::post().to(unassign_skill)))
            .service(web::resource("/services/{id}/archive").route(web::post().to(archive_service)))
            .service(web::resource("/services/{id}/unarchive").route(web::post().to(unarchive_service)))
            .service(web::resource("/schedule").route(web::get().to(show_schedule)))
            .service(web::resource("/schedule/set").route(web::post().to(set_slot))),
    );
}

async fn index() -> HttpResponse {
    HttpResponse::Found()
        .append_header((header::LOCATION, "/manager/dashboard"))
        .finish()
}

async fn manager_branch(
    state: &web::Data<AppState>,
    auth: &AuthUser,
) -> Option<crate::models::BranchRow> {
    if let Some(branch_id) = &auth.branch_id {
        return branches::branch_by_id(&state.db, branch_id).await.ok()?;
    }
    branches::all_branches(&state.db)
        .await
        .ok()?
        .into_iter()
        .next()
}

async fn dashboard(state: web::Data<AppState>, auth: web::ReqData<AuthUser>) -> Result<HttpResponse> {
    let Some(branch) = manager_branch(&state, &auth).await else {
        return Ok(HttpResponse::NotFound().body("No branch configured"));
    };

    let stylists = users::stylists_by_branch(&state.db, Some(branch.id.as_str()), None)
        .await
        .unwrap_or_default();
    let services = catalog::services_by_branch(&state.db, &branch.id)
        .await
        .unwrap_or_default();

    let today = Utc::now().format("%Y-%m-%d").to_string();
    let exceptions = schedules::schedules_by_date(&state.db, &branch.id, &today)
        .await
        .unwrap_or_default();
    let today_exceptions = schedule_views(&state, exceptions).await;

    Ok(render(ManagerDashboardTemplate {
        manager_name: auth.display_name.clone(),
        branch_name: branch.name,
        stylist_count: stylists.len(),
        service_count: services.len(),
        today_exceptions,
    }))
}

async fn show_hours(state: web::Data<AppState>, auth: web::ReqData<AuthUser>) -> Result<HttpResponse> {
    let Some(branch) = manager_branch(&state, &auth).await else {
        return Ok(HttpResponse::NotFound().body("No branch configured"));
    };

    Ok(render(ManagerHoursTemplate {
        branch_name: branch.name.clone(),
        rows: hours_rows(&branch.operating_hours.0),
        errors: Vec::new(),
        saved: false,
    }))
}

async fn save_hours(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    form: web::Form<HoursForm>,
) -> Result<HttpResponse> {
    let Some(branch) = manager_branch(&state, &auth).await else {
        return Ok(HttpResponse::NotFound().body("No branch configured"));
    };

    let form = form.into_inner();
    let entries = [
        ("Monday", form.monday),
        ("Tuesday", form.tuesday),
        ("Wednesday", form.wednesday),
        ("Thursday", form.thursday),
        ("Friday", form.friday),
        ("Saturday", form.saturday),
        ("Sunday", form.sunday),
    ];

    let mut hours = BTreeMap::new();
    let mut errors = Vec::new();
    for (day, entry) in entries {
        let entry = entry.trim().to_string();
        if entry.is_empty() || entry == branches::CLOSED {
            hours.insert(day.to_string(), branches::CLOSED.to_string());
            continue;
        }
        if branches::parse_hours_range(&entry).is_none() {
            errors.push(format!("{day}: \"{entry}\" is not a valid range (e.g. 9:00 AM - 5:00 PM)."));
        }
        hours.insert(day.to_string(), entry);
    }

    if !errors.is_empty() {
        return Ok(render(ManagerHoursTemplate {
            branch_name: branch.name.clone(),
            rows: hours_rows(&hours),
            errors,
            saved: false,
        }));
    }

    let updated = branches::update_operating_hours(&state.db, &branch.id, hours)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    let Some(updated) = updated else {
        return Ok(HttpResponse::NotFound().body("Branch not found"));
    };

    log_activity(
        &state.db,
        "operating_hours_updated",
        &format!("{} updated operating hours for {}.", auth.display_name, updated.name),
        Some(&auth.id),
        None,
    )
    .await;

    Ok(render(ManagerHoursTemplate {
        branch_name: updated.name.clone(),
        rows: hours_rows(&updated.operating_hours.0),
        errors: Vec::new(),
        saved: true,
    }))
}

async fn list_services(state: web::Data<AppState>, auth: web::ReqData<AuthUser>) -> Result<HttpResponse> {
    let Some(branch) = manager_branch(&state, &auth).await else {
        return Ok(HttpResponse::NotFound().body("No branch configured"));
    };
    render_services(&state, &branch.id, Vec::new()).await
}

async fn render_services(
    state: &web::Data<AppState>,
    branch_id: &str,
    errors: Vec<String>,
) -> Result<HttpResponse> {
    let active = catalog::services_by_branch(&state.db, branch_id)
        .await
        .unwrap_or_default();
    let archived = catalog::archived_services_by_branch(&state.db, branch_id)
        .await
        .unwrap_or_default();
    let stylist_rows = users::stylists_by_branch(&state.db, Some(branch_id), None)
        .await
        .unwrap_or_default();

    let links = staff_services::links_for_branch(&state.db, branch_id)
        .await
        .unwrap_or_default()
        .into_iter()
        .map(|link| SkillLink {
            stylist_name: stylist_rows
                .iter()
                .find(|user| user.id == link.staff_id)
                .map(|user| user.display_name())
                .unwrap_or_else(|| link.staff_id.clone()),
            service_name: active
                .iter()
                .find(|service| service.id == link.service_id)
                .map(|service| service.name.clone())
                .unwrap_or_else(|| link.service_id.clone()),
            staff_id: link.staff_id,
            service_id: link.service_id,
        })
        .collect();

    Ok(render(ManagerServicesTemplate {
        active: active.iter().map(service_view).collect(),
        archived: archived.iter().map(service_view).collect(),
        stylists: stylist_rows
            .into_iter()
            .map(|user| StylistOption {
                display_name: user.display_name(),
                id: user.id,
            })
            .collect(),
        links,
        errors,
    }))
}

#[derive(Deserialize)]
struct SkillForm {
    stylist_id: String,
    service_id: String,
}

async fn assign_skill(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    form: web::Form<SkillForm>,
) -> Result<HttpResponse> {
    let Some(branch) = manager_branch(&state, &auth).await else {
        return Ok(HttpResponse::NotFound().body("No branch configured"));
    };

    let form = form.into_inner();
    staff_services::assign(&state.db, &form.stylist_id, &form.service_id, &branch.id)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    log_activity(
        &state.db,
        "skill_assigned",
        &format!(
            "{} linked stylist {} to service {}.",
            auth.display_name, form.stylist_id, form.service_id
        ),
        Some(&auth.id),
        None,
    )
    .await;

    Ok(HttpResponse::SeeOther()
        .append_header((header::LOCATION, "/manager/services"))
        .finish())
}

async fn unassign_skill(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    form: web::Form<SkillForm>,
) -> Result<HttpResponse> {
    let form = form.into_inner();
    staff_services::unassign(&state.db, &form.stylist_id, &form.service_id)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    log_activity(
        &state.db,
        "skill_unassigned",
        &format!(
            "{} unlinked stylist {} from service {}.",
            auth.display_name, form.stylist_id, form.service_id
        ),
        Some(&auth.id),
        None,
    )
    .await;

    Ok(HttpResponse::SeeOther()
        .append_header((header::LOCATION, "/manager/services"))
        .finish())
}

async fn create_service(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    form: web::Form<ServiceForm>,
) -> Result<HttpResponse> {
    let Some(branch) = manager_branch(&state, &auth).await else {
        return Ok(HttpResponse::NotFound().body("No branch configured"));
    };

    let form = form.into_inner();
    let mut errors = Vec::new();
    if form.name.trim().is_empty() {
        errors.push("Service name is required.".to_string());
    }
    let price = form.price.trim().parse::<f64>().unwrap_or(-1.0);
    if price < 0.0 {
        errors.push("Price must be a non-negative number.".to_string());
    }
    let duration = form.duration_minutes.trim().parse::<i64>().unwrap_or(0);
    if duration <= 0 {
        errors.push("Duration must be a positive number of minutes.".to_string());
    }

    if !errors.is_empty() {
        return render_services(&state, &branch.id, errors).await;
    }

    let service = catalog::create_branch_service(
        &state.db,
        catalog::NewService {
            name: form.name.trim().to_string(),
            description: form.description.filter(|d| !d.trim().is_empty()),
            category: form.category.filter(|c| !c.trim().is_empty()),
            price,
            duration_minutes: duration,
            image_url: None,
            branch_id: Some(branch.id.clone()),
        },
    )
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;

    log_activity(
        &state.db,
        "service_created",
        &format!("{} added service {} at {}.", auth.display_name, service.name, branch.name),
        Some(&auth.id),
        None,
    )
    .await;

    Ok(HttpResponse::SeeOther()
        .append_header((header::LOCATION, "/manager/services"))
        .finish())
}

async fn update_service(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
    form: web::Form<ServiceForm>,
) -> Result<HttpResponse> {
    let service_id = path.into_inner();
    let form = form.into_inner();

    let price = form.price.trim().parse::<f64>().unwrap_or(-1.0);
    let duration = form.duration_minutes.trim().parse::<i64>().unwrap_or(0);
    if form.name.trim().is_empty() || price < 0.0 || duration <= 0 {
        return Ok(HttpResponse::BadRequest().body("Invalid service fields"));
    }

    catalog::update_branch_service(
        &state.db,
        &service_id,
        form.name.trim(),
        form.description.as_deref().filter(|d| !d.trim().is_empty()),
        form.category.as_deref().filter(|c| !c.trim().is_empty()),
        price,
        duration,
    )
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;

    log_activity(
        &state.db,
        "service_updated",
        &format!("{} updated service {}.", auth.display_name, service_id),
        Some(&auth.id),
        None,
    )
    .await;

    Ok(HttpResponse::SeeOther()
        .append_header((header::LOCATION, "/manager/services"))
        .finish())
}

async fn archive_service(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let service_id = path.into_inner();
    let archived = catalog::archive_service(&state.db, &service_id)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    let Some(archived) = archived else {
        return Ok(HttpResponse::NotFound().body("Service not found"));
    };

    log_activity(
        &state.db,
        "service_archived",
        &format!("{} archived service {}.", auth.display_name, archived.name),
        Some(&auth.id),
        None,
    )
    .await;

    Ok(HttpResponse::SeeOther()
        .append_header((header::LOCATION, "/manager/services"))
        .finish())
}

async fn unarchive_service(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let service_id = path.into_inner();
    let restored = catalog::unarchive_service(&state.db, &service_id)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    let Some(restored) = restored else {
        return Ok(HttpResponse::NotFound().body("Service not found"));
    };

    log_activity(
        &state.db,
        "service_unarchived",
        &format!("{} restored service {}.", auth.display_name, restored.name),
        Some(&auth.id),
        None,
    )
    .await;

    Ok(HttpResponse::SeeOther()
        .append_header((header::LOCATION, "/manager/services"))
        .finish())
}

async fn show_schedule(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    query: web::Query<ScheduleRange>,
) -> Result<HttpResponse> {
    let Some(branch) = manager_branch(&state, &auth).await else {
        return Ok(HttpResponse::NotFound().body("No branch configured"));
    };

    let today = Utc::now().date_naive();
    let from = query
        .from
        .clone()
        .unwrap_or_else(|| today.format("%Y-%m-%d").to_string());
    let to = query
        .to
        .clone()
        .unwrap_or_else(|| (today + Duration::days(6)).format("%Y-%m-%d").to_string());

    let overrides = schedules::branch_schedules(&state.db, &branch.id, &from, &to)
        .await
        .unwrap_or_default();
    let overrides = schedule_views(&state, overrides).await;

    let stylists = users::stylists_by_branch(&state.db, Some(branch.id.as_str()), None)
        .await
        .unwrap_or_default()
        .into_iter()
        .map(|user| StylistOption {
            display_name: user.display_name(),
            id: user.id,
        })
        .collect();

    Ok(render(ManagerScheduleTemplate {
        branch_id: branch.id,
        from,
        to,
        overrides,
        stylists,
        statuses: SLOT_STATUSES
            .iter()
            .map(|value| StatusOption {
                value: value.to_string(),
            })
            .collect(),
    }))
}

async fn set_slot(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    form: web::Form<SlotForm>,
) -> Result<HttpResponse> {
    let Some(branch) = manager_branch(&state, &auth).await else {
        return Ok(HttpResponse::NotFound().body("No branch configured"));
    };

    let form = form.into_inner();
    if !SLOT_STATUSES.contains(&form.status.as_str()) {
        return Ok(HttpResponse::BadRequest().body("Invalid slot status"));
    }

    let change = schedules::set_availability(
        &state.db,
        &form.stylist_id,
        &branch.id,
        &form.date,
        &schedules::SlotInput {
            start_time: form.start_time,
            end_time: form.end_time,
            status: form.status.clone(),
            notes: form.notes.filter(|n| !n.trim().is_empty()),
        },
    )
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;

    match &change {
        schedules::SlotChange::Stored(row) => {
            let _ = state
                .events
                .send(ServerEvent::from_schedule("schedule_updated", row));
        }
        schedules::SlotChange::Cleared => {
            let _ = state.events.send(ServerEvent::schedule_cleared(
                &branch.id,
                &form.stylist_id,
                &form.date,
            ));
        }
        schedules::SlotChange::Unchanged => {}
    }

    if !matches!(change, schedules::SlotChange::Unchanged) {
        log_activity(
            &state.db,
            "schedule_updated",
            &format!(
                "{} set {} on {} to {}.",
                auth.display_name, form.stylist_id, form.date, form.status
            ),
            Some(&auth.id),
            None,
        )
        .await;
    }

    Ok(HttpResponse::SeeOther()
        .append_header((header::LOCATION, "/manager/schedule"))
        .finish())
}

fn hours_rows(hours: &BTreeMap<String, String>) -> Vec<HoursRow> {
    WEEKDAYS
        .iter()
        .map(|day| HoursRow {
            day: day.to_string(),
            entry: hours
                .get(*day)
                .cloned()
                .unwrap_or_else(|| branches::CLOSED.to_string()),
        })
        .collect()
}

fn service_view(service: &ServiceRow) -> ServiceView {
    ServiceView {
        id: service.id.clone(),
        name: service.name.clone(),
        category: service.category.clone().unwrap_or_default(),
        price: format!("{:.2}", service.price),
        duration: service.duration_minutes,
        archived_at: service.archived_at.clone().unwrap_or_default(),
    }
}

async fn schedule_views(state: &web::Data<AppState>, rows: Vec<ScheduleRow>) -> Vec<ScheduleView> {
    let mut views = Vec::with_capacity(rows.len());
    for row in rows {
        let stylist_name = users::user_by_id(&state.db, &row.stylist_id)
            .await
            .unwrap_or(None)
            .map(|user| user.display_name())
            .unwrap_or_else(|| row.stylist_id.clone());
        views.push(ScheduleView {
            stylist_name,
            date: row.date,
            start_time: row.start_time,
            end_time: row.end_time,
            status: row.status,
            notes: row.notes.unwrap_or_default(),
        });
    }
    views
}
