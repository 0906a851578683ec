use std::collections::BTreeMap;

use actix_web::{http::header, middleware::from_fn, web, HttpResponse, Result};
use actix_web_httpauth::middleware::HttpAuthentication;
use askama::Template;
use serde::Deserialize;

use crate::{
    auth::{admin_validator, logout_guard, AuthUser},
    db::log_activity,
    models::{ActivityRow, BranchRow, UserRow, STAFF_ROLES, STATUS_COMPLETED, STATUS_PENDING},
    services::{branches, users},
    state::AppState,
    templates::render,
};

#[derive(Clone, Debug)]
struct StatCard {
    label: String,
    value: i64,
}

#[derive(Clone, Debug)]
struct ActivityView {
    message: String,
    created_at: String,
}

#[derive(Clone, Debug)]
struct BranchView {
    name: String,
    address: String,
    phone: String,
    email: String,
    manager_name: String,
}

#[derive(Clone, Debug)]
struct StaffView {
    id: String,
    display_name: String,
    email: String,
    role: String,
    branch_name: String,
    employee_id: String,
    skills: String,
}

#[derive(Clone, Debug)]
struct ClientView {
    display_name: String,
    email: String,
    phone: String,
    loyalty_points: i64,
    referral_code: String,
}

#[derive(Clone, Debug)]
struct BranchOption {
    id: String,
    name: String,
}

#[derive(Clone, Debug)]
struct RoleOption {
    value: String,
}

#[derive(Template)]
#[template(path = "admin_dashboard.html")]
struct AdminDashboardTemplate {
    admin_name: String,
    stats: Vec<StatCard>,
    activities: Vec<ActivityView>,
}

#[derive(Template)]
#[template(path = "admin_branches.html")]
struct AdminBranchesTemplate {
    branches: Vec<BranchView>,
    errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "admin_staff.html")]
struct AdminStaffTemplate {
    staff: Vec<StaffView>,
    branches: Vec<BranchOption>,
    roles: Vec<RoleOption>,
    errors: Vec<String>,
    success: String,
    has_success: bool,
}

#[derive(Template)]
#[template(path = "admin_clients.html")]
struct AdminClientsTemplate {
    clients: Vec<ClientView>,
    errors: Vec<String>,
    success: String,
    has_success: bool,
}

#[derive(Deserialize)]
struct BranchCreateForm {
    name: String,
    address: String,
    phone: String,
    email: Option<String>,
}

#[derive(Deserialize)]
struct StaffCreateForm {
    email: String,
    phone: String,
    password: String,
    first_name: String,
    last_name: String,
    role: String,
    branch_id: Option<String>,
    employee_id: Option<String>,
    hire_date: Option<String>,
    salary: Option<String>,
    skills: Option<String>,
}

#[derive(Deserialize)]
struct ClientCreateForm {
    email: String,
    phone: String,
    first_name: String,
    last_name: String,
    birth_date: Option<String>,
    gender: Option<String>,
    category: Option<String>,
    referred_by: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .wrap(HttpAuthentication::basic(admin_validator))
            .wrap(from_fn(logout_guard))
            .service(web::resource("").route(web::get().to(index)))
            .service(web::resource("/").route(web::get().to(index)))
            .service(web::resource("/dashboard").route(web::get().to(dashboard)))
            .service(
                web::resource("/branches")
                    .route(web::get().to(list_branches))
                    .route(web::post().to(create_branch)),
            )
            .service(
                web::resource("/staff")
                    .route(web::get().to(list_staff))
                    .route(web::post().to(create_staff)),
            )
            .service(web::resource("/staff/{id}/deactivate").route(web::post().to(deactivate_staff)))
            .service(
                web::resource("/clients")
                    .route(web::get().to(list_clients))
                    .route(web::post().to(create_client)),
            ),
    );
}

async fn index() -> HttpResponse {
    HttpResponse::Found()
        .append_header((header::LOCATION, "/admin/dashboard"))
        .finish()
}

async fn dashboard(state: web::Data<AppState>, auth: web::ReqData<AuthUser>) -> Result<HttpResponse> {
    let branches = count(&state, "SELECT COUNT(*) FROM branches WHERE active = 1").await;
    let staff = count(
        &state,
        "SELECT COUNT(*) FROM users WHERE role != 'client' AND active = 1",
    )
    .await;
    let clients = count(
        &state,
        "SELECT COUNT(*) FROM users WHERE role = 'client' AND active = 1",
    )
    .await;
    let total = count(&state, "SELECT COUNT(*) FROM appointments").await;
    let pending = count_with(
        &state,
        "SELECT COUNT(*) FROM appointments WHERE status = ?",
        STATUS_PENDING,
    )
    .await;
    let completed = count_with(
        &state,
        "SELECT COUNT(*) FROM appointments WHERE status = ?",
        STATUS_COMPLETED,
    )
    .await;

    let stats = vec![
        StatCard {
            label: "Branches".to_string(),
            value: branches,
        },
        StatCard {
            label: "Staff".to_string(),
            value: staff,
        },
        StatCard {
            label: "Clients".to_string(),
            value: clients,
        },
        StatCard {
            label: "Appointments".to_string(),
            value: total,
        },
        StatCard {
            label: "Pending".to_string(),
            value: pending,
        },
        StatCard {
            label: "Completed".to_string(),
            value: completed,
        },
    ];

    let activity_rows = sqlx::query_as::<_, ActivityRow>(
        "SELECT message, created_at FROM activities ORDER BY created_at DESC LIMIT 12",
    )
    .fetch_all(&state.db)
    .await
    .unwrap_or_default();

    Ok(render(AdminDashboardTemplate {
        admin_name: auth.display_name.clone(),
        stats,
        activities: activity_rows
            .into_iter()
            .map(|row| ActivityView {
                message: row.message,
                created_at: row.created_at,
            })
            .collect(),
    }))
}

async fn list_branches(state: web::Data<AppState>) -> Result<HttpResponse> {
    render_branches(&state, Vec::new()).await
}

async fn render_branches(state: &web::Data<AppState>, errors: Vec<String>) -> Result<HttpResponse> {
    let rows = branches::all_branches(&state.db).await.unwrap_or_default();
    let mut views = Vec::with_capacity(rows.len());
    for row in &rows {
        views.push(branch_view(state, row).await);
    }
    Ok(render(AdminBranchesTemplate {
        branches: views,
        errors,
    }))
}

async fn create_branch(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    form: web::Form<BranchCreateForm>,
) -> Result<HttpResponse> {
    let form = form.into_inner();
    let mut errors = Vec::new();
    if form.name.trim().is_empty() {
        errors.push("Branch name is required.".to_string());
    }
    if form.address.trim().is_empty() {
        errors.push("Address is required.".to_string());
    }
    if form.phone.trim().is_empty() {
        errors.push("Phone is required.".to_string());
    }

    if !errors.is_empty() {
        return render_branches(&state, errors).await;
    }

    // New branches start with weekday hours; the branch manager refines them.
    let mut hours = BTreeMap::new();
    for day in ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday"] {
        hours.insert(day.to_string(), "9:00 AM - 6:00 PM".to_string());
    }
    hours.insert("Sunday".to_string(), branches::CLOSED.to_string());

    let branch = branches::create_branch(
        &state.db,
        branches::NewBranch {
            name: form.name.trim().to_string(),
            address: form.address.trim().to_string(),
            phone: form.phone.trim().to_string(),
            email: form.email.filter(|e| !e.trim().is_empty()),
            operating_hours: hours,
            manager_id: None,
        },
    )
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;

    log_activity(
        &state.db,
        "branch_created",
        &format!("{} opened branch {}.", auth.display_name, branch.name),
        Some(&auth.id),
        None,
    )
    .await;

    Ok(HttpResponse::SeeOther()
        .append_header((header::LOCATION, "/admin/branches"))
        .finish())
}

async fn list_staff(state: web::Data<AppState>) -> Result<HttpResponse> {
    render_staff(&state, Vec::new(), String::new()).await
}

async fn render_staff(
    state: &web::Data<AppState>,
    errors: Vec<String>,
    success: String,
) -> Result<HttpResponse> {
    let rows = users::staff_by_branch(&state.db, None).await.unwrap_or_default();
    let branch_rows = branches::all_branches(&state.db).await.unwrap_or_default();

    let mut staff = Vec::with_capacity(rows.len());
    for row in &rows {
        staff.push(staff_view(state, row).await);
    }

    Ok(render(AdminStaffTemplate {
        staff,
        branches: branch_rows
            .iter()
            .map(|row| BranchOption {
                id: row.id.clone(),
                name: row.name.clone(),
            })
            .collect(),
        roles: STAFF_ROLES
            .iter()
            .map(|role| RoleOption {
                value: role.to_string(),
            })
            .collect(),
        errors,
        has_success: !success.is_empty(),
        success,
    }))
}

async fn create_staff(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    form: web::Form<StaffCreateForm>,
) -> Result<HttpResponse> {
    let form = form.into_inner();
    let mut errors = Vec::new();

    if form.first_name.trim().is_empty() || form.last_name.trim().is_empty() {
        errors.push("First and last name are required.".to_string());
    }
    if form.email.trim().is_empty() {
        errors.push("Email is required.".to_string());
    }
    if form.phone.trim().is_empty() {
        errors.push("Phone is required.".to_string());
    }
    if form.password.trim().len() < 6 {
        errors.push("Password must be at least 6 characters.".to_string());
    }
    if !STAFF_ROLES.contains(&form.role.as_str()) {
        errors.push("Unknown staff role.".to_string());
    }

    if users::email_exists(&state.db, form.email.trim(), None)
        .await
        .unwrap_or(false)
    {
        errors.push("A user with this email already exists.".to_string());
    }
    if users::phone_exists(&state.db, form.phone.trim(), None)
        .await
        .unwrap_or(false)
    {
        errors.push("A user with this phone number already exists.".to_string());
    }

    if !errors.is_empty() {
        return render_staff(&state, errors, String::new()).await;
    }

    let skills = form
        .skills
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|skill| !skill.is_empty())
        .map(str::to_string)
        .collect();

    let result = users::create_staff(
        &state.db,
        users::NewStaff {
            email: form.email.trim().to_string(),
            phone: form.phone.trim().to_string(),
            password: form.password,
            first_name: form.first_name.trim().to_string(),
            last_name: form.last_name.trim().to_string(),
            birth_date: None,
            gender: None,
            role: form.role,
            branch_id: form.branch_id.filter(|id| !id.trim().is_empty()),
            employee_id: form.employee_id.filter(|id| !id.trim().is_empty()),
            hire_date: form.hire_date.filter(|date| !date.trim().is_empty()),
            salary: form.salary.and_then(|value| value.trim().parse().ok()),
            skills,
        },
    )
    .await;

    match result {
        Ok(user) => {
            log_activity(
                &state.db,
                "staff_created",
                &format!("{} created {} account for {}.", auth.display_name, user.role, user.display_name()),
                Some(&auth.id),
                None,
            )
            .await;
            render_staff(&state, Vec::new(), "Staff member created.".to_string()).await
        }
        Err(err) => {
            render_staff(&state, vec![format!("Failed to create staff member: {err}")], String::new())
                .await
        }
    }
}

async fn deactivate_staff(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let user_id = path.into_inner();
    if user_id == auth.id {
        return Ok(HttpResponse::BadRequest().body("You cannot deactivate your own account"));
    }

    users::deactivate_user(&state.db, &user_id)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    log_activity(
        &state.db,
        "staff_deactivated",
        &format!("{} deactivated user {}.", auth.display_name, user_id),
        Some(&auth.id),
        None,
    )
    .await;

    Ok(HttpResponse::SeeOther()
        .append_header((header::LOCATION, "/admin/staff"))
        .finish())
}

async fn list_clients(state: web::Data<AppState>) -> Result<HttpResponse> {
    render_clients(&state, Vec::new(), String::new()).await
}

async fn render_clients(
    state: &web::Data<AppState>,
    errors: Vec<String>,
    success: String,
) -> Result<HttpResponse> {
    let rows = users::clients(&state.db).await.unwrap_or_default();
    Ok(render(AdminClientsTemplate {
        clients: rows
            .iter()
            .map(|row| ClientView {
                display_name: row.display_name(),
                email: row.email.clone(),
                phone: row.phone.clone(),
                loyalty_points: row.loyalty_points.unwrap_or(0),
                referral_code: row.referral_code.clone().unwrap_or_default(),
            })
            .collect(),
        errors,
        has_success: !success.is_empty(),
        success,
    }))
}

async fn create_client(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    form: web::Form<ClientCreateForm>,
) -> Result<HttpResponse> {
    let form = form.into_inner();
    let mut errors = Vec::new();

    if form.first_name.trim().is_empty() || form.last_name.trim().is_empty() {
        errors.push("First and last name are required.".to_string());
    }
    if form.email.trim().is_empty() {
        errors.push("Email is required.".to_string());
    }
    if form.phone.trim().is_empty() {
        errors.push("Phone is required.".to_string());
    }

    if users::email_exists(&state.db, form.email.trim(), None)
        .await
        .unwrap_or(false)
    {
        errors.push("A user with this email already exists.".to_string());
    }
    if users::phone_exists(&state.db, form.phone.trim(), None)
        .await
        .unwrap_or(false)
    {
        errors.push("A user with this phone number already exists.".to_string());
    }

    if !errors.is_empty() {
        return render_clients(&state, errors, String::new()).await;
    }

    let result = users::create_client(
        &state.db,
        users::NewClient {
            email: form.email.trim().to_string(),
            phone: form.phone.trim().to_string(),
            first_name: form.first_name.trim().to_string(),
            last_name: form.last_name.trim().to_string(),
            birth_date: form.birth_date.filter(|date| !date.trim().is_empty()),
            gender: form.gender.filter(|gender| !gender.trim().is_empty()),
            category: form.category.filter(|category| !category.trim().is_empty()),
        },
    )
    .await;

    match result {
        Ok(client) => {
            log_activity(
                &state.db,
                "client_created",
                &format!("{} registered client {}.", auth.display_name, client.display_name()),
                Some(&auth.id),
                None,
            )
            .await;

            // Referral credit: the code owner earns a flat bonus.
            if let Some(code) = form.referred_by.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
                match users::client_by_referral_code(&state.db, code).await {
                    Ok(Some(referrer)) if referrer.id != client.id => {
                        let _ = users::record_referral(&state.db, &referrer.id, &client.id, code).await;
                        if let Err(err) =
                            users::award_loyalty(&state.db, &referrer.id, None, 10, "referral bonus").await
                        {
                            log::warn!("Referral bonus failed for {}: {err}", referrer.id);
                        }
                    }
                    Ok(_) => log::warn!("Unknown referral code {code} ignored."),
                    Err(err) => log::warn!("Referral lookup failed: {err}"),
                }
            }

            render_clients(&state, Vec::new(), "Client registered.".to_string()).await
        }
        Err(err) => {
            render_clients(&state, vec![format!("Failed to register client: {err}")], String::new())
                .await
        }
    }
}

async fn branch_view(state: &web::Data<AppState>, row: &BranchRow) -> BranchView {
    let manager_name = match &row.manager_id {
        Some(manager_id) => users::user_by_id(&state.db, manager_id)
            .await
            .unwrap_or(None)
            .map(|user| user.display_name())
            .unwrap_or_else(|| "Unassigned".to_string()),
        None => "Unassigned".to_string(),
    };

    BranchView {
        name: row.name.clone(),
        address: row.address.clone(),
        phone: row.phone.clone(),
        email: row.email.clone().unwrap_or_default(),
        manager_name,
    }
}

async fn staff_view(state: &web::Data<AppState>, row: &UserRow) -> StaffView {
    let branch_name = match &row.branch_id {
        Some(branch_id) => branches::branch_by_id(&state.db, branch_id)
            .await
            .unwrap_or(None)
            .map(|branch| branch.name)
            .unwrap_or_default(),
        None => String::new(),
    };

    StaffView {
        id: row.id.clone(),
        display_name: row.display_name(),
        email: row.email.clone(),
        role: row.role.clone(),
        branch_name,
        employee_id: row.employee_id.clone().unwrap_or_default(),
        skills: row.skill_list().join(", "),
    }
}

async fn count(state: &web::Data<AppState>, query: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(query)
        .fetch_one(&state.db)
        .await
        .unwrap_or(0)
}

async fn count_with(state: &web::Data<AppState>, query: &str, param: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(query)
        .bind(param)
        .fetch_one(&state.db)
        .await
        .unwrap_or(0)
}
