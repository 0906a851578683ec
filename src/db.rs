use std::{collections::BTreeMap, env, fs, path::Path};

use chrono::Utc;
use sqlx::{types::Json, SqlitePool};

use crate::{
    auth::{hash_password, new_id},
    models::{ROLE_RECEPTIONIST, ROLE_STYLIST, ROLE_SUPER_ADMIN},
};

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

pub fn ensure_sqlite_dir(db_url: &str) -> std::io::Result<()> {
    let path = if let Some(path) = db_url.strip_prefix("sqlite://") {
        Some(path)
    } else if let Some(path) = db_url.strip_prefix("sqlite:") {
        Some(path)
    } else {
        None
    };

    let Some(path) = path else {
        return Ok(());
    };

    let path = path.split('?').next().unwrap_or(path);
    if path == ":memory:" || path.is_empty() {
        return Ok(());
    }

    let path = path.strip_prefix("file:").unwrap_or(path);
    let db_path = Path::new(path);
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

pub async fn seed_defaults(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    seed_super_admin(pool).await?;
    let branch_id = seed_default_branch(pool).await?;
    seed_catalog(pool).await?;
    if env::var("SEED_DEMO").unwrap_or_default() == "true" {
        seed_demo_staff(pool, &branch_id).await?;
    }
    Ok(())
}

pub async fn log_activity(
    pool: &SqlitePool,
    kind: &str,
    message: &str,
    user_id: Option<&str>,
    appointment_id: Option<&str>,
) {
    let _ = sqlx::query(
        r#"INSERT INTO activities (id, kind, message, created_at, user_id, appointment_id)
           VALUES (?, ?, ?, ?, ?, ?)"#,
    )
    .bind(new_id())
    .bind(kind)
    .bind(message)
    .bind(Utc::now().to_rfc3339())
    .bind(user_id)
    .bind(appointment_id)
    .execute(pool)
    .await;
}

async fn seed_super_admin(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let existing = sqlx::query_as::<_, (String,)>("SELECT id FROM users WHERE role = ? LIMIT 1")
        .bind(ROLE_SUPER_ADMIN)
        .fetch_optional(pool)
        .await?;

    if existing.is_some() {
        return Ok(());
    }

    let email = env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@salonhub.local".to_string());
    let password = env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin".to_string());
    let first_name = env::var("ADMIN_FIRST_NAME").unwrap_or_else(|_| "Super".to_string());
    let last_name = env::var("ADMIN_LAST_NAME").unwrap_or_else(|_| "Admin".to_string());

    if password == "admin" {
        log::warn!("ADMIN_PASSWORD not set. Using default password 'admin'. Set ADMIN_PASSWORD in production.");
    }

    let password_hash =
        hash_password(&password).map_err(|_| sqlx::Error::Protocol("password hash failed".into()))?;
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        r#"INSERT INTO users (id, email, phone, password_hash, first_name, last_name, role, active, created_at, updated_at, employee_id)
           VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?, ?)"#,
    )
    .bind(new_id())
    .bind(email)
    .bind("+0000000000")
    .bind(password_hash)
    .bind(first_name)
    .bind(last_name)
    .bind(ROLE_SUPER_ADMIN)
    .bind(&now)
    .bind(&now)
    .bind("EMP-0001")
    .execute(pool)
    .await?;

    Ok(())
}

async fn seed_default_branch(pool: &SqlitePool) -> Result<String, sqlx::Error> {
    let existing = sqlx::query_as::<_, (String,)>("SELECT id FROM branches LIMIT 1")
        .fetch_optional(pool)
        .await?;

    if let Some((id,)) = existing {
        return Ok(id);
    }

    let mut hours = BTreeMap::new();
    for day in ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday"] {
        hours.insert(day.to_string(), "9:00 AM - 6:00 PM".to_string());
    }
    hours.insert("Sunday".to_string(), "Closed".to_string());

    let id = new_id();
    let now = Utc::now().to_rfc3339();
    sqlx::query(
        r#"INSERT INTO branches (id, name, address, phone, email, operating_hours, manager_id, active, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, NULL, 1, ?, ?)"#,
    )
    .bind(&id)
    .bind("SalonHub Main")
    .bind("1 High Street")
    .bind("+1 555 0100")
    .bind("main@salonhub.local")
    .bind(Json(hours))
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(id)
}

async fn seed_catalog(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM services")
        .fetch_one(pool)
        .await?;
    if count > 0 {
        return Ok(());
    }

    let entries = [
        ("Signature Cut", "Haircut", 45_i64, 38.0_f64, "Precision cut, wash, and finish."),
        ("Root Color", "Color", 90, 72.0, "Single-process color at the roots."),
        ("Blowout & Style", "Styling", 40, 30.0, "Wash, blow-dry, and styling."),
        ("Deep Conditioning", "Treatment", 30, 25.0, "Restorative mask and scalp massage."),
        ("Manicure", "Nails", 35, 22.0, "Classic manicure with polish."),
    ];

    for (name, category, duration, price, description) in entries {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"INSERT INTO services (id, name, description, category, price, duration_minutes, branch_id, archived, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, NULL, 0, ?, ?)"#,
        )
        .bind(new_id())
        .bind(name)
        .bind(description)
        .bind(category)
        .bind(price)
        .bind(duration)
        .bind(&now)
        .bind(&now)
        .execute(pool)
        .await?;
    }

    Ok(())
}

async fn seed_demo_staff(pool: &SqlitePool, branch_id: &str) -> Result<(), sqlx::Error> {
    let demo = [
        ("stylist@salonhub.local", "+1 555 0101", "Dana", "Reyes", ROLE_STYLIST, "EMP-0002"),
        ("reception@salonhub.local", "+1 555 0102", "Marco", "Ilagan", ROLE_RECEPTIONIST, "EMP-0003"),
    ];

    for (email, phone, first, last, role, employee_id) in demo {
        let exists = sqlx::query_as::<_, (String,)>("SELECT id FROM users WHERE email = ? LIMIT 1")
            .bind(email)
            .fetch_optional(pool)
            .await?;
        if exists.is_some() {
            continue;
        }

        log::warn!("Seeding demo account {email} with password 'change-me'.");
        let password_hash = hash_password("change-me")
            .map_err(|_| sqlx::Error::Protocol("password hash failed".into()))?;
        let now = Utc::now().to_rfc3339();
        let skills = if role == ROLE_STYLIST {
            Some(Json(vec!["Haircut".to_string(), "Styling".to_string()]))
        } else {
            None
        };

        sqlx::query(
            r#"INSERT INTO users (id, email, phone, password_hash, first_name, last_name, role, active, created_at, updated_at, branch_id, employee_id, hire_date, skills)
               VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(new_id())
        .bind(email)
        .bind(phone)
        .bind(password_hash)
        .bind(first)
        .bind(last)
        .bind(role)
        .bind(&now)
        .bind(&now)
        .bind(branch_id)
        .bind(employee_id)
        .bind(now.split('T').next().unwrap_or(&now))
        .bind(skills)
        .execute(pool)
        .await?;
    }

    Ok(())
}
