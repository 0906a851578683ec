use chrono::Utc;
use sqlx::{types::Json, SqlitePool};

use crate::{
    auth::new_id,
    models::{AppointmentRow, BookedService, StylistAssignment, STATUS_PENDING},
};

pub struct NewAppointment {
    pub branch_id: String,
    pub date: String,
    pub time: String,
    pub client_first_name: String,
    pub client_last_name: String,
    pub client_phone: String,
    pub client_email: Option<String>,
    pub services: Vec<BookedService>,
    pub stylists: Vec<StylistAssignment>,
    pub status: Option<String>,
    pub total_cost: Option<f64>,
    pub notes: Option<String>,
}

/// Fields not supplied keep their current value, mirroring a partial
/// document update.
#[derive(Default)]
pub struct AppointmentPatch {
    pub date: Option<String>,
    pub time: Option<String>,
    pub services: Option<Vec<BookedService>>,
    pub stylists: Option<Vec<StylistAssignment>>,
    pub total_cost: Option<f64>,
    pub notes: Option<String>,
}

pub async fn create_appointment(
    pool: &SqlitePool,
    input: NewAppointment,
) -> Result<AppointmentRow, sqlx::Error> {
    let id = new_id();
    let now = Utc::now().to_rfc3339();
    let status = input
        .status
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| STATUS_PENDING.to_string());
    let total_cost = input
        .total_cost
        .unwrap_or_else(|| input.services.iter().map(|s| s.price).sum());

    sqlx::query(
        r#"INSERT INTO appointments
           (id, branch_id, date, time, client_first_name, client_last_name, client_phone,
            client_email, services, stylists, status, total_cost, notes, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&id)
    .bind(&input.branch_id)
    .bind(&input.date)
    .bind(&input.time)
    .bind(&input.client_first_name)
    .bind(&input.client_last_name)
    .bind(&input.client_phone)
    .bind(&input.client_email)
    .bind(Json(&input.services))
    .bind(Json(&input.stylists))
    .bind(&status)
    .bind(total_cost)
    .bind(&input.notes)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    appointment_by_id(pool, &id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)
}

pub async fn appointment_by_id(
    pool: &SqlitePool,
    id: &str,
) -> Result<Option<AppointmentRow>, sqlx::Error> {
    sqlx::query_as::<_, AppointmentRow>("SELECT * FROM appointments WHERE id = ? LIMIT 1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Branch listing with optional exact-match date and status filters. The
/// equality filters run in SQL; ordering is always applied in memory so
/// every read path shares the same contract.
pub async fn appointments_by_branch(
    pool: &SqlitePool,
    branch_id: &str,
    date: Option<&str>,
    status: Option<&str>,
) -> Result<Vec<AppointmentRow>, sqlx::Error> {
    let mut rows = match (date, status) {
        (Some(date), Some(status)) => {
            sqlx::query_as::<_, AppointmentRow>(
                "SELECT * FROM appointments WHERE branch_id = ? AND date = ? AND status = ?",
            )
            .bind(branch_id)
            .bind(date)
            .bind(status)
            .fetch_all(pool)
            .await?
        }
        (Some(date), None) => {
            sqlx::query_as::<_, AppointmentRow>(
                "SELECT * FROM appointments WHERE branch_id = ? AND date = ?",
            )
            .bind(branch_id)
            .bind(date)
            .fetch_all(pool)
            .await?
        }
        (None, Some(status)) => {
            sqlx::query_as::<_, AppointmentRow>(
                "SELECT * FROM appointments WHERE branch_id = ? AND status = ?",
            )
            .bind(branch_id)
            .bind(status)
            .fetch_all(pool)
            .await?
        }
        (None, None) => {
            sqlx::query_as::<_, AppointmentRow>("SELECT * FROM appointments WHERE branch_id = ?")
                .bind(branch_id)
                .fetch_all(pool)
                .await?
        }
    };

    sort_appointments(&mut rows);
    Ok(rows)
}

/// Newest day first; within a day, earliest slot first.
pub fn sort_appointments(rows: &mut [AppointmentRow]) {
    rows.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.time.cmp(&b.time)));
}

pub async fn update_appointment(
    pool: &SqlitePool,
    id: &str,
    patch: AppointmentPatch,
) -> Result<Option<AppointmentRow>, sqlx::Error> {
    let Some(current) = appointment_by_id(pool, id).await? else {
        return Ok(None);
    };

    let date = patch.date.unwrap_or(current.date);
    let time = patch.time.unwrap_or(current.time);
    let services = patch.services.map(Json).unwrap_or(current.services);
    let stylists = patch.stylists.map(Json).unwrap_or(current.stylists);
    let total_cost = patch.total_cost.unwrap_or(current.total_cost);
    let notes = patch.notes.or(current.notes);

    sqlx::query(
        r#"UPDATE appointments
           SET date = ?, time = ?, services = ?, stylists = ?, total_cost = ?, notes = ?, updated_at = ?
           WHERE id = ?"#,
    )
    .bind(&date)
    .bind(&time)
    .bind(&services)
    .bind(&stylists)
    .bind(total_cost)
    .bind(&notes)
    .bind(Utc::now().to_rfc3339())
    .bind(id)
    .execute(pool)
    .await?;

    appointment_by_id(pool, id).await
}

pub async fn update_status(
    pool: &SqlitePool,
    id: &str,
    status: &str,
) -> Result<Option<AppointmentRow>, sqlx::Error> {
    sqlx::query("UPDATE appointments SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(pool)
        .await?;

    appointment_by_id(pool, id).await
}

/// Replaces the assignment for the matching service line, or appends one.
pub async fn assign_stylist(
    pool: &SqlitePool,
    id: &str,
    assignment: StylistAssignment,
) -> Result<Option<AppointmentRow>, sqlx::Error> {
    let Some(current) = appointment_by_id(pool, id).await? else {
        return Ok(None);
    };

    let mut stylists = current.stylists.0;
    match stylists
        .iter_mut()
        .find(|entry| entry.service_id == assignment.service_id)
    {
        Some(entry) => *entry = assignment,
        None => stylists.push(assignment),
    }

    sqlx::query("UPDATE appointments SET stylists = ?, updated_at = ? WHERE id = ?")
        .bind(Json(&stylists))
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(pool)
        .await?;

    appointment_by_id(pool, id).await
}

pub async fn delete_appointment(pool: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM appointments WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Upcoming service lines for one stylist, drawn from the denormalized
/// assignment arrays. The array filter runs in memory over the branch's
/// rows.
pub async fn appointments_for_stylist(
    pool: &SqlitePool,
    branch_id: &str,
    stylist_id: &str,
) -> Result<Vec<AppointmentRow>, sqlx::Error> {
    let rows = appointments_by_branch(pool, branch_id, None, None).await?;
    Ok(rows
        .into_iter()
        .filter(|row| row.stylists.0.iter().any(|entry| entry.stylist_id == stylist_id))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing;

    fn booking(branch: &str, date: &str, time: &str) -> NewAppointment {
        NewAppointment {
            branch_id: branch.to_string(),
            date: date.to_string(),
            time: time.to_string(),
            client_first_name: "Ana".to_string(),
            client_last_name: "Cruz".to_string(),
            client_phone: "+1 555 0199".to_string(),
            client_email: None,
            services: vec![BookedService {
                id: "svc-1".to_string(),
                name: "Signature Cut".to_string(),
                duration: 45,
                price: 38.0,
            }],
            stylists: Vec::new(),
            status: None,
            total_cost: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn create_defaults_status_to_pending() {
        let pool = testing::pool().await;
        let row = create_appointment(&pool, booking("b1", "2025-03-10", "10:00"))
            .await
            .unwrap();
        assert_eq!(row.status, STATUS_PENDING);
        assert_eq!(row.total_cost, 38.0);
    }

    #[tokio::test]
    async fn explicit_status_and_cost_are_kept() {
        let pool = testing::pool().await;
        let mut input = booking("b1", "2025-03-10", "10:00");
        input.status = Some("confirmed".to_string());
        input.total_cost = Some(50.0);
        let row = create_appointment(&pool, input).await.unwrap();
        assert_eq!(row.status, "confirmed");
        assert_eq!(row.total_cost, 50.0);
    }

    #[tokio::test]
    async fn branch_listing_sorts_date_desc_then_time_asc() {
        let pool = testing::pool().await;
        for (date, time) in [
            ("2025-03-10", "14:00"),
            ("2025-03-12", "11:00"),
            ("2025-03-10", "09:00"),
            ("2025-03-12", "09:00"),
        ] {
            create_appointment(&pool, booking("b1", date, time)).await.unwrap();
        }

        let rows = appointments_by_branch(&pool, "b1", None, None).await.unwrap();
        let order: Vec<(String, String)> = rows
            .into_iter()
            .map(|row| (row.date, row.time))
            .collect();
        assert_eq!(
            order,
            vec![
                ("2025-03-12".to_string(), "09:00".to_string()),
                ("2025-03-12".to_string(), "11:00".to_string()),
                ("2025-03-10".to_string(), "09:00".to_string()),
                ("2025-03-10".to_string(), "14:00".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn filters_are_exact_matches() {
        let pool = testing::pool().await;
        create_appointment(&pool, booking("b1", "2025-03-10", "09:00")).await.unwrap();
        create_appointment(&pool, booking("b1", "2025-03-11", "09:00")).await.unwrap();
        create_appointment(&pool, booking("b2", "2025-03-10", "09:00")).await.unwrap();

        let by_date = appointments_by_branch(&pool, "b1", Some("2025-03-10"), None)
            .await
            .unwrap();
        assert_eq!(by_date.len(), 1);

        let by_status = appointments_by_branch(&pool, "b1", None, Some(STATUS_PENDING))
            .await
            .unwrap();
        assert_eq!(by_status.len(), 2);

        let none = appointments_by_branch(&pool, "b1", None, Some("completed"))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn assign_stylist_replaces_matching_service_line() {
        let pool = testing::pool().await;
        let row = create_appointment(&pool, booking("b1", "2025-03-10", "09:00"))
            .await
            .unwrap();

        let first = StylistAssignment {
            service_id: "svc-1".to_string(),
            service_name: "Signature Cut".to_string(),
            stylist_id: "sty-1".to_string(),
            stylist_name: "Dana Reyes".to_string(),
        };
        assign_stylist(&pool, &row.id, first).await.unwrap();

        let second = StylistAssignment {
            service_id: "svc-1".to_string(),
            service_name: "Signature Cut".to_string(),
            stylist_id: "sty-2".to_string(),
            stylist_name: "Lea Santos".to_string(),
        };
        let updated = assign_stylist(&pool, &row.id, second).await.unwrap().unwrap();

        assert_eq!(updated.stylists.0.len(), 1);
        assert_eq!(updated.stylists.0[0].stylist_id, "sty-2");
    }

    #[tokio::test]
    async fn patch_updates_only_supplied_fields() {
        let pool = testing::pool().await;
        let row = create_appointment(&pool, booking("b1", "2025-03-10", "09:00"))
            .await
            .unwrap();

        let updated = update_appointment(
            &pool,
            &row.id,
            AppointmentPatch {
                time: Some("11:00".to_string()),
                notes: Some("running late".to_string()),
                ..AppointmentPatch::default()
            },
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(updated.time, "11:00");
        assert_eq!(updated.date, "2025-03-10");
        assert_eq!(updated.notes.as_deref(), Some("running late"));
        assert_eq!(updated.services.0.len(), 1);

        let missing = update_appointment(&pool, "nope", AppointmentPatch::default())
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn delete_reports_whether_a_row_existed() {
        let pool = testing::pool().await;
        let row = create_appointment(&pool, booking("b1", "2025-03-10", "09:00"))
            .await
            .unwrap();
        assert!(delete_appointment(&pool, &row.id).await.unwrap());
        assert!(!delete_appointment(&pool, &row.id).await.unwrap());
        assert!(appointment_by_id(&pool, &row.id).await.unwrap().is_none());
    }
}
