use chrono::Utc;
use sqlx::SqlitePool;

use crate::{
    auth::new_id,
    models::{ScheduleRow, SLOT_AVAILABLE},
};

/// One exception slot: a stylist's deviation from the implicit "available"
/// default on a given date.
pub struct SlotInput {
    pub start_time: String,
    pub end_time: String,
    pub status: String,
    pub notes: Option<String>,
}

/// Outcome of `set_availability`, so callers can publish the right event.
pub enum SlotChange {
    Stored(ScheduleRow),
    Cleared,
    Unchanged,
}

pub async fn schedule_by_id(
    pool: &SqlitePool,
    id: &str,
) -> Result<Option<ScheduleRow>, sqlx::Error> {
    sqlx::query_as::<_, ScheduleRow>("SELECT * FROM schedules WHERE id = ? LIMIT 1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn create_schedule(
    pool: &SqlitePool,
    stylist_id: &str,
    branch_id: &str,
    date: &str,
    slot: &SlotInput,
) -> Result<ScheduleRow, sqlx::Error> {
    let id = new_id();
    let now = Utc::now().to_rfc3339();
    sqlx::query(
        r#"INSERT INTO schedules (id, stylist_id, branch_id, date, start_time, end_time, status, notes, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&id)
    .bind(stylist_id)
    .bind(branch_id)
    .bind(date)
    .bind(&slot.start_time)
    .bind(&slot.end_time)
    .bind(&slot.status)
    .bind(&slot.notes)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    schedule_by_id(pool, &id).await?.ok_or(sqlx::Error::RowNotFound)
}

pub async fn update_schedule(
    pool: &SqlitePool,
    id: &str,
    slot: &SlotInput,
) -> Result<Option<ScheduleRow>, sqlx::Error> {
    sqlx::query(
        r#"UPDATE schedules SET start_time = ?, end_time = ?, status = ?, notes = ?, updated_at = ?
           WHERE id = ?"#,
    )
    .bind(&slot.start_time)
    .bind(&slot.end_time)
    .bind(&slot.status)
    .bind(&slot.notes)
    .bind(Utc::now().to_rfc3339())
    .bind(id)
    .execute(pool)
    .await?;

    schedule_by_id(pool, id).await
}

pub async fn delete_schedule(pool: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM schedules WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Range query over one stylist's exceptions, ordered in SQL.
pub async fn stylist_schedules(
    pool: &SqlitePool,
    stylist_id: &str,
    from: &str,
    to: &str,
) -> Result<Vec<ScheduleRow>, sqlx::Error> {
    sqlx::query_as::<_, ScheduleRow>(
        r#"SELECT * FROM schedules
           WHERE stylist_id = ? AND date >= ? AND date <= ?
           ORDER BY date, start_time"#,
    )
    .bind(stylist_id)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await
}

/// Branch-wide view: the server query filters on branch only; the date
/// range and ordering are applied in memory on every read.
pub async fn branch_schedules(
    pool: &SqlitePool,
    branch_id: &str,
    from: &str,
    to: &str,
) -> Result<Vec<ScheduleRow>, sqlx::Error> {
    let mut rows =
        sqlx::query_as::<_, ScheduleRow>("SELECT * FROM schedules WHERE branch_id = ?")
            .bind(branch_id)
            .fetch_all(pool)
            .await?;

    rows.retain(|row| row.date.as_str() >= from && row.date.as_str() <= to);
    rows.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.start_time.cmp(&b.start_time))
    });
    Ok(rows)
}

pub async fn schedules_by_date(
    pool: &SqlitePool,
    branch_id: &str,
    date: &str,
) -> Result<Vec<ScheduleRow>, sqlx::Error> {
    sqlx::query_as::<_, ScheduleRow>(
        "SELECT * FROM schedules WHERE branch_id = ? AND date = ? ORDER BY start_time",
    )
    .bind(branch_id)
    .bind(date)
    .fetch_all(pool)
    .await
}

async fn override_for(
    pool: &SqlitePool,
    stylist_id: &str,
    date: &str,
) -> Result<Option<ScheduleRow>, sqlx::Error> {
    sqlx::query_as::<_, ScheduleRow>(
        "SELECT * FROM schedules WHERE stylist_id = ? AND date = ? LIMIT 1",
    )
    .bind(stylist_id)
    .bind(date)
    .fetch_optional(pool)
    .await
}

/// The exception-record policy: only non-available slots are persisted, one
/// per (stylist, date). Setting a slot to available deletes the override if
/// one exists and writes nothing otherwise; any other status upserts.
pub async fn set_availability(
    pool: &SqlitePool,
    stylist_id: &str,
    branch_id: &str,
    date: &str,
    slot: &SlotInput,
) -> Result<SlotChange, sqlx::Error> {
    if slot.status == SLOT_AVAILABLE {
        let existing = override_for(pool, stylist_id, date).await?;
        return match existing {
            Some(row) => {
                delete_schedule(pool, &row.id).await?;
                Ok(SlotChange::Cleared)
            }
            None => Ok(SlotChange::Unchanged),
        };
    }

    let now = Utc::now().to_rfc3339();
    sqlx::query(
        r#"INSERT INTO schedules (id, stylist_id, branch_id, date, start_time, end_time, status, notes, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
           ON CONFLICT(stylist_id, date) DO UPDATE SET
             branch_id = excluded.branch_id,
             start_time = excluded.start_time,
             end_time = excluded.end_time,
             status = excluded.status,
             notes = excluded.notes,
             updated_at = excluded.updated_at"#,
    )
    .bind(new_id())
    .bind(stylist_id)
    .bind(branch_id)
    .bind(date)
    .bind(&slot.start_time)
    .bind(&slot.end_time)
    .bind(&slot.status)
    .bind(&slot.notes)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    let row = override_for(pool, stylist_id, date)
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;
    Ok(SlotChange::Stored(row))
}

/// Read-path fallback: a stylist with no override for a date is available.
pub async fn effective_status(
    pool: &SqlitePool,
    stylist_id: &str,
    date: &str,
) -> Result<String, sqlx::Error> {
    Ok(override_for(pool, stylist_id, date)
        .await?
        .map(|row| row.status)
        .unwrap_or_else(|| SLOT_AVAILABLE.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SLOT_BREAK, SLOT_BUSY, SLOT_OFF};
    use crate::services::testing;

    fn slot(status: &str) -> SlotInput {
        SlotInput {
            start_time: "09:00".to_string(),
            end_time: "17:00".to_string(),
            status: status.to_string(),
            notes: None,
        }
    }

    #[tokio::test]
    async fn available_clears_an_existing_override() {
        let pool = testing::pool().await;
        let change = set_availability(&pool, "sty-1", "b1", "2025-03-10", &slot(SLOT_OFF))
            .await
            .unwrap();
        assert!(matches!(change, SlotChange::Stored(_)));

        let change = set_availability(&pool, "sty-1", "b1", "2025-03-10", &slot(SLOT_AVAILABLE))
            .await
            .unwrap();
        assert!(matches!(change, SlotChange::Cleared));

        let status = effective_status(&pool, "sty-1", "2025-03-10").await.unwrap();
        assert_eq!(status, SLOT_AVAILABLE);
    }

    #[tokio::test]
    async fn available_with_no_override_is_a_no_op() {
        let pool = testing::pool().await;
        let change = set_availability(&pool, "sty-1", "b1", "2025-03-10", &slot(SLOT_AVAILABLE))
            .await
            .unwrap();
        assert!(matches!(change, SlotChange::Unchanged));

        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM schedules")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn one_override_per_stylist_and_date() {
        let pool = testing::pool().await;
        set_availability(&pool, "sty-1", "b1", "2025-03-10", &slot(SLOT_BUSY))
            .await
            .unwrap();
        set_availability(&pool, "sty-1", "b1", "2025-03-10", &slot(SLOT_OFF))
            .await
            .unwrap();

        let rows = stylist_schedules(&pool, "sty-1", "2025-03-10", "2025-03-10")
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, SLOT_OFF);
    }

    #[tokio::test]
    async fn branch_view_filters_range_and_sorts_in_memory() {
        let pool = testing::pool().await;
        for (stylist, date) in [
            ("sty-1", "2025-03-12"),
            ("sty-2", "2025-03-10"),
            ("sty-3", "2025-03-20"),
        ] {
            set_availability(&pool, stylist, "b1", date, &slot(SLOT_BUSY))
                .await
                .unwrap();
        }

        let rows = branch_schedules(&pool, "b1", "2025-03-09", "2025-03-15")
            .await
            .unwrap();
        let dates: Vec<&str> = rows.iter().map(|row| row.date.as_str()).collect();
        assert_eq!(dates, vec!["2025-03-10", "2025-03-12"]);
    }

    #[tokio::test]
    async fn plain_crud_round_trips() {
        let pool = testing::pool().await;
        let row = create_schedule(&pool, "sty-1", "b1", "2025-03-10", &slot(SLOT_BUSY))
            .await
            .unwrap();
        assert_eq!(schedule_by_id(&pool, &row.id).await.unwrap().unwrap().status, SLOT_BUSY);

        let updated = update_schedule(
            &pool,
            &row.id,
            &SlotInput {
                start_time: "13:00".to_string(),
                end_time: "15:00".to_string(),
                status: SLOT_BREAK.to_string(),
                notes: Some("trade show".to_string()),
            },
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(updated.status, SLOT_BREAK);
        assert_eq!(updated.start_time, "13:00");

        assert!(delete_schedule(&pool, &row.id).await.unwrap());
        assert!(schedule_by_id(&pool, &row.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn effective_status_defaults_to_available() {
        let pool = testing::pool().await;
        let status = effective_status(&pool, "sty-9", "2025-03-10").await.unwrap();
        assert_eq!(status, SLOT_AVAILABLE);
    }
}
