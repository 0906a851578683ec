use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, NaiveTime, Utc};
use sqlx::{types::Json, SqlitePool};

use crate::{auth::new_id, models::BranchRow};

pub const CLOSED: &str = "Closed";

pub struct NewBranch {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub email: Option<String>,
    pub operating_hours: BTreeMap<String, String>,
    pub manager_id: Option<String>,
}

pub async fn branch_by_id(pool: &SqlitePool, id: &str) -> Result<Option<BranchRow>, sqlx::Error> {
    sqlx::query_as::<_, BranchRow>("SELECT * FROM branches WHERE id = ? LIMIT 1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn all_branches(pool: &SqlitePool) -> Result<Vec<BranchRow>, sqlx::Error> {
    sqlx::query_as::<_, BranchRow>("SELECT * FROM branches WHERE active = 1 ORDER BY name")
        .fetch_all(pool)
        .await
}

pub async fn create_branch(pool: &SqlitePool, input: NewBranch) -> Result<BranchRow, sqlx::Error> {
    let id = new_id();
    let now = Utc::now().to_rfc3339();
    sqlx::query(
        r#"INSERT INTO branches (id, name, address, phone, email, operating_hours, manager_id, active, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?)"#,
    )
    .bind(&id)
    .bind(&input.name)
    .bind(&input.address)
    .bind(&input.phone)
    .bind(&input.email)
    .bind(Json(&input.operating_hours))
    .bind(&input.manager_id)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    branch_by_id(pool, &id).await?.ok_or(sqlx::Error::RowNotFound)
}

pub async fn update_branch(
    pool: &SqlitePool,
    id: &str,
    name: &str,
    address: &str,
    phone: &str,
    email: Option<&str>,
    manager_id: Option<&str>,
) -> Result<Option<BranchRow>, sqlx::Error> {
    sqlx::query(
        r#"UPDATE branches SET name = ?, address = ?, phone = ?, email = ?, manager_id = ?, updated_at = ?
           WHERE id = ?"#,
    )
    .bind(name)
    .bind(address)
    .bind(phone)
    .bind(email)
    .bind(manager_id)
    .bind(Utc::now().to_rfc3339())
    .bind(id)
    .execute(pool)
    .await?;

    branch_by_id(pool, id).await
}

/// Replaces the weekday map wholesale. Every entry must be "Closed" or a
/// parseable range; the first bad entry aborts the write.
pub async fn update_operating_hours(
    pool: &SqlitePool,
    id: &str,
    hours: BTreeMap<String, String>,
) -> Result<Option<BranchRow>, sqlx::Error> {
    for (day, entry) in &hours {
        if entry != CLOSED && parse_hours_range(entry).is_none() {
            return Err(sqlx::Error::Protocol(format!(
                "invalid operating hours for {day}: {entry}"
            )));
        }
    }

    sqlx::query("UPDATE branches SET operating_hours = ?, updated_at = ? WHERE id = ?")
        .bind(Json(&hours))
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(pool)
        .await?;

    branch_by_id(pool, id).await
}

/// Parses a `"9:00 AM - 5:00 PM"` range into opening and closing times.
pub fn parse_hours_range(entry: &str) -> Option<(NaiveTime, NaiveTime)> {
    let (open, close) = entry.split_once(" - ")?;
    let open = NaiveTime::parse_from_str(open.trim(), "%I:%M %p").ok()?;
    let close = NaiveTime::parse_from_str(close.trim(), "%I:%M %p").ok()?;
    if open >= close {
        return None;
    }
    Some((open, close))
}

fn weekday_name(date: NaiveDate) -> &'static str {
    match date.weekday() {
        chrono::Weekday::Mon => "Monday",
        chrono::Weekday::Tue => "Tuesday",
        chrono::Weekday::Wed => "Wednesday",
        chrono::Weekday::Thu => "Thursday",
        chrono::Weekday::Fri => "Friday",
        chrono::Weekday::Sat => "Saturday",
        chrono::Weekday::Sun => "Sunday",
    }
}

/// Hourly booking slots for a branch on a date: from the opening hour up to
/// but excluding the closing hour. Closed or unconfigured days yield no
/// slots, as do unparseable dates.
pub fn time_slots_for(branch: &BranchRow, date: &str) -> Vec<String> {
    let Ok(date) = NaiveDate::parse_from_str(date, "%Y-%m-%d") else {
        return Vec::new();
    };
    let Some(entry) = branch.operating_hours.0.get(weekday_name(date)) else {
        return Vec::new();
    };
    if entry == CLOSED {
        return Vec::new();
    }
    let Some((open, close)) = parse_hours_range(entry) else {
        return Vec::new();
    };

    let open_hour = chrono::Timelike::hour(&open);
    let close_hour = chrono::Timelike::hour(&close);
    (open_hour..close_hour)
        .map(|hour| format!("{hour:02}:00"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing;

    fn hours(day: &str, entry: &str) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert(day.to_string(), entry.to_string());
        map
    }

    fn branch_input(hours: BTreeMap<String, String>) -> NewBranch {
        NewBranch {
            name: "branch_test".to_string(),
            address: "2 Side Street".to_string(),
            phone: "+1 555 0200".to_string(),
            email: None,
            operating_hours: hours,
            manager_id: None,
        }
    }

    #[test]
    fn parses_twelve_hour_ranges() {
        let (open, close) = parse_hours_range("9:00 AM - 5:00 PM").unwrap();
        assert_eq!(open, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(close, NaiveTime::from_hms_opt(17, 0, 0).unwrap());

        assert!(parse_hours_range("Closed").is_none());
        assert!(parse_hours_range("5:00 PM - 9:00 AM").is_none());
        assert!(parse_hours_range("whenever").is_none());
    }

    #[tokio::test]
    async fn monday_slots_are_hourly_with_closing_hour_excluded() {
        let pool = testing::pool().await;
        let branch = create_branch(&pool, branch_input(hours("Monday", "9:00 AM - 5:00 PM")))
            .await
            .unwrap();

        // 2025-03-10 is a Monday.
        let slots = time_slots_for(&branch, "2025-03-10");
        assert_eq!(
            slots,
            vec!["09:00", "10:00", "11:00", "12:00", "13:00", "14:00", "15:00", "16:00"]
        );
    }

    #[tokio::test]
    async fn closed_and_unconfigured_days_have_no_slots() {
        let pool = testing::pool().await;
        let mut map = hours("Monday", "9:00 AM - 5:00 PM");
        map.insert("Sunday".to_string(), CLOSED.to_string());
        let branch = create_branch(&pool, branch_input(map)).await.unwrap();

        // 2025-03-16 is a Sunday, 2025-03-11 a Tuesday with no entry.
        assert!(time_slots_for(&branch, "2025-03-16").is_empty());
        assert!(time_slots_for(&branch, "2025-03-11").is_empty());
        assert!(time_slots_for(&branch, "not-a-date").is_empty());
    }

    #[tokio::test]
    async fn branch_details_can_be_updated() {
        let pool = testing::pool().await;
        let branch = create_branch(&pool, branch_input(hours("Monday", "9:00 AM - 5:00 PM")))
            .await
            .unwrap();

        let updated = update_branch(
            &pool,
            &branch.id,
            "branch_test",
            "8 New Road",
            "+1 555 0201",
            Some("makati@salonhub.local"),
            Some("mgr-1"),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(updated.address, "8 New Road");
        assert_eq!(updated.email.as_deref(), Some("makati@salonhub.local"));
        assert_eq!(updated.manager_id.as_deref(), Some("mgr-1"));
        // Hours are untouched by a detail update.
        assert_eq!(
            updated.operating_hours.0.get("Monday").unwrap(),
            "9:00 AM - 5:00 PM"
        );
    }

    #[tokio::test]
    async fn update_operating_hours_rejects_bad_entries() {
        let pool = testing::pool().await;
        let branch = create_branch(&pool, branch_input(hours("Monday", "9:00 AM - 5:00 PM")))
            .await
            .unwrap();

        let result =
            update_operating_hours(&pool, &branch.id, hours("Monday", "nine to five")).await;
        assert!(result.is_err());

        let updated = update_operating_hours(&pool, &branch.id, hours("Monday", "10:00 AM - 4:00 PM"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            updated.operating_hours.0.get("Monday").unwrap(),
            "10:00 AM - 4:00 PM"
        );
    }
}
