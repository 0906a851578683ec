use chrono::Utc;
use sqlx::SqlitePool;

use crate::{auth::new_id, models::ServiceRow};

pub struct NewService {
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: f64,
    pub duration_minutes: i64,
    pub image_url: Option<String>,
    pub branch_id: Option<String>,
}

pub async fn service_by_id(pool: &SqlitePool, id: &str) -> Result<Option<ServiceRow>, sqlx::Error> {
    sqlx::query_as::<_, ServiceRow>("SELECT * FROM services WHERE id = ? LIMIT 1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn global_services(pool: &SqlitePool) -> Result<Vec<ServiceRow>, sqlx::Error> {
    let mut rows = sqlx::query_as::<_, ServiceRow>(
        "SELECT * FROM services WHERE branch_id IS NULL ORDER BY name",
    )
    .fetch_all(pool)
    .await?;
    rows.retain(|row| row.archived == 0);
    Ok(rows)
}

/// Bookable catalog for a branch: its own entries plus the global ones.
/// The archived filter runs in memory after the fetch.
pub async fn services_by_branch(
    pool: &SqlitePool,
    branch_id: &str,
) -> Result<Vec<ServiceRow>, sqlx::Error> {
    let mut rows = sqlx::query_as::<_, ServiceRow>(
        "SELECT * FROM services WHERE branch_id = ? OR branch_id IS NULL ORDER BY name",
    )
    .bind(branch_id)
    .fetch_all(pool)
    .await?;
    rows.retain(|row| row.archived == 0);
    Ok(rows)
}

pub async fn archived_services_by_branch(
    pool: &SqlitePool,
    branch_id: &str,
) -> Result<Vec<ServiceRow>, sqlx::Error> {
    let mut rows = sqlx::query_as::<_, ServiceRow>(
        "SELECT * FROM services WHERE branch_id = ? ORDER BY name",
    )
    .bind(branch_id)
    .fetch_all(pool)
    .await?;
    rows.retain(|row| row.archived != 0);
    Ok(rows)
}

pub async fn create_branch_service(
    pool: &SqlitePool,
    input: NewService,
) -> Result<ServiceRow, sqlx::Error> {
    let id = new_id();
    let now = Utc::now().to_rfc3339();
    sqlx::query(
        r#"INSERT INTO services (id, name, description, category, price, duration_minutes, image_url, branch_id, archived, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)"#,
    )
    .bind(&id)
    .bind(&input.name)
    .bind(&input.description)
    .bind(&input.category)
    .bind(input.price)
    .bind(input.duration_minutes)
    .bind(&input.image_url)
    .bind(&input.branch_id)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    service_by_id(pool, &id).await?.ok_or(sqlx::Error::RowNotFound)
}

pub async fn update_branch_service(
    pool: &SqlitePool,
    id: &str,
    name: &str,
    description: Option<&str>,
    category: Option<&str>,
    price: f64,
    duration_minutes: i64,
) -> Result<Option<ServiceRow>, sqlx::Error> {
    sqlx::query(
        r#"UPDATE services
           SET name = ?, description = ?, category = ?, price = ?, duration_minutes = ?, updated_at = ?
           WHERE id = ?"#,
    )
    .bind(name)
    .bind(description)
    .bind(category)
    .bind(price)
    .bind(duration_minutes)
    .bind(Utc::now().to_rfc3339())
    .bind(id)
    .execute(pool)
    .await?;

    service_by_id(pool, id).await
}

/// Soft delete: the row stays for historical appointment references but is
/// hidden from new-booking flows.
pub async fn archive_service(
    pool: &SqlitePool,
    id: &str,
) -> Result<Option<ServiceRow>, sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    sqlx::query("UPDATE services SET archived = 1, archived_at = ?, updated_at = ? WHERE id = ?")
        .bind(&now)
        .bind(&now)
        .bind(id)
        .execute(pool)
        .await?;

    service_by_id(pool, id).await
}

pub async fn unarchive_service(
    pool: &SqlitePool,
    id: &str,
) -> Result<Option<ServiceRow>, sqlx::Error> {
    sqlx::query("UPDATE services SET archived = 0, archived_at = NULL, updated_at = ? WHERE id = ?")
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(pool)
        .await?;

    service_by_id(pool, id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing;

    fn entry(name: &str, branch_id: Option<&str>) -> NewService {
        NewService {
            name: name.to_string(),
            description: None,
            category: Some("Haircut".to_string()),
            price: 40.0,
            duration_minutes: 45,
            image_url: None,
            branch_id: branch_id.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn branch_catalog_includes_global_entries() {
        let pool = testing::pool().await;
        create_branch_service(&pool, entry("Global Cut", None)).await.unwrap();
        create_branch_service(&pool, entry("Makati Perm", Some("b1"))).await.unwrap();
        create_branch_service(&pool, entry("Cebu Perm", Some("b2"))).await.unwrap();

        let rows = services_by_branch(&pool, "b1").await.unwrap();
        let names: Vec<&str> = rows.iter().map(|row| row.name.as_str()).collect();
        assert_eq!(names, vec!["Global Cut", "Makati Perm"]);
    }

    #[tokio::test]
    async fn archive_sets_flag_and_timestamp_and_unarchive_clears_both() {
        let pool = testing::pool().await;
        let service = create_branch_service(&pool, entry("Makati Perm", Some("b1")))
            .await
            .unwrap();
        assert_eq!(service.archived, 0);
        assert!(service.archived_at.is_none());

        let archived = archive_service(&pool, &service.id).await.unwrap().unwrap();
        assert_eq!(archived.archived, 1);
        assert!(archived.archived_at.is_some());

        assert!(services_by_branch(&pool, "b1").await.unwrap().is_empty());
        let shelf = archived_services_by_branch(&pool, "b1").await.unwrap();
        assert_eq!(shelf.len(), 1);

        let restored = unarchive_service(&pool, &service.id).await.unwrap().unwrap();
        assert_eq!(restored.archived, 0);
        assert!(restored.archived_at.is_none());
        assert_eq!(services_by_branch(&pool, "b1").await.unwrap().len(), 1);
    }
}
