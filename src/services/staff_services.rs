use sqlx::SqlitePool;

use crate::{auth::new_id, models::StaffServiceRow};

/// Links a staff member to a service they can perform. Idempotent: the
/// (staff, service) pair is unique and a repeat assign is a no-op.
pub async fn assign(
    pool: &SqlitePool,
    staff_id: &str,
    service_id: &str,
    branch_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO staff_services (id, staff_id, service_id, branch_id)
           VALUES (?, ?, ?, ?)
           ON CONFLICT(staff_id, service_id) DO NOTHING"#,
    )
    .bind(new_id())
    .bind(staff_id)
    .bind(service_id)
    .bind(branch_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn unassign(
    pool: &SqlitePool,
    staff_id: &str,
    service_id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM staff_services WHERE staff_id = ? AND service_id = ?")
        .bind(staff_id)
        .bind(service_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn services_for_staff(
    pool: &SqlitePool,
    staff_id: &str,
) -> Result<Vec<StaffServiceRow>, sqlx::Error> {
    sqlx::query_as::<_, StaffServiceRow>("SELECT * FROM staff_services WHERE staff_id = ?")
        .bind(staff_id)
        .fetch_all(pool)
        .await
}

pub async fn links_for_branch(
    pool: &SqlitePool,
    branch_id: &str,
) -> Result<Vec<StaffServiceRow>, sqlx::Error> {
    sqlx::query_as::<_, StaffServiceRow>("SELECT * FROM staff_services WHERE branch_id = ?")
        .bind(branch_id)
        .fetch_all(pool)
        .await
}

pub async fn staff_for_service(
    pool: &SqlitePool,
    service_id: &str,
    branch_id: &str,
) -> Result<Vec<StaffServiceRow>, sqlx::Error> {
    sqlx::query_as::<_, StaffServiceRow>(
        "SELECT * FROM staff_services WHERE service_id = ? AND branch_id = ?",
    )
    .bind(service_id)
    .bind(branch_id)
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing;

    #[tokio::test]
    async fn assign_is_idempotent() {
        let pool = testing::pool().await;
        assign(&pool, "sty-1", "svc-1", "b1").await.unwrap();
        assign(&pool, "sty-1", "svc-1", "b1").await.unwrap();
        assign(&pool, "sty-1", "svc-2", "b1").await.unwrap();

        let rows = services_for_staff(&pool, "sty-1").await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn staff_lookup_is_scoped_to_branch() {
        let pool = testing::pool().await;
        assign(&pool, "sty-1", "svc-1", "b1").await.unwrap();
        assign(&pool, "sty-2", "svc-1", "b2").await.unwrap();

        let rows = staff_for_service(&pool, "svc-1", "b1").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].staff_id, "sty-1");
    }

    #[tokio::test]
    async fn unassign_reports_whether_a_link_existed() {
        let pool = testing::pool().await;
        assign(&pool, "sty-1", "svc-1", "b1").await.unwrap();
        assert!(unassign(&pool, "sty-1", "svc-1").await.unwrap());
        assert!(!unassign(&pool, "sty-1", "svc-1").await.unwrap());
    }
}
