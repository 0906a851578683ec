use chrono::Utc;
use sqlx::{types::Json, SqlitePool};
use uuid::Uuid;

use crate::{
    auth::{hash_password, new_id},
    models::{UserRow, ROLE_CLIENT, ROLE_STYLIST},
};

pub struct NewStaff {
    pub email: String,
    pub phone: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<String>,
    pub gender: Option<String>,
    pub role: String,
    pub branch_id: Option<String>,
    pub employee_id: Option<String>,
    pub hire_date: Option<String>,
    pub salary: Option<f64>,
    pub skills: Vec<String>,
}

pub struct NewClient {
    pub email: String,
    pub phone: String,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<String>,
    pub gender: Option<String>,
    pub category: Option<String>,
}

pub async fn user_by_id(pool: &SqlitePool, id: &str) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = ? LIMIT 1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Active stylists, optionally narrowed to a branch and a skill. The role
/// read runs in SQL; branch and skill matching happen in memory over the
/// profile columns.
pub async fn stylists_by_branch(
    pool: &SqlitePool,
    branch_id: Option<&str>,
    skill: Option<&str>,
) -> Result<Vec<UserRow>, sqlx::Error> {
    let rows = sqlx::query_as::<_, UserRow>(
        "SELECT * FROM users WHERE role = ? AND active = 1 ORDER BY first_name, last_name",
    )
    .bind(ROLE_STYLIST)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .filter(|row| match branch_id {
            Some(branch) => row.branch_id.as_deref() == Some(branch),
            None => true,
        })
        .filter(|row| match skill {
            Some(skill) => row.skill_list().iter().any(|s| s == skill),
            None => true,
        })
        .collect())
}

pub async fn staff_by_branch(
    pool: &SqlitePool,
    branch_id: Option<&str>,
) -> Result<Vec<UserRow>, sqlx::Error> {
    let rows = sqlx::query_as::<_, UserRow>(
        "SELECT * FROM users WHERE role != ? AND active = 1 ORDER BY role, first_name",
    )
    .bind(ROLE_CLIENT)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .filter(|row| match branch_id {
            Some(branch) => row.branch_id.as_deref() == Some(branch),
            None => true,
        })
        .collect())
}

pub async fn clients(pool: &SqlitePool) -> Result<Vec<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>(
        "SELECT * FROM users WHERE role = ? AND active = 1 ORDER BY first_name, last_name",
    )
    .bind(ROLE_CLIENT)
    .fetch_all(pool)
    .await
}

pub async fn client_by_email(
    pool: &SqlitePool,
    email: &str,
) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE role = ? AND email = ? LIMIT 1")
        .bind(ROLE_CLIENT)
        .bind(email)
        .fetch_optional(pool)
        .await
}

/// True iff another user already holds this email. Advisory, for form
/// validation; the unique index is what actually prevents duplicates.
pub async fn email_exists(
    pool: &SqlitePool,
    email: &str,
    exclude_id: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let rows = sqlx::query_as::<_, (String,)>("SELECT id FROM users WHERE email = ?")
        .bind(email)
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().any(|(id,)| Some(id.as_str()) != exclude_id))
}

pub async fn phone_exists(
    pool: &SqlitePool,
    phone: &str,
    exclude_id: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let rows = sqlx::query_as::<_, (String,)>("SELECT id FROM users WHERE phone = ?")
        .bind(phone)
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().any(|(id,)| Some(id.as_str()) != exclude_id))
}

pub async fn create_staff(pool: &SqlitePool, input: NewStaff) -> Result<UserRow, sqlx::Error> {
    let id = new_id();
    let now = Utc::now().to_rfc3339();
    let password_hash = hash_password(&input.password)
        .map_err(|_| sqlx::Error::Protocol("password hash failed".into()))?;

    sqlx::query(
        r#"INSERT INTO users
           (id, email, phone, password_hash, first_name, last_name, birth_date, gender, role,
            active, created_at, updated_at, branch_id, employee_id, hire_date, salary, skills)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&id)
    .bind(&input.email)
    .bind(&input.phone)
    .bind(password_hash)
    .bind(&input.first_name)
    .bind(&input.last_name)
    .bind(&input.birth_date)
    .bind(&input.gender)
    .bind(&input.role)
    .bind(&now)
    .bind(&now)
    .bind(&input.branch_id)
    .bind(&input.employee_id)
    .bind(&input.hire_date)
    .bind(input.salary)
    .bind(Json(&input.skills))
    .execute(pool)
    .await?;

    user_by_id(pool, &id).await?.ok_or(sqlx::Error::RowNotFound)
}

/// Clients are created by staff and do not log in, so they get a random
/// throwaway password. A referral code is minted at creation.
pub async fn create_client(pool: &SqlitePool, input: NewClient) -> Result<UserRow, sqlx::Error> {
    let id = new_id();
    let now = Utc::now().to_rfc3339();
    let password_hash = hash_password(&Uuid::new_v4().to_string())
        .map_err(|_| sqlx::Error::Protocol("password hash failed".into()))?;
    let referral_code = referral_code();

    sqlx::query(
        r#"INSERT INTO users
           (id, email, phone, password_hash, first_name, last_name, birth_date, gender, role,
            active, created_at, updated_at, category, loyalty_points, referral_code)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?, ?, 0, ?)"#,
    )
    .bind(&id)
    .bind(&input.email)
    .bind(&input.phone)
    .bind(password_hash)
    .bind(&input.first_name)
    .bind(&input.last_name)
    .bind(&input.birth_date)
    .bind(&input.gender)
    .bind(ROLE_CLIENT)
    .bind(&now)
    .bind(&now)
    .bind(&input.category)
    .bind(referral_code)
    .execute(pool)
    .await?;

    user_by_id(pool, &id).await?.ok_or(sqlx::Error::RowNotFound)
}

fn referral_code() -> String {
    Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(8)
        .collect::<String>()
        .to_uppercase()
}

pub async fn client_by_referral_code(
    pool: &SqlitePool,
    code: &str,
) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>(
        "SELECT * FROM users WHERE role = ? AND referral_code = ? LIMIT 1",
    )
    .bind(ROLE_CLIENT)
    .bind(code)
    .fetch_optional(pool)
    .await
}

/// Contact-detail update shared by every role; absent fields keep their
/// current value.
pub async fn update_user(
    pool: &SqlitePool,
    id: &str,
    first_name: Option<&str>,
    last_name: Option<&str>,
    phone: Option<&str>,
    email: Option<&str>,
) -> Result<Option<UserRow>, sqlx::Error> {
    let Some(current) = user_by_id(pool, id).await? else {
        return Ok(None);
    };

    sqlx::query(
        "UPDATE users SET first_name = ?, last_name = ?, phone = ?, email = ?, updated_at = ? WHERE id = ?",
    )
    .bind(first_name.unwrap_or(&current.first_name))
    .bind(last_name.unwrap_or(&current.last_name))
    .bind(phone.unwrap_or(&current.phone))
    .bind(email.unwrap_or(&current.email))
    .bind(Utc::now().to_rfc3339())
    .bind(id)
    .execute(pool)
    .await?;

    user_by_id(pool, id).await
}

pub async fn deactivate_user(pool: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE users SET active = 0, updated_at = ? WHERE id = ?")
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Ledger entry plus counter update in one transaction.
pub async fn award_loyalty(
    pool: &SqlitePool,
    client_id: &str,
    appointment_id: Option<&str>,
    points: i64,
    reason: &str,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"INSERT INTO loyalty (id, client_id, appointment_id, points, reason, created_at)
           VALUES (?, ?, ?, ?, ?, ?)"#,
    )
    .bind(new_id())
    .bind(client_id)
    .bind(appointment_id)
    .bind(points)
    .bind(reason)
    .bind(Utc::now().to_rfc3339())
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "UPDATE users SET loyalty_points = COALESCE(loyalty_points, 0) + ?, updated_at = ? WHERE id = ?",
    )
    .bind(points)
    .bind(Utc::now().to_rfc3339())
    .bind(client_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await
}

pub async fn record_referral(
    pool: &SqlitePool,
    referrer_id: &str,
    referred_id: &str,
    code: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO referrals (id, referrer_id, referred_id, code, created_at)
           VALUES (?, ?, ?, ?, ?)"#,
    )
    .bind(new_id())
    .bind(referrer_id)
    .bind(referred_id)
    .bind(code)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing;

    fn client(email: &str, phone: &str) -> NewClient {
        NewClient {
            email: email.to_string(),
            phone: phone.to_string(),
            first_name: "Ana".to_string(),
            last_name: "Cruz".to_string(),
            birth_date: None,
            gender: None,
            category: None,
        }
    }

    fn stylist(email: &str, phone: &str, branch: &str, skills: &[&str]) -> NewStaff {
        NewStaff {
            email: email.to_string(),
            phone: phone.to_string(),
            password: "change-me".to_string(),
            first_name: "Dana".to_string(),
            last_name: "Reyes".to_string(),
            birth_date: None,
            gender: None,
            role: ROLE_STYLIST.to_string(),
            branch_id: Some(branch.to_string()),
            employee_id: None,
            hire_date: None,
            salary: None,
            skills: skills.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn uniqueness_checks_exclude_the_given_id() {
        let pool = testing::pool().await;
        let row = create_client(&pool, client("ana@example.com", "+1 555 0301"))
            .await
            .unwrap();

        assert!(email_exists(&pool, "ana@example.com", None).await.unwrap());
        assert!(!email_exists(&pool, "ana@example.com", Some(&row.id)).await.unwrap());
        assert!(!email_exists(&pool, "other@example.com", None).await.unwrap());

        assert!(phone_exists(&pool, "+1 555 0301", None).await.unwrap());
        assert!(!phone_exists(&pool, "+1 555 0301", Some(&row.id)).await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected_by_the_index() {
        let pool = testing::pool().await;
        create_client(&pool, client("ana@example.com", "+1 555 0301"))
            .await
            .unwrap();
        let result = create_client(&pool, client("ana@example.com", "+1 555 0302")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn new_clients_get_referral_code_and_zero_points() {
        let pool = testing::pool().await;
        let row = create_client(&pool, client("ana@example.com", "+1 555 0301"))
            .await
            .unwrap();
        assert_eq!(row.loyalty_points, Some(0));
        assert_eq!(row.referral_code.as_ref().map(String::len), Some(8));
    }

    #[tokio::test]
    async fn stylist_filters_apply_branch_and_skill_in_memory() {
        let pool = testing::pool().await;
        create_staff(&pool, stylist("d@example.com", "+1 555 0311", "b1", &["Haircut", "Color"]))
            .await
            .unwrap();
        create_staff(&pool, stylist("e@example.com", "+1 555 0312", "b1", &["Nails"]))
            .await
            .unwrap();
        create_staff(&pool, stylist("f@example.com", "+1 555 0313", "b2", &["Haircut"]))
            .await
            .unwrap();

        assert_eq!(stylists_by_branch(&pool, Some("b1"), None).await.unwrap().len(), 2);
        assert_eq!(
            stylists_by_branch(&pool, Some("b1"), Some("Haircut")).await.unwrap().len(),
            1
        );
        assert_eq!(stylists_by_branch(&pool, None, Some("Haircut")).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn update_user_keeps_absent_fields() {
        let pool = testing::pool().await;
        let row = create_client(&pool, client("ana@example.com", "+1 555 0301"))
            .await
            .unwrap();

        let updated = update_user(&pool, &row.id, None, Some("Cruz-Santos"), Some("+1 555 0399"), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.first_name, "Ana");
        assert_eq!(updated.last_name, "Cruz-Santos");
        assert_eq!(updated.phone, "+1 555 0399");
        assert_eq!(updated.email, "ana@example.com");
    }

    #[tokio::test]
    async fn referral_codes_resolve_and_record() {
        let pool = testing::pool().await;
        let referrer = create_client(&pool, client("ana@example.com", "+1 555 0301"))
            .await
            .unwrap();
        let referred = create_client(&pool, client("ben@example.com", "+1 555 0302"))
            .await
            .unwrap();

        let code = referrer.referral_code.clone().unwrap();
        let found = client_by_referral_code(&pool, &code).await.unwrap().unwrap();
        assert_eq!(found.id, referrer.id);

        record_referral(&pool, &referrer.id, &referred.id, &code)
            .await
            .unwrap();
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM referrals WHERE referrer_id = ?")
            .bind(&referrer.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn loyalty_award_updates_ledger_and_counter() {
        let pool = testing::pool().await;
        let row = create_client(&pool, client("ana@example.com", "+1 555 0301"))
            .await
            .unwrap();

        award_loyalty(&pool, &row.id, None, 38, "appointment completed")
            .await
            .unwrap();
        award_loyalty(&pool, &row.id, None, 12, "referral bonus").await.unwrap();

        let updated = user_by_id(&pool, &row.id).await.unwrap().unwrap();
        assert_eq!(updated.loyalty_points, Some(50));

        let entries = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM loyalty WHERE client_id = ?")
            .bind(&row.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(entries, 2);
    }
}
