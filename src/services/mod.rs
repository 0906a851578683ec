//! Data-access layer: thin service modules over the SQLite pool. Route
//! handlers stay free of SQL; everything they persist or read goes through
//! these functions.

pub mod appointments;
pub mod branches;
pub mod catalog;
pub mod inventory;
pub mod schedules;
pub mod staff_services;
pub mod users;

#[cfg(test)]
pub(crate) mod testing {
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;

    /// Single-connection in-memory database with migrations applied. One
    /// connection only: each new `:memory:` connection would otherwise get
    /// its own empty database.
    pub async fn pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory pool");
        crate::db::run_migrations(&pool).await.expect("migrations");
        pool
    }
}
