pub mod auth;
pub mod db;
pub mod models;
pub mod push;
pub mod routes;
pub mod services;
pub mod state;
pub mod templates;

use std::env;
use std::str::FromStr;

use actix_files::Files;
use actix_web::{middleware, web, App, HttpServer};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tokio::sync::broadcast;

use crate::state::{AppState, PushConfig};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let db_url =
        env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://./data/salonhub.db".to_string());
    db::ensure_sqlite_dir(&db_url)?;

    let connect_options = SqliteConnectOptions::from_str(&db_url)?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options)
        .await?;

    db::run_migrations(&pool).await?;
    db::seed_defaults(&pool).await?;

    let (events, _) = broadcast::channel(64);
    let push = PushConfig {
        public_key: env::var("VAPID_PUBLIC_KEY").unwrap_or_default(),
        private_key: env::var("VAPID_PRIVATE_KEY").unwrap_or_default(),
        subject: env::var("VAPID_SUBJECT").unwrap_or_else(|_| "mailto:ops@salonhub.local".to_string()),
    };
    if !push.enabled() {
        log::warn!("VAPID keys not set. Push notifications are disabled.");
    }

    let state = AppState {
        db: pool.clone(),
        events,
        push,
    };

    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(8080);

    let address = format!("0.0.0.0:{port}");
    log::info!("Starting SalonHub on http://{address}");

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(middleware::Logger::default())
            .service(Files::new("/static", "./static").prefer_utf8(true))
            .configure(routes::public::configure)
            .configure(routes::reception::configure)
            .configure(routes::manager::configure)
            .configure(routes::stylist::configure)
            .configure(routes::inventory::configure)
            .configure(routes::admin::configure)
            .configure(routes::events::configure)
    })
    .bind(address)?
    .run()
    .await?;

    Ok(())
}
