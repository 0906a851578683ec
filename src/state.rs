use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::broadcast;

use crate::models::{AppointmentRow, ScheduleRow};

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub events: broadcast::Sender<ServerEvent>,
    pub push: PushConfig,
}

#[derive(Clone, Debug)]
pub struct PushConfig {
    pub public_key: String,
    pub private_key: String,
    pub subject: String,
}

impl PushConfig {
    pub fn enabled(&self) -> bool {
        !(self.public_key.trim().is_empty() || self.private_key.trim().is_empty())
    }
}

/// Event fanned out to SSE subscribers. The browser-side listeners the
/// dashboards attach are the moral equivalent of a document-store snapshot
/// subscription: one channel, filtered per stream by branch or appointment.
#[derive(Clone, Debug, Serialize)]
pub struct ServerEvent {
    pub kind: String,
    pub branch_id: Option<String>,
    pub appointment_id: Option<String>,
    pub status: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub client_name: Option<String>,
    pub stylist_id: Option<String>,
    pub stylist_name: Option<String>,
    pub total_cost: Option<f64>,
}

impl ServerEvent {
    pub fn from_appointment(kind: &str, row: &AppointmentRow) -> Self {
        Self {
            kind: kind.to_string(),
            branch_id: Some(row.branch_id.clone()),
            appointment_id: Some(row.id.clone()),
            status: Some(row.status.clone()),
            date: Some(row.date.clone()),
            time: Some(row.time.clone()),
            client_name: Some(row.client_name()),
            stylist_id: None,
            stylist_name: None,
            total_cost: Some(row.total_cost),
        }
    }

    pub fn from_schedule(kind: &str, row: &ScheduleRow) -> Self {
        Self {
            kind: kind.to_string(),
            branch_id: Some(row.branch_id.clone()),
            appointment_id: None,
            status: Some(row.status.clone()),
            date: Some(row.date.clone()),
            time: Some(row.start_time.clone()),
            client_name: None,
            stylist_id: Some(row.stylist_id.clone()),
            stylist_name: None,
            total_cost: None,
        }
    }

    /// Emitted when an override reverts to the implicit available default and
    /// no row remains to build the event from.
    pub fn schedule_cleared(branch_id: &str, stylist_id: &str, date: &str) -> Self {
        Self {
            kind: "schedule_cleared".to_string(),
            branch_id: Some(branch_id.to_string()),
            appointment_id: None,
            status: Some(crate::models::SLOT_AVAILABLE.to_string()),
            date: Some(date.to_string()),
            time: None,
            client_name: None,
            stylist_id: Some(stylist_id.to_string()),
            stylist_name: None,
            total_cost: None,
        }
    }
}
