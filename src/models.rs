use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::types::Json;

pub const ROLE_CLIENT: &str = "client";
pub const ROLE_STYLIST: &str = "stylist";
pub const ROLE_RECEPTIONIST: &str = "receptionist";
pub const ROLE_BRANCH_MANAGER: &str = "branch_manager";
pub const ROLE_BRANCH_ADMIN: &str = "branch_admin";
pub const ROLE_INVENTORY_CONTROLLER: &str = "inventory_controller";
pub const ROLE_OPERATIONAL_MANAGER: &str = "operational_manager";
pub const ROLE_SUPER_ADMIN: &str = "super_admin";

pub const STAFF_ROLES: &[&str] = &[
    ROLE_STYLIST,
    ROLE_RECEPTIONIST,
    ROLE_BRANCH_MANAGER,
    ROLE_BRANCH_ADMIN,
    ROLE_INVENTORY_CONTROLLER,
    ROLE_OPERATIONAL_MANAGER,
    ROLE_SUPER_ADMIN,
];

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_CONFIRMED: &str = "confirmed";
pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_CANCELLED: &str = "cancelled";
pub const STATUS_NO_SHOW: &str = "no-show";

pub const APPOINTMENT_STATUSES: &[&str] = &[
    STATUS_PENDING,
    STATUS_CONFIRMED,
    STATUS_COMPLETED,
    STATUS_CANCELLED,
    STATUS_NO_SHOW,
];

/// Schedule slot statuses. `available` is the implicit default and is never
/// persisted; the rest are stored as exception records.
pub const SLOT_AVAILABLE: &str = "available";
pub const SLOT_BUSY: &str = "busy";
pub const SLOT_BREAK: &str = "break";
pub const SLOT_OFF: &str = "off";

pub const SLOT_STATUSES: &[&str] = &[SLOT_AVAILABLE, SLOT_BUSY, SLOT_BREAK, SLOT_OFF];

pub const PO_DRAFT: &str = "draft";
pub const PO_ORDERED: &str = "ordered";
pub const PO_RECEIVED: &str = "received";
pub const PO_CANCELLED: &str = "cancelled";

pub const TRANSFER_PENDING: &str = "pending";
pub const TRANSFER_COMPLETED: &str = "completed";
pub const TRANSFER_CANCELLED: &str = "cancelled";

#[allow(dead_code)]
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub phone: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<String>,
    pub gender: Option<String>,
    pub role: String,
    pub active: i64,
    pub created_at: String,
    pub updated_at: String,
    pub category: Option<String>,
    pub loyalty_points: Option<i64>,
    pub referral_code: Option<String>,
    pub preferences: Option<Json<serde_json::Value>>,
    pub branch_id: Option<String>,
    pub employee_id: Option<String>,
    pub hire_date: Option<String>,
    pub salary: Option<f64>,
    pub skills: Option<Json<Vec<String>>>,
}

impl UserRow {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn skill_list(&self) -> &[String] {
        self.skills
            .as_ref()
            .map(|json| json.0.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BranchRow {
    pub id: String,
    pub name: String,
    pub address: String,
    pub phone: String,
    pub email: Option<String>,
    pub operating_hours: Json<BTreeMap<String, String>>,
    pub manager_id: Option<String>,
    pub active: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ServiceRow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: f64,
    pub duration_minutes: i64,
    pub image_url: Option<String>,
    pub branch_id: Option<String>,
    pub archived: i64,
    pub archived_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Catalog entry denormalized into an appointment at booking time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookedService {
    pub id: String,
    pub name: String,
    pub duration: i64,
    pub price: f64,
}

/// Stylist assigned to one service line of an appointment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StylistAssignment {
    pub service_id: String,
    pub service_name: String,
    pub stylist_id: String,
    pub stylist_name: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AppointmentRow {
    pub id: String,
    pub branch_id: String,
    pub date: String,
    pub time: String,
    pub client_first_name: String,
    pub client_last_name: String,
    pub client_phone: String,
    pub client_email: Option<String>,
    pub services: Json<Vec<BookedService>>,
    pub stylists: Json<Vec<StylistAssignment>>,
    pub status: String,
    pub total_cost: f64,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl AppointmentRow {
    pub fn client_name(&self) -> String {
        format!("{} {}", self.client_first_name, self.client_last_name)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScheduleRow {
    pub id: String,
    pub stylist_id: String,
    pub branch_id: String,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[allow(dead_code)]
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StaffServiceRow {
    pub id: String,
    pub staff_id: String,
    pub service_id: String,
    pub branch_id: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ActivityRow {
    pub message: String,
    pub created_at: String,
}

#[allow(dead_code)]
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SupplierRow {
    pub id: String,
    pub name: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub active: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[allow(dead_code)]
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MasterProductRow {
    pub id: String,
    pub name: String,
    pub category: Option<String>,
    pub unit: String,
    pub description: Option<String>,
    pub supplier_id: Option<String>,
    pub active: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Branch product joined with its master record and current stock level.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BranchStockRow {
    pub product_id: String,
    pub product_name: String,
    pub unit: String,
    pub category: Option<String>,
    pub retail_price: f64,
    pub reorder_level: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PurchaseOrderRow {
    pub id: String,
    pub branch_id: String,
    pub supplier_id: String,
    pub supplier_name: Option<String>,
    pub status: String,
    pub ordered_at: Option<String>,
    pub received_at: Option<String>,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PurchaseOrderDetailRow {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub product_name: Option<String>,
    pub quantity: i64,
    pub unit_cost: f64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StockTransferRow {
    pub id: String,
    pub from_branch_id: String,
    pub to_branch_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub status: String,
    pub requested_by: String,
    pub created_at: String,
    pub updated_at: String,
}
