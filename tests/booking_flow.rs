use std::collections::BTreeMap;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use salonhub::models::{BookedService, StylistAssignment, SLOT_OFF, STATUS_PENDING};
use salonhub::services::{appointments, branches, catalog, schedules, users};

async fn pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory pool");
    salonhub::db::run_migrations(&pool).await.expect("migrations");
    pool
}

fn monday_hours() -> BTreeMap<String, String> {
    let mut hours = BTreeMap::new();
    hours.insert("Monday".to_string(), "9:00 AM - 5:00 PM".to_string());
    hours.insert("Sunday".to_string(), "Closed".to_string());
    hours
}

/// Branch setup through booking to completion, touching every layer a
/// receptionist would.
#[tokio::test]
async fn booking_runs_end_to_end() {
    let pool = pool().await;

    let branch = branches::create_branch(
        &pool,
        branches::NewBranch {
            name: "branch_test".to_string(),
            address: "1 High Street".to_string(),
            phone: "+1 555 0100".to_string(),
            email: None,
            operating_hours: monday_hours(),
            manager_id: None,
        },
    )
    .await
    .unwrap();

    // 2025-03-10 is a Monday: 9:00 AM - 5:00 PM gives 09:00..16:00 hourly.
    let slots = branches::time_slots_for(&branch, "2025-03-10");
    assert_eq!(slots.first().map(String::as_str), Some("09:00"));
    assert_eq!(slots.last().map(String::as_str), Some("16:00"));
    assert_eq!(slots.len(), 8);

    let cut = catalog::create_branch_service(
        &pool,
        catalog::NewService {
            name: "Signature Cut".to_string(),
            description: None,
            category: Some("Haircut".to_string()),
            price: 38.0,
            duration_minutes: 45,
            image_url: None,
            branch_id: Some(branch.id.clone()),
        },
    )
    .await
    .unwrap();

    let stylist = users::create_staff(
        &pool,
        users::NewStaff {
            email: "dana@example.com".to_string(),
            phone: "+1 555 0311".to_string(),
            password: "change-me".to_string(),
            first_name: "Dana".to_string(),
            last_name: "Reyes".to_string(),
            birth_date: None,
            gender: None,
            role: "stylist".to_string(),
            branch_id: Some(branch.id.clone()),
            employee_id: Some("EMP-0100".to_string()),
            hire_date: None,
            salary: None,
            skills: vec!["Haircut".to_string()],
        },
    )
    .await
    .unwrap();

    let client = users::create_client(
        &pool,
        users::NewClient {
            email: "ana@example.com".to_string(),
            phone: "+1 555 0301".to_string(),
            first_name: "Ana".to_string(),
            last_name: "Cruz".to_string(),
            birth_date: None,
            gender: None,
            category: None,
        },
    )
    .await
    .unwrap();

    let appointment = appointments::create_appointment(
        &pool,
        appointments::NewAppointment {
            branch_id: branch.id.clone(),
            date: "2025-03-10".to_string(),
            time: slots[0].clone(),
            client_first_name: "Ana".to_string(),
            client_last_name: "Cruz".to_string(),
            client_phone: client.phone.clone(),
            client_email: Some(client.email.clone()),
            services: vec![BookedService {
                id: cut.id.clone(),
                name: cut.name.clone(),
                duration: cut.duration_minutes,
                price: cut.price,
            }],
            stylists: Vec::new(),
            status: None,
            total_cost: None,
            notes: None,
        },
    )
    .await
    .unwrap();

    assert_eq!(appointment.status, STATUS_PENDING);
    assert_eq!(appointment.total_cost, 38.0);

    appointments::assign_stylist(
        &pool,
        &appointment.id,
        StylistAssignment {
            service_id: cut.id.clone(),
            service_name: cut.name.clone(),
            stylist_id: stylist.id.clone(),
            stylist_name: stylist.display_name(),
        },
    )
    .await
    .unwrap();

    let mine = appointments::appointments_for_stylist(&pool, &branch.id, &stylist.id)
        .await
        .unwrap();
    assert_eq!(mine.len(), 1);

    appointments::update_status(&pool, &appointment.id, "completed")
        .await
        .unwrap()
        .unwrap();
    users::award_loyalty(&pool, &client.id, Some(&appointment.id), 38, "appointment completed")
        .await
        .unwrap();

    let client = users::user_by_id(&pool, &client.id).await.unwrap().unwrap();
    assert_eq!(client.loyalty_points, Some(38));

    let listed = appointments::appointments_by_branch(&pool, &branch.id, None, Some("completed"))
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
}

/// Booking slots and the stylist exception calendar stay independent: the
/// exception policy persists no row for "available" days.
#[tokio::test]
async fn schedule_exceptions_overlay_branch_hours() {
    let pool = pool().await;

    let branch = branches::create_branch(
        &pool,
        branches::NewBranch {
            name: "branch_test".to_string(),
            address: "1 High Street".to_string(),
            phone: "+1 555 0100".to_string(),
            email: None,
            operating_hours: monday_hours(),
            manager_id: None,
        },
    )
    .await
    .unwrap();

    let slot = schedules::SlotInput {
        start_time: "09:00".to_string(),
        end_time: "17:00".to_string(),
        status: SLOT_OFF.to_string(),
        notes: Some("leave".to_string()),
    };
    schedules::set_availability(&pool, "sty-1", &branch.id, "2025-03-10", &slot)
        .await
        .unwrap();

    assert_eq!(
        schedules::effective_status(&pool, "sty-1", "2025-03-10").await.unwrap(),
        SLOT_OFF
    );
    assert_eq!(
        schedules::effective_status(&pool, "sty-1", "2025-03-11").await.unwrap(),
        "available"
    );

    let day = schedules::schedules_by_date(&pool, &branch.id, "2025-03-10")
        .await
        .unwrap();
    assert_eq!(day.len(), 1);

    // Branch hours are unaffected by the stylist's day off.
    assert_eq!(branches::time_slots_for(&branch, "2025-03-10").len(), 8);
}
