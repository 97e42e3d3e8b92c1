//! Default dataset for a fresh (or unreadable) store.

use chrono::{DateTime, Utc};
use tracing::info;

use super::models::{Component, Snapshot, User, UserRole};

/// Id of the built-in administrator account
pub const ADMIN_USER_ID: &str = "admin-1";

/// Build the seeded snapshot: one administrator and the starter inventory.
pub fn default_snapshot(admin_email: &str, now: DateTime<Utc>) -> Snapshot {
    info!("Seeding default lab inventory...");

    // Format: (id, name, total, category, description)
    let inventory: Vec<(&str, &str, u32, &str, &str)> = vec![
        (
            "comp-1",
            "Arduino Uno R3",
            25,
            "Microcontroller",
            "Arduino Uno R3 development board",
        ),
        (
            "comp-2",
            "L298N Motor Driver",
            15,
            "Motor Driver",
            "Dual H-Bridge Motor Driver",
        ),
        (
            "comp-3",
            "Ultrasonic Sensor HC-SR04",
            20,
            "Sensor",
            "Ultrasonic distance sensor",
        ),
        ("comp-4", "Servo Motor SG90", 30, "Actuator", "9g micro servo motor"),
        (
            "comp-5",
            "ESP32 Development Board",
            12,
            "Microcontroller",
            "WiFi and Bluetooth enabled microcontroller",
        ),
    ];

    let components = inventory
        .into_iter()
        .map(|(id, name, total, category, description)| Component {
            id: id.to_string(),
            name: name.to_string(),
            category: category.to_string(),
            total_quantity: total,
            available_quantity: total,
            description: Some(description.to_string()),
        })
        .collect();

    Snapshot {
        users: vec![User {
            id: ADMIN_USER_ID.to_string(),
            name: "Administrator".to_string(),
            email: admin_email.to_string(),
            role: UserRole::Admin,
            registered_at: now,
            last_login_at: None,
            login_count: 0,
            is_active: false,
        }],
        components,
        requests: Vec::new(),
        notifications: Vec::new(),
        login_sessions: Vec::new(),
    }
}
