//! Input validation for requests and inventory changes.
//!
//! Single checks return `Result<(), String>`; the `validate_new_*`
//! functions collect every failure with a [`ValidationErrorBuilder`].

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{ValidationErrorBuilder, ValidationErrors};
use crate::store::{NewBorrowRequest, NewComponent, Snapshot};

lazy_static! {
    /// Regex for validating email addresses
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9]([a-zA-Z0-9-]*[a-zA-Z0-9])?(\.[a-zA-Z0-9]([a-zA-Z0-9-]*[a-zA-Z0-9])?)+$"
    ).unwrap();

    /// Regex for 10-digit mobile numbers, with an optional +91 prefix
    static ref MOBILE_REGEX: Regex = Regex::new(
        r"^(\+91[ -]?)?[0-9]{10}$"
    ).unwrap();

    /// Regex for roll numbers (letters, digits, `/` and `-`, 2-20 chars)
    static ref ROLL_NO_REGEX: Regex = Regex::new(
        r"^[A-Za-z0-9][A-Za-z0-9/-]{0,18}[A-Za-z0-9]$"
    ).unwrap();
}

/// Largest quantity a single component record may hold
const MAX_TOTAL_QUANTITY: u32 = 10_000;

pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }
    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }
    if !EMAIL_REGEX.is_match(email) {
        return Err(format!("Invalid email address: {}", email));
    }
    Ok(())
}

pub fn validate_mobile(mobile: &str) -> Result<(), String> {
    if mobile.is_empty() {
        return Err("Mobile number is required".to_string());
    }
    if !MOBILE_REGEX.is_match(mobile) {
        return Err("Mobile number must have 10 digits".to_string());
    }
    Ok(())
}

pub fn validate_roll_no(roll_no: &str) -> Result<(), String> {
    if roll_no.is_empty() {
        return Err("Roll number is required".to_string());
    }
    if !ROLL_NO_REGEX.is_match(roll_no) {
        return Err(
            "Roll number must be 2-20 letters or digits (/ and - allowed inside)".to_string(),
        );
    }
    Ok(())
}

/// Non-empty after trimming and at most `max` characters
pub fn validate_name(label: &str, value: &str, max: usize) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{} is required", label));
    }
    if value.chars().count() > max {
        return Err(format!("{} is too long (max {} characters)", label, max));
    }
    Ok(())
}

/// Check a borrow request before it is filed.
///
/// Quantity is checked against the component total, not current
/// availability: stock is only reserved on approval.
pub fn validate_new_request(
    request: &NewBorrowRequest,
    snapshot: &Snapshot,
    now: DateTime<Utc>,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrorBuilder::new();

    errors.check("student_name", validate_name("Student name", &request.student_name, 100));
    errors.check("roll_no", validate_roll_no(&request.roll_no));
    errors.check("mobile", validate_mobile(&request.mobile));

    match snapshot.find_component_by_name(&request.component_name) {
        Some(component) => {
            if request.quantity == 0 {
                errors.add("quantity", "Quantity must be at least 1");
            } else if request.quantity > component.total_quantity {
                errors.add(
                    "quantity",
                    format!(
                        "Only {} {} exist in the lab",
                        component.total_quantity, component.name
                    ),
                );
            }
        }
        None => {
            errors.add(
                "component_name",
                format!("Unknown component: {}", request.component_name),
            );
        }
    }

    if request.due_date <= now {
        errors.add("due_date", "Due date must be in the future");
    }

    errors.finish()
}

pub fn validate_new_component(
    component: &NewComponent,
    snapshot: &Snapshot,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrorBuilder::new();

    errors.check("name", validate_name("Name", &component.name, 100));
    errors.check("category", validate_name("Category", &component.category, 50));

    if snapshot.find_component_by_name(&component.name).is_some() {
        errors.add("name", format!("Component {} already exists", component.name));
    }
    if component.total_quantity > MAX_TOTAL_QUANTITY {
        errors.add(
            "total_quantity",
            format!("Total quantity must be at most {}", MAX_TOTAL_QUANTITY),
        );
    }
    if let Some(description) = &component.description {
        if description.chars().count() > 500 {
            errors.add("description", "Description is too long (max 500 characters)");
        }
    }

    errors.finish()
}
