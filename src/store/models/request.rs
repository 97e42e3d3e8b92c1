//! Borrow request model and its status lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common::{new_id, timestamp};

/// Request status.
///
/// `pending -> approved | rejected`, `approved -> returned`. Rejected and
/// returned are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Returned,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 4] = [
        RequestStatus::Pending,
        RequestStatus::Approved,
        RequestStatus::Rejected,
        RequestStatus::Returned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Returned => "returned",
        }
    }

    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved)
                | (Self::Pending, Self::Rejected)
                | (Self::Approved, Self::Returned)
        )
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "returned" => Ok(Self::Returned),
            _ => Err(format!("Unknown request status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BorrowRequest {
    pub id: String,
    pub student_id: String,
    pub student_name: String,
    pub roll_no: String,
    pub mobile: String,
    pub component_name: String,
    pub quantity: u32,
    #[serde(with = "timestamp")]
    pub request_date: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub due_date: DateTime<Utc>,
    pub status: RequestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(
        default,
        with = "timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        with = "timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub returned_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl BorrowRequest {
    /// Approved and past its due date without a return
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == RequestStatus::Approved && self.due_date < now
    }
}

/// Input for a new borrow request, as submitted by a student
#[derive(Debug, Clone)]
pub struct NewBorrowRequest {
    pub student_id: String,
    pub student_name: String,
    pub roll_no: String,
    pub mobile: String,
    pub component_name: String,
    pub quantity: u32,
    pub due_date: DateTime<Utc>,
    pub notes: Option<String>,
}

impl NewBorrowRequest {
    pub fn into_request(self, now: DateTime<Utc>) -> BorrowRequest {
        BorrowRequest {
            id: new_id("req"),
            student_id: self.student_id,
            student_name: self.student_name.trim().to_string(),
            roll_no: self.roll_no.trim().to_string(),
            mobile: self.mobile.trim().to_string(),
            component_name: self.component_name.trim().to_string(),
            quantity: self.quantity,
            request_date: now,
            due_date: self.due_date,
            status: RequestStatus::Pending,
            approved_by: None,
            approved_at: None,
            returned_at: None,
            notes: self.notes.filter(|n| !n.trim().is_empty()),
        }
    }
}
