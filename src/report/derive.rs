//! Derived-column formulas shared by every sheet and the preview.
//!
//! Divisions by zero yield 0. Day differences are `ceil(ms / 86_400_000)`.

use chrono::{DateTime, Utc};

use crate::store::{BorrowRequest, LoginSession, RequestStatus};

/// Milliseconds per day
pub const DAY_MS: i64 = 86_400_000;

/// Available share below which stock is LOW (20%)
const LOW_STOCK_RATIO: f64 = 0.2;

/// Available share below which stock is MEDIUM (50%)
const MEDIUM_STOCK_RATIO: f64 = 0.5;

/// Pending requests older than this many days are flagged as delayed
const DELAYED_AFTER_DAYS: i64 = 2;

/// `ceil((later - earlier) / 1 day)`; negative when `later` is earlier
pub fn ceil_days(later: DateTime<Utc>, earlier: DateTime<Utc>) -> i64 {
    let ms = (later - earlier).num_milliseconds();
    (ms as f64 / DAY_MS as f64).ceil() as i64
}

/// Share of stock currently borrowed, in [0, 100]
pub fn utilization_percent(total: u64, available: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let borrowed = total.saturating_sub(available);
    (borrowed as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
}

/// `12.5%`
pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StockStatus {
    OutOfStock,
    Low,
    Medium,
    Good,
}

impl StockStatus {
    pub fn classify(total: u32, available: u32) -> Self {
        let total = total as f64;
        let available_f = available as f64;
        if available == 0 {
            Self::OutOfStock
        } else if available_f < total * LOW_STOCK_RATIO {
            Self::Low
        } else if available_f < total * MEDIUM_STOCK_RATIO {
            Self::Medium
        } else {
            Self::Good
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::OutOfStock => "OUT OF STOCK",
            Self::Low => "LOW STOCK",
            Self::Medium => "MEDIUM STOCK",
            Self::Good => "GOOD STOCK",
        }
    }
}

/// Demand rating from utilization, used for components and categories alike
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemandRating {
    High,
    Moderate,
    Low,
    Minimal,
}

impl DemandRating {
    pub fn classify(utilization: f64) -> Self {
        // Compare on the one-decimal value that is displayed
        let shown = (utilization * 10.0).round() / 10.0;
        if shown > 70.0 {
            Self::High
        } else if shown > 40.0 {
            Self::Moderate
        } else if shown > 10.0 {
            Self::Low
        } else {
            Self::Minimal
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::High => "High Demand",
            Self::Moderate => "Moderate Demand",
            Self::Low => "Low Demand",
            Self::Minimal => "Minimal Use",
        }
    }
}

/// Units to keep on the shelf before reordering: `ceil(total * 0.2)`
pub fn reorder_level(total: u32) -> u32 {
    total.div_ceil(5)
}

/// Whole days past due for an approved, unreturned request
pub fn days_overdue(request: &BorrowRequest, now: DateTime<Utc>) -> Option<i64> {
    if request.is_overdue(now) {
        Some(ceil_days(now, request.due_date))
    } else {
        None
    }
}

pub fn days_since_request(request: &BorrowRequest, now: DateTime<Utc>) -> i64 {
    ceil_days(now, request.request_date)
}

/// Days left until due; only meaningful while the item is out
pub fn days_until_due(request: &BorrowRequest, now: DateTime<Utc>) -> Option<i64> {
    (request.status == RequestStatus::Approved).then(|| ceil_days(request.due_date, now))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPriority {
    Overdue,
    Delayed,
    Medium,
    Normal,
}

impl RequestPriority {
    pub fn classify(request: &BorrowRequest, now: DateTime<Utc>) -> Self {
        if request.is_overdue(now) {
            Self::Overdue
        } else if request.status == RequestStatus::Pending {
            if days_since_request(request, now) > DELAYED_AFTER_DAYS {
                Self::Delayed
            } else {
                Self::Medium
            }
        } else {
            Self::Normal
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Overdue => "HIGH - OVERDUE",
            Self::Delayed => "HIGH - DELAYED",
            Self::Medium => "MEDIUM",
            Self::Normal => "NORMAL",
        }
    }
}

/// Days from filing to decision; still counting while pending
pub fn processing_days(request: &BorrowRequest, now: DateTime<Utc>) -> i64 {
    match request.approved_at {
        Some(at) => ceil_days(at, request.request_date),
        None if request.status == RequestStatus::Pending => days_since_request(request, now),
        None => 0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityTier {
    High,
    Medium,
    Low,
    Inactive,
}

impl ActivityTier {
    pub fn classify(login_count: u32) -> Self {
        match login_count {
            c if c > 10 => Self::High,
            c if c > 3 => Self::Medium,
            c if c > 0 => Self::Low,
            _ => Self::Inactive,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
            Self::Inactive => "Inactive",
        }
    }
}

/// Logins per day of account age, as a percentage with two decimals
pub fn engagement_score(login_count: u32, account_age_days: i64) -> String {
    if login_count == 0 || account_age_days <= 0 {
        return "0.00".to_string();
    }
    format!("{:.2}", login_count as f64 / account_age_days as f64 * 100.0)
}

/// Session length in whole minutes.
///
/// Closed sessions use the stored duration; open ones count up to `now`.
pub fn session_minutes(session: &LoginSession, now: DateTime<Utc>) -> i64 {
    let ms = match session.session_duration {
        Some(ms) if ms > 0 => ms,
        _ if session.is_active => (now - session.login_time).num_milliseconds(),
        _ => 0,
    };
    (ms as f64 / 60_000.0).round().max(0.0) as i64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionQuality {
    Excellent,
    Good,
    Average,
    Short,
    Brief,
}

impl SessionQuality {
    pub fn classify(minutes: i64) -> Self {
        match minutes {
            m if m > 120 => Self::Excellent,
            m if m > 60 => Self::Good,
            m if m > 30 => Self::Average,
            m if m > 5 => Self::Short,
            _ => Self::Brief,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Average => "Average",
            Self::Short => "Short",
            Self::Brief => "Brief",
        }
    }
}

/// Ten points per hour online, capped at 100
pub fn productivity_score(minutes: i64) -> String {
    if minutes <= 0 {
        return "0.0".to_string();
    }
    format!("{:.1}", (minutes as f64 / 60.0 * 10.0).min(100.0))
}
