//! Summary statistics over a snapshot.
//!
//! Everything here is a pure function of the snapshot and `now`.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::store::{LoginSession, RequestStatus, Snapshot};

/// Headline counts shown on the dashboard and the summary sheet
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStats {
    pub total_users: usize,
    pub active_users: usize,
    pub total_logins: u64,
    pub online_users: usize,
    pub total_requests: usize,
    pub pending_requests: usize,
    pub total_components: usize,
    pub overdue_items: usize,
}

impl SystemStats {
    pub fn compute(snapshot: &Snapshot, now: DateTime<Utc>) -> Self {
        Self {
            total_users: snapshot.users.len(),
            active_users: snapshot.users.iter().filter(|u| u.is_active).count(),
            total_logins: snapshot.users.iter().map(|u| u.login_count as u64).sum(),
            online_users: snapshot.login_sessions.iter().filter(|s| s.is_active).count(),
            total_requests: snapshot.requests.len(),
            pending_requests: snapshot
                .requests
                .iter()
                .filter(|r| r.status == RequestStatus::Pending)
                .count(),
            total_components: snapshot.components.len(),
            overdue_items: snapshot.requests.iter().filter(|r| r.is_overdue(now)).count(),
        }
    }
}

/// Request counts per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusBreakdown {
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub returned: usize,
}

impl StatusBreakdown {
    pub fn compute(snapshot: &Snapshot) -> Self {
        let mut breakdown = Self::default();
        for request in &snapshot.requests {
            match request.status {
                RequestStatus::Pending => breakdown.pending += 1,
                RequestStatus::Approved => breakdown.approved += 1,
                RequestStatus::Rejected => breakdown.rejected += 1,
                RequestStatus::Returned => breakdown.returned += 1,
            }
        }
        breakdown
    }

    pub fn total(&self) -> usize {
        self.pending + self.approved + self.rejected + self.returned
    }

    pub fn count(&self, status: RequestStatus) -> usize {
        match status {
            RequestStatus::Pending => self.pending,
            RequestStatus::Approved => self.approved,
            RequestStatus::Rejected => self.rejected,
            RequestStatus::Returned => self.returned,
        }
    }

    /// Percentage of all requests in `status`; 0 when there are none
    pub fn share(&self, status: RequestStatus) -> f64 {
        self.count(status) as f64 / self.total().max(1) as f64 * 100.0
    }
}

/// Time window for the login analytics view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionWindow {
    /// Since midnight (UTC)
    Today,
    /// Last 7 days
    Week,
    /// Last 30 days
    Month,
    #[default]
    All,
}

impl SessionWindow {
    fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Today => now
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .map(|midnight| midnight.and_utc()),
            Self::Week => Some(now - Duration::days(7)),
            Self::Month => Some(now - Duration::days(30)),
            Self::All => None,
        }
    }
}

impl std::fmt::Display for SessionWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Today => write!(f, "today"),
            Self::Week => write!(f, "week"),
            Self::Month => write!(f, "month"),
            Self::All => write!(f, "all"),
        }
    }
}

impl std::str::FromStr for SessionWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "today" => Ok(Self::Today),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "all" => Ok(Self::All),
            _ => Err(format!("Unknown session window: {} (expected today, week, month or all)", s)),
        }
    }
}

/// Sessions that started inside `window`, newest first
pub fn sessions_in_window(
    sessions: &[LoginSession],
    window: SessionWindow,
    now: DateTime<Utc>,
) -> Vec<&LoginSession> {
    let cutoff = window.cutoff(now);
    let mut selected: Vec<&LoginSession> = sessions
        .iter()
        .filter(|s| cutoff.map_or(true, |c| s.login_time >= c))
        .collect();
    selected.sort_by(|a, b| b.login_time.cmp(&a.login_time));
    selected
}

/// Session count per device label
pub fn device_breakdown<'a, I>(sessions: I) -> BTreeMap<String, usize>
where
    I: IntoIterator<Item = &'a LoginSession>,
{
    let mut counts = BTreeMap::new();
    for session in sessions {
        let device = session.device_info.as_deref().unwrap_or("Unknown");
        *counts.entry(device.to_string()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{default_snapshot, BorrowRequest, UserRole};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap()
    }

    fn request(id: &str, status: RequestStatus, due: DateTime<Utc>) -> BorrowRequest {
        BorrowRequest {
            id: id.to_string(),
            student_id: "user-1".to_string(),
            student_name: "Ada".to_string(),
            roll_no: "R1".to_string(),
            mobile: "9876543210".to_string(),
            component_name: "Arduino Uno R3".to_string(),
            quantity: 1,
            request_date: now() - Duration::days(10),
            due_date: due,
            status,
            approved_by: None,
            approved_at: None,
            returned_at: None,
            notes: None,
        }
    }

    fn session(id: &str, login: DateTime<Utc>, active: bool, device: Option<&str>) -> LoginSession {
        LoginSession {
            id: id.to_string(),
            user_id: "user-1".to_string(),
            user_email: "ada@issacasimov.in".to_string(),
            user_name: "Ada".to_string(),
            user_role: UserRole::Student,
            login_time: login,
            logout_time: None,
            session_duration: None,
            ip_address: None,
            user_agent: None,
            device_info: device.map(str::to_string),
            is_active: active,
        }
    }

    #[test]
    fn test_compute_counts() {
        let mut snapshot = default_snapshot("admin@issacasimov.in", now());
        snapshot.users[0].login_count = 4;
        snapshot.users[0].is_active = true;
        snapshot.requests = vec![
            request("r1", RequestStatus::Pending, now() + Duration::days(2)),
            request("r2", RequestStatus::Approved, now() - Duration::days(1)),
            request("r3", RequestStatus::Approved, now() + Duration::days(1)),
            // Returned late is no longer overdue
            request("r4", RequestStatus::Returned, now() - Duration::days(5)),
        ];
        snapshot.login_sessions = vec![
            session("s1", now(), true, None),
            session("s2", now() - Duration::hours(3), false, None),
        ];

        let stats = SystemStats::compute(&snapshot, now());
        assert_eq!(
            stats,
            SystemStats {
                total_users: 1,
                active_users: 1,
                total_logins: 4,
                online_users: 1,
                total_requests: 4,
                pending_requests: 1,
                total_components: 5,
                overdue_items: 1,
            }
        );
    }

    #[test]
    fn test_due_exactly_now_is_not_overdue() {
        let mut snapshot = Snapshot::default();
        snapshot.requests = vec![request("r1", RequestStatus::Approved, now())];
        assert_eq!(SystemStats::compute(&snapshot, now()).overdue_items, 0);
    }

    #[test]
    fn test_status_breakdown_shares() {
        let mut snapshot = Snapshot::default();
        assert_eq!(StatusBreakdown::compute(&snapshot).share(RequestStatus::Pending), 0.0);

        snapshot.requests = vec![
            request("r1", RequestStatus::Pending, now()),
            request("r2", RequestStatus::Approved, now()),
            request("r3", RequestStatus::Approved, now()),
            request("r4", RequestStatus::Rejected, now()),
        ];
        let breakdown = StatusBreakdown::compute(&snapshot);
        assert_eq!(breakdown.total(), 4);
        assert_eq!(breakdown.share(RequestStatus::Approved), 50.0);
        assert_eq!(breakdown.share(RequestStatus::Returned), 0.0);
    }

    #[test]
    fn test_sessions_in_window() {
        let sessions = vec![
            session("old", now() - Duration::days(20), false, None),
            session("yesterday", now() - Duration::days(1), false, None),
            session("morning", now() - Duration::hours(3), true, None),
            session("ancient", now() - Duration::days(90), false, None),
        ];

        let ids = |w| {
            sessions_in_window(&sessions, w, now())
                .into_iter()
                .map(|s| s.id.as_str())
                .collect::<Vec<_>>()
        };

        assert_eq!(ids(SessionWindow::Today), vec!["morning"]);
        assert_eq!(ids(SessionWindow::Week), vec!["morning", "yesterday"]);
        assert_eq!(ids(SessionWindow::Month), vec!["morning", "yesterday", "old"]);
        assert_eq!(ids(SessionWindow::All).len(), 4);
    }

    #[test]
    fn test_device_breakdown() {
        let sessions = vec![
            session("a", now(), false, Some("Desktop")),
            session("b", now(), false, Some("Mobile Device")),
            session("c", now(), false, Some("Desktop")),
            session("d", now(), false, None),
        ];
        let counts = device_breakdown(&sessions);
        assert_eq!(counts.get("Desktop"), Some(&2));
        assert_eq!(counts.get("Mobile Device"), Some(&1));
        assert_eq!(counts.get("Unknown"), Some(&1));
    }

    #[test]
    fn test_session_window_from_str() {
        assert_eq!("Week".parse::<SessionWindow>(), Ok(SessionWindow::Week));
        assert!("year".parse::<SessionWindow>().is_err());
    }
}
