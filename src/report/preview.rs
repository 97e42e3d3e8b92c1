//! Export preview: the report tables, cut down to a few rows each.

use chrono::{DateTime, Utc};

use super::sheets::{category_sheet, category_stats, components_sheet, requests_sheet, users_sheet};
use super::{ReportContext, Table};
use crate::stats::{StatusBreakdown, SystemStats};
use crate::store::{BorrowRequest, Snapshot, User};

/// Row-limited tables for review before an export.
///
/// Rows come from the same sheet specs as [`super::ReportGenerator::generate`],
/// so a record renders identically in both.
#[derive(Debug, Clone)]
pub struct ExportPreview {
    pub generated_at: DateTime<Utc>,
    pub stats: SystemStats,
    pub status: StatusBreakdown,
    pub components: Table,
    pub recent_requests: Table,
    pub categories: Table,
    pub top_users: Table,
}

impl ExportPreview {
    pub fn build(
        snapshot: &Snapshot,
        now: DateTime<Utc>,
        request_limit: usize,
        user_limit: usize,
        component_limit: usize,
    ) -> Self {
        let ctx = ReportContext::new(snapshot, now);

        let mut recent: Vec<&BorrowRequest> = snapshot.requests.iter().collect();
        recent.sort_by(|a, b| b.request_date.cmp(&a.request_date));
        recent.truncate(request_limit);

        let mut top: Vec<&User> = snapshot.users.iter().filter(|u| u.login_count > 0).collect();
        top.sort_by(|a, b| b.login_count.cmp(&a.login_count));
        top.truncate(user_limit);

        Self {
            generated_at: now,
            stats: SystemStats::compute(snapshot, now),
            status: StatusBreakdown::compute(snapshot),
            components: components_sheet()
                .build(snapshot.components.iter().take(component_limit), &ctx),
            recent_requests: requests_sheet().build(recent, &ctx),
            categories: category_sheet().build(&category_stats(snapshot), &ctx),
            top_users: users_sheet().build(top, &ctx),
        }
    }
}
