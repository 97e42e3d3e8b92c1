//! Sheet layouts for the lab report.

use chrono::{DateTime, Timelike, Utc};

use super::derive::{
    ceil_days, days_overdue, days_since_request, days_until_due, engagement_score,
    format_percent, processing_days, productivity_score, reorder_level, session_minutes,
    utilization_percent, ActivityTier, DemandRating, RequestPriority, SessionQuality, StockStatus,
};
use super::{Cell, ReportContext, SheetSpec, Table};
use crate::stats::{StatusBreakdown, SystemStats};
use crate::store::{BorrowRequest, Component, LoginSession, RequestStatus, Snapshot, User};

fn date(dt: &DateTime<Utc>) -> Cell {
    Cell::Text(dt.format("%Y-%m-%d").to_string())
}

fn date_time(dt: &DateTime<Utc>) -> Cell {
    Cell::Text(dt.format("%Y-%m-%d %H:%M").to_string())
}

fn opt_date_time(dt: &Option<DateTime<Utc>>) -> Cell {
    dt.as_ref().map_or(Cell::Empty, date_time)
}

/// Aggregate stock figures for one component category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryStats {
    pub category: String,
    pub component_types: usize,
    pub total_units: u64,
    pub available_units: u64,
    pub request_count: usize,
}

impl CategoryStats {
    pub fn utilization(&self) -> f64 {
        utilization_percent(self.total_units, self.available_units)
    }
}

/// Per-category totals, in order of first appearance
pub fn category_stats(snapshot: &Snapshot) -> Vec<CategoryStats> {
    let mut stats: Vec<CategoryStats> = Vec::new();

    for component in &snapshot.components {
        let idx = match stats.iter().position(|s| s.category == component.category) {
            Some(idx) => idx,
            None => {
                stats.push(CategoryStats {
                    category: component.category.clone(),
                    component_types: 0,
                    total_units: 0,
                    available_units: 0,
                    request_count: 0,
                });
                stats.len() - 1
            }
        };
        let entry = &mut stats[idx];
        entry.component_types += 1;
        let available = component.available_quantity.min(component.total_quantity);
        entry.total_units = entry.total_units.saturating_add(component.total_quantity.into());
        entry.available_units = entry.available_units.saturating_add(available.into());
    }

    for request in &snapshot.requests {
        let category = snapshot
            .find_component_by_name(&request.component_name)
            .map(|c| c.category.as_str());
        if let Some(entry) = stats.iter_mut().find(|s| Some(s.category.as_str()) == category) {
            entry.request_count += 1;
        }
    }

    stats
}

/// One line of the request status breakdown
pub struct StatusRow {
    pub status: RequestStatus,
    pub count: usize,
    pub share: f64,
}

fn status_rows(breakdown: &StatusBreakdown) -> Vec<StatusRow> {
    RequestStatus::ALL
        .iter()
        .map(|&status| StatusRow {
            status,
            count: breakdown.count(status),
            share: breakdown.share(status),
        })
        .collect()
}

pub fn status_sheet() -> SheetSpec<StatusRow> {
    SheetSpec::<StatusRow>::new("Request Status")
        .column("Status", |r, _| Cell::text(r.status.as_str().to_uppercase()))
        .column("Count", |r, _| r.count.into())
        .column("Percentage", |r, _| Cell::text(format_percent(r.share)))
}

pub fn category_sheet() -> SheetSpec<CategoryStats> {
    SheetSpec::<CategoryStats>::new("Categories")
        .column("Category", |c, _| Cell::text(&c.category))
        .column("Component Types", |c, _| c.component_types.into())
        .column("Total Units", |c, _| c.total_units.into())
        .column("Available Units", |c, _| c.available_units.into())
        .column("Borrowed Units", |c, _| {
            c.total_units.saturating_sub(c.available_units).into()
        })
        .column("Utilization", |c, _| Cell::text(format_percent(c.utilization())))
        .column("Demand Rating", |c, _| {
            Cell::text(DemandRating::classify(c.utilization()).label())
        })
        .column("Requests", |c, _| c.request_count.into())
}

/// Summary sheet: headline stats, status breakdown and category breakdown
pub fn summary_table(title: &str, snapshot: &Snapshot, ctx: &ReportContext) -> Table {
    let stats = SystemStats::compute(snapshot, ctx.now);

    let mut table = Table::new("Summary", vec!["Metric".to_string(), "Value".to_string()]);
    let mut kv = |metric: &str, value: Cell| table.rows.push(vec![Cell::text(metric), value]);

    kv("Report", Cell::text(title));
    kv(
        "Generated At",
        Cell::Text(ctx.now.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
    );
    kv("Total Users", stats.total_users.into());
    kv("Active Users", stats.active_users.into());
    kv("Total Logins", Cell::Number(stats.total_logins as i64));
    kv("Online Users", stats.online_users.into());
    kv("Total Requests", stats.total_requests.into());
    kv("Pending Requests", stats.pending_requests.into());
    kv("Total Components", stats.total_components.into());
    kv("Overdue Items", stats.overdue_items.into());

    let breakdown = StatusBreakdown::compute(snapshot);
    table.append_section(
        "Request Status Breakdown",
        status_sheet().build(&status_rows(&breakdown), ctx),
    );
    table.append_section(
        "Category Breakdown",
        category_sheet().build(&category_stats(snapshot), ctx),
    );

    table
}

pub fn requests_sheet() -> SheetSpec<BorrowRequest> {
    SheetSpec::<BorrowRequest>::new("Requests")
        .column("Request ID", |r, _| Cell::text(&r.id))
        .column("Student Name", |r, _| Cell::text(&r.student_name))
        .column("Roll No", |r, _| Cell::text(&r.roll_no))
        .column("Mobile", |r, _| Cell::text(&r.mobile))
        .column("Component", |r, _| Cell::text(&r.component_name))
        .column("Category", |r, ctx| Cell::text(ctx.category_of(&r.component_name)))
        .column("Quantity", |r, _| r.quantity.into())
        .column("Status", |r, _| Cell::text(r.status.as_str().to_uppercase()))
        .column("Request Date", |r, _| date_time(&r.request_date))
        .column("Due Date", |r, _| date(&r.due_date))
        .column("Approved By", |r, _| Cell::opt_text(r.approved_by.as_deref()))
        .column("Approved At", |r, _| opt_date_time(&r.approved_at))
        .column("Returned At", |r, _| opt_date_time(&r.returned_at))
        .column("Days Overdue", |r, ctx| days_overdue(r, ctx.now).into())
        .column("Days Since Request", |r, ctx| days_since_request(r, ctx.now).into())
        .column("Days Until Due", |r, ctx| match days_until_due(r, ctx.now) {
            Some(days) => Cell::Number(days),
            None => Cell::text("N/A"),
        })
        .column("Priority", |r, ctx| {
            Cell::text(RequestPriority::classify(r, ctx.now).label())
        })
        .column("Processing Days", |r, ctx| processing_days(r, ctx.now).into())
        .column("Notes", |r, _| Cell::opt_text(r.notes.as_deref()))
}

pub fn components_sheet() -> SheetSpec<Component> {
    SheetSpec::<Component>::new("Components")
        .column("Component ID", |c, _| Cell::text(&c.id))
        .column("Name", |c, _| Cell::text(&c.name))
        .column("Category", |c, _| Cell::text(&c.category))
        .column("Total Quantity", |c, _| c.total_quantity.into())
        .column("Available", |c, _| c.available_quantity.into())
        .column("Borrowed", |c, _| c.borrowed().into())
        .column("Utilization", |c, _| {
            Cell::text(format_percent(utilization_percent(
                c.total_quantity.into(),
                c.available_quantity.into(),
            )))
        })
        .column("Stock Status", |c, _| {
            Cell::text(StockStatus::classify(c.total_quantity, c.available_quantity).label())
        })
        .column("Reorder Level", |c, _| reorder_level(c.total_quantity).into())
        .column("Needs Reorder", |c, _| {
            let needed = c.available_quantity <= reorder_level(c.total_quantity);
            Cell::text(if needed { "YES" } else { "NO" })
        })
        .column("Demand Rating", |c, _| {
            let utilization =
                utilization_percent(c.total_quantity.into(), c.available_quantity.into());
            Cell::text(DemandRating::classify(utilization).label())
        })
        .column("Description", |c, _| Cell::opt_text(c.description.as_deref()))
}

pub fn users_sheet() -> SheetSpec<User> {
    SheetSpec::<User>::new("Users")
        .column("User ID", |u, _| Cell::text(&u.id))
        .column("Name", |u, _| Cell::text(&u.name))
        .column("Email", |u, _| Cell::text(&u.email))
        .column("Role", |u, _| Cell::text(u.role.as_str().to_uppercase()))
        .column("Registered", |u, _| date(&u.registered_at))
        .column("Last Login", |u, _| match &u.last_login_at {
            Some(at) => date_time(at),
            None => Cell::text("Never"),
        })
        .column("Login Count", |u, _| u.login_count.into())
        .column("Status", |u, _| {
            Cell::text(if u.is_active { "Online" } else { "Offline" })
        })
        .column("Account Age (days)", |u, ctx| {
            ceil_days(ctx.now, u.registered_at).max(0).into()
        })
        .column("Days Since Last Login", |u, ctx| match u.last_login_at {
            Some(at) => Cell::Number(ceil_days(ctx.now, at).max(0)),
            None => Cell::text("Never logged in"),
        })
        .column("Activity Level", |u, _| {
            Cell::text(ActivityTier::classify(u.login_count).label())
        })
        .column("Engagement Score", |u, ctx| {
            let age = ceil_days(ctx.now, u.registered_at);
            Cell::text(engagement_score(u.login_count, age))
        })
        .column("Total Requests", |u, ctx| ctx.request_count(&u.id).into())
}

pub fn sessions_sheet() -> SheetSpec<LoginSession> {
    SheetSpec::<LoginSession>::new("Login Sessions")
        .column("Session ID", |s, _| Cell::text(&s.id))
        .column("User Name", |s, _| Cell::text(&s.user_name))
        .column("Email", |s, _| Cell::text(&s.user_email))
        .column("Role", |s, _| Cell::text(s.user_role.as_str().to_uppercase()))
        .column("Login Time", |s, _| date_time(&s.login_time))
        .column("Logout Time", |s, _| opt_date_time(&s.logout_time))
        .column("Duration (min)", |s, ctx| session_minutes(s, ctx.now).into())
        .column("Session Quality", |s, ctx| {
            Cell::text(SessionQuality::classify(session_minutes(s, ctx.now)).label())
        })
        .column("Device", |s, _| {
            Cell::text(s.device_info.as_deref().unwrap_or("Unknown Device"))
        })
        .column("Status", |s, _| Cell::text(if s.is_active { "Active" } else { "Ended" }))
        .column("Weekday", |s, _| Cell::text(s.login_time.format("%A").to_string()))
        .column("Login Hour", |s, _| Cell::text(format!("{}:00", s.login_time.hour())))
        .column("Productivity Score", |s, ctx| {
            Cell::text(productivity_score(session_minutes(s, ctx.now)))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{default_snapshot, UserRole};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap()
    }

    fn column(spec_headers: &[String], header: &str) -> usize {
        spec_headers
            .iter()
            .position(|h| h == header)
            .unwrap_or_else(|| panic!("no column {}", header))
    }

    fn overdue_request() -> BorrowRequest {
        BorrowRequest {
            id: "req-1".to_string(),
            student_id: "user-ada".to_string(),
            student_name: "Ada".to_string(),
            roll_no: "R1".to_string(),
            mobile: "9876543210".to_string(),
            component_name: "ESP32 Development Board".to_string(),
            quantity: 2,
            request_date: now() - Duration::days(8),
            due_date: now() - Duration::days(1),
            status: RequestStatus::Approved,
            approved_by: Some("Administrator".to_string()),
            approved_at: Some(now() - Duration::days(7)),
            returned_at: None,
            notes: None,
        }
    }

    #[test]
    fn test_component_rows() {
        let mut snapshot = default_snapshot("admin@issacasimov.in", now());
        snapshot.components[1].available_quantity = 0;
        let ctx = ReportContext::new(&snapshot, now());
        let spec = components_sheet();
        let headers = spec.headers();
        let table = spec.build(&snapshot.components, &ctx);

        // Arduino Uno R3: 25 of 25 on the shelf
        let arduino = &table.rows[0];
        assert_eq!(arduino[column(&headers, "Borrowed")], Cell::Number(0));
        assert_eq!(arduino[column(&headers, "Utilization")], Cell::text("0.0%"));
        assert_eq!(arduino[column(&headers, "Stock Status")], Cell::text("GOOD STOCK"));
        assert_eq!(arduino[column(&headers, "Reorder Level")], Cell::Number(5));

        // L298N Motor Driver: all 15 out
        let driver = &table.rows[1];
        assert_eq!(driver[column(&headers, "Stock Status")], Cell::text("OUT OF STOCK"));
        assert_eq!(driver[column(&headers, "Utilization")], Cell::text("100.0%"));
        assert_eq!(driver[column(&headers, "Needs Reorder")], Cell::text("YES"));
        assert_eq!(driver[column(&headers, "Demand Rating")], Cell::text("High Demand"));
    }

    #[test]
    fn test_request_rows() {
        let mut snapshot = default_snapshot("admin@issacasimov.in", now());
        let mut pending = overdue_request();
        pending.id = "req-2".to_string();
        pending.status = RequestStatus::Pending;
        pending.approved_by = None;
        pending.approved_at = None;
        pending.component_name = "Retired Part".to_string();
        snapshot.requests = vec![overdue_request(), pending];

        let ctx = ReportContext::new(&snapshot, now());
        let spec = requests_sheet();
        let headers = spec.headers();
        let table = spec.build(&snapshot.requests, &ctx);

        let overdue = &table.rows[0];
        assert_eq!(overdue[column(&headers, "Days Overdue")], Cell::Number(1));
        assert_eq!(overdue[column(&headers, "Priority")], Cell::text("HIGH - OVERDUE"));
        assert_eq!(overdue[column(&headers, "Category")], Cell::text("Microcontroller"));
        assert_eq!(overdue[column(&headers, "Processing Days")], Cell::Number(1));
        assert_eq!(overdue[column(&headers, "Due Date")], Cell::text("2024-06-09"));

        let pending = &table.rows[1];
        assert_eq!(pending[column(&headers, "Days Overdue")], Cell::Empty);
        assert_eq!(pending[column(&headers, "Days Until Due")], Cell::text("N/A"));
        assert_eq!(pending[column(&headers, "Priority")], Cell::text("HIGH - DELAYED"));
        assert_eq!(pending[column(&headers, "Category")], Cell::text("Unknown"));
        assert_eq!(pending[column(&headers, "Status")], Cell::text("PENDING"));
    }

    #[test]
    fn test_user_rows() {
        let mut snapshot = default_snapshot("admin@issacasimov.in", now() - Duration::days(10));
        snapshot.users.push(User {
            id: "user-ada".to_string(),
            name: "Ada".to_string(),
            email: "ada@issacasimov.in".to_string(),
            role: UserRole::Student,
            registered_at: now() - Duration::days(4),
            last_login_at: Some(now() - Duration::hours(30)),
            login_count: 12,
            is_active: true,
        });
        snapshot.requests = vec![overdue_request()];

        let ctx = ReportContext::new(&snapshot, now());
        let spec = users_sheet();
        let headers = spec.headers();
        let table = spec.build(&snapshot.users, &ctx);

        let admin = &table.rows[0];
        assert_eq!(admin[column(&headers, "Account Age (days)")], Cell::Number(10));
        assert_eq!(
            admin[column(&headers, "Days Since Last Login")],
            Cell::text("Never logged in")
        );
        assert_eq!(admin[column(&headers, "Activity Level")], Cell::text("Inactive"));
        assert_eq!(admin[column(&headers, "Engagement Score")], Cell::text("0.00"));

        let ada = &table.rows[1];
        assert_eq!(ada[column(&headers, "Days Since Last Login")], Cell::Number(2));
        assert_eq!(ada[column(&headers, "Activity Level")], Cell::text("High"));
        assert_eq!(ada[column(&headers, "Engagement Score")], Cell::text("300.00"));
        assert_eq!(ada[column(&headers, "Total Requests")], Cell::Number(1));
    }

    #[test]
    fn test_session_rows() {
        let mut snapshot = Snapshot::default();
        // Monday
        let login = Utc.with_ymd_and_hms(2024, 6, 10, 9, 15, 0).unwrap();
        let mut session = LoginSession {
            id: "session-1".to_string(),
            user_id: "user-ada".to_string(),
            user_email: "ada@issacasimov.in".to_string(),
            user_name: "Ada".to_string(),
            user_role: UserRole::Student,
            login_time: login,
            logout_time: None,
            session_duration: None,
            ip_address: None,
            user_agent: None,
            device_info: Some("Desktop".to_string()),
            is_active: true,
        };
        session.close(login + Duration::minutes(90));
        snapshot.login_sessions = vec![session];

        let ctx = ReportContext::new(&snapshot, now());
        let spec = sessions_sheet();
        let headers = spec.headers();
        let row = &spec.build(&snapshot.login_sessions, &ctx).rows[0];

        assert_eq!(row[column(&headers, "Duration (min)")], Cell::Number(90));
        assert_eq!(row[column(&headers, "Session Quality")], Cell::text("Good"));
        assert_eq!(row[column(&headers, "Status")], Cell::text("Ended"));
        assert_eq!(row[column(&headers, "Weekday")], Cell::text("Monday"));
        assert_eq!(row[column(&headers, "Login Hour")], Cell::text("9:00"));
        assert_eq!(row[column(&headers, "Productivity Score")], Cell::text("15.0"));
    }

    #[test]
    fn test_session_without_device() {
        let mut snapshot = Snapshot::default();
        let login = Utc.with_ymd_and_hms(2024, 6, 8, 18, 5, 0).unwrap();
        snapshot.login_sessions = vec![LoginSession {
            id: "session-2".to_string(),
            user_id: "user-ada".to_string(),
            user_email: "ada@issacasimov.in".to_string(),
            user_name: "Ada".to_string(),
            user_role: UserRole::Student,
            login_time: login,
            logout_time: None,
            session_duration: None,
            ip_address: None,
            user_agent: None,
            device_info: None,
            is_active: false,
        }];

        let ctx = ReportContext::new(&snapshot, now());
        let spec = sessions_sheet();
        let headers = spec.headers();
        let row = &spec.build(&snapshot.login_sessions, &ctx).rows[0];

        assert_eq!(row[column(&headers, "Device")], Cell::text("Unknown Device"));
        assert_eq!(row[column(&headers, "Weekday")], Cell::text("Saturday"));
        assert_eq!(row[column(&headers, "Login Hour")], Cell::text("18:00"));
    }

    #[test]
    fn test_category_stats_large_quantities() {
        let mut snapshot = Snapshot::default();
        for (id, available) in [("cmp-1", 3_000_000_000u32), ("cmp-2", 1_500_000_000)] {
            snapshot.components.push(Component {
                id: id.to_string(),
                name: format!("Resistor pack {}", id),
                category: "Passive".to_string(),
                total_quantity: 3_000_000_000,
                available_quantity: available,
                description: None,
            });
        }

        let stats = category_stats(&snapshot);
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].total_units, 6_000_000_000);
        assert_eq!(stats[0].available_units, 4_500_000_000);
        assert_eq!(format_percent(stats[0].utilization()), "25.0%");

        let ctx = ReportContext::new(&snapshot, now());
        let spec = category_sheet();
        let headers = spec.headers();
        let row = &spec.build(&stats, &ctx).rows[0];
        assert_eq!(row[column(&headers, "Total Units")], Cell::Number(6_000_000_000));
        assert_eq!(row[column(&headers, "Borrowed Units")], Cell::Number(1_500_000_000));
    }

    #[test]
    fn test_category_stats() {
        let mut snapshot = default_snapshot("admin@issacasimov.in", now());
        snapshot.requests = vec![overdue_request()];
        let stats = category_stats(&snapshot);

        let names: Vec<&str> = stats.iter().map(|s| s.category.as_str()).collect();
        assert_eq!(names, vec!["Microcontroller", "Motor Driver", "Sensor", "Actuator"]);

        let micro = &stats[0];
        assert_eq!(micro.component_types, 2);
        assert_eq!(micro.total_units, 37);
        assert_eq!(micro.request_count, 1);
        assert_eq!(micro.utilization(), 0.0);
    }

    #[test]
    fn test_summary_sections() {
        let mut snapshot = default_snapshot("admin@issacasimov.in", now());
        snapshot.requests = vec![overdue_request()];
        let ctx = ReportContext::new(&snapshot, now());
        let table = summary_table("Isaac Asimov Robotics Lab", &snapshot, &ctx);

        assert_eq!(table.rows[0], vec![Cell::text("Report"), Cell::text("Isaac Asimov Robotics Lab")]);
        assert!(table
            .rows
            .contains(&vec![Cell::text("Overdue Items"), Cell::Number(1)]));
        assert!(table.rows.contains(&vec![
            Cell::text("APPROVED"),
            Cell::Number(1),
            Cell::text("100.0%")
        ]));
        assert!(table.rows.contains(&vec![Cell::text("Category Breakdown")]));
    }
}
