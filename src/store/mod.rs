//! The data store: sole owner of the lab snapshot.
//!
//! Every mutation goes through [`Store`], which keeps the stock invariant
//! (`0 <= available <= total`) and the request lifecycle intact and then
//! writes the whole snapshot back to its [`SnapshotSlot`]. Persistence
//! failures are logged, never surfaced: a broken slot degrades to the
//! seeded dataset on read and to an in-memory-only session on write.

mod models;
mod seeders;
mod slot;

pub use models::*;
pub use seeders::{default_snapshot, ADMIN_USER_ID};
pub use slot::{FileSlot, MemorySlot, SnapshotSlot};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Errors returned by store mutations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Snapshot storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot encoding error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("{kind} already exists: {id}")]
    Duplicate { kind: &'static str, id: String },

    #[error("Component {name} would have {available} available out of {total}")]
    InvalidStock {
        name: String,
        available: u32,
        total: u32,
    },

    #[error("Not enough {component} in stock: requested {requested}, available {available}")]
    InsufficientStock {
        component: String,
        requested: u32,
        available: u32,
    },

    #[error("Request {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: RequestStatus,
        to: RequestStatus,
    },

    #[error("No component named {0}")]
    UnknownComponent(String),
}

impl StoreError {
    fn not_found(kind: &'static str, id: &str) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

pub struct Store {
    slot: Box<dyn SnapshotSlot>,
    data: Snapshot,
    admin_email: String,
}

impl Store {
    /// Load the snapshot from `slot`.
    ///
    /// An empty slot, unreadable slot or corrupt document all yield the
    /// seeded dataset. Nothing is written until the first mutation or an
    /// explicit [`Store::save`].
    pub fn open(slot: Box<dyn SnapshotSlot>, admin_email: &str) -> Self {
        let data = load_snapshot(slot.as_ref(), admin_email);
        Self {
            slot,
            data,
            admin_email: admin_email.to_string(),
        }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.data
    }

    /// Serialize and write the snapshot
    pub fn save(&self) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(&self.data)?;
        self.slot.write(&json)?;
        Ok(())
    }

    /// Replace everything with the seeded dataset and write it out
    pub fn reset(&mut self, now: DateTime<Utc>) -> Result<(), StoreError> {
        warn!(slot = %self.slot.describe(), "Resetting store to seeded defaults");
        self.data = default_snapshot(&self.admin_email, now);
        self.save()
    }

    fn persist(&self) {
        if let Err(e) = self.save() {
            error!(error = %e, slot = %self.slot.describe(), "Failed to save snapshot");
        }
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    /// Register a user. Login statistics always start from zero.
    pub fn add_user(&mut self, mut user: User) -> Result<User, StoreError> {
        if self.data.users.iter().any(|u| u.id == user.id || u.email == user.email) {
            return Err(StoreError::Duplicate {
                kind: "User",
                id: user.email,
            });
        }
        user.login_count = 0;
        user.is_active = false;
        info!(user_id = %user.id, email = %user.email, role = %user.role, "User registered");
        self.data.users.push(user.clone());
        self.persist();
        Ok(user)
    }

    pub fn update_user(&mut self, user: User) -> Result<(), StoreError> {
        let slot = self
            .data
            .users
            .iter_mut()
            .find(|u| u.id == user.id)
            .ok_or_else(|| StoreError::not_found("User", &user.id))?;
        *slot = user;
        self.persist();
        Ok(())
    }

    pub fn find_user_by_email(&self, email: &str) -> Option<&User> {
        self.data.find_user_by_email(email)
    }

    pub fn find_user(&self, id: &str) -> Option<&User> {
        self.data.users.iter().find(|u| u.id == id)
    }

    pub fn active_users(&self) -> Vec<&User> {
        self.data.users.iter().filter(|u| u.is_active).collect()
    }

    // ------------------------------------------------------------------
    // Components
    // ------------------------------------------------------------------

    pub fn components(&self) -> &[Component] {
        &self.data.components
    }

    pub fn find_component_by_name(&self, name: &str) -> Option<&Component> {
        self.data.find_component_by_name(name)
    }

    pub fn add_component(&mut self, component: Component) -> Result<Component, StoreError> {
        check_stock(&component)?;
        if self
            .data
            .components
            .iter()
            .any(|c| c.id == component.id || c.name == component.name)
        {
            return Err(StoreError::Duplicate {
                kind: "Component",
                id: component.name,
            });
        }
        info!(
            component = %component.name,
            category = %component.category,
            total = component.total_quantity,
            "Component added"
        );
        self.data.components.push(component.clone());
        self.persist();
        Ok(component)
    }

    pub fn update_component(&mut self, component: Component) -> Result<(), StoreError> {
        check_stock(&component)?;
        let slot = self
            .data
            .components
            .iter_mut()
            .find(|c| c.id == component.id)
            .ok_or_else(|| StoreError::not_found("Component", &component.id))?;
        *slot = component;
        self.persist();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Requests
    // ------------------------------------------------------------------

    pub fn requests(&self) -> &[BorrowRequest] {
        &self.data.requests
    }

    pub fn user_requests(&self, student_id: &str) -> Vec<&BorrowRequest> {
        self.data
            .requests
            .iter()
            .filter(|r| r.student_id == student_id)
            .collect()
    }

    /// File a new request. It always enters the workflow as pending and
    /// every administrator is notified.
    pub fn add_request(&mut self, mut request: BorrowRequest) -> Result<BorrowRequest, StoreError> {
        if self.find_component_by_name(&request.component_name).is_none() {
            return Err(StoreError::UnknownComponent(request.component_name));
        }
        request.status = RequestStatus::Pending;
        request.approved_by = None;
        request.approved_at = None;
        request.returned_at = None;

        let message = format!(
            "{} requested {} x {}",
            request.student_name, request.quantity, request.component_name
        );
        let admins: Vec<String> = self
            .data
            .users
            .iter()
            .filter(|u| u.is_admin())
            .map(|u| u.id.clone())
            .collect();
        for admin_id in admins {
            self.data.notifications.push(Notification::new(
                admin_id,
                NotificationKind::Info,
                "New Request",
                message.clone(),
                request.request_date,
            ));
        }

        info!(
            request_id = %request.id,
            student = %request.student_name,
            component = %request.component_name,
            quantity = request.quantity,
            "Borrow request filed"
        );
        self.data.requests.push(request.clone());
        self.persist();
        Ok(request)
    }

    /// Overwrite a request record. Status changes must go through the
    /// transition methods so stock stays consistent.
    pub fn update_request(&mut self, request: BorrowRequest) -> Result<(), StoreError> {
        let slot = self
            .data
            .requests
            .iter_mut()
            .find(|r| r.id == request.id)
            .ok_or_else(|| StoreError::not_found("Request", &request.id))?;
        if slot.status != request.status {
            return Err(StoreError::InvalidTransition {
                id: request.id,
                from: slot.status,
                to: request.status,
            });
        }
        *slot = request;
        self.persist();
        Ok(())
    }

    /// pending -> approved. Takes the units out of available stock.
    pub fn approve_request(
        &mut self,
        id: &str,
        approver: &str,
        at: DateTime<Utc>,
    ) -> Result<BorrowRequest, StoreError> {
        let req_idx = self.request_index(id, RequestStatus::Approved)?;
        let (component_name, quantity) = {
            let req = &self.data.requests[req_idx];
            (req.component_name.clone(), req.quantity)
        };

        let comp_idx = self
            .data
            .components
            .iter()
            .position(|c| c.name == component_name)
            .ok_or_else(|| StoreError::UnknownComponent(component_name.clone()))?;

        let component = &mut self.data.components[comp_idx];
        if component.available_quantity < quantity {
            return Err(StoreError::InsufficientStock {
                component: component_name,
                requested: quantity,
                available: component.available_quantity,
            });
        }
        component.available_quantity -= quantity;

        let req = &mut self.data.requests[req_idx];
        req.status = RequestStatus::Approved;
        req.approved_by = Some(approver.to_string());
        req.approved_at = Some(at);
        let req = req.clone();

        self.data.notifications.push(Notification::new(
            req.student_id.clone(),
            NotificationKind::Success,
            "Request Approved",
            format!(
                "Your request for {} x {} was approved. Please return it by {}.",
                req.quantity,
                req.component_name,
                req.due_date.format("%Y-%m-%d")
            ),
            at,
        ));

        info!(request_id = %id, approver = %approver, component = %req.component_name, "Request approved");
        self.persist();
        Ok(req)
    }

    /// pending -> rejected. Stock is untouched.
    pub fn reject_request(
        &mut self,
        id: &str,
        approver: &str,
        at: DateTime<Utc>,
    ) -> Result<BorrowRequest, StoreError> {
        let req_idx = self.request_index(id, RequestStatus::Rejected)?;

        let req = &mut self.data.requests[req_idx];
        req.status = RequestStatus::Rejected;
        req.approved_by = Some(approver.to_string());
        req.approved_at = Some(at);
        let req = req.clone();

        self.data.notifications.push(Notification::new(
            req.student_id.clone(),
            NotificationKind::Error,
            "Request Rejected",
            format!(
                "Your request for {} x {} was rejected.",
                req.quantity, req.component_name
            ),
            at,
        ));

        info!(request_id = %id, approver = %approver, "Request rejected");
        self.persist();
        Ok(req)
    }

    /// approved -> returned. Units go back to available stock, capped at
    /// the component total.
    pub fn return_request(
        &mut self,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<BorrowRequest, StoreError> {
        let req_idx = self.request_index(id, RequestStatus::Returned)?;
        let (component_name, quantity) = {
            let req = &self.data.requests[req_idx];
            (req.component_name.clone(), req.quantity)
        };

        match self
            .data
            .components
            .iter_mut()
            .find(|c| c.name == component_name)
        {
            Some(component) => {
                component.available_quantity = component
                    .available_quantity
                    .saturating_add(quantity)
                    .min(component.total_quantity);
            }
            None => {
                warn!(
                    request_id = %id,
                    component = %component_name,
                    "Returned component no longer in inventory; stock not restored"
                );
            }
        }

        let req = &mut self.data.requests[req_idx];
        req.status = RequestStatus::Returned;
        req.returned_at = Some(at);
        let req = req.clone();

        self.data.notifications.push(Notification::new(
            req.student_id.clone(),
            NotificationKind::Info,
            "Return Recorded",
            format!("Thanks for returning {} x {}.", req.quantity, req.component_name),
            at,
        ));

        info!(request_id = %id, component = %component_name, "Request returned");
        self.persist();
        Ok(req)
    }

    fn request_index(&self, id: &str, to: RequestStatus) -> Result<usize, StoreError> {
        let idx = self
            .data
            .requests
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| StoreError::not_found("Request", id))?;
        let from = self.data.requests[idx].status;
        if !from.can_transition_to(to) {
            return Err(StoreError::InvalidTransition {
                id: id.to_string(),
                from,
                to,
            });
        }
        Ok(idx)
    }

    // ------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------

    pub fn add_notification(&mut self, notification: Notification) {
        self.data.notifications.push(notification);
        self.persist();
    }

    pub fn user_notifications(&self, user_id: &str) -> Vec<&Notification> {
        self.data
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .collect()
    }

    pub fn unread_count(&self, user_id: &str) -> usize {
        self.data
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id && !n.read)
            .count()
    }

    pub fn mark_notification_read(&mut self, id: &str) -> Result<(), StoreError> {
        let notification = self
            .data
            .notifications
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| StoreError::not_found("Notification", id))?;
        if !notification.read {
            notification.read = true;
            self.persist();
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Login sessions
    // ------------------------------------------------------------------

    pub fn login_sessions(&self) -> &[LoginSession] {
        &self.data.login_sessions
    }

    pub fn create_login_session(
        &mut self,
        user: &User,
        user_agent: Option<&str>,
        device_info: &str,
        at: DateTime<Utc>,
    ) -> LoginSession {
        let session = LoginSession {
            id: new_id("session"),
            user_id: user.id.clone(),
            user_email: user.email.clone(),
            user_name: user.name.clone(),
            user_role: user.role,
            login_time: at,
            logout_time: None,
            session_duration: None,
            ip_address: None,
            user_agent: user_agent.map(str::to_string),
            device_info: Some(device_info.to_string()),
            is_active: true,
        };
        debug!(session_id = %session.id, user_id = %user.id, device = %device_info, "Login session opened");
        self.data.login_sessions.push(session.clone());
        self.persist();
        session
    }

    /// Close every open session of `user_id` and mark the user inactive.
    /// Returns the number of sessions closed.
    pub fn end_login_sessions(&mut self, user_id: &str, at: DateTime<Utc>) -> usize {
        let closed = self
            .data
            .login_sessions
            .iter_mut()
            .filter(|s| s.user_id == user_id)
            .map(|s| s.close(at))
            .filter(|closed| *closed)
            .count();

        if let Some(user) = self.data.users.iter_mut().find(|u| u.id == user_id) {
            user.is_active = false;
        }

        debug!(user_id = %user_id, closed, "Login sessions closed");
        self.persist();
        closed
    }
}

fn check_stock(component: &Component) -> Result<(), StoreError> {
    if component.is_consistent() {
        Ok(())
    } else {
        Err(StoreError::InvalidStock {
            name: component.name.clone(),
            available: component.available_quantity,
            total: component.total_quantity,
        })
    }
}

fn load_snapshot(slot: &dyn SnapshotSlot, admin_email: &str) -> Snapshot {
    let raw = match slot.read() {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            info!(slot = %slot.describe(), "No saved data found, using defaults");
            return default_snapshot(admin_email, Utc::now());
        }
        Err(e) => {
            error!(error = %e, slot = %slot.describe(), "Failed to read snapshot, using defaults");
            return default_snapshot(admin_email, Utc::now());
        }
    };

    match serde_json::from_str::<Snapshot>(&raw) {
        Ok(snapshot) => {
            debug!(
                users = snapshot.users.len(),
                components = snapshot.components.len(),
                requests = snapshot.requests.len(),
                sessions = snapshot.login_sessions.len(),
                "Snapshot loaded"
            );
            snapshot
        }
        Err(e) => {
            error!(error = %e, slot = %slot.describe(), "Failed to parse snapshot, using defaults");
            match slot.preserve_unreadable() {
                Ok(Some(backup)) => warn!(backup = %backup, "Unreadable snapshot copied aside"),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Failed to copy unreadable snapshot aside"),
            }
            default_snapshot(admin_email, Utc::now())
        }
    }
}
