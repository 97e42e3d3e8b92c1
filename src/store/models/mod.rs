//! Typed records held by the store, split by entity.

pub mod common;
pub mod component;
pub mod notification;
pub mod request;
pub mod user;

pub use common::*;
pub use component::*;
pub use notification::*;
pub use request::*;
pub use user::*;

use serde::{Deserialize, Serialize};

/// Everything the store persists, as one JSON document.
///
/// Collections missing from an older document read as empty
/// (`loginSessions` was added after the first release).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub components: Vec<Component>,
    #[serde(default)]
    pub requests: Vec<BorrowRequest>,
    #[serde(default)]
    pub notifications: Vec<Notification>,
    #[serde(default)]
    pub login_sessions: Vec<LoginSession>,
}

impl Snapshot {
    pub fn find_component_by_name(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.name == name)
    }

    pub fn find_user_by_email(&self, email: &str) -> Option<&User> {
        self.users.iter().find(|u| u.email == email)
    }
}
