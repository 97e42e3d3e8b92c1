//! Login boundary: credential check, student self-registration and
//! login-session bookkeeping.

use chrono::{DateTime, Utc};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::AuthConfig;
use crate::store::{new_id, Store, StoreError, User, UserRole};

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("No account for {0}")]
    UnknownUser(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Coarse device class derived from a user agent string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Mobile,
    Tablet,
    Desktop,
}

impl DeviceKind {
    pub fn from_user_agent(user_agent: Option<&str>) -> Self {
        match user_agent {
            Some(ua) if ua.contains("Mobile") => Self::Mobile,
            Some(ua) if ua.contains("Tablet") => Self::Tablet,
            _ => Self::Desktop,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Mobile => "Mobile Device",
            Self::Tablet => "Tablet",
            Self::Desktop => "Desktop",
        }
    }
}

/// Shared-password authenticator for the lab's email domain.
///
/// The administrator has its own password; every address on the lab
/// domain shares the student password and is registered on first login.
pub struct Authenticator {
    domain: String,
    admin_email: String,
    admin_password: String,
    student_password: String,
}

impl Authenticator {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            domain: config.domain.to_lowercase(),
            admin_email: normalize_email(&config.admin_email),
            admin_password: config.admin_password.clone(),
            student_password: config.student_password.clone(),
        }
    }

    pub fn is_lab_email(&self, email: &str) -> bool {
        normalize_email(email).ends_with(&format!("@{}", self.domain))
    }

    /// Verify the password for `email` in constant time
    pub fn verify_credentials(&self, email: &str, password: &str) -> bool {
        let expected = if normalize_email(email) == self.admin_email {
            &self.admin_password
        } else {
            &self.student_password
        };
        bool::from(password.as_bytes().ct_eq(expected.as_bytes()))
    }

    /// Log a user in: verify credentials, register unknown students on the
    /// lab domain, bump login statistics and open a login session.
    pub fn authenticate(
        &self,
        store: &mut Store,
        email: &str,
        password: &str,
        user_agent: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<User, AuthError> {
        let email = normalize_email(email);

        if !self.verify_credentials(&email, password) {
            warn!(email = %email, "Login rejected: bad credentials");
            return Err(AuthError::InvalidCredentials);
        }

        let mut user = match store.find_user_by_email(&email) {
            Some(user) => user.clone(),
            None if self.is_lab_email(&email) && email != self.admin_email => {
                store.add_user(User {
                    id: new_id("user"),
                    name: display_name_from_email(&email),
                    email: email.clone(),
                    role: UserRole::Student,
                    registered_at: now,
                    last_login_at: None,
                    login_count: 0,
                    is_active: false,
                })?
            }
            None => return Err(AuthError::UnknownUser(email)),
        };

        user.last_login_at = Some(now);
        user.login_count += 1;
        user.is_active = true;
        store.update_user(user.clone())?;

        let device = DeviceKind::from_user_agent(user_agent);
        store.create_login_session(&user, user_agent, device.label(), now);

        info!(
            user_id = %user.id,
            email = %user.email,
            logins = user.login_count,
            device = device.label(),
            "User logged in"
        );
        Ok(user)
    }

    /// Log a user out, closing their open sessions
    pub fn logout(&self, store: &mut Store, email: &str, now: DateTime<Utc>) -> Result<usize, AuthError> {
        let email = normalize_email(email);
        let user_id = store
            .find_user_by_email(&email)
            .map(|u| u.id.clone())
            .ok_or_else(|| AuthError::UnknownUser(email.clone()))?;

        let closed = store.end_login_sessions(&user_id, now);
        info!(user_id = %user_id, sessions_closed = closed, "User logged out");
        Ok(closed)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// `john.doe@lab.in` -> `John Doe`
pub fn display_name_from_email(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default().replace('.', " ");

    let mut name = String::with_capacity(local.len());
    let mut at_word_start = true;
    for ch in local.chars() {
        if at_word_start && ch.is_alphanumeric() {
            name.extend(ch.to_uppercase());
        } else {
            name.push(ch);
        }
        at_word_start = !(ch.is_alphanumeric() || ch == '_');
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySlot;
    use chrono::{Duration, TimeZone};

    fn config() -> AuthConfig {
        AuthConfig {
            domain: "issacasimov.in".to_string(),
            admin_email: "admin@issacasimov.in".to_string(),
            admin_password: "ralab".to_string(),
            student_password: "issacasimov".to_string(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 2, 9, 30, 0).unwrap()
    }

    fn store() -> Store {
        Store::open(Box::new(MemorySlot::new()), "admin@issacasimov.in")
    }

    #[test]
    fn test_display_name_from_email() {
        assert_eq!(display_name_from_email("john.doe@issacasimov.in"), "John Doe");
        assert_eq!(display_name_from_email("mary-ann.k@issacasimov.in"), "Mary-Ann K");
        assert_eq!(display_name_from_email("r2d2@issacasimov.in"), "R2d2");
    }

    #[test]
    fn test_device_kind_from_user_agent() {
        let iphone = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0) Mobile/15E148";
        assert_eq!(DeviceKind::from_user_agent(Some(iphone)), DeviceKind::Mobile);
        assert_eq!(DeviceKind::from_user_agent(Some("Tablet; Android")), DeviceKind::Tablet);
        assert_eq!(DeviceKind::from_user_agent(None), DeviceKind::Desktop);
    }

    #[test]
    fn test_verify_credentials() {
        let auth = Authenticator::new(&config());
        assert!(auth.verify_credentials("ADMIN@issacasimov.in", "ralab"));
        assert!(!auth.verify_credentials("admin@issacasimov.in", "issacasimov"));
        assert!(auth.verify_credentials("ada@issacasimov.in", "issacasimov"));
        assert!(!auth.verify_credentials("ada@issacasimov.in", "ralab"));
    }

    #[test]
    fn test_first_login_registers_student() {
        let auth = Authenticator::new(&config());
        let mut store = store();

        let user = auth
            .authenticate(&mut store, "grace.hopper@issacasimov.in", "issacasimov", None, now())
            .unwrap();

        assert_eq!(user.name, "Grace Hopper");
        assert_eq!(user.role, UserRole::Student);
        assert_eq!(user.login_count, 1);
        assert!(user.is_active);
        assert_eq!(store.login_sessions().len(), 1);
        assert_eq!(store.login_sessions()[0].device_info.as_deref(), Some("Desktop"));
    }

    #[test]
    fn test_repeat_login_counts_and_logout_closes() {
        let auth = Authenticator::new(&config());
        let mut store = store();

        auth.authenticate(&mut store, "admin@issacasimov.in", "ralab", None, now())
            .unwrap();
        let admin = auth
            .authenticate(&mut store, "admin@issacasimov.in", "ralab", None, now() + Duration::hours(1))
            .unwrap();
        assert_eq!(admin.login_count, 2);

        let closed = auth
            .logout(&mut store, "admin@issacasimov.in", now() + Duration::hours(2))
            .unwrap();
        assert_eq!(closed, 2);
        assert!(!store.find_user_by_email("admin@issacasimov.in").unwrap().is_active);
    }

    #[test]
    fn test_wrong_password_does_not_register() {
        let auth = Authenticator::new(&config());
        let mut store = store();

        let err = auth
            .authenticate(&mut store, "eve@issacasimov.in", "guess", None, now())
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert_eq!(store.snapshot().users.len(), 1);
        assert!(store.login_sessions().is_empty());
    }

    #[test]
    fn test_outside_domain_is_unknown() {
        let auth = Authenticator::new(&config());
        let mut store = store();

        let err = auth
            .authenticate(&mut store, "someone@gmail.com", "issacasimov", None, now())
            .unwrap_err();
        assert!(matches!(err, AuthError::UnknownUser(_)));
    }
}
