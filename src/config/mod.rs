use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// JSON file holding the lab snapshot
    #[serde(default = "default_data_file")]
    pub data_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_file: default_data_file(),
        }
    }
}

fn default_data_file() -> PathBuf {
    PathBuf::from("./data/labtrack.json")
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Email domain whose addresses may self-register as students
    #[serde(default = "default_domain")]
    pub domain: String,
    #[serde(default = "default_admin_email")]
    pub admin_email: String,
    #[serde(default = "default_admin_password")]
    pub admin_password: String,
    /// Password shared by every student account
    #[serde(default = "default_student_password")]
    pub student_password: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            domain: default_domain(),
            admin_email: default_admin_email(),
            admin_password: default_admin_password(),
            student_password: default_student_password(),
        }
    }
}

fn default_domain() -> String {
    "issacasimov.in".to_string()
}

fn default_admin_email() -> String {
    "admin@issacasimov.in".to_string()
}

fn default_admin_password() -> String {
    "ralab".to_string()
}

fn default_student_password() -> String {
    "issacasimov".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    /// Prefix of exported file names (`<org_name>-Report-<date>.<ext>`)
    #[serde(default = "default_org_name")]
    pub org_name: String,
    /// Title printed at the top of the summary sheet
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Default export format (xlsx or csv)
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_preview_requests")]
    pub preview_requests: usize,
    #[serde(default = "default_preview_users")]
    pub preview_users: usize,
    #[serde(default = "default_preview_components")]
    pub preview_components: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            org_name: default_org_name(),
            title: default_title(),
            output_dir: default_output_dir(),
            format: default_format(),
            preview_requests: default_preview_requests(),
            preview_users: default_preview_users(),
            preview_components: default_preview_components(),
        }
    }
}

fn default_org_name() -> String {
    "Isaac-Asimov-Lab".to_string()
}

fn default_title() -> String {
    "Isaac Asimov Robotics Lab".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./reports")
}

fn default_format() -> String {
    "xlsx".to_string()
}

fn default_preview_requests() -> usize {
    15
}

fn default_preview_users() -> usize {
    10
}

fn default_preview_components() -> usize {
    15
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| "Failed to parse configuration file")?;
            Ok(config)
        } else {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }

    pub fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            auth: AuthConfig::default(),
            report: ReportConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Problems that make the configuration unusable
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.auth.domain.is_empty() || self.auth.domain.contains('@') {
            problems.push(format!("auth.domain is not a bare domain: {:?}", self.auth.domain));
        }
        if !self.auth.admin_email.contains('@') {
            problems.push(format!("auth.admin_email is not an email: {}", self.auth.admin_email));
        }
        if self.auth.admin_password.is_empty() || self.auth.student_password.is_empty() {
            problems.push("auth passwords must not be empty".to_string());
        }
        if self.report.org_name.trim().is_empty() {
            problems.push("report.org_name must not be empty".to_string());
        }
        if self.report.format.parse::<crate::report::ExportFormat>().is_err() {
            problems.push(format!(
                "report.format must be xlsx or csv, got {}",
                self.report.format
            ));
        }
        if self.report.preview_requests == 0
            || self.report.preview_users == 0
            || self.report.preview_components == 0
        {
            problems.push("report preview limits must be at least 1".to_string());
        }

        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("labtrack.toml")).unwrap();
        assert_eq!(config.report.org_name, "Isaac-Asimov-Lab");
        assert_eq!(config.report.preview_requests, 15);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labtrack.toml");
        std::fs::write(
            &path,
            r#"
[storage]
data_file = "/var/lib/labtrack/lab.json"

[report]
org_name = "Robotics-Club"
format = "csv"
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.storage.data_file, PathBuf::from("/var/lib/labtrack/lab.json"));
        assert_eq!(config.report.org_name, "Robotics-Club");
        assert_eq!(config.report.preview_users, 10);
        assert_eq!(config.auth.domain, "issacasimov.in");
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_validate_flags_bad_values() {
        let mut config = Config::default();
        config.auth.domain = "@lab".to_string();
        config.report.format = "pdf".to_string();
        config.report.preview_users = 0;

        let problems = config.validate();
        assert_eq!(problems.len(), 3);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labtrack.toml");
        std::fs::write(&path, "[report\norg_name = 1").unwrap();
        assert!(Config::load(&path).is_err());
    }
}
