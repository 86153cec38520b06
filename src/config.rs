// BigQuery MCP Gateway - Configuration
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Warehouse identity and server profile. Built once at startup from CLI
// flags, validated, then passed by reference to every component.

use crate::credentials;
use crate::error::ConfigError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::OnceLock;

pub const DEFAULT_LOCATION: &str = "us-central1";

/// Byte-billing cap applied when the caller does not pass one (1 GB).
pub const DEFAULT_MAXIMUM_BYTES_BILLED: &str = "1000000000";

/// URI scheme for dataset schema resources
pub const RESOURCE_SCHEME: &str = "bigquery";

fn project_id_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9-]+$").expect("valid regex"))
}

fn location_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z]+-[a-z]+\d+$").expect("valid regex"))
}

/// Which flavor of the server to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Dataset hints, bare-table qualification, sample queries, prompts
    Extended,
    /// Schema browsing and plain queries only
    Minimal,
}

impl Profile {
    pub fn is_extended(self) -> bool {
        self == Profile::Extended
    }
}

/// Project and location every request runs against. Immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WarehouseIdentity {
    project_id: String,
    location: String,
}

impl WarehouseIdentity {
    pub fn new(project_id: impl Into<String>, location: impl Into<String>) -> Result<Self, ConfigError> {
        let project_id = project_id.into();
        let location = location.into();

        if !project_id_pattern().is_match(&project_id) {
            return Err(ConfigError::InvalidProjectId(project_id));
        }
        if !location_pattern().is_match(&location) {
            return Err(ConfigError::InvalidLocation(location));
        }

        Ok(Self { project_id, location })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// `project.dataset.table`
    pub fn full_table_id(&self, dataset_id: &str, table_id: &str) -> String {
        format!("{}.{}.{}", self.project_id, dataset_id, table_id)
    }

    /// `bigquery://project/dataset/schema`
    pub fn schema_uri(&self, dataset_id: &str) -> String {
        format!("{}://{}/{}/schema", RESOURCE_SCHEME, self.project_id, dataset_id)
    }
}

/// Full server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub identity: WarehouseIdentity,
    pub key_file: Option<PathBuf>,
    pub profile: Profile,
}

impl ServerConfig {
    /// Validate startup inputs. The key file, if given, must be a readable
    /// service-account JSON that names a project.
    pub fn new(
        project_id: &str,
        location: &str,
        key_file: Option<PathBuf>,
        profile: Profile,
    ) -> Result<Self, ConfigError> {
        if let Some(path) = &key_file {
            credentials::validate_key_file(path)?;
        }
        let identity = WarehouseIdentity::new(project_id, location)?;
        Ok(Self { identity, key_file, profile })
    }

    /// The dataset hint this profile honors. Minimal does not advertise
    /// `datasetId`, so it never qualifies bare tables.
    pub fn dataset_hint<'a>(&self, requested: Option<&'a str>) -> Option<&'a str> {
        requested.filter(|_| self.profile.is_extended())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn accepts_typical_identity() {
        let id = WarehouseIdentity::new("my-project-123", DEFAULT_LOCATION).unwrap();
        assert_eq!(id.project_id(), "my-project-123");
        assert_eq!(id.location(), "us-central1");
        assert_eq!(id.full_table_id("sales", "orders"), "my-project-123.sales.orders");
        assert_eq!(id.schema_uri("sales"), "bigquery://my-project-123/sales/schema");
    }

    #[test]
    fn rejects_bad_project_ids() {
        for bad in ["", "My-Project", "proj_1", "proj.x", "proj id"] {
            assert!(
                matches!(WarehouseIdentity::new(bad, DEFAULT_LOCATION), Err(ConfigError::InvalidProjectId(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn rejects_bad_locations() {
        for bad in ["US", "us", "us-central", "europe_west1", "asia-northeast1a"] {
            assert!(
                matches!(WarehouseIdentity::new("proj", bad), Err(ConfigError::InvalidLocation(_))),
                "{:?} should be rejected",
                bad
            );
        }
        assert!(WarehouseIdentity::new("proj", "asia-northeast1").is_ok());
        assert!(WarehouseIdentity::new("proj", "europe-west2").is_ok());
    }

    #[test]
    fn server_config_checks_key_file() {
        let missing = ServerConfig::new(
            "proj",
            DEFAULT_LOCATION,
            Some(PathBuf::from("/nonexistent/key.json")),
            Profile::Extended,
        );
        assert!(matches!(missing, Err(ConfigError::KeyFileNotAccessible { .. })));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"type":"service_account","project_id":"proj"}}"#).unwrap();
        let config = ServerConfig::new("proj", DEFAULT_LOCATION, Some(file.path().to_path_buf()), Profile::Minimal)
            .unwrap();
        assert_eq!(config.profile, Profile::Minimal);
        assert!(!config.profile.is_extended());
    }

    #[test]
    fn dataset_hint_only_in_extended_profile() {
        let extended = ServerConfig::new("proj", DEFAULT_LOCATION, None, Profile::Extended).unwrap();
        assert_eq!(extended.dataset_hint(Some("sales")), Some("sales"));
        assert_eq!(extended.dataset_hint(None), None);

        let minimal = ServerConfig::new("proj", DEFAULT_LOCATION, None, Profile::Minimal).unwrap();
        assert_eq!(minimal.dataset_hint(Some("sales")), None);
    }
}
