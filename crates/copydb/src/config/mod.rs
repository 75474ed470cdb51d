//! Configuration loading and validation.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::copy::DEFAULT_BATCH_SIZE;
use crate::error::{CopyError, Result};
use crate::filter::ObjectFilter;
use crate::vendor::Vendor;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyConfig {
    /// Source database endpoint.
    pub source: EndpointConfig,

    /// Target database endpoint.
    pub target: EndpointConfig,

    /// Table filter. Enabled by default.
    #[serde(default)]
    pub tables: FilterConfig,

    /// Sequence filter. Disabled by default.
    #[serde(default)]
    pub sequences: FilterConfig,

    /// Rows per insert batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Empty target tables before copying.
    #[serde(default)]
    pub truncate: bool,

    /// Suspend foreign key enforcement around the copy.
    #[serde(default = "default_true")]
    pub disable_foreign_keys: bool,

    /// Suspend trigger execution around the copy.
    #[serde(default = "default_true")]
    pub disable_triggers: bool,

    /// Log SQL statements as they execute.
    #[serde(default = "default_true")]
    pub log_sql: bool,

    /// SQL run against the target before anything else.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_sql: Option<String>,

    /// SQL run against the target just before the copy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_copy_sql: Option<String>,

    /// SQL run against the target after the copy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_sql: Option<String>,
}

/// One database endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Engine family ("postgresql", "oracle", "h2", ...).
    pub vendor: String,

    /// Connection URL, in whatever form the driver adapter accepts.
    pub url: String,

    /// Username.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Refuse to write through this endpoint.
    #[serde(default)]
    pub readonly: bool,

    /// SQL run against this endpoint at connect time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_sql: Option<String>,
}

impl EndpointConfig {
    /// Resolve the configured vendor name.
    pub fn vendor(&self) -> Result<Vendor> {
        Vendor::from_name(&self.vendor)
    }
}

/// Filter section for one object category.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Whether this category participates at all. The default differs per
    /// category (tables on, sequences off), so absence is preserved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Names to include. Empty means "no explicit include list".
    #[serde(default)]
    pub include: Vec<String>,

    /// Names to exclude; `*` excludes everything.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Explicit copy order.
    #[serde(default)]
    pub order: Vec<String>,
}

impl FilterConfig {
    /// Build the immutable filter used for a run.
    #[must_use]
    pub fn build(&self, default_enabled: bool) -> ObjectFilter {
        ObjectFilter::new(
            self.enabled.unwrap_or(default_enabled),
            self.include.iter().cloned(),
            self.exclude.iter().cloned(),
            self.order.iter().cloned(),
        )
    }
}

impl CopyConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: CopyConfig = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate field values and cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(CopyError::Config(
                "batch_size must be a positive integer".to_string(),
            ));
        }
        self.source.vendor()?;
        self.target.vendor()?;
        if self.target.readonly {
            return Err(CopyError::Config(format!(
                "Target database is read only: {}",
                self.target.url
            )));
        }
        Ok(())
    }

    /// Filter for tables (enabled unless configured off).
    #[must_use]
    pub fn tables_filter(&self) -> ObjectFilter {
        self.tables.build(true)
    }

    /// Filter for sequences (disabled unless configured on).
    #[must_use]
    pub fn sequences_filter(&self) -> ObjectFilter {
        self.sequences.build(false)
    }
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
source:
  vendor: oracle
  url: "jdbc:oracle:thin:@db1:1521/app"
  readonly: true
target:
  vendor: postgresql
  url: "host=db2 dbname=app"
"#;

    #[test]
    fn test_defaults() {
        let config: CopyConfig = serde_yaml::from_str(MINIMAL).unwrap();
        config.validate().unwrap();
        assert_eq!(config.batch_size, 500);
        assert!(!config.truncate);
        assert!(config.disable_foreign_keys);
        assert!(config.disable_triggers);
        assert!(config.log_sql);
        assert!(config.tables_filter().is_enabled());
        assert!(!config.sequences_filter().is_enabled());
    }

    #[test]
    fn test_filters_parse() {
        let yaml = format!(
            "{MINIMAL}
tables:
  exclude: [audit_log]
  order: [users, orders]
sequences:
  enabled: true
  include: [user_seq]
"
        );
        let config: CopyConfig = serde_yaml::from_str(&yaml).unwrap();
        let tables = config.tables_filter();
        assert!(tables.is_enabled());
        assert!(!tables.contains("audit_log"));
        assert!(tables.contains("users"));
        let sequences = config.sequences_filter();
        assert!(sequences.is_enabled());
        assert!(sequences.contains("user_seq"));
        assert!(!sequences.contains("other_seq"));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let yaml = format!("{MINIMAL}\nbatch_size: 0\n");
        let config: CopyConfig = serde_yaml::from_str(&yaml).unwrap();
        assert!(matches!(config.validate(), Err(CopyError::Config(_))));
    }

    #[test]
    fn test_readonly_target_rejected() {
        let yaml = MINIMAL.replace("host=db2 dbname=app\"", "host=db2 dbname=app\"\n  readonly: true");
        let config: CopyConfig = serde_yaml::from_str(&yaml).unwrap();
        assert!(matches!(config.validate(), Err(CopyError::Config(_))));
    }

    #[test]
    fn test_unknown_vendor_rejected() {
        let yaml = MINIMAL.replace("oracle", "db2");
        let config: CopyConfig = serde_yaml::from_str(&yaml).unwrap();
        assert!(matches!(
            config.validate(),
            Err(CopyError::UnknownVendor(_))
        ));
    }
}
