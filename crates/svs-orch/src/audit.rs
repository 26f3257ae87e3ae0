//! Audit trail and logging setup.
//!
//! Every control-plane mutation of the SVS state (tables, routes, bindings,
//! interfaces) produces one [`AuditRecord`]. Records are emitted as tracing
//! events on the `audit` target with the full record serialized as JSON in
//! the `audit_json` field, so a subscriber can route them separately from
//! operational logs:
//!
//! ```text
//! RUST_LOG=info,audit=info   # operational info plus audit trail
//! RUST_LOG=warn,audit=warn   # only refused operations
//! ```
//!
//! Successful operations are logged at `info`, refused ones at `warn`, and
//! in-progress markers at `debug`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of state change being audited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditCategory {
    /// A table, route, binding, or interface was created.
    ResourceCreate,
    /// An existing object was replaced in place.
    ResourceModify,
    ResourceDelete,
    /// Configuration file loading and application.
    ConfigurationChange,
    /// Daemon start and stop.
    SystemLifecycle,
}

impl fmt::Display for AuditCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuditCategory::ResourceCreate => "RESOURCE_CREATE",
            AuditCategory::ResourceModify => "RESOURCE_MODIFY",
            AuditCategory::ResourceDelete => "RESOURCE_DELETE",
            AuditCategory::ConfigurationChange => "CONFIGURATION_CHANGE",
            AuditCategory::SystemLifecycle => "SYSTEM_LIFECYCLE",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failure,
    InProgress,
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuditOutcome::Success => "success",
            AuditOutcome::Failure => "failure",
            AuditOutcome::InProgress => "in_progress",
        };
        f.write_str(s)
    }
}

/// One audited control-plane action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub category: AuditCategory,
    /// Component that performed the action, e.g. `SvsOrch`.
    pub source: String,
    pub action: String,
    pub outcome: AuditOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    /// e.g. `svs_table`, `svs_route`, `svs_binding`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditRecord {
    /// Creates an in-progress record stamped with the current UTC time.
    pub fn new(
        category: AuditCategory,
        source: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            category,
            source: source.into(),
            action: action.into(),
            outcome: AuditOutcome::InProgress,
            object_id: None,
            object_type: None,
            details: None,
            error: None,
        }
    }

    pub fn with_outcome(mut self, outcome: AuditOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    pub fn with_object_id(mut self, id: impl Into<String>) -> Self {
        self.object_id = Some(id.into());
        self
    }

    pub fn with_object_type(mut self, object_type: impl Into<String>) -> Self {
        self.object_type = Some(object_type.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Records the failure reason; also sets the outcome to `Failure`.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self.outcome = AuditOutcome::Failure;
        self
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| format!(r#"{{"error":"serialization_failed","message":"{}"}}"#, e))
    }

    /// Emits the record on the `audit` target at the level its outcome maps to.
    pub fn emit(&self) {
        match self.outcome {
            AuditOutcome::Success => tracing::info!(
                target: "audit",
                category = %self.category,
                source = %self.source,
                action = %self.action,
                audit_json = %self.to_json(),
                "AUDIT: {} - {} - {}",
                self.category,
                self.action,
                self.outcome
            ),
            AuditOutcome::InProgress => tracing::debug!(
                target: "audit",
                category = %self.category,
                source = %self.source,
                action = %self.action,
                audit_json = %self.to_json(),
                "AUDIT: {} - {} - {}",
                self.category,
                self.action,
                self.outcome
            ),
            AuditOutcome::Failure => tracing::warn!(
                target: "audit",
                category = %self.category,
                source = %self.source,
                action = %self.action,
                error = self.error.as_deref().unwrap_or(""),
                audit_json = %self.to_json(),
                "AUDIT: {} - {} - {}",
                self.category,
                self.action,
                self.outcome
            ),
        }
    }
}

/// Emits an [`AuditRecord`] on the `audit` tracing target.
///
/// ```ignore
/// audit_log!(
///     AuditRecord::new(AuditCategory::ResourceCreate, "SvsOrch", "table_add")
///         .with_outcome(AuditOutcome::Success)
///         .with_object_id("ipv4/7")
/// );
/// ```
#[macro_export]
macro_rules! audit_log {
    ($record:expr) => {
        $crate::audit::AuditRecord::emit(&$record)
    };
}

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `log_level` when set. With `json` the
/// output is one JSON object per line, otherwise the compact human format.
pub fn init_logging(log_level: &str, json: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(fmt::layer().with_target(true).with_thread_ids(true).json())
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).compact())
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_audit_record_creation() {
        let record = AuditRecord::new(AuditCategory::ResourceCreate, "SvsOrch", "table_add")
            .with_outcome(AuditOutcome::Success)
            .with_object_id("ipv4/7")
            .with_object_type("svs_table");

        assert_eq!(record.category, AuditCategory::ResourceCreate);
        assert_eq!(record.source, "SvsOrch");
        assert_eq!(record.outcome, AuditOutcome::Success);
        assert_eq!(record.object_id.as_deref(), Some("ipv4/7"));
        assert_eq!(record.object_type.as_deref(), Some("svs_table"));
    }

    #[test]
    fn test_with_error_marks_failure() {
        let record = AuditRecord::new(AuditCategory::ResourceDelete, "SvsOrch", "table_delete")
            .with_error("SVS table ipv4/7 in use by 1 binding(s)");

        assert_eq!(record.outcome, AuditOutcome::Failure);
        assert!(record.error.is_some());
    }

    #[test]
    fn test_json_skips_empty_fields() {
        let record = AuditRecord::new(AuditCategory::ConfigurationChange, "svsorch", "load_config")
            .with_outcome(AuditOutcome::Success)
            .with_details(serde_json::json!({"tables": 2}));

        let value: serde_json::Value = serde_json::from_str(&record.to_json()).unwrap();
        assert_eq!(value["category"], "CONFIGURATION_CHANGE");
        assert_eq!(value["outcome"], "success");
        assert_eq!(value["details"]["tables"], 2);
        assert!(value.get("error").is_none());
        assert!(value.get("object_id").is_none());
    }

    #[test]
    fn test_display() {
        assert_eq!(AuditCategory::ResourceModify.to_string(), "RESOURCE_MODIFY");
        assert_eq!(AuditOutcome::InProgress.to_string(), "in_progress");
    }

    #[test]
    fn test_macro_accepts_builder_expression() {
        audit_log!(AuditRecord::new(AuditCategory::SystemLifecycle, "svsorch", "start")
            .with_outcome(AuditOutcome::Success));
    }
}
