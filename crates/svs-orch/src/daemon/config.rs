//! YAML configuration for svsorch.
//!
//! ```yaml
//! interfaces:
//!   - { id: 1, name: Ethernet0, ipv4_table: 10 }
//!   - { id: 2, name: Ethernet4, admin_up: false }
//! tables:
//!   - af: ipv4
//!     id: 7
//!     routes:
//!       - { prefix: 10.0.0.0/8, table: 100 }
//! bindings:
//!   - { af: ipv4, table: 7, interface: Ethernet0 }
//! ```
//!
//! Sections are applied in order: interfaces, tables with their routes, then
//! bindings. Bindings may name an interface or give its numeric id.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use svs_types::{AddressFamily, InterfaceId, IpPrefix, TableId};
use tracing::{debug, info};

use crate::intfs::{IntfsEntry, IntfsOrch, IntfsOrchError};
use crate::svs::{SvsOrch, SvsOrchError};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("route {prefix} does not belong to {af} table {table}")]
    RouteFamilyMismatch {
        af: AddressFamily,
        table: TableId,
        prefix: IpPrefix,
    },
    #[error("unknown interface: {0}")]
    UnknownInterface(String),
    #[error("invalid query {0:?}, expected <interface>:<address>")]
    InvalidQuery(String),
    #[error(transparent)]
    Intfs(#[from] IntfsOrchError),
    #[error(transparent)]
    Svs(#[from] SvsOrchError),
}

fn default_admin_up() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InterfaceConfig {
    pub id: InterfaceId,
    pub name: String,
    #[serde(default = "default_admin_up")]
    pub admin_up: bool,
    #[serde(default)]
    pub ipv4_table: TableId,
    #[serde(default)]
    pub ipv6_table: TableId,
}

impl From<&InterfaceConfig> for IntfsEntry {
    fn from(config: &InterfaceConfig) -> Self {
        IntfsEntry::new(config.id, config.name.clone())
            .with_admin_up(config.admin_up)
            .with_table(AddressFamily::Ipv4, config.ipv4_table)
            .with_table(AddressFamily::Ipv6, config.ipv6_table)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteConfig {
    pub prefix: IpPrefix,
    /// Table the destination lookup uses when the source matches.
    pub table: TableId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableConfig {
    pub af: AddressFamily,
    pub id: TableId,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

/// Interface reference in a binding: a numeric id or an interface name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InterfaceRef {
    Id(InterfaceId),
    Name(String),
}

impl InterfaceRef {
    /// Resolves the reference; names are looked up first, then parsed as an
    /// id (`if3` or `3`).
    pub fn resolve(&self, intfs: &IntfsOrch) -> Result<InterfaceId, ConfigError> {
        match self {
            InterfaceRef::Id(id) => Ok(*id),
            InterfaceRef::Name(name) => intfs
                .find_by_name(name)
                .or_else(|| name.parse().ok())
                .ok_or_else(|| ConfigError::UnknownInterface(name.clone())),
        }
    }
}

impl fmt::Display for InterfaceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterfaceRef::Id(id) => write!(f, "{}", id),
            InterfaceRef::Name(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BindingConfig {
    pub af: AddressFamily,
    pub table: TableId,
    pub interface: InterfaceRef,
}

/// Counts of objects created by [`SvsConfig::apply`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ApplySummary {
    pub interfaces: usize,
    pub tables: usize,
    pub routes: usize,
    pub bindings: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SvsConfig {
    #[serde(default)]
    pub interfaces: Vec<InterfaceConfig>,
    #[serde(default)]
    pub tables: Vec<TableConfig>,
    #[serde(default)]
    pub bindings: Vec<BindingConfig>,
}

impl SvsConfig {
    /// Reads and validates a YAML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&text)?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: SvsConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks what can be checked without touching any orch.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for table in &self.tables {
            if let Some(route) = table.routes.iter().find(|r| r.prefix.family() != table.af) {
                return Err(ConfigError::RouteFamilyMismatch {
                    af: table.af,
                    table: table.id,
                    prefix: route.prefix,
                });
            }
        }
        Ok(())
    }

    /// Applies the configuration; stops at the first refused operation.
    pub fn apply(&self, intfs: &IntfsOrch, svs: &mut SvsOrch) -> Result<ApplySummary, ConfigError> {
        let mut summary = ApplySummary::default();

        for interface in &self.interfaces {
            intfs.add_interface(interface.into())?;
            summary.interfaces += 1;
        }

        for table in &self.tables {
            svs.table_add(table.af, table.id)?;
            summary.tables += 1;
            for route in &table.routes {
                svs.route_add(table.id, route.prefix, route.table)?;
                summary.routes += 1;
            }
        }

        for binding in &self.bindings {
            let interface = binding.interface.resolve(intfs)?;
            svs.enable(binding.af, binding.table, interface)?;
            summary.bindings += 1;
        }

        info!(
            interfaces = summary.interfaces,
            tables = summary.tables,
            routes = summary.routes,
            bindings = summary.bindings,
            "Configuration applied"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::svs::{SvsOrchConfig, TableSelection};
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use std::sync::Arc;

    const SAMPLE: &str = r#"
interfaces:
  - { id: 1, name: Ethernet0, ipv4_table: 10 }
  - { id: 2, name: Ethernet4, admin_up: false }
tables:
  - af: ipv4
    id: 7
    routes:
      - { prefix: 10.0.0.0/8, table: 100 }
      - { prefix: 10.1.0.0/16, table: 200 }
  - af: ipv6
    id: 9
bindings:
  - { af: ipv4, table: 7, interface: Ethernet0 }
"#;

    fn orchs() -> (Arc<IntfsOrch>, SvsOrch) {
        let intfs = Arc::new(IntfsOrch::new(Default::default()));
        let svs = SvsOrch::new(SvsOrchConfig::new(16), intfs.clone());
        (intfs, svs)
    }

    #[test]
    fn test_parse_sample() {
        let config = SvsConfig::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.interfaces.len(), 2);
        assert!(config.interfaces[0].admin_up);
        assert!(!config.interfaces[1].admin_up);
        assert_eq!(config.interfaces[0].ipv6_table, 0);
        assert_eq!(config.tables[0].routes[1].table, 200);
        assert!(config.tables[1].routes.is_empty());
        assert_eq!(
            config.bindings[0].interface,
            InterfaceRef::Name("Ethernet0".to_string())
        );
    }

    #[test]
    fn test_empty_document() {
        assert_eq!(SvsConfig::from_yaml("{}").unwrap(), SvsConfig::default());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = SvsConfig::from_yaml("tables:\n  - { af: ipv4, id: 1, colour: red }\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_route_family_mismatch() {
        let err = SvsConfig::from_yaml(
            "tables:\n  - af: ipv6\n    id: 1\n    routes:\n      - { prefix: 10.0.0.0/8, table: 2 }\n",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::RouteFamilyMismatch { table: 1, .. }
        ));
    }

    #[test]
    fn test_apply() {
        let (intfs, mut svs) = orchs();
        let config = SvsConfig::from_yaml(SAMPLE).unwrap();
        let summary = config.apply(&intfs, &mut svs).unwrap();

        assert_eq!(
            summary,
            ApplySummary {
                interfaces: 2,
                tables: 2,
                routes: 2,
                bindings: 1
            }
        );
        let if1 = InterfaceId::new(1);
        assert_eq!(
            svs.lookup(if1, AddressFamily::Ipv4, &"10.1.2.3".parse().unwrap()),
            TableSelection::Table(200)
        );
        assert_eq!(
            svs.resolve(if1, AddressFamily::Ipv4, &"192.168.1.1".parse().unwrap()),
            Some(10)
        );
    }

    #[test]
    fn test_binding_by_id() {
        let (intfs, mut svs) = orchs();
        let config = SvsConfig::from_yaml(
            r#"
interfaces: [{ id: 3, name: Ethernet8 }]
tables: [{ af: ipv6, id: 5 }]
bindings:
  - { af: ipv6, table: 5, interface: 3 }
"#,
        )
        .unwrap();
        config.apply(&intfs, &mut svs).unwrap();
        assert_eq!(svs.binding(AddressFamily::Ipv6, InterfaceId::new(3)), Some(5));
    }

    #[test]
    fn test_apply_refused_binding() {
        let (intfs, mut svs) = orchs();
        let config = SvsConfig::from_yaml(
            "interfaces: [{ id: 2, name: Ethernet4, admin_up: false }]\n\
             tables: [{ af: ipv4, id: 7 }]\n\
             bindings: [{ af: ipv4, table: 7, interface: Ethernet4 }]\n",
        )
        .unwrap();
        let err = config.apply(&intfs, &mut svs).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Svs(SvsOrchError::InvalidInterface(_))
        ));
    }

    #[test]
    fn test_unknown_interface_name() {
        let intfs = IntfsOrch::new(Default::default());
        let err = InterfaceRef::Name("Ethernet99".to_string())
            .resolve(&intfs)
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownInterface(name) if name == "Ethernet99"));
        assert_eq!(
            InterfaceRef::Name("if7".to_string()).resolve(&intfs).unwrap(),
            InterfaceId::new(7)
        );
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = SvsConfig::load(file.path()).unwrap();
        assert_eq!(config.tables.len(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = SvsConfig::load(dir.path().join("missing.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("missing.yaml"));
    }
}
