//! svsorch daemon: wires IntfsOrch and SvsOrch together, applies the
//! configuration file, and answers introspection queries.

mod config;

pub use config::{
    ApplySummary, BindingConfig, ConfigError, InterfaceConfig, InterfaceRef, RouteConfig,
    SvsConfig, TableConfig,
};

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use svs_types::{AddressFamily, InterfaceId, IpAddress, TableId};
use tracing::info;

use crate::audit::{AuditCategory, AuditOutcome, AuditRecord};
use crate::audit_log;
use crate::intfs::{IntfsEntry, IntfsOrch, IntfsOrchConfig};
use crate::svs::{SvsDetails, SvsLookup, SvsOrch, SvsOrchConfig, SvsRoute, SvsTableInfo, TableSelection};

/// Configuration for the daemon itself.
#[derive(Debug, Clone, Default)]
pub struct SvsDaemonConfig {
    pub svs: SvsOrchConfig,
    pub intfs: IntfsOrchConfig,
}

/// One table in the JSON dump, with its routes.
#[derive(Debug, Clone, Serialize)]
pub struct TableDump {
    #[serde(flatten)]
    pub info: SvsTableInfo,
    pub routes: Vec<SvsRoute>,
}

/// Full state as printed by `svsorch --dump`.
#[derive(Debug, Clone, Serialize)]
pub struct DumpReport {
    pub version: (u32, u32),
    pub interfaces: Vec<IntfsEntry>,
    pub tables: Vec<TableDump>,
    pub bindings: Vec<SvsDetails>,
}

/// Result of a `--resolve` query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub interface: InterfaceId,
    pub source: IpAddress,
    pub selection: TableSelection,
    /// Table the destination lookup runs in.
    pub table_id: TableId,
}

/// The svsorch daemon.
#[derive(Debug)]
pub struct SvsDaemon {
    intfs: Arc<IntfsOrch>,
    svs: SvsOrch,
}

impl SvsDaemon {
    pub fn new(config: SvsDaemonConfig) -> Self {
        let intfs = Arc::new(IntfsOrch::new(config.intfs));
        let svs = SvsOrch::new(config.svs, intfs.clone());
        Self { intfs, svs }
    }

    pub fn intfs(&self) -> &IntfsOrch {
        &self.intfs
    }

    pub fn svs(&self) -> &SvsOrch {
        &self.svs
    }

    pub fn svs_mut(&mut self) -> &mut SvsOrch {
        &mut self.svs
    }

    /// Hands out a lookup handle for a packet worker.
    pub fn lookup_handle(&self) -> SvsLookup {
        self.svs.lookup_handle()
    }

    pub fn apply_config(&mut self, config: &SvsConfig) -> Result<ApplySummary, ConfigError> {
        let result = config.apply(&self.intfs, &mut self.svs);
        let record = AuditRecord::new(AuditCategory::ConfigurationChange, "SvsDaemon", "apply_config");
        match &result {
            Ok(summary) => audit_log!(record
                .with_outcome(AuditOutcome::Success)
                .with_details(serde_json::json!(summary))),
            Err(e) => audit_log!(record.with_error(e.to_string())),
        }
        result
    }

    /// Removes an interface, disabling its bindings in both families first.
    ///
    /// `interface` is a name or an id. Returns the removed entry and the
    /// number of bindings torn down.
    pub fn remove_interface(&mut self, interface: &str) -> Result<(IntfsEntry, usize), ConfigError> {
        let interface = InterfaceRef::Name(interface.to_string()).resolve(&self.intfs)?;
        let mut disabled = 0;
        for af in AddressFamily::ALL {
            if self.svs.binding(af, interface).is_some() {
                self.svs.disable(af, interface)?;
                disabled += 1;
            }
        }
        let entry = self.intfs.remove_interface(interface)?;
        info!(interface = %interface, disabled, "Removed interface {}", entry.name);
        Ok((entry, disabled))
    }

    pub fn dump(&self) -> DumpReport {
        let tables = self
            .svs
            .registry()
            .tables()
            .map(|table| TableDump {
                info: table.info(),
                routes: table.routes().collect(),
            })
            .collect();
        DumpReport {
            version: self.svs.version(),
            interfaces: self.intfs.interfaces(),
            tables,
            bindings: self.svs.dump(),
        }
    }

    /// Answers `<interface>:<address>`, where the interface is a name or id.
    ///
    /// The address family comes from the address.
    pub fn resolve(&self, query: &str) -> Result<Resolution, ConfigError> {
        let (interface, address) = query
            .split_once(':')
            .ok_or_else(|| ConfigError::InvalidQuery(query.to_string()))?;
        let interface = InterfaceRef::Name(interface.to_string()).resolve(&self.intfs)?;
        let source: IpAddress = address
            .parse()
            .map_err(|_| ConfigError::InvalidQuery(query.to_string()))?;
        let af: AddressFamily = source.family();

        let table_id = self
            .svs
            .resolve(interface, af, &source)
            .ok_or_else(|| ConfigError::UnknownInterface(interface.to_string()))?;
        Ok(Resolution {
            interface,
            source,
            selection: self.svs.lookup(interface, af, &source),
            table_id,
        })
    }

    /// Runs until `shutdown` completes.
    pub async fn run<F>(self, shutdown: F) -> Self
    where
        F: Future<Output = ()>,
    {
        info!(
            tables = self.svs.table_count(),
            bindings = self.svs.dump().len(),
            "svsorch running"
        );
        audit_log!(
            AuditRecord::new(AuditCategory::SystemLifecycle, "SvsDaemon", "start")
                .with_outcome(AuditOutcome::Success)
        );

        shutdown.await;

        info!("svsorch shutting down");
        audit_log!(
            AuditRecord::new(AuditCategory::SystemLifecycle, "SvsDaemon", "stop")
                .with_outcome(AuditOutcome::Success)
        );
        self
    }
}
