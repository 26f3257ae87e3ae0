//! SvsOrch implementation.
//!
//! Owns the SVS tables and interface bindings and keeps the lock-free lookup
//! state in sync with them. All mutation goes through `&mut self`, so the
//! control plane is serialized by ownership rather than by locks.

use std::sync::Arc;

use svs_types::{AddressFamily, InterfaceId, IpAddress, IpPrefix, TableId};
use tracing::{debug, info, instrument, warn};

use super::bindings::{InterfaceBindingSet, Walk};
use super::lookup::{BindingSlots, SvsLookup};
use super::registry::{RegistryError, RouteUpdate, SvsTableRegistry};
use super::types::{
    SvsDetails, SvsRoute, SvsTableInfo, TableSelection, SVS_PLUGIN_VERSION_MAJOR,
    SVS_PLUGIN_VERSION_MINOR, SVS_STATUS_ALREADY_EXISTS, SVS_STATUS_INVALID_INTERFACE,
    SVS_STATUS_IN_USE, SVS_STATUS_NOT_FOUND,
};
use crate::audit::{AuditCategory, AuditOutcome, AuditRecord};
use crate::audit_log;
use crate::intfs::InterfaceRegistry;

/// Error type for SVS operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SvsOrchError {
    #[error("SVS table already exists: {0}/{1}")]
    TableExists(AddressFamily, TableId),
    #[error("SVS table not found: {0}/{1}")]
    TableNotFound(AddressFamily, TableId),
    #[error("SVS route not found: {1} in table {0}")]
    RouteNotFound(TableId, IpPrefix),
    #[error("SVS not enabled on {1} for {0}")]
    BindingNotFound(AddressFamily, InterfaceId),
    /// Table is still bound to interfaces.
    #[error("SVS table {0}/{1} in use (ref_count={2})")]
    TableInUse(AddressFamily, TableId, u32),
    #[error("Invalid interface: {0}")]
    InvalidInterface(InterfaceId),
}

/// Coarse classification of [`SvsOrchError`], as reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SvsErrorKind {
    AlreadyExists,
    NotFound,
    InUse,
    InvalidInterface,
}

impl SvsErrorKind {
    pub const fn status_code(self) -> i32 {
        match self {
            SvsErrorKind::NotFound => SVS_STATUS_NOT_FOUND,
            SvsErrorKind::AlreadyExists => SVS_STATUS_ALREADY_EXISTS,
            SvsErrorKind::InUse => SVS_STATUS_IN_USE,
            SvsErrorKind::InvalidInterface => SVS_STATUS_INVALID_INTERFACE,
        }
    }
}

impl SvsOrchError {
    pub fn kind(&self) -> SvsErrorKind {
        match self {
            SvsOrchError::TableExists(..) => SvsErrorKind::AlreadyExists,
            SvsOrchError::TableNotFound(..)
            | SvsOrchError::RouteNotFound(..)
            | SvsOrchError::BindingNotFound(..) => SvsErrorKind::NotFound,
            SvsOrchError::TableInUse(..) => SvsErrorKind::InUse,
            SvsOrchError::InvalidInterface(_) => SvsErrorKind::InvalidInterface,
        }
    }

    /// Negative status code for the C boundary.
    pub fn status_code(&self) -> i32 {
        self.kind().status_code()
    }
}

/// Callbacks for SVS state changes.
///
/// Lets other components (counters, a mirror of the state in another
/// process) follow SVS without polling.
pub trait SvsOrchCallbacks: Send + Sync {
    fn on_table_added(&self, _af: AddressFamily, _table_id: TableId) {}

    fn on_table_removed(&self, _af: AddressFamily, _table_id: TableId) {}

    /// Called after a new snapshot of a table became visible to lookups.
    fn on_snapshot_published(&self, _af: AddressFamily, _table_id: TableId, _generation: u64) {}

    /// Called when a binding is installed; `previous` is the table it replaced.
    fn on_enabled(&self, _binding: &SvsDetails, _previous: Option<TableId>) {}

    fn on_disabled(&self, _binding: &SvsDetails) {}
}

/// Configuration for SvsOrch.
#[derive(Debug, Clone)]
pub struct SvsOrchConfig {
    /// Number of interface slots reserved per address family for the lookup
    /// path. Interfaces with a higher index cannot be bound.
    pub max_interfaces: usize,
}

impl SvsOrchConfig {
    pub const DEFAULT_MAX_INTERFACES: usize = 4096;

    pub fn new(max_interfaces: usize) -> Self {
        Self { max_interfaces }
    }
}

impl Default for SvsOrchConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_INTERFACES)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SvsOrchStats {
    pub tables_created: u64,
    pub tables_removed: u64,
    pub routes_added: u64,
    pub routes_replaced: u64,
    pub routes_removed: u64,
    pub bindings_enabled: u64,
    pub bindings_replaced: u64,
    pub bindings_disabled: u64,
    pub snapshots_published: u64,
}

/// SvsOrch - source-based VRF selection control plane.
pub struct SvsOrch {
    config: SvsOrchConfig,
    callbacks: Option<Arc<dyn SvsOrchCallbacks>>,
    interfaces: Arc<dyn InterfaceRegistry>,
    registry: SvsTableRegistry,
    bindings: InterfaceBindingSet,
    lookup: SvsLookup,
    stats: SvsOrchStats,
}

impl std::fmt::Debug for SvsOrch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SvsOrch")
            .field("config", &self.config)
            .field("table_count", &self.registry.table_count())
            .field("binding_count", &self.bindings.len())
            .finish()
    }
}

impl SvsOrch {
    /// Creates an SvsOrch validating interfaces against `interfaces`.
    pub fn new(config: SvsOrchConfig, interfaces: Arc<dyn InterfaceRegistry>) -> Self {
        let slots = Arc::new(BindingSlots::new(config.max_interfaces));
        Self {
            config,
            callbacks: None,
            interfaces,
            registry: SvsTableRegistry::new(),
            bindings: InterfaceBindingSet::new(Arc::clone(&slots)),
            lookup: SvsLookup::new(slots),
            stats: SvsOrchStats::default(),
        }
    }

    pub fn set_callbacks(&mut self, callbacks: Arc<dyn SvsOrchCallbacks>) {
        self.callbacks = Some(callbacks);
    }

    pub fn config(&self) -> &SvsOrchConfig {
        &self.config
    }

    pub fn stats(&self) -> &SvsOrchStats {
        &self.stats
    }

    /// Fixed (major, minor) version of the SVS control interface.
    pub fn version(&self) -> (u32, u32) {
        (SVS_PLUGIN_VERSION_MAJOR, SVS_PLUGIN_VERSION_MINOR)
    }

    /// Returns a handle for packet-processing workers.
    pub fn lookup_handle(&self) -> SvsLookup {
        self.lookup.clone()
    }

    pub fn registry(&self) -> &SvsTableRegistry {
        &self.registry
    }

    pub fn table_exists(&self, af: AddressFamily, table_id: TableId) -> bool {
        self.registry.contains(af, table_id)
    }

    /// True if `interface` is known to the interface layer or still holds a
    /// binding in either family.
    pub fn knows_interface(&self, interface: InterfaceId) -> bool {
        self.interfaces.exists(interface)
            || AddressFamily::ALL
                .iter()
                .any(|af| self.bindings.get(*af, interface).is_some())
    }

    pub fn table_count(&self) -> usize {
        self.registry.table_count()
    }

    /// Table bound to the interface for `af`, if SVS is enabled there.
    pub fn binding(&self, af: AddressFamily, interface: InterfaceId) -> Option<TableId> {
        self.bindings.get(af, interface)
    }

    /// Creates an empty SVS table.
    #[instrument(skip(self))]
    pub fn table_add(&mut self, af: AddressFamily, table_id: TableId) -> Result<(), SvsOrchError> {
        if let Err(e) = self.registry.table_add(af, table_id) {
            debug_assert_eq!(e, RegistryError::TableExists);
            return Err(self.refuse(
                "table_add",
                "svs_table",
                table_key(af, table_id),
                SvsOrchError::TableExists(af, table_id),
            ));
        }

        if let Some(callbacks) = &self.callbacks {
            callbacks.on_table_added(af, table_id);
        }
        self.stats.tables_created += 1;
        info!("Created SVS table {}/{}", af, table_id);

        audit_log!(
            AuditRecord::new(AuditCategory::ResourceCreate, "SvsOrch", "table_add")
                .with_outcome(AuditOutcome::Success)
                .with_object_id(table_key(af, table_id))
                .with_object_type("svs_table")
                .with_details(serde_json::json!({
                    "af": af,
                    "table_id": table_id,
                    "stats": {
                        "tables_created": self.stats.tables_created
                    }
                }))
        );

        Ok(())
    }

    /// Deletes an SVS table and all of its routes.
    ///
    /// Fails with `TableInUse` while any interface is bound to it.
    #[instrument(skip(self))]
    pub fn table_delete(&mut self, af: AddressFamily, table_id: TableId) -> Result<(), SvsOrchError> {
        let table = match self.registry.table_delete(af, table_id) {
            Ok(table) => table,
            Err(e) => {
                let error = match e {
                    RegistryError::InUse(ref_count) => {
                        SvsOrchError::TableInUse(af, table_id, ref_count)
                    }
                    _ => SvsOrchError::TableNotFound(af, table_id),
                };
                return Err(self.refuse("table_delete", "svs_table", table_key(af, table_id), error));
            }
        };

        if let Some(callbacks) = &self.callbacks {
            callbacks.on_table_removed(af, table_id);
        }
        self.stats.tables_removed += 1;
        info!(
            "Deleted SVS table {}/{} ({} routes)",
            af,
            table_id,
            table.route_count()
        );

        audit_log!(
            AuditRecord::new(AuditCategory::ResourceDelete, "SvsOrch", "table_delete")
                .with_outcome(AuditOutcome::Success)
                .with_object_id(table_key(af, table_id))
                .with_object_type("svs_table")
                .with_details(serde_json::json!({
                    "af": af,
                    "table_id": table_id,
                    "routes_dropped": table.route_count(),
                }))
        );

        Ok(())
    }

    /// Adds or replaces a source-prefix route in a table.
    ///
    /// The address family is taken from `prefix`. `target` is not checked
    /// against the forwarding tables.
    #[instrument(skip(self, prefix), fields(prefix = %prefix))]
    pub fn route_add(
        &mut self,
        table_id: TableId,
        prefix: IpPrefix,
        target: TableId,
    ) -> Result<(), SvsOrchError> {
        let af = prefix.family();
        let (update, generation) = match self.registry.route_add(table_id, prefix, target) {
            Ok(outcome) => outcome,
            Err(_) => {
                return Err(self.refuse(
                    "route_add",
                    "svs_route",
                    route_key(table_id, &prefix),
                    SvsOrchError::TableNotFound(af, table_id),
                ))
            }
        };
        self.published(af, table_id, generation);

        let (category, previous) = match update {
            RouteUpdate::Added => {
                self.stats.routes_added += 1;
                debug!("Added SVS route {} -> {} in table {}", prefix, target, table_id);
                (AuditCategory::ResourceCreate, None)
            }
            RouteUpdate::Replaced(previous) => {
                self.stats.routes_replaced += 1;
                debug!(
                    "Replaced SVS route {} in table {}: {} -> {}",
                    prefix, table_id, previous, target
                );
                (AuditCategory::ResourceModify, Some(previous))
            }
        };

        audit_log!(AuditRecord::new(category, "SvsOrch", "route_add")
            .with_outcome(AuditOutcome::Success)
            .with_object_id(route_key(table_id, &prefix))
            .with_object_type("svs_route")
            .with_details(serde_json::json!({
                "table_id": table_id,
                "prefix": prefix,
                "target": target,
                "previous_target": previous,
                "generation": generation,
            })));

        Ok(())
    }

    /// Removes the route with exactly this prefix from a table.
    #[instrument(skip(self, prefix), fields(prefix = %prefix))]
    pub fn route_delete(&mut self, table_id: TableId, prefix: IpPrefix) -> Result<(), SvsOrchError> {
        let af = prefix.family();
        let (target, generation) = match self.registry.route_delete(table_id, &prefix) {
            Ok(outcome) => outcome,
            Err(e) => {
                let error = match e {
                    RegistryError::RouteNotFound => SvsOrchError::RouteNotFound(table_id, prefix),
                    _ => SvsOrchError::TableNotFound(af, table_id),
                };
                return Err(self.refuse("route_delete", "svs_route", route_key(table_id, &prefix), error));
            }
        };
        self.published(af, table_id, generation);
        self.stats.routes_removed += 1;
        debug!("Deleted SVS route {} -> {} from table {}", prefix, target, table_id);

        audit_log!(
            AuditRecord::new(AuditCategory::ResourceDelete, "SvsOrch", "route_delete")
                .with_outcome(AuditOutcome::Success)
                .with_object_id(route_key(table_id, &prefix))
                .with_object_type("svs_route")
                .with_details(serde_json::json!({
                    "table_id": table_id,
                    "prefix": prefix,
                    "target": target,
                    "generation": generation,
                }))
        );

        Ok(())
    }

    /// Enables source selection on an interface using `table_id`.
    ///
    /// Re-enabling with another table replaces the binding; re-enabling with
    /// the same table is a no-op.
    #[instrument(skip(self))]
    pub fn enable(
        &mut self,
        af: AddressFamily,
        table_id: TableId,
        interface: InterfaceId,
    ) -> Result<(), SvsOrchError> {
        let object_id = binding_key(af, interface);
        if !self.interfaces.is_valid(interface) || !self.bindings.in_range(interface) {
            return Err(self.refuse(
                "enable",
                "svs_binding",
                object_id,
                SvsOrchError::InvalidInterface(interface),
            ));
        }
        let publisher = match self.registry.get(af, table_id) {
            Some(table) => Arc::clone(table.publisher()),
            None => {
                return Err(self.refuse(
                    "enable",
                    "svs_binding",
                    object_id,
                    SvsOrchError::TableNotFound(af, table_id),
                ))
            }
        };

        if self.bindings.get(af, interface) == Some(table_id) {
            debug!("SVS already enabled on {} for {} with table {}", interface, af, table_id);
            return Ok(());
        }

        let previous = self.bindings.bind(af, interface, table_id, publisher);
        if let Some(table) = self.registry.get_mut(af, table_id) {
            table.incr_ref_count();
        }
        if let Some(previous) = previous {
            self.release_table(af, previous);
            self.stats.bindings_replaced += 1;
        } else {
            self.stats.bindings_enabled += 1;
        }

        let details = SvsDetails {
            af,
            table_id,
            interface,
        };
        if let Some(callbacks) = &self.callbacks {
            callbacks.on_enabled(&details, previous);
        }
        info!("Enabled SVS: {}", details);

        let category = if previous.is_some() {
            AuditCategory::ResourceModify
        } else {
            AuditCategory::ResourceCreate
        };
        audit_log!(AuditRecord::new(category, "SvsOrch", "enable")
            .with_outcome(AuditOutcome::Success)
            .with_object_id(object_id)
            .with_object_type("svs_binding")
            .with_details(serde_json::json!({
                "af": af,
                "interface": interface,
                "table_id": table_id,
                "previous_table_id": previous,
            })));

        Ok(())
    }

    /// Disables source selection on an interface; lookups revert to the
    /// interface's own table.
    #[instrument(skip(self))]
    pub fn disable(&mut self, af: AddressFamily, interface: InterfaceId) -> Result<(), SvsOrchError> {
        let object_id = binding_key(af, interface);
        // A binding outlives its interface until disabled, so look it up
        // before checking that the interface still exists.
        let Some(table_id) = self.bindings.unbind(af, interface) else {
            let error = if self.interfaces.exists(interface) {
                SvsOrchError::BindingNotFound(af, interface)
            } else {
                SvsOrchError::InvalidInterface(interface)
            };
            return Err(self.refuse("disable", "svs_binding", object_id, error));
        };
        self.release_table(af, table_id);
        self.stats.bindings_disabled += 1;

        let details = SvsDetails {
            af,
            table_id,
            interface,
        };
        if let Some(callbacks) = &self.callbacks {
            callbacks.on_disabled(&details);
        }
        info!("Disabled SVS: {}", details);

        audit_log!(
            AuditRecord::new(AuditCategory::ResourceDelete, "SvsOrch", "disable")
                .with_outcome(AuditOutcome::Success)
                .with_object_id(object_id)
                .with_object_type("svs_binding")
                .with_details(serde_json::json!({
                    "af": af,
                    "interface": interface,
                    "table_id": table_id,
                }))
        );

        Ok(())
    }

    /// Walks every binding record, IPv4 first, ordered by interface.
    ///
    /// The walk borrows `self`, so no mutation can interleave with it.
    pub fn walk(&self) -> Walk<'_> {
        self.bindings.iter()
    }

    /// Collects the walk.
    pub fn dump(&self) -> Vec<SvsDetails> {
        self.walk().collect()
    }

    /// Summary of every table.
    pub fn tables(&self) -> Vec<SvsTableInfo> {
        self.registry.tables().map(|table| table.info()).collect()
    }

    /// Routes of one table, ordered by prefix.
    pub fn routes(&self, af: AddressFamily, table_id: TableId) -> Result<Vec<SvsRoute>, SvsOrchError> {
        self.registry
            .routes(af, table_id)
            .map(Iterator::collect)
            .ok_or(SvsOrchError::TableNotFound(af, table_id))
    }

    /// Runs the lookup stage from the control plane.
    pub fn lookup(&self, interface: InterfaceId, af: AddressFamily, source: &IpAddress) -> TableSelection {
        self.lookup.lookup(interface, af, source)
    }

    /// Table a packet from `source` arriving on `interface` is forwarded
    /// with, or None if the interface is unknown.
    pub fn resolve(&self, interface: InterfaceId, af: AddressFamily, source: &IpAddress) -> Option<TableId> {
        let default_table = self.interfaces.default_table(af, interface)?;
        Some(self.lookup(interface, af, source).resolve(default_table))
    }

    fn published(&mut self, af: AddressFamily, table_id: TableId, generation: u64) {
        self.stats.snapshots_published += 1;
        if let Some(callbacks) = &self.callbacks {
            callbacks.on_snapshot_published(af, table_id, generation);
        }
        debug!("Published SVS table {}/{} generation {}", af, table_id, generation);
    }

    fn release_table(&mut self, af: AddressFamily, table_id: TableId) {
        let released = self
            .registry
            .get_mut(af, table_id)
            .and_then(|table| table.decr_ref_count());
        if released.is_none() {
            warn!("SVS table {}/{} ref count out of sync", af, table_id);
        }
    }

    /// Logs and audits a refused operation, handing the error back.
    fn refuse(
        &self,
        action: &str,
        object_type: &str,
        object_id: String,
        error: SvsOrchError,
    ) -> SvsOrchError {
        debug!("SVS {} refused: {}", action, error);
        let category = match action {
            "table_add" | "route_add" | "enable" => AuditCategory::ResourceCreate,
            _ => AuditCategory::ResourceDelete,
        };
        audit_log!(AuditRecord::new(category, "SvsOrch", action)
            .with_object_id(object_id)
            .with_object_type(object_type)
            .with_error(error.to_string()));
        error
    }
}

fn table_key(af: AddressFamily, table_id: TableId) -> String {
    format!("{}/{}", af, table_id)
}

fn route_key(table_id: TableId, prefix: &IpPrefix) -> String {
    format!("{}/{}", table_id, prefix)
}

fn binding_key(af: AddressFamily, interface: InterfaceId) -> String {
    format!("{}/{}", af, interface)
}
