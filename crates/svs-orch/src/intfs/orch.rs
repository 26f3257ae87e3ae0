//! Router interface orchestration.
//!
//! Tracks which interfaces exist, whether they are administratively up, and
//! which table each one uses by default. `SvsOrch` consults it through the
//! [`InterfaceRegistry`] trait to validate enable/disable requests; the
//! per-packet path never touches it.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use svs_types::{AddressFamily, InterfaceId, TableId};
use tracing::{debug, info};

use super::types::IntfsEntry;
use crate::audit::{AuditCategory, AuditOutcome, AuditRecord};
use crate::audit_log;

/// Interface lookup service used to validate SVS bindings.
pub trait InterfaceRegistry: Send + Sync {
    /// Returns true if the interface is known, whatever its state.
    fn exists(&self, interface: InterfaceId) -> bool;

    /// Returns true if the interface exists and can carry traffic.
    fn is_valid(&self, interface: InterfaceId) -> bool;

    /// Returns the interface's own table for `af`, if the interface exists.
    fn default_table(&self, af: AddressFamily, interface: InterfaceId) -> Option<TableId>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntfsOrchError {
    #[error("Interface not found: {0}")]
    InterfaceNotFound(InterfaceId),
    #[error("Interface name {0} already used by {1}")]
    NameConflict(String, InterfaceId),
}

#[derive(Debug, Clone, Default)]
pub struct IntfsOrchConfig {
    /// Treat admin-down interfaces as valid for SVS bindings.
    pub allow_admin_down: bool,
}

#[derive(Debug, Clone, Default)]
pub struct IntfsOrchStats {
    pub interfaces_created: u64,
    pub interfaces_updated: u64,
    pub interfaces_removed: u64,
}

#[derive(Debug, Default)]
struct IntfsState {
    interfaces: HashMap<InterfaceId, IntfsEntry>,
    stats: IntfsOrchStats,
}

/// IntfsOrch - owns the router interface table.
///
/// Shared behind an `Arc` between the config loader and `SvsOrch`, so all
/// methods take `&self`.
pub struct IntfsOrch {
    config: IntfsOrchConfig,
    state: RwLock<IntfsState>,
}

impl std::fmt::Debug for IntfsOrch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntfsOrch")
            .field("config", &self.config)
            .field("interface_count", &self.interface_count())
            .finish()
    }
}

impl IntfsOrch {
    pub fn new(config: IntfsOrchConfig) -> Self {
        Self {
            config,
            state: RwLock::new(IntfsState::default()),
        }
    }

    // A panic while holding the lock cannot leave the map half-updated, so a
    // poisoned lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, IntfsState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, IntfsState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &IntfsOrchConfig {
        &self.config
    }

    pub fn stats(&self) -> IntfsOrchStats {
        self.read().stats.clone()
    }

    pub fn interface_count(&self) -> usize {
        self.read().interfaces.len()
    }

    pub fn get(&self, interface: InterfaceId) -> Option<IntfsEntry> {
        self.read().interfaces.get(&interface).cloned()
    }

    /// Resolves an interface by name.
    pub fn find_by_name(&self, name: &str) -> Option<InterfaceId> {
        self.read()
            .interfaces
            .values()
            .find(|entry| entry.name == name)
            .map(|entry| entry.id)
    }

    /// All interfaces, ordered by id.
    pub fn interfaces(&self) -> Vec<IntfsEntry> {
        let mut entries: Vec<IntfsEntry> = self.read().interfaces.values().cloned().collect();
        entries.sort_by_key(|entry| entry.id);
        entries
    }

    /// Adds an interface, or updates it if the id is already known.
    ///
    /// Returns true if the interface was created.
    pub fn add_interface(&self, entry: IntfsEntry) -> Result<bool, IntfsOrchError> {
        let mut state = self.write();

        if let Some(other) = state
            .interfaces
            .values()
            .find(|other| other.name == entry.name && other.id != entry.id)
        {
            return Err(IntfsOrchError::NameConflict(entry.name.clone(), other.id));
        }

        let id = entry.id;
        let details = serde_json::json!({
            "name": entry.name,
            "admin_up": entry.admin_up,
            "ipv4_table": entry.ipv4_table,
            "ipv6_table": entry.ipv6_table,
        });
        let created = state.interfaces.insert(id, entry).is_none();
        let (category, action) = if created {
            state.stats.interfaces_created += 1;
            (AuditCategory::ResourceCreate, "add_interface")
        } else {
            state.stats.interfaces_updated += 1;
            (AuditCategory::ResourceModify, "update_interface")
        };
        drop(state);

        info!(interface = %id, created, "Interface configured");
        audit_log!(AuditRecord::new(category, "IntfsOrch", action)
            .with_outcome(AuditOutcome::Success)
            .with_object_id(id.to_string())
            .with_object_type("interface")
            .with_details(details));

        Ok(created)
    }

    pub fn remove_interface(&self, interface: InterfaceId) -> Result<IntfsEntry, IntfsOrchError> {
        let mut state = self.write();
        let entry = state
            .interfaces
            .remove(&interface)
            .ok_or(IntfsOrchError::InterfaceNotFound(interface))?;
        state.stats.interfaces_removed += 1;
        drop(state);

        info!(interface = %interface, name = %entry.name, "Interface removed");
        audit_log!(
            AuditRecord::new(AuditCategory::ResourceDelete, "IntfsOrch", "remove_interface")
                .with_outcome(AuditOutcome::Success)
                .with_object_id(interface.to_string())
                .with_object_type("interface")
        );

        Ok(entry)
    }

    pub fn set_admin_state(&self, interface: InterfaceId, admin_up: bool) -> Result<(), IntfsOrchError> {
        let mut guard = self.write();
        let state = &mut *guard;
        let entry = state
            .interfaces
            .get_mut(&interface)
            .ok_or(IntfsOrchError::InterfaceNotFound(interface))?;
        if entry.admin_up != admin_up {
            entry.admin_up = admin_up;
            state.stats.interfaces_updated += 1;
            debug!(interface = %interface, admin_up, "Interface admin state changed");
        }
        Ok(())
    }
}

impl InterfaceRegistry for IntfsOrch {
    fn exists(&self, interface: InterfaceId) -> bool {
        self.read().interfaces.contains_key(&interface)
    }

    fn is_valid(&self, interface: InterfaceId) -> bool {
        self.read()
            .interfaces
            .get(&interface)
            .map(|entry| entry.admin_up || self.config.allow_admin_down)
            .unwrap_or(false)
    }

    fn default_table(&self, af: AddressFamily, interface: InterfaceId) -> Option<TableId> {
        self.read()
            .interfaces
            .get(&interface)
            .map(|entry| entry.default_table(af))
    }
}
