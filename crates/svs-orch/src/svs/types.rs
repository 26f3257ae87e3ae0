//! SVS types and data structures.

use serde::{Deserialize, Serialize};
use std::fmt;
use svs_types::{AddressFamily, InterfaceId, IpPrefix, TableId};

/// Major version reported by the version query.
pub const SVS_PLUGIN_VERSION_MAJOR: u32 = 1;
/// Minor version reported by the version query.
pub const SVS_PLUGIN_VERSION_MINOR: u32 = 0;

/// Status codes returned across the C boundary.
pub const SVS_STATUS_OK: i32 = 0;
pub const SVS_STATUS_NOT_FOUND: i32 = -1;
pub const SVS_STATUS_ALREADY_EXISTS: i32 = -2;
pub const SVS_STATUS_IN_USE: i32 = -3;
pub const SVS_STATUS_INVALID_INTERFACE: i32 = -4;
pub const SVS_STATUS_INVALID_ADDRESS_FAMILY: i32 = -5;
pub const SVS_STATUS_INVALID_PREFIX: i32 = -6;
/// No `SvsOrch` is registered on the calling thread.
pub const SVS_STATUS_NOT_REGISTERED: i32 = -7;
/// The call re-entered the boundary while the instance was in use, for
/// example from a dump callback.
pub const SVS_STATUS_BUSY: i32 = -8;

/// One source-prefix route inside an SVS table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SvsRoute {
    /// Source prefix to match.
    pub prefix: IpPrefix,
    /// Table the destination lookup should use on a match.
    ///
    /// Opaque: never checked against the forwarding tables that exist.
    pub table_id: TableId,
}

impl SvsRoute {
    pub fn new(prefix: IpPrefix, table_id: TableId) -> Self {
        Self { prefix, table_id }
    }
}

impl fmt::Display for SvsRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> table {}", self.prefix, self.table_id)
    }
}

/// One interface binding, as produced by the walk/dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SvsDetails {
    pub af: AddressFamily,
    pub table_id: TableId,
    pub interface: InterfaceId,
}

impl fmt::Display for SvsDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} -> svs table {}",
            self.af, self.interface, self.table_id
        )
    }
}

/// Summary of one SVS table for introspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SvsTableInfo {
    pub af: AddressFamily,
    pub table_id: TableId,
    /// Number of source-prefix routes.
    pub route_count: usize,
    /// Number of interfaces bound to this table.
    pub ref_count: u32,
    /// Number of snapshots published so far (the empty initial one counts).
    pub generation: u64,
}

/// Outcome of the per-packet lookup stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableSelection {
    /// Forward using the ingress interface's own table.
    UseDefault,
    /// Forward using the given table instead.
    Table(TableId),
}

impl TableSelection {
    /// Returns the table to use given the interface's default table.
    pub const fn resolve(self, default_table: TableId) -> TableId {
        match self {
            TableSelection::UseDefault => default_table,
            TableSelection::Table(table_id) => table_id,
        }
    }
}

impl fmt::Display for TableSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableSelection::UseDefault => write!(f, "default"),
            TableSelection::Table(table_id) => write!(f, "table {}", table_id),
        }
    }
}
