//! Router interface types.

use serde::{Deserialize, Serialize};
use std::fmt;
use svs_types::{AddressFamily, InterfaceId, TableId};

/// A router interface as seen by source selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntfsEntry {
    pub id: InterfaceId,
    pub name: String,
    pub admin_up: bool,
    /// Table used for IPv4 destination lookups when SVS does not override it.
    pub ipv4_table: TableId,
    /// Table used for IPv6 destination lookups when SVS does not override it.
    pub ipv6_table: TableId,
}

impl IntfsEntry {
    /// Creates an admin-up interface in the global table (0) for both families.
    pub fn new(id: InterfaceId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            admin_up: true,
            ipv4_table: 0,
            ipv6_table: 0,
        }
    }

    pub fn with_admin_up(mut self, admin_up: bool) -> Self {
        self.admin_up = admin_up;
        self
    }

    pub fn with_table(mut self, af: AddressFamily, table_id: TableId) -> Self {
        match af {
            AddressFamily::Ipv4 => self.ipv4_table = table_id,
            AddressFamily::Ipv6 => self.ipv6_table = table_id,
        }
        self
    }

    /// The interface's statically configured table for `af`.
    pub fn default_table(&self, af: AddressFamily) -> TableId {
        match af {
            AddressFamily::Ipv4 => self.ipv4_table,
            AddressFamily::Ipv6 => self.ipv6_table,
        }
    }
}

impl fmt::Display for IntfsEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IntfsEntry({} {}, {}, v4_table={}, v6_table={})",
            self.id,
            self.name,
            if self.admin_up { "up" } else { "down" },
            self.ipv4_table,
            self.ipv6_table
        )
    }
}
