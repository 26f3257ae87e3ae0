//! Live SVS tables, keyed by address family and table id.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use svs_types::{AddressFamily, IpPrefix, TableId};

use super::prefix_table::PrefixTable;
use super::snapshot::SnapshotPublisher;
use super::types::{SvsRoute, SvsTableInfo};

/// One SVS table: the authoritative route set plus the publisher that
/// exposes its current compiled snapshot to the lookup path.
#[derive(Debug)]
pub struct SvsTable {
    family: AddressFamily,
    table_id: TableId,
    routes: BTreeMap<IpPrefix, TableId>,
    publisher: Arc<SnapshotPublisher>,
    /// Number of interface bindings referencing this table.
    ref_count: u32,
}

impl SvsTable {
    fn new(family: AddressFamily, table_id: TableId) -> Self {
        Self {
            family,
            table_id,
            routes: BTreeMap::new(),
            publisher: Arc::new(SnapshotPublisher::new(family, table_id)),
            ref_count: 0,
        }
    }

    pub fn family(&self) -> AddressFamily {
        self.family
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }

    /// Returns true if any interface binding references this table.
    pub fn is_in_use(&self) -> bool {
        self.ref_count > 0
    }

    pub fn publisher(&self) -> &Arc<SnapshotPublisher> {
        &self.publisher
    }

    pub fn routes(&self) -> impl Iterator<Item = SvsRoute> + '_ {
        self.routes
            .iter()
            .map(|(prefix, table_id)| SvsRoute::new(*prefix, *table_id))
    }

    pub fn info(&self) -> SvsTableInfo {
        SvsTableInfo {
            af: self.family,
            table_id: self.table_id,
            route_count: self.routes.len(),
            ref_count: self.ref_count,
            generation: self.publisher.generation(),
        }
    }

    pub(crate) fn incr_ref_count(&mut self) -> u32 {
        self.ref_count += 1;
        self.ref_count
    }

    /// Returns the new count, or None if it would underflow.
    pub(crate) fn decr_ref_count(&mut self) -> Option<u32> {
        self.ref_count = self.ref_count.checked_sub(1)?;
        Some(self.ref_count)
    }

    /// Compiles the route set into a fresh trie and publishes it.
    fn republish(&self) -> u64 {
        let table = PrefixTable::build(self.family, self.routes());
        self.publisher.publish(table)
    }
}

impl fmt::Display for SvsTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SvsTable({} {}, routes={}, refs={})",
            self.family,
            self.table_id,
            self.routes.len(),
            self.ref_count
        )
    }
}

/// Outcome of a route insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteUpdate {
    Added,
    /// The exact prefix existed; holds its previous target.
    Replaced(TableId),
}

/// Reasons a registry mutation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("table already exists")]
    TableExists,
    #[error("table not found")]
    TableNotFound,
    #[error("route not found")]
    RouteNotFound,
    /// Table still referenced by this many bindings.
    #[error("table in use (ref_count={0})")]
    InUse(u32),
}

/// Owns every live SVS table, one map per address family.
#[derive(Debug, Default)]
pub struct SvsTableRegistry {
    tables: [BTreeMap<TableId, SvsTable>; 2],
}

impl SvsTableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, af: AddressFamily, table_id: TableId) -> bool {
        self.tables[af.index()].contains_key(&table_id)
    }

    pub fn get(&self, af: AddressFamily, table_id: TableId) -> Option<&SvsTable> {
        self.tables[af.index()].get(&table_id)
    }

    pub(crate) fn get_mut(&mut self, af: AddressFamily, table_id: TableId) -> Option<&mut SvsTable> {
        self.tables[af.index()].get_mut(&table_id)
    }

    pub fn table_count(&self) -> usize {
        self.tables.iter().map(BTreeMap::len).sum()
    }

    /// Creates an empty table; its initial snapshot is the empty trie.
    pub fn table_add(
        &mut self,
        af: AddressFamily,
        table_id: TableId,
    ) -> Result<&SvsTable, RegistryError> {
        let tables = &mut self.tables[af.index()];
        if tables.contains_key(&table_id) {
            return Err(RegistryError::TableExists);
        }
        Ok(&*tables
            .entry(table_id)
            .or_insert_with(|| SvsTable::new(af, table_id)))
    }

    /// Removes an unreferenced table. Readers still holding its last
    /// snapshot keep it alive until they finish.
    pub fn table_delete(&mut self, af: AddressFamily, table_id: TableId) -> Result<SvsTable, RegistryError> {
        let tables = &mut self.tables[af.index()];
        let table = tables.get(&table_id).ok_or(RegistryError::TableNotFound)?;
        if table.is_in_use() {
            return Err(RegistryError::InUse(table.ref_count));
        }
        tables.remove(&table_id).ok_or(RegistryError::TableNotFound)
    }

    /// Inserts or replaces a route; the family comes from the prefix.
    ///
    /// Returns the outcome and the generation of the published snapshot.
    pub fn route_add(
        &mut self,
        table_id: TableId,
        prefix: IpPrefix,
        target: TableId,
    ) -> Result<(RouteUpdate, u64), RegistryError> {
        let table = self
            .get_mut(prefix.family(), table_id)
            .ok_or(RegistryError::TableNotFound)?;
        let update = match table.routes.insert(prefix, target) {
            Some(previous) => RouteUpdate::Replaced(previous),
            None => RouteUpdate::Added,
        };
        Ok((update, table.republish()))
    }

    /// Removes the route with exactly this prefix.
    ///
    /// Returns the removed target and the generation of the published snapshot.
    pub fn route_delete(
        &mut self,
        table_id: TableId,
        prefix: &IpPrefix,
    ) -> Result<(TableId, u64), RegistryError> {
        let table = self
            .get_mut(prefix.family(), table_id)
            .ok_or(RegistryError::TableNotFound)?;
        let target = table
            .routes
            .remove(prefix)
            .ok_or(RegistryError::RouteNotFound)?;
        Ok((target, table.republish()))
    }

    /// All tables, IPv4 first, each family ordered by id.
    pub fn tables(&self) -> impl Iterator<Item = &SvsTable> {
        self.tables.iter().flat_map(BTreeMap::values)
    }

    pub fn routes(
        &self,
        af: AddressFamily,
        table_id: TableId,
    ) -> Option<impl Iterator<Item = SvsRoute> + '_> {
        self.get(af, table_id).map(|table| table.routes())
    }
}
