//! Snapshot publication between the control plane and lookup workers.
//!
//! Each SVS table owns one `SnapshotPublisher`. The control plane builds a
//! complete `PrefixTable` and publishes it with a single atomic pointer swap;
//! workers load whatever snapshot is current and finish their walk on it even
//! if a newer one is published meanwhile. A superseded snapshot stays alive
//! until the last reader guard referencing it is dropped, then it is freed by
//! whichever thread drops that guard.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::{ArcSwap, Guard};
use svs_types::{AddressFamily, IpAddress, TableId};
use tracing::trace;

use super::prefix_table::PrefixTable;

/// Atomically replaceable reference to the current snapshot of one table.
#[derive(Debug)]
pub struct SnapshotPublisher {
    family: AddressFamily,
    table_id: TableId,
    current: ArcSwap<PrefixTable>,
    generation: AtomicU64,
}

impl SnapshotPublisher {
    /// Creates a publisher holding an empty snapshot (generation 1).
    pub fn new(family: AddressFamily, table_id: TableId) -> Self {
        Self {
            family,
            table_id,
            current: ArcSwap::from_pointee(PrefixTable::empty(family)),
            generation: AtomicU64::new(1),
        }
    }

    /// Replaces the current snapshot and returns the new generation.
    ///
    /// Only the control plane publishes, so generations are strictly
    /// increasing in publication order.
    pub fn publish(&self, table: PrefixTable) -> u64 {
        debug_assert_eq!(table.family(), self.family);
        let routes = table.len();
        self.current.store(Arc::new(table));
        let generation = self.generation.fetch_add(1, Ordering::Release) + 1;
        trace!(
            af = %self.family,
            table_id = self.table_id,
            routes,
            generation,
            "snapshot swapped"
        );
        generation
    }

    /// Borrows the current snapshot for the duration of one lookup.
    #[inline]
    pub fn load(&self) -> Guard<Arc<PrefixTable>> {
        self.current.load()
    }

    /// Longest-prefix match against the current snapshot.
    #[inline]
    pub fn lookup(&self, address: &IpAddress) -> Option<TableId> {
        self.current.load().lookup(address)
    }

    pub fn family(&self) -> AddressFamily {
        self.family
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}
