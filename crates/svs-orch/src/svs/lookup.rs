//! Per-packet lookup stage.
//!
//! The control plane arms one slot per (address family, interface) when a
//! binding is enabled; the slot points at the bound table's
//! [`SnapshotPublisher`]. Workers only ever perform two atomic loads (slot,
//! then snapshot) followed by the trie walk: no locks, no allocation, no
//! error path. Slots are allocated once at construction, so arming never
//! moves memory a worker may be reading.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use svs_types::{AddressFamily, InterfaceId, IpAddress};

use super::snapshot::SnapshotPublisher;
use super::types::TableSelection;

/// Fast-path binding slots, indexed by address family then interface.
#[derive(Debug)]
pub(crate) struct BindingSlots {
    slots: [Box<[ArcSwapOption<SnapshotPublisher>]>; 2],
}

impl BindingSlots {
    pub(crate) fn new(max_interfaces: usize) -> Self {
        Self {
            slots: std::array::from_fn(|_| {
                (0..max_interfaces)
                    .map(|_| ArcSwapOption::from(None))
                    .collect()
            }),
        }
    }

    /// Number of interfaces each family can address.
    pub(crate) fn capacity(&self) -> usize {
        self.slots[0].len()
    }

    #[inline]
    fn slot(
        &self,
        af: AddressFamily,
        interface: InterfaceId,
    ) -> Option<&ArcSwapOption<SnapshotPublisher>> {
        self.slots[af.index()].get(interface.as_index())
    }

    /// Points the slot at a table. Returns false if the interface is out of range.
    pub(crate) fn arm(
        &self,
        af: AddressFamily,
        interface: InterfaceId,
        publisher: Arc<SnapshotPublisher>,
    ) -> bool {
        match self.slot(af, interface) {
            Some(slot) => {
                slot.store(Some(publisher));
                true
            }
            None => false,
        }
    }

    pub(crate) fn disarm(&self, af: AddressFamily, interface: InterfaceId) {
        if let Some(slot) = self.slot(af, interface) {
            slot.store(None);
        }
    }
}

/// Cloneable handle used by packet-processing workers.
///
/// Every clone observes the same bindings; mutations made by the owning
/// [`SvsOrch`](super::SvsOrch) become visible without any coordination.
#[derive(Debug, Clone)]
pub struct SvsLookup {
    slots: Arc<BindingSlots>,
}

impl SvsLookup {
    pub(crate) fn new(slots: Arc<BindingSlots>) -> Self {
        Self { slots }
    }

    /// Selects the table for the destination lookup of one packet.
    ///
    /// Returns [`TableSelection::UseDefault`] when the interface has no
    /// binding for `af`, when no configured prefix covers `source`, when
    /// `source` is not of family `af`, or when the interface index is beyond
    /// the slot capacity. Never fails.
    #[inline]
    pub fn lookup(
        &self,
        interface: InterfaceId,
        af: AddressFamily,
        source: &IpAddress,
    ) -> TableSelection {
        let Some(slot) = self.slots.slot(af, interface) else {
            return TableSelection::UseDefault;
        };
        let bound = slot.load();
        let Some(publisher) = bound.as_ref() else {
            return TableSelection::UseDefault;
        };
        match publisher.load().lookup(source) {
            Some(table_id) => TableSelection::Table(table_id),
            None => TableSelection::UseDefault,
        }
    }

    /// Returns true if source selection is active for (af, interface).
    pub fn is_armed(&self, interface: InterfaceId, af: AddressFamily) -> bool {
        self.slots
            .slot(af, interface)
            .map(|slot| slot.load().is_some())
            .unwrap_or(false)
    }

    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }
}
