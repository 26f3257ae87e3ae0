//! Interface bindings: which SVS table each (address family, interface)
//! pair uses for source selection.

use std::collections::BTreeMap;
use std::sync::Arc;

use svs_types::{AddressFamily, InterfaceId, TableId};

use super::lookup::BindingSlots;
use super::snapshot::SnapshotPublisher;
use super::types::SvsDetails;

/// Control-plane record of every binding, mirrored into the lookup slots.
///
/// The maps are authoritative and ordered (for the walk); the slots are the
/// lock-free copy the dataplane reads.
#[derive(Debug)]
pub struct InterfaceBindingSet {
    bindings: [BTreeMap<InterfaceId, TableId>; 2],
    slots: Arc<BindingSlots>,
}

impl InterfaceBindingSet {
    pub(crate) fn new(slots: Arc<BindingSlots>) -> Self {
        Self {
            bindings: Default::default(),
            slots,
        }
    }

    /// Returns true if the dataplane has a slot for this interface.
    pub fn in_range(&self, interface: InterfaceId) -> bool {
        interface.as_index() < self.slots.capacity()
    }

    pub fn get(&self, af: AddressFamily, interface: InterfaceId) -> Option<TableId> {
        self.bindings[af.index()].get(&interface).copied()
    }

    pub fn len(&self) -> usize {
        self.bindings.iter().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.iter().all(BTreeMap::is_empty)
    }

    /// Installs or replaces the binding and arms the lookup slot.
    ///
    /// Returns the previously bound table, if any. The caller guarantees the
    /// interface is in range and that `publisher` belongs to `table_id`.
    pub(crate) fn bind(
        &mut self,
        af: AddressFamily,
        interface: InterfaceId,
        table_id: TableId,
        publisher: Arc<SnapshotPublisher>,
    ) -> Option<TableId> {
        debug_assert_eq!(publisher.table_id(), table_id);
        let armed = self.slots.arm(af, interface, publisher);
        debug_assert!(armed, "{} has no lookup slot", interface);
        self.bindings[af.index()].insert(interface, table_id)
    }

    /// Removes the binding and disarms the slot; lookups revert to the
    /// interface default immediately.
    pub(crate) fn unbind(&mut self, af: AddressFamily, interface: InterfaceId) -> Option<TableId> {
        let table_id = self.bindings[af.index()].remove(&interface)?;
        self.slots.disarm(af, interface);
        Some(table_id)
    }

    /// Every binding, IPv4 first, ordered by interface.
    pub fn iter(&self) -> Walk<'_> {
        Walk {
            bindings: &self.bindings,
            family: 0,
            inner: self.bindings[0].iter(),
        }
    }
}

/// Lazy iterator over binding records.
///
/// Holds a shared borrow of the binding set, so no mutation can happen while
/// a walk is in progress. Call [`InterfaceBindingSet::iter`] again to restart.
#[derive(Debug, Clone)]
pub struct Walk<'a> {
    bindings: &'a [BTreeMap<InterfaceId, TableId>; 2],
    family: usize,
    inner: std::collections::btree_map::Iter<'a, InterfaceId, TableId>,
}

impl Iterator for Walk<'_> {
    type Item = SvsDetails;

    fn next(&mut self) -> Option<SvsDetails> {
        loop {
            if let Some((interface, table_id)) = self.inner.next() {
                return Some(SvsDetails {
                    af: AddressFamily::ALL[self.family],
                    table_id: *table_id,
                    interface: *interface,
                });
            }
            if self.family + 1 >= self.bindings.len() {
                return None;
            }
            self.family += 1;
            self.inner = self.bindings[self.family].iter();
        }
    }
}

impl std::iter::FusedIterator for Walk<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn publisher(af: AddressFamily, table_id: TableId) -> Arc<SnapshotPublisher> {
        Arc::new(SnapshotPublisher::new(af, table_id))
    }

    fn binding_set() -> InterfaceBindingSet {
        InterfaceBindingSet::new(Arc::new(BindingSlots::new(16)))
    }

    #[test]
    fn test_bind_and_replace() {
        let mut set = binding_set();
        let if3 = InterfaceId::new(3);

        assert_eq!(
            set.bind(AddressFamily::Ipv4, if3, 7, publisher(AddressFamily::Ipv4, 7)),
            None
        );
        assert_eq!(set.get(AddressFamily::Ipv4, if3), Some(7));
        assert_eq!(set.get(AddressFamily::Ipv6, if3), None);

        assert_eq!(
            set.bind(AddressFamily::Ipv4, if3, 8, publisher(AddressFamily::Ipv4, 8)),
            Some(7)
        );
        assert_eq!(set.get(AddressFamily::Ipv4, if3), Some(8));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_unbind() {
        let mut set = binding_set();
        let if3 = InterfaceId::new(3);
        assert_eq!(set.unbind(AddressFamily::Ipv4, if3), None);

        set.bind(AddressFamily::Ipv4, if3, 7, publisher(AddressFamily::Ipv4, 7));
        assert_eq!(set.unbind(AddressFamily::Ipv4, if3), Some(7));
        assert!(set.is_empty());
    }

    #[test]
    fn test_in_range() {
        let set = binding_set();
        assert!(set.in_range(InterfaceId::new(15)));
        assert!(!set.in_range(InterfaceId::new(16)));
    }

    #[test]
    fn test_walk_order_and_restart() {
        let mut set = binding_set();
        set.bind(
            AddressFamily::Ipv6,
            InterfaceId::new(1),
            5,
            publisher(AddressFamily::Ipv6, 5),
        );
        set.bind(
            AddressFamily::Ipv4,
            InterfaceId::new(4),
            7,
            publisher(AddressFamily::Ipv4, 7),
        );
        set.bind(
            AddressFamily::Ipv4,
            InterfaceId::new(2),
            7,
            publisher(AddressFamily::Ipv4, 7),
        );

        let walked: Vec<String> = set.iter().map(|d| d.to_string()).collect();
        assert_eq!(
            walked,
            vec![
                "ipv4 if2 -> svs table 7",
                "ipv4 if4 -> svs table 7",
                "ipv6 if1 -> svs table 5"
            ]
        );

        let mut walk = set.iter();
        assert!(walk.next().is_some());
        assert_eq!(set.iter().count(), 3);
    }

    #[test]
    fn test_walk_empty() {
        let set = binding_set();
        let mut walk = set.iter();
        assert_eq!(walk.next(), None);
        assert_eq!(walk.next(), None);
    }
}
