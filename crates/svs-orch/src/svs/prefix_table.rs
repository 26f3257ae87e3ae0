//! Immutable longest-prefix-match table keyed by source prefix.
//!
//! A `PrefixTable` is a binary trie stored in a node arena owned by the
//! table itself. Nodes reference children by index, never by pointer, so a
//! built table is a plain value that can be shared read-only between threads.
//! There is no mutation API: the control plane rebuilds a fresh table from the
//! full route set on every change and publishes it as a new snapshot.

use super::types::SvsRoute;
use svs_types::{AddressFamily, IpAddress, TableId};

/// Child index meaning "no child". The root lives at index 0 and is never a
/// child, so 0 is free to use as the sentinel.
const NO_CHILD: u32 = 0;
const ROOT: usize = 0;

#[derive(Debug, Clone, Default)]
struct Node {
    children: [u32; 2],
    target: Option<TableId>,
}

/// Returns bit `index` (MSB first) of a left-aligned address key.
#[inline]
fn key_bit(key: u128, index: u8) -> usize {
    ((key >> (127 - u32::from(index))) & 1) as usize
}

/// Longest-prefix-match structure for one SVS table.
#[derive(Debug, Clone)]
pub struct PrefixTable {
    family: AddressFamily,
    nodes: Vec<Node>,
    len: usize,
}

impl PrefixTable {
    /// Creates a table with no routes; every lookup misses.
    pub fn empty(family: AddressFamily) -> Self {
        Self {
            family,
            nodes: vec![Node::default()],
            len: 0,
        }
    }

    /// Builds a table from the complete route set.
    ///
    /// # Panics
    ///
    /// Panics if a route belongs to another address family or if two routes
    /// share the same exact prefix. Callers keep routes in a map keyed by
    /// prefix within a per-family table, so either case is a broken invariant.
    pub fn build<I>(family: AddressFamily, routes: I) -> Self
    where
        I: IntoIterator<Item = SvsRoute>,
    {
        let mut table = Self::empty(family);
        for route in routes {
            table.insert(&route);
        }
        table
    }

    fn insert(&mut self, route: &SvsRoute) {
        assert_eq!(
            route.prefix.family(),
            self.family,
            "route {} does not belong to an {} table",
            route.prefix,
            self.family
        );

        let key = route.prefix.address().to_bits();
        let mut node = ROOT;
        for index in 0..route.prefix.prefix_len() {
            let bit = key_bit(key, index);
            let child = self.nodes[node].children[bit];
            node = if child == NO_CHILD {
                let next = u32::try_from(self.nodes.len())
                    .unwrap_or_else(|_| unreachable!("prefix table node arena overflow"));
                self.nodes.push(Node::default());
                self.nodes[node].children[bit] = next;
                next as usize
            } else {
                child as usize
            };
        }

        let target = &mut self.nodes[node].target;
        assert!(
            target.is_none(),
            "duplicate prefix {} in prefix table build",
            route.prefix
        );
        *target = Some(route.table_id);
        self.len += 1;
    }

    /// Returns the target table of the longest prefix covering `address`.
    ///
    /// Walks at most one node per address bit and never allocates. An
    /// address of the other family never matches.
    #[inline]
    pub fn lookup(&self, address: &IpAddress) -> Option<TableId> {
        if address.family() != self.family {
            return None;
        }

        let key = address.to_bits();
        let mut node = &self.nodes[ROOT];
        let mut best = node.target;
        for index in 0..self.family.max_prefix_len() {
            let child = node.children[key_bit(key, index)];
            if child == NO_CHILD {
                break;
            }
            node = &self.nodes[child as usize];
            if node.target.is_some() {
                best = node.target;
            }
        }
        best
    }

    pub fn family(&self) -> AddressFamily {
        self.family
    }

    /// Number of routes in the table.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn route(prefix: &str, table_id: TableId) -> SvsRoute {
        SvsRoute::new(prefix.parse().unwrap(), table_id)
    }

    fn addr(s: &str) -> IpAddress {
        s.parse().unwrap()
    }

    #[test]
    fn test_empty_table_misses() {
        let table = PrefixTable::empty(AddressFamily::Ipv4);
        assert!(table.is_empty());
        assert_eq!(table.len(), 0);
        assert_eq!(table.lookup(&addr("10.0.0.1")), None);
    }

    #[test]
    fn test_longest_match_wins() {
        let table = PrefixTable::build(
            AddressFamily::Ipv4,
            vec![
                route("10.0.0.0/8", 100),
                route("10.1.0.0/16", 200),
                route("10.1.2.0/24", 300),
            ],
        );

        assert_eq!(table.lookup(&addr("10.1.2.3")), Some(300));
        assert_eq!(table.lookup(&addr("10.1.3.3")), Some(200));
        assert_eq!(table.lookup(&addr("10.2.0.1")), Some(100));
        assert_eq!(table.lookup(&addr("11.0.0.1")), None);
    }

    #[test]
    fn test_insertion_order_does_not_matter() {
        let a = PrefixTable::build(
            AddressFamily::Ipv4,
            vec![route("10.1.0.0/16", 2), route("10.0.0.0/8", 1)],
        );
        let b = PrefixTable::build(
            AddressFamily::Ipv4,
            vec![route("10.0.0.0/8", 1), route("10.1.0.0/16", 2)],
        );
        assert_eq!(a.len(), b.len());
        assert_eq!(a.lookup(&addr("10.1.9.9")), Some(2));
        assert_eq!(b.lookup(&addr("10.1.9.9")), Some(2));
    }

    #[test]
    fn test_default_route_and_host_route() {
        let table = PrefixTable::build(
            AddressFamily::Ipv4,
            vec![route("0.0.0.0/0", 1), route("192.168.1.1/32", 2)],
        );

        assert_eq!(table.lookup(&addr("192.168.1.1")), Some(2));
        assert_eq!(table.lookup(&addr("192.168.1.2")), Some(1));
        assert_eq!(table.lookup(&addr("8.8.8.8")), Some(1));
    }

    #[test]
    fn test_ipv6_lookup() {
        let table = PrefixTable::build(
            AddressFamily::Ipv6,
            vec![route("2001:db8::/32", 10), route("2001:db8:1::/48", 20)],
        );

        assert_eq!(table.lookup(&addr("2001:db8:1::5")), Some(20));
        assert_eq!(table.lookup(&addr("2001:db8:2::5")), Some(10));
        assert_eq!(table.lookup(&addr("2001:db9::1")), None);
        assert_eq!(table.lookup(&addr("::1")), None);
    }

    #[test]
    fn test_full_length_ipv6_host_route() {
        let table = PrefixTable::build(AddressFamily::Ipv6, vec![route("2001:db8::1/128", 4)]);
        assert_eq!(table.lookup(&addr("2001:db8::1")), Some(4));
        assert_eq!(table.lookup(&addr("2001:db8::2")), None);
        assert_eq!(table.lookup(&addr("2001:db8::")), None);
    }

    #[test]
    fn test_other_family_never_matches() {
        let table = PrefixTable::build(AddressFamily::Ipv4, vec![route("0.0.0.0/0", 1)]);
        assert_eq!(table.lookup(&addr("::")), None);
    }

    #[test]
    fn test_len_counts_routes() {
        let table = PrefixTable::build(
            AddressFamily::Ipv4,
            vec![route("192.168.0.0/16", 3), route("10.0.0.0/8", 1), route("0.0.0.0/0", 2)],
        );
        assert_eq!(table.len(), 3);
        assert!(!table.is_empty());
    }

    #[test]
    #[should_panic(expected = "duplicate prefix")]
    fn test_duplicate_prefix_is_invariant_violation() {
        PrefixTable::build(
            AddressFamily::Ipv4,
            vec![route("10.0.0.0/8", 1), route("10.0.0.0/8", 2)],
        );
    }

    #[test]
    #[should_panic(expected = "does not belong")]
    fn test_family_mismatch_is_invariant_violation() {
        PrefixTable::build(AddressFamily::Ipv6, vec![route("10.0.0.0/8", 1)]);
    }
}
