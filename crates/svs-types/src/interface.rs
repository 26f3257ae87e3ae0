//! Interface identifiers.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Software interface index.
///
/// Indices are small dense integers assigned by the interface layer, which
/// lets the lookup path keep one pre-sized slot per interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InterfaceId(u32);

impl InterfaceId {
    pub const fn new(index: u32) -> Self {
        InterfaceId(index)
    }

    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    /// Returns the index as a slot offset.
    pub const fn as_index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "if{}", self.0)
    }
}

impl FromStr for InterfaceId {
    type Err = ParseError;

    /// Accepts either a bare index (`3`) or the display form (`if3`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("if").unwrap_or(s);
        digits
            .parse::<u32>()
            .map(InterfaceId)
            .map_err(|_| ParseError::InvalidInterfaceId(s.to_string()))
    }
}

impl From<u32> for InterfaceId {
    fn from(index: u32) -> Self {
        InterfaceId(index)
    }
}

impl From<InterfaceId> for u32 {
    fn from(id: InterfaceId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_interface_id_parse() {
        assert_eq!("3".parse::<InterfaceId>().unwrap(), InterfaceId::new(3));
        assert_eq!("if12".parse::<InterfaceId>().unwrap(), InterfaceId::new(12));
        assert!("eth0".parse::<InterfaceId>().is_err());
        assert!("if".parse::<InterfaceId>().is_err());
    }

    #[test]
    fn test_interface_id_display() {
        assert_eq!(InterfaceId::new(7).to_string(), "if7");
        assert_eq!(InterfaceId::new(7).as_index(), 7);
    }
}
