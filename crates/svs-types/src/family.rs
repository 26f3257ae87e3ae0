//! Address family of SVS tables, routes and bindings.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// IP address family.
///
/// Every SVS table and every interface binding is scoped to exactly one
/// family; the same table id may exist independently in both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    /// Both families, in index order.
    pub const ALL: [AddressFamily; 2] = [AddressFamily::Ipv4, AddressFamily::Ipv6];

    /// Number of bits in an address of this family.
    pub const fn max_prefix_len(&self) -> u8 {
        match self {
            AddressFamily::Ipv4 => 32,
            AddressFamily::Ipv6 => 128,
        }
    }

    /// Dense index usable for per-family arrays.
    pub const fn index(&self) -> usize {
        match self {
            AddressFamily::Ipv4 => 0,
            AddressFamily::Ipv6 => 1,
        }
    }

    /// Decodes the control-channel encoding (`0` = IPv4, `1` = IPv6).
    pub fn from_api(af: u8) -> Result<Self, ParseError> {
        match af {
            0 => Ok(AddressFamily::Ipv4),
            1 => Ok(AddressFamily::Ipv6),
            _ => Err(ParseError::InvalidAddressFamily(af.to_string())),
        }
    }

    /// Encodes to the control-channel representation.
    pub const fn to_api(self) -> u8 {
        match self {
            AddressFamily::Ipv4 => 0,
            AddressFamily::Ipv6 => 1,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::Ipv4 => write!(f, "ipv4"),
            AddressFamily::Ipv6 => write!(f, "ipv6"),
        }
    }
}

impl FromStr for AddressFamily {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ipv4" | "ip4" | "v4" | "inet" => Ok(AddressFamily::Ipv4),
            "ipv6" | "ip6" | "v6" | "inet6" => Ok(AddressFamily::Ipv6),
            _ => Err(ParseError::InvalidAddressFamily(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("ipv4".parse::<AddressFamily>().unwrap(), AddressFamily::Ipv4);
        assert_eq!("IP6".parse::<AddressFamily>().unwrap(), AddressFamily::Ipv6);
        assert_eq!("inet".parse::<AddressFamily>().unwrap(), AddressFamily::Ipv4);
        assert!("ipx".parse::<AddressFamily>().is_err());
    }

    #[test]
    fn test_api_encoding() {
        for af in AddressFamily::ALL {
            assert_eq!(AddressFamily::from_api(af.to_api()).unwrap(), af);
        }
        assert_eq!(
            AddressFamily::from_api(7),
            Err(ParseError::InvalidAddressFamily("7".to_string()))
        );
    }

    #[test]
    fn test_index_and_width() {
        assert_eq!(AddressFamily::Ipv4.index(), 0);
        assert_eq!(AddressFamily::Ipv6.index(), 1);
        assert_eq!(AddressFamily::Ipv4.max_prefix_len(), 32);
        assert_eq!(AddressFamily::Ipv6.max_prefix_len(), 128);
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&AddressFamily::Ipv6).unwrap();
        assert_eq!(json, "\"ipv6\"");
    }
}
