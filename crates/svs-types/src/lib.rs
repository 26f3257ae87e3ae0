//! Common types for source-based VRF selection.
//!
//! This crate provides type-safe representations of the network primitives
//! shared by the SVS control plane and the packet lookup path:
//!
//! - [`AddressFamily`]: IPv4 / IPv6 scoping of tables and bindings
//! - [`IpAddress`]: IPv4 and IPv6 addresses with bit-level access
//! - [`IpPrefix`]: normalized IP network prefixes (CIDR notation)
//! - [`InterfaceId`]: software interface index

mod family;
mod interface;
mod ip;

pub use family::AddressFamily;
pub use interface::InterfaceId;
pub use ip::{IpAddress, IpPrefix};

/// Identifier of a routing table (VRF) within one address family.
///
/// Table ids are assigned by the operator, never allocated.
pub type TableId = u32;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid IP address format: {0}")]
    InvalidIpAddress(String),

    #[error("invalid IP prefix format: {0}")]
    InvalidIpPrefix(String),

    #[error("invalid address family: {0}")]
    InvalidAddressFamily(String),

    #[error("invalid interface id: {0}")]
    InvalidInterfaceId(String),
}
