//! SVS orchestration - source-based VRF selection.
//!
//! Lets a router pick the table for a packet's destination lookup from the
//! packet's *source* address instead of only from the ingress interface.
//!
//! ```text
//! [config file / C control channel]
//!              │
//!              ▼
//!         [SvsOrch] ──validates──> [IntfsOrch]
//!              │
//!              │ publish (atomic swap)
//!              ▼
//!     [per-table snapshots] <──lock-free── [SvsLookup] (packet workers)
//! ```
//!
//! # Key Components
//!
//! - [`svs::SvsOrch`]: tables, routes, interface bindings
//! - [`svs::SvsLookup`]: per-packet table selection, safe to call from any thread
//! - [`intfs::IntfsOrch`]: interface existence, admin state and default tables
//! - [`daemon::SvsDaemon`]: configuration loading and introspection for `svsorch`

pub mod audit;
pub mod daemon;
pub mod intfs;
pub mod svs;

pub use svs_types::{AddressFamily, InterfaceId, IpAddress, IpPrefix, ParseError, TableId};
