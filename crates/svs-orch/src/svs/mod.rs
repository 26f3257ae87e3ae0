//! SvsOrch - source-based VRF selection.
//!
//! Picks the table for a packet's destination lookup by longest-prefix
//! matching its *source* address, per ingress interface and address family.
//!
//! # Architecture
//!
//! ```text
//! control channel / config
//!      │
//!      ▼
//!   SvsOrch ──> SvsTableRegistry ──> SvsTable ──> SnapshotPublisher
//!      │                                               │ (ArcSwap)
//!      └──> InterfaceBindingSet ──> BindingSlots ──────┘
//!                                        ▲
//!                                        │ lock-free reads
//!                                    SvsLookup (one clone per worker)
//! ```
//!
//! Every route change rebuilds the table's [`PrefixTable`] from scratch and
//! publishes it with one pointer swap. Workers never block the control plane
//! and never see a partially built trie; a superseded snapshot is freed when
//! the last worker holding it lets go.

mod bindings;
mod ffi;
mod lookup;
mod orch;
mod prefix_table;
mod registry;
mod snapshot;
mod types;

pub use bindings::{InterfaceBindingSet, Walk};
pub use ffi::{register_svs_orch, unregister_svs_orch, SvsDumpCallback};
pub use lookup::SvsLookup;
pub use orch::{
    SvsErrorKind, SvsOrch, SvsOrchCallbacks, SvsOrchConfig, SvsOrchError, SvsOrchStats,
};
pub use prefix_table::PrefixTable;
pub use registry::{RegistryError, RouteUpdate, SvsTable, SvsTableRegistry};
pub use snapshot::SnapshotPublisher;
pub use types::*;
