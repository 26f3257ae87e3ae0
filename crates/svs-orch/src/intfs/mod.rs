//! IntfsOrch - router interface table.
//!
//! Source selection needs three facts about an interface: whether it exists,
//! whether it may carry traffic, and which table it uses when no SVS binding
//! overrides it. This module owns those facts and exposes them to `SvsOrch`
//! through [`InterfaceRegistry`].

mod orch;
mod types;

pub use orch::{IntfsOrch, IntfsOrchConfig, IntfsOrchError, IntfsOrchStats, InterfaceRegistry};
pub use types::IntfsEntry;
