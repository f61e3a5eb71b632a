//! switchyard-core - domain types for the switchyard control plane.
//!
//! Pure data structures and transport-agnostic domain logic. All other
//! crates depend on this one; this crate depends on nothing web-shaped.

mod clock;
mod compliance;
mod entities;
mod enums;
mod error;
mod identity;

pub use clock::*;
pub use compliance::{apply as apply_compliance_event, JOURNAL_WARN_THRESHOLD};
pub use entities::*;
pub use enums::*;
pub use error::*;
pub use identity::*;
