//! Concrete actions with bespoke, function-wide logic.
//!
//! Rules only ever see one op at a time. The actions here need the whole function: liveness
//! for dead code, a fixpoint for non-zero masks, block-level comparison for `MULTIEQUAL`
//! CSE, and call-site descriptors for indirect call resolution. The lifecycle actions bracket
//! a run.
//!
//! # Key Components
//!
//! - [`ActionStart`] / [`ActionStop`] / [`ActionStartCleanUp`] - processing phases
//! - [`ActionDeadCode`] - removes ops whose results are never observed
//! - [`ActionNonzeroMask`] - computes the bits each varnode may have set
//! - [`ActionMultiCse`] - merges duplicate `MULTIEQUAL`s
//! - [`ActionDeindirect`] - resolves indirect calls and requests a restart

mod deadcode;
mod deindirect;
mod lifecycle;
mod multicse;
mod nzmask;

pub use deadcode::ActionDeadCode;
pub use deindirect::ActionDeindirect;
pub use lifecycle::{ActionStart, ActionStartCleanUp, ActionStop};
pub use multicse::ActionMultiCse;
pub use nzmask::{op_nz_mask, ActionNonzeroMask};
