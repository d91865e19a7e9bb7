//! # pcodeopt Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the pcodeopt library. Import this module to build functions, configure an engine
//! and run it.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all pcodeopt operations
pub use crate::Error;

/// The result type used throughout pcodeopt
pub use crate::Result;

// ================================================================================================
// Engine
// ================================================================================================

/// The multi-function driver and its configuration
pub use crate::engine::{Decompilation, Engine, EngineConfig, RunSummary};

/// Action and rule contracts
pub use crate::engine::{Action, ActionFlags, ActionStatus, Outcome, Rule};

/// Action tree construction and configuration
pub use crate::engine::{ActionDatabase, ActionGroupList, OptionDatabase};

/// Per-function run state and its event log
pub use crate::engine::{EngineContext, EventKind, EventLog};

// ================================================================================================
// Intermediate Representation
// ================================================================================================

/// Functions and their construction
pub use crate::ir::{Architecture, Funcdata, FunctionBuilder, SegmentDef};

/// Addresses and storage
pub use crate::ir::{AddrSpace, Address};

/// Graph handles and elements
pub use crate::ir::{BlockId, OpCode, OpId, PcodeOp, Varnode, VarnodeId};
