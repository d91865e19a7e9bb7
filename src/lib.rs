// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # pcodeopt
//!
//! A rule-driven rewriting engine for p-code, the SSA-form intermediate representation used
//! by decompilers. Given a function in raw p-code, `pcodeopt` repeatedly applies small
//! semantics-preserving rewrites until nothing changes, leaving an equivalent but simpler
//! function behind.
//!
//! ## Features
//!
//! - **Opcode-dispatched rules** - each [`engine::Rule`] declares the opcodes it cares about;
//!   a pool only tests an op against interested rules
//! - **Composable actions** - leaves, ordered groups and a bounded restart group form the
//!   analysis tree, each with repeat, completion and breakpoint semantics
//! - **Profiles** - named group lists derive reduced trees (`decompile`, `jumptable`,
//!   `normalize`, ...) from one universal tree
//! - **Textual configuration** - `togglerule`, `warning`, `maxrestarts` and friends via the
//!   [`engine::OptionDatabase`] protocol
//! - **Parallel batches** - functions are independent; [`engine::Engine::decompile_all`]
//!   runs one per rayon task
//! - **Structured events** - every rewrite, restart and warning is recorded in a queryable
//!   [`engine::EventLog`]
//!
//! ## Quick Start
//!
//! ```rust
//! use pcodeopt::prelude::*;
//!
//! # fn main() -> pcodeopt::Result<()> {
//! // r = (v << 3) << 5
//! let mut b = FunctionBuilder::new("shifts", Address::ram(0x1000));
//! let v = b.input(4, Address::register(0));
//! let three = b.constant(4, 3);
//! let inner = b.op(OpCode::IntLeft, &[v, three], 4)?;
//! let five = b.constant(4, 5);
//! let r = b.op(OpCode::IntLeft, &[inner, five], 4)?;
//! b.op_void(OpCode::Return, &[r])?;
//! let mut data = b.finish();
//!
//! let engine = Engine::new(EngineConfig::checked())?;
//! let summary = engine.decompile(&mut data)?;
//! assert!(summary.changes > 0);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`ir`] - The function graph: varnodes, ops, blocks, call sites and their edit primitives
//! - [`engine`] - Rules, actions, the action database, options and the engine driver
//! - [`rules`] - The concrete peephole rules
//! - [`actions`] - Function-wide analyses: dead code, non-zero masks, CSE, indirect calls
//! - [`utils`] - Bit arithmetic on sized values
//!
//! ## Error Handling
//!
//! A rule whose pattern does not apply is not an error. [`Error`] is reserved for broken
//! structural invariants and configuration mistakes:
//!
//! ```rust
//! use pcodeopt::{engine::{Engine, EngineConfig}, Error};
//!
//! match Engine::new(EngineConfig::default().with_action("nosuchprofile")) {
//!     Err(Error::UnknownAction(name)) => println!("unknown profile {}", name),
//!     Err(e) => println!("other error: {}", e),
//!     Ok(_) => println!("ready"),
//! }
//! ```
//!
//! ### Testing
//!
//! ```bash
//! cargo test
//! cargo bench  # rewrite throughput
//! ```
#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use pcodeopt::prelude::*;
///
/// let engine = Engine::new(EngineConfig::default())?;
/// assert_eq!(engine.root().name(), "universal");
/// # Ok::<(), pcodeopt::Error>(())
/// ```
pub mod prelude;

/// The p-code function graph.
///
/// Varnodes, ops and blocks live in arenas owned by a [`ir::Funcdata`] and are referred to
/// by copyable handles. All edits go through `Funcdata` primitives that keep the def-use
/// links consistent.
///
/// # Key Types
///
/// - [`ir::Funcdata`] - One function: arenas, blocks, call sites, lifecycle flags
/// - [`ir::Varnode`] / [`ir::PcodeOp`] - Values and operations
/// - [`ir::OpCode`] - The opcode set and its static properties
/// - [`ir::FunctionBuilder`] - Fluent construction of raw functions
/// - [`ir::Architecture`] - Shared, read-only processor data
pub mod ir;

/// The rewrite engine: rule and action contracts, the action database, the option protocol
/// and the multi-function driver.
pub mod engine;

/// Concrete peephole rules, grouped by the kind of operation they simplify.
pub mod rules;

/// Concrete actions whose logic spans the whole function.
pub mod actions;

/// Bit arithmetic helpers.
pub mod utils;

/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
/// This is used consistently throughout the crate for all fallible operations.
///
/// # Examples
///
/// ```rust
/// use pcodeopt::{ir::Funcdata, Result};
///
/// fn check(data: &Funcdata) -> Result<()> {
///     data.verify()
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `pcodeopt` Error type
///
/// The main error type for all operations in this crate: structural invariant violations
/// raised while rewriting, and configuration errors from the option protocol.
pub use error::Error;
