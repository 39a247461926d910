// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pcguard-engine: the in-memory Decision Engine and sharded cache
//! (§4.5), the Rule Synchronizer (§4.6), and the Enforcement Engine
//! composition root tying every subsystem together (§4.8).

pub mod cache;
pub mod decision;
pub mod enforcement;
pub mod error;
pub mod sync;

pub use decision::DecisionEngine;
pub use enforcement::{EngineState, EnforcementEngine};
pub use error::EngineError;
pub use sync::{RuleSynchronizer, SyncReport};
