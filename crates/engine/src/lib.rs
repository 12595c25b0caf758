//! # Concord Engine
//!
//! A small reactive rule engine. Each external request seeds an
//! [`InvocationLog`](concord_core::InvocationLog); [`Synchronization`]s
//! watch that log and react:
//!
//! - **when**: patterns are unified against the log, producing [`Frames`]
//!   by successive equi-joins on shared variables;
//! - **where**: an optional async extender drops or widens frames through
//!   concept queries;
//! - **then**: each surviving frame is dispatched to concept actions, whose
//!   results are appended to the log.
//!
//! [`SyncEngine`] repeats this in barrier-separated rounds until no sync
//! produces a new record.

pub mod dispatch;
pub mod engine;
pub mod error;
pub mod frame;
pub mod matcher;
pub mod pattern;
pub mod registry;
pub mod sync;

#[cfg(test)]
mod test_support;

pub use engine::{CancelFlag, EngineLimits, Resolution, Seed, SyncEngine};
pub use error::{
    DispatchError, EngineError, ExtendError, FrameError, RegistryError, ResponseError, SyncError,
};
pub use frame::{Frame, Frames, QueryContext};
pub use pattern::{Pattern, Term, Var};
pub use registry::{SyncRegistry, SyncSummary};
pub use sync::{Extender, SyncBuilder, Synchronization};
