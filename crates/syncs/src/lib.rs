//! # Concord Syncs
//!
//! The application's synchronizations. Each route an HTTP client may call
//! has a request sync that turns `Requesting.request` into a concept call,
//! response syncs that turn the call's success or refusal into exactly one
//! `Requesting.respond`, and, when the route is guarded, sentinel syncs that
//! respond for invalid sessions and documents the caller does not own.
//! Cascades (a profile on registration, a session on login) are ordinary
//! syncs with no request pattern.

pub mod auth;
pub mod common;
pub mod notes;
pub mod profile;
pub mod relationship;

#[cfg(test)]
mod test_support;

use concord_engine::{RegistryError, SyncRegistry};

/// Build the registry of every sync, in evaluation order.
pub fn registry() -> Result<SyncRegistry, RegistryError> {
    let mut syncs = auth::syncs()?;
    syncs.extend(profile::syncs()?);
    syncs.extend(relationship::syncs()?);
    syncs.extend(notes::syncs()?);
    let registry = SyncRegistry::new(syncs)?;
    tracing::debug!(syncs = registry.len(), "Sync registry built");
    Ok(registry)
}
