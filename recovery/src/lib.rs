//! Recovery from stale-deployment chunk load failures.
//!
//! After a deploy, a long-open page may ask for chunks the server no longer
//! has. [`ChunkRecoveryManager`] recognises those failures, retries them with
//! exponential backoff after purging stale static-asset caches, and asks the
//! user to reload once the retries run out. Errors it does not recognise are
//! never retried or suppressed.

pub mod classify;
mod manager;
mod purge;

pub use manager::{ChunkRecoveryManager, HandleOutcome, RetryFired, RetryRecord, backoff_delay};
pub use purge::purge_caches;
