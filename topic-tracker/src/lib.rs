//! Unresolved-topic tracking.
//!
//! The pipeline for one request runs cutoff → candidates → reconcile →
//! blocked-post scan → privilege filter → partition, driven by
//! [`UnresolvedTracker`]. Explicit resolve marks live in [`resolution`].

pub mod candidates;
pub mod cutoff;
pub mod hooks;
pub mod notify;
pub mod partition;
pub mod reconcile;
pub mod resolution;
pub mod scanner;
pub mod tracker;

pub use candidates::{collect_candidates, Candidates, CategoryTidsPayload};
pub use cutoff::{compute_cutoff, resolve_cutoff, CutoffPayload};
pub use hooks::HookBus;
pub use notify::{ChannelNotifier, CountNotifier, CountPush, NoopNotifier, EVENT_UNRESOLVED_UPDATE_COUNT};
pub use partition::{partition, PartitionInput};
pub use reconcile::{reconcile, ReconcileOutcome};
pub use resolution::ResolutionStore;
pub use scanner::BlockedPostScanner;
pub use tracker::{Clock, UnresolvedTidsPayload, UnresolvedTracker};
