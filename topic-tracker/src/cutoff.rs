use crate::hooks::{HookBus, FILTER_UNRESOLVED_CUTOFF};
use resolved_core::{CoreResult, Cutoff, Timestamp, UserId, DAY_MS};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CutoffPayload {
    pub uid: UserId,
    pub cutoff: Cutoff,
}

/// `now - days`, or no horizon when no day count is configured.
pub fn compute_cutoff(now: Timestamp, days: Option<u32>) -> Cutoff {
    match days {
        Some(days) => Cutoff(now.saturating_sub(i64::from(days) * DAY_MS)),
        None => Cutoff::NONE,
    }
}

/// Computes the cutoff for `uid` and lets `filter:topics.unresolvedCutoff`
/// override it.
pub fn resolve_cutoff(
    hooks: &HookBus,
    uid: UserId,
    now: Timestamp,
    days: Option<u32>,
) -> CoreResult<Cutoff> {
    let computed = compute_cutoff(now, days);
    let payload = hooks.fire_filter(
        FILTER_UNRESOLVED_CUTOFF,
        CutoffPayload {
            uid,
            cutoff: computed,
        },
    )?;
    if payload.cutoff != computed {
        debug!(
            "Cutoff for uid {} overridden: {} -> {}",
            uid,
            computed.timestamp(),
            payload.cutoff.timestamp()
        );
    }
    Ok(payload.cutoff)
}
