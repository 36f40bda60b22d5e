//! Plugin hook bus.
//!
//! Handlers are registered per hook name and run synchronously in
//! registration order. Filter handlers receive the accumulated payload and
//! return the next one; action handlers only observe it.

use resolved_core::HookError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

pub const FILTER_UNRESOLVED_CUTOFF: &str = "filter:topics.unresolvedCutoff";
pub const FILTER_CATEGORY_TIDS: &str = "filter:topics.unresolved.getCategoryTids";
pub const FILTER_GET_UNRESOLVED_TIDS: &str = "filter:topics.getUnresolvedTids";
pub const ACTION_MARK_AS_RESOLVED: &str = "action:topics.markAsResolved";
pub const ACTION_MARK_AS_UNRESOLVED: &str = "action:topics.markAsUnresolved";

pub type FilterHandler = Arc<dyn Fn(Value) -> Result<Value, HookError> + Send + Sync>;
pub type ActionHandler = Arc<dyn Fn(&Value) + Send + Sync>;

#[derive(Default)]
pub struct HookBus {
    filters: RwLock<HashMap<String, Vec<FilterHandler>>>,
    actions: RwLock<HashMap<String, Vec<ActionHandler>>>,
}

impl HookBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_filter<H>(&self, hook: &str, handler: H)
    where
        H: Fn(Value) -> Result<Value, HookError> + Send + Sync + 'static,
    {
        let mut filters = self.filters.write().unwrap_or_else(PoisonError::into_inner);
        filters
            .entry(hook.to_string())
            .or_default()
            .push(Arc::new(handler));
        debug!("Registered filter handler for {}", hook);
    }

    pub fn register_action<H>(&self, hook: &str, handler: H)
    where
        H: Fn(&Value) + Send + Sync + 'static,
    {
        let mut actions = self.actions.write().unwrap_or_else(PoisonError::into_inner);
        actions
            .entry(hook.to_string())
            .or_default()
            .push(Arc::new(handler));
        debug!("Registered action handler for {}", hook);
    }

    pub fn has_listeners(&self, hook: &str) -> bool {
        let filters = self.filters.read().unwrap_or_else(PoisonError::into_inner);
        let actions = self.actions.read().unwrap_or_else(PoisonError::into_inner);
        filters.get(hook).map_or(false, |h| !h.is_empty())
            || actions.get(hook).map_or(false, |h| !h.is_empty())
    }

    /// Threads `payload` through every filter handler of `hook`. With no
    /// handlers the payload comes back untouched.
    pub fn fire_filter<T>(&self, hook: &str, payload: T) -> Result<T, HookError>
    where
        T: Serialize + DeserializeOwned,
    {
        // Cloned out so handlers may register further hooks.
        let handlers = {
            let filters = self.filters.read().unwrap_or_else(PoisonError::into_inner);
            filters.get(hook).cloned().unwrap_or_default()
        };
        if handlers.is_empty() {
            return Ok(payload);
        }

        let mut value = serde_json::to_value(payload).map_err(|source| HookError::Payload {
            hook: hook.to_string(),
            source,
        })?;
        for handler in &handlers {
            value = handler(value)?;
        }
        serde_json::from_value(value).map_err(|source| HookError::Payload {
            hook: hook.to_string(),
            source,
        })
    }

    pub fn fire_action<T: Serialize>(&self, hook: &str, payload: &T) {
        let handlers = {
            let actions = self.actions.read().unwrap_or_else(PoisonError::into_inner);
            actions.get(hook).cloned().unwrap_or_default()
        };
        if handlers.is_empty() {
            return;
        }

        match serde_json::to_value(payload) {
            Ok(value) => {
                for handler in &handlers {
                    handler(&value);
                }
            }
            Err(e) => warn!("Dropping {} action, payload not serializable: {}", hook, e),
        }
    }
}

impl std::fmt::Debug for HookBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let filters = self.filters.read().unwrap_or_else(PoisonError::into_inner);
        let actions = self.actions.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("HookBus")
            .field("filters", &filters.keys().collect::<Vec<_>>())
            .field("actions", &actions.keys().collect::<Vec<_>>())
            .finish()
    }
}
