//! Synchronous publish/subscribe fan-out with a bounded history.

use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, RwLock};

use chrono::Utc;
use kernel_core::{DEFAULT_EMITTER, DEFAULT_OWNER, DeliveryFailure, EventRecord, SubscriptionId};
use serde_json::Value;

use crate::config::{BusConfig, ConfigError};
use crate::sync;

/// Result type for subscriber callbacks.
pub type HandlerResult = Result<(), String>;

/// Callback invoked with the payload and the event name.
type Handler = Arc<dyn Fn(&Value, &str) -> HandlerResult + Send + Sync>;

struct Subscription {
    id: SubscriptionId,
    owner: String,
    handler: Handler,
}

#[derive(Default)]
struct BusState {
    subscriptions: HashMap<String, Vec<Subscription>>,
    history: VecDeque<EventRecord>,
}

/// Decoupled fan-out between agents.
///
/// Delivery runs on the publisher's thread, in subscription order. A handler
/// that returns an error or panics is logged and recorded on the event's
/// history entry; the remaining handlers still run and the publisher never
/// sees the failure. Handlers are invoked outside the bus lock, so they may
/// publish or subscribe themselves.
pub struct EventBus {
    config: BusConfig,
    state: RwLock<BusState>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = sync::read(&self.state);
        f.debug_struct("EventBus")
            .field("config", &self.config)
            .field("topics", &state.subscriptions.len())
            .field("history", &state.history.len())
            .finish()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self {
            config: BusConfig::default(),
            state: RwLock::new(BusState::default()),
        }
    }
}

impl EventBus {
    pub fn new(config: BusConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            state: RwLock::new(BusState::default()),
        })
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Register a handler for `event_name`. `owner` defaults to `"anon"`.
    pub fn subscribe<F>(
        &self,
        event_name: impl Into<String>,
        handler: F,
        owner: Option<&str>,
    ) -> SubscriptionId
    where
        F: Fn(&Value, &str) -> HandlerResult + Send + Sync + 'static,
    {
        let event_name = event_name.into();
        let subscription = Subscription {
            id: SubscriptionId::new(),
            owner: owner.unwrap_or(DEFAULT_OWNER).to_string(),
            handler: Arc::new(handler),
        };
        let id = subscription.id;
        tracing::debug!(
            "Subscribed {} to '{}' ({})",
            subscription.owner,
            event_name,
            id
        );
        sync::write(&self.state)
            .subscriptions
            .entry(event_name)
            .or_default()
            .push(subscription);
        id
    }

    /// Remove a subscription. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, event_name: &str, subscription_id: SubscriptionId) -> bool {
        let mut state = sync::write(&self.state);
        let Some(subs) = state.subscriptions.get_mut(event_name) else {
            return false;
        };
        let before = subs.len();
        subs.retain(|s| s.id != subscription_id);
        let removed = subs.len() != before;
        if subs.is_empty() {
            state.subscriptions.remove(event_name);
        }
        removed
    }

    /// Deliver `payload` to every current subscriber of `event_name` and
    /// append a history record. Returns the number of successful deliveries.
    pub fn publish(&self, event_name: &str, payload: Value, emitter: Option<&str>) -> usize {
        let targets: Vec<(SubscriptionId, String, Handler)> = sync::read(&self.state)
            .subscriptions
            .get(event_name)
            .map(|subs| {
                subs.iter()
                    .map(|s| (s.id, s.owner.clone(), Arc::clone(&s.handler)))
                    .collect()
            })
            .unwrap_or_default();

        let mut delivered_count = 0;
        let mut failures = Vec::new();
        for (subscription_id, owner, handler) in targets {
            let outcome = catch_unwind(AssertUnwindSafe(|| handler(&payload, event_name)))
                .unwrap_or_else(|panic| Err(panic_message(panic.as_ref())));
            match outcome {
                Ok(()) => delivered_count += 1,
                Err(error) => {
                    tracing::warn!("EventBus handler error [{} -> {}]: {}", event_name, owner, error);
                    failures.push(DeliveryFailure {
                        subscription_id,
                        owner,
                        error,
                    });
                }
            }
        }

        let record = EventRecord {
            event_name: event_name.to_string(),
            payload,
            emitter: emitter.unwrap_or(DEFAULT_EMITTER).to_string(),
            timestamp: Utc::now(),
            delivered_count,
            failures,
        };

        let mut state = sync::write(&self.state);
        state.history.push_back(record);
        while state.history.len() > self.config.history_capacity {
            state.history.pop_front();
        }

        delivered_count
    }

    /// Owner tags of the current subscribers, in subscription order.
    pub fn list_subscribers(&self, event_name: &str) -> Vec<String> {
        sync::read(&self.state)
            .subscriptions
            .get(event_name)
            .map(|subs| subs.iter().map(|s| s.owner.clone()).collect())
            .unwrap_or_default()
    }

    pub fn subscriber_count(&self, event_name: &str) -> usize {
        sync::read(&self.state)
            .subscriptions
            .get(event_name)
            .map_or(0, Vec::len)
    }

    /// The most recent `n` records, newest last.
    ///
    /// `None` and `Some(0)` both mean the configured default window.
    pub fn history(&self, n: Option<usize>) -> Vec<EventRecord> {
        let n = n
            .filter(|&n| n > 0)
            .unwrap_or(self.config.default_history_window);
        let state = sync::read(&self.state);
        let skip = state.history.len().saturating_sub(n);
        state.history.iter().skip(skip).cloned().collect()
    }

    pub fn history_len(&self) -> usize {
        sync::read(&self.state).history.len()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        format!("handler panicked: {msg}")
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("handler panicked: {msg}")
    } else {
        "handler panicked".to_string()
    }
}
