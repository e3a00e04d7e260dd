//! Manual-control tracking and adaptation arbitration.
//!
//! One [`Manager`] is shared by every switch. For each light it remembers the
//! latest service calls and state transitions, whether the light is manually
//! controlled, what we last sent, and which adaptation units are in flight.
//!
//! ## Module Structure
//!
//! - [`state`]: per-light records behind a single lock
//! - [`tasks`]: cancellable adaptation units and their handles
//! - [`guard`]: the "just turned off" guard for off → on events
//! - [`significant`]: detection of changes made outside the host
//! - [`timers`]: auto-reset and transition timers

pub mod guard;
pub mod significant;
pub mod state;
pub mod tasks;
pub mod timers;

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::adapt::{
    AdaptationData, Event, LightHost, LightService, ServiceCallEvent, ServiceData,
    StateChangedEvent,
};
pub use guard::GuardPolicy;
pub use state::RecordedCall;
use state::Store;
pub use tasks::AdaptationHandle;
use tasks::TaskHandle;

/// What a state change meant for a light.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateTransition {
    OffToOn,
    OnToOff,
    OnToOn,
    Other,
}

/// Switch settings consulted when a foreign call might take over a light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TakeoverPolicy {
    pub take_over_control: bool,
    pub adapt_brightness: bool,
    pub adapt_color: bool,
    pub autoreset: Option<Duration>,
}

pub struct Manager {
    store: Arc<Store>,
    notices: Option<mpsc::Sender<Event>>,
    task_ids: AtomicU64,
}

impl Manager {
    /// `notices` receives [`Event::AutoReset`] when a manual flag expires.
    pub fn new(notices: Option<mpsc::Sender<Event>>) -> Self {
        Self {
            store: Arc::new(Store::default()),
            notices,
            task_ids: AtomicU64::new(1),
        }
    }

    pub fn is_manually_controlled(&self, light: &str) -> bool {
        self.store.peek(light, |r| r.is_some_and(|r| r.manual))
    }

    /// Mark `light` as manually controlled and (re)start its auto-reset timer.
    pub fn mark_manual(&self, light: &str, autoreset: Option<Duration>) {
        let was_manual = self.store.with(light, |r| std::mem::replace(&mut r.manual, true));
        if !was_manual {
            log_info!("{light}: manually controlled");
        }
        match autoreset {
            Some(after) => self.start_autoreset(light, after),
            None => self.store.with(light, |r| r.cancel_autoreset()),
        }
    }

    /// Back to automatic control; forgets what was sent and cancels timers.
    pub fn reset(&self, light: &str) {
        self.store.with(light, |r| {
            if r.manual {
                log_debug!("{light}: manual control cleared");
            }
            r.manual = false;
            r.cancel_autoreset();
            r.last_service_data = None;
            r.transition_history.clear();
            r.transition_until = None;
        });
    }

    pub fn last_service_data(&self, light: &str) -> Option<ServiceData> {
        self.store
            .peek(light, |r| r.and_then(|r| r.last_service_data.clone()))
    }

    pub fn last_call(&self, light: &str, service: LightService) -> Option<RecordedCall> {
        self.store.peek(light, |r| {
            r.and_then(|r| match service {
                LightService::TurnOn => r.turn_on.clone(),
                LightService::TurnOff => r.turn_off.clone(),
                LightService::Toggle => r.toggle.clone(),
            })
        })
    }

    /// Remember a light service call for each light it targets.
    ///
    /// turn_on/toggle wake any guard waiting on those lights; turn_off
    /// cancels their in-flight adaptations.
    pub fn record_service_call(&self, call: &ServiceCallEvent) {
        for light in &call.data.entity_id {
            let recorded = RecordedCall {
                service: call.service,
                data: call.data.clone(),
                context: call.context.clone(),
            };
            let cancelled = self.store.with(light, |r| match call.service {
                LightService::TurnOn | LightService::Toggle => {
                    if call.service == LightService::TurnOn {
                        r.turn_on = Some(recorded);
                    } else {
                        r.toggle = Some(recorded);
                    }
                    r.turn_on_generation += 1;
                    r.turn_on_notify.notify_waiters();
                    Vec::new()
                }
                LightService::TurnOff => {
                    r.turn_off = Some(recorded);
                    r.cancel_adapt_delay();
                    r.take_all_tasks()
                }
            });
            for task in cancelled {
                task.cancel();
            }
        }
    }

    /// Decide whether a foreign turn_on/toggle takes over `light`.
    ///
    /// Returns `true` when the light was newly marked as manually controlled.
    pub fn evaluate_takeover(
        &self,
        light: &str,
        call: &ServiceCallEvent,
        was_on: bool,
        policy: &TakeoverPolicy,
    ) -> bool {
        if call.service == LightService::TurnOff
            || call.context.is_ours()
            || self.is_proactive(&call.context.id)
            || !was_on
        {
            return false;
        }

        if self.is_manually_controlled(light) {
            if let Some(after) = policy.autoreset {
                self.start_autoreset(light, after);
            }
            return false;
        }

        let touches_adapted = (policy.adapt_brightness && call.data.has_brightness_attrs())
            || (policy.adapt_color && call.data.has_color_attrs());
        if !policy.take_over_control || !touches_adapted {
            return false;
        }

        self.cancel_adaptation(light);
        self.mark_manual(light, policy.autoreset);
        true
    }

    /// Record a state change and classify it.
    ///
    /// off → on resets manual control; on → off cancels adaptations; a
    /// self-caused on → on during a transition joins the transition history.
    pub fn on_state_changed(&self, event: &StateChangedEvent) -> StateTransition {
        let light = event.entity_id.as_str();
        let (Some(_), Some(_)) = (&event.old_state, &event.new_state) else {
            return StateTransition::Other;
        };

        match (event.was_on(), event.is_on()) {
            (false, true) => {
                self.store
                    .with(light, |r| r.off_to_on = Some(event.clone()));
                self.reset(light);
                StateTransition::OffToOn
            }
            (true, false) => {
                let cancelled = self.store.with(light, |r| {
                    r.on_to_off = Some(event.clone());
                    r.transition_until = None;
                    r.transition_history.clear();
                    r.cancel_adapt_delay();
                    r.take_all_tasks()
                });
                for task in cancelled {
                    task.cancel();
                }
                StateTransition::OnToOff
            }
            (true, true) => {
                if event.context.is_ours() {
                    self.store.with(light, |r| {
                        if r.transition_running() {
                            r.transition_history.push(event.clone());
                        }
                    });
                }
                StateTransition::OnToOn
            }
            (false, false) => StateTransition::Other,
        }
    }

    /// Whether the call that turned `light` on (matching `context_id`) already
    /// carried brightness or color attributes.
    pub fn turned_on_with_attributes(&self, light: &str, context_id: &str) -> bool {
        self.store.peek(light, |r| {
            r.and_then(|r| r.turn_on.as_ref())
                .filter(|call| call.context.id == context_id && !call.context.is_ours())
                .is_some_and(|call| {
                    call.data.has_brightness_attrs() || call.data.has_color_attrs()
                })
        })
    }

    pub fn mark_proactive(&self, context_id: &str) {
        self.store.mark_proactive(context_id);
    }

    pub fn is_proactive(&self, context_id: &str) -> bool {
        self.store.is_proactive(context_id)
    }

    /// Start an adaptation unit for `data.entity_id`.
    ///
    /// Overlapping units of the same light are cancelled and awaited first.
    pub async fn execute_adaptation(
        &self,
        data: AdaptationData,
        host: Arc<dyn LightHost>,
    ) -> AdaptationHandle {
        let light = data.entity_id.clone();
        let which = data.which;
        let id = self.task_ids.fetch_add(1, Ordering::Relaxed);
        let task = Arc::new(TaskHandle::new(id, light.clone(), which));

        loop {
            let overlapping = self.store.with(&light, |r| {
                let overlapping = r.take_overlapping(which);
                if overlapping.is_empty() {
                    r.install(which, task.clone());
                }
                overlapping
            });
            if overlapping.is_empty() {
                break;
            }
            for old in overlapping {
                old.cancel();
                old.finished().await;
            }
        }

        tokio::spawn(tasks::run_adaptation(
            self.store.clone(),
            host,
            data,
            task.clone(),
        ));
        AdaptationHandle::new(task)
    }

    /// Cancel every in-flight adaptation of `light`, including a pending
    /// adapt delay.
    pub fn cancel_adaptation(&self, light: &str) {
        let cancelled = self.store.with(light, |r| {
            r.cancel_adapt_delay();
            r.take_all_tasks()
        });
        for task in cancelled {
            task.cancel();
        }
    }

    /// Start waiting out the adapt delay of `light`.
    ///
    /// The token fires when the light is turned off or taken over, or when a
    /// newer off → on starts its own delay.
    pub fn begin_adapt_delay(&self, light: &str) -> CancellationToken {
        let token = CancellationToken::new();
        self.store.with(light, |r| {
            r.cancel_adapt_delay();
            r.adapt_delay = Some(token.clone());
        });
        token
    }
}
