//! The "just turned off" guard.
//!
//! Some lights report a brief `on` while fading out after a turn_off, and some
//! integrations turn a light back on right after it was switched off. Before
//! adapting a light that went off → on, the guard decides whether the `on`
//! is real.

use std::time::Duration;

use super::Manager;
use crate::adapt::{Context, LightHost};
use crate::common::utils::transition_duration;

/// Timing of the guard's re-checks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuardPolicy {
    /// Wait used when the turn_off carried no transition, and between re-checks
    pub turn_off_delay: Duration,
    pub retries: u32,
}

struct Snapshot {
    on_to_off: Context,
    off_to_on: Context,
    turn_off_transition: Option<f64>,
    caused_by_turn_on: bool,
    generation: u64,
    notify: std::sync::Arc<tokio::sync::Notify>,
}

impl Manager {
    /// Whether the last off → on of `light` should be ignored.
    ///
    /// Returns `true` to suppress adaptation.
    pub async fn just_turned_off(
        &self,
        light: &str,
        host: &dyn LightHost,
        policy: GuardPolicy,
    ) -> bool {
        let lock = self.store.with(light, |r| r.guard_lock.clone());
        let _guard = lock.lock().await;

        let Some(snapshot) = self.guard_snapshot(light) else {
            return false;
        };

        if snapshot.on_to_off.id == snapshot.off_to_on.id {
            log_debug!("{light}: off → on shares the context of the previous on → off");
            return true;
        }
        if snapshot.caused_by_turn_on {
            return false;
        }

        let mut delay = match snapshot.turn_off_transition {
            Some(transition) => transition_duration(transition),
            None => policy.turn_off_delay,
        };

        for attempt in 1..=policy.retries {
            let notified = snapshot.notify.notified();
            tokio::select! {
                _ = notified => {
                    log_debug!("{light}: turned on explicitly while waiting");
                    return false;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            if self.turn_on_generation(light) != snapshot.generation {
                return false;
            }
            if let Err(e) = host.refresh_state(light).await {
                log_warning!("{light}: could not refresh state: {e}");
            }
            let is_on = host.light_state(light).await.is_some_and(|s| s.on);
            if !is_on {
                log_debug!("{light}: off again after {attempt} check(s), ignoring the off → on");
                return true;
            }
            delay = policy.turn_off_delay;
        }

        snapshot.turn_off_transition.is_some()
    }

    fn guard_snapshot(&self, light: &str) -> Option<Snapshot> {
        self.store.with(light, |r| {
            let on_to_off = r.on_to_off.as_ref()?.context.clone();
            let off_to_on = r.off_to_on.as_ref()?.context.clone();

            let turn_off_transition = r
                .turn_off
                .as_ref()
                .filter(|call| on_to_off.matches(&call.context.id))
                .and_then(|call| call.data.transition)
                .filter(|t| *t > 0.0);

            let caused_by_turn_on = [r.turn_on.as_ref(), r.toggle.as_ref()]
                .into_iter()
                .flatten()
                .any(|call| off_to_on.matches(&call.context.id));

            Some(Snapshot {
                on_to_off,
                off_to_on,
                turn_off_transition,
                caused_by_turn_on,
                generation: r.turn_on_generation,
                notify: r.turn_on_notify.clone(),
            })
        })
    }

    fn turn_on_generation(&self, light: &str) -> u64 {
        self.store
            .peek(light, |r| r.map(|r| r.turn_on_generation).unwrap_or_default())
    }
}
