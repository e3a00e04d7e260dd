//! Auto-reset and transition timers.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::Manager;
use crate::adapt::{Event, StateChangedEvent};

impl Manager {
    /// (Re)start the auto-reset timer of `light`.
    ///
    /// On expiry the manual flag is cleared and an [`Event::AutoReset`] notice
    /// is sent so the owning switch adapts the light again.
    pub(super) fn start_autoreset(&self, light: &str, after: Duration) {
        let token = CancellationToken::new();
        self.store.with(light, |r| {
            if let Some(previous) = r.autoreset.replace(token.clone()) {
                previous.cancel();
            }
        });

        let store = self.store.clone();
        let notices = self.notices.clone();
        let light = light.to_string();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(after) => {}
            }
            let expired = store.with(&light, |r| {
                if token.is_cancelled() {
                    return false;
                }
                r.manual = false;
                r.autoreset = None;
                true
            });
            if !expired {
                return;
            }
            log_info!(
                "{light}: manual control reset after {}s",
                after.as_secs_f64()
            );
            if let Some(notices) = notices
                && notices.send(Event::AutoReset { light }).await.is_err()
            {
                log_debug!("Auto-reset notice dropped, dispatcher is gone");
            }
        });
    }

    /// Whether `light` has an auto-reset timer pending.
    pub fn has_autoreset(&self, light: &str) -> bool {
        self.store.peek(light, |r| {
            r.and_then(|r| r.autoreset.as_ref())
                .is_some_and(|t| !t.is_cancelled())
        })
    }

    /// Start (or extend) the transition timer of `light`.
    pub fn start_transition_timer(&self, light: &str, duration: Duration) {
        let until = tokio::time::Instant::now() + duration;
        self.store.with(light, |r| {
            r.transition_until = Some(r.transition_until.map_or(until, |u| u.max(until)));
        });
    }

    pub fn is_transition_running(&self, light: &str) -> bool {
        self.store
            .peek(light, |r| r.is_some_and(|r| r.transition_running()))
    }

    /// Self-caused on → on changes seen during the current transition.
    pub fn transition_history(&self, light: &str) -> Vec<StateChangedEvent> {
        self.store.peek(light, |r| {
            r.map(|r| r.transition_history.clone()).unwrap_or_default()
        })
    }
}
