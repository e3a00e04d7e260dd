//! Cancellable adaptation units.
//!
//! One unit sends the commands of one [`AdaptationData`] in order. Each light
//! has a brightness slot and a color slot; a unit touching both sits in both.
//! Starting a unit cancels whatever overlaps it and waits for that unit to
//! stop before sending anything.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::state::Store;
use crate::adapt::{AdaptationData, LightHost, ServiceData, Which};
use crate::common::utils::transition_duration;

#[derive(Debug)]
pub struct TaskHandle {
    id: u64,
    light: String,
    which: Which,
    cancel: CancellationToken,
    done: CancellationToken,
}

impl TaskHandle {
    pub fn new(id: u64, light: impl Into<String>, which: Which) -> Self {
        Self {
            id,
            light: light.into(),
            which,
            cancel: CancellationToken::new(),
            done: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.done.is_cancelled()
    }

    pub async fn finished(&self) {
        self.done.cancelled().await;
    }
}

/// Caller-side handle to a running adaptation.
#[derive(Debug, Clone)]
pub struct AdaptationHandle {
    task: Arc<TaskHandle>,
}

impl AdaptationHandle {
    pub(crate) fn new(task: Arc<TaskHandle>) -> Self {
        Self { task }
    }

    pub fn light(&self) -> &str {
        &self.task.light
    }

    pub fn which(&self) -> Which {
        self.task.which
    }

    pub fn cancel(&self) {
        self.task.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.task.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait until the unit has stopped, whether completed or cancelled.
    pub async fn wait(&self) {
        self.task.finished().await;
    }
}

/// Send the commands of `data`, stopping as soon as the unit is cancelled.
pub(crate) async fn run_adaptation(
    store: Arc<Store>,
    host: Arc<dyn LightHost>,
    mut data: AdaptationData,
    task: Arc<TaskHandle>,
) {
    let _done = task.done.clone().drop_guard();
    let token = task.cancel.clone();
    let light = data.entity_id.clone();
    let mut sent = 0usize;

    while data.has_pending() {
        if (sent > 0 || data.initial_sleep) && !data.sleep_time.is_zero() {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(data.sleep_time) => {}
            }
        }
        if token.is_cancelled() {
            break;
        }

        let next = tokio::select! {
            _ = token.cancelled() => break,
            next = data.next_service_call_data(host.as_ref()) => next,
        };
        let Some(service_data) = next else {
            break;
        };
        if token.is_cancelled() {
            break;
        }

        record_dispatch(&store, &light, &service_data);
        log_debug!(
            "{light}: sending {}/{} {}",
            sent + 1,
            data.max_length,
            service_data.to_json()
        );
        if let Err(e) = host.turn_on(service_data, data.context.clone()).await {
            log_warning!("{light}: adaptation command failed: {e}");
            break;
        }
        sent += 1;
    }

    if token.is_cancelled() {
        log_debug!("{light}: {} adaptation cancelled", task.which.as_str());
    }
    store.with(&light, |record| record.release(task.id));
}

/// Remember what was sent and start the transition timer.
fn record_dispatch(store: &Store, light: &str, data: &ServiceData) {
    store.with(light, |record| {
        match record.last_service_data.as_mut() {
            Some(last) => last.overlay(data),
            None => record.last_service_data = Some(data.clone()),
        }
        if let Some(transition) = data.transition.filter(|t| *t > 0.0) {
            let until = tokio::time::Instant::now() + transition_duration(transition);
            record.transition_until = Some(until);
            record.transition_history.clear();
        }
    });
}
