//! Event routing from the host to the switches.
//!
//! The host pushes [`Event`]s into a bounded queue. The dispatcher records
//! each event with the manager once, then hands it to the switch owning the
//! light. Anything that may wait (the off → on guard, the adapt delay, a
//! refresh before a periodic update) runs in its own task so the queue keeps
//! draining.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::Switch;
use crate::adapt::{Event, StateChangedEvent};
use crate::common::constants::EVENT_QUEUE_CAPACITY;
use crate::manager::{Manager, StateTransition};

/// Bounded event queue shared by the host, the tickers and the manager.
pub fn channel() -> (mpsc::Sender<Event>, mpsc::Receiver<Event>) {
    mpsc::channel(EVENT_QUEUE_CAPACITY)
}

pub struct Dispatcher {
    switches: Vec<Arc<Switch>>,
    manager: Arc<Manager>,
    events: mpsc::Receiver<Event>,
}

impl Dispatcher {
    pub fn new(
        switches: Vec<Arc<Switch>>,
        manager: Arc<Manager>,
        events: mpsc::Receiver<Event>,
    ) -> Self {
        Self {
            switches,
            manager,
            events,
        }
    }

    /// Process events until the queue closes or `shutdown` fires.
    pub async fn run(mut self, shutdown: CancellationToken) {
        log_debug!("Dispatcher started for {} switch(es)", self.switches.len());
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = self.events.recv() => match event {
                    Some(event) => {
                        self.dispatch(event).await;
                    }
                    None => break,
                },
            }
        }
        log_debug!("Dispatcher stopped");
    }

    fn owner(&self, light: &str) -> Option<Arc<Switch>> {
        self.switches.iter().find(|s| s.owns(light)).cloned()
    }

    fn switch(&self, name: &str) -> Option<Arc<Switch>> {
        self.switches.iter().find(|s| s.name() == name).cloned()
    }

    /// Route one event.
    ///
    /// Returns the spawned follow-up work, if any, so callers can wait for it.
    pub async fn dispatch(&self, event: Event) -> Option<JoinHandle<()>> {
        match event {
            Event::ServiceCall(call) => {
                self.manager.record_service_call(&call);
                let mut seen: Vec<Arc<Switch>> = Vec::new();
                for light in &call.data.entity_id {
                    if let Some(switch) = self.owner(light)
                        && !seen.iter().any(|s| Arc::ptr_eq(s, &switch))
                    {
                        seen.push(switch);
                    }
                }
                for switch in seen {
                    switch.handle_service_call(&call).await;
                }
                None
            }
            Event::StateChanged(change) => self.state_changed(change),
            Event::Tick { switch } => {
                let Some(switch) = self.switch(&switch) else {
                    log_warning!("Tick for unknown switch '{switch}'");
                    return None;
                };
                Some(tokio::spawn(async move {
                    switch.tick().await;
                }))
            }
            Event::AutoReset { light } => {
                let switch = self.owner(&light)?;
                Some(tokio::spawn(async move {
                    if let Err(e) = switch.handle_autoreset(&light).await {
                        log_warning!("{light}: adaptation after auto-reset failed: {e}");
                    }
                }))
            }
        }
    }

    fn state_changed(&self, change: StateChangedEvent) -> Option<JoinHandle<()>> {
        let transition = self.manager.on_state_changed(&change);
        if transition != StateTransition::OffToOn {
            return None;
        }
        let switch = self.owner(&change.entity_id)?;
        Some(tokio::spawn(async move {
            let light = change.entity_id;
            if let Err(e) = switch.handle_turned_on(&light, &change.context).await {
                log_warning!("{light}: adaptation after turning on failed: {e}");
            }
        }))
    }
}

/// Send a [`Event::Tick`] for `switch` every `interval`.
///
/// The first tick fires one interval after the start.
pub fn spawn_ticker(
    switch: &Switch,
    interval: Duration,
    sender: mpsc::Sender<Event>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    let name = switch.name().to_string();
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + interval;
        let mut ticker = tokio::time::interval_at(start, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let tick = Event::Tick { switch: name.clone() };
                    if sender.send(tick).await.is_err() {
                        break;
                    }
                }
            }
        }
    })
}
