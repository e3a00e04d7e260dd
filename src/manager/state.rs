//! Per-light bookkeeping owned by the manager.
//!
//! All records live behind one `std::sync::Mutex`. It is only ever held for
//! short synchronous sections; nothing awaits while holding it.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use super::tasks::TaskHandle;
use crate::adapt::{Context, LightService, ServiceData, StateChangedEvent, Which};

/// Number of proactively adapted call contexts remembered.
const PROACTIVE_CONTEXT_CAPACITY: usize = 256;

/// A light service call as remembered for one light.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub service: LightService,
    pub data: ServiceData,
    pub context: Context,
}

#[derive(Debug, Default)]
pub(crate) struct LightRecord {
    pub manual: bool,
    pub turn_on: Option<RecordedCall>,
    pub turn_off: Option<RecordedCall>,
    pub toggle: Option<RecordedCall>,
    pub off_to_on: Option<StateChangedEvent>,
    pub on_to_off: Option<StateChangedEvent>,
    pub transition_history: Vec<StateChangedEvent>,
    /// Merged attributes of every command sent since the last reset
    pub last_service_data: Option<ServiceData>,
    pub autoreset: Option<CancellationToken>,
    /// Pending adapt delay after an off → on
    pub adapt_delay: Option<CancellationToken>,
    pub transition_until: Option<tokio::time::Instant>,
    /// Bumped on every turn_on/toggle call for this light
    pub turn_on_generation: u64,
    pub turn_on_notify: Arc<Notify>,
    pub guard_lock: Arc<tokio::sync::Mutex<()>>,
    pub brightness_task: Option<Arc<TaskHandle>>,
    pub color_task: Option<Arc<TaskHandle>>,
}

impl LightRecord {
    /// Remove and return every task overlapping `which`, including the other
    /// slot of a shared brightness+color task.
    pub fn take_overlapping(&mut self, which: Which) -> Vec<Arc<TaskHandle>> {
        let mut taken: Vec<Arc<TaskHandle>> = Vec::new();
        if which.includes_brightness()
            && let Some(task) = self.brightness_task.take()
        {
            taken.push(task);
        }
        if which.includes_color()
            && let Some(task) = self.color_task.take()
            && !taken.iter().any(|t| Arc::ptr_eq(t, &task))
        {
            taken.push(task);
        }
        for slot in [&mut self.brightness_task, &mut self.color_task] {
            if slot
                .as_ref()
                .is_some_and(|t| taken.iter().any(|o| Arc::ptr_eq(o, t)))
            {
                *slot = None;
            }
        }
        taken
    }

    pub fn install(&mut self, which: Which, task: Arc<TaskHandle>) {
        if which.includes_brightness() {
            self.brightness_task = Some(task.clone());
        }
        if which.includes_color() {
            self.color_task = Some(task);
        }
    }

    /// Clear the slots still holding task `id`.
    pub fn release(&mut self, id: u64) {
        for slot in [&mut self.brightness_task, &mut self.color_task] {
            if slot.as_ref().is_some_and(|t| t.id() == id) {
                *slot = None;
            }
        }
    }

    pub fn take_all_tasks(&mut self) -> Vec<Arc<TaskHandle>> {
        self.take_overlapping(Which::Both)
    }

    pub fn cancel_autoreset(&mut self) {
        if let Some(token) = self.autoreset.take() {
            token.cancel();
        }
    }

    pub fn cancel_adapt_delay(&mut self) {
        if let Some(token) = self.adapt_delay.take() {
            token.cancel();
        }
    }

    pub fn transition_running(&self) -> bool {
        self.transition_until
            .is_some_and(|until| tokio::time::Instant::now() < until)
    }
}

/// Bounded set of call contexts that were adapted before dispatch.
#[derive(Debug, Default)]
struct ProactiveContexts {
    order: VecDeque<String>,
    ids: HashSet<String>,
}

impl ProactiveContexts {
    fn insert(&mut self, id: String) {
        if !self.ids.insert(id.clone()) {
            return;
        }
        self.order.push_back(id);
        while self.order.len() > PROACTIVE_CONTEXT_CAPACITY {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Store {
    lights: Mutex<HashMap<String, LightRecord>>,
    proactive: Mutex<ProactiveContexts>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Records stay consistent between statements, so a poisoned lock is usable
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl Store {
    /// Run `f` on the record of `light`, creating it when missing.
    pub fn with<R>(&self, light: &str, f: impl FnOnce(&mut LightRecord) -> R) -> R {
        let mut lights = lock(&self.lights);
        f(lights.entry(light.to_string()).or_default())
    }

    /// Run `f` on the record of `light` without creating it.
    pub fn peek<R>(&self, light: &str, f: impl FnOnce(Option<&LightRecord>) -> R) -> R {
        let lights = lock(&self.lights);
        f(lights.get(light))
    }

    pub fn mark_proactive(&self, context_id: &str) {
        lock(&self.proactive).insert(context_id.to_string());
    }

    pub fn is_proactive(&self, context_id: &str) -> bool {
        lock(&self.proactive).ids.contains(context_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_task_is_taken_from_both_slots() {
        let mut record = LightRecord::default();
        let both = Arc::new(TaskHandle::new(1, "light.a", Which::Both));
        record.install(Which::Both, both.clone());

        let taken = record.take_overlapping(Which::Brightness);
        assert_eq!(taken.len(), 1);
        assert!(Arc::ptr_eq(&taken[0], &both));
        assert!(record.brightness_task.is_none());
        assert!(record.color_task.is_none());
    }

    #[test]
    fn test_separate_tasks_only_overlap_their_class() {
        let mut record = LightRecord::default();
        record.install(
            Which::Brightness,
            Arc::new(TaskHandle::new(1, "light.a", Which::Brightness)),
        );
        record.install(
            Which::Color,
            Arc::new(TaskHandle::new(2, "light.a", Which::Color)),
        );

        let taken = record.take_overlapping(Which::Color);
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].id(), 2);
        assert!(record.brightness_task.is_some());

        record.release(1);
        assert!(record.brightness_task.is_none());
    }

    #[test]
    fn test_proactive_contexts_are_bounded() {
        let store = Store::default();
        for i in 0..(PROACTIVE_CONTEXT_CAPACITY + 10) {
            store.mark_proactive(&format!("ctx-{i}"));
        }
        assert!(!store.is_proactive("ctx-0"));
        assert!(store.is_proactive(&format!("ctx-{}", PROACTIVE_CONTEXT_CAPACITY + 9)));
    }
}
