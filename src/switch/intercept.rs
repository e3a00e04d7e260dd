//! Proactive adaptation of turn_on calls.
//!
//! A light that turns on at its old brightness and color, and is adapted a
//! moment later, visibly jumps. Intercepting the turn_on call lets the light
//! come up at the adapted values right away: the first command group is
//! merged into the call and the rest follows as a background unit.
//!
//! A call may target lights of several switches. Each switch's portion gets
//! its own adapted call; lights nobody adapts keep the original attributes.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use super::Switch;
use crate::adapt::{
    ActionKind, LightService, ServiceCallEvent, ServiceData, prepare_adaptation,
    prepare_service_data,
};
use crate::manager::Manager;

/// What to send instead of an intercepted call.
#[derive(Debug, Clone, PartialEq)]
pub struct InterceptPlan {
    /// The call to forward, with the first switch's portion adapted.
    /// `None` when every light moved to `extra_calls`.
    pub rewritten: Option<ServiceCallEvent>,
    /// Calls for the other switches and for lights passed through.
    pub extra_calls: Vec<ServiceCallEvent>,
}

impl InterceptPlan {
    fn passthrough(call: ServiceCallEvent) -> Self {
        Self {
            rewritten: Some(call),
            extra_calls: Vec::new(),
        }
    }

    /// Every call of the plan, in sending order.
    pub fn calls(&self) -> impl Iterator<Item = &ServiceCallEvent> {
        self.rewritten.iter().chain(self.extra_calls.iter())
    }
}

pub struct Interceptor {
    switches: Vec<Arc<Switch>>,
    manager: Arc<Manager>,
}

impl Interceptor {
    pub fn new(switches: Vec<Arc<Switch>>, manager: Arc<Manager>) -> Self {
        Self { switches, manager }
    }

    pub fn owner(&self, light: &str) -> Option<&Arc<Switch>> {
        self.switches.iter().find(|s| s.owns(light))
    }

    /// Rewrite a light service call before the host executes it.
    pub async fn intercept(&self, call: ServiceCallEvent) -> InterceptPlan {
        if call.service == LightService::TurnOff
            || call.data.has_special_effect()
            || call.context.is_ours()
        {
            return InterceptPlan::passthrough(call);
        }
        if call.service == LightService::Toggle && !self.all_off(&call.data.entity_id).await {
            return InterceptPlan::passthrough(call);
        }

        let (groups, passthrough) = self.partition(&call.data.entity_id).await;
        if groups.is_empty() {
            return InterceptPlan::passthrough(call);
        }

        let mut plan = InterceptPlan {
            rewritten: None,
            extra_calls: Vec::new(),
        };
        for (index, (switch, lights)) in groups.into_iter().enumerate() {
            let mut data = ServiceData {
                entity_id: lights.clone(),
                ..call.data.clone()
            };
            let adapted = self.adapt_portion(&switch, &lights, &call, &mut data).await;

            // An unadapted portion keeps the caller's context so its off → on
            // is adapted as usual
            let context = match (index, adapted) {
                (0, true) => {
                    self.manager.mark_proactive(&call.context.id);
                    call.context.clone()
                }
                (_, true) => switch.create_context(ActionKind::Intercept),
                (_, false) => call.context.clone(),
            };
            let portion = ServiceCallEvent {
                service: LightService::TurnOn,
                data,
                context,
            };
            if index == 0 {
                plan.rewritten = Some(portion);
            } else {
                plan.extra_calls.push(portion);
            }
        }

        if !passthrough.is_empty() {
            plan.extra_calls.push(ServiceCallEvent {
                data: ServiceData {
                    entity_id: passthrough,
                    ..call.data.clone()
                },
                ..call.clone()
            });
        }

        log_debug!(
            "Intercepted {} call {} into {} call(s)",
            call.service.as_str(),
            call.context.id,
            plan.calls().count()
        );
        plan
    }

    async fn all_off(&self, lights: &[String]) -> bool {
        for light in lights {
            let host = match self.owner(light) {
                Some(switch) => switch.host().clone(),
                None => continue,
            };
            if host.light_state(light).await.is_some_and(|s| s.on) {
                return false;
            }
        }
        true
    }

    /// Group the lights of a call by the switch that adapts them.
    ///
    /// Lights without an enabled, intercepting owner, lights already on and
    /// manually controlled lights pass through.
    async fn partition(&self, lights: &[String]) -> (Vec<(Arc<Switch>, Vec<String>)>, Vec<String>) {
        let mut groups: Vec<(Arc<Switch>, Vec<String>)> = Vec::new();
        let mut passthrough = Vec::new();

        for light in lights {
            let Some(switch) = self.owner(light).filter(|s| s.is_enabled() && s.config().intercept)
            else {
                passthrough.push(light.clone());
                continue;
            };
            let is_on = switch
                .host()
                .light_state(light)
                .await
                .is_some_and(|s| s.on);
            if is_on || self.manager.is_manually_controlled(light) {
                passthrough.push(light.clone());
                continue;
            }
            match groups.iter_mut().find(|(s, _)| Arc::ptr_eq(s, switch)) {
                Some((_, members)) => members.push(light.clone()),
                None => groups.push((switch.clone(), vec![light.clone()])),
            }
        }

        groups.retain(|(switch, members)| {
            let keep = members.len() == 1 || switch.config().multi_light_intercept;
            if !keep {
                passthrough.extend(members.iter().cloned());
            }
            keep
        });
        (groups, passthrough)
    }

    /// Merge the first adapted command into `data` and schedule the rest.
    ///
    /// Attributes given by the caller win. The first light of the portion
    /// stands in for the capabilities of the others. Returns whether anything
    /// was adapted.
    async fn adapt_portion(
        &self,
        switch: &Arc<Switch>,
        lights: &[String],
        call: &ServiceCallEvent,
        data: &mut ServiceData,
    ) -> bool {
        let Some(representative) = lights.first() else {
            return false;
        };
        let Some(state) = switch.host().light_state(representative).await else {
            return false;
        };
        let config = switch.config();
        let transition = call.data.transition.unwrap_or(config.initial_transition);
        let settings = match switch.compute_settings(transition) {
            Ok(settings) => settings,
            Err(e) => {
                log_warning!("Switch '{}': cannot intercept: {e}", switch.name());
                return false;
            }
        };
        let Some(mut target) = prepare_service_data(
            representative,
            &state,
            &settings,
            switch.shaping(),
            Some(transition),
        ) else {
            return false;
        };
        if call.data.has_brightness_attrs() {
            target = target.without_brightness();
        }
        if call.data.has_color_attrs() {
            target = target.without_color();
        }
        if !target.has_relevant_attrs() {
            return false;
        }

        let background = switch
            .create_context(ActionKind::Intercept)
            .with_parent(call.context.id.clone());
        let mut adaptation = prepare_adaptation(
            representative,
            background,
            target,
            config.separate_turn_on_commands,
            false,
            false,
            Duration::from_millis(config.send_split_delay),
        );
        let rest = adaptation.split_off(1);
        if let Some(first) = adaptation.pending().next() {
            data.merge_missing(first);
        }
        if rest.is_empty() {
            return true;
        }

        for light in lights {
            let pending: VecDeque<ServiceData> = rest
                .iter()
                .map(|group| ServiceData {
                    entity_id: vec![light.clone()],
                    ..group.clone()
                })
                .collect();
            let mut unit = adaptation.with_pending(pending);
            unit.entity_id = light.clone();
            unit.initial_sleep = true;
            self.manager
                .execute_adaptation(unit, switch.host().clone())
                .await;
        }
        true
    }
}
