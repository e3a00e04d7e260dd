//! From target settings to an ordered sequence of commands.
//!
//! [`prepare_service_data`] projects engine output onto what a light can do.
//! [`prepare_adaptation`] then splits the result into brightness and color
//! commands when requested. Each command is filtered against live state only
//! right before it is sent, so a command made redundant by the previous one
//! is skipped.

use std::collections::VecDeque;
use std::time::Duration;

use super::host::{Context, LightHost, LightState};
use super::service_data::ServiceData;
use crate::common::utils::transition_duration;
use crate::engine::LightSettings;

/// Which attribute families an adaptation touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Which {
    Brightness,
    Color,
    Both,
}

impl Which {
    pub fn from_data(data: &ServiceData) -> Self {
        match (data.has_brightness_attrs(), data.has_color_attrs()) {
            (true, false) => Which::Brightness,
            (false, true) => Which::Color,
            _ => Which::Both,
        }
    }

    pub fn includes_brightness(&self) -> bool {
        matches!(self, Which::Brightness | Which::Both)
    }

    pub fn includes_color(&self) -> bool {
        matches!(self, Which::Color | Which::Both)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Which::Brightness => "brightness",
            Which::Color => "color",
            Which::Both => "both",
        }
    }
}

/// Attribute families to send and how to express color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shaping {
    pub adapt_brightness: bool,
    pub adapt_color: bool,
    pub prefer_rgb_color: bool,
}

impl Default for Shaping {
    fn default() -> Self {
        Self {
            adapt_brightness: true,
            adapt_color: true,
            prefer_rgb_color: false,
        }
    }
}

/// Target attributes for one light, limited to its capabilities.
///
/// Returns `None` when the light supports neither brightness nor color, or
/// when nothing is left to send.
pub fn prepare_service_data(
    entity_id: &str,
    state: &LightState,
    settings: &LightSettings,
    shaping: Shaping,
    transition: Option<f64>,
) -> Option<ServiceData> {
    let mut data = ServiceData {
        transition: transition.filter(|t| *t > 0.0),
        ..ServiceData::for_light(entity_id)
    };

    if shaping.adapt_brightness && state.supports_brightness() {
        data.brightness_pct = Some(settings.brightness_pct.round());
    }

    if shaping.adapt_color {
        let wants_rgb = shaping.prefer_rgb_color || settings.force_rgb_color;
        if state.supports_color_temp() && !(wants_rgb && state.supports_color()) {
            let mut kelvin = settings.color_temp_kelvin;
            if let Some(min) = state.min_color_temp_kelvin {
                kelvin = kelvin.max(min);
            }
            if let Some(max) = state.max_color_temp_kelvin {
                kelvin = kelvin.min(max);
            }
            data.color_temp_kelvin = Some(kelvin);
        } else if state.supports_color() {
            data.rgb_color = Some(settings.rgb_color);
        }
    }

    if !state.supports_brightness() && !state.supports_color_temp() && !state.supports_color() {
        log_debug!("{entity_id} supports neither brightness nor color, skipping");
        return None;
    }
    data.has_relevant_attrs().then_some(data)
}

/// One adaptation of one light, owned by the task that executes it.
#[derive(Debug, Clone)]
pub struct AdaptationData {
    pub entity_id: String,
    pub context: Context,
    /// Pause between consecutive commands
    pub sleep_time: Duration,
    /// Also pause before the first command
    pub initial_sleep: bool,
    pub force: bool,
    pub filter_by_state: bool,
    pub which: Which,
    /// Number of commands prepared
    pub max_length: usize,
    pending: VecDeque<ServiceData>,
}

impl AdaptationData {
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending(&self) -> impl Iterator<Item = &ServiceData> {
        self.pending.iter()
    }

    /// Next command to send, filtered against live state when enabled.
    ///
    /// Commands that end up without a relevant attribute are skipped.
    pub async fn next_service_call_data(&mut self, host: &dyn LightHost) -> Option<ServiceData> {
        while let Some(data) = self.pending.pop_front() {
            if !self.filter_by_state {
                return Some(data);
            }
            let filtered = match host.light_state(&self.entity_id).await {
                Some(state) => data.filter_redundant(&state),
                None => data,
            };
            if filtered.has_relevant_attrs() {
                return Some(filtered);
            }
            log_debug!(
                "{}: skipping redundant command {}",
                self.entity_id,
                filtered.to_json()
            );
        }
        None
    }

    /// Keep only the first `n` commands; returns the rest.
    pub fn split_off(&mut self, n: usize) -> VecDeque<ServiceData> {
        let at = n.min(self.pending.len());
        self.pending.split_off(at)
    }

    /// A new adaptation of the same light carrying `pending`.
    pub fn with_pending(&self, pending: VecDeque<ServiceData>) -> Self {
        let brightness = pending.iter().any(ServiceData::has_brightness_attrs);
        let color = pending.iter().any(ServiceData::has_color_attrs);
        let which = match (brightness, color) {
            (true, false) => Which::Brightness,
            (false, true) => Which::Color,
            _ => Which::Both,
        };
        Self {
            which,
            max_length: pending.len(),
            pending,
            ..self.clone()
        }
    }
}

/// Turn one target into an [`AdaptationData`].
///
/// With `split`, brightness is sent first and color second, each with half the
/// transition. Empty groups are dropped, so a target carrying nothing but a
/// transition yields no command at all.
pub fn prepare_adaptation(
    entity_id: &str,
    context: Context,
    target: ServiceData,
    split: bool,
    filter_by_state: bool,
    force: bool,
    split_delay: Duration,
) -> AdaptationData {
    let which = Which::from_data(&target);
    let transition = target.transition;

    let candidates = if split {
        vec![target.brightness_part(), target.color_part()]
    } else {
        vec![target]
    };
    let mut groups: VecDeque<ServiceData> = candidates
        .into_iter()
        .filter(ServiceData::has_relevant_attrs)
        .collect();

    let count = groups.len();
    let per_group = transition.map(|t| t / count.max(1) as f64);
    if count > 1 {
        for group in groups.iter_mut() {
            group.transition = per_group;
        }
    }

    let sleep_time = match per_group {
        Some(t) => transition_duration(t) + split_delay,
        None => split_delay,
    };

    AdaptationData {
        entity_id: entity_id.to_string(),
        context,
        sleep_time,
        initial_sleep: false,
        force,
        filter_by_state,
        which,
        max_length: count,
        pending: groups,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapt::host::ColorMode;
    use crate::adapt::host::testing::{RecordingHost, color_light_on};

    fn settings() -> LightSettings {
        LightSettings {
            brightness_pct: 55.4,
            color_temp_kelvin: 1500,
            rgb_color: [255, 108, 0],
            xy_color: (0.6, 0.38),
            hs_color: (25.4, 100.0),
            sun_position: -0.2,
            force_rgb_color: false,
        }
    }

    fn target() -> ServiceData {
        ServiceData {
            brightness_pct: Some(60.0),
            color_temp_kelvin: Some(3000),
            transition: Some(10.0),
            ..ServiceData::for_light("light.desk")
        }
    }

    #[test]
    fn test_shaping_clamps_color_temp_to_light_range() {
        let data = prepare_service_data(
            "light.desk",
            &color_light_on(),
            &settings(),
            Shaping::default(),
            Some(2.0),
        )
        .unwrap();
        assert_eq!(data.brightness_pct, Some(55.0));
        assert_eq!(data.color_temp_kelvin, Some(2000));
        assert_eq!(data.rgb_color, None);
        assert_eq!(data.transition, Some(2.0));
    }

    #[test]
    fn test_shaping_prefers_rgb_when_asked_or_forced() {
        let shaping = Shaping {
            prefer_rgb_color: true,
            ..Shaping::default()
        };
        let data =
            prepare_service_data("light.desk", &color_light_on(), &settings(), shaping, None)
                .unwrap();
        assert_eq!(data.rgb_color, Some([255, 108, 0]));
        assert_eq!(data.color_temp_kelvin, None);
        assert_eq!(data.transition, None);

        let forced = LightSettings {
            force_rgb_color: true,
            ..settings()
        };
        let data = prepare_service_data(
            "light.desk",
            &color_light_on(),
            &forced,
            Shaping::default(),
            None,
        )
        .unwrap();
        assert!(data.rgb_color.is_some());
    }

    #[test]
    fn test_shaping_respects_capabilities_and_toggles() {
        let dimmer = LightState {
            on: true,
            supported_color_modes: vec![ColorMode::Brightness],
            ..Default::default()
        };
        let data =
            prepare_service_data("light.hall", &dimmer, &settings(), Shaping::default(), None)
                .unwrap();
        assert!(data.has_brightness_attrs());
        assert!(!data.has_color_attrs());

        let switch_only = LightState {
            on: true,
            supported_color_modes: vec![ColorMode::OnOff],
            ..Default::default()
        };
        assert!(
            prepare_service_data("light.plug", &switch_only, &settings(), Shaping::default(), None)
                .is_none()
        );

        let no_color = Shaping {
            adapt_color: false,
            ..Shaping::default()
        };
        let data =
            prepare_service_data("light.desk", &color_light_on(), &settings(), no_color, None)
                .unwrap();
        assert!(!data.has_color_attrs());
    }

    #[test]
    fn test_split_orders_brightness_first_and_divides_transition() {
        let adaptation = prepare_adaptation(
            "light.desk",
            Context::new("ctx"),
            target(),
            true,
            false,
            false,
            Duration::from_millis(200),
        );
        assert_eq!(adaptation.max_length, 2);
        assert_eq!(adaptation.which, Which::Both);
        let groups: Vec<_> = adaptation.pending().cloned().collect();
        assert!(groups[0].has_brightness_attrs() && !groups[0].has_color_attrs());
        assert!(groups[1].has_color_attrs() && !groups[1].has_brightness_attrs());
        assert!(groups.iter().all(|g| g.transition == Some(5.0)));
        assert_eq!(adaptation.sleep_time, Duration::from_millis(5200));
    }

    #[test]
    fn test_no_split_keeps_one_group() {
        let adaptation = prepare_adaptation(
            "light.desk",
            Context::new("ctx"),
            target(),
            false,
            false,
            false,
            Duration::from_millis(200),
        );
        assert_eq!(adaptation.max_length, 1);
        assert_eq!(adaptation.pending().next(), Some(&target()));
    }

    #[test]
    fn test_split_drops_empty_groups() {
        let brightness_only = target().without_color();
        let adaptation = prepare_adaptation(
            "light.desk",
            Context::new("ctx"),
            brightness_only,
            true,
            false,
            false,
            Duration::ZERO,
        );
        assert_eq!(adaptation.max_length, 1);
        assert_eq!(adaptation.which, Which::Brightness);
        assert_eq!(adaptation.pending().next().unwrap().transition, Some(10.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transition_only_target_sends_nothing() {
        let host = RecordingHost::new();
        host.set_state("light.desk", color_light_on());
        let transition_only = ServiceData {
            transition: Some(4.0),
            ..ServiceData::for_light("light.desk")
        };

        for split in [true, false] {
            let mut adaptation = prepare_adaptation(
                "light.desk",
                Context::new("ctx"),
                transition_only.clone(),
                split,
                false,
                true,
                Duration::ZERO,
            );
            assert_eq!(adaptation.max_length, 0, "split: {split}");
            assert!(!adaptation.has_pending());
            assert!(adaptation.next_service_call_data(&host).await.is_none());
        }
        assert!(host.sent().is_empty());
    }

    #[test]
    fn test_sleep_without_transition_is_split_delay() {
        let mut data = target();
        data.transition = None;
        let adaptation = prepare_adaptation(
            "light.desk",
            Context::new("ctx"),
            data,
            true,
            false,
            false,
            Duration::from_millis(300),
        );
        assert_eq!(adaptation.sleep_time, Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_lazy_filter_skips_redundant_groups() {
        let host = RecordingHost::new();
        let mut state = color_light_on();
        state.brightness = Some(crate::common::utils::brightness_pct_to_value(60.0));
        host.set_state("light.desk", state);

        let mut adaptation = prepare_adaptation(
            "light.desk",
            Context::new("ctx"),
            target(),
            true,
            true,
            false,
            Duration::ZERO,
        );
        let first = adaptation.next_service_call_data(&host).await.unwrap();
        assert!(first.has_color_attrs());
        assert!(!first.has_brightness_attrs());
        assert!(adaptation.next_service_call_data(&host).await.is_none());
    }
}
