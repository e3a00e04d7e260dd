//! Typed `light.turn_on` payloads.

use serde::Serialize;

use super::host::{ColorMode, LightState};
use crate::common::utils::brightness_pct_to_value;

/// Attributes of a `turn_on` call. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServiceData {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub entity_id: Vec<String>,
    /// 0-255 device scale
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_temp_kelvin: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rgb_color: Option<[u8; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xy_color: Option<(f64, f64)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hs_color: Option<(f64, f64)>,
    /// Seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transition: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effect: Option<String>,
}

impl ServiceData {
    pub fn for_light(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: vec![entity_id.into()],
            ..Default::default()
        }
    }

    pub fn for_lights(entity_ids: &[String]) -> Self {
        Self {
            entity_id: entity_ids.to_vec(),
            ..Default::default()
        }
    }

    pub fn has_brightness_attrs(&self) -> bool {
        self.brightness.is_some() || self.brightness_pct.is_some()
    }

    pub fn has_color_attrs(&self) -> bool {
        self.color_temp_kelvin.is_some()
            || self.rgb_color.is_some()
            || self.xy_color.is_some()
            || self.hs_color.is_some()
    }

    /// Whether `flash` or `effect` is requested.
    pub fn has_special_effect(&self) -> bool {
        self.flash.is_some() || self.effect.is_some()
    }

    /// Any attribute besides `entity_id` and `transition`.
    pub fn has_relevant_attrs(&self) -> bool {
        self.has_brightness_attrs() || self.has_color_attrs() || self.has_special_effect()
    }

    /// Effective brightness on the 0-255 scale.
    pub fn brightness_value(&self) -> Option<u8> {
        self.brightness
            .or_else(|| self.brightness_pct.map(brightness_pct_to_value))
    }

    /// Same entities and transition, brightness attributes only.
    pub fn brightness_part(&self) -> Self {
        Self {
            entity_id: self.entity_id.clone(),
            brightness: self.brightness,
            brightness_pct: self.brightness_pct,
            transition: self.transition,
            ..Default::default()
        }
    }

    /// Same entities and transition, color attributes only.
    pub fn color_part(&self) -> Self {
        Self {
            entity_id: self.entity_id.clone(),
            color_temp_kelvin: self.color_temp_kelvin,
            rgb_color: self.rgb_color,
            xy_color: self.xy_color,
            hs_color: self.hs_color,
            transition: self.transition,
            ..Default::default()
        }
    }

    pub fn without_brightness(mut self) -> Self {
        self.brightness = None;
        self.brightness_pct = None;
        self
    }

    pub fn without_color(mut self) -> Self {
        self.color_temp_kelvin = None;
        self.rgb_color = None;
        self.xy_color = None;
        self.hs_color = None;
        self
    }

    /// Fill attribute families missing here from `other`. Families already
    /// present are kept as they are.
    pub fn merge_missing(&mut self, other: &ServiceData) {
        if !self.has_brightness_attrs() {
            self.brightness = other.brightness;
            self.brightness_pct = other.brightness_pct;
        }
        if !self.has_color_attrs() {
            self.color_temp_kelvin = other.color_temp_kelvin;
            self.rgb_color = other.rgb_color;
            self.xy_color = other.xy_color;
            self.hs_color = other.hs_color;
        }
        if self.transition.is_none() {
            self.transition = other.transition;
        }
    }

    /// Overlay every attribute set in `newer`.
    pub fn overlay(&mut self, newer: &ServiceData) {
        if newer.has_brightness_attrs() {
            self.brightness = newer.brightness;
            self.brightness_pct = newer.brightness_pct;
        }
        if newer.has_color_attrs() {
            self.color_temp_kelvin = newer.color_temp_kelvin;
            self.rgb_color = newer.rgb_color;
            self.xy_color = newer.xy_color;
            self.hs_color = newer.hs_color;
        }
        if newer.transition.is_some() {
            self.transition = newer.transition;
        }
    }

    /// Drop attributes that already match `state`.
    pub fn filter_redundant(&self, state: &LightState) -> Self {
        let mut data = self.clone();
        if !state.on {
            return data;
        }
        if state.brightness.is_some() && data.brightness_value() == state.brightness {
            data.brightness = None;
            data.brightness_pct = None;
        }
        let in_color_temp_mode = state.color_mode == Some(ColorMode::ColorTemp);
        if in_color_temp_mode
            && data.color_temp_kelvin.is_some()
            && data.color_temp_kelvin == state.color_temp_kelvin
        {
            data.color_temp_kelvin = None;
        }
        if !in_color_temp_mode {
            if data.rgb_color.is_some() && data.rgb_color == state.rgb_color {
                data.rgb_color = None;
            }
            if data.xy_color.is_some() && data.xy_color == state.xy_color {
                data.xy_color = None;
            }
            if data.hs_color.is_some() && data.hs_color == state.hs_color {
                data.hs_color = None;
            }
        }
        data
    }

    /// JSON rendering for the host boundary and logs.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapt::host::testing::color_light_on;

    fn target() -> ServiceData {
        ServiceData {
            brightness: Some(200),
            color_temp_kelvin: Some(3000),
            transition: Some(10.0),
            ..ServiceData::for_light("light.desk")
        }
    }

    #[test]
    fn test_parts_keep_entity_and_transition() {
        let data = target();
        let brightness = data.brightness_part();
        assert_eq!(brightness.brightness, Some(200));
        assert_eq!(brightness.color_temp_kelvin, None);
        assert_eq!(brightness.entity_id, vec!["light.desk".to_string()]);
        assert_eq!(brightness.transition, Some(10.0));

        let color = data.color_part();
        assert_eq!(color.brightness, None);
        assert_eq!(color.color_temp_kelvin, Some(3000));
    }

    #[test]
    fn test_filter_drops_matching_attributes() {
        let mut state = color_light_on();
        state.brightness = Some(200);
        state.color_temp_kelvin = Some(2500);

        let filtered = target().filter_redundant(&state);
        assert_eq!(filtered.brightness, None);
        assert_eq!(filtered.color_temp_kelvin, Some(3000));
        assert!(filtered.has_relevant_attrs());

        state.color_temp_kelvin = Some(3000);
        let filtered = target().filter_redundant(&state);
        assert!(!filtered.has_relevant_attrs());
        // entity_id and transition survive but don't count
        assert_eq!(filtered.transition, Some(10.0));
    }

    #[test]
    fn test_filter_keeps_everything_for_off_light() {
        let mut state = color_light_on();
        state.on = false;
        state.brightness = Some(200);
        assert_eq!(target().filter_redundant(&state), target());
    }

    #[test]
    fn test_merge_missing_respects_user_attributes() {
        let mut call = ServiceData {
            brightness_pct: Some(30.0),
            ..ServiceData::for_light("light.desk")
        };
        call.merge_missing(&target());
        assert_eq!(call.brightness_pct, Some(30.0));
        assert_eq!(call.brightness, None);
        assert_eq!(call.color_temp_kelvin, Some(3000));
        assert_eq!(call.transition, Some(10.0));
    }

    #[test]
    fn test_json_skips_absent_fields() {
        let json = target().to_json();
        assert!(json.contains("\"brightness\":200"));
        assert!(json.contains("\"color_temp_kelvin\":3000"));
        assert!(!json.contains("rgb_color"));
    }
}
