//! Detection of changes made outside the host's service calls.
//!
//! After refreshing a light, its live state is compared to what we last sent.
//! A difference beyond the thresholds means someone else changed the light.

use std::time::Duration;

use super::Manager;
use crate::adapt::{ColorMode, LightHost, LightState, ServiceData};
use crate::common::constants::{
    BRIGHTNESS_CHANGE_THRESHOLD, COLOR_TEMP_CHANGE_THRESHOLD, RGB_REDMEAN_CHANGE_THRESHOLD,
};
use crate::common::utils::brightness_value_to_pct;

/// Perceptual RGB distance ("redmean"), 0 to about 765.
pub fn redmean_distance(a: [u8; 3], b: [u8; 3]) -> f64 {
    let [r1, g1, b1] = a.map(f64::from);
    let [r2, g2, b2] = b.map(f64::from);
    let r_mean = (r1 + r2) / 2.0;
    let (dr, dg, db) = (r1 - r2, g1 - g2, b1 - b2);
    ((2.0 + r_mean / 256.0) * dr * dr + 4.0 * dg * dg + (2.0 + (255.0 - r_mean) / 256.0) * db * db)
        .sqrt()
}

/// Whether `state` is too far from the `last` command to be our doing.
pub fn differs_significantly(
    last: &ServiceData,
    state: &LightState,
    adapt_brightness: bool,
    adapt_color: bool,
) -> bool {
    if adapt_brightness
        && let (Some(sent), Some(live)) = (last.brightness_value(), state.brightness)
        && (i32::from(sent) - i32::from(live)).abs() > BRIGHTNESS_CHANGE_THRESHOLD
    {
        log_debug!(
            "Brightness moved from {:.0}% to {:.0}%",
            brightness_value_to_pct(sent),
            brightness_value_to_pct(live)
        );
        return true;
    }

    if !adapt_color {
        return false;
    }

    if let Some(sent) = last.color_temp_kelvin {
        if state.color_mode.is_some_and(|m| m.is_color()) {
            return true;
        }
        if let Some(live) = state.color_temp_kelvin
            && (i64::from(sent) - i64::from(live)).abs() > COLOR_TEMP_CHANGE_THRESHOLD
        {
            return true;
        }
    }

    if let (Some(sent), Some(live)) = (last.rgb_color, state.rgb_color)
        && state.color_mode != Some(ColorMode::ColorTemp)
        && redmean_distance(sent, live) > RGB_REDMEAN_CHANGE_THRESHOLD
    {
        return true;
    }

    false
}

impl Manager {
    /// Refresh `light` and mark it manually controlled when its state moved
    /// away from our last command.
    ///
    /// Skipped while a transition we started is still running.
    pub async fn significant_change(
        &self,
        light: &str,
        host: &dyn LightHost,
        adapt_brightness: bool,
        adapt_color: bool,
        autoreset: Option<Duration>,
    ) -> bool {
        if self.is_transition_running(light) {
            return false;
        }
        if let Err(e) = host.refresh_state(light).await {
            log_warning!("{light}: could not refresh state: {e}");
            return false;
        }

        let Some(last) = self.last_service_data(light) else {
            return false;
        };
        let Some(state) = host.light_state(light).await.filter(|s| s.on) else {
            return false;
        };
        // A command may have gone out while we were refreshing
        if self.is_transition_running(light) {
            return false;
        }

        if differs_significantly(&last, &state, adapt_brightness, adapt_color) {
            log_info!("{light}: changed outside of adaptation, marking as manually controlled");
            self.mark_manual(light, autoreset);
            return true;
        }
        false
    }
}
