//! Switch controller: one per configured group of lights.
//!
//! A `Switch` ties the engine, the splitter and the shared manager together
//! for its lights. It handles:
//!
//! - Periodic re-adaptation of every light that is on
//! - Adapting a light once it turns on, behind the "just turned off" guard
//! - Manual takeover checks for foreign service calls
//! - Re-adaptation after manual control expires
//! - The service operations (apply, manual control, settings, toggles)
//!
//! Event routing lives in [`dispatcher`], proactive rewriting of turn_on
//! calls in [`intercept`].

pub mod dispatcher;
pub mod intercept;


use anyhow::{Result, bail};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use crate::adapt::{
    ActionKind, Context, ContextCounter, ContextId, LightHost, ServiceCallEvent, Shaping,
    prepare_adaptation, prepare_service_data,
};
use crate::config::{LocationConfig, SwitchConfig, validation::validate_switch};
use crate::engine::{LightSettings, SunLightSettings};
use crate::manager::{AdaptationHandle, GuardPolicy, Manager, TakeoverPolicy};
use crate::time_source::TimeSource;

/// Dependencies needed to create a [`Switch`].
pub struct SwitchParams {
    pub location: LocationConfig,
    pub config: SwitchConfig,
    pub manager: Arc<Manager>,
    pub host: Arc<dyn LightHost>,
    pub clock: Arc<dyn TimeSource>,
}

/// Arguments of the `apply` service.
///
/// Empty `lights` means every light of the switch. Unset options fall back to
/// the switch's own settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyRequest {
    pub lights: Vec<String>,
    pub transition: Option<f64>,
    pub adapt_brightness: Option<bool>,
    pub adapt_color: Option<bool>,
    pub prefer_rgb_color: Option<bool>,
    pub turn_on_lights: bool,
}

pub struct Switch {
    name: String,
    location: LocationConfig,
    config: RwLock<Arc<SwitchConfig>>,
    settings: RwLock<Arc<SunLightSettings>>,
    enabled: AtomicBool,
    sleep_mode: AtomicBool,
    adapt_brightness: AtomicBool,
    adapt_color: AtomicBool,
    illuminance: Mutex<Option<f64>>,
    counter: ContextCounter,
    manager: Arc<Manager>,
    host: Arc<dyn LightHost>,
    clock: Arc<dyn TimeSource>,
}

fn read<T: Clone>(lock: &RwLock<T>) -> T {
    lock.read().unwrap_or_else(|e| e.into_inner()).clone()
}

fn write<T>(lock: &RwLock<T>, value: T) {
    *lock.write().unwrap_or_else(|e| e.into_inner()) = value;
}

impl Switch {
    /// Validate the switch configuration and build its sun settings.
    pub fn new(params: SwitchParams) -> Result<Self> {
        validate_switch(&params.config)?;
        let settings = SunLightSettings::from_config(&params.location, &params.config)?;

        Ok(Self {
            name: params.config.name.clone(),
            location: params.location,
            config: RwLock::new(Arc::new(params.config)),
            settings: RwLock::new(Arc::new(settings)),
            enabled: AtomicBool::new(true),
            sleep_mode: AtomicBool::new(false),
            adapt_brightness: AtomicBool::new(true),
            adapt_color: AtomicBool::new(true),
            illuminance: Mutex::new(None),
            counter: ContextCounter::default(),
            manager: params.manager,
            host: params.host,
            clock: params.clock,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> Arc<SwitchConfig> {
        read(&self.config)
    }

    pub fn settings(&self) -> Arc<SunLightSettings> {
        read(&self.settings)
    }

    pub fn lights(&self) -> Vec<String> {
        self.config().lights.clone()
    }

    pub fn owns(&self, light: &str) -> bool {
        self.config().lights.iter().any(|l| l == light)
    }

    pub fn manager(&self) -> &Arc<Manager> {
        &self.manager
    }

    pub fn host(&self) -> &Arc<dyn LightHost> {
        &self.host
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn is_sleep_mode(&self) -> bool {
        self.sleep_mode.load(Ordering::SeqCst)
    }

    pub fn adapts_brightness(&self) -> bool {
        self.adapt_brightness.load(Ordering::SeqCst)
    }

    pub fn adapts_color(&self) -> bool {
        self.adapt_color.load(Ordering::SeqCst)
    }

    pub fn illuminance(&self) -> Option<f64> {
        *self.illuminance.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// A fresh context for a command sent by this switch.
    pub fn create_context(&self, kind: ActionKind) -> Context {
        let id = ContextId::new(&self.name, kind, self.counter.next(), self.clock.now());
        Context::from(&id)
    }

    /// Targets for the current instant, the sleep flag and the latest
    /// illuminance reading.
    pub fn compute_settings(&self, transition: f64) -> Result<LightSettings> {
        self.settings().compute_settings_with(
            self.clock.now(),
            self.is_sleep_mode(),
            transition,
            self.illuminance(),
        )
    }

    pub(crate) fn shaping(&self) -> Shaping {
        Shaping {
            adapt_brightness: self.adapts_brightness(),
            adapt_color: self.adapts_color(),
            prefer_rgb_color: self.config().prefer_rgb_color,
        }
    }

    fn takeover_policy(&self) -> TakeoverPolicy {
        let config = self.config();
        TakeoverPolicy {
            take_over_control: config.take_over_control,
            adapt_brightness: self.adapts_brightness(),
            adapt_color: self.adapts_color(),
            autoreset: config.autoreset_duration(),
        }
    }

    fn guard_policy(&self) -> GuardPolicy {
        let config = self.config();
        GuardPolicy {
            turn_off_delay: Duration::from_secs_f64(config.turn_off_delay.max(0.0)),
            retries: config.turn_off_retries,
        }
    }

    /// Adapt one light that is on.
    ///
    /// Returns `None` when the light is off, unknown, or nothing is left to
    /// send.
    pub async fn adapt_light(
        &self,
        light: &str,
        transition: f64,
        force: bool,
        context: Context,
    ) -> Result<Option<AdaptationHandle>> {
        self.adapt_light_with(light, transition, force, context, self.shaping(), false)
            .await
    }

    async fn adapt_light_with(
        &self,
        light: &str,
        transition: f64,
        force: bool,
        context: Context,
        shaping: Shaping,
        turn_on: bool,
    ) -> Result<Option<AdaptationHandle>> {
        let Some(state) = self.host.light_state(light).await else {
            log_debug!("{light}: unknown to the host, skipping");
            return Ok(None);
        };
        if !state.on && !turn_on {
            log_debug!("{light}: off, skipping");
            return Ok(None);
        }

        let settings = self.compute_settings(transition)?;
        let Some(target) =
            prepare_service_data(light, &state, &settings, shaping, Some(transition))
        else {
            return Ok(None);
        };

        let config = self.config();
        let data = prepare_adaptation(
            light,
            context,
            target,
            config.separate_turn_on_commands,
            config.skip_redundant_commands && !force,
            force,
            Duration::from_millis(config.send_split_delay),
        );
        if !data.has_pending() {
            log_debug!("{light}: nothing to adapt");
            return Ok(None);
        }
        log_debug!(
            "{light}: adapting to {:.0}% / {}K ({} command(s))",
            settings.brightness_pct,
            settings.color_temp_kelvin,
            data.max_length
        );
        let handle = self
            .manager
            .execute_adaptation(data, self.host.clone())
            .await;
        Ok(Some(handle))
    }

    /// Adapt every light of the switch that is on.
    ///
    /// Manually controlled lights are skipped unless `force` is set. With
    /// non-host change detection enabled, each light is refreshed first and
    /// skipped when someone else changed it.
    pub async fn update_all_lights(
        &self,
        context: Context,
        transition: f64,
        force: bool,
    ) -> Vec<AdaptationHandle> {
        let config = self.config();
        let mut handles = Vec::new();

        for light in &config.lights {
            if !force && self.manager.is_manually_controlled(light) {
                log_debug!("{light}: manually controlled, skipping");
                continue;
            }
            if !force
                && config.detect_non_ha_changes
                && self
                    .manager
                    .significant_change(
                        light,
                        self.host.as_ref(),
                        self.adapts_brightness(),
                        self.adapts_color(),
                        config.autoreset_duration(),
                    )
                    .await
            {
                continue;
            }
            match self
                .adapt_light(light, transition, force, context.clone())
                .await
            {
                Ok(Some(handle)) => handles.push(handle),
                Ok(None) => {}
                Err(e) => log_warning!("{light}: adaptation failed: {e}"),
            }
        }
        handles
    }

    /// Periodic re-adaptation.
    pub async fn tick(&self) -> Vec<AdaptationHandle> {
        let config = self.config();
        if !self.is_enabled() || config.only_once {
            return Vec::new();
        }
        let context = self.create_context(ActionKind::Interval);
        self.update_all_lights(context, config.transition, false)
            .await
    }

    /// Check a turn_on/toggle call for manual takeover of this switch's lights.
    ///
    /// Must run before the resulting state change is seen, while the host
    /// still reports the state from before the call.
    pub async fn handle_service_call(&self, call: &ServiceCallEvent) {
        if !self.is_enabled() {
            return;
        }
        let policy = self.takeover_policy();
        for light in call.data.entity_id.iter().filter(|l| self.owns(l)) {
            let was_on = self
                .host
                .light_state(light)
                .await
                .is_some_and(|s| s.on);
            self.manager
                .evaluate_takeover(light, call, was_on, &policy);
        }
    }

    /// React to `light` switching on.
    ///
    /// Runs the "just turned off" guard, the bare turn_on policy and the
    /// adapt delay before adapting. Lights turned on by our own or a
    /// proactively adapted call are already adapted.
    pub async fn handle_turned_on(
        &self,
        light: &str,
        context: &Context,
    ) -> Result<Option<AdaptationHandle>> {
        if !self.is_enabled() {
            return Ok(None);
        }
        if context.is_ours() || self.manager.is_proactive(&context.id) {
            log_debug!("{light}: turned on already adapted");
            return Ok(None);
        }
        if self
            .manager
            .just_turned_off(light, self.host.as_ref(), self.guard_policy())
            .await
        {
            log_debug!("{light}: ignoring off → on right after turning off");
            return Ok(None);
        }

        let config = self.config();
        if config.adapt_only_on_bare_turn_on
            && self.manager.turned_on_with_attributes(light, &context.id)
        {
            log_info!("{light}: turned on with explicit attributes, leaving it alone");
            self.manager
                .mark_manual(light, config.autoreset_duration());
            return Ok(None);
        }

        if config.adapt_delay > 0.0 {
            let cancelled = self.manager.begin_adapt_delay(light);
            tokio::select! {
                _ = cancelled.cancelled() => {
                    log_debug!("{light}: adapt delay cancelled");
                    return Ok(None);
                }
                _ = tokio::time::sleep(Duration::from_secs_f64(config.adapt_delay)) => {}
            }
            if self.manager.is_manually_controlled(light) {
                return Ok(None);
            }
        }

        let context = self.create_context(ActionKind::OffToOn);
        self.adapt_light(light, config.initial_transition, true, context)
            .await
    }

    /// Adapt a light whose manual control just expired.
    pub async fn handle_autoreset(&self, light: &str) -> Result<Option<AdaptationHandle>> {
        if !self.is_enabled() || !self.owns(light) {
            return Ok(None);
        }
        let context = self.create_context(ActionKind::AutoReset);
        self.adapt_light(light, self.config().transition, true, context)
            .await
    }

    /// The `apply` service: adapt the given lights now, ignoring manual
    /// control.
    pub async fn apply(&self, request: ApplyRequest) -> Result<Vec<AdaptationHandle>> {
        let lights = self.resolve_lights(&request.lights)?;
        let config = self.config();
        let shaping = Shaping {
            adapt_brightness: request
                .adapt_brightness
                .unwrap_or_else(|| self.adapts_brightness()),
            adapt_color: request.adapt_color.unwrap_or_else(|| self.adapts_color()),
            prefer_rgb_color: request
                .prefer_rgb_color
                .unwrap_or(config.prefer_rgb_color),
        };
        let transition = request.transition.unwrap_or(config.transition);
        let context = self.create_context(ActionKind::Apply);

        let mut handles = Vec::new();
        for light in &lights {
            match self
                .adapt_light_with(
                    light,
                    transition,
                    true,
                    context.clone(),
                    shaping,
                    request.turn_on_lights,
                )
                .await
            {
                Ok(Some(handle)) => handles.push(handle),
                Ok(None) => {}
                Err(e) => log_warning!("{light}: apply failed: {e}"),
            }
        }
        Ok(handles)
    }

    /// Mark lights as manually controlled, or release them and adapt again.
    pub async fn set_manual_control(
        &self,
        lights: &[String],
        manual: bool,
    ) -> Result<Vec<AdaptationHandle>> {
        let lights = self.resolve_lights(lights)?;
        let config = self.config();
        if manual {
            for light in &lights {
                self.manager.cancel_adaptation(light);
                self.manager
                    .mark_manual(light, config.autoreset_duration());
            }
            return Ok(Vec::new());
        }

        let context = self.create_context(ActionKind::Apply);
        let mut handles = Vec::new();
        for light in &lights {
            self.manager.reset(light);
            if let Some(handle) = self
                .adapt_light(light, config.transition, true, context.clone())
                .await?
            {
                handles.push(handle);
            }
        }
        Ok(handles)
    }

    /// Replace the switch configuration and re-adapt with the new settings.
    ///
    /// The new configuration is validated and its sun settings built before
    /// anything is swapped.
    pub async fn change_settings(&self, config: SwitchConfig) -> Result<Vec<AdaptationHandle>> {
        if config.name != self.name {
            bail!(
                "Cannot rename switch '{}' to '{}' through a settings change",
                self.name,
                config.name
            );
        }
        validate_switch(&config)?;
        let settings = SunLightSettings::from_config(&self.location, &config)?;
        let transition = config.transition;

        write(&self.settings, Arc::new(settings));
        write(&self.config, Arc::new(config));
        log_info!("Switch '{}': settings changed", self.name);

        if !self.is_enabled() {
            return Ok(Vec::new());
        }
        let context = self.create_context(ActionKind::Config);
        Ok(self.update_all_lights(context, transition, false).await)
    }

    pub async fn set_sleep_mode(&self, on: bool) -> Vec<AdaptationHandle> {
        if self.sleep_mode.swap(on, Ordering::SeqCst) == on {
            return Vec::new();
        }
        log_info!(
            "Switch '{}': sleep mode {}",
            self.name,
            if on { "on" } else { "off" }
        );
        if !self.is_enabled() {
            return Vec::new();
        }
        let context = self.create_context(ActionKind::Sleep);
        self.update_all_lights(context, self.config().sleep_transition, false)
            .await
    }

    /// Turning a switch off releases its lights; turning it on adapts them.
    pub async fn set_enabled(&self, on: bool) -> Vec<AdaptationHandle> {
        if self.enabled.swap(on, Ordering::SeqCst) == on {
            return Vec::new();
        }
        log_info!(
            "Switch '{}' {}",
            self.name,
            if on { "enabled" } else { "disabled" }
        );
        if !on {
            for light in self.lights() {
                self.manager.cancel_adaptation(&light);
                self.manager.reset(&light);
            }
            return Vec::new();
        }
        let context = self.create_context(ActionKind::Config);
        self.update_all_lights(context, self.config().transition, false)
            .await
    }

    /// Latest reading of the illuminance sensor, used by lux mode.
    pub fn set_illuminance(&self, lux: Option<f64>) {
        *self.illuminance.lock().unwrap_or_else(|e| e.into_inner()) = lux;
        if let Some(lux) = lux {
            log_debug!("Switch '{}': illuminance {lux} lx", self.name);
        }
    }

    pub fn set_adapt_brightness(&self, on: bool) {
        self.adapt_brightness.store(on, Ordering::SeqCst);
    }

    pub fn set_adapt_color(&self, on: bool) {
        self.adapt_color.store(on, Ordering::SeqCst);
    }

    /// Requested lights, or every light of the switch when none are given.
    fn resolve_lights(&self, lights: &[String]) -> Result<Vec<String>> {
        if lights.is_empty() {
            return Ok(self.lights());
        }
        if let Some(unknown) = lights.iter().find(|l| !self.owns(l)) {
            bail!("Light '{unknown}' is not part of switch '{}'", self.name);
        }
        Ok(lights.to_vec())
    }
}
