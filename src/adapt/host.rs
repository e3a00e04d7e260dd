//! Boundary to the home-automation host.
//!
//! The host owns the lights. We read their (possibly stale) state, ask for a
//! refresh, and send `turn_on` commands tagged with a [`Context`]. Everything
//! the host observes comes back to us as an [`Event`].

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use super::context::ContextId;
use super::service_data::ServiceData;

/// Causal context attached to every command and event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Context {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl Context {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent_id: None,
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Whether this context was created by this crate.
    pub fn is_ours(&self) -> bool {
        ContextId::is_ours(&self.id)
    }

    /// Whether `id` is this context or its parent.
    pub fn matches(&self, id: &str) -> bool {
        self.id == id || self.parent_id.as_deref() == Some(id)
    }
}

impl From<&ContextId> for Context {
    fn from(id: &ContextId) -> Self {
        Context::new(id.to_wire())
    }
}

/// Color modes a light can report or support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    OnOff,
    Brightness,
    ColorTemp,
    Hs,
    Xy,
    Rgb,
    Rgbw,
    Rgbww,
    White,
}

impl ColorMode {
    pub fn is_color(&self) -> bool {
        matches!(
            self,
            ColorMode::Hs | ColorMode::Xy | ColorMode::Rgb | ColorMode::Rgbw | ColorMode::Rgbww
        )
    }
}

/// The host's view of a light.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LightState {
    pub on: bool,
    /// 0-255 device scale
    pub brightness: Option<u8>,
    pub color_mode: Option<ColorMode>,
    pub color_temp_kelvin: Option<u32>,
    pub rgb_color: Option<[u8; 3]>,
    pub xy_color: Option<(f64, f64)>,
    pub hs_color: Option<(f64, f64)>,
    pub supported_color_modes: Vec<ColorMode>,
    pub min_color_temp_kelvin: Option<u32>,
    pub max_color_temp_kelvin: Option<u32>,
}

impl LightState {
    pub fn off() -> Self {
        Self::default()
    }

    pub fn supports_brightness(&self) -> bool {
        self.supported_color_modes
            .iter()
            .any(|m| *m != ColorMode::OnOff)
    }

    pub fn supports_color_temp(&self) -> bool {
        self.supported_color_modes.contains(&ColorMode::ColorTemp)
    }

    pub fn supports_color(&self) -> bool {
        self.supported_color_modes.iter().any(ColorMode::is_color)
    }
}

/// Light services we observe and issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightService {
    TurnOn,
    TurnOff,
    Toggle,
}

impl LightService {
    pub fn as_str(&self) -> &'static str {
        match self {
            LightService::TurnOn => "turn_on",
            LightService::TurnOff => "turn_off",
            LightService::Toggle => "toggle",
        }
    }
}

/// A light service call observed on the host's bus.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceCallEvent {
    pub service: LightService,
    pub data: ServiceData,
    pub context: Context,
}

/// A light state transition observed on the host's bus.
#[derive(Debug, Clone, PartialEq)]
pub struct StateChangedEvent {
    pub entity_id: String,
    pub old_state: Option<LightState>,
    pub new_state: Option<LightState>,
    pub context: Context,
}

impl StateChangedEvent {
    pub fn was_on(&self) -> bool {
        self.old_state.as_ref().is_some_and(|s| s.on)
    }

    pub fn is_on(&self) -> bool {
        self.new_state.as_ref().is_some_and(|s| s.on)
    }
}

/// Everything the dispatcher reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    ServiceCall(ServiceCallEvent),
    StateChanged(StateChangedEvent),
    /// Periodic re-adaptation of one switch
    Tick { switch: String },
    /// Manual control of a light expired
    AutoReset { light: String },
}

/// Capabilities consumed from the host.
#[async_trait]
pub trait LightHost: Send + Sync {
    /// Last known state of a light; may be stale until refreshed.
    async fn light_state(&self, entity_id: &str) -> Option<LightState>;

    /// Ask the light for its current state.
    async fn refresh_state(&self, entity_id: &str) -> Result<()>;

    /// Send a `turn_on` command.
    async fn turn_on(&self, data: ServiceData, context: Context) -> Result<()>;
}

#[cfg(any(test, feature = "testing-support"))]
pub mod testing {
    //! In-memory host that records every command it receives.

    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    pub struct SentCommand {
        pub data: ServiceData,
        pub context: Context,
        pub at: tokio::time::Instant,
    }

    /// Lights live in a map; `turn_on` applies the command to the stored
    /// state so later filtering sees the result.
    #[derive(Default)]
    pub struct RecordingHost {
        states: Mutex<HashMap<String, LightState>>,
        sent: Mutex<Vec<SentCommand>>,
        refreshes: Mutex<Vec<String>>,
        apply_commands: bool,
    }

    impl RecordingHost {
        pub fn new() -> Self {
            Self {
                apply_commands: true,
                ..Default::default()
            }
        }

        /// Record commands without changing the stored state.
        pub fn frozen() -> Self {
            Self::default()
        }

        pub fn set_state(&self, entity_id: &str, state: LightState) {
            self.states
                .lock()
                .unwrap()
                .insert(entity_id.to_string(), state);
        }

        pub fn state(&self, entity_id: &str) -> Option<LightState> {
            self.states.lock().unwrap().get(entity_id).cloned()
        }

        pub fn sent(&self) -> Vec<SentCommand> {
            self.sent.lock().unwrap().clone()
        }

        pub fn sent_to(&self, entity_id: &str) -> Vec<SentCommand> {
            self.sent()
                .into_iter()
                .filter(|c| c.data.entity_id.iter().any(|e| e == entity_id))
                .collect()
        }

        pub fn clear_sent(&self) {
            self.sent.lock().unwrap().clear();
        }

        pub fn refreshes(&self) -> Vec<String> {
            self.refreshes.lock().unwrap().clone()
        }
    }

    /// Apply a command to a stored state, as a light would.
    fn apply_command(data: &ServiceData, state: &mut LightState) {
        state.on = true;
        if let Some(value) = data.brightness_value() {
            state.brightness = Some(value);
        } else if state.brightness.is_none() {
            state.brightness = Some(255);
        }
        if let Some(kelvin) = data.color_temp_kelvin {
            state.color_temp_kelvin = Some(kelvin);
            state.color_mode = Some(ColorMode::ColorTemp);
            state.rgb_color = None;
        } else if let Some(rgb) = data.rgb_color {
            state.rgb_color = Some(rgb);
            state.color_mode = Some(ColorMode::Rgb);
            state.color_temp_kelvin = None;
        }
    }

    /// A dimmable color light that is on.
    pub fn color_light_on() -> LightState {
        LightState {
            on: true,
            brightness: Some(255),
            color_mode: Some(ColorMode::ColorTemp),
            color_temp_kelvin: Some(4000),
            supported_color_modes: vec![ColorMode::ColorTemp, ColorMode::Rgb],
            min_color_temp_kelvin: Some(2000),
            max_color_temp_kelvin: Some(6500),
            ..Default::default()
        }
    }

    /// The same light, switched off.
    pub fn color_light_off() -> LightState {
        LightState {
            on: false,
            brightness: None,
            color_mode: None,
            color_temp_kelvin: None,
            ..color_light_on()
        }
    }

    #[async_trait]
    impl LightHost for RecordingHost {
        async fn light_state(&self, entity_id: &str) -> Option<LightState> {
            self.state(entity_id)
        }

        async fn refresh_state(&self, entity_id: &str) -> Result<()> {
            self.refreshes.lock().unwrap().push(entity_id.to_string());
            Ok(())
        }

        async fn turn_on(&self, data: ServiceData, context: Context) -> Result<()> {
            if self.apply_commands {
                let mut states = self.states.lock().unwrap();
                for entity_id in &data.entity_id {
                    let state = states.entry(entity_id.clone()).or_default();
                    apply_command(&data, state);
                }
            }
            self.sent.lock().unwrap().push(SentCommand {
                data,
                context,
                at: tokio::time::Instant::now(),
            });
            Ok(())
        }
    }
}
