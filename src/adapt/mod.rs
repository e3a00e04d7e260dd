//! Commands, contexts and the host boundary.
//!
//! ## Module Structure
//!
//! - [`context`]: structured context ids and their 26-character wire form
//! - [`host`]: the [`LightHost`] trait, light state and observed events
//! - [`service_data`]: typed `turn_on` payloads and redundancy filtering
//! - [`data`]: capability shaping and the brightness/color splitter

pub mod context;
pub mod data;
pub mod host;
pub mod service_data;

pub use context::{ActionKind, ContextCounter, ContextId};
pub use data::{AdaptationData, Shaping, Which, prepare_adaptation, prepare_service_data};
pub use host::{
    ColorMode, Context, Event, LightHost, LightService, LightState, ServiceCallEvent,
    StateChangedEvent,
};
pub use service_data::ServiceData;
