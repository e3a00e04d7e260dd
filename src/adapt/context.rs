//! Context identities for commands created by this crate.
//!
//! Every command we send carries a context id so that the state changes it
//! causes can be recognised when they come back as events. The id is kept
//! structured internally and only rendered to its fixed-width wire form when
//! handed to the host:
//!
//! ```text
//! {minute bucket}:al:{group hash}:{kind}:{counter}
//! ```
//!
//! All fields except the tag are base36 or hex, so `:al:` never appears by
//! accident inside one of them.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::common::constants::{CONTEXT_ID_WIDTH, INTEGRATION_TAG};

/// Why a command was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Periodic re-adaptation
    Interval,
    /// Explicit apply service
    Apply,
    /// Light turned on
    OffToOn,
    /// Rewritten or re-issued turn_on call
    Intercept,
    /// Manual control expired
    AutoReset,
    /// Sleep mode toggled
    Sleep,
    /// Settings changed
    Config,
}

impl ActionKind {
    pub fn abbreviation(&self) -> &'static str {
        match self {
            ActionKind::Interval => "int",
            ActionKind::Apply => "apl",
            ActionKind::OffToOn => "ofn",
            ActionKind::Intercept => "icp",
            ActionKind::AutoReset => "rst",
            ActionKind::Sleep => "slp",
            ActionKind::Config => "cfg",
        }
    }

    pub fn from_abbreviation(value: &str) -> Option<Self> {
        Some(match value {
            "int" => ActionKind::Interval,
            "apl" => ActionKind::Apply,
            "ofn" => ActionKind::OffToOn,
            "icp" => ActionKind::Intercept,
            "rst" => ActionKind::AutoReset,
            "slp" => ActionKind::Sleep,
            "cfg" => ActionKind::Config,
            _ => return None,
        })
    }
}

/// Structured context id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextId {
    /// Minutes since the Unix epoch
    pub bucket: u64,
    /// First six hex digits of the SHA-256 of the group name
    pub group_hash: String,
    pub kind: ActionKind,
    /// Per-group sequence number
    pub counter: u64,
}

impl ContextId {
    pub fn new(group: &str, kind: ActionKind, counter: u64, at: DateTime<Utc>) -> Self {
        Self {
            bucket: (at.timestamp().max(0) / 60) as u64,
            group_hash: group_hash(group),
            kind,
            counter,
        }
    }

    /// Fixed-width wire form; the counter is zero-padded to fill the width.
    pub fn to_wire(&self) -> String {
        let prefix = format!(
            "{}:{}:{}:{}:",
            to_base36(self.bucket),
            INTEGRATION_TAG,
            self.group_hash,
            self.kind.abbreviation()
        );
        let room = CONTEXT_ID_WIDTH.saturating_sub(prefix.len());
        let counter = to_base36(self.counter);
        // Keep the low-order digits when the counter outgrows its field
        let counter = &counter[counter.len().saturating_sub(room)..];
        let mut wire = format!("{prefix}{counter:0>room$}");
        wire.truncate(CONTEXT_ID_WIDTH);
        wire
    }

    /// Parse a wire id produced by [`to_wire`](Self::to_wire).
    pub fn parse(wire: &str) -> Option<Self> {
        let mut parts = wire.split(':');
        let bucket = from_base36(parts.next()?)?;
        if parts.next()? != INTEGRATION_TAG {
            return None;
        }
        let group_hash = parts.next()?.to_string();
        let kind = ActionKind::from_abbreviation(parts.next()?)?;
        let counter = from_base36(parts.next()?)?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self {
            bucket,
            group_hash,
            kind,
            counter,
        })
    }

    /// Whether a wire id was created by this crate.
    pub fn is_ours(wire: &str) -> bool {
        wire.contains(&format!(":{INTEGRATION_TAG}:"))
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

/// Monotonic per-group counter.
#[derive(Debug, Default)]
pub struct ContextCounter(AtomicU64);

impl ContextCounter {
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

pub fn group_hash(group: &str) -> String {
    sha256::digest(group)[..6].to_string()
}

pub fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

pub fn from_base36(value: &str) -> Option<u64> {
    if value.is_empty() {
        return None;
    }
    u64::from_str_radix(value, 36).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 20, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_wire_form_is_fixed_width_and_tagged() {
        let id = ContextId::new("living_room", ActionKind::Interval, 7, at());
        let wire = id.to_wire();
        assert_eq!(wire.len(), CONTEXT_ID_WIDTH);
        assert!(ContextId::is_ours(&wire));
        assert!(wire.contains(":int:"));
        assert!(wire.ends_with('7'));
    }

    #[test]
    fn test_parse_recovers_fields() {
        let id = ContextId::new("kitchen", ActionKind::OffToOn, 1234, at());
        assert_eq!(ContextId::parse(&id.to_wire()), Some(id));
    }

    #[test]
    fn test_foreign_ids_are_not_ours() {
        assert!(!ContextId::is_ours("01HRX4Q5Z6W7Y8V9T0S1R2Q3P4"));
        assert!(ContextId::parse("01HRX4Q5Z6W7Y8V9T0S1R2Q3P4").is_none());
        assert!(ContextId::parse("abc:xx:123456:int:1").is_none());
    }

    #[test]
    fn test_group_hash_is_stable_hex() {
        let hash = group_hash("living_room");
        assert_eq!(hash.len(), 6);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, group_hash("living_room"));
        assert_ne!(hash, group_hash("kitchen"));
    }

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(from_base36("10"), Some(36));
        assert_eq!(from_base36("000z"), Some(35));
        assert_eq!(from_base36(""), None);
    }

    #[test]
    fn test_counter_is_monotonic() {
        let counter = ContextCounter::default();
        assert_eq!(counter.next(), 0);
        assert_eq!(counter.next(), 1);
        assert_eq!(counter.next(), 2);
    }
}
