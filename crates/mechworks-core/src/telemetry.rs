//! Per-mechanism telemetry: published channel values, resolved actuator
//! actions, and the keyed cache observers read them through.
//!
//! Every publish bumps the channel's `revision`, so an observer holding an
//! older snapshot can tell it is stale by comparing revisions.

use std::collections::BTreeMap;
use std::convert::Infallible;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::id::{ChannelId, MechanismId, SubscriptionId};
use crate::store::{ActivationHook, SnapshotStore};

/// Free-form display metadata attached to a channel (labels, units, ...).
pub type Metadata = BTreeMap<String, String>;

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// A value carried on a telemetry or actuator channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignalValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

impl SignalValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            SignalValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            SignalValue::Flag(b) => Some(*b),
            _ => None,
        }
    }
}

impl std::fmt::Display for SignalValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalValue::Flag(b) => write!(f, "{b}"),
            SignalValue::Number(n) => write!(f, "{n}"),
            SignalValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for SignalValue {
    fn from(value: f64) -> Self {
        SignalValue::Number(value)
    }
}

impl From<bool> for SignalValue {
    fn from(value: bool) -> Self {
        SignalValue::Flag(value)
    }
}

impl From<&str> for SignalValue {
    fn from(value: &str) -> Self {
        SignalValue::Text(value.to_string())
    }
}

/// The last value published on a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryReading {
    pub value: SignalValue,
    pub metadata: Metadata,
    pub revision: u64,
}

/// The last resolved command on an actuator channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryAction {
    pub metadata: Metadata,
    pub revision: u64,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub values: BTreeMap<ChannelId, TelemetryReading>,
    pub actions: BTreeMap<ChannelId, TelemetryAction>,
}

impl TelemetrySnapshot {
    pub const EMPTY: TelemetrySnapshot = TelemetrySnapshot {
        values: BTreeMap::new(),
        actions: BTreeMap::new(),
    };

    pub fn value(&self, channel: &ChannelId) -> Option<&SignalValue> {
        self.values.get(channel).map(|r| &r.value)
    }

    pub fn revision(&self, channel: &ChannelId) -> u64 {
        self.values.get(channel).map(|r| r.revision).unwrap_or(0)
    }

    /// Overwrite a channel value, bump its revision and merge `metadata`
    /// into the existing metadata (incoming keys win).
    pub(crate) fn publish_value(&mut self, channel: ChannelId, value: SignalValue, metadata: Metadata) {
        let reading = self
            .values
            .entry(channel)
            .or_insert_with(|| TelemetryReading {
                value: value.clone(),
                metadata: Metadata::new(),
                revision: 0,
            });
        reading.value = value;
        reading.metadata.extend(metadata);
        reading.revision += 1;
    }

    /// Record the winning command for an actuator channel.
    pub(crate) fn record_action(&mut self, channel: ChannelId, metadata: Metadata) {
        let action = self.actions.entry(channel).or_insert_with(|| TelemetryAction {
            metadata: Metadata::new(),
            revision: 0,
        });
        action.metadata = metadata;
        action.revision += 1;
    }
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

/// What telemetry listeners observe: a snapshot and the mechanism it
/// belongs to (`None` after a clear).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TelemetryFrame {
    pub mechanism: Option<MechanismId>,
    pub snapshot: TelemetrySnapshot,
}

/// Telemetry snapshots keyed by mechanism, with one active mechanism.
///
/// Listeners are told about every stored snapshot, active or not, and are
/// responsible for filtering on the reported mechanism id. Subscribing
/// replays the active mechanism's snapshot.
#[derive(Debug, Default)]
pub struct TelemetryCache {
    entries: BTreeMap<MechanismId, TelemetrySnapshot>,
    active: Option<MechanismId>,
    store: SnapshotStore<TelemetryFrame>,
}

impl TelemetryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &mut self,
        mut listener: impl FnMut(&TelemetrySnapshot, Option<&MechanismId>) + 'static,
    ) -> SubscriptionId {
        self.store
            .subscribe(move |frame: &TelemetryFrame| listener(&frame.snapshot, frame.mechanism.as_ref()))
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.store.unsubscribe(id)
    }

    pub fn set_activation_handlers(
        &mut self,
        on_active: Option<ActivationHook>,
        on_inactive: Option<ActivationHook>,
    ) {
        self.store.set_activation_handlers(on_active, on_inactive);
    }

    pub fn is_observed(&self) -> bool {
        self.store.is_observed()
    }

    pub fn active(&self) -> Option<&MechanismId> {
        self.active.as_ref()
    }

    pub fn cached(&self, mechanism: &MechanismId) -> Option<&TelemetrySnapshot> {
        self.entries.get(mechanism)
    }

    /// The active mechanism's snapshot, or the empty snapshot.
    pub fn current(&self) -> &TelemetrySnapshot {
        &self.store.current().snapshot
    }

    /// Cache `snapshot` under `mechanism`, make it active and notify.
    pub fn set_active_snapshot(&mut self, snapshot: TelemetrySnapshot, mechanism: MechanismId) {
        self.entries.insert(mechanism.clone(), snapshot.clone());
        self.active = Some(mechanism.clone());
        self.store.set_snapshot(TelemetryFrame {
            mechanism: Some(mechanism),
            snapshot,
        });
    }

    /// Cache `snapshot` under `mechanism` without changing the active
    /// mechanism. Listeners are still notified with the reported id.
    pub fn store_snapshot(&mut self, snapshot: TelemetrySnapshot, mechanism: MechanismId) {
        self.entries.insert(mechanism.clone(), snapshot.clone());
        let frame = TelemetryFrame {
            mechanism: Some(mechanism),
            snapshot,
        };
        if self.active == frame.mechanism {
            self.store.set_snapshot(frame);
        } else {
            self.store.broadcast(&frame);
        }
    }

    /// Activate `mechanism`, fetching its snapshot only if none is cached.
    /// `fetch` runs at most once and never for a cached mechanism.
    pub fn activate_mechanism(
        &mut self,
        mechanism: &MechanismId,
        fetch: impl FnOnce(&MechanismId) -> TelemetrySnapshot,
    ) -> &TelemetrySnapshot {
        match self.try_activate_mechanism(mechanism, |id| Ok::<_, Infallible>(fetch(id))) {
            Ok(snapshot) => snapshot,
            Err(never) => match never {},
        }
    }

    /// Fallible form of [`activate_mechanism`](Self::activate_mechanism).
    /// A failed fetch leaves the cache and active mechanism unchanged.
    pub fn try_activate_mechanism<E>(
        &mut self,
        mechanism: &MechanismId,
        fetch: impl FnOnce(&MechanismId) -> Result<TelemetrySnapshot, E>,
    ) -> Result<&TelemetrySnapshot, E> {
        let snapshot = match self.entries.get(mechanism) {
            Some(cached) => cached.clone(),
            None => {
                debug!(mechanism = %mechanism, "telemetry cache miss, fetching");
                fetch(mechanism)?
            }
        };
        self.set_active_snapshot(snapshot, mechanism.clone());
        Ok(&self.store.current().snapshot)
    }

    /// Drop every cached entry, deactivate, and notify with the empty frame.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.active = None;
        self.store.clear();
    }
}

// ===========================================================================
// Tests
// ===========================================================================
