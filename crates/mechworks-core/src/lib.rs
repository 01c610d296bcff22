//! Mechworks Core -- resource and control state for modular mechanisms.
//!
//! This crate provides the slot-based inventory ledger, the reactive snapshot
//! stores observers subscribe to, the per-mechanism telemetry cache, and the
//! module/port system that mounted modules use to publish telemetry and
//! compete for actuators.
//!
//! # Tick
//!
//! Each call to [`mechanism::Mechanism::step`] advances one mechanism by one
//! tick:
//!
//! 1. **Update** -- Every mounted module runs, in attachment order, through
//!    its [`port::Port`].
//! 2. **Arbitrate** -- Actuator requests are resolved per channel: highest
//!    priority wins, ties go to the earliest request.
//! 3. **Record** -- Winning commands are written to the telemetry `actions`
//!    map and returned in a [`mechanism::TickReport`].
//!
//! # Snapshot Pattern
//!
//! State is never handed out by reference to observers. Every successful
//! mutation publishes a complete snapshot, and a new subscriber is replayed
//! the current snapshot before anything else:
//!
//! ```rust,ignore
//! let mut ledger = InventoryLedger::new(DEFAULT_SLOT_CAPACITY);
//! let id = ledger.subscribe(|s| println!("{} used", s.used));
//! ledger.store(&"ore".into(), 3)?;
//! ledger.unsubscribe(id);
//! ```
//!
//! # Key Types
//!
//! - [`ledger::InventoryLedger`] -- Fixed slot schema with store, remove,
//!   transactional transfers, and capacity sources.
//! - [`store::SnapshotStore`] -- Replay-on-subscribe broadcaster with
//!   activation hooks on the first and last subscriber.
//! - [`telemetry::TelemetryCache`] -- Telemetry snapshots keyed by mechanism
//!   with cache-or-fetch activation.
//! - [`module::Module`] -- Trait implemented by mountable modules.
//! - [`registry::ModuleRegistry`] -- Kind-name -> factory lookup.
//! - [`simulation::Simulation`] -- Context object owning mechanisms, the
//!   telemetry cache, and the registry.
//! - [`command::LedgerCommand`] -- JSON commands applied to a ledger.

pub mod command;
pub mod id;
pub mod ledger;
pub mod mechanism;
pub mod module;
pub mod modules;
pub mod port;
pub mod registry;
pub mod simulation;
pub mod slot;
pub mod snapshot;
pub mod store;
pub mod telemetry;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
