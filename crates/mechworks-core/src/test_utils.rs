//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use std::cell::RefCell;
use std::rc::Rc;

use crate::id::{ResourceId, SlotId};
use crate::ledger::{BASE_CAPACITY_SOURCE, InventoryLedger};
use crate::mechanism::{Mechanism, MountPoint};
use crate::module::{Attachment, ModuleDescriptor};
use crate::modules::drive::{Drive, DriveParams};
use crate::modules::scanner::{Scanner, ScannerParams};
use crate::snapshot::InventorySnapshot;

// ===========================================================================
// Resource constructors
// ===========================================================================

pub fn ore() -> ResourceId {
    ResourceId::from("ore")
}
pub fn ice() -> ResourceId {
    ResourceId::from("ice")
}
pub fn fuel_cell() -> ResourceId {
    ResourceId::from("fuel-cell")
}

pub fn slot(index: usize) -> SlotId {
    SlotId::inventory(index)
}

// ===========================================================================
// Ledger builders
// ===========================================================================

/// A ledger with `slots` default slots and a base capacity of `capacity`.
pub fn ledger(slots: usize, capacity: i64) -> InventoryLedger {
    let mut ledger = InventoryLedger::new(slots);
    ledger.register_capacity_source(BASE_CAPACITY_SOURCE, capacity);
    ledger
}

/// Subscribe to the ledger and collect every snapshot it publishes,
/// including the replayed one.
pub fn record_inventory(ledger: &mut InventoryLedger) -> Rc<RefCell<Vec<InventorySnapshot>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    ledger.subscribe(move |snapshot: &InventorySnapshot| sink.borrow_mut().push(snapshot.clone()));
    seen
}

// ===========================================================================
// Mechanism builders
// ===========================================================================

/// A mechanism with two actuator bays, one sensor bay and a 6-slot ledger.
pub fn rover(id: &str) -> Mechanism {
    Mechanism::new(
        id,
        ledger(6, 12),
        &[
            MountPoint::new("drive-bay", 0).accepting("actuator"),
            MountPoint::new("drive-bay", 1).accepting("actuator"),
            MountPoint::new("sensor-bay", 0),
        ],
    )
}

pub fn drive(id: &str, bay: u32, priority: i32, throttle: f64) -> Box<Drive> {
    Box::new(Drive::new(
        ModuleDescriptor::new(id, id, Attachment::new("drive-bay", bay)),
        DriveParams {
            priority,
            default_throttle: throttle,
            ..DriveParams::default()
        },
    ))
}

pub fn scanner(id: &str, step: f64) -> Box<Scanner> {
    Box::new(Scanner::new(
        ModuleDescriptor::new(id, "Scanner", Attachment::new("sensor-bay", 0)),
        ScannerParams {
            step,
            ..ScannerParams::default()
        },
    ))
}
