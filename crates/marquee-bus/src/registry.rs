//! Well-known slot holding the one bus every fragment must share.
//!
//! Fragments never construct an [`EventBus`] themselves; they ask a
//! [`BusRegistry`] for it. The first caller creates the bus, every later
//! caller gets the same instance. Tests build their own registry instead of
//! touching the process slot.

use crate::bus::EventBus;
use std::sync::OnceLock;

static PROCESS: BusRegistry = BusRegistry::new();

#[derive(Default)]
pub struct BusRegistry {
    slot: OnceLock<EventBus>,
}

impl BusRegistry {
    pub const fn new() -> Self {
        Self {
            slot: OnceLock::new(),
        }
    }

    /// The registry shared by the whole process.
    pub fn process() -> &'static BusRegistry {
        &PROCESS
    }

    /// Returns the registered bus, creating it on first use.
    pub fn bus(&self) -> EventBus {
        self.slot
            .get_or_init(|| {
                tracing::info!("event bus created");
                EventBus::new()
            })
            .clone()
    }

    /// Registers `bus` if the slot is empty. Returns whichever bus ended up
    /// in the slot; an existing bus is never replaced.
    pub fn install(&self, bus: EventBus) -> EventBus {
        let installed = self.slot.get_or_init(|| bus.clone());
        if !installed.same_bus(&bus) {
            tracing::debug!("event bus already registered, keeping existing instance");
        }
        installed.clone()
    }

    pub fn get(&self) -> Option<EventBus> {
        self.slot.get().cloned()
    }
}

/// Shorthand for `BusRegistry::process().bus()`.
pub fn global_bus() -> EventBus {
    BusRegistry::process().bus()
}
