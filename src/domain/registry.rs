use crate::domain::models::{AdvertisedPeripheral, PeripheralRecord};

/// Latest snapshot of visible peripherals
#[derive(Debug, Default)]
pub struct DiscoveryRegistry {
    records: Vec<PeripheralRecord>,
}

impl DiscoveryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a new batch, keeping the order the radio reported it in.
    /// Returns the stored snapshot so callers can publish it.
    pub fn replace(&mut self, batch: &[AdvertisedPeripheral]) -> &[PeripheralRecord] {
        self.records = batch
            .iter()
            .map(PeripheralRecord::from_advertisement)
            .collect();
        &self.records
    }

    pub fn find_by_address(&self, address: &str) -> Option<&PeripheralRecord> {
        self.records.iter().find(|record| record.matches(address))
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
