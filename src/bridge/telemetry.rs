//! Recorded telemetry buffer.

use crate::core::DATA_PAYLOAD_LEN;

/// Samples accumulated across record requests until flushed.
///
/// The buffer lives for one pairing session: it is drained by a flush and
/// released on unpair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordedTelemetry {
    samples: Vec<u16>,
}

impl RecordedTelemetry {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one record.
    pub fn push(&mut self, record: &[u16]) {
        self.samples.extend_from_slice(record);
    }

    /// Number of samples held.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if no sample is held.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples held, oldest first.
    pub fn as_slice(&self) -> &[u16] {
        &self.samples
    }

    /// Number of Data replies a flush would produce.
    pub fn chunk_count(&self) -> usize {
        self.samples.len().div_ceil(DATA_PAYLOAD_LEN)
    }

    /// Take every sample, leaving the buffer empty and unallocated.
    pub fn take(&mut self) -> Vec<u16> {
        std::mem::take(&mut self.samples)
    }

    /// Drop every sample and free the allocation.
    pub fn release(&mut self) {
        self.samples = Vec::new();
    }

    /// Allocated capacity, in samples.
    pub fn capacity(&self) -> usize {
        self.samples.capacity()
    }
}
