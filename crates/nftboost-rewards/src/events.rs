//! Ordered in-process event log.
//!
//! The controller appends a record for every successful state change.
//! Consumers either read the full history or drain it.

use nftboost_types::events::{EventRecord, RewardsEvent};
use nftboost_types::BlockNumber;

#[derive(Debug, Clone, Default)]
pub struct EventLog {
    records: Vec<EventRecord>,
    sequence: u64,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event, assigning the next sequence number.
    pub fn emit(&mut self, block: BlockNumber, event: RewardsEvent) {
        self.sequence += 1;
        tracing::debug!(sequence = self.sequence, block, event = event.name(), "event emitted");
        self.records.push(EventRecord {
            sequence: self.sequence,
            block,
            event,
        });
    }

    /// Records not yet drained, oldest first.
    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// Take every buffered record. Sequence numbers keep counting.
    pub fn drain(&mut self) -> Vec<EventRecord> {
        std::mem::take(&mut self.records)
    }

    /// Sequence number of the last emitted event.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn removed(byte: u8) -> RewardsEvent {
        RewardsEvent::CollectionRemoved {
            collection: [byte; 32],
        }
    }

    #[test]
    fn test_sequence_is_monotonic_across_drains() {
        let mut log = EventLog::new();
        log.emit(1, removed(1));
        log.emit(2, removed(2));
        let drained = log.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].sequence, 1);
        assert_eq!(drained[1].sequence, 2);
        assert!(log.records().is_empty());

        log.emit(3, removed(3));
        assert_eq!(log.records()[0].sequence, 3);
        assert_eq!(log.sequence(), 3);
    }
}
