use tracing::warn;

use crate::duration::DurationParseError;
use crate::error::RowSkipReason;

/// Something the pipeline chose to tolerate rather than fail on.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum IngestEvent {
    RowSkipped {
        file_name: String,
        row_index: usize,
        reason: RowSkipReason,
    },
    DurationParseFailure {
        file_name: String,
        row_index: usize,
        field: &'static str,
        error: DurationParseError,
    },
    StepOffsetFallback {
        file_name: String,
        offset: usize,
    },
}

pub(crate) trait IngestSink {
    fn record(&mut self, event: IngestEvent);
}

/// Holds one file's events until its transaction is settled.
#[derive(Debug, Default)]
pub(crate) struct PendingEvents {
    events: Vec<IngestEvent>,
}

impl PendingEvents {
    /// Hands the held events to `sink` once the file's work has committed.
    pub fn flush_into(self, sink: &mut dyn IngestSink) {
        for event in self.events {
            sink.record(event);
        }
    }

    /// Drops the held events of a rolled-back file, returning how many there were.
    pub fn discard(self) -> usize {
        self.events.len()
    }
}

impl IngestSink for PendingEvents {
    fn record(&mut self, event: IngestEvent) {
        self.events.push(event);
    }
}

/// Logs every event and keeps it for the run manifest and for tests.
#[derive(Debug, Default)]
pub(crate) struct EventLog {
    events: Vec<IngestEvent>,
}

impl EventLog {
    #[cfg(test)]
    pub fn events(&self) -> &[IngestEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[cfg(test)]
    pub fn skipped(&self) -> Vec<(usize, RowSkipReason)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                IngestEvent::RowSkipped {
                    row_index, reason, ..
                } => Some((*row_index, reason.clone())),
                _ => None,
            })
            .collect()
    }
}

impl IngestSink for EventLog {
    fn record(&mut self, event: IngestEvent) {
        match &event {
            IngestEvent::RowSkipped {
                file_name,
                row_index,
                reason,
            } => {
                warn!(file = %file_name, row = row_index, reason = %reason, "skipped row");
            }
            IngestEvent::DurationParseFailure {
                file_name,
                row_index,
                field,
                error,
            } => {
                warn!(
                    file = %file_name,
                    row = row_index,
                    field = *field,
                    error = %error,
                    "stored unparseable duration as null"
                );
            }
            IngestEvent::StepOffsetFallback { file_name, offset } => {
                warn!(
                    file = %file_name,
                    offset = offset,
                    "no total-duration column; step columns taken from fallback offset, flagged for review"
                );
            }
        }
        self.events.push(event);
    }
}
