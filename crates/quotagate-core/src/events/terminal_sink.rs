use std::io::Write;
use std::sync::{Mutex, PoisonError};

use tracing::warn;

use super::{Event, EventSink};

/// Writes quota events as JSON lines, to stderr unless another writer is
/// given. Lines from concurrent emitters never interleave.
pub struct TerminalEventSink {
    out: Mutex<Box<dyn Write + Send>>,
}

impl TerminalEventSink {
    pub fn new() -> Self {
        Self::with_writer(std::io::stderr())
    }

    pub fn with_writer(out: impl Write + Send + 'static) -> Self {
        Self {
            out: Mutex::new(Box::new(out)),
        }
    }
}

impl Default for TerminalEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for TerminalEventSink {
    fn write(&self, event: &Event) {
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(err) => {
                warn!(event = "event_serialize_failed", error = %err);
                return;
            }
        };
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(err) = writeln!(out, "{line}").and_then(|()| out.flush()) {
            warn!(event = "event_write_failed", error = %err);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration, SystemTime};

    use super::*;
    use crate::events::{OperationalEvent, QuotaGroupClearedEvent};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn writes_one_json_line_per_event() {
        let captured = Captured::default();
        let sink = TerminalEventSink::with_writer(captured.clone());
        let event = Event::Operational(OperationalEvent::QuotaGroupCleared(QuotaGroupClearedEvent {
            at: SystemTime::UNIX_EPOCH + Duration::from_secs(5),
            credential_id: 3,
            provider: "antigravity".to_string(),
            group: "claude".to_string(),
        }));
        sink.write(&event);
        sink.write(&event);

        let text = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        let cleared = &value["Operational"]["QuotaGroupCleared"];
        assert_eq!(cleared["credential_id"], 3);
        assert_eq!(cleared["group"], "claude");
    }
}
