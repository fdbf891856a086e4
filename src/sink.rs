// src/sink.rs
//
// Consumers of referee decisions and pipeline events. Scoring, turns and
// persistence live on the other side of `DecisionSink`.

use crate::pipeline::event_bus::PipelineEvent;
use crate::types::BallId;
use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

pub trait DecisionSink {
    fn pot(&mut self, ball: BallId);
    fn foul(&mut self);
}

/// Logs decisions and does nothing else.
#[derive(Debug, Default)]
pub struct LoggingSink;

impl DecisionSink for LoggingSink {
    fn pot(&mut self, ball: BallId) {
        info!("→ pot({})", ball);
    }

    fn foul(&mut self) {
        info!("→ foul()");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordedDecision {
    Pot(BallId),
    Foul,
}

/// Keeps every decision in order, for tests and replays.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub decisions: Vec<RecordedDecision>,
}

impl DecisionSink for RecordingSink {
    fn pot(&mut self, ball: BallId) {
        self.decisions.push(RecordedDecision::Pot(ball));
    }

    fn foul(&mut self) {
        self.decisions.push(RecordedDecision::Foul);
    }
}

// ============================================================================
// JSON LINES OUTPUT
// ============================================================================

#[derive(Serialize)]
struct EventRecord<'a> {
    logged_at: String,
    #[serde(flatten)]
    event: &'a PipelineEvent,
}

/// One JSON object per line, each stamped with the wall-clock time it was
/// written.
pub struct JsonlEventWriter {
    writer: BufWriter<File>,
    written: u64,
}

impl JsonlEventWriter {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let file = File::create(path)
            .with_context(|| format!("Failed to create event log {}", path.display()))?;
        info!("Writing events to {}", path.display());
        Ok(Self {
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    pub fn write(&mut self, event: &PipelineEvent) -> Result<()> {
        let record = EventRecord {
            logged_at: Utc::now().to_rfc3339(),
            event,
        };
        serde_json::to_writer(&mut self.writer, &record)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::motion_gate::MotionEvent;

    #[test]
    fn test_jsonl_writer_one_object_per_line() {
        let path = std::env::temp_dir()
            .join(format!("table-referee-events-{}", std::process::id()))
            .join("events.jsonl");
        let mut writer = JsonlEventWriter::create(&path).unwrap();
        writer.write(&PipelineEvent::TableLost { tick: 3 }).unwrap();
        writer.write(&PipelineEvent::PocketsCleared).unwrap();
        writer
            .write(&PipelineEvent::Motion {
                tick: 7,
                motion: MotionEvent::Started {
                    percent: 12.5,
                    at_ms: 231.0,
                },
            })
            .unwrap();
        writer.flush().unwrap();
        assert_eq!(writer.written(), 3);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["event"], "table_lost");
        assert_eq!(lines[0]["tick"], 3);
        assert!(lines[1]["logged_at"].is_string());
        assert_eq!(lines[2]["event"], "motion");
        assert_eq!(lines[2]["type"], "started");
        assert_eq!(lines[2]["tick"], 7);
        assert_eq!(lines[2]["percent"], 12.5);

        if let Some(dir) = path.parent() {
            std::fs::remove_dir_all(dir).unwrap();
        }
    }

    #[test]
    fn test_recording_sink_keeps_order() {
        let mut sink = RecordingSink::default();
        sink.pot(BallId::Number(3));
        sink.foul();
        assert_eq!(
            sink.decisions,
            vec![RecordedDecision::Pot(BallId::Number(3)), RecordedDecision::Foul]
        );
    }
}
