//! Session state cache.
//!
//! Claude Code sometimes omits fields from a payload, or sends a payload that
//! lags behind one already drawn. Displaying those values verbatim makes the
//! statusline flicker. The session record keeps the high-water mark instead:
//! every numeric field only moves up, and a string field is replaced only by a
//! non-empty value.
//!
//! # Record Layout (376 bytes, little-endian)
//!
//! ```text
//! used_percent     i64
//! context_size     i64
//! cost_usd         f64
//! lines_added      i64
//! lines_removed    i64
//! duration_ms      i64
//! last_update_secs i64
//! working_dir      [u8; 256]  NUL-padded
//! model            [u8; 64]   NUL-padded
//! ```

use crate::error::Result;
use crate::input::Payload;
use crate::record::{truncate_to_boundary, FixedRecord, RecordReader, RecordWriter};
use crate::storage::{CacheKey, RecordStore};

use super::SessionId;

pub const WORKING_DIRECTORY_BYTES: usize = 256;
pub const MODEL_BYTES: usize = 64;

/// Last-known values for one session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionRecord {
    pub used_percent: i64,
    pub context_size: i64,
    pub cost_usd: f64,
    pub lines_added: i64,
    pub lines_removed: i64,
    pub duration_ms: i64,
    /// Unix seconds of the last change to any other field.
    pub last_update_secs: i64,
    pub working_directory: String,
    pub model: String,
}

impl SessionRecord {
    /// True when every field except `last_update_secs` encodes identically.
    pub fn same_data(&self, other: &SessionRecord) -> bool {
        let mut probe = self.clone();
        probe.last_update_secs = other.last_update_secs;
        probe.encode() == other.encode()
    }
}

impl FixedRecord for SessionRecord {
    const SIZE: usize = 7 * 8 + WORKING_DIRECTORY_BYTES + MODEL_BYTES;

    fn encode(&self) -> Vec<u8> {
        let mut writer = RecordWriter::with_capacity(Self::SIZE);
        writer
            .i64(self.used_percent)
            .i64(self.context_size)
            .f64(self.cost_usd)
            .i64(self.lines_added)
            .i64(self.lines_removed)
            .i64(self.duration_ms)
            .i64(self.last_update_secs)
            .text(&self.working_directory, WORKING_DIRECTORY_BYTES)
            .text(&self.model, MODEL_BYTES);
        writer.finish()
    }

    fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != Self::SIZE {
            return None;
        }
        let mut reader = RecordReader::new(bytes);
        Some(SessionRecord {
            used_percent: reader.i64(),
            context_size: reader.i64(),
            cost_usd: reader.f64(),
            lines_added: reader.i64(),
            lines_removed: reader.i64(),
            duration_ms: reader.i64(),
            last_update_secs: reader.i64(),
            working_directory: reader.text(WORKING_DIRECTORY_BYTES),
            model: reader.text(MODEL_BYTES),
        })
    }
}

/// Folds a payload into the previous record.
///
/// Numbers take the maximum of cached and incoming, so an absent (or zero)
/// field holds the cached value. Strings take the incoming value when it is
/// non-empty, truncated to the field width. `last_update_secs` is carried over
/// unchanged; stamping it is the caller's decision.
///
/// A fresh session passes `SessionRecord::default()`; `max(0, x) = x` makes
/// that case need no special handling.
pub fn merge(previous: &SessionRecord, incoming: &Payload) -> SessionRecord {
    SessionRecord {
        used_percent: previous
            .used_percent
            .max(incoming.used_percentage.unwrap_or(0)),
        context_size: previous
            .context_size
            .max(incoming.context_window_size.unwrap_or(0)),
        cost_usd: match incoming.total_cost_usd {
            Some(cost) if cost > previous.cost_usd => cost,
            _ => previous.cost_usd,
        },
        lines_added: previous
            .lines_added
            .max(incoming.total_lines_added.unwrap_or(0)),
        lines_removed: previous
            .lines_removed
            .max(incoming.total_lines_removed.unwrap_or(0)),
        duration_ms: previous
            .duration_ms
            .max(incoming.total_duration_ms.unwrap_or(0)),
        last_update_secs: previous.last_update_secs,
        working_directory: merge_text(
            &previous.working_directory,
            incoming.current_dir.as_deref(),
            WORKING_DIRECTORY_BYTES,
        ),
        model: merge_text(
            &previous.model,
            incoming.display_name.as_deref(),
            MODEL_BYTES,
        ),
    }
}

fn merge_text(previous: &str, incoming: Option<&str>, width: usize) -> String {
    match incoming {
        Some(value) if !value.is_empty() => {
            truncate_to_boundary(value, width - 1).to_string()
        }
        _ => previous.to_string(),
    }
}

/// Reads and writes session records through a [`RecordStore`].
#[derive(Debug, Clone)]
pub struct SessionCache<S> {
    store: S,
}

impl<S: RecordStore> SessionCache<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// `None` if the record is missing or not exactly the expected size.
    pub fn read(&self, session: SessionId) -> Option<SessionRecord> {
        self.store
            .get::<SessionRecord>(&CacheKey::Session(session))
            .map(|stored| stored.record)
    }

    /// Replaces the record wholesale.
    pub fn write(&self, session: SessionId, record: &SessionRecord) -> Result<()> {
        self.store.put(&CacheKey::Session(session), record)
    }

    /// Merges `payload` into the cached record and persists the result if it
    /// changed. Without a payload the cached record (or defaults) is returned
    /// untouched.
    pub fn update(
        &self,
        session: SessionId,
        payload: Option<&Payload>,
        now_secs: i64,
    ) -> SessionRecord {
        let previous = self.read(session);
        let base = previous.clone().unwrap_or_default();
        let Some(payload) = payload else {
            return base;
        };

        let mut merged = merge(&base, payload);
        let changed = previous
            .as_ref()
            .map_or(true, |previous| !merged.same_data(previous));
        if changed {
            merged.last_update_secs = now_secs;
            if let Err(err) = self.write(session, &merged) {
                tracing::warn!(error = %err, session = %session, "Failed to write session cache");
            }
        }
        merged
    }
}
