//! Snapshot codec: learned state (metrics + Q-table) to and from a
//! self-describing binary blob.
//!
//! Layout (integers little-endian):
//!
//! ```text
//! header:  u32 schema version | i64 creation unix millis
//! body:    u32 backend count
//!          per backend: u32 len + id bytes, MetricsRecord fields in fixed order
//!          u32 q-entry count
//!          per entry: u32 len + id bytes, u32 len + category bytes, f64 q
//! trailer: u32 crc32 of body
//! ```
//!
//! Volatile state (rate buckets, circuit counters, ledger positions) is
//! deliberately absent: it describes the current window, not anything
//! learned.

use std::str::FromStr;

use waypoint_types::{BackendId, GatewayError, MetricsRecord, TaskCategory};

/// Schema version stamped into every exported blob.
pub const SCHEMA_VERSION: u32 = 1;

/// Sentinel for an absent `last_failure_ms`.
const NO_FAILURE: i64 = i64::MIN;

/// Parsed contents of a snapshot blob.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotData {
    /// Wall-clock unix millis the snapshot was taken at.
    pub created_ms: i64,
    /// Per-backend metrics, in blob order.
    pub metrics: Vec<(BackendId, MetricsRecord)>,
    /// Q-table rows, in blob order.
    pub qtable: Vec<(BackendId, TaskCategory, f64)>,
    /// Structurally valid rows whose task category is not recognized by
    /// this build, as `id/category` labels for the import report.
    pub unknown_categories: Vec<String>,
}

/// Result of merging a snapshot into live state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImportReport {
    /// Records and Q-entries applied.
    pub merged: usize,
    /// Backend ids (and malformed categories) present in the blob but not
    /// in this gateway, skipped.
    pub skipped: Vec<String>,
}

fn put_str(buf: &mut Vec<u8>, s: &str) {
    let len = u32::try_from(s.len()).unwrap_or(u32::MAX);
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
}

fn put_metrics(buf: &mut Vec<u8>, m: &MetricsRecord) {
    buf.extend_from_slice(&m.ema_response_ms.to_le_bytes());
    buf.extend_from_slice(&m.ema_success_rate.to_le_bytes());
    buf.extend_from_slice(&m.ema_quality.to_le_bytes());
    buf.extend_from_slice(&m.total_units.to_le_bytes());
    buf.extend_from_slice(&m.total_cost.to_le_bytes());
    buf.extend_from_slice(&m.requests.to_le_bytes());
    buf.extend_from_slice(&m.successes.to_le_bytes());
    buf.extend_from_slice(&m.failures.to_le_bytes());
    buf.extend_from_slice(&m.last_failure_ms.unwrap_or(NO_FAILURE).to_le_bytes());
    buf.extend_from_slice(&m.updated_ms.to_le_bytes());
}

/// Encode learned state into a blob. Inputs must already be sorted if
/// byte-identical re-exports are expected; the gateway sorts by backend id
/// and (id, category).
#[must_use]
pub fn encode(
    created_ms: i64,
    metrics: &[(BackendId, MetricsRecord)],
    qtable: &[(BackendId, TaskCategory, f64)],
) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&u32::try_from(metrics.len()).unwrap_or(u32::MAX).to_le_bytes());
    for (id, record) in metrics {
        put_str(&mut body, id.as_str());
        put_metrics(&mut body, record);
    }
    body.extend_from_slice(&u32::try_from(qtable.len()).unwrap_or(u32::MAX).to_le_bytes());
    for (id, category, q) in qtable {
        put_str(&mut body, id.as_str());
        put_str(&mut body, category.as_str());
        body.extend_from_slice(&q.to_le_bytes());
    }

    let mut blob = Vec::with_capacity(16 + body.len() + 4);
    blob.extend_from_slice(&SCHEMA_VERSION.to_le_bytes());
    blob.extend_from_slice(&created_ms.to_le_bytes());
    blob.extend_from_slice(&body);
    blob.extend_from_slice(&crc32fast::hash(&body).to_le_bytes());
    blob
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], GatewayError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&e| e <= self.buf.len())
            .ok_or_else(|| GatewayError::Snapshot("truncated blob".to_string()))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32, GatewayError> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().expect("len 4")))
    }

    fn u64(&mut self) -> Result<u64, GatewayError> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().expect("len 8")))
    }

    fn i64(&mut self) -> Result<i64, GatewayError> {
        Ok(i64::from_le_bytes(self.take(8)?.try_into().expect("len 8")))
    }

    fn f64(&mut self) -> Result<f64, GatewayError> {
        Ok(f64::from_le_bytes(self.take(8)?.try_into().expect("len 8")))
    }

    fn string(&mut self) -> Result<String, GatewayError> {
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| GatewayError::Snapshot("non-utf8 identifier".to_string()))
    }

    fn metrics(&mut self) -> Result<MetricsRecord, GatewayError> {
        Ok(MetricsRecord {
            ema_response_ms: self.f64()?,
            ema_success_rate: self.f64()?,
            ema_quality: self.f64()?,
            total_units: self.u64()?,
            total_cost: self.f64()?,
            requests: self.u64()?,
            successes: self.u64()?,
            failures: self.u64()?,
            last_failure_ms: match self.i64()? {
                NO_FAILURE => None,
                ms => Some(ms),
            },
            updated_ms: self.i64()?,
        })
    }
}

/// Decode and validate a blob.
///
/// # Errors
/// Returns `Snapshot` when the blob is truncated, carries an unknown schema
/// version, or fails the checksum. Unknown task categories inside an
/// otherwise valid blob are tolerated here and reported at import.
pub fn decode(blob: &[u8]) -> Result<SnapshotData, GatewayError> {
    if blob.len() < 16 {
        return Err(GatewayError::Snapshot("blob shorter than header".to_string()));
    }
    let version = u32::from_le_bytes(blob[0..4].try_into().expect("len 4"));
    if version != SCHEMA_VERSION {
        return Err(GatewayError::Snapshot(format!(
            "unsupported schema version {version}, expected {SCHEMA_VERSION}"
        )));
    }
    let created_ms = i64::from_le_bytes(blob[4..12].try_into().expect("len 8"));

    let Some(body_end) = blob.len().checked_sub(4).filter(|&e| e >= 12) else {
        return Err(GatewayError::Snapshot("blob shorter than trailer".to_string()));
    };
    let body = &blob[12..body_end];
    let declared = u32::from_le_bytes(blob[body_end..].try_into().expect("len 4"));
    let computed = crc32fast::hash(body);
    if declared != computed {
        return Err(GatewayError::Snapshot(format!(
            "checksum mismatch: declared {declared:#010x}, computed {computed:#010x}"
        )));
    }

    let mut reader = Reader { buf: body, pos: 0 };

    let backend_count = reader.u32()? as usize;
    let mut metrics = Vec::with_capacity(backend_count.min(1024));
    for _ in 0..backend_count {
        let id = reader.string()?;
        let record = reader.metrics()?;
        metrics.push((BackendId::new(id), record));
    }

    let q_count = reader.u32()? as usize;
    let mut qtable = Vec::with_capacity(q_count.min(4096));
    let mut unknown_categories = Vec::new();
    for _ in 0..q_count {
        let id = reader.string()?;
        let category = reader.string()?;
        let q = reader.f64()?;
        if let Ok(cat) = TaskCategory::from_str(&category) {
            qtable.push((BackendId::new(id), cat, q));
        } else {
            unknown_categories.push(format!("{id}/{category}"));
        }
    }

    if reader.pos != body.len() {
        return Err(GatewayError::Snapshot("trailing bytes in body".to_string()));
    }

    Ok(SnapshotData {
        created_ms,
        metrics,
        qtable,
        unknown_categories,
    })
}
