//! Append-only, timestamped artifact records.
//!
//! Layout:
//!   {artifacts_dir}/
//!     scan/
//!       scan_20261017T101500Z.json
//!       scan_20261017T101500Z_0001.json   (same second, disambiguated)
//!     report/
//!       report_20261017T101502Z.md        (human summary)
//!
//! Nothing here updates or deletes a file once written.

use crate::error::{Result, SeedError};
use crate::finite;
use crate::io;
use crate::paths;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Second-resolution UTC stamp embedded in file names.
const STAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";
const STAMP_LEN: usize = 16;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The on-disk record of one command outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub category: String,
    pub timestamp: DateTime<Utc>,
    pub payload: Map<String, Value>,
}

/// A recorded file, as discovered by [`ArtifactWriter::list`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactEntry {
    pub category: String,
    pub path: PathBuf,
    pub timestamp: DateTime<Utc>,
    /// 0 for the first file of a second, then the `_NNNN` disambiguator.
    pub sequence: u32,
}

impl ArtifactEntry {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn is_json(&self) -> bool {
        self.path.extension().is_some_and(|e| e == "json")
    }
}

// ---------------------------------------------------------------------------
// ArtifactWriter
// ---------------------------------------------------------------------------

pub struct ArtifactWriter {
    dir: PathBuf,
    clock: Box<dyn Fn() -> DateTime<Utc>>,
}

impl std::fmt::Debug for ArtifactWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactWriter")
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

impl ArtifactWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_clock(dir, Utc::now)
    }

    /// Use `clock` instead of the wall clock for timestamps.
    pub fn with_clock(
        dir: impl Into<PathBuf>,
        clock: impl Fn() -> DateTime<Utc> + 'static,
    ) -> Self {
        Self {
            dir: dir.into(),
            clock: Box::new(clock),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Validate `category` and create its directory, returning the absolute path.
    fn ensure_category_dir(&self, category: &str) -> Result<PathBuf> {
        paths::validate_category(category)?;
        let dir = self.dir.join(category);
        io::ensure_dir(&dir)?;
        Ok(std::fs::canonicalize(&dir)?)
    }

    /// Serialize `payload` as a new artifact under `category`.
    ///
    /// The payload must serialize to a JSON object without NaN or infinite
    /// numbers; anything else is a `Serialization` error and nothing is
    /// written.
    pub fn write<T: Serialize + ?Sized>(&self, category: &str, payload: &T) -> Result<PathBuf> {
        paths::validate_category(category)?;
        finite::check(payload).map_err(|e| SeedError::Serialization(e.to_string()))?;
        let payload = match serde_json::to_value(payload) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                return Err(SeedError::Serialization(format!(
                    "payload must be a mapping, got {}",
                    value_kind(&other)
                )))
            }
            Err(e) => return Err(SeedError::Serialization(e.to_string())),
        };

        let timestamp = (self.clock)();
        let artifact = Artifact {
            category: category.to_string(),
            timestamp,
            payload,
        };
        let data = serde_json::to_vec_pretty(&artifact)
            .map_err(|e| SeedError::Serialization(e.to_string()))?;

        let dir = self.ensure_category_dir(category)?;
        let stem = format!("{category}_{}", timestamp.format(STAMP_FORMAT));
        let path = io::create_unique(&dir, &stem, "json", &data)?;
        tracing::info!(category, path = %path.display(), "artifact written");
        Ok(path)
    }

    /// Timestamped path for a human-readable summary under `category`.
    /// The directory exists on return; the file does not yet.
    pub fn summary_path(&self, category: &str, ext: &str) -> Result<PathBuf> {
        let dir = self.ensure_category_dir(category)?;
        let stamp = (self.clock)().format(STAMP_FORMAT);
        Ok(dir.join(format!("{category}_{stamp}.{ext}")))
    }

    /// Write a Markdown or plain-text summary at `path`.
    ///
    /// Never overwrites: if `path` is taken, a `_NNNN` disambiguator is
    /// appended to the stem. Returns the path actually written.
    pub fn write_summary(&self, path: &Path, content: &str) -> Result<PathBuf> {
        let dir = path.parent().unwrap_or(Path::new("."));
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| SeedError::Failed(format!("invalid summary path {}", path.display())))?;
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_else(|| "md".to_string());
        let written = io::create_unique(dir, &stem, &ext, content.as_bytes())?;
        tracing::info!(path = %written.display(), "summary written");
        Ok(written)
    }

    /// Every recorded file of `category`, oldest first.
    pub fn list(&self, category: &str) -> Result<Vec<ArtifactEntry>> {
        paths::validate_category(category)?;
        let dir = self.dir.join(category);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some((timestamp, sequence)) = parse_file_name(category, &name) {
                entries.push(ArtifactEntry {
                    category: category.to_string(),
                    path: entry.path(),
                    timestamp,
                    sequence,
                });
            }
        }

        entries.sort_by(|a, b| {
            (a.timestamp, a.sequence, a.file_name()).cmp(&(b.timestamp, b.sequence, b.file_name()))
        });
        Ok(entries)
    }

    /// Most recent JSON artifact of `category`.
    pub fn latest(&self, category: &str) -> Result<Option<ArtifactEntry>> {
        Ok(self.list(category)?.into_iter().rev().find(|e| e.is_json()))
    }

    pub fn read(&self, path: &Path) -> Result<Artifact> {
        let data = std::fs::read_to_string(path)?;
        serde_json::from_str(&data).map_err(|source| SeedError::InvalidArtifact {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn value_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "a mapping",
    }
}

/// Parse `{category}_{stamp}[_{seq}].{ext}` into (timestamp, sequence).
fn parse_file_name(category: &str, name: &str) -> Option<(DateTime<Utc>, u32)> {
    let (stem, _ext) = name.rsplit_once('.')?;
    let rest = stem.strip_prefix(category)?.strip_prefix('_')?;
    let stamp = rest.get(..STAMP_LEN)?;
    let suffix = rest.get(STAMP_LEN..)?;
    let naive = NaiveDateTime::parse_from_str(stamp, STAMP_FORMAT).ok()?;
    let sequence = if suffix.is_empty() {
        0
    } else {
        suffix.strip_prefix('_')?.parse().ok()?
    };
    Some((naive.and_utc(), sequence))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use std::cell::Cell;
    use std::collections::HashMap;
    use std::rc::Rc;
    use tempfile::TempDir;

    fn fixed_clock() -> impl Fn() -> DateTime<Utc> {
        || Utc.with_ymd_and_hms(2026, 10, 17, 10, 15, 0).unwrap()
    }

    #[test]
    fn write_then_read_preserves_payload() {
        let dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(dir.path());
        let payload = json!({
            "tool": "one-engine",
            "present": false,
            "nested": {"list": [1, 2, 3], "none": null},
            "ratio": 0.25,
        });

        let path = writer.write("verify", &payload).unwrap();
        assert!(path.is_absolute());
        assert!(path.exists());

        let artifact = writer.read(&path).unwrap();
        assert_eq!(artifact.category, "verify");
        assert_eq!(Value::Object(artifact.payload), payload);
    }

    #[test]
    fn file_name_embeds_category_and_stamp() {
        let dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::with_clock(dir.path(), fixed_clock());
        let path = writer.write("scan", &json!({"files": 0})).unwrap();
        assert_eq!(path.file_name().unwrap(), "scan_20261017T101500Z.json");
        assert_eq!(path.parent().unwrap().file_name().unwrap(), "scan");
    }

    #[test]
    fn colliding_timestamps_keep_both_artifacts() {
        let dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::with_clock(dir.path(), fixed_clock());

        let first = writer.write("baseline", &json!({"run": 1})).unwrap();
        let second = writer.write("baseline", &json!({"run": 2})).unwrap();

        assert_ne!(first, second);
        assert_eq!(writer.read(&first).unwrap().payload["run"], 1);
        assert_eq!(writer.read(&second).unwrap().payload["run"], 2);
        assert_eq!(writer.list("baseline").unwrap().len(), 2);
    }

    #[test]
    fn distinct_timestamps_keep_both_artifacts() {
        let dir = TempDir::new().unwrap();
        let tick = Rc::new(Cell::new(0u32));
        let t = Rc::clone(&tick);
        let writer = ArtifactWriter::with_clock(dir.path(), move || {
            t.set(t.get() + 1);
            Utc.with_ymd_and_hms(2026, 10, 17, 10, 15, t.get()).unwrap()
        });

        let a = writer.write("scan", &json!({"n": "a"})).unwrap();
        let b = writer.write("scan", &json!({"n": "b"})).unwrap();
        assert!(a.exists() && b.exists());

        let listed = writer.list("scan").unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].path, a);
        assert_eq!(listed[1].path, b);
        assert_eq!(tick.get(), 2);
    }

    #[test]
    fn non_mapping_payload_is_serialization_error() {
        let dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(dir.path());
        let err = writer.write("scan", &vec![1, 2, 3]).unwrap_err();
        assert_eq!(err.kind(), "serialization_error");
        assert!(!dir.path().join("scan").exists());
    }

    #[test]
    fn unrepresentable_payload_is_serialization_error() {
        let dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(dir.path());
        let mut payload: HashMap<(u8, u8), u8> = HashMap::new();
        payload.insert((1, 2), 3);

        let err = writer.write("scan", &payload).unwrap_err();
        assert!(matches!(err, SeedError::Serialization(_)));
    }

    #[test]
    fn non_finite_payload_is_serialization_error() {
        #[derive(Serialize)]
        struct Timing {
            mean_ms: f64,
            durations_ms: Vec<f64>,
        }

        let dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(dir.path());

        let err = writer
            .write("baseline", &Timing { mean_ms: f64::NAN, durations_ms: vec![] })
            .unwrap_err();
        assert_eq!(err.kind(), "serialization_error");
        assert!(err.to_string().contains("non-finite number NaN"));

        let nested = Timing {
            mean_ms: 1.0,
            durations_ms: vec![1.0, f64::NEG_INFINITY],
        };
        assert!(matches!(
            writer.write("baseline", &nested),
            Err(SeedError::Serialization(_))
        ));
        assert!(!dir.path().join("baseline").exists());
    }

    #[test]
    fn invalid_category_rejected() {
        let dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(dir.path());
        let err = writer.write("../escape", &json!({})).unwrap_err();
        assert!(matches!(err, SeedError::InvalidCategory(_)));
        let err = writer.write("", &json!({})).unwrap_err();
        assert!(matches!(err, SeedError::InvalidCategory(_)));
    }

    #[test]
    fn summaries_never_overwrite() {
        let dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::with_clock(dir.path(), fixed_clock());
        let path = writer.summary_path("report", "md").unwrap();

        let first = writer.write_summary(&path, "# first\n").unwrap();
        let second = writer.write_summary(&path, "# second\n").unwrap();

        assert_eq!(first, path);
        assert_ne!(first, second);
        assert_eq!(std::fs::read_to_string(&first).unwrap(), "# first\n");
        assert_eq!(std::fs::read_to_string(&second).unwrap(), "# second\n");
    }

    #[test]
    fn latest_skips_summaries_and_orders_by_sequence() {
        let dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::with_clock(dir.path(), fixed_clock());
        writer.write("report", &json!({"n": 0})).unwrap();
        let newest = writer.write("report", &json!({"n": 1})).unwrap();
        let md = writer.summary_path("report", "md").unwrap();
        writer.write_summary(&md, "text").unwrap();

        let latest = writer.latest("report").unwrap().unwrap();
        assert_eq!(latest.path, newest);
        assert_eq!(latest.sequence, 1);
    }

    #[test]
    fn list_of_unknown_category_is_empty() {
        let dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(dir.path());
        assert!(writer.list("nothing-here").unwrap().is_empty());
        assert!(writer.latest("nothing-here").unwrap().is_none());
    }

    #[test]
    fn parse_file_name_variants() {
        let (ts, seq) = parse_file_name("scan", "scan_20261017T101500Z.json").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2026, 10, 17, 10, 15, 0).unwrap());
        assert_eq!(seq, 0);

        let (_, seq) = parse_file_name("scan", "scan_20261017T101500Z_0012.json").unwrap();
        assert_eq!(seq, 12);

        assert!(parse_file_name("scan", "other_20261017T101500Z.json").is_none());
        assert!(parse_file_name("scan", "scan_notastamp.json").is_none());
        assert!(parse_file_name("scan", ".tmpXYZ").is_none());
        assert!(parse_file_name("scan", "scan_202610171015000é.json").is_none());
        assert!(parse_file_name("scan", "scan_2026.json").is_none());
    }
}
