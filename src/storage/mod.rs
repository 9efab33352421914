//! Analysis Store (§4.G): an append-only log of [`AnalysisRecord`]s
//! partitioned by calendar date (UTC).
//!
//! Grounded on the teacher's `storage/persistence.rs` trait-shaped
//! abstraction and `storage/history.rs` timestamp-ordering conventions, but
//! re-grounded onto plain file IO instead of `sled`: spec §6 fixes the
//! on-disk layout as `analyses/YYYY-MM-DD.jsonl`, one JSON object per line,
//! so a KV store would just be an indirection over a format the spec
//! already nails down.

mod csv_export;

use crate::errors::StorageError;
use crate::types::AnalysisRecord;
use chrono::{DateTime, NaiveDate, Utc};
use std::fs::OpenOptions;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Export format for whole-history downloads (§6 `/analysis/history/download/{jsonl|csv}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Jsonl,
    Csv,
}

/// Append-only, date-partitioned analysis record store.
///
/// Appends are serialized through an internal lock so two concurrent
/// dispatch completions never interleave partial lines in the same file
/// (§4.G "no record is overwritten").
pub struct AnalysisStore {
    root: PathBuf,
    append_lock: Mutex<()>,
}

impl AnalysisStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            append_lock: Mutex::new(()),
        }
    }

    fn path_for_date(&self, date: NaiveDate) -> PathBuf {
        self.root.join(format!("{}.jsonl", date.format("%Y-%m-%d")))
    }

    /// Durable write: one JSON line per record, flushed immediately
    /// (§4.G "durable write with fsync semantics").
    #[allow(clippy::unwrap_used)]
    pub fn append(&self, record: &AnalysisRecord) -> Result<(), StorageError> {
        let _guard = self.append_lock.lock().unwrap();
        std::fs::create_dir_all(&self.root).map_err(|source| StorageError::Io {
            path: self.root.display().to_string(),
            source,
        })?;
        let path = self.path_for_date(record.created_at.date_naive());
        let line = serde_json::to_string(record)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| StorageError::Io {
                path: path.display().to_string(),
                source,
            })?;
        writeln!(file, "{line}").map_err(|source| StorageError::Io {
            path: path.display().to_string(),
            source,
        })?;
        file.sync_data().map_err(|source| StorageError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(())
    }

    /// All partition files present, most-recent date first.
    fn partition_dates(&self) -> Result<Vec<NaiveDate>, StorageError> {
        let mut dates = Vec::new();
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(dates),
            Err(source) => {
                return Err(StorageError::Io {
                    path: self.root.display().to_string(),
                    source,
                })
            }
        };
        for entry in entries {
            let entry = entry.map_err(|source| StorageError::Io {
                path: self.root.display().to_string(),
                source,
            })?;
            if let Some(stem) = entry.path().file_stem().and_then(|s| s.to_str()) {
                if let Ok(date) = NaiveDate::parse_from_str(stem, "%Y-%m-%d") {
                    dates.push(date);
                }
            }
        }
        dates.sort_unstable_by(|a, b| b.cmp(a));
        Ok(dates)
    }

    fn read_partition(&self, date: NaiveDate) -> Result<Vec<AnalysisRecord>, StorageError> {
        let path = self.path_for_date(date);
        match std::fs::File::open(&path) {
            Ok(file) => {
                let reader = std::io::BufReader::new(file);
                let mut records = Vec::new();
                for line in reader.lines() {
                    let line = line.map_err(|source| StorageError::Io {
                        path: path.display().to_string(),
                        source,
                    })?;
                    if line.trim().is_empty() {
                        continue;
                    }
                    records.push(serde_json::from_str(&line)?);
                }
                Ok(records)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(source) => Err(StorageError::Io {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    /// Newest-first up to `limit`, optionally filtered to records created at
    /// or after `since` (§4.G "list(limit N, since time?)").
    pub fn list(
        &self,
        limit: usize,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<AnalysisRecord>, StorageError> {
        let mut results = Vec::new();
        for date in self.partition_dates()? {
            let mut records = self.read_partition(date)?;
            records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            for record in records {
                if let Some(since) = since {
                    if record.created_at < since {
                        continue;
                    }
                }
                results.push(record);
                if results.len() >= limit {
                    return Ok(results);
                }
            }
        }
        Ok(results)
    }

    /// All records from one calendar date (§4.G "download(date)").
    pub fn download_date(&self, date: NaiveDate) -> Result<Vec<AnalysisRecord>, StorageError> {
        self.read_partition(date)
    }

    /// Whole-history export in the requested format (§4.G "download(format)").
    pub fn download_all(&self, format: ExportFormat) -> Result<String, StorageError> {
        let mut dates = self.partition_dates()?;
        dates.sort_unstable();
        let mut all = Vec::new();
        for date in dates {
            all.extend(self.read_partition(date)?);
        }
        match format {
            ExportFormat::Jsonl => {
                let mut out = String::new();
                for record in &all {
                    out.push_str(&serde_json::to_string(record)?);
                    out.push('\n');
                }
                Ok(out)
            }
            ExportFormat::Csv => Ok(csv_export::to_csv(&all)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PerformanceSummary, ProviderResult, ProviderStatus};
    use std::collections::HashMap;
    use uuid::Uuid;

    fn record(created_at: DateTime<Utc>) -> AnalysisRecord {
        let mut per_provider = HashMap::new();
        per_provider.insert(
            "openai".to_string(),
            ProviderResult {
                status: ProviderStatus::Ok,
                response_time_ms: 500,
                text: "looks like a feed ratio fault".into(),
                word_count: 5,
                error_message: None,
            },
        );
        AnalysisRecord {
            record_id: Uuid::new_v4(),
            created_at,
            event_id: Uuid::new_v4(),
            prompt_summary: "IDV(1) active".into(),
            per_provider: per_provider.clone(),
            performance_summary: PerformanceSummary::from_results(&per_provider),
        }
    }

    #[test]
    fn append_then_list_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = AnalysisStore::new(dir.path());
        let r = record(Utc::now());
        store.append(&r).unwrap();

        let listed = store.list(10, None).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].record_id, r.record_id);
    }

    #[test]
    fn list_respects_limit_and_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = AnalysisStore::new(dir.path());
        let base = Utc::now();
        for i in 0..3 {
            store
                .append(&record(base + chrono::Duration::seconds(i)))
                .unwrap();
        }
        let listed = store.list(2, None).unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed[0].created_at >= listed[1].created_at);
    }

    #[test]
    fn download_date_partitions_by_day() {
        let dir = tempfile::tempdir().unwrap();
        let store = AnalysisStore::new(dir.path());
        let today = Utc::now();
        store.append(&record(today)).unwrap();

        let same_day = store.download_date(today.date_naive()).unwrap();
        assert_eq!(same_day.len(), 1);

        let other_day = store
            .download_date(today.date_naive() - chrono::Duration::days(5))
            .unwrap();
        assert!(other_day.is_empty());
    }

    #[test]
    fn download_all_jsonl_contains_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = AnalysisStore::new(dir.path());
        store.append(&record(Utc::now())).unwrap();
        store.append(&record(Utc::now())).unwrap();

        let text = store.download_all(ExportFormat::Jsonl).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn download_all_csv_has_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = AnalysisStore::new(dir.path());
        store.append(&record(Utc::now())).unwrap();

        let text = store.download_all(ExportFormat::Csv).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("record_id"));
        assert_eq!(lines.count(), 1);
    }

    #[test]
    fn empty_store_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = AnalysisStore::new(dir.path());
        assert!(store.list(10, None).unwrap().is_empty());
    }
}
