//! Whole-file JSON checkpoints written by atomic replacement.

use crate::error::DtmapError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// Serialize `value` as pretty JSON and atomically replace `path` with it.
///
/// The JSON goes to a temporary file in the target's directory which is then
/// renamed over the target, so readers never observe a truncated file.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), DtmapError> {
    let checkpoint_err = |reason: String| DtmapError::Checkpoint {
        path: path.to_path_buf(),
        reason,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| checkpoint_err(e.to_string()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| checkpoint_err(e.to_string()))?;
    serde_json::to_writer_pretty(&mut tmp, value).map_err(|e| checkpoint_err(e.to_string()))?;
    tmp.write_all(b"\n")
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| checkpoint_err(e.to_string()))?;
    tmp.persist(path)
        .map_err(|e| checkpoint_err(e.error.to_string()))?;
    Ok(())
}

/// Read a JSON file written by [`write_json_atomic`].
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, DtmapError> {
    if !path.exists() {
        return Err(DtmapError::MissingInput {
            path: path.to_path_buf(),
        });
    }
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Periodically persists a list of items that is being recomputed in order.
///
/// Owns the flush policy: every `flush_every` recorded items the file is
/// rewritten with the items computed so far, followed by the entries of the
/// previous pass that have not been recomputed yet. A checkpoint therefore
/// never holds fewer entries than the previous pass wrote.
#[derive(Debug)]
pub struct Checkpointer<T> {
    path: PathBuf,
    flush_every: usize,
    processed: usize,
    _items: PhantomData<fn(&T)>,
}

impl<T: Serialize + Clone> Checkpointer<T> {
    pub fn new(path: impl Into<PathBuf>, flush_every: usize) -> Self {
        Self {
            path: path.into(),
            flush_every: flush_every.max(1),
            processed: 0,
            _items: PhantomData,
        }
    }

    /// Count one newly computed item; write a snapshot if a flush is due.
    ///
    /// Returns whether a write happened.
    pub fn record(&mut self, computed: &[T], previous: &[T]) -> Result<bool, DtmapError> {
        self.processed += 1;
        if self.processed % self.flush_every != 0 {
            return Ok(false);
        }

        let mut snapshot = computed.to_vec();
        if let Some(tail) = previous.get(computed.len()..) {
            snapshot.extend_from_slice(tail);
        }
        write_json_atomic(&self.path, &snapshot)?;
        tracing::debug!(
            path = %self.path.display(),
            computed = computed.len(),
            items = snapshot.len(),
            "Checkpoint written"
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, ConditionProfile, MappingRecord, MatchTier};

    fn record(i: usize) -> MappingRecord {
        MappingRecord {
            condition_name: format!("条件{i}"),
            matched_representative: "Fever/Cough Syndrome".into(),
            matched_codes: vec!["780.6".into(), "786.2".into()],
            match_tier: MatchTier::Fuzzy,
            category: Category::Respiratory,
            profile: ConditionProfile {
                condition_name: format!("条件{i}"),
                questions: vec!["Does the patient have 发热 (临床表现)?".into()],
            },
        }
    }

    #[test]
    fn test_flush_every_n_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let mut checkpointer = Checkpointer::new(&path, 3);
        let mut items = Vec::new();
        let mut writes = 0;

        for i in 0..7 {
            items.push(record(i));
            let flushed = checkpointer.record(&items, &[]).unwrap();
            assert_eq!(flushed, (i + 1) % 3 == 0, "record {i}");
            writes += flushed as usize;
        }
        assert_eq!(writes, 2);

        let on_disk: Vec<MappingRecord> = read_json(&path).unwrap();
        assert_eq!(on_disk.len(), 6);
    }

    #[test]
    fn test_flush_keeps_previous_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let previous: Vec<MappingRecord> = (0..5).map(record).collect();
        let mut checkpointer = Checkpointer::new(&path, 2);

        let mut redone = vec![record(10)];
        assert!(!checkpointer.record(&redone, &previous).unwrap());
        assert!(!path.exists());

        redone.push(record(11));
        assert!(checkpointer.record(&redone, &previous).unwrap());
        let on_disk: Vec<MappingRecord> = read_json(&path).unwrap();
        let names: Vec<&str> = on_disk.iter().map(|r| r.condition_name.as_str()).collect();
        assert_eq!(names, vec!["条件10", "条件11", "条件2", "条件3", "条件4"]);
    }

    #[test]
    fn test_computed_beyond_previous_has_no_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let previous = vec![record(0)];
        let computed: Vec<MappingRecord> = (5..8).map(record).collect();
        let mut checkpointer = Checkpointer::new(&path, 1);

        assert!(checkpointer.record(&computed, &previous).unwrap());
        let on_disk: Vec<MappingRecord> = read_json(&path).unwrap();
        assert_eq!(on_disk, computed);
    }

    #[test]
    fn test_round_trip_preserves_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("mapping.json");
        let items: Vec<MappingRecord> = (0..4).map(record).collect();

        write_json_atomic(&path, &items).unwrap();

        let back: Vec<MappingRecord> = read_json(&path).unwrap();
        assert_eq!(back, items);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("条件0"), "non-ASCII text is written verbatim");
        assert!(raw.contains("\n  "), "output is pretty-printed");
    }

    #[test]
    fn test_overwrite_replaces_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapping.json");
        write_json_atomic(&path, &vec![record(0), record(1), record(2)]).unwrap();
        write_json_atomic(&path, &vec![record(9)]).unwrap();

        let back: Vec<MappingRecord> = read_json(&path).unwrap();
        assert_eq!(back, vec![record(9)]);
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1, "no temporary files left behind");
    }

    #[test]
    fn test_read_missing_file() {
        let err = read_json::<Vec<MappingRecord>>(Path::new("/nonexistent/x.json")).unwrap_err();
        assert!(matches!(err, DtmapError::MissingInput { .. }));
    }
}
