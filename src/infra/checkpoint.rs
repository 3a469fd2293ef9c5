// ============================================================
// Layer 6 — Checkpoint Store
// ============================================================
// Saves and restores estimator state with Burn's file recorders.
//
// Directory layout (name = "ratio_estimator"):
//
//   checkpoints/
//     ratio_estimator.json                  ← manifest: revision, shapes,
//                                              optimizer kind, step, epoch
//     ratio_estimator-weights-000007.mpk.gz ← network record
//     ratio_estimator-optim-000007.mpk.gz   ← optimizer record
//     train_config.json                     ← run configuration
//     metrics.csv                           ← per-epoch metrics
//
// A save writes the revision's record files first, then replaces the
// manifest atomically (temp file + rename). Readers only follow the
// manifest, so an interrupted save leaves the previous revision
// intact. Files of older revisions are pruned after the rename.
//
// Records are stored at full precision so a reload reproduces
// predictions bit for bit.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkGzFileRecorder, Record, Recorder, RecorderError},
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use crate::ml::optimizer::OptimizerKind;

const CONFIG_FILE:  &str = "train_config.json";
const METRICS_FILE: &str = "metrics.csv";

/// Extension appended by the recorder.
const RECORD_EXT: &str = "mpk.gz";

type StoreRecorder = NamedMpkGzFileRecorder<FullPrecisionSettings>;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("invalid checkpoint name '{0}' (use letters, digits, '-' and '_')")]
    InvalidName(String),

    #[error("I/O error at '{path}'")]
    Io {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse '{path}'")]
    Json {
        path:   PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot record '{path}'")]
    Record {
        path:   PathBuf,
        #[source]
        source: RecorderError,
    },
}

/// Everything needed to rebuild the estimator before loading records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointManifest {
    pub model:          String,
    pub revision:       u64,
    pub input_dim:      usize,
    pub hidden_size:    usize,
    pub optimizer:      OptimizerKind,
    pub learning_rate:  f64,
    pub step:           u64,
    pub epoch:          usize,
    /// Record file stems, relative to the store directory
    pub weights_file:   String,
    pub optimizer_file: String,
    pub saved_at:       chrono::DateTime<chrono::Utc>,
}

/// A checkpoint directory plus the model identity its files are named after.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir:  PathBuf,
    name: String,
}

impl CheckpointStore {
    /// Open (and create if needed) the store directory.
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>) -> Result<Self, CheckpointError> {
        let dir  = dir.into();
        let name = name.into();
        let valid = !name.is_empty()
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(CheckpointError::InvalidName(name));
        }
        fs::create_dir_all(&dir).map_err(|source| CheckpointError::Io { path: dir.clone(), source })?;
        Ok(Self { dir, name })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.name))
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.dir.join(METRICS_FILE)
    }

    // ─── Manifest ────────────────────────────────────────────────────────────
    /// `None` when nothing has been saved yet.
    pub fn read_manifest(&self) -> Result<Option<CheckpointManifest>, CheckpointError> {
        let path = self.manifest_path();
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)
            .map_err(|source| CheckpointError::Io { path: path.clone(), source })?;
        serde_json::from_str(&json)
            .map(Some)
            .map_err(|source| CheckpointError::Json { path, source })
    }

    pub fn next_revision(&self) -> Result<u64, CheckpointError> {
        Ok(self.read_manifest()?.map_or(1, |m| m.revision + 1))
    }

    /// File stem for one artifact of a revision, e.g. `ratio_estimator-weights-000003`.
    pub fn artifact_stem(&self, kind: &str, revision: u64) -> String {
        format!("{}-{kind}-{revision:06}", self.name)
    }

    /// Make `manifest` the current checkpoint, then drop older artifacts.
    pub fn commit(&self, manifest: &CheckpointManifest) -> Result<(), CheckpointError> {
        let path = self.manifest_path();
        let tmp  = self.dir.join(format!(".{}.json.tmp", self.name));
        let json = serde_json::to_string_pretty(manifest)
            .map_err(|source| CheckpointError::Json { path: path.clone(), source })?;

        let io = |source| CheckpointError::Io { path: tmp.clone(), source };
        let mut file = fs::File::create(&tmp).map_err(io)?;
        file.write_all(json.as_bytes()).map_err(io)?;
        file.sync_all().map_err(io)?;
        drop(file);
        fs::rename(&tmp, &path).map_err(|source| CheckpointError::Io { path: path.clone(), source })?;

        tracing::debug!("Committed checkpoint revision {}", manifest.revision);
        self.prune(&[&manifest.weights_file, &manifest.optimizer_file]);
        Ok(())
    }

    /// Best effort: a file that cannot be removed is only logged.
    fn prune(&self, keep: &[&str]) {
        let Ok(entries) = fs::read_dir(&self.dir) else { return };
        let prefix = format!("{}-", self.name);
        let suffix = format!(".{RECORD_EXT}");
        for entry in entries.flatten() {
            let file_name = entry.file_name().to_string_lossy().to_string();
            let Some(stem) = file_name.strip_suffix(&suffix) else { continue };
            if !stem.starts_with(&prefix) || keep.contains(&stem) {
                continue;
            }
            if let Err(e) = fs::remove_file(entry.path()) {
                tracing::warn!("Cannot prune old checkpoint file '{}': {}", file_name, e);
            }
        }
    }

    // ─── Records ─────────────────────────────────────────────────────────────
    pub fn save_record<B: Backend, R: Record<B>>(
        &self,
        record: R,
        stem:   &str,
    ) -> Result<PathBuf, CheckpointError> {
        let path = self.dir.join(stem);
        <StoreRecorder as Recorder<B>>::record(&StoreRecorder::new(), record, path.clone())
            .map_err(|source| CheckpointError::Record { path: path.clone(), source })?;
        Ok(path.with_extension(RECORD_EXT))
    }

    pub fn load_record<B: Backend, R: Record<B>>(
        &self,
        stem:   &str,
        device: &B::Device,
    ) -> Result<R, CheckpointError> {
        let path = self.dir.join(stem);
        <StoreRecorder as Recorder<B>>::load(&StoreRecorder::new(), path.clone(), device)
            .map_err(|source| CheckpointError::Record { path, source })
    }

    // ─── Run configuration ───────────────────────────────────────────────────
    pub fn save_config<T: Serialize>(&self, config: &T) -> Result<(), CheckpointError> {
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(config)
            .map_err(|source| CheckpointError::Json { path: path.clone(), source })?;
        fs::write(&path, json).map_err(|source| CheckpointError::Io { path: path.clone(), source })?;
        tracing::debug!("Saved run config to '{}'", path.display());
        Ok(())
    }

    /// `None` when no configuration has been saved.
    pub fn load_config<T: DeserializeOwned>(&self) -> Result<Option<T>, CheckpointError> {
        let path = self.dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)
            .map_err(|source| CheckpointError::Io { path: path.clone(), source })?;
        serde_json::from_str(&json)
            .map(Some)
            .map_err(|source| CheckpointError::Json { path, source })
    }
}
