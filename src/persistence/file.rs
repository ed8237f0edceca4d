use super::{ForestSnapshot, ForestStore, PersistenceResult};
use crate::forest::TaskForest;
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

pub fn save_forest_to_json<P: AsRef<Path>>(forest: &TaskForest, path: P) -> PersistenceResult<()> {
    let snapshot = ForestSnapshot::from_forest(forest);
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, &snapshot)?;
    writer.flush()?;
    Ok(())
}

pub fn load_forest_from_json<P: AsRef<Path>>(path: P) -> PersistenceResult<TaskForest> {
    let file = File::open(path)?;
    let snapshot: ForestSnapshot = serde_json::from_reader(BufReader::new(file))?;
    snapshot.into_forest()
}

/// Keeps one forest snapshot as a pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct JsonForestStore {
    path: PathBuf,
}

impl JsonForestStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ForestStore for JsonForestStore {
    #[instrument(skip_all, fields(path = %self.path.display()))]
    fn save_forest(&self, forest: &TaskForest) -> PersistenceResult<()> {
        save_forest_to_json(forest, &self.path)?;
        info!(tasks = forest.len(), "forest saved");
        Ok(())
    }

    #[instrument(skip_all, fields(path = %self.path.display()))]
    fn load_forest(&self) -> PersistenceResult<Option<TaskForest>> {
        match load_forest_from_json(&self.path) {
            Ok(forest) => {
                info!(tasks = forest.len(), "forest loaded");
                Ok(Some(forest))
            }
            Err(super::PersistenceError::Io(err)) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }
}
