use std::fs;
use std::path::Path;

use tracing::info;

use crate::models::{PersistError, Stroke};
use crate::store::OperationStore;

/// Write the full stroke set to `path` as one JSON array.
pub fn save(store: &OperationStore, path: impl AsRef<Path>) -> Result<(), PersistError> {
    let strokes = store.snapshot();
    let bytes = serde_json::to_vec_pretty(&strokes).map_err(PersistError::Parse)?;
    fs::write(path.as_ref(), bytes)?;
    info!("saved {} strokes to {}", strokes.len(), path.as_ref().display());
    Ok(())
}

/// Read and parse a session file, then replace the in-memory state.
///
/// The file is parsed before the write lock is taken: a missing file or
/// malformed JSON surfaces as a typed error with the current state intact.
pub fn load(store: &OperationStore, path: impl AsRef<Path>) -> Result<usize, PersistError> {
    let bytes = fs::read(path.as_ref())?;
    let strokes: Vec<Stroke> = serde_json::from_slice(&bytes).map_err(PersistError::Parse)?;
    let count = strokes.len();
    store.replace_all(strokes);
    info!("loaded {} strokes from {}", count, path.as_ref().display());
    Ok(count)
}
