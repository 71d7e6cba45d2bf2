//! In place edits of vector datasets.

use log::{info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::{
    components::backends::{GeoBackend, VectorEditor},
    errors::Result,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeletionReport {
    pub path: PathBuf,
    pub deleted: Vec<u64>,
    /// Ids the data layer refused to delete, each logged as it failed.
    pub failed: Vec<u64>,
}

/// Deletes the features `fids` from the first layer of `path`.
///
/// A feature that cannot be deleted is reported and the remaining ids
/// are still processed, only failing to open the dataset is an error.
pub fn delete_features<B: GeoBackend, P: AsRef<Path>>(
    backend: &B,
    path: P,
    fids: &[u64],
) -> Result<DeletionReport> {
    let path = path.as_ref();
    let mut report = DeletionReport {
        path: path.to_path_buf(),
        ..Default::default()
    };
    if fids.is_empty() {
        info!("no features to delete from {}", path.display());
        return Ok(report);
    }

    let mut editor = backend.edit_vector(path)?;
    for &fid in fids {
        match editor.delete_feature(fid) {
            Ok(()) => report.deleted.push(fid),
            Err(error) => {
                warn!("{}: {error}", path.display());
                report.failed.push(fid);
            }
        }
    }
    editor.finish()?;
    info!(
        "deleted {} of {} features from {}",
        report.deleted.len(),
        fids.len(),
        path.display()
    );
    Ok(report)
}
