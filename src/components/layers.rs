use image::Rgba;
use log::{debug, info, warn};
use std::{
    cell::{Cell, RefCell},
    path::{Path, PathBuf},
};

use crate::components::{backends::GeoBackend, vector::VectorReader};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    Raster,
    Vector,
    Unknown,
}

impl LayerKind {
    /// Derived from the file extension, case insensitive.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        let extension = path
            .as_ref()
            .extension()
            .and_then(|extension| extension.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("tif") | Some("tiff") => LayerKind::Raster,
            Some("shp") => LayerKind::Vector,
            _ => LayerKind::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerEntry {
    pub path: PathBuf,
    pub kind: LayerKind,
    pub visible: bool,
    /// Vector layers only, `None` when the geometry type was indeterminate.
    pub color: Option<Rgba<u8>>,
    pub display_order: usize,
}

/// What the canvas needs to know about one layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerState {
    pub kind: LayerKind,
    pub visible: bool,
    pub color: Option<Rgba<u8>>,
}

/// Immutable copy of the layer list, ordered by display order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerSnapshot {
    entries: Vec<LayerEntry>,
}

impl LayerSnapshot {
    pub fn iter(&self) -> impl Iterator<Item = &LayerEntry> {
        self.entries.iter()
    }

    pub fn visible(&self) -> impl Iterator<Item = &LayerEntry> {
        self.entries.iter().filter(|entry| entry.visible)
    }

    pub fn get<P: AsRef<Path>>(&self, path: P) -> Option<LayerState> {
        self.entries
            .iter()
            .find(|entry| entry.path == path.as_ref())
            .map(|entry| LayerState {
                kind: entry.kind,
                visible: entry.visible,
                color: entry.color,
            })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resets the latch when the toggle that set it returns.
struct LatchGuard<'a>(&'a Cell<bool>);

impl Drop for LatchGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Ordered layers keyed by file path.
///
/// Every mutation hands back a fresh [LayerSnapshot].
#[derive(Debug, Default)]
pub struct LayerList {
    entries: RefCell<Vec<LayerEntry>>,
    next_order: Cell<usize>,
    toggling: Cell<bool>,
}

impl LayerList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> LayerSnapshot {
        let mut entries = self.entries.borrow().clone();
        entries.sort_by_key(|entry| entry.display_order);
        LayerSnapshot { entries }
    }

    /// Adds a visible layer, vector colors are classified here once.
    ///
    /// A path already in the list is left as is.
    pub fn add<B: GeoBackend, P: AsRef<Path>>(&self, backend: &B, path: P) -> LayerSnapshot {
        let path = path.as_ref();
        if self.contains(path) {
            debug!("{} is already listed", path.display());
            return self.snapshot();
        }
        let kind = LayerKind::from_path(path);
        let color = match kind {
            LayerKind::Vector => match VectorReader::new(backend).classify(path) {
                Ok(vector_kind) => vector_kind.map(|vector_kind| vector_kind.color()),
                Err(error) => {
                    warn!("could not classify {}: {error}", path.display());
                    None
                }
            },
            LayerKind::Raster | LayerKind::Unknown => None,
        };
        let display_order = self.next_order.get();
        self.next_order.set(display_order + 1);
        self.entries.borrow_mut().push(LayerEntry {
            path: path.to_path_buf(),
            kind,
            visible: true,
            color,
            display_order,
        });
        info!("added {kind:?} layer {}", path.display());
        self.snapshot()
    }

    /// Registers a file produced by geoprocessing.
    pub fn append_output<B: GeoBackend, P: AsRef<Path>>(
        &self,
        backend: &B,
        path: P,
    ) -> LayerSnapshot {
        info!("appending output {}", path.as_ref().display());
        self.add(backend, path)
    }

    pub fn remove<P: AsRef<Path>>(&self, path: P) -> Option<LayerSnapshot> {
        let path = path.as_ref();
        {
            let mut entries = self.entries.borrow_mut();
            let position = entries.iter().position(|entry| entry.path == path)?;
            entries.remove(position);
        }
        info!("removed layer {}", path.display());
        Some(self.snapshot())
    }

    /// Flips the visibility of `path` and passes the new snapshot to `on_change`.
    ///
    /// A toggle issued from inside `on_change` is ignored and returns `None`,
    /// as does a path that is not listed.
    pub fn toggle_visibility<P, F>(&self, path: P, on_change: F) -> Option<LayerSnapshot>
    where
        P: AsRef<Path>,
        F: FnOnce(&LayerSnapshot),
    {
        let path = path.as_ref();
        if self.toggling.get() {
            debug!("ignoring nested toggle of {}", path.display());
            return None;
        }
        self.toggling.set(true);
        let _guard = LatchGuard(&self.toggling);

        let visible = {
            let mut entries = self.entries.borrow_mut();
            let entry = entries.iter_mut().find(|entry| entry.path == path)?;
            entry.visible = !entry.visible;
            entry.visible
        };
        debug!("{} is now visible: {visible}", path.display());
        let snapshot = self.snapshot();
        on_change(&snapshot);
        Some(snapshot)
    }

    pub fn contains<P: AsRef<Path>>(&self, path: P) -> bool {
        self.entries
            .borrow()
            .iter()
            .any(|entry| entry.path == path.as_ref())
    }
}
