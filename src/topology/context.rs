//! Per-run state shared by the checks
//!
//! Working sets, the spatial index cache, the cancellation token and the
//! progress callback live here. The engine resets the context at the start of
//! every run, so nothing built for one run is seen by the next.

use super::config::CheckerConfig;
use super::error::EngineError;
use super::geometry::{self, Extent};
use super::index::FeatureIndex;
use super::layer::Layer;
use super::types::{FeatureId, FeatureLayer};
use geo_types::{Geometry, Rect};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use tracing::{debug, info};

/// Cooperative cancellation flag, shareable with other threads
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Observe the flag; observing a cancellation clears it
    pub fn take(&self) -> bool {
        self.flag.swap(false, Ordering::SeqCst)
    }
}

/// Receives the running count of processed primary features
pub type ProgressFn = Box<dyn Fn(usize) + Send>;

/// Adapt an mpsc sender into a progress callback; a dropped receiver is ignored
pub fn progress_to_channel(tx: Sender<usize>) -> ProgressFn {
    Box::new(move |count| {
        let _ = tx.send(count);
    })
}

/// Mutable state of one rule run
pub struct RunContext {
    config: CheckerConfig,
    cancel: CancellationToken,
    progress: Option<ProgressFn>,
    extent: Option<Extent>,
    /// Ordered features of the first layer
    features1: Vec<FeatureLayer>,
    /// Id-keyed features of the indexed layer
    features2: BTreeMap<FeatureId, FeatureLayer>,
    indexes: HashMap<String, FeatureIndex>,
}

impl RunContext {
    pub fn new(config: CheckerConfig, cancel: CancellationToken) -> Self {
        Self {
            config,
            cancel,
            progress: None,
            extent: None,
            features1: Vec::new(),
            features2: BTreeMap::new(),
            indexes: HashMap::new(),
        }
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    pub fn set_progress(&mut self, progress: Option<ProgressFn>) {
        self.progress = progress;
    }

    /// Clear working sets and index cache, and set the extent for the next run
    pub fn reset(&mut self, extent: Option<Rect<f64>>) {
        self.features1.clear();
        self.features2.clear();
        self.indexes.clear();
        self.extent = extent.map(Extent::new);
    }

    pub fn is_extent_scoped(&self) -> bool {
        self.extent.is_some()
    }

    fn filter_rect(&self) -> Option<Rect<f64>> {
        self.extent.as_ref().map(Extent::rect)
    }

    /// Apply the extent clipping policy to a conflict; `None` suppresses the violation
    pub fn clip_conflict(&self, conflict: Geometry<f64>) -> Option<Geometry<f64>> {
        match &self.extent {
            Some(extent) => extent.clip(conflict),
            None => Some(conflict),
        }
    }

    /// Disjoint suppression only, for conflicts that are never clipped
    pub fn retains(&self, conflict: &Geometry<f64>) -> bool {
        self.extent.as_ref().map_or(true, |extent| extent.retains(conflict))
    }

    /// Working Set 1, in store order
    pub fn feature_list(&self) -> &[FeatureLayer] {
        &self.features1
    }

    /// Working Set 2, keyed by feature id
    pub fn feature_map(&self) -> &BTreeMap<FeatureId, FeatureLayer> {
        &self.features2
    }

    /// Emit progress on the configured cadence and observe cancellation.
    /// Returns true when the scan should stop.
    pub fn checkpoint(&self, processed: usize) -> bool {
        let interval = self.config.progress_interval;
        if interval > 0 && processed % interval == 0 {
            if let Some(progress) = &self.progress {
                progress(processed);
            }
        }
        self.cancel.take()
    }

    /// Load the first layer's features (those with geometry) in store order
    pub fn fill_feature_list(&mut self, layer: &dyn Layer) -> Result<(), EngineError> {
        let rect = self.filter_rect();
        let features = layer.features(rect.as_ref(), false)?;
        for mut feature in features {
            let Some(geometry) = feature.geometry.take() else {
                continue;
            };
            feature.geometry = Some(geometry::normalize(geometry));
            self.features1.push(FeatureLayer::new(layer.id(), feature));
        }
        debug!("Loaded {} features from layer {}", self.features1.len(), layer.id());
        Ok(())
    }

    /// Build the spatial index for `layer` unless this run already has one.
    /// Indexed features are also added to the id-keyed working set.
    ///
    /// Cancellation is observed per feature; progress is left to the scan
    /// over primary features.
    pub fn ensure_index(&mut self, layer: &dyn Layer) -> Result<(), EngineError> {
        if self.indexes.contains_key(layer.id()) {
            return Ok(());
        }

        let rect = self.filter_rect();
        let features = layer.features(rect.as_ref(), false)?;
        let mut ids = Vec::with_capacity(features.len());
        for (i, mut feature) in features.into_iter().enumerate() {
            if self.cancel.take() {
                info!("Index build of {} stopped after {} features", layer.id(), i);
                return Err(EngineError::Cancelled(layer.id().to_string()));
            }
            let Some(geometry) = feature.geometry.take() else {
                continue;
            };
            feature.geometry = Some(geometry::normalize(geometry));
            ids.push(feature.id);
            self.features2.insert(feature.id, FeatureLayer::new(layer.id(), feature));
        }

        let entries: Vec<&FeatureLayer> =
            ids.iter().filter_map(|id| self.features2.get(id)).collect();
        let index = FeatureIndex::build(&entries);
        debug!("Indexed {} features of layer {}", index.len(), layer.id());
        self.indexes.insert(layer.id().to_string(), index);
        Ok(())
    }

    pub fn index(&self, layer_id: &str) -> Option<&FeatureIndex> {
        self.indexes.get(layer_id)
    }

    pub fn index_count(&self) -> usize {
        self.indexes.len()
    }

    /// Working-set entries of `layer_id` whose bounding box intersects `rect`
    pub fn candidates(&self, layer_id: &str, rect: &Rect<f64>) -> Vec<&FeatureLayer> {
        let Some(index) = self.indexes.get(layer_id) else {
            return Vec::new();
        };
        index
            .intersecting(rect)
            .into_iter()
            .filter_map(|id| self.features2.get(&id))
            .filter(|fl| fl.layer_id == layer_id)
            .collect()
    }
}
