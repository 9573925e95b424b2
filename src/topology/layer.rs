//! Feature store abstraction
//!
//! A `Layer` yields features by rectangle or by id. `MemoryLayer` keeps them in an
//! insertion-ordered map; `SqliteLayer` (see `sqlite`) reads them from a table.

use super::error::StoreError;
use super::geometry;
use super::types::{Feature, FeatureId, GeometryKind};
use geo_types::{Geometry, Rect};
use indexmap::IndexMap;
use std::path::Path;
use wkt::TryFromWkt;

/// A named, typed feature collection
pub trait Layer {
    /// Stable identity, used as the spatial index cache key
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    fn geometry_kind(&self) -> GeometryKind;

    /// Features whose geometry intersects `filter` (all features when `None`).
    /// Attributes are only loaded when `with_attributes` is set.
    fn features(
        &self,
        filter: Option<&Rect<f64>>,
        with_attributes: bool,
    ) -> Result<Vec<Feature>, StoreError>;

    /// Fetch a single feature, attributes included
    fn feature(&self, id: FeatureId) -> Result<Option<Feature>, StoreError>;
}

/// Exact-intersect rectangle filter shared by the stores
pub fn matches_filter(feature: &Feature, filter: Option<&Rect<f64>>) -> bool {
    let Some(rect) = filter else {
        return true;
    };
    match &feature.geometry {
        Some(g) if geometry::is_convertible(g) => {
            geometry::intersects(g, &Geometry::Polygon(rect.to_polygon()))
        }
        // Unusable geometry cannot be tested; fall back to the bounding box
        Some(g) => geometry::bounds(g)
            .map(|b| {
                b.min().x <= rect.max().x
                    && b.max().x >= rect.min().x
                    && b.min().y <= rect.max().y
                    && b.max().y >= rect.min().y
            })
            .unwrap_or(false),
        None => false,
    }
}

/// Parse a WKT string into a geometry
pub fn parse_wkt(id: FeatureId, text: &str) -> Result<Geometry<f64>, StoreError> {
    Geometry::<f64>::try_from_wkt_str(text).map_err(|e| StoreError::Wkt {
        id,
        message: format!("{:?}", e),
    })
}

/// In-memory feature store
#[derive(Debug, Clone)]
pub struct MemoryLayer {
    id: String,
    name: String,
    kind: GeometryKind,
    features: IndexMap<FeatureId, Feature>,
}

impl MemoryLayer {
    pub fn new(id: impl Into<String>, kind: GeometryKind) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            kind,
            features: IndexMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Build a layer from WKT strings; feature ids are 1-based positions
    pub fn from_wkt(
        id: impl Into<String>,
        kind: GeometryKind,
        wkt: &[&str],
    ) -> Result<Self, StoreError> {
        let mut layer = Self::new(id, kind);
        for (i, text) in wkt.iter().enumerate() {
            let fid = i as FeatureId + 1;
            layer.push(Feature::new(fid, parse_wkt(fid, text)?));
        }
        Ok(layer)
    }

    /// Read a layer from a text file holding one WKT geometry per line.
    ///
    /// A line may carry an explicit id as `id;WKT`; otherwise ids are 1-based
    /// line positions among geometry lines. Blank lines and lines starting
    /// with `#` are skipped. Without a declared kind, the first geometry decides.
    pub fn read_wkt_file<P: AsRef<Path>>(
        path: P,
        kind: Option<GeometryKind>,
    ) -> Result<Self, StoreError> {
        let text = std::fs::read_to_string(&path)?;
        let mut features = Vec::new();

        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let position = features.len() as FeatureId + 1;
            let (fid, wkt) = match line.split_once(';') {
                Some((id, wkt)) => match id.trim().parse::<FeatureId>() {
                    Ok(fid) => (fid, wkt.trim()),
                    Err(_) => (position, line),
                },
                None => (position, line),
            };
            features.push(Feature::new(fid, parse_wkt(fid, wkt)?));
        }

        let id = path.as_ref().display().to_string();
        let kind = match kind {
            Some(kind) => kind,
            None => features
                .iter()
                .find_map(|f| f.geometry.as_ref().and_then(GeometryKind::of))
                .ok_or_else(|| StoreError::UnknownGeometryKind(id.clone()))?,
        };

        let mut layer = Self::new(id, kind);
        if let Some(stem) = path.as_ref().file_stem() {
            layer = layer.with_name(stem.to_string_lossy());
        }
        for feature in features {
            layer.push(feature);
        }
        Ok(layer)
    }

    pub fn with_feature(mut self, feature: Feature) -> Self {
        self.push(feature);
        self
    }

    /// Insert, or replace in place when the id is already stored
    pub fn push(&mut self, feature: Feature) {
        self.features.insert(feature.id, feature);
    }

    /// Remove by id, keeping the order of the remaining features
    pub fn remove(&mut self, id: FeatureId) -> Option<Feature> {
        self.features.shift_remove(&id)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl Layer for MemoryLayer {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn geometry_kind(&self) -> GeometryKind {
        self.kind
    }

    fn features(
        &self,
        filter: Option<&Rect<f64>>,
        with_attributes: bool,
    ) -> Result<Vec<Feature>, StoreError> {
        Ok(self
            .features
            .values()
            .filter(|f| matches_filter(f, filter))
            .map(|f| {
                let mut feature = f.clone();
                if !with_attributes {
                    feature.attributes.clear();
                }
                feature
            })
            .collect())
    }

    fn feature(&self, id: FeatureId) -> Result<Option<Feature>, StoreError> {
        Ok(self.features.get(&id).cloned())
    }
}
