//! Topology check data types
//!
//! Contains features, working-set entries and the violation records produced by the checks.

use geo_types::{Geometry, Rect};
use indexmap::IndexMap;
use serde::Serialize;
use wkt::ToWkt;

/// Stable feature identifier, unique within its source layer
pub type FeatureId = i64;

/// Coarse geometry classification of a layer or feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryKind {
    Point,
    Line,
    Polygon,
}

impl GeometryKind {
    /// Classify a geometry. Collections have no single kind.
    pub fn of(geometry: &Geometry<f64>) -> Option<Self> {
        match geometry {
            Geometry::Point(_) | Geometry::MultiPoint(_) => Some(GeometryKind::Point),
            Geometry::Line(_) | Geometry::LineString(_) | Geometry::MultiLineString(_) => {
                Some(GeometryKind::Line)
            }
            Geometry::Polygon(_)
            | Geometry::MultiPolygon(_)
            | Geometry::Rect(_)
            | Geometry::Triangle(_) => Some(GeometryKind::Polygon),
            Geometry::GeometryCollection(_) => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GeometryKind::Point => "point",
            GeometryKind::Line => "line",
            GeometryKind::Polygon => "polygon",
        }
    }
}

impl std::fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A feature: identity, optional geometry, and attributes
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: FeatureId,
    pub geometry: Option<Geometry<f64>>,
    pub attributes: IndexMap<String, serde_json::Value>,
}

impl Feature {
    pub fn new(id: FeatureId, geometry: impl Into<Geometry<f64>>) -> Self {
        Self {
            id,
            geometry: Some(geometry.into()),
            attributes: IndexMap::new(),
        }
    }

    /// A feature with no geometry attached
    pub fn without_geometry(id: FeatureId) -> Self {
        Self {
            id,
            geometry: None,
            attributes: IndexMap::new(),
        }
    }

    pub fn with_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn has_geometry(&self) -> bool {
        self.geometry.is_some()
    }
}

/// A (layer, feature) pair as held by the working sets and referenced by violations
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureLayer {
    pub layer_id: String,
    /// `None` when a violation references the layer as a whole (gaps)
    pub feature: Option<Feature>,
}

impl FeatureLayer {
    pub fn new(layer_id: impl Into<String>, feature: Feature) -> Self {
        Self {
            layer_id: layer_id.into(),
            feature: Some(feature),
        }
    }

    pub fn layer_only(layer_id: impl Into<String>) -> Self {
        Self {
            layer_id: layer_id.into(),
            feature: None,
        }
    }

    pub fn feature_id(&self) -> Option<FeatureId> {
        self.feature.as_ref().map(|f| f.id)
    }

    pub fn geometry(&self) -> Option<&Geometry<f64>> {
        self.feature.as_ref().and_then(|f| f.geometry.as_ref())
    }
}

/// Kind of topology violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    Dangle,
    Duplicate,
    Pseudo,
    Overlap,
    Gap,
    Invalid,
    Multipart,
    Intersection,
    PointNotCoveredBySegment,
    PointNotCoveredByLineEnds,
    LineEndsNotCoveredByPoints,
    PointNotInPolygon,
    PolygonContainsPoint,
}

impl ViolationKind {
    /// Display name shown to the user
    pub fn name(&self) -> &'static str {
        match self {
            ViolationKind::Dangle => "dangling end",
            ViolationKind::Duplicate => "duplicate geometry",
            ViolationKind::Pseudo => "pseudo node",
            ViolationKind::Overlap => "overlaps",
            ViolationKind::Gap => "gaps",
            ViolationKind::Invalid => "invalid geometry",
            ViolationKind::Multipart => "multipart feature",
            ViolationKind::Intersection => "intersecting geometries",
            ViolationKind::PointNotCoveredBySegment => "point not covered by segment",
            ViolationKind::PointNotCoveredByLineEnds => "point not covered",
            ViolationKind::LineEndsNotCoveredByPoints => "line ends not covered",
            ViolationKind::PointNotInPolygon => "point not in polygon",
            ViolationKind::PolygonContainsPoint => "polygon does not contain point",
        }
    }
}

/// One located topology violation
#[derive(Debug, Clone, PartialEq)]
pub struct TopologyViolation {
    pub kind: ViolationKind,
    /// Rectangle to zoom to; always contains `conflict`
    pub bounds: Rect<f64>,
    /// Geometry that visualizes the problem
    pub conflict: Geometry<f64>,
    pub features: Vec<FeatureLayer>,
}

impl TopologyViolation {
    pub fn new(
        kind: ViolationKind,
        bounds: Rect<f64>,
        conflict: Geometry<f64>,
        features: Vec<FeatureLayer>,
    ) -> Self {
        Self {
            kind,
            bounds,
            conflict,
            features,
        }
    }

    /// Serializable summary for hosts that render or export results
    pub fn report(&self) -> ViolationReport {
        ViolationReport {
            kind: self.kind.name(),
            bounds: [
                self.bounds.min().x,
                self.bounds.min().y,
                self.bounds.max().x,
                self.bounds.max().y,
            ],
            conflict_wkt: self.conflict.wkt_string(),
            features: self
                .features
                .iter()
                .map(|fl| FeatureRefReport {
                    layer_id: fl.layer_id.clone(),
                    feature_id: fl.feature_id(),
                })
                .collect(),
        }
    }
}

/// Flattened violation for JSON output
#[derive(Clone, Debug, Serialize)]
pub struct ViolationReport {
    pub kind: &'static str,
    /// [min_x, min_y, max_x, max_y]
    pub bounds: [f64; 4],
    pub conflict_wkt: String,
    pub features: Vec<FeatureRefReport>,
}

#[derive(Clone, Debug, Serialize)]
pub struct FeatureRefReport {
    pub layer_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_id: Option<FeatureId>,
}
