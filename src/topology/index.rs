//! Spatial indexing for candidate lookup
//!
//! R-tree over feature bounding boxes. Checks query it for the ids whose box
//! intersects a rectangle and then apply exact predicates to those candidates only.

use super::geometry;
use super::types::{FeatureId, FeatureLayer};
use geo_types::Rect;
use rayon::prelude::*;
use rstar::{RTree, RTreeObject, AABB};

/// Feature id with its bounding box, as stored in the R-tree
#[derive(Clone, Debug)]
pub struct IndexedFeature {
    pub id: FeatureId,
    pub bounds: AABB<[f64; 2]>,
}

impl IndexedFeature {
    pub fn new(id: FeatureId, rect: Rect<f64>) -> Self {
        Self {
            id,
            bounds: to_envelope(&rect),
        }
    }
}

impl RTreeObject for IndexedFeature {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.bounds
    }
}

fn to_envelope(rect: &Rect<f64>) -> AABB<[f64; 2]> {
    AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
}

/// Bounding-box index of one layer's features
#[derive(Debug, Default)]
pub struct FeatureIndex {
    tree: RTree<IndexedFeature>,
}

impl FeatureIndex {
    /// Bulk-load from working-set entries; entries without a bounding box are left out
    pub fn build(features: &[&FeatureLayer]) -> Self {
        let entries: Vec<IndexedFeature> = features
            .par_iter()
            .filter_map(|fl| {
                let id = fl.feature_id()?;
                let rect = geometry::bounds(fl.geometry()?)?;
                Some(IndexedFeature::new(id, rect))
            })
            .collect();

        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Ids whose bounding box intersects `rect`, ascending
    pub fn intersecting(&self, rect: &Rect<f64>) -> Vec<FeatureId> {
        let mut ids: Vec<FeatureId> = self
            .tree
            .locate_in_envelope_intersecting(&to_envelope(rect))
            .map(|entry| entry.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::types::Feature;
    use geo_types::{line_string, point};

    #[test]
    fn test_intersecting_returns_sorted_ids() {
        let features = vec![
            FeatureLayer::new("l", Feature::new(3, point!(x: 1.0, y: 1.0))),
            FeatureLayer::new(
                "l",
                Feature::new(1, line_string![(x: 0.0, y: 0.0), (x: 2.0, y: 2.0)]),
            ),
            FeatureLayer::new("l", Feature::new(2, point!(x: 10.0, y: 10.0))),
            FeatureLayer::new("l", Feature::without_geometry(4)),
        ];
        let refs: Vec<&FeatureLayer> = features.iter().collect();
        let index = FeatureIndex::build(&refs);

        assert_eq!(index.len(), 3);
        assert!(!index.is_empty());
        assert_eq!(index.intersecting(&Rect::new((0.5, 0.5), (1.5, 1.5))), vec![1, 3]);
        assert!(index.intersecting(&Rect::new((20.0, 20.0), (30.0, 30.0))).is_empty());
    }

    #[test]
    fn test_no_geometry_gives_empty_index() {
        let features = vec![FeatureLayer::new("l", Feature::without_geometry(1))];
        let refs: Vec<&FeatureLayer> = features.iter().collect();
        let index = FeatureIndex::build(&refs);
        assert!(index.is_empty());
        assert!(index.intersecting(&Rect::new((-1e9, -1e9), (1e9, 1e9))).is_empty());
    }

    #[test]
    fn test_touching_boxes_intersect() {
        let features = vec![FeatureLayer::new("l", Feature::new(1, point!(x: 5.0, y: 5.0)))];
        let refs: Vec<&FeatureLayer> = features.iter().collect();
        let index = FeatureIndex::build(&refs);
        assert_eq!(index.intersecting(&Rect::new((0.0, 0.0), (5.0, 5.0))), vec![1]);
    }
}
