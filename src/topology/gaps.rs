//! Gap detection for polygon layers
//!
//! All valid polygon parts are unioned, and the union is subtracted from a
//! buffered frame around its bounding rectangle. Every enclosed piece of the
//! difference is a gap. Gap violations reference the layer, not a feature.

use super::checks::usable;
use super::config::CheckerConfig;
use super::context::RunContext;
use super::geometry;
use super::layer::Layer;
use super::types::{FeatureLayer, GeometryKind, TopologyViolation, ViolationKind};
use geo_types::{Geometry, Polygon};
use tracing::{debug, info};

pub fn check_gaps(
    ctx: &RunContext,
    layer1: &dyn Layer,
    _layer2: Option<&dyn Layer>,
) -> Vec<TopologyViolation> {
    let mut violations = Vec::new();
    if layer1.geometry_kind() != GeometryKind::Polygon {
        return violations;
    }

    let mut parts: Vec<Polygon<f64>> = Vec::new();
    for (i, fl) in ctx.feature_list().iter().enumerate() {
        if ctx.checkpoint(i + 1) {
            info!("Gap check cancelled after {} features", i);
            break;
        }
        let Some(g) = usable(fl, "gap check") else {
            continue;
        };
        if !geometry::is_valid(g) {
            debug!("Invalid geometry {:?} skipped in gap check", fl.feature_id());
            continue;
        }
        parts.extend(geometry::polygon_parts(g));
    }

    if parts.is_empty() {
        return violations;
    }

    debug!("Cascaded union of {} polygon parts", parts.len());
    let union = geometry::cascaded_union(&parts);

    let config = ctx.config();
    let margin = if config.gap_frame_margin > 0.0 {
        config.gap_frame_margin
    } else {
        CheckerConfig::default().gap_frame_margin
    };

    for gap in geometry::interior_gaps(&union, margin, config.gap_frame_quadrant_segments) {
        let Some(conflict) = ctx.clip_conflict(Geometry::Polygon(gap)) else {
            continue;
        };
        let Some(bounds) = geometry::bounds(&conflict) else {
            continue;
        };
        let layer_ref = FeatureLayer::layer_only(layer1.id());
        violations.push(TopologyViolation::new(
            ViolationKind::Gap,
            bounds,
            conflict,
            vec![layer_ref.clone(), layer_ref],
        ));
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::context::CancellationToken;
    use crate::topology::layer::MemoryLayer;
    use approx::assert_relative_eq;
    use geo::Area;

    #[test]
    fn test_ring_of_polygons_has_one_gap() {
        // Four bars framing a 2x2 hole
        let layer = MemoryLayer::from_wkt(
            "parcels",
            GeometryKind::Polygon,
            &[
                "POLYGON((0 0, 4 0, 4 1, 0 1, 0 0))",
                "POLYGON((0 3, 4 3, 4 4, 0 4, 0 3))",
                "POLYGON((0 1, 1 1, 1 3, 0 3, 0 1))",
                "POLYGON((3 1, 4 1, 4 3, 3 3, 3 1))",
            ],
        )
        .unwrap();
        let mut ctx = RunContext::new(CheckerConfig::default(), CancellationToken::new());
        ctx.fill_feature_list(&layer).unwrap();

        let gaps = check_gaps(&ctx, &layer, None);
        assert_eq!(gaps.len(), 1);
        assert_relative_eq!(gaps[0].conflict.unsigned_area(), 4.0, epsilon = 1e-6);
        assert!(gaps[0].features.iter().all(|fl| fl.feature.is_none()));
    }

    fn gap_areas(wkt: &[&str]) -> Vec<f64> {
        let layer = MemoryLayer::from_wkt("parcels", GeometryKind::Polygon, wkt).unwrap();
        let mut ctx = RunContext::new(CheckerConfig::default(), CancellationToken::new());
        ctx.fill_feature_list(&layer).unwrap();
        let mut areas: Vec<f64> = check_gaps(&ctx, &layer, None)
            .iter()
            .map(|v| v.conflict.unsigned_area())
            .collect();
        areas.sort_by(f64::total_cmp);
        areas
    }

    #[test]
    fn test_hole_found_for_either_winding() {
        // Hole wound counter-clockwise, like its shell
        let same = gap_areas(&[
            "POLYGON((0 0, 10 0, 10 10, 0 10, 0 0), (4 4, 5 4, 5 5, 4 5, 4 4))",
        ]);
        let opposite = gap_areas(&[
            "POLYGON((0 0, 10 0, 10 10, 0 10, 0 0), (4 4, 4 5, 5 5, 5 4, 4 4))",
        ]);
        assert_eq!(same.len(), 1);
        assert_relative_eq!(same[0], 1.0, epsilon = 1e-6);
        assert_eq!(opposite.len(), 1);
        assert_relative_eq!(opposite[0], same[0], epsilon = 1e-9);

        // Clockwise shell with two counter-clockwise holes
        let two = gap_areas(&[
            "POLYGON((0 0, 0 10, 10 10, 10 0, 0 0), \
             (1 1, 3 1, 3 3, 1 3, 1 1), (6 6, 7 6, 7 7, 6 7, 6 6))",
        ]);
        assert_eq!(two.len(), 2);
        assert_relative_eq!(two[0], 1.0, epsilon = 1e-6);
        assert_relative_eq!(two[1], 4.0, epsilon = 1e-6);
    }

    #[test]
    fn test_no_features_no_gaps() {
        let layer = MemoryLayer::new("parcels", GeometryKind::Polygon);
        let ctx = RunContext::new(CheckerConfig::default(), CancellationToken::new());
        assert!(check_gaps(&ctx, &layer, None).is_empty());
    }
}
