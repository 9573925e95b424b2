//! Two-layer checks
//!
//! Every feature of the first layer is tested against the second layer's
//! features whose bounding box meets its own, looked up through the index.

use super::checks::usable;
use super::context::RunContext;
use super::geometry;
use super::layer::Layer;
use super::rules::Rule;
use super::types::{FeatureLayer, TopologyViolation, ViolationKind};
use geo_types::{Geometry, Point, Rect};
use tracing::{debug, info};

/// Second layer, when both layers have the kinds the rule accepts
fn second_layer<'a>(
    rule: Rule,
    layer1: &dyn Layer,
    layer2: Option<&'a dyn Layer>,
) -> Option<&'a dyn Layer> {
    let layer2 = layer2?;
    if rule
        .descriptor()
        .accepts(layer1.geometry_kind(), Some(layer2.geometry_kind()))
    {
        Some(layer2)
    } else {
        debug!(
            "'{}' does not apply to {} and {} layers",
            rule,
            layer1.geometry_kind(),
            layer2.geometry_kind()
        );
        None
    }
}

/// Primary features with a usable geometry and its bounds, stopping on cancellation
fn primaries<'a>(
    ctx: &'a RunContext,
    rule: Rule,
) -> impl Iterator<Item = (&'a FeatureLayer, &'a Geometry<f64>, Rect<f64>)> + 'a {
    ctx.feature_list()
        .iter()
        .enumerate()
        .take_while(move |(i, _)| {
            let stop = ctx.checkpoint(i + 1);
            if stop {
                info!("'{}' cancelled after {} features", rule, i);
            }
            !stop
        })
        .filter_map(move |(_, fl)| {
            let g = usable(fl, rule.name())?;
            let bb = geometry::bounds(g)?;
            Some((fl, g, bb))
        })
}

fn self_pair(fl: &FeatureLayer) -> Vec<FeatureLayer> {
    vec![fl.clone(), fl.clone()]
}

fn point(coord: geo_types::Coord<f64>) -> Geometry<f64> {
    Geometry::Point(Point::from(coord))
}

/// Polygons of the first layer that overlap polygons of the second. When both
/// layers are the same a feature is not compared with itself.
pub fn check_overlap_with_layer(
    ctx: &RunContext,
    layer1: &dyn Layer,
    layer2: Option<&dyn Layer>,
) -> Vec<TopologyViolation> {
    let mut violations = Vec::new();
    let rule = Rule::OverlapWithLayer;
    let Some(layer2) = second_layer(rule, layer1, layer2) else {
        return violations;
    };
    let skip_itself = layer1.id() == layer2.id();

    for (fl, g1, bb) in primaries(ctx, rule) {
        for candidate in ctx.candidates(layer2.id(), &bb) {
            if skip_itself && candidate.feature_id() == fl.feature_id() {
                continue;
            }
            let Some(g2) = usable(candidate, rule.name()) else {
                continue;
            };
            if !geometry::overlaps(g1, g2) {
                continue;
            }
            let conflict = geometry::intersection(g1, g2).and_then(|c| ctx.clip_conflict(c));
            let Some(conflict) = conflict else {
                continue;
            };
            let bounds = match geometry::bounds(g2) {
                Some(b2) => geometry::combine(bb, b2),
                None => bb,
            };
            violations.push(TopologyViolation::new(
                ViolationKind::Intersection,
                bounds,
                conflict,
                vec![fl.clone(), candidate.clone()],
            ));
        }
    }

    violations
}

/// Points that touch no line or polygon boundary of the second layer
pub fn check_point_covered_by_segment(
    ctx: &RunContext,
    layer1: &dyn Layer,
    layer2: Option<&dyn Layer>,
) -> Vec<TopologyViolation> {
    let mut violations = Vec::new();
    let rule = Rule::PointCoveredBySegment;
    let Some(layer2) = second_layer(rule, layer1, layer2) else {
        return violations;
    };

    for (fl, g1, bb) in primaries(ctx, rule) {
        let touched = ctx
            .candidates(layer2.id(), &bb)
            .into_iter()
            .filter_map(|candidate| usable(candidate, rule.name()))
            .any(|g2| geometry::touches(g1, g2));
        if touched || !ctx.retains(g1) {
            continue;
        }
        violations.push(TopologyViolation::new(
            ViolationKind::PointNotCoveredBySegment,
            bb,
            g1.clone(),
            self_pair(fl),
        ));
    }

    violations
}

/// Points that meet no start or end vertex of a second-layer line
pub fn check_point_covered_by_line_ends(
    ctx: &RunContext,
    layer1: &dyn Layer,
    layer2: Option<&dyn Layer>,
) -> Vec<TopologyViolation> {
    let mut violations = Vec::new();
    let rule = Rule::PointCoveredByLineEnds;
    let Some(layer2) = second_layer(rule, layer1, layer2) else {
        return violations;
    };

    for (fl, g1, bb) in primaries(ctx, rule) {
        let touched = ctx
            .candidates(layer2.id(), &bb)
            .into_iter()
            .filter_map(|candidate| usable(candidate, rule.name()))
            .flat_map(geometry::line_endpoints)
            .any(|end| geometry::intersects(g1, &point(end)));
        if touched || !ctx.retains(g1) {
            continue;
        }
        violations.push(TopologyViolation::new(
            ViolationKind::PointNotCoveredByLineEnds,
            bb,
            g1.clone(),
            self_pair(fl),
        ));
    }

    violations
}

/// Lines whose end vertices are not all covered by second-layer points. Each
/// end may be covered by a different point.
pub fn check_line_ends_covered_by_points(
    ctx: &RunContext,
    layer1: &dyn Layer,
    layer2: Option<&dyn Layer>,
) -> Vec<TopologyViolation> {
    let mut violations = Vec::new();
    let rule = Rule::LineEndsCoveredByPoints;
    let Some(layer2) = second_layer(rule, layer1, layer2) else {
        return violations;
    };

    for (fl, g1, bb) in primaries(ctx, rule) {
        let ends: Vec<Geometry<f64>> =
            geometry::line_endpoints(g1).into_iter().map(point).collect();
        let mut covered = vec![false; ends.len()];

        for candidate in ctx.candidates(layer2.id(), &bb) {
            let Some(g2) = usable(candidate, rule.name()) else {
                continue;
            };
            for (end, hit) in ends.iter().zip(covered.iter_mut()) {
                if !*hit && geometry::intersects(g2, end) {
                    *hit = true;
                }
            }
            if covered.iter().all(|hit| *hit) {
                break;
            }
        }

        if covered.iter().all(|hit| *hit) {
            continue;
        }
        let Some(conflict) = ctx.clip_conflict(g1.clone()) else {
            continue;
        };
        violations.push(TopologyViolation::new(
            ViolationKind::LineEndsNotCoveredByPoints,
            bb,
            conflict,
            self_pair(fl),
        ));
    }

    violations
}

/// Points not contained by any second-layer polygon
pub fn check_point_in_polygon(
    ctx: &RunContext,
    layer1: &dyn Layer,
    layer2: Option<&dyn Layer>,
) -> Vec<TopologyViolation> {
    let mut violations = Vec::new();
    let rule = Rule::PointInPolygon;
    let Some(layer2) = second_layer(rule, layer1, layer2) else {
        return violations;
    };

    for (fl, g1, bb) in primaries(ctx, rule) {
        let inside = ctx
            .candidates(layer2.id(), &bb)
            .into_iter()
            .filter_map(|candidate| usable(candidate, rule.name()))
            .any(|g2| geometry::contains(g2, g1));
        if inside || !ctx.retains(g1) {
            continue;
        }
        violations.push(TopologyViolation::new(
            ViolationKind::PointNotInPolygon,
            bb,
            g1.clone(),
            self_pair(fl),
        ));
    }

    violations
}

/// Polygons that contain no second-layer point. The conflict is never clipped.
pub fn check_polygon_contains_point(
    ctx: &RunContext,
    layer1: &dyn Layer,
    layer2: Option<&dyn Layer>,
) -> Vec<TopologyViolation> {
    let mut violations = Vec::new();
    let rule = Rule::PolygonContainsPoint;
    let Some(layer2) = second_layer(rule, layer1, layer2) else {
        return violations;
    };

    for (fl, g1, bb) in primaries(ctx, rule) {
        let contains = ctx
            .candidates(layer2.id(), &bb)
            .into_iter()
            .filter_map(|candidate| usable(candidate, rule.name()))
            .any(|g2| geometry::contains(g1, g2));
        if contains {
            continue;
        }
        violations.push(TopologyViolation::new(
            ViolationKind::PolygonContainsPoint,
            bb,
            g1.clone(),
            self_pair(fl),
        ));
    }

    violations
}
