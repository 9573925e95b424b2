//! Single-layer checks
//!
//! Validity, multipart, endpoint (dangle and pseudo node), duplicate and
//! overlap detection over the working sets of one layer.

use super::context::RunContext;
use super::geometry;
use super::layer::Layer;
use super::types::{FeatureId, FeatureLayer, GeometryKind, TopologyViolation, ViolationKind};
use geo_types::{Coord, Geometry, Point};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

/// Both references of a single-feature violation point at the same feature
fn self_pair(fl: &FeatureLayer) -> Vec<FeatureLayer> {
    vec![fl.clone(), fl.clone()]
}

/// Geometry the checks can reason about; logs and rejects everything else
pub(crate) fn usable<'a>(fl: &'a FeatureLayer, rule: &str) -> Option<&'a Geometry<f64>> {
    let Some(g) = fl.geometry() else {
        warn!("{}: feature {:?} has no geometry, skipping", rule, fl.feature_id());
        return None;
    };
    if !geometry::is_convertible(g) {
        warn!("{}: feature {:?} has unusable geometry, skipping", rule, fl.feature_id());
        return None;
    }
    Some(g)
}

pub fn check_valid(
    ctx: &RunContext,
    _layer1: &dyn Layer,
    _layer2: Option<&dyn Layer>,
) -> Vec<TopologyViolation> {
    let mut violations = Vec::new();

    for (i, fl) in ctx.feature_list().iter().enumerate() {
        if ctx.checkpoint(i + 1) {
            info!("Validity check cancelled after {} features", i);
            break;
        }
        let Some(g) = usable(fl, "validity") else {
            continue;
        };
        if geometry::is_valid(g) {
            continue;
        }
        if let Some(bounds) = geometry::bounds(g) {
            violations.push(TopologyViolation::new(
                ViolationKind::Invalid,
                bounds,
                g.clone(),
                self_pair(fl),
            ));
        }
    }

    violations
}

pub fn check_multipart(
    ctx: &RunContext,
    _layer1: &dyn Layer,
    _layer2: Option<&dyn Layer>,
) -> Vec<TopologyViolation> {
    let mut violations = Vec::new();

    for (i, fl) in ctx.feature_list().iter().enumerate() {
        if ctx.checkpoint(i + 1) {
            info!("Multipart check cancelled after {} features", i);
            break;
        }
        let Some(g) = usable(fl, "multipart") else {
            continue;
        };
        if !geometry::is_multipart(g) {
            continue;
        }
        if let Some(bounds) = geometry::bounds(g) {
            violations.push(TopologyViolation::new(
                ViolationKind::Multipart,
                bounds,
                g.clone(),
                self_pair(fl),
            ));
        }
    }

    violations
}

/// Endpoint coordinate ordered by exact, lexicographic comparison
#[derive(Clone, Copy, Debug)]
struct EndpointKey(Coord<f64>);

impl EndpointKey {
    fn new(coord: Coord<f64>) -> Self {
        // -0.0 and 0.0 are the same location
        Self(Coord {
            x: coord.x + 0.0,
            y: coord.y + 0.0,
        })
    }
}

impl PartialEq for EndpointKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EndpointKey {}

impl PartialOrd for EndpointKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EndpointKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .x
            .total_cmp(&other.0.x)
            .then_with(|| self.0.y.total_cmp(&other.0.y))
    }
}

/// Multiset of line part endpoints, each entry valued by the owning feature id
/// in insertion order
fn collect_endpoints(ctx: &RunContext, rule: &str) -> BTreeMap<EndpointKey, Vec<FeatureId>> {
    let mut endpoints: BTreeMap<EndpointKey, Vec<FeatureId>> = BTreeMap::new();

    for (i, fl) in ctx.feature_list().iter().enumerate() {
        if ctx.checkpoint(i + 1) {
            info!("{} cancelled after {} features", rule, i);
            break;
        }
        let Some(g) = usable(fl, rule) else {
            continue;
        };
        let Some(id) = fl.feature_id() else {
            continue;
        };
        for coord in geometry::line_endpoints(g) {
            endpoints.entry(EndpointKey::new(coord)).or_default().push(id);
        }
    }

    endpoints
}

/// Report every endpoint whose multiplicity is exactly `multiplicity`
fn endpoint_violations(
    ctx: &RunContext,
    layer: &dyn Layer,
    endpoints: BTreeMap<EndpointKey, Vec<FeatureId>>,
    multiplicity: usize,
    kind: ViolationKind,
) -> Vec<TopologyViolation> {
    let mut violations = Vec::new();

    for (key, ids) in endpoints {
        if ids.len() != multiplicity {
            continue;
        }
        let conflict = Geometry::Point(Point::from(key.0));
        // Point conflicts cannot cross the extent boundary
        if !ctx.retains(&conflict) {
            continue;
        }
        let Some(bounds) = geometry::bounds(&conflict) else {
            continue;
        };
        let fl = representative(ctx, layer, ids[0]);
        violations.push(TopologyViolation::new(kind, bounds, conflict, self_pair(&fl)));
    }

    violations
}

/// Feature referenced by an endpoint violation, attributes included
fn representative(ctx: &RunContext, layer: &dyn Layer, id: FeatureId) -> FeatureLayer {
    match layer.feature(id) {
        Ok(Some(feature)) => return FeatureLayer::new(layer.id(), feature),
        Ok(None) => warn!("Feature {} vanished from layer {}", id, layer.id()),
        Err(e) => warn!("Failed to fetch feature {} from layer {}: {}", id, layer.id(), e),
    }
    ctx.feature_list()
        .iter()
        .find(|fl| fl.feature_id() == Some(id))
        .cloned()
        .unwrap_or_else(|| FeatureLayer::layer_only(layer.id()))
}

pub fn check_dangling_lines(
    ctx: &RunContext,
    layer1: &dyn Layer,
    _layer2: Option<&dyn Layer>,
) -> Vec<TopologyViolation> {
    if layer1.geometry_kind() != GeometryKind::Line {
        return Vec::new();
    }
    let endpoints = collect_endpoints(ctx, "dangle check");
    endpoint_violations(ctx, layer1, endpoints, 1, ViolationKind::Dangle)
}

pub fn check_pseudos(
    ctx: &RunContext,
    layer1: &dyn Layer,
    _layer2: Option<&dyn Layer>,
) -> Vec<TopologyViolation> {
    if layer1.geometry_kind() != GeometryKind::Line {
        return Vec::new();
    }
    let endpoints = collect_endpoints(ctx, "pseudo node check");
    endpoint_violations(ctx, layer1, endpoints, 2, ViolationKind::Pseudo)
}

/// Exactly equal geometries. A feature matched as the duplicate of an earlier
/// one is not reported again as a primary.
pub fn check_duplicates(
    ctx: &RunContext,
    layer1: &dyn Layer,
    _layer2: Option<&dyn Layer>,
) -> Vec<TopologyViolation> {
    let mut violations = Vec::new();
    let mut consumed: HashSet<FeatureId> = HashSet::new();

    for (i, (id, fl)) in ctx.feature_map().iter().enumerate() {
        if consumed.contains(id) {
            continue;
        }
        if ctx.checkpoint(i + 1) {
            info!("Duplicate check cancelled after {} features", i);
            break;
        }
        let Some(g1) = usable(fl, "duplicate check") else {
            continue;
        };
        let Some(bb) = geometry::bounds(g1) else {
            continue;
        };

        for candidate in ctx.candidates(layer1.id(), &bb) {
            if candidate.feature_id() == Some(*id) {
                continue;
            }
            let Some(g2) = usable(candidate, "duplicate check") else {
                continue;
            };
            if !geometry::equals(g1, g2) {
                continue;
            }
            if let Some(other) = candidate.feature_id() {
                consumed.insert(other);
            }
            let Some(conflict) = ctx.clip_conflict(g1.clone()) else {
                continue;
            };
            violations.push(TopologyViolation::new(
                ViolationKind::Duplicate,
                bb,
                conflict,
                self_pair(fl),
            ));
        }
    }

    violations
}

/// Polygon pairs sharing interior area. Each unordered pair is reported once,
/// from the feature with the lower id.
pub fn check_overlaps(
    ctx: &RunContext,
    layer1: &dyn Layer,
    _layer2: Option<&dyn Layer>,
) -> Vec<TopologyViolation> {
    let mut violations = Vec::new();
    if layer1.geometry_kind() != GeometryKind::Polygon {
        return violations;
    }
    if ctx.index(layer1.id()).is_none() {
        debug!("No index for layer {}", layer1.id());
        return violations;
    }

    for (i, (id, fl)) in ctx.feature_map().iter().enumerate() {
        if ctx.checkpoint(i + 1) {
            info!("Overlap check cancelled after {} features", i);
            break;
        }
        let Some(g1) = usable(fl, "overlap check") else {
            continue;
        };
        if !geometry::is_valid(g1) {
            debug!("Invalid geometry {} skipped in overlap check", id);
            continue;
        }
        let Some(bb) = geometry::bounds(g1) else {
            continue;
        };

        for candidate in ctx.candidates(layer1.id(), &bb) {
            let Some(other) = candidate.feature_id() else {
                continue;
            };
            // Only check each pair once (a.id < b.id)
            if other <= *id {
                continue;
            }
            let Some(g2) = usable(candidate, "overlap check") else {
                continue;
            };
            if !geometry::is_valid(g2) {
                warn!("Skipping invalid geometry of feature {} in overlap check", other);
                continue;
            }
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
                ViolationKind::Overlap,
                bounds,
                conflict,
                vec![fl.clone(), candidate.clone()],
            ));
        }
    }

    violations
}
