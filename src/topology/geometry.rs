//! Geometry engine adapter
//!
//! Wraps `geo` to provide the exact predicates and set operations the checks use.
//! Predicates are answered from the DE-9IM matrix so every pair of geometry
//! kinds is handled uniformly.

use geo::algorithm::orient::{Direction, Orient};
use geo::{unary_union, BooleanOps, BoundingRect, CoordsIter, Intersects, Relate, Validation};
use geo_types::{
    Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon, Rect,
};
use std::f64::consts::{FRAC_PI_2, PI};

/// Convert the convenience variants into the simple feature types the checks expect
pub fn normalize(geometry: Geometry<f64>) -> Geometry<f64> {
    match geometry {
        Geometry::Line(line) => Geometry::LineString(LineString::from(vec![line.start, line.end])),
        Geometry::Rect(rect) => Geometry::Polygon(rect.to_polygon()),
        Geometry::Triangle(triangle) => Geometry::Polygon(triangle.to_polygon()),
        other => other,
    }
}

/// Whether the engine can work with this geometry at all.
///
/// Rejects collections, empty geometries, lines with fewer than two vertices,
/// rings with fewer than four, and non-finite coordinates.
pub fn is_convertible(geometry: &Geometry<f64>) -> bool {
    let structurally_ok = match geometry {
        Geometry::GeometryCollection(_) => false,
        Geometry::LineString(ls) => ls.0.len() >= 2,
        Geometry::MultiLineString(mls) => mls.0.iter().all(|ls| ls.0.len() >= 2),
        Geometry::Polygon(polygon) => rings_importable(polygon),
        Geometry::MultiPolygon(mp) => mp.0.iter().all(rings_importable),
        _ => true,
    };
    if !structurally_ok {
        return false;
    }

    let mut count = 0usize;
    for coord in geometry.coords_iter() {
        if !coord.x.is_finite() || !coord.y.is_finite() {
            return false;
        }
        count += 1;
    }
    count > 0
}

fn rings_importable(polygon: &Polygon<f64>) -> bool {
    polygon.exterior().0.len() >= 4 && polygon.interiors().iter().all(|ring| ring.0.len() >= 4)
}

pub fn is_multipart(geometry: &Geometry<f64>) -> bool {
    matches!(
        geometry,
        Geometry::MultiPoint(_) | Geometry::MultiLineString(_) | Geometry::MultiPolygon(_)
    )
}

pub fn bounds(geometry: &Geometry<f64>) -> Option<Rect<f64>> {
    geometry.bounding_rect()
}

/// Smallest rectangle containing both
pub fn combine(a: Rect<f64>, b: Rect<f64>) -> Rect<f64> {
    Rect::new(
        Coord {
            x: a.min().x.min(b.min().x),
            y: a.min().y.min(b.min().y),
        },
        Coord {
            x: a.max().x.max(b.max().x),
            y: a.max().y.max(b.max().y),
        },
    )
}

/// Simple line parts of a line geometry (one per part of a multi-line)
pub fn line_parts(geometry: &Geometry<f64>) -> Vec<&LineString<f64>> {
    match geometry {
        Geometry::LineString(ls) if !ls.0.is_empty() => vec![ls],
        Geometry::MultiLineString(mls) => mls.0.iter().filter(|ls| !ls.0.is_empty()).collect(),
        _ => Vec::new(),
    }
}

/// Start and end vertex of every line part
pub fn line_endpoints(geometry: &Geometry<f64>) -> Vec<Coord<f64>> {
    line_parts(geometry)
        .into_iter()
        .filter_map(|ls| Some([*ls.0.first()?, *ls.0.last()?]))
        .flatten()
        .collect()
}

/// Simple polygon parts of a polygonal geometry
pub fn polygon_parts(geometry: &Geometry<f64>) -> Vec<Polygon<f64>> {
    match geometry {
        Geometry::Polygon(polygon) => vec![polygon.clone()],
        Geometry::MultiPolygon(mp) => mp.0.clone(),
        _ => Vec::new(),
    }
}

fn as_area(geometry: &Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geometry {
        Geometry::Polygon(polygon) => Some(MultiPolygon::new(vec![polygon.clone()])),
        Geometry::MultiPolygon(mp) => Some(mp.clone()),
        _ => None,
    }
}

pub fn is_valid(geometry: &Geometry<f64>) -> bool {
    geometry.is_valid()
}

pub fn intersects(a: &Geometry<f64>, b: &Geometry<f64>) -> bool {
    a.relate(b).is_intersects()
}

pub fn disjoint(a: &Geometry<f64>, b: &Geometry<f64>) -> bool {
    a.relate(b).is_disjoint()
}

pub fn touches(a: &Geometry<f64>, b: &Geometry<f64>) -> bool {
    a.relate(b).is_touches()
}

pub fn overlaps(a: &Geometry<f64>, b: &Geometry<f64>) -> bool {
    a.relate(b).is_overlaps()
}

pub fn contains(a: &Geometry<f64>, b: &Geometry<f64>) -> bool {
    a.relate(b).is_contains()
}

pub fn covers(a: &Geometry<f64>, b: &Geometry<f64>) -> bool {
    a.relate(b).is_covers()
}

/// Exact topological equality, not bounding box equality
pub fn equals(a: &Geometry<f64>, b: &Geometry<f64>) -> bool {
    a.relate(b).is_equal_topo()
}

/// Intersection of two geometries where at least one is polygonal
pub fn intersection(a: &Geometry<f64>, b: &Geometry<f64>) -> Option<Geometry<f64>> {
    if let Some(area) = as_area(b) {
        return intersection_with_area(a, &area);
    }
    if let Some(area) = as_area(a) {
        return intersection_with_area(b, &area);
    }
    None
}

/// Part of `geometry` inside `area`, or `None` when nothing remains
pub fn intersection_with_area(
    geometry: &Geometry<f64>,
    area: &MultiPolygon<f64>,
) -> Option<Geometry<f64>> {
    match geometry {
        Geometry::Point(point) => area.intersects(point).then_some(Geometry::Point(*point)),
        Geometry::MultiPoint(points) => {
            let kept: Vec<Point<f64>> =
                points.iter().filter(|p| area.intersects(*p)).copied().collect();
            (!kept.is_empty()).then(|| Geometry::MultiPoint(MultiPoint::new(kept)))
        }
        Geometry::LineString(ls) => {
            collapse_lines(area.clip(&MultiLineString::new(vec![ls.clone()]), false))
        }
        Geometry::MultiLineString(mls) => collapse_lines(area.clip(mls, false)),
        Geometry::Polygon(_) | Geometry::MultiPolygon(_) => {
            let own = as_area(geometry)?;
            collapse_area(own.intersection(area))
        }
        _ => None,
    }
}

fn collapse_lines(mut lines: MultiLineString<f64>) -> Option<Geometry<f64>> {
    lines.0.retain(|ls| ls.0.len() >= 2);
    match lines.0.len() {
        0 => None,
        1 => lines.0.pop().map(Geometry::LineString),
        _ => Some(Geometry::MultiLineString(lines)),
    }
}

fn collapse_area(mut area: MultiPolygon<f64>) -> Option<Geometry<f64>> {
    match area.0.len() {
        0 => None,
        1 => area.0.pop().map(Geometry::Polygon),
        _ => Some(Geometry::MultiPolygon(area)),
    }
}

/// The current view rectangle and the clipping policy applied to conflicts
#[derive(Clone, Debug)]
pub struct Extent {
    rect: Rect<f64>,
    polygon: Geometry<f64>,
    area: MultiPolygon<f64>,
}

impl Extent {
    pub fn new(rect: Rect<f64>) -> Self {
        let polygon = rect.to_polygon();
        Self {
            rect,
            area: MultiPolygon::new(vec![polygon.clone()]),
            polygon: Geometry::Polygon(polygon),
        }
    }

    pub fn rect(&self) -> Rect<f64> {
        self.rect
    }

    /// False when the conflict lies entirely outside the extent
    pub fn retains(&self, conflict: &Geometry<f64>) -> bool {
        !disjoint(&self.polygon, conflict)
    }

    /// Apply the clipping policy: drop disjoint conflicts, keep contained ones
    /// as they are, and cut the rest down to the extent.
    pub fn clip(&self, conflict: Geometry<f64>) -> Option<Geometry<f64>> {
        if !self.retains(&conflict) {
            return None;
        }
        if covers(&self.polygon, &conflict) {
            return Some(conflict);
        }
        intersection_with_area(&conflict, &self.area)
    }
}

/// Rectangle grown outward by `distance`, with rounded corners of
/// `quadrant_segments` segments each
pub fn buffered_frame(rect: Rect<f64>, distance: f64, quadrant_segments: u32) -> Polygon<f64> {
    let segments = quadrant_segments.max(1);
    let step = FRAC_PI_2 / segments as f64;
    let (min, max) = (rect.min(), rect.max());

    // Corner centres counter-clockwise from bottom-right, with the arc start angle
    let corners = [
        (max.x, min.y, -FRAC_PI_2),
        (max.x, max.y, 0.0),
        (min.x, max.y, FRAC_PI_2),
        (min.x, min.y, PI),
    ];

    let mut ring = Vec::with_capacity(4 * (segments as usize + 1) + 1);
    for (cx, cy, start) in corners {
        for k in 0..=segments {
            let angle = start + step * k as f64;
            ring.push(Coord {
                x: cx + distance * angle.cos(),
                y: cy + distance * angle.sin(),
            });
        }
    }

    Polygon::new(LineString::from(ring), vec![])
}

/// Cascaded union of many polygons.
///
/// Rings are reoriented first: the union treats an interior ring wound like
/// its shell as filled.
pub fn cascaded_union(parts: &[Polygon<f64>]) -> MultiPolygon<f64> {
    let oriented: Vec<Polygon<f64>> =
        parts.iter().map(|p| p.orient(Direction::Default)).collect();
    unary_union(&oriented)
}

/// Holes enclosed by `union`, found by subtracting it from a buffered frame
/// around its bounding rectangle.
///
/// The piece of the difference that reaches into the frame margin is the
/// exterior, not a gap, and is excluded by its extent rather than by its
/// position in the result.
pub fn interior_gaps(
    union: &MultiPolygon<f64>,
    margin: f64,
    quadrant_segments: u32,
) -> Vec<Polygon<f64>> {
    let Some(bounds) = union.bounding_rect() else {
        return Vec::new();
    };

    let frame = MultiPolygon::new(vec![buffered_frame(bounds, margin, quadrant_segments)]);
    let tolerance = margin / 2.0;

    frame
        .difference(union)
        .into_iter()
        .filter(|part| !reaches_margin(part, &bounds, tolerance))
        .collect()
}

fn reaches_margin(part: &Polygon<f64>, bounds: &Rect<f64>, tolerance: f64) -> bool {
    match part.bounding_rect() {
        Some(r) => {
            r.min().x < bounds.min().x - tolerance
                || r.min().y < bounds.min().y - tolerance
                || r.max().x > bounds.max().x + tolerance
                || r.max().y > bounds.max().y + tolerance
        }
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::Area;
    use geo_types::{line_string, point, polygon};

    fn square(x: f64, y: f64, size: f64) -> Polygon<f64> {
        polygon![
            (x: x, y: y),
            (x: x + size, y: y),
            (x: x + size, y: y + size),
            (x: x, y: y + size),
            (x: x, y: y),
        ]
    }

    #[test]
    fn test_convertible_rejects_degenerate_input() {
        let single_vertex: Geometry<f64> = LineString::from(vec![(1.0, 1.0)]).into();
        assert!(!is_convertible(&single_vertex));

        let nan: Geometry<f64> = point!(x: f64::NAN, y: 0.0).into();
        assert!(!is_convertible(&nan));

        let line: Geometry<f64> = line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)].into();
        assert!(is_convertible(&line));
    }

    #[test]
    fn test_line_endpoints_per_part() {
        let multi: Geometry<f64> = MultiLineString::new(vec![
            line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)],
            line_string![(x: 5.0, y: 5.0), (x: 6.0, y: 5.0), (x: 7.0, y: 6.0)],
        ])
        .into();

        let ends = line_endpoints(&multi);
        assert_eq!(ends.len(), 4);
        assert_eq!(ends[2], Coord { x: 5.0, y: 5.0 });
        assert_eq!(ends[3], Coord { x: 7.0, y: 6.0 });
    }

    #[test]
    fn test_predicates() {
        let a: Geometry<f64> = square(0.0, 0.0, 2.0).into();
        let b: Geometry<f64> = square(1.0, 1.0, 2.0).into();
        let c: Geometry<f64> = square(2.0, 0.0, 2.0).into();

        assert!(overlaps(&a, &b));
        assert!(!overlaps(&a, &c));
        assert!(touches(&a, &c));
        assert!(equals(&a, &square(0.0, 0.0, 2.0).into()));
        assert!(contains(&a, &point!(x: 1.0, y: 1.0).into()));
    }

    #[test]
    fn test_extent_clip_policy() {
        let extent = Extent::new(Rect::new((0.0, 0.0), (10.0, 10.0)));

        let outside: Geometry<f64> = square(20.0, 20.0, 1.0).into();
        assert!(extent.clip(outside).is_none());

        let inside: Geometry<f64> = square(1.0, 1.0, 1.0).into();
        assert_eq!(extent.clip(inside.clone()), Some(inside));

        let crossing: Geometry<f64> = square(8.0, 8.0, 4.0).into();
        let clipped = extent.clip(crossing).unwrap();
        assert_relative_eq!(clipped.unsigned_area(), 4.0, epsilon = 1e-9);
        let clipped_bounds = bounds(&clipped).unwrap();
        assert!(clipped_bounds.max().x <= 10.0 + 1e-9);

        let line: Geometry<f64> = line_string![(x: 5.0, y: 5.0), (x: 15.0, y: 5.0)].into();
        let clipped_line = extent.clip(line).unwrap();
        assert!(bounds(&clipped_line).unwrap().max().x <= 10.0 + 1e-9);
    }

    #[test]
    fn test_buffered_frame_shape() {
        let frame = buffered_frame(Rect::new((0.0, 0.0), (10.0, 10.0)), 2.0, 3);
        // 4 corners x 4 arc vertices, plus the closing vertex
        assert_eq!(frame.exterior().0.len(), 17);
        let r = frame.bounding_rect().unwrap();
        assert_relative_eq!(r.min().x, -2.0, epsilon = 1e-9);
        assert_relative_eq!(r.max().y, 12.0, epsilon = 1e-9);
    }

    #[test]
    fn test_interior_gaps_finds_enclosed_hole() {
        // 3x3 block of unit squares with the centre missing
        let mut parts = Vec::new();
        for i in 0..3 {
            for j in 0..3 {
                if i == 1 && j == 1 {
                    continue;
                }
                parts.push(square(i as f64, j as f64, 1.0));
            }
        }
        let union = cascaded_union(&parts);
        let gaps = interior_gaps(&union, 2.0, 3);

        assert_eq!(gaps.len(), 1);
        assert_relative_eq!(gaps[0].unsigned_area(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_interior_gaps_none_for_solid_union() {
        let union = cascaded_union(&[square(0.0, 0.0, 1.0), square(1.0, 0.0, 1.0)]);
        assert!(interior_gaps(&union, 2.0, 3).is_empty());
    }
}
