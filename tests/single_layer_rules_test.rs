// Single-layer rules run through the engine
use approx::assert_relative_eq;
use geo::Area;
use geo_types::{Geometry, Point};
use topol_check::topology::{
    GeometryKind, MemoryLayer, TopologyEngine, TopologyViolation, ValidationScope, ViolationKind,
};

fn run(engine: &mut TopologyEngine, rule: &str, layer: &MemoryLayer) -> Vec<TopologyViolation> {
    engine.run_test(rule, Some(layer), None, ValidationScope::WholeLayer)
}

#[test]
fn test_dangles_and_pseudos_example() {
    let roads = MemoryLayer::from_wkt(
        "roads",
        GeometryKind::Line,
        &[
            "LINESTRING(-3 0, 0 0)",
            "LINESTRING(0 0, 0 -3)",
            "LINESTRING(5 5, 7 9)",
        ],
    )
    .expect("Failed to build layer");

    let mut engine = TopologyEngine::default();
    let dangles = run(&mut engine, "must not have dangles", &roads);
    let pseudos = run(&mut engine, "must not have pseudos", &roads);

    println!("{} dangles, {} pseudos", dangles.len(), pseudos.len());

    // The free ends of the first two lines dangle too
    let dangle_points: Vec<Geometry<f64>> = dangles.iter().map(|d| d.conflict.clone()).collect();
    assert!(dangle_points.contains(&Geometry::Point(Point::new(5.0, 5.0))));
    assert!(!dangle_points.contains(&Geometry::Point(Point::new(0.0, 0.0))));
    assert!(dangles.iter().all(|d| d.kind == ViolationKind::Dangle));

    assert_eq!(pseudos.len(), 1);
    assert_eq!(pseudos[0].conflict, Geometry::Point(Point::new(0.0, 0.0)));
    assert_eq!(pseudos[0].features.len(), 2);
    assert_eq!(pseudos[0].features[0], pseudos[0].features[1]);
}

#[test]
fn test_isolated_line_and_shared_endpoint() {
    // Two lines meeting at (0,0) whose other ends are shared by a third, closed path
    let roads = MemoryLayer::from_wkt(
        "roads",
        GeometryKind::Line,
        &[
            "LINESTRING(0 0, 1 0)",
            "LINESTRING(0 0, 0 1)",
            "LINESTRING(1 0, 2 2, 0 1)",
            "LINESTRING(5 5, 6 5)",
            "LINESTRING(6 5, 6 6)",
            "LINESTRING(6 5, 7 5)",
        ],
    )
    .expect("Failed to build layer");

    let mut engine = TopologyEngine::default();
    let dangles = run(&mut engine, "must not have dangles", &roads);
    let pseudos = run(&mut engine, "must not have pseudos", &roads);

    let dangle_points: Vec<_> = dangles.iter().map(|d| d.conflict.clone()).collect();
    let pseudo_points: Vec<_> = pseudos.iter().map(|p| p.conflict.clone()).collect();

    // (6,5) meets three ends: neither a dangle nor a pseudo node
    assert_eq!(dangle_points.len(), 3);
    assert!(dangle_points.contains(&Geometry::Point(Point::new(5.0, 5.0))));
    assert!(!dangle_points.contains(&Geometry::Point(Point::new(6.0, 5.0))));
    assert_eq!(pseudo_points.len(), 3);
    assert!(pseudo_points.contains(&Geometry::Point(Point::new(0.0, 0.0))));
    assert!(dangle_points.iter().all(|d| !pseudo_points.contains(d)));
}

#[test]
fn test_duplicates_reported_once() {
    let parcels = MemoryLayer::from_wkt(
        "parcels",
        GeometryKind::Polygon,
        &[
            "POLYGON((0 0, 4 0, 4 4, 0 4, 0 0))",
            "POLYGON((10 10, 12 10, 12 12, 10 12, 10 10))",
            // Same square, different start vertex
            "POLYGON((4 0, 4 4, 0 4, 0 0, 4 0))",
            // Same bounding box, different shape
            "POLYGON((0 0, 4 0, 4 4, 0 0))",
        ],
    )
    .expect("Failed to build layer");

    let mut engine = TopologyEngine::default();
    let dups = run(&mut engine, "must not have duplicates", &parcels);

    assert_eq!(dups.len(), 1);
    assert_eq!(dups[0].kind, ViolationKind::Duplicate);
    assert_eq!(dups[0].features[0].feature_id(), Some(1));
}

#[test]
fn test_duplicate_points() {
    let wells = MemoryLayer::from_wkt(
        "wells",
        GeometryKind::Point,
        &["POINT(1 1)", "POINT(1 1)", "POINT(2 2)", "POINT(2 2)", "POINT(3 3)"],
    )
    .expect("Failed to build layer");

    let mut engine = TopologyEngine::default();
    let dups = run(&mut engine, "must not have duplicates", &wells);
    let primaries: Vec<_> = dups.iter().map(|d| d.features[0].feature_id()).collect();
    assert_eq!(primaries, vec![Some(1), Some(3)]);
}

#[test]
fn test_overlaps() {
    let parcels = MemoryLayer::from_wkt(
        "parcels",
        GeometryKind::Polygon,
        &[
            "POLYGON((0 0, 4 0, 4 4, 0 4, 0 0))",
            "POLYGON((2 2, 6 2, 6 6, 2 6, 2 2))",
            // Shares only an edge with the first
            "POLYGON((-4 0, 0 0, 0 4, -4 4, -4 0))",
            // Contained in the first: not an overlap
            "POLYGON((1 1, 2 1, 2 2, 1 2, 1 1))",
        ],
    )
    .expect("Failed to build layer");

    let mut engine = TopologyEngine::default();
    let overlaps = run(&mut engine, "must not overlap", &parcels);

    assert_eq!(overlaps.len(), 1);
    assert_relative_eq!(overlaps[0].conflict.unsigned_area(), 4.0, epsilon = 1e-9);
}

#[test]
fn test_gaps_hole_between_polygons() {
    // Two L-shaped polygons around a 2x2 square hole
    let parcels = MemoryLayer::from_wkt(
        "parcels",
        GeometryKind::Polygon,
        &[
            "POLYGON((0 0, 6 0, 6 2, 2 2, 2 6, 0 6, 0 0))",
            "POLYGON((6 2, 6 6, 2 6, 2 4, 4 4, 4 2, 6 2))",
        ],
    )
    .expect("Failed to build layer");

    let mut engine = TopologyEngine::default();
    let gaps = run(&mut engine, "must not have gaps", &parcels);

    println!("gaps: {:?}", gaps.iter().map(|g| g.report()).collect::<Vec<_>>());
    assert_eq!(gaps.len(), 1);
    assert_eq!(gaps[0].kind, ViolationKind::Gap);
    assert_relative_eq!(gaps[0].conflict.unsigned_area(), 4.0, epsilon = 1e-6);
    assert!(gaps[0].features.iter().all(|fl| fl.feature.is_none() && fl.layer_id == "parcels"));
}

#[test]
fn test_no_gaps_in_solid_cover() {
    let parcels = MemoryLayer::from_wkt(
        "parcels",
        GeometryKind::Polygon,
        &[
            "POLYGON((0 0, 2 0, 2 2, 0 2, 0 0))",
            "POLYGON((2 0, 4 0, 4 2, 2 2, 2 0))",
            "POLYGON((0 2, 2 2, 2 4, 0 4, 0 2))",
            "MULTIPOLYGON(((2 2, 4 2, 4 4, 2 4, 2 2)), ((10 10, 11 10, 11 11, 10 11, 10 10)))",
        ],
    )
    .expect("Failed to build layer");

    let mut engine = TopologyEngine::default();
    assert!(run(&mut engine, "must not have gaps", &parcels).is_empty());
}

#[test]
fn test_valid_and_multipart() {
    let parcels = MemoryLayer::from_wkt(
        "parcels",
        GeometryKind::Polygon,
        &[
            "POLYGON((0 0, 1 0, 1 1, 0 1, 0 0))",
            "POLYGON((0 0, 2 2, 2 0, 0 2, 0 0))",
            "MULTIPOLYGON(((5 5, 6 5, 6 6, 5 5)))",
        ],
    )
    .expect("Failed to build layer")
    .with_feature(topol_check::Feature::without_geometry(9));

    let mut engine = TopologyEngine::default();

    let invalid = run(&mut engine, "must not have invalid geometries", &parcels);
    assert_eq!(invalid.len(), 1);
    assert_eq!(invalid[0].features[0].feature_id(), Some(2));

    // A single-part multipolygon is still multipart
    let multipart = run(&mut engine, "must not have multi-part geometries", &parcels);
    assert_eq!(multipart.len(), 1);
    assert_eq!(multipart[0].kind, ViolationKind::Multipart);
    assert_eq!(multipart[0].features[0].feature_id(), Some(3));
}

#[test]
fn test_rules_ignore_wrong_layer_kind() {
    let wells = MemoryLayer::from_wkt("wells", GeometryKind::Point, &["POINT(0 0)"])
        .expect("Failed to build layer");
    let mut engine = TopologyEngine::default();
    assert!(run(&mut engine, "must not have dangles", &wells).is_empty());
    assert!(run(&mut engine, "must not overlap", &wells).is_empty());
    assert!(run(&mut engine, "must not have gaps", &wells).is_empty());
}
