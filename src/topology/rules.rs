//! Rule catalog
//!
//! Each rule is bound once to its check function and static descriptor. The
//! registry keeps them in the order they are offered to the user.

use super::checks;
use super::context::RunContext;
use super::coverage;
use super::gaps;
use super::layer::Layer;
use super::types::{GeometryKind, TopologyViolation};
use indexmap::IndexMap;

/// Signature shared by every check
pub type CheckFn = fn(&RunContext, &dyn Layer, Option<&dyn Layer>) -> Vec<TopologyViolation>;

const ALL_KINDS: &[GeometryKind] =
    &[GeometryKind::Point, GeometryKind::Polygon, GeometryKind::Line];
const POINTS: &[GeometryKind] = &[GeometryKind::Point];
const LINES: &[GeometryKind] = &[GeometryKind::Line];
const POLYGONS: &[GeometryKind] = &[GeometryKind::Polygon];
const LINES_AND_POLYGONS: &[GeometryKind] = &[GeometryKind::Line, GeometryKind::Polygon];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    Valid,
    Dangles,
    Duplicates,
    Pseudos,
    Overlaps,
    Gaps,
    Multipart,
    OverlapWithLayer,
    PointCoveredBySegment,
    PointCoveredByLineEnds,
    LineEndsCoveredByPoints,
    PointInPolygon,
    PolygonContainsPoint,
}

impl Rule {
    pub const ALL: [Rule; 13] = [
        Rule::Valid,
        Rule::Dangles,
        Rule::Duplicates,
        Rule::Pseudos,
        Rule::Overlaps,
        Rule::Gaps,
        Rule::Multipart,
        Rule::OverlapWithLayer,
        Rule::PointCoveredBySegment,
        Rule::PointCoveredByLineEnds,
        Rule::LineEndsCoveredByPoints,
        Rule::PointInPolygon,
        Rule::PolygonContainsPoint,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Rule::Valid => "must not have invalid geometries",
            Rule::Dangles => "must not have dangles",
            Rule::Duplicates => "must not have duplicates",
            Rule::Pseudos => "must not have pseudos",
            Rule::Overlaps => "must not overlap",
            Rule::Gaps => "must not have gaps",
            Rule::Multipart => "must not have multi-part geometries",
            Rule::OverlapWithLayer => "must not overlap with",
            Rule::PointCoveredBySegment => "must be covered by",
            Rule::PointCoveredByLineEnds => "must be covered by endpoints of",
            Rule::LineEndsCoveredByPoints => "end points must be covered by",
            Rule::PointInPolygon => "must be inside",
            Rule::PolygonContainsPoint => "must contain",
        }
    }

    pub fn from_name(name: &str) -> Option<Rule> {
        Rule::ALL.into_iter().find(|rule| rule.name() == name)
    }

    pub fn descriptor(&self) -> RuleDescriptor {
        let (check, use_second_layer, use_spatial_index, layer1_kinds, layer2_kinds): (
            CheckFn,
            bool,
            bool,
            &'static [GeometryKind],
            &'static [GeometryKind],
        ) = match self {
            Rule::Valid => (checks::check_valid, false, false, ALL_KINDS, &[]),
            Rule::Dangles => (checks::check_dangling_lines, false, false, LINES, &[]),
            Rule::Duplicates => (checks::check_duplicates, false, true, ALL_KINDS, &[]),
            Rule::Pseudos => (checks::check_pseudos, false, false, LINES, &[]),
            Rule::Overlaps => (checks::check_overlaps, false, true, POLYGONS, &[]),
            Rule::Gaps => (gaps::check_gaps, false, false, POLYGONS, &[]),
            Rule::Multipart => (checks::check_multipart, false, false, ALL_KINDS, &[]),
            Rule::OverlapWithLayer => {
                (coverage::check_overlap_with_layer, true, true, POLYGONS, POLYGONS)
            }
            Rule::PointCoveredBySegment => {
                (coverage::check_point_covered_by_segment, true, true, POINTS, LINES_AND_POLYGONS)
            }
            Rule::PointCoveredByLineEnds => {
                (coverage::check_point_covered_by_line_ends, true, true, POINTS, LINES)
            }
            Rule::LineEndsCoveredByPoints => {
                (coverage::check_line_ends_covered_by_points, true, true, LINES, POINTS)
            }
            Rule::PointInPolygon => {
                (coverage::check_point_in_polygon, true, true, POINTS, POLYGONS)
            }
            Rule::PolygonContainsPoint => {
                (coverage::check_polygon_contains_point, true, true, POLYGONS, POINTS)
            }
        };
        RuleDescriptor {
            rule: *self,
            check,
            use_second_layer,
            use_spatial_index,
            layer1_kinds,
            layer2_kinds,
        }
    }
}

impl std::fmt::Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Static metadata of a rule: its check and what it needs to run
#[derive(Clone, Copy)]
pub struct RuleDescriptor {
    pub rule: Rule,
    pub check: CheckFn,
    pub use_second_layer: bool,
    pub use_spatial_index: bool,
    pub layer1_kinds: &'static [GeometryKind],
    pub layer2_kinds: &'static [GeometryKind],
}

impl RuleDescriptor {
    /// Whether the layers have kinds this rule was declared for.
    /// The second kind is ignored for single-layer rules.
    pub fn accepts(&self, layer1: GeometryKind, layer2: Option<GeometryKind>) -> bool {
        if !self.layer1_kinds.contains(&layer1) {
            return false;
        }
        if !self.use_second_layer {
            return true;
        }
        layer2.is_some_and(|kind| self.layer2_kinds.contains(&kind))
    }
}

impl std::fmt::Debug for RuleDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleDescriptor")
            .field("rule", &self.rule)
            .field("use_second_layer", &self.use_second_layer)
            .field("use_spatial_index", &self.use_spatial_index)
            .field("layer1_kinds", &self.layer1_kinds)
            .field("layer2_kinds", &self.layer2_kinds)
            .finish()
    }
}

/// Name-keyed, ordered rule table; built once and read-only afterwards
#[derive(Debug, Clone)]
pub struct RuleRegistry {
    rules: IndexMap<&'static str, RuleDescriptor>,
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleRegistry {
    pub fn new() -> Self {
        let rules = Rule::ALL
            .into_iter()
            .map(|rule| (rule.name(), rule.descriptor()))
            .collect();
        Self { rules }
    }

    pub fn get(&self, name: &str) -> Option<&RuleDescriptor> {
        self.rules.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.rules.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RuleDescriptor> {
        self.rules.values()
    }

    /// Rules applicable to a first layer of the given kind
    pub fn rules_for_kind(&self, kind: GeometryKind) -> Vec<&'static str> {
        self.rules
            .iter()
            .filter(|(_, d)| d.layer1_kinds.contains(&kind))
            .map(|(name, _)| *name)
            .collect()
    }
}
