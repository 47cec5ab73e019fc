//! 按切割对象类型收集打断点。
//!
//! 所有目标最终归结为两种求交：线段与线段、线段与圆弧。
//! 椭圆、样条等自由曲线先按自身尺寸离散成折线，文字只看外框。

use std::f64::consts::TAU;

use dimkit_core::curve::BulgeArc;
use dimkit_core::document::{Drawing, Ellipse, Entity, MLeader, Polyline, Spline};
use dimkit_core::geometry::Bounds2D;
use dimkit_core::intersect::normalize_angle_from;
use dimkit_core::tolerance::Tolerance;
use glam::{DAffine2, DVec2};
use tracing::{debug, trace};

use super::{BreakKind, BreakList, BreakPointData, DimCurve, is_similarity};

/// 离散弦高与目标尺寸之比。
const FLATTEN_RATIO: f64 = 1e-3;
const MIN_FLATTEN_SEGMENTS: usize = 8;
const MAX_FLATTEN_SEGMENTS: usize = 1024;
/// 块嵌套层数上限。
const MAX_BLOCK_DEPTH: usize = 16;

pub(super) struct BreakCollector<'a> {
    curve: &'a DimCurve,
    drawing: &'a Drawing,
    tol: Tolerance,
    half_gap: f64,
    breaks: BreakList,
}

impl<'a> BreakCollector<'a> {
    pub(super) fn new(curve: &'a DimCurve, drawing: &'a Drawing, tol: Tolerance, break_size: f64) -> Self {
        Self {
            curve,
            drawing,
            tol,
            half_gap: curve.param_extent(break_size / 2.0),
            breaks: BreakList::default(),
        }
    }

    pub(super) fn finish(self) -> BreakList {
        self.breaks
    }

    /// 单个交点，向两侧各扩展半个打断间隙。重复的交点只记一次。
    pub(super) fn add_point(&mut self, point: DVec2) {
        let duplicate = self
            .breaks
            .iter()
            .any(|item| item.kind == BreakKind::Point && item.start.distance(point) <= self.tol.equal_point);
        if duplicate {
            return;
        }
        let key = self.curve.key_of(point);
        self.breaks.insert(BreakPointData {
            kind: BreakKind::Point,
            start: point,
            end: point,
            from: key - self.half_gap,
            to: key + self.half_gap,
        });
    }

    pub(super) fn add_static(&mut self, start: DVec2, end: DVec2) {
        self.add_pair(BreakKind::Static, start, end);
    }

    fn add_pair(&mut self, kind: BreakKind, start: DVec2, end: DVec2) {
        let (a, b) = (self.curve.key_of(start), self.curve.key_of(end));
        let (start, end, from, to) = if a <= b { (start, end, a, b) } else { (end, start, b, a) };
        self.breaks.insert(BreakPointData {
            kind,
            start,
            end,
            from,
            to,
        });
    }

    fn add_points(&mut self, points: Vec<DVec2>) {
        for point in points {
            self.add_point(point);
        }
    }

    /// 逐段与折线求交。
    fn add_chords(&mut self, points: &[DVec2]) {
        for pair in points.windows(2) {
            let hits = self.curve.intersect_segment(pair[0], pair[1], self.tol);
            self.add_points(hits);
        }
    }

    /// 文字外框：至少两个交点时取沿曲线最靠两端的两点作为打断区间。
    fn add_text_quad(&mut self, quad: [DVec2; 4]) {
        let mut hits: Vec<DVec2> = Vec::with_capacity(4);
        for i in 0..4 {
            for hit in self.curve.intersect_segment(quad[i], quad[(i + 1) % 4], self.tol) {
                if hits.iter().all(|known| known.distance(hit) > self.tol.equal_point) {
                    hits.push(hit);
                }
            }
        }
        if hits.len() < 2 {
            trace!(hits = hits.len(), "文字框交点不足，跳过");
            return;
        }
        let curve = self.curve;
        hits.sort_by(|a, b| curve.key_of(*a).total_cmp(&curve.key_of(*b)));
        self.add_pair(BreakKind::Text, hits[0], hits[hits.len() - 1]);
    }

    /// 圆弧目标。非相似变换（不等比缩放、错切）下圆弧变成椭圆弧，此时在块空间离散后逐段求交。
    fn add_arc(&mut self, center: DVec2, radius: f64, start: f64, end: f64, transform: DAffine2) {
        if !is_similarity(&transform) {
            trace!("块变换非等比，圆弧按折线求交");
            let points = flatten_arc(center, radius, start, end);
            self.add_chords(&transform_all(&points, transform));
            return;
        }
        let target = DimCurve::arc(center, radius, start, end).transformed(&transform);
        if let DimCurve::Arc {
            center,
            radius,
            start_angle,
            end_angle,
        } = target
        {
            let hits = self.curve.intersect_arc(center, radius, start_angle, end_angle, self.tol);
            self.add_points(hits);
        }
    }

    /// 按实体类型分派求交。`transform` 为实体所在空间到世界坐标的变换。
    pub(super) fn collect_entity(&mut self, entity: &Entity, transform: DAffine2, depth: usize) {
        if depth > MAX_BLOCK_DEPTH {
            debug!(depth, "块嵌套过深，停止展开");
            return;
        }
        let before = self.breaks.len();
        let drawing = self.drawing;
        match entity {
            Entity::Line(line) => {
                let hits = self.curve.intersect_segment(
                    transform.transform_point2(line.start.as_vec2()),
                    transform.transform_point2(line.end.as_vec2()),
                    self.tol,
                );
                self.add_points(hits);
            }
            Entity::Ray(ray) => {
                let hits = self.curve.intersect_line(
                    transform.transform_point2(ray.base.as_vec2()),
                    transform.transform_vector2(ray.direction.as_vec2()),
                    true,
                    self.tol,
                );
                self.add_points(hits);
            }
            Entity::XLine(xline) => {
                let hits = self.curve.intersect_line(
                    transform.transform_point2(xline.base.as_vec2()),
                    transform.transform_vector2(xline.direction.as_vec2()),
                    false,
                    self.tol,
                );
                self.add_points(hits);
            }
            Entity::Circle(circle) => {
                self.add_arc(circle.center.as_vec2(), circle.radius, 0.0, TAU, transform);
            }
            Entity::Arc(arc) => {
                self.add_arc(arc.center.as_vec2(), arc.radius, arc.start_angle, arc.end_angle, transform);
            }
            Entity::Ellipse(ellipse) => {
                let points = transform_all(&flatten_ellipse(ellipse), transform);
                self.add_chords(&points);
            }
            Entity::Polyline(polyline) => self.collect_polyline(polyline, transform),
            Entity::Spline(spline) => {
                if let Some(points) = flatten_spline(spline) {
                    self.add_chords(&transform_all(&points, transform));
                }
            }
            Entity::Text(text) => self.add_text_quad(transform_quad(text.bounding_quad(), transform)),
            Entity::MText(mtext) => self.add_text_quad(transform_quad(mtext.bounding_quad(), transform)),
            Entity::Leader(leader) => {
                let mut points: Vec<DVec2> = leader.vertices.iter().map(|p| p.as_vec2()).collect();
                if let Some((_, hook_end)) = leader.hookline_segment() {
                    points.push(hook_end);
                }
                self.add_chords(&transform_all(&points, transform));
            }
            Entity::MLeader(mleader) => self.collect_mleader(mleader, transform),
            Entity::Dimension(dimension) => match drawing.block(&dimension.block_name) {
                Some(block) => {
                    for nested in &block.entities {
                        self.collect_entity(nested, transform, depth + 1);
                    }
                }
                None => debug!(block = %dimension.block_name, "标注块不存在"),
            },
            Entity::BlockReference(reference) => {
                if let Some(block) = drawing.block(&reference.name) {
                    let nested_transform = transform * reference.transform(block.base_point);
                    for nested in &block.entities {
                        self.collect_entity(nested, nested_transform, depth + 1);
                    }
                } else {
                    debug!(block = %reference.name, "块定义不存在");
                }
                for attribute in &reference.attributes {
                    self.add_text_quad(transform_quad(attribute.as_text().bounding_quad(), transform));
                }
            }
        }
        trace!(
            entity = entity.type_name(),
            added = self.breaks.len() - before,
            "收集打断点"
        );
    }

    fn collect_polyline(&mut self, polyline: &Polyline, transform: DAffine2) {
        let count = polyline.vertices.len();
        let segments = if polyline.is_closed { count } else { count.saturating_sub(1) };
        for i in 0..segments {
            let start = &polyline.vertices[i];
            let end = &polyline.vertices[(i + 1) % count];
            let (a, b) = (start.position.as_vec2(), end.position.as_vec2());
            match BulgeArc::from_bulge(a, b, start.bulge) {
                Some(arc) => {
                    let (from, to) = if arc.sweep > 0.0 {
                        (arc.start_angle, arc.start_angle + arc.sweep)
                    } else {
                        (arc.start_angle + arc.sweep, arc.start_angle)
                    };
                    self.add_arc(arc.center, arc.radius, from, to, transform);
                }
                None => {
                    let hits = self.curve.intersect_segment(
                        transform.transform_point2(a),
                        transform.transform_point2(b),
                        self.tol,
                    );
                    self.add_points(hits);
                }
            }
        }
    }

    fn collect_mleader(&mut self, mleader: &MLeader, transform: DAffine2) {
        for line in &mleader.leader_lines {
            let points: Vec<DVec2> = line.vertices.iter().map(|p| p.as_vec2()).collect();
            self.add_chords(&transform_all(&points, transform));
        }
        for (start, end) in mleader.dogleg_segments() {
            self.add_chords(&transform_all(&[start, end], transform));
        }
        if let Some(quad) = mleader.text_quad() {
            self.add_text_quad(transform_quad(quad, transform));
        }
    }
}

fn transform_all(points: &[DVec2], transform: DAffine2) -> Vec<DVec2> {
    points.iter().map(|p| transform.transform_point2(*p)).collect()
}

fn transform_quad(quad: [DVec2; 4], transform: DAffine2) -> [DVec2; 4] {
    quad.map(|p| transform.transform_point2(p))
}

/// 以长半轴为尺度离散椭圆，弦高取长半轴的千分之一。
fn flatten_ellipse(ellipse: &Ellipse) -> Vec<DVec2> {
    let major = ellipse.major_axis.as_vec2().length();
    let start = ellipse.start_parameter;
    let mut end = normalize_angle_from(ellipse.end_parameter, start);
    if end <= start || ellipse.end_parameter - start >= TAU {
        end = start + TAU;
    }
    let segments = conic_segments(end - start, major);
    (0..=segments)
        .map(|i| ellipse.point_at(start + (end - start) * i as f64 / segments as f64))
        .collect()
}

fn flatten_arc(center: DVec2, radius: f64, start: f64, end: f64) -> Vec<DVec2> {
    let (start, end) = super::arc_span(start, end);
    let segments = conic_segments(end - start, radius);
    (0..=segments)
        .map(|i| center + DVec2::from_angle(start + (end - start) * i as f64 / segments as f64) * radius)
        .collect()
}

/// 弦高为半径千分之一时覆盖 `sweep` 所需的段数。
fn conic_segments(sweep: f64, radius: f64) -> usize {
    let chord = radius * FLATTEN_RATIO;
    let step = if radius > 0.0 {
        2.0 * (1.0 - chord / radius).clamp(-1.0, 1.0).acos()
    } else {
        TAU
    };
    (sweep / step.max(f64::EPSILON))
        .ceil()
        .clamp(MIN_FLATTEN_SEGMENTS as f64, MAX_FLATTEN_SEGMENTS as f64) as usize
}

/// 以控制点包围盒对角线为尺度离散样条，样条无效时返回 None。
fn flatten_spline(spline: &Spline) -> Option<Vec<DVec2>> {
    let mut bounds = Bounds2D::empty();
    for point in &spline.control_points {
        bounds.include_point(point.as_vec2());
    }
    let nurbs = match spline.to_nurbs() {
        Ok(nurbs) => nurbs,
        Err(err) => {
            debug!(error = %err, "样条定义无效，跳过");
            return None;
        }
    };
    let chord = (bounds.diagonal() * FLATTEN_RATIO).max(f64::EPSILON);
    Some(nurbs.flatten(chord).iter().map(|p| p.truncate()).collect())
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use dimkit_core::document::{
        BlockDefinition, BlockReference, Circle, Dimension, DimensionKind, Leader, LeaderLine, MLeaderContent,
        PolylineVertex, Ray, XLine,
    };
    use dimkit_core::geometry::{Point2, Vector2};

    use super::*;

    fn collect(curve: &DimCurve, drawing: &Drawing, entity: &Entity) -> BreakList {
        let mut collector = BreakCollector::new(curve, drawing, Tolerance::new(1e-10, 1e-10), 0.0);
        collector.collect_entity(entity, DAffine2::IDENTITY, 0);
        collector.finish()
    }

    fn keys(breaks: &BreakList) -> Vec<f64> {
        breaks.iter().map(|item| (item.from * 1e6).round() / 1e6).collect()
    }

    fn horizontal() -> DimCurve {
        DimCurve::line(DVec2::ZERO, DVec2::new(10.0, 0.0))
    }

    #[test]
    fn ray_only_hits_forward() {
        let drawing = Drawing::new();
        let forward = Entity::Ray(Ray {
            base: Point2::new(3.0, -1.0),
            direction: Vector2::new(0.0, 1.0),
        });
        let backward = Entity::Ray(Ray {
            base: Point2::new(3.0, -1.0),
            direction: Vector2::new(0.0, -1.0),
        });
        assert_eq!(keys(&collect(&horizontal(), &drawing, &forward)), vec![3.0]);
        assert!(collect(&horizontal(), &drawing, &backward).is_empty());
    }

    #[test]
    fn xline_crosses_arc_dimension() {
        let drawing = Drawing::new();
        let arc = DimCurve::arc(DVec2::ZERO, 2.0, 0.0, PI);
        let xline = Entity::XLine(XLine {
            base: Point2::new(0.0, 1.0),
            direction: Vector2::new(1.0, 0.0),
        });
        let breaks = collect(&arc, &drawing, &xline);
        assert_eq!(keys(&breaks), vec![(PI / 6.0 * 1e6).round() / 1e6, (5.0 * PI / 6.0 * 1e6).round() / 1e6]);
    }

    #[test]
    fn circle_yields_two_points() {
        let drawing = Drawing::new();
        let circle = Entity::Circle(Circle {
            center: Point2::new(5.0, 0.0),
            radius: 2.0,
        });
        assert_eq!(keys(&collect(&horizontal(), &drawing, &circle)), vec![3.0, 7.0]);
    }

    #[test]
    fn polyline_bulge_segment_is_treated_as_arc() {
        let drawing = Drawing::new();
        // 凸度 1 的半圆：(4,0.5) 逆时针经下方到 (6,0.5)，圆心 (5,0.5)，半径 1
        let polyline = Entity::Polyline(Polyline {
            vertices: vec![
                PolylineVertex::new(Point2::new(4.0, 3.0)),
                PolylineVertex::with_bulge(Point2::new(4.0, 0.5), 1.0),
                PolylineVertex::new(Point2::new(6.0, 0.5)),
            ],
            is_closed: false,
        });
        let breaks = collect(&horizontal(), &drawing, &polyline);
        assert_eq!(breaks.len(), 2);
        let offset = 0.75_f64.sqrt();
        assert!((breaks.as_slice()[0].from - (5.0 - offset)).abs() < 1e-9);
        assert!((breaks.as_slice()[1].from - (5.0 + offset)).abs() < 1e-9);
    }

    #[test]
    fn shared_polyline_vertex_counts_once() {
        let drawing = Drawing::new();
        let polyline = Entity::Polyline(Polyline {
            vertices: vec![
                PolylineVertex::new(Point2::new(2.0, -1.0)),
                PolylineVertex::new(Point2::new(2.0, 0.0)),
                PolylineVertex::new(Point2::new(2.0, 1.0)),
            ],
            is_closed: false,
        });
        assert_eq!(collect(&horizontal(), &drawing, &polyline).len(), 1);
    }

    #[test]
    fn ellipse_is_flattened() {
        let drawing = Drawing::new();
        let ellipse = Entity::Ellipse(Ellipse {
            center: Point2::new(5.0, 0.0),
            major_axis: Vector2::new(3.0, 0.0),
            ratio: 0.5,
            start_parameter: 0.0,
            end_parameter: TAU,
        });
        let breaks = collect(&horizontal(), &drawing, &ellipse);
        assert_eq!(breaks.len(), 2);
        // 离散弦高为长半轴的千分之一
        assert!((breaks.as_slice()[0].start.x - 2.0).abs() < 5e-3);
        assert!((breaks.as_slice()[1].start.x - 8.0).abs() < 1e-6);
    }

    #[test]
    fn leader_hookline_is_included() {
        let drawing = Drawing::new();
        let leader = Entity::Leader(Leader {
            vertices: vec![Point2::new(1.0, -2.0), Point2::new(1.0, -1.0)],
            has_arrowhead: true,
            annotation_direction: Vector2::new(0.0, 1.0),
            hookline: Some(2.0),
        });
        assert_eq!(keys(&collect(&horizontal(), &drawing, &leader)), vec![1.0]);
    }

    #[test]
    fn mleader_checks_lines_and_text() {
        let drawing = Drawing::new();
        let mleader = Entity::MLeader(MLeader {
            leader_lines: vec![LeaderLine {
                vertices: vec![Point2::new(2.0, -1.0), Point2::new(2.0, 1.0)],
            }],
            content: MLeaderContent::MText {
                text: "A".to_string(),
                location: Point2::new(6.0, 0.5),
            },
            text_height: Some(1.0),
            has_dogleg: false,
            dogleg_length: None,
        });
        let breaks = collect(&horizontal(), &drawing, &mleader);
        let kinds: Vec<BreakKind> = breaks.iter().map(|item| item.kind).collect();
        assert_eq!(kinds, vec![BreakKind::Point, BreakKind::Text]);
    }

    #[test]
    fn nested_dimension_block_is_expanded() {
        let mut drawing = Drawing::new();
        drawing.add_block_definition(BlockDefinition {
            name: "*D1".to_string(),
            base_point: Point2::new(0.0, 0.0),
            entities: vec![Entity::Line(dimkit_core::document::Line {
                start: Point2::new(4.0, -1.0),
                end: Point2::new(4.0, 1.0),
            })],
        });
        let dimension = Entity::Dimension(Dimension {
            kind: DimensionKind::Linear,
            definition_point: Point2::new(0.0, 0.0),
            text_midpoint: Point2::new(4.0, 1.0),
            block_name: "*D1".to_string(),
        });
        assert_eq!(keys(&collect(&horizontal(), &drawing, &dimension)), vec![4.0]);
    }

    #[test]
    fn missing_block_adds_nothing() {
        let drawing = Drawing::new();
        let dimension = Entity::Dimension(Dimension {
            kind: DimensionKind::Aligned,
            definition_point: Point2::new(0.0, 0.0),
            text_midpoint: Point2::new(0.0, 0.0),
            block_name: "*MISSING".to_string(),
        });
        assert!(collect(&horizontal(), &drawing, &dimension).is_empty());
    }

    #[test]
    fn stretched_block_circle_is_cut_as_ellipse() {
        let mut drawing = Drawing::new();
        drawing.add_block_definition(BlockDefinition {
            name: "RING".to_string(),
            base_point: Point2::new(0.0, 0.0),
            entities: vec![Entity::Circle(Circle {
                center: Point2::new(0.0, 0.0),
                radius: 1.0,
            })],
        });
        let reference = Entity::BlockReference(BlockReference {
            name: "RING".to_string(),
            insert: Point2::new(0.0, 0.0),
            scale: Vector2::new(3.0, 1.0),
            rotation: 0.0,
            attributes: Vec::new(),
        });
        let line = DimCurve::line(DVec2::new(-10.0, 0.5), DVec2::new(10.0, 0.5));
        let breaks = collect(&line, &drawing, &reference);
        let expected = 3.0 * 0.75_f64.sqrt();
        let hits: Vec<f64> = breaks.iter().map(|item| item.start.x).collect();
        assert_eq!(hits.len(), 2, "椭圆与直线应有两个交点：{hits:?}");
        assert!((hits[0] + expected).abs() < 1e-2, "{hits:?}");
        assert!((hits[1] - expected).abs() < 1e-2, "{hits:?}");
    }

    #[test]
    fn uniform_block_circle_stays_exact() {
        let mut drawing = Drawing::new();
        drawing.add_block_definition(BlockDefinition {
            name: "RING".to_string(),
            base_point: Point2::new(0.0, 0.0),
            entities: vec![Entity::Circle(Circle {
                center: Point2::new(0.0, 0.0),
                radius: 1.0,
            })],
        });
        let reference = Entity::BlockReference(BlockReference {
            name: "RING".to_string(),
            insert: Point2::new(5.0, 0.0),
            scale: Vector2::new(2.0, 2.0),
            rotation: 0.3,
            attributes: Vec::new(),
        });
        assert_eq!(keys(&collect(&horizontal(), &drawing, &reference)), vec![3.0, 7.0]);
    }
}
