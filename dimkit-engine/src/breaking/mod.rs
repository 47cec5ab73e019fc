//! 标注打断：求出标注线/弧与切割对象的交点或交段，把标注曲线拆成若干段。
//!
//! 标注曲线以标注空间坐标传入，按模型变换换算到世界坐标后求交，
//! 拆分结果再经逆变换回到标注空间。

mod split;
mod targets;

use std::f64::consts::TAU;

use dimkit_core::document::{Drawing, Entity, ObjectPath};
use dimkit_core::geometry::Bounds2D;
use dimkit_core::intersect::{arc_arc, normalize_angle_from, segment_arc, segment_line, segment_segment};
use dimkit_core::tolerance::Tolerance;
use glam::{DAffine2, DVec2};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use targets::BreakCollector;

/// 打断默认容差。
pub const BREAK_TOLERANCE_MIN: f64 = 1e-10;
/// 远离原点时放宽后的容差。
pub const BREAK_TOLERANCE_MAX: f64 = 1e-6;
/// 标注范围中心超过该距离即视为大坐标。
pub const LARGE_COORDINATE: f64 = 1e6;
/// 判断两轴等长、正交时使用的相对容差。
const SIMILARITY_TOLERANCE: f64 = 1e-9;

/// 可被打断的标注曲线。圆弧角度为弧度、逆时针。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DimCurve {
    Line {
        start: DVec2,
        end: DVec2,
    },
    Arc {
        center: DVec2,
        radius: f64,
        start_angle: f64,
        end_angle: f64,
    },
}

impl DimCurve {
    #[inline]
    pub fn line(start: DVec2, end: DVec2) -> Self {
        DimCurve::Line { start, end }
    }

    #[inline]
    pub fn arc(center: DVec2, radius: f64, start_angle: f64, end_angle: f64) -> Self {
        DimCurve::Arc {
            center,
            radius,
            start_angle,
            end_angle,
        }
    }

    /// 只有直线与圆弧能作为打断对象。
    pub fn from_entity(entity: &Entity) -> Option<Self> {
        match entity {
            Entity::Line(line) => Some(Self::line(line.start.as_vec2(), line.end.as_vec2())),
            Entity::Arc(arc) => Some(Self::arc(
                arc.center.as_vec2(),
                arc.radius,
                arc.start_angle,
                arc.end_angle,
            )),
            _ => None,
        }
    }

    /// 相似变换（可含镜像）。镜像时圆弧起止角互换以保持逆时针。
    /// 圆弧只在相似变换下保持为圆弧，调用方需先用 [`is_similarity`] 判断。
    pub fn transformed(&self, transform: &DAffine2) -> Self {
        match *self {
            DimCurve::Line { start, end } => {
                Self::line(transform.transform_point2(start), transform.transform_point2(end))
            }
            DimCurve::Arc {
                center,
                radius,
                start_angle,
                end_angle,
            } => {
                let det = transform.matrix2.determinant();
                let scale = det.abs().sqrt();
                let (_, sweep_end) = arc_span(start_angle, end_angle);
                let full = sweep_end - start_angle >= TAU - 1e-12;
                let angle_of = |angle: f64| {
                    let v = transform.transform_vector2(DVec2::from_angle(angle));
                    v.y.atan2(v.x)
                };
                let (start, end) = if det < 0.0 {
                    (angle_of(end_angle), angle_of(start_angle))
                } else {
                    (angle_of(start_angle), angle_of(end_angle))
                };
                let end = if full { start + TAU } else { arc_span(start, end).1 };
                Self::arc(transform.transform_point2(center), radius * scale, start, end)
            }
        }
    }

    /// 曲线的参数区间：直线为 `[0, 长度]`，圆弧为 `[起始角, 终止角]` 且终止角大于起始角。
    pub fn span(&self) -> (f64, f64) {
        match *self {
            DimCurve::Line { start, end } => (0.0, start.distance(end)),
            DimCurve::Arc {
                start_angle,
                end_angle,
                ..
            } => arc_span(start_angle, end_angle),
        }
    }

    /// 点在曲线上的排序键：直线取到起点的有向距离，圆弧取规范化后的角度。
    pub fn key_of(&self, point: DVec2) -> f64 {
        match *self {
            DimCurve::Line { start, end } => {
                let dir = (end - start).try_normalize().unwrap_or(DVec2::X);
                (point - start).dot(dir)
            }
            DimCurve::Arc { center, .. } => {
                let (start, end) = self.span();
                let local = point - center;
                let key = normalize_angle_from(local.y.atan2(local.x), start);
                if key > end && key - end > start - (key - TAU) {
                    key - TAU
                } else {
                    key
                }
            }
        }
    }

    /// 参数区间 `[from, to]` 对应的子曲线。
    pub fn piece(&self, from: f64, to: f64) -> Self {
        match *self {
            DimCurve::Line { start, end } => {
                let dir = (end - start).try_normalize().unwrap_or(DVec2::X);
                Self::line(start + dir * from, start + dir * to)
            }
            DimCurve::Arc { center, radius, .. } => Self::arc(center, radius, from, to),
        }
    }

    /// 参数差换算成弧长。
    #[inline]
    pub fn measure(&self, from: f64, to: f64) -> f64 {
        match *self {
            DimCurve::Line { .. } => to - from,
            DimCurve::Arc { radius, .. } => (to - from) * radius,
        }
    }

    /// 长度 `size` 在参数空间中的跨度。
    #[inline]
    pub fn param_extent(&self, size: f64) -> f64 {
        match *self {
            DimCurve::Line { .. } => size,
            DimCurve::Arc { radius, .. } if radius > 0.0 => size / radius,
            DimCurve::Arc { .. } => 0.0,
        }
    }

    pub fn length(&self) -> f64 {
        let (from, to) = self.span();
        self.measure(from, to)
    }

    pub fn start_point(&self) -> DVec2 {
        match *self {
            DimCurve::Line { start, .. } => start,
            DimCurve::Arc {
                center,
                radius,
                start_angle,
                ..
            } => center + DVec2::from_angle(start_angle) * radius,
        }
    }

    pub fn end_point(&self) -> DVec2 {
        match *self {
            DimCurve::Line { end, .. } => end,
            DimCurve::Arc {
                center,
                radius,
                end_angle,
                ..
            } => center + DVec2::from_angle(end_angle) * radius,
        }
    }

    fn bounds(&self) -> Bounds2D {
        let mut bounds = Bounds2D::empty();
        match *self {
            DimCurve::Line { start, end } => {
                bounds.include_point(start);
                bounds.include_point(end);
            }
            DimCurve::Arc { center, radius, .. } => {
                bounds.include_point(center - DVec2::splat(radius));
                bounds.include_point(center + DVec2::splat(radius));
            }
        }
        bounds
    }

    pub(crate) fn intersect_segment(&self, a0: DVec2, a1: DVec2, tol: Tolerance) -> Vec<DVec2> {
        match *self {
            DimCurve::Line { start, end } => segment_segment(start, end, a0, a1, tol).into_iter().collect(),
            DimCurve::Arc { center, radius, .. } => {
                let (start, end) = self.span();
                segment_arc(a0, a1, center, radius, start, end, tol)
            }
        }
    }

    /// 与无限直线（`ray` 为真时为射线）求交。
    pub(crate) fn intersect_line(&self, base: DVec2, direction: DVec2, ray: bool, tol: Tolerance) -> Vec<DVec2> {
        let Some(dir) = direction.try_normalize() else {
            return Vec::new();
        };
        match *self {
            DimCurve::Line { start, end } => segment_line(start, end, base, dir, ray, tol).into_iter().collect(),
            DimCurve::Arc { center, radius, .. } => {
                // 把直线截成覆盖整个圆的线段后按线段求交
                let reach = (center - base).length() + radius * 2.0 + 1.0;
                let from = if ray { base } else { base - dir * reach };
                let (start, end) = self.span();
                segment_arc(from, base + dir * reach, center, radius, start, end, tol)
            }
        }
    }

    /// 与逆时针圆弧 `[start, end]` 求交。
    pub(crate) fn intersect_arc(&self, center: DVec2, radius: f64, start: f64, end: f64, tol: Tolerance) -> Vec<DVec2> {
        let (start, end) = arc_span(start, end);
        match *self {
            DimCurve::Line { start: a0, end: a1 } => segment_arc(a0, a1, center, radius, start, end, tol),
            DimCurve::Arc {
                center: own_center,
                radius: own_radius,
                ..
            } => {
                let (own_start, own_end) = self.span();
                arc_arc((own_center, own_radius, own_start, own_end), (center, radius, start, end), tol)
            }
        }
    }
}

/// 变换是否为相似变换：两轴等长且正交，允许镜像。
pub fn is_similarity(transform: &DAffine2) -> bool {
    let (x, y) = (transform.matrix2.x_axis, transform.matrix2.y_axis);
    let scale = x.length().max(y.length());
    if scale <= f64::EPSILON {
        return false;
    }
    (x.length() - y.length()).abs() <= SIMILARITY_TOLERANCE * scale
        && x.dot(y).abs() <= SIMILARITY_TOLERANCE * scale * scale
}

/// 圆弧角度区间规范化：终止角不大于起始角时加 2π。
pub fn arc_span(start: f64, end: f64) -> (f64, f64) {
    if end - start >= TAU {
        return (start, start + TAU);
    }
    let end = normalize_angle_from(end, start);
    if end <= start { (start, end + TAU) } else { (start, end) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakKind {
    /// 单个交点，两侧各留半个打断间隙。
    Point,
    /// 文字框截出的区间。
    Text,
    /// 调用方给出的固定点对。
    Static,
}

/// 一处打断：`from..to` 为曲线参数区间（直线为距离，圆弧为角度）。
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BreakPointData {
    pub kind: BreakKind,
    pub start: DVec2,
    pub end: DVec2,
    pub from: f64,
    pub to: f64,
}

/// 按 `from` 升序保持有序的打断列表，相同键按插入顺序排列。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BreakList {
    items: Vec<BreakPointData>,
}

impl BreakList {
    pub fn insert(&mut self, data: BreakPointData) {
        let at = self.items.partition_point(|item| item.from <= data.from);
        self.items.insert(at, data);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[BreakPointData] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = &BreakPointData> {
        self.items.iter()
    }
}

/// 切割对象：世界坐标中的固定点对、单个固定点，或图纸中的对象路径。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BreakTarget {
    Static { start: DVec2, end: DVec2 },
    StaticPoint(DVec2),
    Object(ObjectPath),
}

/// 打断引用。`line_index` 指定只作用于第几条标注曲线，None 表示全部。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakPointRef {
    pub target: BreakTarget,
    pub line_index: Option<usize>,
}

impl BreakPointRef {
    pub fn fixed(start: DVec2, end: DVec2) -> Self {
        Self {
            target: BreakTarget::Static { start, end },
            line_index: None,
        }
    }

    pub fn point(point: DVec2) -> Self {
        Self {
            target: BreakTarget::StaticPoint(point),
            line_index: None,
        }
    }

    pub fn object(path: ObjectPath) -> Self {
        Self {
            target: BreakTarget::Object(path),
            line_index: None,
        }
    }

    pub fn on_line(mut self, index: usize) -> Self {
        self.line_index = Some(index);
        self
    }

    #[inline]
    fn applies_to(&self, index: usize) -> bool {
        self.line_index.is_none_or(|line| line == index)
    }
}

/// 一次打断请求的状态，可自由创建，互不共享。
#[derive(Debug, Clone)]
pub struct BreakDimEngine {
    local: Vec<DimCurve>,
    world: Vec<DimCurve>,
    transform: DAffine2,
    tolerance: Tolerance,
    break_size: f64,
    output: Vec<DimCurve>,
}

impl BreakDimEngine {
    pub fn new(break_size: f64) -> Self {
        Self {
            local: Vec::new(),
            world: Vec::new(),
            transform: DAffine2::IDENTITY,
            tolerance: Tolerance::new(BREAK_TOLERANCE_MIN, BREAK_TOLERANCE_MIN),
            break_size: break_size.max(0.0),
            output: Vec::new(),
        }
    }

    #[inline]
    pub fn tolerance(&self) -> Tolerance {
        self.tolerance
    }

    #[inline]
    pub fn break_size(&self) -> f64 {
        self.break_size
    }

    #[inline]
    pub fn output(&self) -> &[DimCurve] {
        &self.output
    }

    /// 记录待打断的标注曲线（标注空间）及其到世界坐标的变换，并重置容差。
    pub fn set_dimension_entities(&mut self, entities: &[DimCurve], transform: DAffine2) {
        if !is_similarity(&transform) {
            warn!("标注变换非等比缩放，圆弧标注线按相似变换近似");
        }
        self.local = entities.to_vec();
        self.world = entities.iter().map(|curve| curve.transformed(&transform)).collect();
        self.transform = transform;
        self.output.clear();

        let mut extents = Bounds2D::empty();
        for curve in &self.world {
            extents.include_bounds(&curve.bounds());
        }
        let far = extents.center().is_some_and(|center| center.length() > LARGE_COORDINATE);
        let value = if far {
            debug!(center = ?extents.center(), "标注远离原点，放宽打断容差");
            BREAK_TOLERANCE_MAX
        } else {
            BREAK_TOLERANCE_MIN
        };
        self.tolerance = Tolerance::new(value, value);
    }

    /// 收集第 `index` 条标注曲线上的全部打断，结果按参数升序。
    pub fn collect_breaks(&self, index: usize, drawing: &Drawing, refs: &[BreakPointRef]) -> BreakList {
        let Some(curve) = self.world.get(index) else {
            return BreakList::default();
        };
        let mut collector = BreakCollector::new(curve, drawing, self.tolerance, self.break_size);
        for reference in refs.iter().filter(|reference| reference.applies_to(index)) {
            match &reference.target {
                BreakTarget::Static { start, end } => collector.add_static(*start, *end),
                BreakTarget::StaticPoint(point) => collector.add_point(*point),
                BreakTarget::Object(path) => match drawing.resolve_path(path) {
                    Some((entity, transform)) => collector.collect_entity(entity, transform, 0),
                    None => debug!(root = path.root.get(), "打断对象路径无法解析"),
                },
            }
        }
        collector.finish()
    }

    /// 对每条标注曲线求打断并拆分。没有打断的曲线原样输出。
    pub fn break_dimension(&mut self, drawing: &Drawing, refs: &[BreakPointRef]) -> &[DimCurve] {
        let inverse = self.transform.inverse();
        let mut output = Vec::with_capacity(self.local.len());
        for index in 0..self.local.len() {
            let breaks = self.collect_breaks(index, drawing, refs);
            if breaks.is_empty() {
                output.push(self.local[index]);
                continue;
            }
            let pieces = split::split_curve(&self.world[index], &breaks, self.tolerance);
            trace!(index, breaks = breaks.len(), pieces = pieces.len(), "标注曲线已打断");
            output.extend(pieces.iter().map(|piece| piece.transformed(&inverse)));
        }
        debug!(input = self.local.len(), output = output.len(), "标注打断完成");
        self.output = output;
        &self.output
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::{FRAC_PI_2, PI};

    use dimkit_core::document::{Arc, Attribute, BlockDefinition, BlockReference, Line, MText};
    use dimkit_core::geometry::{Point2, Vector2};

    use super::*;

    fn assert_line(curve: &DimCurve, start: DVec2, end: DVec2) {
        match *curve {
            DimCurve::Line { start: s, end: e } => {
                assert!(s.distance(start) < 1e-9, "起点 {s:?} 应为 {start:?}");
                assert!(e.distance(end) < 1e-9, "终点 {e:?} 应为 {end:?}");
            }
            other => panic!("expected line, got {other:?}"),
        }
    }

    fn horizontal_engine() -> BreakDimEngine {
        let mut engine = BreakDimEngine::new(1.0);
        engine.set_dimension_entities(
            &[DimCurve::line(DVec2::ZERO, DVec2::new(10.0, 0.0))],
            DAffine2::IDENTITY,
        );
        engine
    }

    #[test]
    fn static_pair_splits_line_in_two() {
        let mut engine = horizontal_engine();
        let refs = [BreakPointRef::fixed(DVec2::new(3.0, 0.0), DVec2::new(5.0, 0.0))];
        let output = engine.break_dimension(&Drawing::new(), &refs);
        assert_eq!(output.len(), 2);
        assert_line(&output[0], DVec2::ZERO, DVec2::new(3.0, 0.0));
        assert_line(&output[1], DVec2::new(5.0, 0.0), DVec2::new(10.0, 0.0));
    }

    #[test]
    fn empty_references_pass_curves_through() {
        let mut engine = BreakDimEngine::new(1.0);
        let arc = DimCurve::arc(DVec2::new(1.0, 2.0), 3.0, 0.25, 1.75);
        let line = DimCurve::line(DVec2::ZERO, DVec2::new(10.0, 0.0));
        engine.set_dimension_entities(&[line, arc], DAffine2::from_angle(0.3));
        let output = engine.break_dimension(&Drawing::new(), &[]);
        assert_eq!(output, &[line, arc]);
    }

    #[test]
    fn crossing_lines_become_sorted_point_breaks() {
        let engine = horizontal_engine();
        let mut drawing = Drawing::new();
        let far = drawing.add_line(Point2::new(7.0, -1.0), Point2::new(7.0, 1.0));
        let near = drawing.add_line(Point2::new(2.0, -1.0), Point2::new(2.0, 1.0));
        let refs = [
            BreakPointRef::object(ObjectPath::top_level(far)),
            BreakPointRef::object(ObjectPath::top_level(near)),
        ];
        let breaks = engine.collect_breaks(0, &drawing, &refs);
        assert_eq!(breaks.len(), 2);
        assert!(breaks.as_slice().windows(2).all(|pair| pair[0].from <= pair[1].from));
        let first = breaks.as_slice()[0];
        assert_eq!(first.kind, BreakKind::Point);
        assert!((first.from - 1.5).abs() < 1e-9);
        assert!((first.to - 2.5).abs() < 1e-9);
    }

    #[test]
    fn text_box_removes_interval() {
        let mut engine = horizontal_engine();
        let mut drawing = Drawing::new();
        // 宽 2·0.6·1 = 1.2，高 1，左下角 (4, -0.5)
        let text = drawing.add_text(Point2::new(4.0, -0.5), "AB", 1.0, 0.0);
        let output = engine.break_dimension(&drawing, &[BreakPointRef::object(ObjectPath::top_level(text))]);
        assert_eq!(output.len(), 2);
        assert_line(&output[0], DVec2::ZERO, DVec2::new(4.0, 0.0));
        assert_line(&output[1], DVec2::new(5.2, 0.0), DVec2::new(10.0, 0.0));
    }

    #[test]
    fn text_touching_only_one_edge_is_ignored() {
        let engine = horizontal_engine();
        let mut drawing = Drawing::new();
        let text = drawing.add_text(Point2::new(9.5, -0.5), "ABCD", 1.0, 0.0);
        let breaks = engine.collect_breaks(0, &drawing, &[BreakPointRef::object(ObjectPath::top_level(text))]);
        assert!(breaks.is_empty(), "文字框只与线相交一次，不应产生打断");
    }

    #[test]
    fn arc_is_broken_by_angle() {
        let mut engine = BreakDimEngine::new(0.0);
        engine.set_dimension_entities(&[DimCurve::arc(DVec2::ZERO, 5.0, 0.0, PI)], DAffine2::IDENTITY);
        let mut drawing = Drawing::new();
        let cutter = drawing.add_entity(Entity::Line(Line {
            start: Point2::new(0.0, 0.0),
            end: Point2::new(0.0, 10.0),
        }));
        let refs = [BreakPointRef::object(ObjectPath::top_level(cutter))];
        let breaks = engine.collect_breaks(0, &drawing, &refs);
        assert_eq!(breaks.len(), 1);
        assert!((breaks.as_slice()[0].from - FRAC_PI_2).abs() < 1e-9);

        let refs = [BreakPointRef::fixed(DVec2::new(0.0, 5.0), DVec2::new(-5.0, 0.0))];
        let output = engine.break_dimension(&drawing, &refs).to_vec();
        assert_eq!(output.len(), 1);
        match output[0] {
            DimCurve::Arc {
                start_angle,
                end_angle,
                ..
            } => {
                assert!(start_angle.abs() < 1e-9);
                assert!((end_angle - FRAC_PI_2).abs() < 1e-9);
            }
            other => panic!("expected arc, got {other:?}"),
        }
    }

    #[test]
    fn wrapped_arc_keys_stay_inside_span() {
        let arc = DimCurve::arc(DVec2::ZERO, 1.0, 1.5 * PI, 0.5 * PI);
        let (start, end) = arc.span();
        assert!((end - start - PI).abs() < 1e-12);
        let key = arc.key_of(DVec2::new(1.0, 0.0));
        assert!((key - 2.0 * PI).abs() < 1e-12);
        let before_start = arc.key_of(DVec2::from_angle(1.5 * PI - 1e-9));
        assert!(before_start < start);
    }

    #[test]
    fn block_reference_recurses_and_checks_attributes() {
        let mut engine = horizontal_engine();
        let mut drawing = Drawing::new();
        drawing.add_block_definition(BlockDefinition {
            name: "TICK".to_string(),
            base_point: Point2::new(0.0, 0.0),
            entities: vec![Entity::Line(Line {
                start: Point2::new(0.0, -1.0),
                end: Point2::new(0.0, 1.0),
            })],
        });
        let reference = drawing.add_entity(Entity::BlockReference(BlockReference {
            name: "TICK".to_string(),
            insert: Point2::new(2.0, 0.0),
            scale: Vector2::new(1.0, 1.0),
            rotation: 0.0,
            attributes: vec![Attribute {
                tag: "NO".to_string(),
                text: "AB".to_string(),
                insert: Point2::new(6.0, -0.5),
                height: 1.0,
                rotation: 0.0,
                width_factor: 1.0,
            }],
        }));
        let refs = [BreakPointRef::object(ObjectPath::top_level(reference))];
        let breaks = engine.collect_breaks(0, &drawing, &refs);
        let kinds: Vec<BreakKind> = breaks.iter().map(|item| item.kind).collect();
        assert_eq!(kinds, vec![BreakKind::Point, BreakKind::Text]);

        let output = engine.break_dimension(&drawing, &refs);
        assert_eq!(output.len(), 3);
        assert_line(&output[0], DVec2::ZERO, DVec2::new(1.5, 0.0));
        assert_line(&output[1], DVec2::new(2.5, 0.0), DVec2::new(6.0, 0.0));
        assert_line(&output[2], DVec2::new(7.2, 0.0), DVec2::new(10.0, 0.0));
    }

    #[test]
    fn line_index_limits_reference() {
        let mut engine = BreakDimEngine::new(1.0);
        let upper = DimCurve::line(DVec2::new(0.0, 1.0), DVec2::new(10.0, 1.0));
        let lower = DimCurve::line(DVec2::ZERO, DVec2::new(10.0, 0.0));
        engine.set_dimension_entities(&[upper, lower], DAffine2::IDENTITY);
        let mut drawing = Drawing::new();
        let cutter = drawing.add_line(Point2::new(5.0, -2.0), Point2::new(5.0, 2.0));
        let refs = [BreakPointRef::object(ObjectPath::top_level(cutter)).on_line(1)];
        let output = engine.break_dimension(&drawing, &refs);
        assert_eq!(output.len(), 3);
        assert_eq!(output[0], upper);
    }

    #[test]
    fn far_coordinates_widen_tolerance() {
        let mut engine = BreakDimEngine::new(1.0);
        engine.set_dimension_entities(
            &[DimCurve::line(DVec2::new(2e6, 0.0), DVec2::new(2e6 + 10.0, 0.0))],
            DAffine2::IDENTITY,
        );
        assert_eq!(engine.tolerance().equal_point, BREAK_TOLERANCE_MAX);
        engine.set_dimension_entities(&[DimCurve::line(DVec2::ZERO, DVec2::X)], DAffine2::IDENTITY);
        assert_eq!(engine.tolerance().equal_point, BREAK_TOLERANCE_MIN);
    }

    #[test]
    fn transformed_dimension_maps_pieces_back() {
        let mut engine = BreakDimEngine::new(0.0);
        let transform = DAffine2::from_translation(DVec2::new(100.0, 50.0));
        engine.set_dimension_entities(&[DimCurve::line(DVec2::ZERO, DVec2::new(10.0, 0.0))], transform);
        let refs = [BreakPointRef::fixed(DVec2::new(103.0, 50.0), DVec2::new(105.0, 50.0))];
        let output = engine.break_dimension(&Drawing::new(), &refs);
        assert_eq!(output.len(), 2);
        assert_line(&output[0], DVec2::ZERO, DVec2::new(3.0, 0.0));
        assert_line(&output[1], DVec2::new(5.0, 0.0), DVec2::new(10.0, 0.0));
    }

    #[test]
    fn similarity_detection_allows_mirror_but_not_stretch() {
        assert!(is_similarity(&DAffine2::from_scale(DVec2::new(-2.0, 2.0))));
        assert!(is_similarity(&DAffine2::from_angle(0.7)));
        assert!(!is_similarity(&DAffine2::from_scale(DVec2::new(3.0, 1.0))));
        assert!(!is_similarity(&DAffine2::from_scale(DVec2::ZERO)));
    }

    #[test]
    fn mirrored_arc_keeps_counter_clockwise_sweep() {
        let arc = DimCurve::arc(DVec2::ZERO, 2.0, 0.0, FRAC_PI_2);
        let mirror = DAffine2::from_scale(DVec2::new(-1.0, 1.0));
        match arc.transformed(&mirror) {
            DimCurve::Arc {
                radius,
                start_angle,
                end_angle,
                ..
            } => {
                assert!((radius - 2.0).abs() < 1e-12);
                assert!((start_angle - FRAC_PI_2).abs() < 1e-12);
                assert!((end_angle - PI).abs() < 1e-12);
            }
            other => panic!("expected arc, got {other:?}"),
        }
    }

    #[test]
    fn mtext_and_arc_targets_are_supported() {
        let engine = horizontal_engine();
        let mut drawing = Drawing::new();
        let mtext = drawing.add_entity(Entity::MText(MText {
            insert: Point2::new(3.0, 0.5),
            content: "X".to_string(),
            height: 1.0,
            reference_width: Some(1.0),
            direction: Vector2::new(1.0, 0.0),
            attachment_point: 1,
        }));
        let arc = drawing.add_entity(Entity::Arc(Arc {
            center: Point2::new(8.0, 0.0),
            radius: 1.0,
            start_angle: PI,
            end_angle: 1.5 * PI,
        }));
        let refs = [
            BreakPointRef::object(ObjectPath::top_level(arc)),
            BreakPointRef::object(ObjectPath::top_level(mtext)),
        ];
        let breaks = engine.collect_breaks(0, &drawing, &refs);
        assert_eq!(breaks.len(), 2);
        let text = breaks.as_slice()[0];
        assert_eq!(text.kind, BreakKind::Text);
        assert!((text.from - 3.0).abs() < 1e-9 && (text.to - 4.0).abs() < 1e-9);
        let point = breaks.as_slice()[1];
        assert!((point.start - DVec2::new(7.0, 0.0)).length() < 1e-9);
    }
}
