//! 曲线连接：消费 `find_sequence` 的结果，把链上的曲线合并成一条。
//!
//! 多段线、三维多段线与样条三种表示各有一套累加方式；直线、圆弧、椭圆弧
//! 不经过序列查找，直接按共线/同心/同轴条件扩展主曲线的参数区间。

use std::f64::consts::TAU;

use dimkit_core::curve::{
    CircArc3d, Curve, CurveKind, EllipArc3d, LineSeg3d, Polyline2d, Polyline3d, PolylineVertex2d,
};
use dimkit_core::geometry::world_to_ocs;
use dimkit_core::nurbs::NurbsCurve3d;
use dimkit_core::tolerance::Tolerance;
use glam::{DVec2, DVec3};
use tracing::{debug, trace};

use crate::errors::EngineError;
use crate::sequence::{CurveIndex, find_sequence};

/// 多段线连接允许的候选类型。
pub const POLYLINE_JOIN_KINDS: [CurveKind; 3] = [CurveKind::Line, CurveKind::Arc, CurveKind::Polyline];

/// 三维多段线可以吸收任何曲线（曲线部分离散成点）。
pub const POLYLINE3D_JOIN_KINDS: [CurveKind; 7] = [
    CurveKind::Line,
    CurveKind::Arc,
    CurveKind::Ellipse,
    CurveKind::Polyline,
    CurveKind::Polyline3d,
    CurveKind::Spline,
    CurveKind::Composite,
];

/// 样条连接只接受基本曲线、样条与复合曲线。
pub const SPLINE_JOIN_KINDS: [CurveKind; 5] = [
    CurveKind::Line,
    CurveKind::Arc,
    CurveKind::Ellipse,
    CurveKind::Spline,
    CurveKind::Composite,
];

const ANGLE_EPSILON: f64 = 1e-10;
const SPLINE_SAMPLES_PER_SPAN: usize = 16;

/// 多段线累加器：点、凸度、标识、宽度四个数组始终等长。
#[derive(Debug, Clone, Default)]
pub struct PolyData {
    points: Vec<DVec2>,
    bulges: Vec<f64>,
    identifiers: Vec<i32>,
    widths: Vec<(f64, f64)>,
    normal: DVec3,
    constant_width: f64,
    has_bulges: bool,
    has_widths: bool,
    has_identifiers: bool,
}

impl PolyData {
    pub fn new(normal: DVec3, constant_width: f64) -> Self {
        Self {
            normal,
            constant_width,
            ..Self::default()
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[DVec2] {
        &self.points
    }

    pub fn bulges(&self) -> &[f64] {
        &self.bulges
    }

    pub fn normal(&self) -> DVec3 {
        self.normal
    }

    pub fn constant_width(&self) -> f64 {
        self.constant_width
    }

    /// 追加一段顶点；与上一段末点重合的首点并入末点，不重复记录。
    pub fn append(&mut self, vertices: &[PolylineVertex2d], tol: Tolerance) {
        let mut rest = vertices;
        if let (Some(last_point), Some(first)) = (self.points.last().copied(), vertices.first()) {
            if tol.points_equal2(last_point, first.point) {
                let last = self.points.len() - 1;
                self.bulges[last] = first.bulge;
                self.widths[last] = (first.start_width, first.end_width);
                if self.identifiers[last] == 0 {
                    self.identifiers[last] = first.identifier;
                }
                self.note_attributes(first);
                rest = &vertices[1..];
            }
        }
        for vertex in rest {
            self.points.push(vertex.point);
            self.bulges.push(vertex.bulge);
            self.identifiers.push(vertex.identifier);
            self.widths.push((vertex.start_width, vertex.end_width));
            self.note_attributes(vertex);
        }
    }

    fn note_attributes(&mut self, vertex: &PolylineVertex2d) {
        self.has_bulges |= vertex.bulge != 0.0;
        self.has_widths |= vertex.start_width != 0.0 || vertex.end_width != 0.0;
        self.has_identifiers |= vertex.identifier != 0;
    }

    /// 开放链最后一个顶点之后没有圆弧段。
    pub fn close_chain(&mut self) {
        if let Some(last) = self.bulges.last_mut() {
            *last = 0.0;
        }
    }

    /// 用累加结果重写多段线顶点；没有出现过的属性保持默认值。
    pub fn write_to(&self, polyline: &mut Polyline2d) {
        polyline.reset_vertices(0);
        polyline.reset_vertices(self.len());
        for (index, vertex) in polyline.vertices.iter_mut().enumerate() {
            vertex.point = self.points[index];
            if self.has_bulges {
                vertex.bulge = self.bulges[index];
            }
            if self.has_widths {
                (vertex.start_width, vertex.end_width) = self.widths[index];
            }
            if self.has_identifiers {
                vertex.identifier = self.identifiers[index];
            }
        }
        polyline.normal = self.normal;
        polyline.constant_width = self.constant_width;
    }
}

/// 合并进多段线，返回实际吸收的候选索引。
pub fn join_polyline(
    primary: &mut Polyline2d,
    candidates: &[Option<Curve>],
    sequence: &[CurveIndex],
    tol: Tolerance,
) -> Result<Vec<usize>, EngineError> {
    let mut data = PolyData::new(primary.normal, primary.constant_width);
    let mut consumed = Vec::new();
    for link in sequence {
        match *link {
            CurveIndex::Primary => data.append(&primary.vertices, tol),
            CurveIndex::Candidate { index, reversed } => {
                let Some(Some(curve)) = candidates.get(index) else {
                    continue;
                };
                let Some(vertices) = polyline_vertices(curve, reversed, primary, tol) else {
                    trace!(index, kind = ?curve.kind(), "候选曲线无法转为多段线顶点");
                    continue;
                };
                data.append(&vertices, tol);
                consumed.push(index);
            }
        }
    }
    if consumed.is_empty() {
        return Err(EngineError::InvalidInput("no candidate was joined".to_string()));
    }
    data.close_chain();
    data.write_to(primary);
    debug!(consumed = consumed.len(), vertices = data.len(), "多段线连接完成");
    Ok(consumed)
}

fn polyline_vertices(
    curve: &Curve,
    reversed: bool,
    plane: &Polyline2d,
    tol: Tolerance,
) -> Option<Vec<PolylineVertex2d>> {
    let to_ocs = |point: DVec3| world_to_ocs(point, plane.normal).truncate();
    match curve {
        Curve::Line(line) => {
            let (a, b) = if reversed {
                (line.end, line.start)
            } else {
                (line.start, line.end)
            };
            Some(vec![
                PolylineVertex2d::new(to_ocs(a)),
                PolylineVertex2d::new(to_ocs(b)),
            ])
        }
        Curve::Arc(arc) => {
            if !tol.is_parallel(arc.normal, plane.normal) {
                return None;
            }
            let anti_parallel = arc.normal.dot(plane.normal) < 0.0;
            let mut bulge = (arc.sweep() / 4.0).tan();
            if anti_parallel ^ reversed {
                bulge = -bulge;
            }
            let (a, b) = if reversed {
                (arc.end_point(), arc.start_point())
            } else {
                (arc.start_point(), arc.end_point())
            };
            Some(vec![
                PolylineVertex2d::with_bulge(to_ocs(a), bulge),
                PolylineVertex2d::new(to_ocs(b)),
            ])
        }
        Curve::Polyline(polyline) => {
            if !tol.is_parallel(polyline.normal, plane.normal) {
                return None;
            }
            let flip = polyline.normal.dot(plane.normal) < 0.0;
            let vertices: Vec<PolylineVertex2d> = polyline
                .vertices
                .iter()
                .map(|vertex| PolylineVertex2d {
                    point: to_ocs(polyline.to_world(vertex.point)),
                    bulge: if flip { -vertex.bulge } else { vertex.bulge },
                    ..*vertex
                })
                .collect();
            Some(if reversed {
                reverse_vertices(&vertices)
            } else {
                vertices
            })
        }
        Curve::Ellipse(_) | Curve::Polyline3d(_) | Curve::Spline(_) | Curve::Composite(_) => None,
    }
}

/// 反转顶点顺序：每段的凸度取反并移到新的起点上，起止宽度互换。
pub fn reverse_vertices(vertices: &[PolylineVertex2d]) -> Vec<PolylineVertex2d> {
    let n = vertices.len();
    (0..n)
        .map(|i| {
            let vertex = vertices[n - 1 - i];
            let (bulge, start_width, end_width) = if i + 1 < n {
                let segment = vertices[n - 2 - i];
                (-segment.bulge, segment.end_width, segment.start_width)
            } else {
                (0.0, 0.0, 0.0)
            };
            PolylineVertex2d {
                point: vertex.point,
                bulge,
                start_width,
                end_width,
                identifier: vertex.identifier,
            }
        })
        .collect()
}

/// 合并进三维多段线，曲线候选离散为点列。
pub fn join_polyline3d(
    primary: &mut Polyline3d,
    candidates: &[Option<Curve>],
    sequence: &[CurveIndex],
    tol: Tolerance,
) -> Result<Vec<usize>, EngineError> {
    let mut points: Vec<DVec3> = Vec::new();
    let mut consumed = Vec::new();
    for link in sequence {
        match *link {
            CurveIndex::Primary => append_sample_points(&mut points, &primary.points, tol),
            CurveIndex::Candidate { index, reversed } => {
                let Some(Some(curve)) = candidates.get(index) else {
                    continue;
                };
                let Some(mut samples) = curve_samples(curve) else {
                    continue;
                };
                if reversed {
                    samples.reverse();
                }
                append_sample_points(&mut points, &samples, tol);
                consumed.push(index);
            }
        }
    }
    if consumed.is_empty() {
        return Err(EngineError::InvalidInput("no candidate was joined".to_string()));
    }
    debug!(consumed = consumed.len(), points = points.len(), "三维多段线连接完成");
    primary.points = points;
    Ok(consumed)
}

fn curve_samples(curve: &Curve) -> Option<Vec<DVec3>> {
    match curve {
        Curve::Line(line) => Some(vec![line.start, line.end]),
        Curve::Polyline3d(polyline) => Some(polyline.points.clone()),
        Curve::Polyline(polyline) => Some(polyline.sample_points()),
        Curve::Arc(_) | Curve::Ellipse(_) | Curve::Spline(_) | Curve::Composite(_) => curve
            .to_nurbs()
            .ok()
            .map(|nurbs| nurbs.sample_points(SPLINE_SAMPLES_PER_SPAN)),
    }
}

fn append_sample_points(points: &mut Vec<DVec3>, samples: &[DVec3], tol: Tolerance) {
    for sample in samples {
        if points.last().is_some_and(|last| tol.points_equal(*last, *sample)) {
            continue;
        }
        points.push(*sample);
    }
}

/// 合并进 NURBS 样条。主曲线之前的候选由近及远接到起点，之后的候选依次接到终点。
/// 候选任一段拼接失败时整条候选跳过，不计入已合并，继续后续候选。
pub fn join_spline(
    primary: &mut NurbsCurve3d,
    candidates: &[Option<Curve>],
    sequence: &[CurveIndex],
    tol: Tolerance,
) -> Result<Vec<usize>, EngineError> {
    let Some(pivot) = sequence.iter().position(|link| *link == CurveIndex::Primary) else {
        return Err(EngineError::InvalidInput("sequence has no primary node".to_string()));
    };
    let mut joined = primary.clone();
    let mut consumed = Vec::new();

    for link in sequence[..pivot].iter().rev() {
        let Some((index, pieces)) = candidate_pieces(candidates, *link) else {
            continue;
        };
        let attempt = pieces
            .iter()
            .rev()
            .try_fold(joined.clone(), |acc, piece| piece.join_with(&acc, tol));
        if let Ok(next) = attempt {
            joined = next;
            consumed.push(index);
        }
    }
    for link in &sequence[pivot + 1..] {
        let Some((index, pieces)) = candidate_pieces(candidates, *link) else {
            continue;
        };
        let attempt = pieces
            .iter()
            .try_fold(joined.clone(), |acc, piece| acc.join_with(piece, tol));
        if let Ok(next) = attempt {
            joined = next;
            consumed.push(index);
        }
    }

    if consumed.is_empty() {
        return Err(EngineError::InvalidInput("no candidate was joined".to_string()));
    }
    *primary = joined;
    debug!(consumed = consumed.len(), "样条连接完成");
    Ok(consumed)
}

fn candidate_pieces(candidates: &[Option<Curve>], link: CurveIndex) -> Option<(usize, Vec<NurbsCurve3d>)> {
    let CurveIndex::Candidate { index, reversed } = link else {
        return None;
    };
    let curve = candidates.get(index)?.as_ref()?;
    let pieces = nurbs_pieces(curve, reversed);
    (!pieces.is_empty()).then_some((index, pieces))
}

/// 复合曲线展开成子曲线各自的 NURBS；反向时顺序与参数方向一起翻转。
fn nurbs_pieces(curve: &Curve, reversed: bool) -> Vec<NurbsCurve3d> {
    let mut pieces: Vec<NurbsCurve3d> = match curve {
        Curve::Composite(composite) => composite
            .curves
            .iter()
            .flat_map(|sub| nurbs_pieces(sub, false))
            .collect(),
        _ => curve.to_nurbs().into_iter().collect(),
    };
    if reversed {
        pieces.reverse();
        pieces = pieces.iter().map(NurbsCurve3d::reversed).collect();
    }
    pieces
}

/// 共线直线合并：主直线的参数区间扩展到覆盖所有共线候选。
pub fn join_lines(
    primary: &mut LineSeg3d,
    candidates: &[Option<Curve>],
    tol: Tolerance,
) -> Result<Vec<usize>, EngineError> {
    if tol.is_zero(primary.length()) {
        return Err(EngineError::InvalidInput("primary line is degenerate".to_string()));
    }
    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
    let mut consumed = Vec::new();
    for (index, candidate) in candidates.iter().enumerate() {
        let Some(Curve::Line(line)) = candidate else {
            continue;
        };
        if !primary.is_on_infinite_line(line.start, tol) || !primary.is_on_infinite_line(line.end, tol) {
            continue;
        }
        let (a, b) = (primary.param_of(line.start), primary.param_of(line.end));
        t0 = t0.min(a).min(b);
        t1 = t1.max(a).max(b);
        consumed.push(index);
    }
    if consumed.is_empty() {
        return Err(EngineError::InvalidInput("no collinear line found".to_string()));
    }
    *primary = LineSeg3d::new(primary.point_at(t0), primary.point_at(t1));
    debug!(consumed = consumed.len(), "直线合并完成");
    Ok(consumed)
}

/// 逆时针角度窗口 `[start, end]`，`closed` 表示已覆盖整圈。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcWindow {
    pub start: f64,
    pub end: f64,
    pub closed: bool,
}

impl ArcWindow {
    pub fn new(start: f64, end: f64) -> Self {
        Self {
            start,
            end,
            closed: false,
        }
    }
}

/// 把新的角度区间并入窗口。
///
/// 新区间起点先按 2π 平移到 `[start, start + 2π)`；与窗口尾部相接或重叠时延长终点，
/// 从窗口前方绕回时延长起点，完全脱离时沿逆时针方向补齐间隙。并集达到整圈时
/// 终点钳制为 `start + 2π` 并标记闭合。
pub fn calc_arc_angles(window: ArcWindow, new_start: f64, new_end: f64) -> ArcWindow {
    if window.closed {
        return window;
    }
    let sweep = new_end - new_start;
    let floor = window.start - ANGLE_EPSILON;
    let start = if (floor..floor + TAU).contains(&new_start) {
        new_start
    } else {
        floor + (new_start - floor).rem_euclid(TAU)
    };
    let end = start + sweep;

    let mut result = window;
    if start <= window.end + ANGLE_EPSILON {
        result.end = result.end.max(end);
    } else if end - TAU >= window.start - ANGLE_EPSILON {
        result.start = start - TAU;
        result.end = result.end.max(end - TAU);
    } else {
        result.end = end;
    }

    if result.end - result.start >= TAU - ANGLE_EPSILON {
        result.end = result.start + TAU;
        result.closed = true;
    }
    result
}

/// 圆弧合并的结果：吸收的候选与是否闭合成整圆。
#[derive(Debug, Clone, PartialEq)]
pub struct ArcJoin {
    pub consumed: Vec<usize>,
    pub closed: bool,
}

/// 同心同半径圆弧合并。反向法向的候选在主圆弧坐标系里按终点起算。
pub fn join_arcs(
    primary: &mut CircArc3d,
    candidates: &[Option<Curve>],
    tol: Tolerance,
) -> Result<ArcJoin, EngineError> {
    if primary.is_full_circle() {
        return Err(EngineError::ClosedPrimary);
    }
    if tol.is_zero(primary.radius) {
        return Err(EngineError::InvalidInput("primary arc has zero radius".to_string()));
    }
    let mut window = ArcWindow::new(primary.start_angle, primary.end_angle);
    let mut consumed = Vec::new();
    for (index, candidate) in candidates.iter().enumerate() {
        let Some(Curve::Arc(arc)) = candidate else {
            continue;
        };
        if !tol.points_equal(arc.center, primary.center)
            || !tol.values_equal(arc.radius, primary.radius)
            || !tol.is_parallel(arc.normal, primary.normal)
        {
            continue;
        }
        let first = if tol.is_codirectional(arc.normal, primary.normal) {
            arc.start_point()
        } else {
            arc.end_point()
        };
        let start = primary.angle_of(first);
        window = calc_arc_angles(window, start, start + arc.sweep());
        consumed.push(index);
        if window.closed {
            break;
        }
    }
    if consumed.is_empty() {
        return Err(EngineError::InvalidInput("no concentric arc found".to_string()));
    }
    primary.start_angle = window.start;
    primary.end_angle = window.end;
    debug!(consumed = consumed.len(), closed = window.closed, "圆弧合并完成");
    Ok(ArcJoin {
        consumed,
        closed: window.closed,
    })
}

/// 同一椭圆（中心、长轴、轴比、法向一致）上的椭圆弧合并。
pub fn join_ellipses(
    primary: &mut EllipArc3d,
    candidates: &[Option<Curve>],
    tol: Tolerance,
) -> Result<ArcJoin, EngineError> {
    if primary.is_full() {
        return Err(EngineError::ClosedPrimary);
    }
    let mut window = ArcWindow::new(primary.start_param, primary.end_param);
    let mut consumed = Vec::new();
    for (index, candidate) in candidates.iter().enumerate() {
        let Some(Curve::Ellipse(ellipse)) = candidate else {
            continue;
        };
        if !tol.points_equal(ellipse.center, primary.center)
            || !tol.points_equal(ellipse.major_axis, primary.major_axis)
            || !tol.values_equal(ellipse.ratio, primary.ratio)
            || !tol.is_codirectional(ellipse.normal, primary.normal)
        {
            continue;
        }
        window = calc_arc_angles(window, ellipse.start_param, ellipse.end_param);
        consumed.push(index);
        if window.closed {
            break;
        }
    }
    if consumed.is_empty() {
        return Err(EngineError::InvalidInput("no matching ellipse found".to_string()));
    }
    primary.start_param = window.start;
    primary.end_param = window.end;
    debug!(consumed = consumed.len(), closed = window.closed, "椭圆弧合并完成");
    Ok(ArcJoin {
        consumed,
        closed: window.closed,
    })
}

/// 按主曲线类型选择连接方式：多段线类先查找序列，基本曲线直接合并。
pub fn join_curves(
    primary: &mut Curve,
    candidates: &[Option<Curve>],
    tol: Tolerance,
) -> Result<Vec<usize>, EngineError> {
    match primary {
        Curve::Line(line) => join_lines(line, candidates, tol),
        Curve::Arc(arc) => join_arcs(arc, candidates, tol).map(|join| join.consumed),
        Curve::Ellipse(ellipse) => join_ellipses(ellipse, candidates, tol).map(|join| join.consumed),
        Curve::Polyline(_) => {
            let sequence = find_sequence(primary, candidates, &POLYLINE_JOIN_KINDS, true, tol)?;
            let Curve::Polyline(polyline) = primary else {
                return Err(EngineError::InvalidInput("primary changed kind".to_string()));
            };
            join_polyline(polyline, candidates, &sequence, tol)
        }
        Curve::Polyline3d(_) => {
            let sequence = find_sequence(primary, candidates, &POLYLINE3D_JOIN_KINDS, false, tol)?;
            let Curve::Polyline3d(polyline) = primary else {
                return Err(EngineError::InvalidInput("primary changed kind".to_string()));
            };
            join_polyline3d(polyline, candidates, &sequence, tol)
        }
        Curve::Spline(_) | Curve::Composite(_) => {
            let sequence = find_sequence(primary, candidates, &SPLINE_JOIN_KINDS, false, tol)?;
            let mut spline = primary
                .to_nurbs()
                .map_err(|err| EngineError::InvalidInput(err.to_string()))?;
            let consumed = join_spline(&mut spline, candidates, &sequence, tol)?;
            *primary = Curve::Spline(spline);
            Ok(consumed)
        }
    }
}
