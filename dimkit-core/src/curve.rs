//! 参数曲线与曲线连接所需的统一接口。
//!
//! `Curve` 是封闭的和类型，序列查找与连接算法对其穷尽匹配。

use std::f64::consts::TAU;

use glam::{DVec2, DVec3};
use serde::{Deserialize, Serialize};

use crate::geometry::{ocs_axes, ocs_to_world};
use crate::nurbs::{NurbsCurve3d, NurbsError};
use crate::tolerance::Tolerance;

const FULL_TURN_EPSILON: f64 = 1e-12;
const ARC_SAMPLE_STEP: f64 = TAU / 64.0;
const MAX_ARC_SAMPLES: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CurveKind {
    Line,
    Arc,
    Ellipse,
    Polyline,
    Polyline3d,
    Spline,
    Composite,
}

/// 平面性分类。直线没有唯一平面，只记录方向。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Planarity {
    NonPlanar,
    Planar { origin: DVec3, normal: DVec3 },
    Linear { origin: DVec3, direction: DVec3 },
}

impl Planarity {
    pub fn normal(&self) -> Option<DVec3> {
        match self {
            Planarity::Planar { normal, .. } => Some(*normal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineSeg3d {
    pub start: DVec3,
    pub end: DVec3,
}

impl LineSeg3d {
    #[inline]
    pub fn new(start: DVec3, end: DVec3) -> Self {
        Self { start, end }
    }

    #[inline]
    pub fn direction(&self) -> DVec3 {
        self.end - self.start
    }

    #[inline]
    pub fn length(&self) -> f64 {
        self.direction().length()
    }

    #[inline]
    pub fn point_at(&self, t: f64) -> DVec3 {
        self.start + self.direction() * t
    }

    /// 点在无限延长线上的投影参数（起点 0，终点 1）。
    pub fn param_of(&self, point: DVec3) -> f64 {
        let dir = self.direction();
        let length_squared = dir.length_squared();
        if length_squared <= f64::EPSILON {
            0.0
        } else {
            (point - self.start).dot(dir) / length_squared
        }
    }

    /// 点到无限延长线的距离是否在容差内。
    pub fn is_on_infinite_line(&self, point: DVec3, tol: Tolerance) -> bool {
        let projected = self.point_at(self.param_of(point));
        tol.points_equal(projected, point)
    }
}

/// 三维圆弧。角度在 (`ref_axis`, `normal × ref_axis`) 坐标系内逆时针度量，
/// 约定 `end_angle > start_angle`。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CircArc3d {
    pub center: DVec3,
    pub normal: DVec3,
    pub ref_axis: DVec3,
    pub radius: f64,
    pub start_angle: f64,
    pub end_angle: f64,
}

impl CircArc3d {
    /// 以 OCS X 轴为参考轴创建圆弧。终止角不大于起始角时按逆时针补到一圈以内；
    /// 起始角大到无法精确表示扫掠角时先归一化到 [0, 2π)。
    pub fn new(center: DVec3, normal: DVec3, radius: f64, start_angle: f64, end_angle: f64) -> Self {
        let (ref_axis, _, normal) = ocs_axes(normal);
        let (start_angle, end_angle) = normalized_angles(start_angle, end_angle);
        Self {
            center,
            normal,
            ref_axis,
            radius,
            start_angle,
            end_angle,
        }
    }

    #[inline]
    pub fn y_axis(&self) -> DVec3 {
        self.normal.cross(self.ref_axis)
    }

    #[inline]
    pub fn sweep(&self) -> f64 {
        self.end_angle - self.start_angle
    }

    #[inline]
    pub fn point_at_angle(&self, angle: f64) -> DVec3 {
        self.center + (self.ref_axis * angle.cos() + self.y_axis() * angle.sin()) * self.radius
    }

    #[inline]
    pub fn start_point(&self) -> DVec3 {
        self.point_at_angle(self.start_angle)
    }

    #[inline]
    pub fn end_point(&self) -> DVec3 {
        self.point_at_angle(self.end_angle)
    }

    #[inline]
    pub fn is_full_circle(&self) -> bool {
        self.sweep() >= TAU - FULL_TURN_EPSILON
    }

    /// 点在圆弧局部坐标系中的极角，范围 (-π, π]。
    pub fn angle_of(&self, point: DVec3) -> f64 {
        let local = point - self.center;
        local.dot(self.y_axis()).atan2(local.dot(self.ref_axis))
    }

    pub fn to_nurbs(&self) -> Result<NurbsCurve3d, NurbsError> {
        NurbsCurve3d::from_conic_arc(
            self.center,
            self.ref_axis * self.radius,
            self.y_axis() * self.radius,
            self.start_angle,
            self.end_angle,
        )
    }

    pub fn sample_points(&self) -> Vec<DVec3> {
        let steps = sample_steps(self.sweep());
        (0..=steps)
            .map(|i| self.point_at_angle(self.start_angle + self.sweep() * i as f64 / steps as f64))
            .collect()
    }
}

fn normalized_angles(start: f64, end: f64) -> (f64, f64) {
    if end > start {
        return (start, end);
    }
    let sweep = match (end - start).rem_euclid(TAU) {
        s if s > 0.0 => s,
        _ => TAU,
    };
    let representable = ((start + sweep) - start - sweep).abs() <= FULL_TURN_EPSILON;
    let start = if representable { start } else { start.rem_euclid(TAU) };
    (start, start + sweep)
}

#[inline]
fn sample_steps(sweep: f64) -> usize {
    ((sweep.abs() / ARC_SAMPLE_STEP).ceil() as usize).clamp(2, MAX_ARC_SAMPLES)
}

/// 三维椭圆弧，`major_axis` 的长度即长半轴。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EllipArc3d {
    pub center: DVec3,
    pub normal: DVec3,
    pub major_axis: DVec3,
    pub ratio: f64,
    pub start_param: f64,
    pub end_param: f64,
}

impl EllipArc3d {
    #[inline]
    pub fn minor_axis(&self) -> DVec3 {
        self.normal.normalize_or(DVec3::Z).cross(self.major_axis) * self.ratio
    }

    #[inline]
    pub fn sweep(&self) -> f64 {
        self.end_param - self.start_param
    }

    #[inline]
    pub fn point_at(&self, param: f64) -> DVec3 {
        self.center + self.major_axis * param.cos() + self.minor_axis() * param.sin()
    }

    #[inline]
    pub fn start_point(&self) -> DVec3 {
        self.point_at(self.start_param)
    }

    #[inline]
    pub fn end_point(&self) -> DVec3 {
        self.point_at(self.end_param)
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.sweep() >= TAU - FULL_TURN_EPSILON
    }

    pub fn to_nurbs(&self) -> Result<NurbsCurve3d, NurbsError> {
        NurbsCurve3d::from_conic_arc(
            self.center,
            self.major_axis,
            self.minor_axis(),
            self.start_param,
            self.end_param,
        )
    }

    pub fn sample_points(&self) -> Vec<DVec3> {
        let steps = sample_steps(self.sweep());
        (0..=steps)
            .map(|i| self.point_at(self.start_param + self.sweep() * i as f64 / steps as f64))
            .collect()
    }
}

/// 多段线顶点（OCS 坐标）。`bulge` 描述到下一顶点的圆弧段。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolylineVertex2d {
    pub point: DVec2,
    pub bulge: f64,
    pub start_width: f64,
    pub end_width: f64,
    pub identifier: i32,
}

impl PolylineVertex2d {
    #[inline]
    pub fn new(point: DVec2) -> Self {
        Self {
            point,
            bulge: 0.0,
            start_width: 0.0,
            end_width: 0.0,
            identifier: 0,
        }
    }

    #[inline]
    pub fn with_bulge(point: DVec2, bulge: f64) -> Self {
        Self {
            bulge,
            ..Self::new(point)
        }
    }
}

/// 凸度圆弧段：二维圆心、半径、起始角与带符号扫掠角。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BulgeArc {
    pub center: DVec2,
    pub radius: f64,
    pub start_angle: f64,
    pub sweep: f64,
}

impl BulgeArc {
    /// 凸度接近 0 或弦长退化时返回 None（按直线处理）。
    pub fn from_bulge(start: DVec2, end: DVec2, bulge: f64) -> Option<Self> {
        if bulge.abs() <= 1e-12 {
            return None;
        }
        let chord = end - start;
        let chord_length = chord.length();
        if chord_length <= f64::EPSILON {
            return None;
        }
        let sweep = 4.0 * bulge.atan();
        let radius = chord_length / (2.0 * (sweep / 2.0).sin().abs());
        // 圆心位于弦中垂线上，偏移量 = 弦长/2 · (1 - b²) / (2b)
        let offset = chord_length * (1.0 - bulge * bulge) / (4.0 * bulge);
        let center = (start + end) * 0.5 + chord.perp() / chord_length * offset;
        let start_dir = start - center;
        Some(Self {
            center,
            radius,
            start_angle: start_dir.y.atan2(start_dir.x),
            sweep,
        })
    }

    #[inline]
    pub fn point_at(&self, fraction: f64) -> DVec2 {
        let angle = self.start_angle + self.sweep * fraction;
        self.center + DVec2::new(angle.cos(), angle.sin()) * self.radius
    }
}

/// 轻量多段线（二维 OCS 顶点 + 标高 + 法向）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline2d {
    pub vertices: Vec<PolylineVertex2d>,
    pub constant_width: f64,
    pub elevation: f64,
    pub normal: DVec3,
    pub is_closed: bool,
}

impl Polyline2d {
    pub fn new(vertices: Vec<PolylineVertex2d>) -> Self {
        Self {
            vertices,
            constant_width: 0.0,
            elevation: 0.0,
            normal: DVec3::Z,
            is_closed: false,
        }
    }

    pub fn from_points(points: impl IntoIterator<Item = DVec2>) -> Self {
        Self::new(points.into_iter().map(PolylineVertex2d::new).collect())
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn to_world(&self, point: DVec2) -> DVec3 {
        ocs_to_world(point, self.elevation, self.normal)
    }

    pub fn start_point(&self) -> Option<DVec3> {
        self.vertices.first().map(|v| self.to_world(v.point))
    }

    pub fn end_point(&self) -> Option<DVec3> {
        if self.is_closed {
            return self.start_point();
        }
        self.vertices.last().map(|v| self.to_world(v.point))
    }

    /// 段数：闭合时包含首尾相连的一段。
    pub fn segment_count(&self) -> usize {
        match self.vertices.len() {
            0 | 1 => 0,
            n if self.is_closed => n,
            n => n - 1,
        }
    }

    fn segment(&self, index: usize) -> (PolylineVertex2d, PolylineVertex2d) {
        let start = self.vertices[index];
        let end = self.vertices[(index + 1) % self.vertices.len()];
        (start, end)
    }

    /// 重置为给定数量的顶点，多余的截断、不足的补零。
    pub fn reset_vertices(&mut self, count: usize) {
        self.vertices
            .resize(count, PolylineVertex2d::new(DVec2::ZERO));
    }

    pub fn has_width(&self) -> bool {
        self.vertices
            .iter()
            .any(|v| v.start_width != 0.0 || v.end_width != 0.0)
    }

    pub fn has_bulges(&self) -> bool {
        self.vertices.iter().any(|v| v.bulge != 0.0)
    }

    pub fn to_nurbs(&self) -> Result<NurbsCurve3d, NurbsError> {
        let mut joined: Option<NurbsCurve3d> = None;
        for index in 0..self.segment_count() {
            let (start, end) = self.segment(index);
            let piece = match BulgeArc::from_bulge(start.point, end.point, start.bulge) {
                Some(arc) => self.bulge_arc_to_world(&arc).to_nurbs()?,
                None => NurbsCurve3d::from_line(self.to_world(start.point), self.to_world(end.point))?,
            };
            joined = Some(match joined {
                None => piece,
                Some(acc) => acc
                    .join_with(&piece, Tolerance::new(1e-8, 1e-8))
                    .map_err(|err| NurbsError::InvalidDefinition(err.to_string()))?,
            });
        }
        joined.ok_or_else(|| NurbsError::InvalidDefinition("polyline has no segments".to_string()))
    }

    /// 把带符号扫掠的凸度圆弧转成 `end > start` 的三维圆弧；顺时针段改用反向法向。
    pub fn bulge_arc_to_world(&self, arc: &BulgeArc) -> CircArc3d {
        let center = self.to_world(arc.center);
        if arc.sweep > 0.0 {
            let mut world = CircArc3d::new(center, self.normal, arc.radius, arc.start_angle, arc.start_angle + arc.sweep);
            world.end_angle = world.start_angle + arc.sweep;
            world
        } else {
            let (ax, _, n) = ocs_axes(self.normal);
            CircArc3d {
                center,
                normal: -n,
                ref_axis: ax,
                radius: arc.radius,
                start_angle: -arc.start_angle,
                end_angle: -arc.start_angle - arc.sweep,
            }
        }
    }

    pub fn sample_points(&self) -> Vec<DVec3> {
        let mut points: Vec<DVec3> = Vec::new();
        for index in 0..self.segment_count() {
            let (start, end) = self.segment(index);
            let segment = match BulgeArc::from_bulge(start.point, end.point, start.bulge) {
                Some(arc) => self.bulge_arc_to_world(&arc).sample_points(),
                None => vec![self.to_world(start.point), self.to_world(end.point)],
            };
            let skip = usize::from(!points.is_empty());
            points.extend(segment.into_iter().skip(skip));
        }
        if points.is_empty() {
            points.extend(self.vertices.iter().map(|v| self.to_world(v.point)));
        }
        points
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline3d {
    pub points: Vec<DVec3>,
    pub is_closed: bool,
}

impl Polyline3d {
    pub fn new(points: Vec<DVec3>) -> Self {
        Self {
            points,
            is_closed: false,
        }
    }
}

/// 复合曲线，子曲线首尾相接。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeCurve3d {
    pub curves: Vec<Curve>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Curve {
    Line(LineSeg3d),
    Arc(CircArc3d),
    Ellipse(EllipArc3d),
    Polyline(Polyline2d),
    Polyline3d(Polyline3d),
    Spline(NurbsCurve3d),
    Composite(CompositeCurve3d),
}

impl Curve {
    pub fn kind(&self) -> CurveKind {
        match self {
            Curve::Line(_) => CurveKind::Line,
            Curve::Arc(_) => CurveKind::Arc,
            Curve::Ellipse(_) => CurveKind::Ellipse,
            Curve::Polyline(_) => CurveKind::Polyline,
            Curve::Polyline3d(_) => CurveKind::Polyline3d,
            Curve::Spline(_) => CurveKind::Spline,
            Curve::Composite(_) => CurveKind::Composite,
        }
    }

    /// 起点。空多段线或空复合曲线返回 None。
    pub fn start_point(&self) -> Option<DVec3> {
        match self {
            Curve::Line(line) => Some(line.start),
            Curve::Arc(arc) => Some(arc.start_point()),
            Curve::Ellipse(ellipse) => Some(ellipse.start_point()),
            Curve::Polyline(polyline) => polyline.start_point(),
            Curve::Polyline3d(polyline) => polyline.points.first().copied(),
            Curve::Spline(spline) => Some(spline.start_point()),
            Curve::Composite(composite) => composite.curves.first().and_then(Curve::start_point),
        }
    }

    pub fn end_point(&self) -> Option<DVec3> {
        match self {
            Curve::Line(line) => Some(line.end),
            Curve::Arc(arc) => Some(arc.end_point()),
            Curve::Ellipse(ellipse) => Some(ellipse.end_point()),
            Curve::Polyline(polyline) => polyline.end_point(),
            Curve::Polyline3d(polyline) if polyline.is_closed => polyline.points.first().copied(),
            Curve::Polyline3d(polyline) => polyline.points.last().copied(),
            Curve::Spline(spline) => Some(spline.end_point()),
            Curve::Composite(composite) => composite.curves.last().and_then(Curve::end_point),
        }
    }

    pub fn is_closed(&self) -> bool {
        let tol = Tolerance::DEFAULT;
        match self {
            Curve::Line(_) => false,
            Curve::Arc(arc) => arc.is_full_circle(),
            Curve::Ellipse(ellipse) => ellipse.is_full(),
            Curve::Polyline(polyline) => polyline.is_closed,
            Curve::Polyline3d(polyline) => polyline.is_closed,
            Curve::Spline(spline) => spline.is_closed(tol),
            Curve::Composite(_) => match (self.start_point(), self.end_point()) {
                (Some(start), Some(end)) => tol.points_equal(start, end),
                _ => false,
            },
        }
    }

    pub fn planarity(&self, tol: Tolerance) -> Planarity {
        match self {
            Curve::Line(line) => Planarity::Linear {
                origin: line.start,
                direction: line.direction(),
            },
            Curve::Arc(arc) => Planarity::Planar {
                origin: arc.center,
                normal: arc.normal,
            },
            Curve::Ellipse(ellipse) => Planarity::Planar {
                origin: ellipse.center,
                normal: ellipse.normal,
            },
            Curve::Polyline(polyline) => Planarity::Planar {
                origin: polyline.to_world(DVec2::ZERO),
                normal: polyline.normal,
            },
            Curve::Polyline3d(polyline) => points_planarity(&polyline.points, tol),
            Curve::Spline(spline) => points_planarity(spline.control_points(), tol),
            Curve::Composite(_) => points_planarity(&self.sample_points(), tol),
        }
    }

    /// 精确或近似的 NURBS 形式；复合曲线逐段拼接。
    pub fn to_nurbs(&self) -> Result<NurbsCurve3d, NurbsError> {
        match self {
            Curve::Line(line) => NurbsCurve3d::from_line(line.start, line.end),
            Curve::Arc(arc) => arc.to_nurbs(),
            Curve::Ellipse(ellipse) => ellipse.to_nurbs(),
            Curve::Polyline(polyline) => polyline.to_nurbs(),
            Curve::Polyline3d(polyline) => {
                let mut points = polyline.points.clone();
                if polyline.is_closed {
                    if let Some(first) = points.first().copied() {
                        points.push(first);
                    }
                }
                NurbsCurve3d::from_points(&points)
            }
            Curve::Spline(spline) => Ok(spline.clone()),
            Curve::Composite(composite) => {
                let mut joined: Option<NurbsCurve3d> = None;
                for curve in &composite.curves {
                    let piece = curve.to_nurbs()?;
                    joined = Some(match joined {
                        None => piece,
                        Some(acc) => acc
                            .join_with(&piece, Tolerance::new(1e-8, 1e-8))
                            .map_err(|err| NurbsError::InvalidDefinition(err.to_string()))?,
                    });
                }
                joined.ok_or_else(|| {
                    NurbsError::InvalidDefinition("composite curve is empty".to_string())
                })
            }
        }
    }

    /// 离散点序列，首尾与曲线端点重合。
    pub fn sample_points(&self) -> Vec<DVec3> {
        match self {
            Curve::Line(line) => vec![line.start, line.end],
            Curve::Arc(arc) => arc.sample_points(),
            Curve::Ellipse(ellipse) => ellipse.sample_points(),
            Curve::Polyline(polyline) => polyline.sample_points(),
            Curve::Polyline3d(polyline) => polyline.points.clone(),
            Curve::Spline(spline) => spline.sample_points(16),
            Curve::Composite(composite) => {
                let mut points: Vec<DVec3> = Vec::new();
                for curve in &composite.curves {
                    let skip = usize::from(!points.is_empty());
                    points.extend(curve.sample_points().into_iter().skip(skip));
                }
                points
            }
        }
    }
}

/// 由点集推断平面性：全部共线为 Linear，存在偏离拟合平面的点为 NonPlanar。
pub fn points_planarity(points: &[DVec3], tol: Tolerance) -> Planarity {
    let Some(origin) = points.first().copied() else {
        return Planarity::NonPlanar;
    };
    let Some(direction) = points
        .iter()
        .map(|p| *p - origin)
        .find(|v| v.length() > tol.equal_point)
    else {
        return Planarity::Linear {
            origin,
            direction: DVec3::X,
        };
    };
    let normal = points
        .iter()
        .map(|p| direction.cross(*p - origin))
        .find(|n| n.length() > tol.equal_point * direction.length().max(1.0));
    let Some(normal) = normal.map(DVec3::normalize) else {
        return Planarity::Linear { origin, direction };
    };
    let planar = points
        .iter()
        .all(|p| (*p - origin).dot(normal).abs() <= tol.equal_point.max(1e-9));
    if planar {
        Planarity::Planar { origin, normal }
    } else {
        Planarity::NonPlanar
    }
}
