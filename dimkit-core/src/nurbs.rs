use std::f64::consts::FRAC_PI_2;

use glam::{DVec3, DVec4};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tolerance::Tolerance;

const KNOT_EPSILON: f64 = 1e-12;
const MAX_FLATTEN_DEPTH: u32 = 10;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NurbsError {
    #[error("invalid NURBS definition: {0}")]
    InvalidDefinition(String),
}

/// `join_with` 的失败原因，调用方可据此跳过当前曲线。
#[derive(Debug, Clone, PartialEq, Error)]
pub enum JoinError {
    #[error("curves are not contiguous (gap {gap})")]
    NotContiguous { gap: f64 },
    #[error("degenerate curve cannot be joined")]
    Degenerate,
}

/// 夹持（clamped）NURBS 曲线。端点即首末控制点。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NurbsCurve3d {
    degree: usize,
    knots: Vec<f64>,
    control_points: Vec<DVec3>,
    weights: Vec<f64>,
}

impl NurbsCurve3d {
    /// 校验并构造曲线。`weights` 为空时视为非有理曲线。
    pub fn new(
        degree: usize,
        knots: Vec<f64>,
        control_points: Vec<DVec3>,
        weights: Vec<f64>,
    ) -> Result<Self, NurbsError> {
        let invalid = |message: &str| Err(NurbsError::InvalidDefinition(message.to_string()));
        let count = control_points.len();
        if degree == 0 {
            return invalid("degree must be at least 1");
        }
        if count < degree + 1 {
            return invalid("not enough control points for degree");
        }
        if knots.len() != count + degree + 1 {
            return invalid("knot count must equal control points + degree + 1");
        }
        let weights = if weights.is_empty() {
            vec![1.0; count]
        } else {
            weights
        };
        if weights.len() != count {
            return invalid("weight count must equal control point count");
        }
        if weights.iter().any(|w| !(*w > 0.0) || !w.is_finite()) {
            return invalid("weights must be positive");
        }
        if knots.windows(2).any(|pair| pair[1] < pair[0]) {
            return invalid("knots must be non-decreasing");
        }
        let first = knots[0];
        let last = knots[knots.len() - 1];
        let clamped_start = knots[..=degree].iter().all(|k| (k - first).abs() <= KNOT_EPSILON);
        let clamped_end = knots[knots.len() - degree - 1..]
            .iter()
            .all(|k| (k - last).abs() <= KNOT_EPSILON);
        if !clamped_start || !clamped_end {
            return invalid("knot vector must be clamped");
        }
        if last - first <= KNOT_EPSILON {
            return invalid("empty parameter range");
        }
        let curve = Self {
            degree,
            knots,
            control_points,
            weights,
        };
        if curve
            .interior_breaks()
            .iter()
            .any(|u| curve.multiplicity(*u) > degree)
        {
            return invalid("interior knot multiplicity exceeds degree");
        }
        Ok(curve)
    }

    /// 折线转一次 NURBS，参数按顶点序号均匀分布。
    pub fn from_points(points: &[DVec3]) -> Result<Self, NurbsError> {
        if points.len() < 2 {
            return Err(NurbsError::InvalidDefinition(
                "polyline needs at least two points".to_string(),
            ));
        }
        let last = (points.len() - 1) as f64;
        let mut knots = Vec::with_capacity(points.len() + 2);
        knots.push(0.0);
        knots.extend((0..points.len()).map(|i| i as f64));
        knots.push(last);
        Self::new(1, knots, points.to_vec(), Vec::new())
    }

    #[inline]
    pub fn from_line(start: DVec3, end: DVec3) -> Result<Self, NurbsError> {
        Self::from_points(&[start, end])
    }

    /// 以 `center + u·cos(t) + v·sin(t)` 描述的圆锥弧（圆弧、椭圆弧）精确转换为二次有理曲线，
    /// 每段跨度不超过 90°。
    pub fn from_conic_arc(
        center: DVec3,
        u: DVec3,
        v: DVec3,
        start: f64,
        end: f64,
    ) -> Result<Self, NurbsError> {
        let sweep = end - start;
        if !(sweep > KNOT_EPSILON) {
            return Err(NurbsError::InvalidDefinition(
                "arc sweep must be positive".to_string(),
            ));
        }
        let segments = ((sweep / FRAC_PI_2) - 1e-9).ceil().max(1.0) as usize;
        let delta = sweep / segments as f64;
        let middle_weight = (delta / 2.0).cos();
        let point = |angle: f64| center + u * angle.cos() + v * angle.sin();

        let mut control_points = Vec::with_capacity(2 * segments + 1);
        let mut weights = Vec::with_capacity(2 * segments + 1);
        control_points.push(point(start));
        weights.push(1.0);
        for index in 0..segments {
            let a0 = start + delta * index as f64;
            let mid = a0 + delta / 2.0;
            control_points.push(center + (u * mid.cos() + v * mid.sin()) / middle_weight);
            weights.push(middle_weight);
            control_points.push(point(a0 + delta));
            weights.push(1.0);
        }

        let mut knots = vec![0.0; 3];
        for index in 1..segments {
            let knot = index as f64 / segments as f64;
            knots.push(knot);
            knots.push(knot);
        }
        knots.extend([1.0; 3]);
        Self::new(2, knots, control_points, weights)
    }

    #[inline]
    pub fn degree(&self) -> usize {
        self.degree
    }

    #[inline]
    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    #[inline]
    pub fn control_points(&self) -> &[DVec3] {
        &self.control_points
    }

    #[inline]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn is_rational(&self) -> bool {
        let first = self.weights[0];
        self.weights.iter().any(|w| (w - first).abs() > KNOT_EPSILON)
    }

    #[inline]
    pub fn param_range(&self) -> (f64, f64) {
        (self.knots[0], self.knots[self.knots.len() - 1])
    }

    #[inline]
    pub fn start_point(&self) -> DVec3 {
        self.control_points[0]
    }

    #[inline]
    pub fn end_point(&self) -> DVec3 {
        self.control_points[self.control_points.len() - 1]
    }

    pub fn is_closed(&self, tol: Tolerance) -> bool {
        tol.points_equal(self.start_point(), self.end_point())
    }

    /// de Boor 算法（齐次坐标）求值，参数超界时截断到定义域。
    pub fn point_at(&self, u: f64) -> DVec3 {
        let (start, end) = self.param_range();
        let u = u.clamp(start, end);
        let p = self.degree;
        let span = self.find_span(u);
        let mut d: Vec<DVec4> = (0..=p)
            .map(|j| self.homogeneous_point(j + span - p))
            .collect();
        for r in 1..=p {
            for j in (r..=p).rev() {
                let i = j + span - p;
                let denom = self.knots[i + p + 1 - r] - self.knots[i];
                let alpha = if denom.abs() <= KNOT_EPSILON {
                    0.0
                } else {
                    (u - self.knots[i]) / denom
                };
                d[j] = d[j - 1] * (1.0 - alpha) + d[j] * alpha;
            }
        }
        let h = d[p];
        h.truncate() / h.w
    }

    /// 反转参数方向，几何形状不变。
    pub fn reversed(&self) -> Self {
        let (a, b) = self.param_range();
        Self {
            degree: self.degree,
            knots: self.knots.iter().rev().map(|k| a + b - k).collect(),
            control_points: self.control_points.iter().rev().copied().collect(),
            weights: self.weights.iter().rev().copied().collect(),
        }
    }

    /// Boehm 单次插入节点。
    pub fn insert_knot(&self, u: f64) -> Self {
        let p = self.degree;
        let span = self.find_span(u);
        let count = self.control_points.len();
        let mut points = Vec::with_capacity(count + 1);
        for i in 0..=count {
            let h = if i + p <= span {
                self.homogeneous_point(i)
            } else if i > span {
                self.homogeneous_point(i - 1)
            } else {
                let denom = self.knots[i + p] - self.knots[i];
                let alpha = if denom.abs() <= KNOT_EPSILON {
                    0.0
                } else {
                    (u - self.knots[i]) / denom
                };
                self.homogeneous_point(i) * alpha + self.homogeneous_point(i - 1) * (1.0 - alpha)
            };
            points.push(h);
        }
        let mut knots = self.knots.clone();
        knots.insert(span + 1, u);
        Self::from_homogeneous(p, knots, &points)
    }

    /// 升阶一次：先分解为 Bézier 段，逐段升阶后以 C0 拼接。
    pub fn elevated(&self) -> Self {
        let p = self.degree;
        let q = p + 1;
        let (breaks, segments) = self.bezier_segments();
        let mut points: Vec<DVec4> = Vec::with_capacity(segments.len() * q + 1);
        for (index, segment) in segments.iter().enumerate() {
            let mut raised = Vec::with_capacity(q + 1);
            raised.push(segment[0]);
            for i in 1..=p {
                let ratio = i as f64 / q as f64;
                raised.push(segment[i - 1] * ratio + segment[i] * (1.0 - ratio));
            }
            raised.push(segment[p]);
            let skip = usize::from(index > 0);
            points.extend(raised.into_iter().skip(skip));
        }

        let (start, end) = self.param_range();
        let mut knots = vec![start; q + 1];
        for u in &breaks {
            knots.extend(std::iter::repeat_n(*u, q));
        }
        knots.extend(std::iter::repeat_n(end, q + 1));
        Self::from_homogeneous(q, knots, &points)
    }

    pub fn elevated_to(&self, degree: usize) -> Self {
        let mut curve = self.clone();
        while curve.degree < degree {
            curve = curve.elevated();
        }
        curve
    }

    /// 把 `other` 接到当前曲线末端。两曲线阶次不同时先升阶，
    /// 权重整体缩放以保证连接点权重一致。
    pub fn join_with(&self, other: &NurbsCurve3d, tol: Tolerance) -> Result<Self, JoinError> {
        let (a0, a1) = self.param_range();
        let (b0, b1) = other.param_range();
        if a1 - a0 <= KNOT_EPSILON || b1 - b0 <= KNOT_EPSILON {
            return Err(JoinError::Degenerate);
        }
        let gap = self.end_point().distance(other.start_point());
        if gap > tol.equal_point {
            return Err(JoinError::NotContiguous { gap });
        }

        let degree = self.degree.max(other.degree);
        let left = self.elevated_to(degree);
        let right = other.elevated_to(degree);

        let scale = left.weights[left.weights.len() - 1] / right.weights[0];
        let delta = left.knots[left.knots.len() - 1] - right.knots[0];

        let mut knots = left.knots[..left.knots.len() - 1].to_vec();
        knots.extend(right.knots[degree + 1..].iter().map(|k| k + delta));
        let mut control_points = left.control_points.clone();
        control_points.extend_from_slice(&right.control_points[1..]);
        let mut weights = left.weights.clone();
        weights.extend(right.weights[1..].iter().map(|w| w * scale));

        Ok(Self {
            degree,
            knots,
            control_points,
            weights,
        })
    }

    /// 每个非空节点区间均匀取 `samples_per_span` 个点，末尾补终点。
    pub fn sample_points(&self, samples_per_span: usize) -> Vec<DVec3> {
        let samples = samples_per_span.max(1);
        let mut points = Vec::new();
        for (a, b) in self.spans() {
            for step in 0..samples {
                points.push(self.point_at(a + (b - a) * step as f64 / samples as f64));
            }
        }
        points.push(self.end_point());
        points
    }

    /// 自适应二分离散，弦高不超过 `chord_tolerance`。
    pub fn flatten(&self, chord_tolerance: f64) -> Vec<DVec3> {
        let tolerance = chord_tolerance.max(f64::EPSILON);
        let mut points = vec![self.start_point()];
        for (a, b) in self.spans() {
            let pa = self.point_at(a);
            let pb = self.point_at(b);
            self.subdivide(a, pa, b, pb, tolerance, 0, &mut points);
        }
        points
    }

    fn subdivide(
        &self,
        a: f64,
        pa: DVec3,
        b: f64,
        pb: DVec3,
        tolerance: f64,
        depth: u32,
        out: &mut Vec<DVec3>,
    ) {
        let mid = (a + b) / 2.0;
        let pm = self.point_at(mid);
        let deviation = distance_to_segment(pm, pa, pb);
        if depth >= MAX_FLATTEN_DEPTH || (depth >= 1 && deviation <= tolerance) {
            out.push(pb);
            return;
        }
        self.subdivide(a, pa, mid, pm, tolerance, depth + 1, out);
        self.subdivide(mid, pm, b, pb, tolerance, depth + 1, out);
    }

    fn spans(&self) -> Vec<(f64, f64)> {
        self.knots
            .windows(2)
            .filter(|pair| pair[1] - pair[0] > KNOT_EPSILON)
            .map(|pair| (pair[0], pair[1]))
            .collect()
    }

    fn interior_breaks(&self) -> Vec<f64> {
        let (start, end) = self.param_range();
        let mut breaks: Vec<f64> = Vec::new();
        for knot in &self.knots {
            if *knot - start > KNOT_EPSILON
                && end - *knot > KNOT_EPSILON
                && breaks
                    .last()
                    .is_none_or(|last| (*knot - *last).abs() > KNOT_EPSILON)
            {
                breaks.push(*knot);
            }
        }
        breaks
    }

    fn multiplicity(&self, u: f64) -> usize {
        self.knots
            .iter()
            .filter(|k| (**k - u).abs() <= KNOT_EPSILON)
            .count()
    }

    /// 插入内部节点直至重数等于阶次，返回断点与各段齐次控制点。
    fn bezier_segments(&self) -> (Vec<f64>, Vec<Vec<DVec4>>) {
        let p = self.degree;
        let breaks = self.interior_breaks();
        let mut curve = self.clone();
        for u in &breaks {
            while curve.multiplicity(*u) < p {
                curve = curve.insert_knot(*u);
            }
        }
        let points: Vec<DVec4> = (0..curve.control_points.len())
            .map(|i| curve.homogeneous_point(i))
            .collect();
        let segments = (0..=breaks.len())
            .map(|s| points[s * p..=s * p + p].to_vec())
            .collect();
        (breaks, segments)
    }

    fn find_span(&self, u: f64) -> usize {
        let p = self.degree;
        let n = self.control_points.len();
        if u >= self.knots[n] {
            return n - 1;
        }
        if u <= self.knots[p] {
            return p;
        }
        let mut low = p;
        let mut high = n;
        let mut mid = (low + high) / 2;
        while u < self.knots[mid] || u >= self.knots[mid + 1] {
            if u < self.knots[mid] {
                high = mid;
            } else {
                low = mid;
            }
            mid = (low + high) / 2;
        }
        mid
    }

    #[inline]
    fn homogeneous_point(&self, index: usize) -> DVec4 {
        let w = self.weights[index];
        (self.control_points[index] * w).extend(w)
    }

    fn from_homogeneous(degree: usize, knots: Vec<f64>, points: &[DVec4]) -> Self {
        Self {
            degree,
            knots,
            control_points: points.iter().map(|h| h.truncate() / h.w).collect(),
            weights: points.iter().map(|h| h.w).collect(),
        }
    }
}

/// 点到线段的最短距离。
pub fn distance_to_segment(point: DVec3, start: DVec3, end: DVec3) -> f64 {
    let chord = end - start;
    let length_squared = chord.length_squared();
    if length_squared <= f64::EPSILON {
        return point.distance(start);
    }
    let t = ((point - start).dot(chord) / length_squared).clamp(0.0, 1.0);
    point.distance(start + chord * t)
}

#[cfg(test)]
mod tests {
    use std::f64::consts::{FRAC_PI_2, PI};

    use super::*;

    fn quarter_circle() -> NurbsCurve3d {
        NurbsCurve3d::from_conic_arc(DVec3::ZERO, DVec3::X * 2.0, DVec3::Y * 2.0, 0.0, FRAC_PI_2)
            .expect("quarter arc")
    }

    #[test]
    fn conic_arc_points_stay_on_circle() {
        let arc = NurbsCurve3d::from_conic_arc(DVec3::ZERO, DVec3::X * 5.0, DVec3::Y * 5.0, 0.0, PI * 1.5)
            .expect("arc");
        assert_eq!(arc.degree(), 2);
        assert_eq!(arc.control_points().len(), 7);
        for step in 0..=20 {
            let point = arc.point_at(step as f64 / 20.0);
            assert!((point.length() - 5.0).abs() < 1e-9, "point {point:?} off circle");
        }
        assert!((arc.end_point() - DVec3::new(0.0, -5.0, 0.0)).length() < 1e-9);
    }

    #[test]
    fn invalid_definitions_are_rejected() {
        let err = NurbsCurve3d::new(2, vec![0.0, 0.0, 1.0, 1.0], vec![DVec3::ZERO, DVec3::X], Vec::new());
        assert!(matches!(err, Err(NurbsError::InvalidDefinition(_))));
        let unclamped = NurbsCurve3d::new(
            1,
            vec![0.0, 0.5, 1.0, 1.0],
            vec![DVec3::ZERO, DVec3::X],
            Vec::new(),
        );
        assert!(unclamped.is_err());
    }

    #[test]
    fn reversed_swaps_endpoints_and_keeps_shape() {
        let arc = quarter_circle();
        let reversed = arc.reversed();
        assert!((reversed.start_point() - arc.end_point()).length() < 1e-12);
        assert!((reversed.end_point() - arc.start_point()).length() < 1e-12);
        let mid = reversed.point_at(0.5);
        assert!((mid.length() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn knot_insertion_and_elevation_preserve_geometry() {
        let arc = quarter_circle();
        let inserted = arc.insert_knot(0.3);
        let elevated = arc.elevated();
        assert_eq!(inserted.control_points().len(), arc.control_points().len() + 1);
        assert_eq!(elevated.degree(), 3);
        for step in 0..=10 {
            let u = step as f64 / 10.0;
            let expected = arc.point_at(u);
            assert!((inserted.point_at(u) - expected).length() < 1e-9);
            assert!((elevated.point_at(u) - expected).length() < 1e-9);
        }
    }

    #[test]
    fn join_line_then_arc_is_continuous() {
        let line = NurbsCurve3d::from_line(DVec3::new(2.0, -3.0, 0.0), DVec3::new(2.0, 0.0, 0.0))
            .expect("line");
        let joined = line
            .join_with(&quarter_circle(), Tolerance::DEFAULT)
            .expect("contiguous join");
        assert_eq!(joined.degree(), 2);
        assert!((joined.start_point() - DVec3::new(2.0, -3.0, 0.0)).length() < 1e-12);
        assert!((joined.end_point() - DVec3::new(0.0, 2.0, 0.0)).length() < 1e-9);
        let (start, end) = joined.param_range();
        assert!((start - 0.0).abs() < 1e-12);
        assert!((end - 2.0).abs() < 1e-12);
        let on_arc = joined.point_at(1.5);
        assert!((on_arc.length() - 2.0).abs() < 1e-9);
        let on_line = joined.point_at(0.5);
        assert!((on_line.x - 2.0).abs() < 1e-9);
    }

    #[test]
    fn join_with_gap_fails() {
        let line = NurbsCurve3d::from_line(DVec3::ZERO, DVec3::X).expect("line");
        let other = NurbsCurve3d::from_line(DVec3::new(1.5, 0.0, 0.0), DVec3::new(2.0, 0.0, 0.0))
            .expect("line");
        let err = line.join_with(&other, Tolerance::DEFAULT).unwrap_err();
        assert!(matches!(err, JoinError::NotContiguous { gap } if (gap - 0.5).abs() < 1e-12));
    }

    #[test]
    fn flatten_respects_chord_tolerance() {
        let arc = quarter_circle();
        let points = arc.flatten(1e-3);
        assert!(points.len() > 4);
        for pair in points.windows(2) {
            let mid = (pair[0] + pair[1]) / 2.0;
            assert!(2.0 - mid.length() < 2e-3);
        }
        let sampled = arc.sample_points(8);
        assert_eq!(sampled.len(), 9);
    }
}
