//! 二维求交：直线/线段与线段、线段与圆弧。
//!
//! 角度一律按逆时针度量，圆弧区间约定 `end > start`。

use std::f64::consts::TAU;

use glam::DVec2;

use crate::tolerance::Tolerance;

/// 两条无限直线 `p + t·d` 与 `q + s·e` 的交点，平行时返回 None。
pub fn line_line(p: DVec2, d: DVec2, q: DVec2, e: DVec2) -> Option<DVec2> {
    let denom = d.perp_dot(e);
    if denom.abs() <= f64::EPSILON * d.length() * e.length() {
        return None;
    }
    let t = (q - p).perp_dot(e) / denom;
    Some(p + d * t)
}

/// 线段参数 `t` 是否落在 `[0, 1]` 内（两端各放宽 `slack`）。
#[inline]
fn within_unit(t: f64, slack: f64) -> bool {
    t >= -slack && t <= 1.0 + slack
}

/// 线段与线段求交，共线重叠视为无交点。
pub fn segment_segment(a0: DVec2, a1: DVec2, b0: DVec2, b1: DVec2, tol: Tolerance) -> Option<DVec2> {
    let d = a1 - a0;
    let e = b1 - b0;
    let denom = d.perp_dot(e);
    if denom.abs() <= tol.equal_vector * d.length() * e.length() {
        return None;
    }
    let t = (b0 - a0).perp_dot(e) / denom;
    let s = (b0 - a0).perp_dot(d) / denom;
    let slack_a = tol.equal_point / d.length().max(f64::EPSILON);
    let slack_b = tol.equal_point / e.length().max(f64::EPSILON);
    (within_unit(t, slack_a) && within_unit(s, slack_b)).then(|| a0 + d * t)
}

/// 线段与无限直线求交（射线、构造线用）；`ray` 为真时只取 `base` 前方。
pub fn segment_line(a0: DVec2, a1: DVec2, base: DVec2, direction: DVec2, ray: bool, tol: Tolerance) -> Option<DVec2> {
    let d = a1 - a0;
    let denom = d.perp_dot(direction);
    if denom.abs() <= tol.equal_vector * d.length() * direction.length() {
        return None;
    }
    let t = (base - a0).perp_dot(direction) / denom;
    let s = (base - a0).perp_dot(d) / denom;
    let slack = tol.equal_point / d.length().max(f64::EPSILON);
    if !within_unit(t, slack) || (ray && s < -tol.equal_point) {
        return None;
    }
    Some(a0 + d * t)
}

/// 把角度规范到 `[start, start + 2π)`。
#[inline]
pub fn normalize_angle_from(angle: f64, start: f64) -> f64 {
    let mut value = (angle - start).rem_euclid(TAU) + start;
    if value >= start + TAU {
        value -= TAU;
    }
    value
}

/// 角度是否落在逆时针圆弧 `[start, end]` 内。
pub fn angle_on_arc(angle: f64, start: f64, end: f64, tol: Tolerance) -> bool {
    if end - start >= TAU - tol.equal_vector {
        return true;
    }
    let value = normalize_angle_from(angle, start);
    value <= end + tol.equal_vector || value >= start + TAU - tol.equal_vector
}

/// 线段与圆弧求交，返回 0–2 个点，按线段参数排序。
pub fn segment_arc(
    a0: DVec2,
    a1: DVec2,
    center: DVec2,
    radius: f64,
    start_angle: f64,
    end_angle: f64,
    tol: Tolerance,
) -> Vec<DVec2> {
    let d = a1 - a0;
    let a = d.length_squared();
    if a <= f64::EPSILON || radius <= tol.equal_point {
        return Vec::new();
    }
    let f = a0 - center;
    let b = 2.0 * f.dot(d);
    let c = f.length_squared() - radius * radius;
    let discriminant = b * b - 4.0 * a * c;
    let tangent_band = 4.0 * a * 2.0 * radius * tol.equal_point;
    if discriminant < -tangent_band {
        return Vec::new();
    }
    let root = discriminant.max(0.0).sqrt();
    let roots: &[f64] = if root <= f64::EPSILON {
        &[-b / (2.0 * a)]
    } else {
        &[(-b - root) / (2.0 * a), (-b + root) / (2.0 * a)]
    };
    let slack = tol.equal_point / a.sqrt();
    roots
        .iter()
        .filter(|t| within_unit(**t, slack))
        .map(|t| a0 + d * *t)
        .filter(|p| {
            let local = *p - center;
            angle_on_arc(local.y.atan2(local.x), start_angle, end_angle, tol)
        })
        .collect()
}

/// 两圆弧求交，返回同时落在两段圆弧上的点。
pub fn arc_arc(
    first: (DVec2, f64, f64, f64),
    second: (DVec2, f64, f64, f64),
    tol: Tolerance,
) -> Vec<DVec2> {
    let (c0, r0, s0, e0) = first;
    let (c1, r1, s1, e1) = second;
    let offset = c1 - c0;
    let distance = offset.length();
    if distance <= tol.equal_point || distance > r0 + r1 + tol.equal_point || distance < (r0 - r1).abs() - tol.equal_point {
        return Vec::new();
    }
    let along = (r0 * r0 - r1 * r1 + distance * distance) / (2.0 * distance);
    let height = (r0 * r0 - along * along).max(0.0).sqrt();
    let axis = offset / distance;
    let base = c0 + axis * along;
    let candidates = if height <= tol.equal_point {
        vec![base]
    } else {
        vec![base + axis.perp() * height, base - axis.perp() * height]
    };
    candidates
        .into_iter()
        .filter(|p| {
            let a = *p - c0;
            let b = *p - c1;
            angle_on_arc(a.y.atan2(a.x), s0, e0, tol) && angle_on_arc(b.y.atan2(b.x), s1, e1, tol)
        })
        .collect()
}
