//! 对齐/转角标注的几何重算。

pub mod aligned;
pub mod style;

use glam::DVec2;
use serde::Serialize;

pub use aligned::{
    AlignedDimGeometry, AlignedDimInput, AlignedDimension, JogRejected, TextSide, recompute_aligned,
};
pub use style::{
    DimStyle, EstimatedText, FitMode, TextExtents, TextJustification, TextMetrics, TextMove,
    TextVertical,
};

/// 判断“同向/水平”等方向关系的阈值。
pub(crate) const EPS_CODIRECTIONAL: f64 = 1e-5;
/// 长度、偏移是否为零的阈值。
pub(crate) const EPS_ZERO: f64 = 1e-10;
/// 交点去重使用的阈值。
pub(crate) const EPS_TIGHT: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Segment2 {
    pub start: DVec2,
    pub end: DVec2,
}

impl Segment2 {
    #[inline]
    pub fn new(start: DVec2, end: DVec2) -> Self {
        Self { start, end }
    }

    #[inline]
    pub fn length(&self) -> f64 {
        self.start.distance(self.end)
    }

    #[inline]
    pub fn midpoint(&self) -> DVec2 {
        (self.start + self.end) * 0.5
    }
}

/// 文字阅读方向：朝右，竖直时朝上。
#[inline]
pub(crate) fn readable(direction: DVec2) -> DVec2 {
    if direction.x > EPS_ZERO || (direction.x.abs() <= EPS_ZERO && direction.y > 0.0) {
        direction
    } else {
        -direction
    }
}
