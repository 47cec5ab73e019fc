//! 箭头方向、尺寸线分段、尾线、文字截断与折弯符号。

use dimkit_core::intersect::segment_segment;
use dimkit_core::tolerance::Tolerance;
use glam::DVec2;
use thiserror::Error;
use tracing::{debug, trace};

use super::{AlignedDimGeometry, TextSide};
use crate::dimension::style::TextJustification;
use crate::dimension::{EPS_TIGHT, EPS_ZERO, Segment2};

const SEGMENT_TOLERANCE: Tolerance = Tolerance::new(EPS_ZERO, EPS_ZERO);

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum JogRejected {
    #[error("dimension line is not a single segment")]
    NoSingleDimLine,
    #[error("jog height is zero")]
    ZeroHeight,
    #[error("jog is too close to an extension line")]
    TooCloseToExtLine,
    #[error("jog overlaps the dimension text")]
    OverlapsText,
}

pub(super) fn calc_direction_arrows(mut g: AlignedDimGeometry) -> AlignedDimGeometry {
    let dir = g.dir_dim_line;
    let (mut arrow1_dir, mut arrow2_dir) = if g.arrows_inside {
        (-dir, dir)
    } else {
        (dir, -dir)
    };
    if g.style.flip_arrow1 {
        arrow1_dir = -arrow1_dir;
    }
    if g.style.flip_arrow2 {
        arrow2_dir = -arrow2_dir;
    }
    g.arrow1_dir = arrow1_dir;
    g.arrow2_dir = arrow2_dir;
    g
}

pub(super) fn calc_dim_lines_points(mut g: AlignedDimGeometry) -> AlignedDimGeometry {
    let draw_inside = g.arrows_inside || g.style.force_dim_line_inside;
    if !draw_inside || g.dim_line_length() <= EPS_ZERO {
        g.dim_lines = 0;
        return g;
    }
    let (suppress1, suppress2) = (g.style.suppress_dim_line1, g.style.suppress_dim_line2);
    if suppress1 && suppress2 {
        g.dim_lines = 0;
        return g;
    }
    let middle = (g.arrow1_pt + g.arrow2_pt) * 0.5;
    g.dim_line1 = Segment2::new(
        if suppress1 { middle } else { g.arrow1_pt },
        if suppress2 { middle } else { g.arrow2_pt },
    );
    g.dim_lines = 1;
    g
}

/// 文字位于尺寸界线外侧且没有引线时，尺寸线延伸到文字。
/// 文字压线时止于文字近边，在线上方或下方时延伸到文字远边。
pub(super) fn correct_dim_lines_points(mut g: AlignedDimGeometry) -> AlignedDimGeometry {
    if !g.leader.is_empty() {
        return g;
    }
    let side = match g.text_side {
        TextSide::Outside1 if !g.style.suppress_dim_line1 => 1,
        TextSide::Outside2 if !g.style.suppress_dim_line2 => 2,
        _ => return g,
    };
    let (along, _) = g.project(g.text_position);
    let half = g.text_extent_along(g.text_direction, g.dir_dim_line) / 2.0;
    let length = g.dim_line_length();
    let toward_text = if side == 1 { -1.0 } else { 1.0 };
    let edge = if g.text_on_dim_line {
        along - half * toward_text
    } else {
        along + half * toward_text
    };
    if (side == 2 && edge <= length + EPS_ZERO) || (side == 1 && edge >= -EPS_ZERO) {
        return g;
    }
    let reach = g.point_on_line(edge, 0.0);
    if g.dim_lines == 0 {
        g.dim_lines = 1;
        g.dim_line1 = if side == 1 {
            Segment2::new(reach, g.arrow1_pt)
        } else {
            Segment2::new(g.arrow2_pt, reach)
        };
    } else if side == 1 {
        g.dim_line1.start = reach;
    } else {
        g.dim_line1.end = reach;
    }
    trace!(side, edge, "尺寸线延伸到外侧文字");
    g
}

/// 箭头朝外放置且 DIMDLE 非零时，在箭头外侧补尾线。
pub(super) fn add_dim_line_tails(mut g: AlignedDimGeometry) -> AlignedDimGeometry {
    g.tail1 = None;
    g.tail2 = None;
    let extension = g.style.dim_line_extension;
    if extension <= EPS_ZERO || g.arrows_suppressed {
        return g;
    }
    for side in [1_u8, 2] {
        let suppressed = if side == 1 {
            g.style.suppress_dim_line1
        } else {
            g.style.suppress_dim_line2
        };
        if !g.arrow_outward(side) || suppressed {
            continue;
        }
        let text_on_this_side = g.leader.is_empty()
            && matches!(
                (side, g.text_side),
                (1, TextSide::Outside1) | (2, TextSide::Outside2)
            );
        if text_on_this_side {
            continue;
        }
        let over_this_ext_line = matches!(
            (side, g.style.justification),
            (1, TextJustification::OverExtLine1) | (2, TextJustification::OverExtLine2)
        );
        let length = if over_this_ext_line {
            extension
        } else {
            g.arrow_size(side) + extension
        };
        let (arrow, outward) = if side == 1 {
            (g.arrow1_pt, -g.dir_dim_line)
        } else {
            (g.arrow2_pt, g.dir_dim_line)
        };
        let tail = Some(Segment2::new(arrow, arrow + outward * length));
        if side == 1 {
            g.tail1 = tail;
        } else {
            g.tail2 = tail;
        }
    }
    g
}

/// 文字压在尺寸线上时，用文字框截断尺寸线。
pub(super) fn intersect_dim_line_with_text(mut g: AlignedDimGeometry) -> AlignedDimGeometry {
    if !g.text_on_dim_line || g.dim_lines != 1 {
        return g;
    }
    let line = g.dim_line1;
    let quad = g.text_quad();
    let mut hits: Vec<DVec2> = Vec::with_capacity(4);
    for i in 0..4 {
        let Some(hit) = segment_segment(line.start, line.end, quad[i], quad[(i + 1) % 4], SEGMENT_TOLERANCE) else {
            continue;
        };
        if hits.iter().all(|known| known.distance(hit) > EPS_TIGHT) {
            hits.push(hit);
        }
    }
    if hits.len() < 2 {
        return g;
    }
    let arrow1 = g.arrow1_pt;
    hits.sort_by(|a, b| a.distance(arrow1).total_cmp(&b.distance(arrow1)));
    let (near, far) = (hits[0], hits[hits.len() - 1]);
    g.dim_line1 = Segment2::new(near, line.start);
    g.dim_line2 = Segment2::new(far, line.end);
    g.dim_lines = 2;
    trace!(near = ?near, far = ?far, "尺寸线被文字截断");
    g
}

/// 在 `at` 在尺寸线上的投影处插入折弯符号，尺寸线在符号两端断开。
pub(super) fn make_jog_symbol(g: &AlignedDimGeometry, at: DVec2) -> Result<AlignedDimGeometry, JogRejected> {
    if g.dim_lines != 1 {
        debug!(dim_lines = g.dim_lines, "折弯符号被拒绝");
        return Err(JogRejected::NoSingleDimLine);
    }
    let height = g.style.jog_height();
    if height <= EPS_ZERO {
        return Err(JogRejected::ZeroHeight);
    }
    let half = height / 2.0;
    let (along, _) = g.project(at);
    let length = g.dim_line_length();
    let reserve1 = if g.arrows_inside { g.style.arrow_size1 } else { 0.0 };
    let reserve2 = if g.arrows_inside { g.style.arrow_size2 } else { 0.0 };
    let line = g.dim_line1;
    let (line_a, _) = g.project(line.start);
    let (line_b, _) = g.project(line.end);
    let (line_lo, line_hi) = (line_a.min(line_b), line_a.max(line_b));
    if along - half < reserve1.max(line_lo) || along + half > (length - reserve2).min(line_hi) {
        debug!(along, "折弯符号离尺寸界线过近");
        return Err(JogRejected::TooCloseToExtLine);
    }

    let (text_along, text_offset) = g.project(g.text_position);
    let text_half_along = g.text_extent_along(g.text_direction, g.dir_dim_line) / 2.0;
    let text_half_across = g.text_extent_along(g.text_direction, g.above_normal()) / 2.0;
    if text_offset.abs() < text_half_across + half && (text_along - along).abs() < text_half_along + half {
        debug!(along, "折弯符号与文字重叠");
        return Err(JogRejected::OverlapsText);
    }

    let dir = g.dir_dim_line;
    let up = g.above_normal();
    let base = g.point_on_line(along, 0.0);
    let points = [
        base - dir * half,
        base - dir * (height / 6.0) + up * half,
        base + dir * (height / 6.0) - up * half,
        base + dir * half,
    ];
    let mut next = g.clone();
    next.dim_line1 = Segment2::new(points[0], line.start);
    next.dim_line2 = Segment2::new(points[3], line.end);
    next.dim_lines = 2;
    next.jog = Some(points);
    Ok(next)
}
