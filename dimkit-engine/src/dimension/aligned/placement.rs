//! 预处理、适配判断与文字定位（自动与用户指定三种模式）。

use glam::DVec2;
use tracing::{debug, trace};

use dimkit_core::intersect::line_line;

use super::{AlignedDimGeometry, TextSide};
use crate::dimension::style::{DimStyle, FitMode, TextJustification, TextVertical};
use crate::dimension::{EPS_ZERO, Segment2, readable};

/// 文字偏离尺寸线超过“文字净空”的该比例即视为远离尺寸线。
const FAR_FROM_DIM_LINE_RATIO: f64 = 2.0 / 3.0;
/// 文字到最近箭头的距离超过文字长度的该比例即视为远离箭头。
const FAR_FROM_ARROW_RATIO: f64 = 0.7;

pub(super) fn preprocess_data(mut g: AlignedDimGeometry) -> AlignedDimGeometry {
    let base_dir = match g.rotation {
        Some(angle) => DVec2::from_angle(angle),
        None => (g.x_line2_pt - g.x_line1_pt)
            .try_normalize()
            .unwrap_or(DVec2::X),
    };
    let mut ext_dir = if AlignedDimGeometry::is_zero(g.oblique) {
        base_dir.perp()
    } else {
        DVec2::from_angle(g.oblique)
    };
    if ext_dir.perp_dot(base_dir).abs() < EPS_ZERO {
        ext_dir = base_dir.perp();
    }

    g.arrow1_pt = line_line(g.x_line1_pt, ext_dir, g.dim_line_def_pt, base_dir).unwrap_or(g.dim_line_def_pt);
    g.arrow2_pt = line_line(g.x_line2_pt, ext_dir, g.dim_line_def_pt, base_dir).unwrap_or(g.dim_line_def_pt);
    g.dir_dim_line = (g.arrow2_pt - g.arrow1_pt)
        .try_normalize()
        .unwrap_or(base_dir);

    let toward = if (g.arrow1_pt - g.x_line1_pt).length() > EPS_ZERO {
        g.arrow1_pt - g.x_line1_pt
    } else {
        g.arrow2_pt - g.x_line2_pt
    };
    g.dir_ext_line = if toward.dot(ext_dir) < 0.0 { -ext_dir } else { ext_dir };
    g.dim_line_is_hor = g.dir_dim_line.y.abs() < EPS_ZERO;
    rebuild_ext_lines(&mut g);

    g.text_direction = g.text_direction_for(true);
    g.use_rotate = g.text_parallel_to_dim_line(g.text_direction);
    trace!(
        dir_dim_line = ?g.dir_dim_line,
        dir_ext_line = ?g.dir_ext_line,
        horizontal = g.dim_line_is_hor,
        "标注预处理完成"
    );
    g
}

/// 尺寸界线：自定义点偏移 DIMEXO 起，越过箭头点 DIMEXE 止。
fn rebuild_ext_lines(g: &mut AlignedDimGeometry) {
    let style = g.style;
    let fallback = g.dir_ext_line;
    let build = |origin: DVec2, arrow: DVec2| {
        let dir = (arrow - origin).try_normalize().unwrap_or(fallback);
        Segment2::new(
            origin + dir * style.ext_line_offset,
            arrow + dir * style.ext_line_extension,
        )
    };
    g.ext_line1 = (!style.suppress_ext_line1).then(|| build(g.x_line1_pt, g.arrow1_pt));
    g.ext_line2 = (!style.suppress_ext_line2).then(|| build(g.x_line2_pt, g.arrow2_pt));
}

/// 判断文字与箭头能否放在两尺寸界线之间，返回 (文字在内, 箭头在内)。
pub fn fit_text_and_arrows(separation: f64, text_length: f64, arrows: f64, style: &DimStyle) -> (bool, bool) {
    let both_fit = text_length + arrows <= separation + EPS_ZERO;
    if style.force_text_inside {
        return (true, both_fit);
    }
    if both_fit {
        return (true, true);
    }
    let text_fits = text_length <= separation + EPS_ZERO;
    let arrows_fit = arrows <= separation + EPS_ZERO;
    match style.fit {
        FitMode::BothOutside => (false, false),
        FitMode::ArrowsFirst => (text_fits, false),
        FitMode::TextFirst => (false, arrows_fit),
        FitMode::BestFit if text_fits => (true, false),
        FitMode::BestFit => (false, arrows_fit),
    }
}

fn arrows_total(g: &AlignedDimGeometry) -> f64 {
    g.style.arrow_size1 + g.style.arrow_size2
}

fn set_text_direction(g: &mut AlignedDimGeometry, inside: bool) {
    g.text_direction = g.text_direction_for(inside);
    g.use_rotate = g.text_parallel_to_dim_line(g.text_direction);
}

fn set_arrows(g: &mut AlignedDimGeometry, arrows_inside: bool) {
    g.arrows_inside = arrows_inside;
    g.arrows_suppressed = !arrows_inside && g.style.suppress_outside_arrows;
}

pub(super) fn adjust_text_and_arrows_place(mut g: AlignedDimGeometry) -> AlignedDimGeometry {
    let separation = g.dim_line_length();
    let arrows = arrows_total(&g);
    let over_ext_line = matches!(
        g.style.justification,
        TextJustification::OverExtLine1 | TextJustification::OverExtLine2
    );
    let (text_inside, arrows_inside) = if over_ext_line {
        (false, arrows <= separation + EPS_ZERO)
    } else {
        let inside_dir = g.text_direction_for(true);
        let text_length = g.text_extent_along(inside_dir, g.dir_dim_line);
        fit_text_and_arrows(separation, text_length, arrows, &g.style)
    };
    g.text_inside = text_inside;
    set_arrows(&mut g, arrows_inside);
    set_text_direction(&mut g, text_inside);
    debug!(separation, text_inside, arrows_inside, "文字与箭头适配");
    g
}

pub(super) fn adjust_text_location(mut g: AlignedDimGeometry) -> AlignedDimGeometry {
    match g.style.justification {
        TextJustification::OverExtLine1 => place_over_ext_line(&mut g, 1),
        TextJustification::OverExtLine2 => place_over_ext_line(&mut g, 2),
        justification => {
            let length = g.dim_line_length();
            let half = g.text_extent_along(g.text_direction, g.dir_dim_line) / 2.0;
            let (along, side) = if g.text_inside {
                let inner1 = if g.arrows_inside { g.style.arrow_size1 } else { 0.0 };
                let inner2 = if g.arrows_inside { g.style.arrow_size2 } else { 0.0 };
                let along = match justification {
                    TextJustification::NextToExtLine1 => inner1 + half,
                    TextJustification::NextToExtLine2 => length - inner2 - half,
                    _ => length / 2.0,
                };
                (along, TextSide::Inside)
            } else {
                let outer = |side: u8| {
                    if g.arrows_inside || g.arrows_suppressed {
                        0.0
                    } else {
                        g.arrow_size(side)
                    }
                };
                if justification == TextJustification::NextToExtLine1 {
                    (-(outer(1) + half), TextSide::Outside1)
                } else {
                    (length + outer(2) + half, TextSide::Outside2)
                }
            };
            let offset = g.text_offset();
            g.text_position = g.point_on_line(along, offset);
            g.text_side = side;
            g.text_on_dim_line = AlignedDimGeometry::is_zero(offset);
        }
    }
    trace!(position = ?g.text_position, side = ?g.text_side, "文字自动定位");
    g
}

/// 文字放在尺寸界线延长方向上，位于尺寸线之外。
fn place_over_ext_line(g: &mut AlignedDimGeometry, side: u8) {
    let (origin, arrow) = if side == 1 {
        (g.x_line1_pt, g.arrow1_pt)
    } else {
        (g.x_line2_pt, g.arrow2_pt)
    };
    let ext_dir = (arrow - origin).try_normalize().unwrap_or(g.dir_ext_line);
    g.text_direction = match g.text_rotation {
        Some(angle) => DVec2::from_angle(angle),
        None if g.style.text_outside_horizontal => DVec2::X,
        None => readable(ext_dir),
    };
    g.use_rotate = g.text_parallel_to_dim_line(g.text_direction);

    let beside = readable(ext_dir).perp();
    let clearance = g.text_extent_along(g.text_direction, beside) / 2.0;
    let offset = match g.style.vertical {
        TextVertical::Centered => 0.0,
        TextVertical::Below => -clearance,
        TextVertical::Above | TextVertical::Jis | TextVertical::Outside => clearance,
    };
    let along_ext = g.style.ext_line_extension + g.text_extent_along(g.text_direction, ext_dir) / 2.0;
    g.text_position = arrow + ext_dir * along_ext + beside * offset;
    g.text_inside = false;
    g.text_on_dim_line = false;
    g.text_side = if side == 1 {
        TextSide::OverExtLine1
    } else {
        TextSide::OverExtLine2
    };
}

/// 按沿线位置把用户文字归入内侧或两侧外部。
fn test_text_location0(g: &AlignedDimGeometry, along: f64) -> TextSide {
    if along < -EPS_ZERO {
        TextSide::Outside1
    } else if along > g.dim_line_length() + EPS_ZERO {
        TextSide::Outside2
    } else {
        TextSide::Inside
    }
}

/// 文字放在内侧时的箭头去留。
fn arrows_fit_with_text(g: &AlignedDimGeometry, text_inside: bool) -> bool {
    let separation = g.dim_line_length();
    let arrows = arrows_total(g);
    if text_inside {
        let text_length = g.text_extent_along(g.text_direction, g.dir_dim_line);
        text_length + arrows <= separation + EPS_ZERO
    } else {
        arrows <= separation + EPS_ZERO
    }
}

/// DIMTMOVE = 0：尺寸线随文字移动。
pub(super) fn adjust_user_def_text0(mut g: AlignedDimGeometry) -> AlignedDimGeometry {
    let Some(point) = g.user_text_pt else {
        return g;
    };
    let (along, offset) = g.project(point);
    let side = test_text_location0(&g, along);
    g.text_inside = side == TextSide::Inside;
    let text_inside = g.text_inside;
    set_text_direction(&mut g, text_inside);
    let arrows_inside = arrows_fit_with_text(&g, g.text_inside);
    set_arrows(&mut g, arrows_inside);

    let shift = offset - g.text_offset();
    let slope = g.dir_ext_line.dot(g.above_normal());
    if !AlignedDimGeometry::is_zero(shift) && slope.abs() > EPS_ZERO {
        let delta = g.dir_ext_line * (shift / slope);
        g.arrow1_pt += delta;
        g.arrow2_pt += delta;
        g.dim_line_def_pt += delta;
        rebuild_ext_lines(&mut g);
    }
    g.text_position = point;
    g.text_side = side;
    g.text_on_dim_line = AlignedDimGeometry::is_zero(g.text_offset());
    debug!(shift, side = ?side, "尺寸线随文字移动");
    g
}

/// 用户文字在 DIMTMOVE = 1 下的三种引线形态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LeaderLocation {
    /// 文字足够靠近尺寸线，吸附回去。
    OnDimLine,
    /// 文字与尺寸线共线，作为尺寸线延长段上的文字。
    TextLine,
    /// 文字在两尺寸界线之间的上方或下方，引线落到尺寸线中点。
    DimLineMiddle,
    /// 文字在尺寸界线外，引线连到最近的箭头或尺寸线延长线。
    NearestArrow,
}

fn test_text_location1(g: &mut AlignedDimGeometry, point: DVec2) -> LeaderLocation {
    let (along, offset) = g.project(point);
    let length = g.dim_line_length();
    let within = (-EPS_ZERO..=length + EPS_ZERO).contains(&along);

    set_text_direction(g, within);
    let expected = g.text_offset();
    let clearance = g.text_clearance(g.text_direction);
    if within && (offset - expected).abs() <= clearance {
        return LeaderLocation::OnDimLine;
    }

    set_text_direction(g, false);
    let clearance = g.text_clearance(g.text_direction);
    g.is_txt_pos_far_from_dim_line = offset.abs() > FAR_FROM_DIM_LINE_RATIO * clearance;
    let text_length = g.text_extent_along(g.text_direction, g.text_direction);
    let nearest = point.distance(g.arrow1_pt).min(point.distance(g.arrow2_pt));
    g.is_txt_pos_far_from_arrow_point = nearest > FAR_FROM_ARROW_RATIO * text_length;

    if !g.is_txt_pos_far_from_dim_line {
        LeaderLocation::TextLine
    } else if within {
        LeaderLocation::DimLineMiddle
    } else {
        LeaderLocation::NearestArrow
    }
}

/// DIMTMOVE = 1：文字离开尺寸线时加引线。
pub(super) fn adjust_user_def_text1(mut g: AlignedDimGeometry) -> AlignedDimGeometry {
    let Some(point) = g.user_text_pt else {
        return g;
    };
    let location = test_text_location1(&mut g, point);
    let (along, _) = g.project(point);
    match location {
        LeaderLocation::OnDimLine => {
            g.text_inside = true;
            let arrows_inside = arrows_fit_with_text(&g, true);
            set_arrows(&mut g, arrows_inside);
            let offset = g.text_offset();
            g.text_position = g.point_on_line(along, offset);
            g.text_on_dim_line = AlignedDimGeometry::is_zero(offset);
            g.text_side = TextSide::Inside;
        }
        LeaderLocation::TextLine => make_leader_as_text_line(&mut g, along),
        LeaderLocation::DimLineMiddle => {
            let target = g.point_on_line(g.dim_line_length() / 2.0, 0.0);
            make_leader_on_dim_line(&mut g, point, target);
        }
        LeaderLocation::NearestArrow => make_leader(&mut g, point),
    }
    debug!(location = ?location, "用户文字引线处理");
    g
}

/// 文字落在尺寸线延长线上：不画引线，尺寸线延伸到文字边缘。
fn make_leader_as_text_line(g: &mut AlignedDimGeometry, along: f64) {
    let side = test_text_location0(g, along);
    g.text_inside = side == TextSide::Inside;
    set_text_direction(g, g.text_inside);
    let arrows_inside = arrows_fit_with_text(g, g.text_inside);
    set_arrows(g, arrows_inside);
    g.text_position = g.point_on_line(along, 0.0);
    g.text_on_dim_line = true;
    g.text_side = side;
    g.leader.clear();
}

/// 引线从 `target` 出发，经水平落脚段接到文字靠近 `target` 的一侧。
fn leader_points(g: &AlignedDimGeometry, point: DVec2, target: DVec2) -> Vec<DVec2> {
    let half = g.text_extent_along(g.text_direction, g.text_direction) / 2.0;
    let side = if (target - point).dot(g.text_direction) < 0.0 {
        -1.0
    } else {
        1.0
    };
    let attach = point + g.text_direction * (half * side);
    let landing_length = g.style.arrow_size1.max(g.style.arrow_size2);
    let landing = attach + g.text_direction * (landing_length * side);
    vec![target, landing, attach]
}

fn detach_text(g: &mut AlignedDimGeometry, point: DVec2) {
    g.text_inside = false;
    let arrows_inside = arrows_fit_with_text(g, false);
    set_arrows(g, arrows_inside);
    g.text_position = point;
    g.text_on_dim_line = false;
    g.text_side = TextSide::Free;
}

/// 引线斜接到尺寸线上的一点。
fn make_leader_on_dim_line(g: &mut AlignedDimGeometry, point: DVec2, target: DVec2) {
    detach_text(g, point);
    g.leader = leader_points(g, point, target);
}

/// 引线连到最近的箭头；文字贴近箭头时改接到尺寸线延长线上的垂足。
fn make_leader(g: &mut AlignedDimGeometry, point: DVec2) {
    detach_text(g, point);
    let target = if g.is_txt_pos_far_from_arrow_point {
        if point.distance(g.arrow1_pt) <= point.distance(g.arrow2_pt) {
            g.arrow1_pt
        } else {
            g.arrow2_pt
        }
    } else {
        let (along, _) = g.project(point);
        g.point_on_line(along, 0.0)
    };
    g.leader = leader_points(g, point, target);
}

/// DIMTMOVE = 2：文字自由放置，不移动尺寸线也不加引线。
pub(super) fn adjust_user_def_text2(mut g: AlignedDimGeometry) -> AlignedDimGeometry {
    let Some(point) = g.user_text_pt else {
        return g;
    };
    let (along, offset) = g.project(point);
    let side = test_text_location2(&mut g, along, offset);
    g.text_inside = side == TextSide::Inside;
    let arrows_inside = arrows_fit_with_text(&g, g.text_inside);
    set_arrows(&mut g, arrows_inside);
    g.text_position = point;
    g.text_side = side;
    trace!(side = ?side, on_line = g.text_on_dim_line, "文字自由放置");
    g
}

/// 文字框与尺寸线（含延长到文字的部分）重叠时视为压在尺寸线上。
fn test_text_location2(g: &mut AlignedDimGeometry, along: f64, offset: f64) -> TextSide {
    let length = g.dim_line_length();
    let within = (-EPS_ZERO..=length + EPS_ZERO).contains(&along);
    set_text_direction(g, within);
    let clearance = g.text_clearance(g.text_direction);
    let half = g.text_extent_along(g.text_direction, g.dir_dim_line) / 2.0;
    g.text_on_dim_line = offset.abs() < clearance && along > -half && along < length + half;
    if !g.text_on_dim_line {
        return TextSide::Free;
    }
    test_text_location0(g, along)
}
