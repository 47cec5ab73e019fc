//! 对齐标注的放置流程。
//!
//! 几何状态 `AlignedDimGeometry` 依次经过固定顺序的步骤函数，每一步都是
//! `AlignedDimGeometry -> AlignedDimGeometry`。`AlignedDimension<S>` 用阶段类型把
//! 调用顺序固定下来：
//!
//! ```text
//! new → preprocess → place_text → build_dim_lines → [make_jog_symbol] → finish
//! ```

mod lines;
mod placement;

use std::marker::PhantomData;

use glam::DVec2;
use serde::Serialize;

pub use lines::JogRejected;
pub use placement::fit_text_and_arrows;

use super::style::{DimStyle, TextExtents, TextMetrics, TextMove, TextVertical};
use super::{EPS_CODIRECTIONAL, EPS_ZERO, Segment2, readable};

/// 标注的原始定义。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AlignedDimInput {
    pub x_line1_pt: DVec2,
    pub x_line2_pt: DVec2,
    pub dim_line_def_pt: DVec2,
    /// 尺寸界线的绝对倾斜角，0 表示垂直于尺寸线。
    pub oblique: f64,
    /// 转角标注的尺寸线方向；对齐标注为 None。
    pub rotation: Option<f64>,
    /// 用户拖动后的文字位置。
    pub text_position: Option<DVec2>,
    /// 用户指定的文字方向。
    pub text_rotation: Option<f64>,
}

/// 文字最终所处的位置类别。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum TextSide {
    #[default]
    Inside,
    /// 第一尺寸界线外侧。
    Outside1,
    /// 第二尺寸界线外侧。
    Outside2,
    OverExtLine1,
    OverExtLine2,
    /// 不依附尺寸线（自由放置或由引线连接）。
    Free,
}

/// 一个标注的几何解。所有字段公开，流程结束后直接读取。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedDimGeometry {
    pub x_line1_pt: DVec2,
    pub x_line2_pt: DVec2,
    pub dim_line_def_pt: DVec2,
    pub user_text_pt: Option<DVec2>,
    pub oblique: f64,
    pub rotation: Option<f64>,
    pub text_rotation: Option<f64>,
    pub style: DimStyle,
    pub text: TextExtents,

    /// 第一箭头指向第二箭头的单位向量。
    pub dir_dim_line: DVec2,
    /// 自定义点指向尺寸线的单位向量。
    pub dir_ext_line: DVec2,
    pub dim_line_is_hor: bool,
    pub ext_line1: Option<Segment2>,
    pub ext_line2: Option<Segment2>,

    pub arrow1_pt: DVec2,
    pub arrow2_pt: DVec2,
    /// 箭头尖的朝向。
    pub arrow1_dir: DVec2,
    pub arrow2_dir: DVec2,
    pub arrows_inside: bool,
    pub arrows_suppressed: bool,

    pub text_position: DVec2,
    pub text_direction: DVec2,
    pub text_inside: bool,
    /// 文字与尺寸线平行。
    pub use_rotate: bool,
    pub text_on_dim_line: bool,
    pub text_side: TextSide,
    pub is_txt_pos_far_from_arrow_point: bool,
    pub is_txt_pos_far_from_dim_line: bool,

    /// 实际绘制的尺寸线段数（0、1 或 2）。
    pub dim_lines: u8,
    /// 单段时从第一箭头侧到第二箭头侧；被文字或折弯截断后两段都从截断点出发，
    /// `dim_line1.start` 是离第一箭头较近的截断点。
    pub dim_line1: Segment2,
    pub dim_line2: Segment2,
    /// 引线点，自尺寸线一端到文字。
    pub leader: Vec<DVec2>,
    pub tail1: Option<Segment2>,
    pub tail2: Option<Segment2>,
    pub jog: Option<[DVec2; 4]>,
}

impl AlignedDimGeometry {
    fn from_input(input: AlignedDimInput, style: DimStyle, text: TextExtents) -> Self {
        Self {
            x_line1_pt: input.x_line1_pt,
            x_line2_pt: input.x_line2_pt,
            dim_line_def_pt: input.dim_line_def_pt,
            user_text_pt: input.text_position,
            oblique: input.oblique,
            rotation: input.rotation,
            text_rotation: input.text_rotation,
            style,
            text,
            dir_dim_line: DVec2::X,
            dir_ext_line: DVec2::Y,
            dim_line_is_hor: true,
            ext_line1: None,
            ext_line2: None,
            arrow1_pt: input.x_line1_pt,
            arrow2_pt: input.x_line2_pt,
            arrow1_dir: -DVec2::X,
            arrow2_dir: DVec2::X,
            arrows_inside: true,
            arrows_suppressed: false,
            text_position: input.dim_line_def_pt,
            text_direction: DVec2::X,
            text_inside: true,
            use_rotate: true,
            text_on_dim_line: false,
            text_side: TextSide::Inside,
            is_txt_pos_far_from_arrow_point: false,
            is_txt_pos_far_from_dim_line: false,
            dim_lines: 0,
            dim_line1: Segment2::default(),
            dim_line2: Segment2::default(),
            leader: Vec::new(),
            tail1: None,
            tail2: None,
            jog: None,
        }
    }

    #[inline]
    pub fn dim_line_length(&self) -> f64 {
        self.arrow1_pt.distance(self.arrow2_pt)
    }

    /// 尺寸线“上方”的单位法向，与可读文字的上方一致。
    #[inline]
    pub fn above_normal(&self) -> DVec2 {
        readable(self.dir_dim_line).perp()
    }

    /// 以第一箭头为原点的尺寸线坐标：(沿线距离, 上方偏移)。
    #[inline]
    pub fn project(&self, point: DVec2) -> (f64, f64) {
        let local = point - self.arrow1_pt;
        (local.dot(self.dir_dim_line), local.dot(self.above_normal()))
    }

    #[inline]
    pub fn point_on_line(&self, along: f64, offset: f64) -> DVec2 {
        self.arrow1_pt + self.dir_dim_line * along + self.above_normal() * offset
    }

    /// 文字框（含 DIMGAP 边距）在 `axis` 方向上的总长度。
    pub fn text_extent_along(&self, text_direction: DVec2, axis: DVec2) -> f64 {
        self.framed_extent_along(text_direction, axis, self.style.gap_margin())
    }

    fn framed_extent_along(&self, text_direction: DVec2, axis: DVec2, margin: f64) -> f64 {
        let up = text_direction.perp();
        text_direction.dot(axis).abs() * (self.text.width + 2.0 * margin)
            + up.dot(axis).abs() * (self.text.height + 2.0 * margin)
    }

    /// 文字与尺寸线平行时，尺寸线到文字中心的距离。
    #[inline]
    pub fn vertical_dist_to_text(&self) -> f64 {
        self.text.height / 2.0 + self.style.gap_margin()
    }

    /// 文字不与尺寸线平行时，文字框在尺寸线法向上的半高。
    /// 带框文字（DIMGAP 为负）投影整个外框；否则投影文字本身再留一个间距。
    pub fn distance_to_hor_text(&self, text_direction: DVec2) -> f64 {
        let normal = self.above_normal();
        if self.style.is_box() {
            self.framed_extent_along(text_direction, normal, self.style.gap_margin()) / 2.0
        } else {
            self.framed_extent_along(text_direction, normal, 0.0) / 2.0 + self.style.gap_margin()
        }
    }

    pub(crate) fn text_parallel_to_dim_line(&self, text_direction: DVec2) -> bool {
        text_direction.perp_dot(self.dir_dim_line).abs() < EPS_CODIRECTIONAL
    }

    /// 文字中心离开尺寸线所需的最小距离。
    pub fn text_clearance(&self, text_direction: DVec2) -> f64 {
        if self.text_parallel_to_dim_line(text_direction) {
            self.vertical_dist_to_text()
        } else {
            self.distance_to_hor_text(text_direction)
        }
    }

    /// 按 DIMTAD 计算文字中心相对尺寸线的带符号偏移（正值在上方）。
    pub fn text_offset(&self) -> f64 {
        let clearance = self.text_clearance(self.text_direction);
        match self.style.vertical {
            TextVertical::Centered => self.style.text_vertical_position * self.text.height,
            TextVertical::Above | TextVertical::Jis => clearance,
            TextVertical::Below => -clearance,
            TextVertical::Outside => clearance * self.outside_sign(),
        }
    }

    /// 远离被标注对象的一侧。
    fn outside_sign(&self) -> f64 {
        if (self.arrow1_pt - self.x_line1_pt).dot(self.above_normal()) < 0.0 {
            -1.0
        } else {
            1.0
        }
    }

    /// 文字在内侧或外侧时的方向：对应的 DIMTIH/DIMTOH 打开时水平，否则与尺寸线平行。
    pub(crate) fn text_direction_for(&self, inside: bool) -> DVec2 {
        if let Some(angle) = self.text_rotation {
            return DVec2::from_angle(angle);
        }
        let horizontal = if inside {
            self.style.text_inside_horizontal
        } else {
            self.style.text_outside_horizontal
        };
        if horizontal {
            DVec2::X
        } else {
            readable(self.dir_dim_line)
        }
    }

    /// 文字框四角（含边距），逆时针。
    pub fn text_quad(&self) -> [DVec2; 4] {
        let margin = self.style.gap_margin();
        let along = self.text_direction * (self.text.width / 2.0 + margin);
        let up = self.text_direction.perp() * (self.text.height / 2.0 + margin);
        let c = self.text_position;
        [c - along - up, c + along - up, c + along + up, c - along + up]
    }

    #[inline]
    pub fn arrow_size(&self, side: u8) -> f64 {
        if side == 1 {
            self.style.arrow_size1
        } else {
            self.style.arrow_size2
        }
    }

    /// 箭头是否放在尺寸界线外侧（箭头尖朝内）。
    pub fn arrow_outward(&self, side: u8) -> bool {
        if side == 1 {
            self.arrow1_dir.dot(self.dir_dim_line) > 0.0
        } else {
            self.arrow2_dir.dot(self.dir_dim_line) < 0.0
        }
    }

    pub(crate) fn is_zero(value: f64) -> bool {
        value.abs() <= EPS_ZERO
    }
}

/// 流程阶段标记。
#[derive(Debug, Clone, Copy)]
pub struct Raw;
#[derive(Debug, Clone, Copy)]
pub struct Preprocessed;
#[derive(Debug, Clone, Copy)]
pub struct TextPlaced;
#[derive(Debug, Clone, Copy)]
pub struct LinesBuilt;

/// 按阶段推进的对齐标注重算器。
#[derive(Debug, Clone)]
pub struct AlignedDimension<S> {
    geometry: AlignedDimGeometry,
    _stage: PhantomData<S>,
}

impl<S> AlignedDimension<S> {
    pub fn geometry(&self) -> &AlignedDimGeometry {
        &self.geometry
    }

    fn advance<T>(self, step: impl FnOnce(AlignedDimGeometry) -> AlignedDimGeometry) -> AlignedDimension<T> {
        AlignedDimension {
            geometry: step(self.geometry),
            _stage: PhantomData,
        }
    }
}

impl AlignedDimension<Raw> {
    pub fn new(input: AlignedDimInput, style: DimStyle, metrics: &impl TextMetrics) -> Self {
        Self {
            geometry: AlignedDimGeometry::from_input(input, style, metrics.text_extents()),
            _stage: PhantomData,
        }
    }

    pub fn preprocess(self) -> AlignedDimension<Preprocessed> {
        self.advance(placement::preprocess_data)
    }
}

impl AlignedDimension<Preprocessed> {
    /// 自动放置，或按 DIMTMOVE 处理用户指定的文字位置。
    pub fn place_text(self) -> AlignedDimension<TextPlaced> {
        self.advance(|geometry| match geometry.user_text_pt {
            None => placement::adjust_text_location(placement::adjust_text_and_arrows_place(geometry)),
            Some(_) => match geometry.style.text_move {
                TextMove::MoveDimLine => placement::adjust_user_def_text0(geometry),
                TextMove::AddLeader => placement::adjust_user_def_text1(geometry),
                TextMove::Free => placement::adjust_user_def_text2(geometry),
            },
        })
    }
}

impl AlignedDimension<TextPlaced> {
    pub fn build_dim_lines(self) -> AlignedDimension<LinesBuilt> {
        self.advance(|geometry| {
            let geometry = lines::calc_direction_arrows(geometry);
            let geometry = lines::calc_dim_lines_points(geometry);
            let geometry = lines::correct_dim_lines_points(geometry);
            let geometry = lines::add_dim_line_tails(geometry);
            lines::intersect_dim_line_with_text(geometry)
        })
    }
}

impl AlignedDimension<LinesBuilt> {
    /// 在 `at` 附近插入折弯符号；失败时原状态保持不变。
    pub fn make_jog_symbol(&self, at: DVec2) -> Result<Self, JogRejected> {
        lines::make_jog_symbol(&self.geometry, at).map(|geometry| Self {
            geometry,
            _stage: PhantomData,
        })
    }

    pub fn finish(self) -> AlignedDimGeometry {
        self.geometry
    }
}

/// 不插入折弯符号的完整流程。
pub fn recompute_aligned(
    input: AlignedDimInput,
    style: DimStyle,
    metrics: &impl TextMetrics,
) -> AlignedDimGeometry {
    AlignedDimension::new(input, style, metrics)
        .preprocess()
        .place_text()
        .build_dim_lines()
        .finish()
}
