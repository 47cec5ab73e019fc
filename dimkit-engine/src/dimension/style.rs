//! 标注样式参数与文字尺寸查询。

use serde::{Deserialize, Serialize};

/// 文字水平对正（DIMJUST）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextJustification {
    #[default]
    Centered,
    NextToExtLine1,
    NextToExtLine2,
    OverExtLine1,
    OverExtLine2,
}

impl TextJustification {
    pub fn from_code(code: i16) -> Self {
        match code {
            1 => TextJustification::NextToExtLine1,
            2 => TextJustification::NextToExtLine2,
            3 => TextJustification::OverExtLine1,
            4 => TextJustification::OverExtLine2,
            _ => TextJustification::Centered,
        }
    }
}

/// 文字相对尺寸线的垂直位置（DIMTAD）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextVertical {
    #[default]
    Centered,
    Above,
    Outside,
    Jis,
    Below,
}

impl TextVertical {
    pub fn from_code(code: i16) -> Self {
        match code {
            1 => TextVertical::Above,
            2 => TextVertical::Outside,
            3 => TextVertical::Jis,
            4 => TextVertical::Below,
            _ => TextVertical::Centered,
        }
    }
}

/// 用户移动文字后的处理方式（DIMTMOVE）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextMove {
    #[default]
    MoveDimLine,
    AddLeader,
    Free,
}

impl TextMove {
    pub fn from_code(code: i16) -> Self {
        match code {
            1 => TextMove::AddLeader,
            2 => TextMove::Free,
            _ => TextMove::MoveDimLine,
        }
    }
}

/// 空间不足时先移出文字还是箭头（DIMATFIT）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitMode {
    BothOutside,
    ArrowsFirst,
    TextFirst,
    #[default]
    BestFit,
}

impl FitMode {
    pub fn from_code(code: i16) -> Self {
        match code {
            0 => FitMode::BothOutside,
            1 => FitMode::ArrowsFirst,
            2 => FitMode::TextFirst,
            _ => FitMode::BestFit,
        }
    }
}

/// 对齐/转角标注使用的样式参数，数值均已乘以整体比例。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimStyle {
    /// DIMASZ，第一、第二箭头分别取值。
    pub arrow_size1: f64,
    pub arrow_size2: f64,
    /// DIMGAP，负值表示文字加框。
    pub gap: f64,
    /// DIMTXT。
    pub text_height: f64,
    pub justification: TextJustification,
    pub vertical: TextVertical,
    pub text_move: TextMove,
    pub fit: FitMode,
    /// DIMTIH / DIMTOH。
    pub text_inside_horizontal: bool,
    pub text_outside_horizontal: bool,
    /// DIMTVP，仅在文字居中于尺寸线时生效，以文字高度为单位。
    pub text_vertical_position: f64,
    /// DIMTIX。
    pub force_text_inside: bool,
    /// DIMSOXD。
    pub suppress_outside_arrows: bool,
    /// DIMTOFL。
    pub force_dim_line_inside: bool,
    /// DIMDLE / DIMEXE / DIMEXO。
    pub dim_line_extension: f64,
    pub ext_line_extension: f64,
    pub ext_line_offset: f64,
    pub suppress_dim_line1: bool,
    pub suppress_dim_line2: bool,
    pub suppress_ext_line1: bool,
    pub suppress_ext_line2: bool,
    pub flip_arrow1: bool,
    pub flip_arrow2: bool,
    /// 折弯符号高度，以文字高度为单位。
    pub jog_height_factor: f64,
}

impl Default for DimStyle {
    fn default() -> Self {
        Self {
            arrow_size1: 0.18,
            arrow_size2: 0.18,
            gap: 0.09,
            text_height: 0.18,
            justification: TextJustification::Centered,
            vertical: TextVertical::Centered,
            text_move: TextMove::MoveDimLine,
            fit: FitMode::BestFit,
            text_inside_horizontal: true,
            text_outside_horizontal: true,
            text_vertical_position: 0.0,
            force_text_inside: false,
            suppress_outside_arrows: false,
            force_dim_line_inside: false,
            dim_line_extension: 0.0,
            ext_line_extension: 0.18,
            ext_line_offset: 0.0625,
            suppress_dim_line1: false,
            suppress_dim_line2: false,
            suppress_ext_line1: false,
            suppress_ext_line2: false,
            flip_arrow1: false,
            flip_arrow2: false,
            jog_height_factor: 1.5,
        }
    }
}

impl DimStyle {
    #[inline]
    pub fn is_box(&self) -> bool {
        self.gap < 0.0
    }

    #[inline]
    pub fn gap_margin(&self) -> f64 {
        self.gap.abs()
    }

    #[inline]
    pub fn jog_height(&self) -> f64 {
        self.jog_height_factor * self.text_height
    }
}

/// 标注文字排版后的宽高。
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TextExtents {
    pub width: f64,
    pub height: f64,
}

impl TextExtents {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// 文字尺寸查询，由外部排版提供。
pub trait TextMetrics {
    fn text_extents(&self) -> TextExtents;
}

impl TextMetrics for TextExtents {
    fn text_extents(&self) -> TextExtents {
        *self
    }
}

/// 按字符数与高度估算单行文字尺寸。
#[derive(Debug, Clone)]
pub struct EstimatedText {
    pub content: String,
    pub height: f64,
}

impl TextMetrics for EstimatedText {
    fn text_extents(&self) -> TextExtents {
        TextExtents {
            width: dimkit_core::document::estimated_width(&self.content, self.height),
            height: self.height,
        }
    }
}
