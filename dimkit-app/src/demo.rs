//! 内置演示场景：曲线序列与拼接、圆弧闭合、标注打断、对齐标注摆放。

use std::f64::consts::PI;

use dimkit_config::{AppConfig, DimensionConfig};
use dimkit_core::curve::{CircArc3d, Curve, LineSeg3d, Polyline2d};
use dimkit_core::document::Drawing;
use dimkit_core::tolerance::Tolerance;
use dimkit_engine::breaking::{BreakDimEngine, BreakPointRef, DimCurve};
use dimkit_engine::dimension::{
    AlignedDimGeometry, AlignedDimInput, DimStyle, EstimatedText, FitMode, TextJustification,
    TextMove, TextVertical, recompute_aligned,
};
use dimkit_engine::errors::EngineError;
use dimkit_engine::join::{POLYLINE_JOIN_KINDS, join_arcs, join_polyline};
use dimkit_engine::sequence::{CurveIndex, find_sequence};
use glam::{DAffine2, DVec2, DVec3};
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Serialize)]
pub struct DemoReport {
    pub sequence: Vec<CurveIndex>,
    pub polyline_points: Vec<DVec2>,
    pub polyline_bulges: Vec<f64>,
    pub arc_closed: bool,
    pub arc_end_angle: f64,
    pub broken: Vec<DimCurve>,
    pub aligned: AlignedDimGeometry,
}

pub fn tolerance(config: &AppConfig) -> Tolerance {
    Tolerance::new(config.tolerance.equal_point, config.tolerance.equal_vector)
}

pub fn dim_style(config: &DimensionConfig) -> DimStyle {
    DimStyle {
        arrow_size1: config.arrow_size,
        arrow_size2: config.arrow_size,
        gap: config.gap,
        text_height: config.text_height,
        ext_line_offset: config.ext_line_offset,
        ext_line_extension: config.ext_line_extension,
        dim_line_extension: config.dim_line_extension,
        fit: FitMode::from_code(config.fit),
        justification: TextJustification::from_code(config.justification),
        vertical: TextVertical::from_code(config.vertical),
        text_move: TextMove::from_code(config.text_move),
        text_inside_horizontal: config.text_inside_horizontal,
        text_outside_horizontal: config.text_outside_horizontal,
        ..DimStyle::default()
    }
}

pub fn run(config: &AppConfig) -> Result<DemoReport, EngineError> {
    let tol = tolerance(config);

    // 直线 (0,0)-(10,0) 接上 (10,0)-(20,0)
    let primary = Curve::Line(LineSeg3d::new(DVec3::ZERO, DVec3::new(10.0, 0.0, 0.0)));
    let candidates = vec![Some(Curve::Line(LineSeg3d::new(
        DVec3::new(10.0, 0.0, 0.0),
        DVec3::new(20.0, 0.0, 0.0),
    )))];
    let sequence = find_sequence(&primary, &candidates, &POLYLINE_JOIN_KINDS, true, tol)?;
    let mut polyline = Polyline2d::from_points([DVec2::ZERO, DVec2::new(10.0, 0.0)]);
    let consumed = join_polyline(&mut polyline, &candidates, &sequence, tol)?;
    debug!(consumed = consumed.len(), "多段线拼接完成");

    // 上半圆接下半圆，闭合成整圆
    let mut arc = CircArc3d::new(DVec3::ZERO, DVec3::Z, 5.0, 0.0, PI);
    let arc_candidates = vec![Some(Curve::Arc(CircArc3d::new(DVec3::ZERO, DVec3::Z, 5.0, PI, 2.0 * PI)))];
    let arc_join = join_arcs(&mut arc, &arc_candidates, tol)?;

    let mut engine = BreakDimEngine::new(config.breaking.break_size);
    engine.set_dimension_entities(
        &[DimCurve::line(DVec2::ZERO, DVec2::new(10.0, 0.0))],
        DAffine2::IDENTITY,
    );
    let refs = [BreakPointRef::fixed(DVec2::new(3.0, 0.0), DVec2::new(5.0, 0.0))];
    let broken = engine.break_dimension(&Drawing::new(), &refs).to_vec();

    let style = dim_style(&config.dimension);
    let input = AlignedDimInput {
        x_line1_pt: DVec2::ZERO,
        x_line2_pt: DVec2::new(10.0, 0.0),
        dim_line_def_pt: DVec2::new(5.0, 2.0),
        ..AlignedDimInput::default()
    };
    let text = EstimatedText {
        content: "10.00".to_string(),
        height: style.text_height,
    };
    let aligned = recompute_aligned(input, style, &text);

    info!(
        chain = sequence.len(),
        pieces = broken.len(),
        dim_lines = aligned.dim_lines,
        "演示场景计算完成"
    );
    Ok(DemoReport {
        sequence,
        polyline_points: polyline.vertices.iter().map(|v| v.point).collect(),
        polyline_bulges: polyline.vertices.iter().map(|v| v.bulge).collect(),
        arc_closed: arc_join.closed,
        arc_end_angle: arc.end_angle,
        broken,
        aligned,
    })
}

pub fn print_report(report: &DemoReport) {
    println!("曲线序列：");
    for node in &report.sequence {
        match node {
            CurveIndex::Primary => println!("  - 主曲线"),
            CurveIndex::Candidate { index, reversed } => {
                println!("  - 候选 #{index}{}", if *reversed { "（反向）" } else { "" })
            }
        }
    }
    println!("拼接后的多段线：");
    for (point, bulge) in report.polyline_points.iter().zip(&report.polyline_bulges) {
        println!("  - ({:.2}, {:.2}) 凸度={:.3}", point.x, point.y, bulge);
    }
    println!(
        "圆弧合并：闭合={}, 终止角={:.4}",
        report.arc_closed, report.arc_end_angle
    );
    println!("打断后的标注线：");
    for curve in &report.broken {
        match curve {
            DimCurve::Line { start, end } => println!(
                "  - 线段 ({:.2}, {:.2}) -> ({:.2}, {:.2})",
                start.x, start.y, end.x, end.y
            ),
            DimCurve::Arc {
                center,
                radius,
                start_angle,
                end_angle,
            } => println!(
                "  - 圆弧 中心=({:.2}, {:.2}) 半径={:.2} 角度={:.4}..{:.4}",
                center.x, center.y, radius, start_angle, end_angle
            ),
        }
    }
    let aligned = &report.aligned;
    println!("对齐标注：");
    println!(
        "  - 箭头 ({:.3}, {:.3}) / ({:.3}, {:.3})",
        aligned.arrow1_pt.x, aligned.arrow1_pt.y, aligned.arrow2_pt.x, aligned.arrow2_pt.y
    );
    println!(
        "  - 文字位置 ({:.3}, {:.3}), 尺寸线段数={}",
        aligned.text_position.x, aligned.text_position.y, aligned.dim_lines
    );
}
