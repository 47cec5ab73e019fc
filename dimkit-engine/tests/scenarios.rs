mod common;

use std::f64::consts::PI;

use dimkit_core::curve::{CircArc3d, Curve, Polyline2d};
use dimkit_core::document::Drawing;
use dimkit_core::tolerance::Tolerance;
use dimkit_engine::breaking::{BreakDimEngine, BreakPointRef, DimCurve};
use dimkit_engine::join::{POLYLINE_JOIN_KINDS, join_arcs, join_polyline};
use dimkit_engine::sequence::find_sequence;
use glam::{DAffine2, DVec2, DVec3};
use serde_json::json;

use common::line;

#[test]
fn open_line_chain_joins_into_three_point_polyline() {
    let tol = Tolerance::DEFAULT;
    let primary = line([0.0, 0.0, 0.0], [10.0, 0.0, 0.0]);
    let candidates = vec![Some(line([10.0, 0.0, 0.0], [20.0, 0.0, 0.0]))];
    let sequence =
        find_sequence(&primary, &candidates, &POLYLINE_JOIN_KINDS, true, tol).expect("应找到曲线链");
    assert_eq!(
        serde_json::to_value(&sequence).expect("序列化曲线链"),
        json!(["Primary", {"Candidate": {"index": 0, "reversed": false}}])
    );

    let mut polyline = Polyline2d::from_points([DVec2::ZERO, DVec2::new(10.0, 0.0)]);
    let consumed = join_polyline(&mut polyline, &candidates, &sequence, tol).expect("应完成拼接");
    assert_eq!(consumed, vec![0]);
    let points: Vec<[f64; 2]> = polyline.vertices.iter().map(|v| v.point.to_array()).collect();
    assert_eq!(points, vec![[0.0, 0.0], [10.0, 0.0], [20.0, 0.0]]);
    let bulges: Vec<f64> = polyline.vertices.iter().map(|v| v.bulge).collect();
    assert_eq!(bulges, vec![0.0, 0.0, 0.0]);
}

#[test]
fn contiguous_half_arcs_close_into_circle() {
    let mut primary = CircArc3d::new(DVec3::ZERO, DVec3::Z, 5.0, 0.0, PI);
    let candidates = vec![Some(Curve::Arc(CircArc3d::new(
        DVec3::ZERO,
        DVec3::Z,
        5.0,
        PI,
        2.0 * PI,
    )))];
    let join = join_arcs(&mut primary, &candidates, Tolerance::DEFAULT).expect("应合并圆弧");
    assert!(join.closed);
    assert_eq!(join.consumed, vec![0]);
    assert!(primary.start_angle.abs() < 1e-12);
    assert!((primary.end_angle - 2.0 * PI).abs() < 1e-12);
}

#[test]
fn static_pair_breaks_line_into_two() {
    let mut engine = BreakDimEngine::new(0.125);
    engine.set_dimension_entities(
        &[DimCurve::line(DVec2::ZERO, DVec2::new(10.0, 0.0))],
        DAffine2::IDENTITY,
    );
    let refs = [BreakPointRef::fixed(DVec2::new(3.0, 0.0), DVec2::new(5.0, 0.0))];
    let output = engine.break_dimension(&Drawing::new(), &refs);
    assert_eq!(
        serde_json::to_value(output).expect("序列化打断结果"),
        json!([
            {"kind": "line", "start": [0.0, 0.0], "end": [3.0, 0.0]},
            {"kind": "line", "start": [5.0, 0.0], "end": [10.0, 0.0]}
        ])
    );
}
