#![allow(dead_code)]

use dimkit_core::curve::{Curve, LineSeg3d};
use glam::{DVec2, DVec3};

pub fn line(start: [f64; 3], end: [f64; 3]) -> Curve {
    Curve::Line(LineSeg3d::new(DVec3::from_array(start), DVec3::from_array(end)))
}

pub fn assert_point2(actual: DVec2, expected: [f64; 2]) {
    let expected = DVec2::from_array(expected);
    assert!(
        actual.distance(expected) < 1e-9,
        "点 {actual:?} 与期望 {expected:?} 不一致"
    );
}
