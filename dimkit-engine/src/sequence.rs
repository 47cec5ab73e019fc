//! 曲线序列：把候选曲线按端点相接的顺序排到主曲线两侧。
//!
//! 端点先按 (x, y, z, 曲线索引) 做全序排序，查找时再用容差在 x 方向上
//! 划定区间逐个比较，因此重复运行得到的链完全一致。

use std::cmp::Ordering;
use std::collections::{HashSet, VecDeque};

use dimkit_core::curve::{Curve, CurveKind, Planarity};
use dimkit_core::tolerance::Tolerance;
use glam::DVec3;
use serde::Serialize;
use tracing::{debug, trace};

use crate::errors::EngineError;

/// 候选曲线的一个端点。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveEndPoint {
    pub point: DVec3,
    pub index: usize,
    pub is_start: bool,
}

/// 链中的一个节点：主曲线占位，或带反向标记的候选曲线索引。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CurveIndex {
    Primary,
    Candidate { index: usize, reversed: bool },
}

impl CurveIndex {
    #[inline]
    pub fn candidate(self) -> Option<usize> {
        match self {
            CurveIndex::Primary => None,
            CurveIndex::Candidate { index, .. } => Some(index),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Start,
    End,
}

/// 为开放的主曲线寻找首尾相接的候选曲线链。
///
/// - `allowed` 为空时不过滤类型。
/// - `check_planarity` 打开时，候选曲线必须与主曲线共面（直线候选需垂直于主曲线法向）。
/// - 链在任一侧回到主曲线另一端点时立即返回成功，另一侧可能尚未延伸。
pub fn find_sequence(
    primary: &Curve,
    candidates: &[Option<Curve>],
    allowed: &[CurveKind],
    check_planarity: bool,
    tol: Tolerance,
) -> Result<Vec<CurveIndex>, EngineError> {
    if primary.is_closed() {
        return Err(EngineError::ClosedPrimary);
    }
    let (Some(primary_start), Some(primary_end)) = (primary.start_point(), primary.end_point())
    else {
        return Err(EngineError::InvalidInput("primary curve has no end points".to_string()));
    };

    let primary_normal = if check_planarity {
        match primary.planarity(tol) {
            Planarity::NonPlanar => {
                return Err(EngineError::InvalidInput("primary curve is not planar".to_string()));
            }
            planarity => planarity.normal(),
        }
    } else {
        None
    };

    let end_points = collect_end_points(candidates, allowed, check_planarity, primary_normal, tol);
    let mut used: HashSet<usize> = HashSet::new();
    let mut chain: VecDeque<CurveIndex> = VecDeque::from([CurveIndex::Primary]);

    for side in [Side::Start, Side::End] {
        let (mut open_end, closing_point) = match side {
            Side::Start => (primary_start, primary_end),
            Side::End => (primary_end, primary_start),
        };
        while let Some(hit) = find_match(&end_points, open_end, &used, tol) {
            used.insert(hit.index);
            let reversed = match side {
                Side::Start => hit.is_start,
                Side::End => !hit.is_start,
            };
            let link = CurveIndex::Candidate {
                index: hit.index,
                reversed,
            };
            match side {
                Side::Start => chain.push_front(link),
                Side::End => chain.push_back(link),
            }

            let Some(opposite) = opposite_end(&end_points, &hit) else {
                break;
            };
            trace!(index = hit.index, reversed, "链接候选曲线");
            open_end = opposite;
            if points_match(open_end, closing_point, tol) {
                debug!(length = chain.len(), "曲线链闭合");
                return Ok(chain.into());
            }
        }
    }

    if chain.len() > 1 {
        debug!(length = chain.len(), "曲线链已生成");
        Ok(chain.into())
    } else {
        Err(EngineError::NoSequence)
    }
}

fn collect_end_points(
    candidates: &[Option<Curve>],
    allowed: &[CurveKind],
    check_planarity: bool,
    primary_normal: Option<DVec3>,
    tol: Tolerance,
) -> Vec<CurveEndPoint> {
    let mut end_points = Vec::with_capacity(candidates.len() * 2);
    for (index, curve) in candidates.iter().enumerate() {
        let Some(curve) = curve else {
            continue;
        };
        if !allowed.is_empty() && !allowed.contains(&curve.kind()) {
            continue;
        }
        let (Some(start), Some(end)) = (curve.start_point(), curve.end_point()) else {
            continue;
        };
        if points_match(start, end, tol) {
            continue;
        }
        if check_planarity && !passes_planarity(curve, primary_normal, tol) {
            trace!(index, "候选曲线不共面，跳过");
            continue;
        }
        end_points.push(CurveEndPoint {
            point: start,
            index,
            is_start: true,
        });
        end_points.push(CurveEndPoint {
            point: end,
            index,
            is_start: false,
        });
    }
    end_points.sort_by(compare_end_points);
    end_points
}

fn passes_planarity(curve: &Curve, primary_normal: Option<DVec3>, tol: Tolerance) -> bool {
    match curve.planarity(tol) {
        Planarity::NonPlanar => false,
        Planarity::Planar { normal, .. } => {
            primary_normal.is_none_or(|primary| tol.is_parallel(primary, normal))
        }
        Planarity::Linear { direction, .. } => {
            primary_normal.is_none_or(|primary| tol.is_perpendicular(primary, direction))
        }
    }
}

fn compare_end_points(a: &CurveEndPoint, b: &CurveEndPoint) -> Ordering {
    a.point
        .x
        .total_cmp(&b.point.x)
        .then(a.point.y.total_cmp(&b.point.y))
        .then(a.point.z.total_cmp(&b.point.z))
        .then(a.index.cmp(&b.index))
        .then(b.is_start.cmp(&a.is_start))
}

#[inline]
fn points_match(a: DVec3, b: DVec3, tol: Tolerance) -> bool {
    tol.values_equal(a.x, b.x) && tol.values_equal(a.y, b.y) && tol.values_equal(a.z, b.z)
}

/// 在已排序端点中二分定位 x 容差带，返回第一个未使用且位置匹配的端点。
fn find_match(
    end_points: &[CurveEndPoint],
    target: DVec3,
    used: &HashSet<usize>,
    tol: Tolerance,
) -> Option<CurveEndPoint> {
    let lower = end_points.partition_point(|e| e.point.x < target.x - tol.equal_point);
    end_points[lower..]
        .iter()
        .take_while(|e| e.point.x <= target.x + tol.equal_point)
        .find(|e| !used.contains(&e.index) && points_match(e.point, target, tol))
        .copied()
}

fn opposite_end(end_points: &[CurveEndPoint], hit: &CurveEndPoint) -> Option<DVec3> {
    end_points
        .iter()
        .find(|e| e.index == hit.index && e.is_start != hit.is_start)
        .map(|e| e.point)
}

#[cfg(test)]
mod tests {
    use dimkit_core::curve::{CircArc3d, LineSeg3d};
    use std::f64::consts::{FRAC_PI_2, PI};

    use super::*;

    fn line(a: [f64; 3], b: [f64; 3]) -> Curve {
        Curve::Line(LineSeg3d::new(DVec3::from_array(a), DVec3::from_array(b)))
    }

    #[test]
    fn single_candidate_extends_end_side() {
        let primary = line([0.0, 0.0, 0.0], [10.0, 0.0, 0.0]);
        let candidates = vec![Some(line([10.0, 0.0, 0.0], [20.0, 0.0, 0.0]))];
        let chain = find_sequence(&primary, &candidates, &[], false, Tolerance::DEFAULT)
            .expect("应找到曲线链");
        assert_eq!(
            chain,
            vec![
                CurveIndex::Primary,
                CurveIndex::Candidate {
                    index: 0,
                    reversed: false
                }
            ]
        );
    }

    #[test]
    fn start_side_candidates_are_prepended_with_reversal() {
        let primary = line([0.0, 0.0, 0.0], [10.0, 0.0, 0.0]);
        let candidates = vec![
            Some(line([0.0, 0.0, 0.0], [-5.0, 0.0, 0.0])),
            Some(line([-9.0, 3.0, 0.0], [-5.0, 0.0, 0.0])),
        ];
        let chain = find_sequence(&primary, &candidates, &[], false, Tolerance::DEFAULT)
            .expect("应找到曲线链");
        assert_eq!(
            chain,
            vec![
                CurveIndex::Candidate {
                    index: 1,
                    reversed: false
                },
                CurveIndex::Candidate {
                    index: 0,
                    reversed: true
                },
                CurveIndex::Primary,
            ]
        );
    }

    #[test]
    fn closing_loop_returns_before_other_side() {
        let primary = line([0.0, 0.0, 0.0], [10.0, 0.0, 0.0]);
        let candidates = vec![
            Some(line([10.0, 0.0, 0.0], [10.0, 10.0, 0.0])),
            Some(line([10.0, 10.0, 0.0], [0.0, 0.0, 0.0])),
            Some(line([-5.0, 0.0, 0.0], [0.0, 0.0, 0.0])),
        ];
        let chain = find_sequence(&primary, &candidates, &[], false, Tolerance::DEFAULT)
            .expect("应找到闭合链");
        assert_eq!(chain.len(), 3);
        assert_eq!(chain[0].candidate(), Some(0));
        assert_eq!(chain[1].candidate(), Some(1));
        assert_eq!(chain[2], CurveIndex::Primary);
        assert!(!chain.iter().any(|link| link.candidate() == Some(2)));
    }

    #[test]
    fn closed_primary_is_rejected() {
        let primary = Curve::Arc(CircArc3d::new(DVec3::ZERO, DVec3::Z, 1.0, 0.0, 2.0 * PI));
        let result = find_sequence(&primary, &[], &[], false, Tolerance::DEFAULT);
        assert_eq!(result, Err(EngineError::ClosedPrimary));
    }

    #[test]
    fn filters_skip_null_degenerate_and_disallowed_candidates() {
        let primary = line([0.0, 0.0, 0.0], [10.0, 0.0, 0.0]);
        let candidates = vec![
            None,
            Some(line([10.0, 0.0, 0.0], [10.0, 0.0, 0.0])),
            Some(Curve::Arc(CircArc3d::new(
                DVec3::new(15.0, 0.0, 0.0),
                DVec3::Z,
                5.0,
                0.0,
                PI,
            ))),
        ];
        let result = find_sequence(
            &primary,
            &candidates,
            &[CurveKind::Line],
            false,
            Tolerance::DEFAULT,
        );
        assert_eq!(result, Err(EngineError::NoSequence));

        let chain = find_sequence(&primary, &candidates, &[], false, Tolerance::DEFAULT)
            .expect("不过滤类型时圆弧应被接上");
        assert_eq!(
            chain[1],
            CurveIndex::Candidate {
                index: 2,
                reversed: true
            }
        );
    }

    #[test]
    fn planarity_check_rejects_tilted_arc() {
        let primary = Curve::Arc(CircArc3d::new(DVec3::ZERO, DVec3::Z, 5.0, 0.0, PI));
        let tilted = Curve::Arc(CircArc3d::new(
            DVec3::new(-5.0, 0.0, -5.0),
            DVec3::Y,
            5.0,
            FRAC_PI_2,
            PI,
        ));
        let tilted_start = tilted.start_point().expect("起点");
        assert!((tilted_start - DVec3::new(-5.0, 0.0, 0.0)).length() < 1e-9);
        let start = primary.start_point().expect("起点");
        let candidates = vec![
            Some(tilted),
            Some(Curve::Line(LineSeg3d::new(start, start + DVec3::X * 3.0))),
        ];

        let chain = find_sequence(&primary, &candidates, &[], true, Tolerance::DEFAULT)
            .expect("共面的直线应被接受");
        assert_eq!(chain.len(), 2);
        assert_eq!(
            chain[0],
            CurveIndex::Candidate {
                index: 1,
                reversed: true
            }
        );

        let unchecked = find_sequence(&primary, &candidates, &[], false, Tolerance::DEFAULT)
            .expect("不检查平面时两条都应接上");
        assert_eq!(unchecked.len(), 3);
    }

    #[test]
    fn repeated_runs_produce_identical_chains() {
        let primary = line([0.0, 0.0, 0.0], [1.0, 0.0, 0.0]);
        let candidates: Vec<Option<Curve>> = (1..6)
            .map(|i| {
                let x = i as f64;
                Some(line([x, 0.0, 0.0], [x + 1.0, 0.0, 0.0]))
            })
            .chain([Some(line([1.0, 0.0, 0.0], [1.0, 4.0, 0.0]))])
            .collect();
        let first = find_sequence(&primary, &candidates, &[], false, Tolerance::DEFAULT)
            .expect("应找到曲线链");
        let second = find_sequence(&primary, &candidates, &[], false, Tolerance::DEFAULT)
            .expect("应找到曲线链");
        assert_eq!(first, second);
        assert_eq!(first[1].candidate(), Some(0));
    }
}
