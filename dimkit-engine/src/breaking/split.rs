//! 按有序打断列表拆分标注曲线。

use dimkit_core::tolerance::Tolerance;

use super::{BreakList, DimCurve};

/// 顺序扫描打断区间，输出未被覆盖的子段；长度不超过容差的子段直接丢弃。
pub(super) fn split_curve(curve: &DimCurve, breaks: &BreakList, tol: Tolerance) -> Vec<DimCurve> {
    let (first, last) = curve.span();
    let slack = curve.param_extent(tol.equal_point);
    let mut pieces = Vec::with_capacity(breaks.len() + 1);
    let mut cursor = first;
    for item in breaks.iter() {
        if item.to <= cursor + slack || item.from >= last - slack {
            continue;
        }
        if item.from > cursor {
            push_piece(curve, cursor, item.from, tol, &mut pieces);
        }
        cursor = cursor.max(item.to);
    }
    if cursor < last {
        push_piece(curve, cursor, last, tol, &mut pieces);
    }
    pieces
}

fn push_piece(curve: &DimCurve, from: f64, to: f64, tol: Tolerance, out: &mut Vec<DimCurve>) {
    if curve.measure(from, to) > tol.equal_point {
        out.push(curve.piece(from, to));
    }
}

#[cfg(test)]
mod tests {
    use glam::DVec2;

    use super::super::{BreakKind, BreakPointData};
    use super::*;

    fn interval(from: f64, to: f64) -> BreakPointData {
        BreakPointData {
            kind: BreakKind::Static,
            start: DVec2::new(from, 0.0),
            end: DVec2::new(to, 0.0),
            from,
            to,
        }
    }

    fn spans(pieces: &[DimCurve]) -> Vec<(f64, f64)> {
        pieces
            .iter()
            .map(|piece| (piece.start_point().x, piece.end_point().x))
            .collect()
    }

    fn line() -> DimCurve {
        DimCurve::line(DVec2::ZERO, DVec2::new(10.0, 0.0))
    }

    #[test]
    fn partial_overlaps_trim_ends() {
        let mut breaks = BreakList::default();
        breaks.insert(interval(8.0, 12.0));
        breaks.insert(interval(-2.0, 1.0));
        let pieces = split_curve(&line(), &breaks, Tolerance::DEFAULT);
        assert_eq!(spans(&pieces), vec![(1.0, 8.0)]);
    }

    #[test]
    fn overlapping_intervals_merge() {
        let mut breaks = BreakList::default();
        breaks.insert(interval(4.0, 6.0));
        breaks.insert(interval(2.0, 5.0));
        breaks.insert(interval(20.0, 30.0));
        let pieces = split_curve(&line(), &breaks, Tolerance::DEFAULT);
        assert_eq!(spans(&pieces), vec![(0.0, 2.0), (6.0, 10.0)]);
    }

    #[test]
    fn covering_interval_leaves_nothing() {
        let mut breaks = BreakList::default();
        breaks.insert(interval(-1.0, 11.0));
        assert!(split_curve(&line(), &breaks, Tolerance::DEFAULT).is_empty());
    }

    #[test]
    fn degenerate_pieces_are_dropped() {
        let mut breaks = BreakList::default();
        breaks.insert(interval(1e-12, 5.0));
        breaks.insert(interval(5.0 + 1e-12, 9.0));
        let pieces = split_curve(&line(), &breaks, Tolerance::DEFAULT);
        assert_eq!(spans(&pieces), vec![(9.0, 10.0)]);
    }
}
