//! Optimal site assignment for an ordered run of cells.

use super::MoveEngine;
use crate::ids::{CellId, RowId};

impl MoveEngine<'_> {
    /// Places `cells`, in the given left-to-right order, on the site grid of
    /// `row` inside `[left, right]`, minimizing the total distance of each
    /// cell from its target left edge.
    ///
    /// Solved by dynamic programming over (cell, site) pairs. Among equal-cost
    /// solutions the leftmost one wins. Returns `None`, without touching the
    /// placement, when the cells cannot all fit.
    pub fn shift(
        &self,
        cells: &[CellId],
        targets: &[i64],
        left: i64,
        right: i64,
        row: RowId,
    ) -> Option<Vec<i64>> {
        if cells.len() != targets.len() {
            return None;
        }
        if cells.is_empty() {
            return Some(Vec::new());
        }
        let r = self.design.arch.row(row);
        let sp = r.site_spacing;
        let first_site = (left - r.origin_x + sp - 1).div_euclid(sp);
        let end_site = (right - r.origin_x).div_euclid(sp);
        let nsites = usize::try_from(end_site - first_site).ok()?;

        // Sites consumed by each cell, including the spacing to its successor.
        let n = cells.len();
        let widths: Vec<usize> = (0..n)
            .map(|j| {
                let next = cells.get(j + 1).copied();
                let extent = self.placement.width(cells[j])
                    + next.map_or(0, |nx| self.spacing(Some(cells[j]), Some(nx)));
                ((extent + sp - 1) / sp).max(1) as usize
            })
            .collect();
        if widths.iter().sum::<usize>() > nsites {
            return None;
        }

        // best[j][t]: cheapest placement of the first j cells within the
        // first t sites; used[j][t]: whether cell j-1 ends exactly at site t.
        let mut best = vec![vec![None::<i64>; nsites + 1]; n + 1];
        let mut used = vec![vec![false; nsites + 1]; n + 1];
        best[0].iter_mut().for_each(|b| *b = Some(0));

        for j in 1..=n {
            let wid = widths[j - 1];
            for t in 1..=nsites {
                let mut b = best[j][t - 1];
                let mut take = false;
                if t >= wid {
                    if let Some(prev) = best[j - 1][t - wid] {
                        let x = r.origin_x + (first_site + (t - wid) as i64) * sp;
                        let cost = prev + (x - targets[j - 1]).abs();
                        if b.map_or(true, |v| cost < v) {
                            b = Some(cost);
                            take = true;
                        }
                    }
                }
                best[j][t] = b;
                used[j][t] = take;
            }
        }
        best[n][nsites]?;

        let mut placed = vec![0i64; n];
        let mut t = nsites;
        let mut j = n;
        while j > 0 {
            if used[j][t] {
                let wid = widths[j - 1];
                placed[j - 1] = r.origin_x + (first_site + (t - wid) as i64) * sp;
                t -= wid;
                j -= 1;
            } else {
                t -= 1;
            }
        }
        Some(placed)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::ids::RowId;

    #[test]
    fn cells_land_on_targets_when_room_allows() {
        let design = one_row_design(100, &[(0, 20), (100, 30)]);
        let engine = make_engine(&design);
        let got = engine.shift(&[id(0), id(1)], &[200, 400], 0, 1000, RowId::from_raw(0));
        assert_eq!(got, Some(vec![200, 400]));
    }

    #[test]
    fn conflicting_targets_are_resolved_in_order() {
        let design = one_row_design(100, &[(0, 20), (100, 30)]);
        let engine = make_engine(&design);
        let got = engine
            .shift(&[id(0), id(1)], &[300, 300], 250, 400, RowId::from_raw(0))
            .unwrap();
        assert!(got[0] + 20 <= got[1]);
        assert!(got[0] >= 250 && got[1] + 30 <= 400);
        assert_eq!((got[0] - 300).abs() + (got[1] - 300).abs(), 20);
        // Leftmost among equal-cost solutions.
        assert_eq!(got, vec![280, 300]);
    }

    #[test]
    fn insufficient_capacity_returns_none() {
        // Two four-site cells in a six-site window.
        let design = one_row_design(100, &[(0, 40), (100, 40)]);
        let engine = make_engine(&design);
        let before = engine.placement().clone();
        let got = engine.shift(&[id(0), id(1)], &[100, 140], 100, 160, RowId::from_raw(0));
        assert_eq!(got, None);
        assert_eq!(engine.placement(), &before);
    }

    #[test]
    fn window_is_clipped_to_site_grid() {
        let design = one_row_design(100, &[(0, 20)]);
        let engine = make_engine(&design);
        let got = engine.shift(&[id(0)], &[0], 5, 100, RowId::from_raw(0));
        assert_eq!(got, Some(vec![10]));
    }
}
