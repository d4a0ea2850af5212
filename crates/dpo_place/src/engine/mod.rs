//! Transactional move engine.
//!
//! The engine owns the mutable placement state: current positions, the
//! segment membership index, and the journal of staged actions. Every
//! proposal runs the same lifecycle:
//!
//! ```text
//! Idle ──propose──▶ Proposed ──verify──▶ Verified ──commit──▶ Committed
//!                      │                    │
//!                      └────rollback────────┴──────────────▶ RolledBack
//! ```
//!
//! Staged actions are applied eagerly, so the HPWL of a proposal can be
//! measured on the live placement. Rolling back replays the journal in
//! reverse. A recoverable failure (no room, displacement limit, rule
//! violation) returns `Ok(false)`; an `Err` means the index has been
//! corrupted and the run must stop.

mod assign;
mod multi;
mod single;
mod swap;
mod window;

pub use assign::AssignReport;

use crate::context::LegalizationContext;
use crate::db::{Architecture, Cell, Design, Netlist};
use crate::drc::{PlacementChecker, PlacementView};
use crate::ids::{CellId, RowId, SegmentId};
use crate::journal::{Journal, MoveAction};
use crate::placement::Placement;
use crate::segment::{build_segments, SegmentIndex, SegmentTable};
use dpo_common::{DpoResult, InternalError};
use std::collections::BTreeMap;
use tracing::debug;

/// Default cap on journal entries per proposal.
pub const DEFAULT_MOVE_LIMIT: usize = 100;

/// Where the engine is in the proposal lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// No proposal has been staged since the last commit or rollback.
    Idle,
    /// Actions are staged but not yet checked.
    Proposed,
    /// Staged actions passed the rule checker.
    Verified,
    /// The last proposal was kept.
    Committed,
    /// The last proposal was undone.
    RolledBack,
}

/// Owns the mutable placement state of one run.
pub struct MoveEngine<'a> {
    design: &'a Design,
    segments: SegmentTable,
    index: SegmentIndex,
    placement: Placement,
    original: Placement,
    spans: Vec<usize>,
    single_height: Vec<CellId>,
    multi_height: BTreeMap<usize, Vec<CellId>>,
    journal: Journal,
    move_limit: usize,
    checker: Box<dyn PlacementChecker + 'a>,
    state: TransactionState,
}

impl<'a> MoveEngine<'a> {
    /// Builds segments for `design` and an empty membership index.
    ///
    /// Cells are not yet assigned to segments; call
    /// [`assign_cells_to_segments`](Self::assign_cells_to_segments) first.
    pub fn new(design: &'a Design, checker: Box<dyn PlacementChecker + 'a>) -> DpoResult<Self> {
        let segments = build_segments(design)?;
        let placement = Placement::from_netlist(&design.netlist);
        let index = SegmentIndex::new(segments.len(), design.netlist.cell_count());

        let mut spans = Vec::with_capacity(design.netlist.cell_count());
        let mut single_height = Vec::new();
        let mut multi_height: BTreeMap<usize, Vec<CellId>> = BTreeMap::new();
        for cell in &design.netlist.cells {
            let span = design.arch.span_in_rows(cell.height);
            spans.push(span);
            if cell.fixed {
                continue;
            }
            if span == 1 {
                single_height.push(cell.id);
            } else {
                multi_height.entry(span).or_default().push(cell.id);
            }
        }
        debug!(
            segments = segments.len(),
            single = single_height.len(),
            multi = multi_height.values().map(Vec::len).sum::<usize>(),
            spans = multi_height.len(),
            "move engine created"
        );

        Ok(Self {
            design,
            segments,
            index,
            original: placement.clone(),
            placement,
            spans,
            single_height,
            multi_height,
            journal: Journal::new(),
            move_limit: DEFAULT_MOVE_LIMIT,
            checker,
            state: TransactionState::Idle,
        })
    }

    /// Sets the maximum number of actions a single proposal may stage.
    pub fn with_move_limit(mut self, limit: usize) -> Self {
        self.move_limit = limit.max(1);
        self
    }

    /// The design being placed.
    pub fn design(&self) -> &'a Design {
        self.design
    }

    /// The design's architecture.
    pub fn arch(&self) -> &'a Architecture {
        &self.design.arch
    }

    /// The design's netlist.
    pub fn netlist(&self) -> &'a Netlist {
        &self.design.netlist
    }

    /// Row segments.
    pub fn segments(&self) -> &SegmentTable {
        &self.segments
    }

    /// Segment membership.
    pub fn index(&self) -> &SegmentIndex {
        &self.index
    }

    /// Current positions.
    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    /// Positions at engine creation, before any assignment.
    pub fn original_placement(&self) -> &Placement {
        &self.original
    }

    /// Currently staged actions.
    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Lifecycle state.
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Maximum actions per proposal.
    pub fn move_limit(&self) -> usize {
        self.move_limit
    }

    /// Movable cells one row tall, in ID order.
    pub fn single_height_cells(&self) -> &[CellId] {
        &self.single_height
    }

    /// Movable cells spanning several rows, keyed by span, each group in ID
    /// order.
    pub fn multi_height_groups(&self) -> &BTreeMap<usize, Vec<CellId>> {
        &self.multi_height
    }

    /// Movable cells spanning several rows, shortest span first.
    pub fn multi_height_cells(&self) -> impl Iterator<Item = &CellId> + '_ {
        self.multi_height.values().flatten()
    }

    /// Number of rows a cell spans.
    pub fn span(&self, cell: CellId) -> usize {
        self.spans[cell.index()]
    }

    /// Static cell record.
    pub fn cell(&self, cell: CellId) -> &'a Cell {
        self.design.netlist.cell(cell)
    }

    /// First segment a cell occupies.
    pub fn segment_of(&self, cell: CellId) -> Option<SegmentId> {
        self.index.segments_of(cell).first().copied()
    }

    /// Required spacing between two cells; `None` stands for a segment edge.
    pub fn spacing(&self, left: Option<CellId>, right: Option<CellId>) -> i64 {
        self.design
            .arch
            .cell_spacing(left.map(|c| self.cell(c)), right.map(|c| self.cell(c)))
    }

    /// Read-only view for rule checking.
    pub fn view(&self) -> PlacementView<'_> {
        PlacementView {
            design: self.design,
            segments: &self.segments,
            index: &self.index,
            placement: &self.placement,
        }
    }

    /// Returns `true` if the rule checker rejects the cell where it sits.
    pub fn has_violation(&self, cell: CellId) -> bool {
        self.checker.has_violation(&self.view(), cell)
    }

    /// Consumes the engine and returns the final positions.
    pub fn into_placement(self) -> Placement {
        self.placement
    }

    /// Moves `cell` toward `(x, y)` in segment `seg` and verifies the result.
    ///
    /// Single-height cells move within their segment or into another one,
    /// shifting neighbors if needed. Multi-height cells need a free gap in
    /// every spanned row. Returns `Ok(true)` with the proposal verified and
    /// staged, or `Ok(false)` with everything rolled back.
    pub fn propose_move(
        &mut self,
        ctx: &LegalizationContext,
        cell: CellId,
        x: i64,
        y: i64,
        seg: SegmentId,
    ) -> DpoResult<bool> {
        self.begin_proposal()?;
        let staged = if self.span(cell) > 1 {
            self.try_move_multi_row(ctx, cell, x, y, seg)?
        } else if self.index.segments_of(cell).contains(&seg) {
            self.try_move_same_segment(ctx, cell, x, y, seg)?
        } else {
            self.try_move_other_segment(ctx, cell, x, y, seg)?
        };
        self.finish_proposal(staged)
    }

    /// Swaps `cell` with the single-height cell nearest to `x` in `seg`,
    /// then verifies the result.
    pub fn propose_swap(
        &mut self,
        ctx: &LegalizationContext,
        cell: CellId,
        x: i64,
        y: i64,
        seg: SegmentId,
    ) -> DpoResult<bool> {
        self.begin_proposal()?;
        let staged = self.try_swap(ctx, cell, x, y, seg)?;
        self.finish_proposal(staged)
    }

    fn begin_proposal(&mut self) -> DpoResult<()> {
        if !self.journal.is_empty() {
            return Err(InternalError::new(format!(
                "proposal started with {} unresolved staged actions",
                self.journal.len()
            )));
        }
        Ok(())
    }

    fn finish_proposal(&mut self, staged: bool) -> DpoResult<bool> {
        if staged && !self.journal.is_empty() {
            self.verify_move()
        } else {
            self.rollback()?;
            Ok(false)
        }
    }

    /// Stages one action: relocates `cell` to `(x, y)` and records it in the
    /// given segments.
    ///
    /// Returns `Ok(false)` without touching anything if the journal is full,
    /// the cell is fixed, the displacement from its original position
    /// exceeds the context's limits, or `(x, y)` is not a legal site.
    pub fn stage_move(
        &mut self,
        ctx: &LegalizationContext,
        cell: CellId,
        x: i64,
        y: i64,
        segs: &[SegmentId],
    ) -> DpoResult<bool> {
        if self.journal.len() >= self.move_limit {
            return Ok(false);
        }
        let c = self.cell(cell);
        if c.fixed {
            return Ok(false);
        }
        let dx = x - self.original.left(cell);
        let dy = y - self.original.bottom(cell);
        if !ctx.limits().allows(dx, dy) {
            return Ok(false);
        }
        if !self.design.arch.is_valid_site(c, x, y) {
            return Ok(false);
        }

        let span = self.span(cell);
        let orig_segs = self.index.segments_of(cell).to_vec();
        let orig_left = self.placement.left(cell);
        let orig_bottom = self.placement.bottom(cell);
        for &s in &orig_segs {
            self.index.remove(s, cell, &self.placement)?;
        }
        self.placement.set(cell, x, y);
        for &s in segs {
            self.index.insert(s, cell, &self.placement, span)?;
        }
        self.journal.push(MoveAction {
            cell,
            orig_left,
            orig_bottom,
            orig_segs,
            new_left: x,
            new_bottom: y,
            new_segs: segs.to_vec(),
        });
        self.state = TransactionState::Proposed;
        Ok(true)
    }

    /// Checks every cell touched by the staged actions.
    ///
    /// On a violation the proposal is rolled back and `Ok(false)` returned.
    pub fn verify_move(&mut self) -> DpoResult<bool> {
        self.resort_touched();
        for cell in self.journal.affected_cells() {
            if self.has_violation(cell) {
                self.rollback()?;
                return Ok(false);
            }
        }
        self.state = TransactionState::Verified;
        Ok(true)
    }

    /// Keeps the staged actions and clears the journal.
    pub fn commit(&mut self) {
        self.journal.clear();
        self.state = TransactionState::Committed;
    }

    /// Undoes every staged action in reverse order and clears the journal.
    pub fn rollback(&mut self) -> DpoResult<()> {
        let actions = self.journal.take();
        self.undo(&actions)?;
        self.state = TransactionState::RolledBack;
        Ok(())
    }

    /// Undoes previously committed actions in reverse order.
    ///
    /// Used by callers that record their own history across commits.
    pub fn undo_actions(&mut self, actions: &[MoveAction]) -> DpoResult<()> {
        if !self.journal.is_empty() {
            return Err(InternalError::new(
                "cannot undo committed actions while a proposal is staged",
            ));
        }
        self.undo(actions)
    }

    fn undo(&mut self, actions: &[MoveAction]) -> DpoResult<()> {
        for a in actions.iter().rev() {
            for &s in &a.new_segs {
                self.index.remove(s, a.cell, &self.placement)?;
            }
            self.placement.set(a.cell, a.orig_left, a.orig_bottom);
            let span = self.span(a.cell);
            for &s in &a.orig_segs {
                self.index.insert(s, a.cell, &self.placement, span)?;
            }
        }
        for seg in touched_segments(actions) {
            self.index.resort(seg, &self.placement);
        }
        Ok(())
    }

    fn resort_touched(&mut self) {
        for seg in touched_segments(self.journal.actions()) {
            self.index.resort(seg, &self.placement);
        }
    }

    /// Re-sorts every segment by center X.
    pub fn resort_segments(&mut self) {
        self.index.resort_all(&self.placement);
    }

    /// Checks that the membership index agrees with itself.
    pub fn check_consistency(&self) -> DpoResult<()> {
        self.index.check_consistency(&self.placement)
    }

    /// Clamps `xi` into `[xl, xr - width]` on the site grid of `row`.
    ///
    /// Returns `None` if no site-aligned position fits.
    pub(crate) fn align_pos(&self, cell: CellId, xi: i64, xl: i64, xr: i64, row: RowId) -> Option<i64> {
        let r = self.design.arch.row(row);
        let xr = xr - self.placement.width(cell);
        let mut xp = xl.max(xi.min(xr));
        xp = r.snap_down(xp);
        if xp < xl {
            xp += r.site_spacing;
        } else if xp > xr {
            xp -= r.site_spacing;
        }
        (xp >= xl && xp <= xr).then_some(xp)
    }
}

fn touched_segments(actions: &[MoveAction]) -> Vec<SegmentId> {
    let mut segs: Vec<SegmentId> = actions
        .iter()
        .flat_map(|a| a.orig_segs.iter().chain(a.new_segs.iter()).copied())
        .collect();
    segs.sort_unstable();
    segs.dedup();
    segs
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::db::{Architecture, Cell, Netlist};
    use crate::drc::EdgeSpacingChecker;

    /// One row of `sites` ten-unit sites, 100 units tall, with the given
    /// `(left, width)` cells.
    pub fn one_row_design(sites: i64, cells: &[(i64, i64)]) -> Design {
        let mut nl = Netlist::new();
        for (i, &(left, width)) in cells.iter().enumerate() {
            nl.add_cell(Cell::new(format!("c{i}"), width, 100).at(left, 0));
        }
        Design::new(Architecture::uniform(1, 100, sites, 10), nl)
    }

    /// An assigned engine with the default checker.
    pub fn make_engine(design: &Design) -> MoveEngine<'_> {
        let mut engine = MoveEngine::new(design, Box::new(EdgeSpacingChecker::default())).unwrap();
        engine.assign_cells_to_segments().unwrap();
        engine
    }

    pub fn id(i: u32) -> CellId {
        CellId::from_raw(i)
    }
}
