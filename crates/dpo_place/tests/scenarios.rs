//! End-to-end scenarios for the move engine, the generators, and the
//! optimization pipeline.

use dpo_config::{DpoConfig, FlowConfig, GlobalSwapConfig, ReorderConfig};
use dpo_diagnostics::{DiagnosticSink, Severity};
use dpo_place::generators::{GlobalSwap, WindowReorder};
use dpo_place::{
    default_checker, optimize, total_hpwl, Architecture, Cell, CellId, Design, EdgeSpacingChecker,
    GeneratorArgs, LegalizationContext, MoveEngine, MoveGenerator, Netlist, Placement,
    TransactionState,
};

fn make_engine(design: &Design) -> MoveEngine<'_> {
    let mut engine = MoveEngine::new(design, Box::new(EdgeSpacingChecker::default())).unwrap();
    engine.assign_cells_to_segments().unwrap();
    engine
}

/// Two cells each wired to a fixed anchor beyond the other one.
fn crossed_design() -> Design {
    let mut nl = Netlist::new();
    let a = nl.add_cell(Cell::new("a", 20, 100).at(100, 0));
    let b = nl.add_cell(Cell::new("b", 20, 100).at(120, 0));
    let fl = nl.add_cell(Cell::new("fl", 10, 100).at(0, 0).fixed());
    let fr = nl.add_cell(Cell::new("fr", 10, 100).at(290, 0).fixed());
    let n0 = nl.add_net("n0");
    nl.connect(a, n0, 0, 0);
    nl.connect(fr, n0, 0, 0);
    let n1 = nl.add_net("n1");
    nl.connect(b, n1, 0, 0);
    nl.connect(fl, n1, 0, 0);
    Design::new(Architecture::uniform(1, 100, 30, 10), nl)
}

#[test]
fn simple_move_lands_aligned() {
    let mut nl = Netlist::new();
    let c = nl.add_cell(Cell::new("c", 20, 100).at(100, 0));
    let design = Design::new(Architecture::uniform(1, 100, 100, 10), nl);
    let mut engine = make_engine(&design);
    let ctx = LegalizationContext::new(1, &design.arch);
    let seg = engine.segment_of(c).unwrap();

    assert!(engine.propose_move(&ctx, c, 500, 0, seg).unwrap());
    assert_eq!(engine.state(), TransactionState::Verified);
    engine.commit();

    let p = engine.placement();
    assert_eq!(p.left(c), 500);
    assert_eq!(p.left(c) % 10, 0);
    assert!(p.left(c) >= 0 && p.left(c) <= 1000 - 20);
    assert!(engine.journal().is_empty());
    engine.check_consistency().unwrap();
}

#[test]
fn blocked_swap_changes_nothing() {
    // Fixed cells leave a six-site window; the two four-site cells cannot
    // both fit in it in either order.
    let mut nl = Netlist::new();
    let a = nl.add_cell(Cell::new("a", 40, 100).at(50, 0));
    let b = nl.add_cell(Cell::new("b", 40, 100).at(70, 0));
    nl.add_cell(Cell::new("wl", 50, 100).at(0, 0).fixed());
    nl.add_cell(Cell::new("wr", 90, 100).at(110, 0).fixed());
    let design = Design::new(Architecture::uniform(1, 100, 20, 10), nl);
    let mut engine = make_engine(&design);
    let ctx = LegalizationContext::new(1, &design.arch);
    let seg = engine.segment_of(a).unwrap();
    assert_eq!(engine.segment_of(b), Some(seg));

    let before = engine.placement().clone();
    assert!(!engine.propose_swap(&ctx, a, 90, 0, seg).unwrap());
    assert_eq!(engine.placement(), &before);
    assert!(engine.journal().is_empty());
    assert_eq!(engine.state(), TransactionState::RolledBack);
    engine.check_consistency().unwrap();
}

#[test]
fn displacement_limit_blocks_far_moves() {
    let mut nl = Netlist::new();
    let c = nl.add_cell(Cell::new("c", 20, 100).at(100, 0));
    let design = Design::new(Architecture::uniform(1, 100, 100, 10), nl);
    let mut engine = make_engine(&design);
    let mut ctx = LegalizationContext::new(1, &design.arch);
    ctx.set_max_displacement(1, 1);
    let seg = engine.segment_of(c).unwrap();

    assert!(!engine.propose_move(&ctx, c, 500, 0, seg).unwrap());
    assert_eq!(engine.placement().left(c), 100);
    assert!(engine.propose_move(&ctx, c, 180, 0, seg).unwrap());
    engine.commit();
    let moved = engine.placement().left(c) - engine.original_placement().left(c);
    assert!(moved.abs() <= ctx.limits().max_x);
}

#[test]
fn relegalizing_is_idempotent() {
    let mut nl = Netlist::new();
    nl.add_cell(Cell::new("a", 20, 100).at(103, 40));
    nl.add_cell(Cell::new("b", 30, 100).at(517, 260));
    nl.add_cell(Cell::new("t", 20, 200).at(255, 90));
    let design = Design::new(Architecture::uniform(4, 100, 100, 10), nl);
    let mut engine = make_engine(&design);
    let first = engine.placement().clone();
    let report = engine.assign_cells_to_segments().unwrap();
    assert_eq!(engine.placement(), &first);
    assert_eq!(report.moved, 0);
    engine.check_consistency().unwrap();
}

/// Pairs of connected cells scattered over a four-row chip.
fn scattered_design() -> Design {
    let mut nl = Netlist::new();
    for i in 0..8i64 {
        let a = nl.add_cell(Cell::new(format!("a{i}"), 20, 100).at(30 + 60 * i, (i % 4) * 100));
        let b = nl.add_cell(Cell::new(format!("b{i}"), 20, 100).at(940 - 50 * i, ((i + 2) % 4) * 100));
        let c = nl.add_cell(Cell::new(format!("c{i}"), 30, 100).at(500 + 20 * i, ((i + 3) % 4) * 100));
        let n = nl.add_net(format!("n{i}"));
        nl.connect(a, n, 0, 0);
        nl.connect(b, n, 5, 0);
        nl.connect(c, n, -5, 0);
    }
    Design::new(Architecture::uniform(4, 100, 100, 10), nl)
}

#[test]
fn global_swap_respects_budget() {
    let design = scattered_design();
    for seed in [1, 5, 9] {
        let mut engine = make_engine(&design);
        let mut ctx = LegalizationContext::new(seed, &design.arch);
        let config = GlobalSwapConfig::default();
        let mut gs = GlobalSwap::new(config.clone());
        let report = gs.run(&mut engine, &mut ctx, &GeneratorArgs::default()).unwrap();

        let cap = (gs.optimal() as f64 * config.profiling_excess).floor() as i64;
        assert_eq!(gs.budget(), cap.max(report.initial), "seed {seed}");
        assert!(report.stats.accepted > 0, "seed {seed}");
        assert!(report.final_objective <= gs.budget(), "seed {seed}");
        assert!(report.final_objective < report.initial, "seed {seed}");
        for stage in gs.stages() {
            let peak = stage.peak.unwrap_or(i64::MIN);
            assert!(peak <= stage.budget, "seed {seed}: {stage:?}");
        }
        assert!(engine.journal().is_empty());
        engine.check_consistency().unwrap();
    }
}

#[test]
fn global_swap_rerun_keeps_budget() {
    let design = scattered_design();
    let mut engine = make_engine(&design);
    let mut ctx = LegalizationContext::new(1, &design.arch);
    GlobalSwap::new(GlobalSwapConfig::default())
        .run(&mut engine, &mut ctx, &GeneratorArgs::default())
        .unwrap();

    // The second invocation starts from an already optimized placement.
    let config = GlobalSwapConfig::default();
    let mut gs = GlobalSwap::new(config.clone());
    let report = gs.run(&mut engine, &mut ctx, &GeneratorArgs::default()).unwrap();
    let cap = (gs.optimal() as f64 * config.profiling_excess).floor() as i64;
    for stage in gs.stages() {
        assert_eq!(stage.budget, cap.max(report.initial));
        if let Some(peak) = stage.peak {
            assert!(peak <= cap.max(report.initial), "{stage:?}");
        }
    }
    assert!(report.final_objective <= cap.max(report.initial));
}

#[test]
fn window_reorder_adopts_better_order() {
    let design = crossed_design();
    let mut engine = make_engine(&design);
    let mut ctx = LegalizationContext::new(1, &design.arch);
    let before = total_hpwl(&design.netlist, engine.placement());
    let mut ro = WindowReorder::new(ReorderConfig::default());
    let args = GeneratorArgs::parse_tokens(["-w", "2"]).unwrap();
    let report = ro.run(&mut engine, &mut ctx, &args).unwrap();

    let (a, b) = (CellId::from_raw(0), CellId::from_raw(1));
    let p = engine.placement();
    assert!(p.left(b) < p.left(a));
    assert_eq!(p.left(a) % 10, 0);
    assert_eq!(p.left(b) % 10, 0);
    assert!(report.final_objective < before);
}

#[test]
fn window_reorder_sorts_three_cell_window() {
    let mut nl = Netlist::new();
    let a = nl.add_cell(Cell::new("a", 20, 100).at(100, 0));
    let b = nl.add_cell(Cell::new("b", 20, 100).at(120, 0));
    let c = nl.add_cell(Cell::new("c", 20, 100).at(140, 0));
    let fl = nl.add_cell(Cell::new("fl", 10, 100).at(0, 0).fixed());
    let fr = nl.add_cell(Cell::new("fr", 10, 100).at(290, 0).fixed());
    for (name, cell, anchor) in [("n0", a, fr), ("n1", b, fl), ("n2", b, fr), ("n3", c, fl)] {
        let n = nl.add_net(name);
        nl.connect(cell, n, 0, 0);
        nl.connect(anchor, n, 0, 0);
    }
    let design = Design::new(Architecture::uniform(1, 100, 30, 10), nl);
    let mut engine = make_engine(&design);
    let mut ctx = LegalizationContext::new(1, &design.arch);
    let before = total_hpwl(&design.netlist, engine.placement());
    let args = GeneratorArgs::parse_tokens(["-w", "3"]).unwrap();
    let report = WindowReorder::new(ReorderConfig::default())
        .run(&mut engine, &mut ctx, &args)
        .unwrap();

    let p = engine.placement();
    assert!(p.left(c) < p.left(b) && p.left(b) < p.left(a));
    for cell in [a, b, c] {
        assert_eq!(p.left(cell) % 10, 0);
    }
    assert!(report.final_objective < before);
    assert_eq!(report.final_objective, total_hpwl(&design.netlist, p));
    engine.check_consistency().unwrap();
}

#[test]
fn window_reorder_keeps_best_order() {
    let design = crossed_design();
    let mut engine = make_engine(&design);
    let mut ctx = LegalizationContext::new(1, &design.arch);
    let args = GeneratorArgs::parse_tokens(["-w", "2"]).unwrap();
    WindowReorder::new(ReorderConfig::default())
        .run(&mut engine, &mut ctx, &args)
        .unwrap();
    let settled = engine.placement().clone();

    let report = WindowReorder::new(ReorderConfig::default())
        .run(&mut engine, &mut ctx, &args)
        .unwrap();
    assert_eq!(engine.placement(), &settled);
    assert_eq!(report.stats.accepted, 0);
}

#[test]
fn pipeline_reports_bad_steps_and_finishes() {
    let mut design = scattered_design();
    let before = total_hpwl(&design.netlist, &Placement::from_netlist(&design.netlist));
    let config = DpoConfig {
        flow: FlowConfig {
            script: vec![
                "mis -p 1".to_string(),
                "gs -p oops".to_string(),
                "vs -p 1".to_string(),
                "ro -p 1 -w 3".to_string(),
            ],
        },
        ..DpoConfig::default()
    };
    let sink = DiagnosticSink::new();
    let report = optimize(&mut design, &config, default_checker(&config), &sink).unwrap();

    let names: Vec<&str> = report.steps.iter().map(|s| s.generator).collect();
    assert_eq!(names, ["mis", "vs", "ro"]);
    let errors: Vec<String> = sink
        .diagnostics()
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .map(|d| d.code.to_string())
        .collect();
    assert_eq!(errors, ["S001"]);
    assert!(report.violations.is_clean(), "{}", report.violations);
    assert!(report.final_hpwl <= before);

    let written = Placement::from_netlist(&design.netlist);
    assert_eq!(total_hpwl(&design.netlist, &written), report.final_hpwl);
}
