//! Early termination of plane-wave runs


use nanofdtd::prelude::*;
use test_utils::*;

fn run_with_tolerance(tolerance: f64, max_steps: usize) -> (RunSummary, Simulation) {
    let cells = [1, 1, 80];
    let mut config = column_config(cells, 10, max_steps);
    config.completion = Some(CompletionConfig {
        tolerance,
        cadence: 50,
        tracked_points: 3,
        ..Default::default()
    });
    let (model, volume) = half_space(cells, 40, 1.5);
    let mut sim = Simulation::new(config, model, volume).unwrap();
    sim.finalize().unwrap();
    let summary = sim.run().unwrap();
    (summary, sim)
}

#[test]
fn test_zero_tolerance_runs_every_step() {
    let (summary, sim) = run_with_tolerance(0.0, 400);
    assert_eq!(summary.state, EngineState::StepLimitReached);
    assert_eq!(summary.steps, 400);
    assert_eq!(summary.converged_at, None);

    let done = sim.completion().unwrap();
    assert_eq!(done.state().evaluations, 8);
    assert_eq!(done.state().step, 400);
    assert!(!done.is_converged());
    assert!(done.estimated_total_steps() <= 400);
}

#[test]
fn test_huge_tolerance_stops_at_first_evaluation() {
    let (summary, sim) = run_with_tolerance(1e30, 400);
    assert_eq!(summary.state, EngineState::Converged);
    assert_eq!(summary.steps, 50);
    assert_eq!(summary.converged_at, Some(50));
    assert_eq!(sim.completion().unwrap().time_remaining(), 0);
}

#[test]
fn test_settled_pulse_converges_early() {
    let (summary, sim) = run_with_tolerance(1e-4, 20000);
    assert_eq!(summary.state, EngineState::Converged);
    assert!(summary.steps < 20000);
    let state = sim.completion().unwrap().state();
    assert!(state.last_change.iter().all(|&c| c < 1e-4));
}

#[test]
fn test_completion_report_is_returned() {
    let (_, mut sim) = run_with_tolerance(0.0, 100);
    let reports = sim.finish().unwrap();
    let Some(SensorReport::Completion(state)) = reports.last() else {
        panic!("missing completion report");
    };
    assert_eq!(state.step, 100);
    assert_eq!(state.evaluations, 2);
}
