//! Two-pass solve driver
//!
//! Pass 1 solves the full MILP (binaries: SOS2 interval selectors and
//! MNSP direction indicators). Pass 2 rebuilds the model with every
//! binary pinned at its pass-1 value and solves the remaining LP; the
//! second pass exists to recover dual information once the backend
//! exposes it, and doubles as a consistency check on the incumbent.
//!
//! Infeasibility is never expected: every physical constraint carries a
//! priced slack. A non-optimal solver status therefore surfaces as
//! [`SpdError::SolverFailure`].

use crate::model::{build_model, FixedBinaries, ModelComponents, ModelExpressions, VarIndex};
use crate::preprocess::Preprocessed;
use good_lp::solvers::highs::highs;
use good_lp::{IntoAffineExpression, Solution, SolverModel};
use spd_core::{DispatchCase, SpdError, SpdResult, TradeType};
use std::collections::BTreeMap;
use std::time::Instant;

/// Energy target above which a mode-0 fast-start unit is flagged.
const FAST_START_THRESHOLD_MW: f64 = 1e-3;

/// Aggregate violation totals reported in the case/period solution.
#[derive(Debug, Clone, Default)]
pub struct ViolationTotals {
    pub interconnector: f64,
    pub generic_constraint: f64,
    pub ramp_rate: f64,
    pub unit_capacity: f64,
    pub fast_start: f64,
    pub uigf: f64,
    pub mnsp_ramp_rate: f64,
    pub mnsp_offer: f64,
    pub mnsp_capacity: f64,
}

/// Solved variable values and evaluated expressions, keyed like the model.
#[derive(Debug, Clone, Default)]
pub struct ModelSolution {
    pub objective: f64,
    pub trader_totals: BTreeMap<(String, TradeType), f64>,
    /// Per-offer sum of band violation slacks
    pub trader_offer_violations: BTreeMap<(String, TradeType), f64>,
    pub region_dispatched_generation: BTreeMap<String, f64>,
    pub region_dispatched_load: BTreeMap<String, f64>,
    pub region_fixed_demand: BTreeMap<String, f64>,
    pub region_allocated_loss: BTreeMap<String, f64>,
    pub region_mnsp_loss: BTreeMap<String, f64>,
    pub region_interconnector_export: BTreeMap<String, f64>,
    pub region_net_export: BTreeMap<String, f64>,
    pub region_cleared_demand: BTreeMap<String, f64>,
    pub region_surplus: BTreeMap<String, f64>,
    pub region_deficit: BTreeMap<String, f64>,
    pub interconnector_flow: BTreeMap<String, f64>,
    pub interconnector_loss: BTreeMap<String, f64>,
    pub interconnector_deficit: BTreeMap<String, f64>,
    pub loss_lambda: BTreeMap<(String, usize), f64>,
    pub loss_y: BTreeMap<(String, usize), f64>,
    pub mnsp_direction: BTreeMap<String, f64>,
    pub constraint_deficits: BTreeMap<String, f64>,
    pub totals: ViolationTotals,
}

/// Outcome of the two-pass solve.
#[derive(Debug, Clone)]
pub struct SolvedCase {
    pub pass1_objective: f64,
    pub objective: f64,
    pub binaries: FixedBinaries,
    pub solution: ModelSolution,
}

fn solve_components(components: ModelComponents) -> SpdResult<(ModelSolution, FixedBinaries)> {
    let ModelComponents {
        vars,
        index,
        exprs,
        constraints,
        objective,
    } = components;

    let mut problem = vars.minimise(objective.clone()).using(highs);
    for constraint in constraints {
        problem = problem.with(constraint);
    }

    let solution = problem.solve().map_err(|e| SpdError::SolverFailure {
        status: format!("{e:?}"),
    })?;

    let extracted = extract_solution(&index, &exprs, &objective, &solution);
    let binaries = extract_binaries(&index, &solution);
    Ok((extracted, binaries))
}

fn extract_binaries<S: Solution>(index: &VarIndex, solution: &S) -> FixedBinaries {
    let mut fixed = FixedBinaries::default();
    for (key, var) in &index.loss_y {
        fixed
            .loss_y
            .insert(key.clone(), solution.value(*var).round());
    }
    for (key, var) in &index.mnsp_direction {
        fixed
            .mnsp_direction
            .insert(key.clone(), solution.value(*var).round());
    }
    fixed
}

fn extract_solution<S: Solution>(
    index: &VarIndex,
    exprs: &ModelExpressions,
    objective: &good_lp::Expression,
    solution: &S,
) -> ModelSolution {
    let mut out = ModelSolution {
        objective: objective.clone().eval_with(solution),
        ..Default::default()
    };

    for (key, var) in &index.trader_total {
        out.trader_totals.insert(key.clone(), solution.value(*var));
    }
    for ((trader_id, trade_type, _), var) in &index.cv_trader_offer {
        *out
            .trader_offer_violations
            .entry((trader_id.clone(), *trade_type))
            .or_insert(0.0) += solution.value(*var);
    }

    for (region, expr) in &exprs.region_dispatched_generation {
        out.region_dispatched_generation
            .insert(region.clone(), expr.clone().eval_with(solution));
    }
    for (region, expr) in &exprs.region_dispatched_load {
        out.region_dispatched_load
            .insert(region.clone(), expr.clone().eval_with(solution));
    }
    for (region, value) in &exprs.region_fixed_demand {
        out.region_fixed_demand.insert(region.clone(), *value);
    }
    for (region, expr) in &exprs.region_allocated_loss {
        out.region_allocated_loss
            .insert(region.clone(), expr.clone().eval_with(solution));
    }
    for (region, expr) in &exprs.region_mnsp_loss {
        out.region_mnsp_loss
            .insert(region.clone(), expr.clone().eval_with(solution));
    }
    for (region, expr) in &exprs.region_interconnector_export {
        out.region_interconnector_export
            .insert(region.clone(), expr.clone().eval_with(solution));
    }
    for (region, expr) in &exprs.region_net_export {
        out.region_net_export
            .insert(region.clone(), expr.clone().eval_with(solution));
    }
    for (region, expr) in &exprs.region_cleared_demand {
        out.region_cleared_demand
            .insert(region.clone(), expr.clone().eval_with(solution));
    }
    for (region, var) in &index.cv_region_surplus {
        out.region_surplus.insert(region.clone(), solution.value(*var));
    }
    for (region, var) in &index.cv_region_deficit {
        out.region_deficit.insert(region.clone(), solution.value(*var));
    }

    for (ic, var) in &index.gc_interconnector {
        // Only physical interconnectors carry flow; constraint-only ids
        // are reported through the constraint section
        if index.loss.contains_key(ic) {
            out.interconnector_flow.insert(ic.clone(), solution.value(*var));
        }
    }
    for (ic, var) in &index.loss {
        out.interconnector_loss.insert(ic.clone(), solution.value(*var));
    }
    for (ic, var) in &index.cv_interconnector_reverse {
        out.interconnector_deficit
            .insert(ic.clone(), solution.value(*var));
    }
    for (key, var) in &index.loss_lambda {
        out.loss_lambda.insert(key.clone(), solution.value(*var));
    }
    for (key, var) in &index.loss_y {
        out.loss_y.insert(key.clone(), solution.value(*var));
    }
    for (ic, var) in &index.mnsp_direction {
        out.mnsp_direction.insert(ic.clone(), solution.value(*var));
    }

    // Constraint deficits: the single slack for inequalities, the sum of
    // both sides for equalities
    for (id, var) in &index.cv_gc {
        let deficit = solution.value(*var)
            + solution.value(index.cv_gc_lhs[id])
            + solution.value(index.cv_gc_rhs[id]);
        out.constraint_deficits.insert(id.clone(), deficit);
    }

    out.totals = ViolationTotals {
        interconnector: sum_values(&index.cv_interconnector_forward, solution)
            + sum_values(&index.cv_interconnector_reverse, solution),
        generic_constraint: sum_values(&index.cv_gc, solution)
            + sum_values(&index.cv_gc_lhs, solution)
            + sum_values(&index.cv_gc_rhs, solution),
        ramp_rate: sum_values(&index.cv_trader_ramp_up, solution)
            + sum_values(&index.cv_trader_ramp_down, solution),
        unit_capacity: sum_values(&index.cv_trader_capacity, solution),
        fast_start: sum_values(&index.cv_inflexibility_profile, solution)
            + sum_values(&index.cv_inflexibility_profile_lhs, solution)
            + sum_values(&index.cv_inflexibility_profile_rhs, solution),
        uigf: sum_values(&index.cv_trader_uigf_surplus, solution),
        mnsp_ramp_rate: sum_values(&index.cv_mnsp_ramp_up, solution)
            + sum_values(&index.cv_mnsp_ramp_down, solution),
        mnsp_offer: sum_values(&index.cv_mnsp_offer, solution),
        mnsp_capacity: sum_values(&index.cv_mnsp_capacity, solution),
    };

    out
}

fn sum_values<K: Ord, S: Solution>(
    vars: &BTreeMap<K, good_lp::Variable>,
    solution: &S,
) -> f64 {
    vars.values().map(|v| solution.value(*v)).sum()
}

/// Solve a case: MILP pass, then LP pass with binaries pinned.
pub fn solve_case(case: &DispatchCase, pre: &Preprocessed) -> SpdResult<SolvedCase> {
    let start = Instant::now();

    let components = build_model(case, pre, None)?;
    let (pass1, binaries) = solve_components(components)?;
    tracing::info!(
        case_id = %case.case_id,
        objective = pass1.objective,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "pass 1 (MILP) solved"
    );

    let lp_start = Instant::now();
    let components = build_model(case, pre, Some(&binaries))?;
    let (pass2, _) = solve_components(components)?;
    tracing::info!(
        case_id = %case.case_id,
        objective = pass2.objective,
        elapsed_ms = lp_start.elapsed().as_millis() as u64,
        "pass 2 (LP, binaries fixed) solved"
    );

    warn_fast_start_anomalies(case, &pass2);

    Ok(SolvedCase {
        pass1_objective: pass1.objective,
        objective: pass2.objective,
        binaries,
        solution: pass2,
    })
}

/// A unit that is not committed (mode 0) but receives a positive target
/// indicates the unmodeled second dispatch run; surfaced, not solved.
fn warn_fast_start_anomalies(case: &DispatchCase, solution: &ModelSolution) {
    for trader in &case.traders {
        let Some(profile) = &trader.fast_start else {
            continue;
        };
        if profile.current_mode != Some(0) {
            continue;
        }
        let energy_type = trader.trader_type.energy_offer_type();
        let target = solution
            .trader_totals
            .get(&(trader.id.clone(), energy_type))
            .copied()
            .unwrap_or(0.0);
        if target > FAST_START_THRESHOLD_MW {
            tracing::warn!(
                trader = %trader.id,
                target,
                "fast-start unit in mode 0 received a positive energy target; \
                 a committing re-run is not modeled"
            );
        }
    }
}
