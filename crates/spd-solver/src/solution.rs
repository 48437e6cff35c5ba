//! Solution serialization
//!
//! Produces the structured output document. Attribute names mirror the
//! casefile's solution mirror (`@EnergyTarget`, `@R6Target`, ...) so the
//! output can be diffed against it directly. In validation mode every
//! numeric scalar becomes `{model, actual, difference, abs_difference}`
//! against the reference solution embedded in the casefile.

use crate::solve::SolvedCase;
use serde_json::{json, Map, Value};
use spd_core::types::FCAS_TRADE_TYPES;
use spd_core::{DispatchCase, SolutionFormat, SpdError, SpdResult, TradeType};

/// Serialize the solved case in the requested format.
pub fn serialize_solution(
    case: &DispatchCase,
    solved: &SolvedCase,
    format: SolutionFormat,
) -> SpdResult<Value> {
    match format {
        SolutionFormat::Standard => Ok(standard_solution(case, solved)),
        SolutionFormat::Validation => validation_solution(case, solved),
    }
}

fn comparison(model: f64, actual: f64) -> Value {
    json!({
        "model": model,
        "actual": actual,
        "difference": model - actual,
        "abs_difference": (model - actual).abs(),
    })
}

fn trader_energy_target(case: &DispatchCase, solved: &SolvedCase, trader_id: &str) -> f64 {
    let Some(trader) = case.trader(trader_id) else {
        return 0.0;
    };
    solved
        .solution
        .trader_totals
        .get(&(trader_id.to_string(), trader.trader_type.energy_offer_type()))
        .copied()
        .unwrap_or(0.0)
}

fn trader_fcas_target(solved: &SolvedCase, trader_id: &str, trade_type: TradeType) -> f64 {
    solved
        .solution
        .trader_totals
        .get(&(trader_id.to_string(), trade_type))
        .copied()
        .unwrap_or(0.0)
}

fn trader_fcas_violation(solved: &SolvedCase, trader_id: &str, trade_type: TradeType) -> f64 {
    solved
        .solution
        .trader_offer_violations
        .get(&(trader_id.to_string(), trade_type))
        .copied()
        .unwrap_or(0.0)
}

/// Total FCAS dispatch of one service within one region.
fn region_fcas_dispatch(
    case: &DispatchCase,
    solved: &SolvedCase,
    region_id: &str,
    trade_type: TradeType,
) -> f64 {
    solved
        .solution
        .trader_totals
        .iter()
        .filter(|((trader_id, tt), _)| {
            *tt == trade_type
                && case
                    .trader(trader_id)
                    .map(|t| t.region == region_id)
                    .unwrap_or(false)
        })
        .map(|(_, value)| value)
        .sum()
}

fn case_solution(case: &DispatchCase, solved: &SolvedCase) -> Value {
    let totals = &solved.solution.totals;
    json!({
        "@InterventionStatus": case.intervention,
        "@TotalInterconnectorViolation": totals.interconnector,
        "@TotalGenericViolation": totals.generic_constraint,
        "@TotalRampRateViolation": totals.ramp_rate,
        "@TotalUnitMWCapacityViolation": totals.unit_capacity,
        "@TotalFastStartViolation": totals.fast_start,
        "@TotalUIGFViolation": totals.uigf,
    })
}

fn period_solution(case: &DispatchCase, solved: &SolvedCase) -> Value {
    let totals = &solved.solution.totals;
    json!({
        "@CaseID": case.case_id,
        "@Intervention": case.intervention,
        "@TotalObjective": solved.objective,
        "@TotalInterconnectorViolation": totals.interconnector,
        "@TotalGenericViolation": totals.generic_constraint,
        "@TotalRampRateViolation": totals.ramp_rate,
        "@TotalUnitMWCapacityViolation": totals.unit_capacity,
        "@TotalFastStartViolation": totals.fast_start,
        "@TotalMNSPRampRateViolation": totals.mnsp_ramp_rate,
        "@TotalMNSPOfferViolation": totals.mnsp_offer,
        "@TotalMNSPCapacityViolation": totals.mnsp_capacity,
        "@TotalUIGFViolation": totals.uigf,
    })
}

fn standard_solution(case: &DispatchCase, solved: &SolvedCase) -> Value {
    let solution = &solved.solution;

    let regions: Vec<Value> = case
        .regions
        .iter()
        .map(|region| {
            let id = region.id.as_str();
            let mut out = Map::new();
            out.insert("@RegionID".to_string(), json!(id));
            out.insert("@CaseID".to_string(), json!(case.case_id));
            out.insert("@Intervention".to_string(), json!(case.intervention));
            out.insert(
                "@DispatchedGeneration".to_string(),
                json!(solution.region_dispatched_generation[id]),
            );
            out.insert(
                "@DispatchedLoad".to_string(),
                json!(solution.region_dispatched_load[id]),
            );
            out.insert(
                "@FixedDemand".to_string(),
                json!(solution.region_fixed_demand[id]),
            );
            out.insert("@NetExport".to_string(), json!(solution.region_net_export[id]));
            out.insert(
                "@SurplusGeneration".to_string(),
                json!(solution.region_surplus[id]),
            );
            for trade_type in FCAS_TRADE_TYPES {
                if let Some(name) = trade_type.region_dispatch_attribute() {
                    out.insert(
                        name.to_string(),
                        json!(region_fcas_dispatch(case, solved, id, trade_type)),
                    );
                }
            }
            out.insert(
                "@ClearedDemand".to_string(),
                json!(solution.region_cleared_demand[id]),
            );
            Value::Object(out)
        })
        .collect();

    let traders: Vec<Value> = case
        .traders
        .iter()
        .map(|trader| {
            let mut out = Map::new();
            out.insert("@TraderID".to_string(), json!(trader.id));
            out.insert("@CaseID".to_string(), json!(case.case_id));
            out.insert("@Intervention".to_string(), json!(case.intervention));
            out.insert(
                "@EnergyTarget".to_string(),
                json!(trader_energy_target(case, solved, &trader.id)),
            );
            for trade_type in FCAS_TRADE_TYPES {
                if let Some(name) = trade_type.target_attribute() {
                    out.insert(
                        name.to_string(),
                        json!(trader_fcas_target(solved, &trader.id, trade_type)),
                    );
                }
                if let Some(name) = trade_type.violation_attribute() {
                    out.insert(
                        name.to_string(),
                        json!(trader_fcas_violation(solved, &trader.id, trade_type)),
                    );
                }
            }
            Value::Object(out)
        })
        .collect();

    let interconnectors: Vec<Value> = case
        .interconnectors
        .iter()
        .map(|ic| {
            json!({
                "@InterconnectorID": ic.id,
                "@CaseID": case.case_id,
                "@Intervention": case.intervention,
                "@Flow": solution.interconnector_flow[&ic.id],
                "@Losses": solution.interconnector_loss[&ic.id],
                "@Deficit": solution.interconnector_deficit[&ic.id],
            })
        })
        .collect();

    let constraints: Vec<Value> = case
        .constraints
        .iter()
        .map(|gc| {
            json!({
                "@ConstraintID": gc.id,
                "@CaseID": case.case_id,
                "@RHS": gc.rhs,
                "@Deficit": solution.constraint_deficits[&gc.id],
            })
        })
        .collect();

    json!({
        "CaseSolution": case_solution(case, solved),
        "PeriodSolution": period_solution(case, solved),
        "RegionSolution": regions,
        "TraderSolution": traders,
        "InterconnectorSolution": interconnectors,
        "ConstraintSolution": constraints,
    })
}

fn validation_solution(case: &DispatchCase, solved: &SolvedCase) -> SpdResult<Value> {
    let reference = case.reference.as_ref().ok_or_else(|| {
        SpdError::CasefileValue(
            "validation output requires the casefile's reference solution".to_string(),
        )
    })?;
    let solution = &solved.solution;

    let regions: Vec<Value> = case
        .regions
        .iter()
        .map(|region| {
            let id = region.id.as_str();
            let actual = reference.regions.get(id).cloned().unwrap_or_default();
            json!({
                "@RegionID": id,
                "@CaseID": case.case_id,
                "@Intervention": case.intervention,
                "@DispatchedGeneration": comparison(
                    solution.region_dispatched_generation[id],
                    actual.dispatched_generation,
                ),
                "@DispatchedLoad": comparison(
                    solution.region_dispatched_load[id],
                    actual.dispatched_load,
                ),
                "@FixedDemand": comparison(solution.region_fixed_demand[id], actual.fixed_demand),
                "@NetExport": comparison(solution.region_net_export[id], actual.net_export),
                "@SurplusGeneration": comparison(
                    solution.region_surplus[id],
                    actual.surplus_generation,
                ),
                "@ClearedDemand": comparison(
                    solution.region_cleared_demand[id],
                    actual.cleared_demand,
                ),
            })
        })
        .collect();

    let traders: Vec<Value> = case
        .traders
        .iter()
        .map(|trader| {
            let actual = reference.traders.get(&trader.id).cloned().unwrap_or_default();
            let mut out = Map::new();
            out.insert("@TraderID".to_string(), json!(trader.id));
            out.insert("@CaseID".to_string(), json!(case.case_id));
            out.insert("@Intervention".to_string(), json!(case.intervention));
            out.insert(
                "@EnergyTarget".to_string(),
                comparison(
                    trader_energy_target(case, solved, &trader.id),
                    actual.energy_target,
                ),
            );
            for trade_type in FCAS_TRADE_TYPES {
                if let Some(name) = trade_type.target_attribute() {
                    out.insert(
                        name.to_string(),
                        comparison(
                            trader_fcas_target(solved, &trader.id, trade_type),
                            actual.fcas_targets.get(&trade_type).copied().unwrap_or(0.0),
                        ),
                    );
                }
                if let Some(name) = trade_type.violation_attribute() {
                    out.insert(
                        name.to_string(),
                        comparison(
                            trader_fcas_violation(solved, &trader.id, trade_type),
                            actual
                                .fcas_violations
                                .get(&trade_type)
                                .copied()
                                .unwrap_or(0.0),
                        ),
                    );
                }
            }
            Value::Object(out)
        })
        .collect();

    let interconnectors: Vec<Value> = case
        .interconnectors
        .iter()
        .map(|ic| {
            let actual = reference
                .interconnectors
                .get(&ic.id)
                .cloned()
                .unwrap_or_default();
            json!({
                "@InterconnectorID": ic.id,
                "@CaseID": case.case_id,
                "@Intervention": case.intervention,
                "@Flow": comparison(solution.interconnector_flow[&ic.id], actual.flow),
                "@Losses": comparison(solution.interconnector_loss[&ic.id], actual.losses),
                "@Deficit": comparison(solution.interconnector_deficit[&ic.id], actual.deficit),
            })
        })
        .collect();

    let constraints: Vec<Value> = case
        .constraints
        .iter()
        .map(|gc| {
            let actual = reference.constraints.get(&gc.id).cloned().unwrap_or_default();
            json!({
                "@ConstraintID": gc.id,
                "@CaseID": case.case_id,
                "@RHS": comparison(gc.rhs, actual.rhs),
                "@Deficit": comparison(solution.constraint_deficits[&gc.id], actual.deficit),
            })
        })
        .collect();

    let period_actual = reference.period.clone().unwrap_or_default();
    let mut period = period_solution(case, solved);
    if let Some(map) = period.as_object_mut() {
        map.insert(
            "@TotalObjective".to_string(),
            comparison(solved.objective, period_actual.total_objective),
        );
    }

    Ok(json!({
        "CaseSolution": case_solution(case, solved),
        "PeriodSolution": period,
        "RegionSolution": regions,
        "TraderSolution": traders,
        "InterconnectorSolution": interconnectors,
        "ConstraintSolution": constraints,
    }))
}
