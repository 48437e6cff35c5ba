//! Analytical re-checks
//!
//! Independent recomputation of the regional demand/export accounting,
//! straight from the casefile entities and a solved model's values. These
//! deliberately do not share code with the model expressions so a bug in
//! either shows up as a residual. Used by tests only.

use crate::solve::ModelSolution;
use spd_core::{DispatchCase, SpdResult, TradeType};

/// Recompute a region's fixed demand from first principles.
pub fn region_fixed_demand(case: &DispatchCase, region_id: &str) -> SpdResult<f64> {
    let region = case
        .region(region_id)
        .ok_or_else(|| spd_core::SpdError::UnhandledRegionAllocation(region_id.to_string()))?;

    let mut scheduled_load = 0.0;
    for offer in &case.offers {
        if offer.trade_type != TradeType::Ldof {
            continue;
        }
        if let Some(trader) = case.trader(&offer.trader_id) {
            if trader.region == region_id && !trader.semi_dispatch {
                scheduled_load += trader.initial_mw;
            }
        }
    }

    let mut allocated_loss = 0.0;
    let mut mnsp_loss = 0.0;
    for ic in &case.interconnectors {
        let touches_from = ic.from_region == region_id;
        let touches_to = ic.to_region == region_id;
        if !touches_from && !touches_to {
            continue;
        }
        let loss = ic.loss_model.loss_estimate(ic.initial_mw)?;

        if let Some(mnsp) = &ic.mnsp {
            let forward = ic.initial_mw >= 0.0;
            if (touches_from && forward) || (touches_to && !forward) {
                allocated_loss += loss;
            }
            if touches_from {
                mnsp_loss += if forward {
                    (mnsp.from_region_lf_export - 1.0) * (ic.initial_mw + loss)
                } else {
                    (mnsp.from_region_lf_import - 1.0) * ic.initial_mw
                };
            } else if touches_to {
                mnsp_loss -= if forward {
                    (mnsp.to_region_lf_import - 1.0) * ic.initial_mw
                } else {
                    (mnsp.to_region_lf_export - 1.0) * (ic.initial_mw - loss)
                };
            }
        } else if touches_from {
            allocated_loss += loss * ic.loss_model.loss_share;
        } else {
            allocated_loss += loss * (1.0 - ic.loss_model.loss_share);
        }
    }

    Ok(region.initial_demand + region.ade + region.df - scheduled_load - allocated_loss - mnsp_loss)
}

/// Residual of ClearedDemand = FixedDemand + AllocatedLoss +
/// DispatchedLoad + MNSPLoss.
pub fn cleared_demand_residual(solution: &ModelSolution, region_id: &str) -> f64 {
    let rebuilt = solution.region_fixed_demand[region_id]
        + solution.region_allocated_loss[region_id]
        + solution.region_dispatched_load[region_id]
        + solution.region_mnsp_loss[region_id];
    (rebuilt - solution.region_cleared_demand[region_id]).abs()
}

/// Residual of the regional power balance
/// DispatchedGeneration = FixedDemand + DispatchedLoad + NetExport,
/// net of the priced surplus/deficit slacks.
pub fn power_balance_residual(solution: &ModelSolution, region_id: &str) -> f64 {
    let rhs = solution.region_fixed_demand[region_id]
        + solution.region_dispatched_load[region_id]
        + solution.region_net_export[region_id]
        + solution.region_surplus[region_id]
        - solution.region_deficit[region_id];
    (solution.region_dispatched_generation[region_id] - rhs).abs()
}

/// System-wide residual: generation equals cleared demand across regions.
pub fn aggregate_dispatch_residual(solution: &ModelSolution) -> f64 {
    let generation: f64 = solution.region_dispatched_generation.values().sum();
    let cleared: f64 = solution.region_cleared_demand.values().sum();
    (generation - cleared).abs()
}

/// System-wide identity: cleared demand decomposes into fixed demand,
/// all allocated losses and dispatched load.
pub fn aggregate_cleared_demand_residual(solution: &ModelSolution) -> f64 {
    let cleared: f64 = solution.region_cleared_demand.values().sum();
    let fixed: f64 = solution.region_fixed_demand.values().sum();
    let allocated: f64 = solution.region_allocated_loss.values().sum();
    let mnsp: f64 = solution.region_mnsp_loss.values().sum();
    let load: f64 = solution.region_dispatched_load.values().sum();
    (cleared - (fixed + allocated + mnsp + load)).abs()
}

/// Generic-constraint ids must be unique within a casefile.
pub fn constraint_ids_unique(case: &DispatchCase) -> bool {
    let mut ids: Vec<&str> = case.constraints.iter().map(|c| c.id.as_str()).collect();
    let before = ids.len();
    ids.sort_unstable();
    ids.dedup();
    ids.len() == before
}
