//! Model expressions
//!
//! Linear expressions shared by constraints, the objective and the
//! solution serializer: offer costs, the total violation penalty, generic
//! constraint LHS terms, MNSP connection-point flows and loss
//! allocations, and the per-region demand/export accounting chain.
//!
//! Fixed demand is a pure constant:
//!
//! ```text
//! FixedDemand = InitialDemand + ADE + DF
//!             - InitialScheduledLoad - InitialAllocatedLoss - InitialMNSPLoss
//! ```
//!
//! while AllocatedLoss/MNSPLoss/NetExport/ClearedDemand are affine in the
//! decision variables and re-evaluated after the solve.

use super::vars::VarIndex;
use crate::preprocess::Preprocessed;
use good_lp::Expression;
use spd_core::{DispatchCase, Interconnector, SpdError, SpdResult, TradeType};
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct ModelExpressions {
    pub trader_cost: Expression,
    pub mnsp_cost: Expression,
    pub tie_break_cost: Expression,
    pub cv_penalty: Expression,
    pub gc_lhs: BTreeMap<String, Expression>,

    pub mnsp_from_cp_flow: BTreeMap<String, Expression>,
    pub mnsp_to_cp_flow: BTreeMap<String, Expression>,
    pub mnsp_from_region_loss: BTreeMap<String, Expression>,
    pub mnsp_to_region_loss: BTreeMap<String, Expression>,

    pub region_dispatched_generation: BTreeMap<String, Expression>,
    pub region_dispatched_load: BTreeMap<String, Expression>,
    pub region_initial_scheduled_load: BTreeMap<String, f64>,
    pub region_initial_allocated_loss: BTreeMap<String, f64>,
    pub region_initial_mnsp_loss: BTreeMap<String, f64>,
    pub region_fixed_demand: BTreeMap<String, f64>,
    pub region_allocated_loss: BTreeMap<String, Expression>,
    pub region_mnsp_loss: BTreeMap<String, Expression>,
    pub region_interconnector_export: BTreeMap<String, Expression>,
    pub region_net_export: BTreeMap<String, Expression>,
    pub region_cleared_demand: BTreeMap<String, Expression>,

    /// min(EnablementMax, HMW, UIGF) for regulation offers
    pub effective_enablement_max: BTreeMap<(String, TradeType), f64>,
    /// max(EnablementMin, LMW) for regulation offers
    pub effective_enablement_min: BTreeMap<(String, TradeType), f64>,
}

/// Does the interconnector touch the region, and at which end?
enum Endpoint {
    From,
    To,
}

fn endpoint(ic: &Interconnector, region: &str) -> Option<Endpoint> {
    if ic.from_region == region {
        Some(Endpoint::From)
    } else if ic.to_region == region {
        Some(Endpoint::To)
    } else {
        None
    }
}

pub fn define_expressions(
    case: &DispatchCase,
    pre: &Preprocessed,
    index: &VarIndex,
) -> SpdResult<ModelExpressions> {
    let mut exprs = ModelExpressions::default();

    define_cost_expressions(case, index, &mut exprs);
    define_generic_constraint_lhs(case, index, &mut exprs);
    define_mnsp_expressions(case, pre, index, &mut exprs);
    define_region_expressions(case, pre, index, &mut exprs)?;
    define_fcas_effective_enablement(case, &mut exprs);
    define_penalty_expression(case, index, &mut exprs);
    define_tie_break_cost(case, index, &mut exprs);

    Ok(exprs)
}

/// As-bid cost: generators add cost, load offers enter with a -1 factor.
fn define_cost_expressions(case: &DispatchCase, index: &VarIndex, exprs: &mut ModelExpressions) {
    let mut trader_cost = Expression::from(0.0);
    for offer in &case.offers {
        let factor = if offer.trade_type == TradeType::Ldof {
            -1.0
        } else {
            1.0
        };
        for band in 1..=10 {
            let var = index.trader_offer[&(offer.trader_id.clone(), offer.trade_type, band)];
            trader_cost += factor * offer.price_bands[band - 1] * var;
        }
    }
    exprs.trader_cost = trader_cost;

    let mut mnsp_cost = Expression::from(0.0);
    for ic in &case.interconnectors {
        let Some(mnsp) = &ic.mnsp else { continue };
        for offer in &mnsp.offers {
            for band in 1..=10 {
                let var = index.mnsp_offer[&(ic.id.clone(), offer.region.clone(), band)];
                mnsp_cost += offer.price_bands[band - 1] * var;
            }
        }
    }
    exprs.mnsp_cost = mnsp_cost;
}

/// Generic constraint LHS terms. Factors naming variables outside the
/// model's variable set are silently skipped.
fn define_generic_constraint_lhs(case: &DispatchCase, index: &VarIndex, exprs: &mut ModelExpressions) {
    for constraint in &case.constraints {
        let mut lhs = Expression::from(0.0);
        for (trader_id, trade_type, factor) in &constraint.trader_factors {
            if let Some(var) = index.gc_trader.get(&(trader_id.clone(), *trade_type)) {
                lhs += *factor * *var;
            }
        }
        for (ic_id, factor) in &constraint.interconnector_factors {
            if let Some(var) = index.gc_interconnector.get(ic_id) {
                lhs += *factor * *var;
            }
        }
        for (region_id, trade_type, factor) in &constraint.region_factors {
            if let Some(var) = index.gc_region.get(&(region_id.clone(), *trade_type)) {
                lhs += *factor * *var;
            }
        }
        exprs.gc_lhs.insert(constraint.id.clone(), lhs);
    }
}

/// MNSP connection-point flows and region loss allocations.
fn define_mnsp_expressions(
    case: &DispatchCase,
    pre: &Preprocessed,
    index: &VarIndex,
    exprs: &mut ModelExpressions,
) {
    for ic in &case.interconnectors {
        let Some(mnsp) = &ic.mnsp else { continue };
        let flow = index.gc_interconnector[&ic.id];
        let loss = index.loss[&ic.id];

        let from_indicator = pre.mnsp_loss_indicator[&(ic.id.clone(), ic.from_region.clone())];
        let to_indicator = pre.mnsp_loss_indicator[&(ic.id.clone(), ic.to_region.clone())];

        // Sending-end convention: losses ride on the connection-point flow
        // at whichever end the loss indicator selects
        exprs
            .mnsp_from_cp_flow
            .insert(ic.id.clone(), flow + from_indicator * loss);
        exprs
            .mnsp_to_cp_flow
            .insert(ic.id.clone(), flow - to_indicator * loss);

        let from_export = index.mnsp_from_region_export[&ic.id];
        let from_import = index.mnsp_from_region_import[&ic.id];
        let to_export = index.mnsp_to_region_export[&ic.id];
        let to_import = index.mnsp_to_region_import[&ic.id];

        exprs.mnsp_from_region_loss.insert(
            ic.id.clone(),
            (mnsp.from_region_lf_export - 1.0) * from_export
                + (mnsp.from_region_lf_import - 1.0) * from_import,
        );
        // To-region flows are signed from the to-region's perspective
        exprs.mnsp_to_region_loss.insert(
            ic.id.clone(),
            -(mnsp.to_region_lf_export - 1.0) * to_export
                - (mnsp.to_region_lf_import - 1.0) * to_import,
        );
    }
}

fn define_region_expressions(
    case: &DispatchCase,
    pre: &Preprocessed,
    index: &VarIndex,
    exprs: &mut ModelExpressions,
) -> SpdResult<()> {
    for region in &case.regions {
        let r = region.id.as_str();

        // Dispatched generation / load
        let mut generation = Expression::from(0.0);
        let mut load = Expression::from(0.0);
        let mut initial_scheduled_load = 0.0;
        for offer in &case.offers {
            let Some(trader) = case.trader(&offer.trader_id) else {
                continue;
            };
            if trader.region != r {
                continue;
            }
            match offer.trade_type {
                TradeType::Enof => {
                    generation += index.trader_total[&(offer.trader_id.clone(), offer.trade_type)];
                }
                TradeType::Ldof => {
                    load += index.trader_total[&(offer.trader_id.clone(), offer.trade_type)];
                    if !trader.semi_dispatch {
                        initial_scheduled_load += trader.initial_mw;
                    }
                }
                _ => {}
            }
        }

        // Interconnector losses allocated to this region
        let mut initial_allocated_loss = 0.0;
        let mut allocated_loss = Expression::from(0.0);
        let mut interconnector_export = Expression::from(0.0);
        for ic in &case.interconnectors {
            let Some(end) = endpoint(ic, r) else { continue };
            let initial_loss = pre.initial_loss_estimate[&ic.id];
            let loss_var = index.loss[&ic.id];
            let flow_var = index.gc_interconnector[&ic.id];
            let share = ic.loss_model.loss_share;

            match (&end, ic.is_mnsp(), ic.initial_mw >= 0.0) {
                // MNSP: the whole loss lands at the sending end
                (Endpoint::From, true, true) => {
                    initial_allocated_loss += initial_loss;
                    allocated_loss += loss_var;
                }
                (Endpoint::From, true, false) => {}
                (Endpoint::To, true, true) => {}
                (Endpoint::To, true, false) => {
                    initial_allocated_loss += initial_loss;
                    allocated_loss += loss_var;
                }
                // Regulated interconnector: split by LossShare
                (Endpoint::From, false, _) => {
                    initial_allocated_loss += initial_loss * share;
                    allocated_loss += share * loss_var;
                }
                (Endpoint::To, false, _) => {
                    initial_allocated_loss += initial_loss * (1.0 - share);
                    allocated_loss += (1.0 - share) * loss_var;
                }
            }

            match end {
                Endpoint::From => interconnector_export += flow_var,
                Endpoint::To => interconnector_export -= flow_var,
            }
        }

        // MNSP losses: MLF-based, DeltaLoss = (MLF - 1) x connection-point
        // load, signed by flow direction at each end
        let mut initial_mnsp_loss = 0.0;
        let mut mnsp_loss = Expression::from(0.0);
        for ic in &case.interconnectors {
            let Some(mnsp) = &ic.mnsp else { continue };
            let Some(end) = endpoint(ic, r) else { continue };
            let initial_loss = pre.initial_loss_estimate[&ic.id];
            let initial_mw = ic.initial_mw;

            match (&end, initial_mw >= 0.0) {
                (Endpoint::From, true) => {
                    initial_mnsp_loss += (mnsp.from_region_lf_export - 1.0) * (initial_mw + initial_loss);
                }
                (Endpoint::From, false) => {
                    initial_mnsp_loss += (mnsp.from_region_lf_import - 1.0) * initial_mw;
                }
                (Endpoint::To, true) => {
                    initial_mnsp_loss -= (mnsp.to_region_lf_import - 1.0) * initial_mw;
                }
                (Endpoint::To, false) => {
                    initial_mnsp_loss -= (mnsp.to_region_lf_export - 1.0) * (initial_mw - initial_loss);
                }
            }

            match end {
                Endpoint::From => mnsp_loss += exprs.mnsp_from_region_loss[&ic.id].clone(),
                Endpoint::To => mnsp_loss += exprs.mnsp_to_region_loss[&ic.id].clone(),
            }
        }

        let fixed_demand = region.initial_demand + region.ade + region.df
            - initial_scheduled_load
            - initial_allocated_loss
            - initial_mnsp_loss;

        if !fixed_demand.is_finite() {
            return Err(SpdError::UnhandledRegionAllocation(format!(
                "non-finite fixed demand for region {r}"
            )));
        }

        let net_export =
            interconnector_export.clone() + allocated_loss.clone() + mnsp_loss.clone();
        let cleared_demand =
            fixed_demand + allocated_loss.clone() + load.clone() + mnsp_loss.clone();

        exprs
            .region_dispatched_generation
            .insert(region.id.clone(), generation);
        exprs.region_dispatched_load.insert(region.id.clone(), load);
        exprs
            .region_initial_scheduled_load
            .insert(region.id.clone(), initial_scheduled_load);
        exprs
            .region_initial_allocated_loss
            .insert(region.id.clone(), initial_allocated_loss);
        exprs
            .region_initial_mnsp_loss
            .insert(region.id.clone(), initial_mnsp_loss);
        exprs.region_fixed_demand.insert(region.id.clone(), fixed_demand);
        exprs
            .region_allocated_loss
            .insert(region.id.clone(), allocated_loss);
        exprs.region_mnsp_loss.insert(region.id.clone(), mnsp_loss);
        exprs
            .region_interconnector_export
            .insert(region.id.clone(), interconnector_export);
        exprs.region_net_export.insert(region.id.clone(), net_export);
        exprs
            .region_cleared_demand
            .insert(region.id.clone(), cleared_demand);
    }

    Ok(())
}

/// Effective enablement bounds for regulation offers.
fn define_fcas_effective_enablement(case: &DispatchCase, exprs: &mut ModelExpressions) {
    for offer in &case.offers {
        if !offer.trade_type.is_regulation() {
            continue;
        }
        let Some(trader) = case.trader(&offer.trader_id) else {
            continue;
        };
        let Some(trapezium) = offer.trapezium else {
            continue;
        };

        let mut enablement_max = trapezium.enablement_max;
        if let Some(hmw) = trader.hmw {
            enablement_max = enablement_max.min(hmw);
        }
        if trader.semi_dispatch {
            if let Some(uigf) = trader.uigf {
                enablement_max = enablement_max.min(uigf);
            }
        }

        let mut enablement_min = trapezium.enablement_min;
        if let Some(lmw) = trader.lmw {
            enablement_min = enablement_min.max(lmw);
        }

        let key = (offer.trader_id.clone(), offer.trade_type);
        exprs.effective_enablement_max.insert(key.clone(), enablement_max);
        exprs.effective_enablement_min.insert(key, enablement_min);
    }
}

/// Total violation penalty, priced per constraint family.
fn define_penalty_expression(case: &DispatchCase, index: &VarIndex, exprs: &mut ModelExpressions) {
    let cvf = &case.cvf;
    let mut penalty = Expression::from(0.0);

    for constraint in &case.constraints {
        let price = constraint.violation_price;
        penalty += price * index.cv_gc[&constraint.id];
        penalty += price * index.cv_gc_lhs[&constraint.id];
        penalty += price * index.cv_gc_rhs[&constraint.id];
    }

    for var in index.cv_trader_offer.values() {
        penalty += cvf.offer * *var;
    }
    for var in index.cv_trader_capacity.values() {
        penalty += cvf.capacity * *var;
    }
    for var in index.cv_trader_uigf_surplus.values() {
        penalty += cvf.uigf_surplus * *var;
    }
    for var in index.cv_trader_ramp_up.values() {
        penalty += cvf.ramp_rate * *var;
    }
    for var in index.cv_trader_ramp_down.values() {
        penalty += cvf.ramp_rate * *var;
    }

    for var in index.cv_joint_ramping_up.values() {
        penalty += cvf.as_max_avail * *var;
    }
    for var in index.cv_joint_ramping_down.values() {
        penalty += cvf.as_max_avail * *var;
    }
    for var in index.cv_joint_capacity_rhs.values() {
        penalty += cvf.as_max_avail * *var;
    }
    for var in index.cv_joint_capacity_lhs.values() {
        penalty += cvf.as_max_avail * *var;
    }
    for var in index.cv_energy_regulating_rhs.values() {
        penalty += cvf.as_max_avail * *var;
    }
    for var in index.cv_energy_regulating_lhs.values() {
        penalty += cvf.as_max_avail * *var;
    }
    for var in index.cv_fcas_max_available.values() {
        penalty += cvf.as_max_avail * *var;
    }
    for var in index.cv_fcas_enablement_min.values() {
        penalty += cvf.as_enablement_min * *var;
    }
    for var in index.cv_fcas_enablement_max.values() {
        penalty += cvf.as_enablement_max * *var;
    }

    for var in index.cv_inflexibility_profile.values() {
        penalty += cvf.fast_start * *var;
    }
    for var in index.cv_inflexibility_profile_lhs.values() {
        penalty += cvf.fast_start * *var;
    }
    for var in index.cv_inflexibility_profile_rhs.values() {
        penalty += cvf.fast_start * *var;
    }

    for var in index.cv_mnsp_offer.values() {
        penalty += cvf.mnsp_offer * *var;
    }
    for var in index.cv_mnsp_capacity.values() {
        penalty += cvf.mnsp_capacity * *var;
    }
    for var in index.cv_mnsp_ramp_up.values() {
        penalty += cvf.mnsp_ramp_rate * *var;
    }
    for var in index.cv_mnsp_ramp_down.values() {
        penalty += cvf.mnsp_ramp_rate * *var;
    }

    for var in index.cv_interconnector_forward.values() {
        penalty += cvf.interconnector * *var;
    }
    for var in index.cv_interconnector_reverse.values() {
        penalty += cvf.interconnector * *var;
    }

    for var in index.cv_region_surplus.values() {
        penalty += cvf.energy_surplus * *var;
    }
    for var in index.cv_region_deficit.values() {
        penalty += cvf.energy_deficit * *var;
    }

    exprs.cv_penalty = penalty;
}

/// Tie-break slack cost: a tiny price relative to bid spreads, large
/// relative to solver tolerance.
fn define_tie_break_cost(case: &DispatchCase, index: &VarIndex, exprs: &mut ModelExpressions) {
    let coefficient = case.cvf.tie_break * case.cvf.voll;
    let mut cost = Expression::from(0.0);
    for (_, s1, s2) in index.tie_break_gen.iter().chain(index.tie_break_load.iter()) {
        cost += coefficient * *s1;
        cost += coefficient * *s2;
    }
    exprs.tie_break_cost = cost;
}
