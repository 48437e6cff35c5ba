//! Model constraints
//!
//! One builder per constraint family, mirroring the structure of the
//! formulation: offers, generic-constraint linkage, ramping, regional
//! power balance, interconnector limits, MNSP flow decomposition, FCAS
//! coupling, the SOS2 loss approximation, fast-start inflexibility
//! profiles, and tie-breaking.
//!
//! Skips are contractual: a constraint that does not apply (unavailable
//! FCAS offer, missing ramp rate, missing energy offer) is simply not
//! emitted. Everything that is emitted carries a priced violation
//! variable.

use super::expressions::ModelExpressions;
use super::vars::VarIndex;
use crate::preprocess::Preprocessed;
use good_lp::{constraint, Constraint, Expression};
use spd_core::fcas::{lower_slope_coefficient, upper_slope_coefficient};
use spd_core::types::ConstraintKind;
use spd_core::{fast_start, DispatchCase, Offer, SpdResult, TradeType, Trader, MNSP_BIG_M, RAMP_RATE_DIVISOR};

pub fn define_constraints(
    case: &DispatchCase,
    pre: &Preprocessed,
    index: &VarIndex,
    exprs: &ModelExpressions,
) -> SpdResult<Vec<Constraint>> {
    let mut constraints = Vec::new();

    offer_constraints(case, index, &mut constraints);
    generic_constraints(case, index, exprs, &mut constraints);
    unit_ramp_constraints(case, index, &mut constraints);
    region_constraints(case, index, exprs, &mut constraints);
    interconnector_constraints(case, index, &mut constraints);
    mnsp_constraints(case, index, exprs, &mut constraints);
    fcas_constraints(case, pre, index, exprs, &mut constraints);
    loss_model_constraints(case, pre, index, &mut constraints);
    fast_start_constraints(case, index, &mut constraints);
    tie_break_constraints(case, index, &mut constraints);

    Ok(constraints)
}

/// Effective ramp rates: the tighter of SCADA telemetry and the offered
/// rate, when either exists.
pub fn effective_ramp_up(trader: &Trader, offer: &Offer) -> Option<f64> {
    match (trader.scada_ramp_up, offer.ramp_up) {
        (Some(scada), Some(offered)) => Some(scada.min(offered)),
        (Some(scada), None) => Some(scada),
        (None, offered) => offered,
    }
}

pub fn effective_ramp_down(trader: &Trader, offer: &Offer) -> Option<f64> {
    match (trader.scada_ramp_down, offer.ramp_down) {
        (Some(scada), Some(offered)) => Some(scada.min(offered)),
        (Some(scada), None) => Some(scada),
        (None, offered) => offered,
    }
}

// ---------------------------------------------------------------------------
// Offers
// ---------------------------------------------------------------------------

fn offer_constraints(case: &DispatchCase, index: &VarIndex, out: &mut Vec<Constraint>) {
    for offer in &case.offers {
        let key = (offer.trader_id.clone(), offer.trade_type);
        let total = index.trader_total[&key];

        // Band MW sum to the total offer
        let mut band_sum = Expression::from(0.0);
        for band in 1..=10 {
            let band_key = (offer.trader_id.clone(), offer.trade_type, band);
            let var = index.trader_offer[&band_key];
            band_sum += var;

            // Each band is capped at its offered quantity
            let cv = index.cv_trader_offer[&band_key];
            out.push(constraint!(var <= offer.quantity_bands[band - 1] + cv));
        }
        out.push(constraint!(total == band_sum));

        // Capacity: UIGF caps semi-dispatchable energy, MaxAvail otherwise
        let semi_energy = offer.trade_type == TradeType::Enof
            && case
                .trader(&offer.trader_id)
                .map(|t| t.semi_dispatch)
                .unwrap_or(false);
        let uigf = case.trader(&offer.trader_id).and_then(|t| t.uigf);
        if semi_energy && uigf.is_some() {
            let cv = index.cv_trader_uigf_surplus[&key];
            out.push(constraint!(total <= uigf.unwrap() + cv));
        } else {
            let cv = index.cv_trader_capacity[&key];
            out.push(constraint!(total <= offer.max_avail + cv));
        }
    }

    // MNSP offers follow the same band/total/capacity pattern
    for ic in &case.interconnectors {
        let Some(mnsp) = &ic.mnsp else { continue };
        for offer in &mnsp.offers {
            let key = (ic.id.clone(), offer.region.clone());
            let total = index.mnsp_total[&key];

            let mut band_sum = Expression::from(0.0);
            for band in 1..=10 {
                let band_key = (ic.id.clone(), offer.region.clone(), band);
                let var = index.mnsp_offer[&band_key];
                band_sum += var;

                let cv = index.cv_mnsp_offer[&band_key];
                out.push(constraint!(var <= offer.quantity_bands[band - 1] + cv));
            }
            out.push(constraint!(total == band_sum));

            let cv = index.cv_mnsp_capacity[&key];
            out.push(constraint!(total <= offer.max_avail + cv));
        }
    }
}

// ---------------------------------------------------------------------------
// Generic constraints and linkage
// ---------------------------------------------------------------------------

fn generic_constraints(
    case: &DispatchCase,
    index: &VarIndex,
    exprs: &ModelExpressions,
    out: &mut Vec<Constraint>,
) {
    // Trader linkage: constraint variables track the total offer when the
    // offer exists; ids outside the offer index stay unlinked
    for (key, gc_var) in &index.gc_trader {
        if let Some(total) = index.trader_total.get(key) {
            out.push(constraint!(*total == *gc_var));
        }
    }

    // Region linkage: sum of matching totals in the region
    for ((region_id, trade_type), gc_var) in &index.gc_region {
        let mut sum = Expression::from(0.0);
        for offer in &case.offers {
            if offer.trade_type != *trade_type {
                continue;
            }
            let Some(trader) = case.trader(&offer.trader_id) else {
                continue;
            };
            if trader.region == *region_id {
                sum += index.trader_total[&(offer.trader_id.clone(), offer.trade_type)];
            }
        }
        out.push(constraint!(sum == *gc_var));
    }

    // MNSP linkage: net flow is the to-region offer minus the from-region
    // offer
    for ic in &case.interconnectors {
        if !ic.is_mnsp() {
            continue;
        }
        let to_key = (ic.id.clone(), ic.to_region.clone());
        let from_key = (ic.id.clone(), ic.from_region.clone());
        let (Some(to_total), Some(from_total)) =
            (index.mnsp_total.get(&to_key), index.mnsp_total.get(&from_key))
        else {
            continue;
        };
        let flow = index.gc_interconnector[&ic.id];
        out.push(constraint!(flow == *to_total - *from_total));
    }

    // The constraints themselves
    for gc in &case.constraints {
        let lhs = exprs.gc_lhs[&gc.id].clone();
        match gc.kind {
            ConstraintKind::Le => {
                let cv = index.cv_gc[&gc.id];
                out.push(constraint!(lhs <= gc.rhs + cv));
            }
            ConstraintKind::Ge => {
                let cv = index.cv_gc[&gc.id];
                out.push(constraint!(lhs + cv >= gc.rhs));
            }
            ConstraintKind::Eq => {
                let cv_lhs = index.cv_gc_lhs[&gc.id];
                let cv_rhs = index.cv_gc_rhs[&gc.id];
                out.push(constraint!(lhs + cv_lhs == gc.rhs + cv_rhs));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Ramping
// ---------------------------------------------------------------------------

fn unit_ramp_constraints(case: &DispatchCase, index: &VarIndex, out: &mut Vec<Constraint>) {
    for offer in &case.offers {
        if !offer.trade_type.is_energy() {
            continue;
        }
        let Some(trader) = case.trader(&offer.trader_id) else {
            continue;
        };
        let total = index.trader_total[&(offer.trader_id.clone(), offer.trade_type)];
        let cv_up = index.cv_trader_ramp_up[&trader.id];
        let cv_down = index.cv_trader_ramp_down[&trader.id];

        let ramp_up = effective_ramp_up(trader, offer);
        let ramp_down = effective_ramp_down(trader, offer);

        // Fast-start units early in their startup trajectory get profile
        // ramping capability instead of the plain rate limit
        let fast_start_mode = trader
            .fast_start
            .as_ref()
            .and_then(|p| p.current_mode.zip(p.current_mode_time));

        match (trader.fast_start.as_ref(), fast_start_mode) {
            (Some(profile), Some((1, mode_time))) => {
                let capability = fast_start::mode_one_ramping_capability(
                    profile.t1,
                    profile.t2,
                    profile.min_loading_mw,
                    mode_time,
                    ramp_up.unwrap_or(0.0),
                );
                // Output starts from 0 while the unit synchronises
                out.push(constraint!(total <= capability + cv_up));
            }
            (Some(profile), Some((2, mode_time))) => {
                let initial =
                    fast_start::mode_two_initial_mw(profile.t2, profile.min_loading_mw, mode_time);
                let capability = fast_start::mode_two_ramping_capability(
                    profile.t2,
                    profile.min_loading_mw,
                    mode_time,
                    ramp_up.unwrap_or(0.0),
                );
                out.push(constraint!(total <= initial + capability + cv_up));
            }
            _ => {
                if let Some(rate) = ramp_up {
                    out.push(constraint!(
                        total - trader.initial_mw <= rate / RAMP_RATE_DIVISOR + cv_up
                    ));
                }
            }
        }

        if let Some(rate) = ramp_down {
            out.push(constraint!(
                total - trader.initial_mw + cv_down >= -(rate / RAMP_RATE_DIVISOR)
            ));
        }
    }
}

// ---------------------------------------------------------------------------
// Regions
// ---------------------------------------------------------------------------

fn region_constraints(
    case: &DispatchCase,
    index: &VarIndex,
    exprs: &ModelExpressions,
    out: &mut Vec<Constraint>,
) {
    // DispatchedGeneration + Deficit =
    //   FixedDemand + DispatchedLoad + NetExport + Surplus
    for region in &case.regions {
        let generation = exprs.region_dispatched_generation[&region.id].clone();
        let load = exprs.region_dispatched_load[&region.id].clone();
        let net_export = exprs.region_net_export[&region.id].clone();
        let fixed_demand = exprs.region_fixed_demand[&region.id];
        let deficit = index.cv_region_deficit[&region.id];
        let surplus = index.cv_region_surplus[&region.id];

        out.push(constraint!(
            generation + deficit == fixed_demand + load + net_export + surplus
        ));
    }
}

// ---------------------------------------------------------------------------
// Interconnector limits
// ---------------------------------------------------------------------------

fn interconnector_constraints(case: &DispatchCase, index: &VarIndex, out: &mut Vec<Constraint>) {
    for ic in &case.interconnectors {
        let flow = index.gc_interconnector[&ic.id];
        let cv_forward = index.cv_interconnector_forward[&ic.id];
        let cv_reverse = index.cv_interconnector_reverse[&ic.id];

        out.push(constraint!(flow <= ic.upper_limit + cv_forward));
        // Lower limit is stored as an absolute MW value
        out.push(constraint!(flow + cv_reverse >= -ic.lower_limit));
    }
}

// ---------------------------------------------------------------------------
// MNSP ramping and flow decomposition
// ---------------------------------------------------------------------------

fn mnsp_constraints(
    case: &DispatchCase,
    index: &VarIndex,
    exprs: &ModelExpressions,
    out: &mut Vec<Constraint>,
) {
    for ic in &case.interconnectors {
        let Some(mnsp) = &ic.mnsp else { continue };

        // Ramp limits on each endpoint's total offer, anchored at the
        // interconnector's effective initial MW
        for offer in &mnsp.offers {
            let key = (ic.id.clone(), offer.region.clone());
            let total = index.mnsp_total[&key];

            if let Some(rate) = offer.ramp_up {
                let cv = index.cv_mnsp_ramp_up[&key];
                out.push(constraint!(
                    total <= ic.initial_mw + rate / RAMP_RATE_DIVISOR + cv
                ));
            }
            if let Some(rate) = offer.ramp_down {
                let cv = index.cv_mnsp_ramp_down[&key];
                out.push(constraint!(
                    total + cv >= ic.initial_mw - rate / RAMP_RATE_DIVISOR
                ));
            }
        }

        // Direction indicator: d = 1 forces non-negative flow, d = 0
        // non-positive
        let flow = index.gc_interconnector[&ic.id];
        let d = index.mnsp_direction[&ic.id];
        out.push(constraint!(flow >= -MNSP_BIG_M + MNSP_BIG_M * d));
        out.push(constraint!(flow <= MNSP_BIG_M * d));

        let from_cp = exprs.mnsp_from_cp_flow[&ic.id].clone();
        let to_cp = exprs.mnsp_to_cp_flow[&ic.id].clone();

        let from_export = index.mnsp_from_region_export[&ic.id];
        let from_import = index.mnsp_from_region_import[&ic.id];
        let to_export = index.mnsp_to_region_export[&ic.id];
        let to_import = index.mnsp_to_region_import[&ic.id];

        // Forward flow (d = 1): the from-region exports the connection
        // point flow and the to-region imports it; the opposing variables
        // collapse to zero. Reverse flow mirrors the pattern.
        out.push(constraint!(
            from_cp.clone() - (MNSP_BIG_M - MNSP_BIG_M * d) <= from_export
        ));
        out.push(constraint!(
            from_export <= from_cp.clone() + (MNSP_BIG_M - MNSP_BIG_M * d)
        ));
        out.push(constraint!(-MNSP_BIG_M * d <= from_export));
        out.push(constraint!(from_export <= MNSP_BIG_M * d));

        out.push(constraint!(
            from_cp.clone() - MNSP_BIG_M * d <= from_import
        ));
        out.push(constraint!(
            from_import <= from_cp.clone() + MNSP_BIG_M * d
        ));
        out.push(constraint!(
            MNSP_BIG_M * d - MNSP_BIG_M <= from_import
        ));
        out.push(constraint!(
            from_import <= MNSP_BIG_M - MNSP_BIG_M * d
        ));

        out.push(constraint!(to_cp.clone() - MNSP_BIG_M * d <= to_export));
        out.push(constraint!(to_export <= to_cp.clone() + MNSP_BIG_M * d));
        out.push(constraint!(MNSP_BIG_M * d - MNSP_BIG_M <= to_export));
        out.push(constraint!(to_export <= MNSP_BIG_M - MNSP_BIG_M * d));

        out.push(constraint!(
            to_cp.clone() - (MNSP_BIG_M - MNSP_BIG_M * d) <= to_import
        ));
        out.push(constraint!(
            to_import <= to_cp.clone() + (MNSP_BIG_M - MNSP_BIG_M * d)
        ));
        out.push(constraint!(-MNSP_BIG_M * d <= to_import));
        out.push(constraint!(to_import <= MNSP_BIG_M * d));
    }
}

// ---------------------------------------------------------------------------
// FCAS
// ---------------------------------------------------------------------------

fn fcas_constraints(
    case: &DispatchCase,
    pre: &Preprocessed,
    index: &VarIndex,
    exprs: &ModelExpressions,
    out: &mut Vec<Constraint>,
) {
    for offer in &case.offers {
        if !offer.trade_type.is_fcas() {
            continue;
        }
        let Some(trader) = case.trader(&offer.trader_id) else {
            continue;
        };
        let Some(trapezium) = offer.trapezium.as_ref() else {
            continue;
        };
        let key = (offer.trader_id.clone(), offer.trade_type);
        let available = pre.fcas_availability.get(&key).copied().unwrap_or(false);
        let total = index.trader_total[&key];
        let is_load = trader.trader_type.is_load();

        let energy_type = trader.trader_type.energy_offer_type();
        let energy_total = index
            .trader_total
            .get(&(offer.trader_id.clone(), energy_type))
            .copied();

        // Max-available: unavailable offers are pinned to zero (with a
        // priced escape), regulation offers are capped by the AGC ramp
        // over the interval
        let cv_max = index.cv_fcas_max_available[&key];
        if !available {
            out.push(constraint!(total == cv_max));
            continue;
        }

        let agc_ramp = match (offer.trade_type, is_load) {
            (TradeType::R5re, false) | (TradeType::L5re, true) => trader.scada_ramp_up,
            (TradeType::L5re, false) | (TradeType::R5re, true) => trader.scada_ramp_down,
            _ => None,
        };
        let effective_max_avail = match (offer.trade_type.is_regulation(), agc_ramp) {
            (true, Some(ramp)) => offer.max_avail.min(ramp / RAMP_RATE_DIVISOR),
            _ => offer.max_avail,
        };
        out.push(constraint!(total <= effective_max_avail + cv_max));

        // Joint ramping: regulation services share headroom with energy
        // movement over the interval
        if offer.trade_type.is_regulation() {
            if let Some(energy) = energy_total {
                let raise = offer.trade_type == TradeType::R5re;
                let cv = if raise {
                    index.cv_joint_ramping_up[&key]
                } else {
                    index.cv_joint_ramping_down[&key]
                };
                // Raising frequency means ramping up for a generator and
                // ramping down for a load; the binding SCADA rate and the
                // bound's sense follow that direction
                let uses_ramp_up = raise != is_load;
                let rate = if uses_ramp_up {
                    trader.scada_ramp_up
                } else {
                    trader.scada_ramp_down
                };
                if let Some(rate) = rate.filter(|r| *r > 0.0) {
                    let step = rate / RAMP_RATE_DIVISOR;
                    if uses_ramp_up {
                        out.push(constraint!(
                            energy + total <= trader.initial_mw + step + cv
                        ));
                    } else {
                        out.push(constraint!(
                            energy - total + cv >= trader.initial_mw - step
                        ));
                    }
                }
            }
        }

        // Joint capacity (contingency): energy + slope-coupled service +
        // any enabled regulation must fit inside the trapezium
        if offer.trade_type.is_contingency() {
            if let Some(energy) = energy_total {
                let usc = upper_slope_coefficient(trapezium).unwrap_or(0.0);
                let lsc = lower_slope_coefficient(trapezium).unwrap_or(0.0);

                let raise_reg = index
                    .trader_total
                    .get(&(offer.trader_id.clone(), TradeType::R5re))
                    .copied();
                let lower_reg = index
                    .trader_total
                    .get(&(offer.trader_id.clone(), TradeType::L5re))
                    .copied();
                // Raise regulation stacks on the upper side for
                // generators, lower regulation for loads
                let (upper_reg, lower_reg) = if is_load {
                    (lower_reg, raise_reg)
                } else {
                    (raise_reg, lower_reg)
                };

                let cv_rhs = index.cv_joint_capacity_rhs[&key];
                let mut upper = energy + usc * total;
                if let Some(reg) = upper_reg {
                    upper += reg;
                }
                out.push(constraint!(upper <= trapezium.enablement_max + cv_rhs));

                let cv_lhs = index.cv_joint_capacity_lhs[&key];
                let mut lower = energy - lsc * total;
                if let Some(reg) = lower_reg {
                    lower -= reg;
                }
                out.push(constraint!(lower + cv_lhs >= trapezium.enablement_min));
            }
        }

        // Energy-regulating coupling uses the effective enablement band
        if offer.trade_type.is_regulation() {
            if let Some(energy) = energy_total {
                let usc = upper_slope_coefficient(trapezium).unwrap_or(0.0);
                let lsc = lower_slope_coefficient(trapezium).unwrap_or(0.0);
                let enablement_max = exprs.effective_enablement_max[&key];
                let enablement_min = exprs.effective_enablement_min[&key];

                let cv_rhs = index.cv_energy_regulating_rhs[&key];
                out.push(constraint!(
                    energy + usc * total <= enablement_max + cv_rhs
                ));

                let cv_lhs = index.cv_energy_regulating_lhs[&key];
                out.push(constraint!(
                    energy - lsc * total + cv_lhs >= enablement_min
                ));
            }
        }

        // Enablement band on the energy offer while the service is enabled
        if let Some(energy) = energy_total {
            let (enablement_min, enablement_max) = if offer.trade_type.is_regulation() {
                (
                    exprs.effective_enablement_min[&key],
                    exprs.effective_enablement_max[&key],
                )
            } else {
                (trapezium.enablement_min, trapezium.enablement_max)
            };

            let cv_min = index.cv_fcas_enablement_min[&key];
            out.push(constraint!(energy + cv_min >= enablement_min));

            let cv_max_en = index.cv_fcas_enablement_max[&key];
            out.push(constraint!(energy <= enablement_max + cv_max_en));
        }
    }
}

// ---------------------------------------------------------------------------
// SOS2 loss model
// ---------------------------------------------------------------------------

fn loss_model_constraints(
    case: &DispatchCase,
    pre: &Preprocessed,
    index: &VarIndex,
    out: &mut Vec<Constraint>,
) {
    for ic in &case.interconnectors {
        let loss = index.loss[&ic.id];
        let flow = index.gc_interconnector[&ic.id];
        let breakpoints = &pre.loss_breakpoints[&ic.id];

        if ic.loss_model.segments.is_empty() {
            out.push(constraint!(loss == 0.0));
            continue;
        }

        let n = breakpoints.len();
        let lambda: Vec<_> = (0..n)
            .map(|k| index.loss_lambda[&(ic.id.clone(), k)])
            .collect();
        let y: Vec<_> = (0..n - 1)
            .map(|k| index.loss_y[&(ic.id.clone(), k)])
            .collect();

        // Loss and flow are convex combinations of the breakpoints
        let mut loss_sum = Expression::from(0.0);
        let mut flow_sum = Expression::from(0.0);
        for (k, (x, y_value)) in breakpoints.iter().enumerate() {
            loss_sum += *y_value * lambda[k];
            flow_sum += *x * lambda[k];
        }
        out.push(constraint!(loss == loss_sum));
        out.push(constraint!(flow == flow_sum));

        // Weights form a convex combination
        let lambda_sum = lambda
            .iter()
            .fold(Expression::from(0.0), |acc, v| acc + *v);
        out.push(constraint!(lambda_sum == 1.0));

        // Exactly one interval active
        let y_sum = y.iter().fold(Expression::from(0.0), |acc, v| acc + *v);
        out.push(constraint!(y_sum == 1.0));

        // Adjacency: a weight is only available at the ends of the active
        // interval
        for k in 0..n {
            let mut bound = Expression::from(0.0);
            if k > 0 {
                bound += y[k - 1];
            }
            if k < n - 1 {
                bound += y[k];
            }
            out.push(constraint!(lambda[k] <= bound));
        }
    }
}

// ---------------------------------------------------------------------------
// Fast-start inflexibility profiles
// ---------------------------------------------------------------------------

fn fast_start_constraints(case: &DispatchCase, index: &VarIndex, out: &mut Vec<Constraint>) {
    for trader in &case.traders {
        let Some(profile) = &trader.fast_start else {
            continue;
        };
        // No profile constraint when telemetry is missing
        let (Some(mode), Some(mode_time)) = (profile.current_mode, profile.current_mode_time)
        else {
            continue;
        };
        let energy_type = trader.trader_type.energy_offer_type();
        let Some(total) = index
            .trader_total
            .get(&(trader.id.clone(), energy_type))
            .copied()
        else {
            continue;
        };

        let effective_mode =
            fast_start::target_mode(mode, mode_time, profile.t1, profile.t2, profile.t3);
        let effective_time =
            fast_start::target_mode_time(mode, mode_time, profile.t1, profile.t2, profile.t3);

        let cv = index.cv_inflexibility_profile[&trader.id];
        let cv_lhs = index.cv_inflexibility_profile_lhs[&trader.id];
        let cv_rhs = index.cv_inflexibility_profile_rhs[&trader.id];

        match effective_mode {
            // Synchronising: output pinned to zero
            0 | 1 => out.push(constraint!(total + cv_lhs == cv_rhs)),
            // On the fixed startup trajectory
            2 if profile.t2 > 0.0 => {
                let startup_profile = (profile.min_loading_mw / profile.t2) * effective_time;
                out.push(constraint!(total + cv_lhs == startup_profile + cv_rhs));
            }
            2 => out.push(constraint!(total + cv_lhs == profile.min_loading_mw + cv_rhs)),
            // Held at or above min loading
            3 => out.push(constraint!(total + cv >= profile.min_loading_mw)),
            // Ramp-down window still binds from below
            4 if effective_time < profile.t4 && profile.t4 > 0.0 => {
                let floor = profile.min_loading_mw
                    - (profile.min_loading_mw / profile.t4) * effective_time;
                out.push(constraint!(total + cv >= floor));
            }
            // Past the profile: unconstrained
            _ => out.push(constraint!(total + cv >= 0.0)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tie-breaking
// ---------------------------------------------------------------------------

fn tie_break_constraints(case: &DispatchCase, index: &VarIndex, out: &mut Vec<Constraint>) {
    for (pair, s1, s2) in index.tie_break_gen.iter().chain(index.tie_break_load.iter()) {
        let (Some(offer_a), Some(offer_b)) = (
            case.offer(&pair.a.trader_id, pair.a.trade_type),
            case.offer(&pair.b.trader_id, pair.b.trade_type),
        ) else {
            continue;
        };
        let quantity_a = offer_a.quantity_bands[pair.a.band - 1];
        let quantity_b = offer_b.quantity_bands[pair.b.band - 1];
        if quantity_a == 0.0 || quantity_b == 0.0 {
            continue;
        }

        let var_a =
            index.trader_offer[&(pair.a.trader_id.clone(), pair.a.trade_type, pair.a.band)];
        let var_b =
            index.trader_offer[&(pair.b.trader_id.clone(), pair.b.trade_type, pair.b.band)];

        // Equal fractional dispatch of tied bands up to the slack pair
        out.push(constraint!(
            (1.0 / quantity_a) * var_a - (1.0 / quantity_b) * var_b == *s1 - *s2
        ));
    }
}
