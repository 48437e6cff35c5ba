//! Decision-variable families
//!
//! Every variable in the dispatch model, keyed by entity id in ordered
//! maps so two builds of the same case produce identical column order.
//! Violation (CV) variables exist for every relaxable constraint; they are
//! non-negative and priced in the objective, keeping the model feasible
//! for any casefile.

use super::FixedBinaries;
use crate::preprocess::{Preprocessed, PriceTiedPair};
use good_lp::{variable, ProblemVariables, Variable};
use spd_core::{DispatchCase, TradeType};
use std::collections::{BTreeMap, BTreeSet};

/// All model variables.
#[derive(Debug, Default)]
pub struct VarIndex {
    // Offers
    pub trader_offer: BTreeMap<(String, TradeType, usize), Variable>,
    pub trader_total: BTreeMap<(String, TradeType), Variable>,
    pub mnsp_offer: BTreeMap<(String, String, usize), Variable>,
    pub mnsp_total: BTreeMap<(String, String), Variable>,

    // Generic constraint linkage
    pub gc_trader: BTreeMap<(String, TradeType), Variable>,
    pub gc_interconnector: BTreeMap<String, Variable>,
    pub gc_region: BTreeMap<(String, TradeType), Variable>,

    // Loss model
    pub loss: BTreeMap<String, Variable>,
    pub loss_lambda: BTreeMap<(String, usize), Variable>,
    pub loss_y: BTreeMap<(String, usize), Variable>,

    // MNSP flow decomposition
    pub mnsp_direction: BTreeMap<String, Variable>,
    pub mnsp_from_region_export: BTreeMap<String, Variable>,
    pub mnsp_from_region_import: BTreeMap<String, Variable>,
    pub mnsp_to_region_export: BTreeMap<String, Variable>,
    pub mnsp_to_region_import: BTreeMap<String, Variable>,

    // Tie-break slacks, one pair per price-tied pair
    pub tie_break_gen: Vec<(PriceTiedPair, Variable, Variable)>,
    pub tie_break_load: Vec<(PriceTiedPair, Variable, Variable)>,

    // Violation variables
    pub cv_gc: BTreeMap<String, Variable>,
    pub cv_gc_lhs: BTreeMap<String, Variable>,
    pub cv_gc_rhs: BTreeMap<String, Variable>,
    pub cv_trader_offer: BTreeMap<(String, TradeType, usize), Variable>,
    pub cv_trader_capacity: BTreeMap<(String, TradeType), Variable>,
    pub cv_trader_uigf_surplus: BTreeMap<(String, TradeType), Variable>,
    pub cv_trader_ramp_up: BTreeMap<String, Variable>,
    pub cv_trader_ramp_down: BTreeMap<String, Variable>,
    pub cv_mnsp_offer: BTreeMap<(String, String, usize), Variable>,
    pub cv_mnsp_capacity: BTreeMap<(String, String), Variable>,
    pub cv_mnsp_ramp_up: BTreeMap<(String, String), Variable>,
    pub cv_mnsp_ramp_down: BTreeMap<(String, String), Variable>,
    pub cv_joint_ramping_up: BTreeMap<(String, TradeType), Variable>,
    pub cv_joint_ramping_down: BTreeMap<(String, TradeType), Variable>,
    pub cv_joint_capacity_rhs: BTreeMap<(String, TradeType), Variable>,
    pub cv_joint_capacity_lhs: BTreeMap<(String, TradeType), Variable>,
    pub cv_energy_regulating_rhs: BTreeMap<(String, TradeType), Variable>,
    pub cv_energy_regulating_lhs: BTreeMap<(String, TradeType), Variable>,
    pub cv_fcas_max_available: BTreeMap<(String, TradeType), Variable>,
    pub cv_fcas_enablement_min: BTreeMap<(String, TradeType), Variable>,
    pub cv_fcas_enablement_max: BTreeMap<(String, TradeType), Variable>,
    pub cv_inflexibility_profile: BTreeMap<String, Variable>,
    pub cv_inflexibility_profile_lhs: BTreeMap<String, Variable>,
    pub cv_inflexibility_profile_rhs: BTreeMap<String, Variable>,
    pub cv_interconnector_forward: BTreeMap<String, Variable>,
    pub cv_interconnector_reverse: BTreeMap<String, Variable>,
    pub cv_region_surplus: BTreeMap<String, Variable>,
    pub cv_region_deficit: BTreeMap<String, Variable>,
}

fn non_negative(vars: &mut ProblemVariables) -> Variable {
    vars.add(variable().min(0.0))
}

fn free(vars: &mut ProblemVariables) -> Variable {
    vars.add(variable())
}

/// Binary in pass 1; pinned to its pass-1 value in pass 2.
fn binary_or_fixed(vars: &mut ProblemVariables, fixed: Option<f64>) -> Variable {
    match fixed {
        Some(value) => vars.add(variable().min(value).max(value)),
        None => vars.add(variable().binary()),
    }
}

/// Create every variable family for the case.
pub fn define_variables(
    vars: &mut ProblemVariables,
    case: &DispatchCase,
    pre: &Preprocessed,
    fixed: Option<&FixedBinaries>,
) -> VarIndex {
    let mut index = VarIndex::default();

    // Trader offers: one variable per band plus a total per offer
    for offer in &case.offers {
        let key = (offer.trader_id.clone(), offer.trade_type);
        for band in 1..=10 {
            let band_key = (offer.trader_id.clone(), offer.trade_type, band);
            index.trader_offer.insert(band_key.clone(), non_negative(vars));
            index.cv_trader_offer.insert(band_key, non_negative(vars));
        }
        index.trader_total.insert(key.clone(), non_negative(vars));
        index.cv_trader_capacity.insert(key.clone(), non_negative(vars));
        index.cv_trader_uigf_surplus.insert(key.clone(), non_negative(vars));

        if offer.trade_type.is_fcas() {
            index.cv_joint_ramping_up.insert(key.clone(), non_negative(vars));
            index.cv_joint_ramping_down.insert(key.clone(), non_negative(vars));
            index.cv_joint_capacity_rhs.insert(key.clone(), non_negative(vars));
            index.cv_joint_capacity_lhs.insert(key.clone(), non_negative(vars));
            index
                .cv_energy_regulating_rhs
                .insert(key.clone(), non_negative(vars));
            index
                .cv_energy_regulating_lhs
                .insert(key.clone(), non_negative(vars));
            index.cv_fcas_max_available.insert(key.clone(), non_negative(vars));
            index.cv_fcas_enablement_min.insert(key.clone(), non_negative(vars));
            index.cv_fcas_enablement_max.insert(key, non_negative(vars));
        }
    }

    // Per-trader ramp violation (shared by the trader's energy offer)
    for trader in &case.traders {
        index.cv_trader_ramp_up.insert(trader.id.clone(), non_negative(vars));
        index
            .cv_trader_ramp_down
            .insert(trader.id.clone(), non_negative(vars));
        if trader.fast_start.is_some() {
            index
                .cv_inflexibility_profile
                .insert(trader.id.clone(), non_negative(vars));
            index
                .cv_inflexibility_profile_lhs
                .insert(trader.id.clone(), non_negative(vars));
            index
                .cv_inflexibility_profile_rhs
                .insert(trader.id.clone(), non_negative(vars));
        }
    }

    // MNSP offers
    for ic in &case.interconnectors {
        let Some(mnsp) = &ic.mnsp else { continue };
        for offer in &mnsp.offers {
            let key = (ic.id.clone(), offer.region.clone());
            for band in 1..=10 {
                let band_key = (ic.id.clone(), offer.region.clone(), band);
                index.mnsp_offer.insert(band_key.clone(), non_negative(vars));
                index.cv_mnsp_offer.insert(band_key, non_negative(vars));
            }
            index.mnsp_total.insert(key.clone(), non_negative(vars));
            index.cv_mnsp_capacity.insert(key.clone(), non_negative(vars));
            index.cv_mnsp_ramp_up.insert(key.clone(), non_negative(vars));
            index.cv_mnsp_ramp_down.insert(key, non_negative(vars));
        }
    }

    // Generic constraint linkage variables. Interconnector flow variables
    // exist for every interconnector (limits, loss model and region
    // accounting all reference them), plus any id a constraint names.
    let mut gc_traders: BTreeSet<(String, TradeType)> = BTreeSet::new();
    let mut gc_interconnectors: BTreeSet<String> =
        case.interconnectors.iter().map(|i| i.id.clone()).collect();
    let mut gc_regions: BTreeSet<(String, TradeType)> = BTreeSet::new();
    for constraint in &case.constraints {
        for (trader_id, trade_type, _) in &constraint.trader_factors {
            gc_traders.insert((trader_id.clone(), *trade_type));
        }
        for (ic_id, _) in &constraint.interconnector_factors {
            gc_interconnectors.insert(ic_id.clone());
        }
        for (region_id, trade_type, _) in &constraint.region_factors {
            gc_regions.insert((region_id.clone(), *trade_type));
        }
    }
    for key in gc_traders {
        index.gc_trader.insert(key, free(vars));
    }
    for key in gc_interconnectors {
        index.gc_interconnector.insert(key, free(vars));
    }
    for key in gc_regions {
        index.gc_region.insert(key, free(vars));
    }

    for constraint in &case.constraints {
        index.cv_gc.insert(constraint.id.clone(), non_negative(vars));
        index.cv_gc_lhs.insert(constraint.id.clone(), non_negative(vars));
        index.cv_gc_rhs.insert(constraint.id.clone(), non_negative(vars));
    }

    // Loss model: loss, lambda per breakpoint, binary per interval
    for ic in &case.interconnectors {
        index.loss.insert(ic.id.clone(), free(vars));
        index
            .cv_interconnector_forward
            .insert(ic.id.clone(), non_negative(vars));
        index
            .cv_interconnector_reverse
            .insert(ic.id.clone(), non_negative(vars));

        let breakpoints = pre
            .loss_breakpoints
            .get(&ic.id)
            .map(Vec::len)
            .unwrap_or(0);
        for k in 0..breakpoints {
            index
                .loss_lambda
                .insert((ic.id.clone(), k), non_negative(vars));
        }
        for k in 0..breakpoints.saturating_sub(1) {
            let pinned = fixed.and_then(|f| f.loss_y.get(&(ic.id.clone(), k)).copied());
            index
                .loss_y
                .insert((ic.id.clone(), k), binary_or_fixed(vars, pinned));
        }

        // MNSP flow decomposition
        if ic.is_mnsp() {
            let pinned = fixed.and_then(|f| f.mnsp_direction.get(&ic.id).copied());
            index
                .mnsp_direction
                .insert(ic.id.clone(), binary_or_fixed(vars, pinned));
            index
                .mnsp_from_region_export
                .insert(ic.id.clone(), free(vars));
            index
                .mnsp_from_region_import
                .insert(ic.id.clone(), free(vars));
            index.mnsp_to_region_export.insert(ic.id.clone(), free(vars));
            index.mnsp_to_region_import.insert(ic.id.clone(), free(vars));
        }
    }

    // Region power balance slacks
    for region in &case.regions {
        index.cv_region_surplus.insert(region.id.clone(), non_negative(vars));
        index.cv_region_deficit.insert(region.id.clone(), non_negative(vars));
    }

    // Tie-break slack pairs
    for pair in &pre.price_tied_generators {
        index
            .tie_break_gen
            .push((pair.clone(), non_negative(vars), non_negative(vars)));
    }
    for pair in &pre.price_tied_loads {
        index
            .tie_break_load
            .push((pair.clone(), non_negative(vars), non_negative(vars)));
    }

    index
}
