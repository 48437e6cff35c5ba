//! Casefile → flat model extraction
//!
//! Builds a [`DispatchCase`] from the parsed document. Effective initial
//! conditions are resolved here: when the case records an intervention and
//! the resolved intervention flag is "0" (the pricing view of an
//! intervened interval), `WhatIfInitialMW`/`WhatIfMW` replace the SCADA
//! initial values. Structural problems fail fast before any model exists.

use crate::document::CaseDocument;
use crate::lookup;
use spd_core::case::*;
use spd_core::fcas::FcasTrapezium;
use spd_core::{RunMode, SpdError, SpdResult, TradeType, TraderType};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Extract the flat dispatch case for the given run mode.
pub fn extract_case(doc: &CaseDocument, mode: RunMode) -> SpdResult<DispatchCase> {
    let intervention = lookup::intervention_status(doc, mode)?;
    let case_id: String = lookup::case_attribute(doc, "@CaseID")?;

    // What-if initial conditions apply on the pricing view of an
    // intervention case only.
    let case_intervention: String = lookup::case_attribute(doc, "@Intervention")?;
    let use_what_if = matches!(case_intervention.as_str(), "True" | "1") && intervention == "0";

    let cvf = extract_cvf(doc)?;
    let regions = extract_regions(doc)?;
    let traders = extract_traders(doc, use_what_if)?;
    let offers = extract_offers(doc)?;
    let interconnectors = extract_interconnectors(doc, use_what_if)?;
    let constraints = extract_constraints(doc, &intervention)?;
    let reference = extract_reference(doc, &intervention)?;

    let case = DispatchCase {
        case_id,
        intervention,
        cvf,
        regions,
        traders,
        offers,
        interconnectors,
        constraints,
        reference,
    };
    case.validate()?;
    Ok(case)
}

fn extract_cvf(doc: &CaseDocument) -> SpdResult<CvfPrices> {
    Ok(CvfPrices {
        voll: lookup::case_attribute(doc, "@VoLL")?,
        energy_deficit: lookup::case_attribute(doc, "@EnergyDeficitPrice")?,
        energy_surplus: lookup::case_attribute(doc, "@EnergySurplusPrice")?,
        uigf_surplus: lookup::case_attribute(doc, "@UIGFSurplusPrice")?,
        ramp_rate: lookup::case_attribute(doc, "@RampRatePrice")?,
        capacity: lookup::case_attribute(doc, "@CapacityPrice")?,
        offer: lookup::case_attribute(doc, "@OfferPrice")?,
        mnsp_offer: lookup::case_attribute(doc, "@MNSPOfferPrice")?,
        mnsp_ramp_rate: lookup::case_attribute(doc, "@MNSPRampRatePrice")?,
        mnsp_capacity: lookup::case_attribute(doc, "@MNSPCapacityPrice")?,
        mnsp_loss: lookup::case_attribute(doc, "@MNSPLossesPrice")?,
        as_profile: lookup::case_attribute(doc, "@ASProfilePrice")?,
        as_max_avail: lookup::case_attribute(doc, "@ASMaxAvailPrice")?,
        as_enablement_min: lookup::case_attribute(doc, "@ASEnablementMinPrice")?,
        as_enablement_max: lookup::case_attribute(doc, "@ASEnablementMaxPrice")?,
        interconnector: lookup::case_attribute(doc, "@InterconnectorPrice")?,
        fast_start: lookup::case_attribute(doc, "@FastStartPrice")?,
        generic_constraint: lookup::case_attribute(doc, "@GenericConstraintPrice")?,
        satisfactory_network: lookup::case_attribute(doc, "@Satisfactory_Network_Price")?,
        tie_break: lookup::case_attribute(doc, "@TieBreakPrice")?,
    })
}

fn extract_regions(doc: &CaseDocument) -> SpdResult<Vec<Region>> {
    let ids = lookup::region_index(doc)?;
    let initial_demand: BTreeMap<String, f64> =
        lookup::region_initial_condition_attribute(doc, "InitialDemand")?;
    let ade: BTreeMap<String, f64> = lookup::region_initial_condition_attribute(doc, "ADE")?;
    let df: BTreeMap<String, f64> = lookup::region_period_attribute(doc, "@DF")?;

    ids.into_iter()
        .map(|id| {
            Ok(Region {
                initial_demand: *initial_demand
                    .get(&id)
                    .ok_or_else(|| SpdError::missing("Region", &id, "InitialDemand"))?,
                ade: ade.get(&id).copied().unwrap_or(0.0),
                df: df.get(&id).copied().unwrap_or(0.0),
                id,
            })
        })
        .collect()
}

fn extract_traders(doc: &CaseDocument, use_what_if: bool) -> SpdResult<Vec<Trader>> {
    let ids = lookup::trader_index(doc)?;
    let trader_types: BTreeMap<String, String> =
        lookup::trader_collection_attribute(doc, "@TraderType")?;
    let semi_dispatch: BTreeMap<String, String> =
        lookup::trader_collection_attribute(doc, "@SemiDispatch")?;
    let region: BTreeMap<String, String> = lookup::trader_period_attribute(doc, "@RegionID")?;
    let initial_mw: BTreeMap<String, f64> =
        lookup::trader_initial_condition_attribute(doc, "InitialMW")?;
    let what_if_mw: BTreeMap<String, f64> =
        lookup::trader_initial_condition_attribute(doc, "WhatIfInitialMW")?;
    let hmw: BTreeMap<String, f64> = lookup::trader_initial_condition_attribute(doc, "HMW")?;
    let lmw: BTreeMap<String, f64> = lookup::trader_initial_condition_attribute(doc, "LMW")?;
    let agc: BTreeMap<String, String> =
        lookup::trader_initial_condition_attribute(doc, "AGCStatus")?;
    let ramp_up: BTreeMap<String, f64> =
        lookup::trader_initial_condition_attribute(doc, "SCADARampUpRate")?;
    let ramp_down: BTreeMap<String, f64> =
        lookup::trader_initial_condition_attribute(doc, "SCADARampDnRate")?;
    let uigf: BTreeMap<String, f64> = lookup::trader_period_attribute(doc, "@UIGF")?;

    let min_loading: BTreeMap<String, Option<f64>> =
        lookup::trader_fast_start_attribute(doc, "@MinLoadingMW")?;
    let current_mode: BTreeMap<String, Option<u8>> =
        lookup::trader_fast_start_attribute(doc, "@CurrentMode")?;
    let current_mode_time: BTreeMap<String, Option<f64>> =
        lookup::trader_fast_start_attribute(doc, "@CurrentModeTime")?;
    let t1: BTreeMap<String, Option<f64>> = lookup::trader_fast_start_attribute(doc, "@T1")?;
    let t2: BTreeMap<String, Option<f64>> = lookup::trader_fast_start_attribute(doc, "@T2")?;
    let t3: BTreeMap<String, Option<f64>> = lookup::trader_fast_start_attribute(doc, "@T3")?;
    let t4: BTreeMap<String, Option<f64>> = lookup::trader_fast_start_attribute(doc, "@T4")?;

    ids.into_iter()
        .map(|id| {
            let trader_type = trader_types
                .get(&id)
                .ok_or_else(|| SpdError::missing("Trader", &id, "@TraderType"))?;
            let trader_type = TraderType::from_str(trader_type)?;

            let effective_initial = if use_what_if {
                what_if_mw.get(&id).or_else(|| initial_mw.get(&id))
            } else {
                initial_mw.get(&id)
            };

            let fast_start = min_loading.get(&id).map(|min_loading_mw| {
                Ok::<_, SpdError>(FastStartProfile {
                    min_loading_mw: min_loading_mw
                        .ok_or_else(|| SpdError::missing("Trader", &id, "@MinLoadingMW"))?,
                    current_mode: current_mode.get(&id).copied().flatten(),
                    current_mode_time: current_mode_time.get(&id).copied().flatten(),
                    t1: t1.get(&id).copied().flatten().unwrap_or(0.0),
                    t2: t2.get(&id).copied().flatten().unwrap_or(0.0),
                    t3: t3.get(&id).copied().flatten().unwrap_or(0.0),
                    t4: t4.get(&id).copied().flatten().unwrap_or(0.0),
                })
            });

            Ok(Trader {
                trader_type,
                semi_dispatch: semi_dispatch.get(&id).map(|s| s == "1").unwrap_or(false),
                region: region
                    .get(&id)
                    .ok_or_else(|| SpdError::missing("TraderPeriod", &id, "@RegionID"))?
                    .clone(),
                initial_mw: *effective_initial
                    .ok_or_else(|| SpdError::missing("Trader", &id, "InitialMW"))?,
                hmw: hmw.get(&id).copied(),
                lmw: lmw.get(&id).copied(),
                agc_enabled: agc.get(&id).map(|s| s == "1"),
                scada_ramp_up: ramp_up.get(&id).copied(),
                scada_ramp_down: ramp_down.get(&id).copied(),
                uigf: uigf.get(&id).copied(),
                fast_start: fast_start.transpose()?,
                id,
            })
        })
        .collect()
}

fn extract_offers(doc: &CaseDocument) -> SpdResult<Vec<Offer>> {
    let index = lookup::trader_offer_index(doc)?;
    let price_bands = lookup::trader_price_bands(doc)?;
    let quantity_bands = lookup::trader_quantity_bands(doc)?;
    let max_avail: BTreeMap<(String, TradeType), f64> =
        lookup::trader_period_trade_attribute(doc, "@MaxAvail")?;
    let ramp_up: BTreeMap<(String, TradeType), f64> =
        lookup::trader_period_trade_attribute(doc, "@RampUpRate")?;
    let ramp_down: BTreeMap<(String, TradeType), f64> =
        lookup::trader_period_trade_attribute(doc, "@RampDnRate")?;
    let enablement_min: BTreeMap<(String, TradeType), f64> =
        lookup::trader_period_trade_attribute(doc, "@EnablementMin")?;
    let low_breakpoint: BTreeMap<(String, TradeType), f64> =
        lookup::trader_period_trade_attribute(doc, "@LowBreakpoint")?;
    let high_breakpoint: BTreeMap<(String, TradeType), f64> =
        lookup::trader_period_trade_attribute(doc, "@HighBreakpoint")?;
    let enablement_max: BTreeMap<(String, TradeType), f64> =
        lookup::trader_period_trade_attribute(doc, "@EnablementMax")?;

    index
        .into_iter()
        .map(|key| {
            let (trader_id, trade_type) = key.clone();
            let trapezium = if trade_type.is_fcas() {
                Some(FcasTrapezium {
                    enablement_min: *enablement_min.get(&key).ok_or_else(|| {
                        SpdError::missing("Trade", &trader_id, "@EnablementMin")
                    })?,
                    low_breakpoint: *low_breakpoint.get(&key).ok_or_else(|| {
                        SpdError::missing("Trade", &trader_id, "@LowBreakpoint")
                    })?,
                    high_breakpoint: *high_breakpoint.get(&key).ok_or_else(|| {
                        SpdError::missing("Trade", &trader_id, "@HighBreakpoint")
                    })?,
                    enablement_max: *enablement_max.get(&key).ok_or_else(|| {
                        SpdError::missing("Trade", &trader_id, "@EnablementMax")
                    })?,
                    max_avail: *max_avail
                        .get(&key)
                        .ok_or_else(|| SpdError::missing("Trade", &trader_id, "@MaxAvail"))?,
                })
            } else {
                None
            };

            Ok(Offer {
                price_bands: *price_bands
                    .get(&key)
                    .ok_or_else(|| SpdError::missing("Trader", &trader_id, "price bands"))?,
                quantity_bands: *quantity_bands
                    .get(&key)
                    .ok_or_else(|| SpdError::missing("Trade", &trader_id, "quantity bands"))?,
                max_avail: *max_avail
                    .get(&key)
                    .ok_or_else(|| SpdError::missing("Trade", &trader_id, "@MaxAvail"))?,
                ramp_up: ramp_up.get(&key).copied(),
                ramp_down: ramp_down.get(&key).copied(),
                trapezium,
                trader_id,
                trade_type,
            })
        })
        .collect()
}

fn extract_interconnectors(doc: &CaseDocument, use_what_if: bool) -> SpdResult<Vec<Interconnector>> {
    let ids = lookup::interconnector_index(doc)?;
    let from_region: BTreeMap<String, String> =
        lookup::interconnector_period_attribute(doc, "@FromRegion")?;
    let to_region: BTreeMap<String, String> =
        lookup::interconnector_period_attribute(doc, "@ToRegion")?;
    let lower_limit: BTreeMap<String, f64> =
        lookup::interconnector_period_attribute(doc, "@LowerLimit")?;
    let upper_limit: BTreeMap<String, f64> =
        lookup::interconnector_period_attribute(doc, "@UpperLimit")?;
    let mnsp_flag: BTreeMap<String, String> = lookup::interconnector_period_attribute(doc, "@MNSP")?;
    let initial_mw: BTreeMap<String, f64> =
        lookup::interconnector_collection_attribute(doc, "InitialMW")?;
    let what_if_mw: BTreeMap<String, f64> =
        lookup::interconnector_collection_attribute(doc, "WhatIfMW")?;
    let loss_share: BTreeMap<String, f64> = lookup::loss_model_attribute(doc, "@LossShare")?;
    let loss_lower_limit: BTreeMap<String, f64> =
        lookup::loss_model_attribute(doc, "@LossLowerLimit")?;
    let segments = lookup::loss_model_segments(doc)?;

    let from_lf_export: BTreeMap<String, f64> =
        lookup::mnsp_period_attribute(doc, "@FromRegionLFExport")?;
    let from_lf_import: BTreeMap<String, f64> =
        lookup::mnsp_period_attribute(doc, "@FromRegionLFImport")?;
    let to_lf_export: BTreeMap<String, f64> =
        lookup::mnsp_period_attribute(doc, "@ToRegionLFExport")?;
    let to_lf_import: BTreeMap<String, f64> =
        lookup::mnsp_period_attribute(doc, "@ToRegionLFImport")?;
    let mnsp_offer_index = lookup::mnsp_offer_index(doc)?;
    let mnsp_prices = lookup::mnsp_price_bands(doc)?;
    let mnsp_quantities = lookup::mnsp_quantity_bands(doc)?;
    let mnsp_max_avail: BTreeMap<(String, String), Option<f64>> =
        lookup::mnsp_quantity_band_attribute(doc, "@MaxAvail")?;
    let mnsp_ramp_up: BTreeMap<(String, String), Option<f64>> =
        lookup::mnsp_quantity_band_attribute(doc, "@RampUpRate")?;
    let mnsp_ramp_down: BTreeMap<(String, String), Option<f64>> =
        lookup::mnsp_quantity_band_attribute(doc, "@RampDnRate")?;

    ids.into_iter()
        .map(|id| {
            let effective_initial = if use_what_if {
                what_if_mw.get(&id).or_else(|| initial_mw.get(&id))
            } else {
                initial_mw.get(&id)
            };

            let mnsp = if mnsp_flag.get(&id).map(String::as_str) == Some("1") {
                let mut offers = Vec::new();
                for (ic_id, region) in &mnsp_offer_index {
                    if ic_id != &id {
                        continue;
                    }
                    let key = (ic_id.clone(), region.clone());
                    offers.push(MnspOffer {
                        region: region.clone(),
                        price_bands: *mnsp_prices.get(&key).ok_or_else(|| {
                            SpdError::missing("MNSPOffer", ic_id, "price bands")
                        })?,
                        quantity_bands: *mnsp_quantities.get(&key).ok_or_else(|| {
                            SpdError::missing("MNSPOffer", ic_id, "quantity bands")
                        })?,
                        max_avail: mnsp_max_avail
                            .get(&key)
                            .copied()
                            .flatten()
                            .ok_or_else(|| SpdError::missing("MNSPOffer", ic_id, "@MaxAvail"))?,
                        ramp_up: mnsp_ramp_up.get(&key).copied().flatten(),
                        ramp_down: mnsp_ramp_down.get(&key).copied().flatten(),
                    });
                }
                Some(MnspParams {
                    from_region_lf_export: *from_lf_export
                        .get(&id)
                        .ok_or_else(|| SpdError::missing("Interconnector", &id, "@FromRegionLFExport"))?,
                    from_region_lf_import: *from_lf_import
                        .get(&id)
                        .ok_or_else(|| SpdError::missing("Interconnector", &id, "@FromRegionLFImport"))?,
                    to_region_lf_export: *to_lf_export
                        .get(&id)
                        .ok_or_else(|| SpdError::missing("Interconnector", &id, "@ToRegionLFExport"))?,
                    to_region_lf_import: *to_lf_import
                        .get(&id)
                        .ok_or_else(|| SpdError::missing("Interconnector", &id, "@ToRegionLFImport"))?,
                    offers,
                })
            } else {
                None
            };

            Ok(Interconnector {
                from_region: from_region
                    .get(&id)
                    .ok_or_else(|| SpdError::missing("InterconnectorPeriod", &id, "@FromRegion"))?
                    .clone(),
                to_region: to_region
                    .get(&id)
                    .ok_or_else(|| SpdError::missing("InterconnectorPeriod", &id, "@ToRegion"))?
                    .clone(),
                lower_limit: *lower_limit
                    .get(&id)
                    .ok_or_else(|| SpdError::missing("InterconnectorPeriod", &id, "@LowerLimit"))?,
                upper_limit: *upper_limit
                    .get(&id)
                    .ok_or_else(|| SpdError::missing("InterconnectorPeriod", &id, "@UpperLimit"))?,
                initial_mw: *effective_initial
                    .ok_or_else(|| SpdError::missing("Interconnector", &id, "InitialMW"))?,
                loss_model: LossModel {
                    loss_lower_limit: *loss_lower_limit
                        .get(&id)
                        .ok_or_else(|| SpdError::missing("LossModel", &id, "@LossLowerLimit"))?,
                    loss_share: *loss_share
                        .get(&id)
                        .ok_or_else(|| SpdError::missing("LossModel", &id, "@LossShare"))?,
                    segments: segments.get(&id).cloned().unwrap_or_default(),
                },
                mnsp,
                id,
            })
        })
        .collect()
}

fn extract_constraints(doc: &CaseDocument, intervention: &str) -> SpdResult<Vec<GenericConstraint>> {
    let ids = lookup::generic_constraint_index(doc)?;
    let lhs_terms = lookup::generic_constraint_lhs_terms(doc)?;
    let types = lookup::generic_constraint_types(doc)?;
    let violation_prices: BTreeMap<String, f64> =
        lookup::generic_constraint_collection_attribute(doc, "@ViolationPrice")?;
    let rhs = lookup::generic_constraint_rhs(doc, intervention)?;

    let mut constraints = Vec::new();
    for id in ids {
        // Constraints with no LHS factors are skipped outright
        let Some(lhs) = lhs_terms.get(&id) else {
            continue;
        };
        constraints.push(GenericConstraint {
            kind: *types
                .get(&id)
                .ok_or_else(|| SpdError::missing("GenericConstraint", &id, "@Type"))?,
            rhs: *rhs
                .get(&id)
                .ok_or_else(|| SpdError::missing("ConstraintSolution", &id, "@RHS"))?,
            violation_price: *violation_prices
                .get(&id)
                .ok_or_else(|| SpdError::missing("GenericConstraint", &id, "@ViolationPrice"))?,
            trader_factors: lhs.traders.clone(),
            interconnector_factors: lhs.interconnectors.clone(),
            region_factors: lhs.regions.clone(),
            id,
        });
    }
    Ok(constraints)
}

fn extract_reference(doc: &CaseDocument, intervention: &str) -> SpdResult<Option<ReferenceSolution>> {
    if !doc.has_outputs() {
        return Ok(None);
    }

    let mut reference = ReferenceSolution::default();

    for element in lookup::solution_elements(doc, "TraderSolution", intervention)? {
        let id: String = crate::document::attr(element, "TraderSolution", "", "@TraderID")?;
        let mut trader = TraderReference {
            energy_target: crate::document::attr_opt(element, "@EnergyTarget")?.unwrap_or(0.0),
            ..Default::default()
        };
        for trade_type in spd_core::types::FCAS_TRADE_TYPES {
            if let Some(name) = trade_type.target_attribute() {
                if let Some(value) = crate::document::attr_opt(element, name)? {
                    trader.fcas_targets.insert(trade_type, value);
                }
            }
            if let Some(name) = trade_type.violation_attribute() {
                if let Some(value) = crate::document::attr_opt(element, name)? {
                    trader.fcas_violations.insert(trade_type, value);
                }
            }
        }
        reference.traders.insert(id, trader);
    }

    for element in lookup::solution_elements(doc, "RegionSolution", intervention)? {
        let id: String = crate::document::attr(element, "RegionSolution", "", "@RegionID")?;
        reference.regions.insert(
            id,
            RegionReference {
                dispatched_generation: crate::document::attr_opt(element, "@DispatchedGeneration")?
                    .unwrap_or(0.0),
                dispatched_load: crate::document::attr_opt(element, "@DispatchedLoad")?
                    .unwrap_or(0.0),
                fixed_demand: crate::document::attr_opt(element, "@FixedDemand")?.unwrap_or(0.0),
                net_export: crate::document::attr_opt(element, "@NetExport")?.unwrap_or(0.0),
                surplus_generation: crate::document::attr_opt(element, "@SurplusGeneration")?
                    .unwrap_or(0.0),
                cleared_demand: crate::document::attr_opt(element, "@ClearedDemand")?
                    .unwrap_or(0.0),
            },
        );
    }

    for element in lookup::solution_elements(doc, "InterconnectorSolution", intervention)? {
        let id: String =
            crate::document::attr(element, "InterconnectorSolution", "", "@InterconnectorID")?;
        reference.interconnectors.insert(
            id,
            InterconnectorReference {
                flow: crate::document::attr_opt(element, "@Flow")?.unwrap_or(0.0),
                losses: crate::document::attr_opt(element, "@Losses")?.unwrap_or(0.0),
                deficit: crate::document::attr_opt(element, "@Deficit")?.unwrap_or(0.0),
            },
        );
    }

    for element in lookup::solution_elements(doc, "ConstraintSolution", intervention)? {
        let id: String = crate::document::attr(element, "ConstraintSolution", "", "@ConstraintID")?;
        reference.constraints.insert(
            id,
            ConstraintReference {
                rhs: crate::document::attr_opt(element, "@RHS")?.unwrap_or(0.0),
                deficit: crate::document::attr_opt(element, "@Deficit")?.unwrap_or(0.0),
            },
        );
    }

    for element in lookup::solution_elements(doc, "PeriodSolution", intervention)? {
        reference.period = Some(PeriodReference {
            total_objective: crate::document::attr_opt(element, "@TotalObjective")?.unwrap_or(0.0),
        });
    }

    Ok(Some(reference))
}
