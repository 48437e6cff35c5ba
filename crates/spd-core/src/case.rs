//! Flat dispatch-interval data model
//!
//! [`DispatchCase`] is the normalized form of one casefile: entity lists in
//! document order plus case-wide violation prices and (optionally) the
//! reference solution mirror used by validation mode. Everything is
//! immutable after extraction; the solver never sees the raw document.

use crate::error::{SpdError, SpdResult};
use crate::fcas::FcasTrapezium;
use crate::types::{ConstraintKind, TradeType, TraderType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// NEM region with initial conditions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Region {
    pub id: String,
    /// Demand at the start of the interval (MW)
    pub initial_demand: f64,
    /// Aggregate dispatch error (MW)
    pub ade: f64,
    /// Demand forecast increment over the interval (MW)
    pub df: f64,
}

/// Fast-start inflexibility profile parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FastStartProfile {
    pub min_loading_mw: f64,
    /// Mode 0..=4 at the start of the interval; absent when telemetry is
    /// missing, in which case no profile constraint is built.
    pub current_mode: Option<u8>,
    pub current_mode_time: Option<f64>,
    pub t1: f64,
    pub t2: f64,
    pub t3: f64,
    pub t4: f64,
}

/// Market participant (generator or load).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trader {
    pub id: String,
    pub trader_type: TraderType,
    pub semi_dispatch: bool,
    pub region: String,
    /// Effective initial MW (WhatIfInitialMW substituted for pricing views
    /// of intervention cases).
    pub initial_mw: f64,
    /// AGC upper enablement limit
    pub hmw: Option<f64>,
    /// AGC lower enablement limit
    pub lmw: Option<f64>,
    /// AGC on/off; required for regulation FCAS availability
    pub agc_enabled: Option<bool>,
    /// SCADA telemetered ramp rates (MW/h)
    pub scada_ramp_up: Option<f64>,
    pub scada_ramp_down: Option<f64>,
    /// Unconstrained intermittent generation forecast (semi-dispatch only)
    pub uigf: Option<f64>,
    pub fast_start: Option<FastStartProfile>,
}

/// One (trader, trade type) offer: 10 price bands, 10 quantity bands, and
/// either ramp rates (energy) or a trapezium (FCAS).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub trader_id: String,
    pub trade_type: TradeType,
    pub price_bands: [f64; 10],
    pub quantity_bands: [f64; 10],
    pub max_avail: f64,
    /// Offered ramp rates (MW/h); energy offers only
    pub ramp_up: Option<f64>,
    pub ramp_down: Option<f64>,
    pub trapezium: Option<FcasTrapezium>,
}

impl Offer {
    pub fn max_quantity_band(&self) -> f64 {
        self.quantity_bands.iter().copied().fold(0.0, f64::max)
    }
}

/// One marginal-loss-factor curve segment: the factor applies up to `limit`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LossSegment {
    pub limit: f64,
    pub factor: f64,
}

/// Piecewise marginal loss factor curve for an interconnector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LossModel {
    /// Absolute MW bound for the leftmost segment start (must be > 0)
    pub loss_lower_limit: f64,
    /// Fraction of loss allocated to the from-region (non-MNSP only)
    pub loss_share: f64,
    pub segments: Vec<LossSegment>,
}

/// Per-region-endpoint MNSP offer (an MNSP bids like a trader at each end).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MnspOffer {
    pub region: String,
    pub price_bands: [f64; 10],
    pub quantity_bands: [f64; 10],
    pub max_avail: f64,
    pub ramp_up: Option<f64>,
    pub ramp_down: Option<f64>,
}

/// MNSP-specific parameters: asymmetric loss factors and offers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MnspParams {
    pub from_region_lf_export: f64,
    pub from_region_lf_import: f64,
    pub to_region_lf_export: f64,
    pub to_region_lf_import: f64,
    pub offers: Vec<MnspOffer>,
}

/// Interconnector between two regions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interconnector {
    pub id: String,
    pub from_region: String,
    pub to_region: String,
    /// Absolute MW limits (lower limit stored positive)
    pub lower_limit: f64,
    pub upper_limit: f64,
    /// Effective initial flow (positive = from→to)
    pub initial_mw: f64,
    pub loss_model: LossModel,
    pub mnsp: Option<MnspParams>,
}

impl Interconnector {
    pub fn is_mnsp(&self) -> bool {
        self.mnsp.is_some()
    }

    pub fn mnsp_offer(&self, region: &str) -> Option<&MnspOffer> {
        self.mnsp
            .as_ref()
            .and_then(|m| m.offers.iter().find(|o| o.region == region))
    }
}

/// Generic (network) constraint with a linear LHS over trader,
/// interconnector and region variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenericConstraint {
    pub id: String,
    pub kind: ConstraintKind,
    pub rhs: f64,
    /// Constraint violation factor ($/MW of deficit)
    pub violation_price: f64,
    pub trader_factors: Vec<(String, TradeType, f64)>,
    pub interconnector_factors: Vec<(String, f64)>,
    pub region_factors: Vec<(String, TradeType, f64)>,
}

/// Case-wide constraint violation prices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CvfPrices {
    pub voll: f64,
    pub energy_deficit: f64,
    pub energy_surplus: f64,
    pub uigf_surplus: f64,
    pub ramp_rate: f64,
    pub capacity: f64,
    pub offer: f64,
    pub mnsp_offer: f64,
    pub mnsp_ramp_rate: f64,
    pub mnsp_capacity: f64,
    pub mnsp_loss: f64,
    pub as_profile: f64,
    pub as_max_avail: f64,
    pub as_enablement_min: f64,
    pub as_enablement_max: f64,
    pub interconnector: f64,
    pub fast_start: f64,
    pub generic_constraint: f64,
    pub satisfactory_network: f64,
    pub tie_break: f64,
}

/// Reference solution values for one trader (NemSpdOutputs mirror).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraderReference {
    pub energy_target: f64,
    pub fcas_targets: BTreeMap<TradeType, f64>,
    pub fcas_violations: BTreeMap<TradeType, f64>,
}

/// Reference solution values for one region.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegionReference {
    pub dispatched_generation: f64,
    pub dispatched_load: f64,
    pub fixed_demand: f64,
    pub net_export: f64,
    pub surplus_generation: f64,
    pub cleared_demand: f64,
}

/// Reference solution values for one interconnector.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InterconnectorReference {
    pub flow: f64,
    pub losses: f64,
    pub deficit: f64,
}

/// Reference solution values for one generic constraint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConstraintReference {
    pub rhs: f64,
    pub deficit: f64,
}

/// Reference period solution aggregates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PeriodReference {
    pub total_objective: f64,
}

/// Reference solution extracted from the casefile's output mirror,
/// filtered to the resolved intervention flag.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferenceSolution {
    pub traders: BTreeMap<String, TraderReference>,
    pub regions: BTreeMap<String, RegionReference>,
    pub interconnectors: BTreeMap<String, InterconnectorReference>,
    pub constraints: BTreeMap<String, ConstraintReference>,
    pub period: Option<PeriodReference>,
}

/// Fully extracted casefile for one dispatch interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchCase {
    pub case_id: String,
    /// Resolved intervention status flag ("0" or "1")
    pub intervention: String,
    pub cvf: CvfPrices,
    pub regions: Vec<Region>,
    pub traders: Vec<Trader>,
    pub offers: Vec<Offer>,
    pub interconnectors: Vec<Interconnector>,
    pub constraints: Vec<GenericConstraint>,
    pub reference: Option<ReferenceSolution>,
}

impl DispatchCase {
    pub fn trader(&self, id: &str) -> Option<&Trader> {
        self.traders.iter().find(|t| t.id == id)
    }

    pub fn region(&self, id: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.id == id)
    }

    pub fn interconnector(&self, id: &str) -> Option<&Interconnector> {
        self.interconnectors.iter().find(|i| i.id == id)
    }

    pub fn offer(&self, trader_id: &str, trade_type: TradeType) -> Option<&Offer> {
        self.offers
            .iter()
            .find(|o| o.trader_id == trader_id && o.trade_type == trade_type)
    }

    pub fn has_offer(&self, trader_id: &str, trade_type: TradeType) -> bool {
        self.offer(trader_id, trade_type).is_some()
    }

    /// The trader's energy offer, if one was submitted.
    pub fn energy_offer(&self, trader_id: &str) -> Option<&Offer> {
        let trader = self.trader(trader_id)?;
        self.offer(trader_id, trader.trader_type.energy_offer_type())
    }

    /// Structural validation applied before any model is built.
    pub fn validate(&self) -> SpdResult<()> {
        for offer in &self.offers {
            if self.trader(&offer.trader_id).is_none() {
                return Err(SpdError::CasefileValue(format!(
                    "offer ({}, {}) references unknown trader",
                    offer.trader_id, offer.trade_type
                )));
            }
            if offer.quantity_bands.iter().any(|q| *q < 0.0) {
                return Err(SpdError::CasefileValue(format!(
                    "offer ({}, {}) has a negative quantity band",
                    offer.trader_id, offer.trade_type
                )));
            }
        }

        for trader in &self.traders {
            if self.region(&trader.region).is_none() {
                return Err(SpdError::CasefileValue(format!(
                    "trader {} references unknown region {}",
                    trader.id, trader.region
                )));
            }
            if let Some(profile) = &trader.fast_start {
                if let Some(mode) = profile.current_mode {
                    if mode > 4 {
                        return Err(SpdError::CasefileValue(format!(
                            "trader {} has fast-start mode {mode} outside 0..=4",
                            trader.id
                        )));
                    }
                }
            }
        }

        for ic in &self.interconnectors {
            if self.region(&ic.from_region).is_none() || self.region(&ic.to_region).is_none() {
                return Err(SpdError::CasefileValue(format!(
                    "interconnector {} references an unknown region",
                    ic.id
                )));
            }
            if ic.from_region == ic.to_region {
                return Err(SpdError::CasefileValue(format!(
                    "interconnector {} connects {} to itself",
                    ic.id, ic.from_region
                )));
            }
            if ic.loss_model.loss_lower_limit <= 0.0 {
                return Err(SpdError::CasefileValue(format!(
                    "interconnector {} has non-positive LossLowerLimit",
                    ic.id
                )));
            }
            let limits: Vec<f64> = ic.loss_model.segments.iter().map(|s| s.limit).collect();
            if limits.windows(2).any(|w| w[1] <= w[0]) {
                return Err(SpdError::CasefileValue(format!(
                    "interconnector {} loss segment limits are not strictly increasing",
                    ic.id
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_case() -> DispatchCase {
        DispatchCase {
            case_id: "TEST1".to_string(),
            intervention: "0".to_string(),
            cvf: CvfPrices {
                voll: 14500.0,
                energy_deficit: 2.18e6,
                energy_surplus: 2.18e6,
                uigf_surplus: 1.09e6,
                ramp_rate: 1.156e6,
                capacity: 5.43e6,
                offer: 1.09e6,
                mnsp_offer: 1.09e6,
                mnsp_ramp_rate: 1.156e6,
                mnsp_capacity: 5.43e6,
                mnsp_loss: 1.09e6,
                as_profile: 5.43e5,
                as_max_avail: 5.43e5,
                as_enablement_min: 1.09e6,
                as_enablement_max: 1.09e6,
                interconnector: 1.69e6,
                fast_start: 1.156e6,
                generic_constraint: 4.35e5,
                satisfactory_network: 1.45e7,
                tie_break: 1e-2,
            },
            regions: vec![Region {
                id: "NSW1".to_string(),
                initial_demand: 100.0,
                ade: 0.0,
                df: 0.0,
            }],
            traders: vec![Trader {
                id: "G1".to_string(),
                trader_type: TraderType::Generator,
                semi_dispatch: false,
                region: "NSW1".to_string(),
                initial_mw: 50.0,
                hmw: None,
                lmw: None,
                agc_enabled: None,
                scada_ramp_up: None,
                scada_ramp_down: None,
                uigf: None,
                fast_start: None,
            }],
            offers: vec![Offer {
                trader_id: "G1".to_string(),
                trade_type: TradeType::Enof,
                price_bands: [40.0; 10],
                quantity_bands: [10.0; 10],
                max_avail: 100.0,
                ramp_up: None,
                ramp_down: None,
                trapezium: None,
            }],
            interconnectors: vec![],
            constraints: vec![],
            reference: None,
        }
    }

    #[test]
    fn test_validate_accepts_minimal_case() {
        minimal_case().validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_unknown_trader() {
        let mut case = minimal_case();
        case.offers[0].trader_id = "MISSING".to_string();
        assert!(case.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_self_loop_interconnector() {
        let mut case = minimal_case();
        case.interconnectors.push(Interconnector {
            id: "I1".to_string(),
            from_region: "NSW1".to_string(),
            to_region: "NSW1".to_string(),
            lower_limit: 100.0,
            upper_limit: 100.0,
            initial_mw: 0.0,
            loss_model: LossModel {
                loss_lower_limit: 100.0,
                loss_share: 0.5,
                segments: vec![],
            },
            mnsp: None,
        });
        // Same from/to region trips validation before segment checks
        assert!(case.validate().is_err());
    }

    #[test]
    fn test_energy_offer_lookup() {
        let case = minimal_case();
        assert!(case.energy_offer("G1").is_some());
        assert!(case.offer("G1", TradeType::R6se).is_none());
    }
}
