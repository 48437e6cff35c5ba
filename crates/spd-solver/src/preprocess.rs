//! Casefile preprocessing
//!
//! Everything the model constructor needs that is not a raw casefile
//! parameter: price-tied band pairs, per-offer FCAS availability, MNSP
//! region loss indicators, SOS2 loss breakpoints and initial loss
//! estimates. Pure function of the case; running it twice yields an
//! identical bundle.

use serde::{Deserialize, Serialize};
use spd_core::fcas::{self, FcasOfferParams};
use spd_core::{DispatchCase, SpdResult, TradeType};
use std::collections::BTreeMap;

/// One price/quantity band of one trader offer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BandKey {
    pub trader_id: String,
    pub trade_type: TradeType,
    /// 1-based band number
    pub band: usize,
}

/// A pair of price-tied bands; `a < b` lexicographically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PriceTiedPair {
    pub a: BandKey,
    pub b: BandKey,
}

/// Preprocessing outputs, read-only after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessed {
    pub price_tied_generators: Vec<PriceTiedPair>,
    pub price_tied_loads: Vec<PriceTiedPair>,
    pub fcas_availability: BTreeMap<(String, TradeType), bool>,
    /// (mnsp id, region id) → 1.0 when initial-flow loss lands in region
    pub mnsp_loss_indicator: BTreeMap<(String, String), f64>,
    /// Per interconnector: SOS2 `(x, y)` breakpoints, length segments+1
    pub loss_breakpoints: BTreeMap<String, Vec<(f64, f64)>>,
    /// Loss integrated up to the effective initial flow
    pub initial_loss_estimate: BTreeMap<String, f64>,
}

/// Run the full preprocessing pipeline.
pub fn preprocess(case: &DispatchCase) -> SpdResult<Preprocessed> {
    Ok(Preprocessed {
        price_tied_generators: price_tied_bands(case, TradeType::Enof),
        price_tied_loads: price_tied_bands(case, TradeType::Ldof),
        fcas_availability: fcas_availability(case),
        mnsp_loss_indicator: mnsp_loss_indicator(case),
        loss_breakpoints: loss_breakpoints(case)?,
        initial_loss_estimate: initial_loss_estimates(case)?,
    })
}

/// Find pairs of energy bands, in the same region, with equal prices and
/// non-zero quantities. The tie-break slacks keep allocations across such
/// bands proportional instead of solver-arbitrary.
fn price_tied_bands(case: &DispatchCase, energy_type: TradeType) -> Vec<PriceTiedPair> {
    // (band key, price, region) for every non-empty band of the energy type
    let mut bands: Vec<(BandKey, f64, &str)> = Vec::new();
    for offer in &case.offers {
        if offer.trade_type != energy_type {
            continue;
        }
        let Some(trader) = case.trader(&offer.trader_id) else {
            continue;
        };
        for band in 0..10 {
            if offer.quantity_bands[band] != 0.0 {
                bands.push((
                    BandKey {
                        trader_id: offer.trader_id.clone(),
                        trade_type: energy_type,
                        band: band + 1,
                    },
                    offer.price_bands[band],
                    trader.region.as_str(),
                ));
            }
        }
    }

    let mut pairs: Vec<PriceTiedPair> = Vec::new();
    for (i, (key_a, price_a, region_a)) in bands.iter().enumerate() {
        for (key_b, price_b, region_b) in bands.iter().skip(i + 1) {
            if key_a.trader_id == key_b.trader_id && key_a.band == key_b.band {
                continue;
            }
            if region_a != region_b {
                continue;
            }
            if (price_a - price_b).abs() < 1e-6 {
                let (a, b) = if key_a < key_b {
                    (key_a.clone(), key_b.clone())
                } else {
                    (key_b.clone(), key_a.clone())
                };
                pairs.push(PriceTiedPair { a, b });
            }
        }
    }

    pairs.sort();
    pairs.dedup();
    pairs
}

/// FCAS availability for every FCAS offer in the case.
fn fcas_availability(case: &DispatchCase) -> BTreeMap<(String, TradeType), bool> {
    let mut availability = BTreeMap::new();
    for offer in &case.offers {
        if !offer.trade_type.is_fcas() {
            continue;
        }
        let Some(trader) = case.trader(&offer.trader_id) else {
            continue;
        };
        let Some(trapezium) = offer.trapezium else {
            continue;
        };

        let params = FcasOfferParams {
            trader_type: trader.trader_type,
            trade_type: offer.trade_type,
            semi_dispatch: trader.semi_dispatch,
            trapezium,
            max_quantity_band: offer.max_quantity_band(),
            energy_max_avail: case.energy_offer(&offer.trader_id).map(|o| o.max_avail),
            initial_mw: trader.initial_mw,
            uigf: trader.uigf,
            hmw: trader.hmw,
            lmw: trader.lmw,
            agc_enabled: trader.agc_enabled,
            agc_ramp_up: trader.scada_ramp_up,
            agc_ramp_down: trader.scada_ramp_down,
        };
        availability.insert(
            (offer.trader_id.clone(), offer.trade_type),
            fcas::availability(&params),
        );
    }
    availability
}

/// Loss indicator: 1 at the from-region for non-negative initial flow, 1
/// at the to-region for negative initial flow, 0 elsewhere. Uses initial
/// MW as the direction proxy for pre-solve accounting.
fn mnsp_loss_indicator(case: &DispatchCase) -> BTreeMap<(String, String), f64> {
    let mut indicator = BTreeMap::new();
    for ic in &case.interconnectors {
        if !ic.is_mnsp() {
            continue;
        }
        for region in &case.regions {
            let value = if region.id == ic.from_region && ic.initial_mw >= 0.0 {
                1.0
            } else if region.id == ic.to_region && ic.initial_mw < 0.0 {
                1.0
            } else {
                0.0
            };
            indicator.insert((ic.id.clone(), region.id.clone()), value);
        }
    }
    indicator
}

fn loss_breakpoints(case: &DispatchCase) -> SpdResult<BTreeMap<String, Vec<(f64, f64)>>> {
    case.interconnectors
        .iter()
        .map(|ic| Ok((ic.id.clone(), ic.loss_model.breakpoints()?)))
        .collect()
}

fn initial_loss_estimates(case: &DispatchCase) -> SpdResult<BTreeMap<String, f64>> {
    case.interconnectors
        .iter()
        .map(|ic| Ok((ic.id.clone(), ic.loss_model.loss_estimate(ic.initial_mw)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use spd_core::case::*;
    use spd_core::TraderType;

    fn cvf() -> CvfPrices {
        CvfPrices {
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
        }
    }

    fn generator(id: &str, region: &str) -> Trader {
        Trader {
            id: id.to_string(),
            trader_type: TraderType::Generator,
            semi_dispatch: false,
            region: region.to_string(),
            initial_mw: 50.0,
            hmw: None,
            lmw: None,
            agc_enabled: None,
            scada_ramp_up: None,
            scada_ramp_down: None,
            uigf: None,
            fast_start: None,
        }
    }

    fn energy_offer(trader: &str, prices: [f64; 10], quantities: [f64; 10]) -> Offer {
        Offer {
            trader_id: trader.to_string(),
            trade_type: TradeType::Enof,
            price_bands: prices,
            quantity_bands: quantities,
            max_avail: 100.0,
            ramp_up: None,
            ramp_down: None,
            trapezium: None,
        }
    }

    fn two_generator_case() -> DispatchCase {
        let mut prices_a = [999.0; 10];
        let mut prices_b = [999.0; 10];
        prices_a[0] = 25.0;
        prices_b[0] = 25.0;
        let mut quantities = [0.0; 10];
        quantities[0] = 40.0;

        DispatchCase {
            case_id: "T".to_string(),
            intervention: "0".to_string(),
            cvf: cvf(),
            regions: vec![Region {
                id: "NSW1".to_string(),
                initial_demand: 100.0,
                ade: 0.0,
                df: 0.0,
            }],
            traders: vec![generator("A", "NSW1"), generator("B", "NSW1")],
            offers: vec![
                energy_offer("A", prices_a, quantities),
                energy_offer("B", prices_b, quantities),
            ],
            interconnectors: vec![],
            constraints: vec![],
            reference: None,
        }
    }

    #[test]
    fn test_price_tied_pair_discovered_and_ordered() {
        let pre = preprocess(&two_generator_case()).unwrap();
        assert_eq!(pre.price_tied_generators.len(), 1);
        let pair = &pre.price_tied_generators[0];
        assert_eq!(pair.a.trader_id, "A");
        assert_eq!(pair.b.trader_id, "B");
        assert_eq!(pair.a.band, 1);
        assert!(pre.price_tied_loads.is_empty());
    }

    #[test]
    fn test_price_tie_requires_same_region_and_nonzero_bands() {
        let mut case = two_generator_case();
        case.regions.push(Region {
            id: "VIC1".to_string(),
            initial_demand: 100.0,
            ade: 0.0,
            df: 0.0,
        });
        case.traders[1].region = "VIC1".to_string();
        let pre = preprocess(&case).unwrap();
        assert!(pre.price_tied_generators.is_empty());

        let mut case = two_generator_case();
        case.offers[1].quantity_bands[0] = 0.0;
        let pre = preprocess(&case).unwrap();
        assert!(pre.price_tied_generators.is_empty());
    }

    #[test]
    fn test_preprocess_idempotent() {
        let case = two_generator_case();
        let first = preprocess(&case).unwrap();
        let second = preprocess(&case).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_mnsp_loss_indicator_follows_initial_flow_sign() {
        let mut case = two_generator_case();
        case.regions.push(Region {
            id: "VIC1".to_string(),
            initial_demand: 100.0,
            ade: 0.0,
            df: 0.0,
        });
        case.interconnectors.push(Interconnector {
            id: "MNSP1".to_string(),
            from_region: "NSW1".to_string(),
            to_region: "VIC1".to_string(),
            lower_limit: 100.0,
            upper_limit: 100.0,
            initial_mw: -30.0,
            loss_model: LossModel {
                loss_lower_limit: 100.0,
                loss_share: 1.0,
                segments: vec![LossSegment {
                    limit: 100.0,
                    factor: 0.02,
                }],
            },
            mnsp: Some(MnspParams {
                from_region_lf_export: 1.05,
                from_region_lf_import: 1.03,
                to_region_lf_export: 1.04,
                to_region_lf_import: 1.02,
                offers: vec![],
            }),
        });

        let pre = preprocess(&case).unwrap();
        let key_from = ("MNSP1".to_string(), "NSW1".to_string());
        let key_to = ("MNSP1".to_string(), "VIC1".to_string());
        assert_eq!(pre.mnsp_loss_indicator[&key_from], 0.0);
        assert_eq!(pre.mnsp_loss_indicator[&key_to], 1.0);

        // Zero initial flow counts as forward: loss sits at the from end
        case.interconnectors[0].initial_mw = 0.0;
        let pre = preprocess(&case).unwrap();
        assert_eq!(pre.mnsp_loss_indicator[&key_from], 1.0);
        assert_eq!(pre.mnsp_loss_indicator[&key_to], 0.0);
    }
}
