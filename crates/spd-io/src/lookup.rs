//! Typed accessors over the casefile document
//!
//! One accessor per collection/attribute pair the engine reads. Every
//! accessor is a pure read; entity order follows document order, derived
//! index sets (generic-constraint variable indexes) are deduplicated and
//! sorted so model construction is deterministic.

use crate::document::{as_list, as_list_or_empty, attr, attr_opt, CaseDocument};
use serde_json::Value;
use spd_core::types::ConstraintKind;
use spd_core::{RunMode, SpdError, SpdResult, TradeType};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Collection iterators
// ---------------------------------------------------------------------------

fn regions(doc: &CaseDocument) -> SpdResult<Vec<&Value>> {
    as_list(doc.inputs("RegionCollection.Region")?)
}

fn traders(doc: &CaseDocument) -> SpdResult<Vec<&Value>> {
    as_list(doc.inputs("TraderCollection.Trader")?)
}

fn trader_periods(doc: &CaseDocument) -> SpdResult<Vec<&Value>> {
    as_list(doc.inputs("PeriodCollection.Period.TraderPeriodCollection.TraderPeriod")?)
}

fn trades(trader_period: &Value) -> SpdResult<Vec<&Value>> {
    as_list_or_empty(
        trader_period
            .get("TradeCollection")
            .and_then(|c| c.get("Trade")),
    )
}

fn interconnectors(doc: &CaseDocument) -> SpdResult<Vec<&Value>> {
    as_list(doc.inputs("InterconnectorCollection.Interconnector")?)
}

fn interconnector_periods(doc: &CaseDocument) -> SpdResult<Vec<&Value>> {
    as_list(doc.inputs("PeriodCollection.Period.InterconnectorPeriodCollection.InterconnectorPeriod")?)
}

fn generic_constraints(doc: &CaseDocument) -> SpdResult<Vec<&Value>> {
    as_list(doc.inputs("GenericConstraintCollection.GenericConstraint")?)
}

fn generic_constraint_periods(doc: &CaseDocument) -> SpdResult<Vec<&Value>> {
    as_list(
        doc.inputs("PeriodCollection.Period.GenericConstraintPeriodCollection.GenericConstraintPeriod")?,
    )
}

fn region_periods(doc: &CaseDocument) -> SpdResult<Vec<&Value>> {
    as_list(doc.inputs("PeriodCollection.Period.RegionPeriodCollection.RegionPeriod")?)
}

// ---------------------------------------------------------------------------
// Index sets
// ---------------------------------------------------------------------------

/// NEM region IDs in document order.
pub fn region_index(doc: &CaseDocument) -> SpdResult<Vec<String>> {
    regions(doc)?
        .iter()
        .map(|r| attr(r, "Region", "", "@RegionID"))
        .collect()
}

/// Trader IDs in period-collection order.
pub fn trader_index(doc: &CaseDocument) -> SpdResult<Vec<String>> {
    trader_periods(doc)?
        .iter()
        .map(|t| attr(t, "TraderPeriod", "", "@TraderID"))
        .collect()
}

/// (trader, trade type) offer index.
pub fn trader_offer_index(doc: &CaseDocument) -> SpdResult<Vec<(String, TradeType)>> {
    let mut offers = Vec::new();
    for period in trader_periods(doc)? {
        let trader_id: String = attr(period, "TraderPeriod", "", "@TraderID")?;
        for trade in trades(period)? {
            let trade_type: String = attr(trade, "Trade", &trader_id, "@TradeType")?;
            offers.push((trader_id.clone(), TradeType::from_str(&trade_type)?));
        }
    }
    Ok(offers)
}

/// Traders flagged semi-dispatchable.
pub fn trader_semi_dispatch_index(doc: &CaseDocument) -> SpdResult<Vec<String>> {
    let mut out = Vec::new();
    for trader in traders(doc)? {
        let id: String = attr(trader, "Trader", "", "@TraderID")?;
        let flag: String = attr(trader, "Trader", &id, "@SemiDispatch")?;
        if flag == "1" {
            out.push(id);
        }
    }
    Ok(out)
}

/// Fast-start unit IDs.
pub fn trader_fast_start_index(doc: &CaseDocument) -> SpdResult<Vec<String>> {
    let mut out = Vec::new();
    for trader in traders(doc)? {
        let id: String = attr(trader, "Trader", "", "@TraderID")?;
        if attr_opt::<String>(trader, "@FastStart")?.as_deref() == Some("1") {
            out.push(id);
        }
    }
    Ok(out)
}

/// Generic constraint IDs active in the period.
pub fn generic_constraint_index(doc: &CaseDocument) -> SpdResult<Vec<String>> {
    generic_constraint_periods(doc)?
        .iter()
        .map(|c| attr(c, "GenericConstraintPeriod", "", "@ConstraintID"))
        .collect()
}

/// Unique (trader, trade type) pairs referenced by constraint LHS factors.
pub fn gc_trader_variable_index(doc: &CaseDocument) -> SpdResult<Vec<(String, TradeType)>> {
    let mut vars = BTreeSet::new();
    for constraint in generic_constraints(doc)? {
        let factors = constraint
            .get("LHSFactorCollection")
            .and_then(|c| c.get("TraderFactor"));
        for factor in as_list_or_empty(factors)? {
            let trader_id: String = attr(factor, "TraderFactor", "", "@TraderID")?;
            let trade_type: String = attr(factor, "TraderFactor", &trader_id, "@TradeType")?;
            vars.insert((trader_id, TradeType::from_str(&trade_type)?));
        }
    }
    Ok(vars.into_iter().collect())
}

/// Unique interconnector IDs referenced by constraint LHS factors.
pub fn gc_interconnector_variable_index(doc: &CaseDocument) -> SpdResult<Vec<String>> {
    let mut vars = BTreeSet::new();
    for constraint in generic_constraints(doc)? {
        let factors = constraint
            .get("LHSFactorCollection")
            .and_then(|c| c.get("InterconnectorFactor"));
        for factor in as_list_or_empty(factors)? {
            vars.insert(attr::<String>(factor, "InterconnectorFactor", "", "@InterconnectorID")?);
        }
    }
    Ok(vars.into_iter().collect())
}

/// Unique (region, trade type) pairs referenced by constraint LHS factors.
pub fn gc_region_variable_index(doc: &CaseDocument) -> SpdResult<Vec<(String, TradeType)>> {
    let mut vars = BTreeSet::new();
    for constraint in generic_constraints(doc)? {
        let factors = constraint
            .get("LHSFactorCollection")
            .and_then(|c| c.get("RegionFactor"));
        for factor in as_list_or_empty(factors)? {
            let region_id: String = attr(factor, "RegionFactor", "", "@RegionID")?;
            let trade_type: String = attr(factor, "RegionFactor", &region_id, "@TradeType")?;
            vars.insert((region_id, TradeType::from_str(&trade_type)?));
        }
    }
    Ok(vars.into_iter().collect())
}

/// Interconnector IDs in period-collection order.
pub fn interconnector_index(doc: &CaseDocument) -> SpdResult<Vec<String>> {
    interconnector_periods(doc)?
        .iter()
        .map(|i| attr(i, "InterconnectorPeriod", "", "@InterconnectorID"))
        .collect()
}

/// Interconnectors flagged as MNSPs.
pub fn mnsp_index(doc: &CaseDocument) -> SpdResult<Vec<String>> {
    let mut out = Vec::new();
    for period in interconnector_periods(doc)? {
        let id: String = attr(period, "InterconnectorPeriod", "", "@InterconnectorID")?;
        let mnsp: String = attr(period, "InterconnectorPeriod", &id, "@MNSP")?;
        if mnsp == "1" {
            out.push(id);
        }
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Trader attributes
// ---------------------------------------------------------------------------

/// Initial-condition attribute for every trader exposing it.
pub fn trader_initial_condition_attribute<T: FromStr>(
    doc: &CaseDocument,
    attribute: &str,
) -> SpdResult<BTreeMap<String, T>> {
    let mut values = BTreeMap::new();
    for trader in traders(doc)? {
        let id: String = attr(trader, "Trader", "", "@TraderID")?;
        let conditions = trader
            .get("TraderInitialConditionCollection")
            .and_then(|c| c.get("TraderInitialCondition"));
        for condition in as_list_or_empty(conditions)? {
            if attr_opt::<String>(condition, "@InitialConditionID")?.as_deref() == Some(attribute) {
                let raw: String = attr(condition, "TraderInitialCondition", &id, "@Value")?;
                let parsed = raw.parse::<T>().map_err(|_| {
                    SpdError::ParseFailure(format!("trader {id} {attribute}: '{raw}'"))
                })?;
                values.insert(id.clone(), parsed);
            }
        }
    }
    Ok(values)
}

/// Collection attribute (from `TraderCollection.Trader`) for every trader.
pub fn trader_collection_attribute<T: FromStr>(
    doc: &CaseDocument,
    attribute: &str,
) -> SpdResult<BTreeMap<String, T>> {
    let mut values = BTreeMap::new();
    for trader in traders(doc)? {
        let id: String = attr(trader, "Trader", "", "@TraderID")?;
        let value: T = attr(trader, "Trader", &id, attribute)?;
        values.insert(id, value);
    }
    Ok(values)
}

/// Period attribute for traders exposing it (e.g. `@UIGF`, `@RegionID`).
pub fn trader_period_attribute<T: FromStr>(
    doc: &CaseDocument,
    attribute: &str,
) -> SpdResult<BTreeMap<String, T>> {
    let mut values = BTreeMap::new();
    for period in trader_periods(doc)? {
        let id: String = attr(period, "TraderPeriod", "", "@TraderID")?;
        if let Some(value) = attr_opt::<T>(period, attribute)? {
            values.insert(id, value);
        }
    }
    Ok(values)
}

/// Per-offer attribute from the period trade elements (e.g. `@MaxAvail`).
pub fn trader_period_trade_attribute<T: FromStr>(
    doc: &CaseDocument,
    attribute: &str,
) -> SpdResult<BTreeMap<(String, TradeType), T>> {
    let mut values = BTreeMap::new();
    for period in trader_periods(doc)? {
        let id: String = attr(period, "TraderPeriod", "", "@TraderID")?;
        for trade in trades(period)? {
            let trade_type: String = attr(trade, "Trade", &id, "@TradeType")?;
            let trade_type = TradeType::from_str(&trade_type)?;
            if let Some(value) = attr_opt::<T>(trade, attribute)? {
                values.insert((id.clone(), trade_type), value);
            }
        }
    }
    Ok(values)
}

/// Fast-start attribute for fast-start traders; missing values preserved
/// as `None`.
pub fn trader_fast_start_attribute<T: FromStr>(
    doc: &CaseDocument,
    attribute: &str,
) -> SpdResult<BTreeMap<String, Option<T>>> {
    let fast_start: BTreeSet<String> = trader_fast_start_index(doc)?.into_iter().collect();
    let mut values = BTreeMap::new();
    for trader in traders(doc)? {
        let id: String = attr(trader, "Trader", "", "@TraderID")?;
        if fast_start.contains(&id) {
            values.insert(id.clone(), attr_opt::<T>(trader, attribute)?);
        }
    }
    Ok(values)
}

/// Price bands from the trader price structure collection.
pub fn trader_price_bands(
    doc: &CaseDocument,
) -> SpdResult<BTreeMap<(String, TradeType), [f64; 10]>> {
    let mut bands = BTreeMap::new();
    for trader in traders(doc)? {
        let id: String = attr(trader, "Trader", "", "@TraderID")?;
        let structures = trader
            .get("TradePriceStructureCollection")
            .and_then(|c| c.get("TradePriceStructure"))
            .and_then(|c| c.get("TradeTypePriceStructureCollection"))
            .and_then(|c| c.get("TradeTypePriceStructure"));
        for structure in as_list_or_empty(structures)? {
            let trade_type: String = attr(structure, "TradeTypePriceStructure", &id, "@TradeType")?;
            let trade_type = TradeType::from_str(&trade_type)?;
            let mut prices = [0.0; 10];
            for (band, price) in prices.iter_mut().enumerate() {
                *price = attr(
                    structure,
                    "TradeTypePriceStructure",
                    &id,
                    &format!("@PriceBand{}", band + 1),
                )?;
            }
            bands.insert((id.clone(), trade_type), prices);
        }
    }
    Ok(bands)
}

/// Quantity bands from the period trade elements.
pub fn trader_quantity_bands(
    doc: &CaseDocument,
) -> SpdResult<BTreeMap<(String, TradeType), [f64; 10]>> {
    let mut bands = BTreeMap::new();
    for period in trader_periods(doc)? {
        let id: String = attr(period, "TraderPeriod", "", "@TraderID")?;
        for trade in trades(period)? {
            let trade_type: String = attr(trade, "Trade", &id, "@TradeType")?;
            let trade_type = TradeType::from_str(&trade_type)?;
            let mut quantities = [0.0; 10];
            for (band, quantity) in quantities.iter_mut().enumerate() {
                *quantity = attr(trade, "Trade", &id, &format!("@BandAvail{}", band + 1))?;
            }
            bands.insert((id.clone(), trade_type), quantities);
        }
    }
    Ok(bands)
}

// ---------------------------------------------------------------------------
// Interconnector attributes
// ---------------------------------------------------------------------------

/// Initial-condition attribute for interconnectors.
pub fn interconnector_collection_attribute<T: FromStr>(
    doc: &CaseDocument,
    attribute: &str,
) -> SpdResult<BTreeMap<String, T>> {
    let mut values = BTreeMap::new();
    for ic in interconnectors(doc)? {
        let id: String = attr(ic, "Interconnector", "", "@InterconnectorID")?;
        let conditions = ic
            .get("InterconnectorInitialConditionCollection")
            .and_then(|c| c.get("InterconnectorInitialCondition"));
        for condition in as_list_or_empty(conditions)? {
            if attr_opt::<String>(condition, "@InitialConditionID")?.as_deref() == Some(attribute) {
                let raw: String = attr(condition, "InterconnectorInitialCondition", &id, "@Value")?;
                let parsed = raw.parse::<T>().map_err(|_| {
                    SpdError::ParseFailure(format!("interconnector {id} {attribute}: '{raw}'"))
                })?;
                values.insert(id.clone(), parsed);
            }
        }
    }
    Ok(values)
}

/// Period attribute for every interconnector.
pub fn interconnector_period_attribute<T: FromStr>(
    doc: &CaseDocument,
    attribute: &str,
) -> SpdResult<BTreeMap<String, T>> {
    let mut values = BTreeMap::new();
    for period in interconnector_periods(doc)? {
        let id: String = attr(period, "InterconnectorPeriod", "", "@InterconnectorID")?;
        let value: T = attr(period, "InterconnectorPeriod", &id, attribute)?;
        values.insert(id, value);
    }
    Ok(values)
}

/// Period attribute for MNSP interconnectors only (loss factors).
pub fn mnsp_period_attribute<T: FromStr>(
    doc: &CaseDocument,
    attribute: &str,
) -> SpdResult<BTreeMap<String, T>> {
    let mut values = BTreeMap::new();
    for period in interconnector_periods(doc)? {
        let id: String = attr(period, "InterconnectorPeriod", "", "@InterconnectorID")?;
        let mnsp: String = attr(period, "InterconnectorPeriod", &id, "@MNSP")?;
        if mnsp != "1" {
            continue;
        }
        let value: T = attr(period, "InterconnectorPeriod", &id, attribute)?;
        values.insert(id, value);
    }
    Ok(values)
}

/// Loss-model attribute (e.g. `@LossShare`, `@LossLowerLimit`).
pub fn loss_model_attribute<T: FromStr>(
    doc: &CaseDocument,
    attribute: &str,
) -> SpdResult<BTreeMap<String, T>> {
    let mut values = BTreeMap::new();
    for ic in interconnectors(doc)? {
        let id: String = attr(ic, "Interconnector", "", "@InterconnectorID")?;
        let loss_model = ic
            .get("LossModelCollection")
            .and_then(|c| c.get("LossModel"))
            .ok_or_else(|| SpdError::missing("Interconnector", &id, "LossModel"))?;
        values.insert(id.clone(), attr(loss_model, "LossModel", &id, attribute)?);
    }
    Ok(values)
}

/// Ordered loss segments for every interconnector.
pub fn loss_model_segments(
    doc: &CaseDocument,
) -> SpdResult<BTreeMap<String, Vec<spd_core::LossSegment>>> {
    let mut values = BTreeMap::new();
    for ic in interconnectors(doc)? {
        let id: String = attr(ic, "Interconnector", "", "@InterconnectorID")?;
        let segments = ic
            .get("LossModelCollection")
            .and_then(|c| c.get("LossModel"))
            .and_then(|c| c.get("SegmentCollection"))
            .and_then(|c| c.get("Segment"));
        let mut spans = Vec::new();
        for segment in as_list_or_empty(segments)? {
            spans.push(spd_core::LossSegment {
                limit: attr(segment, "Segment", &id, "@Limit")?,
                factor: attr(segment, "Segment", &id, "@Factor")?,
            });
        }
        values.insert(id, spans);
    }
    Ok(values)
}

/// MNSP offer elements keyed by (interconnector, region).
fn mnsp_offers(doc: &CaseDocument) -> SpdResult<Vec<(String, String, &Value)>> {
    let mut offers = Vec::new();
    for period in interconnector_periods(doc)? {
        let id: String = attr(period, "InterconnectorPeriod", "", "@InterconnectorID")?;
        let collection = period
            .get("MNSPOfferCollection")
            .and_then(|c| c.get("MNSPOffer"));
        for offer in as_list_or_empty(collection)? {
            let region: String = attr(offer, "MNSPOffer", &id, "@RegionID")?;
            offers.push((id.clone(), region, offer));
        }
    }
    Ok(offers)
}

/// (interconnector, region) MNSP offer index.
pub fn mnsp_offer_index(doc: &CaseDocument) -> SpdResult<Vec<(String, String)>> {
    Ok(mnsp_offers(doc)?
        .into_iter()
        .map(|(id, region, _)| (id, region))
        .collect())
}

/// MNSP quantity bands keyed by (interconnector, region).
pub fn mnsp_quantity_bands(
    doc: &CaseDocument,
) -> SpdResult<BTreeMap<(String, String), [f64; 10]>> {
    let mut bands = BTreeMap::new();
    for (id, region, offer) in mnsp_offers(doc)? {
        let mut quantities = [0.0; 10];
        for (band, quantity) in quantities.iter_mut().enumerate() {
            *quantity = attr(offer, "MNSPOffer", &id, &format!("@BandAvail{}", band + 1))?;
        }
        bands.insert((id, region), quantities);
    }
    Ok(bands)
}

/// Per-offer MNSP attribute (`@MaxAvail`, `@RampUpRate`, ...).
pub fn mnsp_quantity_band_attribute<T: FromStr>(
    doc: &CaseDocument,
    attribute: &str,
) -> SpdResult<BTreeMap<(String, String), Option<T>>> {
    let mut values = BTreeMap::new();
    for (id, region, offer) in mnsp_offers(doc)? {
        values.insert((id.clone(), region), attr_opt::<T>(offer, attribute)?);
    }
    Ok(values)
}

/// MNSP price bands from the price structure collection.
pub fn mnsp_price_bands(doc: &CaseDocument) -> SpdResult<BTreeMap<(String, String), [f64; 10]>> {
    let mut bands = BTreeMap::new();
    for ic in interconnectors(doc)? {
        let id: String = attr(ic, "Interconnector", "", "@InterconnectorID")?;
        let structures = ic
            .get("MNSPPriceStructureCollection")
            .and_then(|c| c.get("MNSPPriceStructure"))
            .and_then(|c| c.get("MNSPRegionPriceStructureCollection"))
            .and_then(|c| c.get("MNSPRegionPriceStructure"));
        for structure in as_list_or_empty(structures)? {
            let region: String = attr(structure, "MNSPRegionPriceStructure", &id, "@RegionID")?;
            let mut prices = [0.0; 10];
            for (band, price) in prices.iter_mut().enumerate() {
                *price = attr(
                    structure,
                    "MNSPRegionPriceStructure",
                    &id,
                    &format!("@PriceBand{}", band + 1),
                )?;
            }
            bands.insert((id.clone(), region), prices);
        }
    }
    Ok(bands)
}

// ---------------------------------------------------------------------------
// Region, constraint and case attributes
// ---------------------------------------------------------------------------

/// Initial-condition attribute for regions (`InitialDemand`, `ADE`).
pub fn region_initial_condition_attribute<T: FromStr>(
    doc: &CaseDocument,
    attribute: &str,
) -> SpdResult<BTreeMap<String, T>> {
    let mut values = BTreeMap::new();
    for region in regions(doc)? {
        let id: String = attr(region, "Region", "", "@RegionID")?;
        let conditions = region
            .get("RegionInitialConditionCollection")
            .and_then(|c| c.get("RegionInitialCondition"));
        for condition in as_list_or_empty(conditions)? {
            if attr_opt::<String>(condition, "@InitialConditionID")?.as_deref() == Some(attribute) {
                let raw: String = attr(condition, "RegionInitialCondition", &id, "@Value")?;
                let parsed = raw.parse::<T>().map_err(|_| {
                    SpdError::ParseFailure(format!("region {id} {attribute}: '{raw}'"))
                })?;
                values.insert(id.clone(), parsed);
            }
        }
    }
    Ok(values)
}

/// Period attribute for every region (`@DF`).
pub fn region_period_attribute<T: FromStr>(
    doc: &CaseDocument,
    attribute: &str,
) -> SpdResult<BTreeMap<String, T>> {
    let mut values = BTreeMap::new();
    for period in region_periods(doc)? {
        let id: String = attr(period, "RegionPeriod", "", "@RegionID")?;
        values.insert(id.clone(), attr(period, "RegionPeriod", &id, attribute)?);
    }
    Ok(values)
}

/// Collection attribute for generic constraints that carry LHS factors.
pub fn generic_constraint_collection_attribute<T: FromStr>(
    doc: &CaseDocument,
    attribute: &str,
) -> SpdResult<BTreeMap<String, T>> {
    let mut values = BTreeMap::new();
    for constraint in generic_constraints(doc)? {
        if constraint.get("LHSFactorCollection").is_none() {
            continue;
        }
        let id: String = attr(constraint, "GenericConstraint", "", "@ConstraintID")?;
        values.insert(id.clone(), attr(constraint, "GenericConstraint", &id, attribute)?);
    }
    Ok(values)
}

/// Constraint LHS factor maps, skipping constraints with no factors.
pub fn generic_constraint_lhs_terms(
    doc: &CaseDocument,
) -> SpdResult<BTreeMap<String, ConstraintLhs>> {
    let mut terms = BTreeMap::new();
    for constraint in generic_constraints(doc)? {
        let Some(lhs) = constraint.get("LHSFactorCollection") else {
            continue;
        };
        let id: String = attr(constraint, "GenericConstraint", "", "@ConstraintID")?;

        let mut parsed = ConstraintLhs::default();
        for factor in as_list_or_empty(lhs.get("TraderFactor"))? {
            let trader_id: String = attr(factor, "TraderFactor", &id, "@TraderID")?;
            let trade_type: String = attr(factor, "TraderFactor", &id, "@TradeType")?;
            let value: f64 = attr(factor, "TraderFactor", &id, "@Factor")?;
            parsed
                .traders
                .push((trader_id, TradeType::from_str(&trade_type)?, value));
        }
        for factor in as_list_or_empty(lhs.get("InterconnectorFactor"))? {
            let ic_id: String = attr(factor, "InterconnectorFactor", &id, "@InterconnectorID")?;
            let value: f64 = attr(factor, "InterconnectorFactor", &id, "@Factor")?;
            parsed.interconnectors.push((ic_id, value));
        }
        for factor in as_list_or_empty(lhs.get("RegionFactor"))? {
            let region_id: String = attr(factor, "RegionFactor", &id, "@RegionID")?;
            let trade_type: String = attr(factor, "RegionFactor", &id, "@TradeType")?;
            let value: f64 = attr(factor, "RegionFactor", &id, "@Factor")?;
            parsed
                .regions
                .push((region_id, TradeType::from_str(&trade_type)?, value));
        }
        terms.insert(id, parsed);
    }
    Ok(terms)
}

/// Parsed LHS factor maps for one generic constraint.
#[derive(Debug, Clone, Default)]
pub struct ConstraintLhs {
    pub traders: Vec<(String, TradeType, f64)>,
    pub interconnectors: Vec<(String, f64)>,
    pub regions: Vec<(String, TradeType, f64)>,
}

/// Constraint kind per constraint (LE/GE/EQ).
pub fn generic_constraint_types(doc: &CaseDocument) -> SpdResult<BTreeMap<String, ConstraintKind>> {
    let raw: BTreeMap<String, String> = generic_constraint_collection_attribute(doc, "@Type")?;
    raw.into_iter()
        .map(|(id, kind)| Ok((id, ConstraintKind::from_str(&kind)?)))
        .collect()
}

/// Constraint RHS values from the solution mirror, filtered by
/// intervention flag.
pub fn generic_constraint_rhs(
    doc: &CaseDocument,
    intervention: &str,
) -> SpdResult<BTreeMap<String, f64>> {
    let mut values = BTreeMap::new();
    for solution in as_list_or_empty(doc.outputs("ConstraintSolution").ok())? {
        let id: String = attr(solution, "ConstraintSolution", "", "@ConstraintID")?;
        let flag: String = attr(solution, "ConstraintSolution", &id, "@Intervention")?;
        if flag == intervention {
            values.insert(id.clone(), attr(solution, "ConstraintSolution", &id, "@RHS")?);
        }
    }
    Ok(values)
}

/// Case-wide attribute (CVF prices, VoLL, case ID...).
pub fn case_attribute<T: FromStr>(doc: &CaseDocument, attribute: &str) -> SpdResult<T> {
    let case = doc.inputs("Case")?;
    attr(case, "Case", "", attribute)
}

/// Resolve the intervention status flag for a run mode.
pub fn intervention_status(doc: &CaseDocument, mode: RunMode) -> SpdResult<String> {
    let flag: String = case_attribute(doc, "@Intervention")?;
    let has_intervention = match flag.as_str() {
        "False" | "0" => false,
        "True" | "1" => true,
        other => {
            return Err(SpdError::CasefileValue(format!(
                "unexpected @Intervention value '{other}'"
            )))
        }
    };
    Ok(mode.intervention_status(has_intervention).to_string())
}

// ---------------------------------------------------------------------------
// Reference solution mirror
// ---------------------------------------------------------------------------

/// Per-entity solution elements filtered on the intervention flag.
pub fn solution_elements<'a>(
    doc: &'a CaseDocument,
    section: &str,
    intervention: &str,
) -> SpdResult<Vec<&'a Value>> {
    let Ok(collection) = doc.outputs(section) else {
        return Ok(Vec::new());
    };
    let mut out = Vec::new();
    for element in as_list(collection)? {
        let flag = attr_opt::<String>(element, "@Intervention")?;
        if flag.as_deref() == Some(intervention) || flag.is_none() {
            out.push(element);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixture() -> CaseDocument {
        CaseDocument::new(json!({
            "NEMSPDCaseFile": {
                "NemSpdInputs": {
                    "Case": {"@CaseID": "20201101001", "@Intervention": "False", "@VoLL": "14700"},
                    "RegionCollection": {"Region": [
                        {"@RegionID": "NSW1",
                         "RegionInitialConditionCollection": {"RegionInitialCondition": [
                             {"@InitialConditionID": "InitialDemand", "@Value": "7000"},
                             {"@InitialConditionID": "ADE", "@Value": "1.5"}
                         ]}}
                    ]},
                    "TraderCollection": {"Trader": [
                        {"@TraderID": "G1", "@TraderType": "GENERATOR", "@SemiDispatch": "0",
                         "TraderInitialConditionCollection": {"TraderInitialCondition": [
                             {"@InitialConditionID": "InitialMW", "@Value": "120"},
                             {"@InitialConditionID": "SCADARampUpRate", "@Value": "180"}
                         ]},
                         "TradePriceStructureCollection": {"TradePriceStructure": {
                             "TradeTypePriceStructureCollection": {"TradeTypePriceStructure": [
                                 {"@TradeType": "ENOF",
                                  "@PriceBand1": "10", "@PriceBand2": "20", "@PriceBand3": "30",
                                  "@PriceBand4": "40", "@PriceBand5": "50", "@PriceBand6": "60",
                                  "@PriceBand7": "70", "@PriceBand8": "80", "@PriceBand9": "90",
                                  "@PriceBand10": "100"}
                             ]}
                         }}}
                    ]},
                    "InterconnectorCollection": {"Interconnector": []},
                    "GenericConstraintCollection": {"GenericConstraint": [
                        {"@ConstraintID": "C1", "@Type": "LE", "@ViolationPrice": "35000",
                         "LHSFactorCollection": {
                            "TraderFactor": {"@TraderID": "G1", "@TradeType": "ENOF", "@Factor": "1"}
                         }}
                    ]},
                    "PeriodCollection": {"Period": {
                        "TraderPeriodCollection": {"TraderPeriod": [
                            {"@TraderID": "G1", "@RegionID": "NSW1",
                             "TradeCollection": {"Trade": [
                                {"@TradeType": "ENOF", "@MaxAvail": "150",
                                 "@BandAvail1": "50", "@BandAvail2": "0", "@BandAvail3": "0",
                                 "@BandAvail4": "0", "@BandAvail5": "0", "@BandAvail6": "0",
                                 "@BandAvail7": "0", "@BandAvail8": "0", "@BandAvail9": "0",
                                 "@BandAvail10": "100"}
                             ]}}
                        ]},
                        "InterconnectorPeriodCollection": {"InterconnectorPeriod": []},
                        "RegionPeriodCollection": {"RegionPeriod": [
                            {"@RegionID": "NSW1", "@DF": "2.5"}
                        ]},
                        "GenericConstraintPeriodCollection": {"GenericConstraintPeriod": [
                            {"@ConstraintID": "C1"}
                        ]}
                    }}
                },
                "NemSpdOutputs": {
                    "ConstraintSolution": [
                        {"@ConstraintID": "C1", "@Intervention": "0", "@RHS": "500", "@Deficit": "0"}
                    ]
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_index_sets() {
        let doc = fixture();
        assert_eq!(region_index(&doc).unwrap(), vec!["NSW1"]);
        assert_eq!(trader_index(&doc).unwrap(), vec!["G1"]);
        assert_eq!(
            trader_offer_index(&doc).unwrap(),
            vec![("G1".to_string(), TradeType::Enof)]
        );
        assert_eq!(generic_constraint_index(&doc).unwrap(), vec!["C1"]);
        assert!(mnsp_index(&doc).unwrap().is_empty());
    }

    #[test]
    fn test_gc_variable_indexes_deduplicate() {
        let doc = fixture();
        assert_eq!(
            gc_trader_variable_index(&doc).unwrap(),
            vec![("G1".to_string(), TradeType::Enof)]
        );
        assert!(gc_interconnector_variable_index(&doc).unwrap().is_empty());
    }

    #[test]
    fn test_initial_condition_lookup() {
        let doc = fixture();
        let initial: BTreeMap<String, f64> =
            trader_initial_condition_attribute(&doc, "InitialMW").unwrap();
        assert_eq!(initial["G1"], 120.0);

        let ramp: BTreeMap<String, f64> =
            trader_initial_condition_attribute(&doc, "SCADARampDnRate").unwrap();
        assert!(ramp.is_empty());
    }

    #[test]
    fn test_band_extraction() {
        let doc = fixture();
        let prices = trader_price_bands(&doc).unwrap();
        let quantities = trader_quantity_bands(&doc).unwrap();
        let key = ("G1".to_string(), TradeType::Enof);
        assert_eq!(prices[&key][0], 10.0);
        assert_eq!(prices[&key][9], 100.0);
        assert_eq!(quantities[&key][0], 50.0);
        assert_eq!(quantities[&key][9], 100.0);
    }

    #[test]
    fn test_constraint_lhs_and_rhs() {
        let doc = fixture();
        let lhs = generic_constraint_lhs_terms(&doc).unwrap();
        assert_eq!(lhs["C1"].traders.len(), 1);
        assert_eq!(lhs["C1"].traders[0].2, 1.0);

        let rhs = generic_constraint_rhs(&doc, "0").unwrap();
        assert_eq!(rhs["C1"], 500.0);
        assert!(generic_constraint_rhs(&doc, "1").unwrap().is_empty());
    }

    #[test]
    fn test_intervention_status() {
        let doc = fixture();
        assert_eq!(intervention_status(&doc, RunMode::Physical).unwrap(), "0");
        assert_eq!(intervention_status(&doc, RunMode::Pricing).unwrap(), "0");
    }

    #[test]
    fn test_region_attributes() {
        let doc = fixture();
        let demand: BTreeMap<String, f64> =
            region_initial_condition_attribute(&doc, "InitialDemand").unwrap();
        assert_eq!(demand["NSW1"], 7000.0);
        let df: BTreeMap<String, f64> = region_period_attribute(&doc, "@DF").unwrap();
        assert_eq!(df["NSW1"], 2.5);
    }
}
