//! Full pipeline test: casefile document → extraction → solve →
//! validation-format output against the embedded reference solution.

use serde_json::json;
use spd_core::{RunMode, SolutionFormat, TradeType};
use spd_io::{extract_case, CaseDocument};
use spd_solver::{preprocess, serialize_solution, solve_case};

fn casefile() -> CaseDocument {
    CaseDocument::new(json!({
        "NEMSPDCaseFile": {
            "NemSpdInputs": {
                "Case": {
                    "@CaseID": "20201101001",
                    "@Intervention": "False",
                    "@VoLL": "14500",
                    "@EnergyDeficitPrice": "2180000",
                    "@EnergySurplusPrice": "2180000",
                    "@UIGFSurplusPrice": "1090000",
                    "@RampRatePrice": "1156000",
                    "@CapacityPrice": "5430000",
                    "@OfferPrice": "1090000",
                    "@MNSPOfferPrice": "1090000",
                    "@MNSPRampRatePrice": "1156000",
                    "@MNSPCapacityPrice": "5430000",
                    "@MNSPLossesPrice": "1090000",
                    "@ASProfilePrice": "543000",
                    "@ASMaxAvailPrice": "543000",
                    "@ASEnablementMinPrice": "1090000",
                    "@ASEnablementMaxPrice": "1090000",
                    "@InterconnectorPrice": "1690000",
                    "@FastStartPrice": "1156000",
                    "@GenericConstraintPrice": "435000",
                    "@Satisfactory_Network_Price": "14500000",
                    "@TieBreakPrice": "1e-2"
                },
                "RegionCollection": {"Region": [
                    {"@RegionID": "NSW1",
                     "RegionInitialConditionCollection": {"RegionInitialCondition": [
                         {"@InitialConditionID": "InitialDemand", "@Value": "90"},
                         {"@InitialConditionID": "ADE", "@Value": "0"}
                     ]}}
                ]},
                "TraderCollection": {"Trader": [
                    {"@TraderID": "G1", "@TraderType": "GENERATOR", "@SemiDispatch": "0",
                     "TraderInitialConditionCollection": {"TraderInitialCondition": [
                         {"@InitialConditionID": "InitialMW", "@Value": "90"}
                     ]},
                     "TradePriceStructureCollection": {"TradePriceStructure": {
                         "TradeTypePriceStructureCollection": {"TradeTypePriceStructure": [
                             {"@TradeType": "ENOF",
                              "@PriceBand1": "25", "@PriceBand2": "60", "@PriceBand3": "0",
                              "@PriceBand4": "0", "@PriceBand5": "0", "@PriceBand6": "0",
                              "@PriceBand7": "0", "@PriceBand8": "0", "@PriceBand9": "0",
                              "@PriceBand10": "0"}
                         ]}
                     }}},
                    {"@TraderID": "L1", "@TraderType": "LOAD", "@SemiDispatch": "0",
                     "TraderInitialConditionCollection": {"TraderInitialCondition": [
                         {"@InitialConditionID": "InitialMW", "@Value": "10"}
                     ]},
                     "TradePriceStructureCollection": {"TradePriceStructure": {
                         "TradeTypePriceStructureCollection": {"TradeTypePriceStructure": [
                             {"@TradeType": "LDOF",
                              "@PriceBand1": "120", "@PriceBand2": "0", "@PriceBand3": "0",
                              "@PriceBand4": "0", "@PriceBand5": "0", "@PriceBand6": "0",
                              "@PriceBand7": "0", "@PriceBand8": "0", "@PriceBand9": "0",
                              "@PriceBand10": "0"}
                         ]}
                     }}}
                ]},
                "InterconnectorCollection": {"Interconnector": []},
                "GenericConstraintCollection": {"GenericConstraint": []},
                "PeriodCollection": {"Period": {
                    "TraderPeriodCollection": {"TraderPeriod": [
                        {"@TraderID": "G1", "@RegionID": "NSW1",
                         "TradeCollection": {"Trade": [
                             {"@TradeType": "ENOF", "@MaxAvail": "150",
                              "@BandAvail1": "100", "@BandAvail2": "50", "@BandAvail3": "0",
                              "@BandAvail4": "0", "@BandAvail5": "0", "@BandAvail6": "0",
                              "@BandAvail7": "0", "@BandAvail8": "0", "@BandAvail9": "0",
                              "@BandAvail10": "0"}
                         ]}},
                        {"@TraderID": "L1", "@RegionID": "NSW1",
                         "TradeCollection": {"Trade": [
                             {"@TradeType": "LDOF", "@MaxAvail": "20",
                              "@BandAvail1": "20", "@BandAvail2": "0", "@BandAvail3": "0",
                              "@BandAvail4": "0", "@BandAvail5": "0", "@BandAvail6": "0",
                              "@BandAvail7": "0", "@BandAvail8": "0", "@BandAvail9": "0",
                              "@BandAvail10": "0"}
                         ]}}
                    ]},
                    "InterconnectorPeriodCollection": {"InterconnectorPeriod": []},
                    "RegionPeriodCollection": {"RegionPeriod": [
                        {"@RegionID": "NSW1", "@DF": "0"}
                    ]},
                    "GenericConstraintPeriodCollection": {"GenericConstraintPeriod": []}
                }}
            },
            "NemSpdOutputs": {
                "CaseSolution": {"@SolverStatus": "0", "@InterventionStatus": "0"},
                "PeriodSolution": {"@Intervention": "0", "@TotalObjective": "4900"},
                "RegionSolution": [
                    {"@RegionID": "NSW1", "@Intervention": "0",
                     "@DispatchedGeneration": "100", "@DispatchedLoad": "20",
                     "@FixedDemand": "80", "@NetExport": "0",
                     "@SurplusGeneration": "0", "@ClearedDemand": "100"}
                ],
                "TraderSolution": [
                    {"@TraderID": "G1", "@Intervention": "0", "@EnergyTarget": "100"},
                    {"@TraderID": "L1", "@Intervention": "0", "@EnergyTarget": "20"}
                ],
                "InterconnectorSolution": [],
                "ConstraintSolution": []
            }
        }
    }))
    .unwrap()
}

#[test]
fn test_extract_resolves_effective_values() {
    let case = extract_case(&casefile(), RunMode::Physical).unwrap();

    assert_eq!(case.case_id, "20201101001");
    assert_eq!(case.intervention, "0");
    assert_eq!(case.regions.len(), 1);
    assert_eq!(case.traders.len(), 2);
    assert_eq!(case.offers.len(), 2);
    assert_eq!(case.cvf.voll, 14500.0);

    let g1 = case.trader("G1").unwrap();
    assert_eq!(g1.initial_mw, 90.0);
    assert!(!g1.semi_dispatch);

    let offer = case.offer("G1", TradeType::Enof).unwrap();
    assert_eq!(offer.price_bands[0], 25.0);
    assert_eq!(offer.quantity_bands[1], 50.0);
    assert_eq!(offer.max_avail, 150.0);

    let reference = case.reference.as_ref().unwrap();
    assert_eq!(reference.traders["G1"].energy_target, 100.0);
    assert_eq!(reference.regions["NSW1"].cleared_demand, 100.0);
}

#[test]
fn test_pipeline_validation_output_matches_reference() {
    let case = extract_case(&casefile(), RunMode::Physical).unwrap();
    let pre = preprocess(&case).unwrap();
    let solved = solve_case(&case, &pre).unwrap();

    // FixedDemand = 90 (initial) - 10 (initial scheduled load) = 80.
    // The 120 $/MWh load clears against the 25 $/MWh band; generation
    // covers demand plus the load: 100 MW from G1, 20 MW to L1.
    let g1 = solved.solution.trader_totals[&("G1".to_string(), TradeType::Enof)];
    let l1 = solved.solution.trader_totals[&("L1".to_string(), TradeType::Ldof)];
    assert!((g1 - 100.0).abs() < 0.1, "generation {g1}");
    assert!((l1 - 20.0).abs() < 0.1, "load {l1}");
    assert!((solved.solution.region_fixed_demand["NSW1"] - 80.0).abs() < 1e-9);

    let document = serialize_solution(&case, &solved, SolutionFormat::Validation).unwrap();
    let traders = document["TraderSolution"].as_array().unwrap();
    let g1_entry = traders
        .iter()
        .find(|t| t["@TraderID"] == "G1")
        .unwrap();
    let abs_difference = g1_entry["@EnergyTarget"]["abs_difference"].as_f64().unwrap();
    assert!(abs_difference < 0.1, "model vs reference gap {abs_difference}");
}
