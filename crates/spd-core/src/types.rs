//! Market enumerations
//!
//! The casefile encodes trader and trade types as strings; these enums
//! replace string comparison throughout the model layer. Wire names are
//! preserved exactly for interop with the `@`-attribute format.

use crate::error::SpdError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Market participant category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TraderType {
    Generator,
    Load,
    NormallyOnLoad,
}

impl TraderType {
    /// Loads and normally-on loads share sign conventions throughout.
    pub fn is_load(self) -> bool {
        matches!(self, TraderType::Load | TraderType::NormallyOnLoad)
    }

    /// Energy offer type submitted by this participant category.
    pub fn energy_offer_type(self) -> TradeType {
        match self {
            TraderType::Generator => TradeType::Enof,
            TraderType::Load | TraderType::NormallyOnLoad => TradeType::Ldof,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TraderType::Generator => "GENERATOR",
            TraderType::Load => "LOAD",
            TraderType::NormallyOnLoad => "NORMALLY_ON_LOAD",
        }
    }
}

impl FromStr for TraderType {
    type Err = SpdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GENERATOR" => Ok(TraderType::Generator),
            "LOAD" => Ok(TraderType::Load),
            "NORMALLY_ON_LOAD" => Ok(TraderType::NormallyOnLoad),
            other => Err(SpdError::UnexpectedTraderType(other.to_string())),
        }
    }
}

impl fmt::Display for TraderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Offer type: energy (ENOF/LDOF) or one of the eight FCAS services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TradeType {
    /// Generator energy offer
    Enof,
    /// Load energy offer
    Ldof,
    /// Raise 6 second
    R6se,
    /// Raise 60 second
    R60s,
    /// Raise 5 minute
    R5mi,
    /// Raise regulation
    R5re,
    /// Lower 6 second
    L6se,
    /// Lower 60 second
    L60s,
    /// Lower 5 minute
    L5mi,
    /// Lower regulation
    L5re,
}

/// All FCAS services in wire order.
pub const FCAS_TRADE_TYPES: [TradeType; 8] = [
    TradeType::R6se,
    TradeType::R60s,
    TradeType::R5mi,
    TradeType::R5re,
    TradeType::L6se,
    TradeType::L60s,
    TradeType::L5mi,
    TradeType::L5re,
];

/// Contingency FCAS services (everything except regulation).
pub const CONTINGENCY_TRADE_TYPES: [TradeType; 6] = [
    TradeType::R6se,
    TradeType::R60s,
    TradeType::R5mi,
    TradeType::L6se,
    TradeType::L60s,
    TradeType::L5mi,
];

impl TradeType {
    pub fn is_energy(self) -> bool {
        matches!(self, TradeType::Enof | TradeType::Ldof)
    }

    pub fn is_fcas(self) -> bool {
        !self.is_energy()
    }

    /// Raise/lower regulation services (R5RE, L5RE).
    pub fn is_regulation(self) -> bool {
        matches!(self, TradeType::R5re | TradeType::L5re)
    }

    /// Contingency FCAS services (6s, 60s, 5min raise and lower).
    pub fn is_contingency(self) -> bool {
        self.is_fcas() && !self.is_regulation()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TradeType::Enof => "ENOF",
            TradeType::Ldof => "LDOF",
            TradeType::R6se => "R6SE",
            TradeType::R60s => "R60S",
            TradeType::R5mi => "R5MI",
            TradeType::R5re => "R5RE",
            TradeType::L6se => "L6SE",
            TradeType::L60s => "L60S",
            TradeType::L5mi => "L5MI",
            TradeType::L5re => "L5RE",
        }
    }

    /// Solution-document target attribute for an FCAS service
    /// (e.g. R6SE reports as `@R6Target`). Energy offers report as
    /// `@EnergyTarget` and are not covered here.
    pub fn target_attribute(self) -> Option<&'static str> {
        match self {
            TradeType::R6se => Some("@R6Target"),
            TradeType::R60s => Some("@R60Target"),
            TradeType::R5mi => Some("@R5Target"),
            TradeType::R5re => Some("@R5RegTarget"),
            TradeType::L6se => Some("@L6Target"),
            TradeType::L60s => Some("@L60Target"),
            TradeType::L5mi => Some("@L5Target"),
            TradeType::L5re => Some("@L5RegTarget"),
            _ => None,
        }
    }

    /// Solution-document violation attribute for an FCAS service.
    pub fn violation_attribute(self) -> Option<&'static str> {
        match self {
            TradeType::R6se => Some("@R6Violation"),
            TradeType::R60s => Some("@R60Violation"),
            TradeType::R5mi => Some("@R5Violation"),
            TradeType::R5re => Some("@R5RegViolation"),
            TradeType::L6se => Some("@L6Violation"),
            TradeType::L60s => Some("@L60Violation"),
            TradeType::L5mi => Some("@L5Violation"),
            TradeType::L5re => Some("@L5RegViolation"),
            _ => None,
        }
    }

    /// Region solution dispatch attribute for an FCAS service.
    pub fn region_dispatch_attribute(self) -> Option<&'static str> {
        match self {
            TradeType::R6se => Some("@R6Dispatch"),
            TradeType::R60s => Some("@R60Dispatch"),
            TradeType::R5mi => Some("@R5Dispatch"),
            TradeType::R5re => Some("@R5RegDispatch"),
            TradeType::L6se => Some("@L6Dispatch"),
            TradeType::L60s => Some("@L60Dispatch"),
            TradeType::L5mi => Some("@L5Dispatch"),
            TradeType::L5re => Some("@L5RegDispatch"),
            _ => None,
        }
    }
}

impl FromStr for TradeType {
    type Err = SpdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ENOF" => Ok(TradeType::Enof),
            "LDOF" => Ok(TradeType::Ldof),
            "R6SE" => Ok(TradeType::R6se),
            "R60S" => Ok(TradeType::R60s),
            "R5MI" => Ok(TradeType::R5mi),
            "R5RE" => Ok(TradeType::R5re),
            "L6SE" => Ok(TradeType::L6se),
            "L60S" => Ok(TradeType::L60s),
            "L5MI" => Ok(TradeType::L5mi),
            "L5RE" => Ok(TradeType::L5re),
            other => Err(SpdError::UnexpectedTradeType(other.to_string())),
        }
    }
}

impl fmt::Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generic constraint comparison type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintKind {
    Le,
    Ge,
    Eq,
}

impl ConstraintKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ConstraintKind::Le => "LE",
            ConstraintKind::Ge => "GE",
            ConstraintKind::Eq => "EQ",
        }
    }
}

impl FromStr for ConstraintKind {
    type Err = SpdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LE" => Ok(ConstraintKind::Le),
            "GE" => Ok(ConstraintKind::Ge),
            "EQ" => Ok(ConstraintKind::Eq),
            other => Err(SpdError::ParseFailure(format!(
                "unexpected constraint type: {other}"
            ))),
        }
    }
}

/// Run mode selecting how an intervention case is viewed.
///
/// With no intervention recorded the resolved intervention flag is "0" for
/// both modes; with an intervention it is "1" for a physical run and "0"
/// for a pricing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Physical,
    Pricing,
}

impl RunMode {
    /// Resolve the intervention status flag given the case's intervention
    /// marker.
    pub fn intervention_status(self, case_has_intervention: bool) -> &'static str {
        match (case_has_intervention, self) {
            (false, _) => "0",
            (true, RunMode::Physical) => "1",
            (true, RunMode::Pricing) => "0",
        }
    }
}

impl FromStr for RunMode {
    type Err = SpdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "physical" => Ok(RunMode::Physical),
            "pricing" => Ok(RunMode::Pricing),
            other => Err(SpdError::CasefileOptions(format!(
                "'run_mode' must be 'physical' or 'pricing', got '{other}'"
            ))),
        }
    }
}

/// Output document shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SolutionFormat {
    #[default]
    Standard,
    /// Every scalar becomes {model, actual, difference, abs_difference}
    /// against the reference solution embedded in the casefile.
    Validation,
}

impl FromStr for SolutionFormat {
    type Err = SpdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(SolutionFormat::Standard),
            "validation" => Ok(SolutionFormat::Validation),
            other => Err(SpdError::CasefileOptions(format!(
                "'solution_format' must be 'standard' or 'validation', got '{other}'"
            ))),
        }
    }
}

/// Solve algorithm selector. Only plain dispatch is implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    #[default]
    DispatchOnly,
}

impl FromStr for Algorithm {
    type Err = SpdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dispatch_only" => Ok(Algorithm::DispatchOnly),
            other => Err(SpdError::CasefileOptions(format!(
                "unknown algorithm '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trade_type_round_trip() {
        for tt in FCAS_TRADE_TYPES {
            assert_eq!(TradeType::from_str(tt.as_str()).unwrap(), tt);
        }
        assert_eq!(TradeType::from_str("ENOF").unwrap(), TradeType::Enof);
        assert!(TradeType::from_str("BOGUS").is_err());
    }

    #[test]
    fn test_trade_type_predicates() {
        assert!(TradeType::Enof.is_energy());
        assert!(!TradeType::Enof.is_fcas());
        assert!(TradeType::R5re.is_regulation());
        assert!(!TradeType::R5re.is_contingency());
        assert!(TradeType::L6se.is_contingency());
    }

    #[test]
    fn test_intervention_status_resolution() {
        assert_eq!(RunMode::Physical.intervention_status(false), "0");
        assert_eq!(RunMode::Pricing.intervention_status(false), "0");
        assert_eq!(RunMode::Physical.intervention_status(true), "1");
        assert_eq!(RunMode::Pricing.intervention_status(true), "0");
    }

    #[test]
    fn test_trader_type_energy_offer() {
        assert_eq!(
            TraderType::Generator.energy_offer_type(),
            TradeType::Enof
        );
        assert_eq!(
            TraderType::NormallyOnLoad.energy_offer_type(),
            TradeType::Ldof
        );
    }
}
