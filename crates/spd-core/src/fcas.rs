//! # FCAS trapezium engine
//!
//! An FCAS offer describes a capacity region over (energy MW, FCAS MW):
//!
//! ```text
//!  FCAS
//!   │         LowBreakpoint   HighBreakpoint
//!   │              ●───────────────●        ← MaxAvail
//!   │             /                 \
//!   │            /                   \
//!   │           /                     \
//!   └──────────●───────────────────────●──────── energy
//!         EnablementMin           EnablementMax
//! ```
//!
//! Before the dispatch model is built the trapezium is *scaled*:
//!
//! 1. **AGC enablement limits** (regulation services): LMW raises
//!    EnablementMin, HMW lowers EnablementMax. The moved boundary line is
//!    intersected with the unchanged opposite slope; MaxAvail is capped at
//!    the intersection height and both breakpoints are re-derived by
//!    inverting the original slopes at the new ceiling.
//! 2. **AGC ramp rate** (regulation services): MaxAvail is capped at
//!    `ramp/12` (MW over the 5-minute interval), breakpoints re-derived.
//! 3. **UIGF** (semi-dispatchable plant): EnablementMax scaling with the
//!    forecast as the cap; applied to regulation *and* contingency offers.
//!
//! Availability is then a conjunction of six conditions evaluated on the
//! scaled trapezium; an unavailable offer is fixed to 0 MW by the solver.

use crate::types::{TradeType, TraderType};
use serde::{Deserialize, Serialize};

/// The five-parameter FCAS capacity trapezium.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FcasTrapezium {
    pub enablement_min: f64,
    pub low_breakpoint: f64,
    pub high_breakpoint: f64,
    pub enablement_max: f64,
    pub max_avail: f64,
}

/// A trapezium boundary defined by slope and x-intercept.
/// `slope == None` encodes a vertical line.
#[derive(Debug, Clone, Copy)]
struct BoundaryLine {
    slope: Option<f64>,
    x_intercept: f64,
}

impl BoundaryLine {
    fn new(slope: Option<f64>, x_intercept: f64) -> Self {
        BoundaryLine { slope, x_intercept }
    }

    fn y_intercept(&self) -> Option<f64> {
        self.slope.map(|s| -s * self.x_intercept)
    }
}

/// Intersection of two boundary lines; `None` when parallel or when both
/// are horizontal/vertical.
fn intersection(line_1: BoundaryLine, line_2: BoundaryLine) -> Option<(f64, f64)> {
    match (line_1.slope, line_2.slope) {
        // Both horizontal: no single intersection of interest
        (Some(s1), Some(s2)) if s1 == 0.0 && s2 == 0.0 => None,
        (Some(s1), Some(s2)) => {
            if s1 == s2 {
                return None;
            }
            let x = (line_2.y_intercept().unwrap() - line_1.y_intercept().unwrap()) / (s1 - s2);
            let y = s1 * x + line_1.y_intercept().unwrap();
            Some((x, y))
        }
        (None, Some(s2)) => {
            let x = line_1.x_intercept;
            Some((x, s2 * x + line_2.y_intercept().unwrap()))
        }
        (Some(s1), None) => {
            let x = line_2.x_intercept;
            Some((x, s1 * x + line_1.y_intercept().unwrap()))
        }
        // Both vertical: coincident or never intersecting
        (None, None) => None,
    }
}

/// Invert a boundary line at a new MaxAvail ceiling to find the breakpoint.
/// A vertical or horizontal boundary keeps its x-intercept.
fn new_breakpoint(slope: Option<f64>, x_intercept: f64, max_available: f64) -> f64 {
    match slope {
        Some(s) if s != 0.0 => {
            let y_intercept = -s * x_intercept;
            (max_available - y_intercept) / s
        }
        _ => x_intercept,
    }
}

/// Slope of the left boundary (EnablementMin → LowBreakpoint); `None` when
/// vertical.
fn lhs_slope(trap: &FcasTrapezium) -> Option<f64> {
    let run = trap.low_breakpoint - trap.enablement_min;
    if run == 0.0 {
        None
    } else {
        Some(trap.max_avail / run)
    }
}

/// Slope of the right boundary (HighBreakpoint → EnablementMax); `None`
/// when vertical.
fn rhs_slope(trap: &FcasTrapezium) -> Option<f64> {
    let run = trap.enablement_max - trap.high_breakpoint;
    if run == 0.0 {
        None
    } else {
        Some(-trap.max_avail / run)
    }
}

/// Scale the trapezium for a lower AGC enablement limit (LMW).
pub fn scale_enablement_min_lhs(trap: &FcasTrapezium, agc_enablement_min: Option<f64>) -> FcasTrapezium {
    let mut out = *trap;

    // No scaling when the AGC limit is absent or 0
    let lmw = match agc_enablement_min {
        Some(v) if v != 0.0 => v,
        _ => return out,
    };

    // The offer's own enablement min already binds harder
    if lmw <= trap.enablement_min {
        return out;
    }

    let lhs = BoundaryLine::new(lhs_slope(trap), lmw);
    let rhs = BoundaryLine::new(rhs_slope(trap), trap.enablement_max);

    if let Some((_, y)) = intersection(lhs, rhs) {
        if y < out.max_avail {
            out.max_avail = y.max(0.0);
        }
    }

    out.low_breakpoint = new_breakpoint(lhs.slope, lhs.x_intercept, out.max_avail);
    out.high_breakpoint = new_breakpoint(rhs.slope, rhs.x_intercept, out.max_avail);
    out.enablement_min = lmw;

    out
}

/// Scale the trapezium for an upper AGC enablement limit (HMW), or any
/// other cap applied on the right-hand side (UIGF uses the same rule).
pub fn scale_enablement_max_rhs(trap: &FcasTrapezium, agc_enablement_max: Option<f64>) -> FcasTrapezium {
    let mut out = *trap;

    let hmw = match agc_enablement_max {
        Some(v) if v != 0.0 => v,
        _ => return out,
    };

    if hmw >= trap.enablement_max {
        return out;
    }

    let lhs = BoundaryLine::new(lhs_slope(trap), trap.enablement_min);
    let rhs = BoundaryLine::new(rhs_slope(trap), hmw);

    if let Some((_, y)) = intersection(lhs, rhs) {
        if y < out.max_avail {
            out.max_avail = y.max(0.0);
        }
    }

    out.low_breakpoint = new_breakpoint(lhs.slope, lhs.x_intercept, out.max_avail);
    out.high_breakpoint = new_breakpoint(rhs.slope, rhs.x_intercept, out.max_avail);
    out.enablement_max = hmw;

    out
}

/// Scale the trapezium for an AGC (SCADA) ramp rate in MW/h.
pub fn scale_agc_ramp_rate(trap: &FcasTrapezium, scada_ramp_rate: Option<f64>) -> FcasTrapezium {
    let ramp = match scada_ramp_rate {
        Some(v) if v != 0.0 => v,
        _ => return *trap,
    };

    let mut out = *trap;
    let max_available = out.max_avail.min(ramp / crate::RAMP_RATE_DIVISOR);

    if max_available < out.max_avail {
        if let Some(slope) = lhs_slope(trap) {
            out.low_breakpoint = new_breakpoint(Some(slope), trap.enablement_min, max_available);
        }
        if let Some(slope) = rhs_slope(trap) {
            out.high_breakpoint = new_breakpoint(Some(slope), trap.enablement_max, max_available);
        }
    }

    out.max_avail = max_available;
    out
}

/// Inputs to trapezium scaling and availability for one FCAS offer.
#[derive(Debug, Clone)]
pub struct FcasOfferParams {
    pub trader_type: TraderType,
    pub trade_type: TradeType,
    pub semi_dispatch: bool,
    pub trapezium: FcasTrapezium,
    /// Largest quantity band of the FCAS offer
    pub max_quantity_band: f64,
    /// MaxAvail of the trader's energy offer, if one exists
    pub energy_max_avail: Option<f64>,
    pub initial_mw: f64,
    pub uigf: Option<f64>,
    pub hmw: Option<f64>,
    pub lmw: Option<f64>,
    pub agc_enabled: Option<bool>,
    pub agc_ramp_up: Option<f64>,
    pub agc_ramp_down: Option<f64>,
}

/// Apply the full scaling pipeline for one offer.
pub fn scaled_trapezium(params: &FcasOfferParams) -> FcasTrapezium {
    let trap = params.trapezium;

    // UIGF scaling applies to contingency offers from semi-dispatchable
    // plant; nothing else touches a contingency trapezium.
    if params.semi_dispatch && params.trade_type.is_contingency() {
        return scale_enablement_max_rhs(&trap, params.uigf);
    }

    if !params.trade_type.is_regulation() {
        return trap;
    }

    let scaled = scale_enablement_min_lhs(&trap, params.lmw);
    let scaled = scale_enablement_max_rhs(&scaled, params.hmw);

    // Raise regulation consumes headroom in the direction that raises
    // frequency: ramp-up for generators, ramp-down for loads. Lower
    // regulation mirrors this.
    let ramp = match (params.trader_type.is_load(), params.trade_type) {
        (false, TradeType::R5re) => params.agc_ramp_up,
        (false, TradeType::L5re) => params.agc_ramp_down,
        (true, TradeType::R5re) => params.agc_ramp_down,
        (true, TradeType::L5re) => params.agc_ramp_up,
        _ => unreachable!("regulation services are R5RE/L5RE only"),
    };
    let scaled = scale_agc_ramp_rate(&scaled, ramp);

    scale_enablement_max_rhs(&scaled, params.uigf)
}

/// FCAS availability: all six conditions must hold on the scaled trapezium.
pub fn availability(params: &FcasOfferParams) -> bool {
    let trap = scaled_trapezium(params);

    // 1. Scaled MaxAvail must be positive
    let cond_max_avail = trap.max_avail > 0.0;

    // 2. At least one quantity band with a positive quantity
    let cond_quantity = params.max_quantity_band > 0.0;

    // 3. Energy availability (UIGF for semi-dispatch) must reach the
    //    enablement min; vacuously true without an energy offer
    let energy_max_avail = if params.semi_dispatch {
        params.uigf
    } else {
        params.energy_max_avail
    };
    let cond_enablement_min = match energy_max_avail {
        Some(avail) => avail >= trap.enablement_min,
        None => true,
    };

    // 4. Enablement max must be non-negative
    let cond_enablement_max = trap.enablement_max >= 0.0;

    // 5. Unit must be operating within the enablement band
    let cond_initial_mw = enablement_band_condition(params, &trap);

    // 6. AGC must be active for regulation services
    let cond_agc = if params.trade_type.is_regulation() {
        params.agc_enabled == Some(true)
    } else {
        true
    };

    cond_max_avail
        && cond_quantity
        && cond_enablement_min
        && cond_enablement_max
        && cond_initial_mw
        && cond_agc
}

#[cfg(not(feature = "legacy-load-availability"))]
fn enablement_band_condition(params: &FcasOfferParams, trap: &FcasTrapezium) -> bool {
    params.initial_mw >= trap.enablement_min && params.initial_mw <= trap.enablement_max
}

/// Variant matching the reference engine's observed (suspect) numbers for
/// loads: the enablement band is not checked against initial MW.
#[cfg(feature = "legacy-load-availability")]
fn enablement_band_condition(params: &FcasOfferParams, trap: &FcasTrapezium) -> bool {
    if params.trader_type.is_load() {
        true
    } else {
        params.initial_mw >= trap.enablement_min && params.initial_mw <= trap.enablement_max
    }
}

/// Upper slope coefficient (EnablementMax − HighBreakpoint) / MaxAvail on
/// the *offered* trapezium; `None` when MaxAvail is 0 (coupled term is
/// skipped).
pub fn upper_slope_coefficient(trap: &FcasTrapezium) -> Option<f64> {
    if trap.max_avail == 0.0 {
        None
    } else {
        Some((trap.enablement_max - trap.high_breakpoint) / trap.max_avail)
    }
}

/// Lower slope coefficient (LowBreakpoint − EnablementMin) / MaxAvail.
pub fn lower_slope_coefficient(trap: &FcasTrapezium) -> Option<f64> {
    if trap.max_avail == 0.0 {
        None
    } else {
        Some((trap.low_breakpoint - trap.enablement_min) / trap.max_avail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trapezium(values: (f64, f64, f64, f64, f64)) -> FcasTrapezium {
        FcasTrapezium {
            enablement_min: values.0,
            low_breakpoint: values.1,
            high_breakpoint: values.2,
            enablement_max: values.3,
            max_avail: values.4,
        }
    }

    fn generator_params(trade_type: TradeType, trap: FcasTrapezium) -> FcasOfferParams {
        FcasOfferParams {
            trader_type: TraderType::Generator,
            trade_type,
            semi_dispatch: false,
            trapezium: trap,
            max_quantity_band: 10.0,
            energy_max_avail: Some(100.0),
            initial_mw: 50.0,
            uigf: None,
            hmw: None,
            lmw: None,
            agc_enabled: Some(true),
            agc_ramp_up: None,
            agc_ramp_down: None,
        }
    }

    #[test]
    fn test_lhs_scaling_moves_enablement_min() {
        // Symmetric trapezium 0/20/80/100 with apex 20
        let trap = trapezium((0.0, 20.0, 80.0, 100.0, 20.0));
        let scaled = scale_enablement_min_lhs(&trap, Some(10.0));

        assert_eq!(scaled.enablement_min, 10.0);
        // Left slope 1.0 from x=10 meets right slope -1.0 from x=100 at
        // y = 45 > 20, so MaxAvail unchanged and breakpoints shift right
        assert_eq!(scaled.max_avail, 20.0);
        assert!((scaled.low_breakpoint - 30.0).abs() < 1e-9);
        assert!((scaled.high_breakpoint - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_lhs_scaling_caps_max_avail_at_apex() {
        // Narrow trapezium: apex forced below old MaxAvail
        let trap = trapezium((0.0, 20.0, 80.0, 100.0, 20.0));
        let scaled = scale_enablement_min_lhs(&trap, Some(70.0));

        // LHS line slope 1 from x=70, RHS slope -1 from x=100: apex at
        // x=85, y=15
        assert_eq!(scaled.enablement_min, 70.0);
        assert!((scaled.max_avail - 15.0).abs() < 1e-9);
        assert!((scaled.low_breakpoint - 85.0).abs() < 1e-9);
        assert!((scaled.high_breakpoint - 85.0).abs() < 1e-9);
    }

    #[test]
    fn test_lhs_scaling_skipped_when_limit_below_enablement_min() {
        let trap = trapezium((30.0, 40.0, 60.0, 70.0, 10.0));
        let scaled = scale_enablement_min_lhs(&trap, Some(20.0));
        assert_eq!(scaled, trap);

        let scaled = scale_enablement_min_lhs(&trap, None);
        assert_eq!(scaled, trap);

        let scaled = scale_enablement_min_lhs(&trap, Some(0.0));
        assert_eq!(scaled, trap);
    }

    #[test]
    fn test_rhs_scaling_mirrors_lhs() {
        let trap = trapezium((0.0, 20.0, 80.0, 100.0, 20.0));
        let scaled = scale_enablement_max_rhs(&trap, Some(90.0));

        assert_eq!(scaled.enablement_max, 90.0);
        assert_eq!(scaled.max_avail, 20.0);
        assert!((scaled.low_breakpoint - 20.0).abs() < 1e-9);
        assert!((scaled.high_breakpoint - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_vertical_boundary_keeps_x_intercept() {
        // Left boundary vertical: LowBreakpoint == EnablementMin
        let trap = trapezium((0.0, 0.0, 80.0, 100.0, 20.0));
        let scaled = scale_agc_ramp_rate(&trap, Some(120.0));

        // Ramp cap 120/12 = 10 < 20, right breakpoint re-derived, left
        // stays at the vertical boundary's x-intercept
        assert!((scaled.max_avail - 10.0).abs() < 1e-9);
        assert_eq!(scaled.low_breakpoint, 0.0);
        assert!((scaled.high_breakpoint - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_ramp_scaling_noop_when_rate_generous() {
        let trap = trapezium((0.0, 20.0, 80.0, 100.0, 20.0));
        let scaled = scale_agc_ramp_rate(&trap, Some(600.0));
        assert_eq!(scaled, trap);
    }

    #[test]
    fn test_contingency_offer_not_scaled_for_scheduled_plant() {
        let trap = trapezium((0.0, 20.0, 80.0, 100.0, 20.0));
        let mut params = generator_params(TradeType::R6se, trap);
        params.lmw = Some(40.0);
        params.hmw = Some(60.0);
        assert_eq!(scaled_trapezium(&params), trap);
    }

    #[test]
    fn test_uigf_scaling_applies_to_semi_dispatch_contingency() {
        let trap = trapezium((0.0, 20.0, 80.0, 100.0, 20.0));
        let mut params = generator_params(TradeType::R6se, trap);
        params.semi_dispatch = true;
        params.uigf = Some(90.0);
        let scaled = scaled_trapezium(&params);
        assert_eq!(scaled.enablement_max, 90.0);
    }

    #[test]
    fn test_availability_all_conditions_met() {
        let trap = trapezium((0.0, 20.0, 80.0, 100.0, 20.0));
        let params = generator_params(TradeType::R6se, trap);
        assert!(availability(&params));
    }

    #[test]
    fn test_availability_fails_when_max_avail_zero() {
        let trap = trapezium((0.0, 20.0, 80.0, 100.0, 0.0));
        let params = generator_params(TradeType::R6se, trap);
        assert!(!availability(&params));
    }

    #[test]
    fn test_availability_fails_when_energy_below_enablement_min() {
        // Raise-regulation offer with EnablementMin above the energy
        // offer's MaxAvail
        let trap = trapezium((50.0, 60.0, 70.0, 80.0, 10.0));
        let mut params = generator_params(TradeType::R5re, trap);
        params.energy_max_avail = Some(40.0);
        params.initial_mw = 60.0;
        assert!(!availability(&params));
    }

    #[test]
    fn test_availability_requires_agc_for_regulation_only() {
        let trap = trapezium((0.0, 20.0, 80.0, 100.0, 20.0));

        let mut reg = generator_params(TradeType::R5re, trap);
        reg.agc_enabled = Some(false);
        assert!(!availability(&reg));

        let mut cont = generator_params(TradeType::R6se, trap);
        cont.agc_enabled = Some(false);
        assert!(availability(&cont));
    }

    #[test]
    fn test_availability_initial_mw_outside_band() {
        let trap = trapezium((30.0, 40.0, 60.0, 70.0, 10.0));
        let mut params = generator_params(TradeType::R6se, trap);
        params.initial_mw = 20.0;
        assert!(!availability(&params));
    }

    #[test]
    fn test_slope_coefficients() {
        let trap = trapezium((0.0, 20.0, 80.0, 100.0, 20.0));
        assert_eq!(upper_slope_coefficient(&trap), Some(1.0));
        assert_eq!(lower_slope_coefficient(&trap), Some(1.0));

        let degenerate = trapezium((0.0, 20.0, 80.0, 100.0, 0.0));
        assert_eq!(upper_slope_coefficient(&degenerate), None);
        assert_eq!(lower_slope_coefficient(&degenerate), None);
    }
}
