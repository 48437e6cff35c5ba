//! # spd-core: NEM dispatch-interval data model and market arithmetic
//!
//! Core types and pure algorithms for a single 5-minute NEM dispatch
//! interval:
//!
//! - A flat, strongly-typed casefile model ([`DispatchCase`] and friends).
//!   Casefile parsing lives in `spd-io`; nothing in this crate touches the
//!   raw nested document.
//! - The FCAS trapezium engine ([`fcas`]): scaling by AGC enablement
//!   limits, AGC ramp rates and UIGF, plus per-offer availability.
//! - The interconnector loss engine ([`loss`]): marginal-loss-factor curve
//!   integration and SOS2 breakpoint generation.
//! - Fast-start inflexibility-profile arithmetic ([`fast_start`]).
//!
//! All quantities are MW; per-hour ramp rates are divided by 12 to get the
//! 5-minute dispatch-interval equivalent.

pub mod case;
pub mod error;
pub mod fast_start;
pub mod fcas;
pub mod loss;
pub mod types;

pub use case::{
    CvfPrices, DispatchCase, FastStartProfile, GenericConstraint, Interconnector, LossModel,
    LossSegment, MnspOffer, MnspParams, Offer, ReferenceSolution, Region, Trader,
};
pub use error::{SpdError, SpdResult};
pub use fcas::FcasTrapezium;
pub use types::{Algorithm, ConstraintKind, RunMode, SolutionFormat, TradeType, TraderType};

/// Minutes in a dispatch interval.
pub const DISPATCH_INTERVAL_MINUTES: f64 = 5.0;

/// Divisor converting a MW/hour ramp rate to MW per dispatch interval.
pub const RAMP_RATE_DIVISOR: f64 = 12.0;

/// Big-M bound (MW) used by MNSP flow-direction disjunctions.
pub const MNSP_BIG_M: f64 = 1000.0;
