//! # spd-solver: the dispatch MILP
//!
//! Turns a preprocessed [`spd_core::DispatchCase`] into a mixed-integer
//! linear program, solves it in two passes, and serializes the solution:
//!
//! 1. [`preprocess`]: FCAS availability, price-tied band pairs, MNSP loss
//!    indicators, SOS2 breakpoints and initial loss estimates.
//! 2. [`model`]: variables, expressions and constraints, built on the
//!    `good_lp` modeling layer with the HiGHS backend (the model carries
//!    genuine binaries for SOS2 intervals and MNSP flow direction).
//! 3. [`solve`]: pass 1 solves the MILP; pass 2 pins every binary at its
//!    pass-1 value and re-solves the remaining LP.
//! 4. [`solution`]: standard and validation output documents.
//!
//! The model is always feasible: every physical constraint carries a
//! non-negative violation variable priced into the objective, so solver
//! infeasibility indicates a bug, not bad market data.

pub mod analysis;
pub mod model;
pub mod preprocess;
pub mod solution;
pub mod solve;

pub use model::{build_model, FixedBinaries, ModelComponents};
pub use preprocess::{preprocess, Preprocessed};
pub use solution::serialize_solution;
pub use solve::{solve_case, SolvedCase};
