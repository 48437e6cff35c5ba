//! Dispatch model construction
//!
//! Assembles the MILP for one dispatch interval: variables, shared
//! expressions, constraints and the objective
//!
//! ```text
//! minimise  Σ as-bid trader cost (loads negated)
//!         + Σ MNSP offer cost
//!         + Σ priced constraint violations
//!         + tie-break slack cost
//! ```
//!
//! The same builder serves both solve passes: pass 1 creates the SOS2
//! interval and MNSP direction variables as binaries, pass 2 rebuilds the
//! model with each binary pinned to its pass-1 value, leaving a pure LP.

mod constraints;
mod expressions;
mod vars;

pub use constraints::{effective_ramp_down, effective_ramp_up};
pub use expressions::ModelExpressions;
pub use vars::VarIndex;

use crate::preprocess::Preprocessed;
use good_lp::{variables, Expression, ProblemVariables};
use spd_core::{DispatchCase, SpdResult};
use std::collections::BTreeMap;

/// Binary values recorded after pass 1 and pinned in pass 2.
#[derive(Debug, Clone, Default)]
pub struct FixedBinaries {
    pub loss_y: BTreeMap<(String, usize), f64>,
    pub mnsp_direction: BTreeMap<String, f64>,
}

/// A fully constructed (but unsolved) model.
pub struct ModelComponents {
    pub vars: ProblemVariables,
    pub index: VarIndex,
    pub exprs: ModelExpressions,
    pub constraints: Vec<good_lp::Constraint>,
    pub objective: Expression,
}

/// Build the dispatch model for a case. `fixed` pins the binaries for the
/// second (LP) pass.
pub fn build_model(
    case: &DispatchCase,
    pre: &Preprocessed,
    fixed: Option<&FixedBinaries>,
) -> SpdResult<ModelComponents> {
    let mut vars = variables!();
    let index = vars::define_variables(&mut vars, case, pre, fixed);
    let exprs = expressions::define_expressions(case, pre, &index)?;
    let constraints = constraints::define_constraints(case, pre, &index, &exprs)?;

    let objective = exprs.trader_cost.clone()
        + exprs.mnsp_cost.clone()
        + exprs.cv_penalty.clone()
        + exprs.tie_break_cost.clone();

    tracing::debug!(
        constraints = constraints.len(),
        binaries_fixed = fixed.is_some(),
        "constructed dispatch model"
    );

    Ok(ModelComponents {
        vars,
        index,
        exprs,
        constraints,
        objective,
    })
}
