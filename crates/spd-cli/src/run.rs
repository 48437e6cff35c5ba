//! Orchestrator: user input to solution document
//!
//! Resolves the casefile (by ID against a store, or inline), applies
//! patches, extracts the flat case, preprocesses, solves and serializes.

use serde::Deserialize;
use serde_json::Value;
use spd_core::{Algorithm, RunMode, SolutionFormat, SpdError, SpdResult};
use spd_io::{extract_case, patch_casefile, CaseDocument, CasefileStore, PatchOperation};

/// Options block of the user-input document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserOptions {
    pub run_mode: RunMode,
    pub algorithm: Algorithm,
    pub solution_format: SolutionFormat,
}

/// The user-input document: exactly one of `case_id` / `case_data`.
#[derive(Debug, Clone, Deserialize)]
pub struct UserInput {
    #[serde(default)]
    pub case_id: Option<String>,
    #[serde(default)]
    pub case_data: Option<Value>,
    #[serde(default)]
    pub patches: Vec<PatchOperation>,
    #[serde(default)]
    pub options: UserOptions,
}

/// Parse and validate a user-input document.
pub fn clean_user_input(raw: &str) -> SpdResult<UserInput> {
    let input: UserInput = serde_json::from_str(raw)
        .map_err(|e| SpdError::CasefileOptions(format!("bad user input: {e}")))?;

    match (&input.case_id, &input.case_data) {
        (None, None) => Err(SpdError::CasefileOptions(
            "one of 'case_id' or 'case_data' must be supplied".to_string(),
        )),
        (Some(_), Some(_)) => Err(SpdError::CasefileOptions(
            "'case_id' and 'case_data' are mutually exclusive".to_string(),
        )),
        _ => Ok(input),
    }
}

/// Run the full pipeline for a user-input document.
pub fn run_model(input: UserInput, store: Option<&CasefileStore>) -> SpdResult<Value> {
    let mut document = match (&input.case_id, input.case_data) {
        (Some(case_id), None) => {
            let store = store.ok_or_else(|| {
                SpdError::CasefileOptions(
                    "a casefile store is required when 'case_id' is given".to_string(),
                )
            })?;
            store.load(case_id)?
        }
        (None, Some(data)) => CaseDocument::new(data)?,
        // clean_user_input has already rejected the other combinations
        _ => unreachable!("validated user input"),
    };

    patch_casefile(&mut document, &input.patches)?;

    let case = extract_case(&document, input.options.run_mode)?;
    let pre = spd_solver::preprocess(&case)?;

    let Algorithm::DispatchOnly = input.options.algorithm;
    let solved = spd_solver::solve_case(&case, &pre)?;

    spd_solver::serialize_solution(&case, &solved, input.options.solution_format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_missing_case() {
        let result = clean_user_input(r#"{"options": {}}"#);
        assert!(matches!(result, Err(SpdError::CasefileOptions(_))));
    }

    #[test]
    fn test_rejects_conflicting_case_sources() {
        let raw = r#"{"case_id": "20201101001", "case_data": {"NEMSPDCaseFile": {}}}"#;
        assert!(matches!(
            clean_user_input(raw),
            Err(SpdError::CasefileOptions(_))
        ));
    }

    #[test]
    fn test_defaults_applied() {
        let input = clean_user_input(r#"{"case_id": "20201101001"}"#).unwrap();
        assert_eq!(input.options.run_mode, RunMode::Physical);
        assert_eq!(input.options.solution_format, SolutionFormat::Standard);
        assert!(input.patches.is_empty());
    }

    #[test]
    fn test_rejects_bad_run_mode() {
        let raw = r#"{"case_id": "X", "options": {"run_mode": "both"}}"#;
        assert!(clean_user_input(raw).is_err());
    }
}
