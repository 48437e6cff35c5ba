//! Casefile document wrapper
//!
//! A casefile is a deeply nested key/value tree rooted at
//! `NEMSPDCaseFile`. Attribute names carry their source-XML `@` prefix
//! and all attribute values are strings; collections appear either as a
//! list or, when the source held a single element, as a bare object.
//! This module normalizes both quirks behind typed accessors.

use serde_json::Value;
use spd_core::{SpdError, SpdResult};
use std::str::FromStr;

/// Dotted path to the input tree.
pub const INPUTS: &str = "NEMSPDCaseFile.NemSpdInputs";
/// Dotted path to the reference-solution mirror.
pub const OUTPUTS: &str = "NEMSPDCaseFile.NemSpdOutputs";

/// A parsed casefile document.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseDocument {
    root: Value,
}

impl CaseDocument {
    /// Wrap a parsed tree, checking the expected root is present.
    pub fn new(root: Value) -> SpdResult<Self> {
        if root.get("NEMSPDCaseFile").is_none() {
            return Err(SpdError::CasefileValue(
                "document root 'NEMSPDCaseFile' not found".to_string(),
            ));
        }
        Ok(CaseDocument { root })
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Value {
        &mut self.root
    }

    pub fn into_inner(self) -> Value {
        self.root
    }

    /// Walk a dotted path (`NEMSPDCaseFile.NemSpdInputs.Case`).
    pub fn find(&self, path: &str) -> SpdResult<&Value> {
        let mut current = &self.root;
        for key in path.split('.') {
            current = current.get(key).ok_or_else(|| {
                SpdError::CasefileValue(format!("path element '{key}' not found in '{path}'"))
            })?;
        }
        Ok(current)
    }

    /// Walk a dotted path relative to `NemSpdInputs`.
    pub fn inputs(&self, path: &str) -> SpdResult<&Value> {
        self.find(&format!("{INPUTS}.{path}"))
    }

    /// Walk a dotted path relative to `NemSpdOutputs`.
    pub fn outputs(&self, path: &str) -> SpdResult<&Value> {
        self.find(&format!("{OUTPUTS}.{path}"))
    }

    /// True when the outputs mirror is present.
    pub fn has_outputs(&self) -> bool {
        self.find(OUTPUTS).is_ok()
    }
}

/// Normalize a collection node: a bare object becomes a one-element list.
pub fn as_list(value: &Value) -> SpdResult<Vec<&Value>> {
    match value {
        Value::Array(items) => Ok(items.iter().collect()),
        Value::Object(_) => Ok(vec![value]),
        other => Err(SpdError::ParseFailure(format!(
            "expected object or list, found {other}"
        ))),
    }
}

/// Like [`as_list`] but treats null/absent as empty.
pub fn as_list_or_empty(value: Option<&Value>) -> SpdResult<Vec<&Value>> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(v) => as_list(v),
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Read an attribute, parse failure and absence reported separately.
pub fn attr<T: FromStr>(
    element: &Value,
    entity: &'static str,
    id: &str,
    field: &str,
) -> SpdResult<T> {
    let raw = element
        .get(field)
        .and_then(scalar_to_string)
        .ok_or_else(|| SpdError::missing(entity, id, field))?;
    raw.parse::<T>()
        .map_err(|_| SpdError::ParseFailure(format!("{entity} '{id}' attribute {field}: '{raw}'")))
}

/// Read an optional attribute; absent (or null) maps to `None`, a present
/// but malformed value is still an error.
pub fn attr_opt<T: FromStr>(element: &Value, field: &str) -> SpdResult<Option<T>> {
    match element.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => {
            let raw = scalar_to_string(v).ok_or_else(|| {
                SpdError::ParseFailure(format!("attribute {field} is not a scalar"))
            })?;
            raw.parse::<T>()
                .map(Some)
                .map_err(|_| SpdError::ParseFailure(format!("attribute {field}: '{raw}'")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> CaseDocument {
        CaseDocument::new(json!({
            "NEMSPDCaseFile": {
                "NemSpdInputs": {
                    "Case": {"@CaseID": "20201101001", "@VoLL": "14700", "@CaseType": "DS"},
                    "RegionCollection": {
                        "Region": [{"@RegionID": "NSW1"}, {"@RegionID": "VIC1"}]
                    }
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_find_walks_dotted_path() {
        let d = doc();
        let case = d.inputs("Case").unwrap();
        assert_eq!(case["@CaseID"], "20201101001");
        assert!(d.find("NEMSPDCaseFile.Missing").is_err());
    }

    #[test]
    fn test_rejects_wrong_root() {
        assert!(CaseDocument::new(json!({"Other": {}})).is_err());
    }

    #[test]
    fn test_as_list_normalizes_singleton() {
        let single = json!({"@RegionID": "TAS1"});
        let many = json!([{"@RegionID": "TAS1"}, {"@RegionID": "SA1"}]);
        assert_eq!(as_list(&single).unwrap().len(), 1);
        assert_eq!(as_list(&many).unwrap().len(), 2);
        assert!(as_list(&json!("scalar")).is_err());
    }

    #[test]
    fn test_attr_parses_and_reports() {
        let d = doc();
        let case = d.inputs("Case").unwrap();
        let voll: f64 = attr(case, "Case", "20201101001", "@VoLL").unwrap();
        assert_eq!(voll, 14700.0);

        let missing: SpdResult<f64> = attr(case, "Case", "20201101001", "@Absent");
        assert!(matches!(missing, Err(SpdError::MissingAttribute { .. })));

        let bad: SpdResult<f64> = attr(case, "Case", "20201101001", "@CaseType");
        assert!(bad.is_err());
    }

    #[test]
    fn test_attr_opt() {
        let d = doc();
        let case = d.inputs("Case").unwrap();
        assert_eq!(attr_opt::<f64>(case, "@Absent").unwrap(), None);
        assert_eq!(attr_opt::<f64>(case, "@VoLL").unwrap(), Some(14700.0));
    }
}
