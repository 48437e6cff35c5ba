//! Casefile patcher
//!
//! Applies `{path, value}` updates to a casefile before a solve. Paths use
//! dotted segments with bracketed list indices or attribute predicates:
//!
//! ```text
//! NEMSPDCaseFile.NemSpdInputs.PeriodCollection.Period.
//!   TraderPeriodCollection.TraderPeriod[?(@TraderID=='AGLHAL')].
//!   TradeCollection.Trade[?(@TradeType=='ENOF')].@BandAvail1
//! ```
//!
//! A path must resolve to exactly one element; anything else is a
//! [`SpdError::CasefileUpdaterLookup`]. The only operation is replace.

use crate::document::CaseDocument;
use serde_json::Value;
use spd_core::{SpdError, SpdResult};

/// One replace operation.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PatchOperation {
    pub path: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
enum Selector {
    /// `[3]`
    Index(usize),
    /// `[?(@Attr=='value')]`
    Predicate { attribute: String, value: String },
}

#[derive(Debug, Clone)]
struct Segment {
    name: String,
    selector: Option<Selector>,
}

fn parse_segment(raw: &str) -> SpdResult<Segment> {
    let Some(open) = raw.find('[') else {
        return Ok(Segment {
            name: raw.to_string(),
            selector: None,
        });
    };

    if !raw.ends_with(']') {
        return Err(SpdError::CasefileUpdaterLookup(format!(
            "malformed path segment '{raw}'"
        )));
    }

    let name = raw[..open].to_string();
    let body = &raw[open + 1..raw.len() - 1];

    let selector = if let Some(predicate) = body.strip_prefix("?(@").and_then(|b| b.strip_suffix(')')) {
        let (attribute, value) = predicate.split_once("==").ok_or_else(|| {
            SpdError::CasefileUpdaterLookup(format!("malformed predicate in '{raw}'"))
        })?;
        Selector::Predicate {
            attribute: format!("@{}", attribute.trim()),
            value: value.trim().trim_matches('\'').to_string(),
        }
    } else {
        Selector::Index(body.parse::<usize>().map_err(|_| {
            SpdError::CasefileUpdaterLookup(format!("malformed index in '{raw}'"))
        })?)
    };

    Ok(Segment {
        name,
        selector: Some(selector),
    })
}

fn parse_path(path: &str) -> SpdResult<Vec<Segment>> {
    path.split('.').map(parse_segment).collect()
}

fn escape_pointer(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

fn scalar_matches(value: &Value, expected: &str) -> bool {
    match value {
        Value::String(s) => s == expected,
        Value::Number(n) => n.to_string() == expected,
        _ => false,
    }
}

/// Resolve a path to the JSON pointers of every matching element.
fn resolve(root: &Value, segments: &[Segment]) -> Vec<String> {
    let mut current: Vec<(String, &Value)> = vec![(String::new(), root)];

    for segment in segments {
        let mut next = Vec::new();
        for (pointer, node) in current {
            let Some(child) = node.get(&segment.name) else {
                continue;
            };
            let child_pointer = format!("{pointer}/{}", escape_pointer(&segment.name));

            match &segment.selector {
                None => next.push((child_pointer, child)),
                Some(Selector::Index(i)) => match child {
                    Value::Array(items) => {
                        if let Some(item) = items.get(*i) {
                            next.push((format!("{child_pointer}/{i}"), item));
                        }
                    }
                    // Singleton object addressed as its own index 0
                    _ if *i == 0 => next.push((child_pointer, child)),
                    _ => {}
                },
                Some(Selector::Predicate { attribute, value }) => match child {
                    Value::Array(items) => {
                        for (i, item) in items.iter().enumerate() {
                            if item.get(attribute).map(|v| scalar_matches(v, value)) == Some(true) {
                                next.push((format!("{child_pointer}/{i}"), item));
                            }
                        }
                    }
                    other => {
                        if other.get(attribute).map(|v| scalar_matches(v, value)) == Some(true) {
                            next.push((child_pointer, other));
                        }
                    }
                },
            }
        }
        current = next;
    }

    current.into_iter().map(|(pointer, _)| pointer).collect()
}

/// Apply patch operations in order. An empty list leaves the casefile
/// bit-identical.
pub fn patch_casefile(doc: &mut CaseDocument, updates: &[PatchOperation]) -> SpdResult<()> {
    for update in updates {
        let segments = parse_path(&update.path)?;
        let matches = resolve(doc.root(), &segments);

        if matches.len() != 1 {
            return Err(SpdError::CasefileUpdaterLookup(format!(
                "path does not uniquely identify object: {} identified for '{}'",
                matches.len(),
                update.path
            )));
        }

        let target = doc.root_mut().pointer_mut(&matches[0]).ok_or_else(|| {
            SpdError::CasefileUpdaterLookup(format!("resolved pointer '{}' vanished", matches[0]))
        })?;
        *target = update.value.clone();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> CaseDocument {
        CaseDocument::new(json!({
            "NEMSPDCaseFile": {
                "NemSpdInputs": {
                    "PeriodCollection": {"Period": {
                        "TraderPeriodCollection": {"TraderPeriod": [
                            {"@TraderID": "AGLHAL",
                             "TradeCollection": {"Trade": [
                                 {"@TradeType": "ENOF", "@Priority": "1", "@BandAvail1": "20"},
                                 {"@TradeType": "R6SE", "@Priority": "1", "@BandAvail1": "5"}
                             ]}},
                            {"@TraderID": "BW01",
                             "TradeCollection": {"Trade": [
                                 {"@TradeType": "ENOF", "@BandAvail1": "100"}
                             ]}}
                        ]}
                    }}
                }
            }
        }))
        .unwrap()
    }

    const TRADE_PATH: &str = "NEMSPDCaseFile.NemSpdInputs.PeriodCollection.Period.\
        TraderPeriodCollection.TraderPeriod[?(@TraderID=='AGLHAL')].\
        TradeCollection.Trade[?(@TradeType=='ENOF')].@BandAvail1";

    fn clean_path(path: &str) -> String {
        path.replace(' ', "")
    }

    #[test]
    fn test_predicate_patch() {
        let mut d = doc();
        patch_casefile(
            &mut d,
            &[PatchOperation {
                path: clean_path(TRADE_PATH),
                value: json!("45"),
            }],
        )
        .unwrap();

        let updated = d
            .find("NEMSPDCaseFile.NemSpdInputs.PeriodCollection.Period")
            .unwrap()["TraderPeriodCollection"]["TraderPeriod"][0]["TradeCollection"]["Trade"][0]
            ["@BandAvail1"]
            .clone();
        assert_eq!(updated, json!("45"));
    }

    #[test]
    fn test_index_patch() {
        let mut d = doc();
        let path = "NEMSPDCaseFile.NemSpdInputs.PeriodCollection.Period.\
            TraderPeriodCollection.TraderPeriod[1].TradeCollection.Trade[0].@BandAvail1";
        patch_casefile(
            &mut d,
            &[PatchOperation {
                path: clean_path(path),
                value: json!("75"),
            }],
        )
        .unwrap();

        let updated = d
            .find("NEMSPDCaseFile.NemSpdInputs.PeriodCollection.Period")
            .unwrap()["TraderPeriodCollection"]["TraderPeriod"][1]["TradeCollection"]["Trade"][0]
            ["@BandAvail1"]
            .clone();
        assert_eq!(updated, json!("75"));
    }

    #[test]
    fn test_empty_patch_list_is_identity() {
        let mut d = doc();
        let before = d.root().clone();
        patch_casefile(&mut d, &[]).unwrap();
        assert_eq!(*d.root(), before);
    }

    #[test]
    fn test_ambiguous_path_rejected() {
        let mut d = doc();
        // Matches both of AGLHAL's trades
        let path = "NEMSPDCaseFile.NemSpdInputs.PeriodCollection.Period.\
            TraderPeriodCollection.TraderPeriod[?(@TraderID=='AGLHAL')].TradeCollection.\
            Trade[?(@Priority=='1')].@BandAvail1";
        let result = patch_casefile(
            &mut d,
            &[PatchOperation {
                path: clean_path(path),
                value: json!("1"),
            }],
        );
        assert!(matches!(result, Err(SpdError::CasefileUpdaterLookup(_))));
    }

    #[test]
    fn test_missing_path_rejected() {
        let mut d = doc();
        let result = patch_casefile(
            &mut d,
            &[PatchOperation {
                path: "NEMSPDCaseFile.Missing.@X".to_string(),
                value: json!("1"),
            }],
        );
        assert!(matches!(result, Err(SpdError::CasefileUpdaterLookup(_))));
    }
}
