//! Casefile importers
//!
//! Casefiles arrive as `NEMSPDCaseFile` XML (optionally inside monthly ZIP
//! archives) or as already-converted JSON. XML converts to the document
//! tree with attributes as `@`-prefixed keys and repeated child elements
//! collected into arrays; `Trade` and `TradeTypePriceStructure` are forced
//! to arrays even when a trader submits a single offer, so downstream
//! lookups see a uniform shape.

use crate::document::CaseDocument;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::{Map, Value};
use spd_core::{SpdError, SpdResult};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use zip::ZipArchive;

/// Element names always stored as arrays, matching the source schema's
/// repeatable nodes that frequently appear once.
const FORCE_LIST: [&str; 2] = ["Trade", "TradeTypePriceStructure"];

fn attributes_to_map(element: &BytesStart<'_>) -> SpdResult<Map<String, Value>> {
    let mut map = Map::new();
    for attribute in element.attributes() {
        let attribute =
            attribute.map_err(|e| SpdError::CasefileValue(format!("bad XML attribute: {e}")))?;
        let key = String::from_utf8_lossy(attribute.key.local_name().as_ref()).to_string();
        let value = attribute
            .unescape_value()
            .map_err(|e| SpdError::CasefileValue(format!("bad XML attribute value: {e}")))?
            .to_string();
        map.insert(format!("@{key}"), Value::String(value));
    }
    Ok(map)
}

fn insert_child(parent: &mut Map<String, Value>, name: String, child: Value) {
    let force_list = FORCE_LIST.contains(&name.as_str());
    match parent.remove(&name) {
        None => {
            if force_list {
                parent.insert(name, Value::Array(vec![child]));
            } else {
                parent.insert(name, child);
            }
        }
        Some(Value::Array(mut items)) => {
            items.push(child);
            parent.insert(name, Value::Array(items));
        }
        Some(existing) => {
            parent.insert(name, Value::Array(vec![existing, child]));
        }
    }
}

/// Convert casefile XML into a [`CaseDocument`].
pub fn read_casefile_xml(xml: &str) -> SpdResult<CaseDocument> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    // (element name, accumulated children/attributes)
    let mut stack: Vec<(String, Map<String, Value>)> = vec![(String::new(), Map::new())];

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                let map = attributes_to_map(e)?;
                stack.push((name, map));
            }
            Ok(Event::Empty(ref e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                let map = attributes_to_map(e)?;
                let parent = &mut stack.last_mut().expect("stack never empty").1;
                insert_child(parent, name, Value::Object(map));
            }
            Ok(Event::End(_)) => {
                let (name, map) = stack.pop().ok_or_else(|| {
                    SpdError::CasefileValue("unbalanced XML close tag".to_string())
                })?;
                let parent = &mut stack.last_mut().expect("stack never empty").1;
                insert_child(parent, name, Value::Object(map));
            }
            Ok(Event::Text(_)) | Ok(Event::CData(_)) => {
                // Casefiles are attribute-only; stray text is ignored
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(SpdError::CasefileValue(format!("XML parse error: {e}")));
            }
        }
    }

    if stack.len() != 1 {
        return Err(SpdError::CasefileValue(
            "unbalanced XML document".to_string(),
        ));
    }
    let (_, root) = stack.pop().expect("stack has root");
    CaseDocument::new(Value::Object(root))
}

/// Parse a JSON casefile.
pub fn read_casefile_json(bytes: &[u8]) -> SpdResult<CaseDocument> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| SpdError::CasefileValue(format!("JSON parse error: {e}")))?;
    CaseDocument::new(value)
}

/// Pull a casefile out of a ZIP archive. With `case_id` given the entry
/// `NEMSPDOutputs_<case_id>00.loaded` (or its `_OCD` variant) is required;
/// otherwise the archive must contain exactly one `.loaded` entry.
pub fn read_casefile_zip(path: &Path, case_id: Option<&str>) -> SpdResult<CaseDocument> {
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(file)
        .map_err(|e| SpdError::CasefileValue(format!("bad ZIP archive: {e}")))?;

    let names: Vec<String> = archive.file_names().map(str::to_string).collect();
    let entry_name = match case_id {
        Some(id) => {
            let plain = format!("NEMSPDOutputs_{id}00.loaded");
            let ocd = format!("NEMSPDOutputs_{id}00_OCD.loaded");
            names
                .iter()
                .find(|n| n.ends_with(&plain) || n.ends_with(&ocd))
                .cloned()
                .ok_or_else(|| SpdError::CasefileNotFound(id.to_string()))?
        }
        None => {
            let loaded: Vec<&String> = names.iter().filter(|n| n.ends_with(".loaded")).collect();
            match loaded.as_slice() {
                [single] => (*single).clone(),
                [] => {
                    return Err(SpdError::CasefileNotFound(format!(
                        "no .loaded entry in {}",
                        path.display()
                    )))
                }
                _ => {
                    return Err(SpdError::CasefileQuery(format!(
                        "{} .loaded entries in {}",
                        loaded.len(),
                        path.display()
                    )))
                }
            }
        }
    };

    let mut entry = archive
        .by_name(&entry_name)
        .map_err(|e| SpdError::CasefileValue(format!("bad ZIP entry: {e}")))?;
    let mut xml = String::new();
    entry.read_to_string(&mut xml)?;
    read_casefile_xml(&xml)
}

/// Read a casefile from a path, dispatching on extension.
pub fn read_casefile_path(path: &Path) -> SpdResult<CaseDocument> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => read_casefile_json(&std::fs::read(path)?),
        Some("zip") => read_casefile_zip(path, None),
        // .xml and .loaded both hold XML
        _ => read_casefile_xml(&std::fs::read_to_string(path)?),
    }
}

/// Directory-backed casefile store keyed by case ID.
#[derive(Debug, Clone)]
pub struct CasefileStore {
    dir: PathBuf,
}

impl CasefileStore {
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        CasefileStore { dir: dir.into() }
    }

    /// Load the casefile for a case ID. The ID must resolve to exactly
    /// one of `<id>.json`, `<id>.xml`, `<id>.loaded` or `<id>.zip`.
    pub fn load(&self, case_id: &str) -> SpdResult<CaseDocument> {
        let candidates: Vec<PathBuf> = ["json", "xml", "loaded", "zip"]
            .iter()
            .map(|ext| self.dir.join(format!("{case_id}.{ext}")))
            .filter(|p| p.exists())
            .collect();

        match candidates.as_slice() {
            [] => Err(SpdError::CasefileNotFound(case_id.to_string())),
            [single] => {
                if single.extension().and_then(|e| e.to_str()) == Some("zip") {
                    read_casefile_zip(single, Some(case_id))
                } else {
                    read_casefile_path(single)
                }
            }
            many => Err(SpdError::CasefileQuery(format!(
                "{} casefiles found for '{case_id}'",
                many.len()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<NEMSPDCaseFile>
  <NemSpdInputs>
    <Case CaseID="20201101001" Intervention="False" VoLL="14700"/>
    <RegionCollection>
      <Region RegionID="NSW1"/>
      <Region RegionID="VIC1"/>
    </RegionCollection>
    <PeriodCollection>
      <Period>
        <TraderPeriodCollection>
          <TraderPeriod TraderID="G1" RegionID="NSW1">
            <TradeCollection>
              <Trade TradeType="ENOF" MaxAvail="100"/>
            </TradeCollection>
          </TraderPeriod>
        </TraderPeriodCollection>
      </Period>
    </PeriodCollection>
  </NemSpdInputs>
</NEMSPDCaseFile>"#;

    #[test]
    fn test_xml_conversion_basics() {
        let doc = read_casefile_xml(SAMPLE_XML).unwrap();
        let case = doc.inputs("Case").unwrap();
        assert_eq!(case["@CaseID"], "20201101001");

        // Repeated elements become arrays
        let regions = doc.inputs("RegionCollection.Region").unwrap();
        assert!(regions.is_array());
        assert_eq!(regions.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_singleton_trade_forced_to_list() {
        let doc = read_casefile_xml(SAMPLE_XML).unwrap();
        let trade = doc
            .inputs("PeriodCollection.Period.TraderPeriodCollection.TraderPeriod")
            .unwrap()["TradeCollection"]["Trade"]
            .clone();
        assert!(trade.is_array());
        assert_eq!(trade.as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_store_missing_and_json_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = CasefileStore::open(dir.path());
        assert!(matches!(
            store.load("20209999999"),
            Err(SpdError::CasefileNotFound(_))
        ));

        let doc = read_casefile_xml(SAMPLE_XML).unwrap();
        let json = serde_json::to_vec(doc.root()).unwrap();
        std::fs::write(dir.path().join("20201101001.json"), json).unwrap();
        let loaded = store.load("20201101001").unwrap();
        assert_eq!(loaded.root(), doc.root());
    }

    #[test]
    fn test_json_round_trip_preserves_document() {
        let doc = read_casefile_xml(SAMPLE_XML).unwrap();
        let serialized = serde_json::to_string(doc.root()).unwrap();
        let reparsed = read_casefile_json(serialized.as_bytes()).unwrap();
        assert_eq!(doc.root(), reparsed.root());
    }
}
