//! # Baton JSON
//!
//! The baton JSON representation of an iRODS collection, as produced by
//! `baton-list` and friends: a `coll` path plus a list of AVUs (attribute,
//! value, optional units). ONT ingest reads and writes these one per line,
//! so re-serialization is canonical: keys in sorted order, AVUs sorted,
//! no whitespace.

use serde::{Deserialize, Serialize};

use crate::error::NotifyResult;

/// An iRODS attribute/value/units triple
// Field order gives sorted JSON keys and the AVU sort order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Avu {
    pub attribute: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    pub value: String,
}

impl Avu {
    pub fn new(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            units: None,
            value: value.into(),
        }
    }
}

/// An iRODS collection with its metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub avus: Vec<Avu>,
    #[serde(rename = "coll")]
    pub path: String,
}

impl Collection {
    /// Parse a collection from one line of baton JSON
    pub fn from_json(line: &str) -> NotifyResult<Self> {
        Ok(serde_json::from_str(line)?)
    }

    /// Serialize to canonical single-line baton JSON
    pub fn to_json(&self) -> NotifyResult<String> {
        let mut canonical = self.clone();
        canonical.avus.sort();
        Ok(serde_json::to_string(&canonical)?)
    }

    /// Look up the first AVU with the given attribute
    pub fn avu(&self, attribute: &str) -> Option<&Avu> {
        self.avus.iter().find(|avu| avu.attribute == attribute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_collection_line() {
        let line = r#"{"coll": "/testZone/home/irods/run1", "avus": [
            {"attribute": "ont:experiment_name", "value": "experiment1"},
            {"attribute": "ont:instrument_slot", "value": "1", "units": "slot"}
        ]}"#;

        let coll = Collection::from_json(line).unwrap();
        assert_eq!(coll.path, "/testZone/home/irods/run1");
        assert_eq!(coll.avus.len(), 2);
        assert_eq!(
            coll.avu("ont:experiment_name").map(|a| a.value.as_str()),
            Some("experiment1")
        );
        assert_eq!(
            coll.avu("ont:instrument_slot").and_then(|a| a.units.as_deref()),
            Some("slot")
        );
        assert!(coll.avu("ont:flowcell_id").is_none());
    }

    #[test]
    fn test_collection_without_avus() {
        let coll = Collection::from_json(r#"{"coll": "/testZone/home/irods/run1"}"#).unwrap();
        assert!(coll.avus.is_empty());
        assert_eq!(coll.to_json().unwrap(), r#"{"coll":"/testZone/home/irods/run1"}"#);
    }

    #[test]
    fn test_to_json_is_canonical() {
        let coll = Collection {
            avus: vec![
                Avu::new("ont:instrument_slot", "1"),
                Avu::new("ont:flowcell_id", "FAKE12345"),
                Avu::new("ont:experiment_name", "experiment1"),
            ],
            path: "/testZone/home/irods/run1".to_string(),
        };

        assert_eq!(
            coll.to_json().unwrap(),
            concat!(
                r#"{"avus":["#,
                r#"{"attribute":"ont:experiment_name","value":"experiment1"},"#,
                r#"{"attribute":"ont:flowcell_id","value":"FAKE12345"},"#,
                r#"{"attribute":"ont:instrument_slot","value":"1"}"#,
                r#"],"coll":"/testZone/home/irods/run1"}"#
            )
        );
    }

    #[test]
    fn test_malformed_line_is_an_error() {
        assert!(Collection::from_json("{not json").is_err());
        assert!(Collection::from_json(r#"{"avus": []}"#).is_err());
    }
}
