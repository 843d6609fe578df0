//! # ONT Run Events
//!
//! The task type for ONT event notifications and its email rendering.
//! A task identifies a run (experiment, instrument slot, flowcell) plus
//! the iRODS path the data landed in. The path is part of the task's
//! identity on purpose: a re-upload to a new path is a new notification,
//! because telling contacts where the data lives is part of the point.

use askama::Template;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::baton::Collection;
use crate::error::{NotifyError, NotifyResult};
use crate::mlwh::Study;

/// iRODS metadata attribute holding the experiment name
pub const EXPERIMENT_NAME_ATTR: &str = "ont:experiment_name";
/// iRODS metadata attribute holding the instrument slot
pub const INSTRUMENT_SLOT_ATTR: &str = "ont:instrument_slot";
/// iRODS metadata attribute holding the flowcell ID
pub const FLOWCELL_ID_ATTR: &str = "ont:flowcell_id";

/// The run events that can trigger an email
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    /// The run has been uploaded to iRODS
    #[serde(rename = "uploaded")]
    Uploaded,
    /// The run has been basecalled (basecall type unknown)
    #[serde(rename = "basecalled")]
    Basecalled,
    /// The run has been basecalled HAC (high accuracy)
    #[serde(rename = "basecalled (HAC)")]
    BasecalledHac,
    /// The run has been basecalled SUP (super-high accuracy)
    #[serde(rename = "basecalled (SUP)")]
    BasecalledSup,
    /// The run has been basecalled MOD (modified bases)
    #[serde(rename = "basecalled (MOD)")]
    BasecalledMod,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phrase = match self {
            EventType::Uploaded => "uploaded",
            EventType::Basecalled => "basecalled",
            EventType::BasecalledHac => "basecalled (HAC)",
            EventType::BasecalledSup => "basecalled (SUP)",
            EventType::BasecalledMod => "basecalled (MOD)",
        };
        f.write_str(phrase)
    }
}

/// A task for sending one ONT event email
///
/// The email goes to the contacts of the studies associated with the run;
/// a multiplexed run gets a single message covering all of its studies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactEmail {
    pub experiment_name: String,
    pub instrument_slot: i32,
    pub flowcell_id: String,
    /// Path of the iRODS collection holding the run
    pub path: String,
    pub event: EventType,
}

impl ContactEmail {
    /// Create a new email task for an event on an ONT run
    pub fn new(
        experiment_name: impl Into<String>,
        instrument_slot: i32,
        flowcell_id: impl Into<String>,
        path: impl Into<String>,
        event: EventType,
    ) -> NotifyResult<Self> {
        // GridION has 1-5, PromethION has 1-24
        if !(1..=24).contains(&instrument_slot) {
            return Err(NotifyError::invalid_input(
                "instrument_slot must be between 1 and 24",
            ));
        }

        Ok(Self {
            experiment_name: experiment_name.into(),
            instrument_slot,
            flowcell_id: flowcell_id.into(),
            path: path.into(),
            event,
        })
    }

    /// Build a task from an iRODS collection carrying ONT run metadata
    pub fn from_collection(collection: &Collection, event: EventType) -> NotifyResult<Self> {
        let experiment_name = required_avu(collection, EXPERIMENT_NAME_ATTR)?;
        let slot_value = required_avu(collection, INSTRUMENT_SLOT_ATTR)?;
        let flowcell_id = required_avu(collection, FLOWCELL_ID_ATTR)?;

        let instrument_slot: i32 = slot_value.parse().map_err(|_| {
            NotifyError::invalid_input(format!(
                "Invalid instrument slot '{}' in collection {}",
                slot_value, collection.path
            ))
        })?;

        Self::new(
            experiment_name,
            instrument_slot,
            flowcell_id,
            collection.path.clone(),
            event,
        )
    }

    /// Subject line of the email
    pub fn subject(&self) -> String {
        format!(
            "Update: ONT run {} flowcell {} has been {}",
            self.experiment_name, self.flowcell_id, self.event
        )
    }

    /// Body of the email
    ///
    /// `studies` are the studies associated with the run; `domain` is the
    /// network domain the service desk address lives in.
    pub fn body(&self, studies: &[Study], domain: &str) -> NotifyResult<String> {
        let studies = studies
            .iter()
            .map(|study| match &study.name {
                Some(name) => format!("{} ({})", study.id_study_lims, name),
                None => study.id_study_lims.clone(),
            })
            .collect::<Vec<_>>()
            .join("\n");

        let template = OntEventEmail {
            experiment_name: &self.experiment_name,
            flowcell_id: &self.flowcell_id,
            event: self.event,
            path: &self.path,
            studies,
            domain,
        };
        Ok(template.render()?)
    }
}

impl fmt::Display for ContactEmail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ONT experiment {} instrument slot {} flowcell {} event '{}'",
            self.experiment_name, self.instrument_slot, self.flowcell_id, self.event
        )
    }
}

fn required_avu<'a>(collection: &'a Collection, attribute: &str) -> NotifyResult<&'a str> {
    collection
        .avu(attribute)
        .map(|avu| avu.value.as_str())
        .ok_or_else(|| NotifyError::MissingMetadata(attribute.to_string()))
}

#[derive(Template)]
#[template(path = "ont_event_email.txt")]
struct OntEventEmail<'a> {
    experiment_name: &'a str,
    flowcell_id: &'a str,
    event: EventType,
    path: &'a str,
    studies: String,
    domain: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baton::Avu;
    use serde_json::json;

    fn test_email() -> ContactEmail {
        ContactEmail::new(
            "experiment1",
            1,
            "FAKE12345",
            "/testZone/home/irods/experiment1_1_FAKE12345",
            EventType::Uploaded,
        )
        .unwrap()
    }

    fn study(id: &str, name: &str) -> Study {
        Study {
            id_study_lims: id.to_string(),
            name: Some(name.to_string()),
        }
    }

    #[test]
    fn test_event_type_wire_format() {
        assert_eq!(
            serde_json::to_value(EventType::Uploaded).unwrap(),
            json!("uploaded")
        );
        assert_eq!(
            serde_json::to_value(EventType::BasecalledHac).unwrap(),
            json!("basecalled (HAC)")
        );

        let event: EventType = serde_json::from_value(json!("basecalled (SUP)")).unwrap();
        assert_eq!(event, EventType::BasecalledSup);
    }

    #[test]
    fn test_serialize_deserialize_event() {
        let email = test_email();
        let encoded = serde_json::to_string(&email).unwrap();
        let decoded: ContactEmail = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, email);
    }

    #[test]
    fn test_instrument_slot_range() {
        for slot in [1, 5, 24] {
            assert!(ContactEmail::new("e", slot, "f", "/p", EventType::Uploaded).is_ok());
        }
        for slot in [0, -1, 25] {
            let result = ContactEmail::new("e", slot, "f", "/p", EventType::Uploaded);
            match result {
                Err(NotifyError::InvalidInput(message)) => {
                    assert_eq!(message, "instrument_slot must be between 1 and 24");
                }
                other => panic!("Expected InvalidInput error, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_subject() {
        assert_eq!(
            test_email().subject(),
            "Update: ONT run experiment1 flowcell FAKE12345 has been uploaded"
        );
    }

    #[test]
    fn test_body() {
        let studies = vec![study("1234", "study1"), study("4567", "study2")];
        let body = test_email()
            .body(&studies, "no-such-domain.sanger.ac.uk")
            .unwrap();

        assert_eq!(
            body,
            "The ONT run for experiment experiment1, flowcell FAKE12345 has been uploaded. \
             The data are available in iRODS at the following path:\n\
             \n\
             /testZone/home/irods/experiment1_1_FAKE12345\n\
             \n\
             This is an automated email from NPG. You are receiving it because you are \
             registered as a contact for one or more of the Studies listed below:\n\
             \n\
             1234 (study1)\n\
             4567 (study2)\n\
             \n\
             If you have any questions or need further assistance, please feel free to \
             contact a Scientific Service Representative at dnap-ssr@no-such-domain.sanger.ac.uk.\n\
             \n\
             NPG on behalf of DNA Pipelines.\n"
        );
    }

    #[test]
    fn test_study_without_name() {
        let studies = vec![Study {
            id_study_lims: "1234".to_string(),
            name: None,
        }];
        let body = test_email().body(&studies, "example.com").unwrap();
        assert!(body.contains("below:\n\n1234\n\n"));
    }

    #[test]
    fn test_from_collection() {
        let collection = Collection {
            avus: vec![
                Avu::new(EXPERIMENT_NAME_ATTR, "experiment1"),
                Avu::new(INSTRUMENT_SLOT_ATTR, "3"),
                Avu::new(FLOWCELL_ID_ATTR, "FAKE12345"),
            ],
            path: "/testZone/home/irods/run1".to_string(),
        };

        let email = ContactEmail::from_collection(&collection, EventType::Basecalled).unwrap();
        assert_eq!(email.experiment_name, "experiment1");
        assert_eq!(email.instrument_slot, 3);
        assert_eq!(email.flowcell_id, "FAKE12345");
        assert_eq!(email.path, "/testZone/home/irods/run1");
        assert_eq!(email.event, EventType::Basecalled);
    }

    #[test]
    fn test_from_collection_missing_metadata() {
        let collection = Collection {
            avus: vec![Avu::new(EXPERIMENT_NAME_ATTR, "experiment1")],
            path: "/testZone/home/irods/run1".to_string(),
        };

        let result = ContactEmail::from_collection(&collection, EventType::Uploaded);
        match result {
            Err(NotifyError::MissingMetadata(attribute)) => {
                assert_eq!(attribute, INSTRUMENT_SLOT_ATTR);
            }
            other => panic!("Expected MissingMetadata error, got {:?}", other),
        }
    }

    #[test]
    fn test_non_numeric_slot_is_rejected() {
        let collection = Collection {
            avus: vec![
                Avu::new(EXPERIMENT_NAME_ATTR, "experiment1"),
                Avu::new(INSTRUMENT_SLOT_ATTR, "one"),
                Avu::new(FLOWCELL_ID_ATTR, "FAKE12345"),
            ],
            path: "/testZone/home/irods/run1".to_string(),
        };

        let result = ContactEmail::from_collection(&collection, EventType::Uploaded);
        assert!(matches!(result, Err(NotifyError::InvalidInput(_))));
    }
}
