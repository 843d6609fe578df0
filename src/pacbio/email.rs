//! # PacBio QC Notification Text
//!
//! Renders the customer-facing email for a completed well QC review.
//! One email covers one study; a well with libraries from several studies
//! produces several emails.

use std::collections::BTreeSet;

use crate::error::{NotifyError, NotifyResult};
use crate::pacbio::langqc::{Library, QcState, WellLibraries};

/// At most this many sample names are listed before eliding the rest
const MAX_LISTED_SAMPLES: usize = 5;

/// Generate the subject and body of a QC completion email
///
/// `libraries` is the subset of the well's libraries belonging to one
/// study; all of them must share a study ID.
pub fn generate_qc_email(
    domain: &str,
    run_ui_url: &str,
    irods_docs_url: &str,
    qc_state: &QcState,
    well: &WellLibraries,
    libraries: &[Library],
) -> NotifyResult<(String, String)> {
    let study_ids: BTreeSet<&str> = libraries.iter().map(|lib| lib.study_id.as_str()).collect();
    if study_ids.len() != 1 {
        return Err(NotifyError::invalid_input(
            "Libraries from different studies in 'libraries' attribute",
        ));
    }

    let study_id = &libraries[0].study_id;
    let study_name = &libraries[0].study_name;

    let plate_number = match well.plate_number {
        Some(plate_number) => plate_number.to_string(),
        None => "n/a".to_string(),
    };
    let outcome = match qc_state.outcome {
        Some(true) => "Pass",
        Some(false) => "Fail",
        None => "Undefined",
    };

    let subject = format!("Study {}: PacBio data is available", study_id);

    let mut lines = vec![
        format!("Study name: {}", study_name),
        format!("Run: {}", well.run_name),
        format!("Well label: {}", well.label),
        format!("Plate number: {}", plate_number),
        format!("QC outcome: {} ({})", qc_state.qc_state, outcome),
        String::new(),
        "Samples:".to_string(),
    ];

    let num_samples = libraries.len();
    for library in libraries.iter().take(MAX_LISTED_SAMPLES) {
        lines.push(format!("\t{},", library.sample_name));
    }
    if num_samples > MAX_LISTED_SAMPLES {
        lines.push("\t.....".to_string());
    }
    lines.push(format!(
        "\t{} sample{} in total",
        num_samples,
        if num_samples > 1 { "s" } else { "" }
    ));

    lines.extend([
        String::new(),
        format!(
            "The QC review is complete and your data should now be available from iRODS (see {}).",
            irods_docs_url
        ),
        format!(
            "QC information for this run: {}/{}.",
            run_ui_url, well.run_name
        ),
        String::new(),
        format!(
            "If you have any questions or need further assistance, please feel free to reach out \
             to a Scientific Service Representative at dnap-ssr@{}.",
            domain
        ),
        String::new(),
        "NPG on behalf of DNA Pipelines".to_string(),
        String::new(),
    ]);

    Ok((subject, lines.join("\n")))
}
