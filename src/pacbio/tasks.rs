//! # PacBio QC Notification Flows
//!
//! The producer turns recently QC-ed products into porch tasks; the
//! consumer claims one task at a time, looks up the well's libraries and
//! study contacts, and emails each study. Task status reflects the
//! outcome: `DONE` when every study was handled, `FAILED` when a
//! notification could not be produced, `PENDING` when the supporting
//! data could not be fetched and the task should be retried later.

use sqlx::MySqlPool;
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

use crate::error::NotifyResult;
use crate::mail::Mailer;
use crate::mlwh::study_contacts;
use crate::pacbio::email::generate_qc_email;
use crate::pacbio::langqc::{LangQcClient, Library, QcState, WellLibraries};
use crate::porch::{BatchCounts, PorchClient, TaskStatus};

/// Register porch tasks for recently QC-ed products
///
/// Safe to run on a schedule: porch recognizes tasks it has seen before,
/// so re-registering a product is a no-op.
pub async fn register_qc_tasks(
    porch: &PorchClient,
    langqc: &LangQcClient,
) -> NotifyResult<BatchCounts> {
    let qc_states = langqc.recently_qced().await?;
    info!("Retrieved QC states for {} products", qc_states.len());

    let mut counts = BatchCounts::default();
    for (id_product, states) in &qc_states {
        // A product can carry multiple QC states, but the query is limited
        // to sequencing-type QC, so the first one is the one to report.
        let Some(qc_state) = states.first() else {
            continue;
        };
        counts.processed += 1;

        match porch.add_task(qc_state).await {
            Ok(true) => {
                debug!("Task added for product {}", id_product);
                counts.succeeded += 1;
            }
            Ok(false) => {
                debug!("Task already exists for product {}", id_product);
                counts.succeeded += 1;
            }
            Err(e) => {
                error!(
                    "Error registering a task for pipeline {} with QC state change of {}: {}",
                    porch.pipeline().name,
                    id_product,
                    e
                );
                counts.errors += 1;
            }
        }
    }

    if counts.errors > 0 {
        error!(
            "{} errors when registering products. Registered QC states for {} products",
            counts.errors, counts.succeeded
        );
    } else {
        info!("Registered QC states for {} products", counts.succeeded);
    }

    Ok(counts)
}

/// Claim and process one QC notification task
///
/// Returns the status the task was moved to, or `None` when porch had no
/// pending tasks. An error reporting the status back to porch leaves the
/// task claimed and is returned to the caller.
pub async fn process_next_task(
    porch: &PorchClient,
    langqc: &LangQcClient,
    mlwh_pool: &MySqlPool,
    mailer: &Mailer,
    irods_docs_url: &str,
) -> NotifyResult<Option<TaskStatus>> {
    let mut claimed = porch.claim_tasks::<QcState>(1).await?;
    let Some(task) = claimed.pop() else {
        info!("No pending tasks returned from porch");
        return Ok(None);
    };

    let qc_state = task.task_input;
    info!("Claimed task for product {}", qc_state.id_product);

    let status = match gather_well_context(langqc, mlwh_pool, &qc_state.id_product).await {
        Ok(context) => notify_studies(langqc, mailer, irods_docs_url, &qc_state, &context).await,
        Err(e) => {
            warn!(
                "Failed to get notification data for product {}: {}. The task will be released",
                qc_state.id_product, e
            );
            TaskStatus::Pending
        }
    };

    if let Err(e) = porch.update_task(&qc_state, status).await {
        error!(
            "Failed to update the task for product {} to status {}: {}",
            qc_state.id_product, status, e
        );
        return Err(e);
    }
    info!(
        "Updated the task for product {} to status {}",
        qc_state.id_product, status
    );

    Ok(Some(status))
}

/// Libraries and contacts of one well, grouped by study
struct WellContext {
    well: WellLibraries,
    libraries_per_study: BTreeMap<String, Vec<Library>>,
    contacts_per_study: BTreeMap<String, Vec<String>>,
}

async fn gather_well_context(
    langqc: &LangQcClient,
    mlwh_pool: &MySqlPool,
    id_product: &str,
) -> NotifyResult<WellContext> {
    let well = langqc.well_libraries(id_product).await?;

    let mut libraries_per_study: BTreeMap<String, Vec<Library>> = BTreeMap::new();
    for library in &well.libraries {
        libraries_per_study
            .entry(library.study_id.clone())
            .or_default()
            .push(library.clone());
    }

    let mut contacts_per_study = BTreeMap::new();
    for study_id in libraries_per_study.keys() {
        let contacts = study_contacts(mlwh_pool, study_id).await?;
        contacts_per_study.insert(study_id.clone(), contacts);
    }

    Ok(WellContext {
        well,
        libraries_per_study,
        contacts_per_study,
    })
}

/// Email every study in the well; studies without contacts are skipped
///
/// A failure for one study does not stop the others, but marks the task
/// as failed.
async fn notify_studies(
    langqc: &LangQcClient,
    mailer: &Mailer,
    irods_docs_url: &str,
    qc_state: &QcState,
    context: &WellContext,
) -> TaskStatus {
    let mut status = TaskStatus::Done;

    for (study_id, libraries) in &context.libraries_per_study {
        let Some(contacts) = context.contacts_per_study.get(study_id) else {
            continue;
        };
        if contacts.is_empty() {
            info!("No contacts are registered for study {}", study_id);
            continue;
        }

        let result = async {
            let (subject, text) = generate_qc_email(
                mailer.domain(),
                langqc.run_ui_url(),
                irods_docs_url,
                qc_state,
                &context.well,
                libraries,
            )?;
            mailer.send(contacts, &subject, &text).await
        }
        .await;

        if let Err(e) = result {
            error!("Error generating or sending a notification: {}", e);
            status = TaskStatus::Failed;
        }
    }

    status
}
