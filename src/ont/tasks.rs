//! # ONT Event Notification Flows
//!
//! The producer is a stream filter: it reads iRODS collections in baton
//! JSON form, one per line, adds a porch task for each and echoes the
//! collection to its output, so it composes in shell pipelines. The
//! consumer claims a batch of tasks and sends one email per run to the
//! union of the contacts of the run's studies.

use sqlx::MySqlPool;
use std::collections::BTreeSet;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{error, info};

use crate::baton::Collection;
use crate::error::NotifyResult;
use crate::mail::Mailer;
use crate::mlwh::{studies_for_ont_run, study_contacts};
use crate::ont::event::{ContactEmail, EventType};
use crate::porch::{BatchCounts, PorchClient, TaskStatus};

/// How many tasks one consumer invocation claims
const CLAIM_BATCH_SIZE: u32 = 100;

/// Add email tasks for a stream of iRODS collections
///
/// Each successfully handled collection is echoed to `writer` as one
/// compact JSON line. A bad line is counted and logged but does not stop
/// the stream; only an output failure does.
pub async fn add_email_tasks<R, W>(
    porch: &PorchClient,
    event: EventType,
    reader: R,
    mut writer: W,
) -> NotifyResult<BatchCounts>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut counts = BatchCounts::default();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        counts.processed += 1;

        match add_one_task(porch, event, &line).await {
            Ok((collection, added)) => {
                if added {
                    counts.succeeded += 1;
                }
                writer.write_all(collection.to_json()?.as_bytes()).await?;
                writer.write_all(b"\n").await?;
            }
            Err(e) => {
                counts.errors += 1;
                error!("Failed to add a task: {}", e);
            }
        }
    }
    writer.flush().await?;

    Ok(counts)
}

async fn add_one_task(
    porch: &PorchClient,
    event: EventType,
    line: &str,
) -> NotifyResult<(Collection, bool)> {
    let collection = Collection::from_json(line)?;
    let email = ContactEmail::from_collection(&collection, event)?;

    let added = porch.add_task(&email).await?;
    if added {
        info!("Task added for {}", email);
    } else {
        info!("Task already exists for {}", email);
    }

    Ok((collection, added))
}

/// Claim a batch of tasks and send the emails
///
/// A task whose email cannot be prepared or sent is reset to `PENDING`
/// for a later attempt; both warehouse and SMTP failures are likely
/// transient, and since there is exactly one email per run a retry
/// cannot spam a subset of the contacts.
pub async fn run_email_tasks(
    porch: &PorchClient,
    mlwh_pool: &MySqlPool,
    mailer: &Mailer,
) -> NotifyResult<BatchCounts> {
    let tasks = porch.claim_tasks::<ContactEmail>(CLAIM_BATCH_SIZE).await?;
    if tasks.is_empty() {
        info!("No pending tasks returned from porch");
        return Ok(BatchCounts::default());
    }

    let mut counts = BatchCounts::default();
    for task in tasks {
        counts.processed += 1;
        let email = task.task_input;

        let status = match prepare_and_send(mlwh_pool, mailer, &email).await {
            Ok(()) => {
                counts.succeeded += 1;
                TaskStatus::Done
            }
            Err(e) => {
                counts.errors += 1;
                error!("Failed to send an email for {}: {}", email, e);
                TaskStatus::Pending
            }
        };

        if let Err(e) = porch.update_task(&email, status).await {
            counts.errors += 1;
            error!(
                "Failed to update the task for {} to status {}: {}",
                email, status, e
            );
        }
    }

    Ok(counts)
}

async fn prepare_and_send(
    mlwh_pool: &MySqlPool,
    mailer: &Mailer,
    email: &ContactEmail,
) -> NotifyResult<()> {
    let studies = studies_for_ont_run(
        mlwh_pool,
        &email.experiment_name,
        email.instrument_slot,
        &email.flowcell_id,
    )
    .await?;

    // One email goes to the contacts of every study in the run.
    let mut contacts: BTreeSet<String> = BTreeSet::new();
    for study in &studies {
        contacts.extend(study_contacts(mlwh_pool, &study.id_study_lims).await?);
    }

    info!(
        "Preparing email for {} to {} contacts of {} studies",
        email,
        contacts.len(),
        studies.len()
    );

    if contacts.is_empty() {
        info!("No contacts found for {}", email);
        return Ok(());
    }

    let contacts: Vec<String> = contacts.into_iter().collect();
    let content = email.body(&studies, mailer.domain())?;
    mailer.send(&contacts, &email.subject(), &content).await
}
