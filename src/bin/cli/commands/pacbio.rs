//! PacBio command handlers for the seqnotify CLI

use tracing::{error, info};

use seqnotify::mail::Mailer;
use seqnotify::mlwh;
use seqnotify::pacbio::{self, LangQcClient};
use seqnotify::{BatchCounts, NotifyConfig, NotifyResult, PorchClient};

use crate::PacbioCommands;

pub async fn handle_pacbio_command(
    cmd: PacbioCommands,
    config: &NotifyConfig,
) -> NotifyResult<bool> {
    let porch = PorchClient::new(config.porch_client_config(), config.pacbio_pipeline())?;
    let langqc = LangQcClient::new(&config.langqc, config.ssl.ca_cert_file.as_deref())?;

    match cmd {
        PacbioCommands::Register => {
            let counts = pacbio::register_qc_tasks(&porch, &langqc).await?;
            Ok(report_batch("register", &counts))
        }
        PacbioCommands::Process => {
            // Resolve every dependency before claiming, so a misconfigured
            // consumer never strands a claimed task.
            let mlwh_pool = mlwh::connect_pool(&config.mlwh);
            let mailer = Mailer::new(&config.mail);

            let outcome = pacbio::process_next_task(
                &porch,
                &langqc,
                &mlwh_pool,
                &mailer,
                &config.irods.user_manual_url,
            )
            .await?;

            match outcome {
                Some(status) => println!("✓ Task processed, final status {}", status),
                None => println!("✓ No pending tasks to process"),
            }
            Ok(true)
        }
    }
}

fn report_batch(action: &str, counts: &BatchCounts) -> bool {
    if counts.errors > 0 {
        error!(
            processed = counts.processed,
            succeeded = counts.succeeded,
            errors = counts.errors,
            "Failed to {} some tasks",
            action
        );
        return false;
    }
    info!(
        processed = counts.processed,
        succeeded = counts.succeeded,
        "Completed {}",
        action
    );
    true
}
