//! ONT command handlers for the seqnotify CLI

use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tracing::{error, info};

use seqnotify::mail::Mailer;
use seqnotify::mlwh;
use seqnotify::ont;
use seqnotify::{BatchCounts, NotifyConfig, NotifyResult, PorchClient};

use crate::OntCommands;

pub async fn handle_ont_command(cmd: OntCommands, config: &NotifyConfig) -> NotifyResult<bool> {
    let porch = PorchClient::new(config.porch_client_config(), config.ont_pipeline())?;

    match cmd {
        OntCommands::Add {
            event,
            input,
            output,
        } => {
            let reader = open_reader(input).await?;
            let writer = open_writer(output).await?;
            let counts = ont::add_email_tasks(&porch, event.into(), reader, writer).await?;
            Ok(report_batch("add", &counts))
        }
        OntCommands::Run => {
            let mlwh_pool = mlwh::connect_pool(&config.mlwh);
            let mailer = Mailer::new(&config.mail);
            let counts = ont::run_email_tasks(&porch, &mlwh_pool, &mailer).await?;
            Ok(report_batch("run", &counts))
        }
        OntCommands::Register => {
            porch.register_pipeline().await?;
            println!("✓ Pipeline {} registered", porch.pipeline());
            Ok(true)
        }
        OntCommands::Token { description } => {
            let token = porch.create_token(&description).await?;
            println!("{}", token);
            Ok(true)
        }
    }
}

async fn open_reader(input: Option<PathBuf>) -> NotifyResult<Box<dyn AsyncBufRead + Unpin>> {
    Ok(match input {
        Some(path) => Box::new(BufReader::new(File::open(path).await?)),
        None => Box::new(BufReader::new(tokio::io::stdin())),
    })
}

async fn open_writer(output: Option<PathBuf>) -> NotifyResult<Box<dyn AsyncWrite + Unpin>> {
    Ok(match output {
        Some(path) => Box::new(File::create(path).await?),
        None => Box::new(tokio::io::stdout()),
    })
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
