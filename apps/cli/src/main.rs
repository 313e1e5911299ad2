//! Command-line front end for the CAT62 transform service.

mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{debug, warn};

use client_core::{
    HttpGatewayOptions, HttpTransformGateway, TransformGateway, TransformSession,
};
use shared::domain::{SelectedFile, SessionStatus, TransformMode};

use config::{load_settings, Settings};

#[derive(Parser, Debug)]
#[command(about = "Decode and encode EUROCONTROL CAT62 datablocks through the transform service")]
struct Args {
    /// Transform service base url; overrides cat62.toml and the environment.
    #[arg(long)]
    server_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a binary CAT62 datablock into structured JSON.
    Decode {
        /// Input file, typically .bin or .ast.
        file: PathBuf,
        /// Date (YYYY-MM-DD) the service uses to rebuild full timestamps
        /// from time-of-day fields.
        #[arg(long)]
        reference_date: Option<String>,
        /// Where to write the artifact; defaults to decoded_output.json.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Encode a JSON plots document into a binary CAT62 datablock.
    Encode {
        /// Input file, typically .json.
        file: PathBuf,
        /// Where to write the artifact; defaults to encoded_cat62.ast.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Check that the transform service is up.
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let args = Args::parse();
    let mut settings = load_settings();
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
    }

    match args.command {
        Command::Decode {
            file,
            reference_date,
            output,
        } => {
            if let Some(date) = &reference_date {
                validate_reference_date(date)?;
            }
            let gateway = build_gateway(&settings, reference_date)?;
            run_transform(gateway, TransformMode::Decode, &file, output).await
        }
        Command::Encode { file, output } => {
            let gateway = build_gateway(&settings, None)?;
            run_transform(gateway, TransformMode::Encode, &file, output).await
        }
        Command::Health => {
            let gateway = build_gateway(&settings, None)?;
            match gateway.health_check().await {
                Ok(health) => {
                    println!("{} ({})", health.status, health.service);
                    Ok(())
                }
                Err(err) => bail!(
                    "transform service health check failed: {}",
                    err.display_message()
                ),
            }
        }
    }
}

async fn run_transform(
    gateway: HttpTransformGateway,
    mode: TransformMode,
    input: &Path,
    output: Option<PathBuf>,
) -> Result<()> {
    let session = TransformSession::new(Arc::new(gateway));
    let session_id = session.session_id();
    let mut state_changes = session.subscribe_state_changes();
    tokio::spawn(async move {
        while let Ok(snapshot) = state_changes.recv().await {
            debug!(
                session = %session_id,
                status = ?snapshot.status,
                "cli: session state changed"
            );
        }
    });

    session.set_mode(mode).await;
    warn_on_unadvertised_extension(mode, input);
    session
        .select_file(Some(read_selected_file(input).await?))
        .await;
    session.process().await;

    let snapshot = session.snapshot().await;
    match snapshot.status {
        SessionStatus::Success => {
            let artifact = session
                .retrieve_result()
                .await
                .context("session reported success but no artifact is available")?;
            let path = output.unwrap_or_else(|| PathBuf::from(&artifact.filename));
            tokio::fs::write(&path, &artifact.bytes)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!(
                "wrote {} ({} bytes, {})",
                path.display(),
                artifact.size_bytes(),
                artifact.content_type
            );
            Ok(())
        }
        SessionStatus::Error => {
            bail!(
                "transform failed: {}",
                snapshot
                    .error_detail
                    .unwrap_or_else(|| "Unknown error".to_owned())
            )
        }
        status => bail!("session in unexpected status {status:?} after processing"),
    }
}

fn build_gateway(
    settings: &Settings,
    reference_date: Option<String>,
) -> Result<HttpTransformGateway> {
    HttpTransformGateway::new(HttpGatewayOptions {
        base_url: settings.server_url.clone(),
        reference_date,
        request_timeout: settings.request_timeout_seconds.map(Duration::from_secs),
    })
}

fn validate_reference_date(raw: &str) -> Result<()> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|_| ())
        .with_context(|| format!("invalid reference date {raw:?}, expected YYYY-MM-DD"))
}

/// Extension filters are advisory only: warn when the input looks unusual
/// for the mode, then send it unchanged.
fn warn_on_unadvertised_extension(mode: TransformMode, input: &Path) {
    let extension = input
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    let advertised = mode.advertised_extensions();
    let recognized = extension
        .as_deref()
        .is_some_and(|ext| advertised.contains(&ext));
    if !recognized {
        warn!(
            file = %input.display(),
            expected = ?advertised,
            "cli: input extension is unusual for this mode, sending anyway"
        );
    }
}

async fn read_selected_file(input: &Path) -> Result<SelectedFile> {
    let bytes = tokio::fs::read(input)
        .await
        .with_context(|| format!("failed to read {}", input.display()))?;
    let name = input
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload.dat")
        .to_owned();
    Ok(SelectedFile::new(name, bytes))
}
