// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bildwerk: batch image and ZIP-archive to PDF conversion
//
// Entry point. Initialises logging, loads the config, runs one conversion over
// the files named on the command line, and reports failures as JSON.

mod services;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use bildwerk_core::config::AppConfig;
use bildwerk_core::error::{BildwerkError, Result};
use bildwerk_core::human_errors::{StatusClass, humanize_error};
use clap::Parser;
use tracing::{error, info, warn};

use services::conversion::ConversionService;
use services::data_dir;

/// Convert images and ZIP archives of images into one PDF, one image per page.
#[derive(Parser, Debug)]
#[command(
    name = "bildwerk",
    version,
    about = "Convert images and ZIP archives of images into one PDF",
    arg_required_else_help = true
)]
struct Cli {
    /// Image files (.jpg .jpeg .png .gif .bmp .tiff .webp) and .zip archives,
    /// in page order.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Re-encoding quality.
    #[arg(short, long, value_parser = ["low", "medium", "high"])]
    quality: Option<String>,

    /// Paper size of every page.
    #[arg(short, long, value_parser = ["a4", "letter", "legal"])]
    page_size: Option<String>,

    /// Print each image's filename under it.
    #[arg(long)]
    show_filenames: bool,

    /// Where to write the PDF. Defaults to converted_<epoch-ms>.pdf in the
    /// current directory.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON config file.
    #[arg(long, env = "BILDWERK_CONFIG")]
    config: Option<PathBuf>,
}

impl Cli {
    /// The options bag, keyed the way a form upload would send it.
    fn form(&self) -> HashMap<String, String> {
        let mut form = HashMap::new();
        if let Some(quality) = &self.quality {
            form.insert("imageQuality".to_owned(), quality.clone());
        }
        if let Some(page_size) = &self.page_size {
            form.insert("pageSize".to_owned(), page_size.clone());
        }
        form.insert("showFilenames".to_owned(), self.show_filenames.to_string());
        form
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!("Bildwerk starting");

    let config_path = cli.config.clone().or_else(data_dir::existing_config_file);
    let service = match AppConfig::load(config_path.as_deref()).and_then(ConversionService::init)
    {
        Ok(service) => service,
        Err(e) => {
            error!(error = %e, "startup failed");
            return report_failure(humanize_error(&e).into_response(), StatusClass::Server);
        }
    };

    info!(
        temp_root = %service.temp().root().display(),
        max_uploads = service.config().max_uploads,
        "service ready"
    );

    let result = run(&service, &cli).await;

    if let Err(e) = service.shutdown().await {
        warn!(error = %e, "shutdown incomplete");
    }

    match result {
        Ok(path) => {
            println!("{}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            let (response, status) = service.respond(&e);
            report_failure(response, status)
        }
    }
}

async fn run(service: &ConversionService, cli: &Cli) -> Result<PathBuf> {
    let mut uploads = Vec::with_capacity(cli.files.len());
    for path in &cli.files {
        let filename = upload_name(path)?;
        let bytes = tokio::fs::read(path).await?;
        // No declared content type on the command line; the extension decides.
        uploads.push(service.stage_upload(&filename, "", bytes).await?);
    }

    let document = service.convert(uploads, &cli.form()).await?;

    let destination = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(document.suggested_filename()));
    service.deliver_to_path(&document, &destination).await?;

    info!(
        path = %destination.display(),
        pages = document.page_count,
        "PDF written"
    );
    Ok(destination)
}

fn upload_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| BildwerkError::UnsupportedFormat(format!("{} is not a file", path.display())))
}

fn report_failure(
    response: bildwerk_core::types::ConversionResponse,
    status: StatusClass,
) -> ExitCode {
    match serde_json::to_string(&response) {
        Ok(json) => println!("{json}"),
        Err(_) => println!("{}", response.message),
    }
    match status {
        StatusClass::Client => ExitCode::from(2),
        StatusClass::Server => ExitCode::FAILURE,
    }
}
