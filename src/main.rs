use clap::Parser;
use dotenvy::dotenv;
use ocr_upload_tracker::utils::format::format_bytes;
use ocr_upload_tracker::{ItemId, ItemStatus, SourceFile, Stage, TrackedItem, TrackerConfig, TransportMode};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Upload scans and PDFs to the OCR pipeline and follow their processing.
#[derive(Parser, Debug)]
#[command(name = "ocr-upload-tracker", version, about)]
struct Cli {
    /// Base URL of the OCR API (overrides OCR_API_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// Bearer token (overrides OCR_API_TOKEN)
    #[arg(long)]
    token: Option<String>,

    /// Progress transport: push or poll (overrides TRACKER_TRANSPORT)
    #[arg(long)]
    transport: Option<TransportMode>,

    /// Files to upload (.jpg, .jpeg, .png, .tiff, .tif, .pdf)
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ocr_upload_tracker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = TrackerConfig::from_env();
    if let Some(url) = cli.api_url {
        config.api_base_url = url;
    }
    if let Some(token) = cli.token {
        config.auth_token = Some(token);
    }
    if let Some(transport) = cli.transport {
        config.transport = transport;
    }

    info!(
        "🚀 Tracking uploads to {} via {} transport",
        config.api_base_url, config.transport
    );

    let mut files = Vec::with_capacity(cli.files.len());
    for path in &cli.files {
        let file = SourceFile::from_path(path).await?;
        info!("📄 {} ({})", file.name(), format_bytes(file.size()));
        files.push(file);
    }

    let queue = ocr_upload_tracker::queue_from_config(&config)?;
    queue.add(files)?;
    info!("📦 {} file(s) queued ({} transport)", queue.len(), queue.transport_name());

    let mut rx = queue.observe();
    let mut last_seen: HashMap<ItemId, (ItemStatus, Stage)> = HashMap::new();

    let finished = loop {
        let items = rx.borrow_and_update().clone();
        report_changes(&items, &mut last_seen);
        if items.iter().all(TrackedItem::is_terminal) {
            break items;
        }

        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break queue.snapshot();
                }
            }
            _ = shutdown_signal() => {
                warn!("🛑 Interrupted; cancelling outstanding uploads");
                drop(queue);
                return Ok(ExitCode::from(130));
            }
        }
    };

    let failed = finished
        .iter()
        .filter(|item| item.status == ItemStatus::Error)
        .count();

    info!(
        "✅ {} of {} documents ready for querying",
        finished.len() - failed,
        finished.len()
    );

    if failed > 0 {
        error!("{} document(s) failed", failed);
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn report_changes(items: &[TrackedItem], last_seen: &mut HashMap<ItemId, (ItemStatus, Stage)>) {
    for item in items {
        let key = (item.status, item.stage);
        if last_seen.get(&item.id) == Some(&key) {
            continue;
        }
        last_seen.insert(item.id, key);

        match item.status {
            ItemStatus::Error => error!("❌ {}: {}", item.file.name, item.status_line()),
            ItemStatus::Done => info!("✅ {}: {}", item.file.name, item.status_line()),
            _ => info!("⏳ {}: {}", item.file.name, item.status_line()),
        }

        if let Some(preview) = &item.live_preview_text {
            let snippet: String = preview.chars().take(120).collect();
            info!("   {} preview: {}", item.file.name, snippet.replace('\n', " "));
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received");
        },
        _ = terminate => {
            info!("💤 SIGTERM received");
        },
    }
}
