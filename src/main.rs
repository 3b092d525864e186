use anyhow::Result;
use clap::Parser;
use live_meeting_client::{Config, MeetingConfig, MeetingController, SilenceCapture};
use std::time::Duration;
use tracing::info;

/// Demo client: opens a live meeting session, uploads (silent) audio and
/// prints the reconciled transcript when the session ends.
#[derive(Parser)]
#[command(name = "live-meeting-client")]
struct Cli {
    /// Meeting service endpoint (overrides the config file)
    #[arg(long)]
    endpoint: Option<String>,

    /// Config file path (config-crate style, no extension)
    #[arg(long, default_value = "config/live-meeting-client")]
    config: String,

    /// How long to keep the session open before ending it
    #[arg(long, default_value_t = 30)]
    duration_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let mut meeting_config = match Config::load(&cli.config) {
        Ok(cfg) => {
            info!("Loaded config: {}", cfg.service.name);
            cfg.meeting_config()
        }
        Err(_) => {
            info!("No config file at {}, using defaults", cli.config);
            MeetingConfig::default()
        }
    };
    if let Some(endpoint) = cli.endpoint {
        meeting_config.endpoint = endpoint;
    }

    info!("Connecting to {}", meeting_config.endpoint);

    let mut controller =
        MeetingController::new(meeting_config, Box::new(SilenceCapture::new()));
    controller.start().await?;

    if let Some(session_id) = controller.session_id().await {
        info!("Session {} started", session_id);
    }

    tokio::time::sleep(Duration::from_secs(cli.duration_secs)).await;

    let snapshot = controller.snapshot().await;
    info!("Received {} finalized transcripts", snapshot.transcripts.len());
    for entry in &snapshot.transcripts {
        let translation = entry
            .translations
            .first()
            .map(|t| format!(" / {}", t.translated_text))
            .unwrap_or_default();
        info!("[{}] {}{}", entry.speaker, entry.text, translation);
    }

    controller.shutdown().await;
    Ok(())
}
