use clap::Parser;
use fire_sentinel::alert::HttpAlertDispatcher;
use fire_sentinel::config::Settings;
use fire_sentinel::error::AppError;
use fire_sentinel::intake::DirectoryFrameSource;
use fire_sentinel::monitor::MonitorLoop;
use fire_sentinel::pipeline::ExternalCommandClassifier;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn, Level};
use uuid::Uuid;

/// Periodically classifies camera frames and uploads confirmed fire alerts.
#[derive(Parser, Debug)]
#[command(name = "fire-sentinel", version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory of frames to replay (overrides camera.frames_dir)
    #[arg(long)]
    frames_dir: Option<PathBuf>,
}

fn init_logging(level: &str) {
    let level = Level::from_str(level).unwrap_or(Level::INFO);
    tracing_subscriber::fmt().with_max_level(level).init();
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let args = Args::parse();
    let settings = Settings::load(args.config.as_deref())?;
    init_logging(&settings.logging.level);

    let frames_dir = args
        .frames_dir
        .or_else(|| settings.camera.frames_dir.clone())
        .ok_or_else(|| AppError::InvalidConfig("camera.frames_dir must be set".to_string()))?;
    let frame_source = DirectoryFrameSource::open(&frames_dir)?;

    let classifier = ExternalCommandClassifier::from_command(&settings.classifier.command)
        .ok_or_else(|| AppError::InvalidConfig("classifier.command must be set".to_string()))?
        .with_timeout(settings.classifier.timeout());

    let device_id = match settings.alert.device_id.trim() {
        "" => {
            let generated = Uuid::new_v4().to_string();
            warn!("No device id configured; using ephemeral id {}", generated);
            generated
        }
        configured => configured.to_string(),
    };

    let monitor = MonitorLoop::builder(settings.monitor.clone())
        .frame_source(Arc::new(frame_source))
        .classifier(Arc::new(classifier))
        .dispatcher(Arc::new(HttpAlertDispatcher::new(&settings.alert)))
        .device_id(device_id)
        .build()?;

    let mut status_rx = monitor.subscribe();
    let status_task = tokio::spawn(async move {
        loop {
            match status_rx.recv().await {
                Ok(status) => info!("{}", status),
                Err(RecvError::Lagged(skipped)) => warn!("Status display lagged by {}", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    });

    monitor.start().await;
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    monitor.stop().await;

    drop(monitor);
    let _ = status_task.await;
    Ok(())
}
