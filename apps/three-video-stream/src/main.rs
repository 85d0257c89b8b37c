use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use three_video_stream::{
    gst_utils, service::SignalHandler, LifecycleController, StreamConfig, ThreeVideoStream,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Composite three videos side by side and optionally stream the result",
    long_about = None
)]
struct Args {
    /// Location of the left video (path or URI)
    #[arg(short = 'a', long)]
    video_a: Option<String>,

    /// Location of the top-right video (path or URI)
    #[arg(short = 'b', long)]
    video_b: Option<String>,

    /// Location of the bottom-right video (path or URI)
    #[arg(short = 'c', long)]
    video_c: Option<String>,

    /// Stream key; without it only the local preview runs
    #[arg(short = 'k', long, env = "STREAM_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// RTMP ingest server the key is appended to
    #[arg(short = 's', long)]
    ingest_server: Option<String>,

    /// Output width [320, 1920]
    #[arg(short = 'w', long)]
    width: Option<i32>,

    /// Output height [240, 1080]
    #[arg(short = 'H', long)]
    height: Option<i32>,

    /// Path to a TOML configuration file
    #[arg(short = 'C', long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Check available GStreamer plugins and exit
    #[arg(long)]
    check_plugins: bool,
}

impl Args {
    /// Command-line values win over the configuration file.
    fn apply_to(&self, config: &mut StreamConfig) {
        let sources = &mut config.sources;
        for (location, target) in [
            (&self.video_a, &mut sources.location_1),
            (&self.video_b, &mut sources.location_2),
            (&self.video_c, &mut sources.location_3),
        ] {
            if let Some(location) = location {
                *target = location.clone();
            }
        }

        if let Some(key) = &self.api_key {
            config.streaming.api_key = Some(key.clone());
        }
        if let Some(server) = &self.ingest_server {
            config.streaming.ingest_server = server.clone();
        }
        if let Some(width) = self.width {
            config.output.width = width;
        }
        if let Some(height) = self.height {
            config.output.height = height;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Starting Three Video Stream v{}", env!("CARGO_PKG_VERSION"));

    let gst_capabilities = gst_utils::initialize()?;
    info!("GStreamer initialized successfully");

    if args.check_plugins {
        gst_utils::print_plugin_info(&gst_capabilities);
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => {
            info!("Configuration file: {:?}", path);
            StreamConfig::from_file(path).await?
        }
        None => StreamConfig::default(),
    };
    args.apply_to(&mut config);
    config.validate()?;

    let missing = gst_utils::missing_elements(config.with_streaming());
    if !missing.is_empty() {
        error!("Missing GStreamer elements: {:?}", missing);
        return Err(anyhow!(
            "required GStreamer elements are not installed: {}",
            missing.join(", ")
        ));
    }

    if config.with_streaming() {
        info!("Streaming to {}", config.streaming.ingest_server);
    } else {
        warn!("No API key provided, nothing will be streamed");
    }

    let mut stream = ThreeVideoStream::from_config(config);
    stream.set_ready_to_play(true)?;

    let pipeline = stream
        .pipeline()
        .cloned()
        .ok_or_else(|| anyhow!("pipeline was not built"))?;

    let signals = SignalHandler::new()?;
    let controller = LifecycleController::new(pipeline);

    if let Err(e) = controller.run(signals.into_receiver()).await {
        error!("Pipeline failed: {}", e);
        return Err(e.into());
    }

    info!("Shutdown complete");
    Ok(())
}
