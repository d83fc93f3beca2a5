//! CLI command implementations

use crate::output::{self, OutputFormat};
use anyhow::{anyhow, bail, Context};
use kino_renderer::{
    select_variants, BuildOutcome, BuildRequest, DeviceCapabilities, DisplayContext,
    HlsManifestFetcher, ManifestFetcher, PipelineEvent, RendererBuilder, TextMode,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_USER_AGENT: &str = concat!("kino-cli/", env!("CARGO_PKG_VERSION"));

/// Parse `WIDTHxHEIGHT`
pub fn parse_display(value: &str, fixed_orientation: bool) -> anyhow::Result<DisplayContext> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| anyhow!("display must look like 1920x1080, got '{}'", value))?;
    let width: u32 = width.trim().parse().context("display width")?;
    let height: u32 = height.trim().parse().context("display height")?;
    if width == 0 || height == 0 {
        bail!("display dimensions must be positive");
    }

    let mut display = DisplayContext::new(width, height);
    display.orientation_may_change = !fixed_orientation;
    Ok(display)
}

#[derive(Serialize)]
struct Analysis {
    url: String,
    master: bool,
    variants: usize,
    subtitles: Vec<String>,
    enabled_variants: Option<Vec<usize>>,
    text_mode: TextMode,
}

/// Analyze a manifest
pub async fn analyze(
    manifest_url: &str,
    user_agent: &str,
    display: DisplayContext,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let url = Url::parse(manifest_url)?;
    let fetcher = HlsManifestFetcher::new()?;
    let manifest = fetcher.fetch(&url, user_agent).await?;

    let capabilities = DeviceCapabilities::default();
    let selection = select_variants(&manifest, &capabilities, &display)?;
    let enabled = selection.as_ref().map(|s| s.indices().to_vec());

    let analysis = Analysis {
        url: url.to_string(),
        master: manifest.is_master(),
        variants: manifest.variants().len(),
        subtitles: manifest
            .subtitles()
            .iter()
            .map(|s| match &s.language {
                Some(language) => format!("{} ({})", s.name, language),
                None => s.name.clone(),
            })
            .collect(),
        enabled_variants: enabled.clone(),
        text_mode: TextMode::for_manifest(&manifest),
    };

    if format == OutputFormat::Json {
        println!("{}", output::to_json(&analysis));
        return Ok(());
    }

    println!("Manifest Analysis: {}", analysis.url);
    println!("  Type: {}", if analysis.master { "master" } else { "media" });
    println!("  Display: {}x{}", display.width, display.height);
    println!("  Text: {}", analysis.text_mode);

    if manifest.is_master() {
        let enabled = enabled.unwrap_or_default();
        println!("\nVariants:");
        if format == OutputFormat::Table {
            println!("{}", output::variant_table(manifest.variants(), &enabled));
        } else {
            for (i, v) in manifest.variants().iter().enumerate() {
                println!(
                    "  {}{}. {} {:?} {}",
                    if enabled.contains(&i) { "*" } else { " " },
                    i,
                    output::format_bitrate(v.bandwidth),
                    v.resolution,
                    v.codecs.as_deref().unwrap_or("-"),
                );
            }
        }
    }

    if !analysis.subtitles.is_empty() {
        println!("\nSubtitles:");
        for s in &analysis.subtitles {
            println!("  - {}", s);
        }
    }

    Ok(())
}

/// Options for `build`
pub struct BuildOptions {
    pub user_agent: String,
    pub max_bitrate: Option<u64>,
    pub display: DisplayContext,
    pub segment_size: usize,
    pub segments: usize,
    pub text_segments: usize,
    pub timeout: Duration,
}

/// Build the renderer set for a stream
pub async fn build(
    manifest_url: &str,
    options: BuildOptions,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let url = Url::parse(manifest_url)?;

    let builder = RendererBuilder::new(
        Arc::new(HlsManifestFetcher::new()?),
        Arc::new(DeviceCapabilities::default()),
    )?
    .with_display(options.display);

    if let Some(bitrate) = options.max_bitrate {
        builder.set_bitrate_ceiling(bitrate);
    }

    let mut events = builder.subscribe();
    let log_events = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match &event {
                PipelineEvent::BuildStarted { url, .. } => info!(%url, "Build started"),
                other => debug!(event = ?other, "Pipeline event"),
            }
        }
    });

    let request = BuildRequest::new(url, options.user_agent)
        .with_buffer_segments(options.segment_size, options.segments)
        .with_text_segments(options.text_segments);

    let (tx, rx) = oneshot::channel();
    let handle = builder.start_build(request, tx);

    let outcome = match tokio::time::timeout(options.timeout, rx).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(_)) => bail!("build {} ended without a result", handle.id()),
        Err(_) => {
            builder.cancel_build(&handle);
            bail!("build {} timed out after {:?}", handle.id(), options.timeout);
        }
    };
    log_events.abort();

    match outcome {
        BuildOutcome::Delivered { renderers, .. } => {
            let summary = renderers.summary();
            match format {
                OutputFormat::Json => println!("{}", output::to_json(&summary)),
                OutputFormat::Text | OutputFormat::Table => {
                    println!("Renderers built for build {}", handle.id());
                    print!("{}", output::summary_text(&summary));
                }
            }
            Ok(())
        }
        BuildOutcome::Failed(e) => Err(anyhow!("[{}] {}", e.error_code(), e)),
    }
}
