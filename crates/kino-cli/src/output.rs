//! Output formatting for CLI

use kino_renderer::{BuildSummary, Variant};
use serde::Serialize;
use tabled::{Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Table,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "table" => OutputFormat::Table,
            _ => OutputFormat::Text,
        }
    }
}

/// Pretty JSON, falling back to an empty object
pub fn to_json<T: Serialize>(data: &T) -> String {
    serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string())
}

#[derive(Tabled)]
struct VariantRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Bandwidth")]
    bandwidth: String,
    #[tabled(rename = "Resolution")]
    resolution: String,
    #[tabled(rename = "Codecs")]
    codecs: String,
    #[tabled(rename = "Enabled")]
    enabled: &'static str,
}

/// Variant listing marking which indices the device enabled
pub fn variant_table(variants: &[Variant], enabled: &[usize]) -> String {
    let rows = variants.iter().enumerate().map(|(i, v)| VariantRow {
        index: i,
        bandwidth: format_bitrate(v.bandwidth),
        resolution: v
            .resolution
            .map(|r| format!("{}x{} ({})", r.width, r.height, r.quality_name()))
            .unwrap_or_else(|| "-".to_string()),
        codecs: v.codecs.clone().unwrap_or_else(|| "-".to_string()),
        enabled: if enabled.contains(&i) { "yes" } else { "no" },
    });
    Table::new(rows).to_string()
}

/// Plain text rendering of a delivered build
pub fn summary_text(summary: &BuildSummary) -> String {
    let mut out = String::new();
    out.push_str(&format!("  Master playlist: {}\n", summary.master));
    out.push_str(&format!("  Enabled variants: {:?}\n", summary.enabled_variants));
    out.push_str(&format!(
        "  Initial variant: {}\n",
        summary
            .initial_variant
            .map(|i| i.to_string())
            .unwrap_or_else(|| "-".to_string())
    ));
    out.push_str(&format!(
        "  Text: {} ({})\n",
        summary.text_mode, summary.text_format
    ));
    out.push_str(&format!(
        "  Primary buffer: {}\n",
        format_bytes(summary.primary_buffer_bytes)
    ));
    if summary.text_buffer_bytes > 0 {
        out.push_str(&format!(
            "  Text buffer: {}\n",
            format_bytes(summary.text_buffer_bytes)
        ));
    }
    out.push_str(&format!(
        "  Bitrate ceiling: {}\n",
        if summary.bitrate_ceiling == kino_renderer::UNLIMITED_BITRATE {
            "unlimited".to_string()
        } else {
            format_bitrate(summary.bitrate_ceiling)
        }
    ));
    out
}

pub fn format_bitrate(bps: u64) -> String {
    if bps >= 1_000_000 {
        format!("{:.1} Mbps", bps as f64 / 1_000_000.0)
    } else {
        format!("{} kbps", bps / 1000)
    }
}

fn format_bytes(bytes: usize) -> String {
    const MIB: usize = 1024 * 1024;
    if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else {
        format!("{} KiB", bytes / 1024)
    }
}
