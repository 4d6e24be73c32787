//! Tick report rendering.
//!
//! The text layout is the tool's scripting contract: labels and field order
//! are fixed. The JSON layout emits one object per line.

use serde::{Deserialize, Serialize};
use std::fmt::Write as FmtWrite;

use crate::aggregator::TierAggregate;
use crate::session::TickReport;

/// Report output formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn format_limit(agg: &TierAggregate) -> String {
    if agg.is_unlimited() {
        "no explicit limit".to_string()
    } else {
        format!("{:.2} Mbps", agg.bandwidth_limit_mbps)
    }
}

/// Renders a tick as the fixed-label text block.
pub fn render_text(report: &TickReport) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "\nTraffic Statistics (tick {}):", report.tick);
    let _ = writeln!(out, "------------------");
    if report.aggregates.is_empty() {
        let _ = writeln!(out, "\nNo classified traffic");
    }
    for agg in &report.aggregates {
        let _ = writeln!(out, "\n{} Priority", agg.tier);
        let _ = writeln!(out, "  Policies: {}", agg.policies);
        let _ = writeln!(out, "  Bytes: {}", agg.bytes);
        let _ = writeln!(out, "  Bandwidth Limit: {}", format_limit(agg));
    }

    let _ = writeln!(out, "\nInterface Statistics ({}):", report.interface);
    let _ = writeln!(out, "  Input Bytes: {}", report.interface_sample.input_bytes);
    let _ = writeln!(out, "  Output Bytes: {}", report.interface_sample.output_bytes);

    if let Some(shares) = &report.shares {
        let _ = writeln!(out, "\nBandwidth Allocation:");
        for share in shares {
            let _ = writeln!(out, "  {}: {:.2}%", share.tier, share.percent);
        }
    }

    out
}

/// Renders a tick as a single line of JSON.
pub fn render_json(report: &TickReport) -> Result<String, serde_json::Error> {
    serde_json::to_string(report)
}

/// Renders a tick in the requested format.
pub fn render(report: &TickReport, format: OutputFormat) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Text => Ok(render_text(report)),
        OutputFormat::Json => render_json(report),
    }
}
