// SPDX-License-Identifier: MIT OR Apache-2.0

//! Output rendering for the search response.

use anyhow::Result;
use colored::Colorize;
use serde_json::json;
use std::io::IsTerminal;

use crate::context::SearchResponse;

/// Output format for results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Files,
    Markdown,
    Mcp,
}

pub fn use_colors() -> bool {
    std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

/// Print the response in the requested format, plus a stats line on
/// stderr unless quieted.
pub fn render(response: &SearchResponse, format: OutputFormat, quiet: bool) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(response)?);
        }
        OutputFormat::Files => {
            for file in &response.files {
                println!("{}", file.path);
            }
        }
        OutputFormat::Markdown => render_markdown(response),
        OutputFormat::Mcp => {
            let envelope = json!({
                "content": [{
                    "type": "text",
                    "text": serde_json::to_string(response)?,
                }]
            });
            println!("{}", serde_json::to_string(&envelope)?);
        }
    }

    if !quiet {
        let stats = format!(
            "{} files scanned | {} returned | {}ms",
            response.metadata.total_scanned,
            response.metadata.files_returned,
            response.metadata.time_ms
        );
        if use_colors() {
            eprintln!("{}", stats.dimmed());
        } else {
            eprintln!("{stats}");
        }
    }

    Ok(())
}

fn render_markdown(response: &SearchResponse) {
    println!("## Results for \"{}\"", response.query);
    println!();
    println!(
        "Intent: **{}** (confidence {:.2})",
        response.intent.category, response.intent.confidence
    );
    println!();
    for file in &response.files {
        println!(
            "- `{}` — {:.1} ({})",
            file.path,
            file.relevance_score,
            file.match_reasons.join(", ")
        );
        for excerpt in &file.excerpts {
            println!("  - L{}: `{}`", excerpt.line, excerpt.content);
        }
    }
    if !response.warnings.is_empty() {
        println!();
        println!("### Warnings");
        for warning in &response.warnings {
            println!("- **{}**: {}", warning.kind, warning.message);
        }
    }
}
