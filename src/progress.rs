//! Progress reporting for the tenant walker
//!
//! Provides real-time progress display using indicatif progress bars.

use crate::sink::{SinkStats, Stream};
use crate::walker::{Phase, WalkOutcome, WalkProgress, WalkResult};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

/// Progress reporter that displays walk status
///
/// Clones share the same spinner.
#[derive(Clone)]
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        bar.set_style(style);

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update the progress display
    pub fn update(&self, progress: &WalkProgress) {
        let msg = match progress.phase {
            Phase::Resolving => format!(
                "Resolving seeds: {}/{}",
                format_number(progress.phase_processed),
                format_number(progress.phase_total),
            ),
            Phase::Done => "Flushing output...".to_string(),
            Phase::Users | Phase::Groups => format!(
                "Wave {} | {}: {}/{} | Queued: {} users, {} groups | Found: {} users, {} groups, {} roles | Errors: {}",
                progress.wave,
                progress.phase.label(),
                format_number(progress.phase_processed),
                format_number(progress.phase_total),
                format_number(progress.user_frontier as u64),
                format_number(progress.group_frontier as u64),
                format_number(progress.stats.users_recorded),
                format_number(progress.stats.groups_recorded),
                format_number(progress.stats.roles_recorded),
                format_number(progress.stats.errors),
            ),
        };

        self.bar.set_message(msg);
    }

    /// Set a status message
    pub fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_string());
    }

    /// Finish the progress display with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    /// Finish and clear the progress display
    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a number with thousands separators
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| {
            chunk
                .iter()
                .rev()
                .map(|&b| b as char)
                .collect::<String>()
        })
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// Print a summary of the walk results
pub fn print_summary(result: &WalkResult, rows: &SinkStats, output_dir: &Path) {
    let stats = &result.stats;
    let duration_secs = result.duration.as_secs_f64();
    let rate = if duration_secs > 0.0 {
        (stats.users_expanded + stats.groups_expanded) as f64 / duration_secs
    } else {
        0.0
    };

    let title = match result.outcome {
        WalkOutcome::Completed => style("Walk Complete").green().bold(),
        WalkOutcome::Interrupted => style("Walk Interrupted").yellow().bold(),
        WalkOutcome::NoSeedsResolved => style("No Seed Resolved").red().bold(),
    };

    println!();
    println!("{}", title);
    println!("{}", style("─".repeat(50)).dim());
    println!(
        "  {} {} ({} failed)",
        style("Seeds:").bold(),
        format_number(stats.seeds_resolved),
        format_number(stats.seeds_failed)
    );
    println!("  {} {}", style("Waves:").bold(), format_number(stats.waves));
    for stream in Stream::ALL {
        if stream == Stream::Errors {
            continue;
        }
        println!(
            "  {} {}",
            style(format!("{}:", stream.name())).bold(),
            format_number(rows.rows(stream))
        );
    }
    println!(
        "  {} {:.1}s ({:.0} expansions/sec)",
        style("Duration:").bold(),
        duration_secs,
        rate
    );
    if stats.errors > 0 {
        println!(
            "  {} {}",
            style("Errors:").yellow().bold(),
            format_number(stats.errors)
        );
    }
    if stats.throttled > 0 {
        println!(
            "  {} {}",
            style("Throttled:").yellow().bold(),
            format_number(stats.throttled)
        );
    }
    if stats.anomalies > 0 {
        println!(
            "  {} {}",
            style("Unknown memberships:").yellow().bold(),
            format_number(stats.anomalies)
        );
    }
    println!("  {} {}", style("Output:").bold(), output_dir.display());
    println!();
}

/// Print a header at the start of the walk
pub fn print_header(tenant: &str, seeds: usize, workers: usize, output: &str) {
    println!();
    println!(
        "{} {}",
        style("tenant-walker").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Tenant:").bold(), tenant);
    println!("  {} {}", style("Seeds:").bold(), seeds);
    println!("  {} {}", style("Workers:").bold(), workers);
    println!("  {} {}", style("Output:").bold(), output);
    println!();
}
