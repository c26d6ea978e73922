//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Check
//!
//! ```text
//! Documents
//! 001 Home
//!     Source: Home.md
//! 002 Daily Log
//!     Source: notes/Daily Log.md
//!
//! Broken references
//!     Home.md → notes/Missing.md
//!
//! 2 documents, 3 links, 1 broken reference
//! ```
//!
//! ## Build
//!
//! ```text
//! Pages: 2 rendered, 1 unchanged (3 total)
//! Files: 4 written, 3 unchanged
//! Links: 12 resolved, 1 unresolved
//! Media: 2 copied, 0 inlined
//! Deleted
//!     notes/Old.html
//!
//! warning  Unresolved link
//!     notes/A.md: no document matches "Nowhere"
//!
//! Export finished with 1 warning, 0 errors
//! ```
//!
//! A build stopped by an unusable renderer prints only its log:
//!
//! ```text
//! fatal    Renderer unavailable
//!     Renderer unavailable: surface never attached
//!
//! Export stopped with 0 warnings, 0 errors, 1 fatal
//! ```
//!
//! # Architecture
//!
//! Each report has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::log::{ExportLog, Severity};
use crate::vault::Vault;
use crate::website::{BuildOutcome, BuildReport};

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

// ============================================================================
// Check output
// ============================================================================

/// Format the scanned vault: documents, then broken references.
pub fn format_check_output(vault: &Vault) -> Vec<String> {
    use crate::index::LinkIndex;

    let mut lines = vec!["Documents".to_string()];
    for (i, document) in vault.documents.iter().enumerate() {
        lines.push(format!("{} {}", format_index(i + 1), document.title()));
        lines.push(format!("{}Source: {}", indent(1), document.key()));
    }

    let broken = vault.index.broken_references();
    if !broken.is_empty() {
        lines.push(String::new());
        lines.push("Broken references".to_string());
        for reference in broken {
            lines.push(format!(
                "{}{} → {}",
                indent(1),
                reference.source,
                reference.target
            ));
        }
    }

    lines.push(String::new());
    lines.push(format!(
        "{}, {}, {}",
        plural(vault.documents.len(), "document"),
        plural(vault.index.all_internal_links().len(), "link"),
        plural(broken.len(), "broken reference"),
    ));
    lines
}

pub fn print_check_output(vault: &Vault) {
    for line in format_check_output(vault) {
        println!("{}", line);
    }
}

// ============================================================================
// Build output
// ============================================================================

/// Format log entries at or above `threshold`, one header line per entry.
pub fn format_log(log: &ExportLog, threshold: Severity) -> Vec<String> {
    let mut lines = Vec::new();
    for entry in log.visible(threshold) {
        lines.push(format!("{:<8} {}", entry.severity.to_string(), entry.title));
        for message_line in entry.message.lines() {
            lines.push(format!("{}{}", indent(1), message_line));
        }
    }
    lines
}

/// Format the end-of-build summary.
pub fn format_build_summary(outcome: &BuildOutcome, threshold: Severity) -> Vec<String> {
    let report = outcome.report();
    let mut lines = vec![
        format!("Pages: {}", report.incremental),
        format!(
            "Files: {} written, {} unchanged",
            report.written, report.unchanged
        ),
        format!(
            "Links: {} resolved, {} unresolved",
            report.links.resolved, report.links.unresolved
        ),
        format!(
            "Media: {} copied, {} inlined",
            report.media.outlined, report.media.inlined
        ),
    ];
    if report.placeholders > 0 {
        lines.push(format!(
            "Placeholders: {}",
            plural(report.placeholders, "page")
        ));
    }
    if report.failed > 0 {
        lines.push(format!("Failed: {}", plural(report.failed, "page")));
    }
    if report.write_failures > 0 {
        lines.push(format!("Write failures: {}", report.write_failures));
    }
    if !report.deleted.is_empty() {
        lines.push("Deleted".to_string());
        for path in &report.deleted {
            lines.push(format!("{}{}", indent(1), path));
        }
    }

    let log_lines = format_log(&report.log, threshold);
    if !log_lines.is_empty() {
        lines.push(String::new());
        lines.extend(log_lines);
    }

    lines.push(String::new());
    let verb = if outcome.is_cancelled() {
        "Export cancelled"
    } else {
        "Export finished"
    };
    lines.push(format!("{verb} with {}", report.log.summary()));
    lines
}

pub fn print_build_summary(outcome: &BuildOutcome, threshold: Severity) {
    for line in format_build_summary(outcome, threshold) {
        println!("{}", line);
    }
}

/// Format what a build logged before it was stopped.
pub fn format_aborted_build(report: &BuildReport, threshold: Severity) -> Vec<String> {
    let mut lines = format_log(&report.log, threshold);
    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(format!("Export stopped with {}", report.log.summary()));
    lines
}

pub fn print_aborted_build(report: &BuildReport, threshold: Severity) {
    for line in format_aborted_build(report, threshold) {
        eprintln!("{}", line);
    }
}
