//! Corpus cleaner.
//!
//! Strips markdown bold markers (`**`) and drops lines that consist only of
//! `-`/`=` separator characters (longer than [`MIN_SEPARATOR_LEN`]) before
//! the profile text is chunked and indexed. The input file is never modified.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Separator-only lines at or below this length are kept.
pub const MIN_SEPARATOR_LEN: usize = 5;

const BOLD_MARKER: &str = "**";

/// Clean a corpus string line by line, preserving line endings of kept lines.
pub fn clean_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());

    for line in input.split_inclusive('\n') {
        let line = line.replace(BOLD_MARKER, "");
        if is_separator_line(&line) {
            continue;
        }
        out.push_str(&line);
    }

    out
}

fn is_separator_line(line: &str) -> bool {
    let stripped = line.trim();
    stripped.chars().count() > MIN_SEPARATOR_LEN && stripped.chars().all(|c| c == '-' || c == '=')
}

/// Default output path for a cleaned corpus: `<stem>_cleaned.txt` beside the input.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().replace(' ', "_"))
        .unwrap_or_else(|| "corpus".to_string());
    input.with_file_name(format!("{}_cleaned.txt", stem))
}

/// Read `input`, clean it, and write the result to `output`.
///
/// Returns `(lines_in, lines_out)`.
pub fn clean_file(input: &Path, output: &Path) -> Result<(usize, usize)> {
    let raw = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read corpus file: {}", input.display()))?;

    let cleaned = clean_text(&raw);

    std::fs::write(output, &cleaned)
        .with_context(|| format!("Failed to write cleaned corpus: {}", output.display()))?;

    Ok((raw.lines().count(), cleaned.lines().count()))
}

/// `folio clean`: clean `input` into `output` (or the default path) and
/// report line counts.
pub fn run_clean(input: &Path, output: Option<&Path>) -> Result<()> {
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output_path(input));
    let (lines_in, lines_out) = clean_file(input, &output)?;

    println!(
        "Cleaned {} → {} ({} lines in, {} lines out)",
        input.display(),
        output.display(),
        lines_in,
        lines_out
    );
    Ok(())
}
