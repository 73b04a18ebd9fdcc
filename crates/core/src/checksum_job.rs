//! Parsing of verification job output.

use crate::error::{Error, Result};

/// Separator between filename and checksum in checksum job output.
pub const CHECKSUM_SEPARATOR: &str = "##";

/// Parse one `filename##checksum` line.
pub fn parse_checksum_line(line: &str) -> Result<(String, String)> {
    let parts: Vec<&str> = line.trim().split(CHECKSUM_SEPARATOR).collect();
    match parts.as_slice() {
        [filename, checksum] if !filename.is_empty() && !checksum.is_empty() => {
            Ok((filename.to_string(), checksum.to_string()))
        }
        _ => Err(Error::ArgumentNotValid(format!(
            "checksum line '{line}' is not of the form filename{CHECKSUM_SEPARATOR}checksum"
        ))),
    }
}

/// Parse a full checksum job output. Blank lines are skipped.
pub fn parse_checksum_output(output: &str) -> Result<Vec<(String, String)>> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_checksum_line)
        .collect()
}

/// Parse a filelist job output: one filename per line, blank lines skipped.
pub fn parse_filelist_output(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
