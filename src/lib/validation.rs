//! Input validation utilities
//!
//! Common checks for command-line parameters and file paths, reported through
//! the structured error types in [`crate::errors`].

use crate::errors::{Result, SeqmapError};
use std::fmt::Display;
use std::ops::RangeInclusive;
use std::path::Path;

/// Validate that a file exists
///
/// # Example
/// ```
/// use seqmap_lib::validation::validate_file_exists;
///
/// let result = validate_file_exists("/nonexistent/reads.fq", "Input FASTQ");
/// assert!(result.is_err());
/// ```
pub fn validate_file_exists<P: AsRef<Path>>(path: P, description: &str) -> Result<()> {
    let path_ref = path.as_ref();
    if !path_ref.exists() {
        return Err(SeqmapError::InvalidFileFormat {
            file_type: description.to_string(),
            path: path_ref.display().to_string(),
            reason: "File does not exist".to_string(),
        });
    }
    Ok(())
}

/// Validate that multiple files exist, failing on the first that doesn't
pub fn validate_files_exist<P: AsRef<Path>>(files: &[(P, &str)]) -> Result<()> {
    for (path, desc) in files {
        validate_file_exists(path, desc)?;
    }
    Ok(())
}

/// Validate that a value is positive (> 0)
///
/// # Example
/// ```
/// use seqmap_lib::validation::validate_positive;
///
/// validate_positive(2, "pipeline-workers").unwrap();
/// assert!(validate_positive(0, "pipeline-workers").is_err());
/// ```
#[allow(clippy::needless_pass_by_value)]
pub fn validate_positive<T: Ord + Display + Default>(value: T, name: &str) -> Result<()> {
    if value <= T::default() {
        return Err(SeqmapError::InvalidParameter {
            parameter: name.to_string(),
            reason: format!("Must be positive (> 0), got: {value}"),
        });
    }
    Ok(())
}

/// Validate that a value lies within an inclusive range
pub fn validate_in_range<T: PartialOrd + Display>(
    value: T,
    range: RangeInclusive<T>,
    name: &str,
) -> Result<()> {
    if !range.contains(&value) {
        return Err(SeqmapError::InvalidParameter {
            parameter: name.to_string(),
            reason: format!(
                "Must be between {} and {}, got: {value}",
                range.start(),
                range.end()
            ),
        });
    }
    Ok(())
}

/// Validate a user-supplied SAM header line
///
/// The line must start with `@` followed by a two-letter record type and must
/// not span multiple lines.
pub fn validate_header_line(line: &str, name: &str) -> Result<()> {
    let invalid = |reason: &str| SeqmapError::InvalidParameter {
        parameter: name.to_string(),
        reason: format!("{reason}: '{line}'"),
    };
    let bytes = line.as_bytes();
    if bytes.len() < 3 || bytes[0] != b'@' || !bytes[1..3].iter().all(u8::is_ascii_alphabetic) {
        return Err(invalid("Header lines must start with '@' and a two-letter record type"));
    }
    if line.contains('\n') {
        return Err(invalid("Header lines must not contain newlines"));
    }
    Ok(())
}
