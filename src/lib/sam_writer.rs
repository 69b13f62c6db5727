//! SAM text output for the emit stage.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use fgoxide::io::Io;

use crate::errors::{Result, SeqmapError};
use crate::record::MappingResult;
use crate::reference::{IO_BUFFER_SIZE, ReferenceIndex};
use crate::stages::RecordSink;
use crate::validation::validate_header_line;

/// SAM format version written to `@HD`.
pub const SAM_VERSION: &str = "1.6";

/// A parsed `@RG` header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadGroup {
    /// The full header line with tabs expanded.
    pub line: String,
    pub id: String,
}

/// Parses a read-group line given on the command line.
///
/// Literal `\t` sequences are turned into tabs. The line must be an `@RG` line
/// with an `ID:` field.
///
/// ```
/// use seqmap_lib::sam_writer::parse_read_group;
///
/// let rg = parse_read_group(r"@RG\tID:lane1\tSM:sample").unwrap();
/// assert_eq!(rg.id, "lane1");
/// assert_eq!(rg.line, "@RG\tID:lane1\tSM:sample");
/// ```
pub fn parse_read_group(arg: &str) -> Result<ReadGroup> {
    let line = arg.replace("\\t", "\t");
    let invalid = |reason: &str| SeqmapError::InvalidParameter {
        parameter: "read-group".to_string(),
        reason: format!("{reason}: '{arg}'"),
    };
    validate_header_line(&line, "read-group")?;

    let mut fields = line.split('\t');
    if fields.next() != Some("@RG") {
        return Err(invalid("Read group line must start with '@RG'"));
    }
    let id = fields
        .find_map(|field| field.strip_prefix("ID:"))
        .filter(|id| !id.is_empty())
        .ok_or_else(|| invalid("Read group line must contain a non-empty ID field"))?
        .to_string();
    Ok(ReadGroup { line, id })
}

/// Builds the SAM header text, one line per entry, each ending in a newline.
#[must_use]
pub fn build_header(
    index: &ReferenceIndex,
    read_group: Option<&ReadGroup>,
    extra_lines: &[String],
    version: &str,
    command_line: &str,
) -> String {
    let mut header = format!("@HD\tVN:{SAM_VERSION}\tSO:unsorted\n");
    for contig in index.contigs() {
        header.push_str(&format!("@SQ\tSN:{}\tLN:{}\n", contig.name, contig.len));
    }
    if let Some(rg) = read_group {
        header.push_str(&rg.line);
        header.push('\n');
    }
    for line in extra_lines {
        header.push_str(line);
        header.push('\n');
    }
    header.push_str(&format!("@PG\tID:seqmap\tPN:seqmap\tVN:{version}\tCL:{command_line}\n"));
    header
}

/// Buffered SAM writer to a file or standard output.
pub struct SamWriter {
    out: Box<dyn Write + Send>,
    path: Option<PathBuf>,
    records: u64,
}

impl std::fmt::Debug for SamWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SamWriter").field("path", &self.path).field("records", &self.records).finish()
    }
}

impl SamWriter {
    /// Opens `path` for writing, or standard output when `None`.
    pub fn create(path: Option<&Path>) -> Result<Self> {
        let out: Box<dyn Write + Send> = match path {
            Some(p) => {
                let writer = Io::new(5, IO_BUFFER_SIZE).new_writer(p).map_err(|e| {
                    SeqmapError::InvalidFileFormat {
                        file_type: "SAM".to_string(),
                        path: p.display().to_string(),
                        reason: e.to_string(),
                    }
                })?;
                Box::new(writer)
            }
            None => Box::new(BufWriter::with_capacity(IO_BUFFER_SIZE, std::io::stdout())),
        };
        Ok(Self::from_writer(out, path.map(Path::to_path_buf)))
    }

    /// Wraps an existing writer.
    pub fn from_writer(out: Box<dyn Write + Send>, path: Option<PathBuf>) -> Self {
        Self { out, path, records: 0 }
    }

    pub fn write_header(&mut self, header: &str) -> Result<()> {
        self.out.write_all(header.as_bytes())?;
        Ok(())
    }

    /// Records written so far.
    #[must_use]
    pub fn records(&self) -> u64 {
        self.records
    }
}

impl RecordSink for SamWriter {
    fn write(&mut self, result: &MappingResult) -> Result<()> {
        self.out.write_all(&result.line)?;
        self.out.write_all(b"\n")?;
        self.records += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}
