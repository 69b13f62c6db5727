//! SAM text records for mapped and unmapped reads.

use seqmap_dna::reverse_complement;

use crate::arena::AlignmentRegion;
use crate::record::{MappingResult, ReadRecord};
use crate::reference::ReferenceIndex;

/// SAM flag bits written by the mapper.
pub mod flags {
    pub const PAIRED: u16 = 0x1;
    pub const PROPER_PAIR: u16 = 0x2;
    pub const UNMAPPED: u16 = 0x4;
    pub const MATE_UNMAPPED: u16 = 0x8;
    pub const REVERSE: u16 = 0x10;
    pub const MATE_REVERSE: u16 = 0x20;
    pub const FIRST_SEGMENT: u16 = 0x40;
    pub const LAST_SEGMENT: u16 = 0x80;
}

/// Highest mapping quality reported.
pub const MAX_MAPQ: u8 = 60;

/// Output options that affect every record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SamOptions {
    /// Append the FASTQ comment to each record verbatim.
    pub copy_comment: bool,
    /// Read group written as `RG:Z:` on every record.
    pub read_group_id: Option<String>,
}

/// A mapped alignment in contig coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    pub contig: usize,
    /// Zero-based start on the contig.
    pub pos: u64,
    pub reverse: bool,
    pub query_start: u32,
    pub query_end: u32,
    pub score: i32,
    pub second_score: i32,
    pub mismatches: u32,
}

impl Hit {
    /// Converts a mapped region to contig coordinates, `None` if it is unmapped.
    #[must_use]
    pub fn from_region(index: &ReferenceIndex, region: &AlignmentRegion) -> Option<Self> {
        if !region.mapped {
            return None;
        }
        let contig = index.locate(region.ref_start)?;
        Some(Self {
            contig,
            pos: region.ref_start - index.contigs()[contig].offset,
            reverse: region.reverse,
            query_start: region.query_start,
            query_end: region.query_end,
            score: region.score,
            second_score: region.second_score,
            mismatches: region.mismatches,
        })
    }

    /// Zero-based exclusive end on the contig.
    #[must_use]
    pub fn end(&self) -> u64 {
        self.pos + u64::from(self.query_end - self.query_start)
    }

    #[must_use]
    pub fn mapq(&self) -> u8 {
        mapping_quality(self.score, self.second_score)
    }
}

/// Mapping quality from the gap between the best and second-best scores.
#[must_use]
pub fn mapping_quality(score: i32, second_score: i32) -> u8 {
    if score <= 0 {
        return 0;
    }
    let second = second_score.clamp(0, score);
    let q = (f64::from(score - second) / f64::from(score) * f64::from(MAX_MAPQ)).round();
    q.clamp(0.0, f64::from(MAX_MAPQ)) as u8
}

/// Soft-clip/match CIGAR for an ungapped alignment of a `read_len` read.
#[must_use]
pub fn cigar(read_len: usize, query_start: u32, query_end: u32) -> String {
    let mut out = String::new();
    if query_start > 0 {
        out.push_str(&format!("{query_start}S"));
    }
    out.push_str(&format!("{}M", query_end - query_start));
    let tail = read_len.saturating_sub(query_end as usize);
    if tail > 0 {
        out.push_str(&format!("{tail}S"));
    }
    out
}

/// Observed template length for two hits, signed for `this`.
#[must_use]
pub fn template_length(this: &Hit, mate: &Hit, this_is_first: bool) -> i64 {
    if this.contig != mate.contig {
        return 0;
    }
    let start = this.pos.min(mate.pos);
    let end = this.end().max(mate.end());
    let len = (end - start) as i64;
    let leftmost = this.pos < mate.pos || (this.pos == mate.pos && this_is_first);
    if leftmost { len } else { -len }
}

/// Whether two hits form an inward-facing (FR) pair within `max_insert`.
///
/// The forward mate must not start after the reverse mate.
#[must_use]
pub fn is_proper_pair(first: &Hit, second: &Hit, max_insert: u64) -> bool {
    if first.contig != second.contig || first.reverse == second.reverse {
        return false;
    }
    let (forward, reverse) = if first.reverse { (second, first) } else { (first, second) };
    forward.pos <= reverse.pos && template_length(first, second, true).unsigned_abs() <= max_insert
}

/// Formats a read without a mate.
#[must_use]
pub fn format_single(
    record: &ReadRecord,
    hit: Option<&Hit>,
    index: &ReferenceIndex,
    options: &SamOptions,
) -> MappingResult {
    let mut flag = 0;
    match hit {
        Some(h) if h.reverse => flag |= flags::REVERSE,
        Some(_) => {}
        None => flag |= flags::UNMAPPED,
    }
    let line = write_line(record, flag, hit, None, 0, index, options);
    MappingResult { line, mapped: hit.is_some(), paired: false, proper_pair: false }
}

/// Formats both mates of a pair.
#[must_use]
pub fn format_pair(
    first: &ReadRecord,
    first_hit: Option<&Hit>,
    second: &ReadRecord,
    second_hit: Option<&Hit>,
    index: &ReferenceIndex,
    options: &SamOptions,
    max_insert: u64,
) -> (MappingResult, MappingResult) {
    let proper = match (first_hit, second_hit) {
        (Some(a), Some(b)) => is_proper_pair(a, b, max_insert),
        _ => false,
    };
    let r1 = format_mate(first, first_hit, second_hit, true, proper, index, options);
    let r2 = format_mate(second, second_hit, first_hit, false, proper, index, options);
    (r1, r2)
}

fn format_mate(
    record: &ReadRecord,
    hit: Option<&Hit>,
    mate: Option<&Hit>,
    is_first: bool,
    proper: bool,
    index: &ReferenceIndex,
    options: &SamOptions,
) -> MappingResult {
    let mut flag = flags::PAIRED;
    flag |= if is_first { flags::FIRST_SEGMENT } else { flags::LAST_SEGMENT };
    if proper {
        flag |= flags::PROPER_PAIR;
    }
    match hit {
        Some(h) if h.reverse => flag |= flags::REVERSE,
        Some(_) => {}
        None => flag |= flags::UNMAPPED,
    }
    match mate {
        Some(m) if m.reverse => flag |= flags::MATE_REVERSE,
        Some(_) => {}
        None => flag |= flags::MATE_UNMAPPED,
    }
    let tlen = match (hit, mate) {
        (Some(h), Some(m)) => template_length(h, m, is_first),
        _ => 0,
    };

    // An unmapped mate is placed at its partner's position; a mapped read with
    // an unmapped partner points at itself.
    let mate_pos = mate.or(hit);
    let line = write_line(record, flag, hit, mate_pos, tlen, index, options);
    MappingResult { line, mapped: hit.is_some(), paired: true, proper_pair: proper }
}

fn write_line(
    record: &ReadRecord,
    flag: u16,
    hit: Option<&Hit>,
    mate: Option<&Hit>,
    tlen: i64,
    index: &ReferenceIndex,
    options: &SamOptions,
) -> Vec<u8> {
    let contig_name = |i: usize| index.contigs()[i].name.as_str();
    let placed = hit.or(mate);

    let mut line = Vec::with_capacity(record.name.len() + 2 * record.len() + 128);
    line.extend_from_slice(&record.name);
    let (rname, pos) = placed.map_or(("*", 0), |h| (contig_name(h.contig), h.pos + 1));
    let (mapq, cigar_str) = match hit {
        Some(h) => (h.mapq(), cigar(record.len(), h.query_start, h.query_end)),
        None => (0, "*".to_string()),
    };
    let (rnext, pnext) = match (placed, mate) {
        (Some(p), Some(m)) if p.contig == m.contig => ("=", m.pos + 1),
        (_, Some(m)) => (contig_name(m.contig), m.pos + 1),
        _ => ("*", 0),
    };
    line.extend_from_slice(
        format!("\t{flag}\t{rname}\t{pos}\t{mapq}\t{cigar_str}\t{rnext}\t{pnext}\t{tlen}\t").as_bytes(),
    );

    let reverse = hit.is_some_and(|h| h.reverse);
    if record.is_empty() {
        line.push(b'*');
    } else if reverse {
        line.extend(reverse_complement(&record.seq));
    } else {
        line.extend_from_slice(&record.seq);
    }
    line.push(b'\t');
    if record.qual.is_empty() {
        line.push(b'*');
    } else if reverse {
        line.extend(record.qual.iter().rev());
    } else {
        line.extend_from_slice(&record.qual);
    }

    if let Some(h) = hit {
        line.extend_from_slice(
            format!("\tNM:i:{}\tAS:i:{}\tXS:i:{}", h.mismatches, h.score, h.second_score).as_bytes(),
        );
    }
    if let Some(rg) = &options.read_group_id {
        line.extend_from_slice(format!("\tRG:Z:{rg}").as_bytes());
    }
    if options.copy_comment {
        if let Some(comment) = record.comment.as_deref().filter(|c| !c.is_empty()) {
            line.push(b'\t');
            line.extend_from_slice(comment);
        }
    }
    line
}
