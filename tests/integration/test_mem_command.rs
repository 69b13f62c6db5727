//! End-to-end tests for the `mem` command.
//!
//! Reads are cut from a random reference at known positions, mapped with the
//! release binary and checked field by field in the SAM output.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use seqmap_lib::metrics::MappingMetrics;

use crate::helpers::{
    SamLine, random_sequence, read_sam, reverse_complement, run_seqmap, run_seqmap_ok,
    write_fasta, write_fastq,
};

const READ_LEN: usize = 100;

/// A two-contig reference written to a temporary directory.
struct Fixture {
    dir: TempDir,
    chr1: String,
    chr2: String,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let chr1 = random_sequence(1500, 1);
        let chr2 = random_sequence(800, 2);
        write_fasta(&dir.path().join("ref.fa"), &[("chr1", &chr1), ("chr2", &chr2)]);
        Self { dir, chr1, chr2 }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn reference(&self) -> String {
        self.path("ref.fa").display().to_string()
    }

    /// `count` single-end reads: `(header, seq, contig, zero-based start, reverse)`.
    fn single_reads(&self, count: usize) -> Vec<(String, String, &'static str, usize, bool)> {
        (0..count)
            .map(|i| {
                let (contig, seq) = if i % 4 == 3 { ("chr2", &self.chr2) } else { ("chr1", &self.chr1) };
                let start = (i * 53) % (seq.len() - READ_LEN);
                let mut read = seq[start..start + READ_LEN].to_string();
                let reverse = i % 2 == 1;
                if reverse {
                    read = reverse_complement(&read);
                }
                (format!("read{i}"), read, contig, start, reverse)
            })
            .collect()
    }

    fn write_single(&self, name: &str, count: usize) -> (PathBuf, Vec<(String, String, &'static str, usize, bool)>) {
        let reads = self.single_reads(count);
        let fastq: Vec<(String, String)> = reads.iter().map(|r| (r.0.clone(), r.1.clone())).collect();
        let path = self.path(name);
        write_fastq(&path, &fastq);
        (path, reads)
    }

    /// Read pairs from 300 bp templates on chr1: the first mate forward at the
    /// template start, the second reverse at its end.
    fn pairs(&self, count: usize) -> Vec<((String, String), (String, String), usize)> {
        (0..count)
            .map(|i| {
                let start = (i * 61) % (self.chr1.len() - 300);
                let first = self.chr1[start..start + READ_LEN].to_string();
                let second = reverse_complement(&self.chr1[start + 200..start + 300]);
                ((format!("pair{i}/1"), first), (format!("pair{i}/2"), second), start)
            })
            .collect()
    }
}

fn mem(fixture: &Fixture, extra: &[&str], inputs: &[&Path]) -> (Vec<String>, Vec<SamLine>) {
    let out = fixture.path("out.sam");
    let out_arg = out.display().to_string();
    let reference = fixture.reference();
    let input_args: Vec<String> = inputs.iter().map(|p| p.display().to_string()).collect();

    let mut args = vec!["mem", "-k", "15", "-T", "20", "-o", out_arg.as_str()];
    args.extend_from_slice(extra);
    args.push(reference.as_str());
    args.extend(input_args.iter().map(String::as_str));
    run_seqmap_ok(&args);
    read_sam(&out)
}

#[test]
fn test_single_end_mapping() {
    let fixture = Fixture::new();
    let (fastq, reads) = fixture.write_single("reads.fq", 24);
    let (header, records) = mem(&fixture, &[], &[&fastq]);

    assert_eq!(header[0], "@HD\tVN:1.6\tSO:unsorted");
    assert_eq!(header[1], "@SQ\tSN:chr1\tLN:1500");
    assert_eq!(header[2], "@SQ\tSN:chr2\tLN:800");
    assert!(header.last().unwrap().starts_with("@PG\tID:seqmap\tPN:seqmap"));

    assert_eq!(records.len(), reads.len());
    for (record, (name, _, contig, start, reverse)) in records.iter().zip(&reads) {
        assert_eq!(record.qname(), name);
        assert_eq!(record.rname(), *contig, "{name}");
        assert_eq!(record.pos(), *start as u64 + 1, "{name}");
        assert_eq!(record.flag(), if *reverse { 16 } else { 0 }, "{name}");
        assert_eq!(record.cigar(), "100M");
        assert_eq!(record.tag("NM"), Some("i:0"));
        assert_eq!(record.tag("AS"), Some("i:100"));
    }
}

#[test]
fn test_output_is_identical_across_worker_counts() {
    let fixture = Fixture::new();
    let (fastq, _) = fixture.write_single("reads.fq", 60);

    // A small chunk size gives many batches.
    let (_, baseline) = mem(&fixture, &["-K", "700", "--pipeline-workers", "1"], &[&fastq]);
    assert_eq!(baseline.len(), 60);
    for workers in ["2", "3", "5"] {
        let (_, records) =
            mem(&fixture, &["-K", "700", "-t", "2", "--pipeline-workers", workers], &[&fastq]);
        assert_eq!(records, baseline, "output differs with {workers} pipeline workers");
    }
}

#[test]
fn test_paired_end_mapping() {
    let fixture = Fixture::new();
    let pairs = fixture.pairs(10);
    let r1 = fixture.path("r1.fq");
    let r2 = fixture.path("r2.fq");
    write_fastq(&r1, &pairs.iter().map(|p| p.0.clone()).collect::<Vec<_>>());
    write_fastq(&r2, &pairs.iter().map(|p| p.1.clone()).collect::<Vec<_>>());

    let (_, records) = mem(&fixture, &["-K", "1000"], &[&r1, &r2]);
    assert_eq!(records.len(), 20);
    for (i, mates) in records.chunks(2).enumerate() {
        let start = pairs[i].2 as u64;
        let (first, second) = (&mates[0], &mates[1]);
        assert_eq!(first.qname(), format!("pair{i}"));
        assert_eq!(second.qname(), format!("pair{i}"));
        assert_eq!(first.flag(), 99);
        assert_eq!(second.flag(), 147);
        assert_eq!(first.pos(), start + 1);
        assert_eq!(second.pos(), start + 201);
        assert_eq!(first.fields[6], "=");
        assert_eq!(first.fields[7], second.fields[3]);
        assert_eq!(first.tlen(), 300);
        assert_eq!(second.tlen(), -300);
    }
}

#[test]
fn test_smart_pairing() {
    let fixture = Fixture::new();
    let pairs = fixture.pairs(3);
    let single = fixture.single_reads(2);

    // pair0, a lone read, pair1, a lone read, pair2
    let interleaved = vec![
        pairs[0].0.clone(),
        pairs[0].1.clone(),
        (single[0].0.clone(), single[0].1.clone()),
        pairs[1].0.clone(),
        pairs[1].1.clone(),
        (single[1].0.clone(), single[1].1.clone()),
        pairs[2].0.clone(),
        pairs[2].1.clone(),
    ];
    let fastq = fixture.path("interleaved.fq");
    write_fastq(&fastq, &interleaved);

    let (_, records) = mem(&fixture, &["-p"], &[&fastq]);
    let names: Vec<&str> = records.iter().map(SamLine::qname).collect();
    assert_eq!(names, ["pair0", "pair0", "read0", "pair1", "pair1", "read1", "pair2", "pair2"]);

    let flags: Vec<u16> = records.iter().map(SamLine::flag).collect();
    assert_eq!(flags, [99, 147, 0, 99, 147, 16, 99, 147]);
}

#[test]
fn test_smart_pairing_with_small_batches() {
    let fixture = Fixture::new();
    let pairs = fixture.pairs(8);
    let single = fixture.single_reads(2);

    let mut interleaved = Vec::new();
    for (i, (first, second, _)) in pairs.iter().enumerate() {
        interleaved.push(first.clone());
        interleaved.push(second.clone());
        if i == 2 || i == 5 {
            let lone = &single[i / 5];
            interleaved.push((lone.0.clone(), lone.1.clone()));
        }
    }
    let fastq = fixture.path("interleaved.fq");
    write_fastq(&fastq, &interleaved);

    let (_, baseline) = mem(&fixture, &["-p"], &[&fastq]);
    assert_eq!(baseline.len(), 18);

    // Budgets that end batches after one read of a 100 bp pair.
    for chunk in ["150", "250", "350"] {
        let (_, records) = mem(&fixture, &["-p", "-K", chunk, "--pipeline-workers", "3"], &[&fastq]);
        assert_eq!(records, baseline, "output differs with -K {chunk}");
    }

    let mates: Vec<&SamLine> = baseline.iter().filter(|r| r.qname().starts_with("pair")).collect();
    assert_eq!(mates.len(), 16);
    for pair in mates.chunks(2) {
        let (first, second) = (pair[0], pair[1]);
        assert_eq!(first.qname(), second.qname());
        assert_eq!((first.flag(), second.flag()), (99, 147), "{}", first.qname());
        assert_eq!(first.fields[6], "=");
        assert_eq!(first.fields[7], second.fields[3]);
        assert_eq!(second.fields[7], first.fields[3]);
        assert_eq!((first.tlen(), second.tlen()), (300, -300));
    }
    for lone in baseline.iter().filter(|r| r.qname().starts_with("read")) {
        assert_eq!(lone.flag() & 0x1, 0, "{}", lone.qname());
        assert_eq!(lone.tlen(), 0);
    }
}

#[test]
fn test_read_group_header_and_comments() {
    let fixture = Fixture::new();
    let fastq = fixture.path("reads.fq");
    let read = fixture.chr1[100..200].to_string();
    write_fastq(&fastq, &[("r1 BC:Z:ACGT".to_string(), read), ("r2".to_string(), "ACGT".repeat(3))]);

    let (header, records) = mem(
        &fixture,
        &["-R", r"@RG\tID:lane1\tSM:sample", "-H", "@CO\tmapped for testing", "-C"],
        &[&fastq],
    );
    assert!(header.contains(&"@RG\tID:lane1\tSM:sample".to_string()));
    assert!(header.contains(&"@CO\tmapped for testing".to_string()));

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].pos(), 101);
    assert_eq!(records[0].tag("RG"), Some("Z:lane1"));
    assert_eq!(records[0].fields.last().unwrap(), "BC:Z:ACGT");

    // Too short to seed: reported unmapped, still with its read group.
    assert_eq!(records[1].flag(), 4);
    assert_eq!(records[1].rname(), "*");
    assert_eq!(records[1].tag("RG"), Some("Z:lane1"));
}

#[test]
fn test_metrics_file() {
    let fixture = Fixture::new();
    let fastq = fixture.path("reads.fq");
    let mut reads: Vec<(String, String)> = fixture
        .single_reads(8)
        .into_iter()
        .map(|r| (r.0, r.1))
        .collect();
    reads.push(("junk".to_string(), "ACGT".repeat(25)));
    write_fastq(&fastq, &reads);

    let metrics_path = fixture.path("metrics.tsv");
    let metrics_arg = metrics_path.display().to_string();
    mem(&fixture, &["--metrics", metrics_arg.as_str()], &[&fastq]);

    let metrics: Vec<MappingMetrics> = fgoxide::io::DelimFile::default().read_tsv(&metrics_path).unwrap();
    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].total_reads, 9);
    assert_eq!(metrics[0].mapped_reads, 8);
    assert_eq!(metrics[0].total_bases, 900);
    assert!((metrics[0].fraction_mapped - 8.0 / 9.0).abs() < 1e-4);
}

#[test]
fn test_missing_reads_file_fails() {
    let fixture = Fixture::new();
    let missing = fixture.path("missing.fq").display().to_string();
    let output = run_seqmap(&["mem", fixture.reference().as_str(), missing.as_str()]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("does not exist"), "unexpected error: {stderr}");
}

#[test]
fn test_invalid_read_group_fails() {
    let fixture = Fixture::new();
    let (fastq, _) = fixture.write_single("reads.fq", 2);
    let fastq_arg = fastq.display().to_string();
    let output = run_seqmap(&["mem", "-R", "@RG\\tSM:x", fixture.reference().as_str(), fastq_arg.as_str()]);
    assert!(!output.status.success());
}
