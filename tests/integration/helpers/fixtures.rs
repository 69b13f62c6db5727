//! Reference, FASTQ and SAM fixtures.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A uniformly random `ACGT` sequence, reproducible from `seed`.
pub fn random_sequence(len: usize, seed: u64) -> String {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| b"ACGT"[rng.random_range(0..4)] as char).collect()
}

pub fn reverse_complement(seq: &str) -> String {
    seq.bytes()
        .rev()
        .map(|b| match b {
            b'A' => 'T',
            b'C' => 'G',
            b'G' => 'C',
            b'T' => 'A',
            _ => 'N',
        })
        .collect()
}

/// Writes `(name, sequence)` pairs as FASTA with 60 bases per line.
pub fn write_fasta(path: &Path, contigs: &[(&str, &str)]) {
    let mut file = File::create(path).expect("Failed to create FASTA");
    for (name, seq) in contigs {
        writeln!(file, ">{name}").unwrap();
        for line in seq.as_bytes().chunks(60) {
            file.write_all(line).unwrap();
            file.write_all(b"\n").unwrap();
        }
    }
}

/// Writes `(header, sequence)` pairs as FASTQ with constant quality `I`.
pub fn write_fastq(path: &Path, reads: &[(String, String)]) {
    let mut file = File::create(path).expect("Failed to create FASTQ");
    for (header, seq) in reads {
        writeln!(file, "@{header}\n{seq}\n+\n{}", "I".repeat(seq.len())).unwrap();
    }
}

/// Runs the seqmap binary with `args`.
pub fn run_seqmap(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_seqmap"))
        .args(args)
        .output()
        .expect("Failed to run seqmap")
}

/// Runs seqmap and panics with its stderr if it fails.
pub fn run_seqmap_ok(args: &[&str]) -> Output {
    let output = run_seqmap(args);
    assert!(
        output.status.success(),
        "seqmap {} failed: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr)
    );
    output
}

/// A SAM alignment line split into its tab-separated fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamLine {
    pub fields: Vec<String>,
}

impl SamLine {
    pub fn qname(&self) -> &str {
        &self.fields[0]
    }

    pub fn flag(&self) -> u16 {
        self.fields[1].parse().unwrap()
    }

    pub fn rname(&self) -> &str {
        &self.fields[2]
    }

    pub fn pos(&self) -> u64 {
        self.fields[3].parse().unwrap()
    }

    pub fn cigar(&self) -> &str {
        &self.fields[5]
    }

    pub fn tlen(&self) -> i64 {
        self.fields[8].parse().unwrap()
    }

    pub fn tag(&self, name: &str) -> Option<&str> {
        let prefix = format!("{name}:");
        self.fields[11..].iter().find_map(|f| f.strip_prefix(prefix.as_str()))
    }
}

/// Splits SAM text into header lines and alignment lines.
pub fn parse_sam(text: &str) -> (Vec<String>, Vec<SamLine>) {
    let mut header = Vec::new();
    let mut records = Vec::new();
    for line in text.lines() {
        if line.starts_with('@') {
            header.push(line.to_string());
        } else {
            records.push(SamLine { fields: line.split('\t').map(str::to_string).collect() });
        }
    }
    (header, records)
}

/// Reads and parses a SAM file.
pub fn read_sam(path: &Path) -> (Vec<String>, Vec<SamLine>) {
    parse_sam(&std::fs::read_to_string(path).expect("Failed to read SAM"))
}
