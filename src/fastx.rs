//! Sequence file plumbing shared by the pipelines: format detection, mock
//! quality conversion, read partitioning, chunking, record renaming and
//! assembly graph segment extraction.
//!
//! Everything here streams or buffers plain records; no alignment or
//! consensus logic lives in this module.

use std::{
    fmt,
    fs::File,
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use bio::io::{fasta, fastq};
use eyre::{Context, Result};

use crate::error::PipelineError;

/// Phred offset used when writing qualities.
const PHRED_OFFSET: u8 = 33;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqFormat {
    Fasta,
    Fastq,
}

impl SeqFormat {
    /// Infer the format from the file extension, `fastq` and `fq` mean FASTQ,
    /// anything else is treated as FASTA.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        let ext = path
            .as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());
        match ext.as_deref() {
            Some("fastq") | Some("fq") => SeqFormat::Fastq,
            _ => SeqFormat::Fasta,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            SeqFormat::Fasta => "fasta",
            SeqFormat::Fastq => "fastq",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeqRecord {
    pub id: String,
    pub desc: Option<String>,
    pub seq: Vec<u8>,
    pub qual: Option<Vec<u8>>,
}

impl SeqRecord {
    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    /// Replace any qualities with a uniform mock value.
    pub fn with_mock_quality(mut self, mock_q: u8) -> Self {
        self.qual = Some(vec![mock_q.saturating_add(PHRED_OFFSET); self.seq.len()]);
        self
    }
}

impl From<fasta::Record> for SeqRecord {
    fn from(rec: fasta::Record) -> Self {
        SeqRecord {
            id: rec.id().to_string(),
            desc: rec.desc().map(str::to_string),
            seq: rec.seq().to_vec(),
            qual: None,
        }
    }
}

impl From<fastq::Record> for SeqRecord {
    fn from(rec: fastq::Record) -> Self {
        SeqRecord {
            id: rec.id().to_string(),
            desc: rec.desc().map(str::to_string),
            seq: rec.seq().to_vec(),
            qual: Some(rec.qual().to_vec()),
        }
    }
}

/// Call `f` on every record of a file, in file order.
pub fn for_each_record<P, F>(path: P, format: SeqFormat, mut f: F) -> Result<usize>
where
    P: AsRef<Path>,
    F: FnMut(SeqRecord) -> Result<()>,
{
    let path = path.as_ref();
    let file =
        File::open(path).wrap_err_with(|| format!("Failed to open {}", path.display()))?;
    let mut n_records = 0;
    match format {
        SeqFormat::Fasta => {
            for rec in fasta::Reader::new(file).records() {
                f(rec?.into())?;
                n_records += 1;
            }
        }
        SeqFormat::Fastq => {
            for rec in fastq::Reader::new(file).records() {
                f(rec?.into())?;
                n_records += 1;
            }
        }
    }
    log::debug!("Read {n_records} records from {}", path.display());
    Ok(n_records)
}

pub fn read_records<P: AsRef<Path>>(path: P, format: SeqFormat) -> Result<Vec<SeqRecord>> {
    let mut acc = Vec::new();
    for_each_record(path, format, |rec| {
        acc.push(rec);
        Ok(())
    })?;
    Ok(acc)
}

/// Writes [`SeqRecord`]s as either FASTA or FASTQ.
pub enum FastxWriter<W: Write> {
    Fasta(fasta::Writer<W>),
    Fastq(fastq::Writer<W>),
}

impl FastxWriter<File> {
    pub fn to_file<P: AsRef<Path>>(path: P, format: SeqFormat) -> Result<Self> {
        let path = path.as_ref();
        let file =
            File::create(path).wrap_err_with(|| format!("Failed to create {}", path.display()))?;
        Ok(FastxWriter::new(file, format))
    }
}

impl<W: Write> FastxWriter<W> {
    pub fn new(writer: W, format: SeqFormat) -> Self {
        match format {
            SeqFormat::Fasta => FastxWriter::Fasta(fasta::Writer::new(writer)),
            SeqFormat::Fastq => FastxWriter::Fastq(fastq::Writer::new(writer)),
        }
    }

    pub fn write(&mut self, rec: &SeqRecord) -> Result<()> {
        match self {
            FastxWriter::Fasta(w) => w.write(&rec.id, rec.desc.as_deref(), &rec.seq)?,
            FastxWriter::Fastq(w) => {
                let qual = rec
                    .qual
                    .as_ref()
                    .ok_or_else(|| eyre::eyre!("Record {} has no qualities", rec.id))?;
                w.write(&rec.id, rec.desc.as_deref(), &rec.seq, qual)?
            }
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        match self {
            FastxWriter::Fasta(w) => w.flush()?,
            FastxWriter::Fastq(w) => w.flush()?,
        }
        Ok(())
    }
}

/// Write every record of `input` as FASTQ with a uniform quality of
/// `mock_q`, discarding any original qualities. Works for FASTA or FASTQ
/// input.
pub fn mock_qualities<P, Q>(input: P, format: SeqFormat, output: Q, mock_q: u8) -> Result<usize>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let mut writer = FastxWriter::to_file(output, SeqFormat::Fastq)?;
    let n_records = for_each_record(input, format, |rec| {
        writer.write(&rec.with_mock_quality(mock_q))
    })?;
    writer.flush()?;
    Ok(n_records)
}

/// Which of the longest reads to select for correction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LongestReads {
    /// A percentage of the number of reads.
    Percent(f64),
    /// As many reads as fit in a budget of bases.
    Bases(u64),
}

impl LongestReads {
    /// Number of reads to select, given read lengths sorted longest first.
    pub fn count(&self, sorted_lengths: &[usize]) -> usize {
        match *self {
            LongestReads::Percent(pct) => n_longest(sorted_lengths.len(), pct),
            LongestReads::Bases(budget) => n_within_bases(sorted_lengths, budget),
        }
    }
}

impl fmt::Display for LongestReads {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LongestReads::Percent(pct) => write!(f, "longest {pct}% of reads"),
            LongestReads::Bases(budget) => write!(f, "longest reads up to {budget} bases"),
        }
    }
}

/// Number of reads that make up the longest `pct` percent of `n_reads`. At
/// least one read is selected from a non-empty set.
pub fn n_longest(n_reads: usize, pct: f64) -> usize {
    if n_reads == 0 {
        return 0;
    }
    let n = (n_reads as f64 * (pct / 100.)).floor() as usize;
    n.clamp(1, n_reads)
}

/// Number of leading reads whose total length stays within `budget` bases.
/// At least one read is selected from a non-empty set.
pub fn n_within_bases(sorted_lengths: &[usize], budget: u64) -> usize {
    if sorted_lengths.is_empty() {
        return 0;
    }
    let mut total = 0u64;
    let n = sorted_lengths
        .iter()
        .take_while(|&&len| {
            total += len as u64;
            total <= budget
        })
        .count();
    n.max(1)
}

/// Split a read set into its longest reads, as chosen by `select`, and the
/// rest.
///
/// Longest reads are written longest first, the remaining reads keep their
/// input order. Returns the number of reads written to each file.
pub fn partition_longest<P, Q, R>(
    input: P,
    format: SeqFormat,
    select: LongestReads,
    longest: Q,
    others: R,
) -> Result<(usize, usize)>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
    R: AsRef<Path>,
{
    let input = input.as_ref();
    let records = read_records(input, format)?;
    if records.is_empty() {
        return Err(PipelineError::EmptyReadSet(input.to_path_buf()).into());
    }

    let mut order: Vec<usize> = (0..records.len()).collect();
    order.sort_by(|&a, &b| records[b].len().cmp(&records[a].len()));
    let sorted_lengths: Vec<usize> = order.iter().map(|&idx| records[idx].len()).collect();
    let n_keep = select.count(&sorted_lengths);
    let mut is_long = vec![false; records.len()];
    order[..n_keep].iter().for_each(|&idx| is_long[idx] = true);

    let mut long_writer = FastxWriter::to_file(longest, format)?;
    for &idx in order[..n_keep].iter() {
        long_writer.write(&records[idx])?;
    }
    long_writer.flush()?;

    let mut other_writer = FastxWriter::to_file(others, format)?;
    for (rec, _) in records.iter().zip(is_long.iter()).filter(|(_, long)| !**long) {
        other_writer.write(rec)?;
    }
    other_writer.flush()?;

    log::info!(
        "Partitioned {} reads into {n_keep} longest and {} others",
        records.len(),
        records.len() - n_keep
    );
    Ok((n_keep, records.len() - n_keep))
}

/// Break every record into pieces of at most `chunk_size` bases. Pieces are
/// named `{id}_chunk{i}` and tagged with `chunk_length={chunk_size}` in the
/// description.
pub fn chunk_record(rec: &SeqRecord, chunk_size: usize) -> Vec<SeqRecord> {
    let tag = format!("chunk_length={chunk_size}");
    let desc = match rec.desc {
        Some(ref d) => format!("{d} {tag}"),
        None => tag,
    };
    let qual_chunks = rec.qual.as_ref().map(|q| q.chunks(chunk_size).collect::<Vec<_>>());
    rec.seq
        .chunks(chunk_size)
        .enumerate()
        .map(|(i, seq)| SeqRecord {
            id: format!("{}_chunk{i}", rec.id),
            desc: Some(desc.clone()),
            seq: seq.to_vec(),
            qual: qual_chunks
                .as_ref()
                .map(|qs| qs.get(i).map(|q| q.to_vec()).unwrap_or_default()),
        })
        .collect()
}

pub fn split_records<P, Q>(input: P, format: SeqFormat, output: Q, chunk_size: usize) -> Result<usize>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    if chunk_size == 0 {
        return Err(eyre::eyre!("Chunk size must be greater than 0"));
    }
    let mut writer = FastxWriter::to_file(output, format)?;
    let mut n_chunks = 0;
    for_each_record(input, format, |rec| {
        for chunk in chunk_record(&rec, chunk_size) {
            writer.write(&chunk)?;
            n_chunks += 1;
        }
        Ok(())
    })?;
    writer.flush()?;
    Ok(n_chunks)
}

/// Append `_{suffix}` to every record name of a FASTA file, writing the
/// renamed records to `writer`.
pub fn rename_records<P, W>(input: P, suffix: &str, writer: &mut FastxWriter<W>) -> Result<usize>
where
    P: AsRef<Path>,
    W: Write,
{
    for_each_record(input, SeqFormat::Fasta, |mut rec| {
        rec.id = format!("{}_{suffix}", rec.id);
        writer.write(&rec)
    })
}

/// Extract the segment lines of a GFA assembly graph into FASTA, one two-line
/// record per segment.
pub fn gfa_segments_to_fasta<P, Q>(gfa: P, output: Q) -> Result<usize>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let gfa = gfa.as_ref();
    let reader = BufReader::new(File::open(gfa)?);
    let mut writer = BufWriter::new(File::create(output)?);
    let mut n_segments = 0;
    for line in reader.lines() {
        let line = line?;
        let mut fields = line.split('\t');
        if fields.next() != Some("S") {
            continue;
        }
        let name = fields
            .next()
            .ok_or_else(|| eyre::eyre!("Segment line without a name in {}", gfa.display()))?;
        let seq = fields.next().unwrap_or_default();
        writeln!(writer, ">{name}\n{seq}")?;
        n_segments += 1;
    }
    writer.flush()?;
    if n_segments == 0 {
        return Err(PipelineError::EmptyAssembly(gfa.to_path_buf()).into());
    }
    Ok(n_segments)
}

/// Concatenate files byte for byte into `output`.
pub fn cat<P, Q>(files: &[P], output: Q) -> Result<()>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let mut writer = BufWriter::new(File::create(output)?);
    for f in files {
        let mut reader = BufReader::new(File::open(f)?);
        io::copy(&mut reader, &mut writer)?;
    }
    writer.flush()?;
    Ok(())
}
