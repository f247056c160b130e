//! # Shard splitter
//!
//! Splits one gigantic single-object JSON corpus into N self-contained shard
//! files without ever scanning its interior. Only the first and last ~10 KB
//! are inspected to locate the `data` object; interior cut points are found
//! by bounded forward scans near evenly spaced byte targets, so the extra
//! scanning cost is O(N × max_search) regardless of corpus size. The only
//! full-file cost is streaming each shard's own byte range out to disk.
//!
//! The boundary search is a best-effort heuristic, not a JSON tokenizer: it
//! looks for the opening quote of a record label (a quoted token that starts
//! with a digit, per the label grammar). When no boundary is found the search
//! retries with a larger window and finally falls back to the raw target
//! offset — flagged in the report and logged, never silent, since a raw cut
//! can corrupt that shard.

use anyhow::{anyhow, Context, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const HEAD_WINDOW: u64 = 10_000;
const TAIL_WINDOW: u64 = 10_000;
const MAX_SEARCH: u64 = 100_000;
const RETRY_SEARCH: u64 = 500_000;
const COPY_BLOCK: usize = 256 * 1024;

/// One shard's byte range in the corpus plus its output path.
///
/// Produced once by the splitter, consumed once by a classifier worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardDescriptor {
    pub index: usize,
    /// Range [start, end) into the corpus file
    pub start: u64,
    pub end: u64,
    pub path: PathBuf,
}

/// Outcome of a corpus split.
#[derive(Debug)]
pub struct SplitReport {
    pub shards: Vec<ShardDescriptor>,
    /// First byte of the `data` object's content
    pub data_start: u64,
    /// Byte of the `data` object's closing brace
    pub data_end: u64,
    /// Boundaries that fell back to the raw target offset
    pub fallback_boundaries: usize,
    pub file_size: u64,
}

/// Split the corpus into `n_shards` standalone `{"data":{...}}` files.
///
/// The union of shard records, in shard order, equals the corpus's `data`
/// object with no record duplicated or dropped (provided every boundary
/// search succeeded; fallback boundaries are counted in the report).
pub fn split_corpus(corpus: &Path, n_shards: usize, out_dir: &Path) -> Result<SplitReport> {
    if n_shards == 0 {
        return Err(anyhow!("shard count must be at least 1"));
    }
    let mut file = File::open(corpus)
        .with_context(|| format!("cannot open corpus {}", corpus.display()))?;
    let file_size = file.metadata()?.len();
    let (data_start, data_end) = find_data_bounds(&mut file, file_size)?;

    let data_size = data_end - data_start;
    let chunk_size = data_size / n_shards as u64;

    let mut boundaries = vec![data_start];
    let mut fallback_boundaries = 0usize;
    for i in 1..n_shards {
        let target = data_start + i as u64 * chunk_size;
        let mut found = find_record_boundary(&mut file, target, data_end, MAX_SEARCH)?;
        if found.is_none() {
            found = find_record_boundary(&mut file, target, data_end, RETRY_SEARCH)?;
        }
        let boundary = match found {
            Some(b) => b,
            None => {
                eprintln!(
                    "warning: no record boundary near byte {} for split {}; using raw offset (shard may be malformed)",
                    target, i
                );
                fallback_boundaries += 1;
                target
            }
        };
        let prev = *boundaries.last().unwrap_or(&data_start);
        boundaries.push(boundary.clamp(prev, data_end));
    }
    boundaries.push(data_end);

    fs::create_dir_all(out_dir)
        .with_context(|| format!("cannot create splits dir {}", out_dir.display()))?;
    let mut shards = Vec::with_capacity(n_shards);
    for (index, range) in boundaries.windows(2).enumerate() {
        let path = out_dir.join(format!("knots_split_{:03}.json", index));
        write_shard(&mut file, range[0], range[1], &path)?;
        shards.push(ShardDescriptor {
            index,
            start: range[0],
            end: range[1],
            path,
        });
    }

    Ok(SplitReport {
        shards,
        data_start,
        data_end,
        fallback_boundaries,
        file_size,
    })
}

/// Locate the `data` object's content range by scanning only the head and
/// tail windows. Assumes `data` is the final top-level key, so the file's
/// last two closing braces close `data` and the top-level object.
fn find_data_bounds(file: &mut File, file_size: u64) -> Result<(u64, u64)> {
    let head_len = file_size.min(HEAD_WINDOW) as usize;
    let mut head = vec![0u8; head_len];
    file.seek(SeekFrom::Start(0))?;
    file.read_exact(&mut head)?;
    let key = find_subslice(&head, b"\"data\"")
        .ok_or_else(|| anyhow!("no \"data\" key within the first {} bytes", head_len))?;
    let after_key = key + b"\"data\"".len();
    let brace = head[after_key..]
        .iter()
        .position(|&b| b == b'{')
        .ok_or_else(|| anyhow!("no opening brace after the \"data\" key"))?;
    let data_start = (after_key + brace + 1) as u64;

    let tail_len = file_size.min(TAIL_WINDOW) as usize;
    let mut tail = vec![0u8; tail_len];
    file.seek(SeekFrom::End(-(tail_len as i64)))?;
    file.read_exact(&mut tail)?;
    let tail_offset = file_size - tail_len as u64;

    let mut i = tail_len;
    while i > 0 && tail[i - 1].is_ascii_whitespace() {
        i -= 1;
    }
    if i == 0 || tail[i - 1] != b'}' {
        return Err(anyhow!("corpus does not end with a closing brace"));
    }
    i -= 1;
    while i > 0 && tail[i - 1].is_ascii_whitespace() {
        i -= 1;
    }
    if i == 0 || tail[i - 1] != b'}' {
        return Err(anyhow!("no \"data\" closing brace near the end of the corpus"));
    }
    let data_end = tail_offset + (i - 1) as u64;
    if data_end < data_start {
        return Err(anyhow!("data section bounds are inverted"));
    }
    Ok((data_start, data_end))
}

/// Scan forward from `target` for the start of a record key.
///
/// Heuristic: the first alphabetic/underscore byte must belong to a quoted
/// token; backtrack to its opening quote and accept it only when the byte
/// after the quote is an ASCII digit — record labels lead with their crossing
/// number, which rejects nested `"coeffs"` keys. Returns the quote's byte
/// offset, or `None` if the window holds no such token.
fn find_record_boundary(
    file: &mut File,
    target: u64,
    limit: u64,
    max_search: u64,
) -> Result<Option<u64>> {
    let window = (limit.saturating_sub(target)).min(max_search) as usize;
    if window == 0 {
        return Ok(None);
    }
    let mut buf = vec![0u8; window];
    file.seek(SeekFrom::Start(target))?;
    file.read_exact(&mut buf)?;

    let mut i = 0;
    while i < buf.len() {
        let b = buf[i];
        if b.is_ascii_alphabetic() || b == b'_' {
            if let Some(quote) = buf[..i].iter().rposition(|&b| b == b'"') {
                if buf.get(quote + 1).map_or(false, |b| b.is_ascii_digit()) {
                    return Ok(Some(target + quote as u64));
                }
            }
            while i < buf.len() && (buf[i].is_ascii_alphanumeric() || buf[i] == b'_') {
                i += 1;
            }
        } else {
            i += 1;
        }
    }
    Ok(None)
}

/// Stream the byte range [start, end) into a standalone shard file, trimming
/// the separator punctuation a mid-structure cut leaves behind and wrapping
/// the records in a minimal `{"data":{...}}` scaffold.
fn write_shard(file: &mut File, start: u64, end: u64, path: &Path) -> Result<()> {
    let mut out = BufWriter::new(
        File::create(path).with_context(|| format!("cannot create shard {}", path.display()))?,
    );
    out.write_all(b"{\"data\":{")?;

    file.seek(SeekFrom::Start(start))?;
    let mut remaining = end - start;
    let mut block = vec![0u8; COPY_BLOCK];
    let mut pending: Vec<u8> = Vec::new();
    let mut lead_trimmed = false;
    while remaining > 0 {
        let n = remaining.min(COPY_BLOCK as u64) as usize;
        file.read_exact(&mut block[..n])?;
        remaining -= n as u64;
        let mut chunk = &block[..n];
        if !lead_trimmed {
            while let Some((&b, rest)) = chunk.split_first() {
                if b == b',' || b.is_ascii_whitespace() {
                    chunk = rest;
                } else {
                    break;
                }
            }
            lead_trimmed = !chunk.is_empty();
        }
        if chunk.is_empty() {
            continue;
        }
        // Hold the newest block back so the trailing trim sees the true end.
        if !pending.is_empty() {
            out.write_all(&pending)?;
            pending.clear();
        }
        pending.extend_from_slice(chunk);
    }
    while matches!(pending.last(), Some(&b) if b == b',' || b.is_ascii_whitespace()) {
        pending.pop();
    }
    out.write_all(&pending)?;
    out.write_all(b"}}")?;
    out.flush()?;
    Ok(())
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::collections::BTreeSet;
    use tempfile::tempdir;

    fn corpus_text(records: &[(String, Vec<(i64, i64)>)]) -> String {
        let mut s = String::from("{\"meta\": {\"source\": \"test\", \"count\": ");
        s.push_str(&records.len().to_string());
        s.push_str("}, \"data\": {");
        for (i, (label, coeffs)) in records.iter().enumerate() {
            if i > 0 {
                s.push_str(", ");
            }
            s.push_str(&format!("\"{}\": {{\"coeffs\": {{", label));
            for (j, (exp, coeff)) in coeffs.iter().enumerate() {
                if j > 0 {
                    s.push_str(", ");
                }
                s.push_str(&format!("\"{}\": {}", exp, coeff));
            }
            s.push_str("}}");
        }
        s.push_str("}}");
        s
    }

    fn sample_records(count: usize) -> Vec<(String, Vec<(i64, i64)>)> {
        (0..count)
            .map(|i| {
                let label = format!("{}a_{}", 3 + i % 12, i + 1);
                let coeffs = vec![(4, -1), (3, 1), (1, 1), (-(i as i64 % 5) - 1, 2)];
                (label, coeffs)
            })
            .collect()
    }

    fn shard_labels(path: &Path) -> Vec<String> {
        let text = fs::read_to_string(path).unwrap();
        let value: Value = serde_json::from_str(&text).expect("shard must be standalone JSON");
        value["data"]
            .as_object()
            .expect("shard must wrap a data object")
            .keys()
            .cloned()
            .collect()
    }

    #[test]
    fn split_round_trip_preserves_every_record() {
        let dir = tempdir().unwrap();
        let records = sample_records(40);
        let corpus = dir.path().join("corpus.json");
        fs::write(&corpus, corpus_text(&records)).unwrap();

        let report = split_corpus(&corpus, 4, &dir.path().join("splits")).unwrap();
        assert_eq!(report.shards.len(), 4);
        assert_eq!(report.fallback_boundaries, 0);

        let mut seen = Vec::new();
        for shard in &report.shards {
            seen.extend(shard_labels(&shard.path));
        }
        let expected: Vec<String> = records.iter().map(|(l, _)| l.clone()).collect();
        assert_eq!(seen.len(), expected.len(), "no record duplicated or dropped");
        let seen_set: BTreeSet<_> = seen.iter().collect();
        let expected_set: BTreeSet<_> = expected.iter().collect();
        assert_eq!(seen_set, expected_set);
    }

    #[test]
    fn single_shard_reproduces_the_data_object() {
        let dir = tempdir().unwrap();
        let records = sample_records(7);
        let corpus = dir.path().join("corpus.json");
        fs::write(&corpus, corpus_text(&records)).unwrap();

        let report = split_corpus(&corpus, 1, &dir.path().join("splits")).unwrap();
        let labels = shard_labels(&report.shards[0].path);
        let expected: Vec<String> = records.iter().map(|(l, _)| l.clone()).collect();
        assert_eq!(labels.len(), expected.len());

        // Record bodies survive the cut byte-for-byte.
        let text = fs::read_to_string(&report.shards[0].path).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["data"][&records[0].0]["coeffs"]["4"], Value::from(-1));
    }

    #[test]
    fn shards_exceeding_record_count_stay_valid() {
        let dir = tempdir().unwrap();
        let records = sample_records(3);
        let corpus = dir.path().join("corpus.json");
        fs::write(&corpus, corpus_text(&records)).unwrap();

        let report = split_corpus(&corpus, 8, &dir.path().join("splits")).unwrap();
        let mut seen = Vec::new();
        for shard in &report.shards {
            seen.extend(shard_labels(&shard.path));
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn boundary_search_skips_nested_keys() {
        let dir = tempdir().unwrap();
        let text = r#"{"data":{"3a_1": {"coeffs": {"1": 1}}, "3a_2": {"coeffs": {"2": -1}}}}"#;
        let path = dir.path().join("c.json");
        fs::write(&path, text).unwrap();
        let mut file = File::open(&path).unwrap();

        // Target inside the first record, before its "coeffs" key: the scan
        // must pass over "coeffs" and land on the quote opening "3a_2".
        let target = text.find("{\"coeffs\"").unwrap() as u64 + 1;
        let limit = text.len() as u64;
        let boundary = find_record_boundary(&mut file, target, limit, MAX_SEARCH)
            .unwrap()
            .expect("boundary should be found");
        assert_eq!(boundary, text.find("\"3a_2\"").unwrap() as u64);
    }

    #[test]
    fn bounds_require_a_data_object() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("c.json");
        fs::write(&path, r#"{"meta": {"source": "test"}}"#).unwrap();
        assert!(split_corpus(&path, 2, &dir.path().join("splits")).is_err());
    }

    #[test]
    fn missing_corpus_is_fatal() {
        let dir = tempdir().unwrap();
        let err = split_corpus(&dir.path().join("absent.json"), 2, dir.path()).unwrap_err();
        assert!(err.to_string().contains("cannot open corpus"));
    }
}
