use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::{debug, info, warn};

use super::io::{read_barrel, retry_once, write_atomic};
use super::locks::BarrelLocks;
use super::range::{validate_contiguous, BarrelRange};
use crate::error::{BoltError, Result};
use crate::models::{DocumentId, TokenKey};

/// Header row of every posting barrel
pub const POSTING_HEADER: [&str; 2] = ["Token_ID", "Document_IDs"];

const EXTEND_LOCK: &str = ".extend";

/// In-memory contents of one posting barrel
#[derive(Debug)]
pub struct PostingBarrel {
    pub range: BarrelRange,
    pub postings: BTreeMap<TokenKey, BTreeSet<DocumentId>>,
    pub skipped_rows: usize,
    /// Rows that did not parse, written back untouched on rewrite
    malformed: Vec<csv::StringRecord>,
}

impl PostingBarrel {
    fn empty(range: BarrelRange) -> Self {
        Self {
            range,
            postings: BTreeMap::new(),
            skipped_rows: 0,
            malformed: Vec::new(),
        }
    }

    /// Rows skipped by the csv reader itself cannot be written back
    fn lost_rows(&self) -> usize {
        self.skipped_rows - self.malformed.len()
    }
}

/// Document ids found for one numeric token id, both origins merged
#[derive(Debug, Default)]
pub struct PostingLookup {
    pub doc_ids: BTreeSet<DocumentId>,
    pub skipped_rows: usize,
}

/// Inverted index sharded into contiguous token-id ranges.
///
/// The range list is cached and swapped atomically after every extension;
/// `refresh` re-reads it from the directory.
pub struct PostingBarrelStore {
    dir: PathBuf,
    width: u64,
    ranges: ArcSwap<Vec<BarrelRange>>,
    locks: &'static BarrelLocks,
}

impl PostingBarrelStore {
    pub fn open(dir: impl Into<PathBuf>, width: u64) -> Result<Self> {
        if width == 0 {
            return Err(BoltError::InvalidRequest(
                "barrel width must be greater than zero".to_string(),
            ));
        }
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let ranges = Self::scan_ranges(&dir)?;
        debug!(dir = ?dir, barrels = ranges.len(), "opened posting store");
        Ok(Self {
            dir,
            width,
            ranges: ArcSwap::from_pointee(ranges),
            locks: BarrelLocks::global(),
        })
    }

    /// Ranges encoded in the barrel file names under `dir`, sorted by start.
    ///
    /// Contiguity is not checked here.
    pub fn scan_ranges(dir: &Path) -> Result<Vec<BarrelRange>> {
        let mut ranges = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if let Some(range) = entry
                .file_name()
                .to_str()
                .and_then(BarrelRange::parse_posting_file_name)
            {
                ranges.push(range);
            }
        }
        ranges.sort();
        Ok(ranges)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn width(&self) -> u64 {
        self.width
    }

    pub fn barrel_path(&self, range: BarrelRange) -> PathBuf {
        self.dir.join(range.posting_file_name())
    }

    /// Cached range list
    pub fn ranges(&self) -> Arc<Vec<BarrelRange>> {
        self.ranges.load_full()
    }

    /// Reload the range list from disk.
    ///
    /// Runs under the extension lock so a rescan never replaces a newer list.
    pub fn refresh(&self) -> Result<Arc<Vec<BarrelRange>>> {
        self.locks.with_lock(&self.dir.join(EXTEND_LOCK), || {
            let ranges = Arc::new(Self::scan_ranges(&self.dir)?);
            self.ranges.store(ranges.clone());
            Ok(ranges)
        })
    }

    /// Make sure some barrel covers `token_id`, allocating ranges of the
    /// configured width past the current maximum until one does.
    ///
    /// Fails with `RangeGap` if the existing ranges are not contiguous.
    pub fn ensure_coverage(&self, token_id: u64) -> Result<BarrelRange> {
        {
            let cached = self.ranges.load();
            validate_contiguous(&cached)?;
            if let Some(range) = cached.iter().find(|r| r.contains(token_id)) {
                return Ok(*range);
            }
        }

        let extend_lock = self.dir.join(EXTEND_LOCK);
        self.locks.with_lock(&extend_lock, || {
            // Another store may have extended since our cache was loaded
            let mut ranges = Self::scan_ranges(&self.dir)?;
            validate_contiguous(&ranges)?;
            if let Some(range) = ranges.iter().find(|r| r.contains(token_id)).copied() {
                self.ranges.store(Arc::new(ranges));
                return Ok(range);
            }

            let mut last = match ranges.last() {
                Some(range) => *range,
                None => {
                    let first = BarrelRange::first(self.width);
                    self.create_empty(first)?;
                    ranges.push(first);
                    first
                }
            };
            while !last.contains(token_id) {
                last = last.successor(self.width).ok_or_else(|| {
                    BoltError::Internal(format!("no room for a barrel after {}", last))
                })?;
                self.create_empty(last)?;
                ranges.push(last);
            }

            info!(
                token_id,
                barrels = ranges.len(),
                last = %last,
                "extended posting barrel ranges"
            );
            self.ranges.store(Arc::new(ranges));
            Ok(last)
        })
    }

    /// Covering range from the cache; `NotFound` unless `ensure_coverage` ran
    pub fn locate(&self, token_id: u64) -> Result<BarrelRange> {
        self.ranges
            .load()
            .iter()
            .find(|r| r.contains(token_id))
            .copied()
            .ok_or(BoltError::NotFound(token_id))
    }

    /// Every cached range containing `token_id`, tolerating overlaps
    pub fn covering(&self, token_id: u64) -> Vec<BarrelRange> {
        self.ranges
            .load()
            .iter()
            .filter(|r| r.contains(token_id))
            .copied()
            .collect()
    }

    /// Load a barrel; a missing file loads as empty
    pub fn load(&self, range: BarrelRange) -> Result<PostingBarrel> {
        let name = range.posting_file_name();
        retry_once(&name, || self.read(range, &name))
    }

    fn read(&self, range: BarrelRange, name: &str) -> Result<PostingBarrel> {
        match read_barrel(&self.barrel_path(range), name)? {
            Some((_, text)) => parse_postings(range, name, &text),
            None => Ok(PostingBarrel::empty(range)),
        }
    }

    fn create_empty(&self, range: BarrelRange) -> Result<()> {
        let path = self.barrel_path(range);
        if path.exists() {
            return Ok(());
        }
        let name = range.posting_file_name();
        let bytes = encode_postings(&name, &PostingBarrel::empty(range))?;
        retry_once(&name, || write_atomic(&path, &name, &bytes))?;
        info!(barrel = %name, "created posting barrel");
        Ok(())
    }

    /// Add `doc_id` to the posting for `key`.
    ///
    /// Returns false when the id was already there, in which case the file
    /// is not rewritten. Malformed rows are kept verbatim after the parsed ones.
    pub fn upsert_posting(&self, key: TokenKey, doc_id: DocumentId) -> Result<bool> {
        let range = self.locate(key.numeric_id)?;
        let name = range.posting_file_name();
        let path = self.barrel_path(range);

        self.locks.with_lock(&path, || {
            retry_once(&name, || {
                let mut barrel = self.read(range, &name)?;
                if !barrel.postings.entry(key).or_default().insert(doc_id) {
                    debug!(barrel = %name, token = %key, doc_id, "posting already present");
                    return Ok(false);
                }
                if barrel.lost_rows() > 0 {
                    return Err(BoltError::InvalidRequest(format!(
                        "{} has {} unreadable rows; refusing to rewrite it",
                        name,
                        barrel.lost_rows()
                    )));
                }
                write_atomic(&path, &name, &encode_postings(&name, &barrel)?)?;
                debug!(barrel = %name, token = %key, doc_id, "posting upserted");
                Ok(true)
            })
        })
    }

    /// Document ids posted under `numeric_id` in one barrel, bare and marked
    pub fn lookup(&self, range: BarrelRange, numeric_id: u64) -> Result<PostingLookup> {
        let barrel = self.load(range)?;
        let mut doc_ids = BTreeSet::new();
        for key in [TokenKey::bare(numeric_id), TokenKey::titled(numeric_id)] {
            if let Some(ids) = barrel.postings.get(&key) {
                doc_ids.extend(ids.iter().copied());
            }
        }
        Ok(PostingLookup {
            doc_ids,
            skipped_rows: barrel.skipped_rows,
        })
    }
}

fn parse_postings(range: BarrelRange, name: &str, text: &str) -> Result<PostingBarrel> {
    let mut barrel = PostingBarrel::empty(range);
    if text.trim().is_empty() {
        return Ok(barrel);
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = reader.headers().map_err(|e| BoltError::csv(name, e))?.clone();
    if headers.iter().ne(POSTING_HEADER.iter().copied()) {
        return Err(BoltError::SchemaMismatch {
            barrel: name.to_string(),
            expected: POSTING_HEADER.iter().map(|s| s.to_string()).collect(),
            found: headers.iter().map(str::to_string).collect(),
        });
    }

    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                debug!(barrel = name, error = %e, "skipping unreadable posting row");
                barrel.skipped_rows += 1;
                continue;
            }
        };
        match parse_posting_row(&record) {
            Ok((key, ids)) => barrel.postings.entry(key).or_default().extend(ids),
            Err(e) => {
                debug!(barrel = name, error = %e, "skipping malformed posting row");
                barrel.skipped_rows += 1;
                barrel.malformed.push(record);
            }
        }
    }
    if barrel.skipped_rows > 0 {
        warn!(barrel = name, skipped = barrel.skipped_rows, "skipped malformed posting rows");
    }
    Ok(barrel)
}

fn parse_posting_row(record: &csv::StringRecord) -> Result<(TokenKey, BTreeSet<DocumentId>)> {
    if record.len() != POSTING_HEADER.len() {
        return Err(BoltError::InvalidRequest(format!(
            "expected {} columns, found {}",
            POSTING_HEADER.len(),
            record.len()
        )));
    }
    let key: TokenKey = record[0].parse()?;
    let ids = record[1]
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<DocumentId>()
                .map_err(|_| BoltError::InvalidRequest(format!("bad document id {:?}", s)))
        })
        .collect::<Result<BTreeSet<_>>>()?;
    Ok((key, ids))
}

fn encode_postings(name: &str, barrel: &PostingBarrel) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());
    writer
        .write_record(POSTING_HEADER)
        .map_err(|e| BoltError::csv(name, e))?;
    for (key, ids) in &barrel.postings {
        let joined = ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(",");
        writer
            .write_record([key.to_string(), joined])
            .map_err(|e| BoltError::csv(name, e))?;
    }
    for record in &barrel.malformed {
        writer
            .write_record(record)
            .map_err(|e| BoltError::csv(name, e))?;
    }
    writer
        .into_inner()
        .map_err(|e| BoltError::barrel_io(name, e.into_error()))
}
