use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::io::{read_barrel, retry_once, write_atomic};
use super::locks::BarrelLocks;
use super::range::BarrelRange;
use crate::error::{BoltError, Result};
use crate::models::{BarrelFailure, CreationDate, Document, DocumentId, StoredDocument, TokenKey};

/// Header row of every forward barrel
pub const FORWARD_HEADER: [&str; 8] = [
    "Id",
    "CreationDate",
    "Score",
    "Title",
    "Body",
    "Tags",
    "Answers",
    "combined_token_ids",
];

/// One CSV row of a forward barrel. `Tags` and `Answers` hold JSON arrays.
#[derive(Debug, Serialize, Deserialize)]
struct ForwardRow {
    #[serde(rename = "Id")]
    id: DocumentId,
    #[serde(rename = "CreationDate")]
    creation_date: String,
    #[serde(rename = "Score")]
    score: i64,
    #[serde(rename = "Title")]
    title: String,
    #[serde(rename = "Body")]
    body: String,
    #[serde(rename = "Tags")]
    tags: String,
    #[serde(rename = "Answers")]
    answers: String,
    combined_token_ids: String,
}

impl ForwardRow {
    fn from_document(doc: &Document, keys: &[TokenKey]) -> Result<Self> {
        Ok(Self {
            id: doc.id,
            creation_date: doc.created_at.as_str().to_string(),
            score: doc.score,
            title: doc.title.clone(),
            body: doc.body.clone(),
            tags: serde_json::to_string(&doc.tags)?,
            answers: serde_json::to_string(&doc.answers)?,
            combined_token_ids: keys
                .iter()
                .map(|k| k.to_string())
                .collect::<Vec<_>>()
                .join(","),
        })
    }

    fn into_stored(self) -> Result<StoredDocument> {
        let tags: Vec<String> = serde_json::from_str(&self.tags)?;
        let answers: Vec<String> = serde_json::from_str(&self.answers)?;
        let combined_token_ids = self
            .combined_token_ids
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(str::parse)
            .collect::<Result<Vec<TokenKey>>>()?;
        Ok(StoredDocument {
            document: Document {
                id: self.id,
                title: self.title,
                body: self.body,
                tags,
                answers,
                score: self.score,
                created_at: CreationDate::new(self.creation_date),
            },
            combined_token_ids,
        })
    }
}

/// Parsed contents of one forward barrel
#[derive(Debug, Default)]
pub struct ForwardBarrel {
    pub documents: Vec<StoredDocument>,
    /// Rows that failed to parse and were left out
    pub skipped_rows: usize,
    /// Ids read from the `Id` column of skipped rows
    malformed_ids: BTreeSet<DocumentId>,
}

impl ForwardBarrel {
    pub fn get(&self, doc_id: DocumentId) -> Option<&StoredDocument> {
        self.documents.iter().find(|d| d.document.id == doc_id)
    }

    /// Whether any row carries `doc_id`, malformed rows included
    pub fn contains(&self, doc_id: DocumentId) -> bool {
        self.get(doc_id).is_some() || self.malformed_ids.contains(&doc_id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended(BarrelRange),
    AlreadyPresent(BarrelRange),
}

/// Documents fetched across several forward barrels
#[derive(Debug, Default)]
pub struct FetchResult {
    pub documents: Vec<StoredDocument>,
    pub missing: Vec<DocumentId>,
    pub failures: Vec<BarrelFailure>,
    pub skipped_rows: usize,
}

/// Forward index: documents sharded into fixed-width id-range barrels.
///
/// A document's barrel is a pure function of its id, so no directory scan
/// is needed to place or find it.
pub struct ForwardBarrelStore {
    dir: PathBuf,
    width: u64,
    locks: &'static BarrelLocks,
}

impl ForwardBarrelStore {
    pub fn open(dir: impl Into<PathBuf>, width: u64) -> Result<Self> {
        if width == 0 {
            return Err(BoltError::InvalidRequest(
                "barrel width must be greater than zero".to_string(),
            ));
        }
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            width,
            locks: BarrelLocks::global(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn width(&self) -> u64 {
        self.width
    }

    /// Barrel holding `doc_id`
    pub fn barrel_of(&self, doc_id: DocumentId) -> BarrelRange {
        BarrelRange::aligned(doc_id, self.width)
    }

    pub fn barrel_path(&self, range: BarrelRange) -> PathBuf {
        self.dir.join(range.forward_file_name())
    }

    /// Ranges of the forward barrels present on disk, sorted by start
    pub fn barrels(&self) -> Result<Vec<BarrelRange>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if let Some(range) = entry
                .file_name()
                .to_str()
                .and_then(BarrelRange::parse_forward_file_name)
            {
                out.push(range);
            }
        }
        out.sort();
        Ok(out)
    }

    /// Load a barrel; a barrel never written reads as empty
    pub fn load(&self, range: BarrelRange) -> Result<ForwardBarrel> {
        let name = range.forward_file_name();
        retry_once(&name, || {
            match read_barrel(&self.barrel_path(range), &name)? {
                Some((_, text)) => parse_forward(&name, &text),
                None => Ok(ForwardBarrel::default()),
            }
        })
    }

    pub fn contains(&self, doc_id: DocumentId) -> Result<bool> {
        Ok(self.load(self.barrel_of(doc_id))?.contains(doc_id))
    }

    pub fn get(&self, doc_id: DocumentId) -> Result<Option<StoredDocument>> {
        let barrel = self.load(self.barrel_of(doc_id))?;
        Ok(barrel.documents.into_iter().find(|d| d.document.id == doc_id))
    }

    /// Append a document to its barrel unless its id is already there.
    ///
    /// The duplicate check and the write happen under the barrel lock, so
    /// two racing ingests of one id write it once.
    pub fn append(&self, doc: &Document, keys: &[TokenKey]) -> Result<AppendOutcome> {
        let range = self.barrel_of(doc.id);
        let name = range.forward_file_name();
        let path = self.barrel_path(range);
        let row = ForwardRow::from_document(doc, keys)?;

        self.locks.with_lock(&path, || {
            retry_once(&name, || {
                let existing = read_barrel(&path, &name)?
                    .filter(|(raw, _)| !raw.iter().all(u8::is_ascii_whitespace));
                let mut bytes = match &existing {
                    Some((raw, text)) => {
                        if parse_forward(&name, text)?.contains(doc.id) {
                            return Ok(AppendOutcome::AlreadyPresent(range));
                        }
                        let mut raw = raw.clone();
                        if !raw.is_empty() && !raw.ends_with(b"\n") {
                            raw.push(b'\n');
                        }
                        raw
                    }
                    None => Vec::new(),
                };

                let mut writer = csv::WriterBuilder::new()
                    .has_headers(existing.is_none())
                    .from_writer(Vec::new());
                writer
                    .serialize(&row)
                    .map_err(|e| BoltError::csv(&name, e))?;
                let encoded = writer
                    .into_inner()
                    .map_err(|e| BoltError::barrel_io(&name, e.into_error()))?;
                bytes.extend_from_slice(&encoded);

                write_atomic(&path, &name, &bytes)?;
                if existing.is_none() {
                    info!(barrel = %name, "created forward barrel");
                }
                debug!(barrel = %name, doc_id = doc.id, "appended document");
                Ok(AppendOutcome::Appended(range))
            })
        })
    }

    /// Fetch documents by id, loading each barrel once.
    ///
    /// Missing barrels and rows are reported, never fatal; unreadable
    /// barrels are isolated into `failures`.
    pub fn fetch_many(&self, ids: &[DocumentId]) -> FetchResult {
        let mut by_barrel: BTreeMap<BarrelRange, BTreeSet<DocumentId>> = BTreeMap::new();
        for &id in ids {
            by_barrel.entry(self.barrel_of(id)).or_default().insert(id);
        }

        let mut found: BTreeMap<DocumentId, StoredDocument> = BTreeMap::new();
        let mut result = FetchResult::default();
        for (range, wanted) in by_barrel {
            let barrel = match self.load(range) {
                Ok(barrel) => barrel,
                Err(e) => {
                    warn!(barrel = %range.forward_file_name(), error = %e, "forward barrel unreadable");
                    result
                        .failures
                        .push(BarrelFailure::new(range.forward_file_name(), &e));
                    result.missing.extend(wanted);
                    continue;
                }
            };
            result.skipped_rows += barrel.skipped_rows;
            for doc in barrel.documents {
                if wanted.contains(&doc.document.id) {
                    found.entry(doc.document.id).or_insert(doc);
                }
            }
            result
                .missing
                .extend(wanted.into_iter().filter(|id| !found.contains_key(id)));
        }

        result.documents = ids
            .iter()
            .filter_map(|id| found.remove(id))
            .collect();
        result
    }
}

fn parse_forward(name: &str, text: &str) -> Result<ForwardBarrel> {
    if text.trim().is_empty() {
        return Ok(ForwardBarrel::default());
    }
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers().map_err(|e| BoltError::csv(name, e))?.clone();
    if headers.iter().ne(FORWARD_HEADER.iter().copied()) {
        return Err(BoltError::SchemaMismatch {
            barrel: name.to_string(),
            expected: FORWARD_HEADER.iter().map(|s| s.to_string()).collect(),
            found: headers.iter().map(str::to_string).collect(),
        });
    }

    let mut barrel = ForwardBarrel::default();
    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                debug!(barrel = name, error = %e, "skipping unreadable forward row");
                barrel.skipped_rows += 1;
                continue;
            }
        };
        match record
            .deserialize::<ForwardRow>(Some(&headers))
            .map_err(|e| BoltError::csv(name, e))
            .and_then(ForwardRow::into_stored)
        {
            Ok(doc) => barrel.documents.push(doc),
            Err(e) => {
                debug!(barrel = name, error = %e, "skipping malformed forward row");
                barrel.skipped_rows += 1;
                if let Some(id) = record.get(0).and_then(|id| id.trim().parse().ok()) {
                    barrel.malformed_ids.insert(id);
                }
            }
        }
    }
    if barrel.skipped_rows > 0 {
        warn!(barrel = name, skipped = barrel.skipped_rows, "skipped malformed forward rows");
    }
    Ok(barrel)
}
