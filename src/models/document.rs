use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::token::TokenKey;

/// Unique document identifier, assigned outside the index
pub type DocumentId = u64;

const CREATION_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Question/answer document as it enters the index.
///
/// Field aliases accept the column names of the original dataset
/// (`Id`, `Title`, `Tag`, `Answer`, `CreationDate`, ...).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(alias = "Id")]
    pub id: DocumentId,
    #[serde(alias = "Title", default)]
    pub title: String,
    #[serde(alias = "Body", default)]
    pub body: String,
    #[serde(alias = "Tag", alias = "Tags", default, deserialize_with = "de_tags")]
    pub tags: Vec<String>,
    #[serde(
        alias = "Answer",
        alias = "Answers",
        default,
        deserialize_with = "de_answers"
    )]
    pub answers: Vec<String>,
    #[serde(alias = "Score", default)]
    pub score: i64,
    #[serde(alias = "CreationDate", default)]
    pub created_at: CreationDate,
}

impl Document {
    pub fn new(id: DocumentId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            body: String::new(),
            tags: Vec::new(),
            answers: Vec::new(),
            score: 0,
            created_at: CreationDate::default(),
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Set tags, keeping the first occurrence of each
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = dedup_tags(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_answers<I, S>(mut self, answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.answers = answers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_score(mut self, score: i64) -> Self {
        self.score = score;
        self
    }

    pub fn with_created_at(mut self, created_at: CreationDate) -> Self {
        self.created_at = created_at;
        self
    }
}

/// A document read back from its forward barrel, with the token keys
/// recorded at ingestion time.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StoredDocument {
    #[serde(flatten)]
    pub document: Document,
    pub combined_token_ids: Vec<TokenKey>,
}

/// Creation timestamp kept in its raw textual form.
///
/// Parsing is deferred to the consumer so an unparsable date in a barrel
/// never makes the whole row unreadable.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CreationDate(String);

impl CreationDate {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.format(CREATION_DATE_FORMAT).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse RFC 3339, `YYYY-MM-DDTHH:MM:SS`, or plain `YYYY-MM-DD`
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let raw = self.0.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
                return Some(Utc.from_utc_datetime(&naive));
            }
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| Utc.from_utc_datetime(&naive))
    }
}

impl From<DateTime<Utc>> for CreationDate {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::from_datetime(dt)
    }
}

fn dedup_tags(tags: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn de_tags<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(s)) => dedup_tags(s.split(',').map(str::to_string)),
        Some(OneOrMany::Many(v)) => dedup_tags(v.into_iter()),
    })
}

fn de_answers<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(s)) if s.trim().is_empty() => Vec::new(),
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(v)) => v,
    })
}
