use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::{BoltError, Result};
use crate::models::Document;

/// Read documents from a JSON array or a JSON-lines file
pub fn read_documents(path: impl AsRef<Path>) -> Result<Vec<Document>> {
    let path = path.as_ref();
    let text = fs::read(path)?;
    let docs = parse_documents(&String::from_utf8_lossy(&text))?;
    info!(path = ?path, documents = docs.len(), "loaded documents");
    Ok(docs)
}

/// Parse a JSON array, a single JSON object, or one object per line
pub fn parse_documents(text: &str) -> Result<Vec<Document>> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }

    let mut docs = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let doc = serde_json::from_str(line).map_err(|e| {
            BoltError::InvalidRequest(format!("line {}: {}", line_no + 1, e))
        })?;
        docs.push(doc);
    }
    Ok(docs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_json_array() {
        let docs = parse_documents(r#"[{"Id": 1, "Title": "a"}, {"id": 2, "title": "b"}]"#).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].title, "b");
    }

    #[test]
    fn test_json_lines_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("docs.jsonl");
        std::fs::write(
            &path,
            "{\"Id\": 1, \"Title\": \"a\", \"Tag\": \"x,y\"}\n\n{\"Id\": 2, \"Title\": \"b\"}\n",
        )
        .unwrap();
        let docs = read_documents(&path).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].tags, vec!["x", "y"]);
    }

    #[test]
    fn test_bad_line_is_reported() {
        let err = parse_documents("{\"Id\": 1}\nnot json\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
