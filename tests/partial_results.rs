use tempfile::TempDir;

use boltsearch::{token_id, BarrelRange, Document, IndexSettings, SearchEngine};

fn engine_with_docs(tmp: &TempDir) -> SearchEngine {
    let engine = SearchEngine::open(IndexSettings::new(tmp.path())).unwrap();
    let docs = vec![
        Document::new(10, "kernel modules").with_score(5),
        Document::new(4010, "kernel scheduling").with_score(7),
        Document::new(8010, "kernel memory").with_score(9),
    ];
    for result in engine.ingest_batch(&docs) {
        result.unwrap();
    }
    engine
}

#[test]
fn unreadable_forward_barrel_yields_partial_results() {
    let tmp = TempDir::new().unwrap();
    let engine = engine_with_docs(&tmp);

    let broken = tmp
        .path()
        .join("DocumentBarrels")
        .join(BarrelRange::new(4000, 7999).forward_file_name());
    std::fs::write(&broken, "Not,The,Forward,Header\n").unwrap();

    let response = engine.search_term("kernel", None).unwrap();
    let ids: Vec<u64> = response.results.iter().map(|r| r.document.id).collect();
    assert_eq!(ids, vec![8010, 10]);
    assert!(response.diagnostics.is_partial());
    assert_eq!(response.diagnostics.missing_documents, vec![4010]);
    assert_eq!(
        response.diagnostics.unreadable_barrels[0].barrel,
        "barrel_4000_to_7999.csv"
    );
}

#[test]
fn deleted_forward_barrel_is_reported_as_missing() {
    let tmp = TempDir::new().unwrap();
    let engine = engine_with_docs(&tmp);
    std::fs::remove_file(
        tmp.path()
            .join("DocumentBarrels")
            .join("barrel_8000_to_11999.csv"),
    )
    .unwrap();

    let response = engine.search("kernel", None).unwrap();
    assert_eq!(response.results.len(), 2);
    assert_eq!(response.diagnostics.missing_documents, vec![8010]);
    assert!(response.diagnostics.unreadable_barrels.is_empty());
}

#[test]
fn unreadable_posting_barrel_does_not_fail_other_terms() {
    let tmp = TempDir::new().unwrap();
    let engine = engine_with_docs(&tmp);

    let kernel = token_id(&engine.tokenizer().normalize_term("kernel").unwrap()).unwrap();
    let memory = token_id(&engine.tokenizer().normalize_term("memory").unwrap()).unwrap();
    let kernel_range = BarrelRange::aligned(kernel, 4000);
    assert_ne!(kernel_range, BarrelRange::aligned(memory, 4000));

    std::fs::write(
        tmp.path().join("barrels").join(kernel_range.posting_file_name()),
        "garbage header\n",
    )
    .unwrap();

    let response = engine.search("kernel memory", None).unwrap();
    let ids: Vec<u64> = response.results.iter().map(|r| r.document.id).collect();
    assert_eq!(ids, vec![8010]);
    assert_eq!(response.diagnostics.unreadable_barrels.len(), 1);
    assert!(response.diagnostics.is_partial());
}

#[test]
fn malformed_rows_are_counted_not_fatal() {
    let tmp = TempDir::new().unwrap();
    let engine = engine_with_docs(&tmp);

    let path = tmp
        .path()
        .join("DocumentBarrels")
        .join("barrel_0_to_3999.csv");
    let mut text = std::fs::read_to_string(&path).unwrap();
    text.push_str("oops,2024-01-01,1,kernel,b,[],[],\n");
    std::fs::write(&path, text).unwrap();

    let response = engine.search_term("kernel", None).unwrap();
    assert_eq!(response.results.len(), 3);
    assert_eq!(response.diagnostics.skipped_rows, 1);
}
