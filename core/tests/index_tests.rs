use std::collections::HashMap;

use quarry_core::{
    open_index, MemoryIndex, QueryResult, SqliteIndex, TfIndex, UnsupportedIndexExtension,
};
use tempfile::TempDir;

const LN_2: f64 = std::f64::consts::LN_2;
const TOLERANCE: f64 = 1e-9;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Both backends behind the shared contract; the SQLite one lives in a
/// fresh temporary database.
fn backends(dir: &TempDir) -> Vec<Box<dyn TfIndex>> {
    vec![
        Box::new(MemoryIndex::new()),
        Box::new(SqliteIndex::new(dir.path().join("index.db"))),
    ]
}

fn assert_scores(results: &[QueryResult], expected: &[(&str, f64)]) {
    let got: Vec<(&str, f64)> = results
        .iter()
        .map(|r| (r.doc_id.as_str(), r.score))
        .collect();
    assert_eq!(got.len(), expected.len(), "got {got:?}, expected {expected:?}");
    for ((doc, score), (expected_doc, expected_score)) in got.iter().zip(expected) {
        assert_eq!(doc, expected_doc);
        assert!(
            (score - expected_score).abs() < TOLERANCE,
            "score for {doc}: got {score}, expected {expected_score}"
        );
    }
}

#[test]
fn reducer_sums_to_the_sequence_length() {
    let tokens = strings(&["red", "blue", "red", "red", "green", "blue"]);
    let frequencies = quarry_core::term_frequency(&tokens);
    assert_eq!(frequencies.values().sum::<u64>() as usize, tokens.len());
    let mut keys: Vec<&str> = frequencies.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(keys, vec!["blue", "green", "red"]);
    assert_eq!(frequencies["red"], 3);
}

#[test]
fn empty_corpus_returns_nothing() {
    let dir = TempDir::new().unwrap();
    for mut index in backends(&dir) {
        let results = index.query_top_n(&strings(&["x"]), 10).unwrap();
        assert!(results.is_empty());
    }
}

#[test]
fn term_in_every_document_scores_zero_and_is_filtered() {
    let dir = TempDir::new().unwrap();
    for mut index in backends(&dir) {
        index
            .update("docA", strings(&["alpha", "beta", "alpha"]))
            .unwrap();
        // idf(alpha) = ln(1/1) = 0, so the only document scores zero and
        // zero scores never appear in results.
        assert!(index.query(&strings(&["alpha"])).unwrap().is_empty());
        assert!(index
            .query_top_n(&strings(&["alpha"]), 10)
            .unwrap()
            .is_empty());
    }
}

#[test]
fn discriminating_term_ranks_its_document() {
    let dir = TempDir::new().unwrap();
    for mut index in backends(&dir) {
        index
            .bulk_update(HashMap::from([
                ("docA".to_string(), strings(&["alpha", "beta"])),
                ("docB".to_string(), strings(&["beta", "gamma"])),
            ]))
            .unwrap();
        let results = index.query_top_n(&strings(&["alpha"]), 10).unwrap();
        assert_scores(&results, &[("docA", LN_2)]);
        // beta appears in both documents, so ln(2/2) = 0 and nothing ranks.
        assert!(index
            .query_top_n(&strings(&["beta"]), 10)
            .unwrap()
            .is_empty());
    }
}

#[test]
fn multi_token_query_sums_per_token_scores() {
    let dir = TempDir::new().unwrap();
    for mut index in backends(&dir) {
        index
            .bulk_update(HashMap::from([
                ("docA".to_string(), strings(&["alpha", "beta"])),
                ("docB".to_string(), strings(&["beta", "gamma"])),
            ]))
            .unwrap();
        let results = index
            .query_top_n(&strings(&["alpha", "gamma"]), 10)
            .unwrap();
        // Tied scores break on ascending document id.
        assert_scores(&results, &[("docA", LN_2), ("docB", LN_2)]);
    }
}

#[test]
fn duplicate_query_tokens_count_once() {
    let dir = TempDir::new().unwrap();
    for mut index in backends(&dir) {
        index.update("docA", strings(&["alpha"])).unwrap();
        index.update("docB", strings(&["gamma"])).unwrap();
        let single = index.query(&strings(&["alpha"])).unwrap();
        let repeated = index
            .query(&strings(&["alpha", "alpha", "alpha"]))
            .unwrap();
        assert_eq!(single, repeated);
    }
}

#[test]
fn reingestion_replaces_the_document() {
    let dir = TempDir::new().unwrap();
    for mut index in backends(&dir) {
        index.update("docA", strings(&["alpha"])).unwrap();
        index.update("docB", strings(&["delta"])).unwrap();
        index.update("docA", strings(&["beta"])).unwrap();
        // alpha belonged to the first ingestion of docA only.
        assert!(index
            .query_top_n(&strings(&["alpha"]), 10)
            .unwrap()
            .is_empty());
        let results = index.query_top_n(&strings(&["beta"]), 10).unwrap();
        assert_scores(&results, &[("docA", LN_2)]);
    }
}

#[test]
fn top_n_truncates_and_zero_means_empty() {
    let dir = TempDir::new().unwrap();
    for mut index in backends(&dir) {
        index
            .bulk_update(HashMap::from([
                ("docA".to_string(), strings(&["alpha", "alpha", "alpha"])),
                ("docB".to_string(), strings(&["alpha", "alpha"])),
                ("docC".to_string(), strings(&["alpha"])),
                ("docD".to_string(), strings(&["other"])),
            ]))
            .unwrap();
        let all = index.query(&strings(&["alpha"])).unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|w| w[0].score >= w[1].score));
        let top_two = index.query_top_n(&strings(&["alpha"]), 2).unwrap();
        assert_eq!(&all[..2], &top_two[..]);
        assert!(index
            .query_top_n(&strings(&["alpha"]), 0)
            .unwrap()
            .is_empty());
    }
}

#[test]
fn backends_rank_identically() {
    let dir = TempDir::new().unwrap();
    let corpus = HashMap::from([
        ("a".to_string(), strings(&["red", "green", "red", "blue"])),
        ("b".to_string(), strings(&["green", "blue"])),
        ("c".to_string(), strings(&["blue", "yellow", "yellow"])),
        ("d".to_string(), strings(&["red", "yellow"])),
    ]);
    let queries = [
        strings(&["red"]),
        strings(&["yellow", "green"]),
        strings(&["red", "green", "blue", "yellow"]),
        strings(&["missing"]),
    ];
    let mut memory = MemoryIndex::new();
    let mut sqlite = SqliteIndex::new(dir.path().join("index.db"));
    memory.bulk_update(corpus.clone()).unwrap();
    sqlite.bulk_update(corpus).unwrap();
    for query in &queries {
        let from_memory = memory.query(query).unwrap();
        let from_sqlite = sqlite.query(query).unwrap();
        assert_eq!(from_memory.len(), from_sqlite.len(), "query {query:?}");
        for (m, s) in from_memory.iter().zip(&from_sqlite) {
            assert_eq!(m.doc_id, s.doc_id, "query {query:?}");
            assert!(
                (m.score - s.score).abs() < TOLERANCE,
                "query {query:?}: {} vs {}",
                m.score,
                s.score
            );
        }
    }
}

#[test]
fn json_dump_round_trips() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("index.json");
    let mut index = MemoryIndex::new();
    index
        .bulk_update(HashMap::from([
            ("a".to_string(), strings(&["red", "green"])),
            ("b".to_string(), strings(&["green", "blue"])),
            ("c".to_string(), strings(&["blue", "red", "red"])),
        ]))
        .unwrap();
    index.dump(&path).unwrap();
    let mut reloaded = MemoryIndex::load(&path).unwrap();
    for query in [strings(&["red"]), strings(&["green", "blue"])] {
        assert_eq!(
            index.query(&query).unwrap(),
            reloaded.query(&query).unwrap()
        );
    }
}

#[test]
fn sqlite_index_persists_across_handles() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("index.db");
    {
        let mut index = SqliteIndex::new(&path);
        index.update("docA", strings(&["alpha"])).unwrap();
        index.update("docB", strings(&["gamma"])).unwrap();
        index.close().unwrap();
    }
    let mut index = SqliteIndex::new(&path);
    let results = index.query_top_n(&strings(&["alpha"]), 10).unwrap();
    assert_scores(&results, &[("docA", LN_2)]);
}

#[test]
fn malformed_json_index_fails_to_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("index.json");
    std::fs::write(&path, "not an index").unwrap();
    assert!(MemoryIndex::load(&path).is_err());
}

#[test]
fn open_index_rejects_unknown_extensions_and_missing_files() {
    let dir = TempDir::new().unwrap();
    let stray = dir.path().join("index.bin");
    std::fs::write(&stray, "").unwrap();
    // Unknown extensions surface as the configuration-failure type.
    let err = open_index(&stray).unwrap_err();
    assert!(err.downcast_ref::<UnsupportedIndexExtension>().is_some());
    assert!(open_index(&dir.path().join("absent.db")).is_err());
}

#[test]
fn json_dump_can_be_reloaded_and_extended() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("index.json");
    let mut index = MemoryIndex::new();
    index.update("docA", strings(&["alpha"])).unwrap();
    index.dump(&path).unwrap();

    // A second build run loads the dump and ingests on top of it.
    let mut index = MemoryIndex::load(&path).unwrap();
    index.update("docB", strings(&["gamma"])).unwrap();
    index.dump(&path).unwrap();

    let mut reloaded = MemoryIndex::load(&path).unwrap();
    let results = reloaded.query_top_n(&strings(&["alpha"]), 10).unwrap();
    assert_scores(&results, &[("docA", LN_2)]);
    let results = reloaded.query_top_n(&strings(&["gamma"]), 10).unwrap();
    assert_scores(&results, &[("docB", LN_2)]);
}

#[test]
fn open_index_dispatches_on_extension() {
    let dir = TempDir::new().unwrap();
    let json_path = dir.path().join("index.json");
    let mut memory = MemoryIndex::new();
    memory.update("docA", strings(&["alpha"])).unwrap();
    memory.update("docB", strings(&["gamma"])).unwrap();
    memory.dump(&json_path).unwrap();

    let db_path = dir.path().join("index.db");
    let mut sqlite = SqliteIndex::new(&db_path);
    sqlite.update("docA", strings(&["alpha"])).unwrap();
    sqlite.update("docB", strings(&["gamma"])).unwrap();
    sqlite.close().unwrap();

    for path in [json_path, db_path] {
        let mut index = open_index(&path).unwrap();
        let results = index.query_top_n(&strings(&["alpha"]), 10).unwrap();
        assert_scores(&results, &[("docA", LN_2)]);
    }
}
