//! Integration tests for indexing and querying through the public API.

use pretty_assertions::assert_eq;
use searchdb::query::{parse, tokenize};
use searchdb::{DatabaseFlags, DocumentHandle, FunctionCall, QueryErrorKind, SearchDatabase, SearchResult};
use searchdb::database::DatabaseView;
use std::collections::BTreeSet;
use std::time::{Duration, Instant};

fn names(db: &SearchDatabase, results: &[SearchResult]) -> BTreeSet<String> {
    results
        .iter()
        .filter_map(|r| db.document_name(r.id))
        .collect()
}

fn query_names(db: &SearchDatabase, query: &str) -> BTreeSet<String> {
    let results = db.query_sync(query).unwrap_or_else(|e| panic!("{query}: {e}"));
    names(db, &results)
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn error_kind(db: &SearchDatabase, query: &str) -> QueryErrorKind {
    db.query_sync(query).unwrap_err().kind
}

fn wait_for(db: &SearchDatabase, handle: searchdb::QueryHandle) {
    let start = Instant::now();
    while !db.query_is_completed(handle) {
        assert!(start.elapsed() < Duration::from_secs(10), "query did not complete");
        std::thread::sleep(Duration::from_millis(1));
    }
}

// ============================================================================
// Fixtures
// ============================================================================

fn desserts() -> SearchDatabase {
    let db = SearchDatabase::default();
    for (name, text) in [("doc1", "apple pie"), ("doc2", "apple tart"), ("doc3", "banana split")] {
        let doc = db.add_document(name);
        assert!(db.index_text(doc, text, true));
    }
    db
}

fn people() -> SearchDatabase {
    let db = SearchDatabase::default();
    let people = [
        ("joe", "joe smith", 40.0, 1.8, 80.0, "retired", "Jonathan"),
        ("bob", "bob smith", 55.0, 1.6, 90.0, "manager", "Robert"),
        ("will", "will schmidt", 14.0, 1.79, 70.0, "student", "William"),
        ("mel", "mel cadotte", 39.0, 1.7, 60.0, "hr", "Mélanie"),
        ("mag", "mag cadotte schmidt", 10.0, 1.6, 40.0, "student", "Magaly"),
        ("yolland", "yolland smitton", 101.0, 1.5, 40.0, "retired", "Yolland"),
    ];
    for (id, text, age, height, weight, job, name) in people {
        let doc = db.add_document(id);
        let indexed = db.update_document(doc, |writer| {
            writer.index_text(text, true)
                && writer.index_property("age", age, true)
                && writer.index_property("height", height, true)
                && writer.index_property("weight", weight, true)
                && writer.index_property("job", job, true)
                && writer.index_property("name", name, true)
        });
        assert_eq!(indexed, Some(true), "{id}");
    }
    db
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_dessert_scenario() {
    let db = desserts();
    assert_eq!(query_names(&db, "apple"), set(&["doc1", "doc2"]));
    assert_eq!(query_names(&db, "apple and tart"), set(&["doc2"]));
    assert_eq!(query_names(&db, "-apple"), set(&["doc3"]));
    assert_eq!(query_names(&db, "apple or banana"), set(&["doc1", "doc2", "doc3"]));
}

#[test]
fn test_numeric_property_scenario() {
    let db = SearchDatabase::default();
    let doc = db.add_document("stock");
    assert!(db.index_property(doc, "price", 150.0, true));

    assert_eq!(query_names(&db, "price>100"), set(&["stock"]));
    assert!(query_names(&db, "price<100").is_empty());
    assert_eq!(query_names(&db, "price=150"), set(&["stock"]));
    assert!(query_names(&db, "price!=150").is_empty());
    assert_eq!(query_names(&db, "price!=149"), set(&["stock"]));
}

#[test]
fn test_people_queries() {
    let db = people();
    let cases: &[(&str, &[&str])] = &[
        ("smith", &["joe", "bob"]),
        ("SMITH OR CADOTTE", &["joe", "bob", "mel", "mag"]),
        ("schmidt and CADOTTE", &["mag"]),
        ("(schmidt or CADOTTE) and (joe or will)", &["will"]),
        ("smit or pascal", &["joe", "bob", "yolland"]),
        ("(((smit) or (pascal)) or ((will)))", &["joe", "bob", "yolland", "will"]),
        ("((schmidt) (cAdoTtE)) or (yoll smitt)", &["mag", "yolland"]),
        ("cadotte -schmidt", &["mel"]),
        ("-cadotte or -schmidt", &["joe", "bob", "will", "mel", "yolland"]),
        ("-cadotte AND -\"schmidt\"", &["joe", "bob", "yolland"]),
        ("age=40 or age:40", &["joe"]),
        ("-age=40", &["bob", "will", "mel", "mag", "yolland"]),
        ("age<40", &["will", "mel", "mag"]),
        ("age<40 and age>=14", &["mel", "will"]),
        ("(job=retire age>14 weight>40) or (job=student)", &["joe", "will", "mag"]),
        ("-job=retire age>14", &["mel", "bob"]),
        ("age>14 -job:RET", &["mel", "bob"]),
        ("-age>-100 name:smi", &[]),
        ("name=MÉlanie cadotte age>=39", &["mel"]),
    ];

    for (query, expected) in cases {
        assert_eq!(query_names(&db, query), set(expected), "{query}");
    }
}

#[test]
fn test_date_properties() {
    let db = SearchDatabase::default();
    let old = db.add_document("old");
    let new = db.add_document("new");
    let date = |s: &str| chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
    assert!(db.index_date_property(old, "listed", date("1999-03-10")));
    assert!(db.index_date_property(new, "listed", date("2021-07-01")));

    assert_eq!(query_names(&db, "listed>=2020-01-01"), set(&["new"]));
    assert_eq!(query_names(&db, "listed<2020-01-01"), set(&["old"]));
    assert_eq!(query_names(&db, "listed=1999-03-10"), set(&["old"]));
    assert_eq!(query_names(&db, "listed>1999-03-10"), set(&["new"]));
}

#[test]
fn test_string_property_comparisons() {
    let db = SearchDatabase::default();
    for (name, sector) in [("xom", "Energy"), ("aapl", "Technology"), ("jnj", "Healthcare")] {
        let doc = db.add_document(name);
        db.index_property(doc, "sector", sector, true);
    }

    assert_eq!(query_names(&db, "sector=tech"), set(&["aapl"]));
    assert_eq!(query_names(&db, "sector:olog"), set(&["aapl"]));
    assert_eq!(query_names(&db, "sector!=energy"), set(&["aapl", "jnj"]));
    assert_eq!(query_names(&db, "sector<h"), set(&["xom"]));
    assert_eq!(query_names(&db, "sector>=healthcare"), set(&["aapl", "jnj"]));

    let bonds = db.add_document("agg");
    db.index_property(bonds, "sector", "Bonds", true);
    assert_eq!(query_names(&db, "sector=Bonds"), set(&["agg"]));
    assert_eq!(query_names(&db, "sector:Bonds"), set(&["agg"]));
    assert_eq!(query_names(&db, "sector:bonds"), set(&["agg"]));
    assert_eq!(query_names(&db, "sector>=bonds sector<=bonds"), set(&["agg"]));
    assert_eq!(query_names(&db, "sector<c"), set(&["agg"]));
}

#[test]
fn test_ranking() {
    let db = SearchDatabase::default();
    let exact = db.add_document("exact");
    let word = db.add_document("word");
    let prefix = db.add_document("prefix");
    db.index_exact_match(exact, "apple", false);
    db.index_word(word, "apple", true);
    db.index_word(prefix, "applesauce", true);

    let results = db.query_sync("apple").unwrap();
    let order: Vec<DocumentHandle> = results.iter().map(|r| r.id).collect();
    assert_eq!(order, vec![exact, word, prefix]);
    assert!(results[0].score > results[1].score && results[1].score > results[2].score);
}

// ============================================================================
// Properties of the query language
// ============================================================================

#[test]
fn test_token_sources_reparse_to_same_tree() {
    let queries = [
        "apple banana",
        "  (a or b) and -c  ",
        "price>=10 \"big deal\" not old",
        "len(name)>5 or sector=tech",
        "--a or (b (c or d))",
    ];
    for query in queries {
        let tokens = tokenize(query).unwrap();
        let start = tokens.first().unwrap().span.start;
        let end = tokens.last().unwrap().span.end;
        let rejoined = &query[start..end];
        assert_eq!(
            parse(rejoined).unwrap().to_string(),
            parse(query).unwrap().to_string(),
            "{query}"
        );
        for token in &tokens {
            assert_eq!(&query[token.span.clone()], token.source);
        }
    }
}

#[test]
fn test_implicit_and_matches_explicit_and() {
    let db = desserts();
    assert_eq!(parse("apple banana").unwrap().to_string(), "(and apple banana)");
    assert_eq!(query_names(&db, "apple pie"), query_names(&db, "apple and pie"));
    assert_eq!(query_names(&db, "apple pie"), set(&["doc1"]));
}

#[test]
fn test_de_morgan() {
    let db = people();
    for (a, b) in [("smith", "joe"), ("cadotte", "schmidt"), ("age>30", "job=retire")] {
        assert_eq!(
            query_names(&db, &format!("-({a} and {b})")),
            query_names(&db, &format!("(-{a} or -{b})")),
            "{a} {b}"
        );
        assert_eq!(
            query_names(&db, &format!("-({a} or {b})")),
            query_names(&db, &format!("(-{a} and -{b})")),
            "{a} {b}"
        );
    }
}

#[test]
fn test_idempotent_indexing() {
    let db = SearchDatabase::default();
    let doc = db.add_document("doc");
    db.index_word(doc, "hello", true);
    let count = db.word_document_count("hello", true);
    let keys = db.index_count();
    db.index_word(doc, "hello", true);
    assert_eq!(db.word_document_count("hello", true), count);
    assert_eq!(db.index_count(), keys);
}

#[test]
fn test_removed_documents_never_match() {
    let db = desserts();
    let doc1 = db.find_document("doc1").unwrap();
    db.index_property(doc1, "price", 4.0, true);
    assert!(db.remove_document(doc1));

    assert!(!db.is_document_valid(doc1));
    for query in ["apple", "pie", "-banana", "price=4", "appl", "-nothing"] {
        let results = db.query_sync(query).unwrap();
        assert!(results.iter().all(|r| r.id != doc1), "{query}");
    }
    assert!(!db.index_word(doc1, "again", true));
    assert_eq!(db.word_document_count("pie", false), 0);
}

#[test]
fn test_grouping_changes_results() {
    let db = SearchDatabase::default();
    for (name, text) in [("a1", "alpha"), ("a2", "alpha"), ("a3", "alpha"), ("bc", "beta gamma"), ("c", "gamma")] {
        let doc = db.add_document(name);
        db.index_text(doc, text, true);
    }
    let grouped_right = query_names(&db, "alpha or (beta and gamma)");
    let grouped_left = query_names(&db, "(alpha or beta) and gamma");
    assert_eq!(grouped_right, set(&["a1", "a2", "a3", "bc"]));
    assert_eq!(grouped_left, set(&["bc"]));
}

#[test]
fn test_error_cases() {
    let db = desserts();
    assert_eq!(error_kind(&db, "(a"), QueryErrorKind::UnexpectedGroupEnd);
    assert_eq!(error_kind(&db, "\"a"), QueryErrorKind::UnexpectedQuoteEnd);
    assert_eq!(error_kind(&db, "a and"), QueryErrorKind::MissingAndRightOperand);
    assert_eq!(error_kind(&db, "a or"), QueryErrorKind::MissingOrRightOperand);
    assert_eq!(error_kind(&db, "and a"), QueryErrorKind::MissingLeftOperand);
    assert_eq!(error_kind(&db, "name=(a b)"), QueryErrorKind::InvalidPropertyDeclaration);
}

// ============================================================================
// Functions, async queries, persistence
// ============================================================================

fn ticker_suffix(call: &FunctionCall<'_>, view: &DatabaseView<'_>) -> Vec<SearchResult> {
    let suffix = call.arguments.trim().to_ascii_lowercase();
    view.documents()
        .filter(|&doc| {
            view.document_name(doc)
                .is_some_and(|name| name.to_ascii_lowercase().ends_with(&suffix))
        })
        .map(|doc| SearchResult::new(doc, 10))
        .collect()
}

#[test]
fn test_function_leaves() {
    let db = SearchDatabase::new(DatabaseFlags::INDEX_DOCUMENT_NAME);
    for name in ["AAPL.US", "SHOP.TO", "MSFT.US"] {
        db.add_document(name);
    }
    db.register_function("exchange", ticker_suffix);

    let results = db.query_sync("exchange(.us)").unwrap();
    assert_eq!(names(&db, &results), set(&["AAPL.US", "MSFT.US"]));
    let results = db.query_sync("-exchange(.us)").unwrap();
    assert_eq!(names(&db, &results), set(&["SHOP.TO"]));
    assert!(db.query_sync("unknown(.us)").unwrap().is_empty());
}

#[test]
fn test_async_queries() {
    let db = people();
    let handles: Vec<_> = ["smith", "age<40", "-cadotte"]
        .into_iter()
        .map(|q| db.query(q).unwrap())
        .collect();

    let mut seen = BTreeSet::new();
    for handle in &handles {
        assert!(seen.insert(handle.0), "handles are unique");
        wait_for(&db, *handle);
    }

    assert_eq!(names(&db, &db.query_results(handles[0]).unwrap()), set(&["joe", "bob"]));
    assert_eq!(db.query_results(handles[1]).unwrap().len(), 3);
    assert_eq!(db.query_text(handles[2]).as_deref(), Some("-cadotte"));

    for handle in handles {
        assert!(db.query_dispose(handle));
    }
}

#[test]
fn test_concurrent_indexing_and_queries() {
    let db = SearchDatabase::default();
    let writer = {
        let db = db.clone();
        std::thread::spawn(move || {
            for i in 0..200u32 {
                let doc = db.add_document(&format!("doc{i}"));
                db.update_document(doc, |w| {
                    w.index_text("shared words here", true);
                    w.index_property("rank", f64::from(i), true)
                });
            }
        })
    };

    for _ in 0..50 {
        let results = db.query_sync("shared rank>=0").unwrap();
        // Each document is indexed atomically, so every visible match has both facts
        for result in &results {
            assert!(db.document_property(result.id, "rank").is_some());
        }
    }
    writer.join().unwrap();
    assert_eq!(db.query_sync("shared rank>=0").unwrap().len(), 200);
}

#[test]
fn test_persistence_roundtrip() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let path = temp_dir.path().join("people.json");

    let db = people();
    let removed = db.find_document("bob").unwrap();
    db.remove_document(removed);
    db.save_to_path(&path).unwrap();
    assert!(!db.is_dirty());

    let loaded = SearchDatabase::load_from_path(&path).unwrap();
    assert_eq!(loaded.document_count(), 5);
    assert_eq!(loaded.index_count(), db.index_count());
    assert_eq!(loaded.word_count(), db.word_count());
    assert_eq!(query_names(&loaded, "smith"), set(&["joe"]));
    assert_eq!(query_names(&loaded, "height>1.75"), set(&["joe", "will"]));

    let height = loaded
        .document_property(loaded.find_document("will").unwrap(), "height")
        .and_then(|v| v.as_number())
        .unwrap();
    assert!((height - 1.79).abs() <= 1e-9 * 1.79);

    let next = loaded.add_document("new");
    assert!(next > removed);
}

#[test]
fn test_load_missing_database() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let err = SearchDatabase::load_from_path(&temp_dir.path().join("none.json")).unwrap_err();
    assert!(matches!(err, searchdb::SearchError::DatabaseNotFound(_)));
}
