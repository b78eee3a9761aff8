// Driver report tests: output captured into a Vec<u8>
use bookstore_core::catalog::seed_catalog;
use bookstore_core::{BookstoreError, MemoryStore, QueryDriver};

fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new("books");
    seed_catalog(&store, false).unwrap();
    store
}

fn run_report(store: &MemoryStore) -> String {
    let mut driver = QueryDriver::new(store, Vec::new());
    driver.run_all().unwrap();
    String::from_utf8(driver.into_inner()).unwrap()
}

#[test]
fn test_basic_crud_section() {
    let store = seeded_store();
    let out = run_report(&store);

    assert!(out.starts_with("=== TASK 2: Basic CRUD Operations ===\n\n1. All Fiction books:\n"));
    assert!(out.contains("   - \"To Kill a Mockingbird\" by Harper Lee\n"));
    assert!(out.contains("\n2. Books published after 1950:\n"));
    assert!(out.contains("   - \"The Catcher in the Rye\" (1951)\n"));
    assert!(out.contains("\n3. Books by George Orwell:\n   - \"1984\" (1949)\n   - \"Animal Farm\" (1945)\n"));
    assert!(out.contains("4. Updating price of \"The Great Gatsby\"...\n   Modified 1 document(s)\n   New price: $11.99\n"));
    assert!(out.contains("5. Deleting \"Animal Farm\"...\n   Deleted 1 document(s)\n"));
    assert_eq!(store.len(), 11);
}

#[test]
fn test_advanced_queries_section() {
    let store = seeded_store();
    let out = run_report(&store);

    assert!(out.contains("\n\n=== TASK 3: Advanced Queries ===\n\n"));
    // Nothing in the sample catalog is newer than 2010
    assert!(out.contains("1. Books in stock and published after 2010:\n   (none)\n"));
    assert!(out.contains("     {\n       \"title\": \"The Hobbit\",\n       \"author\": \"J.R.R. Tolkien\",\n"));
    assert!(out.contains("\n5. Pagination - Page 1 (5 books):\n"));
    assert!(out.contains("\n6. Pagination - Page 2 (5 books):\n"));

    let start = out.find("TASK 3").unwrap();
    let end = out.find("TASK 4").unwrap();
    assert!(!out[start..end].contains("\"_id\""));
}

#[test]
fn test_aggregation_and_indexing_sections() {
    let store = seeded_store();
    let out = run_report(&store);

    assert!(out.contains("\n\n=== TASK 4: Aggregation Pipeline ===\n\n1. Average price by genre:\n"));
    assert!(out.contains("\"averagePrice\""));
    assert!(out.contains("\n2. Author with most books:\n"));
    assert!(out.contains("\n3. Books grouped by publication decade:\n"));
    assert!(out.contains("\"_id\": 1810"));

    assert!(out.contains("1. Creating index on title field...\n   Index created on title field (title_1)\n"));
    assert!(out.contains(
        "   Compound index created on author and published_year (author_1_published_year_1)\n"
    ));
    assert!(out.contains("3. Performance analysis with explain():\n   Query with index:\n   Documents examined: 1\n   Index keys examined: 1\n"));
    assert!(out.contains("\n4. Compound index performance:\n   Documents examined: 1\n"));
    assert_eq!(store.index_names(), vec!["title_1", "author_1_published_year_1"]);
}

#[test]
fn test_second_run_is_stable() {
    let store = seeded_store();
    run_report(&store);
    let out = run_report(&store);

    // Price already 11.99, Animal Farm already gone, indexes already there
    assert!(out.contains("   Modified 0 document(s)\n   New price: $11.99\n"));
    assert!(out.contains("   Deleted 0 document(s)\n"));
    assert!(out.contains("(title_1)"));
    assert_eq!(store.index_names().len(), 2);
}

#[test]
fn test_missing_gatsby_aborts_remaining_steps() {
    let store = seeded_store();
    bookstore_core::catalog::delete_by_title(&store, "The Great Gatsby").unwrap();

    let mut driver = QueryDriver::new(&store, Vec::new());
    let err = driver.run_all().unwrap_err();
    assert!(matches!(err, BookstoreError::DocumentNotFound(_)));

    let out = String::from_utf8(driver.into_inner()).unwrap();
    assert!(out.contains("   Modified 0 document(s)\n"));
    assert!(!out.contains("5. Deleting"));
    // Nothing after the failure ran
    assert_eq!(store.len(), 11);
    assert!(store.index_names().is_empty());
}
