// bookstore-core/src/catalog.rs
// The walkthrough's requests, one function per step

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::book::{sample_catalog, AuthorBookCount, Book, DecadeGroup, GenrePriceSummary};
use crate::error::Result;
use crate::find_options::{FindOptions, SortDirection};
use crate::index::IndexSpec;
use crate::store::{BookStore, ExplainStats, UpdateOutcome};

pub const FICTION: &str = "Fiction";
pub const FANTASY: &str = "Fantasy";
pub const ORWELL: &str = "George Orwell";
pub const TOLKIEN: &str = "J.R.R. Tolkien";
pub const GATSBY: &str = "The Great Gatsby";
pub const ANIMAL_FARM: &str = "Animal Farm";
pub const HOBBIT: &str = "The Hobbit";

pub const GATSBY_NEW_PRICE: f64 = 11.99;
pub const PUBLISHED_AFTER: i64 = 1950;
pub const RECENT_AFTER: i64 = 2010;
pub const TOLKIEN_SINCE: i64 = 1950;
pub const PAGE_SIZE: usize = 5;
pub const TOP_AUTHORS: usize = 3;

fn decode<T: DeserializeOwned>(docs: Vec<Value>) -> Result<Vec<T>> {
    docs.into_iter()
        .map(|doc| serde_json::from_value(doc).map_err(Into::into))
        .collect()
}

fn find_books<S: BookStore + ?Sized>(store: &S, filter: Value) -> Result<Vec<Book>> {
    decode(store.find(&filter, &FindOptions::new())?)
}

// ========== Basic CRUD ==========

pub fn books_in_genre<S: BookStore + ?Sized>(store: &S, genre: &str) -> Result<Vec<Book>> {
    find_books(store, json!({"genre": genre}))
}

/// Books with `published_year` strictly greater than `year`
pub fn books_published_after<S: BookStore + ?Sized>(store: &S, year: i64) -> Result<Vec<Book>> {
    find_books(store, json!({"published_year": {"$gt": year}}))
}

pub fn books_by_author<S: BookStore + ?Sized>(store: &S, author: &str) -> Result<Vec<Book>> {
    find_books(store, json!({"author": author}))
}

/// Set the price of the first book with this title
///
/// Titles are treated as unique. When they are not, only the first match in
/// natural order changes and a warning is logged.
pub fn update_price<S: BookStore + ?Sized>(
    store: &S,
    title: &str,
    price: f64,
) -> Result<UpdateOutcome> {
    let filter = json!({"title": title});
    let copies = store.count_documents(&filter)?;
    if copies > 1 {
        warn!(title, copies, "title is not unique; updating the first match only");
    }
    store.update_one(&filter, &json!({"$set": {"price": price}}))
}

pub fn find_by_title<S: BookStore + ?Sized>(store: &S, title: &str) -> Result<Option<Book>> {
    store
        .find_one(&json!({"title": title}))?
        .map(|doc| serde_json::from_value(doc).map_err(Into::into))
        .transpose()
}

/// Delete one book by title; returns the deleted count (0 or 1)
pub fn delete_by_title<S: BookStore + ?Sized>(store: &S, title: &str) -> Result<u64> {
    store.delete_one(&json!({"title": title}))
}

// ========== Advanced queries ==========

pub fn in_stock_published_after<S: BookStore + ?Sized>(store: &S, year: i64) -> Result<Vec<Book>> {
    find_books(
        store,
        json!({"in_stock": true, "published_year": {"$gt": year}}),
    )
}

/// Books of a genre reduced to title, author and price
pub fn projected_by_genre<S: BookStore + ?Sized>(store: &S, genre: &str) -> Result<Vec<Value>> {
    let options = FindOptions::new().with_fields(&["title", "author", "price"]);
    store.find(&json!({"genre": genre}), &options)
}

/// Every book as `{title, price}`, ordered by price
pub fn sorted_by_price<S: BookStore + ?Sized>(
    store: &S,
    direction: SortDirection,
) -> Result<Vec<Value>> {
    let options = FindOptions::new()
        .with_sort("price", direction)
        .with_fields(&["title", "price"]);
    store.find(&json!({}), &options)
}

/// One page of `{title, author}` ordered by title; pages start at 1
pub fn page_by_title<S: BookStore + ?Sized>(
    store: &S,
    page: usize,
    page_size: usize,
) -> Result<Vec<Value>> {
    let mut options = FindOptions::new()
        .with_sort("title", SortDirection::Ascending)
        .with_limit(page_size)
        .with_fields(&["title", "author"]);
    let skip = page.saturating_sub(1) * page_size;
    if skip > 0 {
        options = options.with_skip(skip);
    }
    store.find(&json!({}), &options)
}

// ========== Aggregation ==========

pub fn genre_price_pipeline() -> Vec<Value> {
    vec![
        json!({"$group": {
            "_id": "$genre",
            "averagePrice": {"$avg": "$price"},
            "bookCount": {"$sum": 1}
        }}),
        json!({"$sort": {"averagePrice": -1}}),
    ]
}

pub fn top_authors_pipeline(limit: usize) -> Vec<Value> {
    vec![
        json!({"$group": {"_id": "$author", "bookCount": {"$sum": 1}}}),
        json!({"$sort": {"bookCount": -1}}),
        json!({"$limit": limit}),
    ]
}

pub fn decade_pipeline() -> Vec<Value> {
    vec![
        json!({"$project": {
            "title": 1,
            "published_year": 1,
            "decade": {"$subtract": [
                "$published_year",
                {"$mod": ["$published_year", 10]}
            ]}
        }}),
        json!({"$group": {
            "_id": "$decade",
            "bookCount": {"$sum": 1},
            "books": {"$push": "$title"}
        }}),
        json!({"$sort": {"_id": 1}}),
    ]
}

/// Average price and count per genre, most expensive genre first
pub fn average_price_by_genre<S: BookStore + ?Sized>(store: &S) -> Result<Vec<GenrePriceSummary>> {
    decode(store.aggregate(&genre_price_pipeline())?)
}

pub fn top_authors<S: BookStore + ?Sized>(store: &S, limit: usize) -> Result<Vec<AuthorBookCount>> {
    decode(store.aggregate(&top_authors_pipeline(limit))?)
}

pub fn books_by_decade<S: BookStore + ?Sized>(store: &S) -> Result<Vec<DecadeGroup>> {
    decode(store.aggregate(&decade_pipeline())?)
}

// ========== Indexing ==========

pub fn create_title_index<S: BookStore + ?Sized>(store: &S) -> Result<String> {
    store.create_index(&IndexSpec::ascending(&["title"]))
}

pub fn create_author_year_index<S: BookStore + ?Sized>(store: &S) -> Result<String> {
    store.create_index(&IndexSpec::ascending(&["author", "published_year"]))
}

pub fn explain_title_lookup<S: BookStore + ?Sized>(store: &S, title: &str) -> Result<ExplainStats> {
    store.explain_find(&json!({"title": title}))
}

pub fn explain_author_since<S: BookStore + ?Sized>(
    store: &S,
    author: &str,
    year: i64,
) -> Result<ExplainStats> {
    store.explain_find(&json!({"author": author, "published_year": {"$gte": year}}))
}

// ========== Seeding ==========

/// Insert the sample catalog, optionally clearing the collection first
///
/// Returns the number of inserted books.
pub fn seed_catalog<S: BookStore + ?Sized>(store: &S, drop_existing: bool) -> Result<usize> {
    if drop_existing {
        let removed = store.delete_many(&json!({}))?;
        info!(removed, "cleared collection before seeding");
    }
    let docs = sample_catalog()
        .iter()
        .map(Book::to_document)
        .collect::<serde_json::Result<Vec<_>>>()?;
    let inserted = store.insert_many(docs)?;
    info!(inserted, backend = store.backend(), "seeded sample catalog");
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new("books");
        seed_catalog(&store, false).unwrap();
        store
    }

    #[test]
    fn test_seed_drop_replaces_collection() {
        let store = seeded();
        assert_eq!(store.len(), 12);
        assert_eq!(seed_catalog(&store, true).unwrap(), 12);
        assert_eq!(store.len(), 12);
        assert_eq!(seed_catalog(&store, false).unwrap(), 12);
        assert_eq!(store.len(), 24);
    }

    #[test]
    fn test_update_price_with_duplicate_titles_touches_first() {
        let store = seeded();
        seed_catalog(&store, false).unwrap();

        let outcome = update_price(&store, GATSBY, GATSBY_NEW_PRICE).unwrap();
        assert_eq!(outcome, UpdateOutcome { matched: 1, modified: 1 });

        let prices: Vec<f64> = books_in_genre(&store, FICTION)
            .unwrap()
            .into_iter()
            .filter(|b| b.title == GATSBY)
            .map(|b| b.price)
            .collect();
        assert_eq!(prices, vec![11.99, 9.99]);
    }

    #[test]
    fn test_update_price_missing_title() {
        let store = seeded();
        let outcome = update_price(&store, "Ulysses", 5.0).unwrap();
        assert_eq!(outcome, UpdateOutcome::default());
        assert!(find_by_title(&store, "Ulysses").unwrap().is_none());
    }

    #[test]
    fn test_projected_by_genre_shape() {
        let store = seeded();
        let docs = projected_by_genre(&store, FANTASY).unwrap();
        assert_eq!(docs.len(), 2);
        for doc in &docs {
            let keys: Vec<&String> = doc.as_object().unwrap().keys().collect();
            assert_eq!(keys, vec!["title", "author", "price"]);
        }
    }

    #[test]
    fn test_sorted_by_price_both_directions() {
        let store = seeded();
        let asc = sorted_by_price(&store, SortDirection::Ascending).unwrap();
        let desc = sorted_by_price(&store, SortDirection::Descending).unwrap();
        assert_eq!(asc.first().unwrap()["title"], "Pride and Prejudice");
        assert_eq!(desc.first().unwrap()["title"], "The Lord of the Rings");
        assert!(asc[0].get("_id").is_none());
        assert_eq!(asc.len(), desc.len());
    }

    #[test]
    fn test_page_zero_is_first_page() {
        let store = seeded();
        assert_eq!(
            page_by_title(&store, 0, PAGE_SIZE).unwrap(),
            page_by_title(&store, 1, PAGE_SIZE).unwrap()
        );
    }

    #[test]
    fn test_top_authors_limit() {
        let store = seeded();
        let rows = top_authors(&store, TOP_AUTHORS).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].book_count, 2);
        assert_eq!(rows[1].book_count, 2);
        assert_eq!(rows[2].book_count, 1);
    }

    #[test]
    fn test_explain_uses_compound_index() {
        let store = seeded();
        let before = explain_author_since(&store, TOLKIEN, TOLKIEN_SINCE).unwrap();
        assert_eq!(before.index_name, None);
        assert_eq!(before.docs_examined, 12);

        create_author_year_index(&store).unwrap();
        let after = explain_author_since(&store, TOLKIEN, TOLKIEN_SINCE).unwrap();
        assert_eq!(after.index_name.as_deref(), Some("author_1_published_year_1"));
        assert_eq!(after.docs_returned, 1);
        assert_eq!(after.docs_examined, 1);
    }
}
