// bookstore-core/src/book.rs
// Book documents, aggregation rows and the sample catalog

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A book document in the `books` collection
///
/// Extra fields (`_id`, anything added later) are ignored when reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub title: String,
    pub author: String,
    pub genre: String,
    pub published_year: i64,
    pub price: f64,
    pub in_stock: bool,
}

impl Book {
    pub fn new(
        title: &str,
        author: &str,
        genre: &str,
        published_year: i64,
        price: f64,
        in_stock: bool,
    ) -> Self {
        Self {
            title: title.to_string(),
            author: author.to_string(),
            genre: genre.to_string(),
            published_year,
            price,
            in_stock,
        }
    }

    pub fn to_document(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

/// Row of the average-price-by-genre pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenrePriceSummary {
    #[serde(rename = "_id")]
    pub genre: Option<String>,
    #[serde(rename = "averagePrice")]
    pub average_price: Option<f64>,
    #[serde(rename = "bookCount")]
    pub book_count: i64,
}

/// Row of the books-per-author pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorBookCount {
    #[serde(rename = "_id")]
    pub author: Option<String>,
    #[serde(rename = "bookCount")]
    pub book_count: i64,
}

/// Row of the books-by-decade pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecadeGroup {
    #[serde(rename = "_id")]
    pub decade: Option<i64>,
    #[serde(rename = "bookCount")]
    pub book_count: i64,
    pub books: Vec<String>,
}

/// `published_year - (published_year mod 10)`
pub fn decade_of(year: i64) -> i64 {
    year - year % 10
}

/// The twelve books the exercise seeds into `plp_bookstore.books`
pub fn sample_catalog() -> Vec<Book> {
    vec![
        Book::new("To Kill a Mockingbird", "Harper Lee", "Fiction", 1960, 12.99, true),
        Book::new("1984", "George Orwell", "Dystopian", 1949, 10.99, true),
        Book::new("The Great Gatsby", "F. Scott Fitzgerald", "Fiction", 1925, 9.99, true),
        Book::new("Brave New World", "Aldous Huxley", "Dystopian", 1932, 11.50, false),
        Book::new("The Hobbit", "J.R.R. Tolkien", "Fantasy", 1937, 14.99, true),
        Book::new("The Catcher in the Rye", "J.D. Salinger", "Fiction", 1951, 8.99, true),
        Book::new("Pride and Prejudice", "Jane Austen", "Romance", 1813, 7.99, true),
        Book::new("The Lord of the Rings", "J.R.R. Tolkien", "Fantasy", 1954, 19.99, true),
        Book::new("Animal Farm", "George Orwell", "Political Satire", 1945, 8.50, false),
        Book::new("The Alchemist", "Paulo Coelho", "Fiction", 1988, 10.99, true),
        Book::new("Moby Dick", "Herman Melville", "Adventure", 1851, 12.50, false),
        Book::new("Wuthering Heights", "Emily Brontë", "Gothic Fiction", 1847, 9.99, true),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_book_ignores_extra_fields() {
        let doc = json!({
            "_id": {"$oid": "65f1c0ffee00000000000001"},
            "title": "1984",
            "author": "George Orwell",
            "genre": "Dystopian",
            "published_year": 1949,
            "price": 10.99,
            "in_stock": true,
            "pages": 328
        });
        let book: Book = serde_json::from_value(doc).unwrap();
        assert_eq!(book.title, "1984");
        assert_eq!(book.published_year, 1949);
    }

    #[test]
    fn test_aggregate_rows_deserialize() {
        let row: GenrePriceSummary = serde_json::from_value(
            json!({"_id": "Fantasy", "averagePrice": 17.49, "bookCount": 2}),
        )
        .unwrap();
        assert_eq!(row.genre.as_deref(), Some("Fantasy"));
        assert_eq!(row.book_count, 2);

        let row: DecadeGroup = serde_json::from_value(
            json!({"_id": 1980, "bookCount": 1, "books": ["The Alchemist"]}),
        )
        .unwrap();
        assert_eq!(row.decade, Some(1980));
    }

    #[test]
    fn test_decade_of() {
        assert_eq!(decade_of(1987), 1980);
        assert_eq!(decade_of(1990), 1990);
        assert_eq!(decade_of(1813), 1810);
    }

    #[test]
    fn test_sample_catalog_titles_unique() {
        let catalog = sample_catalog();
        let mut titles: Vec<&str> = catalog.iter().map(|b| b.title.as_str()).collect();
        titles.sort();
        titles.dedup();
        assert_eq!(titles.len(), catalog.len());
        assert_eq!(catalog.len(), 12);
    }
}
