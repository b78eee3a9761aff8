// bookstore-core/src/driver.rs
// Runs the walkthrough in order and writes the console report

use std::io::Write;

use serde_json::Value;
use tracing::debug;

use crate::book::Book;
use crate::catalog::*;
use crate::error::{BookstoreError, Result};
use crate::find_options::SortDirection;
use crate::store::{BookStore, ExplainStats};

const NONE: &str = "   (none)";

/// Sequential driver over one store
///
/// Every step propagates its first error; nothing is retried and the
/// remaining steps are skipped.
pub struct QueryDriver<'a, S: BookStore + ?Sized, W: Write> {
    store: &'a S,
    out: W,
}

impl<'a, S: BookStore + ?Sized, W: Write> QueryDriver<'a, S, W> {
    pub fn new(store: &'a S, out: W) -> Self {
        Self { store, out }
    }

    /// Give back the writer, e.g. to inspect captured output
    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn run_all(&mut self) -> Result<()> {
        debug!(backend = self.store.backend(), "running walkthrough");
        self.basic_crud()?;
        self.advanced_queries()?;
        self.aggregation()?;
        self.indexing()?;
        self.out.flush()?;
        Ok(())
    }

    pub fn basic_crud(&mut self) -> Result<()> {
        writeln!(self.out, "=== TASK 2: Basic CRUD Operations ===\n")?;

        writeln!(self.out, "1. All {} books:", FICTION)?;
        let books = books_in_genre(self.store, FICTION)?;
        self.book_lines(&books, |b| format!("\"{}\" by {}", b.title, b.author))?;

        writeln!(self.out, "\n2. Books published after {}:", PUBLISHED_AFTER)?;
        let books = books_published_after(self.store, PUBLISHED_AFTER)?;
        self.book_lines(&books, |b| format!("\"{}\" ({})", b.title, b.published_year))?;

        writeln!(self.out, "\n3. Books by {}:", ORWELL)?;
        let books = books_by_author(self.store, ORWELL)?;
        self.book_lines(&books, |b| format!("\"{}\" ({})", b.title, b.published_year))?;

        writeln!(self.out, "\n4. Updating price of \"{}\"...", GATSBY)?;
        let outcome = update_price(self.store, GATSBY, GATSBY_NEW_PRICE)?;
        writeln!(self.out, "   Modified {} document(s)", outcome.modified)?;
        let updated = find_by_title(self.store, GATSBY)?
            .ok_or_else(|| BookstoreError::DocumentNotFound(GATSBY.to_string()))?;
        writeln!(self.out, "   New price: ${}", updated.price)?;

        writeln!(self.out, "\n5. Deleting \"{}\"...", ANIMAL_FARM)?;
        let deleted = delete_by_title(self.store, ANIMAL_FARM)?;
        writeln!(self.out, "   Deleted {} document(s)", deleted)?;
        Ok(())
    }

    pub fn advanced_queries(&mut self) -> Result<()> {
        writeln!(self.out, "\n\n=== TASK 3: Advanced Queries ===\n")?;

        writeln!(
            self.out,
            "1. Books in stock and published after {}:",
            RECENT_AFTER
        )?;
        let books = in_stock_published_after(self.store, RECENT_AFTER)?;
        self.book_lines(&books, |b| {
            format!(
                "\"{}\" by {} ({}) - ${}",
                b.title, b.author, b.published_year, b.price
            )
        })?;

        writeln!(self.out, "\n2. Books with projection (title, author, price only):")?;
        let docs = projected_by_genre(self.store, FANTASY)?;
        self.json_list(&docs)?;

        writeln!(self.out, "\n3. Books sorted by price (ascending):")?;
        let docs = sorted_by_price(self.store, SortDirection::Ascending)?;
        self.json_list(&docs)?;

        writeln!(self.out, "\n4. Books sorted by price (descending):")?;
        let docs = sorted_by_price(self.store, SortDirection::Descending)?;
        self.json_list(&docs)?;

        writeln!(self.out, "\n5. Pagination - Page 1 ({} books):", PAGE_SIZE)?;
        let docs = page_by_title(self.store, 1, PAGE_SIZE)?;
        self.json_list(&docs)?;

        writeln!(self.out, "\n6. Pagination - Page 2 ({} books):", PAGE_SIZE)?;
        let docs = page_by_title(self.store, 2, PAGE_SIZE)?;
        self.json_list(&docs)?;
        Ok(())
    }

    pub fn aggregation(&mut self) -> Result<()> {
        writeln!(self.out, "\n\n=== TASK 4: Aggregation Pipeline ===\n")?;

        writeln!(self.out, "1. Average price by genre:")?;
        let rows = average_price_by_genre(self.store)?;
        self.json_list(&to_values(&rows)?)?;

        writeln!(self.out, "\n2. Author with most books:")?;
        let rows = top_authors(self.store, TOP_AUTHORS)?;
        self.json_list(&to_values(&rows)?)?;

        writeln!(self.out, "\n3. Books grouped by publication decade:")?;
        let rows = books_by_decade(self.store)?;
        self.json_list(&to_values(&rows)?)?;
        Ok(())
    }

    pub fn indexing(&mut self) -> Result<()> {
        writeln!(self.out, "\n\n=== TASK 5: Indexing ===\n")?;

        writeln!(self.out, "1. Creating index on title field...")?;
        let name = create_title_index(self.store)?;
        writeln!(self.out, "   Index created on title field ({})", name)?;

        writeln!(
            self.out,
            "2. Creating compound index on author and published_year..."
        )?;
        let name = create_author_year_index(self.store)?;
        writeln!(
            self.out,
            "   Compound index created on author and published_year ({})",
            name
        )?;

        writeln!(self.out, "3. Performance analysis with explain():")?;
        writeln!(self.out, "   Query with index:")?;
        let stats = explain_title_lookup(self.store, HOBBIT)?;
        self.explain_lines(&stats)?;

        writeln!(self.out, "\n4. Compound index performance:")?;
        let stats = explain_author_since(self.store, TOLKIEN, TOLKIEN_SINCE)?;
        self.explain_lines(&stats)?;
        Ok(())
    }

    fn book_lines<F>(&mut self, books: &[Book], line: F) -> Result<()>
    where
        F: Fn(&Book) -> String,
    {
        if books.is_empty() {
            writeln!(self.out, "{}", NONE)?;
        }
        for book in books {
            writeln!(self.out, "   - {}", line(book))?;
        }
        Ok(())
    }

    fn json_list(&mut self, docs: &[Value]) -> Result<()> {
        if docs.is_empty() {
            writeln!(self.out, "{}", NONE)?;
            return Ok(());
        }
        let pretty = serde_json::to_string_pretty(docs)?;
        for line in pretty.lines() {
            writeln!(self.out, "   {}", line)?;
        }
        Ok(())
    }

    fn explain_lines(&mut self, stats: &ExplainStats) -> Result<()> {
        writeln!(self.out, "   Documents examined: {}", stats.docs_examined)?;
        writeln!(self.out, "   Index keys examined: {}", stats.keys_examined)?;
        writeln!(
            self.out,
            "   Execution time: {}ms",
            stats.execution_time_millis
        )?;
        writeln!(
            self.out,
            "   Plan: {}",
            stats.index_name.as_deref().unwrap_or("collection scan")
        )?;
        Ok(())
    }
}

fn to_values<T: serde::Serialize>(rows: &[T]) -> Result<Vec<Value>> {
    rows.iter()
        .map(|row| serde_json::to_value(row).map_err(Into::into))
        .collect()
}
