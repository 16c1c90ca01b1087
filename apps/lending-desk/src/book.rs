//! Books on the shelf

use std::fmt;

/// One physical copy of a book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    /// Unique per copy, starting at 1.
    pub stock_number: u32,
    pub author: String,
    pub title: String,
}

impl Book {
    pub fn new(stock_number: u32, author: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            stock_number,
            author: author.into(),
            title: title.into(),
        }
    }
}

impl fmt::Display for Book {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' by {} (#{})", self.title, self.author, self.stock_number)
    }
}

/// `copies` copies of the same title, numbered from 1.
pub fn shelf(author: &str, title: &str, copies: u32) -> Vec<Book> {
    (1..=copies)
        .map(|stock_number| Book::new(stock_number, author, title))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shelf_numbers_copies_from_one() {
        let books = shelf("pei", "hal", 3);
        let numbers: Vec<u32> = books.iter().map(|b| b.stock_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert!(books.iter().all(|b| b.title == "hal"));
    }

    #[test]
    fn display() {
        assert_eq!(Book::new(2, "pei", "hal").to_string(), "'hal' by pei (#2)");
    }
}
