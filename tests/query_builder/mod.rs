//! Query builder tests module

pub mod conditions;
pub mod context;
pub mod joins;
pub mod render;

use query_composer::backend::InMemoryBackend;
use query_composer::query_builder::{Attribute, Cardinality, Entity, Relation, Value};
use serde::Deserialize;

pub static AUTHOR: Entity = Entity {
    name: "author",
    table: "authors",
    primary_key: "id",
    attributes: &[("id", "id"), ("name", "name"), ("country", "country")],
};

pub static BOOK: Entity = Entity {
    name: "book",
    table: "books",
    primary_key: "id",
    attributes: &[("id", "id"), ("title", "title"), ("pages", "pages")],
};

pub static REVIEW: Entity = Entity {
    name: "review",
    table: "reviews",
    primary_key: "id",
    attributes: &[("id", "id"), ("stars", "stars"), ("comment", "comment")],
};

pub static BOOK_AUTHOR: Relation = Relation {
    name: "author",
    target: &AUTHOR,
    parent_column: "author_id",
    child_column: "id",
    cardinality: Cardinality::ToOne,
};

pub static AUTHOR_BOOKS: Relation = Relation {
    name: "books",
    target: &BOOK,
    parent_column: "id",
    child_column: "author_id",
    cardinality: Cardinality::ToMany,
};

pub static BOOK_REVIEWS: Relation = Relation {
    name: "reviews",
    target: &REVIEW,
    parent_column: "id",
    child_column: "book_id",
    cardinality: Cardinality::ToMany,
};

pub const ID: Attribute<i64> = Attribute::new("id");
pub const NAME: Attribute<String> = Attribute::new("name");
pub const COUNTRY: Attribute<String> = Attribute::new("country");
pub const TITLE: Attribute<String> = Attribute::new("title");
pub const PAGES: Attribute<i64> = Attribute::new("pages");
pub const STARS: Attribute<i64> = Attribute::new("stars");
pub const COMMENT: Attribute<String> = Attribute::new("comment");

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Author {
    pub id: i64,
    pub name: String,
    pub country: Option<String>,
}

/// Authors: 1 Le Guin (US, 2 books), 2 Lem (PL, 1 book), 3 Jansson (FI, no books),
/// 4 anonymous author without a country.
/// Books: 10 "The Dispossessed" (387 pages, reviews 100 and 101), 11 "A Wizard of
/// Earthsea" (no pages, review 102), 12 "Solaris" (204 pages, no reviews).
pub fn library() -> InMemoryBackend {
    let mut backend = InMemoryBackend::new();
    for (id, name, country) in [
        (1, "Ursula K. Le Guin", Some("US")),
        (2, "Stanisław Lem", Some("PL")),
        (3, "Tove Jansson", Some("FI")),
        (4, "Anonymous", None),
    ] {
        backend.insert(
            "authors",
            vec![
                ("id", Value::Int(id)),
                ("name", Value::from(name)),
                ("country", Value::from(country)),
            ],
        );
    }
    for (id, author, title, pages) in [
        (10, 1, "The Dispossessed", Some(387)),
        (11, 1, "A Wizard of Earthsea", None),
        (12, 2, "Solaris", Some(204)),
    ] {
        backend.insert(
            "books",
            vec![
                ("id", Value::Int(id)),
                ("author_id", Value::Int(author)),
                ("title", Value::from(title)),
                ("pages", Value::from(pages.map(i64::from))),
            ],
        );
    }
    for (id, book, stars, comment) in [
        (100, 10, 5, "Ambitious and humane"),
        (101, 10, 4, "Slow start"),
        (102, 11, 3, "Magical"),
    ] {
        backend.insert(
            "reviews",
            vec![
                ("id", Value::Int(id)),
                ("book_id", Value::Int(book)),
                ("stars", Value::Int(stars)),
                ("comment", Value::from(comment)),
            ],
        );
    }
    backend
}
