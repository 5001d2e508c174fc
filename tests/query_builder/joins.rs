use super::*;
use query_composer::query_builder::{
    ChildCollection, CollectionFilter, JoinType, Json, PageRequest, QueryContext, SearchMode,
    SelectionRegistry,
};

#[derive(Debug, Default)]
struct ReviewedAuthor {
    author: Option<Author>,
    review_ids: Option<Vec<i64>>,
    titles: Option<Vec<String>>,
    stars: Option<Vec<i64>>,
    unreviewed: Option<bool>,
}

async fn reviewed_authors(values: Option<&[String]>, mode: SearchMode) -> Vec<ReviewedAuthor> {
    let mut context = QueryContext::<ReviewedAuthor>::new(&AUTHOR);
    let root = context.root().clone();
    let reviews = ChildCollection::join(
        &mut context,
        &root,
        &AUTHOR_BOOKS,
        &BOOK_REVIEWS,
        CollectionFilter {
            values,
            column: COMMENT,
            mode,
            empty_marker: "",
        },
    );

    let mut selections = SelectionRegistry::new();
    selections
        .register(root.row::<Author>(), |row: &mut ReviewedAuthor, value| {
            row.author = value.map(|Json(author)| author)
        })
        .register(reviews.keys(), |row, value| row.review_ids = value)
        .register(reviews.aggregate(&reviews.collection().get(TITLE)), |row, value| {
            row.titles = value
        })
        .register(reviews.aggregate(&reviews.related().get(STARS)), |row, value| {
            row.stars = value
        })
        .register(reviews.is_absent(), |row, value| row.unreviewed = value);
    context.set_selections(selections).unwrap();
    if let Some(search) = ChildCollection::free_text_predicate(&[reviews.clone()]) {
        context.set_predicate(search);
    }
    context.group_by(vec![root.row::<Author>().into_expr()]);
    context.set_page(PageRequest::new(0, 10));

    context.execute(&library()).await.unwrap().items
}

#[test]
fn test_join_aliases_follow_relation_names_and_order() {
    let mut context = QueryContext::<ReviewedAuthor>::new(&AUTHOR);
    let root = context.root().clone();
    let books = context.join(&root, &AUTHOR_BOOKS, JoinType::Left);
    let reviews = context.join_on(&books, &BOOK_REVIEWS, JoinType::Inner, |review| {
        review.get(STARS).equal(5)
    });

    assert_eq!(root.alias(), "author");
    assert_eq!(books.alias(), "books_1");
    assert_eq!(reviews.alias(), "reviews_2");

    let joins = context.joins();
    assert_eq!(joins.len(), 2);
    assert_eq!(joins[0].key_condition_sql(), "books_1.author_id = author.id");
    assert_eq!(joins[1].key_condition_sql(), "reviews_2.book_id = books_1.id");
    assert_eq!(joins[1].join_type, JoinType::Inner);
    assert!(joins[0].on_restriction.is_none());
    assert!(joins[1].on_restriction.is_some());
}

#[tokio::test]
async fn test_child_collection_aggregates_stay_aligned() {
    let rows = reviewed_authors(None, SearchMode::Exact).await;
    assert_eq!(rows.len(), 4);

    let le_guin = &rows[0];
    assert_eq!(le_guin.review_ids, Some(vec![100, 101, 102]));
    assert_eq!(le_guin.stars, Some(vec![5, 4, 3]));
    assert_eq!(
        le_guin.titles,
        Some(vec![
            "The Dispossessed".to_string(),
            "The Dispossessed".to_string(),
            "A Wizard of Earthsea".to_string(),
        ])
    );
    assert_eq!(le_guin.unreviewed, Some(false));

    // A book without reviews does not contribute to any array
    let lem = &rows[1];
    assert_eq!(lem.review_ids, None);
    assert_eq!(lem.titles, None);
    assert_eq!(lem.unreviewed, Some(true));
}

#[tokio::test]
async fn test_exact_match_values_restrict_children_only() {
    let values = vec!["MAGIC".to_string()];
    let rows = reviewed_authors(Some(values.as_slice()), SearchMode::Exact).await;

    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0].review_ids, Some(vec![102]));
    assert_eq!(rows[0].titles, Some(vec!["A Wizard of Earthsea".to_string()]));
    assert_eq!(rows[0].stars, Some(vec![3]));
}

#[tokio::test]
async fn test_free_text_match_values_filter_rows() {
    let values = vec!["slow".to_string()];
    let rows = reviewed_authors(Some(values.as_slice()), SearchMode::FreeText).await;

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].author.as_ref().map(|author| author.id), Some(1));
    assert_eq!(rows[0].review_ids, Some(vec![101]));
}

#[tokio::test]
async fn test_empty_marker_is_not_a_match_value() {
    let values = vec![String::new()];
    let rows = reviewed_authors(Some(values.as_slice()), SearchMode::Exact).await;

    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0].review_ids, Some(vec![100, 101, 102]));
}

#[test]
fn test_collection_filter_empty_marker() {
    let marker = vec!["-".to_string()];
    let filter = CollectionFilter {
        values: Some(marker.as_slice()),
        column: COMMENT,
        mode: SearchMode::Exact,
        empty_marker: "-",
    };
    assert!(filter.wants_empty());

    let names = vec!["magic".to_string()];
    let filter = CollectionFilter {
        values: Some(names.as_slice()),
        ..filter
    };
    assert!(!filter.wants_empty());
}
