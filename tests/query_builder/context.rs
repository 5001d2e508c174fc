use super::*;
use query_composer::error::QueryError;
use query_composer::query_builder::{
    CompareOp, JoinHandle, JoinType, Json, OrderClause, OrderResolver, PageRequest, QueryContext,
    SelectionRegistry, Sort, SortDirection, SortOrder, TypedExpr,
};

#[derive(Debug, Default)]
struct AuthorRow {
    author: Option<Author>,
    titles: Vec<String>,
    total_pages: Option<i64>,
    book_count: i64,
}

#[derive(Debug, Default)]
struct BookRow {
    id: i64,
    pages: Option<i64>,
}

fn author_id(row: &AuthorRow) -> i64 {
    row.author.as_ref().map_or(0, |author| author.id)
}

fn author_selections(
    context: &QueryContext<AuthorRow>,
    books: &JoinHandle,
) -> SelectionRegistry<AuthorRow> {
    let root = context.root().clone();
    let mut selections = SelectionRegistry::new();
    selections
        .register(root.row::<Author>(), |row: &mut AuthorRow, value| {
            row.author = value.map(|Json(author)| author)
        })
        .register(context.array_agg(&books.get(TITLE)), |row, value| {
            row.titles = value.unwrap_or_default()
        })
        .register(books.get(PAGES).sum(), |row, value| row.total_pages = value)
        .register(books.get(ID).count(), |row, value| {
            row.book_count = value.unwrap_or_default()
        });
    selections
}

fn book_context() -> QueryContext<BookRow> {
    let mut context = QueryContext::<BookRow>::new(&BOOK);
    let root = context.root().clone();
    context.join(&root, &BOOK_AUTHOR, JoinType::Inner);

    let mut selections = SelectionRegistry::new();
    selections
        .register(root.get(ID), |row: &mut BookRow, value| {
            row.id = value.unwrap_or_default()
        })
        .register(root.get(PAGES), |row, value| row.pages = value);
    context.set_selections(selections).unwrap();
    context
}

async fn book_ids(sort: Sort) -> Vec<i64> {
    let mut context = book_context();
    context.order_by_sort(&sort, &OrderResolver::new()).unwrap();
    let page = context.execute(&library()).await.unwrap();
    page.items.iter().map(|row| row.id).collect()
}

#[tokio::test]
async fn test_grouped_aggregates_per_author() {
    let mut context = QueryContext::<AuthorRow>::new(&AUTHOR);
    let root = context.root().clone();
    let books = context.join(&root, &AUTHOR_BOOKS, JoinType::Left);
    let selections = author_selections(&context, &books);
    context.set_selections(selections).unwrap();
    context.group_by(vec![root.row::<Author>().into_expr()]);
    context.set_page(PageRequest::new(0, 10));

    let page = context.execute(&library()).await.unwrap();
    assert_eq!(page.total, 4);
    assert_eq!(page.items.iter().map(author_id).collect::<Vec<_>>(), vec![1, 2, 3, 4]);

    let le_guin = &page.items[0];
    assert_eq!(le_guin.titles, vec!["A Wizard of Earthsea", "The Dispossessed"]);
    assert_eq!(le_guin.total_pages, Some(387));
    assert_eq!(le_guin.book_count, 2);

    let jansson = &page.items[2];
    assert!(jansson.titles.is_empty());
    assert_eq!(jansson.total_pages, None);
    assert_eq!(jansson.book_count, 0);

    assert_eq!(page.items[3].author.as_ref().and_then(|a| a.country.clone()), None);
}

#[tokio::test]
async fn test_having_filters_groups_before_paging() {
    let mut context = QueryContext::<AuthorRow>::new(&AUTHOR);
    let root = context.root().clone();
    let books = context.join(&root, &AUTHOR_BOOKS, JoinType::Left);
    let selections = author_selections(&context, &books);
    context.set_selections(selections).unwrap();
    context.group_by(vec![root.row::<Author>().into_expr()]);
    context.set_having(vec![
        None,
        Some(books.get(ID).count().compare(CompareOp::GtEq, 1)),
    ]);
    context.set_page(PageRequest::new(1, 1));

    let page = context.execute(&library()).await.unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.items.iter().map(author_id).collect::<Vec<_>>(), vec![2]);
}

#[tokio::test]
async fn test_join_restriction_keeps_parent_where_clause_drops_it() {
    let mut restricted = QueryContext::<AuthorRow>::new(&AUTHOR);
    let root = restricted.root().clone();
    let long_books = restricted.join_on(&root, &AUTHOR_BOOKS, JoinType::Left, |books| {
        books.get(PAGES).compare(CompareOp::Gt, 300)
    });
    let selections = author_selections(&restricted, &long_books);
    restricted.set_selections(selections).unwrap();
    restricted.group_by(vec![root.row::<Author>().into_expr()]);

    let page = restricted.execute(&library()).await.unwrap();
    assert_eq!(page.total, 4);
    assert_eq!(page.items[0].titles, vec!["The Dispossessed"]);
    assert!(page.items[1].titles.is_empty());

    let mut filtered = QueryContext::<AuthorRow>::new(&AUTHOR);
    let root = filtered.root().clone();
    let books = filtered.join(&root, &AUTHOR_BOOKS, JoinType::Left);
    let selections = author_selections(&filtered, &books);
    filtered.set_selections(selections).unwrap();
    filtered.set_predicate(books.get(PAGES).compare(CompareOp::Gt, 300));
    filtered.group_by(vec![root.row::<Author>().into_expr()]);

    let page = filtered.execute(&library()).await.unwrap();
    assert_eq!(page.items.iter().map(author_id).collect::<Vec<_>>(), vec![1]);
}

#[test]
fn test_ungrouped_column_is_rejected() {
    let mut context = QueryContext::<AuthorRow>::new(&AUTHOR);
    let root = context.root().clone();
    let books = context.join(&root, &AUTHOR_BOOKS, JoinType::Left);

    let mut selections = SelectionRegistry::new();
    selections
        .register(root.get(NAME), |row: &mut AuthorRow, value: Option<String>| {
            row.titles = value.into_iter().collect()
        })
        .register(books.get(TITLE), |row, value| row.titles.extend(value))
        .register(books.get(ID).count(), |row, value| {
            row.book_count = value.unwrap_or_default()
        });
    context.set_selections(selections).unwrap();
    context.group_by(vec![root.get(ID).into_expr()]);

    assert_eq!(
        context.build().unwrap_err(),
        QueryError::GroupingViolation {
            clause: "SELECT".to_string(),
            expression: "books_1.title".to_string(),
        }
    );
}

#[test]
fn test_ungrouped_order_clause_is_rejected() {
    let mut context = QueryContext::<AuthorRow>::new(&AUTHOR);
    let root = context.root().clone();
    let books = context.join(&root, &AUTHOR_BOOKS, JoinType::Left);
    let selections = author_selections(&context, &books);
    context.set_selections(selections).unwrap();
    context.group_by(vec![root.row::<Author>().into_expr()]);
    context.order_by(vec![OrderClause::new(
        &books.get(TITLE),
        SortDirection::Asc,
    )]);

    assert!(matches!(
        context.build(),
        Err(QueryError::GroupingViolation { clause, .. }) if clause == "ORDER BY"
    ));
}

#[test]
fn test_selections_are_set_once_and_required() {
    let mut context = book_context();
    let again = context.set_selections(SelectionRegistry::new());
    assert!(matches!(again, Err(QueryError::SelectionsAlreadySet)));

    let empty = QueryContext::<BookRow>::new(&BOOK);
    assert!(matches!(empty.build(), Err(QueryError::NoSelections)));
}

#[tokio::test]
async fn test_sort_by_joined_attribute_path() {
    let sort = Sort::by(vec![SortOrder::asc("author.name"), SortOrder::desc("title")]);
    assert_eq!(book_ids(sort).await, vec![12, 10, 11]);
}

#[tokio::test]
async fn test_null_placement_follows_direction() {
    assert_eq!(book_ids(Sort::by(vec![SortOrder::asc("pages")])).await, vec![12, 10, 11]);
    assert_eq!(book_ids(Sort::by(vec![SortOrder::desc("pages")])).await, vec![11, 10, 12]);
}

#[test]
fn test_to_many_attributes_are_not_sortable() {
    let mut context = QueryContext::<AuthorRow>::new(&AUTHOR);
    let root = context.root().clone();
    context.join(&root, &AUTHOR_BOOKS, JoinType::Left);

    let result = context.order_by_sort(
        &Sort::by(vec![SortOrder::asc("books.title")]),
        &OrderResolver::new(),
    );
    assert!(matches!(
        result,
        Err(QueryError::UnresolvedSortField { field }) if field == "books.title"
    ));
}

#[test]
fn test_registered_sort_key_expands_to_several_clauses() {
    let mut context = book_context();
    let root = context.root().clone();
    let pages: TypedExpr<i64> = root.get(PAGES);
    let title = root.get(TITLE);
    let resolver = OrderResolver::new().with("size", |direction| {
        vec![
            OrderClause::new(&pages, direction),
            OrderClause::new(&title, direction),
        ]
    });
    context
        .order_by_sort(&Sort::by(vec![SortOrder::desc("size")]), &resolver)
        .unwrap();

    let (plan, _) = context.build().unwrap();
    let rendered: Vec<String> = plan.order_by.iter().map(ToString::to_string).collect();
    assert_eq!(
        rendered,
        vec![
            "book.pages DESC NULLS FIRST",
            "book.title DESC NULLS FIRST",
            "book.id ASC NULLS LAST",
        ]
    );
}

#[tokio::test]
async fn test_execute_without_page_request_returns_everything() {
    let page = book_context().execute(&library()).await.unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 3);
    assert_eq!(page.size, 3);
    assert_eq!(page.items[0].pages, Some(387));
}

#[test]
fn test_aggregate_in_where_is_rejected() {
    let mut context = book_context();
    let root = context.root().clone();
    context.set_predicate(root.get(PAGES).count().equal(1));

    assert_eq!(
        context.build().unwrap_err(),
        QueryError::AggregateNotAllowed {
            clause: "WHERE".to_string(),
            expression: "(count(book.pages) = 1)".to_string(),
        }
    );
}

#[test]
fn test_aggregate_in_join_restriction_is_rejected() {
    let mut context = QueryContext::<AuthorRow>::new(&AUTHOR);
    let root = context.root().clone();
    let books = context.join_on(&root, &AUTHOR_BOOKS, JoinType::Left, |books| {
        books.get(PAGES).sum().compare(CompareOp::Gt, 300)
    });
    let selections = author_selections(&context, &books);
    context.set_selections(selections).unwrap();
    context.group_by(vec![root.row::<Author>().into_expr()]);

    assert!(matches!(
        context.build(),
        Err(QueryError::AggregateNotAllowed { clause, .. }) if clause == "ON books_1"
    ));
}
