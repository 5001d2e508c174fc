use super::*;
use query_composer::query_builder::{
    render_count, render_select, BindValue, CompareOp, Expr, JoinType, Json, PageRequest,
    QueryContext, QueryPlan, SelectionRegistry, Sort, SortOrder, TypedExpr,
};
use query_composer::query_builder::OrderResolver;

#[derive(Debug, Default)]
struct Row {
    author: Option<Author>,
    titles: Vec<String>,
    books: i64,
}

fn authors_with_books(page: PageRequest) -> QueryPlan {
    let mut context = QueryContext::<Row>::new(&AUTHOR);
    let root = context.root().clone();
    let books = context.join(&root, &AUTHOR_BOOKS, JoinType::Left);

    let mut selections = SelectionRegistry::new();
    selections
        .register(root.row::<Author>(), |row: &mut Row, value| {
            row.author = value.map(|Json(author)| author)
        })
        .register(context.array_agg(&books.get(TITLE)), |row, value| {
            row.titles = value.unwrap_or_default()
        })
        .register(books.get(ID).count(), |row, value| row.books = value.unwrap_or_default());
    context.set_selections(selections).unwrap();
    context.group_by(vec![root.row::<Author>().into_expr()]);
    context.set_having(vec![Some(books.get(ID).count().compare(CompareOp::GtEq, 2))]);
    context.set_page(page);

    context.build().unwrap().0
}

fn filtered_books(needle: &str, pages: Vec<i64>, sort: Sort) -> QueryPlan {
    let mut context = QueryContext::<Row>::new(&BOOK);
    let root = context.root().clone();
    let author = context.join(&root, &BOOK_AUTHOR, JoinType::Inner);

    let mut selections = SelectionRegistry::new();
    selections.register(root.get(TITLE), |row: &mut Row, value| {
        row.titles = value.into_iter().collect()
    });
    context.set_selections(selections).unwrap();

    let needles = vec![needle.to_string()];
    let predicate = context
        .predicate_builder()
        .lower_like(Some(needles.as_slice()), &author.get(NAME))
        .in_values(pages, &root.get(PAGES))
        .and();
    context.set_predicate(predicate);
    context.order_by_sort(&sort, &OrderResolver::new()).unwrap();
    context.set_page(PageRequest::new(0, 20));

    context.build().unwrap().0
}

#[test]
fn test_grouped_select_with_total_count() {
    let statement = render_select(&authors_with_books(PageRequest::new(1, 5)), true);

    assert_eq!(
        statement.sql,
        "SELECT CASE WHEN author.id IS NULL THEN NULL ELSE to_jsonb(author.*) END, \
         array_agg(books_1.title ORDER BY books_1.title) \
         FILTER (WHERE (NOT (books_1.title IS NULL))), \
         count(books_1.id), \
         COUNT(*) OVER () AS total_count \
         FROM authors author \
         LEFT JOIN books books_1 ON books_1.author_id = author.id \
         GROUP BY author.id \
         HAVING (count(books_1.id) >= $1) \
         ORDER BY author.id ASC NULLS LAST \
         LIMIT 5 OFFSET 5"
    );
    assert_eq!(statement.binds, vec![BindValue::Int(2)]);
}

#[test]
fn test_first_page_has_no_offset() {
    let statement = render_select(&authors_with_books(PageRequest::new(0, 5)), false);
    assert!(statement.sql.ends_with(" LIMIT 5"));
    assert!(!statement.sql.contains("total_count"));
}

#[test]
fn test_count_statement_wraps_body_without_paging() {
    let statement = render_count(&authors_with_books(PageRequest::new(3, 5)));
    assert_eq!(
        statement.sql,
        "SELECT COUNT(*) FROM (SELECT 1 \
         FROM authors author \
         LEFT JOIN books books_1 ON books_1.author_id = author.id \
         GROUP BY author.id \
         HAVING (count(books_1.id) >= $1)) AS matched"
    );
    assert_eq!(statement.binds, vec![BindValue::Int(2)]);
}

#[test]
fn test_filters_bind_parameters_in_order() {
    let plan = filtered_books(
        "50%_Off",
        vec![204, 387],
        Sort::by(vec![SortOrder::desc("author.name")]),
    );
    let statement = render_select(&plan, false);

    assert_eq!(
        statement.sql,
        "SELECT book.title \
         FROM books book \
         INNER JOIN authors author_1 ON author_1.id = book.author_id \
         WHERE ((lower(author_1.name) LIKE $1 ESCAPE '\\') AND (book.pages = ANY($2))) \
         ORDER BY author_1.name DESC NULLS FIRST, book.id ASC NULLS LAST \
         LIMIT 20"
    );
    assert_eq!(
        statement.binds,
        vec![
            BindValue::Text("%50\\%\\_off%".to_string()),
            BindValue::IntArray(vec![204, 387]),
        ]
    );
}

#[test]
fn test_membership_edge_cases() {
    let mut plan = filtered_books("x", Vec::new(), Sort::unsorted());
    let pages = Expr::Column {
        alias: "book".to_string(),
        column: "pages".to_string(),
    };

    plan.predicate = Some(Expr::Membership {
        expr: Box::new(pages.clone()),
        values: Vec::new(),
    });
    assert!(render_select(&plan, false).sql.contains(" WHERE FALSE "));

    plan.predicate = Some(Expr::Membership {
        expr: Box::new(pages),
        values: vec![Value::Int(1), Value::Null],
    });
    let statement = render_select(&plan, false);
    assert!(statement.sql.contains(" WHERE (book.pages IN ($1, NULL)) "));
    assert_eq!(statement.binds, vec![BindValue::Int(1)]);
}

#[test]
fn test_cast_and_sum_render() {
    let mut context = QueryContext::<Row>::new(&AUTHOR);
    let root = context.root().clone();
    let books = context.join(&root, &AUTHOR_BOOKS, JoinType::Left);
    let long: TypedExpr<bool> = books.get(PAGES).compare(CompareOp::Gt, 300);

    let mut selections = SelectionRegistry::new();
    selections.register(long.cast::<i64>().sum(), |row: &mut Row, value| {
        row.books = value.unwrap_or_default()
    });
    context.set_selections(selections).unwrap();

    let (plan, _) = context.build().unwrap();
    let statement = render_select(&plan, false);
    assert!(statement
        .sql
        .starts_with(
            "SELECT CAST(sum(CAST((books_1.pages > $1) AS BIGINT)) AS BIGINT) \
             FROM authors author"
        ));
    // Aggregating without GROUP BY has no root key to order by
    assert!(!statement.sql.contains("ORDER BY"));
}
