use super::*;
use chrono::NaiveDate;
use query_composer::query_builder::conditions::{parse_tri_state, try_get_long};
use query_composer::query_builder::{
    always_false, always_true, and, or, DateRange, JoinType, Predicate, PredicateBuilder,
    QueryContext, SearchMode, SelectionRegistry, TypedExpr,
};

#[derive(Debug, Default)]
struct AuthorId(i64);

async fn matching_authors(
    build: impl FnOnce(&QueryContext<AuthorId>) -> PredicateBuilder,
    mode: SearchMode,
) -> Vec<i64> {
    let mut context = QueryContext::<AuthorId>::new(&AUTHOR);
    let root = context.root().clone();
    let mut selections = SelectionRegistry::new();
    selections.register(root.get(ID), |row: &mut AuthorId, value| {
        row.0 = value.unwrap_or_default()
    });
    context.set_selections(selections).unwrap();
    let predicate = build(&context).build(mode);
    context.set_predicate(predicate);

    let page = context.execute(&library()).await.unwrap();
    page.items.into_iter().map(|row| row.0).collect()
}

fn name(context: &QueryContext<AuthorId>) -> TypedExpr<String> {
    context.root().get(NAME)
}

fn country(context: &QueryContext<AuthorId>) -> TypedExpr<String> {
    context.root().get(COUNTRY)
}

#[tokio::test]
async fn test_absent_filters_leave_everything() {
    let ids = matching_authors(
        |context| {
            context
                .predicate_builder()
                .lower_like(None, &name(context))
                .in_values(Vec::<String>::new(), &country(context))
                .add(None)
        },
        SearchMode::Exact,
    )
    .await;
    assert_eq!(ids, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_exact_mode_ands_and_free_text_ors() {
    let needles = vec!["le".to_string()];
    let countries = ["FI".to_string()];

    let builder = |context: &QueryContext<AuthorId>| {
        context
            .predicate_builder()
            .lower_like(Some(needles.as_slice()), &name(context))
            .in_values(countries.clone(), &country(context))
    };

    // "le" matches Le Guin and Lem, neither of them from Finland
    assert!(matching_authors(builder, SearchMode::Exact).await.is_empty());
    assert_eq!(matching_authors(builder, SearchMode::FreeText).await, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_free_text_without_filters_matches_everything() {
    let ids = matching_authors(|context| context.predicate_builder(), SearchMode::FreeText).await;
    assert_eq!(ids, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_negated_membership_skips_unknown_values() {
    // NOT (country IN ('US')) is unknown for a NULL country, so that author is dropped
    let ids = matching_authors(
        |context| {
            context
                .predicate_builder()
                .add(Some(country(context).is_in(["US".to_string()]).negate()))
        },
        SearchMode::Exact,
    )
    .await;
    assert_eq!(ids, vec![2, 3]);
}

#[tokio::test]
async fn test_pattern_match_is_literal() {
    let needles = vec!["%".to_string(), "k.".to_string()];
    let ids = matching_authors(
        |context| {
            context
                .predicate_builder()
                .lower_like(Some(needles.as_slice()), &name(context))
        },
        SearchMode::Exact,
    )
    .await;
    assert_eq!(ids, vec![1]);
}

#[test]
fn test_date_range_forms() {
    let day = |d| NaiveDate::from_ymd_opt(2024, 5, d).unwrap();

    assert_eq!(
        DateRange::parse("2024-05-03"),
        Some(DateRange { from: Some(day(3)), to: Some(day(3)) })
    );
    assert_eq!(
        DateRange::parse("2024-05-01,2024-05-09"),
        Some(DateRange { from: Some(day(1)), to: Some(day(9)) })
    );
    assert_eq!(DateRange::parse(",2024-05-09"), Some(DateRange { from: None, to: Some(day(9)) }));
    assert_eq!(DateRange::parse("2024-05-01,"), Some(DateRange { from: Some(day(1)), to: None }));
    assert_eq!(DateRange::parse(","), None);
    assert_eq!(DateRange::parse("yesterday"), None);
}

#[test]
fn test_raw_value_parsing() {
    assert_eq!(parse_tri_state(Some("true")), Some(true));
    assert_eq!(parse_tri_state(Some("false")), Some(false));
    assert_eq!(parse_tri_state(Some("TRUE")), None);
    assert_eq!(parse_tri_state(None), None);

    assert_eq!(try_get_long("42"), Some(42));
    assert_eq!(try_get_long(" 7 "), Some(7));
    assert_eq!(try_get_long("4x"), None);
}

#[test]
fn test_empty_combinations() {
    assert_eq!(and(Vec::new()).expr(), always_true().expr());
    assert_eq!(or(Vec::new()).expr(), always_false().expr());
    assert!(PredicateBuilder::new().is_empty());
}

fn filtered(
    combine: fn(Predicate) -> Predicate,
) -> impl FnOnce(&QueryContext<AuthorId>) -> PredicateBuilder {
    move |context| {
        let american_or_polish = country(context).is_in(["US".to_string(), "PL".to_string()]);
        context.predicate_builder().add(Some(combine(american_or_polish)))
    }
}

#[tokio::test]
async fn test_empty_combinations_against_data() {
    let everything = matching_authors(
        |context| context.predicate_builder().add(Some(and(Vec::new()))),
        SearchMode::Exact,
    )
    .await;
    assert_eq!(everything, vec![1, 2, 3, 4]);

    let nothing = matching_authors(
        |context| context.predicate_builder().add(Some(or(Vec::new()))),
        SearchMode::Exact,
    )
    .await;
    assert!(nothing.is_empty());

    // An empty conjunction never narrows, an empty disjunction never widens
    let with_true = filtered(|predicate| and(vec![predicate, and(Vec::new())]));
    assert_eq!(matching_authors(with_true, SearchMode::Exact).await, vec![1, 2]);
    let with_false = filtered(|predicate| or(vec![predicate, or(Vec::new())]));
    assert_eq!(matching_authors(with_false, SearchMode::Exact).await, vec![1, 2]);
    let and_false = filtered(|predicate| and(vec![predicate, or(Vec::new())]));
    assert!(matching_authors(and_false, SearchMode::Exact).await.is_empty());
}

#[test]
fn test_joined_columns_render_with_join_alias() {
    let mut context = QueryContext::<AuthorId>::new(&BOOK);
    let root = context.root().clone();
    let author = context.join(&root, &BOOK_AUTHOR, JoinType::Inner);
    let needles = vec!["Ursula".to_string()];
    let predicate = context
        .predicate_builder()
        .lower_like(Some(needles.as_slice()), &author.get(NAME))
        .and();
    assert_eq!(predicate.to_string(), "lower(author_1.name) LIKE '%ursula%'");
}
