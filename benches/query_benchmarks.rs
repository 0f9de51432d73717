use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rustydao::domain::entity::{DataType, EntityKind, Property, Row};
use rustydao::domain::orm::{Page, PropertyFilter};
use rustydao::domain::query::{build_from_filters, prepare_count_query};
use rustydao::domain::repository::{GenericRepository, QueryExecutor};
use rustydao::infrastructure::executor::MemoryQueryExecutor;
use rustydao::infrastructure::storage::MemoryStorage;
use std::sync::Arc;

const ROWS: i64 = 10_000;

fn user_repository() -> GenericRepository<Row> {
    let storage = Arc::new(MemoryStorage::new());
    let kind = EntityKind::new("GenericUser")
        .with_property(Property::new("id", DataType::Long).id())
        .and_then(|k| k.with_property(Property::new("name", DataType::Text)))
        .and_then(|k| k.with_property(Property::new("login_name", DataType::Text)))
        .and_then(|k| k.with_property(Property::new("age", DataType::Integer)))
        .expect("valid entity");
    storage.register_entity(kind.clone()).expect("registered");
    let rows = (0..ROWS)
        .map(|i| {
            Row::new()
                .with("id", i)
                .with("name", format!("user{}", i))
                .with("login_name", format!("login{}", i % 97))
                .with("age", (i % 60) as i32)
        })
        .collect();
    storage.insert_rows("GenericUser", rows).expect("inserted");

    let executor: Arc<dyn QueryExecutor> = Arc::new(MemoryQueryExecutor::new(storage));
    GenericRepository::new(executor, kind)
}

pub fn filter_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("property_filter");

    group.bench_function("parse_multi_property", |b| {
        b.iter(|| PropertyFilter::parse(black_box("LIKE_S_name_OR_login_name_OR_email"), black_box("jo")))
    });
    group.bench_function("build_from_filters", |b| {
        let filters = vec![
            PropertyFilter::parse("EQ_I_age", "30").expect("filter"),
            PropertyFilter::parse("LIKE_S_name_OR_login_name", "jo").expect("filter"),
        ];
        b.iter(|| build_from_filters(black_box(&filters)))
    });
    group.bench_function("prepare_count_query", |b| {
        b.iter(|| prepare_count_query(black_box("select u from GenericUser as u where u.age<30 order by u.age desc")))
    });

    group.finish();
}

pub fn paged_queries(c: &mut Criterion) {
    let repository = user_repository();
    let filters = vec![
        PropertyFilter::parse("GE_I_age", "30").expect("filter"),
        PropertyFilter::parse("LIKE_S_name_OR_login_name", "1").expect("filter"),
    ];

    let mut group = c.benchmark_group("find_page");

    group.bench_function("filters_with_count", |b| {
        b.iter(|| {
            let mut page = Page::with_size(20).with_page_no(5);
            repository.find_page_by_filters(&mut page, &filters).expect("page");
            page.total_count()
        })
    });
    group.bench_function("ordered_without_count", |b| {
        b.iter(|| {
            let mut page = Page::with_size(20)
                .with_page_no(5)
                .with_auto_count(false)
                .with_order_by("age,name")
                .with_order("desc,asc")
                .expect("order");
            repository.find_page_by_filters(&mut page, &filters).expect("page");
            page.result().len()
        })
    });
    group.bench_function("text_query", |b| {
        b.iter(|| {
            let mut page = Page::with_size(20);
            repository
                .find_page_text(&mut page, "from GenericUser u where u.age < 10 order by u.name", &[])
                .expect("page");
            page.total_count()
        })
    });

    group.finish();
}

criterion_group!(benches, filter_parsing, paged_queries);
criterion_main!(benches);
