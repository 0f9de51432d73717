use rustydao::domain::entity::{DataType, EntityKind, FromRow, Property, Row, Value, ValueError};
use rustydao::domain::orm::{Page, PropertyFilter};
use rustydao::domain::query::{Criterion, Order, Projection};
use rustydao::domain::repository::{GenericRepository, QueryExecutor};
use rustydao::infrastructure::executor::MemoryQueryExecutor;
use rustydao::infrastructure::storage::MemoryStorage;
use std::sync::Arc;

#[derive(Debug)]
struct User {
    id: i64,
    name: String,
    age: Option<i32>,
}

impl FromRow for User {
    fn from_row(row: Row) -> Result<Self, ValueError> {
        Ok(Self {
            id: row.get_as("id")?,
            name: row.get_as("name")?,
            age: row.get_as("age").ok(),
        })
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ストレージとエンティティの準備
    let storage = Arc::new(MemoryStorage::new());
    let kind = EntityKind::new("GenericUser")
        .with_property(Property::new("id", DataType::Long).id())?
        .with_property(Property::new("name", DataType::Text).not_null())?
        .with_property(Property::new("login_name", DataType::Text))?
        .with_property(Property::new("age", DataType::Integer))?;
    storage.register_entity(kind.clone())?;
    storage.insert_rows(
        "GenericUser",
        vec![
            Row::new().with("id", 1i64).with("name", "john").with("login_name", "jsmith").with("age", 31),
            Row::new().with("id", 2i64).with("name", "alice").with("login_name", "jo_a").with("age", 24),
            Row::new().with("id", 3i64).with("name", "bob").with("login_name", "bobby").with("age", 24),
            Row::new().with("id", 4i64).with("name", "joanna").with("login_name", "anna"),
        ],
    )?;

    let executor: Arc<dyn QueryExecutor> = Arc::new(MemoryQueryExecutor::new(storage));
    let users: GenericRepository<User> = GenericRepository::new(executor, kind);

    println!("=== RustyDAO 基本動作チェック ===\n");

    // 1. プロパティフィルターでページ検索
    println!("1. フィルターでの検索");
    let filters = vec![
        PropertyFilter::parse("LIKE_S_name_OR_login_name", "jo")?,
        PropertyFilter::parse("LT_I_age", "40")?,
    ];
    let mut page = Page::with_size(2).with_order_by("age,name").with_order("desc,asc")?;
    users.find_page_by_filters(&mut page, &filters)?;
    println!("総件数: {} / 総ページ数: {}", page.total_count(), page.total_pages());
    for user in page.result() {
        println!("  {:?}", user);
    }
    println!();

    // 2. テキストクエリでページ検索
    println!("2. テキストクエリでの検索");
    let mut page = Page::with_size(10);
    users.find_page_text(
        &mut page,
        "select u from GenericUser u where u.age = ? order by u.name",
        &[Value::from(24)],
    )?;
    println!("総件数: {}", page.total_count());
    for user in page.result() {
        println!("  {} (id={}, age={:?})", user.name, user.id, user.age);
    }
    println!();

    // 3. 構造化クエリの件数取得
    println!("3. 件数の取得");
    let mut query = users.create_criteria(&[Criterion::ge("age", 24)]);
    query
        .add_order(Order::desc("age"))
        .set_projection(Some(Projection::Properties(vec!["name".into()])));
    let count = users.count_result(&mut query)?;
    println!("件数: {} / 復元したクエリ: {}", count, query);
    println!();

    // 4. 一括更新
    println!("4. 一括更新");
    let updated = users.batch_execute("update GenericUser set age = ? where name = ?", &[Value::from(30), Value::from("joanna")])?;
    println!("{} 行を更新しました", updated);
    if let Some(user) = users.get(4i64)? {
        println!("  {:?}", user);
    }

    Ok(())
}
