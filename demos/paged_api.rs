use reqwest::Client;
use serde_json::{json, Value};

// `cargo run` で起動したサーバーに対してページ取得 API を試す
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let client = Client::new();
    let base_url = "http://localhost:8080";

    println!("=== RustyDAO API テスト ===\n");

    // 1. ヘルスチェック
    println!("1. ヘルスチェック");
    let resp = client.get(format!("{}/health", base_url)).send().await?;
    println!("ステータス: {}", resp.status());
    println!();

    // 2. エンティティ一覧取得
    println!("2. エンティティ一覧取得");
    let resp = client.get(format!("{}/api/entities", base_url)).send().await?;
    println!("ステータス: {}", resp.status());
    println!("レスポンス: {}", resp.text().await?);
    println!();

    // 3. フィルター付きのページ取得
    println!("3. フィルター付きのページ取得");
    let resp = client
        .get(format!("{}/api/entities/GenericUser", base_url))
        .query(&[
            ("page_no", "1"),
            ("page_size", "3"),
            ("order_by", "age,name"),
            ("order", "desc,asc"),
            ("filter_GE_I_age", "20"),
            ("filter_LIKE_S_name_OR_login_name", "a"),
        ])
        .send()
        .await?;
    println!("ステータス: {}", resp.status());
    let result_text = resp.text().await?;
    if let Ok(result) = serde_json::from_str::<Value>(&result_text) {
        println!("整形レスポンス: {}", serde_json::to_string_pretty(&result)?);
    }
    println!();

    // 4. テキストクエリでのページ取得
    println!("4. テキストクエリでのページ取得");
    let query = json!({
        "query": "select u from GenericUser u where u.age < :age order by u.age desc",
        "named_params": { "age": 40 },
        "page_no": 2,
        "page_size": 2
    });
    let resp = client
        .post(format!("{}/api/entities/GenericUser/query", base_url))
        .json(&query)
        .send()
        .await?;
    println!("ステータス: {}", resp.status());
    println!("レスポンス: {}", resp.text().await?);
    println!();

    // 5. 不正なフィルター
    println!("5. 不正なフィルター");
    let resp = client
        .get(format!("{}/api/entities/GenericUser", base_url))
        .query(&[("filter_BOGUS_S_name", "a")])
        .send()
        .await?;
    println!("ステータス: {}", resp.status());
    println!("レスポンス: {}", resp.text().await?);

    Ok(())
}
