use std::str::FromStr;

use itertools::Itertools;
use serde::Serialize;

use crate::domain::query::{Order, SortDirection};
use crate::{Error, Result};

/// ORM に依存しないページング条件とクエリ結果
///
/// ページ番号と先頭レコードの位置はどちらも 1 から始まる。
/// `total_count` が -1 のときは総件数が未計算であることを表す。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    page_no: i32,
    page_size: i32,
    order_by: Vec<String>,
    order: Vec<SortDirection>,
    auto_count: bool,
    result: Vec<T>,
    total_count: i64,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            page_no: 1,
            page_size: -1,
            order_by: Vec::new(),
            order: Vec::new(),
            auto_count: true,
            result: Vec::new(),
            total_count: -1,
        }
    }
}

impl<T> Page<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_size(page_size: i32) -> Self {
        Self {
            page_size,
            ..Self::default()
        }
    }

    pub fn page_no(&self) -> i32 {
        self.page_no
    }

    /// 1 未満のページ番号は 1 に切り上げる
    pub fn set_page_no(&mut self, page_no: i32) {
        self.page_no = page_no.max(1);
    }

    pub fn with_page_no(mut self, page_no: i32) -> Self {
        self.set_page_no(page_no);
        self
    }

    pub fn page_size(&self) -> i32 {
        self.page_size
    }

    pub fn set_page_size(&mut self, page_size: i32) {
        self.page_size = page_size;
    }

    pub fn with_page_size(mut self, page_size: i32) -> Self {
        self.set_page_size(page_size);
        self
    }

    /// 現在のページの先頭レコードの位置 (1 始まり)
    pub fn first(&self) -> i64 {
        (i64::from(self.page_no) - 1) * i64::from(self.page_size) + 1
    }

    /// 総ページ数。総件数が未計算なら -1
    pub fn total_pages(&self) -> i64 {
        if self.total_count < 0 || self.page_size <= 0 {
            return -1;
        }

        let page_size = i64::from(self.page_size);
        let mut count = self.total_count / page_size;
        if self.total_count % page_size > 0 {
            count += 1;
        }
        count
    }

    pub fn order_by(&self) -> &[String] {
        &self.order_by
    }

    /// ソートするプロパティを設定する。複数の場合は ',' で区切る
    pub fn set_order_by(&mut self, order_by: &str) {
        self.order_by = order_by
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
    }

    pub fn with_order_by(mut self, order_by: &str) -> Self {
        self.set_order_by(order_by);
        self
    }

    pub fn order(&self) -> &[SortDirection] {
        &self.order
    }

    /// ソート方向を設定する。asc または desc を ',' で区切って並べる
    /// 不正なトークンがあればエラーとし、現在の値は変更しない
    pub fn set_order(&mut self, order: &str) -> Result<()> {
        let directions = order
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|token| {
                SortDirection::from_str(&token.to_lowercase())
                    .map_err(|_| Error::invalid_argument(format!("order token {} is invalid", token)))
            })
            .collect::<Result<Vec<_>>>()?;

        self.order = directions;
        Ok(())
    }

    pub fn with_order(mut self, order: &str) -> Result<Self> {
        self.set_order(order)?;
        Ok(self)
    }

    /// ソート条件が設定されているかどうか
    pub fn is_order_by_set(&self) -> bool {
        !self.order_by.is_empty() && !self.order.is_empty()
    }

    /// ソート条件を宣言順に組み立てる
    /// プロパティ数とソート方向の数が一致しなければエラー
    pub fn sort_orders(&self) -> Result<Vec<Order>> {
        if !self.is_order_by_set() {
            return Ok(Vec::new());
        }
        if self.order_by.len() != self.order.len() {
            return Err(Error::invalid_argument(format!(
                "order by [{}] and order [{}] must have the same length",
                self.order_by.iter().join(","),
                self.order.iter().join(",")
            )));
        }

        Ok(self
            .order_by
            .iter()
            .zip(&self.order)
            .map(|(property, direction)| Order::new(property.clone(), *direction))
            .collect())
    }

    /// 結果を取得する前に総件数を計算するかどうか (デフォルトは true)
    pub fn auto_count(&self) -> bool {
        self.auto_count
    }

    pub fn set_auto_count(&mut self, auto_count: bool) {
        self.auto_count = auto_count;
    }

    pub fn with_auto_count(mut self, auto_count: bool) -> Self {
        self.set_auto_count(auto_count);
        self
    }

    pub fn result(&self) -> &[T] {
        &self.result
    }

    pub fn set_result(&mut self, result: Vec<T>) {
        self.result = result;
    }

    pub fn into_result(self) -> Vec<T> {
        self.result
    }

    pub fn total_count(&self) -> i64 {
        self.total_count
    }

    pub fn set_total_count(&mut self, total_count: i64) {
        self.total_count = total_count;
    }

    pub fn has_previous(&self) -> bool {
        self.page_no > 1
    }

    pub fn has_next(&self) -> bool {
        i64::from(self.page_no) + 1 <= self.total_pages()
    }

    /// 前のページ番号。先頭ページなら現在のページ番号を返す
    pub fn pre_page(&self) -> i32 {
        if self.has_previous() {
            self.page_no - 1
        } else {
            self.page_no
        }
    }

    /// 次のページ番号。最終ページなら現在のページ番号を返す
    pub fn next_page(&self) -> i32 {
        if self.has_next() {
            self.page_no + 1
        } else {
            self.page_no
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn defaults() {
        let page: Page<()> = Page::new();
        assert_eq!(page.page_no(), 1);
        assert_eq!(page.page_size(), -1);
        assert!(page.auto_count());
        assert_eq!(page.total_count(), -1);
        assert_eq!(page.total_pages(), -1);
        assert!(!page.is_order_by_set());
    }

    #[test]
    fn first_of_third_page() {
        let page: Page<()> = Page::with_size(20).with_page_no(3);
        assert_eq!(page.first(), 41);
    }

    #[test]
    fn total_pages_rounds_up() {
        let mut page: Page<()> = Page::with_size(20);
        page.set_total_count(101);
        assert_eq!(page.total_pages(), 6);
        page.set_total_count(100);
        assert_eq!(page.total_pages(), 5);
        page.set_total_count(0);
        assert_eq!(page.total_pages(), 0);
    }

    #[test]
    fn navigation() {
        let mut page: Page<()> = Page::with_size(10).with_page_no(2);
        page.set_total_count(25);

        assert!(page.has_previous());
        assert!(page.has_next());
        assert_eq!(page.pre_page(), 1);
        assert_eq!(page.next_page(), 3);

        page.set_page_no(3);
        assert!(!page.has_next());
        assert_eq!(page.next_page(), 3);

        page.set_page_no(1);
        assert!(!page.has_previous());
        assert_eq!(page.pre_page(), 1);
    }

    #[test]
    fn unknown_total_has_no_next() {
        let page: Page<()> = Page::with_size(10);
        assert!(!page.has_next());
    }

    #[test]
    fn accepts_mixed_case_order() {
        let page: Page<()> = Page::new().with_order_by("name,age").with_order("ASC,desc").unwrap();

        assert!(page.is_order_by_set());
        assert_eq!(page.order(), [SortDirection::Asc, SortDirection::Desc]);
        let orders = page.sort_orders().unwrap();
        assert_eq!(orders, vec![Order::asc("name"), Order::desc("age")]);
    }

    #[test]
    fn rejects_invalid_order_token_without_partial_update() {
        let mut page: Page<()> = Page::new().with_order("desc").unwrap();
        let err = page.set_order("asc,foo").unwrap_err();

        assert!(matches!(err, Error::InvalidArgument(ref msg) if msg.contains("foo")));
        assert_eq!(page.order(), [SortDirection::Desc]);
    }

    #[test]
    fn invalid_order_token_is_reported_as_written() {
        let mut page: Page<()> = Page::new();
        let err = page.set_order("asc, FOO").unwrap_err();

        assert_eq!(err.to_string(), "Invalid argument: order token FOO is invalid");
        assert!(page.order().is_empty());
    }

    #[test]
    fn mismatched_order_lengths() {
        let page: Page<()> = Page::new().with_order_by("name,age").with_order("asc").unwrap();
        assert!(matches!(page.sort_orders(), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn unset_order_yields_no_sort() {
        let page: Page<()> = Page::new().with_order_by("name");
        assert!(page.sort_orders().unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn page_no_is_never_below_one(n in any::<i32>()) {
            let mut page: Page<()> = Page::new();
            page.set_page_no(n);
            prop_assert!(page.page_no() >= 1);
            if n >= 1 {
                prop_assert_eq!(page.page_no(), n);
            }
        }

        #[test]
        fn first_matches_formula(page_no in 1i32..100_000, page_size in 1i32..10_000) {
            let page: Page<()> = Page::with_size(page_size).with_page_no(page_no);
            prop_assert_eq!(page.first(), (i64::from(page_no) - 1) * i64::from(page_size) + 1);
        }

        #[test]
        fn total_pages_is_ceiling(total in 0i64..1_000_000, page_size in 1i32..1_000) {
            let mut page: Page<()> = Page::with_size(page_size);
            page.set_total_count(total);
            let size = i64::from(page_size);
            prop_assert_eq!(page.total_pages(), (total + size - 1) / size);
        }
    }
}
