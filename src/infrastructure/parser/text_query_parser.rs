use sqlparser::ast::{
    BinaryOperator, Expr, Ident, ObjectName, OrderByExpr, Query, SelectItem, SetExpr, Statement, TableFactor,
    TableWithJoins, UnaryOperator, Value as SqlValue,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::{Parser, ParserError};
use thiserror::Error;

use crate::domain::entity::Value;
use crate::domain::query::{Criterion, FilterOperator, MatchMode, Order, SortDirection, TextQuery};
use crate::domain::repository::ExecutionError;

/// テキストクエリの解析エラー
#[derive(Error, Debug)]
pub enum QueryParseError {
    #[error("Query syntax error: {0}")]
    SyntaxError(String),

    #[error("Unsupported query feature: {0}")]
    UnsupportedFeature(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Parameter {0} is not bound")]
    UnboundParameter(String),
}

impl From<ParserError> for QueryParseError {
    fn from(err: ParserError) -> Self {
        QueryParseError::SyntaxError(err.to_string())
    }
}

impl From<QueryParseError> for ExecutionError {
    fn from(err: QueryParseError) -> Self {
        match err {
            QueryParseError::UnboundParameter(name) => ExecutionError::UnboundParameter(name),
            other => ExecutionError::MalformedQuery(other.to_string()),
        }
    }
}

/// SELECT の結果の形
#[derive(Debug, Clone, PartialEq)]
pub enum SelectProjection {
    /// エンティティ全体 (`select u` / `select *` / 省略)
    Entity,
    /// 件数 (`select count(*)`)
    Count,
    /// 指定したプロパティ
    Properties(Vec<String>),
}

/// SELECT 文の解析結果
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub entity: String,
    pub projection: SelectProjection,
    pub criteria: Vec<Criterion>,
    pub orders: Vec<Order>,
}

/// UPDATE 文の解析結果
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub entity: String,
    pub updates: Vec<(String, Value)>,
    pub criteria: Vec<Criterion>,
}

/// DELETE 文の解析結果
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    pub entity: String,
    pub criteria: Vec<Criterion>,
}

/// 解析されたテキストクエリ
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedStatement {
    Select(SelectStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
}

/// エンティティ名または別名で修飾されたプロパティを解決するための情報
struct Source {
    entity: String,
    alias: Option<String>,
}

impl Source {
    fn refers_to(&self, name: &str) -> bool {
        name == self.entity || self.alias.as_deref() == Some(name)
    }
}

/// パラメータのバインド状態
struct Binder<'q> {
    query: &'q TextQuery,
    next_positional: usize,
}

impl<'q> Binder<'q> {
    fn new(query: &'q TextQuery) -> Self {
        Self {
            query,
            next_positional: 0,
        }
    }

    // `?` は出現順、`?N` は 1 始まりの番号、`:name` は名前で解決する
    fn resolve(&mut self, placeholder: &str) -> Result<Value, QueryParseError> {
        let unbound = || QueryParseError::UnboundParameter(placeholder.to_string());

        if let Some(name) = placeholder.strip_prefix(':') {
            return self.query.named_params().get(name).cloned().ok_or_else(unbound);
        }

        let index = match placeholder.strip_prefix('?') {
            Some("") => {
                let index = self.next_positional;
                self.next_positional += 1;
                index
            }
            Some(number) => number
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .ok_or_else(|| QueryParseError::InvalidValue(format!("Invalid placeholder: {}", placeholder)))?,
            None => return Err(QueryParseError::UnsupportedFeature(format!("Placeholder {}", placeholder))),
        };

        self.query.positional_params().get(index).cloned().ok_or_else(unbound)
    }
}

/// テキストクエリのパーサー
///
/// `[select <射影>] from <エンティティ> [[as] <別名>] [where <条件>] [order by <プロパティ>]` 形式の
/// 問い合わせと、単純な `update` / `delete` を解釈する。
/// プレースホルダーは解析時に [`TextQuery`] にバインドされた値で置き換える。
pub struct TextQueryParser {
    dialect: GenericDialect,
}

impl TextQueryParser {
    /// 新しいパーサーを作成する
    pub fn new() -> Self {
        Self {
            dialect: GenericDialect {},
        }
    }

    /// テキストクエリを解析する
    pub fn parse(&self, query: &TextQuery) -> Result<ParsedStatement, QueryParseError> {
        let text = query.text().trim();
        // 射影を省略した形は SELECT * として解析する
        let sql = if starts_with_keyword(text, "from") {
            format!("select * {}", text)
        } else {
            text.to_string()
        };

        let mut statements = Parser::parse_sql(&self.dialect, &sql)?;
        if statements.len() != 1 {
            return Err(QueryParseError::UnsupportedFeature(
                "Exactly one statement per query is supported".to_string(),
            ));
        }

        let mut binder = Binder::new(query);
        match statements.remove(0) {
            Statement::Query(query) => self.parse_select(*query, &mut binder).map(ParsedStatement::Select),
            Statement::Update { table, assignments, selection, .. } => {
                self.parse_update(table, assignments, selection, &mut binder)
            }
            Statement::Delete { from, selection, .. } => {
                if from.len() != 1 {
                    return Err(QueryParseError::UnsupportedFeature(
                        "Multiple entity delete not supported".to_string(),
                    ));
                }
                let source = self.get_source(&from[0])?;
                let criteria = self.parse_selection(selection, &source, &mut binder)?;
                Ok(ParsedStatement::Delete(DeleteStatement {
                    entity: source.entity,
                    criteria,
                }))
            }
            _ => Err(QueryParseError::UnsupportedFeature("Unsupported statement type".to_string())),
        }
    }

    /// SELECT文を解析する
    fn parse_select(&self, query: Query, binder: &mut Binder<'_>) -> Result<SelectStatement, QueryParseError> {
        let select = match *query.body {
            SetExpr::Select(select) => *select,
            _ => {
                return Err(QueryParseError::UnsupportedFeature(
                    "Only simple select queries are supported".to_string(),
                ))
            }
        };
        if select.from.len() != 1 || !select.from[0].joins.is_empty() {
            return Err(QueryParseError::UnsupportedFeature("Joins are not supported".to_string()));
        }

        let source = self.get_source(&select.from[0])?;
        let projection = self.parse_projection(&select.projection, &source)?;
        let criteria = self.parse_selection(select.selection, &source, binder)?;
        let orders = query
            .order_by
            .iter()
            .map(|order| self.parse_order(order, &source))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SelectStatement {
            entity: source.entity,
            projection,
            criteria,
            orders,
        })
    }

    fn parse_projection(&self, items: &[SelectItem], source: &Source) -> Result<SelectProjection, QueryParseError> {
        if let [item] = items {
            match item {
                SelectItem::Wildcard(_) => return Ok(SelectProjection::Entity),
                SelectItem::QualifiedWildcard(name, _) if object_name(name).map_or(false, |n| source.refers_to(&n)) => {
                    return Ok(SelectProjection::Entity)
                }
                SelectItem::UnnamedExpr(Expr::Identifier(ident)) if source.refers_to(&ident.value) => {
                    return Ok(SelectProjection::Entity)
                }
                SelectItem::UnnamedExpr(Expr::Function(function)) | SelectItem::ExprWithAlias {
                    expr: Expr::Function(function),
                    ..
                } if object_name(&function.name).map_or(false, |n| n.eq_ignore_ascii_case("count")) => {
                    return Ok(SelectProjection::Count)
                }
                _ => {}
            }
        }

        let mut names = Vec::new();
        for item in items {
            let expr = match item {
                SelectItem::UnnamedExpr(expr) | SelectItem::ExprWithAlias { expr, .. } => expr,
                _ => {
                    return Err(QueryParseError::UnsupportedFeature(
                        "Wildcards can not be mixed with properties".to_string(),
                    ))
                }
            };
            names.push(self.property_name(expr, source)?);
        }
        Ok(SelectProjection::Properties(names))
    }

    fn parse_order(&self, order: &OrderByExpr, source: &Source) -> Result<Order, QueryParseError> {
        let property = self.property_name(&order.expr, source)?;
        let direction = match order.asc {
            Some(false) => SortDirection::Desc,
            _ => SortDirection::Asc,
        };
        Ok(Order::new(property, direction))
    }

    /// UPDATE文を解析する
    fn parse_update(
        &self,
        table: TableWithJoins,
        assignments: Vec<sqlparser::ast::Assignment>,
        selection: Option<Expr>,
        binder: &mut Binder<'_>,
    ) -> Result<ParsedStatement, QueryParseError> {
        let source = self.get_source(&table)?;

        let mut updates = Vec::new();
        for assignment in assignments {
            let property = match assignment.id.as_slice() {
                [ident] => ident.value.clone(),
                [qualifier, ident] if source.refers_to(&qualifier.value) => ident.value.clone(),
                _ => {
                    return Err(QueryParseError::UnsupportedFeature(
                        "Compound property identifiers not supported".to_string(),
                    ))
                }
            };
            let value = self.literal(&assignment.value, binder)?;
            updates.push((property, value));
        }

        let criteria = self.parse_selection(selection, &source, binder)?;
        Ok(ParsedStatement::Update(UpdateStatement {
            entity: source.entity,
            updates,
            criteria,
        }))
    }

    fn parse_selection(
        &self,
        selection: Option<Expr>,
        source: &Source,
        binder: &mut Binder<'_>,
    ) -> Result<Vec<Criterion>, QueryParseError> {
        match selection {
            None => Ok(Vec::new()),
            Some(expr) => match self.parse_filter_expression(&expr, source, binder)? {
                Criterion::And(criteria) => Ok(criteria),
                criterion => Ok(vec![criterion]),
            },
        }
    }

    /// エンティティ名と別名を取得する
    fn get_source(&self, table: &TableWithJoins) -> Result<Source, QueryParseError> {
        if let TableFactor::Table { name, alias, .. } = &table.relation {
            Ok(Source {
                entity: object_name(name)?,
                alias: alias.as_ref().map(|a| a.name.value.clone()),
            })
        } else {
            Err(QueryParseError::UnsupportedFeature("Complex query sources not supported".to_string()))
        }
    }

    /// 識別子をプロパティ名に変換する (`age` / `u.age`)
    fn property_name(&self, expr: &Expr, source: &Source) -> Result<String, QueryParseError> {
        match expr {
            Expr::Identifier(ident) => Ok(ident.value.clone()),
            Expr::CompoundIdentifier(idents) => match idents.as_slice() {
                [qualifier, ident] if source.refers_to(&qualifier.value) => Ok(ident.value.clone()),
                _ => Err(QueryParseError::UnsupportedFeature(format!(
                    "Unknown qualifier in {}",
                    idents.iter().map(|i| i.value.as_str()).collect::<Vec<_>>().join(".")
                ))),
            },
            other => Err(QueryParseError::UnsupportedFeature(format!("Expected a property, got {}", other))),
        }
    }

    /// リテラルまたはプレースホルダーを値に変換する
    fn literal(&self, expr: &Expr, binder: &mut Binder<'_>) -> Result<Value, QueryParseError> {
        match expr {
            Expr::Value(SqlValue::Placeholder(placeholder)) => binder.resolve(placeholder),
            Expr::Value(value) => sql_value_to_value(value),
            Expr::UnaryOp { op: UnaryOperator::Minus, expr } => match self.literal(expr, binder)? {
                Value::Integer(i) => Ok(Value::Integer(-i)),
                Value::Long(l) => Ok(Value::Long(-l)),
                Value::Double(d) => Ok(Value::Double(-d)),
                other => Err(QueryParseError::InvalidValue(format!("Can not negate {}", other))),
            },
            Expr::Nested(inner) => self.literal(inner, binder),
            other => Err(QueryParseError::UnsupportedFeature(format!("Expected a value, got {}", other))),
        }
    }

    /// WHERE句の式を条件に変換する
    fn parse_filter_expression(
        &self,
        expr: &Expr,
        source: &Source,
        binder: &mut Binder<'_>,
    ) -> Result<Criterion, QueryParseError> {
        match expr {
            Expr::Nested(inner) => self.parse_filter_expression(inner, source, binder),

            // AND条件
            Expr::BinaryOp {
                left,
                op: BinaryOperator::And,
                right,
            } => {
                let left = self.parse_filter_expression(left, source, binder)?;
                let right = self.parse_filter_expression(right, source, binder)?;
                Ok(merge(left, right, true))
            }

            // OR条件
            Expr::BinaryOp {
                left,
                op: BinaryOperator::Or,
                right,
            } => {
                let left = self.parse_filter_expression(left, source, binder)?;
                let right = self.parse_filter_expression(right, source, binder)?;
                Ok(merge(left, right, false))
            }

            // 単純な比較演算
            Expr::BinaryOp { left, op, right } => {
                let operator = comparison_operator(op)?;
                if let Ok(property) = self.property_name(left, source) {
                    let value = self.literal(right, binder)?;
                    Ok(Criterion::compare(property, operator, value))
                } else {
                    // 左右が逆の場合は演算子を反転する
                    let value = self.literal(left, binder)?;
                    let property = self.property_name(right, source)?;
                    Ok(Criterion::compare(property, reverse(operator), value))
                }
            }

            Expr::Like {
                negated: false,
                expr,
                pattern,
                escape_char: None,
            } => {
                let property = self.property_name(expr, source)?;
                let pattern = match self.literal(pattern, binder)? {
                    Value::Text(pattern) => pattern,
                    other => {
                        return Err(QueryParseError::InvalidValue(format!(
                            "Like pattern must be a string, got {}",
                            other
                        )))
                    }
                };
                let (needle, mode) = MatchMode::from_pattern(&pattern);
                Ok(Criterion::like(property, needle, mode))
            }

            _ => Err(QueryParseError::UnsupportedFeature(format!("Unsupported where expression: {}", expr))),
        }
    }
}

impl Default for TextQueryParser {
    fn default() -> Self {
        Self::new()
    }
}

// 同じ種類の条件はひとつにまとめる
fn merge(left: Criterion, right: Criterion, conjunction: bool) -> Criterion {
    let split = |criterion: Criterion| match criterion {
        Criterion::And(criteria) if conjunction => criteria,
        Criterion::Or(criteria) if !conjunction => criteria,
        other => vec![other],
    };

    let mut criteria = split(left);
    criteria.extend(split(right));
    if conjunction {
        Criterion::And(criteria)
    } else {
        Criterion::Or(criteria)
    }
}

fn comparison_operator(op: &BinaryOperator) -> Result<FilterOperator, QueryParseError> {
    match op {
        BinaryOperator::Eq => Ok(FilterOperator::Equal),
        BinaryOperator::NotEq => Ok(FilterOperator::NotEqual),
        BinaryOperator::Gt => Ok(FilterOperator::Greater),
        BinaryOperator::GtEq => Ok(FilterOperator::GreaterOrEqual),
        BinaryOperator::Lt => Ok(FilterOperator::Less),
        BinaryOperator::LtEq => Ok(FilterOperator::LessOrEqual),
        _ => Err(QueryParseError::UnsupportedFeature(format!("Unsupported operator: {}", op))),
    }
}

fn reverse(operator: FilterOperator) -> FilterOperator {
    match operator {
        FilterOperator::Greater => FilterOperator::Less,
        FilterOperator::GreaterOrEqual => FilterOperator::LessOrEqual,
        FilterOperator::Less => FilterOperator::Greater,
        FilterOperator::LessOrEqual => FilterOperator::GreaterOrEqual,
        other => other,
    }
}

fn object_name(name: &ObjectName) -> Result<String, QueryParseError> {
    match name.0.as_slice() {
        [Ident { value, .. }] => Ok(value.clone()),
        _ => Err(QueryParseError::UnsupportedFeature(
            "Schema qualified names not supported".to_string(),
        )),
    }
}

fn starts_with_keyword(text: &str, keyword: &str) -> bool {
    text.len() > keyword.len()
        && text[..keyword.len()].eq_ignore_ascii_case(keyword)
        && text[keyword.len()..].starts_with(char::is_whitespace)
}

/// SQL値をドメイン値に変換する
fn sql_value_to_value(value: &SqlValue) -> Result<Value, QueryParseError> {
    match value {
        SqlValue::Number(n, _) => {
            if n.contains('.') || n.contains('e') || n.contains('E') {
                n.parse::<f64>()
                    .map(Value::Double)
                    .map_err(|_| QueryParseError::InvalidValue(format!("Invalid number: {}", n)))
            } else if let Ok(i) = n.parse::<i32>() {
                Ok(Value::Integer(i))
            } else {
                n.parse::<i64>()
                    .map(Value::Long)
                    .map_err(|_| QueryParseError::InvalidValue(format!("Invalid integer: {}", n)))
            }
        }
        SqlValue::SingleQuotedString(s) | SqlValue::DoubleQuotedString(s) => Ok(Value::Text(s.clone())),
        SqlValue::Boolean(b) => Ok(Value::Boolean(*b)),
        SqlValue::Null => Ok(Value::Null),
        _ => Err(QueryParseError::InvalidValue(format!("Unsupported value: {}", value))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> ParsedStatement {
        TextQueryParser::new().parse(&TextQuery::new(text)).unwrap()
    }

    fn select(text: &str) -> SelectStatement {
        match parse(text) {
            ParsedStatement::Select(select) => select,
            other => panic!("expected select, got {:?}", other),
        }
    }

    #[test]
    fn entity_selection_with_alias() {
        let select = select("select u from GenericUser as u where u.age<30 order by u.age desc, u.name");

        assert_eq!(select.entity, "GenericUser");
        assert_eq!(select.projection, SelectProjection::Entity);
        assert_eq!(select.criteria, vec![Criterion::lt("age", 30)]);
        assert_eq!(select.orders, vec![Order::desc("age"), Order::asc("name")]);
    }

    #[test]
    fn bare_from_clause() {
        let select = select("from GenericUser u where u.name = 'jo' and (u.age > 20 or u.age < 10)");

        assert_eq!(select.projection, SelectProjection::Entity);
        assert_eq!(
            select.criteria,
            vec![
                Criterion::eq("name", "jo"),
                Criterion::Or(vec![Criterion::gt("age", 20), Criterion::lt("age", 10)]),
            ]
        );
    }

    #[test]
    fn count_projection() {
        let select = select("select count(*) from GenericUser as u where u.age<30 ");
        assert_eq!(select.projection, SelectProjection::Count);
    }

    #[test]
    fn property_projection() {
        let select = select("select u.name, age from GenericUser u");
        assert_eq!(select.projection, SelectProjection::Properties(vec!["name".into(), "age".into()]));
    }

    #[test]
    fn like_patterns_and_reversed_operands() {
        let select = select("from GenericUser where name like 'jo%' and 30 > age");
        assert_eq!(
            select.criteria,
            vec![Criterion::like("name", "jo", MatchMode::Start), Criterion::lt("age", 30)]
        );
    }

    #[test]
    fn binds_positional_and_named_parameters() {
        let mut query = TextQuery::new("from GenericUser u where u.age > ? and u.name = ? and u.id <> :id");
        query
            .bind_positional(0, Value::from(20))
            .bind_positional(1, Value::from("jo"))
            .bind_named("id", Value::from(3i64));

        let parsed = TextQueryParser::new().parse(&query).unwrap();
        let ParsedStatement::Select(select) = parsed else {
            panic!("expected select");
        };
        assert_eq!(
            select.criteria,
            vec![Criterion::gt("age", 20), Criterion::eq("name", "jo"), Criterion::ne("id", 3i64)]
        );
    }

    #[test]
    fn unbound_parameter() {
        let err = TextQueryParser::new()
            .parse(&TextQuery::new("from GenericUser u where u.name = :name"))
            .unwrap_err();
        assert!(matches!(err, QueryParseError::UnboundParameter(ref p) if p == ":name"));
        assert!(matches!(ExecutionError::from(err), ExecutionError::UnboundParameter(_)));
    }

    #[test]
    fn update_and_delete() {
        let mut query = TextQuery::new("update GenericUser set age = ? where name = ?");
        query.bind_positional(0, Value::from(41)).bind_positional(1, Value::from("ken"));
        assert_eq!(
            TextQueryParser::new().parse(&query).unwrap(),
            ParsedStatement::Update(UpdateStatement {
                entity: "GenericUser".into(),
                updates: vec![("age".into(), Value::Integer(41))],
                criteria: vec![Criterion::eq("name", "ken")],
            })
        );

        assert_eq!(
            parse("delete from GenericUser where age >= 60"),
            ParsedStatement::Delete(DeleteStatement {
                entity: "GenericUser".into(),
                criteria: vec![Criterion::ge("age", 60)],
            })
        );
    }

    #[test]
    fn rejects_unknown_qualifier_and_syntax_errors() {
        let parser = TextQueryParser::new();
        assert!(matches!(
            parser.parse(&TextQuery::new("from GenericUser u where x.age = 1")),
            Err(QueryParseError::UnsupportedFeature(_))
        ));
        assert!(matches!(
            parser.parse(&TextQuery::new("select from where")),
            Err(QueryParseError::SyntaxError(_))
        ));
    }
}
