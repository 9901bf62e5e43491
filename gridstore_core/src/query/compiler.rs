use std::collections::HashMap;

use log::debug;
use rusqlite::types::Value as SqlValue;

use super::models::{FilterCondition, FilterOperator, ListRequest};

/// A listing request compiled to parameterized SQL over the JSON column.
///
/// Field names are attacker-controlled, so JSON paths are always bound as
/// parameters (`json_extract(data, ?)`) and never interpolated into the
/// statement text.
#[derive(Debug)]
pub struct CompiledQuery {
    where_sql: String,
    where_params: Vec<SqlValue>,
    order_sql: String,
    order_params: Vec<SqlValue>,
}

impl CompiledQuery {
    /// Paginated data statement. Parameters: WHERE, ORDER BY, LIMIT, OFFSET.
    pub fn select_sql(&self) -> String {
        format!(
            "SELECT id, data, added_by, grid_id, created_at FROM universal_data \
             WHERE {} ORDER BY {} LIMIT ? OFFSET ?",
            self.where_sql, self.order_sql
        )
    }

    pub fn select_params(&self, limit: u32, offset: u64) -> Vec<SqlValue> {
        let mut params = self.where_params.clone();
        params.extend(self.order_params.iter().cloned());
        params.push(SqlValue::Integer(limit as i64));
        params.push(SqlValue::Integer(offset as i64));
        params
    }

    /// Twin COUNT statement sharing the identical predicate, so pagination
    /// metadata stays consistent with the filtered set.
    pub fn count_sql(&self) -> String {
        format!(
            "SELECT COUNT(*) FROM universal_data WHERE {}",
            self.where_sql
        )
    }

    pub fn count_params(&self) -> Vec<SqlValue> {
        self.where_params.clone()
    }
}

/// Compile a parsed listing request into SQL for the given owner.
///
/// `search_fields` is the configurable allow-list of textual fields probed
/// case-insensitively by the free-text search, on top of the document-wide
/// serialized-JSON probes.
pub fn compile(owner: &str, request: &ListRequest, search_fields: &[String]) -> CompiledQuery {
    let mut clauses: Vec<String> = Vec::new();
    let mut params: Vec<SqlValue> = Vec::new();

    clauses.push("added_by = ?".to_string());
    params.push(SqlValue::Text(owner.to_string()));

    if let Some(grid_id) = &request.grid_id {
        clauses.push("grid_id = ?".to_string());
        params.push(SqlValue::Text(grid_id.clone()));
    }

    if let Some(term) = request.search.as_deref().map(str::trim) {
        if !term.is_empty() {
            let (sql, mut search_params) = search_clause(term, search_fields);
            clauses.push(sql);
            params.append(&mut search_params);
        }
    }

    // Group conditions per field, preserving first-seen field order. One
    // condition stands alone; several join with the field's combinator
    // inside a parenthesized group. Groups combine with AND.
    let mut field_order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<(String, Vec<SqlValue>)>> = HashMap::new();

    for condition in &request.filters {
        let Some(fragment) = condition_sql(condition) else {
            continue;
        };
        groups
            .entry(condition.field.as_str())
            .or_insert_with(|| {
                field_order.push(condition.field.as_str());
                Vec::new()
            })
            .push(fragment);
    }

    for field in field_order {
        let fragments = groups.remove(field).unwrap_or_default();
        if fragments.len() == 1 {
            let (sql, mut frag_params) = fragments.into_iter().next().unwrap();
            clauses.push(sql);
            params.append(&mut frag_params);
        } else if fragments.len() > 1 {
            let logic = request.logic_for(field);
            let joined = fragments
                .iter()
                .map(|(sql, _)| sql.as_str())
                .collect::<Vec<_>>()
                .join(&format!(" {} ", logic.sql()));
            clauses.push(format!("({})", joined));
            for (_, mut frag_params) in fragments {
                params.append(&mut frag_params);
            }
        }
    }

    let (order_sql, order_params) = order_clause(request);

    CompiledQuery {
        where_sql: clauses.join(" AND "),
        where_params: params,
        order_sql,
        order_params,
    }
}

/// SQLite JSON path for a field name. Double quotes cannot be escaped
/// inside a quoted path step, so they are stripped.
fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field.replace('"', ""))
}

fn like_pattern(value: &str) -> String {
    format!("%{}%", value)
}

fn condition_sql(condition: &FilterCondition) -> Option<(String, Vec<SqlValue>)> {
    let path = json_path(&condition.field);
    let value = condition.value.as_str();

    if condition.operator.is_numeric() {
        // to_number() yields NULL for non-numeric stored values, so they
        // never satisfy the comparison; rows are excluded, not erred.
        let Ok(number) = value.trim().parse::<f64>() else {
            debug!(
                "dropping non-numeric value {:?} for {} on field {}",
                value,
                condition.operator.token(),
                condition.field
            );
            return None;
        };
        let cmp = match condition.operator {
            FilterOperator::GreaterThan => ">",
            FilterOperator::LessThan => "<",
            FilterOperator::GreaterThanOrEqual => ">=",
            FilterOperator::LessThanOrEqual => "<=",
            _ => unreachable!(),
        };
        return Some((
            format!("to_number(json_extract(data, ?)) {} ?", cmp),
            vec![SqlValue::Text(path), SqlValue::Real(number)],
        ));
    }

    let lowered = value.to_lowercase();
    match condition.operator {
        FilterOperator::Contains => Some((
            "LOWER(json_extract(data, ?)) LIKE ?".to_string(),
            vec![
                SqlValue::Text(path),
                SqlValue::Text(like_pattern(&lowered)),
            ],
        )),
        FilterOperator::Equals => Some((
            "LOWER(json_extract(data, ?)) = ?".to_string(),
            vec![SqlValue::Text(path), SqlValue::Text(lowered)],
        )),
        FilterOperator::StartsWith => Some((
            "LOWER(json_extract(data, ?)) LIKE ?".to_string(),
            vec![
                SqlValue::Text(path),
                SqlValue::Text(format!("{}%", lowered)),
            ],
        )),
        FilterOperator::EndsWith => Some((
            "LOWER(json_extract(data, ?)) LIKE ?".to_string(),
            vec![
                SqlValue::Text(path),
                SqlValue::Text(format!("%{}", lowered)),
            ],
        )),
        FilterOperator::IsEmpty => Some((
            "(json_extract(data, ?) IS NULL OR json_extract(data, ?) = '' \
             OR json_extract(data, ?) = 'null' OR json_extract(data, ?) = 'undefined')"
                .to_string(),
            vec![
                SqlValue::Text(path.clone()),
                SqlValue::Text(path.clone()),
                SqlValue::Text(path.clone()),
                SqlValue::Text(path),
            ],
        )),
        _ => unreachable!("numeric operators handled above"),
    }
}

/// Free-text search: three document-wide probes over the serialized JSON
/// (exact, lowercase and uppercase variants of the term; full-document
/// matching is deliberately not case-folded, preserving the original
/// behavior) plus a case-insensitive probe on each allow-listed field.
fn search_clause(term: &str, search_fields: &[String]) -> (String, Vec<SqlValue>) {
    let mut probes = vec![
        "data LIKE ?".to_string(),
        "data LIKE ?".to_string(),
        "data LIKE ?".to_string(),
    ];
    let mut params = vec![
        SqlValue::Text(like_pattern(term)),
        SqlValue::Text(like_pattern(&term.to_lowercase())),
        SqlValue::Text(like_pattern(&term.to_uppercase())),
    ];

    for field in search_fields {
        probes.push("LOWER(json_extract(data, ?)) LIKE ?".to_string());
        params.push(SqlValue::Text(json_path(field)));
        params.push(SqlValue::Text(like_pattern(&term.to_lowercase())));
    }

    (format!("({})", probes.join(" OR ")), params)
}

/// Default order is newest first; `id` breaks creation-time ties so pages
/// are deterministic either way.
fn order_clause(request: &ListRequest) -> (String, Vec<SqlValue>) {
    match &request.sort_by {
        Some(field) => {
            let dir = request.sort_order.sql();
            (
                format!("json_extract(data, ?) {}, id {}", dir, dir),
                vec![SqlValue::Text(json_path(field))],
            )
        }
        None => ("created_at DESC, id DESC".to_string(), Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use rusqlite::{params_from_iter, Connection};
    use serde_json::json;

    use super::*;
    use crate::query::models::{FieldLogic, FilterCondition, FilterOperator, ListRequest};
    use crate::query::parser::parse_list_request;
    use crate::storage::pool::register_functions;

    fn seed(rows: &[(&str, serde_json::Value)]) -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        register_functions(&conn).unwrap();
        conn.execute_batch(
            "CREATE TABLE universal_data (
                id TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                added_by TEXT NOT NULL,
                grid_id TEXT,
                created_at TEXT NOT NULL
            )",
        )
        .unwrap();
        for (i, (id, data)) in rows.iter().enumerate() {
            conn.execute(
                "INSERT INTO universal_data (id, data, added_by, grid_id, created_at)
                 VALUES (?, ?, 'u1', NULL, ?)",
                rusqlite::params![id, data.to_string(), format!("2024-01-01T00:00:{:02}Z", i)],
            )
            .unwrap();
        }
        conn
    }

    fn run(conn: &Connection, request: &ListRequest) -> Vec<String> {
        let compiled = compile("u1", request, &[]);
        let mut stmt = conn.prepare(&compiled.select_sql()).unwrap();
        let ids = stmt
            .query_map(
                params_from_iter(compiled.select_params(request.limit, request.offset())),
                |row| row.get::<_, String>(0),
            )
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        ids
    }

    fn count(conn: &Connection, request: &ListRequest) -> u64 {
        let compiled = compile("u1", request, &[]);
        conn.query_row(
            &compiled.count_sql(),
            params_from_iter(compiled.count_params()),
            |row| row.get::<_, u64>(0),
        )
        .unwrap()
    }

    fn request_from(pairs: &[(&str, &str)]) -> ListRequest {
        parse_list_request(pairs.iter().copied())
    }

    #[test]
    fn contains_is_case_insensitive() {
        let conn = seed(&[
            ("a", json!({"Brand": "BMW"})),
            ("b", json!({"Brand": "Audi"})),
            ("c", json!({"Model": "i3"})),
        ]);
        let req = request_from(&[("Brand_contains", "bm")]);
        assert_eq!(run(&conn, &req), vec!["a"]);
    }

    #[test]
    fn rows_lacking_the_field_are_excluded_by_contains() {
        let conn = seed(&[("a", json!({"Brand": "BMW"})), ("b", json!({"Other": "BMW"}))]);
        let req = request_from(&[("Brand_contains", "bmw")]);
        assert_eq!(run(&conn, &req), vec!["a"]);
    }

    #[test]
    fn same_field_or_matches_either() {
        let conn = seed(&[
            ("a", json!({"Brand": "BMW"})),
            ("b", json!({"Brand": "Audi"})),
            ("c", json!({"Brand": "Kia"})),
        ]);
        let req = request_from(&[("Brand_equals", "bmw"), ("Brand_equals", "audi")]);
        let mut ids = run(&conn, &req);
        ids.sort();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn same_field_and_requires_both() {
        let conn = seed(&[
            ("a", json!({"Brand": "BMW i3"})),
            ("b", json!({"Brand": "BMW X5"})),
        ]);
        let req = request_from(&[
            ("Brand_contains", "bmw"),
            ("Brand_contains", "i3"),
            ("Brand_logic", "AND"),
        ]);
        assert_eq!(run(&conn, &req), vec!["a"]);
    }

    #[test]
    fn different_fields_always_and() {
        let conn = seed(&[
            ("a", json!({"Brand": "BMW", "Seats": "4"})),
            ("b", json!({"Brand": "BMW", "Seats": "2"})),
            ("c", json!({"Brand": "Kia", "Seats": "4"})),
        ]);
        let req = request_from(&[("Brand_equals", "bmw"), ("Seats_equals", "4")]);
        assert_eq!(run(&conn, &req), vec!["a"]);
    }

    #[test]
    fn numeric_cast_excludes_blank_values() {
        // Bo's empty salary fails the cast and is excluded,
        // not erred — for lessThan as well as greaterThan.
        let conn = seed(&[
            ("ann", json!({"Name": "Ann", "Salary": "50000"})),
            ("bo", json!({"Name": "Bo", "Salary": ""})),
        ]);
        let req = request_from(&[("Salary_greaterThan", "10000")]);
        assert_eq!(run(&conn, &req), vec!["ann"]);
        let req = request_from(&[("Salary_lessThan", "99999")]);
        assert_eq!(run(&conn, &req), vec!["ann"]);
    }

    #[test]
    fn numeric_operators_compare_numerically_not_lexically() {
        let conn = seed(&[
            ("a", json!({"Price": "9"})),
            ("b", json!({"Price": "100"})),
        ]);
        let req = request_from(&[("Price_greaterThan", "50")]);
        assert_eq!(run(&conn, &req), vec!["b"]);
    }

    #[test]
    fn is_empty_matches_null_blank_and_literals() {
        let conn = seed(&[
            ("a", json!({"Note": ""})),
            ("b", json!({"Note": "null"})),
            ("c", json!({"Note": "undefined"})),
            ("d", json!({"Other": "x"})),
            ("e", json!({"Note": "filled"})),
        ]);
        let req = request_from(&[("Note_isEmpty", "true")]);
        let mut ids = run(&conn, &req);
        ids.sort();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn search_probes_serialized_document() {
        let conn = seed(&[
            ("a", json!({"Brand": "Tesla"})),
            ("b", json!({"Brand": "BMW"})),
        ]);
        let req = request_from(&[("search", "tesla")]);
        // Lowercase probe cannot match "Tesla" document-wide; the exact and
        // uppercase probes miss too. The allow-list is what makes
        // mixed-case terms findable.
        assert!(run(&conn, &req).is_empty());

        let compiled = compile("u1", &req, &["Brand".to_string()]);
        let mut stmt = conn.prepare(&compiled.select_sql()).unwrap();
        let ids: Vec<String> = stmt
            .query_map(
                params_from_iter(compiled.select_params(req.limit, req.offset())),
                |row| row.get(0),
            )
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(ids, vec!["a"]);
    }

    #[test]
    fn count_matches_predicate_regardless_of_window() {
        let conn = seed(&[
            ("a", json!({"Brand": "BMW"})),
            ("b", json!({"Brand": "BMW"})),
            ("c", json!({"Brand": "Kia"})),
        ]);
        let mut req = request_from(&[("Brand_equals", "bmw")]);
        req.limit = 1;
        assert_eq!(run(&conn, &req).len(), 1);
        assert_eq!(count(&conn, &req), 2);
    }

    #[test]
    fn default_order_is_newest_first_with_id_tiebreak() {
        let conn = seed(&[
            ("a", json!({"N": "1"})),
            ("b", json!({"N": "2"})),
            ("c", json!({"N": "3"})),
        ]);
        let req = request_from(&[]);
        assert_eq!(run(&conn, &req), vec!["c", "b", "a"]);
    }

    #[test]
    fn sort_by_json_field() {
        let conn = seed(&[
            ("a", json!({"Name": "zeta"})),
            ("b", json!({"Name": "alpha"})),
        ]);
        let req = request_from(&[("sortBy", "Name"), ("sortOrder", "asc")]);
        assert_eq!(run(&conn, &req), vec!["b", "a"]);
    }

    #[test]
    fn owner_scope_is_always_applied() {
        let conn = seed(&[("a", json!({"Brand": "BMW"}))]);
        conn.execute(
            "INSERT INTO universal_data (id, data, added_by, grid_id, created_at)
             VALUES ('z', '{\"Brand\":\"BMW\"}', 'someone-else', NULL, '2024-01-02T00:00:00Z')",
            [],
        )
        .unwrap();
        let req = request_from(&[]);
        assert_eq!(run(&conn, &req), vec!["a"]);
    }

    #[test]
    fn hostile_field_names_cannot_break_out() {
        let conn = seed(&[("a", json!({"Brand": "BMW"}))]);
        let req = ListRequest {
            filters: vec![FilterCondition {
                field: "x\") OR 1=1 --".to_string(),
                operator: FilterOperator::Contains,
                value: "anything".to_string(),
            }],
            ..request_from(&[])
        };
        // The path is bound, so the condition simply matches nothing.
        assert!(run(&conn, &req).is_empty());
    }

    #[test]
    fn logic_defaults_to_or_when_unspecified() {
        let req = request_from(&[("Brand_equals", "a"), ("Brand_equals", "b")]);
        assert_eq!(req.logic_for("Brand"), FieldLogic::Or);
    }
}
