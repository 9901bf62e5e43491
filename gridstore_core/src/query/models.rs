use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// The nine comparison operators a filter key may carry.
///
/// Declaration order matters: when an operator token has to be located by
/// substring scanning inside a query-string key, candidates are tried in
/// this order, so `greaterThan` wins over `greaterThanOrEqual` for keys
/// where both occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOperator {
    Contains,
    Equals,
    StartsWith,
    EndsWith,
    IsEmpty,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
}

impl FilterOperator {
    pub const ALL: [FilterOperator; 9] = [
        FilterOperator::Contains,
        FilterOperator::Equals,
        FilterOperator::StartsWith,
        FilterOperator::EndsWith,
        FilterOperator::IsEmpty,
        FilterOperator::GreaterThan,
        FilterOperator::LessThan,
        FilterOperator::GreaterThanOrEqual,
        FilterOperator::LessThanOrEqual,
    ];

    pub fn token(&self) -> &'static str {
        match self {
            FilterOperator::Contains => "contains",
            FilterOperator::Equals => "equals",
            FilterOperator::StartsWith => "startsWith",
            FilterOperator::EndsWith => "endsWith",
            FilterOperator::IsEmpty => "isEmpty",
            FilterOperator::GreaterThan => "greaterThan",
            FilterOperator::LessThan => "lessThan",
            FilterOperator::GreaterThanOrEqual => "greaterThanOrEqual",
            FilterOperator::LessThanOrEqual => "lessThanOrEqual",
        }
    }

    pub fn from_token(token: &str) -> Option<FilterOperator> {
        FilterOperator::ALL.into_iter().find(|op| op.token() == token)
    }

    /// Operators that compare the extracted value numerically.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            FilterOperator::GreaterThan
                | FilterOperator::LessThan
                | FilterOperator::GreaterThanOrEqual
                | FilterOperator::LessThanOrEqual
        )
    }
}

/// Combinator for multiple conditions on the same field. Fields are always
/// ANDed against each other; within one field the default is OR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldLogic {
    And,
    #[default]
    Or,
}

impl FieldLogic {
    pub fn from_param(value: &str) -> FieldLogic {
        if value.trim().eq_ignore_ascii_case("AND") {
            FieldLogic::And
        } else {
            FieldLogic::Or
        }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            FieldLogic::And => "AND",
            FieldLogic::Or => "OR",
        }
    }
}

/// One structured filter condition. The query-string shim
/// (`<field>_<operator>=value`) parses into a list of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub field: String,
    pub operator: FilterOperator,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn from_param(value: &str) -> SortOrder {
        if value.trim().eq_ignore_ascii_case("asc") {
            SortOrder::Asc
        } else {
            SortOrder::Desc
        }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// A fully parsed listing request: pagination window, free-text search,
/// optional grid scope and sort, plus the structured filters with their
/// per-field combinators.
#[derive(Debug, Clone, Default)]
pub struct ListRequest {
    pub page: u32,
    pub limit: u32,
    pub search: Option<String>,
    pub grid_id: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: SortOrder,
    pub filters: Vec<FilterCondition>,
    pub logic: HashMap<String, FieldLogic>,
}

impl ListRequest {
    pub fn new() -> Self {
        ListRequest {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
            ..Default::default()
        }
    }

    pub fn offset(&self) -> u64 {
        (self.page.max(1) as u64 - 1) * self.limit as u64
    }

    /// Clamp pagination inputs into a sane window.
    pub fn normalize(&mut self) {
        if self.page == 0 {
            self.page = 1;
        }
        if self.limit == 0 {
            self.limit = DEFAULT_PAGE_SIZE;
        }
        if self.limit > MAX_PAGE_SIZE {
            self.limit = MAX_PAGE_SIZE;
        }
    }

    /// Combinator for a field, defaulting to OR when none was supplied.
    pub fn logic_for(&self, field: &str) -> FieldLogic {
        self.logic.get(field).copied().unwrap_or_default()
    }
}
