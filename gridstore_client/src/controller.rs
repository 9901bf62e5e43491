use std::collections::HashMap;

use log::debug;

use gridstore_core::models::{Page, Record};
use gridstore_core::query::{FieldLogic, FilterOperator, SortOrder};
use gridstore_core::schema::{infer_columns, InferredColumn};
use gridstore_core::DEFAULT_PAGE_SIZE;

/// One user-visible filter, shown as a dismissible chip.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveFilter {
    pub field: String,
    pub operator: FilterOperator,
    pub value: String,
}

impl ActiveFilter {
    pub fn chip_label(&self) -> String {
        match self.operator {
            FilterOperator::IsEmpty => format!("{} is empty", self.field),
            _ => format!("{} {} \"{}\"", self.field, self.operator.token(), self.value),
        }
    }
}

/// The single authoritative filter store. Every view the UI needs — the
/// query parameter map sent to the server, the chip list — is derived from
/// this state on demand, so they cannot drift apart.
#[derive(Debug, Clone, Default)]
pub struct FilterState {
    filters: Vec<ActiveFilter>,
    logic: HashMap<String, FieldLogic>,
    search: Option<String>,
    grid_id: Option<String>,
    sort_by: Option<String>,
    sort_order: SortOrder,
    page: u32,
    limit: u32,
}

impl FilterState {
    pub fn new() -> FilterState {
        FilterState {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
            ..Default::default()
        }
    }

    pub fn for_grid(grid_id: impl Into<String>) -> FilterState {
        FilterState {
            grid_id: Some(grid_id.into()),
            ..FilterState::new()
        }
    }

    pub fn filters(&self) -> &[ActiveFilter] {
        &self.filters
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn set_page(&mut self, page: u32) {
        self.page = page.max(1);
    }

    pub fn set_limit(&mut self, limit: u32) {
        self.limit = limit.max(1);
        self.page = 1;
    }

    /// Changing the search text always jumps back to the first page.
    pub fn set_search(&mut self, search: impl Into<String>) {
        let search = search.into();
        self.search = if search.trim().is_empty() {
            None
        } else {
            Some(search)
        };
        self.page = 1;
    }

    pub fn set_sort(&mut self, field: impl Into<String>, order: SortOrder) {
        self.sort_by = Some(field.into());
        self.sort_order = order;
    }

    pub fn clear_sort(&mut self) {
        self.sort_by = None;
        self.sort_order = SortOrder::default();
    }

    pub fn add_filter(
        &mut self,
        field: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<String>,
    ) {
        self.filters.push(ActiveFilter {
            field: field.into(),
            operator,
            value: value.into(),
        });
        self.page = 1;
    }

    /// Combinator for multiple filters on one field; only meaningful when
    /// at least two filters share the field.
    pub fn set_logic(&mut self, field: impl Into<String>, logic: FieldLogic) {
        self.logic.insert(field.into(), logic);
    }

    /// Remove the chip at `index`. Dismissing the last chip also clears the
    /// free-text search and returns to the first page.
    pub fn remove_filter(&mut self, index: usize) {
        if index >= self.filters.len() {
            debug!("ignoring removal of missing filter chip {}", index);
            return;
        }
        let removed = self.filters.remove(index);
        if !self.filters.iter().any(|f| f.field == removed.field) {
            self.logic.remove(&removed.field);
        }
        if self.filters.is_empty() {
            self.search = None;
        }
        self.page = 1;
    }

    pub fn clear_filters(&mut self) {
        self.filters.clear();
        self.logic.clear();
        self.search = None;
        self.page = 1;
    }

    pub fn chips(&self) -> Vec<String> {
        self.filters.iter().map(ActiveFilter::chip_label).collect()
    }

    /// Derive the query parameter list for `GET /api/data`. Filter keys use
    /// the `<field>_<operator>` wire shim; repeated keys are legal and carry
    /// multiple conditions on one field.
    pub fn query_params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("page".to_string(), self.page.to_string()),
            ("limit".to_string(), self.limit.to_string()),
        ];

        if let Some(search) = &self.search {
            params.push(("search".to_string(), search.clone()));
        }
        if let Some(grid_id) = &self.grid_id {
            params.push(("gridId".to_string(), grid_id.clone()));
        }
        if let Some(sort_by) = &self.sort_by {
            params.push(("sortBy".to_string(), sort_by.clone()));
            params.push(("sortOrder".to_string(), self.sort_order.sql().to_lowercase()));
        }

        for filter in &self.filters {
            let key = format!("{}_{}", filter.field, filter.operator.token());
            // isEmpty needs no operand but the server drops empty values.
            let value = if filter.value.is_empty() {
                "true".to_string()
            } else {
                filter.value.clone()
            };
            params.push((key, value));
        }

        for (field, logic) in &self.logic {
            params.push((format!("{}_logic", field), logic.sql().to_string()));
        }

        params
    }
}

/// The loaded result set behind the grid: rows, pagination numbers and the
/// columns inferred once per response. `apply` overwrites unconditionally —
/// there is no request sequencing, so when responses arrive out of order
/// the last one to land wins regardless of issue order.
#[derive(Debug, Default)]
pub struct GridView {
    pub rows: Vec<Record>,
    pub total: u64,
    pub page: u32,
    pub total_pages: u64,
    pub columns: Vec<InferredColumn>,
    column_order: Option<Vec<String>>,
}

impl GridView {
    pub fn new() -> GridView {
        GridView::default()
    }

    /// A view backed by a named grid renders columns in the order of the
    /// originating CSV header.
    pub fn with_column_order(column_order: Vec<String>) -> GridView {
        GridView {
            column_order: Some(column_order),
            ..GridView::default()
        }
    }

    pub fn apply(&mut self, response: Page<Record>) {
        self.columns = infer_columns(&response.data, self.column_order.as_deref());
        self.rows = response.data;
        self.total = response.total;
        self.page = response.page;
        self.total_pages = response.total_pages;
    }
}
