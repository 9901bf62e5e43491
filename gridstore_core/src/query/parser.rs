use log::debug;

use super::models::{FieldLogic, FilterCondition, FilterOperator, ListRequest, SortOrder};
use crate::DEFAULT_PAGE_SIZE;

/// Keys that drive pagination, search and scoping rather than filtering.
pub const RESERVED_KEYS: [&str; 6] = ["page", "limit", "search", "gridId", "sortBy", "sortOrder"];

const LOGIC_SUFFIX: &str = "_logic";

/// Parse the raw query-string pairs of a listing request.
///
/// Every non-reserved key is interpreted as `<field>_<operator>` or
/// `<field>_logic`. Field names may themselves contain underscores, so a
/// key is split at its last underscore first; only if that suffix is not a
/// recognized operator is the whole key scanned for the first operator
/// token (in `FilterOperator::ALL` order) and split immediately before it.
///
/// Unknown operators are dropped (logged, no error). Empty values are
/// skipped entirely. A `_logic` key sets the combinator for all conditions
/// sharing its field; the default combinator is OR.
pub fn parse_list_request<'a, I>(params: I) -> ListRequest
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut request = ListRequest::new();

    for (key, value) in params {
        match key {
            "page" => {
                request.page = value.parse().unwrap_or(1);
            }
            "limit" => {
                request.limit = value.parse().unwrap_or(DEFAULT_PAGE_SIZE);
            }
            "search" => {
                let trimmed = value.trim();
                if !trimmed.is_empty() {
                    request.search = Some(trimmed.to_string());
                }
            }
            "gridId" => {
                if !value.is_empty() {
                    request.grid_id = Some(value.to_string());
                }
            }
            "sortBy" => {
                if !value.is_empty() {
                    request.sort_by = Some(value.to_string());
                }
            }
            "sortOrder" => {
                request.sort_order = SortOrder::from_param(value);
            }
            _ => {
                if let Some(field) = key.strip_suffix(LOGIC_SUFFIX) {
                    if !field.is_empty() {
                        request
                            .logic
                            .insert(field.to_string(), FieldLogic::from_param(value));
                        continue;
                    }
                }

                if !key.contains('_') {
                    continue;
                }
                if value.is_empty() {
                    continue;
                }

                match split_filter_key(key) {
                    Some((field, operator)) => {
                        request.filters.push(FilterCondition {
                            field: field.to_string(),
                            operator,
                            value: value.to_string(),
                        });
                    }
                    None => {
                        debug!("dropping filter key with unknown operator: {}", key);
                    }
                }
            }
        }
    }

    request.normalize();
    request
}

/// Split a `<field>_<operator>` key into its parts.
///
/// The suffix after the last underscore is preferred; failing that, the
/// first operator token found anywhere in the key wins and the field is
/// everything before it (minus the joining underscore).
pub fn split_filter_key(key: &str) -> Option<(&str, FilterOperator)> {
    let last = key.rfind('_')?;
    let (field, suffix) = (&key[..last], &key[last + 1..]);

    if let Some(operator) = FilterOperator::from_token(suffix) {
        if !field.is_empty() {
            return Some((field, operator));
        }
        return None;
    }

    for operator in FilterOperator::ALL {
        if let Some(idx) = key.find(operator.token()) {
            if idx < 2 {
                // No room for a field name plus the joining underscore.
                return None;
            }
            return Some((&key[..idx - 1], operator));
        }
    }

    None
}
