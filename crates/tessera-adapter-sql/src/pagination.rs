//! Page slicing over a buffered result.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ExecutionError;

/// One page of a statement's result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PagedResult {
    /// Output column names, in statement order, also for empty results.
    pub columns: Vec<String>,
    pub total_pages: u64,
    pub row_count: u64,
    pub page: u64,
    pub data: Vec<Map<String, Value>>,
}

/// Slice rows `[(page-1)*page_size, page*page_size)` out of `rows`.
///
/// Pages past the end are empty but still report the full `row_count`.
pub fn paginate(
    columns: Vec<String>,
    rows: Vec<Map<String, Value>>,
    page: u64,
    page_size: u64,
) -> Result<PagedResult, ExecutionError> {
    if page < 1 || page_size < 1 {
        return Err(ExecutionError::InvalidPagination { page, page_size });
    }

    let row_count = rows.len() as u64;
    let total_pages = row_count.div_ceil(page_size);
    let start = (page - 1).saturating_mul(page_size);

    let data = if start >= row_count {
        Vec::new()
    } else {
        // Saturate on targets where usize is narrower than u64.
        rows.into_iter()
            .skip(usize::try_from(start).unwrap_or(usize::MAX))
            .take(usize::try_from(page_size).unwrap_or(usize::MAX))
            .collect()
    };

    Ok(PagedResult {
        columns,
        total_pages,
        row_count,
        page,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(n: u64) -> Vec<Map<String, Value>> {
        (0..n)
            .map(|i| {
                let mut row = Map::new();
                row.insert("n".to_string(), json!(i));
                row
            })
            .collect()
    }

    fn ids(result: &PagedResult) -> Vec<u64> {
        result.data.iter().filter_map(|r| r["n"].as_u64()).collect()
    }

    #[test]
    fn test_first_and_last_page() {
        let first = paginate(vec!["n".to_string()], rows(347), 1, 25).unwrap();
        assert_eq!(first.total_pages, 13);
        assert_eq!(first.row_count, 347);
        assert_eq!(ids(&first), (0..25).collect::<Vec<_>>());

        let last = paginate(vec!["n".to_string()], rows(347), 13, 25).unwrap();
        assert_eq!(ids(&last), (325..347).collect::<Vec<_>>());
    }

    #[test]
    fn test_page_past_the_end_is_empty() {
        let result = paginate(vec!["n".to_string()], rows(347), 14, 25).unwrap();
        assert!(result.data.is_empty());
        assert_eq!(result.row_count, 347);
        assert_eq!(result.page, 14);
    }

    #[test]
    fn test_empty_result() {
        let columns = vec!["AlbumId".to_string(), "Title".to_string()];
        let result = paginate(columns.clone(), Vec::new(), 1, 25).unwrap();
        assert_eq!(result.total_pages, 0);
        assert_eq!(result.row_count, 0);
        assert_eq!(result.columns, columns);
    }

    #[test]
    fn test_invalid_pagination() {
        assert!(matches!(
            paginate(Vec::new(), rows(3), 0, 25),
            Err(ExecutionError::InvalidPagination { page: 0, .. })
        ));
        assert!(matches!(
            paginate(Vec::new(), rows(3), 1, 0),
            Err(ExecutionError::InvalidPagination { page_size: 0, .. })
        ));
    }

    #[test]
    fn test_huge_page_does_not_overflow() {
        let result = paginate(Vec::new(), rows(3), u64::MAX, u64::MAX).unwrap();
        assert!(result.data.is_empty());
        assert_eq!(result.total_pages, 1);
    }

    #[test]
    fn test_page_size_beyond_usize_takes_everything() {
        let result = paginate(vec!["n".to_string()], rows(5), 1, u64::MAX).unwrap();
        assert_eq!(ids(&result), vec![0, 1, 2, 3, 4]);
        assert_eq!(result.total_pages, 1);
    }
}
