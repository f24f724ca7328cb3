//! Pagination and sorting for list endpoints.
//!
//! [`Filters`] carries user-supplied paging and sort parameters. They must go
//! through [`validate_filters`] before use. The sort value ends up interpolated
//! into an `ORDER BY` clause, so [`Filters::compile_sort`] re-checks it against
//! the safelist and panics on anything else.

use serde::Serialize;

use crate::validator::{permitted_value, Validator};

/// Largest accepted page number.
pub const MAX_PAGE: i64 = 10_000_000;

/// Largest accepted page size.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Paging and sort parameters for a list query.
#[derive(Debug, Clone)]
pub struct Filters {
    /// 1-based page number.
    pub page: i64,
    /// Records per page.
    pub page_size: i64,
    /// Sort key, optionally prefixed with `-` for descending order.
    pub sort: String,
    /// Sort keys the caller is allowed to use, including their `-` forms.
    pub sort_safelist: &'static [&'static str],
}

/// Direction of an `ORDER BY` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

impl SortDirection {
    /// SQL keyword for this direction.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

impl Filters {
    /// Column name for the sort key.
    ///
    /// # Panics
    ///
    /// Panics if `sort` is not in the safelist. Validation rejects such values
    /// first, so reaching the panic means a caller skipped
    /// [`validate_filters`].
    #[must_use]
    pub fn sort_column(&self) -> &str {
        self.compile_sort().0
    }

    /// Direction for the sort key.
    ///
    /// # Panics
    ///
    /// Panics under the same condition as [`Filters::sort_column`].
    #[must_use]
    pub fn sort_direction(&self) -> SortDirection {
        self.compile_sort().1
    }

    /// Column and direction for the sort key.
    ///
    /// # Panics
    ///
    /// Panics if `sort` is not in the safelist. This should be unreachable
    /// given prior validation.
    #[must_use]
    pub fn compile_sort(&self) -> (&str, SortDirection) {
        assert!(
            self.sort_safelist.iter().any(|safe| *safe == self.sort),
            "unsafe sort parameter: {:?}",
            self.sort
        );

        match self.sort.strip_prefix('-') {
            Some(column) => (column, SortDirection::Descending),
            None => (self.sort.as_str(), SortDirection::Ascending),
        }
    }

    /// `LIMIT` value.
    #[must_use]
    pub fn limit(&self) -> i64 {
        self.page_size
    }

    /// `OFFSET` value. Bounded by the validation limits, so it cannot overflow.
    #[must_use]
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }
}

/// Check paging bounds and sort safelist membership.
pub fn validate_filters(v: &mut Validator, filters: &Filters) {
    v.check(filters.page > 0, "page", "must be greater than zero");
    v.check(
        filters.page <= MAX_PAGE,
        "page",
        "must be a maximum of 10 million",
    );
    v.check(filters.page_size > 0, "page_size", "must be greater than zero");
    v.check(
        filters.page_size <= MAX_PAGE_SIZE,
        "page_size",
        "must be a maximum of 100",
    );
    v.check(
        permitted_value(filters.sort.as_str(), filters.sort_safelist),
        "sort",
        "invalid sort value",
    );
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero(value: &i64) -> bool {
    *value == 0
}

/// Pagination details returned alongside a page of records.
///
/// An empty result set yields the all-zero value, which serializes as `{}`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Metadata {
    /// Page that was returned.
    #[serde(skip_serializing_if = "is_zero")]
    pub current_page: i64,
    /// Records per page.
    #[serde(skip_serializing_if = "is_zero")]
    pub page_size: i64,
    /// Always 1 for a non-empty result.
    #[serde(skip_serializing_if = "is_zero")]
    pub first_page: i64,
    /// Last page holding records.
    #[serde(skip_serializing_if = "is_zero")]
    pub last_page: i64,
    /// Records matching the query across all pages.
    #[serde(skip_serializing_if = "is_zero")]
    pub total_records: i64,
}

impl Metadata {
    /// Compute pagination details for `total_records` matches.
    #[must_use]
    pub fn calculate(total_records: i64, page: i64, page_size: i64) -> Self {
        if total_records == 0 || page_size <= 0 {
            return Self::default();
        }

        Self {
            current_page: page,
            page_size,
            first_page: 1,
            last_page: (total_records + page_size - 1) / page_size,
            total_records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SAFELIST: &[&str] = &["id", "title", "year", "-id", "-title", "-year"];

    fn filters(page: i64, page_size: i64, sort: &str) -> Filters {
        Filters {
            page,
            page_size,
            sort: sort.to_string(),
            sort_safelist: SAFELIST,
        }
    }

    fn errors_for(f: &Filters) -> Validator {
        let mut v = Validator::new();
        validate_filters(&mut v, f);
        v
    }

    #[test]
    fn rejects_out_of_range_paging() {
        for (page, page_size, field) in [
            (0, 20, "page"),
            (10_000_001, 20, "page"),
            (1, 0, "page_size"),
            (1, 101, "page_size"),
        ] {
            let v = errors_for(&filters(page, page_size, "id"));
            assert!(
                v.errors().get(field).is_some(),
                "page={page} page_size={page_size} should fail on {field}"
            );
        }
    }

    #[test]
    fn accepts_boundary_paging() {
        for (page, page_size) in [(1, 1), (1, 100), (10_000_000, 1), (10_000_000, 100)] {
            assert!(errors_for(&filters(page, page_size, "-year")).valid());
        }
    }

    #[test]
    fn rejects_sort_outside_safelist() {
        for sort in ["runtime", "-runtime", "id; DROP TABLE movies", "", "--id"] {
            let v = errors_for(&filters(1, 20, sort));
            assert_eq!(v.errors().get("sort"), Some("invalid sort value"));
        }
    }

    #[test]
    fn compile_sort_maps_prefix_to_direction() {
        assert_eq!(
            filters(1, 20, "title").compile_sort(),
            ("title", SortDirection::Ascending)
        );
        assert_eq!(
            filters(1, 20, "-year").compile_sort(),
            ("year", SortDirection::Descending)
        );
        assert_eq!(filters(1, 20, "-id").sort_column(), "id");
        assert_eq!(SortDirection::Descending.as_sql(), "DESC");
    }

    #[test]
    #[should_panic(expected = "unsafe sort parameter")]
    fn compile_sort_panics_on_unsafe_value() {
        let _ = filters(1, 20, "runtime").compile_sort();
    }

    #[test]
    fn limit_and_offset() {
        let f = filters(3, 25, "id");
        assert_eq!(f.limit(), 25);
        assert_eq!(f.offset(), 50);

        let f = filters(MAX_PAGE, MAX_PAGE_SIZE, "id");
        assert_eq!(f.offset(), 999_999_900);
    }

    #[test]
    fn metadata_for_empty_result_is_zero() {
        assert_eq!(Metadata::calculate(0, 1, 20), Metadata::default());
        assert_eq!(Metadata::calculate(0, 7, 0), Metadata::default());
        let json = serde_json::to_value(Metadata::default()).unwrap();
        assert_eq!(json, serde_json::json!({}));
    }

    #[test]
    fn metadata_rounds_last_page_up() {
        let m = Metadata::calculate(12, 1, 5);
        assert_eq!(m.last_page, 3);
        assert_eq!(m.first_page, 1);
        assert_eq!(m.current_page, 1);
        assert_eq!(m.total_records, 12);

        assert_eq!(Metadata::calculate(10, 2, 5).last_page, 2);
        assert_eq!(Metadata::calculate(1, 1, 100).last_page, 1);
    }

    proptest! {
        #[test]
        fn compile_sort_never_accepts_unlisted_values(sort in "[-a-z_; ]{0,24}") {
            prop_assume!(!SAFELIST.contains(&sort.as_str()));
            let f = filters(1, 20, &sort);
            let outcome = std::panic::catch_unwind(|| {
                let _ = f.compile_sort();
            });
            prop_assert!(outcome.is_err());
        }

        #[test]
        fn offset_stays_in_range(page in 1i64..=MAX_PAGE, page_size in 1i64..=MAX_PAGE_SIZE) {
            let f = filters(page, page_size, "id");
            prop_assert!(f.offset() >= 0);
            prop_assert!(f.offset() < MAX_PAGE * MAX_PAGE_SIZE);
        }
    }
}
