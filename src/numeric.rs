use num_traits::Float;
use std::cmp::Ordering;

/// Where a value falls relative to a sorted slice.
#[derive(Debug, PartialEq)]
pub enum SearchResult {
    /// The value is at this index.
    Exact(usize),
    /// The value is smaller than every element (or the slice is empty).
    Before,
    /// The value is larger than every element.
    After,
    /// The value lies strictly between the elements at `idx - 1` and `idx`.
    Between(usize),
}

/// Binary search of a strictly increasing slice.
pub fn search_sorted<T: Ord>(vec: &[T], new_val: &T) -> SearchResult {
    let mut left = 0;
    let mut right = vec.len();
    while left < right {
        let mid = left + (right - left) / 2;

        match vec[mid].cmp(new_val) {
            Ordering::Less => left = mid + 1,
            Ordering::Greater => right = mid,
            Ordering::Equal => return SearchResult::Exact(mid),
        }
    }

    if left == 0 {
        SearchResult::Before
    } else if left < vec.len() {
        SearchResult::Between(left)
    } else {
        SearchResult::After
    }
}

/// Convert a float to an integer position, refusing to truncate.
///
/// Returns `None` for fractional, infinite, NaN, or out-of-range values.
pub fn integral_value<T: Float>(value: T) -> Option<i64> {
    if !value.is_finite() || value.fract() != T::zero() {
        return None;
    }
    value.to_i64()
}
