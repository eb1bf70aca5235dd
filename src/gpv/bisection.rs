/*
Copyright 2021 Jakub Lewandowski

This file is part of GPV Kit.

GPV Kit is a free software: you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation; either version 3 of the License, or
(at your option) any later version.

GPV Kit is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
GNU General Public License for more details.

You should have received a copy of the GNU General Public License
along with GPV Kit. If not, see https://www.gnu.org/licenses/.
*/

//! Module containg methods for conducting
//! binary search (bisection) of grid axis elements
//! closest to searched coordinates.

use crate::errors::SearchError;
use crate::Float;

/// Core bisection function, binary search adapted
/// to searching values in-between the axis items.
///
/// Grid axes are monotonic but can be either ascending (longitude)
/// or descending (latitude in JMA files), so both orders are handled.
fn binary_search(array: &[Float], x: Float) -> Result<usize, SearchError> {
    let (first, last) = match (array.first(), array.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return Err(SearchError::EmptyArray),
    };

    if x < first && x < last || x > first && x > last || x.is_nan() {
        return Err(SearchError::OutOfBounds);
    }

    let mut lo = 0;
    let mut hi = array.len() - 1;

    // if the array is sorted descendingly we use a function with reversed signs
    if first < last {
        while lo < hi {
            let mid = (lo + hi) / 2;

            if array[mid] >= x {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
    } else {
        while lo < hi {
            let mid = (lo + hi) / 2;

            if array[mid] <= x {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
    }

    Ok(lo)
}

/// Index of the axis item closest to the searched value.
///
/// Returns `OutOfBounds` when the value lies outside the axis,
/// ties between two neighbours resolve to the lower index.
pub fn nearest_index(array: &[Float], x: Float) -> Result<usize, SearchError> {
    let found = binary_search(array, x)?;

    if found == 0 {
        return Ok(0);
    }

    let before = (array[found - 1] - x).abs();
    let after = (array[found] - x).abs();

    if before <= after {
        Ok(found - 1)
    } else {
        Ok(found)
    }
}
