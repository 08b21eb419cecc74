//! Fixed-size partitioning of the holder list.

/// Split `items` into consecutive groups of `size` (the last may be smaller).
///
/// `size == 0` is treated as 1 so the function never panics.
pub fn partition<T>(items: &[T], size: usize) -> std::slice::Chunks<'_, T> {
    items.chunks(size.max(1))
}

/// Number of groups [`partition`] yields: `ceil(len / size)`.
pub fn group_count(len: usize, size: usize) -> usize {
    len.div_ceil(size.max(1))
}
