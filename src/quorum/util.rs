/// Returns the size of a strict majority of `total` voters.
///
/// An empty set has no majority that can be reached, thus it returns 1.
#[inline]
pub(crate) fn majority_of(total: usize) -> usize {
    (total / 2) + 1
}
