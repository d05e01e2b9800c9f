//! Canonical index-key helpers
//!
//! An index key is the string joined from a row's primary-key values with a
//! comma separator. It serves as both map key and sort key; all row ordering
//! in this crate is lexicographic over these strings. The separator is not
//! escaped, so a key value containing a comma is indistinguishable from a
//! composite-key boundary.

/// Join primary-key values into the canonical index key.
pub fn index_key<S: AsRef<str>>(values: &[S]) -> String {
    values
        .iter()
        .map(|v| v.as_ref())
        .collect::<Vec<_>>()
        .join(",")
}

/// Collect keys into a lexicographically sorted list.
pub fn sorted_keys<I, S>(keys: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut list: Vec<String> = keys.into_iter().map(Into::into).collect();
    list.sort();
    list
}
