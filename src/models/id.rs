use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"\s+").unwrap()
});

/// Person id from a display name and its creation instant:
/// `"Mary Ann"` at 1700000000000 ms becomes `mary-ann-1700000000000`.
///
/// Pure: the same name at the same instant always yields the same id.
pub(crate) fn make_id(name: &str, instant: DateTime<Utc>) -> String {
    let slug = WHITESPACE.replace_all(&name.to_lowercase(), "-").into_owned();
    format!("{slug}-{}", instant.timestamp_millis())
}
