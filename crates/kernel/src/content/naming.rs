//! Namespaced value names and display helpers.
//!
//! Values are stored flat, one row per leaf field. A row name is the path
//! through the field-set tree joined with [`SEP`], e.g.
//! `gallery/3/image/caption`.

use std::sync::LazyLock;

use regex::Regex;

/// Separator between name segments.
pub const SEP: char = '/';

/// # Panics
///
/// Panics if the hard-coded regex literal is invalid (impossible in practice).
#[allow(clippy::expect_used)]
static CAPITAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Z])").expect("valid regex literal"));

/// Join name segments, skipping empty ones.
pub fn join_name<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::new();
    for part in parts {
        let part = part.as_ref();
        if part.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(SEP);
        }
        out.push_str(part);
    }
    out
}

/// Split off the first segment. The remainder is empty when there is no
/// separator.
pub fn split_first(name: &str) -> (&str, &str) {
    name.split_once(SEP).unwrap_or((name, ""))
}

/// Split a name into `(first, second, rest)`, or `None` when it has fewer
/// than two segments.
pub fn split_two(name: &str) -> Option<(&str, &str, &str)> {
    let (first, tail) = name.split_once(SEP)?;
    if first.is_empty() || tail.is_empty() {
        return None;
    }
    let (second, rest) = split_first(tail);
    Some((first, second, rest))
}

/// HTML-safe id for a form at `basename`.
pub fn form_id(basename: &str) -> String {
    basename.replace(SEP, "-")
}

/// `"SearchImage"` / `"search_image"` → `"Search Image"`.
///
/// Every capital starts a new word, so acronyms come apart letter by letter.
pub fn human_title(value: &str) -> String {
    let spaced = CAPITAL.replace_all(value, " $1").replace('_', " ");
    spaced
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Normalize a URL path to always begin and end with `/`.
///
/// The empty path (and `/` itself) normalize to `/`.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}/")
    }
}

/// Absolute URL of a normalized path on the configured site.
pub fn full_url(site_url: &str, path: &str) -> String {
    format!("{}{}", site_url.trim_end_matches('/'), normalize_path(path))
}

/// Reorder named children: names listed in `order` first (in that order),
/// then the remaining children sorted by name. Unknown names in `order` are
/// ignored.
pub fn apply_order<T>(children: Vec<(String, T)>, order: &[String]) -> Vec<(String, T)> {
    if order.is_empty() {
        return children;
    }
    let mut rest = children;
    let mut out = Vec::with_capacity(rest.len());
    for wanted in order {
        if let Some(idx) = rest.iter().position(|(name, _)| name == wanted) {
            out.push(rest.remove(idx));
        }
    }
    rest.sort_by(|a, b| a.0.cmp(&b.0));
    out.extend(rest);
    out
}
