//! Sibling title bookkeeping: uniqueness and variable interpolation.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::common::collections::{HashMap, HashSet};

static TRAILING_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*?)(\d+)$").expect("trailing number regex"));

static VARIABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z0-9_]+)\}|\$([A-Za-z0-9_]+)").expect("variable regex")
});

/// Returns `title` if no sibling uses it, otherwise the first free variant.
///
/// A trailing number is incremented (`"Row 9"` becomes `"Row 10"`); any other
/// title gets `" 1"`, `" 2"`, ... appended.
pub fn generate_unique_title(title: &str, existing: &HashSet<String>) -> String {
    if !existing.contains(title) {
        return title.to_owned();
    }

    if let Some(caps) = TRAILING_NUMBER.captures(title) {
        let base = &caps[1];
        if let Ok(mut counter) = caps[2].parse::<u64>() {
            loop {
                counter = counter.saturating_add(1);
                let candidate = format!("{base}{counter}");
                if !existing.contains(&candidate) {
                    return candidate;
                }
                if counter == u64::MAX {
                    break;
                }
            }
        }
    }

    let mut counter: u64 = 1;
    loop {
        let candidate = format!("{title} {counter}");
        if !existing.contains(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// Replaces `$name` and `${name}` with values from `vars`. Unknown variables
/// are left as written.
pub fn interpolate(title: &str, vars: &HashMap<String, String>) -> String {
    VARIABLE
        .replace_all(title, |caps: &regex::Captures<'_>| {
            let name = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str()).unwrap_or_default();
            match vars.get(name) {
                Some(value) => value.clone(),
                None => caps[0].to_owned(),
            }
        })
        .into_owned()
}

/// Titles that occur more than once after interpolation.
pub fn duplicate_titles<'a>(
    titles: impl IntoIterator<Item = &'a str>,
    vars: &HashMap<String, String>,
) -> HashSet<String> {
    let mut seen = HashSet::default();
    let mut duplicates = HashSet::default();
    for title in titles {
        let resolved = interpolate(title, vars);
        if !seen.insert(resolved.clone()) {
            duplicates.insert(resolved);
        }
    }
    duplicates
}
