//! Free-text list filtering.
//!
//! A query matches an entity when the trimmed, lower-cased query is a
//! substring of the entity's haystack. There is no tokenization or fuzzy
//! matching, and the result depends only on `(query, entity)`.

/// An entity that can be matched against a free-text query
pub trait Searchable {
    /// Fields joined into the haystack, in order. Missing optional fields
    /// must be passed as empty strings.
    fn search_fields(&self) -> Vec<&str>;

    /// Space-joined, lower-cased search fields
    fn haystack(&self) -> String {
        self.search_fields().join(" ").to_lowercase()
    }
}

pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Whether `item` matches `query`. An empty query matches everything.
pub fn matches<T: Searchable + ?Sized>(query: &str, item: &T) -> bool {
    let needle = normalize_query(query);
    needle.is_empty() || item.haystack().contains(&needle)
}

/// Keep the items matching `query`, preserving input order
pub fn filter_items<'a, T>(items: impl IntoIterator<Item = &'a T>, query: &str) -> Vec<&'a T>
where
    T: Searchable + 'a,
{
    let needle = normalize_query(query);
    items
        .into_iter()
        .filter(|item| needle.is_empty() || item.haystack().contains(&needle))
        .collect()
}

/// A query kept in both raw and normalized form
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchFilter {
    raw: String,
    normalized: String,
}

impl SearchFilter {
    pub fn new(query: &str) -> Self {
        Self {
            raw: query.to_string(),
            normalized: normalize_query(query),
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }

    pub fn matches<T: Searchable + ?Sized>(&self, item: &T) -> bool {
        self.is_empty() || item.haystack().contains(&self.normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Item {
        name: &'static str,
        description: Option<&'static str>,
    }

    impl Searchable for Item {
        fn search_fields(&self) -> Vec<&str> {
            vec![self.name, self.description.unwrap_or("")]
        }
    }

    fn items() -> Vec<Item> {
        vec![
            Item {
                name: "alpha",
                description: Some("First letter"),
            },
            Item {
                name: "Beta",
                description: None,
            },
            Item {
                name: "gamma",
                description: Some("Rays"),
            },
        ]
    }

    fn names<'a>(items: &[&'a Item]) -> Vec<&'a str> {
        items.iter().map(|i| i.name).collect()
    }

    #[test]
    fn test_empty_query_is_identity() {
        let list = items();
        assert_eq!(filter_items(&list, "").len(), list.len());
        assert_eq!(filter_items(&list, "   ").len(), list.len());
    }

    #[test]
    fn test_case_and_whitespace_insensitive() {
        let list = items();
        assert_eq!(
            names(&filter_items(&list, "  BETA  ")),
            names(&filter_items(&list, "beta"))
        );
        assert_eq!(names(&filter_items(&list, "beta")), vec!["Beta"]);
    }

    #[test]
    fn test_filter_is_idempotent() {
        let list = items();
        for query in ["a", "ray", "letter", "zzz", ""] {
            let once = filter_items(&list, query);
            let twice = filter_items(once.iter().copied(), query);
            assert_eq!(names(&once), names(&twice), "query {:?}", query);
        }
    }

    #[test]
    fn test_substring_matches_any_field() {
        let list = items();
        assert_eq!(names(&filter_items(&list, "rays")), vec!["gamma"]);
        assert_eq!(names(&filter_items(&list, "a")), vec!["alpha", "Beta", "gamma"]);
    }

    #[test]
    fn test_fields_are_joined_with_spaces() {
        let item = Item {
            name: "alpha",
            description: Some("beta"),
        };
        assert!(matches("alpha beta", &item));
        assert!(!matches("alphabeta", &item));
    }

    #[test]
    fn test_search_filter_keeps_raw_query() {
        let filter = SearchFilter::new("  Gamma ");
        assert_eq!(filter.raw(), "  Gamma ");
        assert!(filter.matches(&items()[2]));
        assert!(!filter.matches(&items()[0]));
        assert!(SearchFilter::default().is_empty());
    }
}
