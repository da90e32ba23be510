//! Sort policies applied after filtering.
//!
//! Every comparator here is total, so sorting with the stable
//! `slice::sort_by` gives an order that depends only on the input.

use std::cmp::Ordering;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::filter::{Searchable, filter_items};
use crate::model::{Collection, GithubRepository, LocalRepository, Organization, ProjectSource, Workspace};

pub type Comparator<T> = fn(&T, &T) -> Ordering;

/// Primary collation key: canonical decomposition with accents dropped,
/// lower-cased
fn collation_key(s: &str) -> String {
    s.nfd().filter(|c| !is_combining_mark(*c)).flat_map(char::to_lowercase).collect()
}

/// Root-locale ordering: base letters first, then accents, then case;
/// raw text breaks ties so the order is total
pub fn alphabetical(a: &str, b: &str) -> Ordering {
    collation_key(a)
        .cmp(&collation_key(b))
        .then_with(|| a.nfd().flat_map(char::to_lowercase).cmp(b.nfd().flat_map(char::to_lowercase)))
        .then_with(|| a.cmp(b))
}

/// Parse an RFC 3339 timestamp. Unparsable values count as absent.
pub fn parse_timestamp(raw: Option<&str>) -> Option<OffsetDateTime> {
    raw.and_then(|s| OffsetDateTime::parse(s, &Rfc3339).ok())
}

/// Newest first; present timestamps sort before absent ones
pub fn most_recent_first(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (parse_timestamp(a), parse_timestamp(b)) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Filter `items` by `query` and sort the survivors with `compare`
pub fn filtered_sorted<'a, T: Searchable>(
    items: &'a [T],
    query: &str,
    compare: Comparator<T>,
) -> Vec<&'a T> {
    let mut view = filter_items(items, query);
    view.sort_by(|a, b| compare(a, b));
    view
}

// ============================================================================
// Per-entity policies
// ============================================================================

/// Tracked before discovered, then last opened (newest first), then name
pub fn local_projects_order(a: &LocalRepository, b: &LocalRepository) -> Ordering {
    source_rank(a.source)
        .cmp(&source_rank(b.source))
        .then_with(|| most_recent_first(a.last_opened.as_deref(), b.last_opened.as_deref()))
        .then_with(|| alphabetical(&a.name, &b.name))
        .then_with(|| a.path.cmp(&b.path))
}

fn source_rank(source: ProjectSource) -> u8 {
    match source {
        ProjectSource::Tracked => 0,
        ProjectSource::Discovered => 1,
    }
}

pub fn local_repositories_by_name(a: &LocalRepository, b: &LocalRepository) -> Ordering {
    alphabetical(&a.name, &b.name).then_with(|| a.path.cmp(&b.path))
}

/// The default workspace first, then alphabetical
pub fn workspaces_order(a: &Workspace, b: &Workspace) -> Ordering {
    b.is_default
        .cmp(&a.is_default)
        .then_with(|| alphabetical(&a.name, &b.name))
        .then_with(|| a.id.cmp(&b.id))
}

/// Most recent push (or update) first, then alphabetical by full name
pub fn github_by_recency(a: &GithubRepository, b: &GithubRepository) -> Ordering {
    most_recent_first(a.last_activity(), b.last_activity())
        .then_with(|| alphabetical(&a.full_name, &b.full_name))
}

pub fn github_by_name(a: &GithubRepository, b: &GithubRepository) -> Ordering {
    alphabetical(&a.name, &b.name).then_with(|| a.full_name.cmp(&b.full_name))
}

pub fn collections_by_name(a: &Collection, b: &Collection) -> Ordering {
    alphabetical(&a.name, &b.name).then_with(|| a.id.cmp(&b.id))
}

pub fn organizations_by_login(a: &Organization, b: &Organization) -> Ordering {
    alphabetical(&a.login, &b.login)
}
