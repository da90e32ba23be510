//! Identifier resolution for inbound events.
//!
//! Identifiers arriving from tool calls may be an id, a path, a name or an
//! `owner/repo` string. They are resolved against the unfiltered entity
//! list with a fixed fallback chain: exact primary key, exact alternate
//! key, then case-insensitive match on the entity's folded keys, one key
//! tier at a time.

/// An entity with a stable identity
pub trait Keyed {
    /// Primary identity, unique within one list (render key and join key)
    fn key(&self) -> &str;

    /// Secondary keys tried when the primary key does not match, in order
    fn alternate_keys(&self) -> Vec<&str> {
        Vec::new()
    }

    /// Keys matched case-insensitively once the exact steps miss, in tier
    /// order. Defaults to the alternate keys.
    fn folded_keys(&self) -> Vec<&str> {
        self.alternate_keys()
    }
}

/// Resolve `identifier` against `items`. Returns `None` on a miss; callers
/// ignore the event in that case since it may be stale.
pub fn resolve<'a, T: Keyed>(items: &'a [T], identifier: &str) -> Option<&'a T> {
    let identifier = identifier.trim();
    if identifier.is_empty() {
        return None;
    }

    if let Some(item) = items.iter().find(|i| i.key() == identifier) {
        return Some(item);
    }

    if let Some(item) = items
        .iter()
        .find(|i| i.alternate_keys().contains(&identifier))
    {
        return Some(item);
    }

    let lower = identifier.to_lowercase();
    let folded: Vec<Vec<&str>> = items.iter().map(Keyed::folded_keys).collect();
    let tiers = folded.iter().map(Vec::len).max().unwrap_or(0);
    (0..tiers).find_map(|tier| {
        items
            .iter()
            .zip(&folded)
            .find(|(_, keys)| keys.get(tier).is_some_and(|k| k.to_lowercase() == lower))
            .map(|(item, _)| item)
    })
}
