//! Namespace folding: rewriting qualified names through a
//! prefix-to-alias table
//!
//! Both conversion directions share the same rules: the part before
//! the *last* separator occurrence is looked up in the alias map. A
//! present alias replaces it, an empty alias drops the prefix
//! entirely, an absent entry leaves the name untouched, and names
//! with no separator always pass through unchanged.

use indexmap::IndexMap;

/// Fold a lexer-resolved name (`uri<sep>local`) for the parse
/// direction.
pub fn fold_parse(
    name: &str,
    namespaces: Option<&IndexMap<String, String>>,
    separator: &str,
) -> String {
    let Some(map) = namespaces else {
        return name.to_string();
    };
    let Some((ns, local)) = split_last(name, separator) else {
        return name.to_string();
    };
    match map.get(ns).map(String::as_str) {
        None => name.to_string(),
        Some("") => local.to_string(),
        Some(alias) => format!("{alias}{separator}{local}"),
    }
}

/// Fold a tree key (`prefix<sep>local`, possibly carrying the
/// attribute marker) for the emit direction.
///
/// An attribute key like `@x:loc` is looked up by its bare prefix
/// (`x`) and keeps its marker after folding.
pub fn fold_emit(
    name: &str,
    namespaces: Option<&IndexMap<String, String>>,
    separator: &str,
    attr_prefix: &str,
) -> String {
    let Some(map) = namespaces else {
        return name.to_string();
    };
    let Some((ns, local)) = split_last(name, separator) else {
        return name.to_string();
    };
    let (marker, bare_ns) = match ns.strip_prefix(attr_prefix) {
        Some(bare) if !attr_prefix.is_empty() => (attr_prefix, bare),
        _ => ("", ns),
    };
    match map.get(bare_ns).map(String::as_str) {
        None => name.to_string(),
        Some("") => format!("{marker}{local}"),
        Some(alias) => format!("{marker}{alias}{separator}{local}"),
    }
}

/// Split on the last separator occurrence. URIs may themselves
/// contain the separator, so only the final occurrence counts.
fn split_last<'a>(name: &'a str, separator: &str) -> Option<(&'a str, &'a str)> {
    let i = name.rfind(separator)?;
    let ns = name.get(..i)?;
    let local = name.get(i + separator.len()..)?;
    Some((ns, local))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aliases(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_fold_parse_no_separator_is_identity() {
        let map = aliases(&[("http://a.com/", "a")]);
        assert_eq!(fold_parse("local", Some(&map), ":"), "local");
        assert_eq!(fold_parse("local", None, ":"), "local");
    }

    #[test]
    fn test_fold_parse_maps_uri_to_alias() {
        let map = aliases(&[("http://a.com/", "a")]);
        assert_eq!(fold_parse("http://a.com/:title", Some(&map), ":"), "a:title");
    }

    #[test]
    fn test_fold_parse_splits_on_last_separator() {
        // the URI itself contains the separator
        let map = aliases(&[("http://a.com/x", "a")]);
        assert_eq!(fold_parse("http://a.com/x:y", Some(&map), ":"), "a:y");
    }

    #[test]
    fn test_fold_parse_empty_alias_drops_prefix() {
        let map = aliases(&[("http://a.com/", "")]);
        assert_eq!(fold_parse("http://a.com/:title", Some(&map), ":"), "title");
    }

    #[test]
    fn test_fold_parse_unmapped_unchanged() {
        let map = aliases(&[("http://a.com/", "a")]);
        assert_eq!(
            fold_parse("http://b.com/:title", Some(&map), ":"),
            "http://b.com/:title"
        );
    }

    #[test]
    fn test_fold_emit_element_key() {
        let map = aliases(&[("ns", "http://n.com/")]);
        assert_eq!(
            fold_emit("ns:item", Some(&map), ":", "@"),
            "http://n.com/:item"
        );
        assert_eq!(fold_emit("item", Some(&map), ":", "@"), "item");
    }

    #[test]
    fn test_fold_emit_attribute_key_keeps_marker() {
        let map = aliases(&[("ns", "http://n.com/")]);
        assert_eq!(
            fold_emit("@ns:attr", Some(&map), ":", "@"),
            "@http://n.com/:attr"
        );
    }

    #[test]
    fn test_fold_emit_empty_alias_drops_prefix_keeps_marker() {
        let map = aliases(&[("ns", "")]);
        assert_eq!(fold_emit("@ns:attr", Some(&map), ":", "@"), "@attr");
        assert_eq!(fold_emit("ns:item", Some(&map), ":", "@"), "item");
    }

    #[test]
    fn test_fold_emit_unmapped_unchanged() {
        let map = aliases(&[("ns", "n")]);
        assert_eq!(fold_emit("other:item", Some(&map), ":", "@"), "other:item");
    }
}
