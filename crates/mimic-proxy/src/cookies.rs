//! Cookie-header helpers.
//!
//! The rewrite endpoint receives the cookie header to impersonate as a query
//! parameter, so these work on plain `name=value; name2=value2` strings
//! rather than on the caller's own `Cookie` header.

/// Parse a cookie header string into pairs, first occurrence wins.
pub fn parse(header: &str) -> Vec<(String, String)> {
    header
        .split(';')
        .filter_map(|part| {
            let part = part.trim();
            if part.is_empty() {
                return None;
            }
            let (name, value) = part.split_once('=')?;
            Some((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Look up a single cookie value.
pub fn get(header: &str, name: &str) -> Option<String> {
    parse(header)
        .into_iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v)
}

/// Rebuild the header without the named cookie.
///
/// The client-id cookie belongs to this proxy, not to the site being
/// impersonated, so it is stripped before the header goes upstream.
pub fn strip(header: &str, name: &str) -> String {
    parse(header)
        .into_iter()
        .filter(|(n, _)| n != name)
        .map(|(n, v)| format!("{n}={v}"))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pairs() {
        let pairs = parse("a=1; b=2;c=3");
        assert_eq!(
            pairs,
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string()),
                ("c".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_skips_malformed_parts() {
        let pairs = parse("a=1; garbage; =; b=2");
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0], ("a".to_string(), "1".to_string()));
        assert_eq!(pairs[2], ("b".to_string(), "2".to_string()));
    }

    #[test]
    fn test_get() {
        assert_eq!(get("a=1; __mcid=dev42", "__mcid"), Some("dev42".to_string()));
        assert_eq!(get("a=1", "__mcid"), None);
        assert_eq!(get("", "__mcid"), None);
    }

    #[test]
    fn test_strip_removes_only_named_cookie() {
        assert_eq!(strip("testkey=testvalue; __mcid=dev42", "__mcid"), "testkey=testvalue");
        assert_eq!(strip("__mcid=dev42", "__mcid"), "");
        assert_eq!(strip("a=1; b=2", "__mcid"), "a=1; b=2");
    }
}
