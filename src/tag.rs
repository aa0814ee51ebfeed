//! Struct tag parsing (`json:"name,omitempty" query:"q"`).

/// Look up the value of `key` in a struct tag.
///
/// Tags are space-separated `key:"value"` pairs; values are
/// double-quoted and may contain `\"` escapes.
pub fn lookup<'a>(tag: &'a str, key: &str) -> Option<&'a str> {
    let mut rest = tag;
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            return None;
        }

        let colon = rest.find(':')?;
        let name = &rest[..colon];
        let after = &rest[colon + 1..];
        if !after.starts_with('"') || name.is_empty() || name.contains(char::is_whitespace) {
            return None;
        }

        let quoted = &after[1..];
        let mut end = None;
        let mut escaped = false;
        for (i, c) in quoted.char_indices() {
            match c {
                '\\' if !escaped => escaped = true,
                '"' if !escaped => {
                    end = Some(i);
                    break;
                }
                _ => escaped = false,
            }
        }
        let end = end?;

        if name == key {
            return Some(&quoted[..end]);
        }
        rest = &quoted[end + 1..];
    }
}

/// Field name and attributes from the `key` namespace of a struct tag.
///
/// Returns `("", [])` when the tag has no such key.
pub fn name_and_attrs<'a>(tag: Option<&'a str>, key: &str) -> (&'a str, Vec<&'a str>) {
    let Some(value) = tag.and_then(|t| lookup(t, key)) else {
        return ("", Vec::new());
    };
    let mut parts = value.split(',');
    let name = parts.next().unwrap_or("").trim();
    let attrs = parts.map(str::trim).filter(|a| !a.is_empty()).collect();
    (name, attrs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_single_key() {
        assert_eq!(lookup(r#"json:"id""#, "json"), Some("id"));
        assert_eq!(lookup(r#"json:"id""#, "query"), None);
    }

    #[test]
    fn lookup_multiple_keys() {
        let tag = r#"json:"user_id,omitempty" query:"uid" form:"-""#;
        assert_eq!(lookup(tag, "json"), Some("user_id,omitempty"));
        assert_eq!(lookup(tag, "query"), Some("uid"));
        assert_eq!(lookup(tag, "form"), Some("-"));
    }

    #[test]
    fn lookup_escaped_quote() {
        let tag = r#"doc:"say \"hi\"" json:"x""#;
        assert_eq!(lookup(tag, "json"), Some("x"));
    }

    #[test]
    fn lookup_malformed() {
        assert_eq!(lookup("json", "json"), None);
        assert_eq!(lookup(r#"json:id"#, "json"), None);
        assert_eq!(lookup(r#"json:"unterminated"#, "json"), None);
        assert_eq!(lookup("", "json"), None);
    }

    #[test]
    fn name_and_attrs_split() {
        let (name, attrs) = name_and_attrs(Some(r#"json:"id,readonly,omitempty""#), "json");
        assert_eq!(name, "id");
        assert_eq!(attrs, vec!["readonly", "omitempty"]);
    }

    #[test]
    fn name_and_attrs_empty_name() {
        let (name, attrs) = name_and_attrs(Some(r#"json:",readonly""#), "json");
        assert_eq!(name, "");
        assert_eq!(attrs, vec!["readonly"]);
    }

    #[test]
    fn name_and_attrs_missing() {
        assert_eq!(name_and_attrs(None, "json"), ("", vec![]));
        assert_eq!(name_and_attrs(Some(r#"query:"q""#), "json"), ("", vec![]));
    }
}
