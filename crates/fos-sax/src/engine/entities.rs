//! Entity references
//!
//! The five predefined entities and numeric character references are
//! expanded by quick-xml. DTDs are not processed, so any other named entity
//! is undeclared and the caller decides whether that is fatal.

use std::borrow::Cow;

use quick_xml::escape::{EscapeError, resolve_xml_entity, unescape_with};

/// Text with its references expanded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion<'a> {
    pub text: Cow<'a, str>,
    /// Undeclared entities left as `&name;`, in document order
    pub undeclared: Vec<String>,
}

/// Expand the references in `raw`.
///
/// With `keep_undeclared` an undeclared entity is copied through literally
/// and listed in the result; otherwise it is an error.
pub fn expand(raw: &str, keep_undeclared: bool) -> Result<Expansion<'_>, String> {
    let mut text = String::new();
    let mut undeclared = Vec::new();
    let mut rest = raw;
    loop {
        match unescape_with(rest, resolve_xml_entity) {
            Ok(tail) if undeclared.is_empty() => {
                return Ok(Expansion { text: tail, undeclared });
            }
            Ok(tail) => {
                text.push_str(&tail);
                return Ok(Expansion {
                    text: Cow::Owned(text),
                    undeclared,
                });
            }
            Err(EscapeError::UnrecognizedEntity(range, name)) => {
                if !is_name(&name) {
                    return Err(format!("EntityRef: malformed name &{name};"));
                }
                if !keep_undeclared {
                    return Err(undeclared_message(&name));
                }
                // `range` spans the name, between `&` and `;`
                let head = unescape_with(&rest[..range.start - 1], resolve_xml_entity)
                    .map_err(|err| escape_message(&err))?;
                text.push_str(&head);
                text.push('&');
                text.push_str(&name);
                text.push(';');
                rest = &rest[range.end + 1..];
                undeclared.push(name);
            }
            Err(err) => return Err(escape_message(&err)),
        }
    }
}

pub fn undeclared_message(name: &str) -> String {
    format!("Entity '{name}' not defined")
}

fn escape_message(err: &EscapeError) -> String {
    match err {
        EscapeError::UnrecognizedEntity(_, name) => undeclared_message(name),
        EscapeError::UnterminatedEntity(_) => "EntityRef: expecting ';'".to_string(),
        EscapeError::InvalidCharRef(err) => format!("xmlParseCharRef: invalid xmlChar value ({err})"),
    }
}

/// Element, attribute and entity names: a letter, `_` or `:` first
pub fn is_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == ':')
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | ':' | '-' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predefined_and_numeric() {
        let expansion = expand("&lt;a&gt; &amp; &quot;&apos; &#65;&#x263A;", false).unwrap();
        assert_eq!(expansion.text, "<a> & \"' A☺");
        assert!(expansion.undeclared.is_empty());
    }

    #[test]
    fn test_plain_text_is_borrowed() {
        let expansion = expand("no references", true).unwrap();
        assert!(matches!(expansion.text, Cow::Borrowed("no references")));
    }

    #[test]
    fn test_undeclared_kept() {
        let expansion = expand("&lt;&nbsp;x&copy;&amp;", true).unwrap();
        assert_eq!(expansion.text, "<&nbsp;x&copy;&");
        assert_eq!(expansion.undeclared, vec!["nbsp", "copy"]);
    }

    #[test]
    fn test_undeclared_rejected() {
        assert_eq!(expand("a &nbsp; b", false), Err("Entity 'nbsp' not defined".into()));
    }

    #[test]
    fn test_invalid_references() {
        assert!(expand("&#0;", true).is_err());
        assert!(expand("&#xD800;", true).is_err());
        assert!(expand("&#xZZ;", true).is_err());
        assert_eq!(expand("a & b", true), Err("EntityRef: expecting ';'".into()));
        assert!(expand("&1bad;", true).unwrap_err().starts_with("EntityRef: malformed name"));
    }

    #[test]
    fn test_names() {
        assert!(is_name("données"));
        assert!(is_name("xlink:href"));
        assert!(is_name("_a-1.b"));
        assert!(!is_name("1a"));
        assert!(!is_name("-a"));
        assert!(!is_name(""));
        assert!(!is_name("a b"));
    }
}
