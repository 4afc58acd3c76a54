//! Signature and type-name normalization.
//!
//! Names recorded in class tables and names supplied by callers are
//! compared after normalization, so `"setRange( i32 , Vec< u8 > )"` and
//! `"setRange(i32,Vec<u8>)"` denote the same method.
//!
//! Normalization of a type name:
//!
//! - whitespace is removed except a single space between two identifier
//!   characters (`*const u8`, `dyn Trait`);
//! - a leading shared reference (`&T`, `&'a T`) and a C-style `const T&`
//!   qualification are dropped, since arguments are passed by pointer
//!   either way. `&mut T` is kept.

use crate::error::{Error, Result};

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_space = false;

    for c in s.trim().chars() {
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space && out.chars().next_back().is_some_and(is_ident_char) && is_ident_char(c)
        {
            out.push(' ');
        }
        pending_space = false;
        out.push(c);
    }
    out
}

fn strip_reference(mut s: &str) -> &str {
    if let Some(rest) = s.strip_prefix('&') {
        if !rest.starts_with("mut ") {
            s = rest;
            if let Some(lifetime) = s.strip_prefix('\'') {
                s = lifetime
                    .find(' ')
                    .map_or(lifetime, |space| &lifetime[space + 1..]);
            }
        }
    }
    if let Some(rest) = s.strip_prefix("const ") {
        s = rest;
        if let Some(rest) = s.strip_suffix('&') {
            s = rest;
        }
    }
    s
}

/// Normalizes a type name.
///
/// # Example
///
/// ```
/// use reflecta::runtime::normalized_type;
///
/// assert_eq!(normalized_type(" Vec< String > "), "Vec<String>");
/// assert_eq!(normalized_type("&String"), "String");
/// assert_eq!(normalized_type("const Point &"), "Point");
/// assert_eq!(normalized_type("&mut Vec<u8>"), "&mut Vec<u8>");
/// ```
#[must_use]
pub fn normalized_type(name: &str) -> String {
    let collapsed = collapse_whitespace(name);
    strip_reference(&collapsed).to_string()
}

/// A parsed `name(T1,T2,...)` signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSignature {
    /// Method name.
    pub name: String,
    /// Normalized parameter type names.
    pub params: Vec<String>,
}

impl ParsedSignature {
    /// Rebuilds the normalized signature string.
    #[must_use]
    pub fn to_signature(&self) -> String {
        format!("{}({})", self.name, self.params.join(","))
    }
}

/// Parses a method signature.
///
/// # Errors
///
/// Returns [`Error::InvalidSignature`] for a missing or empty name,
/// unbalanced brackets, trailing text after `)`, or an empty parameter.
///
/// # Example
///
/// ```
/// use reflecta::runtime::parse_signature;
///
/// let sig = parse_signature("insert(usize, HashMap<String, i32>)").unwrap();
/// assert_eq!(sig.name, "insert");
/// assert_eq!(sig.params, ["usize", "HashMap<String,i32>"]);
/// ```
pub fn parse_signature(signature: &str) -> Result<ParsedSignature> {
    let invalid = |reason: &'static str| Error::InvalidSignature {
        signature: signature.to_string(),
        reason,
    };

    let trimmed = signature.trim();
    let open = trimmed.find('(').ok_or_else(|| invalid("missing `(`"))?;
    let name = trimmed[..open].trim();
    if name.is_empty() {
        return Err(invalid("missing method name"));
    }
    if !name.chars().all(|c| is_ident_char(c) || c == ':') {
        return Err(invalid("method name is not an identifier"));
    }

    let inner = trimmed[open + 1..]
        .strip_suffix(')')
        .ok_or_else(|| invalid("missing closing `)`"))?;

    let mut params = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in inner.char_indices() {
        match c {
            '<' | '(' | '[' => depth += 1,
            '>' | ')' | ']' => {
                depth -= 1;
                if depth < 0 {
                    return Err(invalid("unbalanced brackets"));
                }
            }
            ',' if depth == 0 => {
                params.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(invalid("unbalanced brackets"));
    }
    params.push(&inner[start..]);

    if params.len() == 1 && params[0].trim().is_empty() {
        params.clear();
    }
    if params.iter().any(|p| p.trim().is_empty()) {
        return Err(invalid("empty parameter"));
    }

    Ok(ParsedSignature {
        name: name.to_string(),
        params: params.into_iter().map(normalized_type).collect(),
    })
}

/// Normalizes a method signature; returns the collapsed input if it does
/// not parse.
///
/// # Example
///
/// ```
/// use reflecta::runtime::normalized_signature;
///
/// assert_eq!(
///     normalized_signature(" setValue ( const i32 & ) "),
///     "setValue(i32)"
/// );
/// ```
#[must_use]
pub fn normalized_signature(signature: &str) -> String {
    match parse_signature(signature) {
        Ok(parsed) => parsed.to_signature(),
        Err(_) => collapse_whitespace(signature),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_between_identifiers_survives() {
        assert_eq!(normalized_type("*const   u8"), "*const u8");
        assert_eq!(normalized_type("Box< dyn  Fn() >"), "Box<dyn Fn()>");
    }

    #[test]
    fn test_reference_stripping() {
        assert_eq!(normalized_type("& 'a str"), "str");
        assert_eq!(normalized_type("&'static str"), "str");
        assert_eq!(normalized_type("&mut i32"), "&mut i32");
        assert_eq!(normalized_type("const String&"), "String");
    }

    #[test]
    fn test_parse_nested_generics() {
        let sig = parse_signature("f(BTreeMap<String, Vec<(i32, i32)>>, [u8; 4])").unwrap();
        assert_eq!(sig.params, ["BTreeMap<String,Vec<(i32,i32)>>", "[u8;4]"]);
    }

    #[test]
    fn test_parse_no_params() {
        let sig = parse_signature("reset( )").unwrap();
        assert_eq!(sig.name, "reset");
        assert!(sig.params.is_empty());
        assert_eq!(sig.to_signature(), "reset()");
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["reset", "(i32)", "f(i32", "f(i32,)", "f(Vec<i32)", "f(i32))", "a b(i32)"] {
            assert!(
                matches!(parse_signature(bad), Err(Error::InvalidSignature { .. })),
                "{bad} should fail"
            );
        }
    }

    #[test]
    fn test_normalized_signature_is_idempotent() {
        let once = normalized_signature("valueChanged( i32 , & String )");
        assert_eq!(once, "valueChanged(i32,String)");
        assert_eq!(normalized_signature(&once), once);
    }
}
