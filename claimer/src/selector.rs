use serde_json::{json, Value};

use crate::errors::ClaimError;

/// Represents ways to locate an element on the page.
///
/// Selector strings follow the Playwright dialect the storefront flows are
/// written in: plain CSS, the `:has-text("…")`, `:text-is("…")` and `:has(…)`
/// pseudo-classes, `text=…`, and `>>` to scope a selector inside the matches
/// of the previous one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// Plain CSS selector
    Css(String),
    /// Base matches whose text contains the string (case-insensitive)
    HasText(Box<Selector>, String),
    /// Base matches whose whitespace-normalized text equals the string
    TextIs(Box<Selector>, String),
    /// Base matches with at least one descendant matching the inner selector
    Has(Box<Selector>, Box<Selector>),
    /// Innermost elements containing the text (case-insensitive)
    Text(String),
    /// Chain multiple selectors, each resolved within the previous matches
    Chain(Vec<Selector>),
    /// Represents an invalid selector string, with a reason.
    Invalid(String),
}

const HAS_TEXT: &str = ":has-text(";
const TEXT_IS: &str = ":text-is(";
const HAS: &str = ":has(";

impl Selector {
    /// Serializes the selector into the query tree understood by the page-side
    /// resolver.
    pub fn to_query(&self) -> Result<Value, ClaimError> {
        Ok(match self {
            Selector::Css(css) => json!({ "kind": "css", "css": css }),
            Selector::HasText(base, text) => {
                json!({ "kind": "has_text", "base": base.to_query()?, "text": text })
            }
            Selector::TextIs(base, text) => {
                json!({ "kind": "text_is", "base": base.to_query()?, "text": text })
            }
            Selector::Has(base, inner) => {
                json!({ "kind": "has", "base": base.to_query()?, "inner": inner.to_query()? })
            }
            Selector::Text(text) => json!({ "kind": "text", "text": text }),
            Selector::Chain(parts) => {
                let parts = parts
                    .iter()
                    .map(Selector::to_query)
                    .collect::<Result<Vec<_>, _>>()?;
                json!({ "kind": "chain", "parts": parts })
            }
            Selector::Invalid(reason) => return Err(ClaimError::InvalidSelector(reason.clone())),
        })
    }

    /// Scope another selector inside the matches of this one.
    pub fn then(self, next: impl Into<Selector>) -> Selector {
        let mut chain = match self {
            Selector::Chain(parts) => parts,
            s => vec![s],
        };
        match next.into() {
            Selector::Chain(mut parts) => chain.append(&mut parts),
            s => chain.push(s),
        }
        Selector::Chain(chain)
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selector::Css(css) => write!(f, "{css}"),
            Selector::HasText(base, text) => write!(f, "{base}:has-text(\"{}\")", escape(text)),
            Selector::TextIs(base, text) => write!(f, "{base}:text-is(\"{}\")", escape(text)),
            Selector::Has(base, inner) => write!(f, "{base}:has({inner})"),
            Selector::Text(text) => write!(f, "text={text}"),
            Selector::Chain(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, " >> ")?;
                    }
                    write!(f, "{part}")?;
                }
                Ok(())
            }
            Selector::Invalid(reason) => write!(f, "invalid({reason})"),
        }
    }
}

impl From<&str> for Selector {
    fn from(s: &str) -> Self {
        // Handle chained selectors first
        let parts: Vec<&str> = s.split(">>").map(|p| p.trim()).collect();
        if parts.len() > 1 {
            return Selector::Chain(parts.into_iter().map(parse_part).collect());
        }
        parse_part(s)
    }
}

impl From<String> for Selector {
    fn from(s: String) -> Self {
        Selector::from(s.as_str())
    }
}

impl From<&String> for Selector {
    fn from(s: &String) -> Self {
        Selector::from(s.as_str())
    }
}

fn parse_part(s: &str) -> Selector {
    let s = s.trim();
    if s.is_empty() {
        return Selector::Invalid("empty selector".to_string());
    }
    if let Some(rest) = s.strip_prefix("text=") {
        return Selector::Text(unquote(rest));
    }

    let Some(start) = find_pseudo(s) else {
        return Selector::Css(s.to_string());
    };
    let base = s[..start].trim();
    let mut selector = Selector::Css(if base.is_empty() { "*" } else { base }.to_string());
    let mut rest = &s[start..];

    while !rest.is_empty() {
        let Some((name, arg, tail)) = split_pseudo(rest) else {
            return Selector::Invalid(format!("Unbalanced pseudo-class in \"{s}\""));
        };
        selector = match name {
            "has-text" => Selector::HasText(Box::new(selector), unquote(arg)),
            "text-is" => Selector::TextIs(Box::new(selector), unquote(arg)),
            "has" => Selector::Has(Box::new(selector), Box::new(Selector::from(arg))),
            other => {
                return Selector::Invalid(format!("Unsupported pseudo-class :{other} in \"{s}\""))
            }
        };
        rest = tail.trim_end();
        if !rest.is_empty() && !rest.starts_with(':') {
            return Selector::Invalid(format!(
                "Unexpected \"{rest}\" after pseudo-class in \"{s}\". Use '>>' to select descendants."
            ));
        }
    }
    selector
}

/// Byte offset of the first supported pseudo-class outside of `[...]` and quotes.
fn find_pseudo(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (i, c) in s.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, ':') if depth == 0 => {
                let tail = &s[i..];
                if tail.starts_with(HAS_TEXT) || tail.starts_with(TEXT_IS) || tail.starts_with(HAS)
                {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Splits `:name(arg)tail` into its parts, honouring nested parentheses and quotes.
fn split_pseudo(s: &str) -> Option<(&str, &str, &str)> {
    let open = s.find('(')?;
    let name = s.get(1..open)?;
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in s[open..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, c) {
            (Some(_), '\\') => escaped = true,
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => {
                depth -= 1;
                if depth == 0 {
                    let close = open + i;
                    return Some((name, &s[open + 1..close], &s[close + 1..]));
                }
            }
            _ => {}
        }
    }
    None
}

fn unquote(arg: &str) -> String {
    let arg = arg.trim();
    let quoted = arg.len() >= 2
        && ((arg.starts_with('"') && arg.ends_with('"'))
            || (arg.starts_with('\'') && arg.ends_with('\'')));
    if quoted {
        arg[1..arg.len() - 1]
            .replace("\\\"", "\"")
            .replace("\\'", "'")
    } else {
        arg.to_string()
    }
}

fn escape(text: &str) -> String {
    text.replace('"', "\\\"")
}
