//! CSS selector subset used by element bindings.
//!
//! Supported: type (`div`), universal (`*`), id (`#x`), class (`.x`),
//! attribute presence and equality (`[data-x]`, `[data-x="y"]`) and the
//! descendant combinator (whitespace).

use std::fmt;
use std::iter::Peekable;
use std::str::{Chars, FromStr};

use super::{Document, NodeId};
use crate::error::{ExplorerError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    /// Descendant chain, outermost first.
    parts: Vec<Compound>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrMatch>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrMatch {
    name: String,
    value: Option<String>,
}

impl Selector {
    pub fn parse(input: &str) -> Result<Self> {
        let mut parts = Vec::new();
        let mut current = Compound::default();
        let mut started = false;
        let mut chars = input.trim().chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                c if c.is_whitespace() => {
                    if started {
                        parts.push(std::mem::take(&mut current));
                        started = false;
                    }
                }
                '*' => started = true,
                '#' => {
                    current.id = Some(ident(&mut chars, input)?);
                    started = true;
                }
                '.' => {
                    current.classes.push(ident(&mut chars, input)?);
                    started = true;
                }
                '[' => {
                    current.attrs.push(attr_match(&mut chars, input)?);
                    started = true;
                }
                c if is_ident_char(c) => {
                    let mut tag = c.to_string();
                    tag.push_str(&ident(&mut chars, input).unwrap_or_default());
                    current.tag = Some(tag.to_ascii_lowercase());
                    started = true;
                }
                other => {
                    return Err(ExplorerError::SelectorError(format!(
                        "unexpected '{}' in {}",
                        other, input
                    )))
                }
            }
        }
        if started {
            parts.push(current);
        }
        if parts.is_empty() {
            return Err(ExplorerError::SelectorError("empty selector".to_string()));
        }

        Ok(Self {
            source: input.trim().to_string(),
            parts,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Some((last, ancestors)) = self.parts.split_last() else {
            return false;
        };
        if !last.matches(doc, node) {
            return false;
        }

        let mut current = doc.parent(node);
        for compound in ancestors.iter().rev() {
            loop {
                let Some(candidate) = current else {
                    return false;
                };
                current = doc.parent(candidate);
                if compound.matches(doc, candidate) {
                    break;
                }
            }
        }
        true
    }
}

impl Compound {
    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Some(tag) = doc.tag(node) else {
            return false;
        };
        if self.tag.as_deref().is_some_and(|t| t != tag) {
            return false;
        }
        if let Some(id) = &self.id {
            if doc.attr(node, "id") != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let classes = doc.attr(node, "class").unwrap_or_default();
            if !self
                .classes
                .iter()
                .all(|wanted| classes.split_whitespace().any(|c| c == wanted))
            {
                return false;
            }
        }
        self.attrs.iter().all(|m| match doc.attr(node, &m.name) {
            Some(actual) => m.value.as_deref().map_or(true, |v| v == actual),
            None => false,
        })
    }
}

impl FromStr for Selector {
    type Err = ExplorerError;

    fn from_str(s: &str) -> Result<Self> {
        Selector::parse(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn ident(chars: &mut Peekable<Chars>, input: &str) -> Result<String> {
    let mut out = String::new();
    while let Some(&c) = chars.peek() {
        if !is_ident_char(c) {
            break;
        }
        out.push(c);
        chars.next();
    }
    if out.is_empty() {
        return Err(ExplorerError::SelectorError(format!(
            "expected identifier in {}",
            input
        )));
    }
    Ok(out)
}

fn attr_match(chars: &mut Peekable<Chars>, input: &str) -> Result<AttrMatch> {
    let unterminated = || ExplorerError::SelectorError(format!("unterminated [ in {}", input));

    let mut name = String::new();
    let mut value = None;
    loop {
        match chars.next().ok_or_else(unterminated)? {
            ']' => break,
            '=' => {
                value = Some(attr_value(chars, input)?);
                match chars.next() {
                    Some(']') => break,
                    _ => return Err(unterminated()),
                }
            }
            c => name.push(c),
        }
    }

    let name = name.trim().to_ascii_lowercase();
    if name.is_empty() {
        return Err(ExplorerError::SelectorError(format!(
            "empty attribute name in {}",
            input
        )));
    }
    Ok(AttrMatch { name, value })
}

fn attr_value(chars: &mut Peekable<Chars>, input: &str) -> Result<String> {
    while chars.peek().is_some_and(|c| c.is_whitespace()) {
        chars.next();
    }
    let mut out = String::new();
    match chars.peek().copied() {
        Some(quote @ ('"' | '\'')) => {
            chars.next();
            loop {
                match chars.next() {
                    Some(c) if c == quote => break,
                    Some(c) => out.push(c),
                    None => {
                        return Err(ExplorerError::SelectorError(format!(
                            "unterminated string in {}",
                            input
                        )))
                    }
                }
            }
            while chars.peek().is_some_and(|c| c.is_whitespace()) {
                chars.next();
            }
        }
        _ => {
            while let Some(&c) = chars.peek() {
                if c == ']' {
                    break;
                }
                out.push(c);
                chars.next();
            }
            out = out.trim().to_string();
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Document {
        Document::parse(
            r#"<main id="app" class="page wide"><div data-selector="blocks-list"><p class="tile">x</p></div><p class="tile">y</p></main>"#,
        )
        .unwrap()
    }

    #[test]
    fn test_attribute_equality() {
        let doc = doc();
        let found = doc.select(r#"[data-selector="blocks-list"]"#).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(doc.tag(found[0]), Some("div"));
        assert!(doc.select("[data-selector='other']").unwrap().is_empty());
        assert_eq!(doc.select("[data-selector]").unwrap().len(), 1);
    }

    #[test]
    fn test_compound_and_descendant() {
        let doc = doc();
        assert_eq!(doc.select("p.tile").unwrap().len(), 2);
        assert_eq!(doc.select("[data-selector=blocks-list] .tile").unwrap().len(), 1);
        assert_eq!(doc.select("#app.page.wide").unwrap().len(), 1);
        assert_eq!(doc.select("main p").unwrap().len(), 2);
        assert!(doc.select("section p").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_selectors() {
        assert!(Selector::parse("").is_err());
        assert!(Selector::parse("[data-x").is_err());
        assert!(Selector::parse("[data-x=\"y]").is_err());
        assert!(Selector::parse("div > p").is_err());
    }

    #[test]
    fn test_display_keeps_source() {
        let selector: Selector = " [data-page=\"block-list\"] ".parse().unwrap();
        assert_eq!(selector.to_string(), "[data-page=\"block-list\"]");
    }
}
