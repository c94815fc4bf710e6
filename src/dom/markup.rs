//! Lenient HTML fragment parser for server-rendered markup.
//!
//! Handles elements, attributes, text, comments, void elements and raw-text
//! elements. Unmatched closing tags are ignored; unclosed elements are closed
//! at the end of input.

use super::{Document, NodeData, NodeId};
use crate::error::{ExplorerError, Result};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

pub(crate) fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

pub(crate) fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

fn decode_entities(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    value
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

pub(crate) fn parse_fragment(doc: &mut Document, input: &str) -> Result<Vec<NodeId>> {
    let mut parser = Parser { input, pos: 0 };
    let mut top = Vec::new();
    let mut open: Vec<(NodeId, String)> = Vec::new();

    while !parser.eof() {
        if parser.starts_with("<!--") {
            let body = parser.take_delimited("<!--", "-->")?;
            let id = doc.alloc(NodeData::Comment(body.to_string()));
            attach(doc, &mut top, &open, id);
        } else if parser.starts_with("<!") || parser.starts_with("<?") {
            // doctype and processing instructions carry nothing we render
            parser.skip_past('>')?;
        } else if parser.starts_with("</") {
            let name = parser.close_tag()?;
            if let Some(idx) = open.iter().rposition(|(_, tag)| *tag == name) {
                open.truncate(idx);
            }
        } else if parser.at_open_tag() {
            let (tag, attrs, self_closing) = parser.open_tag()?;
            let id = doc.alloc(NodeData::Element {
                tag: tag.clone(),
                attrs,
            });
            attach(doc, &mut top, &open, id);
            if self_closing || is_void(&tag) {
                continue;
            }
            if RAW_TEXT_ELEMENTS.contains(&tag.as_str()) {
                let body = parser.raw_text(&tag)?;
                if !body.is_empty() {
                    let text = doc.alloc(NodeData::Text(body.to_string()));
                    doc.append_child(id, text);
                }
                continue;
            }
            open.push((id, tag));
        } else {
            let text = parser.text();
            let id = doc.alloc(NodeData::Text(text.to_string()));
            attach(doc, &mut top, &open, id);
        }
    }

    Ok(top)
}

fn attach(doc: &mut Document, top: &mut Vec<NodeId>, open: &[(NodeId, String)], id: NodeId) {
    match open.last() {
        Some((parent, _)) => doc.append_child(*parent, id),
        None => top.push(id),
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn starts_with(&self, prefix: &str) -> bool {
        self.rest().starts_with(prefix)
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn at_open_tag(&self) -> bool {
        let mut chars = self.rest().chars();
        chars.next() == Some('<') && chars.next().is_some_and(|c| c.is_ascii_alphabetic())
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.input.len() - trimmed.len();
    }

    fn skip_past(&mut self, delimiter: char) -> Result<()> {
        match self.rest().find(delimiter) {
            Some(idx) => {
                self.pos += idx + delimiter.len_utf8();
                Ok(())
            }
            None => Err(self.unterminated()),
        }
    }

    fn take_delimited(&mut self, open: &str, close: &str) -> Result<&'a str> {
        self.pos += open.len();
        match self.rest().find(close) {
            Some(idx) => {
                let body = &self.rest()[..idx];
                self.pos += idx + close.len();
                Ok(body)
            }
            None => Err(self.unterminated()),
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let rest = self.rest();
        let len = rest.find(|c: char| !pred(c)).unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    fn text(&mut self) -> &'a str {
        let rest = self.rest();
        // a '<' that does not open markup is plain text
        let start = usize::from(rest.starts_with('<'));
        let len = rest[start..].find('<').map_or(rest.len(), |idx| idx + start);
        self.pos += len;
        &rest[..len]
    }

    fn open_tag(&mut self) -> Result<(String, Vec<(String, String)>, bool)> {
        self.pos += 1;
        let tag = self
            .take_while(|c| c.is_ascii_alphanumeric() || c == '-' || c == ':')
            .to_ascii_lowercase();
        let mut attrs: Vec<(String, String)> = Vec::new();

        loop {
            self.skip_whitespace();
            if self.starts_with("/>") {
                self.pos += 2;
                return Ok((tag, attrs, true));
            }
            match self.peek() {
                None => return Err(self.unterminated()),
                Some('>') => {
                    self.pos += 1;
                    return Ok((tag, attrs, false));
                }
                Some('/') => {
                    self.pos += 1;
                    continue;
                }
                Some(_) => {}
            }

            let name = self
                .take_while(|c| !c.is_whitespace() && c != '=' && c != '>' && c != '/')
                .to_ascii_lowercase();
            if name.is_empty() {
                self.pos += self.peek().map_or(1, char::len_utf8);
                continue;
            }

            self.skip_whitespace();
            let value = if self.peek() == Some('=') {
                self.pos += 1;
                self.skip_whitespace();
                self.attr_value()?
            } else {
                String::new()
            };

            if !attrs.iter().any(|(n, _)| *n == name) {
                attrs.push((name, value));
            }
        }
    }

    fn attr_value(&mut self) -> Result<String> {
        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                match self.rest().find(quote) {
                    Some(idx) => {
                        let raw = &self.rest()[..idx];
                        self.pos += idx + 1;
                        Ok(decode_entities(raw))
                    }
                    None => Err(self.unterminated()),
                }
            }
            _ => Ok(decode_entities(
                self.take_while(|c| !c.is_whitespace() && c != '>'),
            )),
        }
    }

    fn close_tag(&mut self) -> Result<String> {
        self.pos += 2;
        let rest = self.rest();
        match rest.find('>') {
            Some(idx) => {
                let name = rest[..idx].trim().to_ascii_lowercase();
                self.pos += idx + 1;
                Ok(name)
            }
            None => Err(self.unterminated()),
        }
    }

    fn raw_text(&mut self, tag: &str) -> Result<&'a str> {
        let needle = format!("</{}", tag);
        // ASCII lowercasing keeps byte offsets intact
        match self.rest().to_ascii_lowercase().find(&needle) {
            Some(idx) => {
                let body = &self.rest()[..idx];
                self.pos += idx;
                self.close_tag()?;
                Ok(body)
            }
            None => Err(self.unterminated()),
        }
    }

    fn unterminated(&self) -> ExplorerError {
        ExplorerError::MarkupError(format!("unterminated markup at byte {}", self.pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(markup: &str) -> (Document, Vec<NodeId>) {
        let mut doc = Document::new();
        let nodes = parse_fragment(&mut doc, markup).unwrap();
        (doc, nodes)
    }

    #[test]
    fn test_attributes_quoting_styles() {
        let (doc, nodes) = parse(r#"<div a="1" b='2' c=3 hidden data-x="&quot;q&quot;"></div>"#);
        let el = nodes[0];
        assert_eq!(doc.attr(el, "a"), Some("1"));
        assert_eq!(doc.attr(el, "b"), Some("2"));
        assert_eq!(doc.attr(el, "c"), Some("3"));
        assert_eq!(doc.attr(el, "hidden"), Some(""));
        assert_eq!(doc.attr(el, "data-x"), Some("\"q\""));
    }

    #[test]
    fn test_void_and_self_closing_elements() {
        let (doc, nodes) = parse("<p>a<br>b<img src=\"x.png\"/>c</p>");
        assert_eq!(nodes.len(), 1);
        assert_eq!(doc.children(nodes[0]).len(), 5);
        assert_eq!(doc.outer_html(nodes[0]), "<p>a<br>b<img src=\"x.png\">c</p>");
    }

    #[test]
    fn test_raw_text_is_not_parsed() {
        let (doc, nodes) = parse("<script>if (a < b) { x = '<div>' }</script>");
        assert_eq!(doc.children(nodes[0]).len(), 1);
        assert_eq!(doc.inner_html(nodes[0]), "if (a < b) { x = '<div>' }");
    }

    #[test]
    fn test_stray_less_than_is_text() {
        let (doc, nodes) = parse("<span>1 < 2</span>");
        assert_eq!(doc.text_content(nodes[0]), "1 < 2");
    }

    #[test]
    fn test_unmatched_close_tag_ignored() {
        let (doc, nodes) = parse("<div><span>x</div></span>");
        assert_eq!(nodes.len(), 1);
        assert_eq!(doc.outer_html(nodes[0]), "<div><span>x</span></div>");
    }

    #[test]
    fn test_comments_and_doctype() {
        let (doc, nodes) = parse("<!DOCTYPE html><!-- note --><b>x</b>");
        assert_eq!(nodes.len(), 2);
        assert_eq!(doc.outer_html(nodes[0]), "<!-- note -->");
    }

    #[test]
    fn test_unterminated_tag_is_an_error() {
        let mut doc = Document::new();
        assert!(parse_fragment(&mut doc, "<div class=\"x").is_err());
        assert!(parse_fragment(&mut doc, "<!-- open").is_err());
    }
}
