//! Block markup – a controlled HTML subset parsed into a small DOM tree.
//!
//! Supported elements: `div`, `p`, `h1`–`h3`, `span`, `img`. Styling comes
//! only from `style` attributes. Unlike a browser, the parser is strict:
//! mismatched or unclosed tags and unknown elements are errors, so a broken
//! block fails its render instead of producing a silently wrong raster.

use std::collections::HashMap;

use crate::error::RenderError;

/// The tag name of a supported element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Div,
    P,
    H1,
    H2,
    H3,
    Span,
    Img,
}

impl Tag {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "div" => Some(Tag::Div),
            "p" => Some(Tag::P),
            "h1" => Some(Tag::H1),
            "h2" => Some(Tag::H2),
            "h3" => Some(Tag::H3),
            "span" => Some(Tag::Span),
            "img" => Some(Tag::Img),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Tag::Div => "div",
            Tag::P => "p",
            Tag::H1 => "h1",
            Tag::H2 => "h2",
            Tag::H3 => "h3",
            Tag::Span => "span",
            Tag::Img => "img",
        }
    }

    /// Elements whose inline content is merged into one wrapped paragraph.
    pub fn is_paragraph(self) -> bool {
        matches!(self, Tag::P | Tag::H1 | Tag::H2 | Tag::H3)
    }

    /// Elements that never have children or a closing tag.
    pub fn is_void(self) -> bool {
        matches!(self, Tag::Img)
    }
}

/// A node in the block tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An element node carrying tag, attributes, and children.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: Tag,
    pub attributes: HashMap<String, String>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            attributes: HashMap::new(),
            children: Vec::new(),
        }
    }

    pub fn inline_style(&self) -> Option<&str> {
        self.attributes.get("style").map(|s| s.as_str())
    }

    pub fn src(&self) -> Option<&str> {
        self.attributes.get("src").map(|s| s.as_str())
    }
}

/// Parse block markup into a list of top-level nodes.
pub fn parse_markup(input: &str) -> Result<Vec<Node>, RenderError> {
    let mut parser = Parser::new(input);
    let nodes = parser.parse_nodes()?;
    if !parser.eof() {
        // parse_nodes only stops early on a closing tag
        let name = parser.peek_closing_name();
        return Err(parser.error(format!("unexpected closing tag </{name}>")));
    }
    Ok(nodes)
}

/// Escape text for safe embedding in markup.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn error(&self, message: impl Into<String>) -> RenderError {
        RenderError::Parse {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn parse_nodes(&mut self) -> Result<Vec<Node>, RenderError> {
        let mut nodes = Vec::new();
        loop {
            self.skip_whitespace_between_tags();
            if self.eof() || self.starts_with("</") {
                break;
            }
            if let Some(node) = self.parse_node()? {
                nodes.push(node);
            }
        }
        Ok(nodes)
    }

    fn parse_node(&mut self) -> Result<Option<Node>, RenderError> {
        if self.starts_with("<!--") {
            self.skip_comment()?;
            return Ok(None);
        }
        if self.starts_with("<!") {
            // doctype
            self.skip_until(">")?;
            return Ok(None);
        }
        if self.starts_with("<") {
            Ok(Some(self.parse_element()?))
        } else {
            Ok(Some(self.parse_text()))
        }
    }

    fn parse_text(&mut self) -> Node {
        let start = self.pos;
        let len = self.input[start..].find('<').unwrap_or(self.input.len() - start);
        self.pos += len;
        Node::Text(decode_entities(&self.input[start..self.pos]))
    }

    fn parse_element(&mut self) -> Result<Node, RenderError> {
        let open_at = self.pos;
        self.advance(1); // '<'
        let name = self.parse_name();
        if name.is_empty() {
            return Err(self.error("expected a tag name after '<'"));
        }
        let tag = Tag::from_name(&name).ok_or_else(|| RenderError::UnsupportedElement(name.clone()))?;
        let mut elem = Element::new(tag);

        loop {
            self.skip_whitespace();
            if self.eof() {
                return Err(RenderError::Parse {
                    offset: open_at,
                    message: format!("unterminated <{name}> tag"),
                });
            }
            if self.starts_with(">") || self.starts_with("/>") {
                break;
            }
            let (key, value) = self.parse_attribute()?;
            elem.attributes.insert(key, value);
        }

        if self.starts_with("/>") {
            self.advance(2);
            return Ok(Node::Element(elem));
        }
        self.advance(1); // '>'
        if tag.is_void() {
            return Ok(Node::Element(elem));
        }

        elem.children = self.parse_nodes()?;

        if !self.starts_with("</") {
            return Err(RenderError::Parse {
                offset: open_at,
                message: format!("<{name}> is never closed"),
            });
        }
        self.advance(2);
        let closing = self.parse_name();
        if Tag::from_name(&closing) != Some(tag) {
            return Err(self.error(format!("</{closing}> does not close <{name}>")));
        }
        self.skip_whitespace();
        if !self.starts_with(">") {
            return Err(self.error(format!("malformed closing tag </{closing}")));
        }
        self.advance(1);

        Ok(Node::Element(elem))
    }

    fn parse_name(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.current_char() {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                self.advance(1);
            } else {
                break;
            }
        }
        self.input[start..self.pos].to_string()
    }

    fn parse_attribute(&mut self) -> Result<(String, String), RenderError> {
        let key = self.parse_name();
        if key.is_empty() {
            return Err(self.error("malformed attribute"));
        }
        self.skip_whitespace();
        if !self.starts_with("=") {
            return Ok((key.to_ascii_lowercase(), String::new()));
        }
        self.advance(1);
        self.skip_whitespace();
        let value = self.parse_attr_value()?;
        Ok((key.to_ascii_lowercase(), value))
    }

    fn parse_attr_value(&mut self) -> Result<String, RenderError> {
        let quote = match self.current_char() {
            Some(q @ ('"' | '\'')) => q,
            _ => {
                let start = self.pos;
                while let Some(c) = self.current_char() {
                    if c.is_whitespace() || c == '>' || c == '/' {
                        break;
                    }
                    self.advance(1);
                }
                return Ok(self.input[start..self.pos].to_string());
            }
        };
        self.advance(1);
        let start = self.pos;
        let len = self.input[start..]
            .find(quote)
            .ok_or_else(|| self.error("unterminated attribute value"))?;
        self.pos += len;
        let value = decode_entities(&self.input[start..self.pos]);
        self.advance(1);
        Ok(value)
    }

    fn skip_whitespace(&mut self) {
        while self.current_char().is_some_and(char::is_whitespace) {
            self.advance(1);
        }
    }

    fn skip_whitespace_between_tags(&mut self) {
        // Whitespace-only runs between tags are dropped; runs that lead into
        // text are kept as part of that text.
        let saved = self.pos;
        self.skip_whitespace();
        if !self.eof() && !self.starts_with("<") {
            self.pos = saved;
        }
    }

    fn skip_comment(&mut self) -> Result<(), RenderError> {
        self.advance(4);
        self.skip_until("-->")
    }

    fn skip_until(&mut self, end: &str) -> Result<(), RenderError> {
        match self.input[self.pos..].find(end) {
            Some(idx) => {
                self.pos += idx + end.len();
                Ok(())
            }
            None => Err(self.error(format!("missing '{end}'"))),
        }
    }

    fn peek_closing_name(&self) -> String {
        self.input[self.pos..]
            .trim_start_matches("</")
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect()
    }

    fn starts_with(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn current_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self, n: usize) {
        for _ in 0..n {
            if let Some(c) = self.current_char() {
                self.pos += c.len_utf8();
            }
        }
    }
}

fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", "\u{00A0}")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_nested_div() {
        let nodes = parse_markup(r#"<div style="padding: 4px"><p>Hello</p></div>"#).unwrap();
        assert_eq!(nodes.len(), 1);
        let Node::Element(div) = &nodes[0] else {
            panic!("expected element");
        };
        assert_eq!(div.tag, Tag::Div);
        assert_eq!(div.inline_style(), Some("padding: 4px"));
        assert_eq!(div.children.len(), 1);
    }

    #[test]
    fn paragraph_keeps_inline_children() {
        let nodes = parse_markup("<p>Hello <span>world</span>!</p>").unwrap();
        let Node::Element(p) = &nodes[0] else {
            panic!("expected element");
        };
        assert_eq!(p.children.len(), 3);
    }

    #[test]
    fn void_img_needs_no_closing_tag() {
        let nodes = parse_markup(r#"<div><img src="data:x"><p>after</p></div>"#).unwrap();
        let Node::Element(div) = &nodes[0] else {
            panic!("expected element");
        };
        assert_eq!(div.children.len(), 2);
    }

    #[test]
    fn mismatched_closing_tag_is_an_error() {
        let err = parse_markup("<div><p>text</div></p>").unwrap_err();
        assert!(matches!(err, RenderError::Parse { .. }), "{err:?}");
    }

    #[test]
    fn unclosed_element_is_an_error() {
        let err = parse_markup("<div><p>text</p>").unwrap_err();
        assert!(matches!(err, RenderError::Parse { .. }));
    }

    #[test]
    fn stray_closing_tag_is_an_error() {
        let err = parse_markup("<p>a</p></div>").unwrap_err();
        assert!(matches!(err, RenderError::Parse { .. }));
    }

    #[test]
    fn unknown_element_is_unsupported() {
        let err = parse_markup("<table></table>").unwrap_err();
        assert_eq!(err, RenderError::UnsupportedElement("table".into()));
    }

    #[test]
    fn escaped_text_round_trips_through_the_parser() {
        let raw = r#"a < b & "c" 'd'"#;
        let nodes = parse_markup(&format!("<p>{}</p>", escape_text(raw))).unwrap();
        let Node::Element(p) = &nodes[0] else {
            panic!("expected element");
        };
        assert_eq!(p.children, vec![Node::Text(raw.to_string())]);
    }

    #[test]
    fn comments_are_skipped() {
        let nodes = parse_markup("<!-- note --><p>x</p>").unwrap();
        assert_eq!(nodes.len(), 1);
    }
}
