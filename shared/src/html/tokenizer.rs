use std::ops::Range;

use super::error::HtmlError;

/// An attribute as written in a start tag. `value` is `None` for bare
/// attributes such as `disabled`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: Option<String>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: Option<String>) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    StartTag {
        name: String,
        attributes: Vec<Attribute>,
        self_closing: bool,
    },
    EndTag {
        name: String,
    },
    /// Text with entities decoded. Contents of raw text elements (`script`,
    /// `style`) are kept verbatim.
    Text(String),
    Comment(String),
    Doctype(String),
}

/// A token together with the byte range it was read from
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Range<usize>,
}

const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "keygen", "link", "meta", "param",
    "source", "track",
];

const RAW_TEXT_ELEMENTS: [&str; 2] = ["script", "style"];

pub fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name) || name == "wbr"
}

/// Splits markup into tags, text and comments.
///
/// This is a tag scanner, not an HTML5 parser: it understands quoted and bare
/// attributes, comments, doctypes and raw text elements, which is what
/// component templates produce. Tag and attribute names are lower-cased.
pub fn tokenize(html: &str) -> Result<Vec<Token>, HtmlError> {
    let mut scanner = Scanner {
        html,
        bytes: html.as_bytes(),
        pos: 0,
        tokens: Vec::new(),
    };
    scanner.run()?;
    Ok(scanner.tokens)
}

struct Scanner<'a> {
    html: &'a str,
    bytes: &'a [u8],
    pos: usize,
    tokens: Vec<Token>,
}

impl<'a> Scanner<'a> {
    fn run(&mut self) -> Result<(), HtmlError> {
        while self.pos < self.bytes.len() {
            if self.bytes[self.pos] == b'<' {
                let next = self.bytes.get(self.pos + 1).copied();
                if self.html[self.pos..].starts_with("<!--") {
                    self.comment()?;
                } else if next == Some(b'!') {
                    self.doctype()?;
                } else if next == Some(b'/') {
                    self.end_tag()?;
                } else if next.is_some_and(|b| b.is_ascii_alphabetic()) {
                    self.start_tag()?;
                } else {
                    // stray '<' is text
                    self.text(self.pos + 1);
                }
            } else {
                self.text(self.pos);
            }
        }
        Ok(())
    }

    /// Text from the current position up to the next '<' at or after `from`
    fn text(&mut self, from: usize) {
        let start = self.pos;
        let end = self.html[from..]
            .find('<')
            .map_or(self.bytes.len(), |offset| from + offset);
        let html = self.html;
        self.push_text(&html[start..end], start..end, true);
        self.pos = end;
    }

    fn push_text(&mut self, raw: &str, span: Range<usize>, decode: bool) {
        if raw.is_empty() {
            return;
        }
        let text = if decode {
            decode_entities(raw)
        } else {
            raw.to_string()
        };
        // adjacent text runs (stray '<') merge into one token
        if let Some(Token {
            kind: TokenKind::Text(previous),
            span: previous_span,
        }) = self.tokens.last_mut()
        {
            if previous_span.end == span.start {
                previous.push_str(&text);
                previous_span.end = span.end;
                return;
            }
        }
        self.tokens.push(Token {
            kind: TokenKind::Text(text),
            span,
        });
    }

    fn comment(&mut self) -> Result<(), HtmlError> {
        let start = self.pos;
        let body_start = start + 4;
        let end = self.html[body_start..]
            .find("-->")
            .map(|offset| body_start + offset)
            .ok_or(HtmlError::UnterminatedComment { offset: start })?;
        self.tokens.push(Token {
            kind: TokenKind::Comment(self.html[body_start..end].to_string()),
            span: start..end + 3,
        });
        self.pos = end + 3;
        Ok(())
    }

    fn doctype(&mut self) -> Result<(), HtmlError> {
        let start = self.pos;
        let end = self.find_byte(b'>', start)
            .ok_or(HtmlError::UnterminatedTag { offset: start })?;
        self.tokens.push(Token {
            kind: TokenKind::Doctype(self.html[start + 2..end].trim().to_string()),
            span: start..end + 1,
        });
        self.pos = end + 1;
        Ok(())
    }

    fn end_tag(&mut self) -> Result<(), HtmlError> {
        let start = self.pos;
        let end = self.find_byte(b'>', start)
            .ok_or(HtmlError::UnterminatedTag { offset: start })?;
        let name = self.html[start + 2..end].trim().to_ascii_lowercase();
        self.tokens.push(Token {
            kind: TokenKind::EndTag { name },
            span: start..end + 1,
        });
        self.pos = end + 1;
        Ok(())
    }

    fn start_tag(&mut self) -> Result<(), HtmlError> {
        let start = self.pos;
        self.pos += 1;
        let name = self.take_while(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b':');
        let name = name.to_ascii_lowercase();

        let mut attributes: Vec<Attribute> = Vec::new();
        let mut self_closing = false;
        loop {
            self.skip_whitespace();
            match self.bytes.get(self.pos) {
                None => return Err(HtmlError::UnterminatedTag { offset: start }),
                Some(b'>') => {
                    self.pos += 1;
                    break;
                }
                Some(b'/') => {
                    if self.bytes.get(self.pos + 1) == Some(&b'>') {
                        self_closing = true;
                        self.pos += 2;
                        break;
                    }
                    self.pos += 1;
                }
                Some(_) => {
                    let attribute_name = self
                        .take_while(|b| !b.is_ascii_whitespace() && !matches!(b, b'=' | b'>' | b'/'))
                        .to_ascii_lowercase();
                    if attribute_name.is_empty() {
                        // lone '=' or similar
                        self.pos += 1;
                        continue;
                    }
                    self.skip_whitespace();
                    let value = if self.bytes.get(self.pos) == Some(&b'=') {
                        self.pos += 1;
                        self.skip_whitespace();
                        Some(self.attribute_value(start)?)
                    } else {
                        None
                    };
                    // first occurrence wins, like browsers
                    if !attributes.iter().any(|a| a.name == attribute_name) {
                        attributes.push(Attribute::new(attribute_name, value));
                    }
                }
            }
        }

        let tag_end = self.pos;
        let raw_text = !self_closing && RAW_TEXT_ELEMENTS.contains(&name.as_str());
        self.tokens.push(Token {
            kind: TokenKind::StartTag {
                name: name.clone(),
                attributes,
                self_closing,
            },
            span: start..tag_end,
        });

        if raw_text {
            let close = format!("</{name}");
            let lower = self.html[tag_end..].to_ascii_lowercase();
            let content_end = lower
                .find(&close)
                .map(|offset| tag_end + offset)
                .ok_or(HtmlError::UnclosedRawText {
                    name: name.clone(),
                    offset: start,
                })?;
            let html = self.html;
            self.push_text(&html[tag_end..content_end], tag_end..content_end, false);
            self.pos = content_end;
        }
        Ok(())
    }

    fn attribute_value(&mut self, tag_start: usize) -> Result<String, HtmlError> {
        match self.bytes.get(self.pos) {
            Some(&quote) if quote == b'"' || quote == b'\'' => {
                let value_start = self.pos + 1;
                let value_end = self
                    .find_byte(quote, value_start)
                    .ok_or(HtmlError::UnterminatedTag { offset: tag_start })?;
                self.pos = value_end + 1;
                Ok(decode_entities(&self.html[value_start..value_end]))
            }
            _ => {
                let raw = self.take_while(|b| !b.is_ascii_whitespace() && b != b'>');
                Ok(decode_entities(raw))
            }
        }
    }

    fn take_while(&mut self, predicate: impl Fn(u8) -> bool) -> &'a str {
        let start = self.pos;
        while self.pos < self.bytes.len() && predicate(self.bytes[self.pos]) {
            self.pos += 1;
        }
        &self.html[start..self.pos]
    }

    fn skip_whitespace(&mut self) {
        while self.bytes.get(self.pos).is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn find_byte(&self, needle: u8, from: usize) -> Option<usize> {
        self.bytes[from..]
            .iter()
            .position(|&b| b == needle)
            .map(|offset| from + offset)
    }
}

/// Decodes the handful of entities templates actually emit
pub fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let Some(semi) = rest.find(';').filter(|&semi| semi <= 10) else {
            out.push('&');
            rest = &rest[1..];
            continue;
        };
        let entity = &rest[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some('\u{a0}'),
            _ => entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
