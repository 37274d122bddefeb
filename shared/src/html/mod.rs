mod error;
mod tokenizer;

pub use error::HtmlError;
pub use tokenizer::{decode_entities, is_void_element, tokenize, Attribute, Token, TokenKind};

/// The single top-level element of a fragment
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RootElement {
    pub name: String,
    /// Index of the start tag in the token list
    pub start: usize,
    /// Index of the matching end tag, `None` for `<tag/>`
    pub end: Option<usize>,
}

/// Finds the one top-level element of a fragment. Whitespace text and
/// comments may surround it; anything else is an error.
pub fn root_element(tokens: &[Token]) -> Result<RootElement, HtmlError> {
    let mut root: Option<RootElement> = None;
    let mut depth = 0usize;
    for (index, token) in tokens.iter().enumerate() {
        match &token.kind {
            TokenKind::StartTag {
                name, self_closing, ..
            } => {
                let leaf = *self_closing || is_void_element(name);
                if depth == 0 {
                    if let Some(existing) = &root {
                        return Err(HtmlError::MultipleRoots {
                            first: existing.name.clone(),
                            second: name.clone(),
                        });
                    }
                    root = Some(RootElement {
                        name: name.clone(),
                        start: index,
                        end: None,
                    });
                }
                if !leaf {
                    depth += 1;
                }
            }
            TokenKind::EndTag { name } => {
                if depth == 0 {
                    // stray close at top level, ignored like a browser would
                    continue;
                }
                depth -= 1;
                if depth == 0 {
                    if let Some(root) = root.as_mut() {
                        if root.name != *name {
                            return Err(HtmlError::UnclosedRoot {
                                name: root.name.clone(),
                            });
                        }
                        root.end = Some(index);
                    }
                }
            }
            TokenKind::Text(text) => {
                if depth == 0 && !text.trim().is_empty() {
                    let first = root.as_ref().map_or("#text", |r| r.name.as_str());
                    return Err(HtmlError::MultipleRoots {
                        first: first.to_string(),
                        second: "#text".to_string(),
                    });
                }
            }
            TokenKind::Comment(_) | TokenKind::Doctype(_) => {}
        }
    }

    let root = root.ok_or(HtmlError::NoRoot)?;
    if depth != 0 {
        return Err(HtmlError::UnclosedRoot { name: root.name });
    }
    Ok(root)
}

pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}

pub fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}

/// Writes `<name a="b" c>` (or `<name ... />` when `self_closing`)
pub fn write_start_tag(out: &mut String, name: &str, attributes: &[Attribute], self_closing: bool) {
    out.push('<');
    out.push_str(name);
    for attribute in attributes {
        out.push(' ');
        out.push_str(&attribute.name);
        if let Some(value) = &attribute.value {
            out.push_str("=\"");
            out.push_str(&escape_attribute(value));
            out.push('"');
        }
    }
    if self_closing {
        out.push_str(" />");
    } else {
        out.push('>');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start_names(tokens: &[Token]) -> Vec<&str> {
        tokens
            .iter()
            .filter_map(|t| match &t.kind {
                TokenKind::StartTag { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn scans_attributes() {
        let tokens =
            tokenize(r#"<INPUT Name="q" value='a &amp; b' disabled data-x=1>"#).unwrap();
        let TokenKind::StartTag {
            name, attributes, ..
        } = &tokens[0].kind
        else {
            panic!("expected a start tag");
        };
        assert_eq!(name, "input");
        assert_eq!(
            attributes,
            &vec![
                Attribute::new("name", Some("q".into())),
                Attribute::new("value", Some("a & b".into())),
                Attribute::new("disabled", None),
                Attribute::new("data-x", Some("1".into())),
            ]
        );
    }

    #[test]
    fn keeps_script_contents_raw() {
        let tokens = tokenize("<div><script>if (a < b) {}</script><br/></div>").unwrap();
        assert_eq!(start_names(&tokens), vec!["div", "script", "br"]);
        assert!(tokens
            .iter()
            .any(|t| t.kind == TokenKind::Text("if (a < b) {}".into())));
    }

    #[test]
    fn spans_cover_the_source() {
        let html = "<p id=\"a\">hi<!-- c --></p>";
        let tokens = tokenize(html).unwrap();
        assert_eq!(&html[tokens[0].span.clone()], "<p id=\"a\">");
        assert_eq!(&html[tokens[2].span.clone()], "<!-- c -->");
        assert_eq!(&html[tokens[3].span.clone()], "</p>");
    }

    #[test]
    fn finds_the_single_root() {
        let tokens = tokenize("\n <!-- x --><div><input><p>a</p></div>\n").unwrap();
        let root = root_element(&tokens).unwrap();
        assert_eq!(root.name, "div");
        assert_eq!(root.start, 2);
        assert_eq!(root.end, Some(tokens.len() - 2));
    }

    #[test]
    fn rejects_multiple_roots() {
        let tokens = tokenize("<div></div><span></span>").unwrap();
        assert_eq!(
            root_element(&tokens),
            Err(HtmlError::MultipleRoots {
                first: "div".into(),
                second: "span".into()
            })
        );
        assert_eq!(root_element(&tokenize("  ").unwrap()), Err(HtmlError::NoRoot));
        assert!(matches!(
            root_element(&tokenize("<div><p></div>").unwrap()),
            Err(HtmlError::UnclosedRoot { .. })
        ));
    }

    #[test]
    fn unterminated_markup_is_an_error() {
        assert!(matches!(tokenize("<div"), Err(HtmlError::UnterminatedTag { .. })));
        assert!(matches!(tokenize("<!-- x"), Err(HtmlError::UnterminatedComment { .. })));
        assert!(matches!(
            tokenize("<script>x"),
            Err(HtmlError::UnclosedRawText { .. })
        ));
    }

    #[test]
    fn escapes_round_trip_through_decode() {
        let raw = r#"a<b>&"c""#;
        assert_eq!(decode_entities(&escape_attribute(raw)), raw);
        assert_eq!(decode_entities(&escape_text(raw)), raw);
    }
}
