use std::time::Duration;

use tether_shared::{
    html::{
        escape_attribute, is_void_element, root_element, tokenize, write_start_tag, Attribute,
        HtmlError, TokenKind,
    },
    ComponentId, EventSubscription,
};

/// Attributes the server owns on a component root
const RESERVED_ATTRIBUTES: [&str; 4] = ["id", "key", "tether-name", "tether"];

/// What gets attached to a component's root element
pub(crate) struct Decoration<'d> {
    pub(crate) id: &'d ComponentId,
    pub(crate) name: &'d str,
    pub(crate) token: &'d str,
    pub(crate) polls: Vec<(&'static str, Duration)>,
    pub(crate) subscriptions: Vec<EventSubscription>,
    /// Scripts rendered inline, static renders only
    pub(crate) scripts: &'d [String],
}

/// Marks the root element of `html` as a component and appends the client
/// scripts inside it, right before its end tag.
pub(crate) fn decorate(html: &str, decoration: &Decoration<'_>) -> Result<String, HtmlError> {
    let tokens = tokenize(html)?;
    let root = root_element(&tokens)?;
    let start = &tokens[root.start];
    let TokenKind::StartTag { name, attributes, .. } = &start.kind else {
        return Err(HtmlError::NoRoot);
    };
    if is_void_element(name) {
        return Err(HtmlError::VoidRoot { name: name.clone() });
    }

    let id = decoration.id.to_string();
    let mut root_attributes = vec![
        Attribute::new("id", Some(id.clone())),
        Attribute::new("key", Some(id)),
        Attribute::new("tether-name", Some(decoration.name.to_string())),
        Attribute::new("tether", None),
    ];
    root_attributes.extend(
        attributes
            .iter()
            .filter(|attribute| !RESERVED_ATTRIBUTES.contains(&attribute.name.as_str()))
            .cloned(),
    );

    let mut out = String::with_capacity(html.len() + 256);
    out.push_str(&html[..start.span.start]);
    write_start_tag(&mut out, name, &root_attributes, false);
    match root.end {
        Some(end) => {
            let end = &tokens[end];
            out.push_str(&html[start.span.end..end.span.start]);
            write_scripts(&mut out, decoration);
            out.push_str(&html[end.span.start..]);
        }
        None => {
            write_scripts(&mut out, decoration);
            out.push_str("</");
            out.push_str(name);
            out.push('>');
            out.push_str(&html[start.span.end..]);
        }
    }
    Ok(out)
}

fn write_scripts(out: &mut String, decoration: &Decoration<'_>) {
    for (action, interval) in &decoration.polls {
        out.push_str(&format!(
            "<script type=\"text/tether\" tether-poll=\"{}\" tether-action=\"{}\"></script>",
            interval.as_millis(),
            escape_attribute(action)
        ));
    }
    out.push_str(&format!(
        "<script type=\"text/tether\" data-id=\"{}\">{}</script>",
        decoration.id, decoration.token
    ));
    for subscription in &decoration.subscriptions {
        // serializing a struct of strings can't fail
        let json = serde_json::to_string(subscription).unwrap_or_default();
        out.push_str(&format!(
            "<script type=\"text/tether\" tether-event=\"{}\"></script>",
            escape_attribute(&json)
        ));
    }
    for script in decoration.scripts {
        out.push_str("<script type=\"text/tether\" tether-js>");
        out.push_str(&script.replace("</", "<\\/"));
        out.push_str("</script>");
    }
}
