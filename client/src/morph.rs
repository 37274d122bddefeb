use std::collections::HashSet;

use log::trace;

use crate::dom::{Document, NodeId, NodeKind};

/// Whether the morph may touch a live node
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Update {
    Patch,
    /// Leave the live node and everything under it as it is
    Skip,
}

/// Callback asked before each live node is patched or replaced. It gets the
/// live node and the incoming node it is about to become, and may adjust the
/// incoming node first.
pub type Updating<'u> = dyn FnMut(&Document, NodeId, &mut Document, NodeId) -> Update + 'u;

/// Merges freshly rendered markup into the live document
pub trait Morph {
    /// Makes the subtree at `target` in `live` look like `source` in
    /// `incoming`
    fn morph(
        &mut self,
        live: &mut Document,
        target: NodeId,
        incoming: &mut Document,
        source: NodeId,
        updating: &mut Updating<'_>,
    );
}

/// Pairs children by key, then by position. Nodes that don't match in kind,
/// tag or key are replaced rather than patched.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeyedMorph;

impl Morph for KeyedMorph {
    fn morph(
        &mut self,
        live: &mut Document,
        target: NodeId,
        incoming: &mut Document,
        source: NodeId,
        updating: &mut Updating<'_>,
    ) {
        morph_node(live, target, incoming, source, updating);
    }
}

fn morph_node(
    live: &mut Document,
    from: NodeId,
    incoming: &mut Document,
    to: NodeId,
    updating: &mut Updating<'_>,
) -> NodeId {
    if updating(live, from, incoming, to) == Update::Skip {
        trace!("Morph skipped node {from:?}");
        return from;
    }
    if !same_node(live, from, incoming, to) {
        let replacement = live.import(incoming, to);
        live.replace(from, replacement);
        return replacement;
    }

    match incoming.kind(to) {
        NodeKind::Text(text) | NodeKind::Comment(text) => {
            let text = text.clone();
            live.set_text(from, &text);
        }
        NodeKind::Element { attributes, .. } => {
            live.replace_attributes(from, attributes.clone());
            if live.is_form_control(from) {
                live.reset_control(from);
            }
            morph_children(live, from, incoming, to, updating);
        }
        NodeKind::Root => morph_children(live, from, incoming, to, updating),
    }
    from
}

/// Keyed children find their live counterpart wherever it sits among the
/// siblings. The rest pair up in order with live children whose key no
/// incoming sibling wants.
fn morph_children(
    live: &mut Document,
    from: NodeId,
    incoming: &mut Document,
    to: NodeId,
    updating: &mut Updating<'_>,
) {
    let incoming_children = incoming.children(to).to_vec();
    let mut unmatched = live.children(from).to_vec();
    let wanted: HashSet<String> = incoming_children
        .iter()
        .filter_map(|child| key(incoming, *child).map(str::to_string))
        .collect();

    for (index, incoming_child) in incoming_children.iter().enumerate() {
        let partner = key(incoming, *incoming_child)
            .and_then(|key_of_child| {
                unmatched
                    .iter()
                    .position(|live_child| key(live, *live_child) == Some(key_of_child))
            })
            .or_else(|| {
                unmatched.iter().position(|live_child| {
                    key(live, *live_child).map_or(true, |taken| !wanted.contains(taken))
                })
            });

        let node = match partner {
            Some(position) => {
                let live_child = unmatched.remove(position);
                morph_node(live, live_child, incoming, *incoming_child, updating)
            }
            None => live.import(incoming, *incoming_child),
        };
        if live.children(from).get(index) != Some(&node) {
            live.move_child(from, index, node);
        }
    }
    for extra in unmatched {
        live.detach(extra);
    }
}

fn same_node(live: &Document, from: NodeId, incoming: &Document, to: NodeId) -> bool {
    match (live.kind(from), incoming.kind(to)) {
        (NodeKind::Element { name: a, .. }, NodeKind::Element { name: b, .. }) => {
            a == b && key(live, from) == key(incoming, to)
        }
        (NodeKind::Text(_), NodeKind::Text(_))
        | (NodeKind::Comment(_), NodeKind::Comment(_))
        | (NodeKind::Root, NodeKind::Root) => true,
        _ => false,
    }
}

fn key(document: &Document, node: NodeId) -> Option<&str> {
    document
        .attribute(node, "key")
        .or_else(|| document.attribute(node, "id"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn morph(live_html: &str, incoming_html: &str) -> Document {
        morph_with(live_html, incoming_html, &mut |_, _, _, _| Update::Patch)
    }

    fn morph_with(live_html: &str, incoming_html: &str, updating: &mut Updating<'_>) -> Document {
        let mut live = Document::parse(live_html).unwrap();
        let mut incoming = Document::parse(incoming_html).unwrap();
        let target = live.first_element().unwrap();
        let source = incoming.first_element().unwrap();
        KeyedMorph.morph(&mut live, target, &mut incoming, source, updating);
        live
    }

    #[test]
    fn patches_text_and_attributes() {
        let live = morph(
            "<div id=\"a\"><span class=\"x\">1</span><b>gone</b></div>",
            "<div id=\"a\" title=\"t\"><span>2</span></div>",
        );
        assert_eq!(
            live.outer_html(live.root()),
            "<div id=\"a\" title=\"t\"><span>2</span></div>"
        );
    }

    #[test]
    fn mismatched_keys_are_replaced() {
        let mut live = Document::parse("<ul><li key=\"1\">one</li></ul>").unwrap();
        let old_item = live.elements_with_attribute(live.root(), "key")[0];
        let mut incoming = Document::parse("<ul><li key=\"2\">two</li><li>new</li></ul>").unwrap();
        let target = live.first_element().unwrap();
        let source = incoming.first_element().unwrap();
        KeyedMorph.morph(&mut live, target, &mut incoming, source, &mut |_, _, _, _| {
            Update::Patch
        });
        assert!(!live.is_attached(old_item));
        assert_eq!(
            live.outer_html(live.root()),
            "<ul><li key=\"2\">two</li><li>new</li></ul>"
        );
    }

    #[test]
    fn keyed_children_follow_a_shifted_sibling() {
        let mut live =
            Document::parse("<div><input name=\"a\"><section key=\"k\"><i>kept</i></section></div>")
                .unwrap();
        let section = live.elements_with_attribute(live.root(), "key")[0];
        let mut incoming = Document::parse(
            "<div><input name=\"a\"><p>new</p><section key=\"k\"><i>kept</i></section></div>",
        )
        .unwrap();
        let target = live.first_element().unwrap();
        let source = incoming.first_element().unwrap();
        KeyedMorph.morph(&mut live, target, &mut incoming, source, &mut |_, _, _, _| {
            Update::Patch
        });
        assert!(live.is_attached(section));
        assert_eq!(live.children(target)[2], section);
        assert_eq!(
            live.outer_html(live.root()),
            "<div><input name=\"a\"><p>new</p><section key=\"k\"><i>kept</i></section></div>"
        );
    }

    #[test]
    fn moved_subtree_keeps_focus() {
        let mut live = Document::parse(
            "<div><b key=\"x\">x</b><form key=\"f\"><input name=\"a\"></form></div>",
        )
        .unwrap();
        let input = live.elements_with_attribute(live.root(), "name")[0];
        live.focus(input);
        let mut incoming = Document::parse(
            "<div><form key=\"f\"><input name=\"a\"></form><b key=\"x\">x</b></div>",
        )
        .unwrap();
        let target = live.first_element().unwrap();
        let source = incoming.first_element().unwrap();
        KeyedMorph.morph(&mut live, target, &mut incoming, source, &mut |_, _, _, _| {
            Update::Patch
        });
        assert_eq!(live.focused(), Some(input));
        assert_eq!(
            live.outer_html(live.root()),
            "<div><form key=\"f\"><input name=\"a\"></form><b key=\"x\">x</b></div>"
        );
    }

    #[test]
    fn skipped_nodes_are_left_alone() {
        let live = morph_with(
            "<div><input name=\"a\" value=\"old\"><input name=\"b\" value=\"old\"></div>",
            "<div><input name=\"a\" value=\"new\"><input name=\"b\" value=\"new\"></div>",
            &mut |live, from, _, _| {
                if live.attribute(from, "name") == Some("a") {
                    Update::Skip
                } else {
                    Update::Patch
                }
            },
        );
        assert_eq!(
            live.outer_html(live.root()),
            "<div><input name=\"a\" value=\"old\"><input name=\"b\" value=\"new\"></div>"
        );
    }

    #[test]
    fn patched_controls_drop_live_edits() {
        let mut live = Document::parse("<div><input name=\"a\" value=\"x\"></div>").unwrap();
        let input = live.elements_with_attribute(live.root(), "name")[0];
        live.set_value(input, "typed");
        let mut incoming = Document::parse("<div><input name=\"a\" value=\"saved\"></div>").unwrap();
        let target = live.first_element().unwrap();
        let source = incoming.first_element().unwrap();
        KeyedMorph.morph(&mut live, target, &mut incoming, source, &mut |_, _, _, _| {
            Update::Patch
        });
        assert_eq!(live.value(input), "saved");
    }
}
