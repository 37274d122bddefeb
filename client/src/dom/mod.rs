//! A small arena-backed document model, enough to host server-rendered
//! components without a browser

mod form;
mod serialize;

use tether_shared::html::{is_void_element, tokenize, Attribute, HtmlError, TokenKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// The document itself, or the container of a parsed fragment
    Root,
    Element {
        name: String,
        attributes: Vec<Attribute>,
    },
    Text(String),
    Comment(String),
}

#[derive(Clone, Debug)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// Value typed into a form control, `None` while it shows its default
    live_value: Option<String>,
    /// Checkedness toggled by the user, `None` while it shows its default
    live_checked: Option<bool>,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            live_value: None,
            live_checked: None,
        }
    }
}

/// A document tree. Nodes are never freed: detached nodes stay in the arena
/// so that ids held by the engine never dangle.
#[derive(Clone, Debug)]
pub struct Document {
    nodes: Vec<Node>,
    focused: Option<NodeId>,
    title: Option<String>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new(NodeKind::Root)],
            focused: None,
            title: None,
        }
    }

    /// Parses a full page or a fragment. The title is taken from the first
    /// `<title>` element, if any.
    pub fn parse(html: &str) -> Result<Self, HtmlError> {
        let mut document = Self::new();
        let root = document.root();
        document.append_html(root, html)?;
        document.title = document
            .descendants(root)
            .into_iter()
            .find(|node| document.name(*node) == Some("title"))
            .map(|title| document.text_content(title));
        Ok(document)
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// The first element under the root, which is the component root of a
    /// parsed component fragment
    pub fn first_element(&self) -> Option<NodeId> {
        self.children(self.root())
            .iter()
            .copied()
            .find(|child| self.is_element(*child))
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn set_title(&mut self, title: Option<String>) {
        self.title = title;
    }

    // Parsing

    /// Parses `html` and appends the resulting nodes to `parent`
    pub fn append_html(&mut self, parent: NodeId, html: &str) -> Result<Vec<NodeId>, HtmlError> {
        let first_new = self.children(parent).len();
        let mut stack = vec![parent];
        for token in tokenize(html)? {
            let current = stack.last().copied().unwrap_or(parent);
            match token.kind {
                TokenKind::StartTag {
                    name,
                    attributes,
                    self_closing,
                } => {
                    let leaf = self_closing || is_void_element(&name);
                    let node = self.create(NodeKind::Element { name, attributes });
                    self.append_child(current, node);
                    if !leaf {
                        stack.push(node);
                    }
                }
                TokenKind::EndTag { name } => {
                    // close the innermost open element with this name, a
                    // stray end tag is ignored
                    if let Some(index) = stack
                        .iter()
                        .rposition(|open| self.name(*open) == Some(name.as_str()))
                    {
                        if index > 0 {
                            stack.truncate(index);
                        }
                    }
                }
                TokenKind::Text(text) => {
                    let node = self.create(NodeKind::Text(text));
                    self.append_child(current, node);
                }
                TokenKind::Comment(text) => {
                    let node = self.create(NodeKind::Comment(text));
                    self.append_child(current, node);
                }
                TokenKind::Doctype(_) => {}
            }
        }
        Ok(self.children(parent)[first_new..].to_vec())
    }

    // Nodes

    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.create(NodeKind::Element {
            name: name.to_ascii_lowercase(),
            attributes: Vec::new(),
        })
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.create(NodeKind::Text(text.to_string()))
    }

    fn create(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(Node::new(kind));
        NodeId(self.nodes.len() - 1)
    }

    pub fn kind(&self, node: NodeId) -> &NodeKind {
        &self.nodes[node.0].kind
    }

    pub fn is_element(&self, node: NodeId) -> bool {
        matches!(self.kind(node), NodeKind::Element { .. })
    }

    /// Tag name of an element
    pub fn name(&self, node: NodeId) -> Option<&str> {
        match self.kind(node) {
            NodeKind::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Contents of a text or comment node
    pub fn text(&self, node: NodeId) -> Option<&str> {
        match self.kind(node) {
            NodeKind::Text(text) | NodeKind::Comment(text) => Some(text),
            _ => None,
        }
    }

    pub fn set_text(&mut self, node: NodeId, text: &str) {
        if let NodeKind::Text(current) | NodeKind::Comment(current) = &mut self.nodes[node.0].kind
        {
            if current != text {
                *current = text.to_string();
            }
        }
    }

    /// Concatenated text of all text nodes under `node`
    pub fn text_content(&self, node: NodeId) -> String {
        if let NodeKind::Text(text) = self.kind(node) {
            return text.clone();
        }
        let mut out = String::new();
        for descendant in self.descendants(node) {
            if let NodeKind::Text(text) = self.kind(descendant) {
                out.push_str(text);
            }
        }
        out
    }

    // Attributes

    pub fn attributes(&self, node: NodeId) -> &[Attribute] {
        match self.kind(node) {
            NodeKind::Element { attributes, .. } => attributes,
            _ => &[],
        }
    }

    /// Value of an attribute, `Some("")` for a bare one
    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.attributes(node)
            .iter()
            .find(|attribute| attribute.name == name)
            .map(|attribute| attribute.value.as_deref().unwrap_or_default())
    }

    pub fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.attributes(node)
            .iter()
            .any(|attribute| attribute.name == name)
    }

    /// Sets an attribute, `None` writes it bare
    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: Option<&str>) {
        if let NodeKind::Element { attributes, .. } = &mut self.nodes[node.0].kind {
            let value = value.map(str::to_string);
            match attributes.iter_mut().find(|attribute| attribute.name == name) {
                Some(attribute) => attribute.value = value,
                None => attributes.push(Attribute::new(name, value)),
            }
        }
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) {
        if let NodeKind::Element { attributes, .. } = &mut self.nodes[node.0].kind {
            attributes.retain(|attribute| attribute.name != name);
        }
    }

    pub fn replace_attributes(&mut self, node: NodeId, replacement: Vec<Attribute>) {
        if let NodeKind::Element { attributes, .. } = &mut self.nodes[node.0].kind {
            *attributes = replacement;
        }
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.attribute(node, "class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    pub fn add_class(&mut self, node: NodeId, class: &str) {
        if self.has_class(node, class) {
            return;
        }
        let classes = match self.attribute(node, "class") {
            Some(classes) if !classes.trim().is_empty() => format!("{} {class}", classes.trim()),
            _ => class.to_string(),
        };
        self.set_attribute(node, "class", Some(&classes));
    }

    pub fn remove_class(&mut self, node: NodeId, class: &str) {
        let Some(classes) = self.attribute(node, "class") else {
            return;
        };
        let remaining: Vec<&str> = classes.split_whitespace().filter(|c| *c != class).collect();
        if remaining.is_empty() {
            self.remove_attribute(node, "class");
        } else {
            let remaining = remaining.join(" ");
            self.set_attribute(node, "class", Some(&remaining));
        }
    }

    // Tree

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    /// Whether `node` is part of the document rather than detached
    pub fn is_attached(&self, node: NodeId) -> bool {
        let mut current = node;
        loop {
            if current == self.root() {
                return true;
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Every node under `node` in document order, `node` excluded
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev());
        }
        out
    }

    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .find(|node| self.attribute(*node, "id") == Some(id))
    }

    /// Elements under `scope` carrying attribute `name`, in document order
    pub fn elements_with_attribute(&self, scope: NodeId, name: &str) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|node| self.has_attribute(*node, name))
            .collect()
    }

    /// `node` itself or its nearest ancestor matching `predicate`
    pub fn closest<P: Fn(&Document, NodeId) -> bool>(
        &self,
        node: NodeId,
        predicate: P,
    ) -> Option<NodeId> {
        let mut current = Some(node);
        while let Some(candidate) = current {
            if predicate(self, candidate) {
                return Some(candidate);
            }
            current = self.parent(candidate);
        }
        None
    }

    pub fn closest_with_attribute(&self, node: NodeId, name: &str) -> Option<NodeId> {
        self.closest(node, |document, candidate| {
            document.has_attribute(candidate, name)
        })
    }

    /// Finds an element by `#id` or by tag name
    pub fn select(&self, selector: &str) -> Option<NodeId> {
        let selector = selector.trim();
        if let Some(id) = selector.strip_prefix('#') {
            return self.element_by_id(id);
        }
        let name = selector.to_ascii_lowercase();
        self.descendants(self.root())
            .into_iter()
            .find(|node| self.name(*node) == Some(name.as_str()))
    }

    // Mutation

    /// Appends `child` to `parent`, detaching it from wherever it was
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Inserts `child` at `index` among `parent`'s children, or appends it
    /// when `index` is past the end
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        let children = &mut self.nodes[parent.0].children;
        let index = index.min(children.len());
        children.insert(index, child);
    }

    /// Puts `child` at `index` among `parent`'s children. Unlike
    /// [`Document::insert_child`] this keeps focus inside the moved subtree.
    pub fn move_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        if let Some(old_parent) = self.nodes[child.0].parent.take() {
            self.nodes[old_parent.0].children.retain(|sibling| *sibling != child);
        }
        self.nodes[child.0].parent = Some(parent);
        let children = &mut self.nodes[parent.0].children;
        let index = index.min(children.len());
        children.insert(index, child);
    }

    pub fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|child| *child != node);
        }
        if let Some(focused) = self.focused {
            if focused == node || !self.is_attached(focused) {
                self.focused = None;
            }
        }
    }

    /// Puts `replacement` where `node` is
    pub fn replace(&mut self, node: NodeId, replacement: NodeId) {
        let Some(parent) = self.parent(node) else {
            return;
        };
        let index = self
            .children(parent)
            .iter()
            .position(|child| *child == node)
            .unwrap_or(0);
        self.detach(node);
        self.insert_child(parent, index, replacement);
    }

    pub fn clear_children(&mut self, parent: NodeId) {
        for child in self.children(parent).to_vec() {
            self.detach(child);
        }
    }

    /// Deep-copies `node` of `other` into this document, detached. Live form
    /// state isn't copied, imported controls show their defaults.
    pub fn import(&mut self, other: &Document, node: NodeId) -> NodeId {
        let copy = self.create(other.kind(node).clone());
        for child in other.children(node) {
            let child_copy = self.import(other, *child);
            self.append_child(copy, child_copy);
        }
        copy
    }

    // Focus

    pub fn focus(&mut self, node: NodeId) {
        self.focused = Some(node);
    }

    pub fn blur(&mut self) {
        self.focused = None;
    }

    pub fn focused(&self) -> Option<NodeId> {
        self.focused
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_markup() {
        let document =
            Document::parse("<!DOCTYPE html><html><head><title>Hi &amp; bye</title></head><body><div id=\"a\"><br><p>x</p></div></body></html>")
                .unwrap();
        assert_eq!(document.title(), Some("Hi & bye"));
        let div = document.element_by_id("a").unwrap();
        let names: Vec<_> = document
            .children(div)
            .iter()
            .filter_map(|child| document.name(*child))
            .collect();
        assert_eq!(names, vec!["br", "p"]);
        assert_eq!(document.select("body"), document.parent(div));
    }

    #[test]
    fn stray_end_tags_are_ignored() {
        let document = Document::parse("<div id=\"a\"><span>1</b></span></div><p></p>").unwrap();
        let div = document.element_by_id("a").unwrap();
        assert_eq!(document.text_content(div), "1");
        assert_eq!(document.children(document.root()).len(), 2);
    }

    #[test]
    fn classes_are_added_once_and_removed() {
        let mut document = Document::parse("<button class=\"primary\"></button>").unwrap();
        let button = document.first_element().unwrap();
        document.add_class(button, "tether-request");
        document.add_class(button, "tether-request");
        assert_eq!(
            document.attribute(button, "class"),
            Some("primary tether-request")
        );
        document.remove_class(button, "tether-request");
        document.remove_class(button, "primary");
        assert!(!document.has_attribute(button, "class"));
    }

    #[test]
    fn closest_includes_the_node_itself() {
        let document =
            Document::parse("<div id=\"c\" tether><form><input name=\"x\"></form></div>").unwrap();
        let input = document.elements_with_attribute(document.root(), "name")[0];
        let root = document.element_by_id("c").unwrap();
        assert_eq!(document.closest_with_attribute(input, "tether"), Some(root));
        assert_eq!(document.closest_with_attribute(root, "tether"), Some(root));
    }

    #[test]
    fn detached_nodes_leave_the_tree_and_lose_focus() {
        let mut document = Document::parse("<div><input id=\"i\"></div>").unwrap();
        let input = document.element_by_id("i").unwrap();
        document.focus(input);
        document.detach(input);
        assert!(!document.is_attached(input));
        assert_eq!(document.focused(), None);
        assert_eq!(document.element_by_id("i"), None);
    }
}
