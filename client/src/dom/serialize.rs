use tether_shared::html::{escape_text, is_void_element, write_start_tag};

use super::{Document, NodeId, NodeKind};

const RAW_TEXT_ELEMENTS: [&str; 2] = ["script", "style"];

impl Document {
    /// Markup of `node` and everything under it, as the markup was written.
    /// Live form state isn't serialized.
    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_node(&mut out, node);
        out
    }

    pub fn inner_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(node) {
            self.write_node(&mut out, *child);
        }
        out
    }

    fn write_node(&self, out: &mut String, node: NodeId) {
        match self.kind(node) {
            NodeKind::Root => {
                for child in self.children(node) {
                    self.write_node(out, *child);
                }
            }
            NodeKind::Element { name, attributes } => {
                write_start_tag(out, name, attributes, false);
                if is_void_element(name) {
                    return;
                }
                for child in self.children(node) {
                    self.write_node(out, *child);
                }
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
            NodeKind::Text(text) => {
                let raw = self
                    .parent(node)
                    .and_then(|parent| self.name(parent))
                    .is_some_and(|parent| RAW_TEXT_ELEMENTS.contains(&parent));
                if raw {
                    out.push_str(text);
                } else {
                    out.push_str(&escape_text(text));
                }
            }
            NodeKind::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::dom::Document;

    #[test]
    fn markup_is_written_back() {
        let html = "<div id=\"a\" tether><p>1 &lt; 2</p><br><script type=\"text/tether\">if (a < b) {}</script><!-- c --></div>";
        let document = Document::parse(html).unwrap();
        assert_eq!(document.outer_html(document.root()), html);
        let div = document.element_by_id("a").unwrap();
        assert!(document.inner_html(div).starts_with("<p>1 &lt; 2</p><br>"));
    }
}
