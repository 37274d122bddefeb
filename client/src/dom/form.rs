use super::{Document, NodeId};

impl Document {
    /// Inputs, selects and textareas
    pub fn is_form_control(&self, node: NodeId) -> bool {
        matches!(self.name(node), Some("input" | "select" | "textarea"))
    }

    /// Checkbox and radio inputs
    pub fn is_checkable(&self, node: NodeId) -> bool {
        self.name(node) == Some("input")
            && matches!(
                self.attribute(node, "type")
                    .map(str::to_ascii_lowercase)
                    .as_deref(),
                Some("checkbox" | "radio")
            )
    }

    /// Current value of a form control: what the user typed or picked, or
    /// else what the markup says
    pub fn value(&self, node: NodeId) -> String {
        if let Some(value) = &self.nodes[node.0].live_value {
            return value.clone();
        }
        self.default_value(node)
    }

    pub fn set_value(&mut self, node: NodeId, value: &str) {
        self.nodes[node.0].live_value = Some(value.to_string());
    }

    pub fn checked(&self, node: NodeId) -> bool {
        self.nodes[node.0]
            .live_checked
            .unwrap_or_else(|| self.has_attribute(node, "checked"))
    }

    pub fn set_checked(&mut self, node: NodeId, checked: bool) {
        self.nodes[node.0].live_checked = Some(checked);
    }

    /// Whether the control holds edits its markup doesn't reflect yet
    pub fn is_changed(&self, node: NodeId) -> bool {
        if self.is_checkable(node) {
            return self.checked(node) != self.has_attribute(node, "checked");
        }
        self.value(node) != self.default_value(node)
    }

    /// Drops live edits so the control shows its markup again
    pub fn reset_control(&mut self, node: NodeId) {
        let node = &mut self.nodes[node.0];
        node.live_value = None;
        node.live_checked = None;
    }

    fn default_value(&self, node: NodeId) -> String {
        match self.name(node) {
            Some("textarea") => self.text_content(node),
            Some("select") => self.default_option(node).unwrap_or_default(),
            _ => match self.attribute(node, "value") {
                Some(value) => value.to_string(),
                None if self.is_checkable(node) => "on".to_string(),
                None => String::new(),
            },
        }
    }

    fn default_option(&self, select: NodeId) -> Option<String> {
        let options: Vec<NodeId> = self
            .descendants(select)
            .into_iter()
            .filter(|node| self.name(*node) == Some("option"))
            .collect();
        let chosen = options
            .iter()
            .copied()
            .find(|option| self.has_attribute(*option, "selected"))
            .or_else(|| options.first().copied())?;
        Some(match self.attribute(chosen, "value") {
            Some(value) => value.to_string(),
            None => self.text_content(chosen),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::dom::Document;

    #[test]
    fn values_fall_back_to_markup() {
        let mut document = Document::parse(
            "<form><input id=\"t\" value=\"a\"><textarea id=\"x\">long</textarea>\
             <select id=\"s\"><option>one</option><option value=\"2\" selected>two</option></select>\
             <input id=\"c\" type=\"checkbox\" checked></form>",
        )
        .unwrap();
        let text = document.element_by_id("t").unwrap();
        let area = document.element_by_id("x").unwrap();
        let select = document.element_by_id("s").unwrap();
        let check = document.element_by_id("c").unwrap();

        assert_eq!(document.value(text), "a");
        assert_eq!(document.value(area), "long");
        assert_eq!(document.value(select), "2");
        assert!(document.checked(check));
        assert_eq!(document.value(check), "on");

        document.set_value(text, "ab");
        document.set_checked(check, false);
        assert!(document.is_changed(text));
        assert!(document.is_changed(check));
        assert!(!document.is_changed(area));

        document.reset_control(text);
        assert_eq!(document.value(text), "a");
    }
}
