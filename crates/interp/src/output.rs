//! The `OutputBuilder` trait (§4.8.1): a sink for a running transformation's
//! result — plain serialized XML, since that's the only output a debugger
//! backend ever produces. `message` is the hook `xsl:message` writes
//! through, which is also the channel variable captures ride on (§4.4).

pub trait OutputBuilder {
    fn start_element(&mut self, name: &str);
    fn end_element(&mut self, name: &str);
    fn set_attribute(&mut self, name: &str, value: &str);
    fn add_text(&mut self, text: &str);
    fn message(&mut self, text: &str);
}

/// Serializes a transformation straight to an XML string. The default
/// `OutputBuilder` used when a backend has no reason to intercept text.
#[derive(Debug, Default)]
pub struct XmlStringBuilder {
    out: String,
    /// Stack of open element names with whether their start tag still needs
    /// closing (`>` vs being upgraded from a bare open).
    open: Vec<String>,
    pending_open: bool,
    pub messages: Vec<String>,
}

impl XmlStringBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_string(self) -> String {
        self.out
    }

    fn close_pending_open(&mut self) {
        if self.pending_open {
            self.out.push('>');
            self.pending_open = false;
        }
    }

    fn escape_text(text: &str) -> String {
        text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
    }

    fn escape_attr(text: &str) -> String {
        Self::escape_text(text).replace('"', "&quot;")
    }
}

impl OutputBuilder for XmlStringBuilder {
    fn start_element(&mut self, name: &str) {
        self.close_pending_open();
        self.out.push('<');
        self.out.push_str(name);
        self.pending_open = true;
        self.open.push(name.to_string());
    }

    fn end_element(&mut self, name: &str) {
        if self.pending_open {
            self.out.push_str("/>");
            self.pending_open = false;
            self.open.pop();
            return;
        }
        self.out.push_str("</");
        self.out.push_str(name);
        self.out.push('>');
        self.open.pop();
    }

    fn set_attribute(&mut self, name: &str, value: &str) {
        debug_assert!(self.pending_open, "set_attribute called outside an open start tag");
        self.out.push(' ');
        self.out.push_str(name);
        self.out.push_str("=\"");
        self.out.push_str(&Self::escape_attr(value));
        self.out.push('"');
    }

    fn add_text(&mut self, text: &str) {
        self.close_pending_open();
        self.out.push_str(&Self::escape_text(text));
    }

    fn message(&mut self, text: &str) {
        self.messages.push(text.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_nested_elements_with_attributes_and_text() {
        let mut b = XmlStringBuilder::new();
        b.start_element("out");
        b.set_attribute("id", "1");
        b.add_text("hi");
        b.end_element("out");
        assert_eq!(b.into_string(), r#"<out id="1">hi</out>"#);
    }

    #[test]
    fn empty_element_self_closes() {
        let mut b = XmlStringBuilder::new();
        b.start_element("br");
        b.end_element("br");
        assert_eq!(b.into_string(), "<br/>");
    }

    #[test]
    fn messages_are_collected_separately_from_output() {
        let mut b = XmlStringBuilder::new();
        b.message("[DBG] var x 1");
        assert!(b.into_string().is_empty());
    }
}
