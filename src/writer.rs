//! XML text writer
//!
//! Turns start-tag / character-data / end-tag calls into escaped XML
//! text. The emitter never writes markup directly; all byte-level
//! concerns (escaping, the XML declaration) live here.

/// Writer appending XML text to a string buffer
#[derive(Debug)]
pub struct XmlWriter<'a> {
    out: &'a mut String,
}

impl<'a> XmlWriter<'a> {
    pub fn new(out: &'a mut String) -> Self {
        Self { out }
    }

    /// Write the XML declaration
    pub fn start_document(&mut self) {
        self.out
            .push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    }

    /// Write a start tag with its attributes, in order
    pub fn start_element(&mut self, name: &str, attrs: &[(String, String)]) {
        self.out.push('<');
        self.out.push_str(name);
        for (key, value) in attrs {
            self.out.push(' ');
            self.out.push_str(key);
            self.out.push_str("=\"");
            escape_attribute(value, self.out);
            self.out.push('"');
        }
        self.out.push('>');
    }

    /// Write an end tag
    pub fn end_element(&mut self, name: &str) {
        self.out.push_str("</");
        self.out.push_str(name);
        self.out.push('>');
    }

    /// Write escaped character data
    pub fn characters(&mut self, text: &str) {
        escape_text(text, self.out);
    }

    /// Write pretty-printing whitespace verbatim
    pub fn whitespace(&mut self, text: &str) {
        self.out.push_str(text);
    }
}

fn escape_text(input: &str, out: &mut String) {
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

fn escape_attribute(input: &str, out: &mut String) {
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}
