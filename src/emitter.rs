//! Tree-to-XML emitter (the unparse direction)
//!
//! [`TreeEmitter`] walks a [`Value`] tree and writes markup through
//! [`XmlWriter`], inverting the builder's conventions: `@`-marked
//! keys become attributes, the text key becomes character data, lists
//! become repeated sibling elements.

use std::slice;

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{Error, ErrorKind, Pos, Result};
use crate::namespace::fold_emit;
use crate::value::{Node, Value};
use crate::writer::XmlWriter;

/// Configuration for one unparse call
#[derive(Clone, Debug)]
pub struct EmitOptions {
    /// Marker identifying attribute keys
    pub attr_prefix: String,
    /// Key holding character data
    pub text_key: String,
    /// Indent children and break lines between elements
    pub pretty: bool,
    /// Line terminator used in pretty mode
    pub newline: String,
    /// One level of indentation in pretty mode
    pub indent: String,
    /// Separator between namespace and local name
    pub namespace_separator: String,
    /// Namespace-URI to alias mapping applied to every emitted name
    pub namespaces: Option<IndexMap<String, String>>,
    /// Emit an XML declaration and require exactly one root element
    pub full_document: bool,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            attr_prefix: "@".to_string(),
            text_key: "#text".to_string(),
            pretty: false,
            newline: "\n".to_string(),
            indent: "\t".to_string(),
            namespace_separator: ":".to_string(),
            namespaces: None,
            full_document: true,
        }
    }
}

/// Preprocessor hook: may rename, rewrite, or drop (`None`) each
/// (key, value) entry before it is emitted
pub type Preprocessor<'h> = Box<dyn FnMut(&str, &Value) -> Option<(String, Value)> + 'h>;

/// XML serializer for document trees
pub struct TreeEmitter<'h> {
    options: EmitOptions,
    preprocessor: Option<Preprocessor<'h>>,
}

impl<'h> TreeEmitter<'h> {
    /// Create an emitter with the given options
    pub fn new(options: EmitOptions) -> Self {
        Self {
            options,
            preprocessor: None,
        }
    }

    /// Install a preprocessor hook
    pub fn with_preprocessor<F>(mut self, f: F) -> Self
    where
        F: FnMut(&str, &Value) -> Option<(String, Value)> + 'h,
    {
        self.preprocessor = Some(Box::new(f));
        self
    }

    /// Serialize a tree to an XML string
    ///
    /// The root must be a node; in full-document mode it must hold
    /// exactly one entry.
    pub fn unparse(&mut self, tree: &Value) -> Result<String> {
        let mut out = String::new();
        self.unparse_into(tree, &mut out)?;
        Ok(out)
    }

    /// Serialize a tree, appending to an existing buffer
    pub fn unparse_into(&mut self, tree: &Value, out: &mut String) -> Result<()> {
        let root = tree.as_node().ok_or_else(|| {
            Error::with_message(
                ErrorKind::Structure,
                Pos::default(),
                "document root must be a node",
            )
        })?;
        if self.options.full_document && root.len() != 1 {
            return Err(Error::with_message(
                ErrorKind::MultipleRoots,
                Pos::default(),
                format!("document must have exactly one root, found {}", root.len()),
            ));
        }
        debug!(entries = root.len(), "serializing tree");
        let mut writer = XmlWriter::new(out);
        if self.options.full_document {
            writer.start_document();
        }
        for (key, value) in root.iter() {
            self.emit(key, value, 0, &mut writer)?;
        }
        Ok(())
    }

    fn fold_name(&self, name: &str, is_attribute: bool) -> String {
        fold_emit(
            name,
            self.options.namespaces.as_ref(),
            &self.options.namespace_separator,
            if is_attribute {
                self.options.attr_prefix.as_str()
            } else {
                ""
            },
        )
    }

    fn emit(
        &mut self,
        key: &str,
        value: &Value,
        depth: usize,
        writer: &mut XmlWriter<'_>,
    ) -> Result<()> {
        let folded = self.fold_name(key, false);
        let replacement = match &mut self.preprocessor {
            Some(pp) => match pp(&folded, value) {
                Some(entry) => Some(entry),
                None => return Ok(()),
            },
            None => None,
        };
        let (key, value) = match &replacement {
            Some((key, value)) => (key.as_str(), value),
            None => (folded.as_str(), value),
        };
        let items = match value {
            Value::List(items) => items.as_slice(),
            single => slice::from_ref(single),
        };
        for (index, item) in items.iter().enumerate() {
            if self.options.full_document && depth == 0 && index > 0 {
                return Err(Error::with_message(
                    ErrorKind::MultipleRoots,
                    Pos::default(),
                    "list at document root",
                ));
            }
            self.emit_item(key, item, depth, writer)?;
        }
        Ok(())
    }

    fn emit_item(
        &mut self,
        key: &str,
        value: &Value,
        depth: usize,
        writer: &mut XmlWriter<'_>,
    ) -> Result<()> {
        let text_node;
        let node = match value {
            // Nested lists flatten into one run of siblings
            Value::List(items) => {
                for item in items {
                    self.emit_item(key, item, depth, writer)?;
                }
                return Ok(());
            }
            Value::Node(node) => node,
            Value::Null => {
                text_node = Node::new();
                &text_node
            }
            Value::Text(s) => {
                text_node = [(self.options.text_key.clone(), Value::Text(s.clone()))]
                    .into_iter()
                    .collect();
                &text_node
            }
        };
        let mut attrs: Vec<(String, String)> = Vec::new();
        let mut children: Vec<(&String, &Value)> = Vec::new();
        let mut cdata: Option<&str> = None;
        for (child_key, child_value) in node.iter() {
            if child_key == &self.options.text_key {
                cdata = match child_value {
                    Value::Text(s) => Some(s),
                    Value::Null => None,
                    _ => {
                        return Err(Error::with_message(
                            ErrorKind::Structure,
                            Pos::default(),
                            format!("text entry of <{key}> must be a string"),
                        ))
                    }
                };
            } else if let Some(attr_key) = child_key.strip_prefix(&self.options.attr_prefix) {
                let folded = self.fold_name(child_key, true);
                let folded_attr = folded
                    .strip_prefix(&self.options.attr_prefix)
                    .unwrap_or(&folded);
                if attr_key == "xmlns" {
                    if let Value::Node(declarations) = child_value {
                        for (prefix, uri) in declarations.iter() {
                            let uri = match uri {
                                Value::Text(s) => s.clone(),
                                _ => {
                                    return Err(Error::with_message(
                                        ErrorKind::Structure,
                                        Pos::default(),
                                        "namespace declaration must be a string",
                                    ))
                                }
                            };
                            let attr_name = if prefix.is_empty() {
                                "xmlns".to_string()
                            } else {
                                format!("xmlns:{prefix}")
                            };
                            attrs.push((attr_name, uri));
                        }
                        continue;
                    }
                }
                let rendered = match child_value {
                    Value::Text(s) => s.clone(),
                    Value::Null => String::new(),
                    _ => {
                        return Err(Error::with_message(
                            ErrorKind::Structure,
                            Pos::default(),
                            format!("attribute {folded_attr} of <{key}> must be a string"),
                        ))
                    }
                };
                attrs.push((folded_attr.to_string(), rendered));
            } else {
                children.push((child_key, child_value));
            }
        }
        if self.options.pretty {
            for _ in 0..depth {
                writer.whitespace(&self.options.indent);
            }
        }
        writer.start_element(key, &attrs);
        let has_children = !children.is_empty();
        if self.options.pretty && has_children {
            writer.whitespace(&self.options.newline);
        }
        for (child_key, child_value) in children {
            self.emit(child_key, child_value, depth + 1, writer)?;
        }
        if let Some(text) = cdata {
            writer.characters(text);
        }
        if self.options.pretty && has_children {
            for _ in 0..depth {
                writer.whitespace(&self.options.indent);
            }
        }
        writer.end_element(key);
        if self.options.pretty && depth > 0 {
            writer.whitespace(&self.options.newline);
        }
        Ok(())
    }
}
