//! Event-driven document-tree builder (the parse direction)
//!
//! [`TreeBuilder`] consumes the push lexer's callbacks and folds them
//! into a [`Value`] tree: attributes become `@`-prefixed keys,
//! character data becomes the text key, repeated sibling tags become
//! lists. With `item_depth > 0` it instead invokes an item callback
//! for every subtree at that depth and discards it, so arbitrarily
//! large documents parse in memory proportional to depth, not size.

use std::collections::HashSet;
use std::mem;

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::error::{Error, ErrorKind, Result};
use crate::lexer::{LexerOptions, XmlHandler, XmlLexer};
use crate::namespace::fold_parse;
use crate::value::{Node, Value};

/// One open ancestor element: its (folded) name and raw attributes
#[derive(Clone, Debug, PartialEq)]
pub struct PathSegment {
    pub name: String,
    /// `None` when the element has no attributes
    pub attrs: Option<Node>,
}

/// Configuration for one parse call
#[derive(Clone, Debug)]
pub struct ParseOptions {
    /// Depth at which the item callback fires, counting the root's
    /// children as depth 1. `0` selects whole-document mode.
    pub item_depth: usize,
    /// Collect attributes as `attr_prefix`-marked keys; when false
    /// attributes are discarded entirely
    pub include_attributes: bool,
    /// Marker distinguishing attribute keys from child elements
    pub attr_prefix: String,
    /// Key holding an element's character data
    pub text_key: String,
    /// Always materialize a containing node for text content, even
    /// for elements with no attributes or children
    pub force_text: bool,
    /// Separator joining multiple text fragments of one element
    pub text_separator: String,
    /// Strip surrounding whitespace from text; whitespace-only text
    /// collapses to null
    pub strip_whitespace: bool,
    /// Resolve namespaces in the lexer and fold resolved names
    /// through `namespaces`
    pub process_namespaces: bool,
    /// Separator between namespace and local name
    pub namespace_separator: String,
    /// Namespace-URI to alias mapping; an empty alias drops the
    /// prefix
    pub namespaces: Option<IndexMap<String, String>>,
    /// Permit a DOCTYPE declaration (a trust decision; see
    /// [`LexerOptions::allow_doctype`])
    pub allow_doctype: bool,
    /// Maximum element nesting depth (0 = unlimited)
    pub max_depth: u16,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            item_depth: 0,
            include_attributes: true,
            attr_prefix: "@".to_string(),
            text_key: "#text".to_string(),
            force_text: false,
            text_separator: String::new(),
            strip_whitespace: true,
            process_namespaces: false,
            namespace_separator: ":".to_string(),
            namespaces: None,
            allow_doctype: false,
            max_depth: 512,
        }
    }
}

/// Postprocessor hook: may rename, rewrite, or drop (`None`) each
/// attribute or child entry before it is attached
pub type Postprocessor<'h> =
    Box<dyn FnMut(&[PathSegment], String, Value) -> Option<(String, Value)> + 'h>;

/// Streaming item callback; returning `false` aborts the parse with
/// [`ErrorKind::ParsingInterrupted`]
pub type ItemCallback<'h> = Box<dyn FnMut(&[PathSegment], &Value) -> bool + 'h>;

/// Force-list policy: keys (or a predicate over path/key/value) whose
/// first occurrence is stored as a one-element list
pub enum ForceList<'h> {
    Keys(HashSet<String>),
    Predicate(Box<dyn Fn(&[PathSegment], &str, &Value) -> bool + 'h>),
}

impl std::fmt::Debug for ForceList<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Keys(keys) => f.debug_tuple("Keys").field(keys).finish(),
            Self::Predicate(_) => f.debug_tuple("Predicate").finish(),
        }
    }
}

/// Document-tree builder
///
/// One instance serves one `parse` call at a time; internal state is
/// reset on entry, so an instance may be reused sequentially but
/// never shared across concurrent parses.
pub struct TreeBuilder<'h> {
    options: ParseOptions,
    postprocessor: Option<Postprocessor<'h>>,
    force_list: Option<ForceList<'h>>,
    item_callback: Option<ItemCallback<'h>>,
    /// Open ancestors, outermost first
    path: Vec<PathSegment>,
    /// Saved (in-progress item, pending text) per open ancestor below
    /// the streaming threshold
    stack: Vec<(Value, Vec<String>)>,
    item: Value,
    data: Vec<String>,
    pending_namespaces: IndexMap<String, String>,
}

impl<'h> TreeBuilder<'h> {
    /// Create a builder with the given options
    pub fn new(options: ParseOptions) -> Self {
        Self {
            options,
            postprocessor: None,
            force_list: None,
            item_callback: None,
            path: Vec::new(),
            stack: Vec::new(),
            item: Value::Null,
            data: Vec::new(),
            pending_namespaces: IndexMap::new(),
        }
    }

    /// Install a postprocessor hook
    pub fn with_postprocessor<F>(mut self, f: F) -> Self
    where
        F: FnMut(&[PathSegment], String, Value) -> Option<(String, Value)> + 'h,
    {
        self.postprocessor = Some(Box::new(f));
        self
    }

    /// Force the named keys to always parse as lists
    pub fn with_force_list_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.force_list = Some(ForceList::Keys(keys.into_iter().map(Into::into).collect()));
        self
    }

    /// Decide force-listing per (path, key, value); the path excludes
    /// the element being attached
    pub fn with_force_list<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&[PathSegment], &str, &Value) -> bool + 'h,
    {
        self.force_list = Some(ForceList::Predicate(Box::new(predicate)));
        self
    }

    /// Install the streaming item callback (used with
    /// `item_depth > 0`)
    pub fn with_item_callback<F>(mut self, f: F) -> Self
    where
        F: FnMut(&[PathSegment], &Value) -> bool + 'h,
    {
        self.item_callback = Some(Box::new(f));
        self
    }

    /// Parse an XML string
    ///
    /// Returns the document tree in whole-document mode, or
    /// `Value::Null` in streaming mode after all item callbacks have
    /// fired.
    pub fn parse(&mut self, xml: &str) -> Result<Value> {
        self.parse_bytes(xml.as_bytes())
    }

    /// Parse XML from bytes (must be UTF-8)
    pub fn parse_bytes(&mut self, input: &[u8]) -> Result<Value> {
        self.reset();
        debug!(
            len = input.len(),
            item_depth = self.options.item_depth,
            "parsing document"
        );
        let lexer = XmlLexer::with_options(
            input,
            LexerOptions {
                process_namespaces: self.options.process_namespaces,
                namespace_separator: self.options.namespace_separator.clone(),
                allow_doctype: self.options.allow_doctype,
                max_depth: self.options.max_depth,
            },
        );
        lexer.run(self)?;
        Ok(mem::take(&mut self.item))
    }

    fn reset(&mut self) {
        self.path.clear();
        self.stack.clear();
        self.item = Value::Null;
        self.data.clear();
        self.pending_namespaces.clear();
    }

    /// Path-length threshold separating streamed subtrees from
    /// discarded ancestors. `item_depth` counts the root's children
    /// as 1, so the streaming unit sits at path length
    /// `item_depth + 1`.
    fn threshold(&self) -> usize {
        if self.options.item_depth == 0 {
            0
        } else {
            self.options.item_depth + 1
        }
    }

    fn fold_name(&self, name: &str) -> String {
        fold_parse(
            name,
            self.options.namespaces.as_ref(),
            &self.options.namespace_separator,
        )
    }

    /// Attach `key` to `item` (creating the node if needed), turning
    /// repeated keys into lists in encounter order. First occurrences
    /// consult the force-list policy; the postprocessor may rewrite
    /// or drop the entry.
    fn push_data(&mut self, item: Value, key: String, value: Value) -> Value {
        let (key, value) = match &mut self.postprocessor {
            Some(pp) => match pp(&self.path, key, value) {
                Some(entry) => entry,
                None => return item,
            },
            None => (key, value),
        };
        let mut node = match item {
            Value::Node(node) => node,
            _ => Node::new(),
        };
        if let Some(existing) = node.get_mut(&key) {
            match existing {
                Value::List(items) => items.push(value),
                _ => {
                    let old = mem::take(existing);
                    *existing = Value::List(vec![old, value]);
                }
            }
        } else {
            let parent_path = self
                .path
                .split_last()
                .map(|(_, rest)| rest)
                .unwrap_or_default();
            if self.should_force_list(parent_path, &key, &value) {
                node.insert(key, Value::List(vec![value]));
            } else {
                node.insert(key, value);
            }
        }
        Value::Node(node)
    }

    fn should_force_list(&self, parent_path: &[PathSegment], key: &str, value: &Value) -> bool {
        match &self.force_list {
            None => false,
            Some(ForceList::Keys(keys)) => keys.contains(key),
            Some(ForceList::Predicate(predicate)) => predicate(parent_path, key, value),
        }
    }
}

impl XmlHandler for TreeBuilder<'_> {
    fn namespace_decl(&mut self, prefix: &str, uri: &str) -> Result<()> {
        self.pending_namespaces
            .insert(prefix.to_string(), uri.to_string());
        Ok(())
    }

    fn start_element(&mut self, name: &str, attrs: Vec<(String, String)>) -> Result<()> {
        let name = self.fold_name(name);
        let mut attr_map: Node = attrs
            .into_iter()
            .map(|(key, value)| (key, Value::Text(value)))
            .collect();
        if !self.pending_namespaces.is_empty() {
            let declarations: Node = mem::take(&mut self.pending_namespaces)
                .into_iter()
                .map(|(prefix, uri)| (prefix, Value::Text(uri)))
                .collect();
            attr_map.insert("xmlns", Value::Node(declarations));
        }
        self.path.push(PathSegment {
            name,
            attrs: if attr_map.is_empty() {
                None
            } else {
                Some(attr_map.clone())
            },
        });
        if self.path.len() > self.threshold() {
            self.stack
                .push((mem::take(&mut self.item), mem::take(&mut self.data)));
            self.item = if self.options.include_attributes {
                let mut built = Node::new();
                for (key, value) in attr_map {
                    let key = format!("{}{}", self.options.attr_prefix, self.fold_name(&key));
                    match &mut self.postprocessor {
                        Some(pp) => {
                            if let Some((key, value)) = pp(&self.path, key, value) {
                                built.insert(key, value);
                            }
                        }
                        None => {
                            built.insert(key, value);
                        }
                    }
                }
                if built.is_empty() {
                    Value::Null
                } else {
                    Value::Node(built)
                }
            } else {
                Value::Null
            };
        }
        Ok(())
    }

    fn characters(&mut self, text: &str) -> Result<()> {
        self.data.push(text.to_string());
        Ok(())
    }

    fn end_element(&mut self, name: &str) -> Result<()> {
        let name = self.fold_name(name);
        if self.options.item_depth > 0 && self.path.len() == self.threshold() {
            let item = if self.item.is_null() {
                if self.data.is_empty() {
                    Value::Null
                } else {
                    Value::Text(self.data.join(&self.options.text_separator))
                }
            } else {
                self.item.clone()
            };
            trace!(name = %name, "streaming item complete");
            let keep_going = match &mut self.item_callback {
                Some(callback) => callback(&self.path, &item),
                None => true,
            };
            if !keep_going {
                return Err(Error::structural(ErrorKind::ParsingInterrupted));
            }
        }
        match self.stack.pop() {
            Some((parent_item, parent_data)) => {
                let mut text = if self.data.is_empty() {
                    None
                } else {
                    Some(self.data.join(&self.options.text_separator))
                };
                let mut child_item = mem::replace(&mut self.item, parent_item);
                self.data = parent_data;
                if self.options.strip_whitespace {
                    if let Some(joined) = text.take() {
                        // An empty fragment stays as-is; stripping
                        // applies only to actual text
                        text = if joined.is_empty() {
                            Some(joined)
                        } else {
                            let trimmed = joined.trim();
                            if trimmed.is_empty() {
                                None
                            } else {
                                Some(trimmed.to_string())
                            }
                        };
                    }
                }
                let has_text = matches!(&text, Some(s) if !s.is_empty());
                if has_text && self.options.force_text && child_item.is_null() {
                    child_item = Value::Node(Node::new());
                }
                if child_item.is_null() {
                    let value = match text {
                        Some(joined) => Value::Text(joined),
                        None => Value::Null,
                    };
                    let parent = mem::take(&mut self.item);
                    self.item = self.push_data(parent, name, value);
                } else {
                    if has_text {
                        if let Some(joined) = text {
                            let text_key = self.options.text_key.clone();
                            child_item = self.push_data(child_item, text_key, Value::Text(joined));
                        }
                    }
                    let parent = mem::take(&mut self.item);
                    self.item = self.push_data(parent, name, child_item);
                }
            }
            None => {
                self.item = Value::Null;
                self.data.clear();
            }
        }
        self.path.pop();
        Ok(())
    }
}
