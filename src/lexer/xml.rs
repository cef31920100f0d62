//! Push XML lexer
//!
//! Tokenizes an XML byte stream and drives an [`XmlHandler`] with
//! start-element, end-element, character-data, and (when namespace
//! processing is enabled) namespace-declaration events, in document
//! order. Comments and processing instructions are skipped; CDATA
//! section content is delivered as plain character data.
//!
//! Nesting is tracked with an explicit open-element stack rather than
//! recursion, so element depth is bounded only by `max_depth`, not by
//! the native call stack.

use crate::error::{Error, ErrorKind, Pos, Result};
use crate::lexer::Cursor;

/// URI implicitly bound to the `xml` prefix
pub const XML_NAMESPACE_URI: &str = "http://www.w3.org/XML/1998/namespace";

/// Callbacks invoked by [`XmlLexer`] as the document is scanned
///
/// `characters` may be invoked multiple times for one logical text
/// run (for example around CDATA sections); consumers must
/// accumulate. Namespace declarations for an element are delivered
/// before its `start_element`.
pub trait XmlHandler {
    fn namespace_decl(&mut self, prefix: &str, uri: &str) -> Result<()>;
    fn start_element(&mut self, name: &str, attrs: Vec<(String, String)>) -> Result<()>;
    fn characters(&mut self, text: &str) -> Result<()>;
    fn end_element(&mut self, name: &str) -> Result<()>;
}

/// Lexer configuration
#[derive(Clone, Debug)]
pub struct LexerOptions {
    /// Resolve namespace prefixes, report names as `uri<sep>local`,
    /// and consume `xmlns` attributes as namespace-declaration events
    pub process_namespaces: bool,
    /// Separator joining namespace URI and local name
    pub namespace_separator: String,
    /// Permit (and skip) a DOCTYPE declaration. Off by default:
    /// rejecting the DTD up front closes the entity-expansion and
    /// external-entity attack surface, so enabling this is a trust
    /// decision the caller makes about the input.
    pub allow_doctype: bool,
    /// Maximum element nesting depth (0 = unlimited)
    pub max_depth: u16,
}

impl Default for LexerOptions {
    fn default() -> Self {
        Self {
            process_namespaces: false,
            namespace_separator: ":".to_string(),
            allow_doctype: false,
            max_depth: 512,
        }
    }
}

#[derive(Debug)]
struct OpenElement {
    /// Name as written in the start tag, for close-tag matching
    raw: String,
    /// Namespace-resolved name reported to the handler
    resolved: String,
    /// Number of namespace bindings in scope outside this element
    binding_mark: usize,
}

/// Push XML lexer over a byte slice
#[derive(Debug)]
pub struct XmlLexer<'a> {
    cursor: Cursor<'a>,
    options: LexerOptions,
    open: Vec<OpenElement>,
    /// In-scope prefix bindings, innermost last
    bindings: Vec<(String, String)>,
}

impl<'a> XmlLexer<'a> {
    /// Create a lexer with default options
    pub fn new(input: &'a [u8]) -> Self {
        Self::with_options(input, LexerOptions::default())
    }

    /// Create a lexer with custom options
    pub fn with_options(input: &'a [u8], options: LexerOptions) -> Self {
        Self {
            cursor: Cursor::new(input),
            options,
            open: Vec::new(),
            bindings: Vec::new(),
        }
    }

    /// Scan the whole document, driving `handler`
    ///
    /// Handler errors abort the scan immediately and are returned
    /// unchanged.
    pub fn run<H: XmlHandler>(mut self, handler: &mut H) -> Result<()> {
        self.skip_prolog()?;
        if self.cursor.is_eof() {
            return Err(Error::new(ErrorKind::NoRootElement, self.cursor.position()));
        }
        self.start_tag(handler)?;
        while !self.open.is_empty() {
            match self.cursor.current() {
                None => {
                    return Err(Error::new(
                        ErrorKind::UnterminatedMarkup,
                        self.cursor.position(),
                    ));
                }
                Some(b'<') => {
                    if self.cursor.starts_with(b"</") {
                        self.end_tag(handler)?;
                    } else if self.cursor.starts_with(b"<!--") {
                        self.skip_comment()?;
                    } else if self.cursor.starts_with(b"<![CDATA[") {
                        self.cdata_section(handler)?;
                    } else if self.cursor.starts_with(b"<?") {
                        self.skip_processing_instruction()?;
                    } else if self.cursor.starts_with(b"<!") {
                        return Err(self.error_here("unexpected markup declaration"));
                    } else {
                        self.start_tag(handler)?;
                    }
                }
                Some(_) => self.text_run(handler)?,
            }
        }
        self.skip_epilog()
    }

    /// Whitespace, comments, processing instructions, and at most the
    /// DOCTYPE before the root element
    fn skip_prolog(&mut self) -> Result<()> {
        loop {
            self.cursor.skip_whitespace();
            if self.cursor.starts_with(b"<?") {
                self.skip_processing_instruction()?;
            } else if self.cursor.starts_with(b"<!--") {
                self.skip_comment()?;
            } else if self.cursor.starts_with(b"<!") {
                self.skip_doctype()?;
            } else if let Some(b) = self.cursor.current() {
                if b != b'<' {
                    return Err(self.error_here("text before document root"));
                }
                return Ok(());
            } else {
                return Ok(());
            }
        }
    }

    /// Only whitespace, comments, and processing instructions may
    /// follow the root element
    fn skip_epilog(&mut self) -> Result<()> {
        loop {
            self.cursor.skip_whitespace();
            if self.cursor.starts_with(b"<!--") {
                self.skip_comment()?;
            } else if self.cursor.starts_with(b"<?") {
                self.skip_processing_instruction()?;
            } else if self.cursor.is_eof() {
                return Ok(());
            } else {
                return Err(Error::new(
                    ErrorKind::TrailingContent,
                    self.cursor.position(),
                ));
            }
        }
    }

    fn start_tag<H: XmlHandler>(&mut self, handler: &mut H) -> Result<()> {
        let tag_pos = self.cursor.position();
        self.cursor.advance(); // '<'
        let raw_name = self.name()?;

        let mut attrs: Vec<(String, String)> = Vec::new();
        loop {
            self.cursor.skip_whitespace();
            match self.cursor.current() {
                Some(b'/' | b'>') => break,
                Some(_) => {}
                None => {
                    return Err(Error::new(ErrorKind::UnterminatedMarkup, tag_pos));
                }
            }
            let attr_name = self.name()?;
            self.cursor.skip_whitespace();
            self.expect(b'=')?;
            self.cursor.skip_whitespace();
            let value = self.attribute_value()?;
            if attrs.iter().any(|(existing, _)| *existing == attr_name) {
                return Err(Error::new(
                    ErrorKind::DuplicateAttribute { name: attr_name },
                    tag_pos,
                ));
            }
            attrs.push((attr_name, value));
        }
        let self_closing = self.cursor.consume(b'/');
        self.expect(b'>')?;

        let max = usize::from(self.options.max_depth);
        if max > 0 && self.open.len() >= max {
            return Err(Error::new(
                ErrorKind::MaxDepthExceeded {
                    max: self.options.max_depth,
                },
                tag_pos,
            ));
        }

        let binding_mark = self.bindings.len();
        let (resolved, attrs) = if self.options.process_namespaces {
            let mut declarations = Vec::new();
            let mut plain = Vec::new();
            for (name, value) in attrs {
                if name == "xmlns" {
                    declarations.push((String::new(), value));
                } else if let Some(prefix) = name.strip_prefix("xmlns:") {
                    declarations.push((prefix.to_string(), value));
                } else {
                    plain.push((name, value));
                }
            }
            for (prefix, uri) in &declarations {
                handler.namespace_decl(prefix, uri)?;
            }
            // Declarations are in scope on the declaring element itself
            self.bindings.extend(declarations);
            let resolved = self.resolve_name(&raw_name, true, tag_pos)?;
            let mut resolved_attrs = Vec::with_capacity(plain.len());
            for (name, value) in plain {
                // Default namespace never applies to attributes
                resolved_attrs.push((self.resolve_name(&name, false, tag_pos)?, value));
            }
            (resolved, resolved_attrs)
        } else {
            (raw_name.clone(), attrs)
        };

        handler.start_element(&resolved, attrs)?;
        if self_closing {
            handler.end_element(&resolved)?;
            self.bindings.truncate(binding_mark);
        } else {
            self.open.push(OpenElement {
                raw: raw_name,
                resolved,
                binding_mark,
            });
        }
        Ok(())
    }

    fn end_tag<H: XmlHandler>(&mut self, handler: &mut H) -> Result<()> {
        let tag_pos = self.cursor.position();
        self.cursor.advance_by(2); // '</'
        let raw_name = self.name()?;
        self.cursor.skip_whitespace();
        self.expect(b'>')?;

        let Some(element) = self.open.pop() else {
            return Err(Error::with_message(
                ErrorKind::InvalidToken,
                tag_pos,
                "unexpected closing tag",
            ));
        };
        if element.raw != raw_name {
            return Err(Error::new(
                ErrorKind::MismatchedTag {
                    expected: element.raw,
                    found: raw_name,
                },
                tag_pos,
            ));
        }
        handler.end_element(&element.resolved)?;
        self.bindings.truncate(element.binding_mark);
        Ok(())
    }

    fn text_run<H: XmlHandler>(&mut self, handler: &mut H) -> Result<()> {
        let text_pos = self.cursor.position();
        let start = self.cursor.pos();
        while let Some(b) = self.cursor.current() {
            if b == b'<' {
                break;
            }
            self.cursor.advance();
        }
        let raw = bytes_to_string(self.cursor.slice_from(start), text_pos)?;
        let decoded = decode_entities(&raw, text_pos)?;
        handler.characters(&decoded)
    }

    fn cdata_section<H: XmlHandler>(&mut self, handler: &mut H) -> Result<()> {
        let section_pos = self.cursor.position();
        self.cursor.advance_by(9); // '<![CDATA['
        let start = self.cursor.pos();
        while !self.cursor.is_eof() {
            if self.cursor.starts_with(b"]]>") {
                let raw = bytes_to_string(self.cursor.slice_from(start), section_pos)?;
                self.cursor.advance_by(3);
                return handler.characters(&raw);
            }
            self.cursor.advance();
        }
        Err(Error::new(ErrorKind::UnterminatedMarkup, section_pos))
    }

    fn skip_comment(&mut self) -> Result<()> {
        let comment_pos = self.cursor.position();
        self.cursor.advance_by(4); // '<!--'
        self.skip_until(b"-->", comment_pos)
    }

    fn skip_processing_instruction(&mut self) -> Result<()> {
        let pi_pos = self.cursor.position();
        self.cursor.advance_by(2); // '<?'
        self.skip_until(b"?>", pi_pos)
    }

    /// Skip a DOCTYPE declaration, including the internal subset.
    /// The DTD itself is never processed.
    fn skip_doctype(&mut self) -> Result<()> {
        let doctype_pos = self.cursor.position();
        if !self.options.allow_doctype {
            return Err(Error::new(ErrorKind::DoctypeDisabled, doctype_pos));
        }
        self.cursor.advance_by(2); // '<!'
        let mut bracket_depth = 0usize;
        while let Some(b) = self.cursor.current() {
            match b {
                b'[' => bracket_depth += 1,
                b']' => bracket_depth = bracket_depth.saturating_sub(1),
                b'>' if bracket_depth == 0 => {
                    self.cursor.advance();
                    return Ok(());
                }
                _ => {}
            }
            self.cursor.advance();
        }
        Err(Error::new(ErrorKind::UnterminatedMarkup, doctype_pos))
    }

    fn skip_until(&mut self, pattern: &[u8], start_pos: Pos) -> Result<()> {
        while !self.cursor.is_eof() {
            if self.cursor.starts_with(pattern) {
                self.cursor.advance_by(pattern.len());
                return Ok(());
            }
            self.cursor.advance();
        }
        Err(Error::new(ErrorKind::UnterminatedMarkup, start_pos))
    }

    fn name(&mut self) -> Result<String> {
        let name_pos = self.cursor.position();
        let start = self.cursor.pos();
        let Some(first) = self.cursor.current() else {
            return Err(self.error_here("expected name"));
        };
        if !is_name_start(first) {
            return Err(Error::new(ErrorKind::InvalidToken, name_pos));
        }
        self.cursor.advance();
        while let Some(b) = self.cursor.current() {
            if is_name_char(b) {
                self.cursor.advance();
            } else {
                break;
            }
        }
        bytes_to_string(self.cursor.slice_from(start), name_pos)
    }

    fn attribute_value(&mut self) -> Result<String> {
        let value_pos = self.cursor.position();
        let quote = match self.cursor.current() {
            Some(q @ (b'"' | b'\'')) => q,
            _ => return Err(self.error_here("expected quoted attribute value")),
        };
        self.cursor.advance();
        let start = self.cursor.pos();
        while let Some(b) = self.cursor.current() {
            if b == quote {
                let raw = bytes_to_string(self.cursor.slice_from(start), value_pos)?;
                self.cursor.advance();
                return decode_entities(&raw, value_pos);
            }
            if b == b'<' {
                return Err(self.error_here("'<' in attribute value"));
            }
            self.cursor.advance();
        }
        Err(Error::new(ErrorKind::UnterminatedMarkup, value_pos))
    }

    /// Rewrite `prefix:local` to `uri<sep>local` using in-scope
    /// bindings. The default namespace applies only when
    /// `apply_default` is set (element names, not attributes).
    fn resolve_name(&self, name: &str, apply_default: bool, pos: Pos) -> Result<String> {
        let sep = &self.options.namespace_separator;
        match name.split_once(':') {
            Some(("xml", local)) => Ok(format!("{XML_NAMESPACE_URI}{sep}{local}")),
            Some((prefix, local)) => {
                let uri = self
                    .bindings
                    .iter()
                    .rev()
                    .find(|(p, _)| p == prefix)
                    .map(|(_, uri)| uri.as_str())
                    .ok_or_else(|| {
                        Error::new(
                            ErrorKind::UnboundPrefix {
                                prefix: prefix.to_string(),
                            },
                            pos,
                        )
                    })?;
                Ok(format!("{uri}{sep}{local}"))
            }
            None if apply_default => {
                let default_uri = self
                    .bindings
                    .iter()
                    .rev()
                    .find(|(p, _)| p.is_empty())
                    .map(|(_, uri)| uri.as_str())
                    .unwrap_or("");
                // xmlns="" un-declares the default namespace
                if default_uri.is_empty() {
                    Ok(name.to_string())
                } else {
                    Ok(format!("{default_uri}{sep}{name}"))
                }
            }
            None => Ok(name.to_string()),
        }
    }

    fn expect(&mut self, expected: u8) -> Result<()> {
        if self.cursor.consume(expected) {
            Ok(())
        } else {
            Err(self.error_here("unexpected token"))
        }
    }

    fn error_here(&self, message: &str) -> Error {
        Error::with_message(ErrorKind::InvalidToken, self.cursor.position(), message)
    }
}

fn bytes_to_string(bytes: &[u8], pos: Pos) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|_| Error::new(ErrorKind::InvalidUtf8, pos))
}

fn is_name_start(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'_' | b':') || b >= 0x80
}

fn is_name_char(b: u8) -> bool {
    is_name_start(b) || matches!(b, b'0'..=b'9' | b'-' | b'.')
}

/// Expand the five predefined entities and numeric character
/// references. Anything else is an error: without DTD processing no
/// other entity can be defined.
fn decode_entities(input: &str, pos: Pos) -> Result<String> {
    if !input.contains('&') {
        return Ok(input.to_string());
    }
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(ch) = chars.next() {
        if ch != '&' {
            result.push(ch);
            continue;
        }
        let mut entity = String::new();
        let mut terminated = false;
        for next in chars.by_ref() {
            if next == ';' {
                terminated = true;
                break;
            }
            entity.push(next);
        }
        let decoded = if terminated {
            match entity.as_str() {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => decode_numeric_entity(&entity),
            }
        } else {
            None
        };
        match decoded {
            Some(ch) => result.push(ch),
            None => {
                return Err(Error::new(ErrorKind::InvalidEntity { entity }, pos));
            }
        }
    }
    Ok(result)
}

fn decode_numeric_entity(entity: &str) -> Option<char> {
    if let Some(hex) = entity.strip_prefix("#x") {
        u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
    } else if let Some(dec) = entity.strip_prefix('#') {
        dec.parse::<u32>().ok().and_then(char::from_u32)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records every callback in order
    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl XmlHandler for Recorder {
        fn namespace_decl(&mut self, prefix: &str, uri: &str) -> Result<()> {
            self.events.push(format!("ns {prefix}={uri}"));
            Ok(())
        }

        fn start_element(&mut self, name: &str, attrs: Vec<(String, String)>) -> Result<()> {
            let attrs: Vec<String> = attrs.iter().map(|(k, v)| format!("{k}={v}")).collect();
            self.events.push(format!("start {name} [{}]", attrs.join(",")));
            Ok(())
        }

        fn characters(&mut self, text: &str) -> Result<()> {
            self.events.push(format!("text {text:?}"));
            Ok(())
        }

        fn end_element(&mut self, name: &str) -> Result<()> {
            self.events.push(format!("end {name}"));
            Ok(())
        }
    }

    fn run(input: &str) -> Result<Vec<String>> {
        run_with(input, LexerOptions::default())
    }

    fn run_with(input: &str, options: LexerOptions) -> Result<Vec<String>> {
        let mut recorder = Recorder::default();
        XmlLexer::with_options(input.as_bytes(), options).run(&mut recorder)?;
        Ok(recorder.events)
    }

    #[test]
    fn test_simple_element() {
        let events = run("<a>hi</a>").unwrap();
        assert_eq!(events, vec!["start a []", "text \"hi\"", "end a"]);
    }

    #[test]
    fn test_self_closing_and_attributes() {
        let events = run("<a x=\"1\" y='2'/>").unwrap();
        assert_eq!(events, vec!["start a [x=1,y=2]", "end a"]);
    }

    #[test]
    fn test_prolog_comment_and_pi_skipped() {
        let events = run("<?xml version=\"1.0\"?><!-- hi --><a/><!-- bye -->").unwrap();
        assert_eq!(events, vec!["start a []", "end a"]);
    }

    #[test]
    fn test_whitespace_text_is_delivered() {
        let events = run("<a> <b/> </a>").unwrap();
        assert_eq!(
            events,
            vec![
                "start a []",
                "text \" \"",
                "start b []",
                "end b",
                "text \" \"",
                "end a"
            ]
        );
    }

    #[test]
    fn test_cdata_splits_text_run() {
        let events = run("<a>x<![CDATA[<raw>]]>y</a>").unwrap();
        assert_eq!(
            events,
            vec![
                "start a []",
                "text \"x\"",
                "text \"<raw>\"",
                "text \"y\"",
                "end a"
            ]
        );
    }

    #[test]
    fn test_entities_decoded() {
        let events = run("<a b=\"&quot;x&quot;\">&lt;&#65;&gt;</a>").unwrap();
        assert_eq!(
            events,
            vec!["start a [b=\"x\"]", "text \"<A>\"", "end a"]
        );
    }

    #[test]
    fn test_unknown_entity_rejected() {
        let err = run("<a>&nope;</a>").unwrap_err();
        assert_eq!(
            err.kind(),
            &ErrorKind::InvalidEntity {
                entity: "nope".to_string()
            }
        );
    }

    #[test]
    fn test_mismatched_tag() {
        let err = run("<a><b></a></b>").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MismatchedTag { .. }));
    }

    #[test]
    fn test_duplicate_attribute() {
        let err = run("<a x=\"1\" x=\"2\"/>").unwrap_err();
        assert_eq!(
            err.kind(),
            &ErrorKind::DuplicateAttribute {
                name: "x".to_string()
            }
        );
    }

    #[test]
    fn test_doctype_rejected_by_default() {
        let err = run("<!DOCTYPE a><a/>").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::DoctypeDisabled);
    }

    #[test]
    fn test_doctype_skipped_when_allowed() {
        let options = LexerOptions {
            allow_doctype: true,
            ..LexerOptions::default()
        };
        let events =
            run_with("<!DOCTYPE a [<!ENTITY e \"v\">]><a/>", options).unwrap();
        assert_eq!(events, vec!["start a []", "end a"]);
    }

    #[test]
    fn test_trailing_content() {
        let err = run("<a/><b/>").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::TrailingContent);
    }

    #[test]
    fn test_no_root() {
        let err = run("   ").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::NoRootElement);
    }

    #[test]
    fn test_unterminated() {
        let err = run("<a><b>").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UnterminatedMarkup);
    }

    #[test]
    fn test_max_depth() {
        let options = LexerOptions {
            max_depth: 2,
            ..LexerOptions::default()
        };
        let err = run_with("<a><b><c/></b></a>", options).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::MaxDepthExceeded { max: 2 });
    }

    #[test]
    fn test_namespace_resolution() {
        let options = LexerOptions {
            process_namespaces: true,
            ..LexerOptions::default()
        };
        let events = run_with(
            "<root xmlns=\"http://d.com/\" xmlns:a=\"http://a.com/\"><a:x a:id=\"1\" plain=\"2\"/></root>",
            options,
        )
        .unwrap();
        assert_eq!(
            events,
            vec![
                "ns =http://d.com/",
                "ns a=http://a.com/",
                "start http://d.com/:root []",
                "start http://a.com/:x [http://a.com/:id=1,plain=2]",
                "end http://a.com/:x",
                "end http://d.com/:root"
            ]
        );
    }

    #[test]
    fn test_unbound_prefix() {
        let options = LexerOptions {
            process_namespaces: true,
            ..LexerOptions::default()
        };
        let err = run_with("<p:a/>", options).unwrap_err();
        assert_eq!(
            err.kind(),
            &ErrorKind::UnboundPrefix {
                prefix: "p".to_string()
            }
        );
    }

    #[test]
    fn test_namespace_scope_ends_with_element() {
        let options = LexerOptions {
            process_namespaces: true,
            ..LexerOptions::default()
        };
        let err = run_with(
            "<root><inner xmlns:p=\"u\"><p:x/></inner><p:y/></root>",
            options,
        )
        .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnboundPrefix { .. }));
    }

    #[test]
    fn test_xmlns_kept_as_attribute_without_namespace_processing() {
        let events = run("<a xmlns=\"u\" xmlns:p=\"v\"/>").unwrap();
        assert_eq!(events, vec!["start a [xmlns=u,xmlns:p=v]", "end a"]);
    }
}
