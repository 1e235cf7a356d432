//! Record → XML fragment serializer
//!
//! Each record becomes one element named by the root tag, with one child
//! element per property:
//!
//! - scalars become escaped text content
//! - null and empty records become empty elements (`<a></a>`)
//! - nested records become nested elements
//! - arrays repeat the parent tag once per item (`<tags>x</tags><tags>y</tags>`),
//!   nested arrays flatten into the same run, empty arrays emit nothing
//!
//! With an empty indent the fragment is compact. Otherwise each element
//! starts on its own line, indented by depth.

use std::borrow::Cow;

use chrono::SecondsFormat;
use quick_xml::escape::escape;

use crate::error::SerializeError;
use crate::record::{Record, Value};

/// Default limit on nested records/arrays below the top-level record
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Serialize a record with default depth limit and key order.
pub fn serialize(record: &Record, root_tag: &str, indent: &str) -> Result<String, SerializeError> {
    XmlSerializer::new(root_tag, indent)?.serialize(record)
}

/// Reusable, stateless record serializer.
///
/// Holds only options, so a single instance can be shared across worker
/// threads.
#[derive(Debug, Clone)]
pub struct XmlSerializer {
    root_tag: String,
    indent: String,
    max_depth: usize,
    sort_keys: bool,
}

impl XmlSerializer {
    /// Create a serializer. The root tag is sanitized like any property key.
    pub fn new(root_tag: &str, indent: &str) -> Result<Self, SerializeError> {
        if root_tag.is_empty() {
            return Err(SerializeError::EmptyRootTag);
        }
        Ok(Self {
            root_tag: sanitize_name(root_tag).into_owned(),
            indent: indent.to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
            sort_keys: false,
        })
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Emit properties in lexicographic key order instead of insertion order
    pub fn with_sorted_keys(mut self, sort_keys: bool) -> Self {
        self.sort_keys = sort_keys;
        self
    }

    pub fn root_tag(&self) -> &str {
        &self.root_tag
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Serialize one record into a fragment
    pub fn serialize(&self, record: &Record) -> Result<String, SerializeError> {
        let mut out = String::with_capacity(64 + record.len() * 32);
        out.push('<');
        out.push_str(&self.root_tag);
        out.push('>');
        if self.write_fields(&mut out, record, 1, 0)? {
            self.newline(&mut out, 0);
        }
        self.close(&mut out, &self.root_tag);
        Ok(out)
    }

    /// Write one child element per property. Returns whether any element was written.
    fn write_fields(
        &self,
        out: &mut String,
        record: &Record,
        depth: usize,
        nesting: usize,
    ) -> Result<bool, SerializeError> {
        let mut fields: Vec<(&str, &Value)> = record.iter().collect();
        if self.sort_keys {
            fields.sort_by(|a, b| a.0.cmp(b.0));
        }

        let mut wrote = false;
        for (key, value) in fields {
            let name = sanitize_name(key);
            wrote |= self
                .write_value(out, &name, value, depth, nesting)
                .map_err(|e| e.within_key(key))?;
        }
        Ok(wrote)
    }

    fn write_value(
        &self,
        out: &mut String,
        name: &str,
        value: &Value,
        depth: usize,
        nesting: usize,
    ) -> Result<bool, SerializeError> {
        match value {
            Value::Array(items) => {
                let nesting = self.descend(nesting)?;
                let mut wrote = false;
                for (i, item) in items.iter().enumerate() {
                    wrote |= self
                        .write_value(out, name, item, depth, nesting)
                        .map_err(|e| e.within_index(i))?;
                }
                Ok(wrote)
            }
            Value::Entity(record) => {
                let nesting = self.descend(nesting)?;
                self.open(out, name, depth);
                if self.write_fields(out, record, depth + 1, nesting)? {
                    self.newline(out, depth);
                }
                self.close(out, name);
                Ok(true)
            }
            Value::Null => self.leaf(out, name, depth, ""),
            Value::Boolean(b) => self.leaf(out, name, depth, if *b { "true" } else { "false" }),
            Value::Integer(i) => self.leaf(out, name, depth, &i.to_string()),
            Value::Double(f) => self.leaf(out, name, depth, &format_double(*f)),
            Value::String(s) => self.leaf(out, name, depth, &escape_text(s)),
            Value::Timestamp(t) => self.leaf(
                out,
                name,
                depth,
                &t.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            ),
            Value::Blob(_) | Value::Key(_) => Err(SerializeError::unsupported(value.kind())),
        }
    }

    fn descend(&self, nesting: usize) -> Result<usize, SerializeError> {
        if nesting >= self.max_depth {
            return Err(SerializeError::depth_exceeded(self.max_depth));
        }
        Ok(nesting + 1)
    }

    /// Element with (already escaped) text content on a single line
    fn leaf(
        &self,
        out: &mut String,
        name: &str,
        depth: usize,
        text: &str,
    ) -> Result<bool, SerializeError> {
        self.open(out, name, depth);
        out.push_str(text);
        self.close(out, name);
        Ok(true)
    }

    fn open(&self, out: &mut String, name: &str, depth: usize) {
        self.newline(out, depth);
        out.push('<');
        out.push_str(name);
        out.push('>');
    }

    fn close(&self, out: &mut String, name: &str) {
        out.push_str("</");
        out.push_str(name);
        out.push('>');
    }

    fn newline(&self, out: &mut String, depth: usize) {
        if self.indent.is_empty() {
            return;
        }
        out.push('\n');
        for _ in 0..depth {
            out.push_str(&self.indent);
        }
    }
}

/// Map a property key to a valid XML element name.
///
/// Names follow the XML 1.0 (fifth edition) `NameStartChar`/`NameChar`
/// sets, minus `:`. Valid names are returned unchanged. Otherwise:
/// 1. an empty key becomes `_`
/// 2. characters outside `NameChar` become `_`
/// 3. a name whose first character is not a `NameStartChar` gets a `_` prefix
/// 4. a name starting with `xml` (any case) gets a `_` prefix
pub fn sanitize_name(name: &str) -> Cow<'_, str> {
    if is_valid_name(name) {
        return Cow::Borrowed(name);
    }

    let replaced: String = name
        .chars()
        .map(|c| if is_name_char(c) { c } else { '_' })
        .collect();

    match replaced.chars().next() {
        None => Cow::Borrowed("_"),
        Some(c) if !is_name_start(c) || has_xml_prefix(&replaced) => {
            Cow::Owned(format!("_{replaced}"))
        }
        Some(_) => Cow::Owned(replaced),
    }
}

fn is_name_start(c: char) -> bool {
    matches!(c,
        'A'..='Z'
        | '_'
        | 'a'..='z'
        | '\u{C0}'..='\u{D6}'
        | '\u{D8}'..='\u{F6}'
        | '\u{F8}'..='\u{2FF}'
        | '\u{370}'..='\u{37D}'
        | '\u{37F}'..='\u{1FFF}'
        | '\u{200C}'..='\u{200D}'
        | '\u{2070}'..='\u{218F}'
        | '\u{2C00}'..='\u{2FEF}'
        | '\u{3001}'..='\u{D7FF}'
        | '\u{F900}'..='\u{FDCF}'
        | '\u{FDF0}'..='\u{FFFD}'
        | '\u{10000}'..='\u{EFFFF}')
}

fn is_name_char(c: char) -> bool {
    is_name_start(c)
        || matches!(c,
            '-' | '.' | '0'..='9' | '\u{B7}' | '\u{300}'..='\u{36F}' | '\u{203F}'..='\u{2040}')
}

fn has_xml_prefix(name: &str) -> bool {
    name.len() >= 3 && name.as_bytes()[..3].eq_ignore_ascii_case(b"xml")
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if is_name_start(c) => chars.all(is_name_char) && !has_xml_prefix(name),
        _ => false,
    }
}

/// Escape text content. Characters XML 1.0 cannot carry become U+FFFD.
fn escape_text(s: &str) -> Cow<'_, str> {
    if s.chars().all(is_xml_char) {
        return escape(s);
    }
    let cleaned: String = s
        .chars()
        .map(|c| if is_xml_char(c) { c } else { '\u{FFFD}' })
        .collect();
    Cow::Owned(escape(cleaned.as_str()).into_owned())
}

fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}')
}

/// Shortest round-trip decimal; integral values keep a `.0` suffix.
fn format_double(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f == f64::INFINITY {
        "INF".to_string()
    } else if f == f64::NEG_INFINITY {
        "-INF".to_string()
    } else {
        let mut s = f.to_string();
        if !s.contains('.') {
            s.push_str(".0");
        }
        s
    }
}
