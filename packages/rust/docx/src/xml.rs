//! Small XML utilities over `quick-xml` used by every part handler.
//!
//! Parts are kept as strings. Structural edits go through the event stream
//! (split a container into children, rewrite element attributes, collect
//! text) so untouched markup is written back unchanged.

use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};

use masterdoc_shared::{MasterDocError, Result};

/// Map any `quick-xml` (or UTF-8) failure into a document error.
pub(crate) fn xml_err(e: impl std::fmt::Display) -> MasterDocError {
    MasterDocError::document(format!("malformed XML: {e}"))
}

/// Escape text for use in element content or attribute values.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Qualified element name (e.g. `w:p`).
pub(crate) fn element_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

/// Attributes of an element as unescaped `(key, value)` pairs, in order.
pub(crate) fn attributes(e: &BytesStart<'_>) -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(xml_err)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(xml_err)?.into_owned();
        out.push((key, value));
    }
    Ok(out)
}

/// Look up one attribute value by qualified key.
pub(crate) fn attr<'a>(attrs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Set (or append) an attribute value in place.
pub(crate) fn set_attr(attrs: &mut Vec<(String, String)>, key: &str, value: impl Into<String>) {
    let value = value.into();
    match attrs.iter_mut().find(|(k, _)| k == key) {
        Some(slot) => slot.1 = value,
        None => attrs.push((key.to_string(), value)),
    }
}

/// Build a start tag from a name and attribute list.
pub(crate) fn build_start(name: &str, attrs: &[(String, String)]) -> BytesStart<'static> {
    let mut elem = BytesStart::new(name.to_string());
    for (k, v) in attrs {
        elem.push_attribute((k.as_str(), v.as_str()));
    }
    elem
}

pub(crate) fn into_string(writer: Writer<Vec<u8>>) -> Result<String> {
    String::from_utf8(writer.into_inner()).map_err(xml_err)
}

// ---------------------------------------------------------------------------
// Container splitting
// ---------------------------------------------------------------------------

/// A container element split into the markup before its children, the
/// children themselves (one complete element each), and the markup after.
#[derive(Debug, Clone, Default)]
pub(crate) struct Split {
    /// Everything up to and including the container's start tag.
    pub head: String,
    /// Direct child elements, serialized.
    pub children: Vec<String>,
    /// The container's end tag and everything after it.
    pub tail: String,
}

impl Split {
    pub fn join(&self) -> String {
        let mut out = String::with_capacity(
            self.head.len() + self.tail.len() + self.children.iter().map(String::len).sum::<usize>(),
        );
        out.push_str(&self.head);
        for child in &self.children {
            out.push_str(child);
        }
        out.push_str(&self.tail);
        out
    }
}

enum SplitState {
    Before,
    Inside,
    After,
}

/// Split the first element named `container` into its direct children.
///
/// Whitespace and comments directly inside the container are dropped.
pub(crate) fn split_children(xml: &str, container: &str) -> Result<Split> {
    let mut reader = Reader::from_str(xml);
    let mut head = Writer::new(Vec::new());
    let mut tail = Writer::new(Vec::new());
    let mut children = Vec::new();
    let mut current: Option<Writer<Vec<u8>>> = None;
    let mut depth = 0usize;
    let mut state = SplitState::Before;

    loop {
        let event = reader.read_event().map_err(xml_err)?;
        match state {
            SplitState::Before => match event {
                Event::Eof => {
                    return Err(MasterDocError::document(format!(
                        "element <{container}> not found"
                    )));
                }
                Event::Start(e) if e.name().as_ref() == container.as_bytes() => {
                    head.write_event(Event::Start(e)).map_err(xml_err)?;
                    state = SplitState::Inside;
                }
                Event::Empty(e) if e.name().as_ref() == container.as_bytes() => {
                    let end = e.to_end().into_owned();
                    head.write_event(Event::Start(e)).map_err(xml_err)?;
                    tail.write_event(Event::End(end)).map_err(xml_err)?;
                    state = SplitState::After;
                }
                other => head.write_event(other).map_err(xml_err)?,
            },
            SplitState::Inside => match event {
                Event::Eof => {
                    return Err(MasterDocError::document(format!(
                        "unexpected end of input inside <{container}>"
                    )));
                }
                Event::End(e) if depth == 0 => {
                    tail.write_event(Event::End(e)).map_err(xml_err)?;
                    state = SplitState::After;
                }
                Event::Empty(e) if depth == 0 => {
                    let mut w = Writer::new(Vec::new());
                    w.write_event(Event::Empty(e)).map_err(xml_err)?;
                    children.push(into_string(w)?);
                }
                Event::Start(e) => {
                    let w = current.get_or_insert_with(|| Writer::new(Vec::new()));
                    w.write_event(Event::Start(e)).map_err(xml_err)?;
                    depth += 1;
                }
                Event::End(e) => {
                    if let Some(w) = current.as_mut() {
                        w.write_event(Event::End(e)).map_err(xml_err)?;
                    }
                    depth -= 1;
                    if depth == 0 {
                        if let Some(w) = current.take() {
                            children.push(into_string(w)?);
                        }
                    }
                }
                // Whitespace and comments between children.
                _ if depth == 0 => {}
                other => {
                    if let Some(w) = current.as_mut() {
                        w.write_event(other).map_err(xml_err)?;
                    }
                }
            },
            SplitState::After => match event {
                Event::Eof => break,
                other => tail.write_event(other).map_err(xml_err)?,
            },
        }
    }

    Ok(Split {
        head: into_string(head)?,
        children,
        tail: into_string(tail)?,
    })
}

// ---------------------------------------------------------------------------
// Element visiting and rewriting
// ---------------------------------------------------------------------------

/// Call `f` with the name and attributes of every start/empty element.
pub(crate) fn visit_elements<F>(xml: &str, mut f: F) -> Result<()>
where
    F: FnMut(&str, &[(String, String)]),
{
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Eof => break,
            Event::Start(e) | Event::Empty(e) => {
                let attrs = attributes(&e)?;
                f(&element_name(&e), &attrs);
            }
            _ => {}
        }
    }
    Ok(())
}

/// Rewrite element attributes in place.
///
/// `f` receives the element name and a mutable attribute list and returns
/// `true` when it changed something; unchanged elements are copied verbatim.
pub(crate) fn rewrite_elements<F>(xml: &str, mut f: F) -> Result<String>
where
    F: FnMut(&str, &mut Vec<(String, String)>) -> bool,
{
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::new());
    loop {
        let event = reader.read_event().map_err(xml_err)?;
        match event {
            Event::Eof => break,
            Event::Start(e) => {
                let name = element_name(&e);
                let mut attrs = attributes(&e)?;
                if f(&name, &mut attrs) {
                    writer
                        .write_event(Event::Start(build_start(&name, &attrs)))
                        .map_err(xml_err)?;
                } else {
                    writer.write_event(Event::Start(e)).map_err(xml_err)?;
                }
            }
            Event::Empty(e) => {
                let name = element_name(&e);
                let mut attrs = attributes(&e)?;
                if f(&name, &mut attrs) {
                    writer
                        .write_event(Event::Empty(build_start(&name, &attrs)))
                        .map_err(xml_err)?;
                } else {
                    writer.write_event(Event::Empty(e)).map_err(xml_err)?;
                }
            }
            other => writer.write_event(other).map_err(xml_err)?,
        }
    }
    into_string(writer)
}

/// Drop every element whose name is in `names`, with its content.
///
/// Returns the rewritten XML and how many elements were dropped.
pub(crate) fn remove_elements(xml: &str, names: &[&str]) -> Result<(String, usize)> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::new());
    let mut removed = 0;
    // Depth inside a dropped element; 0 while copying.
    let mut skipping = 0usize;
    loop {
        let event = reader.read_event().map_err(xml_err)?;
        match event {
            Event::Eof => break,
            Event::Start(_) if skipping > 0 => skipping += 1,
            Event::End(_) if skipping > 0 => skipping -= 1,
            _ if skipping > 0 => {}
            Event::Start(e) if names.contains(&element_name(&e).as_str()) => {
                removed += 1;
                skipping = 1;
            }
            Event::Empty(e) if names.contains(&element_name(&e).as_str()) => removed += 1,
            other => writer.write_event(other).map_err(xml_err)?,
        }
    }
    Ok((into_string(writer)?, removed))
}

/// Rewrite the attributes of the first element only; everything after its
/// start tag is copied byte for byte, so `xml` may be an unclosed fragment.
pub(crate) fn rewrite_root<F>(xml: &str, mut f: F) -> Result<String>
where
    F: FnMut(&str, &mut Vec<(String, String)>),
{
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::new());
    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(e) => {
                let name = element_name(&e);
                let mut attrs = attributes(&e)?;
                f(&name, &mut attrs);
                writer
                    .write_event(Event::Start(build_start(&name, &attrs)))
                    .map_err(xml_err)?;
                break;
            }
            Event::Empty(e) => {
                let name = element_name(&e);
                let mut attrs = attributes(&e)?;
                f(&name, &mut attrs);
                writer
                    .write_event(Event::Empty(build_start(&name, &attrs)))
                    .map_err(xml_err)?;
                break;
            }
            Event::Eof => return Err(MasterDocError::document("no element found")),
            other => writer.write_event(other).map_err(xml_err)?,
        }
    }
    let rest = usize::try_from(reader.buffer_position()).unwrap_or(xml.len());
    let mut out = into_string(writer)?;
    out.push_str(xml.get(rest..).unwrap_or(""));
    Ok(out)
}

/// Name and attributes of the first element in `xml`.
pub(crate) fn root_element(xml: &str) -> Result<(String, Vec<(String, String)>)> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(e) | Event::Empty(e) => return Ok((element_name(&e), attributes(&e)?)),
            Event::Eof => return Err(MasterDocError::document("no element found")),
            _ => {}
        }
    }
}

/// Plain text of WordprocessingML content.
///
/// Concatenates `w:t` runs; `w:tab` becomes a tab and `w:br`/`w:cr` a
/// newline. Field instructions are not text and are skipped.
pub(crate) fn collect_text(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut out = String::new();
    let mut in_text = false;
    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Eof => break,
            Event::Start(e) if e.name().as_ref() == b"w:t" => in_text = true,
            Event::End(e) if e.name().as_ref() == b"w:t" => in_text = false,
            Event::Empty(e) => match e.name().as_ref() {
                b"w:tab" => out.push('\t'),
                b"w:br" | b"w:cr" => out.push('\n'),
                _ => {}
            },
            Event::Text(t) if in_text => out.push_str(&t.unescape().map_err(xml_err)?),
            Event::CData(t) if in_text => out.push_str(&String::from_utf8_lossy(&t)),
            _ => {}
        }
    }
    Ok(out)
}

/// Concatenated text content of every element named `name`, or `None`
/// when no such element exists.
pub(crate) fn element_text(xml: &str, name: &str) -> Result<Option<String>> {
    let mut reader = Reader::from_str(xml);
    let mut out: Option<String> = None;
    let mut inside = false;
    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Eof => break,
            Event::Start(e) if e.name().as_ref() == name.as_bytes() => {
                inside = true;
                out.get_or_insert_with(String::new);
            }
            Event::End(e) if e.name().as_ref() == name.as_bytes() => inside = false,
            Event::Text(t) if inside => {
                if let Some(buf) = out.as_mut() {
                    buf.push_str(&t.unescape().map_err(xml_err)?);
                }
            }
            _ => {}
        }
    }
    Ok(out)
}
