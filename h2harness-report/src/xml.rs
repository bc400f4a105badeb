//! Just enough XML for JUnit-style reports: elements, attributes, text,
//! CDATA and comments. Attribute order is preserved so a rewrite only
//! changes the attributes it touches.

use winnow::ascii::multispace0;
use winnow::prelude::*;
use winnow::token::{take_till, take_while};

#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    /// The `<?xml ...?>` declaration, kept verbatim.
    pub declaration: Option<String>,
    pub root: XmlElement,
}

#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    pub name: String,
    attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

impl XmlDocument {
    pub fn parse(input: &str) -> Result<XmlDocument, String> {
        let input = input.trim_start_matches('\u{feff}');
        if input.trim().is_empty() {
            return Err("Empty document".to_string());
        }

        document.parse(input).map_err(|e| e.to_string())
    }

    pub fn to_xml_string(&self) -> String {
        let mut out = String::new();
        if let Some(declaration) = &self.declaration {
            out.push_str(declaration);
            out.push('\n');
        }
        write_element(&self.root, &mut out);
        out.push('\n');
        out
    }
}

impl XmlElement {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n.as_str() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Replaces the attribute in place, or appends it if absent.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(n, _)| n.as_str() == name) {
            Some((_, v)) => *v = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    pub fn elements<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter_map(move |node| match node {
            XmlNode::Element(el) if el.name == name => Some(el),
            _ => None,
        })
    }

    pub fn elements_mut<'a>(&'a mut self, name: &str) -> impl Iterator<Item = &'a mut XmlElement> {
        self.children.iter_mut().filter_map(move |node| match node {
            XmlNode::Element(el) if el.name == name => Some(el),
            _ => None,
        })
    }

    pub fn first_element(&self, name: &str) -> Option<&XmlElement> {
        self.elements(name).next()
    }

    /// Direct text content, with CDATA sections already folded in.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            if let XmlNode::Text(text) = node {
                out.push_str(text);
            }
        }
        out
    }
}

fn document(input: &mut &str) -> ModalResult<XmlDocument> {
    let _ = multispace0.parse_next(input)?;
    let declaration = if input.starts_with("<?xml") {
        Some(declaration.parse_next(input)?)
    } else {
        None
    };
    skip_misc(input)?;
    let root = element.parse_next(input)?;
    skip_misc(input)?;
    Ok(XmlDocument { declaration, root })
}

fn declaration(input: &mut &str) -> ModalResult<String> {
    let _ = "<?xml".parse_next(input)?;
    let body = take_till(0.., |c| c == '?').parse_next(input)?;
    let _ = "?>".parse_next(input)?;
    Ok(format!("<?xml{}?>", body))
}

fn skip_misc(input: &mut &str) -> ModalResult<()> {
    loop {
        let _ = multispace0.parse_next(input)?;
        if input.starts_with("<!--") {
            comment(input)?;
        } else {
            return Ok(());
        }
    }
}

fn comment(input: &mut &str) -> ModalResult<()> {
    let _ = "<!--".parse_next(input)?;
    loop {
        let _ = take_till(0.., |c| c == '-').parse_next(input)?;
        if input.starts_with("-->") {
            let _ = "-->".parse_next(input)?;
            return Ok(());
        }
        let _ = '-'.parse_next(input)?;
    }
}

fn element(input: &mut &str) -> ModalResult<XmlElement> {
    let _ = '<'.parse_next(input)?;
    let name = name.parse_next(input)?;
    let attributes = attributes(input)?;
    let _ = multispace0.parse_next(input)?;

    if input.starts_with("/>") {
        let _ = "/>".parse_next(input)?;
        return Ok(XmlElement {
            name,
            attributes,
            children: Vec::new(),
        });
    }

    let _ = '>'.parse_next(input)?;
    let children = children(input)?;
    let _ = "</".parse_next(input)?;
    let closing = name_ref.parse_next(input)?;
    if closing != name {
        return Err(winnow::error::ErrMode::Cut(
            winnow::error::ContextError::default(),
        ));
    }
    let _ = multispace0.parse_next(input)?;
    let _ = '>'.parse_next(input)?;

    Ok(XmlElement {
        name,
        attributes,
        children,
    })
}

fn name(input: &mut &str) -> ModalResult<String> {
    name_ref.map(|s: &str| s.to_string()).parse_next(input)
}

fn name_ref<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_while(1.., |c: char| {
        c.is_alphanumeric() || matches!(c, ':' | '_' | '-' | '.')
    })
    .parse_next(input)
}

fn attributes(input: &mut &str) -> ModalResult<Vec<(String, String)>> {
    let mut attrs = Vec::new();
    loop {
        let _ = multispace0.parse_next(input)?;
        if input.starts_with('>') || input.starts_with('/') {
            return Ok(attrs);
        }
        if input.is_empty() {
            return Err(winnow::error::ErrMode::Cut(
                winnow::error::ContextError::default(),
            ));
        }
        let name = name.parse_next(input)?;
        let _ = multispace0.parse_next(input)?;
        let _ = '='.parse_next(input)?;
        let _ = multispace0.parse_next(input)?;
        let value = attribute_value(input)?;
        attrs.push((name, value));
    }
}

fn attribute_value(input: &mut &str) -> ModalResult<String> {
    let mut quote = if input.starts_with('\'') { '\'' } else { '"' };
    let _ = quote.parse_next(input)?;
    let raw = take_till(0.., move |c| c == quote).parse_next(input)?;
    let _ = quote.parse_next(input)?;
    Ok(decode_entities(raw))
}

fn children(input: &mut &str) -> ModalResult<Vec<XmlNode>> {
    let mut nodes = Vec::new();
    loop {
        if input.starts_with("</") {
            return Ok(nodes);
        }
        if input.starts_with("<!--") {
            comment(input)?;
        } else if input.starts_with("<![CDATA[") {
            nodes.push(XmlNode::Text(cdata(input)?));
        } else if input.starts_with('<') {
            nodes.push(XmlNode::Element(element.parse_next(input)?));
        } else if input.is_empty() {
            return Err(winnow::error::ErrMode::Cut(
                winnow::error::ContextError::default(),
            ));
        } else {
            let raw = take_till(1.., |c| c == '<').parse_next(input)?;
            nodes.push(XmlNode::Text(decode_entities(raw)));
        }
    }
}

fn cdata(input: &mut &str) -> ModalResult<String> {
    let _ = "<![CDATA[".parse_next(input)?;
    let mut content = String::new();
    loop {
        let chunk = take_till(0.., |c| c == ']').parse_next(input)?;
        content.push_str(chunk);
        if input.starts_with("]]>") {
            let _ = "]]>".parse_next(input)?;
            return Ok(content);
        }
        let _ = ']'.parse_next(input)?;
        content.push(']');
    }
}

fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        if let Some(end) = rest.find(';') {
            let decoded = match &rest[1..end] {
                "lt" => Some('<'),
                "gt" => Some('>'),
                "amp" => Some('&'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                entity => decode_numeric_entity(entity),
            };
            if let Some(c) = decoded {
                out.push(c);
                rest = &rest[end + 1..];
                continue;
            }
        }
        // Not a recognized entity, keep the ampersand as-is
        out.push('&');
        rest = &rest[1..];
    }
    out.push_str(rest);
    out
}

fn decode_numeric_entity(entity: &str) -> Option<char> {
    let code = if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
        u32::from_str_radix(hex, 16).ok()?
    } else if let Some(dec) = entity.strip_prefix('#') {
        dec.parse::<u32>().ok()?
    } else {
        return None;
    };
    char::from_u32(code)
}

fn write_element(element: &XmlElement, out: &mut String) {
    out.push('<');
    out.push_str(&element.name);
    for (name, value) in &element.attributes {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape_attribute(value));
        out.push('"');
    }
    if element.children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    for child in &element.children {
        match child {
            XmlNode::Element(el) => write_element(el, out),
            XmlNode::Text(text) => out.push_str(&escape_text(text)),
        }
    }
    out.push_str("</");
    out.push_str(&element.name);
    out.push('>');
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attribute(value: &str) -> String {
    escape_text(value)
        .replace('"', "&quot;")
        .replace('\n', "&#10;")
}
