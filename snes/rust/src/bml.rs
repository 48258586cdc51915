//! A reader and writer for the indented markup used by cheat files and cheat databases.
//!
//! Every non blank line is a node. A node has a name, optionally followed by data, either `name: data` to the end of
//! the line or `name=value` / `name="quoted value"`. More `name=value` pairs on the same line become child nodes, as
//! do the lines after it that are indented further.

/// The errors that can occur parsing markup
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BmlError {
    /// The line does not start with a valid node name
    #[error("invalid node on line {0}")]
    InvalidNode(usize),
    /// A quoted value is missing the closing quote
    #[error("unterminated quote on line {0}")]
    UnterminatedQuote(usize),
}

/// A node of the document tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BmlNode {
    /// The name of the node
    pub name: String,
    /// The data of the node, empty when there is none
    pub data: String,
    /// The nested nodes
    pub children: Vec<BmlNode>,
}

impl BmlNode {
    /// Find the first child with the given name, ignoring case
    pub fn find(&self, name: &str) -> Option<&BmlNode> {
        self.children
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Iterate over the children with the given name, ignoring case
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a BmlNode> + 'a {
        self.children
            .iter()
            .filter(move |c| c.name.eq_ignore_ascii_case(name))
    }

    /// The data of the named child, if it is present
    pub fn value(&self, name: &str) -> Option<&str> {
        self.find(name).map(|n| n.data.as_str())
    }
}

/// A line that holds a node
struct Line<'a> {
    /// The line number, starting at 1
    number: usize,
    /// The amount of leading whitespace
    indent: usize,
    /// The rest of the line
    content: &'a str,
}

/// Is the character allowed in a node name?
fn name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_'
}

/// Split a node name off the front of the text
fn split_name(text: &str, line: usize) -> Result<(&str, &str), BmlError> {
    let len = text.find(|c: char| !name_char(c)).unwrap_or(text.len());
    if len == 0 {
        return Err(BmlError::InvalidNode(line));
    }
    Ok(text.split_at(len))
}

/// Split the data of a node off the front of the text, the text starts right after the node name.
fn split_data(text: &str, line: usize) -> Result<(String, &str), BmlError> {
    if let Some(r) = text.strip_prefix(':') {
        return Ok((r.trim().to_string(), ""));
    }
    if let Some(r) = text.strip_prefix('=') {
        if let Some(q) = r.strip_prefix('"') {
            let end = q.find('"').ok_or(BmlError::UnterminatedQuote(line))?;
            return Ok((q[..end].to_string(), &q[end + 1..]));
        }
        let end = r.find(char::is_whitespace).unwrap_or(r.len());
        return Ok((r[..end].to_string(), &r[end..]));
    }
    if text.is_empty() || text.starts_with(char::is_whitespace) {
        Ok((String::new(), text))
    } else {
        Err(BmlError::InvalidNode(line))
    }
}

/// Parse the content of a single line into a node, attributes included
fn parse_line(l: &Line) -> Result<BmlNode, BmlError> {
    let (name, rest) = split_name(l.content, l.number)?;
    let (data, mut rest) = split_data(rest, l.number)?;
    let mut node = BmlNode {
        name: name.to_string(),
        data,
        children: Vec::new(),
    };
    loop {
        rest = rest.trim_start();
        if rest.is_empty() || rest.starts_with("//") {
            break;
        }
        let (name, r) = split_name(rest, l.number)?;
        let (data, r) = split_data(r, l.number)?;
        node.children.push(BmlNode {
            name: name.to_string(),
            data,
            children: Vec::new(),
        });
        rest = r;
    }
    Ok(node)
}

/// Parse the nodes that are indented deeper than the parent
fn parse_nodes(lines: &[Line], pos: &mut usize, parent: Option<usize>) -> Result<Vec<BmlNode>, BmlError> {
    let mut nodes = Vec::new();
    while let Some(l) = lines.get(*pos) {
        if parent.is_some_and(|p| l.indent <= p) {
            break;
        }
        let mut node = parse_line(l)?;
        *pos += 1;
        let children = parse_nodes(lines, pos, Some(l.indent))?;
        node.children.extend(children);
        nodes.push(node);
    }
    Ok(nodes)
}

/// Parse a document. The returned node is an unnamed root holding the top level nodes.
pub fn parse(text: &str) -> Result<BmlNode, BmlError> {
    let lines: Vec<Line> = text
        .lines()
        .enumerate()
        .filter_map(|(i, l)| {
            let content = l.trim_start_matches([' ', '\t']);
            let content = content.trim_end();
            if content.is_empty() || content.starts_with("//") {
                None
            } else {
                Some(Line {
                    number: i + 1,
                    indent: l.len() - l.trim_start_matches([' ', '\t']).len(),
                    content,
                })
            }
        })
        .collect();
    let mut pos = 0;
    Ok(BmlNode {
        children: parse_nodes(&lines, &mut pos, None)?,
        ..Default::default()
    })
}

/// Write a single cheat record, in the same layout the reader accepts.
pub fn write_cheat(out: &mut String, name: &str, code: &str, enabled: bool) {
    let name: String = name
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    out.push_str("cheat\n");
    out.push_str(&format!("  name: {}\n", name));
    out.push_str(&format!("  code: {}\n", code));
    if enabled {
        out.push_str("  enable\n");
    }
    out.push('\n');
}
