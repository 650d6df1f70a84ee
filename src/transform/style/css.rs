// src/transform/style/css.rs

//! Minimal CSS tree: enough structure to move media queries, add vendor
//! prefixes and print either readable or minified output.
//!
//! The parser understands comments, strings, parentheses (so `;` inside
//! `url(data:...)` is safe), declarations, at-statements and nested blocks.
//! It does not interpret selectors or values.

/// One node of a stylesheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Full comment text including `/*` and `*/`.
    Comment(String),
    /// At-statement without trailing `;` (`@charset "utf-8"`).
    Statement(String),
    Declaration { property: String, value: String },
    Block { prelude: String, children: Vec<Node> },
}

impl Node {
    pub fn block(prelude: impl Into<String>, children: Vec<Node>) -> Self {
        Node::Block {
            prelude: prelude.into(),
            children,
        }
    }

    pub fn decl(property: impl Into<String>, value: impl Into<String>) -> Self {
        Node::Declaration {
            property: property.into(),
            value: value.into(),
        }
    }
}

/// Parse a stylesheet. Errors carry a short reason and a 1-based line.
pub fn parse(src: &str) -> Result<Vec<Node>, String> {
    let chars: Vec<char> = src.chars().collect();
    let mut parser = Parser { chars, pos: 0 };
    parser.items(false)
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn line(&self) -> usize {
        self.line_at(self.pos)
    }

    fn line_at(&self, pos: usize) -> usize {
        self.chars[..pos.min(self.chars.len())]
            .iter()
            .filter(|c| **c == '\n')
            .count()
            + 1
    }

    fn items(&mut self, nested: bool) -> Result<Vec<Node>, String> {
        let mut nodes = Vec::new();
        let mut buf = String::new();
        let mut depth = 0usize;

        while let Some(c) = self.peek(0) {
            match c {
                '/' if self.peek(1) == Some('*') => {
                    let comment = self.comment()?;
                    if buf.trim().is_empty() && depth == 0 {
                        nodes.push(Node::Comment(comment));
                    }
                    continue;
                }
                '"' | '\'' => {
                    let s = self.string(c)?;
                    buf.push_str(&s);
                    continue;
                }
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                '{' if depth == 0 => {
                    self.pos += 1;
                    let prelude = collapse_ws(buf.trim());
                    buf.clear();
                    if prelude.is_empty() {
                        return Err(format!("block without selector at line {}", self.line()));
                    }
                    let children = self.items(true)?;
                    nodes.push(Node::Block { prelude, children });
                    continue;
                }
                ';' if depth == 0 => {
                    self.pos += 1;
                    push_item(&mut nodes, &buf);
                    buf.clear();
                    continue;
                }
                '}' if depth == 0 => {
                    if !nested {
                        return Err(format!("unexpected '}}' at line {}", self.line()));
                    }
                    self.pos += 1;
                    push_item(&mut nodes, &buf);
                    return Ok(nodes);
                }
                _ => {}
            }
            buf.push(c);
            self.pos += 1;
        }

        if nested {
            return Err("unclosed block at end of input".to_string());
        }
        push_item(&mut nodes, &buf);
        Ok(nodes)
    }

    fn comment(&mut self) -> Result<String, String> {
        let start = self.pos;
        self.pos += 2;
        while self.pos < self.chars.len() {
            if self.peek(0) == Some('*') && self.peek(1) == Some('/') {
                self.pos += 2;
                return Ok(self.chars[start..self.pos].iter().collect());
            }
            self.pos += 1;
        }
        Err(format!("unterminated comment starting at line {}", self.line_at(start)))
    }

    fn string(&mut self, quote: char) -> Result<String, String> {
        let start = self.pos;
        self.pos += 1;
        while let Some(c) = self.peek(0) {
            self.pos += 1;
            if c == '\\' {
                self.pos += 1;
            } else if c == quote {
                return Ok(self.chars[start..self.pos].iter().collect());
            } else if c == '\n' {
                break;
            }
        }
        Err(format!("unterminated string starting at line {}", self.line_at(start)))
    }
}

fn push_item(nodes: &mut Vec<Node>, buf: &str) {
    let text = buf.trim();
    if text.is_empty() {
        return;
    }
    if text.starts_with('@') {
        nodes.push(Node::Statement(collapse_ws(text)));
        return;
    }
    match text.split_once(':') {
        Some((property, value)) => nodes.push(Node::Declaration {
            property: property.trim().to_string(),
            value: collapse_ws(value.trim()),
        }),
        None => nodes.push(Node::Statement(collapse_ws(text))),
    }
}

/// Collapse whitespace runs to one space, leaving quoted strings alone.
pub fn collapse_ws(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut quote: Option<char> = None;
    let mut pending_space = false;
    let mut escaped = false;

    for c in s.chars() {
        if let Some(q) = quote {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        if c == '"' || c == '\'' {
            quote = Some(c);
        }
        out.push(c);
    }
    out
}

/// Readable output with two-space indentation.
pub fn render_pretty(nodes: &[Node]) -> String {
    let mut out = String::new();
    pretty_into(&mut out, nodes, 0);
    out
}

fn pretty_into(out: &mut String, nodes: &[Node], indent: usize) {
    let pad = "  ".repeat(indent);
    for node in nodes {
        match node {
            Node::Comment(text) => {
                out.push_str(&pad);
                out.push_str(text);
                out.push('\n');
            }
            Node::Statement(text) => {
                out.push_str(&pad);
                out.push_str(text);
                out.push_str(";\n");
            }
            Node::Declaration { property, value } => {
                out.push_str(&pad);
                out.push_str(property);
                out.push_str(": ");
                out.push_str(value);
                out.push_str(";\n");
            }
            Node::Block { prelude, children } => {
                out.push_str(&pad);
                out.push_str(prelude);
                out.push_str(" {\n");
                pretty_into(out, children, indent + 1);
                out.push_str(&pad);
                out.push_str("}\n");
            }
        }
    }
}

/// Minified output.
///
/// Comments are dropped except `/*! ... */` preservation comments; the last
/// declaration of a block loses its semicolon. Every byte of the output
/// also appears, in order, in [`render_pretty`]'s output for the same tree.
pub fn render_minified(nodes: &[Node]) -> String {
    let mut out = String::new();
    minified_into(&mut out, nodes);
    out
}

fn minified_into(out: &mut String, nodes: &[Node]) {
    let last_semicolon_item = nodes
        .iter()
        .rposition(|n| matches!(n, Node::Declaration { .. } | Node::Statement(_)));

    for (idx, node) in nodes.iter().enumerate() {
        let terminator = if Some(idx) == last_semicolon_item && idx + 1 == nodes.len() {
            ""
        } else {
            ";"
        };
        match node {
            Node::Comment(text) => {
                if text.starts_with("/*!") {
                    out.push_str(text);
                }
            }
            Node::Statement(text) => {
                out.push_str(text);
                out.push_str(terminator);
            }
            Node::Declaration { property, value } => {
                out.push_str(property);
                out.push(':');
                out.push_str(&tighten(value, &[',']));
                out.push_str(terminator);
            }
            Node::Block { prelude, children } => {
                out.push_str(&tighten(prelude, &[',', '>', '+', '~']));
                out.push('{');
                minified_into(out, children);
                out.push('}');
            }
        }
    }
}

/// Remove single spaces adjacent to the given punctuation, outside strings
/// and parentheses.
fn tighten(s: &str, punct: &[char]) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut quote: Option<char> = None;
    let mut depth = 0usize;

    for (i, &c) in chars.iter().enumerate() {
        if let Some(q) = quote {
            out.push(c);
            if c == q && chars.get(i.wrapping_sub(1)) != Some(&'\\') {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ' ' if depth == 0 => {
                let prev = i.checked_sub(1).and_then(|p| chars.get(p));
                let next = chars.get(i + 1);
                if prev.is_some_and(|p| punct.contains(p)) || next.is_some_and(|n| punct.contains(n)) {
                    continue;
                }
            }
            ' ' if punct.contains(&',') => {
                // Inside parentheses only commas are tightened.
                let prev = i.checked_sub(1).and_then(|p| chars.get(p));
                let next = chars.get(i + 1);
                if prev == Some(&',') || next == Some(&',') {
                    continue;
                }
            }
            _ => {}
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_blocks_and_declarations() {
        let nodes = parse(
            "/* head */\n@charset \"utf-8\";\nbody { margin : 0;\n  color: red }\n@media (min-width: 768px) { a { color: blue; } }",
        )
        .unwrap();
        assert_eq!(
            nodes,
            vec![
                Node::Comment("/* head */".into()),
                Node::Statement("@charset \"utf-8\"".into()),
                Node::block("body", vec![Node::decl("margin", "0"), Node::decl("color", "red")]),
                Node::block(
                    "@media (min-width: 768px)",
                    vec![Node::block("a", vec![Node::decl("color", "blue")])]
                ),
            ]
        );
    }

    #[test]
    fn semicolons_inside_urls_and_strings_are_not_terminators() {
        let nodes = parse(r#"a { background: url(data:image/png;base64,AAA); content: "x;y"; }"#).unwrap();
        let Node::Block { children, .. } = &nodes[0] else {
            panic!("expected block");
        };
        assert_eq!(children.len(), 2);
        assert_eq!(children[0], Node::decl("background", "url(data:image/png;base64,AAA)"));
        assert_eq!(children[1], Node::decl("content", "\"x;y\""));
    }

    #[test]
    fn unbalanced_input_is_rejected() {
        assert!(parse("a { color: red;").is_err());
        assert!(parse("a { color: red; } }").is_err());
        assert!(parse("/* open").is_err());
    }

    #[test]
    fn minified_keeps_preservation_comments_only() {
        let nodes = parse("/*! license */\n/* note */\nh1, h2 > span { color: red; margin: 0 auto; }").unwrap();
        assert_eq!(
            render_minified(&nodes),
            "/*! license */h1,h2>span{color:red;margin:0 auto}"
        );
    }

    #[test]
    fn pretty_output_is_indented() {
        let nodes = parse("@media print{a{color:red}}").unwrap();
        assert_eq!(
            render_pretty(&nodes),
            "@media print {\n  a {\n    color: red;\n  }\n}\n"
        );
    }

    #[test]
    fn collapse_whitespace_preserves_strings() {
        assert_eq!(collapse_ws("a   b \"x   y\"\n c"), "a b \"x   y\" c");
    }
}
