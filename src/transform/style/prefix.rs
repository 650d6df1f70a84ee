// src/transform/style/prefix.rs

//! Vendor prefixing from a static table.
//!
//! For each listed property (or property/value pair) the prefixed variants
//! are inserted before the standard declaration, unless the block already
//! declares them.

use super::css::Node;

/// Properties that still need prefixes in the supported browser range.
const PROPERTY_PREFIXES: &[(&str, &[&str])] = &[
    ("appearance", &["-webkit-", "-moz-"]),
    ("backdrop-filter", &["-webkit-"]),
    ("box-decoration-break", &["-webkit-"]),
    ("clip-path", &["-webkit-"]),
    ("hyphens", &["-webkit-", "-ms-"]),
    ("mask", &["-webkit-"]),
    ("mask-image", &["-webkit-"]),
    ("tab-size", &["-moz-"]),
    ("text-size-adjust", &["-webkit-", "-moz-", "-ms-"]),
    ("user-select", &["-webkit-", "-moz-", "-ms-"]),
];

/// `(property, value)` pairs whose *value* takes the prefix.
const VALUE_PREFIXES: &[(&str, &str, &[&str])] = &[("position", "sticky", &["-webkit-"])];

pub fn add_vendor_prefixes(nodes: Vec<Node>) -> Vec<Node> {
    let existing: Vec<(String, String)> = nodes
        .iter()
        .filter_map(|n| match n {
            Node::Declaration { property, value } => Some((property.clone(), value.clone())),
            _ => None,
        })
        .collect();
    let has = |prop: &str, value: Option<&str>| {
        existing
            .iter()
            .any(|(p, v)| p == prop && value.is_none_or(|want| v == want))
    };

    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            Node::Block { prelude, children } => {
                out.push(Node::Block {
                    prelude,
                    children: add_vendor_prefixes(children),
                });
            }
            Node::Declaration { property, value } => {
                let lower = property.to_ascii_lowercase();
                if let Some((_, prefixes)) = PROPERTY_PREFIXES.iter().find(|(p, _)| *p == lower) {
                    for prefix in *prefixes {
                        let prefixed = format!("{prefix}{lower}");
                        if !has(&prefixed, None) {
                            out.push(Node::decl(prefixed, value.clone()));
                        }
                    }
                }
                for (prop, val, prefixes) in VALUE_PREFIXES {
                    if *prop == lower && value.eq_ignore_ascii_case(val) {
                        for prefix in *prefixes {
                            let prefixed = format!("{prefix}{val}");
                            if !has(&property, Some(prefixed.as_str())) {
                                out.push(Node::decl(property.clone(), prefixed));
                            }
                        }
                    }
                }
                out.push(Node::Declaration { property, value });
            }
            other => out.push(other),
        }
    }
    out
}
