// src/transform/style/media.rs

//! Media-query packing.
//!
//! Top-level `@media` blocks with identical queries are merged, moved after
//! all other rules and sorted mobile-first:
//!
//! 1. `min-width` queries, ascending
//! 2. `max-width` queries, descending
//! 3. other screen queries, in first-seen order
//! 4. `print` queries
//!
//! The sort is stable, so queries of equal rank keep source order.

use std::cmp::Ordering;
use std::sync::LazyLock;

use regex::Regex;

use super::css::Node;

static MIN_WIDTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"min-width\s*:\s*([0-9]*\.?[0-9]+)\s*(px|em|rem)?").expect("valid regex")
});
static MAX_WIDTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"max-width\s*:\s*([0-9]*\.?[0-9]+)\s*(px|em|rem)?").expect("valid regex")
});

pub fn pack_media_queries(nodes: Vec<Node>) -> Vec<Node> {
    let mut rest = Vec::with_capacity(nodes.len());
    let mut groups: Vec<(String, Vec<Node>)> = Vec::new();

    for node in nodes {
        match node {
            Node::Block { prelude, children } if is_media(&prelude) => {
                let query = prelude["@media".len()..].trim().to_string();
                match groups.iter_mut().find(|(q, _)| *q == query) {
                    Some((_, merged)) => merged.extend(children),
                    None => groups.push((query, children)),
                }
            }
            other => rest.push(other),
        }
    }

    groups.sort_by(|(a, _), (b, _)| compare_queries(a, b));

    rest.extend(
        groups
            .into_iter()
            .map(|(query, children)| Node::block(format!("@media {query}"), children)),
    );
    rest
}

fn is_media(prelude: &str) -> bool {
    prelude
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("@media"))
}

fn width(re: &Regex, query: &str) -> Option<f64> {
    let caps = re.captures(query)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    let scale = match caps.get(2).map(|m| m.as_str()) {
        Some("em" | "rem") => 16.0,
        _ => 1.0,
    };
    Some(value * scale)
}

/// Rank plus a numeric key within the rank.
fn sort_key(query: &str) -> (u8, f64) {
    let lower = query.to_ascii_lowercase();
    if lower.contains("print") {
        return (3, 0.0);
    }
    if let Some(min) = width(&MIN_WIDTH, &lower) {
        return (0, min);
    }
    if let Some(max) = width(&MAX_WIDTH, &lower) {
        return (1, -max);
    }
    (2, 0.0)
}

fn compare_queries(a: &str, b: &str) -> Ordering {
    let (rank_a, key_a) = sort_key(a);
    let (rank_b, key_b) = sort_key(b);
    rank_a.cmp(&rank_b).then(key_a.total_cmp(&key_b))
}
