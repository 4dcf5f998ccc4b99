use std::collections::BTreeMap;

use tzindex_ast::{Node, NodeKind, Side, TypeTree};
use tzindex_micheline::Micheline;

use crate::error::ResolveError;

/// Settle `storage` against the storage type and map every big-map pointer
/// it holds to the big map's structural path.
pub fn find_big_map_pointers(
    storage_type: &TypeTree,
    storage: &Micheline,
) -> Result<BTreeMap<i64, String>, ResolveError> {
    let mut tree = storage_type.clone();
    tree.settle_value(storage)?;
    let mut out = BTreeMap::new();
    for node in &tree.nodes {
        collect(node, &mut out);
    }
    Ok(out)
}

fn collect(node: &Node, out: &mut BTreeMap<i64, String>) {
    match &node.kind {
        NodeKind::BigMap { ptr, .. } => {
            if let Some(ptr) = ptr {
                out.insert(*ptr, node.path.clone());
            }
        }
        NodeKind::Pair { left, right } => {
            collect(left, out);
            collect(right, out);
        }
        NodeKind::Or { left, right, side } => match side {
            Some(Side::Left) => collect(left, out),
            Some(Side::Right) => collect(right, out),
            None => {}
        },
        NodeKind::Option { inner, some } => {
            if *some == Some(true) {
                collect(inner, out);
            }
        }
        NodeKind::Ticket { inner } => collect(inner, out),
        NodeKind::List { items, .. } | NodeKind::Set { items, .. } => {
            for item in items.iter().flatten() {
                collect(item, out);
            }
        }
        NodeKind::Map { entries, .. } => {
            for (_, value) in entries.iter().flatten() {
                collect(value, out);
            }
        }
        NodeKind::Scalar { .. } | NodeKind::Contract { .. } | NodeKind::Lambda { .. } => {}
    }
}

/// Type node at a structural path such as `0/1/0`.
pub fn schema_at<'a>(tree: &'a TypeTree, path: &str) -> Option<&'a Node> {
    let mut stack: Vec<&Node> = tree.nodes.iter().collect();
    while let Some(node) = stack.pop() {
        if node.path == path {
            return Some(node);
        }
        if path.starts_with(&node.path) {
            stack.extend(node.type_children());
        }
    }
    None
}
