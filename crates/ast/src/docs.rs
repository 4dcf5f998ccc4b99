//! Type documentation as a list of named typedefs.
//!
//! Scalars and compact shapes are inlined into their parent's type string
//! (`list(nat)`, `pair(nat, address)`); every other composite becomes its
//! own typedef, referenced as `$name`.

use serde::{Deserialize, Serialize};

use crate::metadata::{classify, entry_name};
use crate::node::{Node, NodeKind};

/// Entry point selector meaning "the whole tree".
pub const DOCS_FULL: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedefArg {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Typedef {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<TypedefArg>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrypointType {
    pub name: String,
    #[serde(rename = "typedef")]
    pub typedefs: Vec<Typedef>,
}

/// Typedefs for `node`, its own definition first.
pub fn node_docs(node: &Node, name: &str) -> Vec<Typedef> {
    let (reference, mut defs) = describe(node, name);
    if !reference.starts_with('$') {
        defs.insert(
            0,
            Typedef {
                name: name.to_string(),
                kind: reference,
                args: Vec::new(),
            },
        );
    }
    defs
}

/// Returns the type reference to use in a parent plus the typedefs this
/// node contributes.
fn describe(node: &Node, inferred: &str) -> (String, Vec<Typedef>) {
    let name = node
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| inferred.to_string());

    match &node.kind {
        NodeKind::Scalar { .. } => (node.prim().to_string(), Vec::new()),
        NodeKind::Option { inner, .. } => wrap(node.prim(), inner, &name),
        NodeKind::List { elem, .. } | NodeKind::Set { elem, .. } => {
            wrap(node.prim(), elem, &format!("{}_item", name))
        }
        NodeKind::Contract { parameter, .. } => {
            wrap(node.prim(), parameter, &format!("{}_param", name))
        }
        NodeKind::Ticket { inner } => match ticket_content(inner) {
            Some(content) => wrap(node.prim(), content, &format!("{}_value", name)),
            None => (node.prim().to_string(), Vec::new()),
        },
        NodeKind::Pair { .. } => {
            let fields = node.pair_fields();
            let named = classify(node).is_some_and(|s| s.is_named());
            let parts: Vec<(String, &Node)> =
                fields.iter().map(|f| (f.display_name(), *f)).collect();
            members(node, &name, parts, fields.len() == 2 && !named)
        }
        NodeKind::Or { .. } => {
            let alternatives = node.or_alternatives();
            let named = classify(node).is_some_and(|s| s.is_named());
            let parts: Vec<(String, &Node)> = alternatives
                .iter()
                .map(|(_, alt)| (entry_name(alt).unwrap_or_else(|| alt.display_name()), *alt))
                .collect();
            members(node, &name, parts, alternatives.len() == 2 && !named)
        }
        NodeKind::Map { key, value, .. } | NodeKind::BigMap { key, value, .. } => binary(
            node.prim(),
            &name,
            (key.as_ref(), format!("{}_key", name)),
            (value.as_ref(), format!("{}_value", name)),
        ),
        NodeKind::Lambda { parameter, ret, .. } => binary(
            node.prim(),
            &name,
            (parameter.as_ref(), format!("{}_param", name)),
            (ret.as_ref(), format!("{}_return", name)),
        ),
    }
}

/// Single-argument constructors are always compact.
fn wrap(prim: &str, inner: &Node, inner_name: &str) -> (String, Vec<Typedef>) {
    let (reference, defs) = describe(inner, inner_name);
    (format!("{}({})", prim, reference), defs)
}

/// Pairs and ors: compact when binary, unnamed and scalar on both sides.
fn members(
    node: &Node,
    name: &str,
    parts: Vec<(String, &Node)>,
    may_be_compact: bool,
) -> (String, Vec<Typedef>) {
    if may_be_compact && parts.iter().all(|(_, n)| n.is_scalar()) {
        let refs: Vec<&str> = parts.iter().map(|(_, n)| n.prim()).collect();
        return (format!("{}({})", node.prim(), refs.join(", ")), Vec::new());
    }

    let mut nested = Vec::new();
    let mut args = Vec::with_capacity(parts.len());
    for (key, part) in parts {
        let (reference, defs) = describe(part, &key);
        args.push(TypedefArg {
            key,
            value: reference,
        });
        nested.extend(defs);
    }
    complex(name, node.prim().to_string(), args, nested)
}

/// Maps, big maps and lambdas: compact when both type arguments are scalar.
fn binary(
    prim: &str,
    name: &str,
    first: (&Node, String),
    second: (&Node, String),
) -> (String, Vec<Typedef>) {
    let (a_ref, a_defs) = describe(first.0, &first.1);
    let (b_ref, b_defs) = describe(second.0, &second.1);
    let kind = format!("{}({}, {})", prim, a_ref, b_ref);
    if first.0.is_scalar() && second.0.is_scalar() {
        return (kind, Vec::new());
    }
    let args = vec![
        TypedefArg {
            key: first.1,
            value: a_ref,
        },
        TypedefArg {
            key: second.1,
            value: b_ref,
        },
    ];
    let mut nested = a_defs;
    nested.extend(b_defs);
    complex(name, kind, args, nested)
}

fn complex(
    name: &str,
    kind: String,
    args: Vec<TypedefArg>,
    nested: Vec<Typedef>,
) -> (String, Vec<Typedef>) {
    let mut defs = vec![Typedef {
        name: name.to_string(),
        kind,
        args,
    }];
    defs.extend(nested);
    (format!("${}", name), defs)
}

/// Content type of a ticket's `pair address (pair content nat)` value shape.
fn ticket_content(inner: &Node) -> Option<&Node> {
    match &inner.kind {
        NodeKind::Pair { right, .. } => match &right.kind {
            NodeKind::Pair { left, .. } => Some(left.as_ref()),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::parse_type;
    use serde_json::json;
    use tzindex_micheline::from_json;

    fn ty(v: serde_json::Value) -> Node {
        parse_type(&from_json(&v).unwrap()).unwrap()
    }

    #[test]
    fn compact_shapes_are_inlined() {
        let node = ty(json!({"prim": "list", "args": [
            {"prim": "pair", "args": [{"prim": "nat"}, {"prim": "address"}]}
        ]}));
        let docs = node_docs(&node, "transfers");
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].kind, "list(pair(nat, address))");
    }

    #[test]
    fn named_pair_gets_typedef() {
        let node = ty(json!({"prim": "pair", "args": [
            {"prim": "address", "annots": ["%to"]},
            {"prim": "pair", "args": [
                {"prim": "nat", "annots": ["%token_id"]},
                {"prim": "map", "annots": ["%meta"], "args": [
                    {"prim": "string"},
                    {"prim": "pair", "args": [{"prim": "nat", "annots": ["%a"]}, {"prim": "nat", "annots": ["%b"]}]}
                ]}
            ]}
        ]}));
        let docs = node_docs(&node, "transfer");
        assert_eq!(docs[0].name, "transfer");
        assert_eq!(docs[0].kind, "pair");
        let args: Vec<(&str, &str)> = docs[0]
            .args
            .iter()
            .map(|a| (a.key.as_str(), a.value.as_str()))
            .collect();
        assert_eq!(
            args,
            vec![("to", "address"), ("token_id", "nat"), ("meta", "$meta")]
        );
        assert_eq!(docs[1].name, "meta");
        assert_eq!(docs[1].kind, "map(string, $meta_value)");
        assert_eq!(docs[2].name, "meta_value");
        assert_eq!(docs.len(), 3);
    }

    #[test]
    fn scalar_root_is_single_typedef() {
        let docs = node_docs(&ty(json!({"prim": "nat"})), "default");
        assert_eq!(
            docs,
            vec![Typedef {
                name: "default".to_string(),
                kind: "nat".to_string(),
                args: vec![]
            }]
        );
    }
}
