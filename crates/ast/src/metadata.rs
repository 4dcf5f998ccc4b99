//! Path-indexed metadata and shape classification.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::node::{Node, NodeKind};

const LIQUIDITY_ENTRY_PREFIX: &str = "_Liq_entry_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    Tuple,
    NamedTuple,
    Enum,
    NamedEnum,
    Union,
    NamedUnion,
}

impl Shape {
    pub fn as_str(self) -> &'static str {
        match self {
            Shape::Tuple => "tuple",
            Shape::NamedTuple => "named_tuple",
            Shape::Enum => "enum",
            Shape::NamedEnum => "named_enum",
            Shape::Union => "union",
            Shape::NamedUnion => "named_union",
        }
    }

    pub fn is_named(self) -> bool {
        matches!(self, Shape::NamedTuple | Shape::NamedEnum | Shape::NamedUnion)
    }

    pub fn is_enum(self) -> bool {
        matches!(self, Shape::Enum | Shape::NamedEnum)
    }
}

/// Name of an `or` alternative: field annotation without the Liquidity
/// entry prefix, else type annotation.
pub fn entry_name(node: &Node) -> Option<String> {
    if let Some(field) = node.annots.field.as_deref() {
        let name = field.strip_prefix(LIQUIDITY_ENTRY_PREFIX).unwrap_or(field);
        if !name.is_empty() {
            return Some(name.to_string());
        }
    }
    node.annots.type_name.clone()
}

/// Classify a pair or or node. Other kinds have no shape.
pub fn classify(node: &Node) -> Option<Shape> {
    match &node.kind {
        NodeKind::Pair { .. } => {
            let names: Vec<Option<String>> = node
                .pair_fields()
                .iter()
                .map(|f| f.name().map(str::to_string))
                .collect();
            Some(if all_distinct(&names) {
                Shape::NamedTuple
            } else {
                Shape::Tuple
            })
        }
        NodeKind::Or { .. } => {
            let alternatives = node.or_alternatives();
            let names: Vec<Option<String>> =
                alternatives.iter().map(|(_, n)| entry_name(n)).collect();
            let named = all_distinct(&names);
            let all_unit = alternatives
                .iter()
                .all(|(_, n)| n.is_prim(tzindex_micheline::prim::UNIT));
            Some(match (all_unit, named) {
                (true, true) => Shape::NamedEnum,
                (true, false) => Shape::Enum,
                (false, true) => Shape::NamedUnion,
                (false, false) => Shape::Union,
            })
        }
        _ => None,
    }
}

fn all_distinct(names: &[Option<String>]) -> bool {
    let mut seen = HashSet::new();
    names
        .iter()
        .all(|n| matches!(n, Some(name) if seen.insert(name.as_str())))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMetadata {
    pub prim: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    /// Name passed down from an enclosing `option`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inherited_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape: Option<Shape>,
    /// Child paths; flattened fields or alternatives for pairs and ors.
    pub args: Vec<String>,
    pub name: String,
    /// Parameter type of a lambda or contract.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
}

/// Metadata of every node, keyed by structural path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata(BTreeMap<String, NodeMetadata>);

impl Metadata {
    pub fn build(root: &Node) -> Self {
        let mut metadata = Metadata::default();
        metadata.visit(root, None);
        metadata
    }

    pub fn extend(&mut self, other: Metadata) {
        self.0.extend(other.0);
    }

    pub fn get(&self, path: &str) -> Option<&NodeMetadata> {
        self.0.get(path)
    }

    /// Path of the first node named `name`.
    pub fn find(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(_, m)| m.name == name)
            .map(|(path, _)| path.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &NodeMetadata)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn visit(&mut self, node: &Node, inherited: Option<String>) {
        let name = node
            .name()
            .map(str::to_string)
            .or_else(|| inherited.clone())
            .unwrap_or_else(|| node.display_name());

        let args = match &node.kind {
            NodeKind::Pair { .. } => node.pair_fields().iter().map(|n| n.path.clone()).collect(),
            NodeKind::Or { .. } => node
                .or_alternatives()
                .iter()
                .map(|(_, n)| n.path.clone())
                .collect(),
            _ => node
                .type_children()
                .iter()
                .map(|n| n.path.clone())
                .collect(),
        };
        let parameter = match &node.kind {
            NodeKind::Lambda { parameter, .. } | NodeKind::Contract { parameter, .. } => {
                Some(parameter.prim().to_string())
            }
            _ => None,
        };

        for child in node.type_children() {
            let passed = match node.kind {
                NodeKind::Option { .. } => Some(name.clone()),
                _ => None,
            };
            self.visit(child, passed);
        }

        self.0.insert(
            node.path.clone(),
            NodeMetadata {
                prim: node.prim().to_string(),
                field_name: node.annots.field.clone(),
                type_name: node.annots.type_name.clone(),
                inherited_name: inherited,
                shape: classify(node),
                args,
                name,
                parameter,
            },
        );
    }
}
