//! Multi-root typed trees: the public entry point of the engine.

use std::cmp::Ordering;

use serde_json::{Map, Value};
use tracing::debug;
use tzindex_micheline::prim as p;
use tzindex_micheline::Micheline;
use tzindex_storage::BigMapDiff;

use crate::docs::{node_docs, EntrypointType, Typedef, DOCS_FULL};
use crate::error::EngineError;
use crate::form::FormSchema;
use crate::metadata::{entry_name, Metadata};
use crate::node::{parse_type_at, Node, NodeKind, Side};
use crate::render::RenderNode;

/// An ordered list of root nodes plus whether they have been settled.
///
/// Parameter trees have one root; several roots only appear while
/// entry point alternatives are assembled.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeTree {
    pub nodes: Vec<Node>,
    settled: bool,
}

/// One entry point alternative with the `Left`/`Right` path that selects it.
#[derive(Debug, Clone, PartialEq)]
pub struct Entrypoint<'a> {
    pub name: String,
    pub sides: Vec<Side>,
    pub node: &'a Node,
}

impl TypeTree {
    /// Parse a type expression. A sequence yields one root per item.
    pub fn from_type(expr: &Micheline) -> Result<Self, EngineError> {
        let nodes = match expr {
            Micheline::Seq(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| parse_type_at(item, &i.to_string()))
                .collect::<Result<Vec<_>, _>>()?,
            single => vec![parse_type_at(single, "0")?],
        };
        Ok(TypeTree::from_nodes(nodes))
    }

    pub fn from_nodes(nodes: Vec<Node>) -> Self {
        TypeTree {
            nodes,
            settled: false,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.settled
    }

    /// Bind one value per root.
    ///
    /// A single pair root given a flat list of length other than one reads
    /// the list as the pair's components.
    pub fn settle(&mut self, untyped: &[Micheline]) -> Result<(), EngineError> {
        if self.nodes.len() == 1 && untyped.len() != 1 && self.nodes[0].is_prim(p::PAIR) {
            let wrapped = Micheline::prim(p::D_PAIR, untyped.to_vec());
            self.nodes[0].settle(&wrapped)?;
        } else if untyped.len() == self.nodes.len() {
            for (node, value) in self.nodes.iter_mut().zip(untyped) {
                node.settle(value)?;
            }
        } else {
            return Err(EngineError::arity(self.nodes.len(), untyped.len(), "root"));
        }
        self.settled = true;
        Ok(())
    }

    /// Settle a single wire value against a single-root tree.
    pub fn settle_value(&mut self, value: &Micheline) -> Result<(), EngineError> {
        self.settle(std::slice::from_ref(value))
    }

    pub fn render(&self) -> Result<Vec<RenderNode>, EngineError> {
        self.nodes.iter().map(Node::render).collect()
    }

    /// Wire form of the settled tree; several roots encode as a sequence.
    pub fn to_wire(&self, optimized: bool) -> Result<Micheline, EngineError> {
        match self.nodes.as_slice() {
            [single] => single.to_wire(optimized),
            many => Ok(Micheline::Seq(
                many.iter()
                    .map(|n| n.to_wire(optimized))
                    .collect::<Result<_, _>>()?,
            )),
        }
    }

    pub fn metadata(&self) -> Metadata {
        let mut metadata = Metadata::default();
        for node in &self.nodes {
            metadata.extend(Metadata::build(node));
        }
        metadata
    }

    pub fn collect_strings(&self) -> Result<Vec<String>, EngineError> {
        let mut out = Vec::new();
        for node in &self.nodes {
            out.extend(node.collect_strings()?);
        }
        Ok(out)
    }

    // ── Forms ─────────────────────────────────────────────────────────────

    pub fn to_form_schema(&self) -> Option<FormSchema> {
        match self.nodes.as_slice() {
            [single] => single.to_form_schema(),
            many => {
                let mut root: Option<FormSchema> = None;
                for node in many {
                    if let Some(schema) = node.to_form_schema() {
                        match &mut root {
                            Some(r) => r.properties.extend(schema.properties),
                            None => root = Some(schema),
                        }
                    }
                }
                root
            }
        }
    }

    pub fn from_form_schema(&mut self, values: &Map<String, Value>) -> Result<(), EngineError> {
        for node in &mut self.nodes {
            node.from_form_schema(values)?;
        }
        self.settled = true;
        Ok(())
    }

    // ── Lookups ───────────────────────────────────────────────────────────

    pub fn find_by_name(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find_map(|n| n.find_by_name(name))
    }

    /// Entry points in declaration order. A lone unnamed one is `default`;
    /// other unnamed ones are `entrypoint_N`.
    pub fn entrypoints(&self) -> Vec<Entrypoint<'_>> {
        let mut raw: Vec<(Option<String>, Vec<Side>, &Node)> = Vec::new();
        for node in &self.nodes {
            if node.is_prim(p::OR) {
                for (sides, alt) in node.or_alternatives() {
                    raw.push((entry_name(alt), sides, alt));
                }
            } else {
                raw.push((node.annots.field.clone(), vec![], node));
            }
        }

        if raw.len() == 1 && raw[0].0.is_none() {
            let (_, sides, node) = raw.remove(0);
            return vec![Entrypoint {
                name: p::DEFAULT_ENTRYPOINT.to_string(),
                sides,
                node,
            }];
        }
        raw.into_iter()
            .enumerate()
            .map(|(i, (name, sides, node))| Entrypoint {
                name: name.unwrap_or_else(|| format!("entrypoint_{}", i)),
                sides,
                node,
            })
            .collect()
    }

    pub fn get_entrypoints(&self) -> Vec<String> {
        self.entrypoints().into_iter().map(|e| e.name).collect()
    }

    /// Entry point by name, including `default` and positional names.
    pub fn find_entrypoint(&self, name: &str) -> Option<Entrypoint<'_>> {
        self.entrypoints().into_iter().find(|e| e.name == name)
    }

    fn subtree(&self, name: &str) -> Option<&Node> {
        self.find_entrypoint(name)
            .map(|e| e.node)
            .or_else(|| self.find_by_name(name))
    }

    // ── Parameters ────────────────────────────────────────────────────────

    /// Settle the subtree of `entrypoint` with `data`, or the whole tree
    /// when `entrypoint` is empty or unknown.
    pub fn from_parameters(
        &self,
        entrypoint: &str,
        data: &[Micheline],
    ) -> Result<TypeTree, EngineError> {
        if !entrypoint.is_empty() {
            if let Some(node) = self.subtree(entrypoint) {
                let value = data
                    .first()
                    .ok_or_else(|| EngineError::arity(1, 0, entrypoint))?;
                let mut sub = node.clone();
                sub.settle(value)?;
                return Ok(TypeTree {
                    nodes: vec![sub],
                    settled: true,
                });
            }
        }
        let mut tree = self.clone();
        tree.settle(data)?;
        Ok(tree)
    }

    /// Wire value for `entrypoint` from a settled tree; `None` when the name
    /// is not found.
    pub fn to_parameters(&self, entrypoint: &str) -> Result<Option<Micheline>, EngineError> {
        if entrypoint.is_empty() {
            return self.to_wire(false).map(Some);
        }
        match self.subtree(entrypoint) {
            Some(node) => node.to_wire(false).map(Some),
            None => Ok(None),
        }
    }

    // ── Docs ──────────────────────────────────────────────────────────────

    /// Typedefs of the whole tree (`*`) or of one entry point.
    pub fn docs(&self, entrypoint: &str) -> Vec<Typedef> {
        if entrypoint == DOCS_FULL {
            let mut out = Vec::new();
            for node in &self.nodes {
                out.extend(node_docs(node, &node.display_name()));
            }
            return out;
        }
        match self.find_entrypoint(entrypoint) {
            Some(e) => node_docs(e.node, &e.name),
            None => self
                .find_by_name(entrypoint)
                .map(|node| node_docs(node, entrypoint))
                .unwrap_or_default(),
        }
    }

    pub fn entrypoint_docs(&self) -> Vec<EntrypointType> {
        self.entrypoints()
            .into_iter()
            .map(|e| EntrypointType {
                typedefs: node_docs(e.node, &e.name),
                name: e.name,
            })
            .collect()
    }

    // ── Comparison ────────────────────────────────────────────────────────

    pub fn compare(&self, other: &TypeTree) -> Result<Ordering, EngineError> {
        if self.nodes.len() != other.nodes.len() {
            return Err(EngineError::NotComparable {
                left: format!("{} roots", self.nodes.len()),
                right: format!("{} roots", other.nodes.len()),
            });
        }
        for (a, b) in self.nodes.iter().zip(&other.nodes) {
            match a.compare(b)? {
                Ordering::Equal => continue,
                ord => return Ok(ord),
            }
        }
        Ok(Ordering::Equal)
    }

    pub fn equal_type(&self, other: &TypeTree) -> bool {
        self.nodes.len() == other.nodes.len()
            && self
                .nodes
                .iter()
                .zip(&other.nodes)
                .all(|(a, b)| a.equal_type(b))
    }

    /// Diff of two single-root trees; `None` for other shapes.
    pub fn distinguish(&self, other: &TypeTree) -> Result<Option<RenderNode>, EngineError> {
        match (self.nodes.as_slice(), other.nodes.as_slice()) {
            ([a], [b]) => a.distinguish(b).map(Some),
            _ => Ok(None),
        }
    }

    // ── Enrichment ────────────────────────────────────────────────────────

    /// Merge big-map diffs into every big map whose pointer matches.
    pub fn enrich_big_map(&mut self, diffs: &[BigMapDiff]) -> Result<(), EngineError> {
        for node in &mut self.nodes {
            enrich_node(node, diffs)?;
        }
        Ok(())
    }
}

fn enrich_node(node: &mut Node, diffs: &[BigMapDiff]) -> Result<(), EngineError> {
    match &mut node.kind {
        NodeKind::BigMap {
            key,
            value,
            ptr: Some(ptr),
            entries,
        } => {
            let entries = entries.get_or_insert_with(Vec::new);
            let mut applied = 0usize;
            for diff in diffs.iter().filter(|d| d.ptr == *ptr) {
                let mut k = (**key).clone();
                k.settle(&diff.key)?;
                let wanted = k.to_wire(false)?;
                let existing = entries
                    .iter()
                    .position(|(ek, _)| ek.to_wire(false).ok().as_ref() == Some(&wanted));
                match &diff.value {
                    Some(raw) => {
                        let mut v = (**value).clone();
                        v.settle(raw)?;
                        match existing {
                            Some(i) => entries[i].1 = v,
                            None => entries.push((k, v)),
                        }
                    }
                    None => {
                        if let Some(i) = existing {
                            entries.remove(i);
                        }
                    }
                }
                applied += 1;
            }
            debug!(ptr = *ptr, applied, "enriched big map");
        }
        NodeKind::BigMap { .. }
        | NodeKind::Scalar { .. }
        | NodeKind::Contract { .. }
        | NodeKind::Lambda { .. } => {}
        NodeKind::Ticket { inner } => enrich_node(inner, diffs)?,
        NodeKind::Option { inner, some } => {
            if *some == Some(true) {
                enrich_node(inner, diffs)?;
            }
        }
        NodeKind::Pair { left, right } => {
            enrich_node(left, diffs)?;
            enrich_node(right, diffs)?;
        }
        NodeKind::Or { left, right, side } => match side {
            Some(Side::Left) => enrich_node(left, diffs)?,
            Some(Side::Right) => enrich_node(right, diffs)?,
            None => {}
        },
        NodeKind::List { items, .. } | NodeKind::Set { items, .. } => {
            for item in items.iter_mut().flatten() {
                enrich_node(item, diffs)?;
            }
        }
        NodeKind::Map { entries, .. } => {
            for (_, v) in entries.iter_mut().flatten() {
                enrich_node(v, diffs)?;
            }
        }
    }
    Ok(())
}
