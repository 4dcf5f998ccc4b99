//! Human-renderable trees.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tzindex_micheline::prim as p;
use tzindex_micheline::{
    decode_address, decode_chain_id, decode_key_hash, decode_public_key, decode_signature,
    Micheline,
};

use crate::error::EngineError;
use crate::metadata::{classify, entry_name};
use crate::node::{Node, NodeKind, ScalarPrim};

/// `9999-12-31T23:59:59Z`, the last instant RFC 3339 can express.
const MAX_RENDERABLE_TIMESTAMP: i64 = 253_402_300_799;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffType {
    Created,
    Updated,
    Deleted,
}

/// One node of a rendered tree. A missing `diff_type` means unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderNode {
    pub prim: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_type: Option<DiffType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RenderNode>,
}

impl RenderNode {
    fn new(node: &Node, kind: &str) -> Self {
        RenderNode {
            prim: node.prim().to_string(),
            kind: kind.to_string(),
            name: Some(node.display_name()),
            value: None,
            from: None,
            diff_type: None,
            children: Vec::new(),
        }
    }

    /// Tag this node and every descendant.
    pub(crate) fn tag_all(mut self, diff: DiffType) -> Self {
        self.diff_type = Some(diff);
        self.children = self
            .children
            .into_iter()
            .map(|c| c.tag_all(diff))
            .collect();
        self
    }

    pub fn has_changes(&self) -> bool {
        self.diff_type.is_some() || self.children.iter().any(RenderNode::has_changes)
    }
}

impl Node {
    /// Render a settled node.
    pub fn render(&self) -> Result<RenderNode, EngineError> {
        let unsettled = || EngineError::Unsettled {
            path: self.path.clone(),
        };

        let node = match &self.kind {
            NodeKind::Scalar { prim, value, .. } => {
                let value = value.as_ref().ok_or_else(unsettled)?;
                let mut out = RenderNode::new(self, prim.as_str());
                out.value = scalar_value(*prim, value)?;
                out
            }
            NodeKind::Contract { value, .. } => {
                let value = value.as_ref().ok_or_else(unsettled)?;
                let mut out = RenderNode::new(self, p::CONTRACT);
                out.value = Some(Value::String(scalar_text(ScalarPrim::Address, value)?));
                out
            }
            NodeKind::Ticket { inner } => {
                let mut out = RenderNode::new(self, p::TICKET);
                out.children = inner.render()?.children;
                out
            }
            NodeKind::Option { inner, some } => match some.ok_or_else(unsettled)? {
                true => {
                    let mut out = inner.render()?;
                    out.name = Some(self.display_name());
                    out
                }
                false => RenderNode::new(self, p::OPTION),
            },
            NodeKind::Pair { .. } => {
                let shape = classify(self).map(|s| s.as_str()).unwrap_or(p::PAIR);
                let mut out = RenderNode::new(self, shape);
                for field in self.pair_fields() {
                    out.children.push(field.render()?);
                }
                out
            }
            NodeKind::Or { .. } => {
                let shape = classify(self);
                let chosen = self.chosen_alternative().ok_or_else(unsettled)?;
                let mut out = RenderNode::new(self, shape.map(|s| s.as_str()).unwrap_or(p::OR));
                if shape.is_some_and(|s| s.is_enum()) {
                    let label = entry_name(chosen).unwrap_or_else(|| chosen.display_name());
                    out.value = Some(Value::String(label));
                } else {
                    let mut child = chosen.render()?;
                    if let Some(label) = entry_name(chosen) {
                        child.name = Some(label);
                    }
                    out.children.push(child);
                }
                out
            }
            NodeKind::List { items, .. } | NodeKind::Set { items, .. } => {
                let items = items.as_ref().ok_or_else(unsettled)?;
                let mut out = RenderNode::new(self, self.prim());
                for item in items {
                    let mut child = item.render()?;
                    child.name = None;
                    out.children.push(child);
                }
                out
            }
            NodeKind::Map { entries, .. } => {
                let entries = entries.as_ref().ok_or_else(unsettled)?;
                let mut out = RenderNode::new(self, p::MAP);
                out.children = render_entries(entries)?;
                out
            }
            NodeKind::BigMap { ptr, entries, .. } => {
                if ptr.is_none() && entries.is_none() {
                    return Err(unsettled());
                }
                let mut out = RenderNode::new(self, p::BIG_MAP);
                out.value = ptr.map(Value::from);
                if let Some(entries) = entries {
                    out.children = render_entries(entries)?;
                }
                out
            }
            NodeKind::Lambda { code, .. } => {
                let code = code.as_ref().ok_or_else(unsettled)?;
                let mut out = RenderNode::new(self, p::LAMBDA);
                out.value = Some(code.to_json());
                out
            }
        };
        Ok(node)
    }

    /// String-like leaves of a settled tree, decoded to their text form.
    pub fn collect_strings(&self) -> Result<Vec<String>, EngineError> {
        let mut out = Vec::new();
        self.collect_strings_into(&mut out)?;
        Ok(out)
    }

    fn collect_strings_into(&self, out: &mut Vec<String>) -> Result<(), EngineError> {
        match &self.kind {
            NodeKind::Scalar {
                prim,
                value: Some(value),
                ..
            } if prim.is_string_like() => out.push(scalar_text(*prim, value)?),
            NodeKind::Scalar { .. } => {}
            NodeKind::Contract { value, .. } => {
                if let Some(value) = value {
                    out.push(scalar_text(ScalarPrim::Address, value)?);
                }
            }
            NodeKind::Ticket { inner } => inner.collect_strings_into(out)?,
            NodeKind::Option { inner, some } => {
                if *some == Some(true) {
                    inner.collect_strings_into(out)?;
                }
            }
            NodeKind::Pair { left, right } => {
                left.collect_strings_into(out)?;
                right.collect_strings_into(out)?;
            }
            NodeKind::Or { left, right, side } => match side {
                Some(crate::node::Side::Left) => left.collect_strings_into(out)?,
                Some(crate::node::Side::Right) => right.collect_strings_into(out)?,
                None => {}
            },
            NodeKind::List { items, .. } | NodeKind::Set { items, .. } => {
                for item in items.iter().flatten() {
                    item.collect_strings_into(out)?;
                }
            }
            NodeKind::Map { entries, .. } | NodeKind::BigMap { entries, .. } => {
                for (key, value) in entries.iter().flatten() {
                    key.collect_strings_into(out)?;
                    value.collect_strings_into(out)?;
                }
            }
            NodeKind::Lambda { .. } => {}
        }
        Ok(())
    }

    /// Short text form of a settled key, used to name map entries.
    pub(crate) fn key_label(&self) -> Result<String, EngineError> {
        let rendered = self.render()?;
        Ok(match rendered.value {
            Some(Value::String(s)) => s,
            Some(Value::Null) | None => match &self.kind {
                NodeKind::Scalar { value: Some(v), .. } => v.to_json().to_string(),
                _ => self.to_wire(false)?.to_json().to_string(),
            },
            Some(other) => other.to_string(),
        })
    }
}

fn render_entries(entries: &[(Node, Node)]) -> Result<Vec<RenderNode>, EngineError> {
    let mut children = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        let mut child = value.render()?;
        child.name = Some(key.key_label()?);
        children.push(child);
    }
    Ok(children)
}

/// Rendered value of a settled scalar.
pub(crate) fn scalar_value(prim: ScalarPrim, value: &Micheline) -> Result<Option<Value>, EngineError> {
    let rendered = match prim {
        ScalarPrim::Unit => None,
        ScalarPrim::Bool => Some(Value::Bool(value.is_prim(p::D_TRUE))),
        ScalarPrim::Operation
        | ScalarPrim::Never
        | ScalarPrim::SaplingState
        | ScalarPrim::SaplingTransaction => Some(value.to_json()),
        _ => Some(Value::String(scalar_text(prim, value)?)),
    };
    Ok(rendered)
}

/// Text form of a literal: decimal for ints, hex for bytes, base58 for
/// packed addresses and keys, RFC 3339 for renderable timestamps.
pub(crate) fn scalar_text(prim: ScalarPrim, value: &Micheline) -> Result<String, EngineError> {
    let text = match (prim, value) {
        (ScalarPrim::Timestamp, Micheline::Int { int }) => format_timestamp(int),
        (ScalarPrim::Timestamp, Micheline::String { string }) => {
            match OffsetDateTime::parse(string, &Rfc3339) {
                Ok(ts) => ts.format(&Rfc3339).unwrap_or_else(|_| string.clone()),
                Err(_) => string.clone(),
            }
        }
        (ScalarPrim::Address, Micheline::Bytes { bytes }) => decode_address(bytes)?,
        (ScalarPrim::Key, Micheline::Bytes { bytes }) => decode_public_key(bytes)?,
        (ScalarPrim::KeyHash, Micheline::Bytes { bytes }) => decode_key_hash(bytes)?,
        (ScalarPrim::Signature, Micheline::Bytes { bytes }) => decode_signature(bytes)?,
        (ScalarPrim::ChainId, Micheline::Bytes { bytes }) => decode_chain_id(bytes)?,
        (_, Micheline::Int { int }) => int.clone(),
        (_, Micheline::String { string }) => string.clone(),
        (_, Micheline::Bytes { bytes }) => bytes.clone(),
        (_, other) => other.to_json().to_string(),
    };
    Ok(text)
}

fn format_timestamp(int: &str) -> String {
    let Ok(seconds) = int.parse::<i64>() else {
        return int.to_string();
    };
    if seconds >= MAX_RENDERABLE_TIMESTAMP {
        return int.to_string();
    }
    OffsetDateTime::from_unix_timestamp(seconds)
        .ok()
        .and_then(|ts| ts.format(&Rfc3339).ok())
        .unwrap_or_else(|| int.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::parse_type;
    use serde_json::json;
    use tzindex_micheline::from_json;

    fn settled(t: serde_json::Value, v: serde_json::Value) -> Node {
        let mut node = parse_type(&from_json(&t).unwrap()).unwrap();
        node.settle(&from_json(&v).unwrap()).unwrap();
        node
    }

    #[test]
    fn renders_timestamps_and_packed_addresses() {
        let node = settled(
            json!({"prim": "pair", "args": [
                {"prim": "timestamp", "annots": ["%at"]},
                {"prim": "address", "annots": ["%who"]}
            ]}),
            json!({"prim": "Pair", "args": [
                {"int": "1600000000"},
                {"bytes": "000085ef0c18b31983603d978a152de4cd61803db881"}
            ]}),
        );
        let out = node.render().unwrap();
        assert_eq!(out.kind, "named_tuple");
        assert_eq!(out.children[0].value, Some(json!("2020-09-13T12:26:40Z")));
        assert_eq!(
            out.children[1].value,
            Some(json!("tz1XrCvviH8CqoHMSKpKuznLArEa1yR9U7ep"))
        );
    }

    #[test]
    fn huge_timestamp_stays_raw() {
        let node = settled(json!({"prim": "timestamp"}), json!({"int": "253402300800"}));
        assert_eq!(node.render().unwrap().value, Some(json!("253402300800")));
    }

    #[test]
    fn bool_renders_from_constructor() {
        let node = settled(json!({"prim": "bool"}), json!({"prim": "False"}));
        assert_eq!(node.render().unwrap().value, Some(json!(false)));
    }

    #[test]
    fn enum_renders_chosen_name() {
        let node = settled(
            json!({"prim": "or", "args": [
                {"prim": "unit", "annots": ["%on"]},
                {"prim": "unit", "annots": ["%off"]}
            ]}),
            json!({"prim": "Right", "args": [{"prim": "Unit"}]}),
        );
        let out = node.render().unwrap();
        assert_eq!(out.kind, "named_enum");
        assert_eq!(out.value, Some(json!("off")));
        assert!(out.children.is_empty());
    }

    #[test]
    fn map_children_are_named_by_key() {
        let node = settled(
            json!({"prim": "map", "args": [{"prim": "string"}, {"prim": "nat"}]}),
            json!([{"prim": "Elt", "args": [{"string": "alice"}, {"int": "3"}]}]),
        );
        let out = node.render().unwrap();
        assert_eq!(out.children.len(), 1);
        assert_eq!(out.children[0].name.as_deref(), Some("alice"));
        assert_eq!(out.children[0].value, Some(json!("3")));
    }

    #[test]
    fn pointer_only_big_map_renders_pointer() {
        let node = settled(
            json!({"prim": "big_map", "args": [{"prim": "string"}, {"prim": "nat"}]}),
            json!({"int": "17"}),
        );
        let out = node.render().unwrap();
        assert_eq!(out.value, Some(json!(17)));
        assert!(out.children.is_empty());
    }

    #[test]
    fn unsettled_render_fails() {
        let node = parse_type(&from_json(&json!({"prim": "nat"})).unwrap()).unwrap();
        assert!(matches!(node.render(), Err(EngineError::Unsettled { .. })));
    }

    #[test]
    fn collects_string_like_leaves() {
        let node = settled(
            json!({"prim": "pair", "args": [
                {"prim": "list", "args": [{"prim": "string"}]},
                {"prim": "pair", "args": [{"prim": "nat"}, {"prim": "key_hash"}]}
            ]}),
            json!({"prim": "Pair", "args": [
                [{"string": "a"}, {"string": "b"}],
                {"int": "1"},
                {"string": "tz1XrCvviH8CqoHMSKpKuznLArEa1yR9U7ep"}
            ]}),
        );
        assert_eq!(
            node.collect_strings().unwrap(),
            vec!["a", "b", "tz1XrCvviH8CqoHMSKpKuznLArEa1yR9U7ep"]
        );
    }
}
