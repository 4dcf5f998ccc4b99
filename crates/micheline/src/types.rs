//! Micheline node types.
//!
//! The JSON shape is the one produced by node RPCs:
//!
//! ```json
//! {"prim": "Pair", "args": [{"int": "1"}, {"string": "tz1..."}], "annots": ["%owner"]}
//! ```

use serde::{Deserialize, Serialize};

use crate::prim::{FIELD_PREFIX, TYPE_PREFIX, VAR_PREFIX};

/// A single node of the wire grammar.
///
/// Variant order matters for the untagged deserializer: sequences first,
/// then the three literal objects, then primitive applications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Micheline {
    Seq(Vec<Micheline>),
    Int { int: String },
    String { string: String },
    Bytes { bytes: String },
    Prim(PrimNode),
}

/// A primitive application: `{"prim", "args", "annots"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimNode {
    pub prim: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Micheline>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annots: Vec<String>,
}

impl Micheline {
    pub fn int(value: impl ToString) -> Self {
        Micheline::Int {
            int: value.to_string(),
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Micheline::String {
            string: value.into(),
        }
    }

    pub fn bytes(hex: impl Into<String>) -> Self {
        Micheline::Bytes { bytes: hex.into() }
    }

    pub fn prim(prim: impl Into<String>, args: Vec<Micheline>) -> Self {
        Micheline::Prim(PrimNode {
            prim: prim.into(),
            args,
            annots: Vec::new(),
        })
    }

    pub fn prim_annotated(
        prim: impl Into<String>,
        args: Vec<Micheline>,
        annots: Vec<String>,
    ) -> Self {
        Micheline::Prim(PrimNode {
            prim: prim.into(),
            args,
            annots,
        })
    }

    pub fn as_prim(&self) -> Option<&PrimNode> {
        match self {
            Micheline::Prim(p) => Some(p),
            _ => None,
        }
    }

    /// True when this is a primitive application named `name`.
    pub fn is_prim(&self, name: &str) -> bool {
        matches!(self, Micheline::Prim(p) if p.prim == name)
    }

    pub fn as_int(&self) -> Option<&str> {
        match self {
            Micheline::Int { int } => Some(int),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            Micheline::String { string } => Some(string),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&str> {
        match self {
            Micheline::Bytes { bytes } => Some(bytes),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[Micheline]> {
        match self {
            Micheline::Seq(items) => Some(items),
            _ => None,
        }
    }

    /// Short description of the node kind for error messages.
    pub fn kind_name(&self) -> String {
        match self {
            Micheline::Seq(_) => "sequence".to_string(),
            Micheline::Int { .. } => "int".to_string(),
            Micheline::String { .. } => "string".to_string(),
            Micheline::Bytes { .. } => "bytes".to_string(),
            Micheline::Prim(p) => p.prim.clone(),
        }
    }

    /// Convert to a `serde_json::Value`.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Rewrite right-combed pair data (`Pair a b c`) into nested binary pairs
    /// (`Pair a (Pair b c)`). Other nodes are returned unchanged.
    pub fn uncomb(self) -> Micheline {
        match self {
            Micheline::Prim(mut p) if p.prim == crate::prim::D_PAIR && p.args.len() > 2 => {
                let rest = p.args.split_off(1);
                let right = Micheline::Prim(PrimNode {
                    prim: p.prim.clone(),
                    args: rest,
                    annots: Vec::new(),
                })
                .uncomb();
                p.args.push(right);
                Micheline::Prim(p)
            }
            other => other,
        }
    }
}

impl PrimNode {
    pub fn annotations(&self) -> Annotations {
        Annotations::parse(&self.annots)
    }
}

// ──────────────────────────────────────────────
// Annotations
// ──────────────────────────────────────────────

/// Annotations split by prefix. Only the first annotation of each kind is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotations {
    /// `%name`
    pub field: Option<String>,
    /// `:name`
    pub type_name: Option<String>,
    /// `@name`
    pub var: Option<String>,
}

impl Annotations {
    pub fn parse(annots: &[String]) -> Self {
        let mut result = Annotations::default();
        for a in annots {
            let mut chars = a.chars();
            let Some(prefix) = chars.next() else {
                continue;
            };
            let name: String = chars.collect();
            if name.is_empty() {
                continue;
            }
            let slot = match prefix {
                FIELD_PREFIX => &mut result.field,
                TYPE_PREFIX => &mut result.type_name,
                VAR_PREFIX => &mut result.var,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(name);
            }
        }
        result
    }

    pub fn is_empty(&self) -> bool {
        self.field.is_none() && self.type_name.is_none() && self.var.is_none()
    }

    /// Back to the wire list, in `%`, `:`, `@` order.
    pub fn to_wire(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(f) = &self.field {
            out.push(format!("{}{}", FIELD_PREFIX, f));
        }
        if let Some(t) = &self.type_name {
            out.push(format!("{}{}", TYPE_PREFIX, t));
        }
        if let Some(v) = &self.var {
            out.push(format!("{}{}", VAR_PREFIX, v));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_every_node_kind() {
        let v = json!([
            {"int": "42"},
            {"string": "hello"},
            {"bytes": "00ff"},
            {"prim": "Pair", "args": [{"int": "1"}, {"prim": "Unit"}], "annots": ["%p"]}
        ]);
        let m: Micheline = serde_json::from_value(v).unwrap();
        let items = m.as_seq().unwrap();
        assert_eq!(items[0].as_int(), Some("42"));
        assert_eq!(items[1].as_string(), Some("hello"));
        assert_eq!(items[2].as_bytes(), Some("00ff"));
        let pair = items[3].as_prim().unwrap();
        assert_eq!(pair.prim, "Pair");
        assert_eq!(pair.args.len(), 2);
        assert_eq!(pair.annotations().field.as_deref(), Some("p"));
    }

    #[test]
    fn serializes_without_empty_args() {
        let unit = Micheline::prim("Unit", vec![]);
        assert_eq!(unit.to_json(), json!({"prim": "Unit"}));
    }

    #[test]
    fn annotations_first_of_each_kind_wins() {
        let a = Annotations::parse(&[
            "%owner".to_string(),
            ":address".to_string(),
            "%ignored".to_string(),
            "@var".to_string(),
        ]);
        assert_eq!(a.field.as_deref(), Some("owner"));
        assert_eq!(a.type_name.as_deref(), Some("address"));
        assert_eq!(a.var.as_deref(), Some("var"));
        assert_eq!(a.to_wire(), vec!["%owner", ":address", "@var"]);
    }

    #[test]
    fn uncomb_nests_flat_pairs() {
        let flat = Micheline::prim(
            "Pair",
            vec![Micheline::int(1), Micheline::int(2), Micheline::int(3)],
        );
        let nested = Micheline::prim(
            "Pair",
            vec![
                Micheline::int(1),
                Micheline::prim("Pair", vec![Micheline::int(2), Micheline::int(3)]),
            ],
        );
        assert_eq!(flat.uncomb(), nested);
    }
}
