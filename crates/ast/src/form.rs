//! Conversion to and from a flat form schema.
//!
//! Pairs flatten into their parent's property bag, so a field is addressed
//! by its display name alone. Sum types and options become `oneOf` objects
//! selected by a `schemaKey` constant.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tzindex_micheline::prim as p;
use tzindex_micheline::Micheline;

use crate::error::EngineError;
use crate::node::{Node, NodeKind, ScalarPrim};
use crate::settle::is_decimal;

pub const SCHEMA_KEY: &str = "schemaKey";
const LEFT_KEY: &str = "0";
const RIGHT_KEY: &str = "1";
const NONE_KEY: &str = "none";
const SOME_KEY: &str = "some";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormType {
    Object,
    Array,
    String,
    Integer,
    Boolean,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSchema {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<FormType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<i64>,
    #[serde(rename = "const", default, skip_serializing_if = "Option::is_none")]
    pub constant: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, FormSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<FormSchema>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub one_of: Vec<FormSchema>,
}

impl FormSchema {
    fn field(kind: FormType, title: String) -> Self {
        FormSchema {
            kind: Some(kind),
            title: Some(title),
            ..Default::default()
        }
    }

    fn object(title: Option<String>) -> Self {
        FormSchema {
            kind: Some(FormType::Object),
            title,
            ..Default::default()
        }
    }

    fn alternative(title: String, key: &str) -> Self {
        let mut alt = FormSchema::object(Some(title));
        alt.properties.insert(
            SCHEMA_KEY.to_string(),
            FormSchema {
                kind: Some(FormType::String),
                constant: Some(key.to_string()),
                ..Default::default()
            },
        );
        alt
    }
}

// ──────────────────────────────────────────────
// Schema generation
// ──────────────────────────────────────────────

impl Node {
    /// Form schema for this node, or `None` for `unit`.
    pub fn to_form_schema(&self) -> Option<FormSchema> {
        if self.is_prim(p::UNIT) {
            return None;
        }
        let mut root = FormSchema::object(None);
        self.add_form_fields(&mut root.properties);
        Some(root)
    }

    fn add_form_fields(&self, props: &mut BTreeMap<String, FormSchema>) {
        let name = self.display_name();
        match &self.kind {
            NodeKind::Scalar { prim, .. } => {
                if let Some(field) = scalar_field(*prim, name.clone()) {
                    props.insert(name, field);
                }
            }
            NodeKind::Contract { .. } => {
                props.insert(name.clone(), FormSchema::field(FormType::String, name));
            }
            NodeKind::Lambda { .. } => {
                let mut field = FormSchema::field(FormType::String, name.clone());
                field.format = Some("micheline".to_string());
                props.insert(name, field);
            }
            NodeKind::Ticket { inner } => inner.add_form_fields(props),
            NodeKind::Pair { left, right } => {
                left.add_form_fields(props);
                right.add_form_fields(props);
            }
            NodeKind::Or { left, right, .. } => {
                let mut field = FormSchema::object(Some(name.clone()));
                for (arm, key) in [(left, LEFT_KEY), (right, RIGHT_KEY)] {
                    let mut alt = FormSchema::alternative(arm.display_name(), key);
                    arm.add_form_fields(&mut alt.properties);
                    field.one_of.push(alt);
                }
                props.insert(name, field);
            }
            NodeKind::Option { inner, .. } => {
                let mut field = FormSchema::object(Some(name.clone()));
                field
                    .one_of
                    .push(FormSchema::alternative("None".to_string(), NONE_KEY));
                let mut some = FormSchema::alternative("Some".to_string(), SOME_KEY);
                inner.add_form_fields(&mut some.properties);
                field.one_of.push(some);
                props.insert(name, field);
            }
            NodeKind::List { elem, .. } | NodeKind::Set { elem, .. } => {
                let mut item = FormSchema::object(None);
                elem.add_form_fields(&mut item.properties);
                let mut field = FormSchema::field(FormType::Array, name.clone());
                field.items = Some(Box::new(item));
                props.insert(name, field);
            }
            NodeKind::Map { key, value, .. } => {
                let mut item = FormSchema::object(None);
                for (part, label) in [(key, "key"), (value, "value")] {
                    let mut sub = FormSchema::object(Some(label.to_string()));
                    part.add_form_fields(&mut sub.properties);
                    item.properties.insert(label.to_string(), sub);
                }
                let mut field = FormSchema::field(FormType::Array, name.clone());
                field.items = Some(Box::new(item));
                props.insert(name, field);
            }
            NodeKind::BigMap { .. } => {
                let mut field = FormSchema::field(FormType::Integer, format!("{} (ptr)", name));
                field.minimum = Some(0);
                props.insert(name, field);
            }
        }
    }
}

fn scalar_field(prim: ScalarPrim, title: String) -> Option<FormSchema> {
    let field = match prim {
        ScalarPrim::Unit => return None,
        ScalarPrim::Int => FormSchema::field(FormType::Integer, title),
        ScalarPrim::Nat | ScalarPrim::Mutez => {
            let mut f = FormSchema::field(FormType::Integer, title);
            f.minimum = Some(0);
            f
        }
        ScalarPrim::Bool => FormSchema::field(FormType::Boolean, title),
        ScalarPrim::Timestamp => {
            let mut f = FormSchema::field(FormType::String, title);
            f.format = Some("date-time".to_string());
            f
        }
        _ => FormSchema::field(FormType::String, title),
    };
    Some(field)
}

// ──────────────────────────────────────────────
// Reading form values back
// ──────────────────────────────────────────────

impl Node {
    /// Build the wire value described by a form's `values`.
    pub fn wire_from_form(&self, values: &Map<String, Value>) -> Result<Micheline, EngineError> {
        let name = self.display_name();
        let wire = match &self.kind {
            NodeKind::Scalar { prim, .. } => scalar_from_form(*prim, &name, values)?,
            NodeKind::Contract { .. } => Micheline::string(string_field(&name, values)?),
            NodeKind::Lambda { .. } => {
                let code = match field(&name, values)? {
                    Value::String(text) => tzindex_micheline::from_str(text),
                    other => tzindex_micheline::from_json(other),
                };
                code.map_err(|e| invalid(&name, e.to_string()))?
            }
            NodeKind::Ticket { inner } => inner.wire_from_form(values)?,
            NodeKind::Pair { left, right } => Micheline::prim(
                p::D_PAIR,
                vec![left.wire_from_form(values)?, right.wire_from_form(values)?],
            ),
            NodeKind::Or { left, right, .. } => {
                let sub = object_field(&name, values)?;
                match schema_key(&name, sub)? {
                    LEFT_KEY => Micheline::prim(p::D_LEFT, vec![left.wire_from_form(sub)?]),
                    RIGHT_KEY => Micheline::prim(p::D_RIGHT, vec![right.wire_from_form(sub)?]),
                    other => return Err(invalid(&name, format!("unknown alternative '{}'", other))),
                }
            }
            NodeKind::Option { inner, .. } => {
                let sub = object_field(&name, values)?;
                match schema_key(&name, sub)? {
                    NONE_KEY => Micheline::prim(p::D_NONE, vec![]),
                    SOME_KEY => Micheline::prim(p::D_SOME, vec![inner.wire_from_form(sub)?]),
                    other => return Err(invalid(&name, format!("unknown alternative '{}'", other))),
                }
            }
            NodeKind::List { elem, .. } | NodeKind::Set { elem, .. } => {
                let mut items = Vec::new();
                for item in array_field(&name, values)? {
                    let item = item
                        .as_object()
                        .ok_or_else(|| invalid(&name, "list items must be objects"))?;
                    items.push(elem.wire_from_form(item)?);
                }
                Micheline::Seq(items)
            }
            NodeKind::Map { key, value, .. } => {
                let mut elts = Vec::new();
                for entry in array_field(&name, values)? {
                    let entry = entry
                        .as_object()
                        .ok_or_else(|| invalid(&name, "map entries must be objects"))?;
                    let k = object_field("key", entry)?;
                    let v = object_field("value", entry)?;
                    elts.push(Micheline::prim(
                        p::D_ELT,
                        vec![key.wire_from_form(k)?, value.wire_from_form(v)?],
                    ));
                }
                Micheline::Seq(elts)
            }
            NodeKind::BigMap { .. } => Micheline::int(integer_field(&name, values)?),
        };
        Ok(wire)
    }

    /// Settle this node from form values.
    pub fn from_form_schema(&mut self, values: &Map<String, Value>) -> Result<(), EngineError> {
        let wire = self.wire_from_form(values)?;
        self.settle(&wire)
    }
}

fn scalar_from_form(
    prim: ScalarPrim,
    name: &str,
    values: &Map<String, Value>,
) -> Result<Micheline, EngineError> {
    let wire = match prim {
        ScalarPrim::Unit => Micheline::prim(p::D_UNIT, vec![]),
        ScalarPrim::Int | ScalarPrim::Nat | ScalarPrim::Mutez => {
            Micheline::int(integer_field(name, values)?)
        }
        ScalarPrim::Bool => match field(name, values)? {
            Value::Bool(true) => Micheline::prim(p::D_TRUE, vec![]),
            Value::Bool(false) => Micheline::prim(p::D_FALSE, vec![]),
            _ => return Err(invalid(name, "expected a boolean")),
        },
        ScalarPrim::Bytes
        | ScalarPrim::Bls12381Fr
        | ScalarPrim::Bls12381G1
        | ScalarPrim::Bls12381G2 => Micheline::bytes(string_field(name, values)?),
        _ => Micheline::string(string_field(name, values)?),
    };
    Ok(wire)
}

fn invalid(field: &str, message: impl Into<String>) -> EngineError {
    EngineError::InvalidFormValue {
        field: field.to_string(),
        message: message.into(),
    }
}

fn field<'a>(name: &str, values: &'a Map<String, Value>) -> Result<&'a Value, EngineError> {
    values.get(name).ok_or_else(|| invalid(name, "missing"))
}

fn string_field(name: &str, values: &Map<String, Value>) -> Result<String, EngineError> {
    match field(name, values)? {
        Value::String(s) => Ok(s.clone()),
        _ => Err(invalid(name, "expected a string")),
    }
}

/// Integers may be given as JSON numbers or decimal strings.
fn integer_field(name: &str, values: &Map<String, Value>) -> Result<String, EngineError> {
    match field(name, values)? {
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(n.to_string()),
        Value::String(s) if is_decimal(s, true) => Ok(s.clone()),
        _ => Err(invalid(name, "expected an integer")),
    }
}

fn object_field<'a>(
    name: &str,
    values: &'a Map<String, Value>,
) -> Result<&'a Map<String, Value>, EngineError> {
    field(name, values)?
        .as_object()
        .ok_or_else(|| invalid(name, "expected an object"))
}

fn array_field<'a>(name: &str, values: &'a Map<String, Value>) -> Result<&'a [Value], EngineError> {
    field(name, values)?
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| invalid(name, "expected an array"))
}

fn schema_key<'a>(name: &str, values: &'a Map<String, Value>) -> Result<&'a str, EngineError> {
    values
        .get(SCHEMA_KEY)
        .and_then(Value::as_str)
        .ok_or_else(|| invalid(name, "missing schemaKey"))
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
    fn pair_fields_flatten_into_one_bag() {
        let node = ty(json!({"prim": "pair", "args": [
            {"prim": "address", "annots": ["%to"]},
            {"prim": "pair", "args": [
                {"prim": "nat", "annots": ["%amount"]},
                {"prim": "timestamp", "annots": ["%at"]}
            ]}
        ]}));
        let schema = node.to_form_schema().unwrap();
        let keys: Vec<&str> = schema.properties.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["amount", "at", "to"]);
        assert_eq!(schema.properties["amount"].minimum, Some(0));
        assert_eq!(schema.properties["at"].format.as_deref(), Some("date-time"));
    }

    #[test]
    fn big_map_is_single_pointer_field() {
        let node = ty(json!({"prim": "big_map", "annots": ["%ledger"], "args": [
            {"prim": "address"}, {"prim": "nat"}
        ]}));
        let schema = node.to_form_schema().unwrap();
        let field = &schema.properties["ledger"];
        assert_eq!(field.kind, Some(FormType::Integer));
        assert_eq!(field.title.as_deref(), Some("ledger (ptr)"));
    }

    #[test]
    fn unit_has_no_schema() {
        assert!(ty(json!({"prim": "unit"})).to_form_schema().is_none());
    }

    #[test]
    fn or_schema_serializes_one_of() {
        let node = ty(json!({"prim": "or", "annots": ["%action"], "args": [
            {"prim": "nat", "annots": ["%deposit"]},
            {"prim": "unit", "annots": ["%withdraw"]}
        ]}));
        let schema = serde_json::to_value(node.to_form_schema().unwrap()).unwrap();
        let one_of = &schema["properties"]["action"]["oneOf"];
        assert_eq!(one_of[0]["properties"]["schemaKey"]["const"], json!("0"));
        assert_eq!(one_of[0]["properties"]["deposit"]["type"], json!("integer"));
        assert_eq!(one_of[1]["title"], json!("withdraw"));
    }

    #[test]
    fn form_values_settle_tree() {
        let mut node = ty(json!({"prim": "pair", "args": [
            {"prim": "or", "annots": ["%action"], "args": [
                {"prim": "nat", "annots": ["%deposit"]},
                {"prim": "unit", "annots": ["%withdraw"]}
            ]},
            {"prim": "pair", "args": [
                {"prim": "option", "annots": ["%memo"], "args": [{"prim": "string", "annots": ["%text"]}]},
                {"prim": "map", "annots": ["%tags"], "args": [
                    {"prim": "string", "annots": ["%k"]},
                    {"prim": "bool", "annots": ["%v"]}
                ]}
            ]}
        ]}));
        let values = json!({
            "action": {"schemaKey": "0", "deposit": 5},
            "memo": {"schemaKey": "some", "text": "hi"},
            "tags": [{"key": {"k": "x"}, "value": {"v": true}}]
        });
        node.from_form_schema(values.as_object().unwrap()).unwrap();
        assert_eq!(
            node.to_wire(false).unwrap().to_json(),
            json!({"prim": "Pair", "args": [
                {"prim": "Left", "args": [{"int": "5"}]},
                {"prim": "Pair", "args": [
                    {"prim": "Some", "args": [{"string": "hi"}]},
                    [{"prim": "Elt", "args": [{"string": "x"}, {"prim": "True"}]}]
                ]}
            ]})
        );
    }

    #[test]
    fn integer_strings_allow_one_sign() {
        let values = json!({"a": "-5", "b": "-", "c": "--5", "d": 7});
        let values = values.as_object().unwrap();
        assert_eq!(integer_field("a", values).unwrap(), "-5");
        assert_eq!(integer_field("d", values).unwrap(), "7");
        for name in ["b", "c"] {
            assert!(matches!(
                integer_field(name, values),
                Err(EngineError::InvalidFormValue { .. })
            ));
        }
    }

    #[test]
    fn missing_field_is_reported() {
        let node = ty(json!({"prim": "nat", "annots": ["%amount"]}));
        let err = node.wire_from_form(&Map::new()).unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidFormValue {
                field: "amount".to_string(),
                message: "missing".to_string()
            }
        );
    }
}
