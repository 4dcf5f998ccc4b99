use tzindex_micheline::prim as p;
use tzindex_micheline::Micheline;

use crate::error::EngineError;
use crate::node::{Node, NodeKind, Side};

impl Node {
    /// Re-encode a settled node to the wire grammar.
    ///
    /// With `optimized`, big maps that carry a pointer encode as the pointer
    /// even when entries were merged in. A big map with only a pointer always
    /// encodes as the pointer.
    pub fn to_wire(&self, optimized: bool) -> Result<Micheline, EngineError> {
        let unsettled = || EngineError::Unsettled {
            path: self.path.clone(),
        };
        let wire = match &self.kind {
            NodeKind::Scalar { value, .. } | NodeKind::Contract { value, .. } => {
                value.clone().ok_or_else(unsettled)?
            }
            NodeKind::Ticket { inner } => inner.to_wire(optimized)?,
            NodeKind::Option { inner, some } => match some.ok_or_else(unsettled)? {
                true => Micheline::prim(p::D_SOME, vec![inner.to_wire(optimized)?]),
                false => Micheline::prim(p::D_NONE, vec![]),
            },
            NodeKind::Pair { left, right } => Micheline::prim(
                p::D_PAIR,
                vec![left.to_wire(optimized)?, right.to_wire(optimized)?],
            ),
            NodeKind::Or { left, right, side } => {
                let side = side.ok_or_else(unsettled)?;
                let arm = match side {
                    Side::Left => left,
                    Side::Right => right,
                };
                Micheline::prim(side.data_prim(), vec![arm.to_wire(optimized)?])
            }
            NodeKind::List { items, .. } | NodeKind::Set { items, .. } => {
                let items = items.as_ref().ok_or_else(unsettled)?;
                Micheline::Seq(
                    items
                        .iter()
                        .map(|item| item.to_wire(optimized))
                        .collect::<Result<_, _>>()?,
                )
            }
            NodeKind::Map { entries, .. } => {
                entries_to_wire(entries.as_ref().ok_or_else(unsettled)?, optimized)?
            }
            NodeKind::BigMap { ptr, entries, .. } => match (ptr, entries) {
                (Some(ptr), None) => Micheline::int(ptr),
                (Some(ptr), Some(_)) if optimized => Micheline::int(ptr),
                (_, Some(entries)) => entries_to_wire(entries, optimized)?,
                (None, None) => return Err(unsettled()),
            },
            NodeKind::Lambda { code, .. } => code.clone().ok_or_else(unsettled)?,
        };
        Ok(wire)
    }
}

fn entries_to_wire(entries: &[(Node, Node)], optimized: bool) -> Result<Micheline, EngineError> {
    let mut elts = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        elts.push(Micheline::prim(
            p::D_ELT,
            vec![key.to_wire(optimized)?, value.to_wire(optimized)?],
        ));
    }
    Ok(Micheline::Seq(elts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::parse_type;
    use serde_json::json;
    use tzindex_micheline::from_json;

    fn round_trip(t: serde_json::Value, v: serde_json::Value) {
        let mut node = parse_type(&from_json(&t).unwrap()).unwrap();
        let value = from_json(&v).unwrap();
        node.settle(&value).unwrap();
        assert_eq!(node.to_wire(false).unwrap(), value, "type {}", t);
    }

    #[test]
    fn round_trips_every_variant() {
        round_trip(json!({"prim": "int"}), json!({"int": "-5"}));
        round_trip(json!({"prim": "bytes"}), json!({"bytes": "cafe"}));
        round_trip(json!({"prim": "unit"}), json!({"prim": "Unit"}));
        round_trip(json!({"prim": "bool"}), json!({"prim": "True"}));
        round_trip(json!({"prim": "timestamp"}), json!({"string": "2021-01-01T00:00:00Z"}));
        round_trip(
            json!({"prim": "contract", "args": [{"prim": "unit"}]}),
            json!({"string": "KT1BEqzn5Wx8uJrZNvuS9DVHmLvG9td3fDLi"}),
        );
        round_trip(
            json!({"prim": "option", "args": [{"prim": "nat"}]}),
            json!({"prim": "Some", "args": [{"int": "1"}]}),
        );
        round_trip(json!({"prim": "option", "args": [{"prim": "nat"}]}), json!({"prim": "None"}));
        round_trip(
            json!({"prim": "or", "args": [{"prim": "nat"}, {"prim": "string"}]}),
            json!({"prim": "Right", "args": [{"string": "x"}]}),
        );
        round_trip(
            json!({"prim": "pair", "args": [{"prim": "nat"}, {"prim": "string"}]}),
            json!({"prim": "Pair", "args": [{"int": "1"}, {"string": "x"}]}),
        );
        round_trip(
            json!({"prim": "set", "args": [{"prim": "nat"}]}),
            json!([{"int": "1"}, {"int": "2"}]),
        );
        round_trip(
            json!({"prim": "map", "args": [{"prim": "nat"}, {"prim": "unit"}]}),
            json!([{"prim": "Elt", "args": [{"int": "1"}, {"prim": "Unit"}]}]),
        );
        round_trip(
            json!({"prim": "big_map", "args": [{"prim": "nat"}, {"prim": "unit"}]}),
            json!({"int": "3"}),
        );
        round_trip(
            json!({"prim": "lambda", "args": [{"prim": "unit"}, {"prim": "unit"}]}),
            json!([{"prim": "DROP"}, {"prim": "UNIT"}]),
        );
        round_trip(
            json!({"prim": "ticket", "args": [{"prim": "string"}]}),
            json!({"prim": "Pair", "args": [
                {"string": "KT1BEqzn5Wx8uJrZNvuS9DVHmLvG9td3fDLi"},
                {"prim": "Pair", "args": [{"string": "t"}, {"int": "10"}]}
            ]}),
        );
    }

    #[test]
    fn optimized_big_map_prefers_pointer() {
        let mut node = parse_type(
            &from_json(&json!({"prim": "big_map", "args": [{"prim": "nat"}, {"prim": "nat"}]}))
                .unwrap(),
        )
        .unwrap();
        let inline = from_json(&json!([{"prim": "Elt", "args": [{"int": "1"}, {"int": "2"}]}]))
            .unwrap();
        node.settle(&inline).unwrap();
        if let NodeKind::BigMap { ptr, .. } = &mut node.kind {
            *ptr = Some(8);
        }
        assert_eq!(node.to_wire(true).unwrap(), Micheline::int(8));
        assert_eq!(node.to_wire(false).unwrap(), inline);
    }
}
