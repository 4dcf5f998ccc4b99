//! End-to-end engine scenarios: parse, settle, render, re-encode, diff.

use std::cmp::Ordering;

use serde_json::{json, Value};
use tzindex_ast::{DiffType, EngineError, InterfaceRegistry, RenderNode, TypeTree, DOCS_FULL};
use tzindex_micheline::{from_json, Micheline};

// ──────────────────────────────────────────────
// Fixtures
// ──────────────────────────────────────────────

fn m(v: Value) -> Micheline {
    from_json(&v).unwrap()
}

fn tree(v: Value) -> TypeTree {
    TypeTree::from_type(&m(v)).unwrap()
}

fn settled(t: Value, v: Value) -> TypeTree {
    let mut tree = tree(t);
    tree.settle_value(&m(v)).unwrap();
    tree
}

/// `pair (address %admin) (pair (map %balances address nat) (timestamp %updated))`
fn ledger_type() -> Value {
    json!({"prim": "pair", "args": [
        {"prim": "address", "annots": ["%admin"]},
        {"prim": "map", "annots": ["%balances"], "args": [{"prim": "address"}, {"prim": "nat"}]},
        {"prim": "timestamp", "annots": ["%updated"]}
    ]})
}

fn ledger_value(balances: Value) -> Value {
    json!({"prim": "Pair", "args": [
        {"string": "tz1KqTpEZ7Yob7QbPE4Hy4Wo8fHG8LhKxZSx"},
        balances,
        {"int": "1609459200"}
    ]})
}

fn elt(addr: &str, amount: &str) -> Value {
    json!({"prim": "Elt", "args": [{"string": addr}, {"int": amount}]})
}

fn tags(node: &RenderNode, out: &mut Vec<(Option<String>, DiffType)>) {
    if let Some(diff) = node.diff_type {
        out.push((node.name.clone(), diff));
    }
    for child in &node.children {
        tags(child, out);
    }
}

const ALICE: &str = "tz1KqTpEZ7Yob7QbPE4Hy4Wo8fHG8LhKxZSx";
const BOB: &str = "tz1gjaF81ZRRvdzjobyfVNsAeSC6PScjfQwN";

// ──────────────────────────────────────────────
// Settle / render / wire
// ──────────────────────────────────────────────

#[test]
fn renders_named_storage() {
    let t = settled(ledger_type(), ledger_value(json!([elt(ALICE, "10")])));
    let rendered = t.render().unwrap();
    let root = &rendered[0];
    assert_eq!(root.kind, "named_tuple");

    let names: Vec<_> = root.children.iter().map(|c| c.name.clone().unwrap()).collect();
    assert_eq!(names, vec!["admin", "balances", "updated"]);
    assert_eq!(root.children[0].value, Some(json!(ALICE)));
    assert_eq!(root.children[1].children[0].name.as_deref(), Some(ALICE));
    assert_eq!(root.children[1].children[0].value, Some(json!("10")));
    assert_eq!(root.children[2].value, Some(json!("2021-01-01T00:00:00Z")));
}

#[test]
fn comb_value_round_trips_as_binary_pairs() {
    let value = ledger_value(json!([elt(ALICE, "10")]));
    let t = settled(ledger_type(), value.clone());
    let expected = m(value).uncomb();
    assert_eq!(t.to_wire(false).unwrap(), expected);
}

#[test]
fn arity_law() {
    let mut pair_root = tree(json!({"prim": "pair", "args": [{"prim": "nat"}, {"prim": "nat"}]}));
    pair_root
        .settle(&[m(json!({"int": "1"})), m(json!({"int": "2"}))])
        .unwrap();

    let mut nat_root = tree(json!({"prim": "nat"}));
    let err = nat_root.settle(&[]).unwrap_err();
    assert!(matches!(err, EngineError::ArityMismatch { .. }));
}

#[test]
fn unknown_type_constructor_is_rejected() {
    let err = TypeTree::from_type(&m(json!({"prim": "matrix"}))).unwrap_err();
    assert_eq!(
        err,
        EngineError::UnknownConstructor {
            prim: "matrix".to_string()
        }
    );
}

// ──────────────────────────────────────────────
// Compare / diff
// ──────────────────────────────────────────────

#[test]
fn diff_tags_created_and_deleted_keys() {
    let before = settled(ledger_type(), ledger_value(json!([elt(ALICE, "10")])));
    let after = settled(ledger_type(), ledger_value(json!([elt(BOB, "4")])));

    let diff = before.distinguish(&after).unwrap().unwrap();
    let mut found = Vec::new();
    tags(&diff, &mut found);
    assert!(found.contains(&(Some(BOB.to_string()), DiffType::Created)));
    assert!(found.contains(&(Some(ALICE.to_string()), DiffType::Deleted)));

    let same = before.distinguish(&before).unwrap().unwrap();
    assert!(!same.has_changes());
}

#[test]
fn diff_marks_updated_values() {
    let before = settled(ledger_type(), ledger_value(json!([elt(ALICE, "10")])));
    let after = settled(ledger_type(), ledger_value(json!([elt(ALICE, "11")])));
    let diff = before.distinguish(&after).unwrap().unwrap();
    let mut found = Vec::new();
    tags(&diff, &mut found);
    assert_eq!(found, vec![(Some(ALICE.to_string()), DiffType::Updated)]);
}

#[test]
fn compare_orders_values() {
    let small = settled(json!({"prim": "mutez"}), json!({"int": "9"}));
    let big = settled(json!({"prim": "mutez"}), json!({"int": "10"}));
    assert_eq!(small.compare(&big).unwrap(), Ordering::Less);
    assert_eq!(big.compare(&big).unwrap(), Ordering::Equal);

    let text = settled(json!({"prim": "string"}), json!({"string": "a"}));
    assert!(small.compare(&text).is_err());
    assert!(!small.equal_type(&text));
}

// ──────────────────────────────────────────────
// Entry points, parameters, docs
// ──────────────────────────────────────────────

fn wallet_parameter() -> TypeTree {
    tree(json!({"prim": "or", "args": [
        {"prim": "pair", "annots": ["%transfer"], "args": [
            {"prim": "address", "annots": ["%to"]},
            {"prim": "mutez", "annots": ["%amount"]}
        ]},
        {"prim": "or", "args": [
            {"prim": "key_hash", "annots": ["%set_delegate"]},
            {"prim": "unit"}
        ]}
    ]}))
}

#[test]
fn entrypoints_and_parameters() {
    let param = wallet_parameter();
    assert_eq!(
        param.get_entrypoints(),
        vec!["transfer", "set_delegate", "entrypoint_2"]
    );

    let call = param
        .from_parameters("transfer", &[m(json!({"prim": "Pair", "args": [{"string": BOB}, {"int": "100"}]}))])
        .unwrap();
    let rendered = call.render().unwrap();
    assert_eq!(rendered[0].children[1].value, Some(json!("100")));
    assert_eq!(
        call.to_parameters("transfer").unwrap(),
        Some(m(json!({"prim": "Pair", "args": [{"string": BOB}, {"int": "100"}]})))
    );
}

#[test]
fn full_docs_cover_every_alternative() {
    let param = wallet_parameter();
    let docs = param.docs(DOCS_FULL);
    assert_eq!(docs[0].kind, "or");
    assert!(docs.iter().any(|d| d.name == "transfer"));

    let per_entry = param.entrypoint_docs();
    assert_eq!(per_entry[1].typedefs[0].kind, "key_hash");
    assert!(param.docs("missing").is_empty());
}

#[test]
fn form_values_settle_a_tree() {
    let param = wallet_parameter();
    let transfer = param.find_entrypoint("transfer").unwrap().node.clone();
    let mut call = TypeTree::from_nodes(vec![transfer]);

    let schema = call.to_form_schema().unwrap();
    assert!(schema.properties.contains_key("to"));
    assert_eq!(schema.properties["amount"].minimum, Some(0));

    let values = json!({"to": BOB, "amount": 5});
    call.from_form_schema(values.as_object().unwrap()).unwrap();
    assert_eq!(
        call.to_wire(false).unwrap(),
        m(json!({"prim": "Pair", "args": [{"string": BOB}, {"int": "5"}]}))
    );
}

#[test]
fn metadata_indexes_paths_by_name() {
    let t = tree(ledger_type());
    let metadata = t.metadata();
    assert_eq!(metadata.find("balances"), Some("0/1/0"));
    assert_eq!(metadata.get("0").unwrap().prim, "pair");
}

#[test]
fn builtin_interfaces_detect_view() {
    let registry = InterfaceRegistry::builtin().unwrap();
    assert_eq!(
        registry.find_interfaces(&tree(json!({"prim": "nat"}))),
        vec!["view_nat"]
    );
    assert!(registry.find_interfaces(&wallet_parameter()).is_empty());
}
