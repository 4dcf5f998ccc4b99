//! Re-injecting resolved big-map records into a storage value.

use tzindex_ast::TypeTree;
use tzindex_micheline::Micheline;
use tzindex_storage::BigMapDiff;

use crate::error::ResolveError;

/// Settle `storage` and merge `diffs` into its big maps.
///
/// Diffs are applied in level order, so the latest record per key wins and
/// tombstoned keys disappear.
pub fn enriched_tree(
    storage_type: &TypeTree,
    storage: &Micheline,
    diffs: &[BigMapDiff],
) -> Result<TypeTree, ResolveError> {
    let mut tree = storage_type.clone();
    tree.settle_value(storage)?;
    let mut ordered = diffs.to_vec();
    ordered.sort_by_key(|d| d.provenance.level);
    tree.enrich_big_map(&ordered)?;
    Ok(tree)
}

/// Storage value with every big-map pointer replaced by its inline `Elt`
/// sequence.
pub fn enrich_storage(
    storage_type: &TypeTree,
    storage: &Micheline,
    diffs: &[BigMapDiff],
) -> Result<Micheline, ResolveError> {
    Ok(enriched_tree(storage_type, storage, diffs)?.to_wire(false)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tzindex_micheline::from_json;
    use tzindex_storage::Provenance;

    fn diff(key: &str, value: Option<i64>, level: i64) -> BigMapDiff {
        BigMapDiff {
            id: format!("{}-{}", key, level),
            ptr: 2,
            key: Micheline::string(key),
            key_hash: key.to_string(),
            key_strings: vec![key.to_string()],
            value: value.map(Micheline::int),
            value_strings: vec![],
            bin_path: "0".to_string(),
            address: "KT1".to_string(),
            provenance: Provenance {
                level,
                ..Provenance::default()
            },
        }
    }

    #[test]
    fn inlines_latest_live_entries() {
        let storage_type = TypeTree::from_type(
            &from_json(&json!({"prim": "big_map", "args": [{"prim": "string"}, {"prim": "int"}]}))
                .unwrap(),
        )
        .unwrap();
        let storage = Micheline::int(2);
        let diffs = vec![
            diff("b", Some(9), 3),
            diff("a", Some(1), 1),
            diff("a", Some(2), 2),
            diff("c", Some(5), 1),
            diff("c", None, 2),
        ];
        let enriched = enrich_storage(&storage_type, &storage, &diffs).unwrap();
        assert_eq!(
            enriched,
            from_json(&json!([
                {"prim": "Elt", "args": [{"string": "a"}, {"int": "2"}]},
                {"prim": "Elt", "args": [{"string": "b"}, {"int": "9"}]}
            ]))
            .unwrap()
        );
    }
}
