use tzindex_storage::ScriptRecord;

use crate::error::EngineError;
use crate::interface::InterfaceRegistry;
use crate::node::{Node, NodeKind};
use crate::tree::TypeTree;

/// Parsed parameter and storage types of one contract version.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractSchema {
    pub parameter: TypeTree,
    pub storage: TypeTree,
}

impl ContractSchema {
    pub fn from_record(record: &ScriptRecord) -> Result<Self, EngineError> {
        Ok(ContractSchema {
            parameter: TypeTree::from_type(&record.parameter)?,
            storage: TypeTree::from_type(&record.storage)?,
        })
    }

    /// True when a lambda accepted by the parameter has the same argument
    /// type as a lambda kept in storage.
    pub fn is_upgradable(&self) -> bool {
        let stored = lambdas(&self.storage);
        lambdas(&self.parameter).iter().any(|accepted| {
            stored
                .iter()
                .any(|kept| accepted.equal_type(kept))
        })
    }

    pub fn interfaces(&self, registry: &InterfaceRegistry) -> Vec<String> {
        registry.find_interfaces(&self.parameter)
    }
}

/// Parameter types of every lambda in the tree.
fn lambdas(tree: &TypeTree) -> Vec<&Node> {
    let mut out = Vec::new();
    let mut stack: Vec<&Node> = tree.nodes.iter().collect();
    while let Some(node) = stack.pop() {
        if let NodeKind::Lambda { parameter, .. } = &node.kind {
            out.push(parameter.as_ref());
        }
        stack.extend(node.type_children());
    }
    out
}
