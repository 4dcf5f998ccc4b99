//! Standard contract interface detection (FA1.2, FA2, views).
//!
//! An interface is a set of entry point types. A contract implements it when
//! every interface entry point is structurally equal to one of the
//! contract's entry point alternatives. Annotations are ignored.

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;
use tzindex_micheline::prim as p;
use tzindex_micheline::{from_json, MichelineError};

use crate::error::EngineError;
use crate::node::{parse_type, Node, NodeKind};
use crate::tree::TypeTree;

const BUILTIN: &[(&str, &str)] = &[
    ("fa1-2", include_str!("../interfaces/fa1-2.json")),
    ("fa2", include_str!("../interfaces/fa2.json")),
    ("view_nat", include_str!("../interfaces/view_nat.json")),
];

#[derive(Deserialize)]
struct RawInterface {
    entrypoints: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    is_root: bool,
}

#[derive(Debug, Clone)]
pub struct ContractInterface {
    pub entrypoints: BTreeMap<String, Node>,
    /// Match the whole parameter against the `default` entry instead of
    /// searching alternatives.
    pub is_root: bool,
}

#[derive(Debug, Clone, Default)]
pub struct InterfaceRegistry {
    interfaces: BTreeMap<String, ContractInterface>,
}

impl InterfaceRegistry {
    /// Registry preloaded with the embedded standard interfaces.
    pub fn builtin() -> Result<Self, EngineError> {
        let mut registry = InterfaceRegistry::default();
        for (name, json) in BUILTIN {
            registry.register_json(name, json)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, name: impl Into<String>, interface: ContractInterface) {
        self.interfaces.insert(name.into(), interface);
    }

    /// Register an interface given as `{"entrypoints": {name: type}, "is_root": bool}`.
    pub fn register_json(&mut self, name: &str, json: &str) -> Result<(), EngineError> {
        let raw: RawInterface = serde_json::from_str(json)
            .map_err(|e| MichelineError::InvalidJson(e.to_string()))?;
        let mut entrypoints = BTreeMap::new();
        for (entry, expr) in raw.entrypoints {
            entrypoints.insert(entry, parse_type(&from_json(&expr)?)?);
        }
        self.register(
            name,
            ContractInterface {
                entrypoints,
                is_root: raw.is_root,
            },
        );
        Ok(())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.interfaces.keys().map(String::as_str)
    }

    /// Tags of every registered interface the parameter tree implements.
    pub fn find_interfaces(&self, parameter: &TypeTree) -> Vec<String> {
        self.interfaces
            .iter()
            .filter(|(_, interface)| implements(parameter, interface))
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn implements(&self, parameter: &TypeTree, name: &str) -> bool {
        self.interfaces
            .get(name)
            .is_some_and(|interface| implements(parameter, interface))
    }
}

fn implements(parameter: &TypeTree, interface: &ContractInterface) -> bool {
    if interface.is_root {
        return match (parameter.nodes.as_slice(), interface.entrypoints.len()) {
            ([root], 1) => interface
                .entrypoints
                .get(p::DEFAULT_ENTRYPOINT)
                .is_some_and(|expected| root.equal_type(expected)),
            _ => false,
        };
    }
    let roots: Vec<&Node> = parameter.nodes.iter().collect();
    let mut found = BTreeSet::new();
    find_entrypoints(&roots, interface, &mut found)
}

fn find_entrypoints<'a>(
    nodes: &[&Node],
    interface: &'a ContractInterface,
    found: &mut BTreeSet<&'a str>,
) -> bool {
    for node in nodes {
        if let NodeKind::Or { left, right, .. } = &node.kind {
            if find_entrypoints(&[left.as_ref(), right.as_ref()], interface, found) {
                return true;
            }
            continue;
        }
        for (name, expected) in &interface.entrypoints {
            if !found.contains(name.as_str()) && node.equal_type(expected) {
                found.insert(name.as_str());
            }
        }
        if found.len() == interface.entrypoints.len() {
            return true;
        }
    }
    false
}
