//! Typed node model and the type-expression parser.
//!
//! A [`Node`] is both a schema and, once settled, a value of that schema.
//! Collection nodes keep their element type as a template and hold settled
//! copies of it for each item.

use tzindex_micheline::prim as p;
use tzindex_micheline::{Annotations, Micheline, PrimNode};

use crate::error::EngineError;

// ──────────────────────────────────────────────
// Node kinds
// ──────────────────────────────────────────────

/// Scalar primitives. Sapling types keep their memo size in `type_args`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarPrim {
    Int,
    Nat,
    String,
    Bytes,
    Bool,
    Unit,
    Mutez,
    Timestamp,
    Address,
    Key,
    KeyHash,
    Signature,
    ChainId,
    Operation,
    Never,
    Bls12381Fr,
    Bls12381G1,
    Bls12381G2,
    SaplingState,
    SaplingTransaction,
}

impl ScalarPrim {
    pub fn from_prim(prim: &str) -> Option<Self> {
        let scalar = match prim {
            p::INT => ScalarPrim::Int,
            p::NAT => ScalarPrim::Nat,
            p::STRING => ScalarPrim::String,
            p::BYTES => ScalarPrim::Bytes,
            p::BOOL => ScalarPrim::Bool,
            p::UNIT => ScalarPrim::Unit,
            p::MUTEZ => ScalarPrim::Mutez,
            p::TIMESTAMP => ScalarPrim::Timestamp,
            p::ADDRESS => ScalarPrim::Address,
            p::KEY => ScalarPrim::Key,
            p::KEY_HASH => ScalarPrim::KeyHash,
            p::SIGNATURE => ScalarPrim::Signature,
            p::CHAIN_ID => ScalarPrim::ChainId,
            p::OPERATION => ScalarPrim::Operation,
            p::NEVER => ScalarPrim::Never,
            p::BLS12_381_FR => ScalarPrim::Bls12381Fr,
            p::BLS12_381_G1 => ScalarPrim::Bls12381G1,
            p::BLS12_381_G2 => ScalarPrim::Bls12381G2,
            p::SAPLING_STATE => ScalarPrim::SaplingState,
            p::SAPLING_TRANSACTION => ScalarPrim::SaplingTransaction,
            _ => return None,
        };
        Some(scalar)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScalarPrim::Int => p::INT,
            ScalarPrim::Nat => p::NAT,
            ScalarPrim::String => p::STRING,
            ScalarPrim::Bytes => p::BYTES,
            ScalarPrim::Bool => p::BOOL,
            ScalarPrim::Unit => p::UNIT,
            ScalarPrim::Mutez => p::MUTEZ,
            ScalarPrim::Timestamp => p::TIMESTAMP,
            ScalarPrim::Address => p::ADDRESS,
            ScalarPrim::Key => p::KEY,
            ScalarPrim::KeyHash => p::KEY_HASH,
            ScalarPrim::Signature => p::SIGNATURE,
            ScalarPrim::ChainId => p::CHAIN_ID,
            ScalarPrim::Operation => p::OPERATION,
            ScalarPrim::Never => p::NEVER,
            ScalarPrim::Bls12381Fr => p::BLS12_381_FR,
            ScalarPrim::Bls12381G1 => p::BLS12_381_G1,
            ScalarPrim::Bls12381G2 => p::BLS12_381_G2,
            ScalarPrim::SaplingState => p::SAPLING_STATE,
            ScalarPrim::SaplingTransaction => p::SAPLING_TRANSACTION,
        }
    }

    /// Numeric scalars carried as `{"int"}` literals.
    pub fn is_numeric(self) -> bool {
        matches!(self, ScalarPrim::Int | ScalarPrim::Nat | ScalarPrim::Mutez)
    }

    /// Scalars whose values are gathered by [`Node::collect_strings`].
    pub fn is_string_like(self) -> bool {
        matches!(
            self,
            ScalarPrim::String
                | ScalarPrim::Address
                | ScalarPrim::Key
                | ScalarPrim::KeyHash
                | ScalarPrim::Signature
        )
    }

    pub fn is_comparable(self) -> bool {
        !matches!(
            self,
            ScalarPrim::Operation
                | ScalarPrim::Bls12381Fr
                | ScalarPrim::Bls12381G1
                | ScalarPrim::Bls12381G2
                | ScalarPrim::SaplingState
                | ScalarPrim::SaplingTransaction
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn data_prim(self) -> &'static str {
        match self {
            Side::Left => p::D_LEFT,
            Side::Right => p::D_RIGHT,
        }
    }
}

/// Variant payloads. `None` values mean "not settled yet".
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Scalar {
        prim: ScalarPrim,
        type_args: Vec<Micheline>,
        value: Option<Micheline>,
    },
    Contract {
        parameter: Box<Node>,
        value: Option<Micheline>,
    },
    /// Modelled as `pair address (pair content nat)`, the shape of its value.
    Ticket { inner: Box<Node> },
    Option {
        inner: Box<Node>,
        some: Option<bool>,
    },
    Pair {
        left: Box<Node>,
        right: Box<Node>,
    },
    Or {
        left: Box<Node>,
        right: Box<Node>,
        side: Option<Side>,
    },
    List {
        elem: Box<Node>,
        items: Option<Vec<Node>>,
    },
    Set {
        elem: Box<Node>,
        items: Option<Vec<Node>>,
    },
    Map {
        key: Box<Node>,
        value: Box<Node>,
        entries: Option<Vec<(Node, Node)>>,
    },
    BigMap {
        key: Box<Node>,
        value: Box<Node>,
        ptr: Option<i64>,
        entries: Option<Vec<(Node, Node)>>,
    },
    Lambda {
        parameter: Box<Node>,
        ret: Box<Node>,
        code: Option<Micheline>,
    },
}

/// One node of a typed tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Pre-order index within the tree it was parsed in.
    pub id: usize,
    /// Structural path from the root, e.g. `0/1/k`.
    pub path: String,
    pub annots: Annotations,
    pub depth: usize,
    pub kind: NodeKind,
}

impl Node {
    pub fn prim(&self) -> &'static str {
        match &self.kind {
            NodeKind::Scalar { prim, .. } => prim.as_str(),
            NodeKind::Contract { .. } => p::CONTRACT,
            NodeKind::Ticket { .. } => p::TICKET,
            NodeKind::Option { .. } => p::OPTION,
            NodeKind::Pair { .. } => p::PAIR,
            NodeKind::Or { .. } => p::OR,
            NodeKind::List { .. } => p::LIST,
            NodeKind::Set { .. } => p::SET,
            NodeKind::Map { .. } => p::MAP,
            NodeKind::BigMap { .. } => p::BIG_MAP,
            NodeKind::Lambda { .. } => p::LAMBDA,
        }
    }

    pub fn is_prim(&self, prim: &str) -> bool {
        self.prim() == prim
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self.kind, NodeKind::Scalar { .. })
    }

    /// User-given name: field annotation, else type annotation.
    pub fn name(&self) -> Option<&str> {
        self.annots
            .field
            .as_deref()
            .or(self.annots.type_name.as_deref())
    }

    /// [`Node::name`] or a positional fallback like `@nat_3`.
    pub fn display_name(&self) -> String {
        match self.name() {
            Some(name) => name.to_string(),
            None => format!("@{}_{}", self.prim(), self.id),
        }
    }

    pub fn is_settled(&self) -> bool {
        match &self.kind {
            NodeKind::Scalar { value, .. } | NodeKind::Contract { value, .. } => value.is_some(),
            NodeKind::Ticket { inner } => inner.is_settled(),
            NodeKind::Option { some, .. } => some.is_some(),
            NodeKind::Pair { left, right } => left.is_settled() && right.is_settled(),
            NodeKind::Or { side, .. } => side.is_some(),
            NodeKind::List { items, .. } | NodeKind::Set { items, .. } => items.is_some(),
            NodeKind::Map { entries, .. } => entries.is_some(),
            NodeKind::BigMap { ptr, entries, .. } => ptr.is_some() || entries.is_some(),
            NodeKind::Lambda { code, .. } => code.is_some(),
        }
    }

    /// Type children in declaration order.
    pub fn type_children(&self) -> Vec<&Node> {
        match &self.kind {
            NodeKind::Scalar { .. } => vec![],
            NodeKind::Contract { parameter, .. } => vec![parameter.as_ref()],
            NodeKind::Ticket { inner } | NodeKind::Option { inner, .. } => vec![inner.as_ref()],
            NodeKind::Pair { left, right } | NodeKind::Or { left, right, .. } => {
                vec![left.as_ref(), right.as_ref()]
            }
            NodeKind::List { elem, .. } | NodeKind::Set { elem, .. } => vec![elem.as_ref()],
            NodeKind::Map { key, value, .. } | NodeKind::BigMap { key, value, .. } => {
                vec![key.as_ref(), value.as_ref()]
            }
            NodeKind::Lambda { parameter, ret, .. } => vec![parameter.as_ref(), ret.as_ref()],
        }
    }

    /// Leaves of a pair after flattening unannotated nested pairs.
    /// A non-pair node is its own single field.
    pub fn pair_fields(&self) -> Vec<&Node> {
        let mut out = Vec::new();
        match &self.kind {
            NodeKind::Pair { left, right } => {
                collect_pair_fields(left, &mut out);
                collect_pair_fields(right, &mut out);
            }
            _ => out.push(self),
        }
        out
    }

    /// Alternatives of an `or` after flattening unannotated nested `or`s,
    /// each with the `Left`/`Right` path leading to it.
    pub fn or_alternatives(&self) -> Vec<(Vec<Side>, &Node)> {
        let mut out = Vec::new();
        match &self.kind {
            NodeKind::Or { left, right, .. } => {
                collect_or_alternatives(left, vec![Side::Left], &mut out);
                collect_or_alternatives(right, vec![Side::Right], &mut out);
            }
            _ => out.push((vec![], self)),
        }
        out
    }

    /// The settled alternative of an `or`, descending through unannotated
    /// nested `or`s.
    pub fn chosen_alternative(&self) -> Option<&Node> {
        match &self.kind {
            NodeKind::Or { left, right, side } => {
                let arm = match (*side)? {
                    Side::Left => left.as_ref(),
                    Side::Right => right.as_ref(),
                };
                if arm.is_prim(p::OR) && arm.annots.is_empty() {
                    arm.chosen_alternative()
                } else {
                    Some(arm)
                }
            }
            _ => None,
        }
    }

    /// Depth-first search over the type skeleton by field, type or display name.
    pub fn find_by_name(&self, name: &str) -> Option<&Node> {
        if self.annots.field.as_deref() == Some(name)
            || self.annots.type_name.as_deref() == Some(name)
            || self.display_name() == name
        {
            return Some(self);
        }
        self.type_children()
            .into_iter()
            .find_map(|child| child.find_by_name(name))
    }

    /// Rebuild the type expression this node was parsed from.
    pub fn to_type_wire(&self) -> Micheline {
        let args = match &self.kind {
            NodeKind::Scalar { type_args, .. } => type_args.clone(),
            NodeKind::Ticket { inner } => match &inner.kind {
                NodeKind::Pair { right, .. } => match &right.kind {
                    NodeKind::Pair { left, .. } => vec![left.to_type_wire()],
                    _ => vec![],
                },
                _ => vec![],
            },
            _ => self
                .type_children()
                .into_iter()
                .map(Node::to_type_wire)
                .collect(),
        };
        Micheline::prim_annotated(self.prim(), args, self.annots.to_wire())
    }
}

fn collect_pair_fields<'a>(node: &'a Node, out: &mut Vec<&'a Node>) {
    match &node.kind {
        NodeKind::Pair { left, right } if node.annots.is_empty() => {
            collect_pair_fields(left, out);
            collect_pair_fields(right, out);
        }
        _ => out.push(node),
    }
}

fn collect_or_alternatives<'a>(
    node: &'a Node,
    sides: Vec<Side>,
    out: &mut Vec<(Vec<Side>, &'a Node)>,
) {
    match &node.kind {
        NodeKind::Or { left, right, .. } if node.annots.is_empty() => {
            let mut l = sides.clone();
            l.push(Side::Left);
            collect_or_alternatives(left, l, out);
            let mut r = sides;
            r.push(Side::Right);
            collect_or_alternatives(right, r, out);
        }
        _ => out.push((sides, node)),
    }
}

// ──────────────────────────────────────────────
// Type parsing
// ──────────────────────────────────────────────

/// Parse a type expression rooted at path `0`.
pub fn parse_type(expr: &Micheline) -> Result<Node, EngineError> {
    parse_type_at(expr, "0")
}

/// Parse a type expression rooted at `path`.
pub fn parse_type_at(expr: &Micheline, path: &str) -> Result<Node, EngineError> {
    TypeParser::default().parse(expr, path.to_string(), 0)
}

#[derive(Default)]
struct TypeParser {
    next_id: usize,
}

impl TypeParser {
    fn parse(&mut self, expr: &Micheline, path: String, depth: usize) -> Result<Node, EngineError> {
        let node = expr
            .as_prim()
            .ok_or_else(|| EngineError::UnknownConstructor {
                prim: expr.kind_name(),
            })?;
        let id = self.next_id;
        self.next_id += 1;

        let kind = self.parse_kind(node, &path, depth)?;
        Ok(Node {
            id,
            path,
            annots: node.annotations(),
            depth,
            kind,
        })
    }

    fn child(
        &mut self,
        expr: &Micheline,
        path: &str,
        segment: &str,
        depth: usize,
    ) -> Result<Box<Node>, EngineError> {
        Ok(Box::new(self.parse(
            expr,
            format!("{}/{}", path, segment),
            depth + 1,
        )?))
    }

    fn parse_kind(
        &mut self,
        node: &PrimNode,
        path: &str,
        depth: usize,
    ) -> Result<NodeKind, EngineError> {
        if let Some(prim) = ScalarPrim::from_prim(&node.prim) {
            return Ok(NodeKind::Scalar {
                prim,
                type_args: node.args.clone(),
                value: None,
            });
        }

        let args = &node.args;
        let kind = match node.prim.as_str() {
            p::PAIR => {
                if args.len() < 2 {
                    return Err(EngineError::arity(2, args.len(), path));
                }
                let left = self.child(&args[0], path, "0", depth)?;
                let right = if args.len() == 2 {
                    self.child(&args[1], path, "1", depth)?
                } else {
                    let rest = Micheline::prim(p::PAIR, args[1..].to_vec());
                    self.child(&rest, path, "1", depth)?
                };
                NodeKind::Pair { left, right }
            }
            p::OR => {
                expect_args(node, 2, path)?;
                NodeKind::Or {
                    left: self.child(&args[0], path, "0", depth)?,
                    right: self.child(&args[1], path, "1", depth)?,
                    side: None,
                }
            }
            p::OPTION => {
                expect_args(node, 1, path)?;
                NodeKind::Option {
                    inner: self.child(&args[0], path, "o", depth)?,
                    some: None,
                }
            }
            p::LIST => {
                expect_args(node, 1, path)?;
                NodeKind::List {
                    elem: self.child(&args[0], path, "l", depth)?,
                    items: None,
                }
            }
            p::SET => {
                expect_args(node, 1, path)?;
                NodeKind::Set {
                    elem: self.child(&args[0], path, "s", depth)?,
                    items: None,
                }
            }
            p::MAP | p::BIG_MAP => {
                expect_args(node, 2, path)?;
                let key = self.child(&args[0], path, "k", depth)?;
                let value = self.child(&args[1], path, "v", depth)?;
                if node.prim == p::MAP {
                    NodeKind::Map {
                        key,
                        value,
                        entries: None,
                    }
                } else {
                    NodeKind::BigMap {
                        key,
                        value,
                        ptr: None,
                        entries: None,
                    }
                }
            }
            p::LAMBDA => {
                expect_args(node, 2, path)?;
                NodeKind::Lambda {
                    parameter: self.child(&args[0], path, "0", depth)?,
                    ret: self.child(&args[1], path, "1", depth)?,
                    code: None,
                }
            }
            p::CONTRACT => {
                expect_args(node, 1, path)?;
                NodeKind::Contract {
                    parameter: self.child(&args[0], path, "0", depth)?,
                    value: None,
                }
            }
            p::TICKET => {
                expect_args(node, 1, path)?;
                let content = args[0].clone();
                let shape = Micheline::prim(
                    p::PAIR,
                    vec![
                        Micheline::prim_annotated(p::ADDRESS, vec![], vec!["%ticketer".into()]),
                        Micheline::prim(
                            p::PAIR,
                            vec![
                                content,
                                Micheline::prim_annotated(p::NAT, vec![], vec!["%amount".into()]),
                            ],
                        ),
                    ],
                );
                NodeKind::Ticket {
                    inner: self.child(&shape, path, "0", depth)?,
                }
            }
            other => {
                return Err(EngineError::UnknownConstructor {
                    prim: other.to_string(),
                })
            }
        };
        Ok(kind)
    }
}

fn expect_args(node: &PrimNode, n: usize, path: &str) -> Result<(), EngineError> {
    if node.args.len() != n {
        return Err(EngineError::arity(n, node.args.len(), path));
    }
    Ok(())
}
