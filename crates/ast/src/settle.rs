//! Binding wire values to a parsed schema.

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tzindex_micheline::prim as p;
use tzindex_micheline::Micheline;

use crate::error::EngineError;
use crate::node::{Node, NodeKind, ScalarPrim, Side};

const DATA_CONSTRUCTORS: &[&str] = &[
    p::D_PAIR,
    p::D_LEFT,
    p::D_RIGHT,
    p::D_SOME,
    p::D_NONE,
    p::D_TRUE,
    p::D_FALSE,
    p::D_UNIT,
    p::D_ELT,
];

impl Node {
    /// Bind `value` to this node and everything below it.
    ///
    /// Pair values may arrive right-combed (`Pair a b c`) or as a flat
    /// sequence; both are read as nested binary pairs.
    pub fn settle(&mut self, value: &Micheline) -> Result<(), EngineError> {
        let prim_name = self.prim();
        let path = self.path.clone();

        match &mut self.kind {
            NodeKind::Scalar {
                prim, value: slot, ..
            } => {
                check_scalar(*prim, value)?;
                *slot = Some(value.clone());
            }
            NodeKind::Contract { value: slot, .. } => {
                if !matches!(value, Micheline::String { .. }) && !is_hex(value) {
                    return Err(EngineError::mismatch(prim_name, "string or hex bytes"));
                }
                *slot = Some(value.clone());
            }
            NodeKind::Ticket { inner } => inner.settle(value)?,
            NodeKind::Option { inner, some } => {
                let (prim, args) = data_prim(value, prim_name, &[p::D_SOME, p::D_NONE])?;
                if prim == p::D_NONE {
                    expect_count(args, 0, &path)?;
                    *some = Some(false);
                } else {
                    expect_count(args, 1, &path)?;
                    inner.settle(&args[0])?;
                    *some = Some(true);
                }
            }
            NodeKind::Pair { left, right } => {
                let (first, rest) = pair_args(value, &path)?;
                left.settle(&first)?;
                right.settle(&rest)?;
            }
            NodeKind::Or { left, right, side } => {
                let (prim, args) = data_prim(value, prim_name, &[p::D_LEFT, p::D_RIGHT])?;
                expect_count(args, 1, &path)?;
                if prim == p::D_LEFT {
                    left.settle(&args[0])?;
                    *side = Some(Side::Left);
                } else {
                    right.settle(&args[0])?;
                    *side = Some(Side::Right);
                }
            }
            NodeKind::List { elem, items } | NodeKind::Set { elem, items } => {
                let seq = value
                    .as_seq()
                    .ok_or_else(|| EngineError::mismatch(prim_name, "sequence"))?;
                let mut settled = Vec::with_capacity(seq.len());
                for item in seq {
                    let mut node = (**elem).clone();
                    node.settle(item)?;
                    settled.push(node);
                }
                *items = Some(settled);
            }
            NodeKind::Map {
                key,
                value: value_type,
                entries,
            } => {
                let seq = value
                    .as_seq()
                    .ok_or_else(|| EngineError::mismatch(prim_name, "sequence of Elt"))?;
                *entries = Some(settle_entries(key, value_type, seq, &path)?);
            }
            NodeKind::BigMap {
                key,
                value: value_type,
                ptr,
                entries,
            } => match value {
                Micheline::Int { int } => {
                    let parsed = int
                        .parse::<i64>()
                        .map_err(|_| EngineError::mismatch(prim_name, "64-bit pointer"))?;
                    *ptr = Some(parsed);
                }
                Micheline::Seq(seq) => {
                    *entries = Some(settle_entries(key, value_type, seq, &path)?);
                }
                _ => return Err(EngineError::mismatch(prim_name, "pointer or sequence of Elt")),
            },
            NodeKind::Lambda { code, .. } => match value {
                Micheline::Seq(_) | Micheline::Prim(_) => *code = Some(value.clone()),
                _ => return Err(EngineError::mismatch(prim_name, "instruction sequence")),
            },
        }
        Ok(())
    }
}

/// Settle a fresh copy of `key_type` and `value_type` for every `Elt`.
pub(crate) fn settle_entries(
    key_type: &Node,
    value_type: &Node,
    seq: &[Micheline],
    path: &str,
) -> Result<Vec<(Node, Node)>, EngineError> {
    let mut entries = Vec::with_capacity(seq.len());
    for elt in seq {
        let (_, args) = data_prim(elt, p::MAP, &[p::D_ELT])?;
        expect_count(args, 2, path)?;
        let mut key = key_type.clone();
        key.settle(&args[0])?;
        let mut value = value_type.clone();
        value.settle(&args[1])?;
        entries.push((key, value));
    }
    Ok(entries)
}

/// Split a pair value into its first component and the rest, accepting the
/// combed and sequence forms.
fn pair_args(value: &Micheline, path: &str) -> Result<(Micheline, Micheline), EngineError> {
    let args = match value {
        Micheline::Seq(items) => items.as_slice(),
        _ => data_prim(value, p::PAIR, &[p::D_PAIR])?.1,
    };
    match args.len() {
        0 | 1 => Err(EngineError::arity(2, args.len(), path)),
        2 => Ok((args[0].clone(), args[1].clone())),
        _ => Ok((
            args[0].clone(),
            Micheline::prim(p::D_PAIR, args[1..].to_vec()),
        )),
    }
}

/// Expect a data constructor from `allowed` and return its name and arguments.
fn data_prim<'a>(
    value: &'a Micheline,
    type_prim: &str,
    allowed: &[&str],
) -> Result<(&'a str, &'a [Micheline]), EngineError> {
    match value.as_prim() {
        Some(node) if allowed.contains(&node.prim.as_str()) => {
            Ok((node.prim.as_str(), node.args.as_slice()))
        }
        Some(node) if !DATA_CONSTRUCTORS.contains(&node.prim.as_str()) => {
            Err(EngineError::UnknownConstructor {
                prim: node.prim.clone(),
            })
        }
        _ => Err(EngineError::mismatch(type_prim, allowed.join(" or "))),
    }
}

fn expect_count(args: &[Micheline], n: usize, path: &str) -> Result<(), EngineError> {
    if args.len() != n {
        return Err(EngineError::arity(n, args.len(), path));
    }
    Ok(())
}

pub(crate) fn is_decimal(s: &str, allow_negative: bool) -> bool {
    let digits = match s.strip_prefix('-') {
        Some(rest) if allow_negative => rest,
        Some(_) => return false,
        None => s,
    };
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn is_hex(value: &Micheline) -> bool {
    matches!(value, Micheline::Bytes { bytes } if hex::decode(bytes).is_ok())
}

fn check_scalar(prim: ScalarPrim, value: &Micheline) -> Result<(), EngineError> {
    let name = prim.as_str();
    let ok = match prim {
        ScalarPrim::Int => matches!(value, Micheline::Int { int } if is_decimal(int, true)),
        ScalarPrim::Nat | ScalarPrim::Mutez => {
            matches!(value, Micheline::Int { int } if is_decimal(int, false))
        }
        ScalarPrim::String => matches!(value, Micheline::String { .. }),
        ScalarPrim::Bytes => is_hex(value),
        ScalarPrim::Bool => {
            let (_, args) = data_prim(value, name, &[p::D_TRUE, p::D_FALSE])?;
            args.is_empty()
        }
        ScalarPrim::Unit => {
            let (_, args) = data_prim(value, name, &[p::D_UNIT])?;
            args.is_empty()
        }
        ScalarPrim::Timestamp => match value {
            Micheline::Int { int } => is_decimal(int, true),
            Micheline::String { string } => OffsetDateTime::parse(string, &Rfc3339).is_ok(),
            _ => false,
        },
        ScalarPrim::Address
        | ScalarPrim::Key
        | ScalarPrim::KeyHash
        | ScalarPrim::Signature
        | ScalarPrim::ChainId => matches!(value, Micheline::String { .. }) || is_hex(value),
        ScalarPrim::Bls12381Fr => matches!(value, Micheline::Int { .. }) || is_hex(value),
        ScalarPrim::Bls12381G1 | ScalarPrim::Bls12381G2 => is_hex(value),
        ScalarPrim::Operation
        | ScalarPrim::Never
        | ScalarPrim::SaplingState
        | ScalarPrim::SaplingTransaction => true,
    };
    if ok {
        return Ok(());
    }
    let expected = match prim {
        ScalarPrim::Int => "int literal",
        ScalarPrim::Nat | ScalarPrim::Mutez => "non-negative int literal",
        ScalarPrim::String => "string literal",
        ScalarPrim::Bool | ScalarPrim::Unit => "nullary constructor",
        ScalarPrim::Timestamp => "int or RFC 3339 string literal",
        ScalarPrim::Bls12381Fr => "int or bytes literal",
        ScalarPrim::Bytes | ScalarPrim::Bls12381G1 | ScalarPrim::Bls12381G2 => "hex bytes literal",
        _ => "string or hex bytes literal",
    };
    Err(EngineError::mismatch(name, expected))
}
