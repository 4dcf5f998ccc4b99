//! Structural comparison, type equality and value diffs.

use std::cmp::Ordering;

use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tzindex_micheline::prim as p;
use tzindex_micheline::Micheline;

use crate::error::EngineError;
use crate::metadata::entry_name;
use crate::node::{Node, NodeKind, ScalarPrim, Side};
use crate::render::{scalar_text, DiffType, RenderNode};

impl Node {
    /// Total order over comparable settled values.
    pub fn compare(&self, other: &Node) -> Result<Ordering, EngineError> {
        let not_comparable = || EngineError::NotComparable {
            left: self.prim().to_string(),
            right: other.prim().to_string(),
        };
        let unsettled = |n: &Node| EngineError::Unsettled {
            path: n.path.clone(),
        };

        match (&self.kind, &other.kind) {
            (
                NodeKind::Scalar {
                    prim: a_prim,
                    value: a,
                    ..
                },
                NodeKind::Scalar {
                    prim: b_prim,
                    value: b,
                    ..
                },
            ) => {
                if a_prim != b_prim || !a_prim.is_comparable() {
                    return Err(not_comparable());
                }
                let a = a.as_ref().ok_or_else(|| unsettled(self))?;
                let b = b.as_ref().ok_or_else(|| unsettled(other))?;
                compare_scalar(*a_prim, a, b)
            }
            (NodeKind::Pair { left: al, right: ar }, NodeKind::Pair { left: bl, right: br }) => {
                match al.compare(bl)? {
                    Ordering::Equal => ar.compare(br),
                    ord => Ok(ord),
                }
            }
            (
                NodeKind::Or {
                    left: al,
                    right: ar,
                    side: a_side,
                },
                NodeKind::Or {
                    left: bl,
                    right: br,
                    side: b_side,
                },
            ) => {
                let a_side = a_side.ok_or_else(|| unsettled(self))?;
                let b_side = b_side.ok_or_else(|| unsettled(other))?;
                match (a_side, b_side) {
                    (Side::Left, Side::Left) => al.compare(bl),
                    (Side::Right, Side::Right) => ar.compare(br),
                    (Side::Left, Side::Right) => Ok(Ordering::Less),
                    (Side::Right, Side::Left) => Ok(Ordering::Greater),
                }
            }
            (
                NodeKind::Option {
                    inner: a,
                    some: a_some,
                },
                NodeKind::Option {
                    inner: b,
                    some: b_some,
                },
            ) => {
                let a_some = a_some.ok_or_else(|| unsettled(self))?;
                let b_some = b_some.ok_or_else(|| unsettled(other))?;
                match (a_some, b_some) {
                    (true, true) => a.compare(b),
                    (a_some, b_some) => Ok(a_some.cmp(&b_some)),
                }
            }
            _ => Err(not_comparable()),
        }
    }

    /// Type equality ignoring annotations.
    pub fn equal_type(&self, other: &Node) -> bool {
        if self.prim() != other.prim() {
            return false;
        }
        let a = self.type_children();
        let b = other.type_children();
        a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.equal_type(y))
    }

    /// Diff `self` (before) against `other` (after).
    ///
    /// Map and big-map entries are paired by structural key equality, which
    /// is quadratic in the number of entries.
    pub fn distinguish(&self, other: &Node) -> Result<RenderNode, EngineError> {
        if !self.equal_type(other) {
            return Err(EngineError::NotComparable {
                left: self.prim().to_string(),
                right: other.prim().to_string(),
            });
        }

        match (&self.kind, &other.kind) {
            (NodeKind::Pair { .. }, NodeKind::Pair { .. }) => {
                let mut out = other.render_shell()?;
                for (a, b) in self.pair_fields().into_iter().zip(other.pair_fields()) {
                    out.children.push(a.distinguish(b)?);
                }
                Ok(out)
            }
            (NodeKind::Ticket { inner: a }, NodeKind::Ticket { inner: b }) => {
                let mut out = other.render_shell()?;
                out.children = a.distinguish(b)?.children;
                Ok(out)
            }
            (NodeKind::Or { .. }, NodeKind::Or { .. }) => {
                let a = self.chosen_alternative();
                let b = other.chosen_alternative();
                match (a, b) {
                    (Some(a), Some(b)) if a.path == b.path => {
                        let mut out = other.render()?;
                        if !out.children.is_empty() {
                            let mut child = a.distinguish(b)?;
                            if let Some(label) = entry_name(b) {
                                child.name = Some(label);
                            }
                            out.children = vec![child];
                        }
                        Ok(out)
                    }
                    _ => updated(self, other),
                }
            }
            (
                NodeKind::Option {
                    inner: a,
                    some: a_some,
                },
                NodeKind::Option {
                    inner: b,
                    some: b_some,
                },
            ) => match (a_some, b_some) {
                (Some(true), Some(true)) => {
                    let mut out = a.distinguish(b)?;
                    out.name = Some(other.display_name());
                    Ok(out)
                }
                (Some(false), Some(false)) => other.render(),
                (_, Some(true)) => Ok(other.render()?.tag_all(DiffType::Created)),
                _ => Ok(self.render()?.tag_all(DiffType::Deleted)),
            },
            (NodeKind::List { items: a, .. }, NodeKind::List { items: b, .. }) => {
                let a = a.as_deref().unwrap_or_default();
                let b = b.as_deref().unwrap_or_default();
                let mut out = other.render_shell()?;
                for i in 0..a.len().max(b.len()) {
                    let child = match (a.get(i), b.get(i)) {
                        (Some(x), Some(y)) => x.distinguish(y)?,
                        (Some(x), None) => x.render()?.tag_all(DiffType::Deleted),
                        (None, Some(y)) => y.render()?.tag_all(DiffType::Created),
                        (None, None) => continue,
                    };
                    out.children.push(child);
                }
                Ok(out)
            }
            (NodeKind::Set { items: a, .. }, NodeKind::Set { items: b, .. }) => {
                let a = a.as_deref().unwrap_or_default();
                let b = b.as_deref().unwrap_or_default();
                let mut out = other.render_shell()?;
                for x in a {
                    let mut child = x.render()?;
                    if !contains_value(b, x)? {
                        child = child.tag_all(DiffType::Deleted);
                    }
                    out.children.push(child);
                }
                for y in b {
                    if !contains_value(a, y)? {
                        out.children.push(y.render()?.tag_all(DiffType::Created));
                    }
                }
                Ok(out)
            }
            (NodeKind::Map { entries: a, .. }, NodeKind::Map { entries: b, .. })
            | (NodeKind::BigMap { entries: a, .. }, NodeKind::BigMap { entries: b, .. }) => {
                let mut out = other.render_shell()?;
                if let NodeKind::BigMap { ptr, .. } = &other.kind {
                    out.value = ptr.map(Value::from);
                }
                let a = a.as_deref().unwrap_or_default();
                let b = b.as_deref().unwrap_or_default();
                for (key, value) in a {
                    let mut child = match find_entry(b, key)? {
                        Some(after) => value.distinguish(after)?,
                        None => value.render()?.tag_all(DiffType::Deleted),
                    };
                    child.name = Some(key.key_label()?);
                    out.children.push(child);
                }
                for (key, value) in b {
                    if find_entry(a, key)?.is_none() {
                        let mut child = value.render()?.tag_all(DiffType::Created);
                        child.name = Some(key.key_label()?);
                        out.children.push(child);
                    }
                }
                if let (NodeKind::BigMap { ptr: pa, .. }, NodeKind::BigMap { ptr: pb, .. }) =
                    (&self.kind, &other.kind)
                {
                    if pa != pb && out.diff_type.is_none() {
                        out.diff_type = Some(DiffType::Updated);
                        out.from = pa.map(Value::from);
                    }
                }
                Ok(out)
            }
            _ => {
                if self.to_wire(false)? == other.to_wire(false)? {
                    other.render()
                } else {
                    updated(self, other)
                }
            }
        }
    }

    /// Rendered node without children, for containers rebuilt by a diff.
    fn render_shell(&self) -> Result<RenderNode, EngineError> {
        let mut out = match &self.kind {
            NodeKind::Map { .. } | NodeKind::BigMap { .. } => RenderNode {
                prim: self.prim().to_string(),
                kind: self.prim().to_string(),
                name: Some(self.display_name()),
                value: None,
                from: None,
                diff_type: None,
                children: Vec::new(),
            },
            _ => self.render()?,
        };
        out.children.clear();
        Ok(out)
    }
}

fn updated(before: &Node, after: &Node) -> Result<RenderNode, EngineError> {
    let mut out = after.render()?;
    out.diff_type = Some(DiffType::Updated);
    out.from = match before.render()?.value {
        Some(value) => Some(value),
        None => Some(before.to_wire(false)?.to_json()),
    };
    Ok(out)
}

fn contains_value(items: &[Node], needle: &Node) -> Result<bool, EngineError> {
    let wanted = needle.to_wire(false)?;
    for item in items {
        if item.to_wire(false)? == wanted {
            return Ok(true);
        }
    }
    Ok(false)
}

fn find_entry<'a>(entries: &'a [(Node, Node)], key: &Node) -> Result<Option<&'a Node>, EngineError> {
    let wanted = key.to_wire(false)?;
    for (k, v) in entries {
        if k.to_wire(false)? == wanted {
            return Ok(Some(v));
        }
    }
    Ok(None)
}

fn compare_scalar(prim: ScalarPrim, a: &Micheline, b: &Micheline) -> Result<Ordering, EngineError> {
    let ord = match prim {
        ScalarPrim::Unit => Ordering::Equal,
        ScalarPrim::Bool => a.is_prim(p::D_TRUE).cmp(&b.is_prim(p::D_TRUE)),
        ScalarPrim::Int | ScalarPrim::Nat | ScalarPrim::Mutez => {
            compare_decimal(a.as_int().unwrap_or("0"), b.as_int().unwrap_or("0"))
        }
        ScalarPrim::Timestamp => compare_decimal(&timestamp_seconds(a)?, &timestamp_seconds(b)?),
        ScalarPrim::Bytes => a
            .as_bytes()
            .map(str::to_ascii_lowercase)
            .cmp(&b.as_bytes().map(str::to_ascii_lowercase)),
        _ => scalar_text(prim, a)?.cmp(&scalar_text(prim, b)?),
    };
    Ok(ord)
}

fn timestamp_seconds(value: &Micheline) -> Result<String, EngineError> {
    let invalid = || EngineError::mismatch(p::TIMESTAMP, "int or RFC 3339 string literal");
    match value {
        Micheline::Int { int } => Ok(int.clone()),
        Micheline::String { string } => OffsetDateTime::parse(string, &Rfc3339)
            .map(|ts| ts.unix_timestamp().to_string())
            .map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

/// Compare two arbitrary-precision decimal strings.
fn compare_decimal(a: &str, b: &str) -> Ordering {
    let (a_neg, a_digits) = split_sign(a);
    let (b_neg, b_digits) = split_sign(b);
    match (a_neg, b_neg) {
        (false, true) => Ordering::Greater,
        (true, false) => Ordering::Less,
        (false, false) => compare_magnitude(a_digits, b_digits),
        (true, true) => compare_magnitude(b_digits, a_digits),
    }
}

fn split_sign(s: &str) -> (bool, &str) {
    let (neg, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let digits = digits.trim_start_matches('0');
    // -0 is 0
    (neg && !digits.is_empty(), digits)
}

fn compare_magnitude(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}
