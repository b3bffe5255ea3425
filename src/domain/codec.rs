//! Conversion between loosely-structured tree records and [`SkillsTree`].
//!
//! The record format is `{name, attributes?, children?}`. Decoding tolerates a
//! `children` value that is a single record instead of a list, and treats a
//! missing or `null` `children`/`attributes` as empty.

use generational_arena::Index;
use serde_json::{Map, Value};
use tracing::trace;

use crate::domain::arena::{Attributes, SkillsTree};
use crate::domain::error::{DomainError, DomainResult};

/// Decodes a tree record into a [`SkillsTree`].
///
/// Fails with [`DomainError::MalformedTree`] when a record has no non-empty
/// string `name`, when `attributes` is not an object, or when `children` is
/// neither an object nor an array.
pub fn decode(record: &Value) -> DomainResult<SkillsTree> {
    let (name, attributes) = read_node(record, "")?;
    let mut tree = SkillsTree::new(name.clone(), attributes);

    let mut stack: Vec<(&Value, Index, String)> = Vec::new();
    push_children(&mut stack, record, tree.root(), &name)?;

    while let Some((child_record, parent, parent_path)) = stack.pop() {
        let (name, attributes) = read_node(child_record, &parent_path)?;
        let path = format!("{parent_path}/{name}");
        let child = tree.add_new_child(parent, name, attributes)?;
        push_children(&mut stack, child_record, child, &path)?;
    }

    trace!("decoded tree with {} nodes", tree.node_count());
    Ok(tree)
}

/// Encodes the whole tree; the inverse of [`decode`].
pub fn encode(tree: &SkillsTree, include_attributes: bool) -> Value {
    tree.to_record(tree.root(), include_attributes)
}

fn read_node(record: &Value, parent_path: &str) -> DomainResult<(String, Attributes)> {
    let object = record.as_object().ok_or_else(|| {
        DomainError::malformed(location(parent_path), format!("node is not an object: {record}"))
    })?;

    let name = match object.get("name") {
        Some(Value::String(name)) if !name.trim().is_empty() => name.clone(),
        Some(Value::String(_)) => {
            return Err(DomainError::malformed(location(parent_path), "empty name"))
        }
        Some(other) => {
            return Err(DomainError::malformed(
                location(parent_path),
                format!("name is not a string: {other}"),
            ))
        }
        None => return Err(DomainError::malformed(location(parent_path), "missing name")),
    };

    let attributes = match object.get("attributes") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(attributes)) => attributes.clone(),
        Some(other) => {
            return Err(DomainError::malformed(
                format!("{parent_path}/{name}"),
                format!("attributes is not a mapping: {other}"),
            ))
        }
    };

    Ok((name, attributes))
}

fn push_children<'a>(
    stack: &mut Vec<(&'a Value, Index, String)>,
    record: &'a Value,
    parent: Index,
    path: &str,
) -> DomainResult<()> {
    let children: Vec<&Value> = match record.get("children") {
        None | Some(Value::Null) => Vec::new(),
        // singleton child given as a bare record
        Some(single @ Value::Object(_)) => vec![single],
        Some(Value::Array(items)) => items.iter().collect(),
        Some(other) => {
            return Err(DomainError::malformed(
                path,
                format!("children is neither a record nor a list: {other}"),
            ))
        }
    };
    // reversed so siblings pop, and attach, in declared order
    for child in children.into_iter().rev() {
        stack.push((child, parent, path.to_string()));
    }
    Ok(())
}

fn location(parent_path: &str) -> String {
    if parent_path.is_empty() {
        "<root>".to_string()
    } else {
        format!("{parent_path}/<child>")
    }
}
