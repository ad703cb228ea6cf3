//! Root-selector expressions.
//!
//! A selector narrows the walk to a subtree of the loaded document before
//! any walking starts: dotted segments name mapping fields, `[n]` indexes
//! a sequence (1-based). `servers[2].config` selects the `config` field of
//! the second element of `servers`.
//!
//! Selector evaluation is fatal: a walk against the wrong root is worse
//! than no walk, so errors here abort before any output file is created.

use mirrorwalk_core::{Key, ObjectId, ObjectSource};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SelectError {
    #[error("malformed selector segment '{0}'")]
    Malformed(String),
    #[error("selector step '{0}' did not resolve to a value")]
    Unresolved(String),
}

pub type SelectResult<T> = Result<T, SelectError>;

/// One navigation step of a parsed selector.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Field(String),
    Index(i64),
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Field(name) => write!(f, "{name}"),
            Step::Index(i) => write!(f, "[{i}]"),
        }
    }
}

/// Evaluate `expr` against `source` starting from `root`.
pub fn select(source: &dyn ObjectSource, root: ObjectId, expr: &str) -> SelectResult<ObjectId> {
    let mut current = root;
    for step in parse(expr)? {
        current = resolve(source, current, &step)?;
    }
    Ok(current)
}

fn parse(expr: &str) -> SelectResult<Vec<Step>> {
    if expr.trim().is_empty() {
        return Err(SelectError::Malformed(expr.to_string()));
    }
    let mut steps = Vec::new();
    for segment in expr.split('.') {
        let bracket = segment.find('[').unwrap_or(segment.len());
        let (name, mut rest) = segment.split_at(bracket);
        if name.is_empty() && rest.is_empty() {
            return Err(SelectError::Malformed(segment.to_string()));
        }
        if !name.is_empty() {
            steps.push(Step::Field(name.to_string()));
        }
        while !rest.is_empty() {
            let inner = rest
                .strip_prefix('[')
                .and_then(|r| r.split_once(']'))
                .ok_or_else(|| SelectError::Malformed(segment.to_string()))?;
            let index: i64 = inner
                .0
                .parse()
                .map_err(|_| SelectError::Malformed(segment.to_string()))?;
            steps.push(Step::Index(index));
            rest = inner.1;
        }
    }
    Ok(steps)
}

fn resolve(source: &dyn ObjectSource, id: ObjectId, step: &Step) -> SelectResult<ObjectId> {
    let children = source
        .try_children(id)
        .ok_or_else(|| SelectError::Unresolved(step.to_string()))?;
    let wanted = match step {
        Step::Field(name) => Key::Str(name.clone()),
        Step::Index(i) => Key::Int(*i),
    };
    children
        .into_iter()
        .find(|(key, _)| *key == wanted)
        .map(|(_, child)| child)
        .ok_or_else(|| SelectError::Unresolved(step.to_string()))
}
