//! Variadic connective carrier enforcing arity >= 2 by construction.

use serde::{Deserialize, Serialize};

/// Operand list of a variadic connective.
///
/// The `first, second, rest` layout makes an arity below two unrepresentable.
/// Operand order is preserved: connectives are associative but not
/// commutative in their rendering, and evaluation treats them as multisets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Connective<T> {
    first: Box<T>,
    second: Box<T>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    rest: Vec<T>,
}

impl<T> Connective<T> {
    /// Creates a connective from its first two operands and the remainder.
    #[must_use]
    pub fn new(first: T, second: T, rest: Vec<T>) -> Self {
        Self {
            first: Box::new(first),
            second: Box::new(second),
            rest,
        }
    }

    /// Number of operands (always >= 2).
    #[must_use]
    pub fn len(&self) -> usize {
        2 + self.rest.len()
    }

    /// Always false; a connective carries at least two operands.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Iterates the operands in order.
    pub fn operands(&self) -> impl Iterator<Item = &T> {
        std::iter::once(self.first.as_ref())
            .chain(std::iter::once(self.second.as_ref()))
            .chain(self.rest.iter())
    }

    /// Consumes the connective into its ordered operand list.
    #[must_use]
    pub fn into_operands(self) -> Vec<T> {
        let mut out = Vec::with_capacity(2 + self.rest.len());
        out.push(*self.first);
        out.push(*self.second);
        out.extend(self.rest);
        out
    }

    /// Applies `f` to every operand, preserving order.
    #[must_use]
    pub fn map(&self, f: impl Fn(&T) -> T) -> Self {
        Self {
            first: Box::new(f(&self.first)),
            second: Box::new(f(&self.second)),
            rest: self.rest.iter().map(f).collect(),
        }
    }
}
