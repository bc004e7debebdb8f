//! The MotionQL query language: linear-time dynamic logic over finite traces.
//!
//! Queries combine single-position propositions with regular path
//! expressions. Everything is kept in negation normal form: negation appears
//! only on ground facts, and [`Query::negated`]/[`Proposition::negated`]
//! push negation through connectives by structural descent.

mod connective;
mod formula;
mod path;
mod proposition;
mod value;

pub use connective::Connective;
pub use formula::Query;
pub use path::Path;
pub use proposition::Proposition;
pub use value::QueryValue;
