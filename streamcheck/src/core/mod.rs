//! Core value types: records, tuples and condition states.

mod record;
mod state;
mod tuple;

pub use record::Record;
pub use state::ConditionState;
pub use tuple::Tuple;
