//! Property-based tests for the parser.
//!
//! These check invariants that hold for any input, not just fixtures: the parse is
//! total, locations stay inside the source, and escaping is stable.

mod generators;
mod invariants;
