//! Feature ranking.
//!
//! Turns the per-diagnosis importance table of a baseline fit into feature
//! orderings: an aggregate-importance order, a top-N occurrence order, and
//! a consensus order fusing the two.
pub mod ranking;
