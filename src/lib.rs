//! An ordered-set and generic sorted-multimap storage engine: a
//! three-tier, auto-promoting packed-array representation (small tier:
//! single array, linear scan; medium tier: two arrays split at a
//! boundary; full tier: a sharded, hash-indexed set of sub-arrays) for
//! maintaining unique members ranked by `(score, member)`, plus a
//! generic multimap variant parameterized by entry width and key
//! uniqueness.
//!
//! See [`value`] for the tagged scalar type stored in every array slot,
//! [`flex`] for the packed array itself, [`hashindex`] for the full
//! tier's open-addressed index, [`atompool`] for member-string interning,
//! [`orderedset`] for the `(score, member)` specialization, and
//! [`multimap`] for the generic width-`n` variant.

pub mod atompool;
pub mod flex;
pub mod hashindex;
pub mod multimap;
pub mod orderedset;
pub mod value;

pub use atompool::{AtomId, AtomPool, Backend};
pub use flex::Flex;
pub use hashindex::HashIndex;
pub use multimap::{Multimap, MultimapConfig};
pub use orderedset::{Aggregate, OrderedSet, OrderedSetConfig, OrderedSetIter, ScoreRange};
pub use value::Value;
