//! `pytree-value` provides a dynamic value model for nested, heterogeneous
//! container data, together with the small adapter surface the `pytree`
//! structure core is written against.
//!
//! # Design
//!
//! The host value system is a closed set of concrete types: scalars
//! (`None`, booleans, integers, floats, strings), the standard containers
//! (tuples, lists, plain / insertion-ordered / defaulting mappings, deques),
//! named records (named tuples and struct sequences), and an extension hook
//! ([`ExtensionType`]) for user-defined container types. Container structure
//! libraries dispatch statically over this set instead of reflecting over
//! arbitrary host objects.
//!
//! Two properties matter to callers:
//!
//! - **Total equality and hashing.** `Value` implements `Eq` and `Hash` for
//!   every variant (floats compare by bit pattern), so values can be used as
//!   mapping keys and compared after round-trips.
//! - **Canonical key ordering.** [`total_order_sort`] orders heterogeneous
//!   mapping keys deterministically: natural order where it exists, a
//!   qualified-type-name fallback where it does not, and insertion order
//!   when even that fails.

#![warn(missing_docs)]
#![warn(clippy::std_instead_of_core)]

mod types;
pub use types::{ExtensionType, RecordType};

mod value;
pub use value::{Value, ValueMap, ValueType};

mod repr;

mod sort;
pub use sort::{sorted_keys, total_order_sort, try_compare};
