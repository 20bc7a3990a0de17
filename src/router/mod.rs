//! Route registry and path matching.
//!
//! - [`pattern`]: compiles `/users/:id`-style templates into anchored matchers
//! - [`table`]: static lookup table plus ordered dynamic list

pub mod pattern;
pub mod table;

pub use pattern::{canonical_path, strip_query, RoutePattern};
pub use table::{RouteEntry, RouteMatch, RouteTable};
