//! Read-only access to Zarr v2 arrays, fetching only the chunks a read needs.

pub mod array;
pub mod blosc;
pub mod codec;
pub mod dtype;
pub mod metadata;
pub mod store;

pub use array::ZarrArray;
pub use store::{HttpStore, Store};
