mod trait_store;
mod types;

pub use trait_store::{StateStore, StoreError};
pub use types::*;
