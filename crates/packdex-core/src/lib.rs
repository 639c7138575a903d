pub mod config;
pub mod crypto;
pub mod index;
pub mod repo;

pub use packdex_storage as storage;
pub use packdex_types as types;
pub use packdex_types::error;

#[cfg(test)]
mod tests;
#[cfg(test)]
mod testutil;
