pub mod backend;
mod codec;
pub mod config;
pub mod error;
mod mutate;
mod path;
pub mod store;
pub mod trie;
pub mod types;
mod walk;

pub use {
    config::Config,
    error::{Error, Result},
    trie::{Op, Trie},
};
