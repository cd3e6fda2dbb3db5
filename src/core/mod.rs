pub mod canonical;
pub mod context;
pub mod engine;
pub mod lexicon;
pub mod trie;
pub mod types;
