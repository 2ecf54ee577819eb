pub mod toml_loader;

pub use toml_loader::{load_master_topics, load_vocabulary, load_vocabulary_file};
