//! TOML configuration for the remoting server: listener, provider
//! descriptor, bearer tokens, store key names and record type definitions.

pub mod error;
pub mod loader;
pub mod schema;

pub use {
    error::{Error, Result},
    loader::{CONFIG_ENV, CONFIG_FILE_NAME, discover, load, load_from},
    schema::{AuthConfig, Config, FieldConfig, ModelConfig, ProviderConfig, ServerConfig, TokenConfig},
};
