//! Configuration file schema.

use std::{collections::BTreeSet, path::PathBuf};

use {
    remoting_crud::CrudOptions,
    remoting_protocol::routes,
    remoting_store::{FieldDescriptor, FieldKind, Record, RecordType, StoreConfig},
    serde::{Deserialize, Serialize},
    serde_json::Value,
};

use crate::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub provider: ProviderConfig,
    pub auth: AuthConfig,
    /// Store key names and metadata settings shared by every model.
    pub store: StoreConfig,
    pub models: Vec<ModelConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            provider: ProviderConfig::default(),
            auth: AuthConfig::default(),
            store: StoreConfig::default().with_metadata(true),
            models: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Re-raise handler failures to the transport as HTTP 500.
    pub debug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 8080,
            debug: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub url: String,
    pub namespace: String,
    pub descriptor: String,
    pub id: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            url: "/router".into(),
            namespace: "Remoting".into(),
            descriptor: "Descriptor".into(),
            id: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub tokens: Vec<TokenConfig>,
}

/// A bearer token and the permissions it grants.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub token: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    /// Field kind name, e.g. `text`, `integer`, `CharField`, `ForeignKey`.
    pub kind: String,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub label: Option<String>,
}

/// One record type exposed through the CRUD actions.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    /// Remoting action name; defaults to `name`.
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default = "default_id_field")]
    pub id_field: String,
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
    /// JSON file holding an array of initial records.
    #[serde(default)]
    pub seed: Option<PathBuf>,
    /// Overrides of the shared `[store]` table for this model only.
    #[serde(default)]
    pub store: Option<toml::Table>,
    #[serde(flatten)]
    pub crud: CrudOptions,
}

fn default_id_field() -> String {
    "id".into()
}

impl ModelConfig {
    pub fn action_name(&self) -> &str {
        self.action.as_deref().unwrap_or(&self.name)
    }

    fn invalid(&self, message: impl Into<String>) -> Error {
        Error::Model {
            model: self.name.clone(),
            message: message.into(),
        }
    }

    /// Build the record type, resolving every field kind.
    pub fn record_type(&self) -> Result<RecordType> {
        if self.name.trim().is_empty() {
            return Err(self.invalid("model name must not be empty"));
        }
        let mut seen = BTreeSet::new();
        let mut fields = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(self.invalid(format!("duplicate field `{}`", field.name)));
            }
            let mut descriptor = FieldDescriptor::new(&field.name, FieldKind::parse(&field.name, &field.kind)?);
            if let Some(default) = &field.default {
                descriptor = descriptor.with_default(default.clone());
            }
            if field.nullable {
                descriptor = descriptor.nullable();
            }
            if field.primary_key {
                descriptor = descriptor.primary_key();
            }
            if let Some(label) = &field.label {
                descriptor = descriptor.with_label(label);
            }
            fields.push(descriptor);
        }
        if fields.iter().filter(|f| f.primary_key).count() > 1 {
            return Err(self.invalid("more than one primary key"));
        }
        Ok(RecordType::new(&self.name, &self.id_field, fields))
    }

    /// The shared store configuration with this model's overrides applied.
    pub fn store_config(&self, shared: &StoreConfig) -> Result<StoreConfig> {
        let Some(overrides) = &self.store else {
            return Ok(shared.clone());
        };
        let merge = || -> serde_json::Result<StoreConfig> {
            let mut merged = serde_json::to_value(shared)?;
            if let (Value::Object(base), Value::Object(extra)) = (&mut merged, serde_json::to_value(overrides)?) {
                base.extend(extra);
            }
            serde_json::from_value(merged)
        };
        merge().map_err(|e| self.invalid(format!("invalid store overrides: {e}")))
    }

    /// Initial records from the seed file, if any.
    pub fn seed_records(&self) -> Result<Vec<Record>> {
        let Some(path) = &self.seed else {
            return Ok(Vec::new());
        };
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| Error::Seed {
            path: path.clone(),
            source,
        })
    }
}

impl Config {
    /// Reject definitions that cannot be served: a router url the HTTP
    /// layer cannot mount, bad field kinds, duplicate fields or action
    /// names, malformed store overrides.
    pub fn validate(&self) -> Result<()> {
        if let Some(reason) = routes::router_url_problem(&self.provider.url) {
            return Err(Error::ProviderUrl {
                url: self.provider.url.clone(),
                reason,
            });
        }
        let mut actions = BTreeSet::new();
        for model in &self.models {
            model.record_type()?;
            model.store_config(&self.store)?;
            if !actions.insert(model.action_name()) {
                return Err(model.invalid(format!("action `{}` is defined twice", model.action_name())));
            }
        }
        Ok(())
    }
}
