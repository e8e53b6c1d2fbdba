use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// The five managed actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrudAction {
    Create,
    Read,
    Load,
    Update,
    Destroy,
}

impl CrudAction {
    pub const ALL: [Self; 5] = [
        Self::Create,
        Self::Read,
        Self::Load,
        Self::Update,
        Self::Destroy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Load => "load",
            Self::Update => "update",
            Self::Destroy => "destroy",
        }
    }
}

impl FromStr for CrudAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("unknown CRUD action `{s}`"))
    }
}

impl fmt::Display for CrudAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-visible messages of the write actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrudMessages {
    pub create_success: String,
    pub create_failure: String,
    pub update_success: String,
    pub update_failure: String,
    pub destroy_success: String,
}

impl Default for CrudMessages {
    fn default() -> Self {
        let failure = "There was an error while trying to save some of the records";
        Self {
            create_success: "Records created".into(),
            create_failure: failure.into(),
            update_success: "Records updated".into(),
            update_failure: failure.into(),
            destroy_success: "Objects deleted".into(),
        }
    }
}

/// Per-record-type CRUD behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrudOptions {
    /// Actions to register.
    pub actions: Vec<CrudAction>,
    /// Register create/update as form-submission handlers.
    pub form_mode: bool,
    /// Failure bundles carry the field error map instead of the generic
    /// failure message.
    pub show_form_validation: bool,
    /// Collapse `<rel>_id` keys and relation objects before writes.
    pub parse_relation_fields: bool,
    /// Attach `metaData` to read bundles.
    pub metadata: bool,
    /// Attach grid `columns` to read bundles.
    pub columns: bool,
    pub requires_auth: bool,
    pub permission: Option<String>,
    pub messages: CrudMessages,
}

impl Default for CrudOptions {
    fn default() -> Self {
        Self {
            actions: CrudAction::ALL.to_vec(),
            form_mode: false,
            show_form_validation: false,
            parse_relation_fields: true,
            metadata: true,
            columns: false,
            requires_auth: false,
            permission: None,
            messages: CrudMessages::default(),
        }
    }
}

impl CrudOptions {
    pub fn enables(&self, action: CrudAction) -> bool {
        self.actions.contains(&action)
    }
}
