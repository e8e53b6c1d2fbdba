//! Client bootstrap scripts.

use {
    remoting_protocol::{POLLING_PROVIDER_TYPE, ProviderDescriptor},
    serde::Serialize,
    serde_json::json,
};

use crate::Result;

/// Where the client finds the provider, and under which names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    pub url: String,
    pub namespace: String,
    /// Variable name of the descriptor inside the namespace.
    pub descriptor: String,
    pub id: Option<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            url: "/router".into(),
            namespace: "Remoting".into(),
            descriptor: "Descriptor".into(),
            id: None,
        }
    }
}

impl ProviderSettings {
    /// Fully qualified descriptor variable, `<namespace>.<descriptor>`.
    pub fn qualified_descriptor(&self) -> String {
        format!("{}.{}", self.namespace, self.descriptor)
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// `Ext.ns('<ns>'); <ns>.<Descriptor> = {...};`
pub fn api_script(settings: &ProviderSettings, descriptor: &ProviderDescriptor) -> Result<String> {
    Ok(format!(
        "Ext.ns('{}');\n{} = {};\n",
        settings.namespace,
        settings.qualified_descriptor(),
        to_json(descriptor)?
    ))
}

/// JSON form of the descriptor, naming its qualified variable.
pub fn api_json(settings: &ProviderSettings, descriptor: &ProviderDescriptor) -> ProviderDescriptor {
    ProviderDescriptor {
        descriptor: Some(settings.qualified_descriptor()),
        ..descriptor.clone()
    }
}

/// Script adding the remoting provider and one polling provider per event.
pub fn provider_script(descriptor: &ProviderDescriptor, polling_events: &[&str]) -> Result<String> {
    let mut script = String::from("Ext.onReady(function() {\n");
    script.push_str(&format!("    Ext.Direct.addProvider({});\n", to_json(descriptor)?));
    for event in polling_events {
        let config = json!({
            "url": format!("/polling/{event}"),
            "type": POLLING_PROVIDER_TYPE,
        });
        script.push_str(&format!("    Ext.Direct.addProvider({config});\n"));
    }
    script.push_str("});\n");
    Ok(script)
}
