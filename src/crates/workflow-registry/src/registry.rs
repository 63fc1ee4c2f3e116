//! Tool registry construction and lookup.
//!
//! The registry is built once per request from the caller's credential bag and is
//! immutable for the lifetime of that request. Its shape (not the underlying
//! secrets) is embedded in graph state so a resumed thread can restore the same
//! authorized tool set without re-deriving it from tokens that may have rotated.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{ApprovalClass, Integration, Tool};

/// One entry in the static catalog of capabilities this deployment knows how to
/// expose, keyed by the credential that unlocks it.
struct CatalogEntry {
    integration_id: &'static str,
    integration_display_name: &'static str,
    icon_id: &'static str,
    credential_key: &'static str,
    tools: &'static [(&'static str, &'static str, ApprovalClass)],
}

const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        integration_id: "search",
        integration_display_name: "Web Search",
        icon_id: "search",
        credential_key: "search_token",
        tools: &[("web_search", "Search the web", ApprovalClass::Silent)],
    },
    CatalogEntry {
        integration_id: "docs",
        integration_display_name: "Documents",
        icon_id: "docs",
        credential_key: "docs_token",
        tools: &[
            ("read_document", "Read a document", ApprovalClass::Silent),
            (
                "publish_document",
                "Publish a document",
                ApprovalClass::Mandatory,
            ),
        ],
    },
    CatalogEntry {
        integration_id: "mail",
        integration_display_name: "Mail",
        icon_id: "mail",
        credential_key: "mail_token",
        tools: &[("send_mail", "Send an email", ApprovalClass::Mandatory)],
    },
];

/// The authorized, per-request set of integrations and tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolRegistry {
    integrations: Vec<Integration>,
    tools: Vec<Tool>,
}

impl ToolRegistry {
    /// Build a registry from a bag of per-integration bearer tokens. Integrations
    /// whose credential is missing are omitted entirely, per the tool registry's
    /// `build` contract.
    pub fn build(credentials: &HashMap<String, String>) -> Result<Self> {
        let mut integrations = Vec::new();
        let mut tools = Vec::new();

        for entry in CATALOG {
            if !credentials.contains_key(entry.credential_key) {
                continue;
            }

            let mut most_restrictive = ApprovalClass::Silent;
            for (tool_id, display_name, class) in entry.tools {
                tools.push(Tool {
                    id: (*tool_id).to_string(),
                    display_name: (*display_name).to_string(),
                    integration_id: entry.integration_id.to_string(),
                    approval_class: *class,
                });
                if rank(*class) > rank(most_restrictive) {
                    most_restrictive = *class;
                }
            }

            integrations.push(Integration {
                id: entry.integration_id.to_string(),
                display_name: entry.integration_display_name.to_string(),
                icon_id: entry.icon_id.to_string(),
                tool_count: entry.tools.len(),
                approval_class: most_restrictive,
            });
        }

        tracing::debug!(
            integration_count = integrations.len(),
            tool_count = tools.len(),
            "built tool registry"
        );

        Ok(Self { integrations, tools })
    }

    pub fn integrations(&self) -> &[Integration] {
        &self.integrations
    }

    pub fn all_tools(&self) -> &[Tool] {
        &self.tools
    }

    /// Resolve a step's tool-id hints against the authorized set. Hints that don't
    /// resolve to an authorized tool are silently dropped; the caller (the
    /// executor) treats an empty result as "let the model pick from all_tools".
    pub fn tools_for(&self, step_hints: &[String]) -> Vec<Tool> {
        self.tools
            .iter()
            .filter(|t| step_hints.iter().any(|h| h == &t.id))
            .cloned()
            .collect()
    }

    pub fn find_tool(&self, tool_id: &str) -> Option<&Tool> {
        self.tools.iter().find(|t| t.id == tool_id)
    }

    pub fn is_empty(&self) -> bool {
        self.integrations.is_empty()
    }
}

fn rank(class: ApprovalClass) -> u8 {
    match class {
        ApprovalClass::Silent => 0,
        ApprovalClass::Advisory => 1,
        ApprovalClass::Mandatory => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(keys: &[&str]) -> HashMap<String, String> {
        keys.iter().map(|k| (k.to_string(), "tok".to_string())).collect()
    }

    #[test]
    fn missing_credentials_omit_the_integration() {
        let registry = ToolRegistry::build(&HashMap::new()).unwrap();
        assert!(registry.is_empty());
        assert!(registry.all_tools().is_empty());
    }

    #[test]
    fn present_credential_unlocks_its_tools() {
        let registry = ToolRegistry::build(&creds(&["search_token"])).unwrap();
        assert_eq!(registry.integrations().len(), 1);
        assert_eq!(registry.all_tools().len(), 1);
        assert_eq!(registry.all_tools()[0].id, "web_search");
    }

    #[test]
    fn mandatory_tool_raises_integration_approval_class() {
        let registry = ToolRegistry::build(&creds(&["mail_token"])).unwrap();
        assert_eq!(
            registry.integrations()[0].approval_class,
            ApprovalClass::Mandatory
        );
    }

    #[test]
    fn tools_for_resolves_hints_and_drops_unauthorized() {
        let registry = ToolRegistry::build(&creds(&["search_token"])).unwrap();
        let resolved = registry.tools_for(&["web_search".to_string(), "send_mail".to_string()]);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].id, "web_search");
    }

    #[test]
    fn unrecognized_approval_string_defaults_to_mandatory() {
        assert_eq!(ApprovalClass::from("bogus"), ApprovalClass::Mandatory);
        assert_eq!(ApprovalClass::from("silent"), ApprovalClass::Silent);
    }
}
