use std::collections::HashMap;
use std::sync::Arc;

use toolgate_model::{ModelTool, ToolCallRequest};

use super::{Error, ToolCatalog, ToolOutput, ToolSpec};
use crate::BackendError;

/// All tools available to one driver, gathered from several catalogs.
///
/// The catalogs are listed once when the toolbox is loaded. Calls are routed
/// to the catalog that offered the tool.
pub struct Toolbox {
    catalogs: Vec<Arc<dyn ToolCatalog>>,
    specs: Vec<ToolSpec>,
    // Tool name => (index of the spec, index of the catalog).
    routes: HashMap<String, (usize, usize)>,
}

impl Toolbox {
    /// Lists every catalog and builds the routing table. When two catalogs
    /// offer the same name, the first one wins.
    pub async fn load(
        catalogs: Vec<Arc<dyn ToolCatalog>>,
    ) -> Result<Self, BackendError> {
        let mut specs = vec![];
        let mut routes = HashMap::new();
        for (catalog_idx, catalog) in catalogs.iter().enumerate() {
            for spec in catalog.list_tools().await? {
                if routes.contains_key(&spec.name) {
                    warn!("duplicated tool {}, ignoring", spec.name);
                    continue;
                }
                routes.insert(spec.name.clone(), (specs.len(), catalog_idx));
                specs.push(spec);
            }
        }
        debug!("loaded {} tools from {} catalogs", specs.len(), catalogs.len());
        Ok(Self {
            catalogs,
            specs,
            routes,
        })
    }

    /// Returns the spec of a tool.
    #[inline]
    pub fn spec(&self, name: &str) -> Option<&ToolSpec> {
        self.routes.get(name).map(|&(spec_idx, _)| &self.specs[spec_idx])
    }

    /// Returns all specs, in catalog order.
    #[inline]
    pub fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    /// Returns the tool definitions for a model request.
    #[inline]
    pub fn definitions(&self) -> Vec<ModelTool> {
        self.specs.iter().map(ToolSpec::definition).collect()
    }

    /// Invokes a tool through the catalog that offered it.
    pub async fn invoke(
        &self,
        call: &ToolCallRequest,
        user_id: &str,
    ) -> ToolOutput {
        let Some(&(_, catalog_idx)) = self.routes.get(&call.name) else {
            warn!("tool not found: {}", call.name);
            return Err(Error::not_found()
                .with_reason(format!("no tool named `{}`", call.name)));
        };
        self.catalogs[catalog_idx].invoke(call, user_id).await
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::tool::ErrorKind;

    struct FixedCatalog {
        label: &'static str,
        names: Vec<&'static str>,
        requires_authorization: bool,
    }

    #[async_trait]
    impl ToolCatalog for FixedCatalog {
        async fn list_tools(&self) -> Result<Vec<ToolSpec>, BackendError> {
            Ok(self
                .names
                .iter()
                .map(|name| ToolSpec {
                    name: (*name).to_owned(),
                    description: String::new(),
                    parameters: json!({}),
                    requires_authorization: self.requires_authorization,
                })
                .collect())
        }

        async fn invoke(
            &self,
            call: &ToolCallRequest,
            user_id: &str,
        ) -> ToolOutput {
            Ok(format!("{}:{}:{}", self.label, call.name, user_id))
        }
    }

    struct DownCatalog;

    #[async_trait]
    impl ToolCatalog for DownCatalog {
        async fn list_tools(&self) -> Result<Vec<ToolSpec>, BackendError> {
            Err(BackendError::unavailable("connection refused"))
        }

        async fn invoke(&self, _: &ToolCallRequest, _: &str) -> ToolOutput {
            unreachable!()
        }
    }

    fn call(name: &str) -> ToolCallRequest {
        ToolCallRequest {
            id: "call:1".to_owned(),
            name: name.to_owned(),
            arguments: json!({}),
        }
    }

    #[tokio::test]
    async fn test_routing() {
        let local: Arc<dyn ToolCatalog> = Arc::new(FixedCatalog {
            label: "local",
            names: vec!["wiki_search"],
            requires_authorization: false,
        });
        let remote: Arc<dyn ToolCatalog> = Arc::new(FixedCatalog {
            label: "remote",
            names: vec!["Gmail.SendEmail", "wiki_search"],
            requires_authorization: true,
        });
        let toolbox = Toolbox::load(vec![local, remote]).await.unwrap();

        assert_eq!(toolbox.specs().len(), 2);
        assert_eq!(toolbox.definitions().len(), 2);
        assert!(!toolbox.spec("wiki_search").unwrap().requires_authorization);
        assert!(
            toolbox
                .spec("Gmail.SendEmail")
                .unwrap()
                .requires_authorization
        );

        let output = toolbox.invoke(&call("wiki_search"), "alice").await;
        assert_eq!(output.unwrap(), "local:wiki_search:alice");
        let output = toolbox.invoke(&call("Gmail.SendEmail"), "alice").await;
        assert_eq!(output.unwrap(), "remote:Gmail.SendEmail:alice");

        let err = toolbox.invoke(&call("Github.Star"), "alice").await;
        assert_eq!(err.unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_load_failure() {
        let down: Arc<dyn ToolCatalog> = Arc::new(DownCatalog);
        let err = Toolbox::load(vec![down]).await.err().unwrap();
        assert!(err.is_transient());
    }
}
