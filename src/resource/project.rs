//! Projects

use super::common::{base_schema, Common};
use crate::api::error::ProviderError;
use crate::api::object::ApiObject;
use crate::lifecycle::schema::{Attribute, DriftPolicy, ResourceSchema};
use crate::lifecycle::translate::{observed, wire};
use crate::lifecycle::uri::ResourceKind;
use crate::lifecycle::{Adapter, Attr, Operation};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectModel {
    #[serde(flatten)]
    pub common: Common,
    pub description: Attr<String>,
    pub default: Attr<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<bool>,
}

pub struct ProjectAdapter;

#[async_trait]
impl Adapter for ProjectAdapter {
    type Model = ProjectModel;
    type Wire = ApiObject<ProjectProperties>;
    const KIND: ResourceKind = ResourceKind::Project;

    fn schema(&self) -> ResourceSchema {
        base_schema(Self::KIND, "Aruba Cloud project", false)
            .attribute(Attribute::string("description").describe("Project description"))
            .attribute(
                Attribute::bool("default")
                    .computed()
                    .policy(DriftPolicy::ApiEcho)
                    .describe("Whether this is the account's default project"),
            )
    }

    async fn create_request(
        &self,
        _op: &Operation<'_>,
        plan: &ProjectModel,
    ) -> Result<Self::Wire, ProviderError> {
        Ok(ApiObject::new(
            plan.common.metadata(),
            ProjectProperties {
                description: wire(&plan.description),
                default: None,
            },
        ))
    }

    async fn update_request(
        &self,
        _op: &Operation<'_>,
        plan: &ProjectModel,
        current: Self::Wire,
    ) -> Result<Self::Wire, ProviderError> {
        let mut next = plan.common.updated(current);
        if let Some(description) = wire(&plan.description) {
            next.properties.description = Some(description);
        }
        Ok(next)
    }

    fn observe(&self, wire: &Self::Wire) -> ProjectModel {
        ProjectModel {
            common: Common::observe(wire),
            description: observed(wire.properties.description.clone()),
            default: observed(wire.properties.default),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::object::WireObject;
    use serde_json::json;

    #[test]
    fn test_observe_project() {
        let wire: ApiObject<ProjectProperties> = serde_json::from_value(json!({
            "metadata": {"id": "P1", "name": "p1", "tags": []},
            "properties": {"default": false}
        }))
        .unwrap();
        let model = ProjectAdapter.observe(&wire);
        assert_eq!(model.common.id, Attr::Known("P1".to_string()));
        assert_eq!(model.common.tags, Attr::Known(vec![]));
        assert_eq!(model.default, Attr::Known(false));
        assert_eq!(model.description, Attr::Null);
        assert_eq!(wire.id(), Some("P1"));
    }

    #[test]
    fn test_schema_has_no_location() {
        let schema = ProjectAdapter.schema();
        assert!(schema.get("location").is_none());
        assert!(schema.get("project_id").is_none());
    }
}
