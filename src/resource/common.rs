//! Pieces shared by the top-level resource adapters

use crate::api::error::ProviderError;
use crate::api::object::{ApiObject, Metadata};
use crate::lifecycle::schema::{Attribute, ResourceSchema};
use crate::lifecycle::translate::{billing_period, observed};
use crate::lifecycle::uri::{short_id, ResourceKind};
use crate::lifecycle::{Attr, Operation};
use serde::{Deserialize, Serialize};

/// Attributes every top-level resource carries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Common {
    pub id: Attr<String>,
    pub uri: Attr<String>,
    pub name: Attr<String>,
    pub location: Attr<String>,
    pub tags: Attr<Vec<String>>,
    pub status: Attr<String>,
}

impl Common {
    pub fn observe<P>(obj: &ApiObject<P>) -> Self {
        Self {
            id: observed(obj.metadata.id.clone()),
            uri: observed(obj.metadata.uri.clone()),
            name: observed(obj.metadata.name.clone()),
            location: observed(obj.metadata.location()),
            tags: observed(obj.metadata.tags.clone()),
            status: observed(obj.state().map(str::to_string)),
        }
    }

    /// Request metadata for a create
    pub fn metadata(&self) -> Metadata {
        Metadata::request(&self.name, &self.location, &self.tags)
    }

    /// PUT body built from the current object with planned name and tags
    pub fn updated<P>(&self, current: ApiObject<P>) -> ApiObject<P> {
        let mut next = current.into_request();
        next.metadata.apply(&self.name, &self.tags);
        next
    }
}

/// Descriptor with id, uri, parent ids, name, tags and (when regional)
/// location already in place
pub fn base_schema(
    kind: ResourceKind,
    description: &'static str,
    regional: bool,
) -> ResourceSchema {
    let mut schema = ResourceSchema::new(kind.type_name(), description)
        .attribute(Attribute::id())
        .attribute(Attribute::uri());
    for &parent in kind.parent_attributes() {
        schema = schema.attribute(Attribute::parent(parent));
    }
    schema = schema.attribute(Attribute::name());
    if regional {
        schema = schema.attribute(Attribute::location());
    }
    schema.attribute(Attribute::tags())
}

/// `{ "uri": ... }` link to another resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub uri: String,
}

impl Link {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }
}

pub fn link_uri(link: &Option<Link>) -> Attr<String> {
    observed(link.as_ref().map(|l| l.uri.clone()))
}

pub fn link_uris(links: &Option<Vec<Link>>) -> Attr<Vec<String>> {
    observed(
        links
            .as_ref()
            .map(|links| links.iter().map(|l| l.uri.clone()).collect()),
    )
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingPlan {
    pub billing_period: String,
}

pub fn billing_plan(attr: &Attr<String>) -> Option<BillingPlan> {
    billing_period(attr).map(|billing_period| BillingPlan { billing_period })
}

pub fn observed_billing(plan: &Option<BillingPlan>) -> Attr<String> {
    observed(plan.as_ref().map(|p| p.billing_period.clone()))
}

/// Resolve a `*_uri_ref` attribute to a link; null and unknown resolve to
/// nothing
pub async fn resolve(
    op: &Operation<'_>,
    kind: ResourceKind,
    parents: &[&str],
    attr: &Attr<String>,
    name: &str,
) -> Result<Option<Link>, ProviderError> {
    match attr.non_empty() {
        Some(value) => Ok(Some(Link::new(op.reference(kind, parents, value, name).await?))),
        None => Ok(None),
    }
}

/// Resolve every entry of a list of references
pub async fn resolve_all(
    op: &Operation<'_>,
    kind: ResourceKind,
    parents: &[&str],
    attr: &Attr<Vec<String>>,
    name: &str,
) -> Result<Option<Vec<Link>>, ProviderError> {
    let Some(values) = attr.value() else {
        return Ok(None);
    };
    let mut links = Vec::with_capacity(values.len());
    for value in values {
        links.push(Link::new(op.reference(kind, parents, value, name).await?));
    }
    Ok(Some(links))
}

/// Parents of a VPC-scoped resource, taking the VPC from an already
/// resolved VPC link
pub fn vpc_scope<'a>(project_id: &'a str, vpc: Option<&'a Link>) -> Vec<&'a str> {
    vec![project_id, vpc.and_then(|l| short_id(&l.uri)).unwrap_or_default()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(default)]
    struct Sample {
        #[serde(flatten)]
        common: Common,
        size: Attr<i64>,
    }

    #[test]
    fn test_common_flattens() {
        let s: Sample = serde_json::from_value(json!({
            "name": "vol", "id": {"$unknown": true}, "size": 10
        }))
        .unwrap();
        assert_eq!(s.common.name, Attr::Known("vol".to_string()));
        assert!(s.common.id.is_unknown());
        assert_eq!(s.size, Attr::Known(10));
    }

    #[test]
    fn test_base_schema_includes_parents() {
        let schema = base_schema(ResourceKind::Subnet, "subnet", true);
        for name in ["id", "uri", "project_id", "vpc_id", "name", "location", "tags"] {
            assert!(schema.get(name).is_some(), "missing {}", name);
        }
        assert!(base_schema(ResourceKind::Project, "p", false).get("location").is_none());
    }

    #[test]
    fn test_vpc_scope_from_link() {
        let vpc = Link::new("/projects/P1/providers/Aruba.Network/vpcs/V");
        assert_eq!(vpc_scope("P1", Some(&vpc)), vec!["P1", "V"]);
        assert_eq!(vpc_scope("P1", None), vec!["P1", ""]);
    }
}
