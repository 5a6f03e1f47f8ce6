//! Aruba.Compute resources: key pairs and cloud servers

use super::common::{
    base_schema, link_uri, link_uris, resolve, resolve_all, vpc_scope, Common, Link,
};
use crate::api::error::ProviderError;
use crate::api::object::ApiObject;
use crate::lifecycle::schema::{AttrType, Attribute, DriftPolicy, ResourceSchema};
use crate::lifecycle::translate::{observed, wire};
use crate::lifecycle::uri::ResourceKind;
use crate::lifecycle::{Adapter, Attr, Operation};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// =============================================================================
// Key pair
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyPairModel {
    #[serde(flatten)]
    pub common: Common,
    pub public_key: Attr<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyPairProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

pub struct KeyPairAdapter;

#[async_trait]
impl Adapter for KeyPairAdapter {
    type Model = KeyPairModel;
    type Wire = ApiObject<KeyPairProperties>;
    const KIND: ResourceKind = ResourceKind::KeyPair;

    fn schema(&self) -> ResourceSchema {
        base_schema(Self::KIND, "SSH key pair for cloud servers", true)
            .attribute(
                Attribute::string("public_key")
                    .required()
                    .immutable()
                    .policy(DriftPolicy::PlanOrPrior)
                    .describe("OpenSSH public key"),
            )
            .attribute(Attribute::status())
    }

    async fn create_request(
        &self,
        _op: &Operation<'_>,
        plan: &KeyPairModel,
    ) -> Result<Self::Wire, ProviderError> {
        Ok(ApiObject::new(
            plan.common.metadata(),
            KeyPairProperties {
                value: wire(&plan.public_key),
            },
        ))
    }

    async fn update_request(
        &self,
        _op: &Operation<'_>,
        plan: &KeyPairModel,
        current: Self::Wire,
    ) -> Result<Self::Wire, ProviderError> {
        Ok(plan.common.updated(current))
    }

    fn observe(&self, wire: &Self::Wire) -> KeyPairModel {
        KeyPairModel {
            common: Common::observe(wire),
            public_key: observed(wire.properties.value.clone()),
        }
    }
}

// =============================================================================
// Cloud server
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudServerModel {
    #[serde(flatten)]
    pub common: Common,
    pub project_id: Attr<String>,
    pub zone: Attr<String>,
    pub flavor_name: Attr<String>,
    pub vpc_uri_ref: Attr<String>,
    pub subnet_uri_refs: Attr<Vec<String>>,
    pub securitygroup_uri_refs: Attr<Vec<String>>,
    pub elastic_ip_uri_ref: Attr<String>,
    pub key_pair_uri_ref: Attr<String>,
    pub boot_volume_uri_ref: Attr<String>,
    pub user_data: Attr<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudServerProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flavor_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc: Option<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnets: Option<Vec<Link>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_groups: Option<Vec<Link>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elastic_ip: Option<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_pair: Option<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boot_volume: Option<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
}

pub struct CloudServerAdapter;

#[async_trait]
impl Adapter for CloudServerAdapter {
    type Model = CloudServerModel;
    type Wire = ApiObject<CloudServerProperties>;
    const KIND: ResourceKind = ResourceKind::CloudServer;

    fn schema(&self) -> ResourceSchema {
        let refs = |name| {
            Attribute::new(name, AttrType::list(AttrType::String)).policy(DriftPolicy::PlanOrPrior)
        };
        base_schema(Self::KIND, "Cloud server (virtual machine)", true)
            .attribute(
                Attribute::string("zone")
                    .required()
                    .immutable()
                    .policy(DriftPolicy::PlanOrPrior)
                    .describe("Availability zone"),
            )
            .attribute(
                Attribute::string("flavor_name")
                    .required()
                    .immutable()
                    .policy(DriftPolicy::ApiEcho)
                    .describe("Server flavor, e.g. CSO4A8"),
            )
            .attribute(Attribute::uri_ref("vpc_uri_ref").required().immutable())
            .attribute(refs("subnet_uri_refs").describe("Subnets to attach"))
            .attribute(refs("securitygroup_uri_refs").describe("Security groups to apply"))
            .attribute(Attribute::uri_ref("elastic_ip_uri_ref"))
            .attribute(Attribute::uri_ref("key_pair_uri_ref").immutable())
            .attribute(Attribute::uri_ref("boot_volume_uri_ref").required().immutable())
            .attribute(
                Attribute::string("user_data")
                    .sensitive()
                    .immutable()
                    .policy(DriftPolicy::PlanOrPrior)
                    .describe("Cloud-init user data"),
            )
            .attribute(Attribute::status())
    }

    async fn create_request(
        &self,
        op: &Operation<'_>,
        plan: &CloudServerModel,
    ) -> Result<Self::Wire, ProviderError> {
        let project = plan.project_id.as_deref().unwrap_or_default();
        let vpc = resolve(
            op,
            ResourceKind::Vpc,
            &[project],
            &plan.vpc_uri_ref,
            "vpc_uri_ref",
        )
        .await?;
        let in_vpc = vpc_scope(project, vpc.as_ref());
        let subnets = resolve_all(
            op,
            ResourceKind::Subnet,
            &in_vpc,
            &plan.subnet_uri_refs,
            "subnet_uri_refs",
        )
        .await?;
        let security_groups = resolve_all(
            op,
            ResourceKind::SecurityGroup,
            &in_vpc,
            &plan.securitygroup_uri_refs,
            "securitygroup_uri_refs",
        )
        .await?;
        let elastic_ip = resolve(
            op,
            ResourceKind::ElasticIp,
            &[project],
            &plan.elastic_ip_uri_ref,
            "elastic_ip_uri_ref",
        )
        .await?;
        let key_pair = resolve(
            op,
            ResourceKind::KeyPair,
            &[project],
            &plan.key_pair_uri_ref,
            "key_pair_uri_ref",
        )
        .await?;
        let boot_volume = resolve(
            op,
            ResourceKind::BlockStorage,
            &[project],
            &plan.boot_volume_uri_ref,
            "boot_volume_uri_ref",
        )
        .await?;

        Ok(ApiObject::new(
            plan.common.metadata(),
            CloudServerProperties {
                zone: wire(&plan.zone),
                flavor_name: wire(&plan.flavor_name),
                vpc,
                subnets,
                security_groups,
                elastic_ip,
                key_pair,
                boot_volume,
                user_data: wire(&plan.user_data),
            },
        ))
    }

    async fn update_request(
        &self,
        op: &Operation<'_>,
        plan: &CloudServerModel,
        current: Self::Wire,
    ) -> Result<Self::Wire, ProviderError> {
        let project = plan.project_id.as_deref().unwrap_or_default();
        let vpc = current.properties.vpc.clone();
        let in_vpc = vpc_scope(project, vpc.as_ref());
        let subnets = resolve_all(
            op,
            ResourceKind::Subnet,
            &in_vpc,
            &plan.subnet_uri_refs,
            "subnet_uri_refs",
        )
        .await?;
        let security_groups = resolve_all(
            op,
            ResourceKind::SecurityGroup,
            &in_vpc,
            &plan.securitygroup_uri_refs,
            "securitygroup_uri_refs",
        )
        .await?;
        let elastic_ip = resolve(
            op,
            ResourceKind::ElasticIp,
            &[project],
            &plan.elastic_ip_uri_ref,
            "elastic_ip_uri_ref",
        )
        .await?;

        let mut next = plan.common.updated(current);
        let props = &mut next.properties;
        if subnets.is_some() {
            props.subnets = subnets;
        }
        if security_groups.is_some() {
            props.security_groups = security_groups;
        }
        if elastic_ip.is_some() {
            props.elastic_ip = elastic_ip;
        }
        Ok(next)
    }

    fn observe(&self, wire: &Self::Wire) -> CloudServerModel {
        let p = &wire.properties;
        CloudServerModel {
            common: Common::observe(wire),
            project_id: Attr::Null,
            zone: observed(p.zone.clone()),
            flavor_name: observed(p.flavor_name.clone()),
            vpc_uri_ref: link_uri(&p.vpc),
            subnet_uri_refs: link_uris(&p.subnets),
            securitygroup_uri_refs: link_uris(&p.security_groups),
            elastic_ip_uri_ref: link_uri(&p.elastic_ip),
            key_pair_uri_ref: link_uri(&p.key_pair),
            boot_volume_uri_ref: link_uri(&p.boot_volume),
            // Never echoed
            user_data: Attr::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keypair_value_maps_to_public_key() {
        let wire: ApiObject<KeyPairProperties> = serde_json::from_value(json!({
            "metadata": {"id": "K1", "name": "k"},
            "properties": {"value": "ssh-ed25519 AAAA"}
        }))
        .unwrap();
        assert_eq!(
            KeyPairAdapter.observe(&wire).public_key,
            Attr::Known("ssh-ed25519 AAAA".to_string())
        );
    }

    #[test]
    fn test_server_observes_link_lists() {
        let wire: ApiObject<CloudServerProperties> = serde_json::from_value(json!({
            "metadata": {"id": "S1", "name": "srv"},
            "properties": {
                "flavorName": "CSO4A8",
                "subnets": [{"uri": "/a"}, {"uri": "/b"}],
                "securityGroups": []
            },
            "status": {"state": "Running"}
        }))
        .unwrap();
        let model = CloudServerAdapter.observe(&wire);
        assert_eq!(model.subnet_uri_refs, Attr::Known(vec!["/a".to_string(), "/b".to_string()]));
        assert_eq!(model.securitygroup_uri_refs, Attr::Known(vec![]));
        assert_eq!(model.elastic_ip_uri_ref, Attr::Null);
        assert_eq!(model.user_data, Attr::Null);
        assert_eq!(model.flavor_name, Attr::Known("CSO4A8".to_string()));
    }

    #[test]
    fn test_user_data_is_sensitive_and_immutable() {
        let attr = CloudServerAdapter.schema().get("user_data").cloned().unwrap();
        assert!(attr.sensitive && attr.immutable);
    }
}
