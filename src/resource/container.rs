//! Aruba.Container resources: container registries and managed Kubernetes

use super::common::{
    base_schema, billing_plan, link_uri, observed_billing, resolve, vpc_scope, BillingPlan, Common,
    Link,
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
// Container registry
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryModel {
    #[serde(flatten)]
    pub common: Common,
    pub project_id: Attr<String>,
    pub network: Attr<RegistryNetworkModel>,
    pub storage: Attr<RegistryStorageModel>,
    pub settings: Attr<RegistrySettingsModel>,
    pub billing_period: Attr<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryNetworkModel {
    pub vpc_uri_ref: Attr<String>,
    pub subnet_uri_ref: Attr<String>,
    pub security_group_uri_ref: Attr<String>,
    pub elastic_ip_uri_ref: Attr<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryStorageModel {
    pub block_storage_uri_ref: Attr<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySettingsModel {
    pub admin_user: Attr<String>,
    pub concurrent_users: Attr<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<RegistryNetwork>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<RegistryStorage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<RegistrySettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_plan: Option<BillingPlan>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryNetwork {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc: Option<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_group: Option<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elastic_ip: Option<Link>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStorage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_storage: Option<Link>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrent_users: Option<i64>,
}

impl RegistrySettingsModel {
    fn to_wire(&self) -> RegistrySettings {
        RegistrySettings {
            admin_user: wire(&self.admin_user),
            concurrent_users: wire(&self.concurrent_users),
        }
    }
}

pub struct RegistryAdapter;

#[async_trait]
impl Adapter for RegistryAdapter {
    type Model = RegistryModel;
    type Wire = ApiObject<RegistryProperties>;
    const KIND: ResourceKind = ResourceKind::ContainerRegistry;

    fn schema(&self) -> ResourceSchema {
        base_schema(Self::KIND, "Private container registry", true)
            .attribute(
                Attribute::object(
                    "network",
                    vec![
                        Attribute::string("vpc_uri_ref").required(),
                        Attribute::string("subnet_uri_ref").required(),
                        Attribute::string("security_group_uri_ref"),
                        Attribute::string("elastic_ip_uri_ref"),
                    ],
                )
                .required()
                .immutable()
                .policy(DriftPolicy::PlanOrPrior),
            )
            .attribute(
                Attribute::object(
                    "storage",
                    vec![Attribute::string("block_storage_uri_ref").required()],
                )
                .immutable()
                    .policy(DriftPolicy::PlanOrPrior),
            )
            .attribute(
                Attribute::object(
                    "settings",
                    vec![Attribute::string("admin_user"), Attribute::int64("concurrent_users")],
                )
                .policy(DriftPolicy::PlanOrPrior),
            )
            .attribute(Attribute::billing_period())
            .attribute(Attribute::status())
    }

    async fn create_request(
        &self,
        op: &Operation<'_>,
        plan: &RegistryModel,
    ) -> Result<Self::Wire, ProviderError> {
        let project = plan.project_id.as_deref().unwrap_or_default();
        let network = match plan.network.value() {
            Some(n) => {
                let vpc = resolve(
                    op,
                    ResourceKind::Vpc,
                    &[project],
                    &n.vpc_uri_ref,
                    "network.vpc_uri_ref",
                )
                .await?;
                let in_vpc = vpc_scope(project, vpc.as_ref());
                let subnet = resolve(
                    op,
                    ResourceKind::Subnet,
                    &in_vpc,
                    &n.subnet_uri_ref,
                    "network.subnet_uri_ref",
                )
                .await?;
                let security_group = resolve(
                    op,
                    ResourceKind::SecurityGroup,
                    &in_vpc,
                    &n.security_group_uri_ref,
                    "network.security_group_uri_ref",
                )
                .await?;
                let elastic_ip = resolve(
                    op,
                    ResourceKind::ElasticIp,
                    &[project],
                    &n.elastic_ip_uri_ref,
                    "network.elastic_ip_uri_ref",
                )
                .await?;
                Some(RegistryNetwork {
                    vpc,
                    subnet,
                    security_group,
                    elastic_ip,
                })
            }
            None => None,
        };
        let storage = match plan.storage.value() {
            Some(s) => Some(RegistryStorage {
                block_storage: resolve(
                    op,
                    ResourceKind::BlockStorage,
                    &[project],
                    &s.block_storage_uri_ref,
                    "storage.block_storage_uri_ref",
                )
                .await?,
            }),
            None => None,
        };
        Ok(ApiObject::new(
            plan.common.metadata(),
            RegistryProperties {
                network,
                storage,
                settings: plan.settings.value().map(RegistrySettingsModel::to_wire),
                billing_plan: billing_plan(&plan.billing_period),
            },
        ))
    }

    async fn update_request(
        &self,
        _op: &Operation<'_>,
        plan: &RegistryModel,
        current: Self::Wire,
    ) -> Result<Self::Wire, ProviderError> {
        let mut next = plan.common.updated(current);
        if let Some(settings) = plan.settings.value() {
            next.properties.settings = Some(settings.to_wire());
        }
        Ok(next)
    }

    fn observe(&self, wire: &Self::Wire) -> RegistryModel {
        let p = &wire.properties;
        RegistryModel {
            common: Common::observe(wire),
            project_id: Attr::Null,
            network: observed(p.network.as_ref().map(|n| RegistryNetworkModel {
                vpc_uri_ref: link_uri(&n.vpc),
                subnet_uri_ref: link_uri(&n.subnet),
                security_group_uri_ref: link_uri(&n.security_group),
                elastic_ip_uri_ref: link_uri(&n.elastic_ip),
            })),
            storage: observed(p.storage.as_ref().map(|s| RegistryStorageModel {
                block_storage_uri_ref: link_uri(&s.block_storage),
            })),
            settings: observed(p.settings.as_ref().map(|s| RegistrySettingsModel {
                admin_user: observed(s.admin_user.clone()),
                concurrent_users: observed(s.concurrent_users),
            })),
            billing_period: observed_billing(&p.billing_plan),
        }
    }
}

// =============================================================================
// KaaS
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KaasModel {
    #[serde(flatten)]
    pub common: Common,
    pub project_id: Attr<String>,
    pub vpc_uri_ref: Attr<String>,
    pub subnet_uri_ref: Attr<String>,
    pub node_cidr: Attr<NodeCidrModel>,
    pub security_group_name: Attr<String>,
    pub kubernetes_version: Attr<String>,
    pub node_pools: Attr<Vec<NodePoolModel>>,
    pub ha: Attr<bool>,
    pub billing_period: Attr<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeCidrModel {
    pub address: Attr<String>,
    pub name: Attr<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodePoolModel {
    pub name: Attr<String>,
    pub nodes: Attr<i64>,
    pub instance: Attr<String>,
    pub zone: Attr<String>,
    pub autoscaling: Attr<bool>,
    pub min_count: Attr<i64>,
    pub max_count: Attr<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KaasProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc: Option<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_cidr: Option<NodeCidr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_group_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetes_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_pools: Option<Vec<NodePool>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ha: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_plan: Option<BillingPlan>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeCidr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePool {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoscaling: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_count: Option<i64>,
}

impl NodePoolModel {
    fn to_wire(&self) -> NodePool {
        NodePool {
            name: wire(&self.name),
            nodes: wire(&self.nodes),
            instance: wire(&self.instance),
            zone: wire(&self.zone),
            autoscaling: wire(&self.autoscaling),
            min_count: wire(&self.min_count),
            max_count: wire(&self.max_count),
        }
    }

    fn observe(pool: &NodePool) -> Self {
        Self {
            name: observed(pool.name.clone()),
            nodes: observed(pool.nodes),
            instance: observed(pool.instance.clone()),
            zone: observed(pool.zone.clone()),
            autoscaling: observed(pool.autoscaling),
            min_count: observed(pool.min_count),
            max_count: observed(pool.max_count),
        }
    }
}

fn node_pools(plan: &KaasModel) -> Option<Vec<NodePool>> {
    plan.node_pools
        .value()
        .map(|pools| pools.iter().map(NodePoolModel::to_wire).collect())
}

pub struct KaasAdapter;

#[async_trait]
impl Adapter for KaasAdapter {
    type Model = KaasModel;
    type Wire = ApiObject<KaasProperties>;
    const KIND: ResourceKind = ResourceKind::Kaas;

    fn schema(&self) -> ResourceSchema {
        let fixed = |a: Attribute| a.immutable().policy(DriftPolicy::PlanOrPrior);
        let pool = AttrType::object(vec![
            Attribute::string("name").required(),
            Attribute::int64("nodes").required(),
            Attribute::string("instance").required(),
            Attribute::string("zone"),
            Attribute::bool("autoscaling"),
            Attribute::int64("min_count"),
            Attribute::int64("max_count"),
        ]);
        base_schema(Self::KIND, "Managed Kubernetes cluster", true)
            .attribute(Attribute::uri_ref("vpc_uri_ref").required().immutable())
            .attribute(Attribute::uri_ref("subnet_uri_ref").required().immutable())
            .attribute(fixed(Attribute::object(
                "node_cidr",
                vec![Attribute::string("address").required(), Attribute::string("name")],
            )))
            .attribute(fixed(Attribute::string("security_group_name")))
            .attribute(
                Attribute::string("kubernetes_version").required().describe("Kubernetes version"),
            )
            .attribute(
                Attribute::new("node_pools", AttrType::list(pool)).describe("Worker node pools"),
            )
            .attribute(fixed(Attribute::bool("ha")).describe("Highly available control plane"))
            .attribute(Attribute::billing_period())
            .attribute(Attribute::status())
    }

    async fn create_request(
        &self,
        op: &Operation<'_>,
        plan: &KaasModel,
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
        let subnet = resolve(
            op,
            ResourceKind::Subnet,
            &vpc_scope(project, vpc.as_ref()),
            &plan.subnet_uri_ref,
            "subnet_uri_ref",
        )
        .await?;
        Ok(ApiObject::new(
            plan.common.metadata(),
            KaasProperties {
                vpc,
                subnet,
                node_cidr: plan.node_cidr.value().map(|c| NodeCidr {
                    address: wire(&c.address),
                    name: wire(&c.name),
                }),
                security_group_name: wire(&plan.security_group_name),
                kubernetes_version: wire(&plan.kubernetes_version),
                node_pools: node_pools(plan),
                ha: wire(&plan.ha),
                billing_plan: billing_plan(&plan.billing_period),
            },
        ))
    }

    async fn update_request(
        &self,
        _op: &Operation<'_>,
        plan: &KaasModel,
        current: Self::Wire,
    ) -> Result<Self::Wire, ProviderError> {
        let mut next = plan.common.updated(current);
        if let Some(version) = wire(&plan.kubernetes_version) {
            next.properties.kubernetes_version = Some(version);
        }
        if let Some(pools) = node_pools(plan) {
            next.properties.node_pools = Some(pools);
        }
        Ok(next)
    }

    fn observe(&self, wire: &Self::Wire) -> KaasModel {
        let p = &wire.properties;
        KaasModel {
            common: Common::observe(wire),
            project_id: Attr::Null,
            vpc_uri_ref: link_uri(&p.vpc),
            subnet_uri_ref: link_uri(&p.subnet),
            node_cidr: observed(p.node_cidr.as_ref().map(|c| NodeCidrModel {
                address: observed(c.address.clone()),
                name: observed(c.name.clone()),
            })),
            security_group_name: observed(p.security_group_name.clone()),
            kubernetes_version: observed(p.kubernetes_version.clone()),
            node_pools: observed(
                p.node_pools
                    .as_ref()
                    .map(|pools| pools.iter().map(NodePoolModel::observe).collect()),
            ),
            ha: observed(p.ha),
            billing_period: observed_billing(&p.billing_plan),
        }
    }
}
