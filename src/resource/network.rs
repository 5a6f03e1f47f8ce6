//! Aruba.Network resources: VPCs, subnets, security groups and rules,
//! VPC peerings and elastic IPs

use super::common::{
    base_schema, billing_plan, link_uri, observed_billing, resolve, BillingPlan, Common, Link,
};
use crate::api::error::{Phase, ProviderError};
use crate::api::object::ApiObject;
use crate::lifecycle::schema::{AttrType, Attribute, DriftPolicy, ResourceSchema};
use crate::lifecycle::translate::{enum_value, observed, wire};
use crate::lifecycle::uri::ResourceKind;
use crate::lifecycle::{Adapter, Attr, Operation};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// =============================================================================
// VPC
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VpcModel {
    #[serde(flatten)]
    pub common: Common,
    pub default: Attr<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VpcProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<bool>,
}

pub struct VpcAdapter;

#[async_trait]
impl Adapter for VpcAdapter {
    type Model = VpcModel;
    type Wire = ApiObject<VpcProperties>;
    const KIND: ResourceKind = ResourceKind::Vpc;

    fn schema(&self) -> ResourceSchema {
        base_schema(Self::KIND, "Virtual private cloud", true)
            .attribute(
                Attribute::bool("default")
                    .optional_computed()
                    .policy(DriftPolicy::PlanOrPrior)
                    .describe("Use as the project's default VPC"),
            )
            .attribute(Attribute::status())
    }

    async fn create_request(
        &self,
        _op: &Operation<'_>,
        plan: &VpcModel,
    ) -> Result<Self::Wire, ProviderError> {
        Ok(ApiObject::new(
            plan.common.metadata(),
            VpcProperties {
                default: wire(&plan.default),
            },
        ))
    }

    async fn update_request(
        &self,
        _op: &Operation<'_>,
        plan: &VpcModel,
        current: Self::Wire,
    ) -> Result<Self::Wire, ProviderError> {
        let mut next = plan.common.updated(current);
        if let Some(default) = wire(&plan.default) {
            next.properties.default = Some(default);
        }
        Ok(next)
    }

    fn observe(&self, wire: &Self::Wire) -> VpcModel {
        VpcModel {
            common: Common::observe(wire),
            default: observed(wire.properties.default),
        }
    }
}

// =============================================================================
// Subnet
// =============================================================================

const SUBNET_TYPES: &[&str] = &["Basic", "Advanced"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubnetModel {
    #[serde(flatten)]
    pub common: Common,
    #[serde(rename = "type")]
    pub subnet_type: Attr<String>,
    pub default: Attr<bool>,
    pub network: Attr<SubnetNetworkModel>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubnetNetworkModel {
    pub address: Attr<String>,
    pub dhcp: Attr<DhcpModel>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DhcpModel {
    pub enabled: Attr<bool>,
    pub range: Attr<DhcpRangeModel>,
    pub routes: Attr<Vec<DhcpRouteModel>>,
    pub dns: Attr<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DhcpRangeModel {
    pub start: Attr<String>,
    pub count: Attr<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DhcpRouteModel {
    pub address: Attr<String>,
    pub gateway: Attr<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubnetProperties {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub subnet_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<SubnetNetwork>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubnetNetwork {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dhcp: Option<Dhcp>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dhcp {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<DhcpRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routes: Option<Vec<DhcpRoute>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DhcpRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DhcpRoute {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
}

impl SubnetNetworkModel {
    fn to_wire(&self) -> SubnetNetwork {
        SubnetNetwork {
            address: wire(&self.address),
            dhcp: self.dhcp.value().map(|dhcp| Dhcp {
                enabled: wire(&dhcp.enabled),
                range: dhcp.range.value().map(|r| DhcpRange {
                    start: wire(&r.start),
                    count: wire(&r.count),
                }),
                routes: dhcp.routes.value().map(|routes| {
                    routes
                        .iter()
                        .map(|r| DhcpRoute {
                            address: wire(&r.address),
                            gateway: wire(&r.gateway),
                        })
                        .collect()
                }),
                dns: wire(&dhcp.dns),
            }),
        }
    }

    fn observe(network: &SubnetNetwork) -> Self {
        Self {
            address: observed(network.address.clone()),
            dhcp: observed(network.dhcp.as_ref().map(|dhcp| DhcpModel {
                enabled: observed(dhcp.enabled),
                range: observed(dhcp.range.as_ref().map(|r| DhcpRangeModel {
                    start: observed(r.start.clone()),
                    count: observed(r.count),
                })),
                routes: observed(dhcp.routes.as_ref().map(|routes| {
                    routes
                        .iter()
                        .map(|r| DhcpRouteModel {
                            address: observed(r.address.clone()),
                            gateway: observed(r.gateway.clone()),
                        })
                        .collect()
                })),
                dns: observed(dhcp.dns.clone()),
            })),
        }
    }
}

pub struct SubnetAdapter;

#[async_trait]
impl Adapter for SubnetAdapter {
    type Model = SubnetModel;
    type Wire = ApiObject<SubnetProperties>;
    const KIND: ResourceKind = ResourceKind::Subnet;

    fn schema(&self) -> ResourceSchema {
        let range = Attribute::object(
            "range",
            vec![Attribute::string("start").required(), Attribute::int64("count").required()],
        );
        let route = AttrType::object(vec![
            Attribute::string("address").required(),
            Attribute::string("gateway").required(),
        ]);
        let dhcp = Attribute::object(
            "dhcp",
            vec![
                Attribute::bool("enabled"),
                range,
                Attribute::new("routes", AttrType::list(route)),
                Attribute::new("dns", AttrType::list(AttrType::String)),
            ],
        );
        base_schema(Self::KIND, "Subnet inside a VPC", true)
            .attribute(
                Attribute::enumeration("type", SUBNET_TYPES)
                    .required()
                    .immutable()
                    .policy(DriftPolicy::PlanOrPrior)
                    .describe("Basic (API-managed addressing) or Advanced"),
            )
            .attribute(
                Attribute::bool("default")
                    .optional_computed()
                    .policy(DriftPolicy::PlanOrPrior),
            )
            .attribute(
                Attribute::object("network", vec![Attribute::string("address").required(), dhcp])
                    .optional_computed()
                    .policy(DriftPolicy::PlanOrPrior)
                    .describe("Addressing of an Advanced subnet"),
            )
            .attribute(Attribute::status())
    }

    fn validate(&self, model: &SubnetModel) -> Vec<ProviderError> {
        let mut errors = Vec::new();
        let Some(subnet_type) = model.subnet_type.as_deref() else {
            return errors;
        };
        let has_address = model
            .network
            .value()
            .is_some_and(|n| !n.address.is_null());
        if subnet_type.eq_ignore_ascii_case("Basic") && !model.network.is_null() {
            errors.push(
                ProviderError::validation(
                    Phase::Validate,
                    "Conflicting subnet configuration",
                    "a Basic subnet takes no 'network' block; its addressing is managed by the API",
                )
                .with_attribute("network"),
            );
        }
        if subnet_type.eq_ignore_ascii_case("Advanced")
            && !model.network.is_unknown()
            && !has_address
        {
            errors.push(
                ProviderError::validation(
                    Phase::Validate,
                    "Missing subnet address",
                    "an Advanced subnet requires 'network.address'",
                )
                .with_attribute("network.address"),
            );
        }
        errors
    }

    async fn create_request(
        &self,
        _op: &Operation<'_>,
        plan: &SubnetModel,
    ) -> Result<Self::Wire, ProviderError> {
        Ok(ApiObject::new(
            plan.common.metadata(),
            SubnetProperties {
                subnet_type: enum_value(&plan.subnet_type, SUBNET_TYPES, &[]),
                default: wire(&plan.default),
                network: plan.network.value().map(SubnetNetworkModel::to_wire),
            },
        ))
    }

    async fn update_request(
        &self,
        _op: &Operation<'_>,
        plan: &SubnetModel,
        current: Self::Wire,
    ) -> Result<Self::Wire, ProviderError> {
        let mut next = plan.common.updated(current);
        if let Some(default) = wire(&plan.default) {
            next.properties.default = Some(default);
        }
        if let Some(network) = plan.network.value() {
            next.properties.network = Some(network.to_wire());
        }
        Ok(next)
    }

    fn observe(&self, wire: &Self::Wire) -> SubnetModel {
        SubnetModel {
            common: Common::observe(wire),
            subnet_type: observed(wire.properties.subnet_type.clone()),
            default: observed(wire.properties.default),
            network: observed(wire.properties.network.as_ref().map(SubnetNetworkModel::observe)),
        }
    }
}

// =============================================================================
// Security group
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityGroupModel {
    #[serde(flatten)]
    pub common: Common,
    pub default: Attr<bool>,
}

pub struct SecurityGroupAdapter;

#[async_trait]
impl Adapter for SecurityGroupAdapter {
    type Model = SecurityGroupModel;
    type Wire = ApiObject<VpcProperties>;
    const KIND: ResourceKind = ResourceKind::SecurityGroup;

    fn schema(&self) -> ResourceSchema {
        base_schema(Self::KIND, "Security group inside a VPC", true)
            .attribute(
                Attribute::bool("default")
                    .optional_computed()
                    .policy(DriftPolicy::PlanOrPrior),
            )
            .attribute(Attribute::status())
    }

    async fn create_request(
        &self,
        _op: &Operation<'_>,
        plan: &SecurityGroupModel,
    ) -> Result<Self::Wire, ProviderError> {
        Ok(ApiObject::new(
            plan.common.metadata(),
            VpcProperties {
                default: wire(&plan.default),
            },
        ))
    }

    async fn update_request(
        &self,
        _op: &Operation<'_>,
        plan: &SecurityGroupModel,
        current: Self::Wire,
    ) -> Result<Self::Wire, ProviderError> {
        let mut next = plan.common.updated(current);
        if let Some(default) = wire(&plan.default) {
            next.properties.default = Some(default);
        }
        Ok(next)
    }

    fn observe(&self, wire: &Self::Wire) -> SecurityGroupModel {
        SecurityGroupModel {
            common: Common::observe(wire),
            default: observed(wire.properties.default),
        }
    }
}

// =============================================================================
// Security rule
// =============================================================================

const DIRECTIONS: &[&str] = &["Ingress", "Egress"];
const TARGET_KINDS: &[&str] = &["Ip", "SecurityGroup"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityRuleModel {
    #[serde(flatten)]
    pub common: Common,
    pub direction: Attr<String>,
    pub protocol: Attr<String>,
    pub port: Attr<String>,
    pub target: Attr<RuleTargetModel>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleTargetModel {
    pub kind: Attr<String>,
    pub value: Attr<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityRuleProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<RuleTarget>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

pub struct SecurityRuleAdapter;

#[async_trait]
impl Adapter for SecurityRuleAdapter {
    type Model = SecurityRuleModel;
    type Wire = ApiObject<SecurityRuleProperties>;
    const KIND: ResourceKind = ResourceKind::SecurityRule;

    fn schema(&self) -> ResourceSchema {
        let fixed = |a: Attribute| a.required().immutable().policy(DriftPolicy::PlanOrPrior);
        base_schema(Self::KIND, "Rule of a security group", true)
            .attribute(fixed(Attribute::enumeration("direction", DIRECTIONS)))
            .attribute(fixed(Attribute::string("protocol")).describe("TCP, UDP, ICMP or ANY"))
            .attribute(
                Attribute::string("port")
                    .immutable()
                    .policy(DriftPolicy::PlanOrPrior)
                    .describe("Single port or range, e.g. 80 or 8000-8080"),
            )
            .attribute(fixed(Attribute::object(
                "target",
                vec![
                    Attribute::enumeration("kind", TARGET_KINDS).required(),
                    Attribute::string("value").required(),
                ],
            )))
            .attribute(Attribute::status())
    }

    async fn create_request(
        &self,
        _op: &Operation<'_>,
        plan: &SecurityRuleModel,
    ) -> Result<Self::Wire, ProviderError> {
        Ok(ApiObject::new(
            plan.common.metadata(),
            SecurityRuleProperties {
                direction: enum_value(&plan.direction, DIRECTIONS, &[]),
                protocol: wire(&plan.protocol),
                port: wire(&plan.port),
                target: plan.target.value().map(|t| RuleTarget {
                    kind: enum_value(&t.kind, TARGET_KINDS, &[]),
                    value: wire(&t.value),
                }),
            },
        ))
    }

    async fn update_request(
        &self,
        _op: &Operation<'_>,
        plan: &SecurityRuleModel,
        current: Self::Wire,
    ) -> Result<Self::Wire, ProviderError> {
        Ok(plan.common.updated(current))
    }

    fn observe(&self, wire: &Self::Wire) -> SecurityRuleModel {
        let p = &wire.properties;
        SecurityRuleModel {
            common: Common::observe(wire),
            direction: observed(p.direction.clone()),
            protocol: observed(p.protocol.clone()),
            port: observed(p.port.clone()),
            target: observed(p.target.as_ref().map(|t| RuleTargetModel {
                kind: observed(t.kind.clone()),
                value: observed(t.value.clone()),
            })),
        }
    }
}

// =============================================================================
// VPC peering
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VpcPeeringModel {
    #[serde(flatten)]
    pub common: Common,
    pub project_id: Attr<String>,
    pub remote_vpc_uri_ref: Attr<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VpcPeeringProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_vpc: Option<Link>,
}

pub struct VpcPeeringAdapter;

#[async_trait]
impl Adapter for VpcPeeringAdapter {
    type Model = VpcPeeringModel;
    type Wire = ApiObject<VpcPeeringProperties>;
    const KIND: ResourceKind = ResourceKind::VpcPeering;

    fn schema(&self) -> ResourceSchema {
        base_schema(Self::KIND, "Peering between two VPCs", true)
            .attribute(
                Attribute::uri_ref("remote_vpc_uri_ref")
                    .required()
                    .immutable()
                    .describe("URI (or id) of the peer VPC"),
            )
            .attribute(Attribute::status())
    }

    async fn create_request(
        &self,
        op: &Operation<'_>,
        plan: &VpcPeeringModel,
    ) -> Result<Self::Wire, ProviderError> {
        let project = plan.project_id.as_deref().unwrap_or_default();
        let remote_vpc = resolve(
            op,
            ResourceKind::Vpc,
            &[project],
            &plan.remote_vpc_uri_ref,
            "remote_vpc_uri_ref",
        )
        .await?;
        Ok(ApiObject::new(
            plan.common.metadata(),
            VpcPeeringProperties { remote_vpc },
        ))
    }

    async fn update_request(
        &self,
        _op: &Operation<'_>,
        plan: &VpcPeeringModel,
        current: Self::Wire,
    ) -> Result<Self::Wire, ProviderError> {
        Ok(plan.common.updated(current))
    }

    fn observe(&self, wire: &Self::Wire) -> VpcPeeringModel {
        VpcPeeringModel {
            common: Common::observe(wire),
            project_id: Attr::Null,
            remote_vpc_uri_ref: link_uri(&wire.properties.remote_vpc),
        }
    }
}

// =============================================================================
// Elastic IP
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElasticIpModel {
    #[serde(flatten)]
    pub common: Common,
    pub billing_period: Attr<String>,
    pub address: Attr<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElasticIpProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_plan: Option<BillingPlan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

pub struct ElasticIpAdapter;

#[async_trait]
impl Adapter for ElasticIpAdapter {
    type Model = ElasticIpModel;
    type Wire = ApiObject<ElasticIpProperties>;
    const KIND: ResourceKind = ResourceKind::ElasticIp;

    fn schema(&self) -> ResourceSchema {
        base_schema(Self::KIND, "Public elastic IP address", true)
            .attribute(Attribute::billing_period().required())
            .attribute(
                Attribute::string("address")
                    .computed()
                    .policy(DriftPolicy::ApiEcho)
                    .describe("Allocated public address"),
            )
            .attribute(Attribute::status())
    }

    async fn create_request(
        &self,
        _op: &Operation<'_>,
        plan: &ElasticIpModel,
    ) -> Result<Self::Wire, ProviderError> {
        Ok(ApiObject::new(
            plan.common.metadata(),
            ElasticIpProperties {
                billing_plan: billing_plan(&plan.billing_period),
                address: None,
            },
        ))
    }

    async fn update_request(
        &self,
        _op: &Operation<'_>,
        plan: &ElasticIpModel,
        current: Self::Wire,
    ) -> Result<Self::Wire, ProviderError> {
        Ok(plan.common.updated(current))
    }

    fn observe(&self, wire: &Self::Wire) -> ElasticIpModel {
        ElasticIpModel {
            common: Common::observe(wire),
            billing_period: observed_billing(&wire.properties.billing_plan),
            address: observed(wire.properties.address.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn subnet(config: serde_json::Value) -> SubnetModel {
        serde_json::from_value(config).unwrap()
    }

    #[test]
    fn test_basic_subnet_rejects_network_block() {
        let errs = SubnetAdapter.validate(&subnet(json!({
            "name": "s", "type": "Basic", "network": {"address": "10.0.0.0/24"}
        })));
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].attribute.as_deref(), Some("network"));
    }

    #[test]
    fn test_advanced_subnet_requires_address() {
        let errs = SubnetAdapter.validate(&subnet(json!({"name": "s", "type": "Advanced"})));
        assert_eq!(errs[0].attribute.as_deref(), Some("network.address"));

        let ok = SubnetAdapter.validate(&subnet(json!({
            "name": "s", "type": "Advanced",
            "network": {"address": "10.0.0.0/24", "dhcp": {"enabled": true}}
        })));
        assert!(ok.is_empty());
    }

    #[test]
    fn test_subnet_network_round_trip_omits_nulls() {
        let model = subnet(json!({
            "name": "s", "type": "advanced",
            "network": {"address": "10.0.0.0/24", "dhcp": {"enabled": true, "dns": ["1.1.1.1"]}}
        }));
        let props = SubnetProperties {
            subnet_type: enum_value(&model.subnet_type, SUBNET_TYPES, &[]),
            default: wire(&model.default),
            network: model.network.value().map(SubnetNetworkModel::to_wire),
        };
        assert_eq!(
            serde_json::to_value(&props).unwrap(),
            json!({
                "type": "Advanced",
                "network": {
                    "address": "10.0.0.0/24",
                    "dhcp": {"enabled": true, "dns": ["1.1.1.1"]}
                }
            })
        );
    }

    #[test]
    fn test_elastic_ip_observes_address_and_billing() {
        let wire: ApiObject<ElasticIpProperties> = serde_json::from_value(json!({
            "metadata": {"id": "E1", "name": "eip1", "location": {"value": "de-1"}},
            "properties": {"address": "203.0.113.5", "billingPlan": {"billingPeriod": "Hour"}},
            "status": {"state": "NotUsed"}
        }))
        .unwrap();
        let model = ElasticIpAdapter.observe(&wire);
        assert_eq!(model.address, Attr::Known("203.0.113.5".to_string()));
        assert_eq!(model.billing_period, Attr::Known("Hour".to_string()));
        assert_eq!(model.common.status, Attr::Known("NotUsed".to_string()));
    }
}
