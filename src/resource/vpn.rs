//! Site-to-site VPN tunnels and their routes

use super::common::{
    base_schema, billing_plan, link_uri, observed_billing, resolve, vpc_scope, BillingPlan, Common,
    Link,
};
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
pub struct VpnTunnelModel {
    #[serde(flatten)]
    pub common: Common,
    pub project_id: Attr<String>,
    pub vpn_type: Attr<String>,
    pub protocol: Attr<String>,
    pub elastic_ip_uri_ref: Attr<String>,
    pub vpc_uri_ref: Attr<String>,
    pub subnet_uri_ref: Attr<String>,
    pub peer_address: Attr<String>,
    pub ike: Attr<IkeModel>,
    pub esp: Attr<EspModel>,
    pub pre_shared_key: Attr<String>,
    pub billing_period: Attr<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IkeModel {
    pub version: Attr<String>,
    pub encryption: Attr<String>,
    pub hash: Attr<String>,
    pub dh_group: Attr<String>,
    pub lifetime: Attr<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EspModel {
    pub encryption: Attr<String>,
    pub hash: Attr<String>,
    pub pfs: Attr<String>,
    pub lifetime: Attr<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VpnTunnelProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpn_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elastic_ip: Option<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc: Option<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ike: Option<Ike>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub esp: Option<Esp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_shared_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_plan: Option<BillingPlan>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ike {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dh_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifetime: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Esp {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pfs: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifetime: Option<i64>,
}

impl IkeModel {
    fn to_wire(&self) -> Ike {
        Ike {
            version: wire(&self.version),
            encryption: wire(&self.encryption),
            hash: wire(&self.hash),
            dh_group: wire(&self.dh_group),
            lifetime: wire(&self.lifetime),
        }
    }

    fn observe(ike: &Ike) -> Self {
        Self {
            version: observed(ike.version.clone()),
            encryption: observed(ike.encryption.clone()),
            hash: observed(ike.hash.clone()),
            dh_group: observed(ike.dh_group.clone()),
            lifetime: observed(ike.lifetime),
        }
    }
}

impl EspModel {
    fn to_wire(&self) -> Esp {
        Esp {
            encryption: wire(&self.encryption),
            hash: wire(&self.hash),
            pfs: wire(&self.pfs),
            lifetime: wire(&self.lifetime),
        }
    }

    fn observe(esp: &Esp) -> Self {
        Self {
            encryption: observed(esp.encryption.clone()),
            hash: observed(esp.hash.clone()),
            pfs: observed(esp.pfs.clone()),
            lifetime: observed(esp.lifetime),
        }
    }
}

pub struct VpnTunnelAdapter;

#[async_trait]
impl Adapter for VpnTunnelAdapter {
    type Model = VpnTunnelModel;
    type Wire = ApiObject<VpnTunnelProperties>;
    const KIND: ResourceKind = ResourceKind::VpnTunnel;

    fn schema(&self) -> ResourceSchema {
        let fixed = |a: Attribute| a.immutable().policy(DriftPolicy::PlanOrPrior);
        let pp = |a: Attribute| a.policy(DriftPolicy::PlanOrPrior);
        base_schema(Self::KIND, "Site-to-site VPN tunnel", true)
            .attribute(
                fixed(Attribute::string("vpn_type"))
                    .required()
                    .describe("Tunnel type, e.g. Site-To-Site"),
            )
            .attribute(
                fixed(Attribute::string("protocol"))
                    .required()
                    .describe("Tunnel protocol, e.g. IPSEC"),
            )
            .attribute(
                Attribute::uri_ref("elastic_ip_uri_ref")
                    .immutable()
                    .describe("Elastic IP of the cloud endpoint"),
            )
            .attribute(
                Attribute::uri_ref("vpc_uri_ref")
                    .immutable()
                    .describe("VPC the tunnel terminates in"),
            )
            .attribute(
                Attribute::uri_ref("subnet_uri_ref")
                    .immutable()
                    .describe("Subnet the tunnel terminates in"),
            )
            .attribute(
                pp(Attribute::string("peer_address"))
                    .describe("Public address of the on-premises peer"),
            )
            .attribute(pp(Attribute::object(
                "ike",
                vec![
                    Attribute::string("version"),
                    Attribute::string("encryption"),
                    Attribute::string("hash"),
                    Attribute::string("dh_group"),
                    Attribute::int64("lifetime"),
                ],
            )))
            .attribute(pp(Attribute::object(
                "esp",
                vec![
                    Attribute::string("encryption"),
                    Attribute::string("hash"),
                    Attribute::string("pfs"),
                    Attribute::int64("lifetime"),
                ],
            )))
            .attribute(
                pp(Attribute::string("pre_shared_key")).sensitive().describe("IKE pre-shared key"),
            )
            .attribute(Attribute::billing_period())
            .attribute(Attribute::status())
    }

    async fn create_request(
        &self,
        op: &Operation<'_>,
        plan: &VpnTunnelModel,
    ) -> Result<Self::Wire, ProviderError> {
        let project = plan.project_id.as_deref().unwrap_or_default();
        let elastic_ip = resolve(
            op,
            ResourceKind::ElasticIp,
            &[project],
            &plan.elastic_ip_uri_ref,
            "elastic_ip_uri_ref",
        )
        .await?;
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
            VpnTunnelProperties {
                vpn_type: wire(&plan.vpn_type),
                protocol: wire(&plan.protocol),
                elastic_ip,
                vpc,
                subnet,
                peer_address: wire(&plan.peer_address),
                ike: plan.ike.value().map(IkeModel::to_wire),
                esp: plan.esp.value().map(EspModel::to_wire),
                pre_shared_key: wire(&plan.pre_shared_key),
                billing_plan: billing_plan(&plan.billing_period),
            },
        ))
    }

    async fn update_request(
        &self,
        _op: &Operation<'_>,
        plan: &VpnTunnelModel,
        current: Self::Wire,
    ) -> Result<Self::Wire, ProviderError> {
        let mut next = plan.common.updated(current);
        let props = &mut next.properties;
        if let Some(peer) = wire(&plan.peer_address) {
            props.peer_address = Some(peer);
        }
        if let Some(ike) = plan.ike.value() {
            props.ike = Some(ike.to_wire());
        }
        if let Some(esp) = plan.esp.value() {
            props.esp = Some(esp.to_wire());
        }
        if let Some(key) = wire(&plan.pre_shared_key) {
            props.pre_shared_key = Some(key);
        }
        Ok(next)
    }

    fn observe(&self, wire: &Self::Wire) -> VpnTunnelModel {
        let p = &wire.properties;
        VpnTunnelModel {
            common: Common::observe(wire),
            project_id: Attr::Null,
            vpn_type: observed(p.vpn_type.clone()),
            protocol: observed(p.protocol.clone()),
            elastic_ip_uri_ref: link_uri(&p.elastic_ip),
            vpc_uri_ref: link_uri(&p.vpc),
            subnet_uri_ref: link_uri(&p.subnet),
            peer_address: observed(p.peer_address.clone()),
            ike: observed(p.ike.as_ref().map(IkeModel::observe)),
            esp: observed(p.esp.as_ref().map(EspModel::observe)),
            pre_shared_key: observed(p.pre_shared_key.clone()),
            billing_period: observed_billing(&p.billing_plan),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VpnRouteModel {
    #[serde(flatten)]
    pub common: Common,
    pub cloud_subnet: Attr<String>,
    pub on_prem_subnet: Attr<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VpnRouteProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_subnet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_prem_subnet: Option<String>,
}

pub struct VpnRouteAdapter;

#[async_trait]
impl Adapter for VpnRouteAdapter {
    type Model = VpnRouteModel;
    type Wire = ApiObject<VpnRouteProperties>;
    const KIND: ResourceKind = ResourceKind::VpnRoute;

    fn schema(&self) -> ResourceSchema {
        base_schema(Self::KIND, "Route carried by a VPN tunnel", true)
            .attribute(
                Attribute::string("cloud_subnet")
                    .required()
                    .policy(DriftPolicy::PlanOrPrior)
                    .describe("CIDR on the cloud side"),
            )
            .attribute(
                Attribute::string("on_prem_subnet")
                    .required()
                    .policy(DriftPolicy::PlanOrPrior)
                    .describe("CIDR on the on-premises side"),
            )
            .attribute(Attribute::status())
    }

    async fn create_request(
        &self,
        _op: &Operation<'_>,
        plan: &VpnRouteModel,
    ) -> Result<Self::Wire, ProviderError> {
        Ok(ApiObject::new(
            plan.common.metadata(),
            VpnRouteProperties {
                cloud_subnet: wire(&plan.cloud_subnet),
                on_prem_subnet: wire(&plan.on_prem_subnet),
            },
        ))
    }

    async fn update_request(
        &self,
        _op: &Operation<'_>,
        plan: &VpnRouteModel,
        current: Self::Wire,
    ) -> Result<Self::Wire, ProviderError> {
        let mut next = plan.common.updated(current);
        if let Some(cloud) = wire(&plan.cloud_subnet) {
            next.properties.cloud_subnet = Some(cloud);
        }
        if let Some(on_prem) = wire(&plan.on_prem_subnet) {
            next.properties.on_prem_subnet = Some(on_prem);
        }
        Ok(next)
    }

    fn observe(&self, wire: &Self::Wire) -> VpnRouteModel {
        VpnRouteModel {
            common: Common::observe(wire),
            cloud_subnet: observed(wire.properties.cloud_subnet.clone()),
            on_prem_subnet: observed(wire.properties.on_prem_subnet.clone()),
        }
    }
}
