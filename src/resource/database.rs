//! Aruba.Database resources: DBaaS instances and their databases, users and
//! grants
//!
//! The children are flat objects without metadata or status; their identity
//! is their name, so the id comes from the request when the API answers a
//! create without a body.

use super::common::{
    base_schema, billing_plan, link_uri, observed_billing, resolve, vpc_scope, BillingPlan, Common,
    Link,
};
use crate::api::error::ProviderError;
use crate::api::object::{ApiObject, WireObject};
use crate::lifecycle::schema::{Attribute, DriftPolicy, ResourceSchema};
use crate::lifecycle::translate::{enum_value, observed, wire};
use crate::lifecycle::uri::ResourceKind;
use crate::lifecycle::{Adapter, Attr, Operation};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// =============================================================================
// DBaaS instance
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbaasModel {
    #[serde(flatten)]
    pub common: Common,
    pub project_id: Attr<String>,
    pub zone: Attr<String>,
    pub engine_id: Attr<String>,
    pub flavor_name: Attr<String>,
    pub storage_size_gb: Attr<i64>,
    pub vpc_uri_ref: Attr<String>,
    pub subnet_uri_ref: Attr<String>,
    pub security_group_uri_ref: Attr<String>,
    pub elastic_ip_uri_ref: Attr<String>,
    pub billing_period: Attr<String>,
    pub autoscaling: Attr<AutoscalingModel>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoscalingModel {
    pub enabled: Attr<bool>,
    pub available_space: Attr<i64>,
    pub step_size: Attr<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbaasProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flavor_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<DbaasStorage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub networking: Option<DbaasNetworking>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_plan: Option<BillingPlan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoscaling: Option<Autoscaling>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbaasStorage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_gb: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbaasNetworking {
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
pub struct Autoscaling {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_space: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_size: Option<i64>,
}

impl AutoscalingModel {
    fn to_wire(&self) -> Autoscaling {
        Autoscaling {
            enabled: wire(&self.enabled),
            available_space: wire(&self.available_space),
            step_size: wire(&self.step_size),
        }
    }
}

pub struct DbaasAdapter;

#[async_trait]
impl Adapter for DbaasAdapter {
    type Model = DbaasModel;
    type Wire = ApiObject<DbaasProperties>;
    const KIND: ResourceKind = ResourceKind::Dbaas;

    fn schema(&self) -> ResourceSchema {
        let fixed = |a: Attribute| a.immutable().policy(DriftPolicy::PlanOrPrior);
        base_schema(Self::KIND, "Managed database instance", true)
            .attribute(
                fixed(Attribute::string("zone"))
                    .optional_computed()
                    .describe("Availability zone"),
            )
            .attribute(
                fixed(Attribute::string("engine_id")).required().describe("Engine, e.g. mysql-8.0"),
            )
            .attribute(Attribute::string("flavor_name").required().describe("Instance flavor"))
            .attribute(Attribute::int64("storage_size_gb").describe("Storage size in GB"))
            .attribute(Attribute::uri_ref("vpc_uri_ref").immutable())
            .attribute(Attribute::uri_ref("subnet_uri_ref").immutable())
            .attribute(Attribute::uri_ref("security_group_uri_ref").immutable())
            .attribute(Attribute::uri_ref("elastic_ip_uri_ref").immutable())
            .attribute(Attribute::billing_period())
            .attribute(
                Attribute::object(
                    "autoscaling",
                    vec![
                        Attribute::bool("enabled"),
                        Attribute::int64("available_space"),
                        Attribute::int64("step_size"),
                    ],
                )
                .policy(DriftPolicy::PlanOrPrior)
                .describe("Storage autoscaling"),
            )
            .attribute(Attribute::status())
    }

    async fn create_request(
        &self,
        op: &Operation<'_>,
        plan: &DbaasModel,
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
        let subnet = resolve(
            op,
            ResourceKind::Subnet,
            &in_vpc,
            &plan.subnet_uri_ref,
            "subnet_uri_ref",
        )
        .await?;
        let security_group = resolve(
            op,
            ResourceKind::SecurityGroup,
            &in_vpc,
            &plan.security_group_uri_ref,
            "security_group_uri_ref",
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

        let attached = vpc.is_some()
            || subnet.is_some()
            || security_group.is_some()
            || elastic_ip.is_some();
        let networking = attached.then_some(DbaasNetworking {
            vpc,
            subnet,
            security_group,
            elastic_ip,
        });
        Ok(ApiObject::new(
            plan.common.metadata(),
            DbaasProperties {
                engine_id: wire(&plan.engine_id),
                flavor_name: wire(&plan.flavor_name),
                storage: wire(&plan.storage_size_gb).map(|size_gb| DbaasStorage {
                    size_gb: Some(size_gb),
                }),
                zone: wire(&plan.zone),
                networking,
                billing_plan: billing_plan(&plan.billing_period),
                autoscaling: plan.autoscaling.value().map(AutoscalingModel::to_wire),
            },
        ))
    }

    async fn update_request(
        &self,
        _op: &Operation<'_>,
        plan: &DbaasModel,
        current: Self::Wire,
    ) -> Result<Self::Wire, ProviderError> {
        let mut next = plan.common.updated(current);
        let props = &mut next.properties;
        if let Some(flavor) = wire(&plan.flavor_name) {
            props.flavor_name = Some(flavor);
        }
        if let Some(size_gb) = wire(&plan.storage_size_gb) {
            props.storage = Some(DbaasStorage { size_gb: Some(size_gb) });
        }
        if let Some(autoscaling) = plan.autoscaling.value() {
            props.autoscaling = Some(autoscaling.to_wire());
        }
        Ok(next)
    }

    fn observe(&self, wire: &Self::Wire) -> DbaasModel {
        let p = &wire.properties;
        let net = p.networking.clone().unwrap_or_default();
        DbaasModel {
            common: Common::observe(wire),
            project_id: Attr::Null,
            zone: observed(p.zone.clone()),
            engine_id: observed(p.engine_id.clone()),
            flavor_name: observed(p.flavor_name.clone()),
            storage_size_gb: observed(p.storage.as_ref().and_then(|s| s.size_gb)),
            vpc_uri_ref: link_uri(&net.vpc),
            subnet_uri_ref: link_uri(&net.subnet),
            security_group_uri_ref: link_uri(&net.security_group),
            elastic_ip_uri_ref: link_uri(&net.elastic_ip),
            billing_period: observed_billing(&p.billing_plan),
            autoscaling: observed(p.autoscaling.as_ref().map(|a| AutoscalingModel {
                enabled: observed(a.enabled),
                available_space: observed(a.available_space),
                step_size: observed(a.step_size),
            })),
        }
    }
}

/// Descriptor of a DBaaS child: parents, then the child's own attributes
fn child_schema(kind: ResourceKind, description: &'static str) -> ResourceSchema {
    kind.parent_attributes()
        .iter()
        .fold(ResourceSchema::new(kind.type_name(), description), |schema, parent| {
            schema.attribute(Attribute::parent(*parent))
        })
}

// =============================================================================
// Database
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseModel {
    pub project_id: Attr<String>,
    pub dbaas_id: Attr<String>,
    pub name: Attr<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl WireObject for DatabaseWire {
    fn id(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

pub struct DatabaseAdapter;

#[async_trait]
impl Adapter for DatabaseAdapter {
    type Model = DatabaseModel;
    type Wire = DatabaseWire;
    const KIND: ResourceKind = ResourceKind::DbaasDatabase;

    fn schema(&self) -> ResourceSchema {
        child_schema(Self::KIND, "Database inside a DBaaS instance").attribute(
            Attribute::string("name")
                .required()
                .immutable()
                .policy(DriftPolicy::PriorWins)
                .describe("Database name"),
        )
    }

    async fn create_request(
        &self,
        _op: &Operation<'_>,
        plan: &DatabaseModel,
    ) -> Result<DatabaseWire, ProviderError> {
        Ok(DatabaseWire { name: wire(&plan.name) })
    }

    async fn update_request(
        &self,
        _op: &Operation<'_>,
        _plan: &DatabaseModel,
        current: DatabaseWire,
    ) -> Result<DatabaseWire, ProviderError> {
        Ok(current)
    }

    fn observe(&self, wire: &DatabaseWire) -> DatabaseModel {
        DatabaseModel {
            name: observed(wire.name.clone()),
            ..DatabaseModel::default()
        }
    }
}

// =============================================================================
// User
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserModel {
    pub project_id: Attr<String>,
    pub dbaas_id: Attr<String>,
    pub username: Attr<String>,
    pub password: Attr<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl WireObject for UserWire {
    fn id(&self) -> Option<&str> {
        self.username.as_deref()
    }
}

pub struct UserAdapter;

#[async_trait]
impl Adapter for UserAdapter {
    type Model = UserModel;
    type Wire = UserWire;
    const KIND: ResourceKind = ResourceKind::DbaasUser;

    fn schema(&self) -> ResourceSchema {
        child_schema(Self::KIND, "User of a DBaaS instance")
            .attribute(
                Attribute::string("username")
                    .required()
                    .immutable()
                    .policy(DriftPolicy::PriorWins),
            )
            .attribute(
                Attribute::string("password")
                    .required()
                    .sensitive()
                    .policy(DriftPolicy::PlanOrPrior),
            )
    }

    async fn create_request(
        &self,
        _op: &Operation<'_>,
        plan: &UserModel,
    ) -> Result<UserWire, ProviderError> {
        Ok(UserWire {
            username: wire(&plan.username),
            password: wire(&plan.password),
        })
    }

    async fn update_request(
        &self,
        _op: &Operation<'_>,
        plan: &UserModel,
        current: UserWire,
    ) -> Result<UserWire, ProviderError> {
        Ok(UserWire {
            username: current.username,
            password: wire(&plan.password),
        })
    }

    fn observe(&self, wire: &UserWire) -> UserModel {
        UserModel {
            username: observed(wire.username.clone()),
            ..UserModel::default()
        }
    }
}

// =============================================================================
// Grant
// =============================================================================

const ROLES: &[&str] = &["liteadmin", "readwrite", "readonly"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrantModel {
    pub project_id: Attr<String>,
    pub dbaas_id: Attr<String>,
    pub database: Attr<String>,
    pub username: Attr<String>,
    pub role: Attr<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GrantUser {
    pub username: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GrantRole {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GrantWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<GrantUser>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<GrantRole>,
}

impl WireObject for GrantWire {
    fn id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.username.as_str())
    }
}

fn grant_role(plan: &GrantModel) -> Option<GrantRole> {
    enum_value(&plan.role, ROLES, &[]).map(|name| GrantRole { name })
}

pub struct GrantAdapter;

#[async_trait]
impl Adapter for GrantAdapter {
    type Model = GrantModel;
    type Wire = GrantWire;
    const KIND: ResourceKind = ResourceKind::DbaasGrant;

    fn schema(&self) -> ResourceSchema {
        child_schema(Self::KIND, "Role of a DBaaS user on a database")
            .attribute(
                Attribute::string("username")
                    .required()
                    .immutable()
                    .policy(DriftPolicy::PriorWins),
            )
            .attribute(Attribute::enumeration("role", ROLES).required())
    }

    async fn create_request(
        &self,
        _op: &Operation<'_>,
        plan: &GrantModel,
    ) -> Result<GrantWire, ProviderError> {
        Ok(GrantWire {
            user: wire(&plan.username).map(|username| GrantUser { username }),
            role: grant_role(plan),
        })
    }

    async fn update_request(
        &self,
        _op: &Operation<'_>,
        plan: &GrantModel,
        current: GrantWire,
    ) -> Result<GrantWire, ProviderError> {
        Ok(GrantWire {
            user: current.user,
            role: grant_role(plan).or(current.role),
        })
    }

    fn observe(&self, wire: &GrantWire) -> GrantModel {
        GrantModel {
            username: observed(wire.user.as_ref().map(|u| u.username.clone())),
            role: observed(wire.role.as_ref().map(|r| r.name.clone())),
            ..GrantModel::default()
        }
    }
}
