//! Aruba.Security resources: key management services and their KMIP
//! endpoints

use super::common::{base_schema, billing_plan, observed_billing, BillingPlan, Common};
use crate::api::error::ProviderError;
use crate::api::object::ApiObject;
use crate::lifecycle::schema::{Attribute, ResourceSchema};
use crate::lifecycle::uri::ResourceKind;
use crate::lifecycle::{Adapter, Attr, Operation};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KmsModel {
    #[serde(flatten)]
    pub common: Common,
    pub billing_period: Attr<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KmsProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_plan: Option<BillingPlan>,
}

pub struct KmsAdapter;

#[async_trait]
impl Adapter for KmsAdapter {
    type Model = KmsModel;
    type Wire = ApiObject<KmsProperties>;
    const KIND: ResourceKind = ResourceKind::Kms;

    fn schema(&self) -> ResourceSchema {
        base_schema(Self::KIND, "Key management service", true)
            .attribute(Attribute::billing_period().required())
            .attribute(Attribute::status())
    }

    async fn create_request(
        &self,
        _op: &Operation<'_>,
        plan: &KmsModel,
    ) -> Result<Self::Wire, ProviderError> {
        Ok(ApiObject::new(
            plan.common.metadata(),
            KmsProperties {
                billing_plan: billing_plan(&plan.billing_period),
            },
        ))
    }

    async fn update_request(
        &self,
        _op: &Operation<'_>,
        plan: &KmsModel,
        current: Self::Wire,
    ) -> Result<Self::Wire, ProviderError> {
        Ok(plan.common.updated(current))
    }

    fn observe(&self, wire: &Self::Wire) -> KmsModel {
        KmsModel {
            common: Common::observe(wire),
            billing_period: observed_billing(&wire.properties.billing_plan),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KmipModel {
    #[serde(flatten)]
    pub common: Common,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KmipProperties {}

pub struct KmipAdapter;

#[async_trait]
impl Adapter for KmipAdapter {
    type Model = KmipModel;
    type Wire = ApiObject<KmipProperties>;
    const KIND: ResourceKind = ResourceKind::Kmip;

    fn schema(&self) -> ResourceSchema {
        base_schema(Self::KIND, "KMIP endpoint of a key management service", false)
            .attribute(Attribute::status())
    }

    async fn create_request(
        &self,
        _op: &Operation<'_>,
        plan: &KmipModel,
    ) -> Result<Self::Wire, ProviderError> {
        Ok(ApiObject::new(plan.common.metadata(), KmipProperties {}))
    }

    async fn update_request(
        &self,
        _op: &Operation<'_>,
        plan: &KmipModel,
        current: Self::Wire,
    ) -> Result<Self::Wire, ProviderError> {
        Ok(plan.common.updated(current))
    }

    fn observe(&self, wire: &Self::Wire) -> KmipModel {
        KmipModel {
            common: Common::observe(wire),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kmip_lives_under_kms() {
        let schema = KmipAdapter.schema();
        assert!(schema.get("kms_id").is_some());
        assert!(schema.get("location").is_none());
        assert_eq!(schema.type_name, "arubacloud_kmip");
    }

    #[test]
    fn test_kms_billing_is_immutable() {
        assert!(KmsAdapter.schema().get("billing_period").unwrap().immutable);
    }
}
