//! Aruba.Storage resources: block storage, snapshots, backups and restores

use super::common::{
    base_schema, billing_plan, link_uri, observed_billing, resolve, BillingPlan, Common, Link,
};
use crate::api::error::ProviderError;
use crate::api::object::ApiObject;
use crate::lifecycle::schema::{Attribute, DriftPolicy, ResourceSchema};
use crate::lifecycle::translate::{enum_value, observed, wire};
use crate::lifecycle::uri::ResourceKind;
use crate::lifecycle::{Adapter, Attr, Operation};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const STORAGE_TYPES: &[&str] = &["Standard", "Performance"];
const BACKUP_TYPES: &[&str] = &["Full", "Incremental"];

// =============================================================================
// Block storage
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockStorageModel {
    #[serde(flatten)]
    pub common: Common,
    pub project_id: Attr<String>,
    pub zone: Attr<String>,
    pub size_gb: Attr<i64>,
    pub billing_period: Attr<String>,
    pub storage_type: Attr<String>,
    pub bootable: Attr<bool>,
    pub image: Attr<String>,
    pub snapshot_uri_ref: Attr<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockStorageProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_gb: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_plan: Option<BillingPlan>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub storage_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<Link>,
}

pub struct BlockStorageAdapter;

#[async_trait]
impl Adapter for BlockStorageAdapter {
    type Model = BlockStorageModel;
    type Wire = ApiObject<BlockStorageProperties>;
    const KIND: ResourceKind = ResourceKind::BlockStorage;

    fn schema(&self) -> ResourceSchema {
        let fixed = |a: Attribute| a.immutable().policy(DriftPolicy::PlanOrPrior);
        base_schema(Self::KIND, "Block storage volume", true)
            .attribute(
                fixed(Attribute::string("zone"))
                    .optional_computed()
                    .describe("Availability zone"),
            )
            .attribute(Attribute::int64("size_gb").required().describe("Volume size in GB"))
            .attribute(Attribute::billing_period().required())
            .attribute(
                fixed(Attribute::enumeration("storage_type", STORAGE_TYPES)).optional_computed(),
            )
            .attribute(
                Attribute::bool("bootable")
                    .computed()
                    .policy(DriftPolicy::ApiEcho)
                    .describe("Whether the volume carries a bootable image"),
            )
            .attribute(
                fixed(Attribute::string("image"))
                    .describe("Image to initialise a boot volume from"),
            )
            .attribute(
                Attribute::uri_ref("snapshot_uri_ref")
                    .immutable()
                    .describe("Snapshot to restore from"),
            )
            .attribute(Attribute::status())
    }

    async fn create_request(
        &self,
        op: &Operation<'_>,
        plan: &BlockStorageModel,
    ) -> Result<Self::Wire, ProviderError> {
        let project = plan.project_id.as_deref().unwrap_or_default();
        let snapshot = resolve(
            op,
            ResourceKind::Snapshot,
            &[project],
            &plan.snapshot_uri_ref,
            "snapshot_uri_ref",
        )
        .await?;
        Ok(ApiObject::new(
            plan.common.metadata(),
            BlockStorageProperties {
                size_gb: wire(&plan.size_gb),
                billing_plan: billing_plan(&plan.billing_period),
                storage_type: enum_value(&plan.storage_type, STORAGE_TYPES, &[]),
                zone: wire(&plan.zone),
                bootable: None,
                image: wire(&plan.image),
                snapshot,
            },
        ))
    }

    async fn update_request(
        &self,
        _op: &Operation<'_>,
        plan: &BlockStorageModel,
        current: Self::Wire,
    ) -> Result<Self::Wire, ProviderError> {
        let mut next = plan.common.updated(current);
        if let Some(size) = wire(&plan.size_gb) {
            next.properties.size_gb = Some(size);
        }
        Ok(next)
    }

    fn observe(&self, wire: &Self::Wire) -> BlockStorageModel {
        let p = &wire.properties;
        BlockStorageModel {
            common: Common::observe(wire),
            project_id: Attr::Null,
            zone: observed(p.zone.clone()),
            size_gb: observed(p.size_gb),
            billing_period: observed_billing(&p.billing_plan),
            storage_type: observed(p.storage_type.clone()),
            bootable: observed(p.bootable),
            image: observed(p.image.clone()),
            snapshot_uri_ref: link_uri(&p.snapshot),
        }
    }
}

// =============================================================================
// Snapshot
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotModel {
    #[serde(flatten)]
    pub common: Common,
    pub project_id: Attr<String>,
    pub volume_uri_ref: Attr<String>,
    pub billing_period: Attr<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_plan: Option<BillingPlan>,
}

pub struct SnapshotAdapter;

#[async_trait]
impl Adapter for SnapshotAdapter {
    type Model = SnapshotModel;
    type Wire = ApiObject<SnapshotProperties>;
    const KIND: ResourceKind = ResourceKind::Snapshot;

    fn schema(&self) -> ResourceSchema {
        base_schema(Self::KIND, "Point-in-time snapshot of a volume", true)
            .attribute(
                Attribute::uri_ref("volume_uri_ref")
                    .required()
                    .immutable()
                    .describe("Volume to snapshot"),
            )
            .attribute(Attribute::billing_period())
            .attribute(Attribute::status())
    }

    async fn create_request(
        &self,
        op: &Operation<'_>,
        plan: &SnapshotModel,
    ) -> Result<Self::Wire, ProviderError> {
        let project = plan.project_id.as_deref().unwrap_or_default();
        let volume = resolve(
            op,
            ResourceKind::BlockStorage,
            &[project],
            &plan.volume_uri_ref,
            "volume_uri_ref",
        )
        .await?;
        Ok(ApiObject::new(
            plan.common.metadata(),
            SnapshotProperties {
                volume,
                billing_plan: billing_plan(&plan.billing_period),
            },
        ))
    }

    async fn update_request(
        &self,
        _op: &Operation<'_>,
        plan: &SnapshotModel,
        current: Self::Wire,
    ) -> Result<Self::Wire, ProviderError> {
        Ok(plan.common.updated(current))
    }

    fn observe(&self, wire: &Self::Wire) -> SnapshotModel {
        SnapshotModel {
            common: Common::observe(wire),
            project_id: Attr::Null,
            volume_uri_ref: link_uri(&wire.properties.volume),
            billing_period: observed_billing(&wire.properties.billing_plan),
        }
    }
}

// =============================================================================
// Backup
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupModel {
    #[serde(flatten)]
    pub common: Common,
    pub project_id: Attr<String>,
    #[serde(rename = "type")]
    pub backup_type: Attr<String>,
    pub volume_id: Attr<String>,
    pub retention_days: Attr<i64>,
    pub billing_period: Attr<String>,
    pub volume_uri: Attr<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupProperties {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub backup_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_days: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_plan: Option<BillingPlan>,
}

pub struct BackupAdapter;

#[async_trait]
impl Adapter for BackupAdapter {
    type Model = BackupModel;
    type Wire = ApiObject<BackupProperties>;
    const KIND: ResourceKind = ResourceKind::Backup;

    fn schema(&self) -> ResourceSchema {
        base_schema(Self::KIND, "Backup of a block storage volume", true)
            .attribute(
                Attribute::enumeration("type", BACKUP_TYPES)
                    .required()
                    .immutable()
                    .policy(DriftPolicy::PlanOrPrior),
            )
            .attribute(
                Attribute::string("volume_id")
                    .required()
                    .immutable()
                    .policy(DriftPolicy::PriorWins)
                    .describe("Id of the volume to back up"),
            )
            .attribute(Attribute::int64("retention_days").describe("Days the backup is kept"))
            .attribute(Attribute::billing_period())
            .attribute(
                Attribute::string("volume_uri")
                    .computed()
                    .policy(DriftPolicy::ApiEcho)
                    .describe("Canonical URI of the backed-up volume"),
            )
            .attribute(Attribute::status())
    }

    async fn create_request(
        &self,
        op: &Operation<'_>,
        plan: &BackupModel,
    ) -> Result<Self::Wire, ProviderError> {
        let project = plan.project_id.as_deref().unwrap_or_default();
        let volume = resolve(
            op,
            ResourceKind::BlockStorage,
            &[project],
            &plan.volume_id,
            "volume_id",
        )
        .await?;
        Ok(ApiObject::new(
            plan.common.metadata(),
            BackupProperties {
                backup_type: enum_value(&plan.backup_type, BACKUP_TYPES, &[]),
                volume,
                retention_days: wire(&plan.retention_days),
                billing_plan: billing_plan(&plan.billing_period),
            },
        ))
    }

    async fn update_request(
        &self,
        _op: &Operation<'_>,
        plan: &BackupModel,
        current: Self::Wire,
    ) -> Result<Self::Wire, ProviderError> {
        let mut next = plan.common.updated(current);
        if let Some(days) = wire(&plan.retention_days) {
            next.properties.retention_days = Some(days);
        }
        Ok(next)
    }

    fn observe(&self, wire: &Self::Wire) -> BackupModel {
        let p = &wire.properties;
        BackupModel {
            common: Common::observe(wire),
            project_id: Attr::Null,
            backup_type: observed(p.backup_type.clone()),
            volume_id: Attr::Null,
            retention_days: observed(p.retention_days),
            billing_period: observed_billing(&p.billing_plan),
            volume_uri: link_uri(&p.volume),
        }
    }
}

// =============================================================================
// Restore
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestoreModel {
    #[serde(flatten)]
    pub common: Common,
    pub project_id: Attr<String>,
    pub backup_id: Attr<String>,
    pub volume_id: Attr<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RestoreProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup: Option<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<Link>,
}

pub struct RestoreAdapter;

#[async_trait]
impl Adapter for RestoreAdapter {
    type Model = RestoreModel;
    type Wire = ApiObject<RestoreProperties>;
    const KIND: ResourceKind = ResourceKind::Restore;

    fn schema(&self) -> ResourceSchema {
        base_schema(Self::KIND, "Restore of a backup onto a volume", true)
            .attribute(
                Attribute::string("volume_id")
                    .required()
                    .immutable()
                    .policy(DriftPolicy::PriorWins)
                    .describe("Id of the target volume"),
            )
            .attribute(Attribute::status())
    }

    async fn create_request(
        &self,
        op: &Operation<'_>,
        plan: &RestoreModel,
    ) -> Result<Self::Wire, ProviderError> {
        let project = plan.project_id.as_deref().unwrap_or_default();
        let backup = resolve(
            op,
            ResourceKind::Backup,
            &[project],
            &plan.backup_id,
            "backup_id",
        )
        .await?;
        let volume = resolve(
            op,
            ResourceKind::BlockStorage,
            &[project],
            &plan.volume_id,
            "volume_id",
        )
        .await?;
        Ok(ApiObject::new(plan.common.metadata(), RestoreProperties { backup, volume }))
    }

    async fn update_request(
        &self,
        _op: &Operation<'_>,
        plan: &RestoreModel,
        current: Self::Wire,
    ) -> Result<Self::Wire, ProviderError> {
        Ok(plan.common.updated(current))
    }

    fn observe(&self, wire: &Self::Wire) -> RestoreModel {
        RestoreModel {
            common: Common::observe(wire),
            ..RestoreModel::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_block_storage_wire_shape() {
        let plan: BlockStorageModel = serde_json::from_value(json!({
            "project_id": "P1", "name": "vol", "location": "ITBG-Bergamo",
            "size_gb": 20, "billing_period": "hourly", "storage_type": "standard"
        }))
        .unwrap();
        let props = BlockStorageProperties {
            size_gb: wire(&plan.size_gb),
            billing_plan: billing_plan(&plan.billing_period),
            storage_type: enum_value(&plan.storage_type, STORAGE_TYPES, &[]),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(props).unwrap(),
            json!({"sizeGb": 20, "billingPlan": {"billingPeriod": "Hour"}, "type": "Standard"})
        );
    }

    #[test]
    fn test_server_assigned_zone_converges() {
        use crate::lifecycle::drift::{reconcile, Inputs};
        use crate::lifecycle::schema::Requirement;

        let schema = BlockStorageAdapter.schema();
        assert_eq!(schema.get("zone").unwrap().requirement, Requirement::OptionalComputed);
        assert_eq!(
            schema.get("storage_type").unwrap().requirement,
            Requirement::OptionalComputed
        );

        let plan = json!({"name": "vol", "size_gb": 20, "zone": null, "image": null});
        let api = json!({"name": "vol", "size_gb": 20, "zone": "ITBG-1", "image": "ubuntu-22"});
        let created = reconcile(&schema, Inputs { plan: Some(&plan), prior: None, api: &api });
        assert_eq!(created["zone"], "ITBG-1");
        // image is plain optional: a null in configuration stays null
        assert_eq!(created["image"], serde_json::Value::Null);
    }

    #[test]
    fn test_backup_exposes_volume_uri() {
        let wire: ApiObject<BackupProperties> = serde_json::from_value(json!({
            "metadata": {"id": "B1", "name": "b"},
            "properties": {
                "type": "Full",
                "volume": {"uri": "/projects/P1/providers/Aruba.Storage/blockStorages/V1"}
            }
        }))
        .unwrap();
        let model = BackupAdapter.observe(&wire);
        assert_eq!(
            model.volume_uri,
            Attr::Known("/projects/P1/providers/Aruba.Storage/blockStorages/V1".to_string())
        );
        assert_eq!(model.volume_id, Attr::Null);
    }

    #[test]
    fn test_restore_is_under_backup() {
        let schema = RestoreAdapter.schema();
        assert!(schema.get("backup_id").unwrap().immutable);
        assert!(schema.get("volume_id").unwrap().immutable);
    }
}
