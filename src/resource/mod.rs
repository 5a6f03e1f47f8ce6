//! Resource adapters and the handler registry
//!
//! Each Aruba Cloud resource type is an [`Adapter`](crate::lifecycle::Adapter)
//! wrapped in a [`Reconciler`]. The registry maps resource type names
//! (`arubacloud_vpc`, ...) to the object-safe handler the dispatcher calls.
//!
//! # Example
//!
//! ```ignore
//! use arubacloud_provider::resource::get_handler;
//!
//! let handler = get_handler("arubacloud_elastic_ip").unwrap();
//! let errors = handler.validate(&config);
//! ```

pub mod common;
pub mod compute;
pub mod container;
pub mod database;
pub mod network;
pub mod project;
pub mod schedule;
pub mod security;
pub mod storage;
pub mod vpn;

use crate::lifecycle::uri::ResourceKind;
use crate::lifecycle::{Reconciler, ResourceHandler};
use std::collections::HashMap;
use std::sync::OnceLock;

type Registry = HashMap<ResourceKind, Box<dyn ResourceHandler>>;

static REGISTRY: OnceLock<Registry> = OnceLock::new();

fn boxed<A: crate::lifecycle::Adapter>(adapter: A) -> Box<dyn ResourceHandler> {
    Box::new(Reconciler::new(adapter))
}

fn handler_for(kind: ResourceKind) -> Box<dyn ResourceHandler> {
    match kind {
        ResourceKind::Project => boxed(project::ProjectAdapter),
        ResourceKind::Vpc => boxed(network::VpcAdapter),
        ResourceKind::Subnet => boxed(network::SubnetAdapter),
        ResourceKind::SecurityGroup => boxed(network::SecurityGroupAdapter),
        ResourceKind::SecurityRule => boxed(network::SecurityRuleAdapter),
        ResourceKind::VpcPeering => boxed(network::VpcPeeringAdapter),
        ResourceKind::ElasticIp => boxed(network::ElasticIpAdapter),
        ResourceKind::VpnTunnel => boxed(vpn::VpnTunnelAdapter),
        ResourceKind::VpnRoute => boxed(vpn::VpnRouteAdapter),
        ResourceKind::KeyPair => boxed(compute::KeyPairAdapter),
        ResourceKind::CloudServer => boxed(compute::CloudServerAdapter),
        ResourceKind::BlockStorage => boxed(storage::BlockStorageAdapter),
        ResourceKind::Snapshot => boxed(storage::SnapshotAdapter),
        ResourceKind::Backup => boxed(storage::BackupAdapter),
        ResourceKind::Restore => boxed(storage::RestoreAdapter),
        ResourceKind::Dbaas => boxed(database::DbaasAdapter),
        ResourceKind::DbaasDatabase => boxed(database::DatabaseAdapter),
        ResourceKind::DbaasUser => boxed(database::UserAdapter),
        ResourceKind::DbaasGrant => boxed(database::GrantAdapter),
        ResourceKind::Kms => boxed(security::KmsAdapter),
        ResourceKind::Kmip => boxed(security::KmipAdapter),
        ResourceKind::ContainerRegistry => boxed(container::RegistryAdapter),
        ResourceKind::Kaas => boxed(container::KaasAdapter),
        ResourceKind::ScheduleJob => boxed(schedule::ScheduleJobAdapter),
    }
}

/// Get the handler registry (built on first access)
pub fn get_registry() -> &'static Registry {
    REGISTRY.get_or_init(|| {
        ResourceKind::ALL
            .iter()
            .map(|&kind| (kind, handler_for(kind)))
            .collect()
    })
}

/// Get a handler by resource type name
pub fn get_handler(type_name: &str) -> Option<&'static dyn ResourceHandler> {
    let kind = ResourceKind::from_type_name(type_name)?;
    get_registry().get(&kind).map(|h| h.as_ref())
}

/// All resource type names, in catalogue order
pub fn get_all_type_names() -> Vec<String> {
    ResourceKind::ALL.iter().map(ResourceKind::type_name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::schema::DriftPolicy;

    #[test]
    fn test_registry_covers_every_kind() {
        assert_eq!(get_registry().len(), ResourceKind::ALL.len());
        for kind in ResourceKind::ALL.iter() {
            let handler = get_handler(&kind.type_name()).unwrap();
            assert_eq!(handler.kind(), *kind);
        }
    }

    #[test]
    fn test_unknown_type_name() {
        assert!(get_handler("arubacloud_mainframe").is_none());
    }

    #[test]
    fn test_schema_type_names_match_registry() {
        for name in get_all_type_names() {
            let schema = get_handler(&name).unwrap().schema();
            assert_eq!(schema.type_name, name);
        }
    }

    #[test]
    fn test_parents_are_immutable_prior_wins() {
        for kind in ResourceKind::ALL.iter() {
            let schema = get_handler(&kind.type_name()).unwrap().schema();
            for parent in kind.parent_attributes() {
                let attr = schema
                    .get(parent)
                    .unwrap_or_else(|| panic!("{} lacks {}", kind, parent));
                assert!(attr.immutable);
                assert_eq!(attr.drift, DriftPolicy::PriorWins);
            }
            assert!(schema.get(kind.id_attribute()).is_some(), "{} lacks its id", kind);
        }
    }

    #[test]
    fn test_attribute_names_are_unique() {
        for kind in ResourceKind::ALL.iter() {
            let schema = get_handler(&kind.type_name()).unwrap().schema();
            let mut names: Vec<_> = schema.attributes.iter().map(|a| a.name).collect();
            let total = names.len();
            names.sort_unstable();
            names.dedup();
            assert_eq!(names.len(), total, "duplicate attribute in {}", kind);
        }
    }
}
