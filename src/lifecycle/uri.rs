//! Canonical URIs and resource kinds
//!
//! Every resource is addressed by a canonical URI that doubles as its REST
//! path. A kind knows its provider namespace, the collection segments below
//! it, and the parent ids that fill the placeholders.

use crate::api::error::{Phase, ProviderError};
use serde::Serialize;
use std::fmt;

/// API surface (provider namespace) a resource belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Service {
    Network,
    Compute,
    Storage,
    Database,
    Security,
    Container,
    Schedule,
}

impl Service {
    pub fn namespace(&self) -> &'static str {
        match self {
            Self::Network => "Aruba.Network",
            Self::Compute => "Aruba.Compute",
            Self::Storage => "Aruba.Storage",
            Self::Database => "Aruba.Database",
            Self::Security => "Aruba.Security",
            Self::Container => "Aruba.Container",
            Self::Schedule => "Aruba.Schedule",
        }
    }
}

/// Placeholder for a parent id inside a collection path
const PARENT: &str = "{}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Project,
    Vpc,
    Subnet,
    SecurityGroup,
    SecurityRule,
    VpcPeering,
    ElasticIp,
    VpnTunnel,
    VpnRoute,
    KeyPair,
    CloudServer,
    BlockStorage,
    Snapshot,
    Backup,
    Restore,
    Dbaas,
    DbaasDatabase,
    DbaasUser,
    DbaasGrant,
    Kms,
    Kmip,
    ContainerRegistry,
    Kaas,
    ScheduleJob,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 24] = [
        Self::Project,
        Self::Vpc,
        Self::Subnet,
        Self::SecurityGroup,
        Self::SecurityRule,
        Self::VpcPeering,
        Self::ElasticIp,
        Self::VpnTunnel,
        Self::VpnRoute,
        Self::KeyPair,
        Self::CloudServer,
        Self::BlockStorage,
        Self::Snapshot,
        Self::Backup,
        Self::Restore,
        Self::Dbaas,
        Self::DbaasDatabase,
        Self::DbaasUser,
        Self::DbaasGrant,
        Self::Kms,
        Self::Kmip,
        Self::ContainerRegistry,
        Self::Kaas,
        Self::ScheduleJob,
    ];

    /// Short label used in log lines and diagnostics
    pub fn label(&self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Vpc => "vpc",
            Self::Subnet => "subnet",
            Self::SecurityGroup => "security_group",
            Self::SecurityRule => "security_rule",
            Self::VpcPeering => "vpc_peering",
            Self::ElasticIp => "elastic_ip",
            Self::VpnTunnel => "vpn_tunnel",
            Self::VpnRoute => "vpn_route",
            Self::KeyPair => "keypair",
            Self::CloudServer => "cloud_server",
            Self::BlockStorage => "block_storage",
            Self::Snapshot => "snapshot",
            Self::Backup => "backup",
            Self::Restore => "restore",
            Self::Dbaas => "dbaas",
            Self::DbaasDatabase => "dbaas_database",
            Self::DbaasUser => "dbaas_user",
            Self::DbaasGrant => "dbaas_grant",
            Self::Kms => "kms",
            Self::Kmip => "kmip",
            Self::ContainerRegistry => "container_registry",
            Self::Kaas => "kaas",
            Self::ScheduleJob => "schedule_job",
        }
    }

    /// Name the orchestrator uses for the type
    pub fn type_name(&self) -> String {
        format!("arubacloud_{}", self.label())
    }

    pub fn from_type_name(name: &str) -> Option<Self> {
        let label = name.strip_prefix("arubacloud_").unwrap_or(name);
        Self::ALL.into_iter().find(|k| k.label() == label)
    }

    pub fn service(&self) -> Option<Service> {
        Some(match self {
            Self::Project => return None,
            Self::Vpc
            | Self::Subnet
            | Self::SecurityGroup
            | Self::SecurityRule
            | Self::VpcPeering
            | Self::ElasticIp
            | Self::VpnTunnel
            | Self::VpnRoute => Service::Network,
            Self::KeyPair | Self::CloudServer => Service::Compute,
            Self::BlockStorage | Self::Snapshot | Self::Backup | Self::Restore => Service::Storage,
            Self::Dbaas | Self::DbaasDatabase | Self::DbaasUser | Self::DbaasGrant => {
                Service::Database
            }
            Self::Kms | Self::Kmip => Service::Security,
            Self::ContainerRegistry | Self::Kaas => Service::Container,
            Self::ScheduleJob => Service::Schedule,
        })
    }

    /// Path segments below the provider namespace
    fn segments(&self) -> &'static [&'static str] {
        match self {
            Self::Project => &["projects"],
            Self::Vpc => &["vpcs"],
            Self::Subnet => &["vpcs", PARENT, "subnets"],
            Self::SecurityGroup => &["vpcs", PARENT, "securityGroups"],
            Self::SecurityRule => &["vpcs", PARENT, "securityGroups", PARENT, "securityRules"],
            Self::VpcPeering => &["vpcs", PARENT, "vpcPeerings"],
            Self::ElasticIp => &["elasticIps"],
            Self::VpnTunnel => &["vpnTunnels"],
            Self::VpnRoute => &["vpnTunnels", PARENT, "vpnRoutes"],
            Self::KeyPair => &["keyPairs"],
            Self::CloudServer => &["cloudServers"],
            Self::BlockStorage => &["blockStorages"],
            Self::Snapshot => &["snapshots"],
            Self::Backup => &["backups"],
            Self::Restore => &["backups", PARENT, "restores"],
            Self::Dbaas => &["dbaas"],
            Self::DbaasDatabase => &["dbaas", PARENT, "databases"],
            Self::DbaasUser => &["dbaas", PARENT, "users"],
            Self::DbaasGrant => &["dbaas", PARENT, "databases", PARENT, "grants"],
            Self::Kms => &["kms"],
            Self::Kmip => &["kms", PARENT, "kmip"],
            Self::ContainerRegistry => &["registries"],
            Self::Kaas => &["kaas"],
            Self::ScheduleJob => &["jobs"],
        }
    }

    /// Attributes holding the parent ids, in path order
    pub fn parent_attributes(&self) -> &'static [&'static str] {
        match self {
            Self::Project => &[],
            Self::Subnet | Self::SecurityGroup | Self::VpcPeering => &["project_id", "vpc_id"],
            Self::SecurityRule => &["project_id", "vpc_id", "security_group_id"],
            Self::VpnRoute => &["project_id", "vpn_tunnel_id"],
            Self::Restore => &["project_id", "backup_id"],
            Self::DbaasDatabase | Self::DbaasUser => &["project_id", "dbaas_id"],
            Self::DbaasGrant => &["project_id", "dbaas_id", "database"],
            Self::Kmip => &["project_id", "kms_id"],
            _ => &["project_id"],
        }
    }

    /// Attribute that identifies an instance inside its collection
    pub fn id_attribute(&self) -> &'static str {
        match self {
            Self::DbaasDatabase => "name",
            Self::DbaasUser | Self::DbaasGrant => "username",
            _ => "id",
        }
    }

    /// Full template: literal segments plus one placeholder per parent and
    /// a trailing placeholder for the id
    fn template(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if let Some(service) = self.service() {
            out.extend(["projects", PARENT, "providers", service.namespace()]);
        }
        out.extend_from_slice(self.segments());
        out.push(PARENT);
        out
    }

    /// REST path of the collection the resource lives in
    pub fn collection(&self, parents: &[&str]) -> Result<String, ProviderError> {
        let names = self.parent_attributes();
        if parents.len() != names.len() {
            return Err(ProviderError::validation(
                Phase::Validate,
                "Missing parent identifier",
                format!(
                    "{} needs {} parent id(s) ({}), got {}",
                    self.label(),
                    names.len(),
                    names.join(", "),
                    parents.len()
                ),
            ));
        }
        if let Some(pos) = parents.iter().position(|p| p.is_empty()) {
            return Err(ProviderError::validation(
                Phase::Validate,
                "Missing parent identifier",
                format!("'{}' must not be empty", names[pos]),
            )
            .with_attribute(names[pos]));
        }

        let template = self.template();
        let mut parents = parents.iter();
        let mut path = String::new();
        for segment in &template[..template.len() - 1] {
            path.push('/');
            if *segment == PARENT {
                // counted above, so the iterator cannot run dry
                if let Some(parent) = parents.next() {
                    path.push_str(&urlencoding::encode(parent));
                }
            } else {
                path.push_str(segment);
            }
        }
        Ok(path)
    }

    /// Lift a short id to the canonical URI. A value that already starts
    /// with `/` is returned verbatim.
    pub fn canonicalize(&self, parents: &[&str], id_or_uri: &str) -> Result<String, ProviderError> {
        if id_or_uri.starts_with('/') {
            return Ok(id_or_uri.to_string());
        }
        if id_or_uri.is_empty() {
            return Err(ProviderError::validation(
                Phase::Validate,
                "Missing identifier",
                format!("cannot build a {} URI from an empty id", self.label()),
            ));
        }
        Ok(format!(
            "{}/{}",
            self.collection(parents)?,
            urlencoding::encode(id_or_uri)
        ))
    }

    /// Split a canonical URI into parent ids and the resource id
    pub fn parse(&self, uri: &str) -> Option<(Vec<String>, String)> {
        let path = uri.split('?').next().unwrap_or(uri).trim_end_matches('/');
        let parts: Vec<&str> = path.strip_prefix('/')?.split('/').collect();
        let template = self.template();
        if parts.len() != template.len() {
            return None;
        }

        let mut ids = Vec::new();
        for (part, segment) in parts.iter().zip(&template) {
            if *segment == PARENT {
                if part.is_empty() {
                    return None;
                }
                ids.push(urlencoding::decode(part).ok()?.into_owned());
            } else if !part.eq_ignore_ascii_case(segment) {
                return None;
            }
        }
        let id = ids.pop()?;
        Some((ids, id))
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Last path segment of a URI, i.e. the short id
pub fn short_id(uri: &str) -> Option<&str> {
    uri.split('?')
        .next()
        .unwrap_or(uri)
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_uri() {
        assert_eq!(ResourceKind::Project.canonicalize(&[], "P1").unwrap(), "/projects/P1");
    }

    #[test]
    fn test_nested_network_uri() {
        assert_eq!(
            ResourceKind::Subnet.canonicalize(&["P1", "V"], "S").unwrap(),
            "/projects/P1/providers/Aruba.Network/vpcs/V/subnets/S"
        );
        assert_eq!(
            ResourceKind::SecurityRule
                .canonicalize(&["P1", "V", "G"], "R")
                .unwrap(),
            "/projects/P1/providers/Aruba.Network/vpcs/V/securityGroups/G/securityRules/R"
        );
    }

    #[test]
    fn test_dbaas_grant_uri() {
        assert_eq!(
            ResourceKind::DbaasGrant
                .canonicalize(&["P1", "D1", "app"], "alice")
                .unwrap(),
            "/projects/P1/providers/Aruba.Database/dbaas/D1/databases/app/grants/alice"
        );
    }

    #[test]
    fn test_canonicalize_is_idempotent() {
        let uri = ResourceKind::KeyPair.canonicalize(&["P1"], "K").unwrap();
        assert_eq!(ResourceKind::KeyPair.canonicalize(&["P1"], &uri).unwrap(), uri);
    }

    #[test]
    fn test_wrong_parent_count() {
        let err = ResourceKind::Subnet.collection(&["P1"]).unwrap_err();
        assert!(err.detail.contains("vpc_id"));
        let err = ResourceKind::Subnet.collection(&["P1", ""]).unwrap_err();
        assert_eq!(err.attribute.as_deref(), Some("vpc_id"));
    }

    #[test]
    fn test_parse_round_trips() {
        let uri = "/projects/P1/providers/Aruba.Storage/backups/BK/restores/R1";
        let (parents, id) = ResourceKind::Restore.parse(uri).unwrap();
        assert_eq!(parents, vec!["P1".to_string(), "BK".to_string()]);
        assert_eq!(id, "R1");
        assert!(ResourceKind::Backup.parse(uri).is_none());
        assert_eq!(ResourceKind::Project.parse("/projects/P1").unwrap().1, "P1");
    }

    #[test]
    fn test_ids_are_encoded() {
        let uri = ResourceKind::DbaasUser.canonicalize(&["P1", "D1"], "a b").unwrap();
        assert!(uri.ends_with("/users/a%20b"));
        assert_eq!(ResourceKind::DbaasUser.parse(&uri).unwrap().1, "a b");
    }

    #[test]
    fn test_type_names() {
        for kind in ResourceKind::ALL {
            assert_eq!(ResourceKind::from_type_name(&kind.type_name()), Some(kind));
        }
        assert_eq!(ResourceKind::from_type_name("arubacloud_nope"), None);
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("/projects/P1/providers/Aruba.Compute/keyPairs/K"), Some("K"));
        assert_eq!(short_id("K"), Some("K"));
        assert_eq!(short_id(""), None);
    }
}
