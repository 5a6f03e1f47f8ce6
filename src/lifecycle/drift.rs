//! Drift reconciliation
//!
//! Decides, attribute by attribute, whether durable state takes the planned
//! value, keeps the prior value, or takes what the API echoed. Works on the
//! JSON form of a model so one descriptor-driven pass serves every adapter.

use super::schema::{AttrType, Attribute, DriftPolicy, Requirement, ResourceSchema};
use super::value::is_unknown_json;
use crate::api::error::{Phase, ProviderError};
use serde_json::{Map, Value};

/// The three inputs of a write-back; `plan` is absent during Read and
/// `prior` is absent during Create
#[derive(Debug, Clone, Copy)]
pub struct Inputs<'a> {
    pub plan: Option<&'a Value>,
    pub prior: Option<&'a Value>,
    pub api: &'a Value,
}

fn field<'a>(obj: Option<&'a Value>, name: &str) -> Option<&'a Value> {
    obj.and_then(|o| o.get(name))
}

fn known(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null() && !is_unknown_json(v))
}

/// Set equality for arrays of scalars
pub fn set_equal(a: &Value, b: &Value) -> bool {
    match (a.as_array(), b.as_array()) {
        (Some(a), Some(b)) => {
            a.len() == b.len() && a.iter().all(|x| b.contains(x)) && b.iter().all(|x| a.contains(x))
        }
        _ => a == b,
    }
}

fn equal_for(ty: &AttrType, a: &Value, b: &Value) -> bool {
    match ty {
        AttrType::Set { .. } => set_equal(a, b),
        AttrType::Enum { .. } => match (a.as_str(), b.as_str()) {
            (Some(a), Some(b)) => match (ty.canonical_member(a), ty.canonical_member(b)) {
                (Some(a), Some(b)) => a == b,
                _ => a.eq_ignore_ascii_case(b),
            },
            _ => a == b,
        },
        _ => a == b,
    }
}

/// Result of looking at the API echo for one attribute
enum Echo {
    /// The API did not return the attribute
    Absent,
    /// The API returned it; `Value::Null` after empty-list normalisation
    Present(Value),
}

/// Empty collections become null when the reference value is null, so a
/// `null` in configuration and `[]` from the API do not produce a diff
fn echo(attr: &Attribute, api: Option<&Value>, reference: Option<&Value>) -> Echo {
    let Some(api) = known(api) else {
        return Echo::Absent;
    };
    if attr.ty.is_collection() && api.as_array().is_some_and(Vec::is_empty) {
        return match known(reference) {
            Some(_) => Echo::Present(api.clone()),
            None => Echo::Present(Value::Null),
        };
    }
    // Keep the reference ordering when the API returns the same set
    if let Some(reference) = known(reference) {
        if equal_for(&attr.ty, api, reference) {
            return Echo::Present(reference.clone());
        }
    }
    Echo::Present(api.clone())
}

fn declared_null(attr: &Attribute, inputs: Inputs<'_>, plan: Option<&Value>) -> bool {
    inputs.plan.is_some()
        && plan.map_or(true, Value::is_null)
        && matches!(attr.requirement, Requirement::Optional | Requirement::Required)
}

fn merge_attribute(attr: &Attribute, inputs: Inputs<'_>) -> Value {
    let plan = field(inputs.plan, attr.name);
    let prior = field(inputs.prior, attr.name);
    let api = field(Some(inputs.api), attr.name);
    // During Create/Update the plan is the reference; during Read the prior
    let reference = if inputs.plan.is_some() { plan } else { prior };
    // A null the user declared stays null unless the API may fill it in
    let echo = if declared_null(attr, inputs, plan) {
        Echo::Absent
    } else {
        echo(attr, api, reference)
    };

    let chosen = match attr.drift {
        DriftPolicy::PriorWins => known(prior)
            .cloned()
            .or_else(|| match echo {
                Echo::Present(v) if !v.is_null() => Some(v),
                _ => None,
            })
            .or_else(|| known(plan).cloned()),
        DriftPolicy::ApiEcho => match echo {
            Echo::Present(v) => Some(v),
            Echo::Absent => known(prior).cloned(),
        },
        DriftPolicy::PlanOrPrior => known(plan)
            .cloned()
            .or_else(|| known(prior).cloned())
            .or(match echo {
                Echo::Present(v) => Some(v),
                Echo::Absent => None,
            }),
        DriftPolicy::PlanWins => {
            if inputs.plan.is_some() {
                known(plan).cloned().or_else(|| known(prior).cloned()).or(match echo {
                    Echo::Present(v) => Some(v),
                    Echo::Absent => None,
                })
            } else {
                match echo {
                    Echo::Present(v) => Some(v),
                    Echo::Absent => known(prior).cloned(),
                }
            }
        }
    };

    match chosen {
        // Sensitive values are never cleared by an API that does not echo them
        None if attr.sensitive => known(prior).cloned().unwrap_or(Value::Null),
        None => Value::Null,
        Some(v) => v,
    }
}

/// Merge plan, prior and API view into the value written to durable state.
///
/// The result never contains unknown values.
pub fn reconcile(schema: &ResourceSchema, inputs: Inputs<'_>) -> Value {
    let mut out = Map::new();
    for attr in &schema.attributes {
        out.insert(attr.name.to_string(), merge_attribute(attr, inputs));
    }
    Value::Object(out)
}

/// Reject plan changes to attributes the API cannot mutate
pub fn check_immutable(
    schema: &ResourceSchema,
    plan: &Value,
    prior: &Value,
) -> Result<(), ProviderError> {
    for attr in &schema.attributes {
        if !attr.immutable || attr.requirement == Requirement::Computed {
            continue;
        }
        let planned = known(plan.get(attr.name));
        let recorded = known(prior.get(attr.name));
        let (Some(planned), Some(recorded)) = (planned, recorded) else {
            continue;
        };
        if equal_for(&attr.ty, planned, recorded) {
            continue;
        }
        let detail = if attr.sensitive {
            format!("'{}' cannot be changed after creation", attr.name)
        } else {
            format!(
                "'{}' cannot be changed after creation (recorded {}, planned {})",
                attr.name, recorded, planned
            )
        };
        return Err(ProviderError::validation(Phase::Update, "Immutable attribute changed", detail)
            .with_attribute(attr.name));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::schema::Attribute;
    use serde_json::json;

    fn schema() -> ResourceSchema {
        ResourceSchema::new("arubacloud_test", "test")
            .attribute(Attribute::id())
            .attribute(Attribute::parent("project_id"))
            .attribute(Attribute::name())
            .attribute(Attribute::tags())
            .attribute(Attribute::status())
            .attribute(Attribute::string("address").computed().policy(DriftPolicy::ApiEcho))
            .attribute(
                Attribute::string("password")
                    .sensitive()
                    .policy(DriftPolicy::PlanOrPrior),
            )
            .attribute(Attribute::bool("default").optional_computed().policy(DriftPolicy::ApiEcho))
            .attribute(Attribute::string("zone").immutable().policy(DriftPolicy::PlanOrPrior))
            .attribute(
                Attribute::string("region")
                    .optional_computed()
                    .immutable()
                    .policy(DriftPolicy::PlanOrPrior),
            )
            .attribute(Attribute::billing_period())
    }

    #[test]
    fn test_read_keeps_null_tags_when_api_returns_empty() {
        let prior = json!({"id": "P1", "name": "p1", "tags": null});
        let api = json!({"id": "P1", "name": "p1", "tags": []});
        let out = reconcile(&schema(), Inputs { plan: None, prior: Some(&prior), api: &api });
        assert_eq!(out["tags"], Value::Null);
    }

    #[test]
    fn test_read_keeps_empty_tags_when_prior_was_empty() {
        let prior = json!({"id": "P1", "tags": []});
        let api = json!({"id": "P1"});
        let out = reconcile(&schema(), Inputs { plan: None, prior: Some(&prior), api: &api });
        assert_eq!(out["tags"], json!([]));
    }

    #[test]
    fn test_set_equal_tags_keep_prior_order() {
        let prior = json!({"tags": ["b", "a"]});
        let api = json!({"tags": ["a", "b"]});
        let out = reconcile(&schema(), Inputs { plan: None, prior: Some(&prior), api: &api });
        assert_eq!(out["tags"], json!(["b", "a"]));
    }

    #[test]
    fn test_ids_are_prior_wins_on_update() {
        let plan = json!({"id": "OTHER", "project_id": "P2", "name": "new"});
        let prior = json!({"id": "X1", "project_id": "P1", "name": "old"});
        let api = json!({"id": "X1", "name": "new"});
        let out = reconcile(
            &schema(),
            Inputs { plan: Some(&plan), prior: Some(&prior), api: &api },
        );
        assert_eq!(out["id"], "X1");
        assert_eq!(out["project_id"], "P1");
        assert_eq!(out["name"], "new");
    }

    #[test]
    fn test_create_takes_id_from_api() {
        let plan = json!({
            "id": {"$unknown": true},
            "project_id": "P1",
            "name": "eip1",
            "address": {"$unknown": true}
        });
        let api = json!({"id": "E1", "address": "203.0.113.5", "status": "Active"});
        let out = reconcile(&schema(), Inputs { plan: Some(&plan), prior: None, api: &api });
        assert_eq!(out["id"], "E1");
        assert_eq!(out["project_id"], "P1");
        assert_eq!(out["address"], "203.0.113.5");
        assert_eq!(out["status"], "Active");
    }

    #[test]
    fn test_unknown_never_reaches_state() {
        let plan = json!({"address": {"$unknown": true}, "default": {"$unknown": true}});
        let api = json!({});
        let out = reconcile(&schema(), Inputs { plan: Some(&plan), prior: None, api: &api });
        assert_eq!(out["address"], Value::Null);
        assert_eq!(out["default"], Value::Null);
    }

    #[test]
    fn test_sensitive_not_overwritten_by_missing_echo() {
        let prior = json!({"password": "s3cret"});
        let api = json!({"password": null});
        let out = reconcile(&schema(), Inputs { plan: None, prior: Some(&prior), api: &api });
        assert_eq!(out["password"], "s3cret");
    }

    #[test]
    fn test_boolean_echo_only_when_present() {
        let prior = json!({"default": true});
        let out = reconcile(&schema(), Inputs { plan: None, prior: Some(&prior), api: &json!({}) });
        assert_eq!(out["default"], true);
        let out = reconcile(
            &schema(),
            Inputs { plan: None, prior: Some(&prior), api: &json!({"default": false}) },
        );
        assert_eq!(out["default"], false);
    }

    #[test]
    fn test_read_takes_api_for_mutable_fields() {
        let prior = json!({"name": "old"});
        let api = json!({"name": "renamed-outside"});
        let out = reconcile(&schema(), Inputs { plan: None, prior: Some(&prior), api: &api });
        assert_eq!(out["name"], "renamed-outside");
    }

    #[test]
    fn test_immutable_change_is_rejected() {
        let recorded = json!({"zone": "z1"});
        let err = check_immutable(&schema(), &json!({"zone": "z2"}), &recorded).unwrap_err();
        assert_eq!(err.attribute.as_deref(), Some("zone"));
        assert!(check_immutable(&schema(), &json!({"zone": "z1"}), &recorded).is_ok());
        let unknown = json!({"zone": {"$unknown": true}});
        assert!(check_immutable(&schema(), &unknown, &recorded).is_ok());
    }

    #[test]
    fn test_unset_optional_stays_null_across_applies() {
        let plan = json!({"id": {"$unknown": true}, "name": "v1", "zone": null});
        let api = json!({"id": "V1", "name": "v1", "zone": "ITBG-1"});
        let created = reconcile(&schema(), Inputs { plan: Some(&plan), prior: None, api: &api });
        assert_eq!(created["zone"], Value::Null);

        let plan = json!({"id": "V1", "name": "v1", "zone": null});
        let updated = reconcile(
            &schema(),
            Inputs { plan: Some(&plan), prior: Some(&created), api: &api },
        );
        assert_eq!(updated["zone"], Value::Null);
        assert!(check_immutable(&schema(), &plan, &updated).is_ok());
    }

    #[test]
    fn test_optional_computed_takes_api_value_when_unset() {
        let plan = json!({"name": "v1", "region": null, "billing_period": null});
        let api = json!({"name": "v1", "region": "ITBG-1", "billing_period": "Hour"});
        let out = reconcile(&schema(), Inputs { plan: Some(&plan), prior: None, api: &api });
        assert_eq!(out["region"], "ITBG-1");
        assert_eq!(out["billing_period"], "Hour");
    }

    #[test]
    fn test_unknown_optional_resolves_from_api() {
        let plan = json!({"name": "v1", "zone": {"$unknown": true}});
        let api = json!({"name": "v1", "zone": "ITBG-1"});
        let out = reconcile(&schema(), Inputs { plan: Some(&plan), prior: None, api: &api });
        assert_eq!(out["zone"], "ITBG-1");
    }

    #[test]
    fn test_import_records_server_assigned_optionals() {
        let prior = json!({"id": "V1"});
        let api = json!({"id": "V1", "name": "v1", "zone": "ITBG-1"});
        let out = reconcile(&schema(), Inputs { plan: None, prior: Some(&prior), api: &api });
        assert_eq!(out["zone"], "ITBG-1");
    }

    #[test]
    fn test_enum_alias_matches_api_spelling() {
        let plan = json!({"billing_period": "hourly"});
        let imported = json!({"billing_period": "Hour"});
        assert!(check_immutable(&schema(), &plan, &imported).is_ok());

        let api = json!({"billing_period": "Hour"});
        let out = reconcile(
            &schema(),
            Inputs { plan: Some(&plan), prior: Some(&imported), api: &api },
        );
        assert_eq!(out["billing_period"], "hourly");

        let plan = json!({"billing_period": "yearly"});
        let err = check_immutable(&schema(), &plan, &imported).unwrap_err();
        assert_eq!(err.attribute.as_deref(), Some("billing_period"));
    }

    #[test]
    fn test_parent_ids_are_immutable() {
        let plan = json!({"project_id": "P2"});
        let err = check_immutable(&schema(), &plan, &json!({"project_id": "P1"})).unwrap_err();
        assert_eq!(err.attribute.as_deref(), Some("project_id"));
    }
}
