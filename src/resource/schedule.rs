//! Scheduled jobs that call other resources' actions

use super::common::{base_schema, Common};
use crate::api::error::{Phase, ProviderError};
use crate::api::object::ApiObject;
use crate::lifecycle::schema::{AttrType, Attribute, DriftPolicy, ResourceSchema};
use crate::lifecycle::translate::{enum_value, observed, wire};
use crate::lifecycle::uri::ResourceKind;
use crate::lifecycle::{Adapter, Attr, Operation};
use async_trait::async_trait;
use chrono::DateTime;
use serde::{Deserialize, Serialize};

const JOB_TYPES: &[&str] = &["OneShot", "Recurring"];
const HTTP_VERBS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleJobModel {
    #[serde(flatten)]
    pub common: Common,
    pub enabled: Attr<bool>,
    pub schedule_job_type: Attr<String>,
    pub schedule_at: Attr<String>,
    pub cron: Attr<String>,
    pub execute_until: Attr<String>,
    pub steps: Attr<Vec<StepModel>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepModel {
    pub name: Attr<String>,
    pub resource_uri_ref: Attr<String>,
    pub action_uri: Attr<String>,
    pub http_verb: Attr<String>,
    pub body: Attr<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleJobProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_job_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execute_until: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<Step>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_verb: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl StepModel {
    fn to_wire(&self) -> Step {
        Step {
            name: wire(&self.name),
            resource_uri: wire(&self.resource_uri_ref),
            action_uri: wire(&self.action_uri),
            http_verb: enum_value(&self.http_verb, HTTP_VERBS, &[]),
            body: wire(&self.body),
        }
    }

    fn observe(step: &Step) -> Self {
        Self {
            name: observed(step.name.clone()),
            resource_uri_ref: observed(step.resource_uri.clone()),
            action_uri: observed(step.action_uri.clone()),
            http_verb: observed(step.http_verb.clone()),
            body: observed(step.body.clone()),
        }
    }
}

fn steps(plan: &ScheduleJobModel) -> Option<Vec<Step>> {
    plan.steps
        .value()
        .map(|steps| steps.iter().map(StepModel::to_wire).collect())
}

fn variant_error(title: &str, detail: &str, attribute: &str) -> ProviderError {
    ProviderError::validation(Phase::Validate, title, detail).with_attribute(attribute)
}

fn check_timestamp(attr: &Attr<String>, name: &str, errors: &mut Vec<ProviderError>) {
    if let Some(text) = attr.as_deref() {
        if let Err(e) = DateTime::parse_from_rfc3339(text) {
            errors.push(variant_error(
                "Invalid timestamp",
                &format!("'{}' is not an RFC 3339 time: {}", text, e),
                name,
            ));
        }
    }
}

pub struct ScheduleJobAdapter;

#[async_trait]
impl Adapter for ScheduleJobAdapter {
    type Model = ScheduleJobModel;
    type Wire = ApiObject<ScheduleJobProperties>;
    const KIND: ResourceKind = ResourceKind::ScheduleJob;

    fn schema(&self) -> ResourceSchema {
        let pp = |a: Attribute| a.policy(DriftPolicy::PlanOrPrior);
        let step = AttrType::object(vec![
            Attribute::string("name"),
            Attribute::string("resource_uri_ref").required(),
            Attribute::string("action_uri").required(),
            Attribute::enumeration("http_verb", HTTP_VERBS).required(),
            Attribute::string("body"),
        ]);
        base_schema(Self::KIND, "Scheduled job", true)
            .attribute(Attribute::bool("enabled").describe("Whether the job runs"))
            .attribute(
                pp(Attribute::enumeration("schedule_job_type", JOB_TYPES))
                    .required()
                    .immutable(),
            )
            .attribute(
                pp(Attribute::string("schedule_at")).describe("RFC 3339 time of a one-shot run"),
            )
            .attribute(pp(Attribute::string("cron")).describe("Cron expression of a recurring job"))
            .attribute(
                pp(Attribute::string("execute_until")).describe("RFC 3339 end of a recurring job"),
            )
            .attribute(
                Attribute::new("steps", AttrType::list(step)).describe("Actions the job performs"),
            )
            .attribute(Attribute::status())
    }

    fn validate(&self, model: &ScheduleJobModel) -> Vec<ProviderError> {
        let mut errors = Vec::new();
        match model.schedule_job_type.as_deref() {
            Some(t) if t.eq_ignore_ascii_case("OneShot") => {
                if model.schedule_at.is_null() {
                    errors.push(variant_error(
                        "Missing schedule time",
                        "a OneShot job requires 'schedule_at'",
                        "schedule_at",
                    ));
                }
                if !model.cron.is_null() {
                    errors.push(variant_error(
                        "Conflicting schedule",
                        "a OneShot job takes no 'cron' expression",
                        "cron",
                    ));
                }
            }
            Some(t) if t.eq_ignore_ascii_case("Recurring") && model.cron.is_null() => {
                errors.push(variant_error(
                    "Missing cron expression",
                    "a Recurring job requires 'cron'",
                    "cron",
                ));
            }
            _ => {}
        }
        check_timestamp(&model.schedule_at, "schedule_at", &mut errors);
        check_timestamp(&model.execute_until, "execute_until", &mut errors);
        errors
    }

    async fn create_request(
        &self,
        _op: &Operation<'_>,
        plan: &ScheduleJobModel,
    ) -> Result<Self::Wire, ProviderError> {
        Ok(ApiObject::new(
            plan.common.metadata(),
            ScheduleJobProperties {
                enabled: wire(&plan.enabled),
                schedule_job_type: enum_value(&plan.schedule_job_type, JOB_TYPES, &[]),
                schedule_at: wire(&plan.schedule_at),
                cron: wire(&plan.cron),
                execute_until: wire(&plan.execute_until),
                steps: steps(plan),
            },
        ))
    }

    async fn update_request(
        &self,
        _op: &Operation<'_>,
        plan: &ScheduleJobModel,
        current: Self::Wire,
    ) -> Result<Self::Wire, ProviderError> {
        let mut next = plan.common.updated(current);
        let props = &mut next.properties;
        if let Some(enabled) = wire(&plan.enabled) {
            props.enabled = Some(enabled);
        }
        if let Some(at) = wire(&plan.schedule_at) {
            props.schedule_at = Some(at);
        }
        if let Some(cron) = wire(&plan.cron) {
            props.cron = Some(cron);
        }
        if let Some(until) = wire(&plan.execute_until) {
            props.execute_until = Some(until);
        }
        if let Some(steps) = steps(plan) {
            props.steps = Some(steps);
        }
        Ok(next)
    }

    fn observe(&self, wire: &Self::Wire) -> ScheduleJobModel {
        let p = &wire.properties;
        ScheduleJobModel {
            common: Common::observe(wire),
            enabled: observed(p.enabled),
            schedule_job_type: observed(p.schedule_job_type.clone()),
            schedule_at: observed(p.schedule_at.clone()),
            cron: observed(p.cron.clone()),
            execute_until: observed(p.execute_until.clone()),
            steps: observed(
                p.steps
                    .as_ref()
                    .map(|steps| steps.iter().map(StepModel::observe).collect()),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn job(config: serde_json::Value) -> ScheduleJobModel {
        serde_json::from_value(config).unwrap()
    }

    #[test]
    fn test_one_shot_rules() {
        let errs = ScheduleJobAdapter.validate(&job(json!({
            "name": "j", "schedule_job_type": "OneShot", "cron": "0 * * * *"
        })));
        let attrs: Vec<_> = errs.iter().filter_map(|e| e.attribute.clone()).collect();
        assert_eq!(attrs, vec!["schedule_at".to_string(), "cron".to_string()]);
    }

    #[test]
    fn test_recurring_requires_cron() {
        let errs = ScheduleJobAdapter.validate(
            &job(json!({"name": "j", "schedule_job_type": "recurring"})),
        );
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].attribute.as_deref(), Some("cron"));

        let ok = ScheduleJobAdapter.validate(&job(json!({
            "name": "j", "schedule_job_type": "Recurring", "cron": "0 3 * * *"
        })));
        assert!(ok.is_empty());
    }

    #[test]
    fn test_unknown_schedule_at_is_not_missing() {
        let errs = ScheduleJobAdapter.validate(&job(json!({
            "name": "j", "schedule_job_type": "OneShot", "schedule_at": {"$unknown": true}
        })));
        assert!(errs.is_empty());
    }

    #[test]
    fn test_timestamps_must_be_rfc3339() {
        let errs = ScheduleJobAdapter.validate(&job(json!({
            "name": "j", "schedule_job_type": "OneShot", "schedule_at": "tomorrow"
        })));
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].attribute.as_deref(), Some("schedule_at"));

        let ok = ScheduleJobAdapter.validate(&job(json!({
            "name": "j", "schedule_job_type": "OneShot", "schedule_at": "2026-11-01T03:00:00Z"
        })));
        assert!(ok.is_empty());
    }

    #[test]
    fn test_steps_wire_shape() {
        let plan = job(json!({
            "name": "j",
            "steps": [{"resource_uri_ref": "/projects/P1/providers/Aruba.Compute/cloudServers/S1",
                       "action_uri": "/poweroff", "http_verb": "post"}]
        }));
        assert_eq!(
            serde_json::to_value(steps(&plan)).unwrap(),
            json!([{"resourceUri": "/projects/P1/providers/Aruba.Compute/cloudServers/S1",
                    "actionUri": "/poweroff", "httpVerb": "POST"}])
        );
    }
}
