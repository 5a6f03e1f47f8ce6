//! Property-based tests using proptest
//!
//! These tests verify canonical URI handling, the drift merge, request
//! omission of absent values, and error classification using randomized
//! inputs.

use arubacloud_provider::api::error::ErrorKind;
use arubacloud_provider::api::object::Metadata;
use arubacloud_provider::config::parse_duration;
use arubacloud_provider::lifecycle::drift::{reconcile, set_equal, Inputs};
use arubacloud_provider::lifecycle::uri::ResourceKind;
use arubacloud_provider::lifecycle::value::{is_unknown_json, unknown_json};
use arubacloud_provider::lifecycle::Attr;
use arubacloud_provider::resource::get_handler;
use proptest::prelude::*;
use serde_json::{json, Value};
use std::time::Duration;

/// Generate a short id as the API allocates them
fn arb_id() -> impl Strategy<Value = String> {
    "[A-Za-z0-9][A-Za-z0-9-]{0,11}"
}

fn arb_kind() -> impl Strategy<Value = ResourceKind> {
    prop::sample::select(ResourceKind::ALL.to_vec())
}

/// Generate a tag list without duplicates plus a reordering of it
fn arb_tags_and_shuffle() -> impl Strategy<Value = (Vec<String>, Vec<String>)> {
    prop::collection::hash_set("[a-z]{1,6}:[a-z0-9]{1,6}", 1..8).prop_flat_map(|set| {
        let tags: Vec<String> = set.into_iter().collect();
        (Just(tags.clone()), Just(tags).prop_shuffle())
    })
}

fn arb_attr() -> impl Strategy<Value = Attr<String>> {
    prop_oneof![
        Just(Attr::Null),
        Just(Attr::Unknown),
        "[a-z][a-z0-9-]{0,15}".prop_map(Attr::Known),
    ]
}

/// Generate a JSON value that is null, unknown or a plain string
fn arb_json_slot() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        Just(unknown_json()),
        "[a-z]{1,8}".prop_map(Value::String),
    ]
}

fn project_schema() -> arubacloud_provider::lifecycle::schema::ResourceSchema {
    get_handler("arubacloud_project").unwrap().schema()
}

proptest! {
    /// Canonicalizing a canonical URI returns it unchanged
    #[test]
    fn test_canonicalize_is_idempotent(
        kind in arb_kind(),
        ids in prop::collection::vec(arb_id(), 4),
    ) {
        let count = kind.parent_attributes().len();
        let parents: Vec<&str> = ids[..count].iter().map(String::as_str).collect();
        let id = &ids[count];

        let uri = kind.canonicalize(&parents, id).unwrap();
        prop_assert!(uri.starts_with('/'));
        prop_assert_eq!(kind.canonicalize(&parents, &uri).unwrap(), uri.clone());
        prop_assert_eq!(kind.canonicalize(&[], &uri).unwrap(), uri.clone());
    }

    /// A canonical URI splits back into the ids it was built from
    #[test]
    fn test_canonical_uri_parses_back(
        kind in arb_kind(),
        ids in prop::collection::vec(arb_id(), 4),
    ) {
        let count = kind.parent_attributes().len();
        let parents: Vec<&str> = ids[..count].iter().map(String::as_str).collect();
        let id = &ids[count];

        let uri = kind.canonicalize(&parents, id).unwrap();
        let (parsed_parents, parsed_id) = kind.parse(&uri).unwrap();
        prop_assert_eq!(parsed_parents, ids[..count].to_vec());
        prop_assert_eq!(&parsed_id, id);
    }

    /// A reordered tag list from the API keeps the prior order on Read
    #[test]
    fn test_tag_order_is_absorbed((tags, shuffled) in arb_tags_and_shuffle()) {
        let prior = json!({"id": "P1", "name": "p1", "tags": tags});
        let api = json!({"id": "P1", "name": "p1", "tags": shuffled});
        let state = reconcile(
            &project_schema(),
            Inputs { plan: None, prior: Some(&prior), api: &api },
        );
        prop_assert_eq!(&state["tags"], &prior["tags"]);
        prop_assert!(set_equal(&state["tags"], &api["tags"]));
    }

    /// The same holds against a plan during Update
    #[test]
    fn test_tag_order_follows_plan((tags, shuffled) in arb_tags_and_shuffle()) {
        let plan = json!({"id": "P1", "name": "p1", "tags": tags});
        let api = json!({"id": "P1", "name": "p1", "tags": shuffled});
        let state = reconcile(
            &project_schema(),
            Inputs { plan: Some(&plan), prior: Some(&plan), api: &api },
        );
        prop_assert_eq!(&state["tags"], &plan["tags"]);
    }

    /// Durable state never carries the unknown sentinel
    #[test]
    fn test_reconcile_resolves_unknowns(
        plan_name in arb_json_slot(),
        prior_name in arb_json_slot(),
        api_name in arb_json_slot(),
        plan_desc in arb_json_slot(),
        api_desc in arb_json_slot(),
    ) {
        let plan = json!({"name": plan_name, "description": plan_desc, "id": unknown_json()});
        let prior = json!({"id": "P1", "name": prior_name});
        let api = json!({"id": "P1", "name": api_name, "description": api_desc});
        let state = reconcile(
            &project_schema(),
            Inputs { plan: Some(&plan), prior: Some(&prior), api: &api },
        );
        for (name, value) in state.as_object().unwrap() {
            prop_assert!(!is_unknown_json(value), "{} is unknown", name);
        }
        prop_assert_eq!(&state["id"], &json!("P1"));
    }

    /// Null and unknown values never reach a request body
    #[test]
    fn test_absent_values_are_omitted(name in arb_attr(), location in arb_attr()) {
        let body = serde_json::to_value(Metadata::request(&name, &location, &Attr::Null)).unwrap();
        let map = body.as_object().unwrap();
        prop_assert_eq!(map.contains_key("name"), name.is_known());
        prop_assert_eq!(map.contains_key("location"), location.is_known());
        prop_assert!(!map.contains_key("tags"));
        prop_assert!(map.values().all(|v| !v.is_null() && !is_unknown_json(v)));
    }

    /// Only transport, conflict and server failures are retried by delete
    #[test]
    fn test_status_classification(status in 400u16..600) {
        let kind = ErrorKind::from_status(status);
        match status {
            401 | 403 => prop_assert_eq!(kind, ErrorKind::Permission),
            404 => prop_assert_eq!(kind, ErrorKind::NotFound),
            409 => prop_assert_eq!(kind, ErrorKind::Conflict),
            429 | 500..=599 => prop_assert_eq!(kind, ErrorKind::Server),
            _ => prop_assert_eq!(kind, ErrorKind::Validation),
        }
        prop_assert_eq!(
            kind.is_delete_retryable(),
            matches!(kind, ErrorKind::Conflict | ErrorKind::Server)
        );
    }

    /// Durations in minutes and hours scale to seconds
    #[test]
    fn test_duration_units(n in 1u64..10_000) {
        prop_assert_eq!(parse_duration(&format!("{}s", n)).unwrap(), Duration::from_secs(n));
        prop_assert_eq!(parse_duration(&format!("{}m", n)).unwrap(), Duration::from_secs(n * 60));
        prop_assert_eq!(parse_duration(&format!("{}h", n)).unwrap(), Duration::from_secs(n * 3600));
    }
}
