//! API integration tests
//!
//! Tests the API endpoints with real HTTP requests against the router.

use serde_json::{json, Value};

use openvox_hostgroups::models::{
    ClassMembership, Hostgroup, HostgroupDetail, HostgroupDraft, HostgroupSummary,
    InheritedAssociation, InheritedField, LookupValue, ParameterFlags, ResolvedParameter, Setting,
};

use crate::common::{ids, HostgroupFactory, HostgroupFixtures, TestApp};

async fn create(app: &TestApp, body: Value) -> Hostgroup {
    let response = app.post_json("/api/v1/hostgroups", body).await;
    response.assert_created();
    response.json()
}

async fn create_common_tree(app: &TestApp) -> (Hostgroup, Hostgroup) {
    let common = create(app, serde_json::to_value(HostgroupFixtures::common()).unwrap()).await;
    let web = create(app, json!({ "name": "Web", "parent_id": common.id })).await;
    (common, web)
}

#[tokio::test]
async fn test_health_endpoint_returns_ok() {
    let app = TestApp::new().await;
    let response = app.get("/api/v1/health").await;

    response.assert_ok();

    let json: Value = response.json();
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn test_detailed_health_endpoint() {
    let app = TestApp::new().await;
    let response = app.get("/api/v1/health/detailed").await;

    response.assert_ok();

    let json: Value = response.json();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["database"]["status"], "healthy");
    assert_eq!(json["tree"]["status"], "healthy");
    assert_eq!(json["tree"]["hostgroups"], 0);
}

#[tokio::test]
async fn test_health_counts_hostgroups() {
    let app = TestApp::new().await;
    create_common_tree(&app).await;

    let json: Value = app.get("/api/v1/health").await.json();
    assert_eq!(json["hostgroups"], 2);

    let json: Value = app.get("/api/v1/health/detailed").await.json();
    assert_eq!(json["tree"]["roots"], 1);
    assert!(json["tree"]["duplicate_titles"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_liveness_and_readiness_probes() {
    let app = TestApp::new().await;
    app.get("/api/v1/health/live").await.assert_ok();
    app.get("/api/v1/health/ready").await.assert_ok();
}

#[tokio::test]
async fn test_create_child_sets_title_and_parent() {
    let app = TestApp::new().await;
    let (common, web) = create_common_tree(&app).await;

    assert_eq!(common.title, "Common");
    assert_eq!(web.title, "Common/Web");
    assert_eq!(web.parent_id, Some(common.id));

    let list: Vec<HostgroupSummary> = app.get("/api/v1/hostgroups").await.json();
    let titles: Vec<&str> = list.iter().map(|h| h.title.as_str()).collect();
    assert_eq!(titles, vec!["Common", "Common/Web"]);
}

#[tokio::test]
async fn test_create_blank_name_is_unprocessable() {
    let app = TestApp::new().await;
    let response = app
        .post_json("/api/v1/hostgroups", json!({ "name": "   " }))
        .await;

    response.assert_unprocessable();
    let body: Value = response.json();
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["details"]["name"][0], "can't be blank");
}

#[tokio::test]
async fn test_duplicate_sibling_name_is_rejected() {
    let app = TestApp::new().await;
    let (common, _) = create_common_tree(&app).await;

    let response = app
        .post_json(
            "/api/v1/hostgroups",
            json!({ "name": "Web", "parent_id": common.id }),
        )
        .await;
    response.assert_unprocessable();
    let body: Value = response.json();
    assert_eq!(body["details"]["name"][0], "has already been taken");

    // Same name below a different parent is fine
    create(&app, json!({ "name": "Web" })).await;
}

#[tokio::test]
async fn test_proxy_without_puppet_feature_is_rejected() {
    let app = TestApp::new().await;
    let response = app
        .post_json(
            "/api/v1/hostgroups",
            json!({
                "name": "Tftp",
                "associations": { "puppet_proxy_id": ids::TFTP_PROXY }
            }),
        )
        .await;

    response.assert_unprocessable();
    let body: Value = response.json();
    assert!(body["details"]["puppet_proxy_id"][0]
        .as_str()
        .unwrap()
        .contains("feature"));
}

#[tokio::test]
async fn test_show_by_token_returns_detail() {
    let app = TestApp::new().await;
    let (common, web) = create_common_tree(&app).await;

    let response = app
        .get(&format!("/api/v1/hostgroups/{}", web.to_param()))
        .await;
    response.assert_ok();

    let detail: HostgroupDetail = response.json();
    assert_eq!(detail.hostgroup.id, web.id);
    assert_eq!(detail.ancestors.len(), 1);
    assert_eq!(detail.ancestors[0].id, common.id);
    assert!(detail.root_pass_resolved);
    assert!(detail.parameters.iter().all(|p| p.inherited));
}

#[tokio::test]
async fn test_root_pass_is_never_serialized() {
    let app = TestApp::new().await;
    let (common, _) = create_common_tree(&app).await;

    let response = app
        .get(&format!("/api/v1/hostgroups/{}", common.id))
        .await;
    assert!(!response.text().contains("common-secret"));
}

#[tokio::test]
async fn test_unknown_hostgroup_is_not_found() {
    let app = TestApp::new().await;
    app.get(&format!("/api/v1/hostgroups/{}", uuid::Uuid::new_v4()))
        .await
        .assert_not_found();
    app.get("/api/v1/hostgroups/not-a-token")
        .await
        .assert_not_found();
}

#[tokio::test]
async fn test_child_parameter_overrides_ancestor() {
    let app = TestApp::new().await;
    let (_, web) = create_common_tree(&app).await;

    app.put_json(
        &format!("/api/v1/hostgroups/{}/parameters/ntp_server", web.id),
        json!({ "value": "ntp.web.example.com" }),
    )
    .await
    .assert_ok();

    let params: Vec<ResolvedParameter> = app
        .get(&format!("/api/v1/hostgroups/{}/parameters", web.id))
        .await
        .json();
    let ntp = params.iter().find(|p| p.name == "ntp_server").unwrap();
    assert_eq!(ntp.value, "ntp.web.example.com");
    assert!(!ntp.inherited);
    assert_eq!(ntp.source_id, web.id);

    let parent: std::collections::BTreeMap<String, String> = app
        .get(&format!("/api/v1/hostgroups/{}/parent_parameters", web.id))
        .await
        .json();
    assert_eq!(parent["ntp_server"], "pool.ntp.org");
}

#[tokio::test]
async fn test_parameter_flags() {
    let app = TestApp::new().await;
    let (_, web) = create_common_tree(&app).await;

    let flags: ParameterFlags = app
        .get(&format!("/api/v1/hostgroups/{}/parameters/monitoring/bool", web.id))
        .await
        .json();
    assert!(flags.truthy);
    assert!(!flags.falsy);

    let missing: ParameterFlags = app
        .get(&format!("/api/v1/hostgroups/{}/parameters/absent/bool", web.id))
        .await
        .json();
    assert!(!missing.truthy);
    assert!(!missing.falsy);
    assert!(missing.value.is_none());
}

#[tokio::test]
async fn test_remove_missing_parameter_is_not_found() {
    let app = TestApp::new().await;
    let (_, web) = create_common_tree(&app).await;

    app.delete(&format!("/api/v1/hostgroups/{}/parameters/absent", web.id))
        .await
        .assert_not_found();
}

#[tokio::test]
async fn test_inherited_associations_report_source() {
    let app = TestApp::new().await;
    let (common, web) = create_common_tree(&app).await;

    let inherited: Vec<InheritedAssociation> = app
        .get(&format!("/api/v1/hostgroups/{}/inherited", web.id))
        .await
        .json();
    let domain = inherited
        .iter()
        .find(|a| a.field == InheritedField::Domain)
        .unwrap();
    assert_eq!(domain.value, Some(ids::EXAMPLE_DOMAIN));
    assert_eq!(domain.name.as_deref(), Some("example.com"));
    assert_eq!(domain.source_id, Some(common.id));
    assert!(domain.inherited);
}

#[tokio::test]
async fn test_class_membership_follows_environment() {
    let app = TestApp::new().await;
    let (_, web) = create_common_tree(&app).await;

    let membership: ClassMembership = app
        .put_json(
            &format!("/api/v1/hostgroups/{}/puppetclasses", web.id),
            json!({ "ids": [ids::VIM] }),
        )
        .await
        .json();

    assert_eq!(membership.environment_id, Some(ids::PRODUCTION));
    let parent: Vec<_> = membership.parent_classes.iter().map(|c| c.id).collect();
    assert!(parent.contains(&ids::BASE));
    let all: Vec<_> = membership.all_classes.iter().map(|c| c.id).collect();
    assert!(all.contains(&ids::VIM));
    assert!(all.contains(&ids::BASE));
    assert!(!all.contains(&ids::GIT));
}

#[tokio::test]
async fn test_unknown_class_is_rejected() {
    let app = TestApp::new().await;
    let (_, web) = create_common_tree(&app).await;

    app.put_json(
        &format!("/api/v1/hostgroups/{}/puppetclasses", web.id),
        json!({ "ids": [uuid::Uuid::new_v4()] }),
    )
    .await
    .assert_unprocessable();
}

#[tokio::test]
async fn test_search_by_config_group() {
    let app = TestApp::new().await;
    let factory = HostgroupFactory::new();
    create_common_tree(&app).await;
    create(
        &app,
        factory
            .create()
            .with_name("Editors")
            .with_config_groups(&[ids::EDITORS])
            .to_json(),
    )
    .await;

    let found: Vec<HostgroupSummary> = app
        .get("/api/v1/hostgroups?search=config_group%20%3D%20monitoring")
        .await
        .json();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].title, "Common");

    let shorthand: Vec<HostgroupSummary> = app
        .get("/api/v1/hostgroups?config_group=editors")
        .await
        .json();
    assert_eq!(shorthand[0].name, "Editors");

    app.get("/api/v1/hostgroups?search=name%20%3D%20x")
        .await
        .assert_unprocessable();
}

#[tokio::test]
async fn test_rename_cascades_titles_and_lookup_values() {
    let app = TestApp::new().await;
    let (common, web) = create_common_tree(&app).await;

    let renamed: Hostgroup = app
        .put_json(
            &format!("/api/v1/hostgroups/{}", common.id),
            json!({ "name": "Base" }),
        )
        .await
        .json();
    assert_eq!(renamed.title, "Base");

    let detail: HostgroupDetail = app
        .get(&format!("/api/v1/hostgroups/{}", web.id))
        .await
        .json();
    assert_eq!(detail.hostgroup.title, "Base/Web");

    let values: Vec<LookupValue> = app
        .get(&format!("/api/v1/hostgroups/{}/lookup_values", web.id))
        .await
        .json();
    assert_eq!(values.len(), 1);
    assert_eq!(values[0].matcher, "hostgroup=Base/Web");
}

#[tokio::test]
async fn test_reparent_into_descendant_conflicts() {
    let app = TestApp::new().await;
    let (common, web) = create_common_tree(&app).await;

    app.put_json(
        &format!("/api/v1/hostgroups/{}", common.id),
        json!({ "parent_id": web.id }),
    )
    .await
    .assert_conflict();
}

#[tokio::test]
async fn test_move_to_root_with_explicit_null() {
    let app = TestApp::new().await;
    let (_, web) = create_common_tree(&app).await;

    let moved: Hostgroup = app
        .put_json(
            &format!("/api/v1/hostgroups/{}", web.id),
            json!({ "parent_id": null }),
        )
        .await
        .json();
    assert!(moved.parent_id.is_none());
    assert_eq!(moved.title, "Web");
}

#[tokio::test]
async fn test_delete_with_children_conflicts() {
    let app = TestApp::new().await;
    let (common, web) = create_common_tree(&app).await;

    app.delete(&format!("/api/v1/hostgroups/{}", common.id))
        .await
        .assert_conflict();

    app.delete(&format!("/api/v1/hostgroups/{}", web.id))
        .await
        .assert_status(axum::http::StatusCode::NO_CONTENT);
    app.delete(&format!("/api/v1/hostgroups/{}", common.id))
        .await
        .assert_status(axum::http::StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_clone_preview_and_persist() {
    let app = TestApp::new().await;
    let (common, _) = create_common_tree(&app).await;

    let preview: HostgroupDraft = app
        .get(&format!("/api/v1/hostgroups/{}/clone?name=Copy", common.id))
        .await
        .json();
    assert_ne!(preview.hostgroup.id, common.id);
    assert_eq!(preview.hostgroup.parameters.len(), 2);
    assert_eq!(preview.lookup_values[0].matcher, "hostgroup=Copy");
    assert_eq!(app.service().list().await.len(), 2);

    let response = app
        .post_json(
            &format!("/api/v1/hostgroups/{}/clone", common.id),
            json!({ "name": "Copy" }),
        )
        .await;
    response.assert_created();
    let copy: Hostgroup = response.json();
    assert_eq!(copy.title, "Copy");
    assert_eq!(copy.associations, common.associations);
    assert_eq!(copy.hosts_count, 0);
    assert!(app.get(&format!("/api/v1/hostgroups/{}/children", copy.id))
        .await
        .json::<Vec<HostgroupSummary>>()
        .is_empty());
}

#[tokio::test]
async fn test_clone_without_name_is_unprocessable() {
    let app = TestApp::new().await;
    let (common, _) = create_common_tree(&app).await;

    app.post_json(&format!("/api/v1/hostgroups/{}/clone", common.id), json!({}))
        .await
        .assert_unprocessable();
}

#[tokio::test]
async fn test_host_assignment_updates_counts() {
    let app = TestApp::new().await;
    let (common, web) = create_common_tree(&app).await;

    let hosts_uri = format!("/api/v1/hostgroups/{}/hosts", web.id);
    app.post_json(&hosts_uri, json!({})).await.assert_ok();
    app.post_json(&hosts_uri, json!({})).await.assert_ok();

    let list: Vec<HostgroupSummary> = app.get("/api/v1/hostgroups").await.json();
    let top = list.iter().find(|h| h.id == common.id).unwrap();
    assert_eq!(top.hosts_count, 0);
    assert_eq!(top.children_hosts_count, 2);

    app.delete(&hosts_uri).await.assert_ok();
    app.delete(&hosts_uri).await.assert_ok();
    app.delete(&hosts_uri).await.assert_unprocessable();
}

#[tokio::test]
async fn test_settings_update_changes_root_pass_fallback() {
    let app = TestApp::new().await;
    let top = create(&app, json!({ "name": "Bare" })).await;

    let settings: Vec<Setting> = app.get("/api/v1/settings").await.json();
    assert!(settings.iter().any(|s| s.key == "root_pass"));

    app.put_json("/api/v1/settings/root_pass", json!({ "value": "" }))
        .await
        .assert_ok();
    let detail: HostgroupDetail = app
        .get(&format!("/api/v1/hostgroups/{}", top.id))
        .await
        .json();
    assert!(!detail.root_pass_resolved);
}

#[tokio::test]
async fn test_read_only_actor_cannot_mutate() {
    let app = TestApp::read_only().await;

    app.post_json("/api/v1/hostgroups", json!({ "name": "Nope" }))
        .await
        .assert_forbidden();
    app.get("/api/v1/hostgroups").await.assert_ok();
}
