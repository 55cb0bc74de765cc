//! Service integration tests
//!
//! Drive [`HostgroupService`] directly against an in-memory database and
//! check that the stored state survives a reload.

use openvox_hostgroups::{
    db,
    models::{MutationContext, UpdateHostgroupRequest},
    utils::HostgroupError,
    HostgroupService,
};

use crate::common::{ids, test_inventory, HostgroupFactory, HostgroupFixtures, TestApp};

/// Load a second service over the same pool, as a restart would
async fn reload(app: &TestApp) -> HostgroupService {
    let inventory = test_inventory();
    HostgroupService::load(
        app.state.db.clone(),
        inventory.to_registry().unwrap(),
        &inventory.lookup_values(),
        &app.state.config.settings,
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn test_reload_restores_tree_and_parameters() {
    let app = TestApp::new().await;
    let ctx = app.admin();
    let svc = app.service();
    let common = svc.create(&ctx, HostgroupFixtures::common()).await.unwrap();
    let web = svc
        .create(&ctx, HostgroupFixtures::child("Web", common.id))
        .await
        .unwrap();
    svc.set_parameter(&ctx, web.id, "role", "frontend").await.unwrap();
    svc.assign_host(&ctx, web.id).await.unwrap();

    let reloaded = reload(&app).await;
    let restored = reloaded.get(web.id).await.unwrap();
    assert_eq!(restored.title, "Common/Web");
    assert_eq!(
        restored.parameter("role").map(|p| p.value.as_str()),
        Some("frontend")
    );
    assert_eq!(restored.hosts_count, 1);

    let effective = reloaded.effective_parameters(web.id).await.unwrap();
    let names: Vec<&str> = effective.iter().map(|p| p.name.as_str()).collect();
    assert!(names.contains(&"ntp_server"));
    assert!(names.contains(&"role"));
    assert_eq!(
        reloaded.root_pass(web.id).await.unwrap().as_deref(),
        Some("common-secret")
    );
}

#[tokio::test]
async fn test_reload_keeps_renamed_titles_and_matchers() {
    let app = TestApp::new().await;
    let ctx = app.admin();
    let svc = app.service();
    let common = svc.create(&ctx, HostgroupFixtures::common()).await.unwrap();
    let web = svc
        .create(&ctx, HostgroupFixtures::child("Web", common.id))
        .await
        .unwrap();

    let req = UpdateHostgroupRequest {
        name: Some("Shared".to_string()),
        ..Default::default()
    };
    svc.update(&ctx, common.id, req).await.unwrap();

    let reloaded = reload(&app).await;
    assert_eq!(reloaded.get(web.id).await.unwrap().title, "Shared/Web");
    let values = reloaded.lookup_values(common.id).await.unwrap();
    assert_eq!(values.len(), 1);
    assert_eq!(values[0].matcher, "hostgroup=Shared");
}

#[tokio::test]
async fn test_failed_validation_leaves_state_untouched() {
    let app = TestApp::new().await;
    let ctx = app.admin();
    let svc = app.service();
    let common = svc.create(&ctx, HostgroupFixtures::common()).await.unwrap();

    let req = UpdateHostgroupRequest {
        name: Some(String::new()),
        ..Default::default()
    };
    let err = svc.update(&ctx, common.id, req).await.unwrap_err();
    let errors = err.field_errors().unwrap();
    assert_eq!(errors.first("name"), Some("can't be blank"));

    assert_eq!(svc.get(common.id).await.unwrap().name, "Common");
    assert_eq!(reload(&app).await.get(common.id).await.unwrap().name, "Common");
}

#[tokio::test]
async fn test_name_matching_a_nested_title_is_rejected() {
    let app = TestApp::new().await;
    let ctx = app.admin();
    let svc = app.service();
    let factory = HostgroupFactory::new();
    let common = svc.create(&ctx, HostgroupFixtures::common()).await.unwrap();
    let web = svc
        .create(&ctx, HostgroupFixtures::child("Web", common.id))
        .await
        .unwrap();
    assert_eq!(svc.lookup_values(web.id).await.unwrap().len(), 1);

    let err = svc
        .create(&ctx, factory.create().with_name("Common/Web").build())
        .await
        .unwrap_err();
    assert_eq!(err.field_errors().unwrap().first("name"), Some("can't contain /"));

    let other = svc
        .create(&ctx, factory.create().with_name("Other").build())
        .await
        .unwrap();
    let req = UpdateHostgroupRequest {
        name: Some("Common/Web".to_string()),
        ..Default::default()
    };
    let err = svc.update(&ctx, other.id, req).await.unwrap_err();
    assert_eq!(err.field_errors().unwrap().first("name"), Some("can't contain /"));

    tokio_test::assert_ok!(svc.delete(&ctx, other.id).await);
    let values = svc.lookup_values(web.id).await.unwrap();
    assert_eq!(values.len(), 1);
    assert_eq!(values[0].matcher, "hostgroup=Common/Web");
}

#[tokio::test]
async fn test_classes_resolve_in_child_environment() {
    let app = TestApp::new().await;
    let ctx = app.admin();
    let svc = app.service();
    let factory = HostgroupFactory::new();
    let common = svc.create(&ctx, HostgroupFixtures::common()).await.unwrap();
    let lab = svc
        .create(
            &ctx,
            factory
                .create()
                .with_name("Lab")
                .with_parent(common.id)
                .with_environment(ids::TESTING)
                .with_puppetclasses(&[ids::GIT])
                .build(),
        )
        .await
        .unwrap();

    let membership = svc.membership(lab.id).await.unwrap();
    assert_eq!(membership.environment_id, Some(ids::TESTING));

    let all: Vec<_> = membership.all_classes.iter().map(|c| c.id).collect();
    assert!(all.contains(&ids::GIT));
    assert!(all.contains(&ids::BASE));
    assert!(all.contains(&ids::NAGIOS));
    // chkmk is only available in production
    assert!(!all.contains(&ids::CHKMK));

    // base and nagios already come from Common
    let available: Vec<_> = membership.available_classes.iter().map(|c| c.id).collect();
    assert_eq!(available, vec![ids::GIT]);
}

#[tokio::test]
async fn test_viewer_context_is_refused_everywhere() {
    let app = TestApp::new().await;
    let admin = app.admin();
    let viewer = MutationContext::viewer("auditor");
    let svc = app.service();
    let common = svc.create(&admin, HostgroupFixtures::common()).await.unwrap();

    assert!(matches!(
        svc.set_parameter(&viewer, common.id, "x", "1").await,
        Err(HostgroupError::Forbidden(_))
    ));
    assert!(matches!(
        svc.delete(&viewer, common.id).await,
        Err(HostgroupError::Forbidden(_))
    ));
    assert!(matches!(
        svc.clone_hostgroup(&viewer, common.id, Some("Copy")).await,
        Err(HostgroupError::Forbidden(_))
    ));
    assert!(matches!(
        svc.update_setting(&viewer, "root_pass", "x", None).await,
        Err(HostgroupError::Forbidden(_))
    ));
    tokio_test::assert_err!(svc.release_host(&viewer, common.id).await);
}

#[tokio::test]
async fn test_persisting_the_same_draft_twice_is_rejected() {
    let app = TestApp::new().await;
    let ctx = app.admin();
    let svc = app.service();
    let common = svc.create(&ctx, HostgroupFixtures::common()).await.unwrap();

    let draft = svc.build_clone(common.id, Some("Copy")).await.unwrap();
    svc.persist(&ctx, draft.clone()).await.unwrap();
    let err = svc.persist(&ctx, draft).await.unwrap_err();
    assert_eq!(err.field_errors().unwrap().first("id"), Some("has already been taken"));
}

#[tokio::test]
async fn test_reload_reports_looping_parent_rows() {
    let app = TestApp::new().await;
    let ctx = app.admin();
    let svc = app.service();
    let common = svc.create(&ctx, HostgroupFixtures::common()).await.unwrap();
    let web = svc
        .create(&ctx, HostgroupFixtures::child("Web", common.id))
        .await
        .unwrap();
    assert!(svc.integrity().await.is_consistent());

    sqlx::query("UPDATE hostgroups SET parent_id = ? WHERE id = ?")
        .bind(web.id.to_string())
        .bind(common.id.to_string())
        .execute(&app.state.db)
        .await
        .unwrap();

    let reloaded = reload(&app).await;
    let integrity = reloaded.integrity().await;
    assert_eq!(integrity.hostgroups, 2);
    assert_eq!(integrity.roots, 0);
    assert_eq!(integrity.unreachable.len(), 2);
    assert!(!integrity.is_consistent());
    assert_eq!(reloaded.count().await, 2);
}

#[tokio::test]
async fn test_pool_health() {
    let app = TestApp::new().await;
    tokio_test::assert_ok!(db::check_health(&app.state.db).await);
}
