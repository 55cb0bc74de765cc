//! Parameter and root password step definitions

use cucumber::{given, then};

use openvox_hostgroups::models::UpdateHostgroupRequest;

use crate::features::support::TestWorld;

#[given(expr = "{string} has parameter {string} set to {string}")]
async fn has_parameter(world: &mut TestWorld, name: String, param: String, value: String) {
    world
        .service()
        .set_parameter(&world.ctx(), world.id(&name), &param, &value)
        .await
        .expect("Failed to set parameter");
}

#[given(expr = "{string} has root password {string}")]
async fn has_root_pass(world: &mut TestWorld, name: String, root_pass: String) {
    let req = UpdateHostgroupRequest {
        root_pass: Some(Some(root_pass)),
        ..Default::default()
    };
    world
        .service()
        .update(&world.ctx(), world.id(&name), req)
        .await
        .expect("Failed to set root password");
}

#[then(expr = "the effective parameter {string} of {string} should be {string}")]
async fn effective_parameter(world: &mut TestWorld, param: String, name: String, value: String) {
    let params = world
        .service()
        .effective_parameters(world.id(&name))
        .await
        .expect("Failed to resolve parameters");
    let found = params
        .iter()
        .find(|p| p.name == param)
        .unwrap_or_else(|| panic!("Parameter '{}' not resolved", param));
    assert_eq!(found.value, value);
}

#[then(expr = "the parameter {string} of {string} should be inherited from {string}")]
async fn inherited_from(world: &mut TestWorld, param: String, name: String, source: String) {
    let params = world
        .service()
        .effective_parameters(world.id(&name))
        .await
        .expect("Failed to resolve parameters");
    let found = params
        .iter()
        .find(|p| p.name == param)
        .unwrap_or_else(|| panic!("Parameter '{}' not resolved", param));
    assert!(found.inherited);
    assert_eq!(found.source_id, world.id(&source));
}

#[then(expr = "{string} should have parameter {string} with value {string}")]
async fn own_parameter(world: &mut TestWorld, name: String, param: String, value: String) {
    let hostgroup = world.hostgroup(&name).await;
    assert_eq!(
        hostgroup.parameter(&param).map(|p| p.value.as_str()),
        Some(value.as_str())
    );
}

#[then(expr = "the parameter {string} of {string} should be {word}")]
async fn parameter_truthiness(world: &mut TestWorld, param: String, name: String, expected: String) {
    let flags = world
        .service()
        .parameter_flags(world.id(&name), &param)
        .await
        .expect("Failed to classify parameter");
    match expected.as_str() {
        "true" => assert!(flags.truthy && !flags.falsy),
        "false" => assert!(flags.falsy && !flags.truthy),
        "neither" => assert!(!flags.truthy && !flags.falsy),
        other => panic!("Unknown truthiness '{}'", other),
    }
}

#[then(expr = "the root password of {string} should be {string}")]
async fn root_pass_should_be(world: &mut TestWorld, name: String, expected: String) {
    let root_pass = world
        .service()
        .root_pass(world.id(&name))
        .await
        .expect("Failed to resolve root password");
    assert_eq!(root_pass.as_deref(), Some(expected.as_str()));
}
