mod common;

use std::sync::Arc;

use twin_gateway_core::{ResourcePath, TwinGateway};
use twin_gateway_error::TGError;
use twin_gateway_models::{
    DataType, ResourceKind, Settings, SnapshotFilter, TwinValue, UpdatePushError, UpdateRequest,
};

#[tokio::test]
async fn descriptors_reflect_the_twin_shape() {
    common::init();
    let gw = TwinGateway::start(Settings::default());
    gw.push_updates(vec![
        UpdateRequest::new("p1", "weather", "temp", 21.5f64).with_declared_type(DataType::Float64),
        UpdateRequest::new("p1", "weather", "humidity", 40i32),
        UpdateRequest::new("p1", "admin", "location", "berlin"),
    ])
    .await
    .unwrap();

    let provider = gw.describe_provider("default", "p1").await.unwrap();
    assert_eq!(provider.id, "p1");
    let service_names: Vec<&str> = provider.services.iter().map(|s| s.name.as_str()).collect();
    // Creation order is preserved.
    assert_eq!(service_names, vec!["weather", "admin"]);

    let weather = gw.describe_service("default", "p1", "weather").await.unwrap();
    assert_eq!(weather.resources.len(), 2);
    assert_eq!(weather.resources[0].name, "temp");
    assert_eq!(weather.resources[0].declared_type, Some(DataType::Float64));
    assert_eq!(weather.resources[0].kind, ResourceKind::Data);

    let resource = gw
        .describe_resource(ResourcePath::new("default", "p1", "weather", "humidity"))
        .await
        .unwrap();
    assert_eq!(resource.value.value, Some(TwinValue::Int32(40)));
    gw.stop().await.unwrap();
}

#[tokio::test]
async fn snapshot_filters_by_model_and_prefix() {
    common::init();
    let gw = TwinGateway::start(Settings::default());
    gw.push_updates(vec![
        UpdateRequest::new("sensor-1", "svc", "r", 1i64).with_model("sensors"),
        UpdateRequest::new("sensor-2", "svc", "r", 2i64).with_model("sensors"),
        UpdateRequest::new("gateway-1", "svc", "r", 3i64).with_model("infra"),
    ])
    .await
    .unwrap();

    let all = gw.filtered_snapshot(SnapshotFilter::All).await.unwrap();
    assert_eq!(all.len(), 3);

    let sensors = gw
        .filtered_snapshot(SnapshotFilter::Model("sensors".into()))
        .await
        .unwrap();
    assert_eq!(sensors.len(), 2);

    let by_prefix = gw
        .filtered_snapshot(SnapshotFilter::ProviderPrefix("sensor-".into()))
        .await
        .unwrap();
    assert_eq!(by_prefix.len(), 2);

    let providers = gw.list_providers().await.unwrap();
    assert_eq!(providers.len(), 3);
    gw.stop().await.unwrap();
}

#[tokio::test]
async fn missing_paths_surface_typed_errors() {
    common::init();
    let gw = TwinGateway::start(Settings::default());
    gw.push_update(UpdateRequest::new("p1", "svc", "temp", 1i64))
        .await
        .unwrap();

    assert!(matches!(
        gw.describe_provider("default", "ghost").await,
        Err(TGError::ProviderNotFound(_))
    ));
    assert!(matches!(
        gw.describe_service("default", "p1", "ghost").await,
        Err(TGError::ServiceNotFound { .. })
    ));
    assert!(matches!(
        gw.get_resource_value(ResourcePath::new("default", "p1", "svc", "ghost"))
            .await,
        Err(TGError::ResourceNotFound { .. })
    ));
    gw.stop().await.unwrap();
}

#[tokio::test]
async fn provider_lifecycle_via_admin_calls() {
    common::init();
    let gw = TwinGateway::start(Settings::default());

    assert!(gw.create_provider("default", "p1").await.unwrap());
    assert!(!gw.create_provider("default", "p1").await.unwrap());

    gw.push_update(UpdateRequest::new("p1", "svc", "temp", 1i64))
        .await
        .unwrap();
    assert!(gw.delete_provider("default", "p1").await.unwrap());
    assert!(!gw.delete_provider("default", "p1").await.unwrap());
    assert!(gw.describe_provider("default", "p1").await.is_err());
    gw.stop().await.unwrap();
}

#[tokio::test]
async fn actions_require_a_binding_and_a_provider() {
    common::init();
    let gw = TwinGateway::start(Settings::default());

    let unbound = gw
        .invoke_action(ResourcePath::new("default", "p1", "svc", "ring"), vec![])
        .await;
    assert!(matches!(unbound, Err(TGError::ActionNotBound(_))));

    gw.register_action("default", "svc", "ring", Arc::new(|_| Ok(TwinValue::Boolean(true))))
        .await
        .unwrap();
    let no_provider = gw
        .invoke_action(ResourcePath::new("default", "p1", "svc", "ring"), vec![])
        .await;
    assert!(matches!(no_provider, Err(TGError::ProviderNotFound(_))));

    gw.create_provider("default", "p1").await.unwrap();
    let result = gw
        .invoke_action(ResourcePath::new("default", "p1", "svc", "ring"), vec![])
        .await
        .unwrap();
    assert_eq!(result, TwinValue::Boolean(true));

    // The invocation materialized the action resource on the provider.
    let resource = gw
        .describe_resource(ResourcePath::new("default", "p1", "svc", "ring"))
        .await
        .unwrap();
    assert_eq!(resource.kind, ResourceKind::Action);
    gw.stop().await.unwrap();
}

#[tokio::test]
async fn metadata_is_set_and_read_back() {
    common::init();
    let gw = TwinGateway::start(Settings::default());
    gw.push_update(UpdateRequest::new("p1", "svc", "temp", 1i64))
        .await
        .unwrap();

    let path = ResourcePath::new("default", "p1", "svc", "temp");
    gw.set_resource_metadata(path.clone(), "unit", TwinValue::string("celsius"))
        .await
        .unwrap();

    let resource = gw.describe_resource(path.clone()).await.unwrap();
    assert_eq!(
        resource.metadata.get("unit"),
        Some(&TwinValue::string("celsius"))
    );

    // Metadata survives later value updates.
    gw.push_update(UpdateRequest::new("p1", "svc", "temp", 2i64))
        .await
        .unwrap();
    let resource = gw.describe_resource(path).await.unwrap();
    assert_eq!(
        resource.metadata.get("unit"),
        Some(&TwinValue::string("celsius"))
    );
    gw.stop().await.unwrap();
}

#[tokio::test]
async fn pushes_after_stop_fail_with_a_gateway_error() {
    common::init();
    let gw = TwinGateway::start(Settings::default());
    gw.stop().await.unwrap();

    let err = gw
        .push_update(UpdateRequest::new("p1", "svc", "temp", 1i64))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        UpdatePushError::Gateway(TGError::EngineClosed)
    ));

    let metrics = gw.metrics();
    assert_eq!(metrics.updates_applied, 0);
}
