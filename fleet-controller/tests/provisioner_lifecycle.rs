use fleet_controller::provisioner::{CloudStatus, LaunchSpec, MockProvisioner, ProvisionerAdapter};
use uuid::Uuid;

#[tokio::test]
async fn launch_terminate_round_trips_through_mock_provisioner() {
    let provisioner = MockProvisioner::new();
    let spec = LaunchSpec { instance_type: "a10g.xlarge".into(), gpu_type: "a10g".into(), spot: true, region: "us-west-2".into(), model_id: Uuid::new_v4() };

    let launched = provisioner.launch(spec).await.unwrap();
    provisioner.set_status(&launched.cluster_handle, CloudStatus::Pending);
    assert!(!provisioner.status(&launched.cluster_handle).await.unwrap().is_healthy());

    provisioner.set_status(&launched.cluster_handle, CloudStatus::Up);
    assert!(provisioner.status(&launched.cluster_handle).await.unwrap().is_healthy());

    provisioner.terminate(&launched.cluster_handle).await.unwrap();
    assert_eq!(provisioner.status(&launched.cluster_handle).await.unwrap(), CloudStatus::Stopped);
}

#[tokio::test]
async fn status_of_unknown_cluster_handle_errors() {
    let provisioner = MockProvisioner::new();
    assert!(provisioner.status("never-launched").await.is_err());
}
