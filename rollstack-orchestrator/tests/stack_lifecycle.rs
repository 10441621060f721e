//! Stack lifecycle scenarios against the in-memory store

mod common;

use common::{FlakyDeployments, Harness, Script, candidate_request, deploy_request, wait_for};
use rollstack_core::domain::deployment::{DeploymentStatus, DeploymentStep};
use rollstack_core::domain::integration::{IntegrationStatus, IntegrationType};
use rollstack_core::domain::stack::StackStatus;
use rollstack_core::dto::log::LogQuery;
use rollstack_core::dto::stack::UpdateNetworkRequest;
use rollstack_orchestrator::repository::IntegrationFilter;
use rollstack_orchestrator::service::{ServiceError, query, stack};
use uuid::Uuid;

async fn wait_for_status(harness: &Harness, id: Uuid, status: StackStatus) {
    wait_for(&format!("stack {id} to be {status}"), || async move {
        harness.stack(id).await.status == status
    })
    .await;
}

#[tokio::test]
async fn test_create_stack_persists_pending_plan() {
    let harness = &Harness::idle();

    let accepted = stack::create_stack(&harness.ctx, deploy_request())
        .await
        .unwrap();

    let created = harness.stack(accepted.id).await;
    assert_eq!(created.status, StackStatus::Pending);
    assert!(created.deployment_path.contains("testnet"));

    let deployments = query::list_deployments(&harness.ctx, accepted.id)
        .await
        .unwrap();
    let steps: Vec<_> = deployments.iter().map(|d| d.step).collect();
    assert_eq!(
        steps,
        vec![DeploymentStep::DeployL1Contracts, DeploymentStep::DeployAwsInfra]
    );
    assert!(deployments.iter().all(|d| d.status == DeploymentStatus::Pending));

    let integrations = query::list_integrations(&harness.ctx, accepted.id)
        .await
        .unwrap();
    assert_eq!(integrations.len(), 1);
    assert_eq!(integrations[0].integration_type, IntegrationType::Bridge);
    assert_eq!(integrations[0].status, IntegrationStatus::Pending);

    assert!(
        harness
            .scheduler
            .is_tracked(&stack::deploy_task_id(accepted.id))
    );
}

#[tokio::test]
async fn test_create_stack_rejects_invalid_request() {
    let harness = &Harness::idle();

    let mut req = deploy_request();
    req.chain_name = "bad_chain!".to_string();
    let err = stack::create_stack(&harness.ctx, req).await.unwrap_err();
    assert!(matches!(err, ServiceError::BadRequest(_)));

    let mut req = deploy_request();
    req.register_candidate = true;
    let err = stack::create_stack(&harness.ctx, req).await.unwrap_err();
    assert_eq!(err.to_string(), "registerCandidateParams is required");

    assert!(query::list_stacks(&harness.ctx).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_deploy_completes_and_publishes_chain() {
    let harness = &Harness::new();

    let mut req = deploy_request();
    req.register_candidate = true;
    req.register_candidate_params = Some(candidate_request());
    let id = stack::create_stack(&harness.ctx, req).await.unwrap().id;

    wait_for_status(&harness, id, StackStatus::Deployed).await;
    wait_for("bridge to complete", || async move {
        harness
            .ctx
            .repos
            .integrations
            .get_active(id, IntegrationType::Bridge)
            .await
            .unwrap()
            .is_some_and(|b| b.status == IntegrationStatus::Completed)
    })
    .await;

    let deployed = harness.stack(id).await;
    let metadata = deployed.metadata.unwrap();
    assert_eq!(metadata.bridge_url.as_deref(), Some(common::BRIDGE_URL));
    assert_eq!(metadata.layer2.as_deref(), Some("Thanos Stack"));

    let deployments = query::list_deployments(&harness.ctx, id).await.unwrap();
    assert!(deployments.iter().all(|d| d.status == DeploymentStatus::Success));

    wait_for("candidate to complete", || async move {
        harness
            .ctx
            .repos
            .integrations
            .get_active(id, IntegrationType::RegisterCandidate)
            .await
            .unwrap()
            .is_some_and(|c| c.status == IntegrationStatus::Completed)
    })
    .await;

    let calls = harness.driver.calls();
    assert_eq!(calls[0], "deploy-l1-contracts");
    assert_eq!(calls[1], "deploy-aws-infra");

    // Secrets never leave the service
    let shown = query::get_stack(&harness.ctx, id).await.unwrap();
    assert_eq!(shown.config["adminAccount"], "********");
}

#[tokio::test]
async fn test_deploy_failure_marks_stack_failed() {
    let harness = &Harness::new();
    harness
        .driver
        .script("deploy-aws-infra", Script::Fail("quota exceeded".to_string()));

    let id = stack::create_stack(&harness.ctx, deploy_request())
        .await
        .unwrap()
        .id;
    wait_for_status(&harness, id, StackStatus::FailedToDeploy).await;

    let failed = harness.stack(id).await;
    assert!(failed.reason.unwrap().contains("quota exceeded"));

    let deployments = query::list_deployments(&harness.ctx, id).await.unwrap();
    let status_of = |step| {
        deployments
            .iter()
            .find(|d| d.step == step)
            .map(|d| d.status)
            .unwrap()
    };
    assert_eq!(status_of(DeploymentStep::DeployL1Contracts), DeploymentStatus::Success);
    assert_eq!(status_of(DeploymentStep::DeployAwsInfra), DeploymentStatus::Failed);

    let status = query::get_stack_status(&harness.ctx, id).await.unwrap();
    assert_eq!(status.status, StackStatus::FailedToDeploy);
}

#[tokio::test]
async fn test_resume_skips_finished_contracts() {
    let harness = &Harness::new();
    harness
        .driver
        .script("deploy-aws-infra", Script::Fail("throttled".to_string()));

    let id = stack::create_stack(&harness.ctx, deploy_request())
        .await
        .unwrap()
        .id;
    wait_for_status(&harness, id, StackStatus::FailedToDeploy).await;

    harness.driver.clear("deploy-aws-infra");
    stack::resume_stack(&harness.ctx, id).await.unwrap();
    wait_for_status(&harness, id, StackStatus::Deployed).await;

    assert_eq!(harness.driver.call_count("deploy-l1-contracts"), 1);
    assert_eq!(harness.driver.call_count("deploy-aws-infra"), 2);

    let deployments = query::list_deployments(&harness.ctx, id).await.unwrap();
    let contracts = deployments
        .iter()
        .filter(|d| d.step == DeploymentStep::DeployL1Contracts)
        .count();
    assert_eq!(contracts, 1);
}

#[tokio::test]
async fn test_stop_and_resume_running_deployment() {
    let harness = &Harness::new();
    harness.driver.script("deploy-l1-contracts", Script::Block);

    let id = stack::create_stack(&harness.ctx, deploy_request())
        .await
        .unwrap()
        .id;
    wait_for("contracts step to start", || async move {
        harness.driver.call_count("deploy-l1-contracts") == 1
    })
    .await;

    stack::stop_stack(&harness.ctx, id).await.unwrap();
    wait_for_status(&harness, id, StackStatus::Stopped).await;
    wait_for("deployments to stop", || async move {
        query::list_deployments(&harness.ctx, id)
            .await
            .unwrap()
            .iter()
            .all(|d| d.status == DeploymentStatus::Stopped)
    })
    .await;

    // Stopping twice is rejected
    let err = stack::stop_stack(&harness.ctx, id).await.unwrap_err();
    assert!(matches!(err, ServiceError::BadRequest(_)));

    harness.driver.clear("deploy-l1-contracts");
    stack::resume_stack(&harness.ctx, id).await.unwrap();
    wait_for_status(&harness, id, StackStatus::Deployed).await;
    assert_eq!(harness.driver.call_count("deploy-l1-contracts"), 2);
}

#[tokio::test]
async fn test_lifecycle_guards() {
    let harness = &Harness::idle();
    let id = stack::create_stack(&harness.ctx, deploy_request())
        .await
        .unwrap()
        .id;

    // Pending stacks can be neither resumed nor updated
    assert!(stack::resume_stack(&harness.ctx, id).await.is_err());
    let update = UpdateNetworkRequest {
        l1_rpc_url: "https://rpc.example".to_string(),
        l1_beacon_url: "https://beacon.example".to_string(),
    };
    assert!(stack::update_network(&harness.ctx, id, update).await.is_err());

    let missing = stack::stop_stack(&harness.ctx, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(missing, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn test_update_network_rewrites_endpoints() {
    let harness = &Harness::new();
    let id = stack::create_stack(&harness.ctx, deploy_request())
        .await
        .unwrap()
        .id;
    wait_for_status(&harness, id, StackStatus::Deployed).await;

    let update = UpdateNetworkRequest {
        l1_rpc_url: "https://rpc.new.example".to_string(),
        l1_beacon_url: "https://beacon.new.example".to_string(),
    };
    stack::update_network(&harness.ctx, id, update).await.unwrap();

    wait_for("config to change", || async move {
        harness.stack(id).await.config["l1RpcUrl"] == "https://rpc.new.example"
    })
    .await;
    wait_for_status(&harness, id, StackStatus::Deployed).await;
    assert_eq!(
        harness.stack(id).await.config["l1BeaconUrl"],
        "https://beacon.new.example"
    );
}

#[tokio::test]
async fn test_update_network_failure() {
    let harness = &Harness::new();
    let id = stack::create_stack(&harness.ctx, deploy_request())
        .await
        .unwrap()
        .id;
    wait_for_status(&harness, id, StackStatus::Deployed).await;

    harness
        .driver
        .script("update-network", Script::Fail("rpc unreachable".to_string()));
    let update = UpdateNetworkRequest {
        l1_rpc_url: "https://rpc.new.example".to_string(),
        l1_beacon_url: "https://beacon.new.example".to_string(),
    };
    stack::update_network(&harness.ctx, id, update).await.unwrap();
    wait_for_status(&harness, id, StackStatus::FailedToUpdate).await;

    let failed = harness.stack(id).await;
    assert!(failed.reason.unwrap().contains("rpc unreachable"));
    assert_eq!(failed.config["l1RpcUrl"], "https://sepolia.example/rpc");
}

#[tokio::test]
async fn test_terminate_tears_down_addons() {
    let harness = &Harness::new();
    let id = stack::create_stack(&harness.ctx, deploy_request())
        .await
        .unwrap()
        .id;
    wait_for_status(&harness, id, StackStatus::Deployed).await;

    stack::terminate_stack(&harness.ctx, id).await.unwrap();
    wait_for_status(&harness, id, StackStatus::Terminated).await;

    let remaining = harness
        .ctx
        .repos
        .integrations
        .list_by_stack(id, &IntegrationFilter::new())
        .await
        .unwrap();
    assert!(
        remaining
            .iter()
            .all(|i| i.status == IntegrationStatus::Terminated)
    );

    let deployments = query::list_deployments(&harness.ctx, id).await.unwrap();
    let destroy = deployments
        .iter()
        .find(|d| d.step == DeploymentStep::DestroyChain)
        .unwrap();
    assert_eq!(destroy.status, DeploymentStatus::Success);

    // Terminated stacks stay terminated
    assert!(stack::terminate_stack(&harness.ctx, id).await.is_err());
}

#[tokio::test]
async fn test_terminate_failure_is_retryable() {
    let harness = &Harness::new();
    let id = stack::create_stack(&harness.ctx, deploy_request())
        .await
        .unwrap()
        .id;
    wait_for_status(&harness, id, StackStatus::Deployed).await;

    harness
        .driver
        .script("destroy-aws-infra", Script::Fail("stuck".to_string()));
    stack::terminate_stack(&harness.ctx, id).await.unwrap();
    wait_for_status(&harness, id, StackStatus::FailedToTerminate).await;

    harness.driver.clear("destroy-aws-infra");
    stack::terminate_stack(&harness.ctx, id).await.unwrap();
    wait_for_status(&harness, id, StackStatus::Terminated).await;
}

#[tokio::test]
async fn test_driver_output_is_ingested() {
    let harness = &Harness::new();
    let id = stack::create_stack(&harness.ctx, deploy_request())
        .await
        .unwrap()
        .id;
    wait_for_status(&harness, id, StackStatus::Deployed).await;

    let deployments = query::list_deployments(&harness.ctx, id).await.unwrap();
    let contracts = deployments
        .iter()
        .find(|d| d.step == DeploymentStep::DeployL1Contracts)
        .unwrap();

    wait_for("contract logs", || async move {
        let page = query::deployment_logs(&harness.ctx, id, contracts.id, LogQuery::default())
            .await
            .unwrap();
        page.logs.len() >= 2
    })
    .await;

    let page = query::deployment_logs(&harness.ctx, id, contracts.id, LogQuery::default())
        .await
        .unwrap();
    assert_eq!(page.logs[0].message, "deploy-l1-contracts started");
    assert_eq!(page.next_cursor, page.logs.last().map(|l| l.id));

    let after = LogQuery {
        limit: None,
        after_id: page.next_cursor,
    };
    let rest = query::deployment_logs(&harness.ctx, id, contracts.id, after)
        .await
        .unwrap();
    assert!(rest.logs.is_empty());

    let path = query::deployment_log_file(&harness.ctx, id, contracts.id)
        .await
        .unwrap();
    assert!(path.exists());
}

#[tokio::test]
async fn test_chain_information_is_ingested_into_last_step() {
    let harness = &Harness::new();
    let id = stack::create_stack(&harness.ctx, deploy_request())
        .await
        .unwrap()
        .id;
    wait_for_status(&harness, id, StackStatus::Deployed).await;

    let infra = query::list_deployments(&harness.ctx, id)
        .await
        .unwrap()
        .into_iter()
        .find(|d| d.step == DeploymentStep::DeployAwsInfra)
        .unwrap();

    let infra_id = infra.id;
    wait_for("chain information logs", || async move {
        query::deployment_logs(&harness.ctx, id, infra_id, LogQuery::default())
            .await
            .unwrap()
            .logs
            .iter()
            .any(|l| l.message == "show-chain-information done")
    })
    .await;

    let page = query::deployment_logs(&harness.ctx, id, infra_id, LogQuery::default())
        .await
        .unwrap();
    let messages: Vec<_> = page.logs.iter().map(|l| l.message.as_str()).collect();
    assert_eq!(
        messages,
        vec![
            "deploy-aws-infra started",
            "deploy-aws-infra done",
            "show-chain-information started",
            "show-chain-information done",
        ]
    );
}

#[tokio::test]
async fn test_store_error_fails_deployment() {
    let harness = &Harness::with_repos(FlakyDeployments::repositories());
    let id = stack::create_stack(&harness.ctx, deploy_request())
        .await
        .unwrap()
        .id;
    wait_for_status(&harness, id, StackStatus::FailedToDeploy).await;

    let failed = harness.stack(id).await;
    assert!(failed.reason.unwrap().contains("connection reset"));

    let deployments = query::list_deployments(&harness.ctx, id).await.unwrap();
    assert_eq!(deployments.len(), 2);
    assert!(deployments.iter().all(|d| d.status == DeploymentStatus::Stopped));
    assert!(harness.driver.calls().is_empty());

    // The failure is resumable like any other
    stack::resume_stack(&harness.ctx, id).await.unwrap();
    wait_for_status(&harness, id, StackStatus::Deployed).await;
}
