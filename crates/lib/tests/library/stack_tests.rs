//! End-to-end tests of the App Service stack against the simulated backend.

use std::sync::Arc;

use appstack_lib::appservice::AppServiceProgram;
use appstack_lib::consts::INPUT_SALT_KEY;
use appstack_lib::engine::{EngineConfig, Operation};
use appstack_lib::provider::{ProviderError, SimulatedProvider, SubmissionKind};
use appstack_lib::resource::ResourceName;
use appstack_lib::secret::Secret;
use appstack_lib::stack::StackError;
use appstack_lib::util::hash::{hash_bytes, keyed_hash_json};
use serde_json::json;

use super::common::{PASSWORD, TestProject};

mod attributes {
  use super::*;

  #[tokio::test]
  async fn app_service_plan_is_free() {
    let project = TestProject::new();
    project.up().await.unwrap();

    let plan = project.stack().resource("appservice-asp").unwrap().unwrap();
    assert_eq!(plan.outputs["sku"]["tier"], json!("Free"));
    assert_eq!(plan.outputs["sku"]["name"], json!("F1"));
  }

  #[tokio::test]
  async fn storage_account_sku_and_kind() {
    let project = TestProject::new();
    project.up().await.unwrap();

    let account = project.stack().resource("appservicesa").unwrap().unwrap();
    assert_eq!(account.outputs["sku"]["name"], json!("Standard_LRS"));
    assert_eq!(account.outputs["kind"], json!("StorageV2"));
  }

  #[tokio::test]
  async fn web_app_name_and_kind() {
    let project = TestProject::new();
    project.up().await.unwrap();

    let app = project.stack().resource("appservice-as").unwrap().unwrap();
    assert_eq!(app.outputs["name"], json!("appservice-as"));
    assert_eq!(app.outputs["kind"], json!("app"));
  }

  #[tokio::test]
  async fn location_is_uksouth() {
    let project = TestProject::new();
    project.up().await.unwrap();

    let group = project.stack().resource("appservicerg").unwrap().unwrap();
    assert_eq!(group.outputs["location"], json!("uksouth"));
    assert!(group.id.ends_with("/resourceGroups/appservicerg"));
  }
}

mod exports {
  use super::*;

  #[tokio::test]
  async fn four_non_empty_exports() {
    let project = TestProject::new();
    project.up().await.unwrap();

    let outputs = project.stack().outputs().unwrap();
    let names: Vec<&str> = outputs.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["log_tail_command", "scm_web_app_url", "web_app_url", "web_ssh_url"]);
    for (name, export) in &outputs {
      assert!(
        export.value.as_str().is_some_and(|value| !value.is_empty()),
        "{name} is empty"
      );
    }
  }

  #[tokio::test]
  async fn scm_url_differs_only_by_host_substitution() {
    let project = TestProject::new();
    project.up().await.unwrap();

    let outputs = project.stack().outputs().unwrap();
    let web = outputs["web_app_url"].value.as_str().unwrap().to_string();
    let scm = outputs["scm_web_app_url"].value.as_str().unwrap().to_string();
    assert_ne!(web, scm);
    assert_eq!(scm, web.replace(".azurewebsites.net", ".scm.azurewebsites.net"));
  }
}

mod lifecycle {
  use super::*;

  #[tokio::test]
  async fn second_up_changes_nothing() {
    let project = TestProject::new();
    let first = project.up().await.unwrap();
    assert_eq!(first.count(Operation::Create), 9);

    let provider = Arc::new(SimulatedProvider::new("westeurope").seeded(&project.stack().state().unwrap()));
    let second = project.up_with(provider.clone()).await.unwrap();

    assert_eq!(second.count(Operation::Same), 9);
    assert_eq!(second.count(Operation::Invoke), 1);
    let calls: Vec<SubmissionKind> = provider.submissions().into_iter().map(|s| s.operation).collect();
    let writes: Vec<SubmissionKind> = calls.iter().copied().filter(|op| *op != SubmissionKind::Read).collect();
    assert_eq!(writes, vec![SubmissionKind::Invoke]);
    assert_eq!(calls.iter().filter(|op| **op == SubmissionKind::Read).count(), 9);
    assert_eq!(project.stack().outputs().unwrap().len(), 4);
  }

  #[tokio::test]
  async fn changed_package_updates_the_blob() {
    let project = TestProject::new();
    project.up().await.unwrap();

    project.write_file("wwwroot/index.html", "<h1>Version 2</h1>");
    let result = project.up().await.unwrap();

    assert_eq!(result.operations[&ResourceName::from("appservice-b")], Operation::Update);
    assert_eq!(result.operations[&ResourceName::from("appservicesa")], Operation::Same);
  }

  #[tokio::test]
  async fn relocated_project_changes_nothing() {
    let project = TestProject::new();
    project.up().await.unwrap();

    let moved = project.temp.path().join("moved");
    std::fs::create_dir_all(&moved).unwrap();
    std::fs::rename(project.package_dir(), moved.join("wwwroot")).unwrap();
    let stack = project.stack();
    let provider = Arc::new(SimulatedProvider::new("uksouth").seeded(&stack.state().unwrap()));
    let result = stack
      .up(AppServiceProgram::new(moved.join("wwwroot")), provider, &EngineConfig::default())
      .await
      .unwrap();

    assert_eq!(result.operations[&ResourceName::from("appservice-b")], Operation::Same);
    assert_eq!(result.operations[&ResourceName::from("appservice-as")], Operation::Same);
  }

  #[tokio::test]
  async fn stored_hash_cannot_be_recomputed_from_the_state_file() {
    let project = TestProject::new();
    project.up().await.unwrap();

    let record = project.stack().resource("appservice-sql").unwrap().unwrap();
    assert_eq!(record.inputs["administratorLoginPassword"], json!("[secret]"));

    let mut guessed = record.inputs.clone();
    guessed.insert("administratorLoginPassword".to_string(), json!(PASSWORD));
    let serialized = serde_json::to_vec(&guessed).unwrap();
    assert_ne!(record.inputs_hash, hash_bytes(&serialized));
    assert_ne!(record.inputs_hash, keyed_hash_json(&Secret::generate(), &guessed).unwrap());
    assert!(!std::fs::read_to_string(project.state_file()).unwrap().contains(INPUT_SALT_KEY));
  }

  #[tokio::test]
  async fn password_never_reaches_the_state_file() {
    let project = TestProject::new();
    project.up().await.unwrap();

    let content = std::fs::read_to_string(project.state_file()).unwrap();
    assert!(content.contains("appservice-sql"));
    assert!(!content.contains(PASSWORD));
    assert!(content.contains("[secret]"));
  }
}

mod failures {
  use super::*;

  #[tokio::test]
  async fn failing_server_is_named_and_independent_branches_finish() {
    let project = TestProject::new();
    let provider = Arc::new(
      SimulatedProvider::new("uksouth")
        .with_failure("appservice-sql", ProviderError::QuotaExceeded("sql servers".to_string())),
    );

    let err = project.up_with(provider).await.unwrap_err();
    let StackError::Provision(failure) = &err else {
      panic!("expected a provisioning failure, got {err:?}");
    };
    assert_eq!(failure.failed_resources(), vec![&ResourceName::from("appservice-sql")]);
    assert!(failure.skipped.contains_key(&ResourceName::from("appservice-db")));
    assert!(failure.skipped.contains_key(&ResourceName::from("appservice-as")));
    assert!(err.to_string().contains("appservice-sql"));

    let stack = project.stack();
    assert!(stack.resource("appservice-b").unwrap().is_some());
    assert!(stack.resource("appservice-asp").unwrap().is_some());
    assert!(stack.resource("appservice-sql").unwrap().is_none());
    assert!(stack.outputs().unwrap().is_empty());
  }

  #[tokio::test]
  async fn unresolved_exports_keep_their_last_values() {
    let project = TestProject::new();
    project.up().await.unwrap();
    let before = project.stack().outputs().unwrap();
    assert_eq!(before.len(), 4);

    let provider = Arc::new(
      SimulatedProvider::new("uksouth").with_failure("appservice-as", ProviderError::Unauthorized("sites".to_string())),
    );
    let err = project.up_with(provider).await.unwrap_err();
    assert!(err.to_string().contains("appservice-as"));

    assert_eq!(project.stack().outputs().unwrap(), before);
  }

  #[tokio::test]
  async fn retry_after_failure_creates_only_what_is_missing() {
    let project = TestProject::new();
    let provider = Arc::new(
      SimulatedProvider::new("uksouth").with_failure("appservice-asp", ProviderError::Unauthorized("plans".to_string())),
    );
    assert!(project.up_with(provider).await.is_err());

    let result = project.up().await.unwrap();
    assert_eq!(result.count(Operation::Create), 2);
    assert_eq!(result.operations[&ResourceName::from("appservice-asp")], Operation::Create);
    assert_eq!(result.operations[&ResourceName::from("appservice-as")], Operation::Create);
  }
}
