use actuator_cli::{
    catalog::{CatalogFile, FileFormat},
    cli::{ListResource, OutputFormat},
    commands::{ActionFilter, ExecuteCommand, ListCommand, TriggerCommand},
    env::EnvResolver,
    error::CliError,
    workspace::Workspace,
};
use actuator_core::{ActionCatalog, AttributeStore, ExecutionFilter, ExecutionStatus, ExecutionStore};
use actuator_runtime::RuntimeConfig;
use httpmock::prelude::*;
use std::io::Write;

fn catalog_yaml(base_url: &str) -> String {
    format!(
        r#"
resource_types:
  - resource_type_id: rt-custody
    name: custody_account
    environment: test
actions:
  - action_id: open-account
    action_name: Open custody account
    verb_pattern: resources.create
    environment: test
    resource_type_id: rt-custody
    execution_config:
      endpoint_url: {base_url}/accounts
      retry_config:
        max_retries: 0
    attribute_mapping:
      input_mapping:
        - attribute_id: ccy
          api_parameter: currency
          transformation: iso_currency_code
      output_mapping:
        - attribute_id: custody_account_id
          api_parameter: account.id
  - action_id: close-case
    action_name: Close case
    verb_pattern: case.close
    environment: prod
    execution_config:
      endpoint_url: {base_url}/cases
workflows:
  - client_id: CBU-1
    version_id: v1
    created_at: 2026-01-01T00:00:00Z
    source_text: '(resources.create (kind "custody")) (values.bind (bind (attr-id "ccy") (value "US Dollar")))'
  - client_id: CBU-1
    version_id: v2
    created_at: 2026-02-01T00:00:00Z
    source_text: '(resources.create (kind "custody")) (values.bind (bind (attr-id "ccy") (value "British Pound")))'
"#
    )
}

fn test_config() -> RuntimeConfig {
    RuntimeConfig::default()
}

#[tokio::test]
async fn test_open_expands_environment_defaults() {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    write!(file, "{}", catalog_yaml("${ACTUATOR_TEST_UNSET_CUSTODY_URL:https://custody.test}")).unwrap();

    let workspace = Workspace::open(file.path(), "test", &EnvResolver::default(), test_config()).await.unwrap();
    let action = workspace.store.get_action("open-account").await.unwrap().unwrap();
    assert_eq!(action.execution_config.endpoint_url, "https://custody.test/accounts");

    let active =
        ListCommand::select_actions(workspace.store.list_actions().await.unwrap(), &ActionFilter::default(), "test");
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].action_id, "open-account");
}

#[tokio::test]
async fn test_list_actions_by_resource_type_name() {
    let catalog = CatalogFile::parse(&catalog_yaml("https://custody.test"), FileFormat::Yaml).unwrap();
    let workspace = Workspace::from_catalog(&catalog, "test", test_config()).await.unwrap();

    let by_name = |name: &str| ListResource::Actions {
        verb: None,
        resource_type: Some(name.to_string()),
        all: true,
        format: OutputFormat::Json,
    };
    ListCommand::run(&workspace, by_name("Custody_Account")).await.unwrap();

    let err = ListCommand::run(&workspace, by_name("safekeeping")).await.unwrap_err();
    assert!(matches!(err, CliError::InvalidArgument(_)));
}

#[tokio::test]
async fn test_open_rejects_disallowed_variables() {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    write!(file, "{}", catalog_yaml("${HOME}")).unwrap();

    let err = Workspace::open(file.path(), "test", &EnvResolver::default(), test_config()).await.err().unwrap();
    assert!(matches!(err, CliError::Env(_)));
}

#[tokio::test]
async fn test_open_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = Workspace::open(dir.path().join("absent.yaml"), "test", &EnvResolver::default(), test_config())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, CliError::FileNotFound(_)));
}

#[tokio::test]
async fn test_execute_uses_latest_workflow() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/accounts").json_body_partial(r#"{"currency": "GBP"}"#);
        then.status(201).json_body(serde_json::json!({"account": {"id": "ACC-9"}}));
    });

    let catalog = CatalogFile::parse(&catalog_yaml(&server.base_url()), FileFormat::Yaml).unwrap();
    let workspace = Workspace::from_catalog(&catalog, "test", test_config()).await.unwrap();

    ExecuteCommand::run(&workspace, "open-account", "CBU-1", None, OutputFormat::Json).await.unwrap();
    mock.assert();

    let stored = workspace.store.get_value("CBU-1", "v2", "custody_account_id").await.unwrap().unwrap();
    assert_eq!(stored.value.render(), "ACC-9");

    let executions = workspace.store.list_executions(&ExecutionFilter::default()).await.unwrap();
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0].workflow_version_id, "v2");
    assert_eq!(executions[0].status, ExecutionStatus::Completed);
}

#[tokio::test]
async fn test_execute_pinned_version_uses_its_own_document() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/accounts").json_body_partial(r#"{"currency": "USD"}"#);
        then.status(201).json_body(serde_json::json!({"account": {"id": "ACC-1"}}));
    });

    let catalog = CatalogFile::parse(&catalog_yaml(&server.base_url()), FileFormat::Yaml).unwrap();
    let workspace = Workspace::from_catalog(&catalog, "test", test_config()).await.unwrap();

    ExecuteCommand::run(&workspace, "open-account", "CBU-1", Some("v1".into()), OutputFormat::Json).await.unwrap();
    mock.assert();
    let stored = workspace.store.get_value("CBU-1", "v1", "custody_account_id").await.unwrap().unwrap();
    assert_eq!(stored.value.render(), "ACC-1");

    let err = ExecuteCommand::run(&workspace, "open-account", "CBU-1", Some("v9".into()), OutputFormat::Json)
        .await
        .unwrap_err();
    assert!(matches!(err, CliError::InvalidArgument(_)));
}

#[tokio::test]
async fn test_execute_failure_is_reported() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/accounts");
        then.status(422).body("currency rejected");
    });

    let catalog = CatalogFile::parse(&catalog_yaml(&server.base_url()), FileFormat::Yaml).unwrap();
    let workspace = Workspace::from_catalog(&catalog, "test", test_config()).await.unwrap();

    let err = ExecuteCommand::run(&workspace, "open-account", "CBU-1", None, OutputFormat::Text).await.unwrap_err();
    assert!(matches!(err, CliError::ExecutionFailed(_)));
}

#[tokio::test]
async fn test_trigger_dry_run_executes_nothing() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.path("/accounts");
        then.status(201);
    });

    let catalog = CatalogFile::parse(&catalog_yaml(&server.base_url()), FileFormat::Yaml).unwrap();
    let workspace = Workspace::from_catalog(&catalog, "test", test_config()).await.unwrap();

    TriggerCommand::run(&workspace, "CBU-1", true, OutputFormat::Text).await.unwrap();
    assert_eq!(mock.hits(), 0);
    assert!(workspace.store.list_executions(&ExecutionFilter::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_client_has_no_workflow() {
    let catalog = CatalogFile::parse(&catalog_yaml("https://custody.test"), FileFormat::Yaml).unwrap();
    let workspace = Workspace::from_catalog(&catalog, "test", test_config()).await.unwrap();

    let err = TriggerCommand::run(&workspace, "CBU-404", false, OutputFormat::Text).await.unwrap_err();
    assert!(matches!(err, CliError::InvalidArgument(_)));
    assert!(matches!(workspace.credential_manager(), Err(CliError::Config(_))));
}

#[tokio::test]
async fn test_declared_credentials_are_vaulted() {
    let yaml = format!(
        "{}credentials:\n  - name: custody\n    type: bearer\n    secrets:\n      token: t-1\n",
        catalog_yaml("https://custody.test")
    );
    let catalog = CatalogFile::parse(&yaml, FileFormat::Yaml).unwrap();
    let config = RuntimeConfig { credential_passphrase: Some("catalog-pass".into()), ..RuntimeConfig::default() };
    let workspace = Workspace::from_catalog(&catalog, "test", config).await.unwrap();

    let summaries = workspace.credential_manager().unwrap().list_credentials(None).await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].name, "custody");
    assert_eq!(summaries[0].environment, "test");
    assert!(!summaries[0].expired);
}
