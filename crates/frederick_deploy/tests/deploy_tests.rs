//! Integration tests for the deployment collaborators.
//!
//! Nothing here talks to AWS: the CLI deployer runs in dry-run mode and the
//! mocks stand in for the provider.

use std::fs;

use frederick_deploy::{
    AwsCli, AwsCliDeployer, AwsCliOptions, DeployAction, DeployError, FileDeployer,
    MockDeployer, StackDeployer, MANIFEST_FILE,
};
use frederick_template::{
    child_file_name, RenderedBundle, RenderedDocument, ResourceBuilder, ResourceKind, Template,
};
use serde_json::Value;
use tempfile::tempdir;

fn sample_bundle() -> RenderedBundle {
    let mut root = Template::new("frederick");
    root.add(
        ResourceBuilder::new(ResourceKind::Vpc, "VPC")
            .property("CidrBlock", "10.0.0.0/16")
            .build()
            .unwrap(),
    )
    .unwrap();

    let mut storage = Template::new("Storage");
    storage
        .add(
            ResourceBuilder::new(ResourceKind::Bucket, "assetsexamplecomBucket")
                .property("BucketName", "assets.example.com")
                .build()
                .unwrap(),
        )
        .unwrap();

    RenderedBundle {
        environment: "frederick".to_string(),
        region: "us-east-1".to_string(),
        root: RenderedDocument::from_template(&root, "frederick.template.json", None).unwrap(),
        children: vec![RenderedDocument::from_template(
            &storage,
            child_file_name("Storage"),
            Some("https://my-templates.s3.amazonaws.com/frederick/Storage.template.json".to_string()),
        )
        .unwrap()],
    }
}

#[tokio::test]
async fn test_file_deployer_writes_documents_and_manifest() {
    let dir = tempdir().unwrap();
    let deployer = FileDeployer::new(dir.path().join("templates"));
    let bundle = sample_bundle();

    let outcome = deployer.apply(&bundle, DeployAction::Create).await.unwrap();
    assert_eq!(outcome.documents.len(), 3);

    let root = fs::read_to_string(dir.path().join("templates/frederick.template.json")).unwrap();
    assert_eq!(root, bundle.root.body);

    let child = fs::read_to_string(dir.path().join("templates/Storage.template.json")).unwrap();
    let child: Value = serde_json::from_str(&child).unwrap();
    assert_eq!(
        child["Resources"]["assetsexamplecomBucket"]["Type"],
        "AWS::S3::Bucket"
    );

    let manifest = fs::read_to_string(dir.path().join("templates").join(MANIFEST_FILE)).unwrap();
    let manifest: Value = serde_json::from_str(&manifest).unwrap();
    assert_eq!(manifest["root"]["name"], "frederick");
    assert_eq!(manifest["children"][0]["name"], "Storage");
}

#[tokio::test]
async fn test_file_deployer_refuses_colliding_file_names() {
    let dir = tempdir().unwrap();
    let deployer = FileDeployer::new(dir.path().join("templates"));

    let mut bundle = sample_bundle();
    bundle.root.file_name = "Storage.template.json".to_string();
    let err = deployer.apply(&bundle, DeployAction::Create).await.unwrap_err();
    assert!(matches!(err, DeployError::DuplicateFile(ref name) if name == "Storage.template.json"));
    assert!(!dir.path().join("templates").exists());

    let mut bundle = sample_bundle();
    bundle.root.file_name = MANIFEST_FILE.to_string();
    let err = deployer.apply(&bundle, DeployAction::Create).await.unwrap_err();
    assert!(matches!(err, DeployError::DuplicateFile(_)));
}

#[tokio::test]
async fn test_file_deployer_rejects_deploy() {
    let dir = tempdir().unwrap();
    let deployer = FileDeployer::new(dir.path());

    let err = deployer
        .apply(&sample_bundle(), DeployAction::Deploy)
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::UnsupportedAction { .. }));
}

#[tokio::test]
async fn test_aws_deployer_dry_run_uploads_children_before_root() {
    let dir = tempdir().unwrap();
    let cli = AwsCli::new(AwsCliOptions::new().with_region("us-east-1").dry_run());
    let deployer = AwsCliDeployer::new(cli, "frederick", "my-templates", "frederick")
        .with_staging_dir(dir.path());

    let outcome = deployer
        .apply(&sample_bundle(), DeployAction::Deploy)
        .await
        .unwrap();

    assert_eq!(outcome.commands.len(), 2);
    assert!(outcome.commands[0].starts_with("aws s3 cp"));
    assert!(outcome.commands[0].contains("s3://my-templates/frederick/Storage.template.json"));
    assert!(outcome.commands[1].starts_with("aws cloudformation deploy"));
    assert!(outcome.commands[1].contains("--stack-name frederick"));
    assert!(dir.path().join("Storage.template.json").exists());
}

#[tokio::test]
async fn test_mock_deployer_failure_passes_stderr() {
    let deployer = MockDeployer::new().simulate_failure("Template format error: Unresolved resource dependencies");

    let err = deployer
        .apply(&sample_bundle(), DeployAction::Deploy)
        .await
        .unwrap_err();

    match err {
        DeployError::CommandFailed { stderr, .. } => {
            assert_eq!(stderr, "Template format error: Unresolved resource dependencies")
        }
        other => panic!("unexpected error: {other}"),
    }

    let calls = deployer.get_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].children, vec!["Storage"]);
}
