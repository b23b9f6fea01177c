//! End-to-end composition tests against mock collaborators.

use std::sync::Arc;

use frederick_compose::{
    default_root_file_name, BindingSource, BucketConfig, ChildRegistry, ComposeError, Composer,
    CompositionState, DatabaseInstanceConfig, Feature, FrederickConfig, NetworkRoot,
    TemplateLocation,
};
use frederick_deploy::{FileDeployer, MockDecryptor, MockDeployer, MANIFEST_FILE};
use frederick_template::{PropertyValue, ResourceBuilder, ResourceKind, Template};
use tempfile::tempdir;

fn base_config() -> FrederickConfig {
    let mut config = FrederickConfig::default();
    config.environment_name = "dev".to_string();
    config.dns.hosted_zone = Some("internal.example.com.".to_string());
    config
}

fn storage_only() -> FrederickConfig {
    let mut config = base_config();
    config.features.storage = true;
    config.storage.buckets.push(BucketConfig {
        name: Some("assets.example.com".to_string()),
        access_control: "PublicRead".to_string(),
        static_site: false,
        route53: false,
    });
    config
}

fn database_instance() -> DatabaseInstanceConfig {
    DatabaseInstanceConfig {
        name: Some("orders".to_string()),
        engine: Some("postgres".to_string()),
        username: Some("frederick".to_string()),
        password: Some("AQICAHdb".to_string()),
        storage: Some(20),
        db_instance_type: Some("db.t2.micro".to_string()),
        multiaz: false,
        kms_key_id: None,
    }
}

fn database_and_compute() -> FrederickConfig {
    let mut config = base_config();
    config.features.database = true;
    config.features.compute = true;
    config.database.instances.push(database_instance());
    config.compute.ami_id = Some("ami-12345678".to_string());
    config.compute.instance_size = Some("t2.micro".to_string());
    config.compute.asg_size = Some(1);
    config
}

fn composer(config: FrederickConfig) -> Composer {
    Composer::new(config, Arc::new(MockDecryptor::new()))
}

fn ingress_cidrs(template: &Template, logical_id: &str) -> Vec<String> {
    template
        .resource(logical_id)
        .and_then(|r| r.property("SecurityGroupIngress"))
        .map(|rules| rules.to_json())
        .and_then(|json| json.as_array().cloned())
        .unwrap_or_default()
        .iter()
        .filter_map(|rule| rule["CidrIp"].as_str().map(str::to_string))
        .collect()
}

#[tokio::test]
async fn test_render_is_deterministic() {
    let mut composer = composer(database_and_compute());
    composer.compose().await.unwrap();

    let first = composer.render("dev.template.json").unwrap();
    let second = composer.render("dev.template.json").unwrap();

    assert_eq!(first.root.body, second.root.body);
    for (a, b) in first.children.iter().zip(&second.children) {
        assert_eq!(a.body, b.body);
    }
    assert_eq!(first.manifest_json().unwrap(), second.manifest_json().unwrap());
}

#[tokio::test]
async fn test_storage_only_environment() {
    let mut composer = composer(storage_only());
    let tree = composer.compose().await.unwrap();

    assert_eq!(tree.children.len(), 1);
    let storage = &tree.children[0].template;
    assert_eq!(storage.name(), "Storage");

    let kinds: Vec<ResourceKind> = storage.resources().iter().map(|r| r.kind()).collect();
    assert_eq!(kinds, vec![ResourceKind::Bucket, ResourceKind::BucketPolicy]);
    assert!(storage.resource("assetsexamplecomBucket").is_some());

    let policy = storage.resource("assetsexamplecomBucketPolicy").unwrap();
    let statement = &policy.property("PolicyDocument").unwrap().to_json()["Statement"][0];
    assert_eq!(statement["Action"], "s3:GetObject");
    assert_eq!(statement["Principal"], "*");
    assert_eq!(statement["Resource"], "arn:aws:s3:::assets.example.com/*");

    assert!(storage
        .resources()
        .iter()
        .all(|r| r.kind() != ResourceKind::RecordSetGroup));
}

#[tokio::test]
async fn test_database_and_compute_share_network() {
    let mut composer = composer(database_and_compute());
    let tree = composer.compose().await.unwrap();

    let names: Vec<&str> = tree.children.iter().map(|c| c.namespace.as_str()).collect();
    assert_eq!(names, vec!["Database", "Compute"]);

    let database = &tree.children[0].template;
    let compute = &tree.children[1];
    assert_eq!(ingress_cidrs(database, "RDSSecurityGrouporders"), vec!["10.0.0.0/16"]);
    assert_eq!(ingress_cidrs(&compute.template, "ASGSG"), vec!["10.0.0.0/16"]);

    let common = compute.binding("commonSecurityGroup").unwrap();
    assert_eq!(common.source, BindingSource::WellKnown);
    assert_eq!(common.value, Some(PropertyValue::reference("commonSecurityGroup")));
    assert_eq!(compute.binding("vpcId").unwrap().source, BindingSource::RootOutput);
    assert_eq!(compute.binding("amiId").unwrap().source, BindingSource::Default);

    let stack = tree.root.resource("ComputeStack").unwrap();
    assert_eq!(stack.kind(), ResourceKind::Stack);
    let parameters = stack.property("Parameters").unwrap().to_json();
    assert_eq!(parameters["publicAZ0"], serde_json::json!({"Ref": "PublicSubnet0"}));
    assert!(parameters.get("amiId").is_none());
}

#[tokio::test]
async fn test_missing_engine_never_reaches_deployer() {
    let mut config = database_and_compute();
    config.database.instances[0].engine = None;
    let mut composer = composer(config);
    let deployer = MockDeployer::new();

    let err = composer
        .run(frederick_deploy::DeployAction::Deploy, &deployer, "dev.template.json")
        .await
        .unwrap_err();

    match err {
        ComposeError::Validation { message, .. } => assert!(message.contains("engine")),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(composer.state(), CompositionState::Failed);
    assert!(!deployer.was_called());
}

#[tokio::test]
async fn test_unresolved_parameter_names_child() {
    let mut config = database_and_compute();
    config.compute.ami_id = None;
    let mut composer = composer(config);

    match composer.compose().await.unwrap_err() {
        ComposeError::UnresolvedParameter { child, parameter } => {
            assert_eq!(child, "Compute");
            assert_eq!(parameter, "amiId");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(composer.tree().is_none());
    assert!(composer
        .history()
        .contains(&CompositionState::Attaching(Feature::Compute)));
    assert_eq!(composer.state(), CompositionState::Failed);
}

#[test]
fn test_unresolved_parameter_leaves_root_unchanged() {
    let config = base_config();
    let root = NetworkRoot::build(&config, config.network.cidr().unwrap()).unwrap();
    let mut registry = ChildRegistry::new(
        root.template,
        root.well_known,
        TemplateLocation::from(&config.deployment),
    );
    let before = registry.root().to_json().unwrap();

    let mut child = Template::new("Queue");
    child
        .declare_parameter(frederick_template::ParameterSpec::string("deadLetterArn"))
        .unwrap();
    assert!(matches!(
        registry.attach(child),
        Err(ComposeError::UnresolvedParameter { .. })
    ));

    assert_eq!(registry.root().to_json().unwrap(), before);
}

#[tokio::test]
async fn test_children_reference_only_themselves() {
    let mut composer = composer(database_and_compute());
    let tree = composer.compose().await.unwrap();

    for child in &tree.children {
        for resource in child.template.resources() {
            for target in resource.references() {
                assert!(
                    child.template.contains(target),
                    "{} in {} escapes to {}",
                    resource.logical_id(),
                    child.namespace,
                    target
                );
            }
        }
    }

    // A child cannot point at a sibling's resource.
    let mut rogue = Template::new("Rogue");
    let err: ComposeError = rogue
        .add(
            ResourceBuilder::new(ResourceKind::Queue, "queue")
                .property("QueueName", "jobs")
                .property("RedrivePolicy", PropertyValue::attribute("rdsorders", "Arn"))
                .build()
                .unwrap(),
        )
        .unwrap_err()
        .into();
    assert!(matches!(err, ComposeError::CrossTemplateReference { ref target, .. } if target == "rdsorders"));
}

#[tokio::test]
async fn test_subnet_layout() {
    let mut composer = composer(storage_only());
    let tree = composer.compose().await.unwrap();

    let cidr = |id: &str| {
        tree.root
            .resource(id)
            .and_then(|r| r.property("CidrBlock"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    };
    assert_eq!(cidr("PublicSubnet0").as_deref(), Some("10.0.0.0/24"));
    assert_eq!(cidr("PublicSubnet2").as_deref(), Some("10.0.2.0/24"));
    assert_eq!(cidr("PrivateSubnet0").as_deref(), Some("10.0.3.0/24"));
    assert_eq!(cidr("PrivateSubnet2").as_deref(), Some("10.0.5.0/24"));
}

#[tokio::test]
async fn test_deploy_failure_is_verbatim() {
    let mut composer = composer(storage_only());
    let deployer = MockDeployer::new()
        .simulate_failure("An error occurred (ValidationError): Stack dev is in ROLLBACK_COMPLETE state");

    composer.compose().await.unwrap();
    let err = composer.deploy(&deployer, "dev.template.json").await.unwrap_err();

    match err {
        ComposeError::ExternalDependency {
            collaborator,
            message,
        } => {
            assert_eq!(collaborator, "mock");
            assert_eq!(
                message,
                "An error occurred (ValidationError): Stack dev is in ROLLBACK_COMPLETE state"
            );
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(composer.state(), CompositionState::Failed);
}

#[tokio::test]
async fn test_decrypt_failure_stops_before_attach() {
    let mut config = storage_only();
    config.features.directory = true;
    config.directory.simple_ads.push(frederick_compose::SimpleAdConfig {
        name: Some("corp".to_string()),
        password: Some("AQICAHad".to_string()),
        shortname: Some("CORP".to_string()),
        size: None,
    });

    let decryptor = MockDecryptor::new().simulate_failure("AccessDeniedException: not authorized");
    let mut composer = Composer::new(config, Arc::new(decryptor.clone()));

    let err = composer.compose().await.unwrap_err();
    assert!(matches!(err, ComposeError::ExternalDependency { ref message, .. } if message.contains("AccessDenied")));
    assert_eq!(decryptor.get_calls(), vec!["AQICAHad".to_string()]);

    let history = composer.history();
    assert!(history.contains(&CompositionState::BuildingChild(Feature::Directory)));
    assert!(!history.contains(&CompositionState::Attaching(Feature::Directory)));
    assert!(!history.contains(&CompositionState::BuildingChild(Feature::Storage)));
}

#[tokio::test]
async fn test_decrypted_password_reaches_database() {
    let mut config = database_and_compute();
    config.features.compute = false;
    let decryptor = MockDecryptor::new().with_plaintext("AQICAHdb", "correct-horse");
    let mut composer = Composer::new(config, Arc::new(decryptor));

    let tree = composer.compose().await.unwrap();
    let database = tree.children[0].template.resource("rdsorders").unwrap();
    assert_eq!(
        database.property("MasterUserPassword").unwrap().as_str(),
        Some("correct-horse")
    );
}

#[tokio::test]
async fn test_create_writes_documents() {
    let dir = tempdir().unwrap();
    let mut composer = composer(database_and_compute());
    let deployer = FileDeployer::new(dir.path());
    let root_file = default_root_file_name("dev");

    composer.compose().await.unwrap();
    let outcome = composer.create(&deployer, &root_file).await.unwrap();

    assert_eq!(outcome.documents.len(), 4);
    assert!(dir.path().join("dev.template.json").exists());
    assert!(dir.path().join("Database.template.json").exists());
    assert!(dir.path().join("Compute.template.json").exists());

    let manifest: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join(MANIFEST_FILE)).unwrap())
            .unwrap();
    assert_eq!(manifest["children"][1]["stack_logical_id"], "ComputeStack");
    assert_eq!(manifest["children"][1]["bindings"]["commonSecurityGroup"], "well-known");
    assert_eq!(
        manifest["children"][0]["template_url"],
        "https://frederick-templates.s3.amazonaws.com/frederick/Database.template.json"
    );
}

#[tokio::test]
async fn test_root_named_like_a_child_is_refused() {
    let dir = tempdir().unwrap();
    let mut config = storage_only();
    config.environment_name = "Storage".to_string();
    let mut composer = composer(config);
    let deployer = FileDeployer::new(dir.path());

    composer.compose().await.unwrap();
    let err = composer
        .create(&deployer, &default_root_file_name("Storage"))
        .await
        .unwrap_err();

    assert!(matches!(err, ComposeError::Validation { ref context, .. } if context == "template_file"));
    assert_eq!(composer.state(), CompositionState::Failed);
    assert!(!dir.path().join("Storage.template.json").exists());
    assert!(!dir.path().join(MANIFEST_FILE).exists());
}
