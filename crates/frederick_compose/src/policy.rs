//! Symbolic access policies.
//!
//! Features ask for access by short name (`cloudwatchlogs`, `s3`, ...). The
//! table is an immutable value built once and handed to every feature
//! builder, so tests can swap in their own.

use std::collections::BTreeMap;

use frederick_template::PropertyValue;
use serde_json::{json, Value as JsonValue};
use tracing::warn;

use crate::error::{ComposeError, ComposeResult};

/// An inline IAM policy.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessPolicy {
    pub policy_name: String,
    pub document: JsonValue,
}

impl AccessPolicy {
    pub fn new(policy_name: impl Into<String>, document: JsonValue) -> Self {
        Self {
            policy_name: policy_name.into(),
            document,
        }
    }

    /// Policy granting `actions` on every resource.
    pub fn allow_all(policy_name: impl Into<String>, actions: &[&str]) -> Self {
        Self::new(
            policy_name,
            json!({
                "Statement": [{
                    "Effect": "Allow",
                    "Action": actions,
                    "Resource": "*"
                }]
            }),
        )
    }

    /// Entry for a role's `Policies` list.
    pub fn to_property(&self) -> PropertyValue {
        PropertyValue::map([
            ("PolicyName", PropertyValue::from(self.policy_name.as_str())),
            ("PolicyDocument", PropertyValue::from(self.document.clone())),
        ])
    }
}

/// Named access policies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicyRegistry {
    policies: BTreeMap<String, AccessPolicy>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(mut self, key: impl Into<String>, policy: AccessPolicy) -> Self {
        self.policies.insert(key.into(), policy);
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.policies.contains_key(key)
    }

    pub fn keys(&self) -> Vec<&str> {
        self.policies.keys().map(|k| k.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Look up a policy for `receiver`, warning that access is granted.
    pub fn grant(&self, key: &str, receiver: &str) -> ComposeResult<&AccessPolicy> {
        let policy = self.policies.get(key).ok_or_else(|| {
            ComposeError::validation(
                format!("access policies for {}", receiver),
                format!("unknown policy '{}'", key),
            )
        })?;
        warn!("Allowing {} access for {}", key, receiver);
        Ok(policy)
    }

    /// The table shipped with Frederick.
    pub fn standard() -> Self {
        Self::new()
            .with_policy(
                "kms",
                AccessPolicy::new(
                    "kmsInteract",
                    json!({
                        "Statement": [{
                            "Sid": "Stmt1457395497000",
                            "Effect": "Allow",
                            "Action": ["kms:*"],
                            "Resource": "*"
                        }]
                    }),
                ),
            )
            .with_policy(
                "autoscaling",
                AccessPolicy::allow_all("asgInteract", &["autoscaling:*", "ec2:*"]),
            )
            .with_policy(
                "cloudwatch",
                AccessPolicy::allow_all(
                    "cwInteract",
                    &["sns:*", "autoscaling:Describe*", "cloudwatch:*", "logs:*"],
                ),
            )
            .with_policy(
                "cloudwatchlogs",
                AccessPolicy::allow_all(
                    "cloudwatchlogs",
                    &[
                        "logs:CreateLogGroup",
                        "logs:CreateLogStream",
                        "logs:PutLogEvents",
                        "logs:DescribeLogStreams",
                    ],
                ),
            )
            .with_policy(
                "autoscaling_ecs",
                AccessPolicy::allow_all(
                    "service-autoscaling",
                    &[
                        "application-autoscaling:*",
                        "cloudwatch:DescribeAlarms",
                        "cloudwatch:PutMetricAlarm",
                        "ecs:DescribeServices",
                        "ecs:UpdateService",
                    ],
                ),
            )
            .with_policy("sns", AccessPolicy::allow_all("snsInteract", &["sns:*"]))
            .with_policy("s3", AccessPolicy::allow_all("s3Interact", &["s3:*"]))
            .with_policy("ecr", AccessPolicy::allow_all("ecrInteract", &["ecr:*"]))
            .with_policy(
                "ecs",
                AccessPolicy::allow_all(
                    "ecsInteract",
                    &[
                        "elasticloadbalancing:Describe*",
                        "elasticloadbalancing:DeregisterInstancesFromLoadBalancer",
                        "elasticloadbalancing:RegisterInstancesWithLoadBalancer",
                        "ec2:Describe*",
                        "ec2:AuthorizeSecurityGroupIngress",
                        "ecs:RegisterContainerInstance",
                        "ecs:DeregisterContainerInstance",
                        "ecs:DiscoverPollEndpoint",
                        "ecs:Submit*",
                        "ecs:Poll",
                        "ecs:StartTelemetrySession",
                        "application-autoscaling:*",
                        "cloudwatch:DescribeAlarms",
                        "cloudwatch:PutMetricAlarm",
                        "ecs:DescribeServices",
                        "ecs:UpdateService",
                    ],
                ),
            )
            .with_policy("ses", AccessPolicy::allow_all("sesInteract", &["ses:*"]))
            .with_policy("sqs", AccessPolicy::allow_all("sqsInteract", &["sqs:*"]))
            .with_policy(
                "route53",
                AccessPolicy::allow_all("route53Interact", &["route53:*"]),
            )
            .with_policy(
                "createtags",
                AccessPolicy::allow_all(
                    "createtags",
                    &[
                        "ec2:CreateTags",
                        "ec2:DescribeInstances",
                        "ec2:DescribeTags",
                        "ec2:DescribeVolumes",
                    ],
                ),
            )
            .with_policy("es", AccessPolicy::allow_all("esInteract", &["es:*"]))
            .with_policy(
                "lambda",
                AccessPolicy::allow_all(
                    "lambda",
                    &[
                        "cloudwatch:*",
                        "cognito-identity:ListIdentityPools",
                        "cognito-sync:GetCognitoEvents",
                        "cognito-sync:SetCognitoEvents",
                        "dynamodb:*",
                        "events:*",
                        "iam:ListAttachedRolePolicies",
                        "iam:ListRolePolicies",
                        "iam:ListRoles",
                        "iam:PassRole",
                        "kinesis:DescribeStream",
                        "kinesis:ListStreams",
                        "kinesis:PutRecord",
                        "lambda:*",
                        "logs:*",
                        "s3:*",
                        "sns:ListSubscriptions",
                        "sns:ListSubscriptionsByTopic",
                        "sns:ListTopics",
                        "sns:Subscribe",
                        "sns:Unsubscribe",
                    ],
                ),
            )
            .with_policy("readall", AccessPolicy::allow_all("readall", READ_ALL_ACTIONS))
            .with_policy(
                "simianarmy",
                AccessPolicy::new(
                    "SimianArmyInteract",
                    json!({
                        "Statement": [
                            {
                                "Effect": "Allow",
                                "Resource": "*",
                                "Sid": "Stmt1357739573947",
                                "Action": [
                                    "ec2:CreateTags",
                                    "ec2:DeleteSnapshot",
                                    "ec2:DescribeImages",
                                    "ec2:DescribeInstances",
                                    "ec2:DescribeSnapshots",
                                    "ec2:DescribeVolumes",
                                    "ec2:TerminateInstances",
                                    "ses:SendEmail",
                                    "elasticloadbalancing:*"
                                ]
                            },
                            {
                                "Effect": "Allow",
                                "Resource": "*",
                                "Sid": "Stmt1357739649609",
                                "Action": [
                                    "autoscaling:DeleteAutoScalingGroup",
                                    "autoscaling:DescribeAutoScalingGroups",
                                    "autoscaling:DescribeAutoScalingInstances",
                                    "autoscaling:DescribeLaunchConfigurations"
                                ]
                            },
                            {
                                "Effect": "Allow",
                                "Resource": "*",
                                "Sid": "Stmt1357739730279",
                                "Action": [
                                    "sdb:BatchDeleteAttributes",
                                    "sdb:BatchPutAttributes",
                                    "sdb:DomainMetadata",
                                    "sdb:GetAttributes",
                                    "sdb:PutAttributes",
                                    "sdb:ListDomains",
                                    "sdb:CreateDomain",
                                    "sdb:Select"
                                ]
                            }
                        ]
                    }),
                ),
            )
    }
}

const READ_ALL_ACTIONS: &[&str] = &[
    "appstream:Get*",
    "autoscaling:Describe*",
    "cloudformation:DescribeStackEvents",
    "cloudformation:DescribeStackResource",
    "cloudformation:DescribeStackResources",
    "cloudformation:DescribeStacks",
    "cloudformation:GetTemplate",
    "cloudformation:List*",
    "cloudfront:Get*",
    "cloudfront:List*",
    "cloudsearch:Describe*",
    "cloudsearch:List*",
    "cloudtrail:DescribeTrails",
    "cloudtrail:GetTrailStatus",
    "cloudwatch:Describe*",
    "cloudwatch:Get*",
    "cloudwatch:List*",
    "codecommit:BatchGetRepositories",
    "codecommit:Get*",
    "codecommit:GitPull",
    "codecommit:List*",
    "codedeploy:Batch*",
    "codedeploy:Get*",
    "codedeploy:List*",
    "config:Deliver*",
    "config:Describe*",
    "config:Get*",
    "datapipeline:DescribeObjects",
    "datapipeline:DescribePipelines",
    "datapipeline:EvaluateExpression",
    "datapipeline:GetPipelineDefinition",
    "datapipeline:ListPipelines",
    "datapipeline:QueryObjects",
    "datapipeline:ValidatePipelineDefinition",
    "directconnect:Describe*",
    "dynamodb:BatchGetItem",
    "dynamodb:DescribeTable",
    "dynamodb:GetItem",
    "dynamodb:ListTables",
    "dynamodb:Query",
    "dynamodb:Scan",
    "ec2:Describe*",
    "ec2:GetConsoleOutput",
    "ecr:GetAuthorizationToken",
    "ecr:BatchCheckLayerAvailability",
    "ecr:GetDownloadUrlForLayer",
    "ecr:GetManifest",
    "ecr:DescribeRepositories",
    "ecr:ListImages",
    "ecr:BatchGetImage",
    "ecs:Describe*",
    "ecs:List*",
    "elasticache:Describe*",
    "elasticache:List*",
    "elasticbeanstalk:Check*",
    "elasticbeanstalk:Describe*",
    "elasticbeanstalk:List*",
    "elasticbeanstalk:RequestEnvironmentInfo",
    "elasticbeanstalk:RetrieveEnvironmentInfo",
    "elasticloadbalancing:Describe*",
    "elasticmapreduce:Describe*",
    "elasticmapreduce:List*",
    "elastictranscoder:List*",
    "elastictranscoder:Read*",
    "firehose:Describe*",
    "firehose:List*",
    "glacier:ListVaults",
    "glacier:DescribeVault",
    "glacier:GetDataRetrievalPolicy",
    "glacier:GetVaultAccessPolicy",
    "glacier:GetVaultLock",
    "glacier:GetVaultNotifications",
    "glacier:ListJobs",
    "glacier:ListMultipartUploads",
    "glacier:ListParts",
    "glacier:ListTagsForVault",
    "glacier:DescribeJob",
    "glacier:GetJobOutput",
    "iam:GenerateCredentialReport",
    "iam:Get*",
    "iam:List*",
    "inspector:Describe*",
    "inspector:Get*",
    "inspector:List*",
    "inspector:LocalizeText",
    "inspector:PreviewAgentsForResourceGroup",
    "iot:Describe*",
    "iot:Get*",
    "iot:List*",
    "kinesis:Describe*",
    "kinesis:Get*",
    "kinesis:List*",
    "kms:Describe*",
    "kms:Get*",
    "kms:List*",
    "lambda:List*",
    "lambda:Get*",
    "logs:Describe*",
    "logs:Get*",
    "logs:TestMetricFilter",
    "mobilehub:GetProject",
    "mobilehub:ListAvailableFeatures",
    "mobilehub:ListAvailableRegions",
    "mobilehub:ListProjects",
    "mobilehub:ValidateProject",
    "mobilehub:VerifyServiceRole",
    "opsworks:Describe*",
    "opsworks:Get*",
    "rds:Describe*",
    "rds:ListTagsForResource",
    "redshift:Describe*",
    "redshift:ViewQueriesInConsole",
    "route53:Get*",
    "route53:List*",
    "route53domains:CheckDomainAvailability",
    "route53domains:GetDomainDetail",
    "route53domains:GetOperationDetail",
    "route53domains:ListDomains",
    "route53domains:ListOperations",
    "route53domains:ListTagsForDomain",
    "s3:Get*",
    "s3:List*",
    "sdb:GetAttributes",
    "sdb:List*",
    "sdb:Select*",
    "ses:Get*",
    "ses:List*",
    "sns:Get*",
    "sns:List*",
    "sqs:GetQueueAttributes",
    "sqs:ListQueues",
    "sqs:ReceiveMessage",
    "storagegateway:Describe*",
    "storagegateway:List*",
    "swf:Count*",
    "swf:Describe*",
    "swf:Get*",
    "swf:List*",
    "tag:Get*",
    "trustedadvisor:Describe*",
    "waf:Get*",
    "waf:List*",
];
