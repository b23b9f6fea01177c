//! Resource kinds known to the builder.

use serde::{Deserialize, Serialize};

/// Semantic constraint attached to a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Semantic {
    /// Any value, only presence is checked.
    Any,
    /// A string that must not be empty.
    NonEmpty,
    /// A list with at least one element.
    NonEmptyList,
}

/// Description of one property of a resource kind.
#[derive(Debug, Clone, Copy)]
pub struct PropertySpec {
    pub name: &'static str,
    pub required: bool,
    pub semantic: Semantic,
}

const fn required(name: &'static str) -> PropertySpec {
    PropertySpec {
        name,
        required: true,
        semantic: Semantic::Any,
    }
}

const fn required_text(name: &'static str) -> PropertySpec {
    PropertySpec {
        name,
        required: true,
        semantic: Semantic::NonEmpty,
    }
}

const fn required_list(name: &'static str) -> PropertySpec {
    PropertySpec {
        name,
        required: true,
        semantic: Semantic::NonEmptyList,
    }
}

/// Supported resource types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    Vpc,
    Subnet,
    InternetGateway,
    VpcGatewayAttachment,
    RouteTable,
    Route,
    SubnetRouteTableAssociation,
    Eip,
    NatGateway,
    SecurityGroup,
    DhcpOptions,
    VpcDhcpOptionsAssociation,
    SimpleAd,
    DbInstance,
    DbSubnetGroup,
    DbParameterGroup,
    RecordSetGroup,
    HostedZone,
    Bucket,
    BucketPolicy,
    Role,
    InstanceProfile,
    LaunchConfiguration,
    AutoScalingGroup,
    ScheduledAction,
    EcsCluster,
    TaskDefinition,
    EcsService,
    Queue,
    KmsKey,
    Alarm,
    Stack,
}

impl ResourceKind {
    /// Provider type name as it appears in rendered documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Vpc => "AWS::EC2::VPC",
            ResourceKind::Subnet => "AWS::EC2::Subnet",
            ResourceKind::InternetGateway => "AWS::EC2::InternetGateway",
            ResourceKind::VpcGatewayAttachment => "AWS::EC2::VPCGatewayAttachment",
            ResourceKind::RouteTable => "AWS::EC2::RouteTable",
            ResourceKind::Route => "AWS::EC2::Route",
            ResourceKind::SubnetRouteTableAssociation => "AWS::EC2::SubnetRouteTableAssociation",
            ResourceKind::Eip => "AWS::EC2::EIP",
            ResourceKind::NatGateway => "AWS::EC2::NatGateway",
            ResourceKind::SecurityGroup => "AWS::EC2::SecurityGroup",
            ResourceKind::DhcpOptions => "AWS::EC2::DHCPOptions",
            ResourceKind::VpcDhcpOptionsAssociation => "AWS::EC2::VPCDHCPOptionsAssociation",
            ResourceKind::SimpleAd => "AWS::DirectoryService::SimpleAD",
            ResourceKind::DbInstance => "AWS::RDS::DBInstance",
            ResourceKind::DbSubnetGroup => "AWS::RDS::DBSubnetGroup",
            ResourceKind::DbParameterGroup => "AWS::RDS::DBParameterGroup",
            ResourceKind::RecordSetGroup => "AWS::Route53::RecordSetGroup",
            ResourceKind::HostedZone => "AWS::Route53::HostedZone",
            ResourceKind::Bucket => "AWS::S3::Bucket",
            ResourceKind::BucketPolicy => "AWS::S3::BucketPolicy",
            ResourceKind::Role => "AWS::IAM::Role",
            ResourceKind::InstanceProfile => "AWS::IAM::InstanceProfile",
            ResourceKind::LaunchConfiguration => "AWS::AutoScaling::LaunchConfiguration",
            ResourceKind::AutoScalingGroup => "AWS::AutoScaling::AutoScalingGroup",
            ResourceKind::ScheduledAction => "AWS::AutoScaling::ScheduledAction",
            ResourceKind::EcsCluster => "AWS::ECS::Cluster",
            ResourceKind::TaskDefinition => "AWS::ECS::TaskDefinition",
            ResourceKind::EcsService => "AWS::ECS::Service",
            ResourceKind::Queue => "AWS::SQS::Queue",
            ResourceKind::KmsKey => "AWS::KMS::Key",
            ResourceKind::Alarm => "AWS::CloudWatch::Alarm",
            ResourceKind::Stack => "AWS::CloudFormation::Stack",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::all().into_iter().find(|kind| kind.as_str() == s)
    }

    pub fn all() -> Vec<Self> {
        vec![
            ResourceKind::Vpc,
            ResourceKind::Subnet,
            ResourceKind::InternetGateway,
            ResourceKind::VpcGatewayAttachment,
            ResourceKind::RouteTable,
            ResourceKind::Route,
            ResourceKind::SubnetRouteTableAssociation,
            ResourceKind::Eip,
            ResourceKind::NatGateway,
            ResourceKind::SecurityGroup,
            ResourceKind::DhcpOptions,
            ResourceKind::VpcDhcpOptionsAssociation,
            ResourceKind::SimpleAd,
            ResourceKind::DbInstance,
            ResourceKind::DbSubnetGroup,
            ResourceKind::DbParameterGroup,
            ResourceKind::RecordSetGroup,
            ResourceKind::HostedZone,
            ResourceKind::Bucket,
            ResourceKind::BucketPolicy,
            ResourceKind::Role,
            ResourceKind::InstanceProfile,
            ResourceKind::LaunchConfiguration,
            ResourceKind::AutoScalingGroup,
            ResourceKind::ScheduledAction,
            ResourceKind::EcsCluster,
            ResourceKind::TaskDefinition,
            ResourceKind::EcsService,
            ResourceKind::Queue,
            ResourceKind::KmsKey,
            ResourceKind::Alarm,
            ResourceKind::Stack,
        ]
    }

    /// Properties the builder checks for this kind.
    pub fn property_specs(&self) -> &'static [PropertySpec] {
        match self {
            ResourceKind::Vpc => {
                const SPECS: &[PropertySpec] = &[required_text("CidrBlock")];
                SPECS
            }
            ResourceKind::Subnet => {
                const SPECS: &[PropertySpec] = &[required("VpcId"), required_text("CidrBlock")];
                SPECS
            }
            ResourceKind::VpcGatewayAttachment => {
                const SPECS: &[PropertySpec] = &[required("VpcId"), required("InternetGatewayId")];
                SPECS
            }
            ResourceKind::RouteTable => {
                const SPECS: &[PropertySpec] = &[required("VpcId")];
                SPECS
            }
            ResourceKind::Route => {
                const SPECS: &[PropertySpec] = &[required("RouteTableId"), required_text("DestinationCidrBlock")];
                SPECS
            }
            ResourceKind::SubnetRouteTableAssociation => {
                const SPECS: &[PropertySpec] = &[required("SubnetId"), required("RouteTableId")];
                SPECS
            }
            ResourceKind::NatGateway => {
                const SPECS: &[PropertySpec] = &[required("AllocationId"), required("SubnetId")];
                SPECS
            }
            ResourceKind::SecurityGroup => {
                const SPECS: &[PropertySpec] = &[required_text("GroupDescription"), required("VpcId")];
                SPECS
            }
            ResourceKind::DhcpOptions => {
                const SPECS: &[PropertySpec] = &[required_text("DomainName")];
                SPECS
            }
            ResourceKind::VpcDhcpOptionsAssociation => {
                const SPECS: &[PropertySpec] = &[required("DhcpOptionsId"), required("VpcId")];
                SPECS
            }
            ResourceKind::SimpleAd => {
                const SPECS: &[PropertySpec] = &[
                    required_text("Name"),
                    required("Password"),
                    required_text("Size"),
                    required("VpcSettings"),
                ];
                SPECS
            }
            ResourceKind::DbInstance => {
                const SPECS: &[PropertySpec] = &[
                    required_text("Engine"),
                    required_text("DBInstanceClass"),
                    required("AllocatedStorage"),
                    required_text("MasterUsername"),
                    required("MasterUserPassword"),
                ];
                SPECS
            }
            ResourceKind::DbSubnetGroup => {
                const SPECS: &[PropertySpec] = &[
                    required_text("DBSubnetGroupDescription"),
                    required_list("SubnetIds"),
                ];
                SPECS
            }
            ResourceKind::DbParameterGroup => {
                const SPECS: &[PropertySpec] = &[required_text("Description"), required_text("Family")];
                SPECS
            }
            ResourceKind::RecordSetGroup => {
                const SPECS: &[PropertySpec] = &[required_text("HostedZoneName"), required_list("RecordSets")];
                SPECS
            }
            ResourceKind::HostedZone => {
                const SPECS: &[PropertySpec] = &[required_text("Name")];
                SPECS
            }
            ResourceKind::Bucket => {
                const SPECS: &[PropertySpec] = &[required_text("BucketName")];
                SPECS
            }
            ResourceKind::BucketPolicy => {
                const SPECS: &[PropertySpec] = &[required("Bucket"), required("PolicyDocument")];
                SPECS
            }
            ResourceKind::Role => {
                const SPECS: &[PropertySpec] = &[required("AssumeRolePolicyDocument")];
                SPECS
            }
            ResourceKind::InstanceProfile => {
                const SPECS: &[PropertySpec] = &[required_list("Roles")];
                SPECS
            }
            ResourceKind::LaunchConfiguration => {
                const SPECS: &[PropertySpec] = &[required("ImageId"), required_text("InstanceType")];
                SPECS
            }
            ResourceKind::AutoScalingGroup => {
                const SPECS: &[PropertySpec] = &[
                    required("MinSize"),
                    required("MaxSize"),
                    required_list("VPCZoneIdentifier"),
                ];
                SPECS
            }
            ResourceKind::ScheduledAction => {
                const SPECS: &[PropertySpec] = &[required("AutoScalingGroupName"), required_text("Recurrence")];
                SPECS
            }
            ResourceKind::TaskDefinition => {
                const SPECS: &[PropertySpec] = &[required_list("ContainerDefinitions")];
                SPECS
            }
            ResourceKind::EcsService => {
                const SPECS: &[PropertySpec] = &[required("Cluster"), required("TaskDefinition")];
                SPECS
            }
            ResourceKind::Queue => {
                const SPECS: &[PropertySpec] = &[required_text("QueueName")];
                SPECS
            }
            ResourceKind::KmsKey => {
                const SPECS: &[PropertySpec] = &[required("KeyPolicy")];
                SPECS
            }
            ResourceKind::Alarm => {
                const SPECS: &[PropertySpec] = &[
                    required_text("MetricName"),
                    required_text("Namespace"),
                    required("Threshold"),
                    required_text("ComparisonOperator"),
                ];
                SPECS
            }
            ResourceKind::Stack => {
                const SPECS: &[PropertySpec] = &[required("TemplateURL")];
                SPECS
            }
            ResourceKind::InternetGateway | ResourceKind::Eip | ResourceKind::EcsCluster => &[],
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_round_trip() {
        for kind in ResourceKind::all() {
            assert_eq!(ResourceKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(ResourceKind::from_str("AWS::Nope::Thing"), None);
    }

    #[test]
    fn test_bucket_requires_name() {
        let specs = ResourceKind::Bucket.property_specs();
        assert!(specs.iter().any(|s| s.name == "BucketName" && s.required));
    }

    #[test]
    fn test_property_tables_outlive_the_kind() {
        let tables: Vec<(ResourceKind, &'static [PropertySpec])> = ResourceKind::all()
            .into_iter()
            .map(|kind| (kind, kind.property_specs()))
            .collect();

        for (kind, specs) in &tables {
            assert!(specs.iter().all(|s| s.required && !s.name.is_empty()), "{}", kind);
        }
        let vpc = ResourceKind::Vpc.property_specs();
        assert_eq!(vpc[0].name, "CidrBlock");
        assert_eq!(vpc[0].semantic, Semantic::NonEmpty);
        assert!(ResourceKind::Eip.property_specs().is_empty());
    }
}
