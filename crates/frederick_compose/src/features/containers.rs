//! Fargate cluster and services in the private subnets.

use frederick_template::{sanitize_logical_id, PropertyValue, ResourceBuilder, ResourceKind, Template};
use tracing::debug;

use super::{declare_common_security_group, declare_private_subnets, declare_vpc, Feature, FeatureContext};
use crate::config::required;
use crate::error::{ComposeError, ComposeResult};
use crate::resources::security_group_with_cidr;

pub(super) fn build(ctx: &FeatureContext<'_>) -> ComposeResult<Template> {
    let containers = &ctx.config.containers;
    let cluster_name = required(&containers.cluster_name, "cluster_name", "containers")?;

    let mut template = ctx.template(Feature::Containers, "container services");
    let vpc = declare_vpc(&mut template)?;
    let subnets = declare_private_subnets(&mut template, ctx.zone_count())?;
    let common = declare_common_security_group(&mut template)?;

    let cluster_id = sanitize_logical_id(cluster_name);
    if cluster_id.is_empty() {
        return Err(ComposeError::validation(
            "containers.cluster_name",
            format!("'{}' does not yield a logical id", cluster_name),
        ));
    }
    let cluster = template.add(
        ResourceBuilder::new(ResourceKind::EcsCluster, cluster_id)
            .property("ClusterName", cluster_name)
            .build()?,
    )?;

    for (i, service) in containers.services.iter().enumerate() {
        let context = format!("containers.services[{}]", i);
        let name = required(&service.name, "name", &context)?;
        let image = required(&service.image, "image", &context)?;
        let id = sanitize_logical_id(name);
        debug!("Adding service {} ({})", id, image);

        let group = template.add(security_group_with_cidr(
            &format!("{}ASGSG", id),
            &format!("Security Group for {}", name),
            vpc.to_ref(),
            &ctx.cidr.to_string(),
            &[service.container_port],
        )?)?;

        let container = PropertyValue::map([
            ("Name", PropertyValue::from(name)),
            ("Image", PropertyValue::from(image)),
            ("Cpu", PropertyValue::from(service.cpu)),
            ("Memory", PropertyValue::from(service.memory)),
            (
                "PortMappings",
                PropertyValue::list([PropertyValue::map([(
                    "ContainerPort",
                    PropertyValue::from(service.container_port),
                )])]),
            ),
        ]);

        let task = template.add(
            ResourceBuilder::new(ResourceKind::TaskDefinition, format!("{}taskdef", id))
                .property("Cpu", service.cpu.to_string())
                .property("Memory", service.memory.to_string())
                .property("RequiresCompatibilities", PropertyValue::list([PropertyValue::from("FARGATE")]))
                .property("NetworkMode", "awsvpc")
                .property("ContainerDefinitions", PropertyValue::list([container]))
                .build()?,
        )?;

        let network = PropertyValue::map([(
            "AwsvpcConfiguration",
            PropertyValue::map([
                ("Subnets", PropertyValue::list(subnets.iter().map(|s| s.to_ref()))),
                (
                    "SecurityGroups",
                    PropertyValue::list([common.to_ref(), group.to_ref()]),
                ),
                ("AssignPublicIp", PropertyValue::from("DISABLED")),
            ]),
        )]);

        template.add(
            ResourceBuilder::new(ResourceKind::EcsService, format!("{}service", id))
                .property("Cluster", cluster.to_ref())
                .property("LaunchType", "FARGATE")
                .property("TaskDefinition", task.to_ref())
                .property("DesiredCount", service.desired_count)
                .property("NetworkConfiguration", network)
                .build()?,
        )?;
    }

    Ok(template)
}
