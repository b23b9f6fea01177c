//! Auto scaling application tier in the public subnets.

use frederick_template::{
    sanitize_logical_id, ParameterSpec, ParameterType, PropertyValue, ResourceBuilder, ResourceKind,
    Template,
};
use tracing::debug;

use super::{declare_common_security_group, declare_public_subnets, declare_vpc, Feature, FeatureContext};
use crate::config::{required, required_number};
use crate::error::{ComposeError, ComposeResult};
use crate::resources::{instance_profile, role, security_group_with_cidr};

pub const AMI_PARAMETER: &str = "amiId";
const DATA_VOLUME_DEVICE: &str = "/dev/sds";

/// Boot script of the sample application.
const USER_DATA: &[&str] = &[
    "#!/bin/bash\n",
    "yum install python27-pip -y\n",
    "wget https://raw.githubusercontent.com/AWSFrederick/Spires-Export/master/flask-app/requirements.txt\n",
    "wget https://raw.githubusercontent.com/AWSFrederick/Spires-Export/master/flask-app/app.py\n",
    "pip install -r requirements.txt\n",
    "export FLASK_APP=app.py\n",
    "flask run\n",
];

pub(super) fn build(ctx: &FeatureContext<'_>) -> ComposeResult<Template> {
    let compute = &ctx.config.compute;
    let instance_type = required(&compute.instance_size, "instance_size", "compute")?;
    let asg_size = required_number(compute.asg_size, "asg_size", "compute")?;
    if asg_size > compute.max_size {
        return Err(ComposeError::validation(
            "compute.asg_size",
            format!("asg_size {} exceeds max_size {}", asg_size, compute.max_size),
        ));
    }

    let mut template = ctx.template(Feature::Compute, "application servers");
    let vpc = declare_vpc(&mut template)?;
    let subnets = declare_public_subnets(&mut template, ctx.zone_count())?;
    let common = declare_common_security_group(&mut template)?;

    let mut ami = ParameterSpec::new(AMI_PARAMETER, ParameterType::ImageId)
        .with_description("Image the application servers boot from");
    if let Some(ami_id) = compute.ami_id.as_deref().filter(|a| !a.trim().is_empty()) {
        ami = ami.with_default(ami_id);
    }
    let ami = template.declare_parameter(ami)?;

    let app_group = template.add(security_group_with_cidr(
        "ASGSG",
        "Security Group for EC2",
        vpc.to_ref(),
        &ctx.cidr.to_string(),
        &[compute.app_port],
    )?)?;
    template.add(security_group_with_cidr(
        "ELBSG",
        "Security Group for accessing EC2 publicly",
        vpc.to_ref(),
        "0.0.0.0/0",
        &[compute.public_port],
    )?)?;

    let logs = ctx.policies.grant("cloudwatchlogs", "EC2")?;
    let instance_role = template.add(role("EC2Role", &["ec2.amazonaws.com"], &[logs])?)?;
    let profile = template.add(instance_profile("EC2InstanceProfile", instance_role.to_ref())?)?;

    let user_data = PropertyValue::base64(PropertyValue::join(
        "",
        USER_DATA.iter().map(|line| PropertyValue::from(*line)),
    ));
    let data_volume = PropertyValue::map([
        ("DeviceName", PropertyValue::from(DATA_VOLUME_DEVICE)),
        (
            "Ebs",
            PropertyValue::map([
                ("VolumeSize", PropertyValue::from(compute.data_volume_size)),
                ("VolumeType", PropertyValue::from("gp2")),
                ("DeleteOnTermination", PropertyValue::from(true)),
            ]),
        ),
    ]);

    let launch = template.add(
        ResourceBuilder::new(ResourceKind::LaunchConfiguration, "EC2LaunchConfiguration")
            .property("ImageId", ami.to_ref())
            .property("InstanceType", instance_type)
            .property(
                "SecurityGroups",
                PropertyValue::list([common.to_ref(), app_group.to_ref()]),
            )
            .property("IamInstanceProfile", profile.to_ref())
            .property("UserData", user_data)
            .property("BlockDeviceMappings", PropertyValue::list([data_volume]))
            .build()?,
    )?;

    let rolling_update = PropertyValue::map([(
        "AutoScalingRollingUpdate",
        PropertyValue::map([
            ("PauseTime", PropertyValue::from("PT5M")),
            ("MinInstancesInService", PropertyValue::from(1i64)),
            ("MaxBatchSize", PropertyValue::from("1")),
        ]),
    )]);

    let group = template.add(
        ResourceBuilder::new(ResourceKind::AutoScalingGroup, "EC2AutoScalingGroup")
            .property("LaunchConfigurationName", launch.to_ref())
            .property("MinSize", asg_size)
            .property("MaxSize", compute.max_size)
            .property(
                "VPCZoneIdentifier",
                PropertyValue::list(subnets.iter().map(|s| s.to_ref())),
            )
            .update_policy(rolling_update)
            .build()?,
    )?;

    for (i, action) in compute.scheduled_actions.iter().enumerate() {
        let context = format!("compute.scheduled_actions[{}]", i);
        let recurrence = required(&action.recurrence, "recurrence", &context)?;
        let id = match action.name.as_deref().map(sanitize_logical_id) {
            Some(name) if !name.is_empty() => format!("{}ScheduledAction", name),
            _ => format!("ScheduledAction{}", i),
        };
        debug!("Scheduling {} at '{}'", id, recurrence);

        template.add(
            ResourceBuilder::new(ResourceKind::ScheduledAction, id)
                .property("AutoScalingGroupName", group.to_ref())
                .property("MinSize", action.min_size)
                .property("MaxSize", action.max_size)
                .property("DesiredCapacity", action.desired_size)
                .property("Recurrence", recurrence)
                .build()?,
        )?;
    }

    Ok(template)
}
