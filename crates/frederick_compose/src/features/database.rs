//! RDS instances, one security group, parameter group and DNS name each.

use frederick_template::{
    sanitize_logical_id, PropertyValue, Reference, ResourceBuilder, ResourceKind, Template,
};
use tracing::{debug, info};

use super::{declare_private_subnets, declare_vpc, Feature, FeatureContext};
use crate::config::{required, required_number, DatabaseInstanceConfig};
use crate::error::{ComposeError, ComposeResult};
use crate::resources::{cname_record, security_group_with_cidr};

/// Port, parameter group family and parameters of a supported engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineProfile {
    pub port: u16,
    pub family: &'static str,
    pub parameters: &'static [(&'static str, &'static str)],
}

const POSTGRES: EngineProfile = EngineProfile {
    port: 5432,
    family: "postgres9.5",
    parameters: &[
        ("rds.force_ssl", "1"),
        ("log_min_duration_statement", "100"),
        ("log_statement", "all"),
    ],
};

const MYSQL: EngineProfile = EngineProfile {
    port: 3306,
    family: "mysql5.1",
    parameters: &[],
};

const MARIADB: EngineProfile = EngineProfile {
    port: 3306,
    family: "mariadb10.1",
    parameters: &[],
};

pub fn engine_profile(engine: &str) -> Option<EngineProfile> {
    match engine {
        "postgres" => Some(POSTGRES),
        "MySQL" => Some(MYSQL),
        "mariadb" => Some(MARIADB),
        _ => None,
    }
}

/// `rds<name>.<zone>` in admin zones, `<name>.rds.<zone>` elsewhere.
pub fn record_name(name: &str, zone: &str) -> String {
    if zone.contains("admin") {
        format!("rds{}.{}", name, zone)
    } else {
        format!("{}.rds.{}", name, zone)
    }
}

pub(super) fn build(ctx: &FeatureContext<'_>) -> ComposeResult<Template> {
    let mut template = ctx.template(Feature::Database, "relational databases");
    let vpc = declare_vpc(&mut template)?;
    let subnets = declare_private_subnets(&mut template, ctx.zone_count())?;

    for (i, instance) in ctx.config.database.instances.iter().enumerate() {
        let context = format!("database.instances[{}]", i);
        add_instance(ctx, &mut template, instance, &context, &vpc, &subnets)?;
    }

    Ok(template)
}

fn add_instance(
    ctx: &FeatureContext<'_>,
    template: &mut Template,
    instance: &DatabaseInstanceConfig,
    context: &str,
    vpc: &Reference,
    subnets: &[Reference],
) -> ComposeResult<()> {
    let name = required(&instance.name, "name", context)?;
    let engine = required(&instance.engine, "engine", context)?;
    let username = required(&instance.username, "username", context)?;
    let ciphertext = required(&instance.password, "password", context)?;
    let storage = required_number(instance.storage, "storage", context)?;
    let instance_type = required(&instance.db_instance_type, "db_instance_type", context)?;
    let zone = required(&ctx.config.dns.hosted_zone, "hosted_zone", "dns")?;

    let profile = engine_profile(engine).ok_or_else(|| {
        ComposeError::validation(
            format!("{}.engine", context),
            format!("unsupported engine '{}' (expected postgres, MySQL or mariadb)", engine),
        )
    })?;
    let password = ctx.secrets.plaintext(ciphertext, &format!("{}.password", context))?;

    let id = sanitize_logical_id(name);
    info!("Adding RDS for {}", id);

    let group = template.add(security_group_with_cidr(
        &format!("RDSSecurityGroup{}", id),
        "Security group for RDS DB Instance.",
        vpc.to_ref(),
        &ctx.cidr.to_string(),
        &[profile.port],
    )?)?;

    let mut parameter_group = ResourceBuilder::new(ResourceKind::DbParameterGroup, format!("RDSParameterGroup{}", id))
        .property("Description", format!("{} DB Parameter Group", name))
        .property("Family", profile.family);
    if !profile.parameters.is_empty() {
        parameter_group = parameter_group.property(
            "Parameters",
            PropertyValue::map(profile.parameters.iter().map(|(k, v)| (*k, PropertyValue::from(*v)))),
        );
    }
    let parameter_group = template.add(parameter_group.build()?)?;

    let subnet_group = template.add(
        ResourceBuilder::new(ResourceKind::DbSubnetGroup, format!("{}DBSubnetGroup", id))
            .property("DBSubnetGroupDescription", "Subnets available for the RDS DB Instance")
            .property("SubnetIds", PropertyValue::list(subnets.iter().map(|s| s.to_ref())))
            .build()?,
    )?;

    let mut database = ResourceBuilder::new(ResourceKind::DbInstance, format!("rds{}", id))
        .property("Engine", engine)
        .property("MasterUsername", username)
        .property("MasterUserPassword", password)
        .property("AllocatedStorage", storage)
        .property("StorageType", "gp2")
        .property("DBInstanceClass", instance_type)
        .property("DBName", format!("rds{}", id))
        .property("Port", profile.port)
        .property("DBSubnetGroupName", subnet_group.to_ref())
        .property("BackupRetentionPeriod", 7i64)
        .property("DBParameterGroupName", parameter_group.to_ref())
        .property("VPCSecurityGroups", PropertyValue::list([group.to_ref()]))
        .property("MultiAZ", instance.multiaz)
        .deletion_policy("Snapshot");
    if let Some(key) = instance.kms_key_id.as_deref().filter(|k| !k.trim().is_empty()) {
        database = database
            .property("KmsKeyId", key)
            .property("StorageEncrypted", true);
    }
    let database = template.add(database.build()?)?;

    template.add(cname_record(
        &format!("{}RDSRecordSetGroup", id),
        &record_name(name, zone),
        database.attr("Endpoint.Address"),
        zone,
    )?)?;

    debug!("Database {} uses {} on port {}", id, profile.family, profile.port);
    Ok(())
}
