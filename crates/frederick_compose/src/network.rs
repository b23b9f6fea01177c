//! The root network template.
//!
//! The root owns the VPC, subnets, routing and the shared security group.
//! Children never see these resources directly: the root publishes them as
//! outputs (`vpcId`, `publicAZ<i>`, `privateAZ<i>`) and as well-known
//! references (`commonSecurityGroup`), which the registry binds to child
//! parameters of the same name.

use frederick_template::{
    Ipv4Cidr, PropertyValue, Reference, ResourceBuilder, ResourceKind, Template,
};
use tracing::{debug, info};

use crate::config::FrederickConfig;
use crate::error::{ComposeError, ComposeResult};
use crate::registry::WellKnownRefs;
use crate::resources::cidr_rule;

pub const VPC_ID: &str = "vpcId";
pub const COMMON_SECURITY_GROUP: &str = "commonSecurityGroup";

/// Output name of the i-th public subnet.
pub fn public_subnet_output(index: usize) -> String {
    format!("publicAZ{}", index)
}

/// Output name of the i-th private subnet.
pub fn private_subnet_output(index: usize) -> String {
    format!("privateAZ{}", index)
}

/// The root template and the references it shares with every child.
#[derive(Debug, Clone)]
pub struct NetworkRoot {
    pub template: Template,
    pub well_known: WellKnownRefs,
    pub public_subnets: Vec<Ipv4Cidr>,
    pub private_subnets: Vec<Ipv4Cidr>,
}

impl NetworkRoot {
    /// Build the network for `config`.
    ///
    /// Public subnets take the first `n` carved ranges and private subnets
    /// the next `n`, so `10.0.0.0/16` with three zones yields public
    /// `10.0.0.0/24`-`10.0.2.0/24` and private `10.0.3.0/24`-`10.0.5.0/24`.
    pub fn build(config: &FrederickConfig, cidr: Ipv4Cidr) -> ComposeResult<Self> {
        let zones = config.network.zone_names(&config.region);
        if zones.is_empty() {
            return Err(ComposeError::validation(
                "network.availability_zones",
                "at least one availability zone is required",
            ));
        }
        let carved = cidr.subnets(config.network.subnet_size, zones.len() * 2)?;
        let (public_subnets, private_subnets) = carved.split_at(zones.len());

        info!(
            "Building network root {} ({} across {} zones)",
            config.environment_name,
            cidr,
            zones.len()
        );

        let mut template = Template::new(config.environment_name.clone()).with_description(
            format!("Frederick environment {}", config.environment_name),
        );

        let vpc = template.add(
            ResourceBuilder::new(ResourceKind::Vpc, "VPC")
                .property("CidrBlock", cidr.to_string())
                .property("EnableDnsSupport", true)
                .property("EnableDnsHostnames", true)
                .build()?,
        )?;

        let gateway = template.add(ResourceBuilder::new(ResourceKind::InternetGateway, "InternetGateway").build()?)?;
        let attachment = template.add(
            ResourceBuilder::new(ResourceKind::VpcGatewayAttachment, "GatewayAttachment")
                .property("VpcId", vpc.to_ref())
                .property("InternetGatewayId", gateway.to_ref())
                .build()?,
        )?;

        let public_table = route_table(&mut template, "PublicRouteTable", &vpc)?;
        template.add(
            ResourceBuilder::new(ResourceKind::Route, "PublicDefaultRoute")
                .property("RouteTableId", public_table.to_ref())
                .property("DestinationCidrBlock", "0.0.0.0/0")
                .property("GatewayId", gateway.to_ref())
                .depends_on(attachment.logical_id())
                .build()?,
        )?;

        let mut public_refs = Vec::new();
        for (i, (subnet, zone)) in public_subnets.iter().zip(&zones).enumerate() {
            let reference = subnet_in(&mut template, &format!("PublicSubnet{}", i), &vpc, subnet, zone, true)?;
            associate(&mut template, &reference, &public_table)?;
            public_refs.push(reference);
        }

        let eip = template.add(
            ResourceBuilder::new(ResourceKind::Eip, "NatEip")
                .property("Domain", "vpc")
                .depends_on(attachment.logical_id())
                .build()?,
        )?;
        let nat_subnet = public_refs.first().ok_or_else(|| {
            ComposeError::validation("network.availability_zones", "no public subnet for the NAT gateway")
        })?;
        let nat = template.add(
            ResourceBuilder::new(ResourceKind::NatGateway, "NatGateway")
                .property("AllocationId", eip.attr("AllocationId"))
                .property("SubnetId", nat_subnet.to_ref())
                .build()?,
        )?;

        let private_table = route_table(&mut template, "PrivateRouteTable", &vpc)?;
        template.add(
            ResourceBuilder::new(ResourceKind::Route, "PrivateDefaultRoute")
                .property("RouteTableId", private_table.to_ref())
                .property("DestinationCidrBlock", "0.0.0.0/0")
                .property("NatGatewayId", nat.to_ref())
                .build()?,
        )?;

        let mut private_refs = Vec::new();
        for (i, (subnet, zone)) in private_subnets.iter().zip(&zones).enumerate() {
            let reference = subnet_in(&mut template, &format!("PrivateSubnet{}", i), &vpc, subnet, zone, false)?;
            associate(&mut template, &reference, &private_table)?;
            private_refs.push(reference);
        }

        let cidr_text = cidr.to_string();
        let common = template.add(
            ResourceBuilder::new(ResourceKind::SecurityGroup, COMMON_SECURITY_GROUP)
                .property(
                    "GroupDescription",
                    "Security Group allows ingress and egress for common usage patterns throughout this deployed infrastructure.",
                )
                .property("VpcId", vpc.to_ref())
                .property(
                    "SecurityGroupEgress",
                    PropertyValue::list([
                        cidr_rule("tcp", 0, 65535, &cidr_text),
                        cidr_rule("udp", 0, 65535, &cidr_text),
                    ]),
                )
                .property("SecurityGroupIngress", PropertyValue::List(Vec::new()))
                .build()?,
        )?;

        template.declare_output(VPC_ID, &vpc)?;
        for (i, reference) in public_refs.iter().enumerate() {
            template.declare_output(public_subnet_output(i), reference)?;
        }
        for (i, reference) in private_refs.iter().enumerate() {
            template.declare_output(private_subnet_output(i), reference)?;
        }

        let mut well_known = WellKnownRefs::new();
        well_known.insert(COMMON_SECURITY_GROUP, common.to_ref());

        debug!("Network root has {} resources", template.resources().len());

        Ok(Self {
            template,
            well_known,
            public_subnets: public_subnets.to_vec(),
            private_subnets: private_subnets.to_vec(),
        })
    }
}

fn route_table(template: &mut Template, logical_id: &str, vpc: &Reference) -> ComposeResult<Reference> {
    Ok(template.add(
        ResourceBuilder::new(ResourceKind::RouteTable, logical_id)
            .property("VpcId", vpc.to_ref())
            .build()?,
    )?)
}

fn subnet_in(
    template: &mut Template,
    logical_id: &str,
    vpc: &Reference,
    cidr: &Ipv4Cidr,
    zone: &str,
    public: bool,
) -> ComposeResult<Reference> {
    Ok(template.add(
        ResourceBuilder::new(ResourceKind::Subnet, logical_id)
            .property("VpcId", vpc.to_ref())
            .property("CidrBlock", cidr.to_string())
            .property("AvailabilityZone", zone)
            .property("MapPublicIpOnLaunch", public)
            .build()?,
    )?)
}

fn associate(template: &mut Template, subnet: &Reference, table: &Reference) -> ComposeResult<()> {
    template.add(
        ResourceBuilder::new(
            ResourceKind::SubnetRouteTableAssociation,
            format!("{}RouteTableAssociation", subnet.logical_id()),
        )
        .property("SubnetId", subnet.to_ref())
        .property("RouteTableId", table.to_ref())
        .build()?,
    )?;
    Ok(())
}
