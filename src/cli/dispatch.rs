use crate::checkip::PublicIp;
use crate::cli::Command;
use crate::cli::ResourceRef;
use crate::cli::RuleSpec;
use crate::cloud::Cloud;
use crate::cloud::InstanceStateChange;
use crate::cloud::InstanceStateCode;
use crate::cloud::InstanceStatus;
use crate::cloud::Revocation;
use crate::cloud::SecurityGroup;
use crate::errors::*;
use crate::iprules;
use crate::iprules::IpIngressRule;
use crate::iprules::IpPermission;
use serde::Serialize;
use std::net::Ipv4Addr;
use std::thread;
use std::time::Duration;
use tracing::debug;
use tracing::info;
use tracing::warn;

const WAIT_INTERVAL: Duration = Duration::from_secs(1);
const WAIT_ATTEMPTS: u32 = 600;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    InstanceId(String),
    GroupId(String),
    PublicIp(Ipv4Addr),
    Started {
        instance_id: String,
        changes: Vec<InstanceStateChange>,
    },
    Stopped {
        instance_id: String,
        changes: Vec<InstanceStateChange>,
    },
    Statuses(Vec<InstanceStatus>),
    SecurityGroups(Vec<SecurityGroup>),
    RuleAuthorized(RuleChange),
    RuleRevoked(RuleChange),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RuleChange {
    #[serde(rename = "Return")]
    pub accepted: bool,
    pub group_id: String,
    pub ip_permissions: Vec<IpPermission>,
}

pub fn dispatch<C, P>(cmd: Command, cloud: &C, public_ip: &P) -> Result<Outcome>
where
    C: Cloud,
    P: PublicIp,
{
    debug!(?cmd, "running command");

    let outcome = match cmd {
        Command::Start { instance, wait } => {
            let id = resolve_instance(cloud, &instance)?;
            info!(instance_id = %id, "starting instance");
            let changes = cloud.start_instances(&[id.clone()])?;
            if wait {
                wait_for_state(cloud, &id, InstanceStateCode::Running, WAIT_INTERVAL)?;
            }
            Outcome::Started {
                instance_id: id,
                changes,
            }
        }
        Command::Stop { instance, wait } => {
            let id = resolve_instance(cloud, &instance)?;
            info!(instance_id = %id, "stopping instance");
            let changes = cloud.stop_instances(&[id.clone()])?;
            if wait {
                wait_for_state(cloud, &id, InstanceStateCode::Stopped, WAIT_INTERVAL)?;
            }
            Outcome::Stopped {
                instance_id: id,
                changes,
            }
        }
        Command::Status {
            instance,
            include_all,
            ..
        } => {
            let ids = match instance {
                Some(ref instance) => vec![resolve_instance(cloud, instance)?],
                None => vec![],
            };
            Outcome::Statuses(cloud.describe_instance_status(&ids, include_all)?)
        }
        Command::ShowInstanceId { name_tag } => {
            Outcome::InstanceId(resolve_instance(cloud, &ResourceRef::NameTag(name_tag))?)
        }
        Command::ShowGroupId { name_tag } => {
            Outcome::GroupId(resolve_group(cloud, &ResourceRef::NameTag(name_tag))?)
        }
        Command::ShowPublicIp => Outcome::PublicIp(public_ip.public_ip()?),
        Command::RuleAdd { group, rule } => {
            let group_id = resolve_group(cloud, &group)?;
            let rule = complete_rule(&rule, public_ip)?;
            let sg = describe_group(cloud, &group_id)?;
            if sg.ip_permissions.iter().any(|p| rule.matches(p)) {
                info!(group_id = %group_id, ?rule, "rule already present");
                bail!(ErrorKind::RuleAlreadyExists);
            }
            let permission = IpPermission::from(&rule);
            info!(group_id = %group_id, ?rule, "adding rule");
            cloud.authorize_ingress(&group_id, &permission)?;
            Outcome::RuleAuthorized(RuleChange {
                accepted: true,
                group_id,
                ip_permissions: vec![permission],
            })
        }
        Command::RuleRemove { group, rule } => {
            let group_id = resolve_group(cloud, &group)?;
            let rule = complete_rule(&rule, public_ip)?;
            let sg = describe_group(cloud, &group_id)?;
            // revoke what the group actually grants, whatever protocol was asked for
            let permission = match sg.ip_permissions.iter().find_map(|p| rule.narrow(p)) {
                Some(permission) => permission,
                None => {
                    info!(group_id = %group_id, ?rule, "rule not present");
                    bail!(ErrorKind::RuleNotFound);
                }
            };
            info!(
                group_id = %group_id,
                ?rule,
                protocol = %permission.ip_protocol,
                "removing rule"
            );
            let revocation = cloud.revoke_ingress(&group_id, &permission)?;
            check_revocation(&revocation)?;
            Outcome::RuleRevoked(RuleChange {
                accepted: revocation.accepted,
                group_id,
                ip_permissions: vec![permission],
            })
        }
        Command::RuleList { group, .. } => {
            let ids = match group {
                Some(ref group) => vec![resolve_group(cloud, group)?],
                None => vec![],
            };
            Outcome::SecurityGroups(cloud.describe_security_groups(&ids)?)
        }
    };

    Ok(outcome)
}

fn resolve_instance<C: Cloud>(cloud: &C, instance: &ResourceRef) -> Result<String> {
    match *instance {
        ResourceRef::Id(ref id) => Ok(id.clone()),
        ResourceRef::NameTag(ref name_tag) => {
            let ids = cloud.find_instance_ids(name_tag)?;
            first_match("instance", name_tag, ids)
        }
    }
}

fn resolve_group<C: Cloud>(cloud: &C, group: &ResourceRef) -> Result<String> {
    match *group {
        ResourceRef::Id(ref id) => Ok(id.clone()),
        ResourceRef::NameTag(ref name_tag) => {
            let ids = cloud.find_security_group_ids(name_tag)?;
            first_match("security group", name_tag, ids)
        }
    }
}

fn first_match(kind: &'static str, name_tag: &str, ids: Vec<String>) -> Result<String> {
    if ids.len() > 1 {
        warn!(name_tag, ?ids, "several {}s carry this Name tag, using the first", kind);
    }
    let id = ids
        .into_iter()
        .next()
        .ok_or_else(|| ErrorKind::ResourceNotFound(kind, name_tag.to_owned()))?;
    debug!(name_tag, id = %id, "resolved {}", kind);
    Ok(id)
}

fn describe_group<C: Cloud>(cloud: &C, group_id: &str) -> Result<SecurityGroup> {
    cloud
        .describe_security_groups(&[group_id.to_owned()])?
        .into_iter()
        .next()
        .ok_or_else(|| {
            ErrorKind::ProviderApi(
                "describe security group".to_owned(),
                format!("{} was not returned", group_id),
            ).into()
        })
}

// without an explicit source network, only the caller's own address is let in
fn complete_rule<P: PublicIp>(rule: &RuleSpec, public_ip: &P) -> Result<IpIngressRule> {
    let cidr = match rule.cidr {
        Some(cidr) => cidr,
        None => {
            let own_ip_cidr = iprules::single_v4(public_ip.public_ip()?);
            info!(cidr = %own_ip_cidr, "substituted own public IP");
            own_ip_cidr
        }
    };
    Ok(IpIngressRule {
        protocol: rule.protocol,
        port: rule.port,
        cidr,
    })
}

fn check_revocation(revocation: &Revocation) -> Result<()> {
    if !revocation.unknown_permissions.is_empty() {
        warn!(unknown = ?revocation.unknown_permissions, "provider revoked nothing");
        bail!(ErrorKind::RuleNotFound);
    }
    Ok(())
}

fn wait_for_state<C: Cloud>(
    cloud: &C,
    instance_id: &str,
    target: InstanceStateCode,
    interval: Duration,
) -> Result<()> {
    let ids = [instance_id.to_owned()];
    for attempt in 0..WAIT_ATTEMPTS {
        let code = cloud
            .describe_instance_status(&ids, true)?
            .into_iter()
            .next()
            .map(|status| status.instance_state.state_code());
        info!(instance_id, ?code, "instance state");
        match code {
            Some(code) if code == target => return Ok(()),
            Some(InstanceStateCode::Terminating) => bail!("instance is terminating"),
            Some(InstanceStateCode::Terminated) => bail!("instance is terminated"),
            Some(InstanceStateCode::Unknown(x)) => bail!("instance is in unknown state: {}", x),
            // a fresh request may not be visible yet
            _ => (),
        }
        debug!(attempt, "waiting for instance to be {}", target);
        thread::sleep(interval);
    }
    bail!("gave up waiting for instance {} to be {}", instance_id, target)
}
