use crate::cli::Outcome;
use crate::cloud::InstanceStateChange;
use crate::cloud::InstanceStatus;
use crate::cloud::SecurityGroup;
use crate::errors::*;
use serde::Serialize;

pub const NO_DATA: &str = "No data";

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct StartResponse<'a> {
    starting_instances: &'a [InstanceStateChange],
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct StopResponse<'a> {
    stopping_instances: &'a [InstanceStateChange],
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct StatusResponse<'a> {
    instance_statuses: &'a [InstanceStatus],
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct StatusSummary<'a> {
    availability_zone: Option<&'a str>,
    instance_id: &'a str,
    instance_state: Option<&'a str>,
}

#[derive(Serialize)]
struct RuleSummary<'a> {
    #[serde(rename = "FromPort")]
    from_port: Option<i64>,
    #[serde(rename = "IpProtocol")]
    ip_protocol: &'a str,
    #[serde(rename = "CidrIP")]
    cidr_ip: &'a str,
    #[serde(rename = "ToPort")]
    to_port: Option<i64>,
}

/// Renders an outcome for stdout: full JSON when `detail` is set, otherwise a summary.
pub fn render(outcome: &Outcome, detail: bool) -> Result<String> {
    let text = match *outcome {
        Outcome::InstanceId(ref id) | Outcome::GroupId(ref id) => id.clone(),
        Outcome::PublicIp(ref addr) => format!("GlobalIP: {}", addr),
        // the resolved id goes first, so a tag-based request shows what it acted on
        Outcome::Started {
            ref instance_id,
            ref changes,
        } => {
            let response = to_json(&StartResponse {
                starting_instances: changes,
            })?;
            format!("{}\n{}", instance_id, response)
        }
        Outcome::Stopped {
            ref instance_id,
            ref changes,
        } => {
            let response = to_json(&StopResponse {
                stopping_instances: changes,
            })?;
            format!("{}\n{}", instance_id, response)
        }
        Outcome::Statuses(ref statuses) => render_statuses(statuses, detail)?,
        Outcome::SecurityGroups(ref groups) => render_security_groups(groups, detail)?,
        Outcome::RuleAuthorized(ref change) | Outcome::RuleRevoked(ref change) => {
            to_json(change)?
        }
    };
    Ok(text)
}

fn render_statuses(statuses: &[InstanceStatus], detail: bool) -> Result<String> {
    if statuses.is_empty() {
        return Ok(NO_DATA.to_owned());
    }
    if detail {
        return to_json(&StatusResponse {
            instance_statuses: statuses,
        });
    }
    let summaries = statuses
        .iter()
        .map(|s| {
            to_json(&StatusSummary {
                availability_zone: s.availability_zone.as_ref().map(String::as_str),
                instance_id: &s.instance_id,
                instance_state: s.instance_state.name.as_ref().map(String::as_str),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(summaries.join("\n"))
}

fn render_security_groups(groups: &[SecurityGroup], detail: bool) -> Result<String> {
    if groups.is_empty() {
        return Ok(NO_DATA.to_owned());
    }
    if detail {
        return to_json(&groups);
    }
    let mut summaries = Vec::new();
    for sg in groups {
        for p in &sg.ip_permissions {
            for cidr in p.cidr_strs() {
                summaries.push(to_json(&RuleSummary {
                    from_port: p.from_port,
                    ip_protocol: &p.ip_protocol,
                    cidr_ip: cidr,
                    to_port: p.to_port,
                })?);
            }
        }
    }
    if summaries.is_empty() {
        return Ok(NO_DATA.to_owned());
    }
    Ok(summaries.join("\n"))
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}
