use crate::cloud::aws::next_page;
use crate::cloud::aws::tags::name_tag_filter;
use crate::cloud::aws::tags::TagFinder;
use crate::cloud::aws::AwsCloud;
use crate::cloud::Revocation;
use crate::cloud::SecurityGroup;
use crate::errors::*;
use crate::iprules;
use rusoto_ec2::AuthorizeSecurityGroupIngressRequest;
use rusoto_ec2::DescribeSecurityGroupsRequest;
use rusoto_ec2::Ec2;
use rusoto_ec2::Filter;
use rusoto_ec2::IpPermission;
use rusoto_ec2::IpRange;
use rusoto_ec2::Ipv6Range;
use rusoto_ec2::RevokeSecurityGroupIngressRequest;
use rusoto_ec2::RevokeSecurityGroupIngressResult;
use rusoto_ec2::SecurityGroup as Ec2SecurityGroup;
use tracing::debug;

impl AwsCloud {
    pub(super) fn security_group_ids_by_name(&self, name_tag: &str) -> Result<Vec<String>> {
        let groups = self.list_security_groups(None, Some(name_tag_filter(name_tag)))?;
        Ok(groups.into_iter().filter_map(|sg| sg.group_id).collect())
    }

    pub(super) fn security_groups(&self, group_ids: &[String]) -> Result<Vec<SecurityGroup>> {
        let group_ids = if group_ids.is_empty() {
            None
        } else {
            Some(group_ids.to_vec())
        };
        let groups = self.list_security_groups(group_ids, None)?;
        Ok(groups.into_iter().map(to_security_group).collect())
    }

    fn list_security_groups(
        &self,
        group_ids: Option<Vec<String>>,
        filter: Option<Filter>,
    ) -> Result<Vec<Ec2SecurityGroup>> {
        let mut groups = Vec::new();
        let mut next_token = None;
        loop {
            let req = DescribeSecurityGroupsRequest {
                group_ids: group_ids.clone(),
                filters: filter.clone().map(|f| vec![f]),
                next_token: next_token.take(),
                ..Default::default()
            };
            debug!(?req, "describing security groups");
            let resp = self
                .runtime
                .block_on(self.client.describe_security_groups(req))
                .map_err(|e| api_error("describe security groups", e))?;
            groups.extend(resp.security_groups.unwrap_or_default());
            next_token = next_page(resp.next_token);
            if next_token.is_none() {
                break;
            }
        }
        Ok(groups)
    }

    pub(super) fn request_authorize(
        &self,
        group_id: &str,
        permission: &iprules::IpPermission,
    ) -> Result<()> {
        let req = AuthorizeSecurityGroupIngressRequest {
            group_id: Some(group_id.to_owned()),
            ip_permissions: Some(vec![to_ip_permission(permission)]),
            ..Default::default()
        };
        debug!(?req, "authorizing ingress");
        self.runtime
            .block_on(self.client.authorize_security_group_ingress(req))
            .map_err(|e| {
                api_error(
                    &format!("authorize ingress for security group {}", group_id),
                    e,
                )
            })?;
        Ok(())
    }

    pub(super) fn request_revoke(
        &self,
        group_id: &str,
        permission: &iprules::IpPermission,
    ) -> Result<Revocation> {
        let req = RevokeSecurityGroupIngressRequest {
            group_id: Some(group_id.to_owned()),
            ip_permissions: Some(vec![to_ip_permission(permission)]),
            ..Default::default()
        };
        debug!(?req, "revoking ingress");
        let resp = self
            .runtime
            .block_on(self.client.revoke_security_group_ingress(req))
            .map_err(|e| {
                api_error(
                    &format!("revoke ingress for security group {}", group_id),
                    e,
                )
            })?;
        debug!(?resp, "revoked ingress");
        Ok(to_revocation(resp))
    }
}

fn to_revocation(resp: RevokeSecurityGroupIngressResult) -> Revocation {
    Revocation {
        accepted: resp.return_.unwrap_or(false),
        unknown_permissions: resp
            .unknown_ip_permissions
            .unwrap_or_default()
            .into_iter()
            .map(from_ip_permission)
            .collect(),
    }
}

fn to_security_group(sg: Ec2SecurityGroup) -> SecurityGroup {
    let name_tag = sg
        .tags
        .as_ref()
        .and_then(|tags| tags.find_tag("Name"))
        .map(str::to_owned);
    SecurityGroup {
        group_id: sg.group_id.unwrap_or_default(),
        group_name: sg.group_name,
        name_tag,
        description: sg.description,
        vpc_id: sg.vpc_id,
        ip_permissions: sg
            .ip_permissions
            .unwrap_or_default()
            .into_iter()
            .map(from_ip_permission)
            .collect(),
    }
}

fn from_ip_permission(p: IpPermission) -> iprules::IpPermission {
    iprules::IpPermission {
        ip_protocol: p.ip_protocol.unwrap_or_default(),
        from_port: p.from_port,
        to_port: p.to_port,
        ip_ranges: p
            .ip_ranges
            .unwrap_or_default()
            .into_iter()
            .filter_map(|r| {
                let description = r.description;
                r.cidr_ip.map(|cidr_ip| iprules::IpRange {
                    cidr_ip,
                    description,
                })
            })
            .collect(),
        ipv6_ranges: p
            .ipv_6_ranges
            .unwrap_or_default()
            .into_iter()
            .filter_map(|r| {
                let description = r.description;
                r.cidr_ipv_6.map(|cidr_ipv6| iprules::Ipv6Range {
                    cidr_ipv6,
                    description,
                })
            })
            .collect(),
    }
}

fn to_ip_permission(p: &iprules::IpPermission) -> IpPermission {
    let ip_ranges: Vec<IpRange> = p
        .ip_ranges
        .iter()
        .map(|r| IpRange {
            cidr_ip: Some(r.cidr_ip.clone()),
            description: r.description.clone(),
        })
        .collect();
    let ipv_6_ranges: Vec<Ipv6Range> = p
        .ipv6_ranges
        .iter()
        .map(|r| Ipv6Range {
            cidr_ipv_6: Some(r.cidr_ipv6.clone()),
            description: r.description.clone(),
        })
        .collect();
    IpPermission {
        ip_protocol: Some(p.ip_protocol.clone()),
        from_port: p.from_port,
        to_port: p.to_port,
        ip_ranges: if ip_ranges.is_empty() {
            None
        } else {
            Some(ip_ranges)
        },
        ipv_6_ranges: if ipv_6_ranges.is_empty() {
            None
        } else {
            Some(ipv_6_ranges)
        },
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iprules::IpIngressRule;
    use crate::iprules::IpProtocol;
    use rusoto_ec2::Tag;

    #[test]
    fn test_to_ip_permission_v4() {
        let rule = IpIngressRule {
            protocol: IpProtocol::Tcp,
            port: 22,
            cidr: "10.0.0.5/32".parse().unwrap(),
        };
        let p = to_ip_permission(&iprules::IpPermission::from(&rule));
        assert_eq!(Some("tcp".to_owned()), p.ip_protocol);
        assert_eq!(Some(22), p.from_port);
        assert_eq!(Some(22), p.to_port);
        assert_eq!(
            Some("10.0.0.5/32".to_owned()),
            p.ip_ranges.unwrap()[0].cidr_ip
        );
        assert_eq!(None, p.ipv_6_ranges);
    }

    #[test]
    fn test_to_ip_permission_v6() {
        let rule = IpIngressRule {
            protocol: IpProtocol::Udp,
            port: 500,
            cidr: "2001:db8::/32".parse().unwrap(),
        };
        let p = to_ip_permission(&iprules::IpPermission::from(&rule));
        assert_eq!(None, p.ip_ranges);
        assert_eq!(
            Some("2001:db8::/32".to_owned()),
            p.ipv_6_ranges.unwrap()[0].cidr_ipv_6
        );
    }

    #[test]
    fn test_to_revocation() {
        let revocation = to_revocation(RevokeSecurityGroupIngressResult {
            return_: Some(true),
            unknown_ip_permissions: Some(vec![IpPermission {
                ip_protocol: Some("tcp".to_owned()),
                from_port: Some(22),
                to_port: Some(22),
                ip_ranges: Some(vec![IpRange {
                    cidr_ip: Some("10.0.0.5/32".to_owned()),
                    description: None,
                }]),
                ..Default::default()
            }]),
            ..Default::default()
        });
        assert!(revocation.accepted);
        assert_eq!(1, revocation.unknown_permissions.len());
        assert_eq!(
            vec!["10.0.0.5/32"],
            revocation.unknown_permissions[0].cidr_strs().collect::<Vec<_>>()
        );

        let empty = to_revocation(RevokeSecurityGroupIngressResult::default());
        assert!(!empty.accepted);
        assert!(empty.unknown_permissions.is_empty());
    }

    #[test]
    fn test_to_security_group() {
        let sg = to_security_group(Ec2SecurityGroup {
            group_id: Some("sg-0a1b2c".to_owned()),
            group_name: Some("bastion-sg".to_owned()),
            tags: Some(vec![Tag {
                key: Some("Name".to_owned()),
                value: Some("bastion".to_owned()),
            }]),
            ip_permissions: Some(vec![IpPermission {
                ip_protocol: Some("-1".to_owned()),
                ip_ranges: Some(vec![IpRange {
                    cidr_ip: Some("0.0.0.0/0".to_owned()),
                    description: None,
                }]),
                ..Default::default()
            }]),
            ..Default::default()
        });
        assert_eq!("sg-0a1b2c", sg.group_id);
        assert_eq!(Some("bastion".to_owned()), sg.name_tag);
        assert_eq!(1, sg.ip_permissions.len());
        assert_eq!("-1", sg.ip_permissions[0].ip_protocol);
        assert_eq!(None, sg.ip_permissions[0].from_port);
    }
}
