use crate::errors::*;
use ipnet::IpNet;
use ipnet::Ipv4Net;
use ipnet::Ipv6Net;
use serde::Serialize;
use std::fmt;
use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::result;
use std::str;
use std::str::FromStr;

#[derive(Copy, Clone, Hash, PartialEq, Eq)]
pub enum IpProtocol {
    Tcp,
    Udp,
    Icmp,
}

impl IpProtocol {
    pub fn as_str(&self) -> &'static str {
        match *self {
            IpProtocol::Tcp => "tcp",
            IpProtocol::Udp => "udp",
            IpProtocol::Icmp => "icmp",
        }
    }
}

impl fmt::Display for IpProtocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for IpProtocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ParseIpProtocolError(());

impl fmt::Display for ParseIpProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("invalid IP protocol (expected tcp, udp or icmp)")
    }
}

impl ::std::error::Error for ParseIpProtocolError {}

impl str::FromStr for IpProtocol {
    type Err = ParseIpProtocolError;

    fn from_str(s: &str) -> result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_ref() {
            "tcp" => Ok(IpProtocol::Tcp),
            "udp" => Ok(IpProtocol::Udp),
            "icmp" => Ok(IpProtocol::Icmp),
            _ => Err(ParseIpProtocolError(())),
        }
    }
}

/// An ingress rule as requested on the command line: one port, one source network.
#[derive(Copy, Clone, Hash, PartialEq, Eq)]
pub struct IpIngressRule {
    pub protocol: IpProtocol,
    pub port: u16,
    pub cidr: IpNet,
}

impl IpIngressRule {
    /// Rules are identified by port and source network; the protocol is not compared.
    pub fn matches(&self, permission: &IpPermission) -> bool {
        self.narrow(permission).is_some()
    }

    /// The part of `permission` this rule identifies: the permission's own protocol and
    /// ports, with only the ranges equal to the rule's source network.
    pub fn narrow(&self, permission: &IpPermission) -> Option<IpPermission> {
        if permission.from_port != Some(i64::from(self.port)) {
            return None;
        }
        let same_net = |s: &str| {
            IpNet::from_str(s)
                .map(|cidr| cidr.trunc() == self.cidr.trunc())
                .unwrap_or(false)
        };
        let ip_ranges: Vec<IpRange> = permission
            .ip_ranges
            .iter()
            .filter(|r| same_net(&r.cidr_ip))
            .cloned()
            .collect();
        let ipv6_ranges: Vec<Ipv6Range> = permission
            .ipv6_ranges
            .iter()
            .filter(|r| same_net(&r.cidr_ipv6))
            .cloned()
            .collect();
        if ip_ranges.is_empty() && ipv6_ranges.is_empty() {
            return None;
        }
        Some(IpPermission {
            ip_protocol: permission.ip_protocol.clone(),
            from_port: permission.from_port,
            to_port: permission.to_port,
            ip_ranges,
            ipv6_ranges,
        })
    }
}

impl fmt::Debug for IpIngressRule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{} -> {}", self.port, self.protocol, self.cidr)
    }
}

impl<'a> From<&'a IpIngressRule> for IpPermission {
    fn from(rule: &'a IpIngressRule) -> IpPermission {
        let (ip_ranges, ipv6_ranges) = match rule.cidr {
            IpNet::V4(ipv4_cidr) => (vec![IpRange::new(ipv4_cidr.to_string())], vec![]),
            IpNet::V6(ipv6_cidr) => (vec![], vec![Ipv6Range::new(ipv6_cidr.to_string())]),
        };
        IpPermission {
            ip_protocol: rule.protocol.as_str().to_owned(),
            from_port: Some(rule.port.into()),
            to_port: Some(rule.port.into()),
            ip_ranges,
            ipv6_ranges,
        }
    }
}

/// An ingress permission as the provider reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct IpPermission {
    pub ip_protocol: String,
    pub from_port: Option<i64>,
    pub to_port: Option<i64>,
    pub ip_ranges: Vec<IpRange>,
    #[serde(rename = "Ipv6Ranges")]
    pub ipv6_ranges: Vec<Ipv6Range>,
}

impl IpPermission {
    /// Source ranges as strings, IPv4 first.
    pub fn cidr_strs<'a>(&'a self) -> impl Iterator<Item = &'a str> + 'a {
        let v4 = self.ip_ranges.iter().map(|r| r.cidr_ip.as_str());
        let v6 = self.ipv6_ranges.iter().map(|r| r.cidr_ipv6.as_str());
        v4.chain(v6)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct IpRange {
    pub cidr_ip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl IpRange {
    pub fn new<S: Into<String>>(cidr_ip: S) -> IpRange {
        IpRange {
            cidr_ip: cidr_ip.into(),
            description: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Ipv6Range {
    #[serde(rename = "CidrIpv6")]
    pub cidr_ipv6: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Ipv6Range {
    pub fn new<S: Into<String>>(cidr_ipv6: S) -> Ipv6Range {
        Ipv6Range {
            cidr_ipv6: cidr_ipv6.into(),
            description: None,
        }
    }
}

/// Parses a CIDR network, widening a bare address to a single-host network.
/// Host bits are cleared, so `10.0.0.5/24` becomes `10.0.0.0/24`.
pub fn parse_cidr(s: &str) -> Result<IpNet> {
    if s.contains('/') {
        IpNet::from_str(s)
            .map(|cidr| cidr.trunc())
            .chain_err(|| format!("not an IP network: {}", s))
    } else {
        IpAddr::from_str(s)
            .chain_err(|| format!("not an IP address: {}", s))
            .map(host_net)
    }
}

pub fn host_net(addr: IpAddr) -> IpNet {
    match addr {
        IpAddr::V4(addr) => single_v4(addr),
        IpAddr::V6(addr) => IpNet::V6(Ipv6Net::new(addr, 128).expect("128 is OK")),
    }
}

pub fn single_v4(addr: Ipv4Addr) -> IpNet {
    IpNet::V4(Ipv4Net::new(addr, 32).expect("32 is OK"))
}
