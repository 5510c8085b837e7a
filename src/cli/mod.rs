mod dispatch;
mod parse;

pub use crate::cli::dispatch::dispatch;
pub use crate::cli::dispatch::Outcome;
pub use crate::cli::dispatch::RuleChange;
pub use crate::cli::parse::parse_from_safe;

use crate::config::Settings;
use crate::iprules::IpProtocol;
use ipnet::IpNet;

#[derive(Debug, PartialEq)]
pub struct Invocation {
    pub settings: Settings,
    pub command: Command,
}

/// A resource given either by its identifier or by its `Name` tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceRef {
    Id(String),
    NameTag(String),
}

/// A rule as given on the command line; the source network may still need the public IP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSpec {
    pub protocol: IpProtocol,
    pub port: u16,
    pub cidr: Option<IpNet>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Start {
        instance: ResourceRef,
        wait: bool,
    },
    Stop {
        instance: ResourceRef,
        wait: bool,
    },
    Status {
        instance: Option<ResourceRef>,
        include_all: bool,
        detail: bool,
    },
    ShowInstanceId {
        name_tag: String,
    },
    ShowGroupId {
        name_tag: String,
    },
    ShowPublicIp,
    RuleAdd {
        group: ResourceRef,
        rule: RuleSpec,
    },
    RuleRemove {
        group: ResourceRef,
        rule: RuleSpec,
    },
    RuleList {
        group: Option<ResourceRef>,
        detail: bool,
    },
}

impl Command {
    /// Whether the full provider response was asked for instead of the summary.
    pub fn detail(&self) -> bool {
        match *self {
            Command::Status { detail, .. } | Command::RuleList { detail, .. } => detail,
            _ => false,
        }
    }
}
