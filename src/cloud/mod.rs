pub mod aws;
#[cfg(test)]
pub mod mem;

use crate::errors::*;
use crate::iprules::IpPermission;
use serde::Serialize;
use std::fmt;

pub trait Cloud {
    /// Instance ids carrying the given `Name` tag, in provider order.
    fn find_instance_ids(&self, name_tag: &str) -> Result<Vec<String>>;
    /// Security group ids carrying the given `Name` tag, in provider order.
    fn find_security_group_ids(&self, name_tag: &str) -> Result<Vec<String>>;

    fn start_instances(&self, instance_ids: &[String]) -> Result<Vec<InstanceStateChange>>;
    fn stop_instances(&self, instance_ids: &[String]) -> Result<Vec<InstanceStateChange>>;
    // an empty id list describes every instance
    fn describe_instance_status(
        &self,
        instance_ids: &[String],
        include_all_instances: bool,
    ) -> Result<Vec<InstanceStatus>>;

    // an empty id list describes every security group
    fn describe_security_groups(&self, group_ids: &[String]) -> Result<Vec<SecurityGroup>>;
    fn authorize_ingress(&self, group_id: &str, permission: &IpPermission) -> Result<()>;
    fn revoke_ingress(&self, group_id: &str, permission: &IpPermission) -> Result<Revocation>;
}

/// What the provider reports back for a revoke request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revocation {
    pub accepted: bool,
    /// Requested permissions the group did not grant; nothing was revoked for these.
    pub unknown_permissions: Vec<IpPermission>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstanceState {
    pub code: Option<i64>,
    pub name: Option<String>,
}

impl InstanceState {
    pub fn from_code(code: InstanceStateCode) -> InstanceState {
        InstanceState {
            code: Some(i64::from(u8::from(code))),
            name: Some(code.to_string()),
        }
    }

    pub fn state_code(&self) -> InstanceStateCode {
        match self.code {
            // the high byte is internal to the provider
            Some(code) => ((code & 0xff) as u8).into(),
            None => InstanceStateCode::Unknown(0xff),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstanceStateChange {
    pub instance_id: String,
    pub current_state: InstanceState,
    pub previous_state: InstanceState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstanceStatus {
    pub availability_zone: Option<String>,
    pub instance_id: String,
    pub instance_state: InstanceState,
    pub instance_status: Option<String>,
    pub system_status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SecurityGroup {
    pub group_id: String,
    pub group_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_tag: Option<String>,
    pub description: Option<String>,
    pub vpc_id: Option<String>,
    pub ip_permissions: Vec<IpPermission>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InstanceStateCode {
    Pending,
    Running,
    Terminating, // called "shutting-down" by AWS
    Terminated,
    Stopping,
    Stopped,
    Unknown(u8),
}

impl From<u8> for InstanceStateCode {
    fn from(code: u8) -> InstanceStateCode {
        match code {
            0 => InstanceStateCode::Pending,
            16 => InstanceStateCode::Running,
            32 => InstanceStateCode::Terminating,
            48 => InstanceStateCode::Terminated,
            64 => InstanceStateCode::Stopping,
            80 => InstanceStateCode::Stopped,
            x => InstanceStateCode::Unknown(x),
        }
    }
}

impl From<InstanceStateCode> for u8 {
    fn from(code: InstanceStateCode) -> u8 {
        match code {
            InstanceStateCode::Pending => 0,
            InstanceStateCode::Running => 16,
            InstanceStateCode::Terminating => 32,
            InstanceStateCode::Terminated => 48,
            InstanceStateCode::Stopping => 64,
            InstanceStateCode::Stopped => 80,
            InstanceStateCode::Unknown(x) => x,
        }
    }
}

impl fmt::Display for InstanceStateCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            InstanceStateCode::Pending => f.write_str("pending"),
            InstanceStateCode::Running => f.write_str("running"),
            InstanceStateCode::Terminating => f.write_str("shutting-down"),
            InstanceStateCode::Terminated => f.write_str("terminated"),
            InstanceStateCode::Stopping => f.write_str("stopping"),
            InstanceStateCode::Stopped => f.write_str("stopped"),
            InstanceStateCode::Unknown(x) => write!(f, "unknown({})", x),
        }
    }
}
