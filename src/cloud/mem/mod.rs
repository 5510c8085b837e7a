use crate::cloud::Cloud;
use crate::cloud::InstanceState;
use crate::cloud::InstanceStateChange;
use crate::cloud::InstanceStateCode;
use crate::cloud::InstanceStatus;
use crate::cloud::Revocation;
use crate::cloud::SecurityGroup;
use crate::errors::*;
use crate::iprules::IpPermission;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::ops::Range;

/// An in-memory provider. Ids are handed out in creation order, so lookups are deterministic.
pub struct MemCloud {
    state: RefCell<MemCloudState>,
}

struct MemCloudState {
    ids: Range<u32>,
    instances: BTreeMap<String, MemInstance>,
    security_groups: BTreeMap<String, MemSecurityGroup>,
    authorize_calls: usize,
    revoke_calls: usize,
}

struct MemInstance {
    name_tag: Option<String>,
    availability_zone: String,
    code: InstanceStateCode,
}

struct MemSecurityGroup {
    group_name: String,
    name_tag: Option<String>,
    ip_permissions: Vec<IpPermission>,
}

impl MemCloud {
    pub fn new() -> Result<MemCloud> {
        Ok(MemCloud {
            state: RefCell::new(MemCloudState {
                ids: 0..u32::MAX,
                instances: BTreeMap::new(),
                security_groups: BTreeMap::new(),
                authorize_calls: 0,
                revoke_calls: 0,
            }),
        })
    }

    pub fn create_instance(&self, name_tag: Option<&str>) -> Result<String> {
        let mut state = self.state.borrow_mut();
        let id = format!("i-{:08x}", state.fresh_id()?);
        state.instances.insert(
            id.clone(),
            MemInstance {
                name_tag: name_tag.map(str::to_owned),
                availability_zone: "ap-northeast-1a".to_owned(),
                code: InstanceStateCode::Stopped,
            },
        );
        Ok(id)
    }

    pub fn create_security_group(&self, group_name: &str, name_tag: Option<&str>) -> Result<String> {
        let mut state = self.state.borrow_mut();
        let id = format!("sg-{:08x}", state.fresh_id()?);
        state.security_groups.insert(
            id.clone(),
            MemSecurityGroup {
                group_name: group_name.to_owned(),
                name_tag: name_tag.map(str::to_owned),
                ip_permissions: Vec::new(),
            },
        );
        Ok(id)
    }

    pub fn instance_state(&self, instance_id: &str) -> Option<InstanceStateCode> {
        let state = self.state.borrow();
        state.instances.get(instance_id).map(|i| i.code)
    }

    pub fn set_instance_state(&self, instance_id: &str, code: InstanceStateCode) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let instance = state.instance_mut(instance_id)?;
        instance.code = code;
        Ok(())
    }

    pub fn authorize_calls(&self) -> usize {
        self.state.borrow().authorize_calls
    }

    pub fn revoke_calls(&self) -> usize {
        self.state.borrow().revoke_calls
    }

    /// Every (protocol, port, cidr) granted by the group, flattened.
    pub fn rules(&self, group_id: &str) -> Result<Vec<(String, Option<i64>, String)>> {
        let state = self.state.borrow();
        let sg = state
            .security_groups
            .get(group_id)
            .ok_or_else(|| not_found("security group", group_id))?;
        let mut rules = Vec::new();
        for p in &sg.ip_permissions {
            for cidr in p.cidr_strs() {
                rules.push((p.ip_protocol.clone(), p.from_port, cidr.to_owned()));
            }
        }
        Ok(rules)
    }

    fn transition(
        &self,
        instance_ids: &[String],
        target: InstanceStateCode,
    ) -> Result<Vec<InstanceStateChange>> {
        let mut state = self.state.borrow_mut();
        let mut changes = Vec::new();
        for id in instance_ids {
            let instance = state.instance_mut(id)?;
            let previous = instance.code;
            instance.code = target;
            changes.push(InstanceStateChange {
                instance_id: id.clone(),
                current_state: InstanceState::from_code(target),
                previous_state: InstanceState::from_code(previous),
            });
        }
        Ok(changes)
    }
}

impl MemCloudState {
    fn fresh_id(&mut self) -> Result<u32> {
        self.ids.next().ok_or_else(|| "exhausted".into())
    }

    fn instance_mut(&mut self, instance_id: &str) -> Result<&mut MemInstance> {
        self.instances
            .get_mut(instance_id)
            .ok_or_else(|| not_found("instance", instance_id))
    }

    fn security_group_mut(&mut self, group_id: &str) -> Result<&mut MemSecurityGroup> {
        self.security_groups
            .get_mut(group_id)
            .ok_or_else(|| not_found("security group", group_id))
    }
}

fn not_found(kind: &str, id: &str) -> Error {
    ErrorKind::ProviderApi(format!("describe {}", kind), format!("{} does not exist", id)).into()
}

fn same_permission(a: &IpPermission, b: &IpPermission) -> bool {
    a.ip_protocol == b.ip_protocol && a.from_port == b.from_port && a.to_port == b.to_port
}

impl Cloud for MemCloud {
    fn find_instance_ids(&self, name_tag: &str) -> Result<Vec<String>> {
        let state = self.state.borrow();
        Ok(state
            .instances
            .iter()
            .filter(|(_, i)| i.name_tag.as_ref().map(String::as_str) == Some(name_tag))
            .map(|(id, _)| id.clone())
            .collect())
    }

    fn find_security_group_ids(&self, name_tag: &str) -> Result<Vec<String>> {
        let state = self.state.borrow();
        Ok(state
            .security_groups
            .iter()
            .filter(|(_, sg)| sg.name_tag.as_ref().map(String::as_str) == Some(name_tag))
            .map(|(id, _)| id.clone())
            .collect())
    }

    fn start_instances(&self, instance_ids: &[String]) -> Result<Vec<InstanceStateChange>> {
        self.transition(instance_ids, InstanceStateCode::Running)
    }

    fn stop_instances(&self, instance_ids: &[String]) -> Result<Vec<InstanceStateChange>> {
        self.transition(instance_ids, InstanceStateCode::Stopped)
    }

    fn describe_instance_status(
        &self,
        instance_ids: &[String],
        include_all_instances: bool,
    ) -> Result<Vec<InstanceStatus>> {
        let state = self.state.borrow();
        for id in instance_ids {
            if !state.instances.contains_key(id) {
                return Err(not_found("instance", id));
            }
        }
        Ok(state
            .instances
            .iter()
            .filter(|(id, _)| instance_ids.is_empty() || instance_ids.contains(id))
            .filter(|(_, i)| include_all_instances || i.code == InstanceStateCode::Running)
            .map(|(id, i)| InstanceStatus {
                availability_zone: Some(i.availability_zone.clone()),
                instance_id: id.clone(),
                instance_state: InstanceState::from_code(i.code),
                instance_status: Some("ok".to_owned()),
                system_status: Some("ok".to_owned()),
            })
            .collect())
    }

    fn describe_security_groups(&self, group_ids: &[String]) -> Result<Vec<SecurityGroup>> {
        let state = self.state.borrow();
        for id in group_ids {
            if !state.security_groups.contains_key(id) {
                return Err(not_found("security group", id));
            }
        }
        Ok(state
            .security_groups
            .iter()
            .filter(|(id, _)| group_ids.is_empty() || group_ids.contains(id))
            .map(|(id, sg)| SecurityGroup {
                group_id: id.clone(),
                group_name: Some(sg.group_name.clone()),
                name_tag: sg.name_tag.clone(),
                description: None,
                vpc_id: None,
                ip_permissions: sg.ip_permissions.clone(),
            })
            .collect())
    }

    fn authorize_ingress(&self, group_id: &str, permission: &IpPermission) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.authorize_calls += 1;
        let sg = state.security_group_mut(group_id)?;
        match sg
            .ip_permissions
            .iter_mut()
            .find(|p| same_permission(p, permission))
        {
            Some(existing) => {
                for cidr in permission.cidr_strs() {
                    if existing.cidr_strs().any(|c| c == cidr) {
                        bail!(ErrorKind::ProviderApi(
                            "authorize ingress".to_owned(),
                            format!("duplicate permission for {}", cidr)
                        ));
                    }
                }
                existing.ip_ranges.extend(permission.ip_ranges.iter().cloned());
                existing.ipv6_ranges.extend(permission.ipv6_ranges.iter().cloned());
            }
            None => sg.ip_permissions.push(permission.clone()),
        }
        Ok(())
    }

    // like EC2, ranges the group does not grant are reported back rather than failing
    fn revoke_ingress(&self, group_id: &str, permission: &IpPermission) -> Result<Revocation> {
        let mut state = self.state.borrow_mut();
        state.revoke_calls += 1;
        let sg = state.security_group_mut(group_id)?;
        let mut unknown = IpPermission {
            ip_ranges: vec![],
            ipv6_ranges: vec![],
            ..permission.clone()
        };
        match sg
            .ip_permissions
            .iter_mut()
            .find(|p| same_permission(p, permission))
        {
            Some(existing) => {
                for range in &permission.ip_ranges {
                    let before = existing.ip_ranges.len();
                    existing.ip_ranges.retain(|r| r.cidr_ip != range.cidr_ip);
                    if existing.ip_ranges.len() == before {
                        unknown.ip_ranges.push(range.clone());
                    }
                }
                for range in &permission.ipv6_ranges {
                    let before = existing.ipv6_ranges.len();
                    existing.ipv6_ranges.retain(|r| r.cidr_ipv6 != range.cidr_ipv6);
                    if existing.ipv6_ranges.len() == before {
                        unknown.ipv6_ranges.push(range.clone());
                    }
                }
            }
            None => unknown = permission.clone(),
        }
        sg.ip_permissions
            .retain(|p| !(p.ip_ranges.is_empty() && p.ipv6_ranges.is_empty()));
        let mut unknown_permissions = vec![unknown];
        unknown_permissions.retain(|p| !(p.ip_ranges.is_empty() && p.ipv6_ranges.is_empty()));
        Ok(Revocation {
            accepted: true,
            unknown_permissions,
        })
    }
}
