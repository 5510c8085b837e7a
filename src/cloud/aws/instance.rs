use crate::cloud::aws::next_page;
use crate::cloud::aws::tags::filter;
use crate::cloud::aws::AwsCloud;
use crate::cloud::InstanceState;
use crate::cloud::InstanceStateChange;
use crate::cloud::InstanceStatus;
use crate::errors::*;
use rusoto_ec2::DescribeInstanceStatusRequest;
use rusoto_ec2::DescribeTagsRequest;
use rusoto_ec2::Ec2;
use rusoto_ec2::Filter;
use rusoto_ec2::InstanceState as Ec2InstanceState;
use rusoto_ec2::InstanceStateChange as Ec2InstanceStateChange;
use rusoto_ec2::InstanceStatus as Ec2InstanceStatus;
use rusoto_ec2::StartInstancesRequest;
use rusoto_ec2::StopInstancesRequest;
use rusoto_ec2::TagDescription;
use tracing::debug;

impl AwsCloud {
    pub(super) fn instance_ids_by_name(&self, name_tag: &str) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut next_token = None;
        loop {
            let req = DescribeTagsRequest {
                filters: Some(name_tag_filters(name_tag)),
                next_token: next_token.take(),
                ..Default::default()
            };
            debug!(?req, "describing tags");
            let resp = self
                .runtime
                .block_on(self.client.describe_tags(req))
                .map_err(|e| api_error("describe tags", e))?;
            push_resource_ids(&mut ids, resp.tags.unwrap_or_default());
            next_token = next_page(resp.next_token);
            if next_token.is_none() {
                break;
            }
        }
        Ok(ids)
    }

    pub(super) fn request_start(&self, instance_ids: &[String]) -> Result<Vec<InstanceStateChange>> {
        let req = StartInstancesRequest {
            instance_ids: instance_ids.to_vec(),
            ..Default::default()
        };
        let resp = self
            .runtime
            .block_on(self.client.start_instances(req))
            .map_err(|e| api_error(&format!("start instances {:?}", instance_ids), e))?;
        Ok(resp
            .starting_instances
            .unwrap_or_default()
            .into_iter()
            .map(to_state_change)
            .collect())
    }

    pub(super) fn request_stop(&self, instance_ids: &[String]) -> Result<Vec<InstanceStateChange>> {
        let req = StopInstancesRequest {
            instance_ids: instance_ids.to_vec(),
            ..Default::default()
        };
        let resp = self
            .runtime
            .block_on(self.client.stop_instances(req))
            .map_err(|e| api_error(&format!("stop instances {:?}", instance_ids), e))?;
        Ok(resp
            .stopping_instances
            .unwrap_or_default()
            .into_iter()
            .map(to_state_change)
            .collect())
    }

    pub(super) fn instance_statuses(
        &self,
        instance_ids: &[String],
        include_all_instances: bool,
    ) -> Result<Vec<InstanceStatus>> {
        let mut statuses = Vec::new();
        let mut next_token = None;
        loop {
            let req = DescribeInstanceStatusRequest {
                instance_ids: if instance_ids.is_empty() {
                    None
                } else {
                    Some(instance_ids.to_vec())
                },
                include_all_instances: Some(include_all_instances),
                next_token: next_token.take(),
                ..Default::default()
            };
            debug!(?req, "describing instance status");
            let resp = self
                .runtime
                .block_on(self.client.describe_instance_status(req))
                .map_err(|e| api_error("describe instance status", e))?;
            statuses.extend(
                resp.instance_statuses
                    .unwrap_or_default()
                    .into_iter()
                    .map(to_status),
            );
            next_token = next_page(resp.next_token);
            if next_token.is_none() {
                break;
            }
        }
        Ok(statuses)
    }
}

// one description per Name tag; `tag:Name` would return every tag of the matching instances
fn name_tag_filters(name_tag: &str) -> Vec<Filter> {
    vec![
        filter("key", "Name"),
        filter("value", name_tag),
        filter("resource-type", "instance"),
    ]
}

fn push_resource_ids(ids: &mut Vec<String>, tags: Vec<TagDescription>) {
    for id in tags.into_iter().filter_map(|tag| tag.resource_id) {
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
}

fn to_state(state: Option<Ec2InstanceState>) -> InstanceState {
    let state = state.unwrap_or_default();
    InstanceState {
        code: state.code,
        name: state.name,
    }
}

fn to_state_change(change: Ec2InstanceStateChange) -> InstanceStateChange {
    InstanceStateChange {
        instance_id: change.instance_id.unwrap_or_default(),
        current_state: to_state(change.current_state),
        previous_state: to_state(change.previous_state),
    }
}

fn to_status(status: Ec2InstanceStatus) -> InstanceStatus {
    InstanceStatus {
        availability_zone: status.availability_zone,
        instance_id: status.instance_id.unwrap_or_default(),
        instance_state: to_state(status.instance_state),
        instance_status: status.instance_status.and_then(|s| s.status),
        system_status: status.system_status.and_then(|s| s.status),
    }
}
