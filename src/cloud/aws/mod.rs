use crate::cloud::Cloud;
use crate::cloud::InstanceStateChange;
use crate::cloud::InstanceStatus;
use crate::cloud::Revocation;
use crate::cloud::SecurityGroup;
use crate::config::Settings;
use crate::errors::*;
use crate::iprules::IpPermission;
use rusoto_core::credential::DefaultCredentialsProvider;
use rusoto_core::credential::ProfileProvider;
use rusoto_core::HttpClient;
use rusoto_ec2::Ec2Client;
use tokio::runtime;
use tokio::runtime::Runtime;
use tracing::debug;

mod firewall;
mod instance;
mod tags;

pub struct AwsCloud {
    client: Ec2Client,
    runtime: Runtime,
}

impl AwsCloud {
    pub fn new(settings: &Settings) -> Result<AwsCloud> {
        let region = settings.region()?;
        let dispatcher = HttpClient::new().chain_err(|| "could not create TLS client")?;
        let ec2 = match settings.profile {
            Some(ref profile) => {
                let mut provider = ProfileProvider::new().map_err(|e| {
                    ErrorKind::AuthenticationFailure(format!("profile {}: {}", profile, e))
                })?;
                provider.set_profile(profile.as_str());
                Ec2Client::new_with(dispatcher, provider, region.clone())
            }
            None => {
                let provider = DefaultCredentialsProvider::new()
                    .map_err(|e| ErrorKind::AuthenticationFailure(e.to_string()))?;
                Ec2Client::new_with(dispatcher, provider, region.clone())
            }
        };
        let runtime = runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .chain_err(|| "could not create async runtime")?;
        debug!(region = region.name(), profile = ?settings.profile, "created EC2 client");
        Ok(AwsCloud {
            client: ec2,
            runtime,
        })
    }
}

impl Cloud for AwsCloud {
    fn find_instance_ids(&self, name_tag: &str) -> Result<Vec<String>> {
        self.instance_ids_by_name(name_tag)
    }

    fn find_security_group_ids(&self, name_tag: &str) -> Result<Vec<String>> {
        self.security_group_ids_by_name(name_tag)
    }

    fn start_instances(&self, instance_ids: &[String]) -> Result<Vec<InstanceStateChange>> {
        self.request_start(instance_ids)
    }

    fn stop_instances(&self, instance_ids: &[String]) -> Result<Vec<InstanceStateChange>> {
        self.request_stop(instance_ids)
    }

    fn describe_instance_status(
        &self,
        instance_ids: &[String],
        include_all_instances: bool,
    ) -> Result<Vec<InstanceStatus>> {
        self.instance_statuses(instance_ids, include_all_instances)
    }

    fn describe_security_groups(&self, group_ids: &[String]) -> Result<Vec<SecurityGroup>> {
        self.security_groups(group_ids)
    }

    fn authorize_ingress(&self, group_id: &str, permission: &IpPermission) -> Result<()> {
        self.request_authorize(group_id, permission)
    }

    fn revoke_ingress(&self, group_id: &str, permission: &IpPermission) -> Result<Revocation> {
        self.request_revoke(group_id, permission)
    }
}

// EC2 signals the last page with an absent or empty token
fn next_page(token: Option<String>) -> Option<String> {
    token.filter(|t| !t.is_empty())
}
