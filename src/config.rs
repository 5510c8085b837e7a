use crate::errors::*;
use rusoto_core::credential::ProfileProvider;
use rusoto_core::Region;
use std::str::FromStr;
use tracing::debug;

pub const DEFAULT_CHECKIP_URL: &str = "http://checkip.amazonaws.com/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Named credentials profile; the default credential chain when absent.
    pub profile: Option<String>,
    pub region: Option<String>,
    pub checkip_url: String,
    pub verbosity: u64,
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            profile: None,
            region: None,
            checkip_url: DEFAULT_CHECKIP_URL.to_owned(),
            verbosity: 0,
        }
    }
}

impl Settings {
    /// The explicit region, then the named profile's region, then the SDK's region chain.
    pub fn region(&self) -> Result<Region> {
        let region_str = match (&self.region, &self.profile) {
            (&Some(ref region_str), _) => Some(region_str.clone()),
            (&None, &Some(ref profile)) => profile_region(profile),
            (&None, &None) => None,
        };
        match region_str {
            Some(region_str) => Region::from_str(&region_str)
                .chain_err(|| format!("invalid region: {}", region_str)),
            None => Ok(Region::default()),
        }
    }
}

// reads the `region` key of the profile's section in the shared config file
fn profile_region(profile: &str) -> Option<String> {
    let mut provider = match ProfileProvider::new() {
        Ok(provider) => provider,
        Err(e) => {
            debug!(profile, error = %e, "no profile provider");
            return None;
        }
    };
    provider.set_profile(profile);
    match provider.region_from_profile() {
        Ok(region) => region,
        Err(e) => {
            debug!(profile, error = %e, "could not read profile region");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;

    #[test]
    fn test_explicit_region() {
        let settings = Settings {
            region: Some("ap-northeast-1".to_owned()),
            ..Default::default()
        };
        assert_eq!(Region::ApNortheast1, settings.region().unwrap());
    }

    #[test]
    fn test_invalid_region() {
        let settings = Settings {
            region: Some("moon-base-1".to_owned()),
            ..Default::default()
        };
        let err = settings.region().unwrap_err();
        assert_eq!("invalid region: moon-base-1", err.to_string());
    }

    #[test]
    fn test_profile_region() {
        let path = env::temp_dir().join(format!("ec2ctl-config-{}", std::process::id()));
        fs::write(
            &path,
            "[default]\nregion = us-west-2\n\n[profile work]\nregion = ap-northeast-1\n",
        ).unwrap();
        env::set_var("AWS_CONFIG_FILE", &path);

        let work = Settings {
            profile: Some("work".to_owned()),
            ..Default::default()
        };
        let region = work.region();

        // an explicit region still wins over the profile's
        let explicit = Settings {
            region: Some("eu-west-1".to_owned()),
            ..work.clone()
        };
        let explicit_region = explicit.region();

        env::remove_var("AWS_CONFIG_FILE");
        fs::remove_file(&path).unwrap();

        assert_eq!(Region::ApNortheast1, region.unwrap());
        assert_eq!(Region::EuWest1, explicit_region.unwrap());
    }
}
