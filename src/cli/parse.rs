use crate::cli::Command;
use crate::cli::Invocation;
use crate::cli::ResourceRef;
use crate::cli::RuleSpec;
use crate::config::Settings;
use crate::config::DEFAULT_CHECKIP_URL;
use crate::errors::*;
use crate::iprules;
use crate::iprules::IpProtocol;
use clap::App;
use clap::AppSettings;
use clap::Arg;
use clap::ArgGroup;
use clap::ArgMatches;
use clap::SubCommand;
use std::ffi::OsString;
use std::str::FromStr;

fn instance_args<'a, 'b>(app: App<'a, 'b>, required: bool) -> App<'a, 'b> {
    app.arg(
        Arg::with_name("instance-id")
            .help("Instance id, e.g. i-0123456789abcdef0")
            .short("i")
            .long("instance-id")
            .takes_value(true),
    )
    .arg(
        Arg::with_name("name-tag")
            .help("Name tag of the instance")
            .short("n")
            .long("name-tag")
            .takes_value(true),
    )
    .group(
        ArgGroup::with_name("instance")
            .args(&["instance-id", "name-tag"])
            .required(required),
    )
}

fn group_args<'a, 'b>(app: App<'a, 'b>, required: bool) -> App<'a, 'b> {
    app.arg(
        Arg::with_name("group-id")
            .help("Security group id, e.g. sg-0123456789abcdef0")
            .short("g")
            .long("group-id")
            .takes_value(true),
    )
    .arg(
        Arg::with_name("name-tag")
            .help("Name tag of the security group")
            .short("n")
            .long("name-tag")
            .takes_value(true),
    )
    .group(
        ArgGroup::with_name("group")
            .args(&["group-id", "name-tag"])
            .required(required),
    )
}

fn rule_args<'a, 'b>(app: App<'a, 'b>) -> App<'a, 'b> {
    app.arg(
        Arg::with_name("protocol")
            .help("Protocol: tcp, udp or icmp")
            .long("protocol")
            .takes_value(true)
            .default_value("tcp"),
    )
    .arg(
        Arg::with_name("port")
            .help("Port number")
            .long("port")
            .takes_value(true)
            .default_value("22"),
    )
    .arg(
        Arg::with_name("cidr")
            .help(
                "Source IP address or CIDR network. Examples:\n\
                 * 192.0.2.1\n\
                 * 192.0.2.0/24\n\
                 Defaults to your current IPv4 address, as indicated by the checkip service.\n\
                 ",
            )
            .next_line_help(true)
            .long("cidr")
            .takes_value(true),
    )
}

fn detail_arg<'a, 'b>() -> Arg<'a, 'b> {
    Arg::with_name("detail")
        .help("Print the full response instead of a summary")
        .short("d")
        .long("detail")
}

fn wait_arg<'a, 'b>() -> Arg<'a, 'b> {
    Arg::with_name("wait")
        .help("Wait until the instance has reached the requested state")
        .short("w")
        .long("wait")
}

fn name_tag_arg<'a, 'b>() -> Arg<'a, 'b> {
    Arg::with_name("name-tag")
        .help("Name tag to look up")
        .short("n")
        .long("name-tag")
        .takes_value(true)
        .required(true)
}

fn define_app<'a, 'b>() -> App<'a, 'b> {
    let start_command = instance_args(
        SubCommand::with_name("start").about("Start an instance"),
        true,
    )
    .arg(wait_arg());

    let stop_command = instance_args(
        SubCommand::with_name("stop").about("Stop an instance"),
        true,
    )
    .arg(wait_arg());

    let status_command = instance_args(
        SubCommand::with_name("status")
            .about("Describe instance status (all instances when none is given)"),
        false,
    )
    .arg(detail_arg())
    .arg(
        Arg::with_name("all")
            .help("Include instances that are not running")
            .short("a")
            .long("all"),
    );

    let show_command = SubCommand::with_name("show")
        .about("Show identifiers and addresses")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(
            SubCommand::with_name("instance-id")
                .about("Show the instance id for a name tag")
                .arg(name_tag_arg()),
        )
        .subcommand(
            SubCommand::with_name("group-id")
                .about("Show the security group id for a name tag")
                .arg(name_tag_arg()),
        )
        .subcommand(SubCommand::with_name("gip").about("Show your public IPv4 address"));

    let secg_command = SubCommand::with_name("secg")
        .about("Maintain security group ingress rules")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(rule_args(group_args(
            SubCommand::with_name("add").about("Add an ingress rule unless it already exists"),
            true,
        )))
        .subcommand(rule_args(group_args(
            SubCommand::with_name("remove").about("Remove an ingress rule if it exists"),
            true,
        )))
        .subcommand(
            group_args(
                SubCommand::with_name("list")
                    .about("List ingress rules (of all groups when none is given)"),
                false,
            )
            .arg(detail_arg()),
        );

    App::new(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .about("Start, stop and open up EC2 instances")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .setting(AppSettings::GlobalVersion)
        .setting(AppSettings::VersionlessSubcommands)
        .setting(AppSettings::DeriveDisplayOrder)
        .arg(
            Arg::with_name("profile")
                .help("Named credentials profile. If not specified, the default credentials are used.")
                .short("p")
                .long("profile")
                .env("AWS_PROFILE")
                .takes_value(true)
                .global(true),
        )
        .arg(
            Arg::with_name("region")
                .help("Region, e.g. ap-northeast-1")
                .short("r")
                .long("region")
                .env("AWS_DEFAULT_REGION")
                .takes_value(true)
                .global(true),
        )
        .arg(
            Arg::with_name("checkip-url")
                .help("Service that reports your public IPv4 address")
                .long("checkip-url")
                .env("EC2CTL_CHECKIP_URL")
                .takes_value(true)
                .global(true),
        )
        .arg(
            Arg::with_name("verbose")
                .help("Log more to stderr (repeat for more detail)")
                .short("v")
                .long("verbose")
                .multiple(true)
                .global(true),
        )
        .subcommand(start_command)
        .subcommand(stop_command)
        .subcommand(status_command)
        .subcommand(show_command)
        .subcommand(secg_command)
}

pub fn parse_from_safe<I, T>(args: I) -> Result<Invocation>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let app = define_app();
    let matches = app.get_matches_from_safe(args)?;

    let settings = parse_settings(&matches);

    let command = match matches.subcommand() {
        ("start", Some(matches)) => Command::Start {
            instance: instance_ref(matches).expect("required"),
            wait: matches.is_present("wait"),
        },
        ("stop", Some(matches)) => Command::Stop {
            instance: instance_ref(matches).expect("required"),
            wait: matches.is_present("wait"),
        },
        ("status", Some(matches)) => Command::Status {
            instance: instance_ref(matches),
            include_all: matches.is_present("all"),
            detail: matches.is_present("detail"),
        },
        ("show", Some(matches)) => match matches.subcommand() {
            ("instance-id", Some(matches)) => Command::ShowInstanceId {
                name_tag: matches.value_of("name-tag").expect("required").to_owned(),
            },
            ("group-id", Some(matches)) => Command::ShowGroupId {
                name_tag: matches.value_of("name-tag").expect("required").to_owned(),
            },
            ("gip", Some(_)) => Command::ShowPublicIp,
            _ => unreachable!(),
        },
        ("secg", Some(matches)) => match matches.subcommand() {
            ("add", Some(matches)) => Command::RuleAdd {
                group: group_ref(matches).expect("required"),
                rule: rule_spec(matches)?,
            },
            ("remove", Some(matches)) => Command::RuleRemove {
                group: group_ref(matches).expect("required"),
                rule: rule_spec(matches)?,
            },
            ("list", Some(matches)) => Command::RuleList {
                group: group_ref(matches),
                detail: matches.is_present("detail"),
            },
            _ => unreachable!(),
        },
        _ => unreachable!(),
    };

    Ok(Invocation { settings, command })
}

fn parse_settings(matches: &ArgMatches) -> Settings {
    Settings {
        profile: global_value(matches, "profile").map(str::to_owned),
        region: global_value(matches, "region").map(str::to_owned),
        checkip_url: global_value(matches, "checkip-url")
            .unwrap_or(DEFAULT_CHECKIP_URL)
            .to_owned(),
        verbosity: global_occurrences(matches, "verbose"),
    }
}

// global args may be given at any depth; the innermost occurrence wins
fn global_value<'m>(matches: &'m ArgMatches, name: &str) -> Option<&'m str> {
    let inner = matches.subcommand().1.and_then(|m| global_value(m, name));
    inner.or_else(|| matches.value_of(name))
}

fn global_occurrences(matches: &ArgMatches, name: &str) -> u64 {
    let inner = matches
        .subcommand()
        .1
        .map_or(0, |m| global_occurrences(m, name));
    inner.max(matches.occurrences_of(name))
}

fn instance_ref(matches: &ArgMatches) -> Option<ResourceRef> {
    resource_ref(matches, "instance-id")
}

fn group_ref(matches: &ArgMatches) -> Option<ResourceRef> {
    resource_ref(matches, "group-id")
}

fn resource_ref(matches: &ArgMatches, id_arg: &str) -> Option<ResourceRef> {
    if let Some(id) = matches.value_of(id_arg) {
        Some(ResourceRef::Id(id.to_owned()))
    } else {
        matches
            .value_of("name-tag")
            .map(|tag| ResourceRef::NameTag(tag.to_owned()))
    }
}

fn rule_spec(matches: &ArgMatches) -> Result<RuleSpec> {
    let protocol_str = matches.value_of("protocol").expect("defaulted");
    let protocol = IpProtocol::from_str(protocol_str)
        .chain_err(|| format!("not a protocol: {}", protocol_str))?;
    let port_str = matches.value_of("port").expect("defaulted");
    let port = u16::from_str(port_str).chain_err(|| format!("not a port: {}", port_str))?;
    let cidr = match matches.value_of("cidr") {
        Some(cidr) => Some(iprules::parse_cidr(cidr)?),
        None => None,
    };
    Ok(RuleSpec {
        protocol,
        port,
        cidr,
    })
}
