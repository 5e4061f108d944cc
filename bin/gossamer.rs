use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use clap::{Arg, ArgMatches, Command};
use tracing::Level;

use gossamer::config::{timeout_from_str, Config, Fanout};
use gossamer::membership::NodeState;
use gossamer::node::Endpoint;
use gossamer::runtime;
use gossamer::simulation::{Failure, Scenario, Simulation};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let gossamer = Command::new("gossamer")
        .about("gossip-based group membership")
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .takes_value(true)
                .default_value("info")
                .global(true),
        )
        .arg(
            Arg::new("fail-timeout")
                .long("fail-timeout")
                .takes_value(true)
                .default_value("5")
                .global(true),
        )
        .arg(
            Arg::new("remove-timeout")
                .long("remove-timeout")
                .takes_value(true)
                .default_value("20")
                .global(true),
        )
        .arg(
            Arg::new("fanout")
                .long("fanout")
                .takes_value(true)
                .default_value("all")
                .global(true),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("run")
                .about("run one node over udp")
                .arg(
                    Arg::new("address")
                        .long("address")
                        .takes_value(true)
                        .required(true),
                )
                .arg(
                    Arg::new("introducer")
                        .long("introducer")
                        .takes_value(true)
                        .required(true),
                )
                .arg(
                    Arg::new("protocol-period")
                        .long("protocol-period")
                        .help("milliseconds per tick")
                        .takes_value(true)
                        .default_value("1000"),
                )
                .arg(Arg::new("no-clock-sync").long("no-clock-sync")),
        )
        .subcommand(
            Command::new("simulate")
                .about("run a cluster over an emulated network")
                .arg(
                    Arg::new("nodes")
                        .long("nodes")
                        .takes_value(true)
                        .default_value("10"),
                )
                .arg(
                    Arg::new("steps")
                        .long("steps")
                        .takes_value(true)
                        .default_value("100"),
                )
                .arg(
                    Arg::new("join-interval")
                        .long("join-interval")
                        .takes_value(true)
                        .default_value("1"),
                )
                .arg(
                    Arg::new("fail-node")
                        .long("fail-node")
                        .takes_value(true)
                        .requires("fail-at"),
                )
                .arg(Arg::new("fail-at").long("fail-at").takes_value(true))
                .arg(
                    Arg::new("drop-probability")
                        .long("drop-probability")
                        .takes_value(true)
                        .default_value("0"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .takes_value(true)
                        .default_value("0"),
                ),
        )
        .get_matches();

    let (subcommand, matches) = gossamer
        .subcommand()
        .ok_or("a subcommand is required")?;
    let level = Level::from_str(value(matches, "log-level")?)?;

    tracing_subscriber::fmt().with_max_level(level).init();

    let config = config(matches)?;

    match (subcommand, matches) {
        ("run", run) => {
            let address = SocketAddr::from_str(value(run, "address")?)?;
            let introducer = SocketAddr::from_str(value(run, "introducer")?)?;
            let protocol_period = value(run, "protocol-period")?.parse::<u64>()?;

            let config = Config {
                introducer: Endpoint::from_socket_address(introducer)?,
                protocol_period: Duration::from_millis(protocol_period),
                sync_clock_on_join: !run.is_present("no-clock-sync"),
                ..config
            };

            runtime::launch(Endpoint::from_socket_address(address)?, config).await?;
        }
        ("simulate", simulate) => {
            let failure = match simulate.value_of("fail-node") {
                Some(node) => Some(Failure {
                    node: node.parse()?,
                    at: value(simulate, "fail-at")?.parse()?,
                }),
                None => None,
            };

            let scenario = Scenario {
                nodes: value(simulate, "nodes")?.parse()?,
                steps: value(simulate, "steps")?.parse()?,
                join_interval: value(simulate, "join-interval")?.parse()?,
                failure,
                drop_probability: value(simulate, "drop-probability")?.parse()?,
                seed: value(simulate, "seed")?.parse()?,
                config,
            };

            let report = Simulation::init(scenario).await?.run().await?;

            for event in &report.events {
                println!("{}", event);
            }

            for view in &report.views {
                let members: Vec<String> = view
                    .members
                    .iter()
                    .map(|record| format!("{}@{}", record.endpoint, record.heartbeat))
                    .collect();
                let status = match view.state {
                    NodeState::InGroup => "in group",
                    _ => "not in group",
                };

                println!(
                    "{} ({}, heartbeat {}) -> {}",
                    view.endpoint,
                    status,
                    view.heartbeat,
                    members.join(" "),
                );
            }

            println!(
                "datagrams sent {} | delivered {} | dropped {}",
                report.statistics.sent, report.statistics.delivered, report.statistics.dropped,
            );
        }
        (unknown, _) => return Err(Box::from(format!("unknown subcommand {}", unknown))),
    }

    Ok(())
}

fn config(matches: &ArgMatches) -> Result<Config, Box<dyn std::error::Error>> {
    Ok(Config {
        fail_timeout: timeout_from_str(value(matches, "fail-timeout")?)?,
        remove_timeout: timeout_from_str(value(matches, "remove-timeout")?)?,
        fanout: Fanout::from_str(value(matches, "fanout")?)?,
        ..Config::default()
    })
}

fn value<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str, Box<dyn std::error::Error>> {
    matches
        .value_of(name)
        .ok_or_else(|| Box::from(format!("missing --{}", name)))
}
