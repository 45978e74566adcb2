use clap::{App, Arg, ArgMatches};
use ilp_node::{init_tracing, load_configuration, ConnectorNode, ENV_PREFIX};
use tracing::{error, info};

fn cmdline_configuration(version: &str) -> App<'static, '_> {
    App::new("ilp-node")
        .about("Run an Interledger connector")
        .version(version)
        .args(&[
            Arg::with_name("config")
                .takes_value(true)
                .index(1)
                .help("Name of config file (in JSON, TOML or YAML format)"),
            Arg::with_name("operator_address")
                .long("operator_address")
                .takes_value(true)
                .help("ILP address of this connector"),
            Arg::with_name("log_level")
                .long("log_level")
                .takes_value(true)
                .help("Log filter used when RUST_LOG is not set. Defaults to info"),
            Arg::with_name("route_broadcast_interval")
                .long("route_broadcast_interval")
                .takes_value(true)
                .help("Interval, defined in milliseconds, on which the node will broadcast routing information to other nodes using CCP. Defaults to 30000ms (30 seconds)."),
        ])
}

fn overrides(matches: &ArgMatches) -> Vec<(&'static str, String)> {
    let mut overrides = Vec::new();
    let keys = [
        ("operator_address", "operator_address"),
        ("log_level", "log_level"),
        (
            "route_broadcast_interval",
            "global_routing_settings.route_broadcast_interval_ms",
        ),
    ];
    for (arg, key) in keys.iter() {
        if let Some(value) = matches.value_of(arg) {
            overrides.push((*key, value.to_owned()));
        }
    }
    overrides
}

#[tokio::main]
async fn main() {
    let version = env!("CARGO_PKG_VERSION");
    let matches = cmdline_configuration(version).get_matches();

    let config = match load_configuration(matches.value_of("config"), ENV_PREFIX, overrides(&matches)) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(1);
        }
    };

    if let Err(err) = init_tracing(&config.log_level) {
        eprintln!("{}", err);
    }

    let node = match ConnectorNode::from_config(config) {
        Ok(node) => node,
        Err(err) => {
            error!("Invalid node configuration: {}", err);
            std::process::exit(1);
        }
    };
    if let Err(err) = node.start().await {
        error!("Unable to start node: {}", err);
        std::process::exit(1);
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(err) => error!("Unable to listen for the shutdown signal: {}", err),
    }
    node.shutdown().await;
}
