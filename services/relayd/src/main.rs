use clap::{App, Arg};
use murmur::logging;
use parley::server::Relay;
use std::process;

mod config;

use config::RelayConfig;

fn main() {
    let matches = App::new("Parley Relay")
        .version("1.0")
        .about("Runs the chat relay server.")
        .arg(
            Arg::with_name("CONFIG_FILE")
                .long("config")
                .takes_value(true)
                .help("Path to a TOML config file"),
        )
        .arg(
            Arg::with_name("PORT")
                .long("port")
                .takes_value(true)
                .help("Listen port, overrides config file and environment"),
        )
        .arg(
            Arg::with_name("STORAGE_DIR")
                .long("storage-dir")
                .takes_value(true)
                .help("Directory holding users.dat and history.dat"),
        )
        .get_matches();

    let mut config = match matches.value_of("CONFIG_FILE") {
        Some(path) => RelayConfig::load(path),
        None => RelayConfig::default(),
    };
    config.apply_env();

    if let Some(port) = matches.value_of("PORT") {
        config.port = port.parse().expect("Port must be a valid integer");
    }
    if let Some(dir) = matches.value_of("STORAGE_DIR") {
        config.storage_dir = dir.to_string();
    }

    let logger = logging::init(logging::parse_level(&config.log_level));

    let relay = match Relay::bind(&config.address(), &config.storage_dir, &logger) {
        Ok(relay) => relay,
        Err(err) => {
            logging::crit!(logger, "relay startup failed";
                           "address" => config.address(), "error" => %err);
            process::exit(1);
        }
    };

    let shutdown = relay.shutdown_handle();
    let signal_log = logger.clone();
    ctrlc::set_handler(move || {
        logging::info!(signal_log, "termination signal received");
        shutdown.trigger();
    })
    .expect("Error installing termination handler");

    if let Err(err) = relay.run() {
        logging::crit!(logger, "relay terminated abnormally"; "error" => %err);
        process::exit(1);
    }

    logging::info!(logger, "relay shut down");
}
