use clap::{App, Arg};
use murmur::logging;
use parley::wire::frame::Framed;
use parley::wire::message::Command;
use rand::Rng;
use serde_json::Value;
use std::env;
use std::net::TcpStream;
use std::process;
use std::thread;
use std::time::Duration;

/// Headless protocol exerciser: registers a throwaway account, logs in,
/// optionally broadcasts one message, lingers, then closes. Useful for
/// smoke-testing a live relay.
fn main() {
    let matches = App::new("Relay Agent")
        .version("1.0")
        .about("Connects to a relay and exercises the protocol.")
        .arg(
            Arg::with_name("HOST")
                .long("host")
                .takes_value(true)
                .help("Relay host, defaults to SERVER_IP or 127.0.0.1"),
        )
        .arg(
            Arg::with_name("PORT")
                .long("port")
                .takes_value(true)
                .help("Relay port, defaults to SERVER_PORT or 8888"),
        )
        .arg(
            Arg::with_name("MESSAGE")
                .long("message")
                .takes_value(true)
                .help("Broadcast this message after logging in"),
        )
        .arg(
            Arg::with_name("LINGER")
                .long("linger")
                .takes_value(true)
                .help("Seconds to stay connected, defaults to 10"),
        )
        .get_matches();

    let host = matches
        .value_of("HOST")
        .map(str::to_string)
        .or_else(|| env::var("SERVER_IP").ok())
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let port: u16 = matches
        .value_of("PORT")
        .map(str::to_string)
        .or_else(|| env::var("SERVER_PORT").ok())
        .unwrap_or_else(|| "8888".to_string())
        .parse()
        .expect("Port must be a valid integer");
    let linger: u64 = matches
        .value_of("LINGER")
        .unwrap_or("10")
        .parse()
        .expect("Linger must be a valid integer");

    let logger = logging::init(logging::Severity::Debug);

    let stream = TcpStream::connect((host.as_str(), port)).expect("Failed to connect to the relay");
    let framed = Framed::new(stream);

    let username = format!("User{}", rand::thread_rng().gen_range(1..10));
    let password = "password".to_string();

    // A failed registration usually just means a previous run already
    // created the account; login decides.
    framed
        .send(&Command::Register {
            username: username.clone(),
            password: password.clone(),
        })
        .expect("Failed to send registration");
    let registered: Value = framed.recv().expect("No registration reply");
    logging::info!(logger, "registration";
                   "user" => username.as_str(), "response" => registered["response"].as_str());

    framed
        .send(&Command::Login {
            username: username.clone(),
            password,
        })
        .expect("Failed to send login");
    let logged_in: Value = framed.recv().expect("No login reply");

    if logged_in["response"] != "ok" {
        logging::error!(logger, "login refused";
                        "user" => username.as_str(), "reason" => logged_in["reason"].as_str());
        process::exit(1);
    }

    logging::info!(logger, "logged in"; "user" => username.as_str());

    if let Some(message) = matches.value_of("MESSAGE") {
        framed
            .send(&Command::Chat {
                peer: String::new(),
                message: message.to_string(),
            })
            .expect("Failed to send broadcast");
        logging::info!(logger, "broadcast sent"; "message" => message);
    }

    thread::sleep(Duration::from_secs(linger));

    drop(framed.send(&Command::Close));
    logging::info!(logger, "agent closed"; "user" => username.as_str());
}
