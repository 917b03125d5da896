use clap::{Arg, ArgAction, Command};
use log::error;
use std::path::PathBuf;
use std::{panic, process};

use crate::config::{ReceiverConfig, SenderConfig};
use crate::pipeline::SessionSignals;

pub mod buffer;
pub mod config;
pub mod fec;
pub mod media;
pub mod packet;
pub mod pipeline;
pub mod session;
pub mod workers;

fn main() {
    tracing_subscriber::fmt::init();

    let matches = Command::new(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .subcommand_required(true)
        .subcommand(
            Command::new("sender")
                .about("Stream a media file to one receiver")
                .arg(
                    Arg::new("media")
                        .help("Length-prefixed MJPEG file to stream")
                        .required(true),
                )
                .arg(
                    Arg::new("audio")
                        .long("audio")
                        .value_name("FILE")
                        .help("Raw PCM file streamed alongside the video"),
                )
                .arg(common_arg_config())
                .arg(common_arg_control_port())
                .arg(
                    Arg::new("fec-group")
                        .long("fec-group")
                        .value_name("N")
                        .help("Protection group size (2-16), 0 disables FEC"),
                )
                .arg(
                    Arg::new("simulate-loss")
                        .long("simulate-loss")
                        .value_name("PCT")
                        .help("Drop this percentage of video packets before sending"),
                ),
        )
        .subcommand(
            Command::new("receiver")
                .about("Receive and play a stream")
                .arg(
                    Arg::new("host")
                        .help("Hostname or IP of the sender")
                        .required(true),
                )
                .arg(
                    Arg::new("resource")
                        .help("Resource name to request")
                        .default_value("movie.mjpeg"),
                )
                .arg(common_arg_config())
                .arg(common_arg_control_port())
                .arg(
                    Arg::new("data-port")
                        .long("data-port")
                        .value_name("PORT")
                        .help("Local UDP port advertised during SETUP"),
                )
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .value_name("DIR")
                        .help("Write played frames and audio under this directory")
                        .action(ArgAction::Set),
                ),
        )
        .get_matches();

    // kill the main thread as soon as a secondary thread panics
    let orig_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        orig_hook(panic_info);
        process::exit(105);
    }));

    let signals = SessionSignals::new(true);

    // gracefully close the session when receiving SIGINT, SIGTERM, or SIGHUP
    let ctrlc_signals = signals.clone();
    ctrlc::set_handler(move || {
        ctrlc_signals.cancel();
    })
    .expect("Error setting Ctrl-C handler");

    let runtime = tokio::runtime::Runtime::new().expect("Error creating async runtime");
    let outcome = match matches.subcommand() {
        Some(("sender", matches)) => {
            let mut config = match matches.get_one::<String>("config") {
                Some(path) => exit_on_error(config::load::<SenderConfig>(&PathBuf::from(path))),
                None => SenderConfig::default(),
            };
            config.media_path = PathBuf::from(matches.get_one::<String>("media").unwrap());
            if let Some(audio) = matches.get_one::<String>("audio") {
                config.audio_path = Some(PathBuf::from(audio));
            }
            if let Some(port) = matches.get_one::<String>("control-port") {
                config.control_port = exit_on_error(port.parse().map_err(Into::into));
            }
            if let Some(group) = matches.get_one::<String>("fec-group") {
                config.fec_group_size = exit_on_error(group.parse().map_err(Into::into));
            }
            if let Some(loss) = matches.get_one::<String>("simulate-loss") {
                config.simulate_loss = exit_on_error(loss.parse().map_err(Into::into));
            }
            runtime.block_on(workers::sender::run(config, signals))
        }
        Some(("receiver", matches)) => {
            let mut config = match matches.get_one::<String>("config") {
                Some(path) => exit_on_error(config::load::<ReceiverConfig>(&PathBuf::from(path))),
                None => ReceiverConfig::default(),
            };
            config.server_host = matches.get_one::<String>("host").unwrap().clone();
            config.resource = matches.get_one::<String>("resource").unwrap().clone();
            if let Some(port) = matches.get_one::<String>("control-port") {
                config.control_port = exit_on_error(port.parse().map_err(Into::into));
            }
            if let Some(port) = matches.get_one::<String>("data-port") {
                config.data_port = exit_on_error(port.parse().map_err(Into::into));
            }
            if let Some(dir) = matches.get_one::<String>("output") {
                config.output_dir = Some(PathBuf::from(dir));
            }
            runtime.block_on(workers::receiver::run(config, signals))
        }
        _ => unreachable!("subcommand is required"),
    };

    if let Err(e) = outcome {
        error!("session failed: {e:#}");
        process::exit(1);
    }
}

fn common_arg_config() -> Arg {
    Arg::new("config")
        .long("config")
        .value_name("FILE")
        .help("JSON config file; flags override its values")
}

fn common_arg_control_port() -> Arg {
    Arg::new("control-port")
        .long("control-port")
        .value_name("PORT")
        .help("TCP port of the control channel")
}

fn exit_on_error<T>(result: anyhow::Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            error!("{e:#}");
            process::exit(1);
        }
    }
}
