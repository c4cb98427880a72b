use std::process::ExitCode;

use tracing::{error, info};

use filedock::{hash_password, Config, WebServer};

const DEFAULT_CONFIG_PATH: &str = "filedock.toml";

fn usage() {
    eprintln!("usage: filedock [CONFIG]");
    eprintln!("       filedock hash-password <PASSWORD>");
}

fn load_config(path: &str) -> Config {
    match Config::load_with_env(path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {path}: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let config_path = match args.as_slice() {
        [cmd, password] if cmd == "hash-password" => {
            return match hash_password(password) {
                Ok(hash) => {
                    println!("{hash}");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("Failed to hash password: {e}");
                    ExitCode::FAILURE
                }
            };
        }
        [flag] if flag == "-h" || flag == "--help" => {
            usage();
            return ExitCode::SUCCESS;
        }
        [path] => path.clone(),
        [] => DEFAULT_CONFIG_PATH.to_string(),
        _ => {
            usage();
            return ExitCode::FAILURE;
        }
    };

    let config = load_config(&config_path);

    if let Err(e) = filedock::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        filedock::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return ExitCode::FAILURE;
    }

    info!("filedock {}", env!("CARGO_PKG_VERSION"));
    info!(
        "Server configured on {}:{}",
        config.server.host, config.server.port
    );

    let server = match WebServer::new(config).await {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to start: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = server.run().await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
