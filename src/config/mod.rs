//! The `config` module loads the relay's settings.
//!
//! Sources, lowest precedence first: built-in defaults, a config file
//! (`config/default.*` unless a path is given), then environment variables
//! named `COAPSUB__<SECTION>__<KEY>`, e.g. `COAPSUB__SERVER__PORT=5684`.

mod settings;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{BrokerSettings, LoggingSettings, ServerSettings, Settings};

/// Loads the configuration from `path` (or `config/default`) and the environment.
/// Merges the configuration with default values.
pub fn load_config(path: Option<&str>) -> Result<Settings, ConfigError> {
    let file = match path {
        Some(path) => File::with_name(path).required(true),
        None => File::with_name("config/default").required(false),
    };

    let builder = Config::builder().add_source(file).add_source(
        Environment::with_prefix("COAPSUB")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(merge(partial, Settings::default()))
}

fn merge(partial: PartialSettings, default: Settings) -> Settings {
    let server = partial.server;
    let broker = partial.broker;
    let logging = partial.logging;

    Settings {
        server: ServerSettings {
            host: server
                .as_ref()
                .and_then(|s| s.host.clone())
                .unwrap_or(default.server.host),
            port: server
                .as_ref()
                .and_then(|s| s.port)
                .unwrap_or(default.server.port),
            max_datagram_size: server
                .as_ref()
                .and_then(|s| s.max_datagram_size)
                .unwrap_or(default.server.max_datagram_size),
        },
        broker: BrokerSettings {
            capacity: broker
                .as_ref()
                .and_then(|b| b.capacity)
                .unwrap_or(default.broker.capacity),
        },
        logging: LoggingSettings {
            level: logging
                .and_then(|l| l.level)
                .unwrap_or(default.logging.level),
        },
    }
}
