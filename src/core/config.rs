mod parsing;
mod settings;
mod types;

pub use types::{
    ApiSettings, AuthSettings, ConfigError, Environment, PollSettings, RuntimeSettings,
    Settings, TelemetrySettings,
};
