use std::env;

use super::parsing::{
    normalize_prefix, parse_base_url, parse_bool, parse_environment, parse_u32, parse_u64, Vars,
};
use super::types::{
    ApiSettings, AuthSettings, ConfigError, PollSettings, RuntimeSettings, Settings,
    TelemetrySettings,
};

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(&|key| env::var(key).ok())
    }

    pub fn load_with(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Vars::new(lookup);

        let environment =
            parse_environment(vars.optional("EXERCISE_ENV").or_else(|| vars.optional("ENVIRONMENT")));

        let base_url =
            parse_base_url(vars.or_default("EXERCISE_API_URL", "http://localhost:3000"))?;
        let prefix = normalize_prefix(&vars.or_default("EXERCISE_API_PREFIX", "/api"));
        let request_timeout_seconds = parse_u64(
            "EXERCISE_REQUEST_TIMEOUT_SECONDS",
            vars.or_default("EXERCISE_REQUEST_TIMEOUT_SECONDS", "30"),
        )?;
        let connect_timeout_seconds = parse_u64(
            "EXERCISE_CONNECT_TIMEOUT_SECONDS",
            vars.or_default("EXERCISE_CONNECT_TIMEOUT_SECONDS", "10"),
        )?;

        let bearer_token = vars.optional("EXERCISE_API_TOKEN");
        if bearer_token.is_none() && environment.is_production() {
            return Err(ConfigError::MissingSecret("EXERCISE_API_TOKEN"));
        }

        let interval_ms = parse_u64(
            "EXERCISE_POLL_INTERVAL_MS",
            vars.or_default("EXERCISE_POLL_INTERVAL_MS", "1000"),
        )?;
        if interval_ms == 0 {
            return Err(ConfigError::NotPositive("EXERCISE_POLL_INTERVAL_MS"));
        }
        let max_attempts = parse_u32(
            "EXERCISE_POLL_MAX_ATTEMPTS",
            vars.or_default("EXERCISE_POLL_MAX_ATTEMPTS", "30"),
        )?;
        if max_attempts == 0 {
            return Err(ConfigError::NotPositive("EXERCISE_POLL_MAX_ATTEMPTS"));
        }

        let log_level = vars.or_default("EXERCISE_LOG_LEVEL", "info");
        let json = vars.optional("EXERCISE_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);

        Ok(Self {
            runtime: RuntimeSettings { environment },
            api: ApiSettings { base_url, prefix, request_timeout_seconds, connect_timeout_seconds },
            auth: AuthSettings { bearer_token },
            poll: PollSettings { interval_ms, max_attempts },
            telemetry: TelemetrySettings { log_level, json },
        })
    }

    pub fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    pub fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub fn auth(&self) -> &AuthSettings {
        &self.auth
    }

    pub fn poll(&self) -> &PollSettings {
        &self.poll
    }

    pub fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }
}
