use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    pub payment_gateway_url: String,
    pub matching_step_distance: f64,
    pub matching_max_distance: f64,
    pub matching_expansion_pause: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/ride_dispatch".to_string()),
            bind_address: std::env::var("BIND_ADDRESS")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            payment_gateway_url: std::env::var("PAYMENT_GATEWAY_URL")
                .unwrap_or_else(|_| "http://localhost:12345".to_string()),
            matching_step_distance: positive_env_f64("MATCHING_STEP_DISTANCE", 25.0)?,
            matching_max_distance: positive_env_f64("MATCHING_MAX_DISTANCE", 150.0)?,
            matching_expansion_pause: Duration::from_millis(env_u64(
                "MATCHING_EXPANSION_PAUSE_MS",
                100,
            )?),
        })
    }
}

fn env_f64(key: &str, default: f64) -> Result<f64, config::ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| config::ConfigError::Message(format!("{} must be a number", key))),
        Err(_) => Ok(default),
    }
}

/// Search distances must be positive: a zero or negative step would
/// never advance the expanding search past its ceiling.
fn positive_env_f64(key: &str, default: f64) -> Result<f64, config::ConfigError> {
    let value = env_f64(key, default)?;
    if value <= 0.0 {
        return Err(config::ConfigError::Message(format!(
            "{} must be positive, got {}",
            key, value
        )));
    }
    Ok(value)
}

fn env_u64(key: &str, default: u64) -> Result<u64, config::ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| config::ConfigError::Message(format!("{} must be an integer", key))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_environment() {
        assert_eq!(
            positive_env_f64("RIDE_DISPATCH_UNSET_KNOB", 25.0).unwrap(),
            25.0
        );
    }

    #[test]
    fn rejects_non_positive_search_distances() {
        std::env::set_var("RIDE_DISPATCH_TEST_STEP", "0");
        let zero = positive_env_f64("RIDE_DISPATCH_TEST_STEP", 25.0);
        std::env::set_var("RIDE_DISPATCH_TEST_STEP", "-10");
        let negative = positive_env_f64("RIDE_DISPATCH_TEST_STEP", 25.0);
        std::env::remove_var("RIDE_DISPATCH_TEST_STEP");

        assert!(zero.is_err());
        assert!(negative.is_err());
    }
}
