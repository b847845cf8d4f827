use std::time::Duration;

/// Simulated work durations for each background operation.
///
/// Tests shrink these; production uses the defaults.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Sleep for the fire-and-forget operation.
    pub async_method_delay: Duration,
    /// Sleep for the single result-bearing operation.
    pub async_method_with_result_delay: Duration,
    /// Sleep for the first of the two joined operations.
    pub async_method1_delay: Duration,
    /// Sleep for the second of the two joined operations.
    pub async_method2_delay: Duration,
    /// Sleep before the simulated failure fires.
    pub simulated_failure_delay: Duration,
}

impl ServiceConfig {
    /// Uses the same delay for every operation.
    #[must_use]
    pub fn uniform(delay: Duration) -> Self {
        Self {
            async_method_delay: delay,
            async_method_with_result_delay: delay,
            async_method1_delay: delay,
            async_method2_delay: delay,
            simulated_failure_delay: delay,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            async_method_delay: Duration::from_secs(5),
            async_method_with_result_delay: Duration::from_secs(5),
            async_method1_delay: Duration::from_secs(3),
            async_method2_delay: Duration::from_secs(2),
            simulated_failure_delay: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_config_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.async_method_delay, Duration::from_secs(5));
        assert_eq!(config.async_method_with_result_delay, Duration::from_secs(5));
        assert_eq!(config.async_method1_delay, Duration::from_secs(3));
        assert_eq!(config.async_method2_delay, Duration::from_secs(2));
        assert_eq!(config.simulated_failure_delay, Duration::from_secs(5));
    }

    #[test]
    fn uniform_sets_every_delay() {
        let config = ServiceConfig::uniform(Duration::from_millis(5));
        assert_eq!(config.async_method1_delay, Duration::from_millis(5));
        assert_eq!(config.simulated_failure_delay, Duration::from_millis(5));
    }
}
