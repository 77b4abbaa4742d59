use std::time::Duration;

/// Connection pool configuration
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// How long a checkout may wait for a free connection
    pub connect_timeout: Duration,

    /// Maximum number of connections in pool
    pub max_connections: usize,

    /// Minimum number of connections in pool
    pub min_connections: usize,

    /// Connection idle timeout
    pub idle_timeout: Option<Duration>,

    /// Maximum connection lifetime
    pub max_lifetime: Option<Duration>,
}

impl ConnectionConfig {
    pub fn new() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            max_connections: 10,
            min_connections: 1,
            idle_timeout: Some(Duration::from_secs(600)), // 10 minutes
            max_lifetime: Some(Duration::from_secs(1800)), // 30 minutes
        }
    }

    /// Set connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set minimum connections
    pub fn min_connections(mut self, min: usize) -> Self {
        self.min_connections = min;
        self
    }

    /// Set idle timeout, `None` keeps idle connections forever
    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set maximum lifetime, `None` never recycles by age
    pub fn max_lifetime(mut self, lifetime: Option<Duration>) -> Self {
        self.max_lifetime = lifetime;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_connections == 0 {
            return Err("max_connections must be > 0".to_string());
        }

        if self.min_connections > self.max_connections {
            return Err("min_connections cannot exceed max_connections".to_string());
        }

        Ok(())
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConnectionConfig::default();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 1);
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_builder_pattern() {
        let config = ConnectionConfig::new()
            .max_connections(20)
            .min_connections(2)
            .idle_timeout(None)
            .connect_timeout(Duration::from_millis(250));

        assert_eq!(config.max_connections, 20);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.idle_timeout, None);
        assert_eq!(config.connect_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_validate() {
        assert!(ConnectionConfig::new().validate().is_ok());

        let invalid_max_conn = ConnectionConfig::new().max_connections(0);
        assert!(invalid_max_conn.validate().is_err());

        let invalid_min_max = ConnectionConfig::new()
            .min_connections(10)
            .max_connections(5);
        assert!(invalid_min_max.validate().is_err());
    }
}
