use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// How long a registered observation template stays usable.
    pub template_ttl: Duration,
    /// Period of the background sweep that drops expired templates.
    pub sweep_interval: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            template_ttl: Duration::from_secs(60 * 60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}
