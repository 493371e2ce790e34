//! Immutable runtime configuration.

use labelbot_classifier::ThresholdTable;

/// Everything the server needs beyond its injected collaborators. Built
/// once at startup and passed by value; nothing here is process-global.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Address the HTTP server binds, e.g. `127.0.0.1:8080`.
    pub bind: String,
    /// Shared secret for webhook signature verification. `None` disables
    /// verification, which is only sensible behind a trusted proxy or in
    /// local development.
    pub webhook_secret: Option<String>,
    pub thresholds: ThresholdTable,
}

impl RuntimeConfig {
    pub fn new(bind: String, webhook_secret: Option<String>, thresholds: ThresholdTable) -> Self {
        Self {
            bind,
            webhook_secret: webhook_secret
                .map(|secret| secret.trim().to_string())
                .filter(|secret| !secret.is_empty()),
            thresholds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RuntimeConfig;
    use labelbot_classifier::ThresholdTable;

    #[test]
    fn unit_new_drops_blank_webhook_secret() {
        let config = RuntimeConfig::new(
            "127.0.0.1:0".to_string(),
            Some("  ".to_string()),
            ThresholdTable::default(),
        );
        assert_eq!(config.webhook_secret, None);
    }

    #[test]
    fn unit_new_trims_webhook_secret() {
        let config = RuntimeConfig::new(
            "127.0.0.1:0".to_string(),
            Some(" s3cret \n".to_string()),
            ThresholdTable::default(),
        );
        assert_eq!(config.webhook_secret.as_deref(), Some("s3cret"));
    }
}
