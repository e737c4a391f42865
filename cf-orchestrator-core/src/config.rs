//! Tunables of the bulk orchestrator

use std::time::Duration;

use crate::types::SecurityLevel;

/// Domains per apply batch
pub const DEFAULT_BATCH_SIZE: usize = 5;
/// Pause between apply batches
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(300);
/// Remote reads per domain during verification
pub const DEFAULT_VERIFY_ATTEMPTS: u32 = 3;
/// Pause between verification reads
pub const DEFAULT_VERIFY_DELAY: Duration = Duration::from_millis(1000);
/// Rule analysis snapshots older than this are re-fetched
pub const DEFAULT_RULE_STATUS_TTL: Duration = Duration::from_secs(30 * 60);

/// Bulk run configuration, passed explicitly into the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkConfig {
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub verify_attempts: u32,
    pub verify_delay: Duration,
    /// Level restored when Under Attack mode is switched off
    pub under_attack_fallback: SecurityLevel,
    pub rule_status_ttl: Duration,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay: DEFAULT_BATCH_DELAY,
            verify_attempts: DEFAULT_VERIFY_ATTEMPTS,
            verify_delay: DEFAULT_VERIFY_DELAY,
            under_attack_fallback: SecurityLevel::Medium,
            rule_status_ttl: DEFAULT_RULE_STATUS_TTL,
        }
    }
}

impl BulkConfig {
    /// Clamp values that would stall a run.
    #[must_use]
    pub fn validated(mut self) -> Self {
        self.batch_size = self.batch_size.max(1);
        self.verify_attempts = self.verify_attempts.max(1);
        if self.under_attack_fallback.is_under_attack() {
            log::warn!("[bulk] Under Attack fallback cannot be under_attack, using medium");
            self.under_attack_fallback = SecurityLevel::Medium;
        }
        self
    }

    pub(crate) fn rule_status_max_age(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.rule_status_ttl)
            .unwrap_or_else(|_| chrono::Duration::minutes(30))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_run_contract() {
        let config = BulkConfig::default();
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.batch_delay, Duration::from_millis(300));
        assert_eq!(config.verify_attempts, 3);
        assert_eq!(config.under_attack_fallback, SecurityLevel::Medium);
    }

    #[test]
    fn validated_clamps_zeroes() {
        let config = BulkConfig {
            batch_size: 0,
            verify_attempts: 0,
            under_attack_fallback: SecurityLevel::UnderAttack,
            ..BulkConfig::default()
        }
        .validated();
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.verify_attempts, 1);
        assert_eq!(config.under_attack_fallback, SecurityLevel::Medium);
    }
}
