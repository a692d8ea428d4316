//! Validation of a parsed node config

use constants::MAX_ORDER_SIZE;

use crate::NodeConfig;

/// Validate a parsed config
pub(crate) fn validate_config(config: &NodeConfig) -> Result<(), String> {
    if config.max_batch_orders == 0 {
        return Err("max-batch-orders must be positive".to_string());
    }

    if let Some(volume) = config.max_batch_volume {
        if volume == 0 {
            return Err("max-batch-volume must be positive".to_string());
        }
        if volume > MAX_ORDER_SIZE.saturating_mul(config.max_batch_orders as u64) {
            return Err("max-batch-volume exceeds the largest possible batch".to_string());
        }
    }

    if config.proof_timeout.is_zero() || config.submission_timeout.is_zero() {
        return Err("timeouts must be positive".to_string());
    }
    if config.aggregation_interval.is_zero() {
        return Err("aggregation-interval-ms must be positive".to_string());
    }
    if config.retry.backoff_factor == 0 {
        return Err("task-backoff-factor must be positive".to_string());
    }
    if config.retry.initial_backoff > config.retry.backoff_ceiling {
        return Err("task-initial-backoff-ms exceeds task-backoff-ceiling-ms".to_string());
    }
    if config.proving_threads == 0 {
        return Err("proving-threads must be positive".to_string());
    }
    if config.max_history_page_size == 0 {
        return Err("max-history-page-size must be positive".to_string());
    }

    Ok(())
}
