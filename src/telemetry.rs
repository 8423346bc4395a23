use std::fmt;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const DEFAULT_FILTER: &str = "simba_rs=info";
static TRACING_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Tags every span and error produced by one [`Optimizer::compile`](crate::Optimizer::compile)
/// run so log lines and returned errors can be correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Installs process-global, env-filterable tracing output.
///
/// Uses `RUST_LOG` when present, falls back to `simba_rs=info`. Idempotent: repeated
/// calls after the first successful one are no-ops.
pub fn init_tracing() {
    if TRACING_INITIALIZED.get().is_some() {
        return;
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .finish();

    // Another thread may have won the race to install a subscriber; that's fine,
    // tracing already has a global default in that case.
    let _ = tracing::subscriber::set_global_default(subscriber);
    let _ = TRACING_INITIALIZED.set(());
}

/// Truncates `value` to at most `max_chars` Unicode scalar values, for
/// `demo_input_field_maxlen`-style bounds.
pub fn truncate(value: &str, max_chars: usize) -> &str {
    if value.chars().count() <= max_chars {
        value
    } else {
        let cutoff = value
            .char_indices()
            .nth(max_chars)
            .map(|(idx, _)| idx)
            .unwrap_or(value.len());
        &value[..cutoff]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_is_a_no_op_under_the_limit() {
        assert_eq!(truncate("hello", 10), "hello");
    }

    #[test]
    fn truncate_cuts_at_char_boundary() {
        assert_eq!(truncate("hello world", 5), "hello");
    }

    #[test]
    fn correlation_ids_are_unique() {
        assert_ne!(CorrelationId::new(), CorrelationId::new());
    }
}
