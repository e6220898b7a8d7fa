//! Token budgeting.
//!
//! Prompts are checked against the model's context window before any upstream
//! call is made, so an oversized conversation never costs a handshake.

use std::sync::Arc;

use crate::domain::ModelSpec;
use crate::error::{GatewayError, GatewayResult};

/// Tokens held back from the context window for end-of-turn markers.
pub const TOKEN_RESERVE: usize = 20;

/// Estimates the token count of a prompt.
pub trait TokenEstimator: Send + Sync {
    fn estimate(&self, text: &str) -> usize;
}

/// Tokenizer-free estimate.
///
/// Alphanumeric runs count one token per four characters (at least one),
/// every other non-whitespace character counts as a token of its own.
/// Subword tokenizers produce counts of the same order on English prose and
/// overshoot on markup, which errs on the safe side.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicEstimator;

impl TokenEstimator for HeuristicEstimator {
    fn estimate(&self, text: &str) -> usize {
        let mut tokens = 0;
        let mut run = 0usize;
        for c in text.chars() {
            if c.is_ascii_alphanumeric() {
                run += 1;
                continue;
            }
            tokens += run.div_ceil(4);
            run = 0;
            if !c.is_whitespace() {
                tokens += 1;
            }
        }
        tokens + run.div_ceil(4)
    }
}

/// Result of a successful budget check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBudget {
    /// Estimated prompt tokens.
    pub tokens: usize,
    /// Model context window.
    pub limit: usize,
    /// Tokens left for generation after the reserve.
    pub remaining: usize,
}

impl TokenBudget {
    /// Resolve the generation cap: unset means "all that is left",
    /// otherwise the smaller of the request and what is left.
    #[must_use]
    pub fn max_new_tokens(&self, requested: Option<u32>) -> u32 {
        let remaining = u32::try_from(self.remaining).unwrap_or(u32::MAX);
        requested.map_or(remaining, |n| n.min(remaining))
    }
}

/// Enforces context windows.
#[derive(Clone)]
pub struct TokenBudgeter {
    estimator: Arc<dyn TokenEstimator>,
    reserve: usize,
}

impl Default for TokenBudgeter {
    fn default() -> Self {
        Self::new(Arc::new(HeuristicEstimator))
    }
}

impl std::fmt::Debug for TokenBudgeter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBudgeter")
            .field("reserve", &self.reserve)
            .finish_non_exhaustive()
    }
}

impl TokenBudgeter {
    pub fn new(estimator: Arc<dyn TokenEstimator>) -> Self {
        Self {
            estimator,
            reserve: TOKEN_RESERVE,
        }
    }

    #[must_use]
    pub const fn with_reserve(mut self, reserve: usize) -> Self {
        self.reserve = reserve;
        self
    }

    /// Check `text` against the model's context window.
    pub fn check(&self, spec: &ModelSpec, text: &str) -> GatewayResult<TokenBudget> {
        let tokens = self.estimator.estimate(text);
        let limit = spec.context_window;
        let used = tokens + self.reserve;
        if used >= limit {
            tracing::debug!(model = %spec.id, tokens, limit, "Prompt exceeds context window");
            return Err(GatewayError::ContextLimit {
                model: spec.id.clone(),
                tokens: used,
                limit,
            });
        }
        Ok(TokenBudget {
            tokens,
            limit,
            remaining: limit - used,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BackendKind, TemplateFamily};

    struct CharCount;

    impl TokenEstimator for CharCount {
        fn estimate(&self, text: &str) -> usize {
            text.chars().count()
        }
    }

    fn spec(window: usize) -> ModelSpec {
        ModelSpec::new("m", "org/m", BackendKind::Inference, TemplateFamily::Fallback, window)
    }

    #[test]
    fn test_heuristic_counts() {
        let est = HeuristicEstimator;
        assert_eq!(est.estimate(""), 0);
        assert_eq!(est.estimate("Hi"), 1);
        assert_eq!(est.estimate("Hello"), 2);
        assert_eq!(est.estimate("Hello, world!"), 6);
        assert_eq!(est.estimate("<|im_start|>"), 8);
        assert_eq!(est.estimate("   \n\t"), 0);
    }

    #[test]
    fn test_check_reports_remaining_after_reserve() {
        let budgeter = TokenBudgeter::new(Arc::new(CharCount));
        let budget = budgeter.check(&spec(100), "abcdefghij").unwrap();
        assert_eq!(budget.tokens, 10);
        assert_eq!(budget.remaining, 70);
    }

    #[test]
    fn test_check_rejects_exact_fit() {
        let budgeter = TokenBudgeter::new(Arc::new(CharCount));
        let err = budgeter.check(&spec(30), "abcdefghij").unwrap_err();
        assert!(matches!(
            err,
            GatewayError::ContextLimit { tokens: 30, limit: 30, .. }
        ));
    }

    #[test]
    fn test_max_new_tokens_resolution() {
        let budget = TokenBudget {
            tokens: 10,
            limit: 100,
            remaining: 70,
        };
        assert_eq!(budget.max_new_tokens(None), 70);
        assert_eq!(budget.max_new_tokens(Some(32)), 32);
        assert_eq!(budget.max_new_tokens(Some(500)), 70);
    }

    #[test]
    fn test_custom_reserve() {
        let budgeter = TokenBudgeter::new(Arc::new(CharCount)).with_reserve(0);
        assert_eq!(budgeter.check(&spec(11), "abcdefghij").unwrap().remaining, 1);
    }
}
