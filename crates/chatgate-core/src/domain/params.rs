//! Generation parameters with the upstream clamping rules applied.

/// Lower bound for temperature and top-p (upstreams reject 0).
pub const SAMPLING_MIN: f32 = 0.01;
/// Upper bound for temperature and top-p (upstreams reject 1).
pub const SAMPLING_MAX: f32 = 0.99;
/// Top-p used when the caller does not send one.
pub const DEFAULT_TOP_P: f32 = 0.95;

/// Sampling settings for one request.
///
/// Construct with [`GenerationParams::from_request`] so the clamping rules
/// are always applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_p: f32,
    /// Caller-requested cap; `None` means "use the remaining context budget".
    pub max_new_tokens: Option<u32>,
    pub use_cache: bool,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self::from_request(None, None, None, false)
    }
}

impl GenerationParams {
    /// Build parameters from raw caller values.
    ///
    /// - temperature: missing, negative or non-finite becomes 0, then clamped
    ///   into `[0.01, 0.99]`
    /// - top_p: missing or non-finite becomes 0.95, then clamped likewise
    /// - max_tokens: zero or negative means "unset"
    #[must_use]
    pub fn from_request(
        temperature: Option<f32>,
        top_p: Option<f32>,
        max_tokens: Option<i64>,
        use_cache: bool,
    ) -> Self {
        let temperature = temperature
            .filter(|t| t.is_finite() && *t >= 0.0)
            .unwrap_or(0.0)
            .clamp(SAMPLING_MIN, SAMPLING_MAX);
        let top_p = top_p
            .filter(|p| p.is_finite())
            .unwrap_or(DEFAULT_TOP_P)
            .clamp(SAMPLING_MIN, SAMPLING_MAX);
        let max_new_tokens = max_tokens
            .filter(|n| *n > 0)
            .map(|n| u32::try_from(n).unwrap_or(u32::MAX));

        Self {
            temperature,
            top_p,
            max_new_tokens,
            use_cache,
        }
    }
}
