//! Proof-of-work solver for the conversational backend's anti-automation gate.
//!
//! The gate hands out a `(seed, difficulty)` pair. We search for a browser
//! fingerprint config whose SHA3-512 digest, salted with the seed, has a hex
//! prefix lexicographically at or below the difficulty. The search is bounded
//! by an iteration count and optionally by wall-clock time; running out of
//! either yields a recognisable fallback token instead of an error.

use std::io;
use std::time::{Duration, Instant};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use rand::seq::SliceRandom;
use serde::Serialize;
use serde_json::Value;
use serde_json::ser::Formatter;
use sha3::{Digest, Sha3_512};

use crate::config::{BROWSER_USER_AGENT, GatewayConfig};

/// Prefix of a solved token.
pub const SOLVED_PREFIX: &str = "gAAAAAB";
/// Prefix of the fallback token returned when the search gives up.
pub const UNSOLVED_PREFIX: &str = "gAAAAABwQ8Lk5FbGpA2NcR9dShT6gYjU7VxZ4D";

const CORE_COUNTS: [u32; 4] = [8, 12, 16, 24];
const SCREEN_SIZES: [u32; 3] = [3000, 4000, 6000];
const HEAP_LIMIT: u64 = 4_294_705_152;

/// A challenge advertised by the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofChallenge {
    pub seed: String,
    pub difficulty: String,
}

impl ProofChallenge {
    pub fn new(seed: impl Into<String>, difficulty: impl Into<String>) -> Self {
        Self {
            seed: seed.into(),
            difficulty: difficulty.into(),
        }
    }

    /// Extract a challenge from a requirements body.
    ///
    /// Returns `None` unless `proofofwork.required` is `true` and both
    /// `seed` and `difficulty` are strings.
    pub fn from_requirements(body: &Value) -> Option<Self> {
        let pow = body.get("proofofwork")?;
        if !pow.get("required").and_then(Value::as_bool).unwrap_or(false) {
            return None;
        }
        Some(Self::new(
            pow.get("seed")?.as_str()?,
            pow.get("difficulty")?.as_str()?,
        ))
    }
}

/// Outcome of a search. `Unsolved` is a degraded value, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProofToken {
    Solved { token: String, attempts: u32 },
    Unsolved { token: String, attempts: u32 },
}

impl ProofToken {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Solved { token, .. } | Self::Unsolved { token, .. } => token,
        }
    }

    pub const fn is_solved(&self) -> bool {
        matches!(self, Self::Solved { .. })
    }

    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Solved { attempts, .. } | Self::Unsolved { attempts, .. } => *attempts,
        }
    }
}

/// Bounded proof-of-work search.
#[derive(Debug, Clone)]
pub struct ProofSolver {
    max_iterations: u32,
    deadline: Option<Duration>,
    user_agent: String,
}

impl Default for ProofSolver {
    fn default() -> Self {
        Self {
            max_iterations: 100_000,
            deadline: None,
            user_agent: BROWSER_USER_AGENT.to_string(),
        }
    }
}

impl ProofSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            max_iterations: config.proof_max_iterations,
            deadline: config.proof_deadline,
            user_agent: config.user_agent.clone(),
        }
    }

    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    #[must_use]
    pub const fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Run the search on the current thread.
    pub fn solve(&self, challenge: &ProofChallenge) -> ProofToken {
        let started = Instant::now();
        let target_len = challenge.difficulty.len() / 2;
        let mut rng = rand::thread_rng();
        let fingerprint = format!(
            "{}{}",
            CORE_COUNTS.choose(&mut rng).copied().unwrap_or(8),
            SCREEN_SIZES.choose(&mut rng).copied().unwrap_or(3000)
        );
        let timestamp = browser_timestamp();

        let mut attempts = 0;
        for counter in 0..self.max_iterations {
            if let Some(deadline) = self.deadline {
                if started.elapsed() >= deadline {
                    tracing::warn!(attempts, ?deadline, "Proof search hit its deadline");
                    break;
                }
            }
            attempts += 1;

            let config = (
                fingerprint.as_str(),
                timestamp.as_str(),
                HEAP_LIMIT,
                counter,
                self.user_agent.as_str(),
            );
            let base = match python_json(&config) {
                Ok(json) => STANDARD.encode(json),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to serialise proof config");
                    break;
                }
            };
            let digest = hex::encode(Sha3_512::digest(format!("{}{base}", challenge.seed)));
            let prefix = digest.get(..target_len).unwrap_or(digest.as_str());
            if prefix <= challenge.difficulty.as_str() {
                tracing::debug!(attempts, "Proof solved");
                return ProofToken::Solved {
                    token: format!("{SOLVED_PREFIX}{base}"),
                    attempts,
                };
            }
        }

        tracing::warn!(
            attempts,
            difficulty = %challenge.difficulty,
            "Proof unsolved, using fallback token"
        );
        ProofToken::Unsolved {
            token: format!("{UNSOLVED_PREFIX}{}", STANDARD.encode(&challenge.seed)),
            attempts,
        }
    }

    /// Run the search on the blocking pool.
    pub async fn solve_blocking(&self, challenge: &ProofChallenge) -> ProofToken {
        let solver = self.clone();
        let owned = challenge.clone();
        match tokio::task::spawn_blocking(move || solver.solve(&owned)).await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(error = %e, "Proof task failed");
                ProofToken::Unsolved {
                    token: format!("{UNSOLVED_PREFIX}{}", STANDARD.encode(&challenge.seed)),
                    attempts: 0,
                }
            }
        }
    }
}

/// `Mon Jan 01 2024 08:00:00 GMT+0800 (中国标准时间)`, wall clock in UTC+8.
fn browser_timestamp() -> String {
    let local = Utc::now() + chrono::Duration::hours(8);
    format!("{} GMT+0800 (中国标准时间)", local.format("%a %b %d %Y %H:%M:%S"))
}

/// Serialise the way Python's `json.dumps` does by default: `", "` and
/// `": "` separators, non-ASCII escaped as `\uXXXX`.
fn python_json<T: Serialize>(value: &T) -> serde_json::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(256);
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, PythonFormatter);
    value.serialize(&mut serializer)?;
    Ok(out)
}

struct PythonFormatter;

impl Formatter for PythonFormatter {
    fn begin_array_value<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        fragment: &str,
    ) -> io::Result<()> {
        let mut units = [0u16; 2];
        let mut utf8 = [0u8; 4];
        for c in fragment.chars() {
            if c.is_ascii() {
                writer.write_all(c.encode_utf8(&mut utf8).as_bytes())?;
            } else {
                for unit in c.encode_utf16(&mut units) {
                    write!(writer, "\\u{unit:04x}")?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn solver() -> ProofSolver {
        ProofSolver::new().with_deadline(None)
    }

    #[test]
    fn test_python_json_separators_and_escapes() {
        let out = python_json(&("83000", "Mon 中 😀", HEAP_LIMIT, 7u32, "UA")).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            r#"["83000", "Mon \u4e2d \ud83d\ude00", 4294705152, 7, "UA"]"#
        );
    }

    #[test]
    fn test_python_json_objects() {
        let out = python_json(&json!({"a": 1, "b": [1, 2]})).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), r#"{"a": 1, "b": [1, 2]}"#);
    }

    #[test]
    fn test_timestamp_shape() {
        let ts = browser_timestamp();
        assert!(ts.ends_with(" GMT+0800 (中国标准时间)"));
        // "Mon Jan 01 2024 08:00:00"
        assert_eq!(ts.split(' ').count(), 7);
    }

    #[test]
    fn test_easy_difficulty_solves_first_attempt() {
        let token = solver().solve(&ProofChallenge::new("0.42", "ff"));
        assert!(token.is_solved());
        assert_eq!(token.attempts(), 1);
        assert!(token.as_str().starts_with(SOLVED_PREFIX));
    }

    #[test]
    fn test_impossible_difficulty_stops_at_bound() {
        let token = solver()
            .with_max_iterations(500)
            .solve(&ProofChallenge::new("seed", "//"));
        assert!(!token.is_solved());
        assert_eq!(token.attempts(), 500);
        assert_eq!(
            token.as_str(),
            format!("{UNSOLVED_PREFIX}{}", STANDARD.encode("seed"))
        );
    }

    #[test]
    fn test_solved_token_satisfies_difficulty() {
        let challenge = ProofChallenge::new("0.42665582693491433", "0fffff");
        let token = solver().solve(&challenge);
        let ProofToken::Solved { token, attempts } = token else {
            panic!("expected a solution within the bound");
        };
        assert!(attempts <= 100_000);

        let base = token.strip_prefix(SOLVED_PREFIX).unwrap();
        let digest = hex::encode(Sha3_512::digest(format!("{}{base}", challenge.seed)));
        assert!(&digest[..3] <= "0fffff");

        let config: Value = serde_json::from_slice(&STANDARD.decode(base).unwrap()).unwrap();
        assert_eq!(config[2], json!(HEAP_LIMIT));
        assert_eq!(config[3], json!(attempts - 1));
        assert_eq!(config[4], json!(BROWSER_USER_AGENT));
    }

    #[test]
    fn test_zero_deadline_returns_fallback_without_attempts() {
        let token = ProofSolver::new()
            .with_deadline(Some(Duration::ZERO))
            .solve(&ProofChallenge::new("s", "ff"));
        assert!(!token.is_solved());
        assert_eq!(token.attempts(), 0);
    }

    #[test]
    fn test_challenge_from_requirements() {
        let body = json!({
            "proofofwork": {"required": true, "seed": "0.1", "difficulty": "05cdf2"}
        });
        assert_eq!(
            ProofChallenge::from_requirements(&body),
            Some(ProofChallenge::new("0.1", "05cdf2"))
        );
        let not_required = json!({
            "proofofwork": {"required": false, "seed": "0.1", "difficulty": "0"}
        });
        assert_eq!(ProofChallenge::from_requirements(&not_required), None);
        assert_eq!(ProofChallenge::from_requirements(&json!({})), None);
    }

    #[tokio::test]
    async fn test_solve_blocking() {
        let token = solver().solve_blocking(&ProofChallenge::new("0.42", "ff")).await;
        assert!(token.is_solved());
    }
}
