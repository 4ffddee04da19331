//! Bot and crawler detection from user agent strings.
//!
//! A user agent is blocked when any deny pattern, built-in
//! ([`DEFAULT_BLOCKED_USER_AGENTS`]) or caller-supplied, occurs anywhere in
//! it, ignoring case on both sides. Matching is plain substring search.
//!
//! When several patterns match, the longest one is reported, so a
//! specific signature such as `googlebot` wins over a generic one such as
//! `bot.htm`. Equal lengths keep deny-list order.
//!
//! # Example
//!
//! ```
//! use telemetry_sanitizer::blocking::{is_blocked_user_agent, BotClassifier};
//!
//! let ua = "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";
//! let no_extra: &[&str] = &[];
//! assert!(is_blocked_user_agent(ua, no_extra));
//! assert!(!is_blocked_user_agent("Mozilla/5.0 (X11; Linux x86_64)", no_extra));
//!
//! let classifier = BotClassifier::new(["Testington"]);
//! assert!(classifier.is_blocked("Mozilla/5.0 (compatible; TESTINGTON/1.0)"));
//! ```

mod patterns;

use std::cmp::Reverse;

pub use patterns::DEFAULT_BLOCKED_USER_AGENTS;

/// Returns true if `user_agent` matches a built-in or `extra` deny pattern.
///
/// An empty user agent is never blocked. Builds a throwaway
/// [`BotClassifier`]; keep one around when classifying repeatedly.
#[must_use]
pub fn is_blocked_user_agent<S: AsRef<str>>(user_agent: &str, extra: &[S]) -> bool {
    BotClassifier::new(extra).is_blocked(user_agent)
}

/// Deny list matcher with patterns lowercased once up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotClassifier {
    patterns: Vec<String>,
}

impl Default for BotClassifier {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl BotClassifier {
    /// Built-in patterns followed by `extra`.
    ///
    /// Blank extra patterns are dropped; an empty pattern would otherwise
    /// match every user agent.
    #[must_use]
    pub fn new<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = DEFAULT_BLOCKED_USER_AGENTS
            .iter()
            .map(|p| (*p).to_string())
            .chain(
                extra
                    .into_iter()
                    .map(|p| p.as_ref().to_lowercase())
                    .filter(|p| !p.trim().is_empty()),
            )
            .collect();
        Self { patterns }
    }

    /// Built-in patterns only.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(std::iter::empty::<&str>())
    }

    /// Effective lowercase deny list.
    #[must_use]
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Most specific deny pattern found in `user_agent`, if any.
    ///
    /// The longest matching pattern wins; ties go to the earlier pattern.
    #[must_use]
    pub fn matching_pattern(&self, user_agent: &str) -> Option<&str> {
        if user_agent.is_empty() {
            return None;
        }
        let lowered = user_agent.to_lowercase();
        self.patterns
            .iter()
            .enumerate()
            .filter(|(_, pattern)| lowered.contains(pattern.as_str()))
            .min_by_key(|(index, pattern)| (Reverse(pattern.len()), *index))
            .map(|(_, pattern)| pattern.as_str())
    }

    /// Returns true if any deny pattern occurs in `user_agent`.
    #[must_use]
    pub fn is_blocked(&self, user_agent: &str) -> bool {
        self.matching_pattern(user_agent).is_some()
    }
}
