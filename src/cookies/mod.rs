//! Cross-subdomain cookie eligibility.
//!
//! Persisted client state is normally scoped to the parent domain so it
//! survives moving between subdomains. Shared hosting suffixes, where every
//! subdomain belongs to a different owner, must not get a parent-domain
//! cookie.

/// Hosting suffixes that never get cross-subdomain cookies.
pub const EXCLUDED_FROM_CROSS_SUBDOMAIN_COOKIE: &[&str] =
    &["herokuapp.com", "vercel.app", "netlify.app"];

/// Returns true if cookies for `hostname` may be scoped across subdomains.
///
/// Only the last two dot-separated labels are compared, so a look-alike such
/// as `test.herokuapp.com.impersonator.io` is still eligible. A missing
/// hostname is not.
///
/// # Example
///
/// ```
/// use telemetry_sanitizer::cookies::is_cross_domain_cookie;
///
/// assert!(is_cross_domain_cookie(Some("www.bbc.co.uk")));
/// assert!(!is_cross_domain_cookie(Some("test.herokuapp.com")));
/// assert!(!is_cross_domain_cookie(None));
/// ```
#[must_use]
pub fn is_cross_domain_cookie(hostname: Option<&str>) -> bool {
    let Some(hostname) = hostname else {
        return false;
    };
    let labels: Vec<&str> = hostname.split('.').collect();
    let last_two = labels[labels.len().saturating_sub(2)..].join(".");
    !EXCLUDED_FROM_CROSS_SUBDOMAIN_COOKIE.contains(&last_two.as_str())
}
