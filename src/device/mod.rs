//! Device, browser and operating system detection from user agents.
//!
//! Detection is token based and coarse. It fills
//! the `$device_type`, `$browser`, `$os` and related event properties.
//!
//! # Example
//!
//! ```
//! use telemetry_sanitizer::device::{device_type, DeviceType};
//!
//! let ipad = "Mozilla/5.0 (iPad; CPU OS 6_0 like Mac OS X) AppleWebKit/536.26 (KHTML, like Gecko) Version/6.0 Mobile/10A5355d Safari/8536.25";
//! assert_eq!(device_type(ipad), DeviceType::Tablet);
//! ```

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::value::{Mapping, Value};

/// Value of the `$lib` property.
pub const LIB_NAME: &str = "web";

/// Value of the `$lib_version` property.
pub const LIB_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Coarse device class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceType {
    /// Desktop or laptop (also the fallback).
    Desktop,
    /// Phone-sized device.
    Mobile,
    /// Tablet.
    Tablet,
}

impl DeviceType {
    /// Display name used in event properties.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Desktop => "Desktop",
            Self::Mobile => "Mobile",
            Self::Tablet => "Tablet",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn contains_ignore_case(haystack: &str, needles: &[&str]) -> bool {
    let lowered = haystack.to_lowercase();
    needles.iter().any(|needle| lowered.contains(needle))
}

fn is_blackberry(user_agent: &str) -> bool {
    contains_ignore_case(user_agent, &["blackberry", "playbook", "bb10"])
}

/// Named handheld device, or `None` for desktops and unknown devices.
#[must_use]
pub fn device(user_agent: &str) -> Option<&'static str> {
    let ua = user_agent;
    if contains_ignore_case(ua, &["windows phone"]) || ua.contains("WPDesktop") {
        Some("Windows Phone")
    } else if ua.contains("iPad") {
        Some("iPad")
    } else if ua.contains("iPod") {
        Some("iPod Touch")
    } else if ua.contains("iPhone") {
        Some("iPhone")
    } else if is_blackberry(ua) {
        Some("BlackBerry")
    } else if ua.contains("Android") && !ua.contains("Mobile") {
        Some("Android Tablet")
    } else if ua.contains("Android") {
        Some("Android")
    } else {
        None
    }
}

/// Tablet, mobile or desktop classification.
#[must_use]
pub fn device_type(user_agent: &str) -> DeviceType {
    match device(user_agent) {
        Some("iPad" | "Android Tablet") => DeviceType::Tablet,
        Some(_) => DeviceType::Mobile,
        None => DeviceType::Desktop,
    }
}

/// Browser name, or `None` if unrecognised.
#[must_use]
pub fn browser(user_agent: &str) -> Option<&'static str> {
    let ua = user_agent;
    let name = if ua.contains(" OPR/") || ua.contains("Opera") {
        if ua.contains("Mini") {
            "Opera Mini"
        } else {
            "Opera"
        }
    } else if is_blackberry(ua) {
        "BlackBerry"
    } else if ua.contains("IEMobile") || ua.contains("WPDesktop") {
        "Internet Explorer Mobile"
    } else if ua.contains("SamsungBrowser/") {
        "Samsung Internet"
    } else if ua.contains("Edge") || ua.contains("Edg/") {
        "Microsoft Edge"
    } else if ua.contains("FBIOS") {
        "Facebook Mobile"
    } else if ua.contains("Chrome") {
        "Chrome"
    } else if ua.contains("CriOS") {
        "Chrome iOS"
    } else if ua.contains("UCWEB") || ua.contains("UCBrowser") {
        "UC Browser"
    } else if ua.contains("FxiOS") {
        "Firefox iOS"
    } else if ua.contains("Safari") && ua.contains("Version/") {
        if ua.contains("Mobile") {
            "Mobile Safari"
        } else {
            "Safari"
        }
    } else if ua.contains("Android") {
        "Android Mobile"
    } else if ua.contains("Konqueror") {
        "Konqueror"
    } else if ua.contains("Firefox") {
        "Firefox"
    } else if ua.contains("MSIE") || ua.contains("Trident/") {
        "Internet Explorer"
    } else if ua.contains("Gecko") {
        "Mozilla"
    } else {
        return None;
    };
    Some(name)
}

fn version_patterns() -> &'static [(&'static str, Regex)] {
    static PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let raw = [
            ("Internet Explorer Mobile", r"rv:(?P<v>\d+(?:\.\d+)?)"),
            ("Microsoft Edge", r"Edge?/(?P<v>\d+(?:\.\d+)?)"),
            ("Chrome", r"Chrome/(?P<v>\d+(?:\.\d+)?)"),
            ("Chrome iOS", r"CriOS/(?P<v>\d+(?:\.\d+)?)"),
            ("UC Browser", r"(?:UCBrowser|UCWEB)/(?P<v>\d+(?:\.\d+)?)"),
            ("Safari", r"Version/(?P<v>\d+(?:\.\d+)?)"),
            ("Mobile Safari", r"Version/(?P<v>\d+(?:\.\d+)?)"),
            ("Opera", r"(?:Opera|OPR)/(?P<v>\d+(?:\.\d+)?)"),
            ("Firefox", r"Firefox/(?P<v>\d+(?:\.\d+)?)"),
            ("Firefox iOS", r"FxiOS/(?P<v>\d+(?:\.\d+)?)"),
            ("Konqueror", r"Konqueror:(?P<v>\d+(?:\.\d+)?)"),
            ("BlackBerry", r"BlackBerry (?P<v>\d+(?:\.\d+)?)"),
            ("Android Mobile", r"(?i)android\s(?P<v>\d+(?:\.\d+)?)"),
            ("Samsung Internet", r"SamsungBrowser/(?P<v>\d+(?:\.\d+)?)"),
            ("Internet Explorer", r"(?:rv:|MSIE )(?P<v>\d+(?:\.\d+)?)"),
            ("Mozilla", r"rv:(?P<v>\d+(?:\.\d+)?)"),
        ];
        raw.into_iter()
            .filter_map(|(name, pattern)| Regex::new(pattern).ok().map(|re| (name, re)))
            .collect()
    })
}

/// Major.minor version of the detected browser.
#[must_use]
pub fn browser_version(user_agent: &str) -> Option<f64> {
    let name = browser(user_agent)?;
    let (_, pattern) = version_patterns().iter().find(|(n, _)| *n == name)?;
    pattern
        .captures(user_agent)?
        .name("v")?
        .as_str()
        .parse()
        .ok()
}

/// Operating system name, or `None` if unrecognised.
#[must_use]
pub fn os(user_agent: &str) -> Option<&'static str> {
    let ua = user_agent;
    let name = if contains_ignore_case(ua, &["windows"]) {
        if ua.contains("Phone") || ua.contains("WPDesktop") {
            "Windows Phone"
        } else {
            "Windows"
        }
    } else if ua.contains("iPhone") || ua.contains("iPad") || ua.contains("iPod") {
        "iOS"
    } else if ua.contains("Android") {
        "Android"
    } else if is_blackberry(ua) {
        "BlackBerry"
    } else if contains_ignore_case(ua, &["mac"]) {
        "Mac OS X"
    } else if ua.contains("Linux") {
        "Linux"
    } else if ua.contains("CrOS") {
        "Chrome OS"
    } else {
        return None;
    };
    Some(name)
}

/// Client properties attached to every captured event.
///
/// Always contains `$device_type`, `$lib` and `$lib_version`; `$os`,
/// `$browser`, `$browser_version` and `$device` are present only when
/// detected.
#[must_use]
pub fn properties(user_agent: &str) -> Mapping {
    let mut entries: Vec<(&str, Value)> = vec![
        ("$device_type", Value::from(device_type(user_agent).as_str())),
        ("$lib", Value::from(LIB_NAME)),
        ("$lib_version", Value::from(LIB_VERSION)),
    ];
    if let Some(os) = os(user_agent) {
        entries.push(("$os", Value::from(os)));
    }
    if let Some(browser) = browser(user_agent) {
        entries.push(("$browser", Value::from(browser)));
    }
    if let Some(version) = browser_version(user_agent) {
        entries.push(("$browser_version", Value::from(version)));
    }
    if let Some(device) = device(user_agent) {
        entries.push(("$device", Value::from(device)));
    }
    entries.into_iter().collect()
}
