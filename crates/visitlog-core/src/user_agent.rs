//! User-agent classification into browser, engine, os, device and cpu parts.
//!
//! The raw header is never part of the result. Anything not recognised is
//! left as `None` and omitted from serialized output.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Structured view of a user-agent header
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedUserAgent {
    pub browser: Browser,
    pub engine: Engine,
    pub os: Os,
    pub device: Device,
    pub cpu: Cpu,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Browser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Engine {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Os {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cpu {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
}

struct Rule {
    pattern: Regex,
    name: &'static str,
}

impl Rule {
    fn new(pattern: &str, name: &'static str) -> Self {
        Self {
            // Patterns are compile-time literals covered by tests
            pattern: Regex::new(pattern)
                .unwrap_or_else(|e| panic!("bad UA pattern {pattern}: {e}")),
            name,
        }
    }

    /// Name plus the first capture group, if the rule matches
    fn capture<'a>(&self, ua: &'a str) -> Option<(&'static str, Option<&'a str>)> {
        let caps = self.pattern.captures(ua)?;
        Some((self.name, caps.get(1).map(|m| m.as_str())))
    }
}

static BROWSER_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::new(r"Edg(?:e|A|iOS)?/([\d.]+)", "Edge"),
        Rule::new(r"(?:OPR|Opera)/([\d.]+)", "Opera"),
        Rule::new(r"SamsungBrowser/([\d.]+)", "Samsung Internet"),
        Rule::new(r"(?:Firefox|FxiOS)/([\d.]+)", "Firefox"),
        Rule::new(r"(?:Chrome|CriOS)/([\d.]+)", "Chrome"),
        Rule::new(r"Version/([\d.]+).*Mobile.*Safari/", "Mobile Safari"),
        Rule::new(r"Version/([\d.]+).*Safari/", "Safari"),
        Rule::new(r"(?:MSIE |Trident/.*rv:)([\d.]+)", "IE"),
    ]
});

static ENGINE_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::new(r"Edge/([\d.]+)", "EdgeHTML"),
        Rule::new(r"Chrome/([\d.]+)", "Blink"),
        Rule::new(r"AppleWebKit/([\d.]+)", "WebKit"),
        Rule::new(r"Trident/([\d.]+)", "Trident"),
        Rule::new(r"Presto/([\d.]+)", "Presto"),
        Rule::new(r"rv:([\d.]+)\) Gecko/", "Gecko"),
    ]
});

static OS_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::new(r"Windows NT ([\d.]+)", "Windows"),
        Rule::new(r"(?:iPhone|iPad|iPod)(?:.*?OS ([\d_]+))?", "iOS"),
        Rule::new(r"Mac OS X ([\d_.]+)", "Mac OS"),
        Rule::new(r"Android(?: ([\d.]+))?", "Android"),
        Rule::new(r"CrOS \S+ ([\d.]+)", "Chrome OS"),
        Rule::new(r"Linux", "Linux"),
    ]
});

static CPU_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::new(r"(?i)(?:x86_64|x64;|win64|wow64|amd64)", "amd64"),
        Rule::new(r"(?i)(?:aarch64|arm64)", "arm64"),
        Rule::new(r"(?i)\barmv?\d", "arm"),
        Rule::new(r"(?i)(?:i[3-6]86|\bx86\b)", "ia32"),
    ]
});

static ANDROID_MODEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Android[^;)]*;\s*(?:[a-z]{2}[-_][a-zA-Z]{2};\s*)?([^;)]+?)(?:\s+Build/[^;)]*)?\)")
        .unwrap_or_else(|e| panic!("bad UA pattern: {e}"))
});

/// Classify a raw user-agent header
pub fn classify(user_agent: Option<&str>) -> ParsedUserAgent {
    let Some(ua) = user_agent.map(str::trim).filter(|ua| !ua.is_empty()) else {
        return ParsedUserAgent::default();
    };

    ParsedUserAgent {
        browser: classify_browser(ua),
        engine: classify_engine(ua),
        os: classify_os(ua),
        device: classify_device(ua),
        cpu: Cpu {
            architecture: first_match(&CPU_RULES, ua).map(|(name, _)| name.to_string()),
        },
    }
}

fn first_match<'a>(rules: &[Rule], ua: &'a str) -> Option<(&'static str, Option<&'a str>)> {
    rules.iter().find_map(|rule| rule.capture(ua))
}

fn classify_browser(ua: &str) -> Browser {
    match first_match(&BROWSER_RULES, ua) {
        Some((name, version)) => Browser {
            name: Some(name.to_string()),
            version: version.map(str::to_string),
            major: version
                .and_then(|v| v.split('.').next())
                .filter(|major| !major.is_empty())
                .map(str::to_string),
        },
        None => Browser::default(),
    }
}

fn classify_engine(ua: &str) -> Engine {
    // Blink only applies to WebKit-derived agents
    let rules = ENGINE_RULES
        .iter()
        .filter(|rule| rule.name != "Blink" || ua.contains("AppleWebKit"));

    for rule in rules {
        if let Some((name, version)) = rule.capture(ua) {
            return Engine {
                name: Some(name.to_string()),
                version: version.map(str::to_string),
            };
        }
    }

    Engine::default()
}

fn classify_os(ua: &str) -> Os {
    match first_match(&OS_RULES, ua) {
        Some(("Windows", version)) => Os {
            name: Some("Windows".to_string()),
            version: version.map(windows_release),
        },
        Some((name, version)) => Os {
            name: Some(name.to_string()),
            version: version.map(|v| v.replace('_', ".")),
        },
        None => Os::default(),
    }
}

fn windows_release(nt_version: &str) -> String {
    match nt_version {
        "10.0" => "10",
        "6.3" => "8.1",
        "6.2" => "8",
        "6.1" => "7",
        "6.0" => "Vista",
        "5.2" | "5.1" => "XP",
        other => other,
    }
    .to_string()
}

fn classify_device(ua: &str) -> Device {
    let apple = |model: &str, kind: Option<&str>| Device {
        vendor: Some("Apple".to_string()),
        model: Some(model.to_string()),
        kind: kind.map(str::to_string),
    };

    if ua.contains("iPad") {
        return apple("iPad", Some("tablet"));
    }
    if ua.contains("iPhone") {
        return apple("iPhone", Some("mobile"));
    }
    if ua.contains("iPod") {
        return apple("iPod touch", Some("mobile"));
    }
    if ua.contains("Macintosh") {
        return apple("Macintosh", None);
    }

    if ua.contains("Android") {
        let model = ANDROID_MODEL
            .captures(ua)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|m| !m.is_empty() && m != "K" && !m.starts_with("Linux"));
        let vendor = model.as_deref().and_then(android_vendor).map(str::to_string);
        let kind = if ua.contains("Mobile") { "mobile" } else { "tablet" };

        return Device {
            vendor,
            model,
            kind: Some(kind.to_string()),
        };
    }

    if ua.contains("SmartTV") || ua.contains("SMART-TV") {
        return Device {
            kind: Some("smarttv".to_string()),
            ..Device::default()
        };
    }

    Device::default()
}

fn android_vendor(model: &str) -> Option<&'static str> {
    if model.starts_with("SM-") || model.starts_with("GT-") {
        Some("Samsung")
    } else if model.starts_with("Pixel") || model.starts_with("Nexus") {
        Some("Google")
    } else if model.starts_with("Redmi") || model.starts_with("Mi ") {
        Some("Xiaomi")
    } else {
        None
    }
}
