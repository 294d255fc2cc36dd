//! Accepted payload shapes for each deployment profile

use super::rules::{ObjectRule, Rule};

/// Largest integer a browser can represent exactly (2^53 - 1)
const MAX_SAFE_INTEGER: i64 = 9_007_199_254_740_991;

const MAX_SCREEN_PX: i64 = 20_000;
const MAX_ACTIVITY_EVENTS: usize = 100;
const MAX_LANGUAGES: usize = 10;

fn language_tag() -> Rule {
    Rule::string(35)
}

fn languages() -> Rule {
    Rule::array(language_tag(), MAX_LANGUAGES)
}

/// Screen dimensions plus timezone, platform and locale hints
pub fn minimal() -> ObjectRule {
    ObjectRule::new()
        .required(
            "screen",
            ObjectRule::new()
                .required("width", Rule::int(0, MAX_SCREEN_PX))
                .required("height", Rule::int(0, MAX_SCREEN_PX))
                .optional("pixelRatio", Rule::number(0.0, 16.0))
                .optional("colorDepth", Rule::int(0, 64))
                .into(),
        )
        .optional("timezone", Rule::string(64))
        .optional("platform", Rule::string(64))
        .optional("language", language_tag())
        .optional("languages", languages())
        .optional("consent", Rule::bool())
}

/// Full device description: identifiers, system, network, hardware,
/// feature support and an optional activity log
pub fn rich() -> ObjectRule {
    ObjectRule::new()
        .required("identifiers", identifiers().into())
        .required("system", system().into())
        .optional("network", network().into())
        .optional("hardware", hardware().into())
        .optional("features", features().into())
        .optional("activity", Rule::array(activity_event().into(), MAX_ACTIVITY_EVENTS))
        .optional("consent", Rule::bool())
}

fn identifiers() -> ObjectRule {
    ObjectRule::new()
        .required("sessionId", Rule::string(64))
        .optional("visitorId", Rule::string(64))
        .optional("pageLoadId", Rule::string(64))
}

fn system() -> ObjectRule {
    ObjectRule::new()
        .optional("platform", Rule::string(64))
        .optional("language", language_tag())
        .optional("languages", languages())
        .optional("timezone", Rule::string(64))
        .optional("timezoneOffset", Rule::int(-840, 840))
        .optional("cookiesEnabled", Rule::bool())
        .optional("doNotTrack", Rule::string(16))
}

fn network() -> ObjectRule {
    ObjectRule::new()
        .optional("effectiveType", Rule::string(16))
        .optional("downlink", Rule::number(0.0, 10_000.0))
        .optional("rtt", Rule::int(0, 60_000))
        .optional("saveData", Rule::bool())
        .optional("online", Rule::bool())
}

fn hardware() -> ObjectRule {
    let screen = ObjectRule::new()
        .optional("width", Rule::int(0, MAX_SCREEN_PX))
        .optional("height", Rule::int(0, MAX_SCREEN_PX))
        .optional("availWidth", Rule::int(0, MAX_SCREEN_PX))
        .optional("availHeight", Rule::int(0, MAX_SCREEN_PX))
        .optional("colorDepth", Rule::int(0, 64))
        .optional("pixelRatio", Rule::number(0.0, 16.0));

    let battery = ObjectRule::new()
        .optional("level", Rule::number(0.0, 1.0))
        .optional("charging", Rule::bool());

    ObjectRule::new()
        .optional("screen", screen.into())
        .optional("deviceMemory", Rule::number(0.0, 1024.0))
        .optional("hardwareConcurrency", Rule::int(0, 1024))
        .optional("maxTouchPoints", Rule::int(0, 256))
        .optional("battery", battery.into())
}

fn features() -> ObjectRule {
    [
        "cookies",
        "localStorage",
        "sessionStorage",
        "indexedDb",
        "serviceWorker",
        "webgl",
        "webgl2",
        "webAssembly",
        "touch",
    ]
    .into_iter()
    .fold(ObjectRule::new(), |object, name| {
        object.optional(name, Rule::bool())
    })
}

fn activity_event() -> ObjectRule {
    ObjectRule::new()
        .required("type", Rule::string(32))
        .required("at", Rule::int(0, MAX_SAFE_INTEGER))
        .optional("target", Rule::string(256))
}
