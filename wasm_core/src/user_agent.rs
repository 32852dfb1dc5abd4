//! User-agent parsing and crawler heuristics.
//!
//! Detection is table driven: each table is an ordered list of regexes and the
//! first hit wins, so more specific products (Edge, Opera, Vivaldi, ...) sit
//! ahead of the Chrome and Safari tokens they also carry. Tables compile once.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BrowserInfo {
    pub name: Option<String>,
    pub version: Option<String>,
    pub major: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OsInfo {
    pub name: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Mobile,
    Tablet,
    SmartTv,
    Console,
    Wearable,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub vendor: Option<String>,
    pub model: Option<String>,
    #[serde(rename = "type")]
    pub device_type: Option<DeviceType>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngineInfo {
    pub name: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CpuInfo {
    pub architecture: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAgentInfo {
    pub ua: String,
    pub browser: BrowserInfo,
    pub os: OsInfo,
    pub device: DeviceInfo,
    pub engine: EngineInfo,
    pub cpu: CpuInfo,
    pub is_bot: bool,
    pub is_bot_naive: bool,
    pub matched_substring: Option<String>,
    pub all_matched_substrings: Vec<String>,
    pub pattern_string_match: Option<String>,
    pub bot_regex_pattern: String,
}

#[derive(Debug, Clone, Copy)]
enum VersionStyle {
    Plain,
    Underscored,
    WindowsNt,
}

struct Rule {
    pattern: Regex,
    name: &'static str,
    style: VersionStyle,
}

#[derive(Clone, Copy)]
enum FormFactor {
    Fixed(Option<DeviceType>),
    // Android phones advertise "Mobile"; tablets do not.
    Android,
}

struct DeviceRule {
    pattern: Regex,
    vendor: Option<&'static str>,
    form: FormFactor,
}

struct Tables {
    browsers: Vec<Rule>,
    systems: Vec<Rule>,
    engines: Vec<Rule>,
    devices: Vec<DeviceRule>,
    cpus: Vec<(Regex, &'static str)>,
}

static TABLES: OnceLock<Tables> = OnceLock::new();
static BOTS: OnceLock<BotMatcher> = OnceLock::new();

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("user-agent pattern compiles")
}

fn rule(pattern: &str, name: &'static str, style: VersionStyle) -> Rule {
    Rule {
        pattern: compile(pattern),
        name,
        style,
    }
}

fn device(pattern: &str, vendor: Option<&'static str>, form: FormFactor) -> DeviceRule {
    DeviceRule {
        pattern: compile(pattern),
        vendor,
        form,
    }
}

fn tables() -> &'static Tables {
    TABLES.get_or_init(|| {
        use FormFactor::{Android, Fixed};
        use VersionStyle::{Plain, Underscored, WindowsNt};
        Tables {
            browsers: vec![
                rule(r"\b(?:Edg|EdgA|EdgiOS|Edge)/([\d.]+)", "Edge", Plain),
                rule(r"\b(?:OPR|Opera)/([\d.]+)", "Opera", Plain),
                rule(r"\bVivaldi/([\d.]+)", "Vivaldi", Plain),
                rule(r"\bYaBrowser/([\d.]+)", "Yandex", Plain),
                rule(r"\bSamsungBrowser/([\d.]+)", "Samsung Internet", Plain),
                rule(r"\bUCBrowser/([\d.]+)", "UCBrowser", Plain),
                rule(r"\b(?:Firefox|FxiOS)/([\d.]+)", "Firefox", Plain),
                rule(r"\bCriOS/([\d.]+)", "Chrome", Plain),
                rule(r"\bChromium/([\d.]+)", "Chromium", Plain),
                rule(r"\bChrome/([\d.]+)", "Chrome", Plain),
                rule(r"\bMSIE ([\d.]+)", "IE", Plain),
                rule(r"\bTrident/.*\brv:([\d.]+)", "IE", Plain),
                rule(r"\bVersion/([\d.]+) Mobile/\S+ Safari/", "Mobile Safari", Plain),
                rule(r"\bVersion/([\d.]+).*\bSafari/", "Safari", Plain),
            ],
            systems: vec![
                rule(r"\bWindows Phone(?: OS)? ([\d.]+)", "Windows Phone", Plain),
                rule(r"\bWindows NT ([\d.]+)", "Windows", WindowsNt),
                rule(r"\b(?:CPU(?: iPhone)?|iPhone) OS ([\d_]+)", "iOS", Underscored),
                rule(r"\bAndroid[ /]?([\d.]*)", "Android", Plain),
                rule(r"\bCrOS \S+ ([\d.]+)", "Chrome OS", Plain),
                rule(r"\bMac OS X ?([\d_.]*)", "macOS", Underscored),
                rule(r"\bLinux ?([\w.]*)", "Linux", Plain),
            ],
            engines: vec![
                rule(r"\bTrident/([\d.]+)", "Trident", Plain),
                rule(r"\bEdge/([\d.]+)", "EdgeHTML", Plain),
                rule(r"\bPresto/([\d.]+)", "Presto", Plain),
                rule(r"AppleWebKit/537\.36.+\b(?:Chrome|Edg)/([\d.]+)", "Blink", Plain),
                rule(r"\bAppleWebKit/([\d.]+)", "WebKit", Plain),
                rule(r"\brv:([\w.]+).*\bGecko/", "Gecko", Plain),
            ],
            devices: vec![
                device(r"\b(iPad)\b", Some("Apple"), Fixed(Some(DeviceType::Tablet))),
                device(r"\b(iPhone)\b", Some("Apple"), Fixed(Some(DeviceType::Mobile))),
                device(r"\b(iPod)\b", Some("Apple"), Fixed(Some(DeviceType::Mobile))),
                device(r"\b(Pixel [\w ]+?)(?: Build|[;)])", Some("Google"), Android),
                device(r"\b(SM-[A-Z]\w+)", Some("Samsung"), Android),
                device(r"\b((?:Redmi|POCO|Mi) [\w ]+?)(?: Build|[;)])", Some("Xiaomi"), Android),
                device(r"\bHUAWEI[ _]?([\w-]+)", Some("Huawei"), Android),
                device(
                    r"\b(Xbox(?: One| Series [XS])?)",
                    Some("Microsoft"),
                    Fixed(Some(DeviceType::Console)),
                ),
                device(r"\b(PlayStation ?\w*)", Some("Sony"), Fixed(Some(DeviceType::Console))),
                device(r"\b(Nintendo \w+)", Some("Nintendo"), Fixed(Some(DeviceType::Console))),
                device(
                    r"(?i)\b(?:smart-?tv|hbbtv|googletv|appletv|crkey)\b",
                    None,
                    Fixed(Some(DeviceType::SmartTv)),
                ),
                device(r"(?i)\bwatch\b", None, Fixed(Some(DeviceType::Wearable))),
                device(r"\b(Macintosh)\b", Some("Apple"), Fixed(None)),
                device(r"\bAndroid [\d.]+; ([^;)]+?)(?: Build/[^;)]*)?\)", None, Android),
            ],
            cpus: vec![
                (compile(r"(?i)\b(?:x86_64|x64|win64|wow64|amd64)\b"), "amd64"),
                (compile(r"(?i)\b(?:aarch64|arm64)\b"), "arm64"),
                (compile(r"(?i)\b(?:armv\d+\w*|arm)\b"), "arm"),
                (compile(r"(?i)\b(?:i[3-6]86|x86|win32)\b"), "ia32"),
            ],
        }
    })
}

impl Rule {
    fn apply(&self, ua: &str) -> Option<(&'static str, Option<String>)> {
        let captures = self.pattern.captures(ua)?;
        let version = captures
            .get(1)
            .map(|m| m.as_str())
            .filter(|v| !v.is_empty())
            .map(|v| match self.style {
                VersionStyle::Plain => v.to_string(),
                VersionStyle::Underscored => v.replace('_', "."),
                VersionStyle::WindowsNt => windows_release(v).to_string(),
            });
        Some((self.name, version))
    }
}

fn first_match(rules: &[Rule], ua: &str) -> Option<(&'static str, Option<String>)> {
    rules.iter().find_map(|rule| rule.apply(ua))
}

fn windows_release(nt: &str) -> &str {
    match nt {
        "10.0" => "10",
        "6.3" => "8.1",
        "6.2" => "8",
        "6.1" => "7",
        "6.0" => "Vista",
        "5.1" | "5.2" => "XP",
        "5.0" => "2000",
        other => other,
    }
}

fn detect_device(ua: &str) -> DeviceInfo {
    let matched = tables().devices.iter().find_map(|rule| {
        rule.pattern.captures(ua).map(|captures| {
            let model = captures.get(1).map(|m| m.as_str().trim().to_string());
            let device_type = match rule.form {
                FormFactor::Fixed(kind) => kind,
                FormFactor::Android => Some(android_form(ua)),
            };
            DeviceInfo {
                vendor: rule.vendor.map(str::to_string),
                model,
                device_type,
            }
        })
    });
    matched.unwrap_or_else(|| DeviceInfo {
        device_type: if ua.contains("Mobile") {
            Some(DeviceType::Mobile)
        } else if ua.contains("Tablet") {
            Some(DeviceType::Tablet)
        } else {
            None
        },
        ..DeviceInfo::default()
    })
}

fn android_form(ua: &str) -> DeviceType {
    if ua.contains("Mobile") {
        DeviceType::Mobile
    } else {
        DeviceType::Tablet
    }
}

// Crawler, scraper and automation signatures, matched case-insensitively.
const BOT_PATTERNS: &[&str] = &[
    r"^.{0,4}$",
    r"^[\w.\- ]+(?:/v?\d+(?:\.\d+)*)?$",
    r"^(?:apache-httpclient|axios|curl|go-http-client|java|libwww|node-fetch|okhttp|perl|php|postman|python|ruby|wget)",
    r"bot\b",
    r"bot[/_;\-]",
    r"crawl",
    r"spider",
    r"slurp",
    r"scrap",
    r"fetch",
    r"http",
    r"lighthouse",
    r"headless",
    r"phantom",
    r"selenium",
    r"puppeteer",
    r"playwright",
    r"archive",
    r"scan",
    r"search",
    r"monitor",
    r"uptime",
    r"pingdom",
    r"validator",
    r"preview",
    r"feed",
    r"\brss",
    r"facebookexternalhit",
    r"embedly",
    r"whatsapp",
    r"telegram",
    r"discord",
    r"google-",
    r"yandex(?:bot|images|metrika)",
    r"baidu",
    r"daum[ /]",
    r"ahrefs",
    r"semrush",
    r"mj12",
    r"bytespider",
    r"gptbot",
    r"chatgpt",
    r"claude",
    r"perplexity",
    r"ccbot",
    r"cfnetwork/",
    r"zgrab",
    r"nmap",
    r"masscan",
    r"nikto",
    r"sqlmap",
];

const NAIVE_BOT_PATTERN: &str = r"(?i)bot|crawl|http|lighthouse|scan|search|spider";

struct BotMatcher {
    combined: Regex,
    naive: Regex,
    entries: Vec<(&'static str, Regex)>,
    source: String,
}

fn bots() -> &'static BotMatcher {
    BOTS.get_or_init(|| {
        let joined = BOT_PATTERNS.join("|");
        BotMatcher {
            combined: compile(&format!("(?i){joined}")),
            naive: compile(NAIVE_BOT_PATTERN),
            entries: BOT_PATTERNS
                .iter()
                .map(|pattern| (*pattern, compile(&format!("(?i){pattern}"))))
                .collect(),
            source: format!("/{joined}/i"),
        }
    })
}

/// Source of the combined crawler expression, in JS literal notation.
pub fn bot_regex_pattern() -> &'static str {
    &bots().source
}

/// Parses `ua` into its browser, OS, device, engine and CPU fields and runs the
/// crawler heuristics. Unknown fields stay `None`; this never fails.
pub fn parse(ua: &str) -> UserAgentInfo {
    let ua = ua.trim();
    let matcher = bots();
    if ua.is_empty() {
        return UserAgentInfo {
            ua: String::new(),
            browser: BrowserInfo::default(),
            os: OsInfo::default(),
            device: DeviceInfo::default(),
            engine: EngineInfo::default(),
            cpu: CpuInfo::default(),
            is_bot: false,
            is_bot_naive: false,
            matched_substring: None,
            all_matched_substrings: Vec::new(),
            pattern_string_match: None,
            bot_regex_pattern: matcher.source.clone(),
        };
    }
    debug!(len = ua.len(), "parse user agent");

    let tables = tables();
    let browser = first_match(&tables.browsers, ua)
        .map(|(name, version)| BrowserInfo {
            name: Some(name.to_string()),
            major: version
                .as_deref()
                .and_then(|v| v.split('.').next())
                .map(str::to_string),
            version,
        })
        .unwrap_or_default();
    let os = first_match(&tables.systems, ua)
        .map(|(name, version)| OsInfo {
            name: Some(name.to_string()),
            version,
        })
        .unwrap_or_default();
    let engine = first_match(&tables.engines, ua)
        .map(|(name, version)| EngineInfo {
            name: Some(name.to_string()),
            version,
        })
        .unwrap_or_default();
    let cpu = CpuInfo {
        architecture: tables
            .cpus
            .iter()
            .find(|(pattern, _)| pattern.is_match(ua))
            .map(|(_, arch)| arch.to_string()),
    };

    let all_matched_substrings: Vec<String> = matcher
        .entries
        .iter()
        .filter_map(|(_, regex)| regex.find(ua).map(|m| m.as_str().to_string()))
        .collect();
    let pattern_string_match = matcher
        .entries
        .iter()
        .find(|(_, regex)| regex.is_match(ua))
        .map(|(pattern, _)| pattern.to_string());

    UserAgentInfo {
        ua: ua.to_string(),
        browser,
        os,
        device: detect_device(ua),
        engine,
        cpu,
        is_bot: matcher.combined.is_match(ua),
        is_bot_naive: matcher.naive.is_match(ua),
        matched_substring: matcher.combined.find(ua).map(|m| m.as_str().to_string()),
        all_matched_substrings,
        pattern_string_match,
        bot_regex_pattern: matcher.source.clone(),
    }
}
