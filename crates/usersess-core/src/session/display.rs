//! Human readable session labels derived from the User-Agent header.

/// Upper bound for generated labels, matching the legacy column width.
pub const MAX_DISPLAY_NAME_LEN: usize = 150;

/// Produces the label shown to users next to each of their sessions.
pub trait DisplayNamer: Send + Sync {
    fn display_name(&self, user_agent: &str) -> String;
}

/// Default namer: `"<browser> on <os> (<brand> <device>)"`.
///
/// Detection is a small set of substring checks ordered so that the more
/// specific tokens win (Edge and Opera both advertise `Chrome/`, Android
/// advertises `Linux`).
#[derive(Debug, Clone, Copy, Default)]
pub struct UserAgentSummary;

impl UserAgentSummary {
    pub fn browser(user_agent: &str) -> &'static str {
        let ua = user_agent;
        if ua.contains("Edg/") || ua.contains("Edge/") {
            "Edge"
        } else if ua.contains("OPR/") || ua.contains("Opera") {
            "Opera"
        } else if ua.contains("SamsungBrowser/") {
            "Samsung Internet"
        } else if ua.contains("Firefox/") || ua.contains("FxiOS/") {
            "Firefox"
        } else if ua.contains("Chrome/") || ua.contains("CriOS/") || ua.contains("Chromium/") {
            "Chrome"
        } else if ua.contains("Safari/") {
            "Safari"
        } else if ua.starts_with("curl/") {
            "curl"
        } else {
            "Unknown browser"
        }
    }

    pub fn os(user_agent: &str) -> &'static str {
        let ua = user_agent;
        if ua.contains("Windows") {
            "Windows"
        } else if ua.contains("Android") {
            "Android"
        } else if ua.contains("iPhone") || ua.contains("iPad") || ua.contains("iPod") {
            "iOS"
        } else if ua.contains("Mac OS X") || ua.contains("Macintosh") {
            "macOS"
        } else if ua.contains("CrOS") {
            "Chrome OS"
        } else if ua.contains("Linux") {
            "Linux"
        } else {
            "Unknown OS"
        }
    }

    pub fn brand(user_agent: &str) -> &'static str {
        let ua = user_agent;
        if ua.contains("iPhone") || ua.contains("iPad") || ua.contains("Macintosh") {
            "Apple"
        } else if ua.contains("SM-") || ua.contains("Samsung") {
            "Samsung"
        } else if ua.contains("Pixel") {
            "Google"
        } else if ua.contains("Huawei") || ua.contains("HUAWEI") {
            "Huawei"
        } else {
            "Generic"
        }
    }

    pub fn device_type(user_agent: &str) -> &'static str {
        let lower = user_agent.to_ascii_lowercase();
        if ["bot", "crawler", "spider"].iter().any(|t| lower.contains(t)) {
            "bot"
        } else if lower.contains("ipad") || lower.contains("tablet") {
            "tablet"
        } else if lower.contains("mobile") || lower.contains("iphone") {
            "smartphone"
        } else {
            "desktop"
        }
    }
}

impl DisplayNamer for UserAgentSummary {
    fn display_name(&self, user_agent: &str) -> String {
        let mut name = format!(
            "{} on {} ({} {})",
            Self::browser(user_agent),
            Self::os(user_agent),
            Self::brand(user_agent),
            Self::device_type(user_agent)
        );
        name.truncate(MAX_DISPLAY_NAME_LEN);
        name
    }
}

impl<F> DisplayNamer for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn display_name(&self, user_agent: &str) -> String {
        self(user_agent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIREFOX_LINUX: &str =
        "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";
    const SAFARI_IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_5 like Mac OS X) \
        AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Mobile/15E148 Safari/604.1";
    const EDGE_WINDOWS: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
        (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36 Edg/126.0.0.0";
    const CHROME_PIXEL: &str = "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 \
        (KHTML, like Gecko) Chrome/126.0.0.0 Mobile Safari/537.36";

    #[test]
    fn test_known_agents() {
        let namer = UserAgentSummary;
        assert_eq!(namer.display_name(FIREFOX_LINUX), "Firefox on Linux (Generic desktop)");
        assert_eq!(namer.display_name(SAFARI_IPHONE), "Safari on iOS (Apple smartphone)");
        assert_eq!(namer.display_name(EDGE_WINDOWS), "Edge on Windows (Generic desktop)");
        assert_eq!(namer.display_name(CHROME_PIXEL), "Chrome on Android (Google smartphone)");
    }

    #[test]
    fn test_unknown_agent() {
        assert_eq!(
            UserAgentSummary.display_name(""),
            "Unknown browser on Unknown OS (Generic desktop)"
        );
        assert_eq!(UserAgentSummary::device_type("Googlebot/2.1"), "bot");
    }

    #[test]
    fn test_closure_namer() {
        let namer = |ua: &str| format!("custom:{}", ua.len());
        assert_eq!(namer.display_name("abc"), "custom:3");
    }
}
