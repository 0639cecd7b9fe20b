//! Crawler and link-preview user-agent detection

use once_cell::sync::Lazy;
use regex::Regex;

/// Search engines, social/link-preview fetchers and generic HTTP clients
const BOT_SIGNATURES: &[&str] = &[
    r"bot\b",
    r"bot/",
    "crawler",
    "spider",
    "slurp",
    "facebookexternalhit",
    "facebookcatalog",
    "meta-externalagent",
    "twitterbot",
    "linkedinbot",
    "slackbot",
    "slack-imgproxy",
    "discordbot",
    "telegrambot",
    "whatsapp",
    "skypeuripreview",
    "pinterest",
    "redditbot",
    "applebot",
    "bingpreview",
    "embedly",
    "vkshare",
    "quora link preview",
    "outbrain",
    "tumblr",
    "mastodon",
    "iframely",
    "google-inspectiontool",
    "googleother",
    "headlesschrome",
    "lighthouse",
    "curl/",
    "wget/",
    "python-requests",
    "go-http-client",
];

static BOT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!("(?i){}", BOT_SIGNATURES.join("|")))
        .expect("bot signatures form a valid regex")
});

/// Whether `user_agent` belongs to a crawler; no user agent means a human
pub fn is_bot(user_agent: Option<&str>) -> bool {
    user_agent
        .map(str::trim)
        .filter(|ua| !ua.is_empty())
        .is_some_and(|ua| BOT_PATTERN.is_match(ua))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_signatures_compile() {
        assert!(Regex::new(&format!("(?i){}", BOT_SIGNATURES.join("|"))).is_ok());
        assert!(BOT_PATTERN.is_match("Googlebot/2.1"));
    }

    #[test]
    fn test_known_crawlers() {
        for ua in [
            "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)",
            "facebookexternalhit/1.1 (+http://www.facebook.com/externalhit_uatext.php)",
            "Twitterbot/1.0",
            "Slackbot-LinkExpanding 1.0 (+https://api.slack.com/robots)",
            "Mozilla/5.0 (compatible; Discordbot/2.0; +https://discordapp.com)",
            "TelegramBot (like TwitterBot)",
            "WhatsApp/2.23.20.0",
            "LinkedInBot/1.0 (compatible; Mozilla/5.0)",
            "curl/8.4.0",
            "Mozilla/5.0 (compatible; bingbot/2.0; +http://www.bing.com/bingbot.htm)",
        ] {
            assert!(is_bot(Some(ua)), "expected bot: {}", ua);
        }
    }

    #[test]
    fn test_browsers_are_human() {
        for ua in [
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
            "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1",
            "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0",
        ] {
            assert!(!is_bot(Some(ua)), "expected human: {}", ua);
        }
        assert!(!is_bot(None));
        assert!(!is_bot(Some("   ")));
    }

    proptest! {
        #[test]
        fn detection_ignores_case(prefix in "[a-z ]{0,10}", upper in any::<bool>()) {
            let ua = format!("{}Twitterbot/1.0", prefix);
            let ua = if upper { ua.to_uppercase() } else { ua.to_lowercase() };
            prop_assert!(is_bot(Some(&ua)));
        }
    }
}
