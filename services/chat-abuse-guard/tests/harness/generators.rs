// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Test data generators for attack simulation.

use chat_abuse_guard::Identity;

/// Generate a pool of chat user identities (numeric platform ids).
pub fn generate_identities(count: usize) -> Vec<Identity> {
    (0..count)
        .map(|i| Identity::from(100_000_i64 + i as i64))
        .collect()
}

/// Ordinary chat messages that must be accepted.
pub fn benign_messages() -> Vec<&'static str> {
    vec![
        "hello there",
        "Can you summarize this for me?",
        "50% off *today* only!",
        "Is 3 < 5 and 7 > 2?",
        "Tom & Jerry is on tonight",
        "select the best option from the list",
        "Union members will vote tomorrow",
        "The data: looks good to me",
        "I'll be there at 5 -- promise",
        "snake_case vs camelCase [again]",
        "My favourite crab is 🦀",
        "# Weekly notes",
    ]
}

/// Script injection payloads, including entity-obfuscated forms.
pub fn script_payloads() -> Vec<&'static str> {
    vec![
        "<script>alert(1)</script>",
        "<SCRIPT SRC=//evil.example/x.js></SCRIPT>",
        "< script >document.cookie</ script >",
        "[click me](javascript:alert(1))",
        "JaVaScRiPt:alert(document.domain)",
        "vbscript:msgbox(1)",
        "data:text/html;base64,PHNjcmlwdD4=",
        "<img src=x onerror=alert(1)>",
        "<body onload=steal()>",
        "<div onmouseover=\"x()\">hover</div>",
        "<svg/onload=alert(1)>",
        "&lt;script&gt;alert(1)&lt;/script&gt;",
        "&#60;script&#62;alert(1)",
    ]
}

/// Active or embedding markup.
pub fn html_payloads() -> Vec<&'static str> {
    vec![
        "<iframe src=\"https://evil.example\"></iframe>",
        "<object data=\"x.swf\"></object>",
        "<embed src=x.swf>",
        "<meta http-equiv=\"refresh\" content=\"0;url=https://evil.example\">",
        "<form action=https://evil.example/login></form>",
        "<style>body{display:none}</style>",
        "<p style=\"width: expression(alert(1))\">",
        "<base href=https://evil.example/>",
    ]
}

/// SQL-injection-suggestive token sequences.
pub fn sql_payloads() -> Vec<&'static str> {
    vec![
        "' OR 1=1 --",
        "admin'--",
        "1; DROP TABLE users",
        "x' UNION SELECT password FROM users",
        "'; DELETE FROM accounts; --",
        "\" or \"a\"=\"a",
        "SELECT * FROM users WHERE id = 1; --",
        "1 UNION ALL SELECT NULL,NULL",
    ]
}

/// Internal targets in literal, encoded and named forms.
pub fn internal_urls() -> Vec<&'static str> {
    vec![
        "http://127.0.0.1/admin",
        "http://127.1/",
        "http://2130706433/",
        "http://0x7f000001/",
        "http://0177.0.0.1/",
        "http://0.0.0.0:6379/",
        "http://10.0.0.1/",
        "http://172.16.5.4/",
        "http://192.168.1.1/router",
        "http://169.254.169.254/latest/meta-data/",
        "http://[::1]/",
        "http://[::ffff:127.0.0.1]/",
        "http://[fd00::1]/",
        "http://localhost:8080/",
        "http://LOCALHOST./",
        "http://api.localhost/",
        "http://metadata.google.internal/computeMetadata/v1/",
        "http://rebind.attacker.example/",
        "http://intranet.attacker.example/",
        "http://metadata.attacker.example/",
        "http://split.attacker.example/",
    ]
}

/// URLs that fail before any network check.
pub fn malformed_urls() -> Vec<&'static str> {
    vec!["", "   ", "not-a-url", "://missing-scheme.com/", "https://", "http:// /"]
}

/// URLs with schemes outside the allow-list.
pub fn bad_scheme_urls() -> Vec<&'static str> {
    vec![
        "ftp://files.example.com/",
        "file:///etc/passwd",
        "javascript:alert(1)",
        "data:text/html,<script>",
        "gopher://127.0.0.1:25/",
    ]
}

/// Public URLs the static resolver knows.
pub fn public_urls() -> Vec<&'static str> {
    vec![
        "https://news.example.com/story?id=42",
        "http://blog.example.org/post/1",
        "https://docs.example.net/guide",
    ]
}

/// Runs of one markdown marker, far past any sane formatting.
pub fn formatting_floods(len: usize) -> Vec<String> {
    ['*', '_', '`', '~', '#']
        .iter()
        .map(|c| format!("look {} here", c.to_string().repeat(len)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_identities() {
        let ids = generate_identities(256);
        assert_eq!(ids.len(), 256);
        let unique: std::collections::HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), 256);
        assert_eq!(ids[0].as_str(), "100000");
    }

    #[test]
    fn test_formatting_floods() {
        let floods = formatting_floods(50);
        assert_eq!(floods.len(), 5);
        assert!(floods.iter().all(|f| f.len() > 50));
    }
}
