// SPDX-FileCopyrightText: 2026 FlowBell Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The filter gate deciding whether a captured notification is queued.
//!
//! Evaluation is pure: the same notification and preference snapshot always
//! yield the same verdict, regardless of the order of keywords or categories.

use std::fmt;

use flowbell_core::types::{AppPreference, CapturedNotification, UserPreferences};

/// Outcome of running a notification through the filter gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterVerdict {
    Accept,
    /// The global forwarding switch is off.
    ForwardingDisabled,
    /// Forwarding is off for the source app.
    AppDisabled,
    /// Title or text matched a global filter keyword.
    GlobalKeyword(String),
    /// The notification category is excluded.
    ExcludedCategory(String),
    /// Title or text matched one of the app's filter words.
    AppFilterWord(String),
}

impl FilterVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, FilterVerdict::Accept)
    }
}

impl fmt::Display for FilterVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterVerdict::Accept => write!(f, "accepted"),
            FilterVerdict::ForwardingDisabled => write!(f, "forwarding disabled"),
            FilterVerdict::AppDisabled => write!(f, "forwarding disabled for app"),
            FilterVerdict::GlobalKeyword(word) => write!(f, "matched filter keyword `{word}`"),
            FilterVerdict::ExcludedCategory(cat) => write!(f, "category `{cat}` is excluded"),
            FilterVerdict::AppFilterWord(word) => write!(f, "matched app filter word `{word}`"),
        }
    }
}

/// Run the gate. A missing app preference means forwarding is enabled with
/// no filter words.
pub fn evaluate(
    notification: &CapturedNotification,
    app: Option<&AppPreference>,
    user: &UserPreferences,
) -> FilterVerdict {
    if !user.forwarding_enabled {
        return FilterVerdict::ForwardingDisabled;
    }
    if app.is_some_and(|a| !a.forwarding_enabled) {
        return FilterVerdict::AppDisabled;
    }

    let haystacks = [
        notification.title.to_lowercase(),
        notification.text.to_lowercase(),
    ];

    if user.notification_filter_enabled {
        if let Some(word) = first_match(&user.filter_keywords, &haystacks) {
            return FilterVerdict::GlobalKeyword(word);
        }
        if let Some(category) = notification.category.as_deref() {
            let excluded = user
                .excluded_categories
                .iter()
                .any(|c| !c.trim().is_empty() && c.trim().eq_ignore_ascii_case(category.trim()));
            if excluded {
                return FilterVerdict::ExcludedCategory(category.to_string());
            }
        }
    }

    if let Some(app) = app {
        if let Some(word) = first_match(&app.filter_words, &haystacks) {
            return FilterVerdict::AppFilterWord(word);
        }
    }

    FilterVerdict::Accept
}

/// Convenience wrapper over [`evaluate`].
pub fn accept(
    notification: &CapturedNotification,
    app: Option<&AppPreference>,
    user: &UserPreferences,
) -> bool {
    evaluate(notification, app, user).is_accepted()
}

/// Smallest matching word (lexicographically), so the reported reason does
/// not depend on list order. Blank words never match.
fn first_match(words: &[String], haystacks: &[String]) -> Option<String> {
    words
        .iter()
        .map(|w| w.trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .filter(|w| haystacks.iter().any(|h| h.contains(w.as_str())))
        .min()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn notification(title: &str, text: &str) -> CapturedNotification {
        CapturedNotification {
            package_name: "com.chat".to_string(),
            app_name: "Chat".to_string(),
            app_version: None,
            title: title.to_string(),
            text: text.to_string(),
            sub_text: None,
            category: Some("msg".to_string()),
            timestamp: 0,
            icon_uri: None,
            large_icon_uri: None,
            priority: Default::default(),
            is_ongoing: false,
            is_clearable: true,
        }
    }

    fn filtering(keywords: &[&str]) -> UserPreferences {
        UserPreferences {
            notification_filter_enabled: true,
            filter_keywords: keywords.iter().map(|s| s.to_string()).collect(),
            ..UserPreferences::default()
        }
    }

    #[test]
    fn missing_app_preference_accepts() {
        let n = notification("Hello", "World");
        assert_eq!(evaluate(&n, None, &UserPreferences::default()), FilterVerdict::Accept);
    }

    #[test]
    fn global_switch_off_rejects_everything() {
        let user = UserPreferences {
            forwarding_enabled: false,
            ..UserPreferences::default()
        };
        assert_eq!(
            evaluate(&notification("a", "b"), None, &user),
            FilterVerdict::ForwardingDisabled
        );
    }

    #[test]
    fn disabled_app_is_rejected() {
        let mut app = AppPreference::enabled("com.chat", "Chat");
        app.forwarding_enabled = false;
        assert!(!accept(&notification("a", "b"), Some(&app), &UserPreferences::default()));
    }

    #[test]
    fn global_keyword_matches_case_insensitively() {
        let verdict = evaluate(
            &notification("Your OTP code", "is 1234"),
            None,
            &filtering(&["otp"]),
        );
        assert_eq!(verdict, FilterVerdict::GlobalKeyword("otp".to_string()));

        let in_text = evaluate(&notification("Bank", "SALE today"), None, &filtering(&["sale"]));
        assert!(!in_text.is_accepted());
    }

    #[test]
    fn keywords_ignored_when_filter_disabled() {
        let mut user = filtering(&["otp"]);
        user.notification_filter_enabled = false;
        user.excluded_categories = vec!["msg".to_string()];
        assert!(accept(&notification("OTP", ""), None, &user));
    }

    #[test]
    fn excluded_category_rejects() {
        let mut user = filtering(&[]);
        user.excluded_categories = vec!["MSG".to_string()];
        assert_eq!(
            evaluate(&notification("hi", ""), None, &user),
            FilterVerdict::ExcludedCategory("msg".to_string())
        );
    }

    #[test]
    fn app_filter_words_apply_without_global_filter() {
        let mut app = AppPreference::enabled("com.chat", "Chat");
        app.filter_words = vec!["Promo".to_string()];
        let verdict = evaluate(
            &notification("Weekly promo", ""),
            Some(&app),
            &UserPreferences::default(),
        );
        assert_eq!(verdict, FilterVerdict::AppFilterWord("promo".to_string()));
    }

    #[test]
    fn blank_words_never_match() {
        let mut app = AppPreference::enabled("com.chat", "Chat");
        app.filter_words = vec!["".to_string(), "   ".to_string()];
        assert!(accept(&notification("x", "y"), Some(&app), &filtering(&[" "])));
    }

    #[test]
    fn verdict_display_names_reason() {
        assert_eq!(
            FilterVerdict::GlobalKeyword("otp".into()).to_string(),
            "matched filter keyword `otp`"
        );
    }

    proptest! {
        #[test]
        fn verdict_is_order_independent(
            keywords in prop::collection::vec("[a-c]{1,2}", 0..6),
            words in prop::collection::vec("[a-c]{1,2}", 0..6),
            title in "[a-d ]{0,12}",
            text in "[a-d ]{0,12}",
        ) {
            let n = notification(&title, &text);
            let user = UserPreferences {
                notification_filter_enabled: true,
                filter_keywords: keywords.clone(),
                ..UserPreferences::default()
            };
            let mut app = AppPreference::enabled("com.chat", "Chat");
            app.filter_words = words.clone();

            let forward = evaluate(&n, Some(&app), &user);

            let mut rev_user = user.clone();
            rev_user.filter_keywords.reverse();
            let mut rev_app = app.clone();
            rev_app.filter_words.reverse();
            let reversed = evaluate(&n, Some(&rev_app), &rev_user);

            prop_assert_eq!(forward, reversed);
        }
    }
}
