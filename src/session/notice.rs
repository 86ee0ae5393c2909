use std::time::Duration;

use reqwest::Url;

/// How long a notice stays visible before it dismisses itself
pub const NOTICE_DISPLAY_TIME: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoticeKind {
    Error,
    Success,
    /// The server asked the client to move on to another page
    Navigate(Url),
}

/// A transient, user-facing message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
    pub display_for: Duration,
}

impl Notice {
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            text: text.into(),
            display_for: NOTICE_DISPLAY_TIME,
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            text: text.into(),
            display_for: NOTICE_DISPLAY_TIME,
        }
    }

    pub fn navigate(url: Url) -> Self {
        Self {
            text: format!("Redirecting to {}", url),
            kind: NoticeKind::Navigate(url),
            display_for: NOTICE_DISPLAY_TIME,
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == NoticeKind::Error
    }
}
