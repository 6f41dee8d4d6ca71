//! Offline/sync banner shown above the app.
//!
//! The banner only describes state; it never starts a drain.

use super::style;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncBanner {
    online: bool,
    pending: usize,
}

impl SyncBanner {
    pub fn from_state(online: bool, queue_length: usize) -> Self {
        Self {
            online,
            pending: queue_length,
        }
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Online with nothing pending: nothing to show.
    pub fn is_visible(&self) -> bool {
        !self.online || self.pending > 0
    }

    pub fn headline(&self) -> &'static str {
        if self.online {
            "Back online, syncing your changes"
        } else {
            "You are offline. Changes will be sent when the connection returns"
        }
    }

    /// `None` when the count is zero.
    pub fn pending_label(&self) -> Option<String> {
        match self.pending {
            0 => None,
            1 => Some("1 change pending".to_string()),
            n => Some(format!("{n} changes pending")),
        }
    }

    /// Plain text, one line; `None` when hidden.
    pub fn render_text(&self) -> Option<String> {
        if !self.is_visible() {
            return None;
        }
        Some(match self.pending_label() {
            Some(label) => format!("{} ({label})", self.headline()),
            None => self.headline().to_string(),
        })
    }

    /// Terminal rendering with colors.
    pub fn render_styled(&self) -> Option<String> {
        let text = self.render_text()?;
        Some(if self.online {
            style::value(text)
        } else {
            style::pending(text)
        })
    }

    /// HTML fragment announced by screen readers as soon as it changes.
    pub fn render_html(&self) -> Option<String> {
        if !self.is_visible() {
            return None;
        }
        let modifier = if self.online { "syncing" } else { "offline" };
        let mut html = format!(
            r#"<div class="sync-banner sync-banner--{modifier}" role="alert" aria-live="assertive"><span class="sync-banner__status">{}</span>"#,
            self.headline()
        );
        if let Some(label) = self.pending_label() {
            html.push_str(&format!(
                r#"<span class="sync-banner__pending" data-count="{}">{label}</span>"#,
                self.pending
            ));
        }
        html.push_str("</div>");
        Some(html)
    }
}
