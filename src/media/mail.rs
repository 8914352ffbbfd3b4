/// Feedback mail drafts, handed to the system mail composer as a
/// `mailto:` URI through a [`Launcher`](super::Launcher).

use super::{Launcher, SourceError};

pub const FEEDBACK_ADDRESS: &str = "feedback@cloday.app";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailDraft {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

impl MailDraft {
    /// Prefilled feedback mail, tagged with the app version.
    pub fn feedback() -> Self {
        Self {
            recipient: FEEDBACK_ADDRESS.to_string(),
            subject: "Cloday feedback".to_string(),
            body: format!("\n\n---\nCloday {}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn to_mailto_uri(&self) -> String {
        format!(
            "mailto:{}?subject={}&body={}",
            self.recipient,
            urlencoding::encode(&self.subject),
            urlencoding::encode(&self.body),
        )
    }

    pub fn send_with(&self, launcher: &dyn Launcher) -> Result<(), SourceError> {
        launcher.open_uri(&self.to_mailto_uri())
    }
}
