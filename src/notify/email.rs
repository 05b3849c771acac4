//! Confirmation email through the Resend HTTP API.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

use super::{NotificationChannel, NotifyError, ensure_success};
use crate::domain::Admission;

/// Sends the participant a confirmation naming their cohort and its
/// group link.
#[derive(Clone)]
pub struct ResendEmailChannel {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    from: String,
    subject: String,
}

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: String,
}

impl ResendEmailChannel {
    /// Creates a channel posting to `{api_url}/emails`.
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        api_url: &str,
        api_key: impl Into<String>,
        from: impl Into<String>,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint: format!("{}/emails", api_url.trim_end_matches('/')),
            api_key: api_key.into(),
            from: from.into(),
            subject: subject.into(),
        }
    }
}

impl fmt::Debug for ResendEmailChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResendEmailChannel")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("from", &self.from)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl NotificationChannel for ResendEmailChannel {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn deliver(&self, admission: &Admission) -> Result<(), NotifyError> {
        let request = SendEmailRequest {
            from: &self.from,
            to: [admission.profile.email.as_str()],
            subject: &self.subject,
            html: render_confirmation(admission),
        };
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        ensure_success(response).await
    }
}

/// Renders the confirmation body. Every interpolated value is escaped.
#[must_use]
pub fn render_confirmation(admission: &Admission) -> String {
    let name = escape_html(&admission.profile.full_name);
    let pool = escape_html(&admission.pool_name);
    let link = escape_html(&admission.contact_link);
    format!(
        concat!(
            "<div style=\"font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;\">",
            "<h1>You're in!</h1>",
            "<p>Dear <strong>{name}</strong>,</p>",
            "<p>Your registration is confirmed.</p>",
            "<p>You have been assigned to <strong>{pool}</strong>. ",
            "This is your community for the duration of the cohort.</p>",
            "<p><a href=\"{link}\">Join your group chat</a></p>",
            "</div>"
        ),
        name = name,
        pool = pool,
        link = link,
    )
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::participant::fixtures::profile;
    use crate::domain::{ParticipantId, PoolId};

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn confirmation_names_pool_and_link() {
        let mut p = profile(1);
        p.full_name = "Ada <script>".to_string();
        let admission = Admission {
            participant_id: ParticipantId::new(),
            pool_id: PoolId::new(3),
            pool_name: "Clan Judah".to_string(),
            contact_link: "https://chat.example/join?a=1&b=2".to_string(),
            profile: p,
            admitted_at: Utc::now(),
        };

        let html = render_confirmation(&admission);
        assert!(html.contains("Ada &lt;script&gt;"));
        assert!(html.contains("Clan Judah"));
        assert!(html.contains("https://chat.example/join?a=1&amp;b=2"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn debug_hides_api_key() {
        let channel = ResendEmailChannel::new(
            reqwest::Client::new(),
            "https://api.resend.com/",
            "re_secret",
            "from@example.com",
            "subject",
        );
        let debug = format!("{channel:?}");
        assert!(!debug.contains("re_secret"));
        assert!(debug.contains("https://api.resend.com/emails"));
    }
}
