//! Spreadsheet sync through a webhook (e.g. a Google Apps Script).

use async_trait::async_trait;
use serde::Serialize;

use super::{NotificationChannel, NotifyError, ensure_success};
use crate::domain::Admission;

/// Appends one row per admission by posting it to a webhook.
#[derive(Debug, Clone)]
pub struct SheetsSyncChannel {
    client: reqwest::Client,
    url: String,
}

/// The row posted to the webhook: the profile plus the assigned pool name.
#[derive(Debug, Serialize)]
pub struct SheetRow<'a> {
    full_name: &'a str,
    email: &'a str,
    whatsapp_number: &'a str,
    gender: &'a str,
    country: &'a str,
    state: &'a str,
    age_group: &'a str,
    religion: &'a str,
    church_name: &'a str,
    instagram_handle: &'a str,
    relationship_status: &'a str,
    clan_name: &'a str,
}

impl<'a> From<&'a Admission> for SheetRow<'a> {
    fn from(admission: &'a Admission) -> Self {
        let p = &admission.profile;
        Self {
            full_name: &p.full_name,
            email: &p.email,
            whatsapp_number: &p.whatsapp_number,
            gender: &p.gender,
            country: &p.country,
            state: &p.state,
            age_group: &p.age_group,
            religion: &p.religion,
            church_name: p.church_name.as_deref().unwrap_or_default(),
            instagram_handle: &p.instagram_handle,
            relationship_status: &p.relationship_status,
            clan_name: &admission.pool_name,
        }
    }
}

impl SheetsSyncChannel {
    /// Creates a channel posting to `url`.
    #[must_use]
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl NotificationChannel for SheetsSyncChannel {
    fn name(&self) -> &'static str {
        "sheets"
    }

    async fn deliver(&self, admission: &Admission) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(&SheetRow::from(admission))
            .send()
            .await?;
        ensure_success(response).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::participant::fixtures::profile;
    use crate::domain::{ParticipantId, PoolId};

    #[test]
    fn row_flattens_profile_and_adds_clan() {
        let mut p = profile(7);
        p.church_name = None;
        let admission = Admission {
            participant_id: ParticipantId::new(),
            pool_id: PoolId::new(2),
            pool_name: "Clan 2".to_string(),
            contact_link: "https://chat.example/2".to_string(),
            profile: p,
            admitted_at: Utc::now(),
        };

        let value = serde_json::to_value(SheetRow::from(&admission)).unwrap_or_default();
        assert_eq!(value["clan_name"], "Clan 2");
        assert_eq!(value["email"], "participant7@example.com");
        assert_eq!(value["church_name"], "");
        assert!(value.get("contact_link").is_none());
    }
}
