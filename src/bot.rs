//! Bot Framework adapter.
//!
//! Turns inbound Teams activities into queries and builds the reply
//! activity. Delivery back to Teams goes through [`BotConnector`] when bot
//! credentials are configured; the HTTP handler also returns the reply in
//! its response body.
//!
//! Inbound requests are not authenticated here. Deploy behind the Bot
//! Framework channel or a gateway that validates its JWTs.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use crate::card::{answer_card, attachment, WELCOME_TEXT};
use crate::config::BotConfig;
use crate::models::Query;
use crate::oauth::ClientCredentials;
use crate::processor::QueryProcessor;
use crate::text::strip_mentions;

pub const EMPTY_QUESTION_TEXT: &str =
    "Please type a question, for example: *How do I deploy the API gateway?*";

pub const ERROR_TEXT: &str =
    "Sorry, I encountered an error processing your request. Please try again.";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelAccount {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationAccount {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// The subset of a Bot Framework activity NAVO reads and writes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type")]
    pub activity_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<ChannelAccount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<ChannelAccount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation: Option<ConversationAccount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_format: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub members_added: Vec<ChannelAccount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Value>,
    /// Payload of an `Action.Submit` button.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl Activity {
    /// A `message` activity addressed back to the sender of `incoming`.
    pub fn reply_to(incoming: &Activity) -> Self {
        Self {
            activity_type: "message".to_string(),
            service_url: incoming.service_url.clone(),
            channel_id: incoming.channel_id.clone(),
            from: incoming.recipient.clone(),
            recipient: incoming.from.clone(),
            conversation: incoming.conversation.clone(),
            reply_to_id: incoming.id.clone(),
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self.text_format = Some("markdown".to_string());
        self
    }

    pub fn with_attachment(mut self, attachment: Value) -> Self {
        self.attachments.push(attachment);
        self
    }

    fn sender_id(&self) -> &str {
        self.from
            .as_ref()
            .map(|f| f.id.as_str())
            .filter(|id| !id.is_empty())
            .unwrap_or("anonymous")
    }
}

/// Handle one inbound activity and return the reply, if any.
pub async fn handle_activity(processor: &QueryProcessor, activity: &Activity) -> Option<Activity> {
    match activity.activity_type.as_str() {
        "message" => {
            if let Some(value) = activity.value.as_ref().filter(|v| v.get("action").is_some()) {
                return handle_card_action(activity, value);
            }
            Some(handle_message(processor, activity).await)
        }
        "conversationUpdate" => handle_members_added(activity),
        other => {
            debug!(activity_type = other, "ignoring activity");
            None
        }
    }
}

async fn handle_message(processor: &QueryProcessor, activity: &Activity) -> Activity {
    let text = strip_mentions(activity.text.as_deref().unwrap_or_default());
    if text.is_empty() {
        return Activity::reply_to(activity).with_text(EMPTY_QUESTION_TEXT);
    }

    let user_id = activity.sender_id();
    info!(user = %user_id, query = %text, "processing message");

    let query = Query::new(text.as_str(), user_id);
    let answer = processor.process(&query).await;
    Activity::reply_to(activity).with_attachment(attachment(answer_card(&text, &answer)))
}

fn handle_card_action(activity: &Activity, value: &Value) -> Option<Activity> {
    let action = value["action"].as_str().unwrap_or_default();
    let query = value["query"].as_str().unwrap_or_default();
    let reply = Activity::reply_to(activity);

    match action {
        "feedback" => {
            let positive = value["type"].as_str() == Some("positive");
            info!(
                user = %activity.sender_id(),
                query = %query,
                helpful = positive,
                "answer feedback"
            );
            let text = if positive {
                "Thanks for the feedback! Glad that helped."
            } else {
                "Thanks for the feedback. I'll use it to get better."
            };
            Some(reply.with_text(text))
        }
        "follow_up" => Some(reply.with_text(format!(
            "Sure. What else would you like to know about *{}*?",
            query
        ))),
        "copy" => {
            let answer = value["answer"].as_str().unwrap_or_default();
            Some(reply.with_text(answer))
        }
        other => {
            debug!(action = other, "unknown card action");
            None
        }
    }
}

fn handle_members_added(activity: &Activity) -> Option<Activity> {
    let bot_id = activity.recipient.as_ref().map(|r| r.id.as_str());
    let newcomer = activity
        .members_added
        .iter()
        .any(|m| Some(m.id.as_str()) != bot_id);
    newcomer.then(|| Activity::reply_to(activity).with_text(WELCOME_TEXT))
}

/// Posts replies to the Bot Framework connector service.
pub struct BotConnector {
    client: reqwest::Client,
    credentials: ClientCredentials,
}

impl BotConnector {
    /// `None` unless both the app id and password are configured.
    pub fn from_config(config: &BotConfig) -> Result<Option<Self>> {
        let (Some(app_id), Some(password)) = (&config.app_id, &config.app_password) else {
            return Ok(None);
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("Failed to create HTTP client")?;
        let credentials = ClientCredentials::new(
            client.clone(),
            config.token_url.as_str(),
            app_id.as_str(),
            password.as_str(),
            "https://api.botframework.com/.default",
        );
        Ok(Some(Self {
            client,
            credentials,
        }))
    }

    /// Send `reply` into its conversation.
    pub async fn send_reply(&self, reply: &Activity) -> Result<()> {
        let url = reply_url(reply)?;
        let token = self.credentials.access_token().await?;
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(reply)
            .send()
            .await
            .context("Failed to post reply")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("connector returned {}: {}", status, body));
        }
        Ok(())
    }
}

/// `{serviceUrl}/v3/conversations/{id}/activities[/{replyToId}]`
pub fn reply_url(reply: &Activity) -> Result<reqwest::Url> {
    let service_url = reply
        .service_url
        .as_deref()
        .ok_or_else(|| anyhow!("activity has no serviceUrl"))?;
    let conversation = reply
        .conversation
        .as_ref()
        .map(|c| c.id.as_str())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| anyhow!("activity has no conversation id"))?;

    let mut url = reqwest::Url::parse(service_url)
        .with_context(|| format!("invalid serviceUrl: {}", service_url))?;
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| anyhow!("serviceUrl cannot be a base: {}", service_url))?;
        segments
            .pop_if_empty()
            .extend(["v3", "conversations", conversation, "activities"]);
        if let Some(id) = reply.reply_to_id.as_deref() {
            segments.push(id);
        }
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn incoming(text: &str) -> Activity {
        serde_json::from_value(json!({
            "type": "message",
            "id": "act-1",
            "serviceUrl": "https://smba.trafficmanager.net/amer/",
            "channelId": "msteams",
            "from": {"id": "user-1", "name": "Sam"},
            "recipient": {"id": "bot-1", "name": "NAVO"},
            "conversation": {"id": "conv-1"},
            "text": text
        }))
        .unwrap()
    }

    #[test]
    fn reply_swaps_sender_and_recipient() {
        let reply = Activity::reply_to(&incoming("hi"));
        assert_eq!(reply.activity_type, "message");
        assert_eq!(reply.from.unwrap().id, "bot-1");
        assert_eq!(reply.recipient.unwrap().id, "user-1");
        assert_eq!(reply.reply_to_id.as_deref(), Some("act-1"));
    }

    #[test]
    fn serializes_camel_case() {
        let value = serde_json::to_value(Activity::reply_to(&incoming("hi")).with_text("x")).unwrap();
        assert_eq!(value["type"], "message");
        assert_eq!(value["replyToId"], "act-1");
        assert_eq!(value["serviceUrl"], "https://smba.trafficmanager.net/amer/");
        assert!(value.get("attachments").is_none());
    }

    #[test]
    fn reply_url_targets_conversation() {
        let reply = Activity::reply_to(&incoming("hi"));
        assert_eq!(
            reply_url(&reply).unwrap().as_str(),
            "https://smba.trafficmanager.net/amer/v3/conversations/conv-1/activities/act-1"
        );
    }

    #[test]
    fn welcome_only_for_other_members() {
        let mut update = incoming("");
        update.activity_type = "conversationUpdate".to_string();
        update.members_added = vec![ChannelAccount {
            id: "bot-1".to_string(),
            name: None,
        }];
        assert!(handle_members_added(&update).is_none());

        update.members_added.push(ChannelAccount {
            id: "user-2".to_string(),
            name: None,
        });
        let reply = handle_members_added(&update).unwrap();
        assert_eq!(reply.text.as_deref(), Some(WELCOME_TEXT));
    }

    #[test]
    fn feedback_action_gets_thanks() {
        let activity = incoming("");
        let value = json!({"action": "feedback", "type": "positive", "query": "deploy"});
        let reply = handle_card_action(&activity, &value).unwrap();
        assert!(reply.text.unwrap().starts_with("Thanks"));
        assert!(handle_card_action(&activity, &json!({"action": "dance"})).is_none());
    }

    #[test]
    fn bot_connector_needs_both_credentials() {
        let config = BotConfig {
            app_id: Some("id".into()),
            ..Default::default()
        };
        assert!(BotConnector::from_config(&config).unwrap().is_none());
    }
}
