use serde::{Deserialize, Serialize};

pub const COLOR_SUCCESS: &str = "#41aa58";
pub const COLOR_FAILURE: &str = "#d10c20";

/// Mattermost post as accepted by `POST /api/v4/posts`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Post {
    pub channel_id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub props: PostProps,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PostProps {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_icon_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_webhook: Option<String>,
}

/// Slack-compatible message attachment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Attachment {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub fallback: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub color: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<AttachmentField>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumb_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttachmentField {
    pub title: String,
    pub value: String,
    pub short: bool,
}

impl AttachmentField {
    pub fn new(title: &str, value: impl Into<String>, short: bool) -> Self {
        Self {
            title: title.to_string(),
            value: value.into(),
            short,
        }
    }
}

impl Post {
    /// Same content addressed to another channel
    pub fn for_channel(&self, channel_id: &str) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            ..self.clone()
        }
    }
}
