//! Microsoft Graph delivery.
//!
//! Each send exchanges the client credentials for a short-lived bearer token,
//! then posts a `sendMail` request with attachments base64-encoded inline.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{DeliveryError, NotificationMessage, NotificationSender};
use crate::config::{GraphConfig, GRAPH_DEFAULT_SCOPE};
use crate::util::{truncate_chars, LOG_BODY_LIMIT};

/// Delivers notifications through the Graph `sendMail` endpoint.
pub struct GraphSender {
    client: Client,
    config: GraphConfig,
    from_address: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMailRequest {
    pub message: GraphMessage,
    pub save_to_sent_items: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphMessage {
    pub subject: String,
    pub body: GraphBody,
    pub to_recipients: Vec<GraphRecipient>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<GraphAttachment>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphBody {
    pub content_type: &'static str,
    pub content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphRecipient {
    pub email_address: GraphAddress,
}

#[derive(Debug, Serialize)]
pub struct GraphAddress {
    pub address: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphAttachment {
    #[serde(rename = "@odata.type")]
    pub odata_type: &'static str,
    pub name: String,
    pub content_type: String,
    pub content_bytes: String,
}

impl SendMailRequest {
    pub fn from_message(message: &NotificationMessage, recipients: &[String]) -> Self {
        SendMailRequest {
            message: GraphMessage {
                subject: message.subject.clone(),
                body: GraphBody {
                    content_type: "Text",
                    content: message.body.clone(),
                },
                to_recipients: recipients
                    .iter()
                    .map(|address| GraphRecipient {
                        email_address: GraphAddress {
                            address: address.clone(),
                        },
                    })
                    .collect(),
                attachments: message
                    .attachments
                    .iter()
                    .map(|a| GraphAttachment {
                        odata_type: "#microsoft.graph.fileAttachment",
                        name: a.file_name.clone(),
                        content_type: a.content_type.clone(),
                        content_bytes: STANDARD.encode(&a.content),
                    })
                    .collect(),
            },
            save_to_sent_items: false,
        }
    }
}

impl GraphSender {
    pub fn new(
        client: Client,
        config: GraphConfig,
        from_address: String,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            config,
            from_address,
            timeout,
        }
    }

    fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.config.authority_url.trim_end_matches('/'),
            self.config.tenant_id
        )
    }

    fn send_mail_url(&self) -> String {
        format!(
            "{}/users/{}/sendMail",
            self.config.api_url.trim_end_matches('/'),
            self.from_address
        )
    }

    /// Client-credentials grant against the identity endpoint.
    async fn fetch_token(&self) -> Result<String, DeliveryError> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("scope", GRAPH_DEFAULT_SCOPE),
            ("grant_type", "client_credentials"),
        ];

        let resp = self
            .client
            .post(self.token_url())
            .form(&params)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status_code = status.as_u16(), "graph_token_rejected");
            return Err(DeliveryError::Token {
                status: status.as_u16(),
                body: truncate_chars(&body, LOG_BODY_LIMIT),
            });
        }

        let token: TokenResponse = resp.json().await?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl NotificationSender for GraphSender {
    fn channel(&self) -> &'static str {
        "graph"
    }

    async fn send(
        &self,
        message: &NotificationMessage,
        recipients: &[String],
    ) -> Result<(), DeliveryError> {
        let token = self.fetch_token().await?;
        let request = SendMailRequest::from_message(message, recipients);

        let resp = self
            .client
            .post(self.send_mail_url())
            .bearer_auth(token)
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body: truncate_chars(&body, LOG_BODY_LIMIT),
            });
        }

        info!(
            status_code = status.as_u16(),
            recipients = recipients.len(),
            attachments = message.attachments.len(),
            "graph_message_sent"
        );

        Ok(())
    }
}
