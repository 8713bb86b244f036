//! Outbound message submitter

use std::sync::Arc;

use supportchat_shared::{Message, SendMessageRequest};

use crate::api::{messages_path, ApiClient};
use crate::error::{ClientError, ClientResult};
use crate::session::{SessionContext, SessionTokens};
use crate::shell::Shell;

pub const EMPTY_MESSAGE: &str = "Please enter a message";

/// Posts messages typed by the user to the open ticket.
///
/// The returned message is meant for [`Reconciler::accept_sent`]; the live
/// echo of the same id is then de-duplicated by the view.
///
/// [`Reconciler::accept_sent`]: crate::reconciler::Reconciler::accept_sent
#[derive(Clone)]
pub struct MessageSubmitter {
    api: ApiClient,
    tokens: SessionTokens,
    session: Arc<SessionContext>,
    shell: Shell,
}

impl MessageSubmitter {
    pub fn new(
        api: ApiClient,
        tokens: SessionTokens,
        session: Arc<SessionContext>,
        shell: Shell,
    ) -> Self {
        Self {
            api,
            tokens,
            session,
            shell,
        }
    }

    pub async fn send_message(&self, content: &str) -> ClientResult<Message> {
        let result = self.submit(content).await;
        if let Err(e) = &result {
            self.shell.report(e);
        }
        result
    }

    async fn submit(&self, content: &str) -> ClientResult<Message> {
        if content.is_empty() {
            return Err(ClientError::Validation(EMPTY_MESSAGE.to_string()));
        }
        let token = self.tokens.get_token().ok_or(ClientError::MissingToken)?;

        let channel_id = self.session.channel_id();
        let request = SendMessageRequest {
            content: content.to_string(),
        };
        let message: Message = self
            .api
            .post(
                &messages_path(channel_id),
                Some(&token),
                &request,
                "Failed to send message",
            )
            .await?;

        tracing::info!(ticket_id = %channel_id, message_id = %message.id, "Message sent");
        Ok(message)
    }
}
