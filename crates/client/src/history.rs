//! History loader: one-shot snapshot of a ticket and its messages

use supportchat_shared::{Id, Message, MessageListResponse, Ticket};

use crate::api::{messages_path, ticket_path, ApiClient};
use crate::error::{ClientError, ClientResult};
use crate::session::SessionTokens;
use crate::shell::Shell;

/// Fetches ticket metadata and message history.
///
/// Failures are surfaced as a toast here and returned to the caller, which
/// abandons the load. Nothing is retried.
#[derive(Clone)]
pub struct HistoryLoader {
    api: ApiClient,
    tokens: SessionTokens,
    shell: Shell,
}

impl HistoryLoader {
    pub fn new(api: ApiClient, tokens: SessionTokens, shell: Shell) -> Self {
        Self { api, tokens, shell }
    }

    pub async fn fetch_ticket(&self, channel_id: &Id) -> ClientResult<Ticket> {
        let token = self.tokens.get_token().ok_or(ClientError::MissingToken)?;
        let result = self
            .api
            .get::<Ticket>(&ticket_path(channel_id), Some(&token), "Failed to fetch ticket")
            .await;

        match result {
            Ok(ticket) => {
                tracing::info!(
                    ticket_id = %ticket.id,
                    user_id = %ticket.user_id,
                    status = ?ticket.status,
                    "Ticket loaded"
                );
                Ok(ticket)
            }
            Err(e) => {
                self.shell.report(&e);
                Err(e)
            }
        }
    }

    /// Messages in server order
    pub async fn fetch_messages(&self, channel_id: &Id) -> ClientResult<Vec<Message>> {
        let token = self.tokens.get_token().ok_or(ClientError::MissingToken)?;
        let result = self
            .api
            .get::<MessageListResponse>(
                &messages_path(channel_id),
                Some(&token),
                "Failed to fetch messages",
            )
            .await;

        match result {
            Ok(list) => {
                let messages = list.into_messages();
                tracing::info!(
                    ticket_id = %channel_id,
                    count = messages.len(),
                    "Message history loaded"
                );
                Ok(messages)
            }
            Err(e) => {
                self.shell.report(&e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::session::MemoryTokenStore;
    use crate::shell::testing::RecordingShell;
    use crate::shell::Route;
    use std::sync::Arc;
    use url::Url;

    fn loader(server: &mockito::Server, recorder: &Arc<RecordingShell>, token: Option<&str>) -> HistoryLoader {
        let config = ClientConfig::for_base_url(Url::parse(&server.url()).unwrap()).unwrap();
        let store = match token {
            Some(t) => MemoryTokenStore::with_token(t),
            None => MemoryTokenStore::default(),
        };
        let tokens = SessionTokens::new(Arc::new(store), recorder.shell());
        HistoryLoader::new(ApiClient::new(&config).unwrap(), tokens, recorder.shell())
    }

    #[tokio::test]
    async fn test_fetch_ticket() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/tickets/3")
            .match_header("authorization", "tok")
            .with_status(200)
            .with_body(r#"{"id": 3, "user_id": 7, "channel_id": 99, "topic": "Billing", "status": "ACTIVE"}"#)
            .create_async()
            .await;

        let recorder = RecordingShell::new();
        let ticket = loader(&server, &recorder, Some("tok"))
            .fetch_ticket(&Id::from(3))
            .await
            .unwrap();
        assert_eq!(ticket.user_id, Id::from(7));
        assert_eq!(ticket.topic.as_deref(), Some("Billing"));
        assert!(recorder.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_messages_preserves_server_order() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/tickets/3/messages")
            .with_status(200)
            .with_body(
                r#"[{"id": 2, "author_id": 7, "content": "b"}, {"id": 1, "author_id": 8, "content": "a"}]"#,
            )
            .create_async()
            .await;

        let recorder = RecordingShell::new();
        let messages = loader(&server, &recorder, Some("tok"))
            .fetch_messages(&Id::from(3))
            .await
            .unwrap();
        let ids: Vec<_> = messages.iter().map(|m| m.id.as_str().to_string()).collect();
        assert_eq!(ids, vec!["2", "1"]);
    }

    #[tokio::test]
    async fn test_server_error_surfaced_as_notification() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/tickets/3")
            .with_status(403)
            .with_body(r#"{"message": "Not your ticket"}"#)
            .create_async()
            .await;

        let recorder = RecordingShell::new();
        let result = loader(&server, &recorder, Some("tok"))
            .fetch_ticket(&Id::from(3))
            .await;
        assert!(matches!(result, Err(ClientError::Server { status: 403, .. })));
        assert_eq!(recorder.messages(), vec!["Error: Not your ticket".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_token_issues_no_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/tickets/3/messages")
            .expect(0)
            .create_async()
            .await;

        let recorder = RecordingShell::new();
        let result = loader(&server, &recorder, None)
            .fetch_messages(&Id::from(3))
            .await;
        assert!(matches!(result, Err(ClientError::MissingToken)));
        assert_eq!(recorder.routes(), vec![Route::Auth]);
        assert!(recorder.notifications().is_empty());
        mock.assert_async().await;
    }
}
