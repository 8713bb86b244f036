//! Sign-up: obtain and store a session token

use supportchat_shared::{SignupRequest, TokenResponse};

use crate::api::{ApiClient, SIGNUP_PATH};
use crate::error::ClientResult;
use crate::session::SessionTokens;
use crate::shell::{Route, Shell};

#[derive(Clone)]
pub struct SignupClient {
    api: ApiClient,
    tokens: SessionTokens,
    shell: Shell,
}

impl SignupClient {
    pub fn new(api: ApiClient, tokens: SessionTokens, shell: Shell) -> Self {
        Self { api, tokens, shell }
    }

    /// Register and store the returned token, then move to the ticket list
    pub async fn signup(&self, request: &SignupRequest) -> ClientResult<()> {
        let result = self.register(request).await;
        match &result {
            Ok(()) => self.shell.navigate(Route::Support),
            Err(e) => self.shell.report(e),
        }
        result
    }

    async fn register(&self, request: &SignupRequest) -> ClientResult<()> {
        let response: TokenResponse = self
            .api
            .post(SIGNUP_PATH, None, request, "Something went wrong")
            .await?;
        self.tokens.store().store(&response.token)?;

        tracing::info!(username = %request.username, "Signed up");
        Ok(())
    }
}
