//! Terminal login prompt

use async_trait::async_trait;
use shared::{session_info, ProfileDescriptor};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Stdin};
use tokio::sync::Mutex;

use crate::error::OrchestratorResult;
use crate::traits::LoginPrompt;

/// Asks the operator to log in manually and waits for Enter
///
/// Every worker shares one buffered reader, so concurrent prompts are served
/// one line each, in turn.
pub struct TerminalLoginPrompt<R = Stdin> {
    input: Mutex<BufReader<R>>,
}

impl TerminalLoginPrompt<Stdin> {
    pub fn stdin() -> Self {
        Self::from_reader(tokio::io::stdin())
    }
}

impl<R: AsyncRead + Unpin + Send> TerminalLoginPrompt<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            input: Mutex::new(BufReader::new(reader)),
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> LoginPrompt for TerminalLoginPrompt<R> {
    async fn wait_for_login(&self, profile: &ProfileDescriptor) -> OrchestratorResult<()> {
        let mut input = self.input.lock().await;
        session_info!(
            profile.display_name(),
            "🔐 Log in to {} in its browser window, then press Enter",
            profile.display_name()
        );
        let mut line = String::new();
        if input.read_line(&mut line).await? == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "input closed before the login was confirmed",
            )
            .into());
        }
        Ok(())
    }
}
