use crate::cli::globals::GlobalArgs;
use anyhow::Result;

pub mod server;

#[derive(Debug)]
pub enum Action {
    Server { port: u16, globals: GlobalArgs },
}

impl Action {
    /// Run the action.
    ///
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> Result<()> {
        match self {
            Self::Server { .. } => server::handle(self).await,
        }
    }
}
