use crate::api::new;
use crate::cli::actions::Action;
use anyhow::Result;
use tracing::{debug, warn};

/// Handle the server action
pub async fn handle(action: Action) -> Result<()> {
    match action {
        Action::Server { port, globals } => {
            debug!("Server configuration: {:?}", globals);

            for setting in globals.unsafe_defaults() {
                warn!("Using the default --{setting}, override it before going to production");
            }

            new(port, globals).await?;
        }
    }

    Ok(())
}
