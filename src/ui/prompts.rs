//! Interactive prompts with CI/non-interactive fallback

use super::output::OutputMode;
use crate::error::{DrydockError, DrydockResult};

/// Prompt for confirmation.
///
/// `auto_yes` bypasses the prompt; a non-interactive environment returns the
/// default without blocking.
pub async fn confirm(
    mode: OutputMode,
    message: &str,
    default: bool,
    auto_yes: bool,
) -> DrydockResult<bool> {
    if auto_yes {
        println!("  {} (auto-approved)", message);
        return Ok(true);
    }

    if !mode.is_interactive() {
        return Ok(default);
    }

    // cliclack blocks, so it runs off the async executor
    let message = message.to_string();
    let result = tokio::task::spawn_blocking(move || {
        cliclack::confirm(&message).initial_value(default).interact()
    })
    .await
    .map_err(|e| DrydockError::User(format!("Prompt task failed: {}", e)))?;

    result.map_err(|e| DrydockError::User(format!("Prompt failed: {}", e)))
}
