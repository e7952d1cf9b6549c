use std::io::IsTerminal;

use log::{debug, warn};

/// Ask a yes/no question on the terminal.
///
/// Returns `default` without asking when prompts are disabled or stdin is not a
/// terminal, so scripted runs never block.
#[must_use]
pub fn confirm(message: &str, default: bool, disabled: bool) -> bool {
    if disabled || !std::io::stdin().is_terminal() {
        debug!("Prompt skipped, answering {default}: {message}");
        return default;
    }
    match inquire::Confirm::new(message).with_default(default).prompt() {
        Ok(answer) => answer,
        Err(e) => {
            warn!("Prompt failed, answering {default}: {e}");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_prompt_returns_default() {
        assert!(confirm("Continue?", true, true));
        assert!(!confirm("Continue?", false, true));
    }
}
