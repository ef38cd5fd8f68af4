//! Interactive "reset and retry?" prompt.

use dialoguer::Select;
use tracing::warn;

use gitrecover_core::config::ConflictPolicy;
use gitrecover_core::recovery::{ConfirmPrompt, FixedChoice, UserChoice};

/// Asks on the terminal which recovery to apply.
#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl TerminalPrompt {
    /// The entries offered for a plan, in display order.
    fn entries(has_new: bool) -> Vec<(&'static str, UserChoice)> {
        let mut entries = Vec::with_capacity(3);
        if has_new {
            entries.push((
                "Reset tracked files, delete new files, and retry",
                UserChoice::ResetAndDelete,
            ));
        }
        entries.push(("Reset tracked files and retry", UserChoice::ResetOnly));
        entries.push(("Cancel", UserChoice::Cancel));
        entries
    }
}

impl ConfirmPrompt for TerminalPrompt {
    fn choose(&self, has_tracked: bool, has_new: bool) -> UserChoice {
        let entries = Self::entries(has_new);
        let labels: Vec<&str> = entries.iter().map(|(label, _)| *label).collect();

        let prompt = match (has_tracked, has_new) {
            (true, true) => "Local changes and new files block this command",
            (false, true) => "New files block this command",
            _ => "Local changes block this command",
        };

        match Select::new()
            .with_prompt(prompt)
            .items(&labels)
            .default(0)
            .interact_opt()
        {
            Ok(Some(index)) => entries[index].1,
            Ok(None) => UserChoice::Cancel,
            Err(e) => {
                warn!(error = %e, "prompt failed, cancelling recovery");
                UserChoice::Cancel
            }
        }
    }
}

/// Build the prompt for a conflict policy.
pub fn for_policy(policy: ConflictPolicy) -> Box<dyn ConfirmPrompt> {
    match policy.fixed_choice() {
        Some(choice) => Box::new(FixedChoice(choice)),
        None => Box::new(TerminalPrompt),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delete_entry_only_with_new_files() {
        let with_new = TerminalPrompt::entries(true);
        assert_eq!(with_new.len(), 3);
        assert_eq!(with_new[0].1, UserChoice::ResetAndDelete);

        let tracked_only = TerminalPrompt::entries(false);
        assert_eq!(
            tracked_only.iter().map(|(_, c)| *c).collect::<Vec<_>>(),
            [UserChoice::ResetOnly, UserChoice::Cancel]
        );
    }

    #[test]
    fn test_fixed_policy_does_not_prompt() {
        let prompt = for_policy(ConflictPolicy::ResetAndDelete);
        assert_eq!(prompt.choose(true, true), UserChoice::ResetAndDelete);
        assert_eq!(prompt.choose(true, false), UserChoice::ResetOnly);

        let prompt = for_policy(ConflictPolicy::Cancel);
        assert_eq!(prompt.choose(true, true), UserChoice::Cancel);
    }
}
