use crate::config::Configuration;
use crate::git::Signing;
use crate::ui::IoUtils;

/// Per-invocation task state.
///
/// Created once when a task starts and passed by reference through every step.
pub struct TaskContext<'a> {
    pub config: &'a Configuration,
    pub io: IoUtils,
    /// The operator chose to sign the release commit and tag
    pub use_gpg: bool,
    /// Key to sign with instead of the one matching the committer email
    pub gpg_alternate_id: Option<String>,
}

impl<'a> TaskContext<'a> {
    pub fn new(config: &'a Configuration, io: IoUtils) -> Self {
        TaskContext {
            config,
            io,
            use_gpg: false,
            gpg_alternate_id: None,
        }
    }

    /// Signing parameters for commits and tags, if the operator asked for them.
    pub fn signing(&self) -> Option<Signing> {
        if !self.use_gpg {
            return None;
        }
        Some(Signing {
            program: self.config.gpg_command.clone(),
            tty: self.config.tty.clone(),
            key_id: self.gpg_alternate_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_configuration;
    use crate::ui::ScriptedConsole;

    #[test]
    fn test_signing_disabled_by_default() {
        let config = test_configuration("/root");
        let ctx = TaskContext::new(&config, IoUtils::with_console(false, ScriptedConsole::new(&[])));
        assert!(ctx.signing().is_none());
    }

    #[test]
    fn test_signing_carries_tty_and_key() {
        let mut config = test_configuration("/root");
        config.tty = Some("/dev/ttys0003".to_string());
        config.gpg_command = Some(std::path::PathBuf::from("/usr/bin/gpg2"));
        let mut ctx = TaskContext::new(&config, IoUtils::with_console(false, ScriptedConsole::new(&[])));
        ctx.use_gpg = true;
        ctx.gpg_alternate_id = Some("ABC123".to_string());

        let signing = ctx.signing().unwrap();
        assert_eq!(signing.tty.as_deref(), Some("/dev/ttys0003"));
        assert_eq!(signing.key_id.as_deref(), Some("ABC123"));
        assert_eq!(signing.program, Some(std::path::PathBuf::from("/usr/bin/gpg2")));
    }
}
