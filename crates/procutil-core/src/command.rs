use std::fmt;

/// A command to launch
///
/// `Shell` strings are handed to the configured shell and may use pipes,
/// redirections and job control. `Argv` vectors are executed directly, the
/// first element being the program path, so arguments containing spaces or
/// shell metacharacters are passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CommandLine {
    Shell(String),
    Argv(Vec<String>),
}

impl CommandLine {
    pub fn shell(command: impl Into<String>) -> Self {
        CommandLine::Shell(command.into())
    }

    pub fn argv<S: ToString, I: IntoIterator<Item = S>>(iter: I) -> Self {
        CommandLine::Argv(iter.into_iter().map(|s| s.to_string()).collect())
    }

    pub fn is_shell(&self) -> bool {
        matches!(self, CommandLine::Shell(_))
    }

    /// True when the command is empty or only whitespace
    pub fn is_empty(&self) -> bool {
        match self {
            CommandLine::Shell(s) => s.trim().is_empty(),
            CommandLine::Argv(v) => v.first().is_none_or(|p| p.is_empty()),
        }
    }

    /// Wrap a shell string so the shell detaches it as a background job.
    ///
    /// The whole string becomes one brace group, so lists, trailing `;`
    /// and trailing comments are detached as a unit. The newline closes any
    /// comment before the group does.
    ///
    /// Argument vectors are returned unchanged; they never reach a shell.
    pub fn backgrounded(&self) -> Self {
        match self {
            CommandLine::Shell(s) => CommandLine::Shell(format!("{{ {}\n}} &", s.trim_end())),
            CommandLine::Argv(_) => self.clone(),
        }
    }

    /// Render as a single line, argv elements joined by spaces.
    ///
    /// This is the form the process table reports, so it doubles as the
    /// lookup key for a command launched without waiting.
    pub fn display_line(&self) -> String {
        match self {
            CommandLine::Shell(s) => s.clone(),
            CommandLine::Argv(v) => v.join(" "),
        }
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_line())
    }
}

impl From<&str> for CommandLine {
    fn from(value: &str) -> Self {
        CommandLine::Shell(value.to_string())
    }
}

impl From<String> for CommandLine {
    fn from(value: String) -> Self {
        CommandLine::Shell(value)
    }
}

impl From<Vec<String>> for CommandLine {
    fn from(value: Vec<String>) -> Self {
        CommandLine::Argv(value)
    }
}

impl From<&[&str]> for CommandLine {
    fn from(value: &[&str]) -> Self {
        CommandLine::argv(value)
    }
}

impl<const N: usize> From<[&str; N]> for CommandLine {
    fn from(value: [&str; N]) -> Self {
        CommandLine::argv(value)
    }
}
