//! Slash-command grammar for `/circleci`.
//!
//! The table is built once at startup and shared read-only. Parsing only
//! picks the command and its arguments, execution lives in `api::command`.

pub const TRIGGER: &str = "/circleci";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Connect,
    Disconnect,
    Me,
    Subscribe,
    Unsubscribe,
    ListSubscriptions,
    AddVcs,
    DeleteVcs,
    ListVcs,
    Build,
    Help,
}

#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub words: &'static [&'static str],
    pub args: &'static [&'static str],
    pub description: &'static str,
    pub kind: CommandKind,
}

impl CommandSpec {
    pub fn usage(&self) -> String {
        let mut usage = format!("{} {}", TRIGGER, self.words.join(" "));
        for arg in self.args {
            usage.push_str(&format!(" <{}>", arg));
        }
        usage
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedCommand {
    Run { kind: CommandKind, args: Vec<String> },
    /// Unknown command or wrong number of arguments
    Usage(String),
}

pub struct CommandTable {
    specs: Vec<CommandSpec>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self {
            specs: vec![
                spec(&["connect"], &["token"], "Connect your CircleCI account", CommandKind::Connect),
                spec(&["disconnect"], &[], "Disconnect your CircleCI account", CommandKind::Disconnect),
                spec(&["me"], &[], "Show the connected CircleCI account", CommandKind::Me),
                spec(
                    &["subscribe"],
                    &["vcs", "org", "repo"],
                    "Post build results of a repository to this channel",
                    CommandKind::Subscribe,
                ),
                spec(
                    &["unsubscribe"],
                    &["vcs", "org", "repo"],
                    "Stop posting build results of a repository to this channel",
                    CommandKind::Unsubscribe,
                ),
                spec(
                    &["list", "subscriptions"],
                    &[],
                    "List repositories this channel is subscribed to",
                    CommandKind::ListSubscriptions,
                ),
                spec(
                    &["add", "vcs"],
                    &["alias", "type", "base-url"],
                    "Register a self-hosted VCS (type is github or bitbucket)",
                    CommandKind::AddVcs,
                ),
                spec(&["delete", "vcs"], &["alias"], "Remove a registered VCS", CommandKind::DeleteVcs),
                spec(&["list", "vcs"], &[], "List known VCS aliases", CommandKind::ListVcs),
                spec(
                    &["build"],
                    &["vcs", "org", "repo", "branch|tag", "head"],
                    "Trigger a pipeline on a branch or tag",
                    CommandKind::Build,
                ),
                spec(&["help"], &[], "Show this help", CommandKind::Help),
            ],
        }
    }

    pub fn specs(&self) -> &[CommandSpec] {
        &self.specs
    }

    pub fn parse(&self, text: &str) -> ParsedCommand {
        let mut tokens: Vec<&str> = text.split_whitespace().collect();
        if tokens.first() == Some(&TRIGGER) {
            tokens.remove(0);
        }

        if tokens.is_empty() {
            return ParsedCommand::Run {
                kind: CommandKind::Help,
                args: Vec::new(),
            };
        }

        let matched = self
            .specs
            .iter()
            .filter(|spec| tokens.starts_with(spec.words))
            .max_by_key(|spec| spec.words.len());

        match matched {
            Some(spec) => {
                let args = &tokens[spec.words.len()..];
                if args.len() != spec.args.len() {
                    return ParsedCommand::Usage(format!("Usage: `{}`", spec.usage()));
                }
                ParsedCommand::Run {
                    kind: spec.kind,
                    args: args.iter().map(|a| a.to_string()).collect(),
                }
            }
            None => ParsedCommand::Usage(format!("Unknown command `{}`.\n\n{}", tokens.join(" "), self.help_text())),
        }
    }

    pub fn help_text(&self) -> String {
        let mut text = String::from("Available commands:\n");
        for spec in &self.specs {
            text.push_str(&format!("* `{}` - {}\n", spec.usage(), spec.description));
        }
        text
    }
}

fn spec(
    words: &'static [&'static str],
    args: &'static [&'static str],
    description: &'static str,
    kind: CommandKind,
) -> CommandSpec {
    CommandSpec {
        words,
        args,
        description,
        kind,
    }
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(kind: CommandKind, args: &[&str]) -> ParsedCommand {
        ParsedCommand::Run {
            kind,
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[test]
    fn test_parse_commands() {
        let table = CommandTable::new();
        assert_eq!(
            table.parse("subscribe github acme widgets"),
            run(CommandKind::Subscribe, &["github", "acme", "widgets"])
        );
        assert_eq!(table.parse("/circleci list vcs"), run(CommandKind::ListVcs, &[]));
        assert_eq!(table.parse("  list   subscriptions "), run(CommandKind::ListSubscriptions, &[]));
        assert_eq!(
            table.parse("add vcs ghe github https://git.acme.io"),
            run(CommandKind::AddVcs, &["ghe", "github", "https://git.acme.io"])
        );
        assert_eq!(table.parse(""), run(CommandKind::Help, &[]));
    }

    #[test]
    fn test_wrong_arity_returns_usage() {
        let table = CommandTable::new();
        assert_eq!(
            table.parse("subscribe github acme"),
            ParsedCommand::Usage("Usage: `/circleci subscribe <vcs> <org> <repo>`".to_string())
        );
        assert!(matches!(table.parse("delete vcs"), ParsedCommand::Usage(_)));
    }

    #[test]
    fn test_unknown_command_lists_help() {
        let table = CommandTable::new();
        match table.parse("deploy prod") {
            ParsedCommand::Usage(text) => {
                assert!(text.starts_with("Unknown command `deploy prod`"));
                assert!(text.contains("/circleci build <vcs> <org> <repo> <branch|tag> <head>"));
            }
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn test_help_lists_every_command() {
        let table = CommandTable::new();
        let help = table.help_text();
        for spec in table.specs() {
            assert!(help.contains(&spec.usage()));
        }
    }
}
