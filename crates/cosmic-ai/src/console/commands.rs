use crate::chat::{ConversationId, Intent};

/// A line of console input that controls the session instead of being sent.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    /// Forward to the session unchanged.
    Session(Intent),
    /// Print the conversation list.
    List,
    Help,
    Quit,
    Invalid(String),
}

pub const HELP_TEXT: &str = "\
/new          start a new conversation
/list         list conversations
/select <id>  switch to a conversation
/delete <id>  delete a conversation
/stop         cancel the reply in progress
/help         show this help
/quit         exit";

/// Parses one input line. Anything that is not a slash command is a message to send.
pub fn parse_line(input: &str) -> ConsoleCommand {
    let trimmed = input.trim();
    let Some(rest) = trimmed.strip_prefix('/') else {
        return ConsoleCommand::Session(Intent::Send(input.to_string()));
    };

    let mut parts = rest.splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or_default().to_lowercase();
    let argument = parts.next().map(str::trim).filter(|arg| !arg.is_empty());

    match command.as_str() {
        "new" => ConsoleCommand::Session(Intent::NewConversation),
        "stop" => ConsoleCommand::Session(Intent::Stop),
        "select" => parse_conversation_id(argument, "/select")
            .map_or_else(ConsoleCommand::Invalid, |id| {
                ConsoleCommand::Session(Intent::SelectConversation(id))
            }),
        "delete" => parse_conversation_id(argument, "/delete")
            .map_or_else(ConsoleCommand::Invalid, |id| {
                ConsoleCommand::Session(Intent::DeleteConversation(id))
            }),
        "list" | "ls" => ConsoleCommand::List,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" | "q" => ConsoleCommand::Quit,
        _ => ConsoleCommand::Invalid(format!("Unknown command: /{command}")),
    }
}

fn parse_conversation_id(argument: Option<&str>, name: &str) -> Result<ConversationId, String> {
    let Some(argument) = argument else {
        return Err(format!("{name} requires a conversation id"));
    };

    argument
        .parse::<u64>()
        .map(ConversationId::new)
        .map_err(|_| format!("{name} expects a numeric conversation id"))
}
