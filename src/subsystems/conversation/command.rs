//! Bot command recognition.

/// Commands the bot reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Post,
}

impl Command {
    /// Recognise `/start` or `/post` at the start of `text`.
    ///
    /// Accepts an `@<bot_username>` suffix (case-insensitive) and trailing
    /// arguments. A suffix naming a different bot is not ours. When the
    /// transport does not know its own username any suffix is accepted.
    pub fn parse(text: &str, bot_username: Option<&str>) -> Option<Self> {
        let token = text.split_whitespace().next()?;
        let name = token.strip_prefix('/')?;

        let name = match name.split_once('@') {
            Some((name, mention)) => {
                if let Some(me) = bot_username {
                    if !mention.eq_ignore_ascii_case(me) {
                        return None;
                    }
                }
                name
            }
            None => name,
        };

        match name {
            "start" => Some(Command::Start),
            "post" => Some(Command::Post),
            _ => None,
        }
    }
}
