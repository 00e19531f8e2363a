/// One line typed at the interactive prompt.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum Command<'a> {
    Empty,
    Quit,
    History,
    Config,
    Ask(&'a str),
}

pub(super) fn parse(line: &str) -> Command<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    match line.to_lowercase().as_str() {
        "quit" | "exit" | "q" => Command::Quit,
        "history" => Command::History,
        "config" => Command::Config,
        _ => Command::Ask(line),
    }
}
