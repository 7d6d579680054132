use crate::error::WorkspaceError;
use crate::model::node::NoteId;
use crate::model::ordering::DropDirection;
use crate::model::panes::PaneId;
use crate::msg::Msg;

/// One parsed shell line.
#[derive(Debug)]
pub enum Command {
    /// Forwarded to the workspace as-is.
    Dispatch(Msg),
    /// `open <id>` with no pane: whichever pane is focused when it runs.
    OpenFocused(NoteId),
    /// `child` with no id: the parent is whatever is selected when it runs.
    ChildOfSelection,
    /// Local fuzzy title filter; never reaches the authority.
    Find(String),
    Tree,
    Status,
    Help,
}

pub const HELP: &[&str] = &[
    "open <id> [1|2]        open a note (focused pane by default)",
    "other <id>             open in the other pane",
    "back | forward         walk the open history",
    "pane <1|2> | focus     focus a pane / its editor",
    "select <id>            select without opening",
    "toggle <id>            expand or collapse",
    "new | child [id]       create a sibling / child",
    "rename <id> <title>    rename",
    "edit <id> <text>       replace content (\\n for newline)",
    "close <id>             close the editor, dropping unsaved edits",
    "pin <id> | rm <id>     pin toggle / move to trash",
    "trash | restore <id> | purge <id> --yes",
    "mv <id> <parent|-> [before <anchor>]",
    "drop <id> <target> up|down",
    "search <query> | find <query>",
    "tree | status | help | quit",
];

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<Command>, WorkspaceError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };
    let args: Vec<&str> = rest.split_whitespace().collect();

    let command = match verb {
        "open" | "o" => {
            let id = required_id(&args, 0, "open <id> [1|2]")?;
            match args.get(1) {
                Some(raw) => Command::Dispatch(Msg::OpenNote {
                    id,
                    pane: parse_pane(raw)?,
                    focus_editor: true,
                }),
                None => Command::OpenFocused(id),
            }
        }
        "other" => Command::Dispatch(Msg::OpenInOtherPane(required_id(
            &args,
            0,
            "other <id>",
        )?)),
        "back" | "b" => Command::Dispatch(Msg::GoBack),
        "forward" | "f" => Command::Dispatch(Msg::GoForward),
        "pane" => {
            let raw = args
                .first()
                .ok_or_else(|| WorkspaceError::validation("usage: pane <1|2>"))?;
            Command::Dispatch(Msg::SetFocusedPane(parse_pane(raw)?))
        }
        "focus" => Command::Dispatch(Msg::TriggerEditorFocus),
        "select" | "s" => Command::Dispatch(Msg::SelectNode(required_id(
            &args,
            0,
            "select <id>",
        )?)),
        "toggle" | "t" => Command::Dispatch(Msg::ToggleExpanded(required_id(
            &args,
            0,
            "toggle <id>",
        )?)),
        "new" | "n" => Command::Dispatch(Msg::CreateSibling),
        "child" | "c" => match args.first() {
            Some(raw) => Command::Dispatch(Msg::CreateChild(Some(NoteId::from(*raw)))),
            None => Command::ChildOfSelection,
        },
        "rename" => {
            let (id, title) = id_and_text(rest, "rename <id> <title>")?;
            Command::Dispatch(Msg::Rename { id, title })
        }
        "edit" | "e" => {
            let (id, text) = id_and_text(rest, "edit <id> <text>")?;
            Command::Dispatch(Msg::EditContent {
                id,
                content: unescape_newlines(&text),
            })
        }
        "close" => Command::Dispatch(Msg::CloseEditor(required_id(&args, 0, "close <id>")?)),
        "pin" => Command::Dispatch(Msg::TogglePin(required_id(&args, 0, "pin <id>")?)),
        "rm" => Command::Dispatch(Msg::DeleteNote(required_id(&args, 0, "rm <id>")?)),
        "trash" => Command::Dispatch(Msg::LoadTrash),
        "restore" => Command::Dispatch(Msg::RestoreNote(required_id(
            &args,
            0,
            "restore <id>",
        )?)),
        "purge" => {
            let id = required_id(&args, 0, "purge <id> --yes")?;
            let confirmed = match &args[1..] {
                [] => false,
                ["--yes" | "-y"] => true,
                _ => return Err(WorkspaceError::validation("usage: purge <id> --yes")),
            };
            Command::Dispatch(Msg::HardDeleteNote { id, confirmed })
        }
        "mv" => parse_move(&args)?,
        "drop" => parse_drop(&args)?,
        "search" | "/" => Command::Dispatch(Msg::Search(unquote(rest))),
        "find" => Command::Find(unquote(rest)),
        "tree" | "ls" => Command::Tree,
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "q" | "exit" => Command::Dispatch(Msg::Quit),
        other => {
            return Err(WorkspaceError::validation(format!(
                "unknown command `{other}` (try `help`)"
            )));
        }
    };

    Ok(Some(command))
}

fn required_id(args: &[&str], index: usize, usage: &str) -> Result<NoteId, WorkspaceError> {
    args.get(index)
        .map(|raw| NoteId::from(*raw))
        .ok_or_else(|| WorkspaceError::validation(format!("usage: {usage}")))
}

fn parse_pane(raw: &str) -> Result<PaneId, WorkspaceError> {
    raw.parse::<u8>()
        .ok()
        .and_then(PaneId::from_number)
        .ok_or_else(|| WorkspaceError::validation(format!("no pane `{raw}` (use 1 or 2)")))
}

fn id_and_text(rest: &str, usage: &str) -> Result<(NoteId, String), WorkspaceError> {
    let Some((id, text)) = rest.split_once(char::is_whitespace) else {
        return Err(WorkspaceError::validation(format!("usage: {usage}")));
    };
    Ok((NoteId::from(id), unquote(text)))
}

fn parse_move(args: &[&str]) -> Result<Command, WorkspaceError> {
    const USAGE: &str = "usage: mv <id> <parent|-> [before <anchor>]";

    let (id, parent) = match args {
        [id, parent, ..] => (NoteId::from(*id), *parent),
        _ => return Err(WorkspaceError::validation(USAGE)),
    };
    let new_parent = (parent != "-").then(|| NoteId::from(parent));

    let anchor = match &args[2..] {
        [] => None,
        ["before", anchor] => Some(NoteId::from(*anchor)),
        _ => return Err(WorkspaceError::validation(USAGE)),
    };

    Ok(Command::Dispatch(Msg::MoveNote {
        id,
        new_parent,
        anchor,
    }))
}

fn parse_drop(args: &[&str]) -> Result<Command, WorkspaceError> {
    let [id, target, direction] = args else {
        return Err(WorkspaceError::validation(
            "usage: drop <id> <target> up|down",
        ));
    };

    let direction = match direction.to_ascii_lowercase().as_str() {
        "up" | "above" => DropDirection::Up,
        "down" | "below" => DropDirection::Down,
        other => {
            return Err(WorkspaceError::validation(format!(
                "drop direction must be up or down, got `{other}`"
            )));
        }
    };

    Ok(Command::Dispatch(Msg::DropNote {
        id: NoteId::from(*id),
        target: NoteId::from(*target),
        direction,
    }))
}

/// Strip one pair of matching quotes, honouring backslash escapes inside.
fn unquote(raw: &str) -> String {
    let input = raw.trim();
    if input.len() < 2 {
        return input.to_string();
    }

    let Some(first) = input.chars().next() else {
        return String::new();
    };
    if (first != '"' && first != '\'') || !input.ends_with(first) {
        return input.to_string();
    }

    let inner = &input[first.len_utf8()..input.len() - first.len_utf8()];
    let mut out = String::with_capacity(inner.len());
    let mut escaped = false;

    for ch in inner.chars() {
        if escaped {
            // keep `\n` for the newline pass
            if ch == 'n' {
                out.push('\\');
            }
            out.push(ch);
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else {
            out.push(ch);
        }
    }

    if escaped {
        out.push('\\');
    }

    out
}

fn unescape_newlines(text: &str) -> String {
    text.replace("\\n", "\n")
}
