//! Interactive line editor loop

use anyhow::Result;
use rustyline::completion::Completer;
use rustyline::error::ReadlineError;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Editor, Helper};
use shellquest::{EchoMode, InputMode, PersistedProgress, Shell};
use std::borrow::Cow;

use crate::render;

/// Masks the line while a password is typed.
#[derive(Default)]
struct PromptHelper {
    masking: bool,
}

impl Completer for PromptHelper {
    type Candidate = String;
}

impl Hinter for PromptHelper {
    type Hint = String;
}

impl Highlighter for PromptHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if self.masking {
            Cow::Owned("*".repeat(line.chars().count()))
        } else {
            Cow::Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        self.masking
    }
}

impl Validator for PromptHelper {}

impl Helper for PromptHelper {}

type LineEditor = Editor<PromptHelper, DefaultHistory>;

enum Flow {
    Continue,
    Quit,
}

const HELP: &str = "\
:task    show the current mission and task
:hint    reveal the next hint for the current task
:reset   start the adventure over
:quit    leave (progress is kept)
";

/// Run the REPL until `:quit` or end of input.
pub async fn run(shell: &mut Shell, saved: Option<PersistedProgress>) -> Result<()> {
    let mut rl: LineEditor = Editor::new()?;
    rl.set_helper(Some(PromptHelper::default()));

    println!("{}", shell.adventure().title);
    if let Some(description) = &shell.adventure().description {
        println!("{}", description);
    }
    println!("Type :help for game commands.");
    println!();

    if let Some(saved) = saved {
        let question = format!(
            "Saved progress from {} ({} tasks done). Continue? [Y/n] ",
            saved.last_saved.format("%Y-%m-%d %H:%M"),
            saved.completed_tasks.len()
        );
        match rl.readline(&question) {
            Ok(answer) if is_no(&answer) => shell.reset_exercise().await?,
            Ok(_) => shell.resume(saved),
            Err(ReadlineError::Eof | ReadlineError::Interrupted) => return Ok(()),
            Err(e) => return Err(e.into()),
        }
    }
    render::print_briefing(shell);

    loop {
        let masked = shell.echo_mode() == EchoMode::Masked;
        if let Some(helper) = rl.helper_mut() {
            helper.masking = masked;
        }

        let line = match rl.readline(&shell.prompt()) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };

        if matches!(shell.session().mode(), InputMode::Normal) {
            if let Some(meta) = line.trim().strip_prefix(':') {
                match meta_command(shell, meta.trim()).await? {
                    Flow::Continue => continue,
                    Flow::Quit => break,
                }
            }
            if !line.trim().is_empty() {
                let _ = rl.add_history_entry(line.as_str());
            }
        }

        let outcome = shell.submit(&line).await;
        render::drive(shell, outcome, &mut |path, content, is_new| {
            edit(&mut rl, path, content, is_new)
        })
        .await;
    }
    Ok(())
}

async fn meta_command(shell: &mut Shell, command: &str) -> Result<Flow> {
    match command {
        "quit" | "q" => return Ok(Flow::Quit),
        "help" => print!("{}", HELP),
        "task" => render::print_briefing(shell),
        "hint" => {
            let Some(task_id) = shell.progress().current_task().map(|t| t.id.clone()) else {
                println!("Nothing left to hint at.");
                return Ok(Flow::Continue);
            };
            match shell.reveal_hint(&task_id) {
                Some(hint) => println!("Hint {}: {}", hint.level, hint.text),
                None => println!("No hints for this task."),
            }
        }
        "reset" => {
            shell.reset_exercise().await?;
            println!("Exercise reset.");
            println!();
            render::print_briefing(shell);
        }
        other => println!("Unknown command ':{}'. Try :help", other),
    }
    Ok(Flow::Continue)
}

/// Line-at-a-time editor: the typed lines replace the file.
fn edit(rl: &mut LineEditor, path: &str, content: &str, is_new: bool) -> Option<String> {
    let label = if is_new { " (new file)" } else { "" };
    println!("-- editing {}{} --", path, label);
    if !content.is_empty() {
        print!("{}", content);
        if !content.ends_with('\n') {
            println!();
        }
        println!("-- end of current contents --");
    }
    println!("Type the new contents. A line with only '.' saves, ':q' cancels.");

    let mut body = String::new();
    loop {
        match rl.readline("") {
            Ok(line) if line == "." => return Some(body),
            Ok(line) if line == ":q" => return None,
            Ok(line) => {
                body.push_str(&line);
                body.push('\n');
            }
            Err(_) => return None,
        }
    }
}

fn is_no(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "n" | "no")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masking_hides_password() {
        let helper = PromptHelper { masking: true };
        assert_eq!(helper.highlight("secret", 6), "******");
        let helper = PromptHelper::default();
        assert_eq!(helper.highlight("ls -la", 0), "ls -la");
    }

    #[test]
    fn test_is_no() {
        assert!(is_no(" N "));
        assert!(is_no("no"));
        assert!(!is_no(""));
        assert!(!is_no("yes"));
    }
}
