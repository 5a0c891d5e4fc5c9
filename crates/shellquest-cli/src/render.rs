//! Text rendering of session outcomes

use shellquest::{Intent, Outcome, ProgressEvent, Resolution, Shell};
use std::io::Write;

const CLEAR_SCREEN: &str = "\x1B[2J\x1B[H";

/// Opens an editor on `(path, content, is_new)`; `None` cancels.
pub type EditFn<'a> = dyn FnMut(&str, &str, bool) -> Option<String> + 'a;

/// Print an outcome, answering pagers and editors until the session is
/// back to waiting for a typed line.
pub async fn drive(shell: &mut Shell, mut outcome: Outcome, edit: &mut EditFn<'_>) {
    loop {
        print_outcome(shell, &outcome);
        let resolution = match &outcome.intent {
            Some(Intent::OpenPager { content, .. }) => {
                print!("{}", content);
                if !content.is_empty() && !content.ends_with('\n') {
                    println!();
                }
                Resolution::Closed
            }
            Some(Intent::OpenEditor {
                path,
                content,
                is_new,
            }) => match edit(path, content, *is_new) {
                Some(content) => Resolution::Saved { content },
                None => Resolution::Cancelled,
            },
            _ => break,
        };
        outcome = shell.resolve(resolution).await;
    }
    let _ = std::io::stdout().flush();
}

fn print_outcome(shell: &Shell, outcome: &Outcome) {
    if outcome.result.clear_screen {
        print!("{}", CLEAR_SCREEN);
    }
    print!("{}", outcome.result.stdout);
    if !outcome.result.stderr.is_empty() {
        eprint!("{}", outcome.result.stderr);
    }
    if let Some(notice) = &outcome.notice {
        println!("{}", notice);
    }
    if let Some(Intent::ConfirmDestructive { warning }) = &outcome.intent {
        println!(
            "{}: {} ({})",
            warning.level.as_str().to_uppercase(),
            warning.reason,
            warning.path
        );
        println!("Continue? Type 'y' to proceed, anything else cancels.");
    }
    for event in &outcome.events {
        print_event(shell, event);
    }
}

fn print_event(shell: &Shell, event: &ProgressEvent) {
    match event {
        ProgressEvent::TaskCompleted { task_id, .. } => {
            if let Some((_, task)) = shell.adventure().find_task(task_id) {
                println!("[done] {}", task.description);
            }
        }
        ProgressEvent::MissionCompleted { message, .. } => {
            println!();
            println!("{}", message.as_deref().unwrap_or("Mission complete."));
            if !shell.progress().is_finished() {
                println!();
                print_briefing(shell);
            }
        }
        ProgressEvent::AdventureCompleted { .. } => {
            println!();
            println!("*** {} complete! ***", shell.adventure().title);
        }
    }
}

/// The current mission's story and task.
pub fn print_briefing(shell: &Shell) {
    let Some(mission) = shell.progress().current_mission() else {
        println!("{} is complete. Use :reset to play again.", shell.adventure().title);
        return;
    };
    println!("== {} ==", mission.title);
    if !mission.story.is_empty() {
        println!("{}", mission.story);
    }
    print_task(shell);
}

/// The task the learner is on.
pub fn print_task(shell: &Shell) {
    if let Some(task) = shell.progress().current_task() {
        println!("Task: {}", task.description);
    }
}
