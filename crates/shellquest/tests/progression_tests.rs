//! Mission progression through real commands
//!
//! Run with: `cargo test --test progression_tests`

use pretty_assertions::assert_eq;
use shellquest::fs::FileSystem;
use shellquest::{Adventure, MemoryProgressStore, ProgressEvent, ProgressStore, Shell};
use std::sync::Arc;

const ADVENTURE: &str = r#"{
    "id": "first-steps",
    "title": "First Steps",
    "missions": [
        {
            "id": "orient", "title": "Orientation", "story": "Look around.",
            "onComplete": "You know where you are.",
            "tasks": [
                {"id": "whereami", "description": "Print the working directory",
                 "outputPattern": "^/home/student$"},
                {"id": "look", "description": "List your home",
                 "outputCheck": "commandUsed", "outputCheckParams": {"command": "ls"},
                 "hints": [{"level": 1, "text": "Two letters"},
                           {"level": 2, "text": "l and s"},
                           {"level": 3, "text": "ls"}]}
            ]
        },
        {
            "id": "build", "title": "Build", "story": "Make something.",
            "tasks": [
                {"id": "journal", "description": "Write a journal entry",
                 "outputCheck": "fileContains",
                 "outputCheckParams": {"path": "journal.txt", "text": "day one"}},
                {"id": "lock", "description": "Make the journal private",
                 "outputCheck": "fileMode",
                 "outputCheckParams": {"path": "journal.txt", "mode": "600"}}
            ]
        },
        {
            "id": "broken", "title": "Broken", "story": "",
            "tasks": [
                {"id": "never", "description": "Misconfigured",
                 "outputCheck": "noSuchValidator"},
                {"id": "bad-regex", "description": "Misconfigured pattern",
                 "outputPattern": "(unclosed"}
            ]
        }
    ]
}"#;

async fn shell_with(store: Arc<dyn ProgressStore>) -> Shell {
    Shell::builder()
        .adventure(Adventure::from_json(ADVENTURE).unwrap())
        .store(store)
        .build()
        .await
        .unwrap()
}

async fn shell() -> Shell {
    shell_with(Arc::new(MemoryProgressStore::new())).await
}

#[tokio::test]
async fn tasks_complete_in_any_order() {
    let mut shell = shell().await;

    let outcome = shell.submit("ls").await;
    assert_eq!(
        outcome.events,
        [ProgressEvent::TaskCompleted {
            mission_id: "orient".to_string(),
            task_id: "look".to_string(),
        }]
    );
    assert_eq!(
        shell.progress().current_task().map(|t| t.id.as_str()),
        Some("whereami")
    );

    let outcome = shell.submit("pwd").await;
    assert_eq!(
        outcome.events,
        [
            ProgressEvent::TaskCompleted {
                mission_id: "orient".to_string(),
                task_id: "whereami".to_string(),
            },
            ProgressEvent::MissionCompleted {
                mission_id: "orient".to_string(),
                message: Some("You know where you are.".to_string()),
            },
        ]
    );
    assert_eq!(
        shell.progress().current_mission().map(|m| m.id.as_str()),
        Some("build")
    );
}

#[tokio::test]
async fn filesystem_validators_see_the_result() {
    let mut shell = shell().await;
    shell.submit("pwd").await;
    shell.submit("ls").await;

    let outcome = shell.submit("echo day one > journal.txt").await;
    assert_eq!(outcome.events.len(), 1);

    let outcome = shell.submit("chmod 600 journal.txt").await;
    assert!(outcome.events.contains(&ProgressEvent::MissionCompleted {
        mission_id: "build".to_string(),
        message: None,
    }));
}

#[tokio::test]
async fn failing_commands_do_not_complete_tasks() {
    let mut shell = shell().await;
    let outcome = shell.submit("cd /nowhere").await;
    assert!(outcome.events.is_empty());
    let outcome = shell.submit("pwdx").await;
    assert!(outcome.events.is_empty());
    assert!(shell.progress().state().completed_tasks.is_empty());
}

#[tokio::test]
async fn broken_tasks_never_stall_the_shell() {
    let mut shell = shell().await;
    for line in [
        "pwd",
        "ls",
        "echo day one > journal.txt",
        "chmod 600 journal.txt",
    ] {
        shell.submit(line).await;
    }
    assert_eq!(
        shell.progress().current_mission().map(|m| m.id.as_str()),
        Some("broken")
    );

    let outcome = shell.submit("echo '(unclosed'").await;
    assert_eq!(outcome.result.stdout, "(unclosed\n");
    assert!(outcome.events.is_empty());
    assert!(!shell.progress().is_finished());
}

#[tokio::test]
async fn completed_sets_only_grow() {
    let mut shell = shell().await;
    let mut seen = 0;
    for line in ["pwd", "ls", "pwd", "rm -r nothing", "ls -la", "echo day one > journal.txt"] {
        shell.submit(line).await;
        let now = shell.progress().state().completed_tasks.len();
        assert!(now >= seen, "completed tasks shrank after {}", line);
        seen = now;
    }
    assert_eq!(seen, 3);
}

#[tokio::test]
async fn hints_escalate_and_cap() {
    let mut shell = shell().await;
    let levels: Vec<u8> = (0..5)
        .filter_map(|_| shell.reveal_hint("look").map(|h| h.level))
        .collect();
    assert_eq!(levels, [1, 2, 3, 3, 3]);
    assert_eq!(shell.progress().state().hints_used.get("look"), Some(&3));
    assert!(shell.reveal_hint("unknown-task").is_none());
}

#[tokio::test]
async fn progress_is_saved_and_resumed() {
    let store: Arc<dyn ProgressStore> = Arc::new(MemoryProgressStore::new());
    let mut first = shell_with(Arc::clone(&store)).await;
    first.submit("pwd").await;
    first.submit("ls").await;

    let saved = store.load("first-steps").unwrap().unwrap();
    assert_eq!(saved.completed_missions, ["orient"]);
    assert_eq!(saved.current_mission_index, 1);

    let mut second = shell_with(Arc::clone(&store)).await;
    let mut saved = second.saved_progress().unwrap().unwrap();
    saved.completed_tasks.push("from-another-adventure".to_string());
    second.resume(saved);
    assert_eq!(
        second.progress().current_task().map(|t| t.id.as_str()),
        Some("journal")
    );
    assert!(
        !second
            .progress()
            .state()
            .completed_tasks
            .contains("from-another-adventure")
    );

    second.reset_exercise().await.unwrap();
    assert!(store.load("first-steps").unwrap().is_none());
}

#[tokio::test]
async fn failed_redirect_does_not_complete_task() {
    const QUIET: &str = r#"{
        "id": "quiet",
        "title": "Quiet",
        "missions": [{
            "id": "m", "title": "Stash", "story": "",
            "tasks": [{"id": "stash", "description": "Echo the secret cleanly",
                       "outputPattern": "^secret$",
                       "outputCheck": "exitCode", "outputCheckParams": {"code": 0}}]
        }]
    }"#;
    let mut shell = Shell::builder()
        .adventure(Adventure::from_json(QUIET).unwrap())
        .build()
        .await
        .unwrap();

    let outcome = shell.submit("echo secret > /root/x").await;
    assert_eq!(outcome.result.exit_code, 1);
    assert_eq!(outcome.result.stderr, "bash: /root/x: Permission denied\n");
    assert!(outcome.events.is_empty());
    assert!(!shell.fs().exists("/root/x").await);

    let outcome = shell.submit("echo secret > /tmp/x").await;
    assert_eq!(
        outcome.events,
        [
            ProgressEvent::TaskCompleted {
                mission_id: "m".to_string(),
                task_id: "stash".to_string(),
            },
            ProgressEvent::MissionCompleted {
                mission_id: "m".to_string(),
                message: None,
            },
            ProgressEvent::AdventureCompleted {
                adventure_id: "quiet".to_string(),
            },
        ]
    );
}
