//! Session interceptor behaviour: remote hosts, variables, modals, limits
//!
//! Run with: `cargo test --test session_tests`

use pretty_assertions::assert_eq;
use shellquest::fs::FileSystem;
use shellquest::session::{RemoteHost, StaticResponder};
use shellquest::{
    Adventure, InputMode, Intent, Resolution, SessionLimits, Shell, ShellConfig, SudoPolicy,
    WarningLevel,
};
use std::sync::Arc;

const ADVENTURE: &str = r#"{
    "id": "session",
    "title": "Session",
    "missions": [{
        "id": "m", "title": "Remote", "story": "",
        "tasks": [{"id": "visit", "description": "Read the remote motd",
                   "outputCheck": "contains", "outputCheckParams": {"text": "welcome to lab"}}]
    }],
    "remoteHosts": {
        "lab": {
            "banner": "Lab server 1.0",
            "filesystem": {
                "etc": {"type": "directory", "children": {
                    "motd": {"type": "file", "content": "welcome to lab\n"}
                }},
                "root": {"type": "directory", "children": {
                    "flag": {"type": "file", "content": "FLAG\n"}
                }}
            }
        }
    }
}"#;

async fn shell_with(config: ShellConfig) -> Shell {
    Shell::builder()
        .adventure(Adventure::from_json(ADVENTURE).unwrap())
        .config(config)
        .build()
        .await
        .unwrap()
}

async fn shell() -> Shell {
    shell_with(ShellConfig::default()).await
}

#[tokio::test]
async fn ssh_session_runs_against_remote_tree() {
    let mut shell = shell().await;
    let outcome = shell.submit("ssh ada@lab").await;
    assert_eq!(outcome.result.stdout, "Lab server 1.0\n");
    assert_eq!(
        outcome.intent,
        Some(Intent::OpenRemote {
            host: "lab".to_string(),
            user: "ada".to_string(),
            banner: "Lab server 1.0".to_string(),
        })
    );
    assert_eq!(outcome.prompt, "ada@lab:/$ ");

    let outcome = shell.submit("cat /etc/motd").await;
    assert_eq!(outcome.result.stdout, "welcome to lab\n");
    assert_eq!(outcome.events.len(), 3);

    shell.submit("cd /home/ada").await;
    let outcome = shell.submit("echo remote > note.txt").await;
    assert_eq!(outcome.prompt, "ada@lab:/home/ada$ ");
    assert!(
        shell
            .fs()
            .exists("/remotes/ada/filesystem/home/ada/note.txt")
            .await
    );
    assert!(!shell.fs().exists("/home/ada/note.txt").await);

    let outcome = shell.submit("cat /root/flag").await;
    assert!(outcome.result.stderr.contains("Permission denied"));

    let outcome = shell.submit("ssh lab").await;
    assert_eq!(outcome.result.exit_code, 1);

    let outcome = shell.submit("exit").await;
    assert_eq!(outcome.result.stdout, "logout\nConnection to lab closed.\n");
    assert_eq!(outcome.prompt, "student@shellquest:~$ ");
    assert!(shell.session().remote().is_none());
}

#[tokio::test]
async fn ssh_unknown_host() {
    let mut shell = shell().await;
    let outcome = shell.submit("ssh nowhere").await;
    assert_eq!(outcome.result.exit_code, 255);
    assert_eq!(
        outcome.result.stderr,
        "ssh: Could not resolve hostname nowhere\n"
    );
    assert!(shell.session().remote().is_none());
}

#[tokio::test]
async fn remote_tree_is_seeded_once() {
    let mut shell = shell().await;
    shell.submit("ssh lab").await;
    shell.submit("rm /etc/motd").await;
    shell.submit("logout").await;

    shell.submit("ssh lab").await;
    let outcome = shell.submit("ls /etc").await;
    assert_eq!(outcome.result.stdout, "");
}

#[tokio::test]
async fn every_host_seeds_the_shared_remote_tree() {
    let host = |banner: &str, file: &str| RemoteHost {
        banner: banner.to_string(),
        filesystem: serde_json::from_str(&format!(
            r#"{{"srv": {{"type": "directory", "children": {{
                "{}": {{"type": "file", "content": "{}\n"}}
            }}}}}}"#,
            file, banner
        ))
        .unwrap(),
    };
    let responder = StaticResponder::new()
        .host("lab", host("lab", "lab.txt"))
        .host("vault", host("vault", "vault.txt"));
    let mut shell = Shell::builder()
        .adventure(Adventure::from_json(ADVENTURE).unwrap())
        .responder(Arc::new(responder))
        .build()
        .await
        .unwrap();

    shell.submit("ssh lab").await;
    shell.submit("exit").await;
    shell.submit("ssh vault").await;
    let outcome = shell.submit("cat /srv/vault.txt").await;
    assert_eq!(outcome.result.stdout, "vault\n");
    let outcome = shell.submit("cat /srv/lab.txt").await;
    assert_eq!(outcome.result.stdout, "lab\n");
    shell.submit("exit").await;

    shell.reset_exercise().await.unwrap();
    assert!(!shell.fs().exists("/remotes/student").await);
    shell.submit("ssh vault").await;
    let outcome = shell.submit("ls /srv").await;
    assert_eq!(outcome.result.stdout, "vault.txt\n");
}

#[tokio::test]
async fn scp_copies_both_ways() {
    let mut shell = shell().await;
    shell.submit("echo draft > report.txt").await;

    let outcome = shell.submit("scp report.txt lab:").await;
    assert_eq!(outcome.result.exit_code, 0, "{}", outcome.result.stderr);
    let copied = shell
        .fs()
        .read_file("/remotes/student/filesystem/home/student/report.txt")
        .await
        .unwrap();
    assert_eq!(copied, b"draft\n");
    let meta = shell
        .fs()
        .stat("/remotes/student/filesystem/home/student/report.txt")
        .await
        .unwrap();
    assert_eq!(meta.owner, "student");

    let outcome = shell.submit("scp lab:/etc/motd motd.txt").await;
    assert_eq!(outcome.result.exit_code, 0, "{}", outcome.result.stderr);
    let outcome = shell.submit("cat motd.txt").await;
    assert_eq!(outcome.result.stdout, "welcome to lab\n");

    let outcome = shell.submit("scp a.txt b.txt").await;
    assert_eq!(outcome.result.exit_code, 1);
}

#[tokio::test]
async fn custom_responder_replaces_adventure_hosts() {
    let responder = StaticResponder::new().host(
        "mirror",
        RemoteHost {
            banner: "mirror".to_string(),
            ..RemoteHost::default()
        },
    );
    let mut shell = Shell::builder()
        .adventure(Adventure::from_json(ADVENTURE).unwrap())
        .responder(Arc::new(responder))
        .build()
        .await
        .unwrap();

    assert_eq!(shell.submit("ssh lab").await.result.exit_code, 255);
    assert_eq!(shell.submit("ssh mirror").await.result.exit_code, 0);
}

#[tokio::test]
async fn export_and_env() {
    let mut shell = shell().await;
    let outcome = shell.submit("export GREETING=hello").await;
    assert_eq!(outcome.result.exit_code, 0);

    let outcome = shell.submit("echo ${GREETING}, $USER").await;
    assert_eq!(outcome.result.stdout, "hello, student\n");

    let outcome = shell.submit("env").await;
    let lines: Vec<&str> = outcome.result.stdout.lines().collect();
    assert_eq!(
        lines,
        [
            "GREETING=hello",
            "HOME=/home/student",
            "HOSTNAME=shellquest",
            "LOGNAME=student",
            "PWD=/home/student",
            "SHELL=/bin/bash",
            "USER=student",
        ]
    );

    let outcome = shell.submit("export").await;
    assert_eq!(outcome.result.stdout, "declare -x GREETING=\"hello\"\n");

    let outcome = shell.submit("export 1BAD=x").await;
    assert_eq!(outcome.result.exit_code, 1);
    assert_eq!(
        outcome.result.stderr,
        "bash: export: `1BAD=x': not a valid identifier\n"
    );
}

#[tokio::test]
async fn passthrough_sudo_elevates_without_prompt() {
    let mut shell = shell_with(ShellConfig::new().sudo_policy(SudoPolicy::Passthrough)).await;
    shell.fs().write_file("/root/key", b"k\n").await.unwrap();
    shell.fs().chown("/root/key", "root").await.unwrap();

    let outcome = shell.submit("sudo cat /root/key").await;
    assert_eq!(outcome.result.stdout, "k\n");
    assert_eq!(shell.session().mode(), &InputMode::Normal);

    let outcome = shell.submit("sudo nano /root/key").await;
    assert!(matches!(outcome.intent, Some(Intent::OpenEditor { .. })));
}

#[tokio::test]
async fn sudo_editor_asks_for_password_first() {
    let mut shell = shell().await;
    let outcome = shell.submit("sudo nano /root/todo").await;
    assert_eq!(outcome.intent, None);
    assert!(matches!(shell.session().mode(), InputMode::Password(_)));

    let outcome = shell.submit("password").await;
    assert!(matches!(
        outcome.intent,
        Some(Intent::OpenEditor { is_new: true, .. })
    ));
    shell
        .resolve(Resolution::Saved {
            content: "buy milk\n".to_string(),
        })
        .await;
    let content = shell.fs().read_file("/root/todo").await.unwrap();
    assert_eq!(content, b"buy milk\n");
    assert!(shell.fs().stat("/root/todo").await.unwrap().is_root_owned());

    let outcome = shell.submit("cat /root/todo").await;
    assert_eq!(outcome.result.stderr, "cat: /root/todo: Permission denied\n");
}

#[tokio::test]
async fn sudo_redirect_creates_root_owned_file() {
    let mut shell = shell().await;
    shell.submit("sudo echo topsecret > /root/new.txt").await;
    let outcome = shell.submit("password").await;
    assert_eq!(outcome.result.exit_code, 0, "{}", outcome.result.stderr);
    assert!(shell.fs().stat("/root/new.txt").await.unwrap().is_root_owned());

    let outcome = shell.submit("cat /root/new.txt").await;
    assert_eq!(outcome.result.exit_code, 1);
    assert_eq!(outcome.result.stdout, "");
    assert_eq!(
        outcome.result.stderr,
        "cat: /root/new.txt: Permission denied\n"
    );

    shell.submit("echo mine > /tmp/mine.txt").await;
    let meta = shell.fs().stat("/tmp/mine.txt").await.unwrap();
    assert_eq!(meta.owner, "student");
}

#[tokio::test]
async fn editor_refuses_root_files_without_sudo() {
    let mut shell = shell().await;
    let outcome = shell.submit("vi /root/todo").await;
    assert_eq!(outcome.intent, None);
    assert_eq!(outcome.result.stderr, "vi: /root/todo: Permission denied\n");
}

#[tokio::test]
async fn confirmation_by_typed_answer() {
    let mut shell = shell().await;
    let outcome = shell.submit("rm -r /etc").await;
    let Some(Intent::ConfirmDestructive { warning }) = outcome.intent else {
        panic!("expected a confirmation request");
    };
    assert_eq!(warning.level, WarningLevel::Critical);

    let outcome = shell.submit("y").await;
    assert_eq!(outcome.result.exit_code, 0);
    assert!(!shell.fs().exists("/etc").await);
}

#[tokio::test]
async fn removing_home_is_danger() {
    let mut shell = shell().await;
    let outcome = shell.submit("rm -r ~").await;
    let Some(Intent::ConfirmDestructive { warning }) = outcome.intent else {
        panic!("expected a confirmation request");
    };
    assert_eq!(warning.level, WarningLevel::Danger);
    shell.resolve(Resolution::Cancelled).await;
    assert!(shell.fs().exists("/home/student").await);
}

#[tokio::test]
async fn write_limit_applies_to_redirects_and_editor() {
    let limits = SessionLimits::new().max_write_bytes(8);
    let mut shell = shell_with(ShellConfig::new().limits(limits)).await;

    let outcome = shell.submit("echo this is far too long > big.txt").await;
    assert_eq!(outcome.result.exit_code, 1);
    assert_eq!(outcome.result.stderr, "bash: big.txt: File too large\n");

    shell.submit("nano small.txt").await;
    let outcome = shell
        .resolve(Resolution::Saved {
            content: "0123456789".to_string(),
        })
        .await;
    assert_eq!(outcome.result.exit_code, 1);
    assert!(!shell.fs().exists("/home/student/small.txt").await);
}

#[tokio::test]
async fn history_is_recorded_and_capped() {
    let limits = SessionLimits::new().max_history(3);
    let mut shell = shell_with(ShellConfig::new().limits(limits)).await;
    for line in ["pwd", "ls", "whoami", "date"] {
        shell.submit(line).await;
    }
    let outcome = shell.submit("history").await;
    assert_eq!(
        outcome.result.stdout,
        "    1  whoami\n    2  date\n    3  history\n"
    );
}
