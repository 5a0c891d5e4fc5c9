//! Property-based tests for the path resolver and the in-memory filesystem
//!
//! Run with: `cargo test --test proptest_fs`

use proptest::prelude::*;
use shellquest::fs::{FileSystem, InMemoryFs};
use shellquest::path;
use shellquest::{Adventure, FsError, Shell};

fn segment() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => "[a-z]{1,6}",
        1 => Just(".".to_string()),
        1 => Just("..".to_string()),
        1 => Just(String::new()),
    ]
}

fn target() -> impl Strategy<Value = String> {
    (any::<bool>(), prop::collection::vec(segment(), 0..8)).prop_map(|(absolute, segments)| {
        let joined = segments.join("/");
        if absolute {
            format!("/{}", joined)
        } else {
            joined
        }
    })
}

fn cwd() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z]{1,4}", 0..4).prop_map(|s| format!("/{}", s.join("/")))
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Resolving an already resolved path changes nothing.
    #[test]
    fn resolve_is_idempotent(cwd in cwd(), target in target()) {
        let once = path::resolve(&cwd, &target, "student");
        let twice = path::resolve(&cwd, &once, "student");
        prop_assert_eq!(&once, &twice);
        prop_assert!(once.starts_with('/'));
        prop_assert!(once == "/" || !once.ends_with('/'));
        prop_assert!(!once.contains("//"));
        prop_assert!(path::segments(&once).iter().all(|s| *s != ".."));
    }

    /// Two targets naming the same segments resolve to the same string.
    #[test]
    fn resolve_is_canonical(cwd in cwd(), segments in prop::collection::vec("[a-z]{1,4}", 0..5)) {
        let plain = segments.join("/");
        let noisy = segments.iter().map(|s| format!("./{}/", s)).collect::<String>();
        prop_assert_eq!(
            path::resolve(&cwd, &plain, "student"),
            path::resolve(&cwd, &noisy, "student")
        );
    }

    /// Whatever is written can be read back unchanged.
    #[test]
    fn write_read_round_trip(name in "[a-z]{1,8}", content in prop::collection::vec(any::<u8>(), 0..256)) {
        runtime().block_on(async {
            let fs = InMemoryFs::new("student");
            let file = format!("/tmp/{}", name);
            fs.write_file(&file, &content).await.unwrap();
            prop_assert_eq!(fs.read_file(&file).await.unwrap(), content);
            Ok(())
        })?;
    }

    /// rmdir succeeds exactly when the directory is empty.
    #[test]
    fn rmdir_only_when_empty(children in prop::collection::btree_set("[a-z]{1,5}", 0..4)) {
        runtime().block_on(async {
            let fs = InMemoryFs::new("student");
            fs.mkdir_tree("/tmp/box").await.unwrap();
            for child in &children {
                fs.write_file(&format!("/tmp/box/{}", child), b"x").await.unwrap();
            }

            let listed = fs.read_dir("/tmp/box").await.unwrap().len();
            match fs.rmdir("/tmp/box").await {
                Ok(()) => prop_assert_eq!(listed, 0),
                Err(e) => {
                    prop_assert!(matches!(e, FsError::NotEmpty(_)));
                    prop_assert!(listed > 0);
                }
            }
            Ok(())
        })?;
    }

    /// A snapshot restores exactly the tree it was taken from.
    #[test]
    fn snapshot_restores_tree(names in prop::collection::vec("[a-z]{1,5}", 1..5)) {
        runtime().block_on(async {
            let fs = InMemoryFs::new("student");
            let pristine = fs.snapshot();
            for name in &names {
                fs.mkdir_tree(&format!("/tmp/{}/deep", name)).await.unwrap();
            }
            fs.restore_from(&pristine);
            prop_assert!(fs.read_dir("/tmp").await.unwrap().is_empty());
            Ok(())
        })?;
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Arbitrary input never wedges the shell: afterwards a plain command still runs.
    #[test]
    fn shell_survives_arbitrary_lines(lines in prop::collection::vec("[ -~]{0,40}", 1..6)) {
        let adventure = Adventure::from_json(r#"{
            "id": "fuzz", "title": "Fuzz",
            "missions": [{"id": "m", "title": "m", "story": "",
                          "tasks": [{"id": "t", "description": "never",
                                     "outputPattern": "^never printed$"}]}]
        }"#).unwrap();

        runtime().block_on(async {
            let mut shell = Shell::builder().adventure(adventure).build().await.unwrap();
            for line in &lines {
                shell.submit(line).await;
            }
            shell.reset_exercise().await.unwrap();
            let outcome = shell.submit("pwd").await;
            prop_assert_eq!(outcome.result.stdout, "/home/student\n");
            Ok(())
        })?;
    }
}
