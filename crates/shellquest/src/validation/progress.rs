//! Mission progression
//!
//! [`ProgressTracker`] scores every command against the current mission and
//! moves the learner forward. Completed tasks and missions only ever grow
//! until [`ProgressTracker::reset`].

use indexmap::{IndexMap, IndexSet};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{ValidationContext, Validator};
use crate::adventure::{Adventure, Hint, Mission, Task};

/// Highest hint level.
pub const MAX_HINT_LEVEL: u8 = 3;

/// Where the learner is in an adventure.
///
/// `current_task_index` always points at the first task of the current
/// mission that is not complete. Once every mission is complete,
/// `current_mission_index` equals the number of missions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressState {
    pub current_mission_index: usize,
    pub current_task_index: usize,
    pub completed_tasks: IndexSet<String>,
    pub completed_missions: IndexSet<String>,
    /// Highest hint level revealed per task
    pub hints_used: IndexMap<String, u8>,
}

/// Something a command achieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    TaskCompleted {
        mission_id: String,
        task_id: String,
    },
    MissionCompleted {
        mission_id: String,
        /// The mission's closing message
        message: Option<String>,
    },
    AdventureCompleted {
        adventure_id: String,
    },
}

/// Compiled checks of one task.
#[derive(Debug)]
struct TaskCheck {
    pattern: Option<Regex>,
    validator: Option<Validator>,
    require_output: bool,
    /// A pattern or validator failed to parse; the task can never pass.
    broken: bool,
}

impl TaskCheck {
    fn compile(task: &Task) -> Self {
        let mut broken = false;

        let pattern = task.output_pattern.as_deref().and_then(|p| match Regex::new(p) {
            Ok(re) => Some(re),
            Err(_e) => {
                #[cfg(feature = "logging")]
                tracing::warn!(task = %task.id, error = %_e, "invalid outputPattern");
                broken = true;
                None
            }
        });

        let validator = task.output_check.as_deref().and_then(|name| {
            match Validator::parse(name, task.output_check_params.as_ref()) {
                Ok(v) => Some(v),
                Err(_e) => {
                    #[cfg(feature = "logging")]
                    tracing::warn!(task = %task.id, error = %_e, "invalid outputCheck");
                    broken = true;
                    None
                }
            }
        });

        Self {
            pattern,
            validator,
            require_output: task.require_output,
            broken,
        }
    }

    async fn passes(&self, ctx: &ValidationContext<'_>) -> bool {
        if self.broken {
            return false;
        }
        if self.require_output && ctx.stdout.trim().is_empty() {
            return false;
        }
        if let Some(pattern) = &self.pattern {
            if !pattern.is_match(ctx.output()) {
                return false;
            }
        }
        match &self.validator {
            Some(validator) => validator.evaluate(ctx).await,
            None => true,
        }
    }
}

/// Drives an adventure's progression.
pub struct ProgressTracker {
    adventure: Arc<Adventure>,
    state: ProgressState,
    checks: Vec<Vec<TaskCheck>>,
}

impl ProgressTracker {
    /// Start `adventure` from the beginning.
    ///
    /// Every pattern and validator is compiled here; a malformed one is
    /// logged once and leaves its task unsatisfiable.
    pub fn new(adventure: Arc<Adventure>) -> Self {
        let checks = adventure
            .missions
            .iter()
            .map(|m| m.tasks.iter().map(TaskCheck::compile).collect())
            .collect();
        Self {
            adventure,
            state: ProgressState::default(),
            checks,
        }
    }

    /// The adventure being played.
    pub fn adventure(&self) -> &Adventure {
        &self.adventure
    }

    /// Current progress.
    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    /// The mission being played, or `None` once the adventure is complete.
    pub fn current_mission(&self) -> Option<&Mission> {
        self.adventure.missions.get(self.state.current_mission_index)
    }

    /// The task the learner is shown.
    pub fn current_task(&self) -> Option<&Task> {
        self.current_mission()?
            .tasks
            .get(self.state.current_task_index)
    }

    /// Whether every mission is complete.
    pub fn is_finished(&self) -> bool {
        self.state.current_mission_index >= self.adventure.missions.len()
    }

    /// Score one command.
    ///
    /// Every incomplete task of the current mission is checked, not only the
    /// current one, so a command may complete a later task early.
    pub async fn record(&mut self, ctx: &ValidationContext<'_>) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        let Some(mission) = self.current_mission() else {
            return events;
        };
        let mission_index = self.state.current_mission_index;
        let mission_id = mission.id.clone();

        let mut passed = Vec::new();
        for (task, check) in mission.tasks.iter().zip(&self.checks[mission_index]) {
            if self.state.completed_tasks.contains(&task.id) {
                continue;
            }
            if check.passes(ctx).await {
                passed.push(task.id.clone());
            }
        }

        for task_id in passed {
            #[cfg(feature = "logging")]
            tracing::info!(mission = %mission_id, task = %task_id, "task completed");
            self.state.completed_tasks.insert(task_id.clone());
            events.push(ProgressEvent::TaskCompleted {
                mission_id: mission_id.clone(),
                task_id,
            });
        }

        if !events.is_empty() {
            self.advance(&mut events);
        }
        events
    }

    /// Move past completed tasks and missions, emitting mission and
    /// adventure completion.
    fn advance(&mut self, events: &mut Vec<ProgressEvent>) {
        while let Some(mission) = self.adventure.missions.get(self.state.current_mission_index) {
            let next_task = mission
                .tasks
                .iter()
                .position(|t| !self.state.completed_tasks.contains(&t.id));
            if let Some(index) = next_task {
                self.state.current_task_index = index;
                return;
            }

            if self.state.completed_missions.insert(mission.id.clone()) {
                #[cfg(feature = "logging")]
                tracing::info!(mission = %mission.id, "mission completed");
                events.push(ProgressEvent::MissionCompleted {
                    mission_id: mission.id.clone(),
                    message: mission.on_complete.clone(),
                });
            }
            self.state.current_mission_index += 1;
            self.state.current_task_index = 0;
        }

        events.push(ProgressEvent::AdventureCompleted {
            adventure_id: self.adventure.id.clone(),
        });
    }

    /// Reveal the next hint level of a task, up to level 3.
    ///
    /// Returns the hint at the new level, or the highest one the task has
    /// below it. `None` if the task is unknown or has no hints.
    pub fn reveal_hint(&mut self, task_id: &str) -> Option<Hint> {
        let (_, task) = self.adventure.find_task(task_id)?;
        if task.hints.is_empty() {
            return None;
        }
        let used = self.state.hints_used.get(task_id).copied().unwrap_or(0);
        let level = (used + 1).min(MAX_HINT_LEVEL);
        let hint = task
            .hints
            .iter()
            .filter(|h| h.level <= level)
            .max_by_key(|h| h.level)?
            .clone();
        self.state.hints_used.insert(task_id.to_string(), level);
        Some(hint)
    }

    /// Restore saved progress.
    ///
    /// Ids the adventure does not know are dropped. The current position and
    /// completed missions are recomputed from the completed tasks.
    pub fn restore(&mut self, saved: ProgressState) {
        let mut state = ProgressState::default();
        for task_id in saved.completed_tasks {
            if self.adventure.find_task(&task_id).is_some() {
                state.completed_tasks.insert(task_id);
            }
        }
        for (task_id, level) in saved.hints_used {
            if self.adventure.find_task(&task_id).is_some() {
                state.hints_used.insert(task_id, level.min(MAX_HINT_LEVEL));
            }
        }
        self.state = state;

        let mut ignored = Vec::new();
        self.advance(&mut ignored);
    }

    /// Back to the zero state.
    pub fn reset(&mut self) {
        self.state = ProgressState::default();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFs;

    fn adventure() -> Arc<Adventure> {
        Arc::new(
            Adventure::from_json(
                r#"{
                "id": "adv",
                "title": "Adventure",
                "missions": [
                    {"id": "m1", "title": "One", "onComplete": "Well done", "tasks": [
                        {"id": "pwd", "description": "pwd", "outputPattern": "^/home/student$",
                         "hints": [{"level": 1, "text": "print"}, {"level": 2, "text": "pwd"}]},
                        {"id": "ls", "description": "list", "outputCheck": "commandUsed",
                         "outputCheckParams": {"command": "ls"}}
                    ]},
                    {"id": "m2", "title": "Two", "tasks": [
                        {"id": "bad", "description": "broken", "outputPattern": "("},
                        {"id": "echo", "description": "echo", "outputCheck": "contains",
                         "outputCheckParams": {"text": "hi"}, "requireOutput": true}
                    ]}
                ]
            }"#,
            )
            .unwrap(),
        )
    }

    async fn run(tracker: &mut ProgressTracker, command: &str, stdout: &str) -> Vec<ProgressEvent> {
        let fs = InMemoryFs::new("student");
        let ctx = ValidationContext {
            command,
            stdout,
            stderr: "",
            exit_code: 0,
            cwd: "/home/student",
            username: "student",
            fs: &fs,
        };
        tracker.record(&ctx).await
    }

    #[tokio::test]
    async fn test_tasks_complete_in_order() {
        let mut tracker = ProgressTracker::new(adventure());
        assert_eq!(tracker.current_task().unwrap().id, "pwd");

        let events = run(&mut tracker, "pwd", "/home/student\n").await;
        assert_eq!(
            events,
            vec![ProgressEvent::TaskCompleted {
                mission_id: "m1".into(),
                task_id: "pwd".into()
            }]
        );
        assert_eq!(tracker.current_task().unwrap().id, "ls");

        let events = run(&mut tracker, "ls", "").await;
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1],
            ProgressEvent::MissionCompleted {
                mission_id: "m1".into(),
                message: Some("Well done".into())
            }
        );
        assert_eq!(tracker.current_mission().unwrap().id, "m2");
        assert_eq!(tracker.state().current_task_index, 0);
    }

    #[tokio::test]
    async fn test_later_task_can_complete_first() {
        let mut tracker = ProgressTracker::new(adventure());
        run(&mut tracker, "ls -l", "").await;
        assert!(tracker.state().completed_tasks.contains("ls"));
        assert_eq!(tracker.current_task().unwrap().id, "pwd");
    }

    #[tokio::test]
    async fn test_broken_task_never_passes() {
        let mut tracker = ProgressTracker::new(adventure());
        run(&mut tracker, "pwd", "/home/student\n").await;
        run(&mut tracker, "ls", "").await;

        let events = run(&mut tracker, "echo hi", "hi\n").await;
        assert_eq!(events.len(), 1);
        assert_eq!(tracker.current_task().unwrap().id, "bad");
        assert!(!tracker.is_finished());
    }

    #[tokio::test]
    async fn test_adventure_completion_is_terminal() {
        let mut tracker = ProgressTracker::new(adventure());
        let mut saved = ProgressState::default();
        saved.completed_tasks.extend(["pwd", "ls", "bad"].map(String::from));
        tracker.restore(saved);
        assert_eq!(tracker.current_task().unwrap().id, "echo");

        let events = run(&mut tracker, "echo hi", "hi\n").await;
        assert!(events.contains(&ProgressEvent::AdventureCompleted {
            adventure_id: "adv".into()
        }));
        assert!(tracker.is_finished());
        assert!(tracker.current_task().is_none());
        assert!(run(&mut tracker, "echo hi", "hi\n").await.is_empty());
    }

    #[test]
    fn test_hints_cap_at_three() {
        let mut tracker = ProgressTracker::new(adventure());
        assert_eq!(tracker.reveal_hint("pwd").unwrap().text, "print");
        assert_eq!(tracker.reveal_hint("pwd").unwrap().text, "pwd");
        assert_eq!(tracker.reveal_hint("pwd").unwrap().text, "pwd");
        assert_eq!(tracker.state().hints_used["pwd"], 3);
        assert_eq!(tracker.reveal_hint("pwd").unwrap().level, 2);
        assert_eq!(tracker.state().hints_used["pwd"], 3);
        assert!(tracker.reveal_hint("ls").is_none());
        assert!(tracker.reveal_hint("nope").is_none());
    }

    #[test]
    fn test_restore_drops_unknown_ids() {
        let mut tracker = ProgressTracker::new(adventure());
        let mut saved = ProgressState::default();
        saved.completed_tasks.extend(["pwd", "ghost"].map(String::from));
        saved.hints_used.insert("ghost".into(), 2);
        saved.current_mission_index = 7;
        tracker.restore(saved);

        assert_eq!(tracker.state().completed_tasks.len(), 1);
        assert!(tracker.state().hints_used.is_empty());
        assert_eq!(tracker.state().current_mission_index, 0);
        assert_eq!(tracker.current_task().unwrap().id, "ls");

        tracker.reset();
        assert_eq!(tracker.state(), &ProgressState::default());
    }
}
