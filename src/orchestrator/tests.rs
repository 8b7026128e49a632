use super::*;
use crate::abstractions::git::GitCall;
use crate::abstractions::{InMemoryFileSystem, MockAgent, MockGit, TaskOutcome};
use crate::orchestrator::runner::RunOutcome;
use crate::storage::InMemoryStore;
use std::path::PathBuf;

const PLAN_DOC: &str = "\
## Milestone m1: Setup
- [ ] 001: Initialize project
  - Verify: tree exists
  - Depends: none
- [ ] 002: Add configuration
  - Depends: 001
";

struct Fixture {
    orchestrator: ExecutionOrchestrator,
    store: Arc<InMemoryStore>,
    fs: Arc<InMemoryFileSystem>,
    git: Arc<MockGit>,
    agent: Arc<MockAgent>,
}

impl Fixture {
    async fn new(plan_doc: &str) -> Self {
        Self::with_parts(plan_doc, MockGit::new(), MockAgent::new(), Settings::default()).await
    }

    async fn with_parts(
        plan_doc: &str,
        git: MockGit,
        agent: MockAgent,
        settings: Settings,
    ) -> Self {
        let store = Arc::new(InMemoryStore::new());
        store
            .put_version(Version {
                id: "ver-1".to_string(),
                name: "v1".to_string(),
                project_name: "demo".to_string(),
                path: PathBuf::from("/work/demo"),
                dev_status: lifecycle::states::READY.to_string(),
            })
            .await;

        let fs = Arc::new(InMemoryFileSystem::new());
        if !plan_doc.is_empty() {
            fs.write(std::path::Path::new("/work/demo/PLAN.md"), plan_doc)
                .await
                .unwrap();
        }

        let git = Arc::new(git);
        let agent = Arc::new(agent);
        let orchestrator = ExecutionOrchestrator::new(
            store.clone(),
            store.clone(),
            fs.clone(),
            git.clone(),
            agent.clone(),
            settings,
        )
        .unwrap();

        Self {
            orchestrator,
            store,
            fs,
            git,
            agent,
        }
    }

    async fn version(&self) -> Version {
        VersionRepository::find_by_id(self.store.as_ref(), "ver-1")
            .await
            .unwrap()
            .unwrap()
    }

    async fn plan_doc(&self) -> String {
        self.fs
            .contents(std::path::Path::new("/work/demo/PLAN.md"))
            .await
            .unwrap()
    }

    /// Start, then force the execution into the paused state a failed
    /// task leaves behind.
    async fn start_paused_on(&self, task_id: &str) -> Execution {
        let execution = self.orchestrator.start("ver-1").await.unwrap();
        self.store
            .update_status(&execution.id, ExecutionStatus::Paused, None)
            .await
            .unwrap();
        self.store
            .update_progress(
                &execution.id,
                execution.completed_tasks,
                Some(task_id.to_string()),
                Some("agent failed".to_string()),
            )
            .await
            .unwrap();
        self.store.set_paused(&execution.id, true).await.unwrap();
        self.store
            .update_dev_status("ver-1", lifecycle::states::PAUSED)
            .await
            .unwrap();
        self.orchestrator.get_status(&execution.id).await.unwrap()
    }
}

mod start {
    use super::*;

    #[tokio::test]
    async fn creates_running_execution_with_snapshot() {
        let fx = Fixture::new(PLAN_DOC).await;
        let execution = fx.orchestrator.start("ver-1").await.unwrap();

        assert_eq!(execution.status, ExecutionStatus::Running);
        assert!(!execution.is_paused);
        assert_eq!(execution.total_tasks, 2);
        assert_eq!(execution.completed_tasks, 0);
        assert_eq!(execution.pre_execution_commit.as_deref(), Some("abc123"));
        assert_eq!(fx.version().await.dev_status, lifecycle::states::EXECUTING);

        // snapshot was allow-empty
        let calls = fx.git.calls().await;
        assert!(calls
            .iter()
            .any(|c| matches!(c, GitCall::Commit { allow_empty: true, .. })));
    }

    #[tokio::test]
    async fn is_idempotent_for_active_executions() {
        let fx = Fixture::new(PLAN_DOC).await;
        let first = fx.orchestrator.start("ver-1").await.unwrap();

        // a second start must not mint a new record, even though the
        // version is no longer ready
        let second = fx.orchestrator.start("ver-1").await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn requires_ready_version() {
        let fx = Fixture::new(PLAN_DOC).await;
        fx.store
            .update_dev_status("ver-1", lifecycle::states::DRAFTING)
            .await
            .unwrap();
        let err = fx.orchestrator.start("ver-1").await.unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[tokio::test]
    async fn rejects_empty_plan() {
        let fx = Fixture::new("").await;
        let err = fx.orchestrator.start("ver-1").await.unwrap_err();
        match err {
            Error::Validation { field, .. } => assert_eq!(field, "plan"),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn requires_available_agent() {
        let agent = MockAgent {
            available: false,
            ..MockAgent::new()
        };
        let fx = Fixture::with_parts(PLAN_DOC, MockGit::new(), agent, Settings::default()).await;
        let err = fx.orchestrator.start("ver-1").await.unwrap_err();
        match err {
            Error::Validation { field, .. } => assert_eq!(field, "agent"),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_version_is_not_found() {
        let fx = Fixture::new(PLAN_DOC).await;
        let err = fx.orchestrator.start("ver-999").await.unwrap_err();
        assert!(matches!(
            err,
            Error::NotFound {
                entity: "Version",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn empty_version_id_is_validation_error() {
        let fx = Fixture::new(PLAN_DOC).await;
        let err = fx.orchestrator.start("   ").await.unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[tokio::test]
    async fn dirty_tree_fails_without_auto_commit() {
        let settings = Settings {
            auto_commit: false,
            ..Settings::default()
        };
        let fx =
            Fixture::with_parts(PLAN_DOC, MockGit::new().with_changes(), MockAgent::new(), settings)
                .await;
        let err = fx.orchestrator.start("ver-1").await.unwrap_err();
        match err {
            Error::Validation { field, .. } => assert_eq!(field, "working_tree"),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn dirty_tree_auto_commits_when_configured() {
        let fx = Fixture::with_parts(
            PLAN_DOC,
            MockGit::new().with_changes(),
            MockAgent::new(),
            Settings::default(),
        )
        .await;
        let execution = fx.orchestrator.start("ver-1").await.unwrap();
        assert_eq!(execution.status, ExecutionStatus::Running);

        let calls = fx.git.calls().await;
        // dirty-tree hook commit plus the snapshot commit
        let commits = calls
            .iter()
            .filter(|c| matches!(c, GitCall::Commit { .. }))
            .count();
        assert_eq!(commits, 2);
    }

    #[tokio::test]
    async fn dirty_tree_fails_when_hook_disabled() {
        let mut settings = Settings::default();
        settings.hooks.before_execution.enabled = false;
        let fx =
            Fixture::with_parts(PLAN_DOC, MockGit::new().with_changes(), MockAgent::new(), settings)
                .await;
        let err = fx.orchestrator.start("ver-1").await.unwrap_err();
        match err {
            Error::Validation { field, .. } => assert_eq!(field, "working_tree"),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn snapshot_failure_is_swallowed() {
        let git = MockGit {
            fail_commit: true,
            ..MockGit::new()
        };
        let fx = Fixture::with_parts(PLAN_DOC, git, MockAgent::new(), Settings::default()).await;
        let execution = fx.orchestrator.start("ver-1").await.unwrap();
        assert_eq!(execution.status, ExecutionStatus::Running);
        assert!(execution.pre_execution_commit.is_none());
    }

    #[tokio::test]
    async fn concurrent_starts_share_one_execution() {
        let fx = Arc::new(Fixture::new(PLAN_DOC).await);
        let a = {
            let fx = fx.clone();
            tokio::spawn(async move { fx.orchestrator.start("ver-1").await })
        };
        let b = {
            let fx = fx.clone();
            tokio::spawn(async move { fx.orchestrator.start("ver-1").await })
        };
        let a = a.await.unwrap().unwrap();
        let b = b.await.unwrap().unwrap();
        assert_eq!(a.id, b.id);
    }
}

mod pause_resume {
    use super::*;

    #[tokio::test]
    async fn pause_sets_flag_only() {
        let fx = Fixture::new(PLAN_DOC).await;
        let execution = fx.orchestrator.start("ver-1").await.unwrap();

        let paused = fx.orchestrator.pause(&execution.id).await.unwrap();
        assert!(paused.is_paused);
        // status flip is the runner's job
        assert_eq!(paused.status, ExecutionStatus::Running);
    }

    #[tokio::test]
    async fn pause_requires_running() {
        let fx = Fixture::new(PLAN_DOC).await;
        let execution = fx.start_paused_on("001").await;
        let err = fx.orchestrator.pause(&execution.id).await.unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[tokio::test]
    async fn resume_clears_flag() {
        let fx = Fixture::new(PLAN_DOC).await;
        let execution = fx.orchestrator.start("ver-1").await.unwrap();
        fx.orchestrator.pause(&execution.id).await.unwrap();

        let resumed = fx.orchestrator.resume(&execution.id).await.unwrap();
        assert!(!resumed.is_paused);
    }

    #[tokio::test]
    async fn resume_after_persisted_pause_restores_running() {
        let fx = Fixture::new(PLAN_DOC).await;
        let execution = fx.orchestrator.start("ver-1").await.unwrap();
        fx.orchestrator.pause(&execution.id).await.unwrap();
        // the runner persists the pause on record and version
        assert_eq!(
            fx.orchestrator.run(&execution.id).await.unwrap(),
            RunOutcome::Paused
        );

        let resumed = fx.orchestrator.resume(&execution.id).await.unwrap();
        assert!(!resumed.is_paused);
        assert_eq!(resumed.status, ExecutionStatus::Running);
        assert_eq!(fx.version().await.dev_status, lifecycle::states::EXECUTING);

        // pause works again after a resume
        let paused = fx.orchestrator.pause(&execution.id).await.unwrap();
        assert!(paused.is_paused);
    }

    #[tokio::test]
    async fn resume_on_finished_execution_fails() {
        let fx = Fixture::new(PLAN_DOC).await;
        let execution = fx.orchestrator.start("ver-1").await.unwrap();
        fx.orchestrator.run(&execution.id).await.unwrap();

        let err = fx.orchestrator.resume(&execution.id).await.unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[tokio::test]
    async fn unknown_execution_is_not_found() {
        let fx = Fixture::new(PLAN_DOC).await;
        let err = fx.orchestrator.pause("nope").await.unwrap_err();
        assert!(matches!(
            err,
            Error::NotFound {
                entity: "Execution",
                ..
            }
        ));
    }
}

mod retry_skip {
    use super::*;

    #[tokio::test]
    async fn retry_requires_paused() {
        let fx = Fixture::new(PLAN_DOC).await;
        let execution = fx.orchestrator.start("ver-1").await.unwrap();
        let err = fx
            .orchestrator
            .retry(&execution.id, "001")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[tokio::test]
    async fn retry_resumes_the_version_and_clears_the_flag() {
        let fx = Fixture::new(PLAN_DOC).await;
        let execution = fx.start_paused_on("001").await;

        let retried = fx.orchestrator.retry(&execution.id, "001").await.unwrap();
        assert!(!retried.is_paused);
        assert_eq!(retried.status, ExecutionStatus::Running);
        assert_eq!(retried.current_task_id.as_deref(), Some("001"));
        assert!(retried.last_error.is_none());
        assert_eq!(fx.version().await.dev_status, lifecycle::states::EXECUTING);
    }

    #[tokio::test]
    async fn retry_accepts_flag_only_pause() {
        let fx = Fixture::new(PLAN_DOC).await;
        let execution = fx.orchestrator.start("ver-1").await.unwrap();
        fx.orchestrator.pause(&execution.id).await.unwrap();

        // status still running, flag set; version still executing
        let retried = fx.orchestrator.retry(&execution.id, "001").await.unwrap();
        assert!(!retried.is_paused);
        assert_eq!(fx.version().await.dev_status, lifecycle::states::EXECUTING);
    }

    #[tokio::test]
    async fn skip_marks_document_and_bumps_progress() {
        let fx = Fixture::new(PLAN_DOC).await;
        let execution = fx.start_paused_on("001").await;

        let skipped = fx.orchestrator.skip(&execution.id, "001").await.unwrap();
        assert!(!skipped.is_paused);
        assert_eq!(skipped.completed_tasks, 1);
        assert!(skipped.current_task_id.is_none());
        assert_eq!(fx.version().await.dev_status, lifecycle::states::EXECUTING);

        let doc = fx.plan_doc().await;
        assert!(doc.contains("- [-] 001: Initialize project"));
        // the other task's line is untouched
        assert!(doc.contains("- [ ] 002: Add configuration"));
    }

    #[tokio::test]
    async fn skip_unknown_task_is_not_found() {
        let fx = Fixture::new(PLAN_DOC).await;
        let execution = fx.start_paused_on("001").await;
        let err = fx
            .orchestrator
            .skip(&execution.id, "999")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "Task", .. }));
    }

    #[tokio::test]
    async fn empty_task_id_is_validation_error() {
        let fx = Fixture::new(PLAN_DOC).await;
        let execution = fx.start_paused_on("001").await;
        let err = fx.orchestrator.skip(&execution.id, " ").await.unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }
}

mod abort {
    use super::*;

    #[tokio::test]
    async fn rolls_back_and_closes_the_execution() {
        let fx = Fixture::new(PLAN_DOC).await;
        let execution = fx.orchestrator.start("ver-1").await.unwrap();

        let aborted = fx.orchestrator.abort(&execution.id).await.unwrap();
        assert_eq!(aborted.status, ExecutionStatus::Aborted);
        assert!(aborted.completed_at.is_some());
        assert!(!aborted.is_paused);
        assert_eq!(fx.version().await.dev_status, lifecycle::states::READY);

        let calls = fx.git.calls().await;
        assert!(calls.contains(&GitCall::ResetHard("abc123".to_string())));
    }

    #[tokio::test]
    async fn reset_failure_still_closes_the_execution() {
        let git = MockGit {
            fail_reset: Some("dirty tree".to_string()),
            ..MockGit::new()
        };
        let fx = Fixture::with_parts(PLAN_DOC, git, MockAgent::new(), Settings::default()).await;
        let execution = fx.orchestrator.start("ver-1").await.unwrap();

        let aborted = fx.orchestrator.abort(&execution.id).await.unwrap();
        assert_eq!(aborted.status, ExecutionStatus::Aborted);
    }

    #[tokio::test]
    async fn aborting_twice_fails() {
        let fx = Fixture::new(PLAN_DOC).await;
        let execution = fx.orchestrator.start("ver-1").await.unwrap();
        fx.orchestrator.abort(&execution.id).await.unwrap();
        let err = fx.orchestrator.abort(&execution.id).await.unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }
}

mod run_loop {
    use super::*;

    #[tokio::test]
    async fn runs_all_tasks_to_completion() {
        let fx = Fixture::new(PLAN_DOC).await;
        let execution = fx.orchestrator.start("ver-1").await.unwrap();

        let outcome = fx.orchestrator.run(&execution.id).await.unwrap();
        assert_eq!(outcome, RunOutcome::Completed);

        let finished = fx.orchestrator.get_status(&execution.id).await.unwrap();
        assert_eq!(finished.status, ExecutionStatus::Completed);
        assert_eq!(finished.completed_tasks, 2);
        assert!(finished.completed_at.is_some());
        assert!(finished.current_task_id.is_none());
        assert_eq!(fx.version().await.dev_status, lifecycle::states::COMPLETED);

        // dependency order respected
        assert_eq!(fx.agent.executed_tasks().await, vec!["001", "002"]);

        let doc = fx.plan_doc().await;
        assert!(doc.contains("- [x] 001:"));
        assert!(doc.contains("- [x] 002:"));
    }

    #[tokio::test]
    async fn task_failure_pauses_for_a_decision() {
        let fx = Fixture::new(PLAN_DOC).await;
        fx.agent.script(TaskOutcome::failure("compile error")).await;
        let execution = fx.orchestrator.start("ver-1").await.unwrap();

        let outcome = fx.orchestrator.run(&execution.id).await.unwrap();
        assert_eq!(
            outcome,
            RunOutcome::TaskFailed {
                task_id: "001".to_string(),
                error: Some("compile error".to_string()),
            }
        );

        let paused = fx.orchestrator.get_status(&execution.id).await.unwrap();
        assert_eq!(paused.status, ExecutionStatus::Paused);
        assert!(paused.is_paused);
        assert_eq!(paused.current_task_id.as_deref(), Some("001"));
        assert_eq!(paused.last_error.as_deref(), Some("compile error"));
        assert_eq!(fx.version().await.dev_status, lifecycle::states::PAUSED);

        // the document still shows the task pending
        assert!(fx.plan_doc().await.contains("- [ ] 001:"));
    }

    #[tokio::test]
    async fn retry_after_failure_completes() {
        let fx = Fixture::new(PLAN_DOC).await;
        fx.agent.script(TaskOutcome::failure("flaky")).await;
        let execution = fx.orchestrator.start("ver-1").await.unwrap();
        fx.orchestrator.run(&execution.id).await.unwrap();

        fx.orchestrator.retry(&execution.id, "001").await.unwrap();
        let outcome = fx.orchestrator.run(&execution.id).await.unwrap();
        assert_eq!(outcome, RunOutcome::Completed);
        // the failed task was attempted twice
        assert_eq!(fx.agent.executed_tasks().await, vec!["001", "001", "002"]);
    }

    #[tokio::test]
    async fn skip_after_failure_blocks_dependents() {
        let fx = Fixture::new(PLAN_DOC).await;
        fx.agent.script(TaskOutcome::failure("broken")).await;
        let execution = fx.orchestrator.start("ver-1").await.unwrap();
        fx.orchestrator.run(&execution.id).await.unwrap();

        fx.orchestrator.skip(&execution.id, "001").await.unwrap();
        // 002 depends on 001, and skipped does not satisfy
        let outcome = fx.orchestrator.run(&execution.id).await.unwrap();
        assert_eq!(
            outcome,
            RunOutcome::Blocked {
                task_id: Some("002".to_string()),
                blocked_by: vec!["001".to_string()],
            }
        );

        let paused = fx.orchestrator.get_status(&execution.id).await.unwrap();
        assert_eq!(paused.status, ExecutionStatus::Paused);
        assert_eq!(paused.current_task_id.as_deref(), Some("002"));
    }

    #[tokio::test]
    async fn pause_flag_stops_before_next_task() {
        let fx = Fixture::new(PLAN_DOC).await;
        let execution = fx.orchestrator.start("ver-1").await.unwrap();
        fx.orchestrator.pause(&execution.id).await.unwrap();

        let outcome = fx.orchestrator.run(&execution.id).await.unwrap();
        assert_eq!(outcome, RunOutcome::Paused);
        // nothing ran
        assert!(fx.agent.executed_tasks().await.is_empty());

        let paused = fx.orchestrator.get_status(&execution.id).await.unwrap();
        assert_eq!(paused.status, ExecutionStatus::Paused);
        assert_eq!(fx.version().await.dev_status, lifecycle::states::PAUSED);
    }

    #[tokio::test]
    async fn version_completes_after_pause_and_resume() {
        let fx = Fixture::new(PLAN_DOC).await;
        let execution = fx.orchestrator.start("ver-1").await.unwrap();
        fx.orchestrator.pause(&execution.id).await.unwrap();
        fx.orchestrator.run(&execution.id).await.unwrap();
        assert_eq!(fx.version().await.dev_status, lifecycle::states::PAUSED);

        fx.orchestrator.resume(&execution.id).await.unwrap();
        let outcome = fx.orchestrator.run(&execution.id).await.unwrap();
        assert_eq!(outcome, RunOutcome::Completed);

        let finished = fx.orchestrator.get_status(&execution.id).await.unwrap();
        assert_eq!(finished.status, ExecutionStatus::Completed);
        assert_eq!(fx.version().await.dev_status, lifecycle::states::COMPLETED);
    }

    #[tokio::test]
    async fn colon_less_tasks_run_to_completion() {
        let doc = "\
## Milestone m1: Setup
- [ ] set up the project with no id colon
- [ ] 002: Add configuration
  - Depends: 001
";
        let fx = Fixture::new(doc).await;
        let execution = fx.orchestrator.start("ver-1").await.unwrap();

        let outcome = fx.orchestrator.run(&execution.id).await.unwrap();
        assert_eq!(outcome, RunOutcome::Completed);
        assert_eq!(fx.agent.executed_tasks().await, vec!["001", "002"]);

        let updated = fx.plan_doc().await;
        assert!(updated.contains("- [x] set up the project with no id colon"));
        assert!(updated.contains("- [x] 002:"));
    }

    #[tokio::test]
    async fn skip_works_on_positional_id() {
        let doc = "\
- [ ] first task without an id
- [ ] 002: Dependent
  - Depends: 001
";
        let fx = Fixture::new(doc).await;
        let execution = fx.start_paused_on("001").await;

        fx.orchestrator.skip(&execution.id, "001").await.unwrap();
        assert!(fx
            .plan_doc()
            .await
            .contains("- [-] first task without an id"));
    }

    #[tokio::test]
    async fn run_on_finished_execution_fails() {
        let fx = Fixture::new(PLAN_DOC).await;
        let execution = fx.orchestrator.start("ver-1").await.unwrap();
        fx.orchestrator.run(&execution.id).await.unwrap();

        let err = fx.orchestrator.run(&execution.id).await.unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[tokio::test]
    async fn after_task_hook_commits_each_task() {
        let git = MockGit::new().with_changes();
        let fx = Fixture::with_parts(PLAN_DOC, git, MockAgent::new(), Settings::default()).await;
        let execution = fx.orchestrator.start("ver-1").await.unwrap();
        fx.orchestrator.run(&execution.id).await.unwrap();

        let calls = fx.git.calls().await;
        let hook_commits = calls
            .iter()
            .filter(|c| {
                matches!(c, GitCall::Commit { message, allow_empty: false }
                    if message.contains("task complete"))
            })
            .count();
        assert_eq!(hook_commits, 2);
        // milestone name rendered into the message
        assert!(calls.iter().any(|c| {
            matches!(c, GitCall::Commit { message, .. } if message.contains("(Setup)"))
        }));
    }
}
