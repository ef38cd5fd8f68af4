//! The run / recover / retry loop behind `run`, `merge`, and `pull`.

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use dialoguer::Confirm;
use tracing::{debug, info};

use gitrecover_core::config::{ConflictPolicy, RecoverConfig};
use gitrecover_core::errors::ProcessError;
use gitrecover_core::git::{GitResetter, WorkTree};
use gitrecover_core::process::{GitRunner, OutputLine, ProcessExit, Stream};
use gitrecover_core::recovery::{
    ConfirmPrompt, Deleter, FileStatus, FsDeleter, RecoveryOutcome, RecoveryReport,
    RecoverySession, Resetter, StatusLookup,
};

use crate::prompt;
use crate::style;

/// One git command to run under recovery.
#[derive(Debug)]
pub struct RunOptions {
    pub args: Vec<String>,
    pub input: Option<String>,
    pub policy: ConflictPolicy,
}

// ---------------------------------------------------------------------------
// Seams
// ---------------------------------------------------------------------------

/// Runs the git command once, handing each output line to `sink`.
pub(crate) trait GitProcess {
    async fn run_once(
        &self,
        sink: &mut dyn FnMut(&OutputLine),
    ) -> Result<ProcessExit, ProcessError>;
}

/// The real command: echoes output to the terminal while streaming it.
struct LiveGit {
    runner: GitRunner,
    args: Vec<String>,
    input: Option<String>,
}

impl GitProcess for LiveGit {
    async fn run_once(
        &self,
        sink: &mut dyn FnMut(&OutputLine),
    ) -> Result<ProcessExit, ProcessError> {
        let exit = self
            .runner
            .run(&self.args, self.input.as_deref(), |line| {
                match line.stream {
                    Stream::Stdout => print!("{}", line.text),
                    Stream::Stderr => eprint!("{}", line.text),
                }
                sink(&line);
            })
            .await;
        if let Err(e) = std::io::stdout().flush() {
            debug!(error = %e, "failed to flush stdout");
        }
        exit
    }
}

/// Collaborators for one recovery, opened after git has exited.
pub(crate) struct Workspace {
    pub lookup: Box<dyn StatusLookup>,
    pub deleter: Box<dyn Deleter>,
    pub resetter: Box<dyn Resetter>,
}

// ---------------------------------------------------------------------------
// Loop
// ---------------------------------------------------------------------------

/// How the loop ended. Each variant carries git's last exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopEnd {
    /// Git exited without a recoverable conflict.
    Completed { exit: ProcessExit, retried: bool },
    /// The user declined recovery.
    Cancelled(ProcessExit),
    /// No listed path could be classified.
    NothingToRecover { exit: ProcessExit, excluded: usize },
    /// Recovered; re-running is switched off.
    Recovered(ProcessExit),
    /// Recovered, but another run would exceed `max_attempts`.
    AttemptLimit { exit: ProcessExit, attempts: u32 },
    /// Files stayed in use and no further try was requested.
    FilesInUse(ProcessExit),
}

impl LoopEnd {
    pub fn exit(&self) -> ProcessExit {
        match *self {
            Self::Completed { exit, .. }
            | Self::NothingToRecover { exit, .. }
            | Self::AttemptLimit { exit, .. } => exit,
            Self::Cancelled(exit) | Self::Recovered(exit) | Self::FilesInUse(exit) => exit,
        }
    }
}

/// Retry policy around a [`RecoverySession`].
pub(crate) struct RecoveryLoop<'a> {
    pub max_attempts: u32,
    pub auto_retry: bool,
    pub prompt: &'a dyn ConfirmPrompt,
    /// Asked after the files-in-use warning; `None` stops there.
    pub retry_in_use: Option<&'a dyn Fn() -> Result<bool>>,
}

impl RecoveryLoop<'_> {
    pub async fn drive<G: GitProcess>(
        &self,
        git: &G,
        open: &dyn Fn() -> Result<Workspace>,
    ) -> Result<LoopEnd> {
        let mut session = RecoverySession::new();

        loop {
            session.start_attempt()?;
            let exit = git
                .run_once(&mut |line: &OutputLine| session.feed_output(line))
                .await?;

            if !session.finish_attempt(&exit) {
                return Ok(LoopEnd::Completed {
                    exit,
                    retried: session.attempts() > 1,
                });
            }

            let workspace = open()?;
            print_blocked_paths(session.collected_paths(), workspace.lookup.as_ref());

            loop {
                let outcome = tokio::task::block_in_place(|| {
                    session.recover(
                        workspace.lookup.as_ref(),
                        self.prompt,
                        workspace.deleter.as_ref(),
                        workspace.resetter.as_ref(),
                    )
                })?;

                match outcome {
                    RecoveryOutcome::Cancelled => return Ok(LoopEnd::Cancelled(exit)),
                    RecoveryOutcome::NothingToRecover(plan) => {
                        return Ok(LoopEnd::NothingToRecover {
                            exit,
                            excluded: plan.lookup_failures.len(),
                        });
                    }
                    RecoveryOutcome::Retry(report) => {
                        print_report(&report);
                        if !self.auto_retry {
                            return Ok(LoopEnd::Recovered(exit));
                        }
                        if session.attempts() >= self.max_attempts {
                            return Ok(LoopEnd::AttemptLimit {
                                exit,
                                attempts: session.attempts(),
                            });
                        }
                        eprintln!("{}", style::success("Working tree recovered, retrying"));
                        info!(attempt = session.attempts() + 1, "retrying git command");
                        break;
                    }
                    RecoveryOutcome::AwaitingAcknowledgement(report) => {
                        print_report(&report);
                        if let Some(warning) = report.result.in_use_warning() {
                            eprintln!("{}", style::warn(&warning));
                        }
                        let again = match self.retry_in_use {
                            Some(ask) => ask()?,
                            None => false,
                        };
                        session.acknowledge();
                        if !again {
                            return Ok(LoopEnd::FilesInUse(exit));
                        }
                    }
                }
            }
        }
    }
}

/// Run the command, recovering from overwrite conflicts, and mirror git's
/// exit status.
pub async fn run_git(config: &RecoverConfig, work_dir: &Path, opts: RunOptions) -> Result<ExitCode> {
    let git = LiveGit {
        runner: GitRunner::new(&config.git.executable, work_dir),
        args: opts.args,
        input: opts.input,
    };
    let prompt = prompt::for_policy(opts.policy);
    let interactive = opts.policy == ConflictPolicy::Ask && console::user_attended();

    let confirm = || -> Result<bool> {
        Confirm::new()
            .with_prompt("Close those files, then try the recovery again?")
            .default(true)
            .interact()
            .context("failed to read confirmation")
    };
    let retry_in_use: Option<&dyn Fn() -> Result<bool>> =
        if interactive { Some(&confirm) } else { None };

    let open = || -> Result<Workspace> {
        let worktree = WorkTree::open(work_dir).context("failed to open git repository")?;
        let workdir = worktree.workdir().to_path_buf();
        Ok(Workspace {
            deleter: Box::new(FsDeleter::new(&workdir)),
            resetter: Box::new(GitResetter::new(&config.git.executable, &workdir)),
            lookup: Box::new(worktree),
        })
    };

    let recovery = RecoveryLoop {
        max_attempts: config.recovery.max_attempts,
        auto_retry: config.recovery.auto_retry,
        prompt: prompt.as_ref(),
        retry_in_use,
    };
    let end = recovery
        .drive(&git, &open)
        .await
        .with_context(|| format!("failed to run {}", git.runner.program()))?;

    print_end(&end, work_dir);
    Ok(exit_code(&end.exit()))
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Show what git refused to overwrite.
fn print_blocked_paths(paths: &[String], lookup: &dyn StatusLookup) {
    eprintln!();
    eprintln!(
        "{}",
        style::header(&format!("Files blocking this command ({})", paths.len()))
    );

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Path", "Status"]);

    for path in paths {
        let status = match lookup.status(path) {
            Ok(FileStatus::Tracked) => style::tracked(),
            Ok(FileStatus::New) => style::new_file(),
            Err(e) => {
                debug!(path = %path, error = %e, "status lookup failed");
                style::dim("unknown")
            }
        };
        table.add_row(vec![Cell::new(path), Cell::new(status)]);
    }

    eprintln!("{}", table);
    eprintln!();
}

fn print_report(report: &RecoveryReport) {
    if !report.result.output.is_empty() {
        eprint!("{}", report.result.output);
        if !report.result.output.ends_with('\n') {
            eprintln!();
        }
    }
    if !report.result.deleted.is_empty() {
        eprintln!(
            "{}",
            style::dim(&format!("Deleted {} new file(s)", report.result.deleted.len()))
        );
    }
}

fn print_end(end: &LoopEnd, work_dir: &Path) {
    match *end {
        LoopEnd::Completed { exit, retried } => {
            if exit.success && retried {
                print_head(work_dir);
            }
        }
        LoopEnd::Cancelled(_) => {
            eprintln!("{}", style::dim("Recovery cancelled. Nothing was changed."));
        }
        LoopEnd::NothingToRecover { excluded, .. } => eprintln!(
            "{}",
            style::warn(&format!(
                "None of the {} listed path(s) could be found in the repository; nothing to recover",
                excluded
            ))
        ),
        LoopEnd::Recovered(_) => eprintln!(
            "{}",
            style::success("Working tree recovered. Re-run the command to continue.")
        ),
        LoopEnd::AttemptLimit { attempts, .. } => eprintln!(
            "{}",
            style::warn(&format!(
                "Working tree recovered, but {} attempt(s) is the limit. Re-run the command to continue.",
                attempts
            ))
        ),
        LoopEnd::FilesInUse(_) => eprintln!(
            "{}",
            style::dim("Close the files listed above and re-run the command.")
        ),
    }
}

fn print_head(work_dir: &Path) {
    match WorkTree::open(work_dir).and_then(|wt| wt.head_commit()) {
        Ok(commit) => eprintln!(
            "{}",
            style::dim(&format!(
                "HEAD is now at {} {} ({})",
                commit.short_id(),
                commit.subject(),
                commit.author()
            ))
        ),
        Err(e) => debug!(error = %e, "could not read HEAD"),
    }
}

fn exit_code(exit: &ProcessExit) -> ExitCode {
    ExitCode::from(exit_status(exit))
}

/// Git's exit status as a process exit byte; signals and out-of-range
/// codes become 1.
fn exit_status(exit: &ProcessExit) -> u8 {
    exit.code
        .and_then(|code| u8::try_from(code).ok())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitrecover_core::errors::{DeleteError, StatusLookupError};
    use gitrecover_core::recovery::{FixedChoice, UserChoice};
    use std::cell::{Cell as StdCell, RefCell};
    use std::collections::VecDeque;
    use std::rc::Rc;

    // -- transcripts --------------------------------------------------------

    fn exit(code: i32) -> ProcessExit {
        ProcessExit {
            code: Some(code),
            success: code == 0,
        }
    }

    fn err(text: &str) -> OutputLine {
        OutputLine {
            stream: Stream::Stderr,
            text: format!("{}\n", text),
        }
    }

    fn out(text: &str) -> OutputLine {
        OutputLine {
            stream: Stream::Stdout,
            text: format!("{}\n", text),
        }
    }

    /// git refusing to merge over `a.txt` and `new.txt`, with stdout
    /// arriving in the middle of the stderr blocks.
    fn blocked() -> (Vec<OutputLine>, ProcessExit) {
        let lines = vec![
            err("error: Your local changes to the following files would be overwritten by merge:"),
            err("\ta.txt"),
            out("Updating 1a2b3c4..5d6e7f8"),
            err("Please commit your changes or stash them before you merge."),
            err("error: The following untracked working tree files would be overwritten by merge:"),
            err("\tnew.txt"),
            err("Please move or remove them before you merge."),
            err("Aborting"),
        ];
        (lines, exit(128))
    }

    fn merged() -> (Vec<OutputLine>, ProcessExit) {
        (vec![out("Fast-forward"), out(" a.txt | 2 +-")], exit(0))
    }

    // -- fakes --------------------------------------------------------------

    struct ScriptedGit {
        runs: RefCell<VecDeque<(Vec<OutputLine>, ProcessExit)>>,
        started: StdCell<usize>,
    }

    impl ScriptedGit {
        fn new(runs: Vec<(Vec<OutputLine>, ProcessExit)>) -> Self {
            Self {
                runs: RefCell::new(runs.into()),
                started: StdCell::new(0),
            }
        }
    }

    impl GitProcess for ScriptedGit {
        async fn run_once(
            &self,
            sink: &mut dyn FnMut(&OutputLine),
        ) -> Result<ProcessExit, ProcessError> {
            self.started.set(self.started.get() + 1);
            let (lines, exit) = self
                .runs
                .borrow_mut()
                .pop_front()
                .expect("git run more often than scripted");
            for line in &lines {
                sink(line);
            }
            Ok(exit)
        }
    }

    struct Lookup;
    impl StatusLookup for Lookup {
        fn status(&self, path: &str) -> Result<FileStatus, StatusLookupError> {
            match path {
                "new.txt" => Ok(FileStatus::New),
                "a.txt" => Ok(FileStatus::Tracked),
                other => Err(StatusLookupError::NotFound(other.into())),
            }
        }
    }

    struct NoLookup;
    impl StatusLookup for NoLookup {
        fn status(&self, path: &str) -> Result<FileStatus, StatusLookupError> {
            Err(StatusLookupError::NotFound(path.into()))
        }
    }

    #[derive(Clone, Default)]
    struct Record {
        deletes: Rc<RefCell<Vec<String>>>,
        resets: Rc<RefCell<Vec<Vec<String>>>>,
        locked: Rc<StdCell<bool>>,
    }

    struct Deletes(Record);
    impl Deleter for Deletes {
        fn delete(&self, path: &str) -> Result<(), DeleteError> {
            self.0.deletes.borrow_mut().push(path.to_string());
            if self.0.locked.get() {
                Err(DeleteError::from_io(path, std::io::Error::other("in use")))
            } else {
                Ok(())
            }
        }
    }

    struct Resets(Record);
    impl Resetter for Resets {
        fn reset(&self, paths: &[String]) -> String {
            self.0.resets.borrow_mut().push(paths.to_vec());
            "Updated 1 path from the index\n".into()
        }
    }

    fn opener(record: &Record) -> impl Fn() -> Result<Workspace> + '_ {
        move || {
            Ok(Workspace {
                lookup: Box::new(Lookup),
                deleter: Box::new(Deletes(record.clone())),
                resetter: Box::new(Resets(record.clone())),
            })
        }
    }

    fn recovery(prompt: &FixedChoice, max_attempts: u32, auto_retry: bool) -> RecoveryLoop<'_> {
        RecoveryLoop {
            max_attempts,
            auto_retry,
            prompt,
            retry_in_use: None,
        }
    }

    const RESET_AND_DELETE: FixedChoice = FixedChoice(UserChoice::ResetAndDelete);

    // -- tests --------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread")]
    async fn test_retries_after_clean_recovery() {
        let git = ScriptedGit::new(vec![blocked(), merged()]);
        let record = Record::default();

        let end = recovery(&RESET_AND_DELETE, 3, true)
            .drive(&git, &opener(&record))
            .await
            .unwrap();

        assert_eq!(
            end,
            LoopEnd::Completed {
                exit: exit(0),
                retried: true
            }
        );
        assert_eq!(git.started.get(), 2);
        assert_eq!(*record.deletes.borrow(), ["new.txt"]);
        // Stdout chatter inside the block is not a path.
        assert_eq!(*record.resets.borrow(), vec![vec!["a.txt".to_string()]]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_clean_run_is_not_a_retry() {
        let git = ScriptedGit::new(vec![merged()]);
        let record = Record::default();

        let end = recovery(&RESET_AND_DELETE, 3, true)
            .drive(&git, &opener(&record))
            .await
            .unwrap();

        assert_eq!(
            end,
            LoopEnd::Completed {
                exit: exit(0),
                retried: false
            }
        );
        assert!(record.resets.borrow().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_auto_retry_off_stops_after_recovery() {
        let git = ScriptedGit::new(vec![blocked()]);
        let record = Record::default();

        let end = recovery(&RESET_AND_DELETE, 3, false)
            .drive(&git, &opener(&record))
            .await
            .unwrap();

        assert_eq!(end, LoopEnd::Recovered(exit(128)));
        assert_eq!(git.started.get(), 1);
        assert_eq!(record.resets.borrow().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_single_attempt_still_offers_recovery() {
        let git = ScriptedGit::new(vec![blocked()]);
        let record = Record::default();

        let end = recovery(&RESET_AND_DELETE, 1, true)
            .drive(&git, &opener(&record))
            .await
            .unwrap();

        assert_eq!(
            end,
            LoopEnd::AttemptLimit {
                exit: exit(128),
                attempts: 1
            }
        );
        assert_eq!(git.started.get(), 1);
        assert_eq!(record.resets.borrow().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_gives_up_at_attempt_limit() {
        let git = ScriptedGit::new(vec![blocked(), blocked()]);
        let record = Record::default();

        let end = recovery(&RESET_AND_DELETE, 2, true)
            .drive(&git, &opener(&record))
            .await
            .unwrap();

        assert_eq!(
            end,
            LoopEnd::AttemptLimit {
                exit: exit(128),
                attempts: 2
            }
        );
        assert_eq!(git.started.get(), 2);
        assert_eq!(record.resets.borrow().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cancel_keeps_git_exit_status() {
        let git = ScriptedGit::new(vec![blocked()]);
        let record = Record::default();
        let cancel = FixedChoice(UserChoice::Cancel);

        let end = recovery(&cancel, 3, true)
            .drive(&git, &opener(&record))
            .await
            .unwrap();

        assert_eq!(end, LoopEnd::Cancelled(exit(128)));
        assert_eq!(exit_status(&end.exit()), 128);
        assert!(record.resets.borrow().is_empty());
        assert!(record.deletes.borrow().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_nothing_to_recover() {
        let git = ScriptedGit::new(vec![blocked()]);
        let record = Record::default();
        let open = || -> Result<Workspace> {
            Ok(Workspace {
                lookup: Box::new(NoLookup),
                deleter: Box::new(Deletes(record.clone())),
                resetter: Box::new(Resets(record.clone())),
            })
        };

        let end = recovery(&RESET_AND_DELETE, 3, true)
            .drive(&git, &open)
            .await
            .unwrap();

        assert_eq!(
            end,
            LoopEnd::NothingToRecover {
                exit: exit(128),
                excluded: 2
            }
        );
        assert!(record.resets.borrow().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_files_in_use_stop_without_prompt() {
        let git = ScriptedGit::new(vec![blocked()]);
        let record = Record::default();
        record.locked.set(true);

        let end = recovery(&RESET_AND_DELETE, 3, true)
            .drive(&git, &opener(&record))
            .await
            .unwrap();

        assert_eq!(end, LoopEnd::FilesInUse(exit(128)));
        assert_eq!(git.started.get(), 1);
        // Tracked files are still reset.
        assert_eq!(record.resets.borrow().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_files_in_use_retry_after_confirmation() {
        let git = ScriptedGit::new(vec![blocked(), merged()]);
        let record = Record::default();
        record.locked.set(true);

        let asked = StdCell::new(0);
        let confirm = || -> Result<bool> {
            asked.set(asked.get() + 1);
            record.locked.set(false);
            Ok(true)
        };
        let recovery = RecoveryLoop {
            max_attempts: 3,
            auto_retry: true,
            prompt: &RESET_AND_DELETE,
            retry_in_use: Some(&confirm),
        };

        let end = recovery.drive(&git, &opener(&record)).await.unwrap();

        assert_eq!(
            end,
            LoopEnd::Completed {
                exit: exit(0),
                retried: true
            }
        );
        assert_eq!(asked.get(), 1);
        assert_eq!(*record.deletes.borrow(), ["new.txt", "new.txt"]);
        assert_eq!(record.resets.borrow().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_files_in_use_declined() {
        let git = ScriptedGit::new(vec![blocked()]);
        let record = Record::default();
        record.locked.set(true);

        let decline = || -> Result<bool> { Ok(false) };
        let recovery = RecoveryLoop {
            max_attempts: 3,
            auto_retry: true,
            prompt: &RESET_AND_DELETE,
            retry_in_use: Some(&decline),
        };

        let end = recovery.drive(&git, &opener(&record)).await.unwrap();
        assert_eq!(end, LoopEnd::FilesInUse(exit(128)));
        assert_eq!(git.started.get(), 1);
    }

    #[test]
    fn test_exit_status_mirrors_git() {
        assert_eq!(exit_status(&exit(0)), 0);
        assert_eq!(exit_status(&exit(128)), 128);
        assert_eq!(exit_status(&exit(-1)), 1);
        assert_eq!(
            exit_status(&ProcessExit {
                code: None,
                success: false
            }),
            1
        );
    }
}
