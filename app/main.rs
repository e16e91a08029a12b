use std::{
    env::current_dir,
    io::{stdout, Write},
    path::{Path, PathBuf},
};

use clap::{Parser, Subcommand};
use lib::{
    commit::Commit,
    dot_rev::{CommitOutcome, DotRev, InitOutcome, StageOutcome},
    history::LogEntry,
    object::ObjectKind,
    object_id::ObjectId,
    object_store::ObjectStore,
    snapshot::Tree,
    Error,
};

#[derive(Parser, Debug)]
#[clap(about = "a minimal content-addressed revision store")]
struct Arguments {
    #[arg(long, global = true, help = "repository directory (defaults to ./.rev)")]
    repo: Option<PathBuf>,
    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[clap(about = "initialize a new repository")]
    Init,
    #[clap(about = "stage a file for the next commit")]
    Add {
        #[arg(help = "file to stage, relative to the current directory")]
        file: PathBuf,
    },
    #[clap(about = "commit the staged files")]
    Commit {
        #[arg(short, long, help = "message to leave with this commit")]
        message: String,
    },
    #[clap(about = "display the commit history")]
    Log {
        #[arg(long, help = "print the history as JSON")]
        json: bool,
    },
    #[clap(about = "print a stored object")]
    Show { id: String },
}

fn main() {
    env_logger::init();
    let args = Arguments::parse();
    std::process::exit(exit_status(run(args)));
}

/// Reports a failed command on stderr and returns the process exit status.
fn exit_status(result: Result<(), Error>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("{}", render_error(&err));
            1
        }
    }
}

fn render_error(err: &Error) -> String {
    format!("error: {}", err)
}

/// Command-line paths are relative to where the command runs, not to the repository.
fn resolve_input(cwd: &Path, file: &Path) -> PathBuf {
    if file.is_absolute() {
        file.to_path_buf()
    } else {
        cwd.join(file)
    }
}

fn render_init(outcome: &InitOutcome, root: &Path) -> String {
    match outcome {
        InitOutcome::Created => format!("Initialized empty repository in {}", root.display()),
        InitOutcome::Reinitialized => {
            format!("Reinitialized existing repository in {}", root.display())
        }
    }
}

fn render_stage(outcome: &StageOutcome, file: &Path) -> String {
    match outcome {
        StageOutcome::Staged(_) => format!("Staged {}", file.display()),
        StageOutcome::FileNotFound => format!("File not found: {}", file.display()),
    }
}

fn render_commit(outcome: &CommitOutcome, message: &str) -> String {
    match outcome {
        CommitOutcome::Committed { id, branch } => format!(
            "[{} {}] {}",
            branch.as_deref().unwrap_or("detached"),
            id.short(),
            message
        ),
        CommitOutcome::NothingToCommit => String::from("Nothing to commit, working tree clean."),
    }
}

fn render_log(entries: &[LogEntry]) -> String {
    if entries.is_empty() {
        return String::from("No commits yet.\n");
    }
    let mut out = String::new();
    for entry in entries {
        out.push_str(&format!("commit {}\n", entry.id));
        out.push_str(&format!("Author: {}\n", entry.author));
        out.push_str(&format!("Date:   {}\n", entry.date));
        out.push_str(&format!("\n    {}\n\n", entry.message.trim()));
    }
    out
}

fn run(args: Arguments) -> Result<(), Error> {
    let cwd = current_dir()?;
    let root = match args.repo {
        Some(repo) => repo,
        None => cwd.join(".rev"),
    };
    match args.cmd {
        Command::Init => {
            let (rev, outcome) = DotRev::init(root)?;
            println!("{}", render_init(&outcome, rev.root()));
        }
        Command::Add { file } => {
            let mut rev = DotRev::existing(root)?;
            let outcome = rev.stage(&resolve_input(&cwd, &file))?;
            match outcome {
                StageOutcome::Staged(_) => println!("{}", render_stage(&outcome, &file)),
                StageOutcome::FileNotFound => eprintln!("{}", render_stage(&outcome, &file)),
            }
        }
        Command::Commit { message } => {
            let mut rev = DotRev::existing(root)?;
            println!("{}", render_commit(&rev.commit(&message)?, &message));
        }
        Command::Log { json } => {
            let rev = DotRev::existing(root)?;
            let entries: Vec<LogEntry> = rev.log()?.collect::<Result<_, _>>()?;
            if json {
                serde_json::to_writer_pretty(stdout(), &entries)?;
                println!();
            } else {
                print!("{}", render_log(&entries));
            }
        }
        Command::Show { id } => {
            let rev = DotRev::existing(root)?;
            let id: ObjectId = id.parse()?;
            let object = rev.store().get(id)?;
            match object.kind {
                ObjectKind::Blob => stdout().write_all(&object.content)?,
                ObjectKind::Tree => {
                    for entry in Tree::decode(id, &object.content)?.entries {
                        println!("{} {} {}\t{}", entry.mode, entry.kind, entry.id, entry.path);
                    }
                }
                ObjectKind::Commit => {
                    // Decoded first so corrupt commits are reported rather than echoed.
                    Commit::decode(id, &object.content)?;
                    stdout().write_all(&object.content)?;
                }
            }
        }
    }
    Ok(())
}

#[test]
fn test_exit_status() {
    assert_eq!(exit_status(Ok(())), 0);
    let err = Error::NotARepository(PathBuf::from("/nowhere/.rev"));
    assert_eq!(render_error(&err), "error: not a repository: \"/nowhere/.rev\"");
    assert_eq!(exit_status(Err(err)), 1);
}

#[test]
fn test_resolve_input() {
    let cwd = Path::new("/work/sub");
    assert_eq!(resolve_input(cwd, Path::new("a.txt")), PathBuf::from("/work/sub/a.txt"));
    assert_eq!(resolve_input(cwd, Path::new("/etc/hosts")), PathBuf::from("/etc/hosts"));
}

#[test]
fn test_render_messages() {
    use lib::object_id::identify;

    let root = Path::new("/work/.rev");
    assert_eq!(
        render_init(&InitOutcome::Created, root),
        "Initialized empty repository in /work/.rev"
    );
    assert_eq!(
        render_init(&InitOutcome::Reinitialized, root),
        "Reinitialized existing repository in /work/.rev"
    );

    let file = Path::new("notes.txt");
    let blob = identify(ObjectKind::Blob, b"notes");
    assert_eq!(render_stage(&StageOutcome::Staged(blob), file), "Staged notes.txt");
    assert_eq!(
        render_stage(&StageOutcome::FileNotFound, file),
        "File not found: notes.txt"
    );

    let id = identify(ObjectKind::Commit, b"commit");
    let committed = CommitOutcome::Committed {
        id,
        branch: Some(String::from("master")),
    };
    assert_eq!(
        render_commit(&committed, "msg"),
        format!("[master {}] msg", id.short())
    );
    let detached = CommitOutcome::Committed { id, branch: None };
    assert_eq!(
        render_commit(&detached, "msg"),
        format!("[detached {}] msg", id.short())
    );
    assert_eq!(
        render_commit(&CommitOutcome::NothingToCommit, "msg"),
        "Nothing to commit, working tree clean."
    );
}

#[test]
fn test_render_log() {
    use lib::object_id::identify;

    assert_eq!(render_log(&[]), "No commits yet.\n");

    let id = identify(ObjectKind::Commit, b"second");
    let entry = LogEntry {
        id,
        tree: identify(ObjectKind::Tree, b""),
        parent: None,
        author: String::from("alice <alice@example.org>"),
        timestamp: 0,
        date: String::from("Thu Jan 01 00:00:00 1970 +0000"),
        message: String::from("add notes\n"),
    };
    assert_eq!(
        render_log(&[entry]),
        format!(
            "commit {}\nAuthor: alice <alice@example.org>\nDate:   Thu Jan 01 00:00:00 1970 +0000\n\n    add notes\n\n",
            id
        )
    );
}
