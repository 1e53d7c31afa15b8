//! `dropp` command-line shell.
//!
//! Composition root: builds the API client, session store and transfer
//! workflow explicitly and maps each subcommand onto workflow actions.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use dropp_client::api::{files, ApiClient};
use dropp_client::config::{Config, Overrides, SessionBackend};
use dropp_client::session::{FileSessionStore, SessionManager, SessionStore};
use dropp_client::transfer::{
    run_until_idle, Action, Completions, FileBrowser, NotificationLevel, TransferWorkflow,
};
use dropp_client::format_bytes;

#[derive(Parser, Debug)]
#[command(name = "dropp", version, about = "Client for the dropp file storage service")]
struct Args {
    /// API base URL (env: DROPP_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Directory downloads are saved to (env: DROPP_DOWNLOAD_DIR)
    #[arg(long, global = true)]
    download_dir: Option<PathBuf>,

    /// Session file path (env: DROPP_SESSION_FILE)
    #[arg(long, global = true)]
    session_file: Option<PathBuf>,

    /// Keep the session in the OS keychain instead of a file
    #[arg(long, global = true)]
    keychain: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the browser login URL
    Login,
    /// Complete login with the dropp://auth callback URL
    Auth { link: String },
    /// Forget the stored session
    Logout,
    /// Show whether a session is stored
    Status,
    /// List stored files
    Ls,
    /// Show storage usage
    Quota,
    /// Upload local files
    Upload {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Download files by id or name
    Download {
        #[arg(required = true)]
        files: Vec<String>,
    },
    /// Delete files by id
    Rm {
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    env_logger::init();

    let args = Args::parse();
    let config = Config::resolve(Overrides {
        api_url: args.api_url.clone(),
        download_dir: args.download_dir.clone(),
        session_file: args.session_file.clone(),
        keychain: args.keychain,
    });
    log::debug!("Resolved config: {:?}", config);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(args.command, config)) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn open_store(backend: &SessionBackend) -> dropp_client::Result<Arc<dyn SessionStore>> {
    match backend {
        SessionBackend::File(path) => Ok(Arc::new(FileSessionStore::new(path.clone()))),
        #[cfg(feature = "keychain")]
        SessionBackend::Keychain => Ok(Arc::new(
            dropp_client::session::KeychainSessionStore::new()?,
        )),
        #[cfg(not(feature = "keychain"))]
        SessionBackend::Keychain => Err(dropp_client::DroppError::SessionStore(
            "built without keychain support".into(),
        )),
    }
}

/// Returns `Ok(false)` when some action failed and was already reported.
async fn run(command: Command, config: Config) -> dropp_client::Result<bool> {
    let session = SessionManager::new(open_store(&config.session)?);

    match command {
        Command::Login => {
            println!("Open this URL in a browser to sign in:");
            println!("  {}", config.login_url);
            println!("Then run: dropp auth '<dropp://auth?... link>'");
            return Ok(true);
        }
        Command::Auth { link } => {
            let user_id = session.complete_login(&link)?;
            println!("Logged in as {}", user_id);
            return Ok(true);
        }
        Command::Logout => {
            session.clear_session()?;
            println!("Logged out");
            return Ok(true);
        }
        Command::Status => {
            match (session.is_logged_in(), session.get_user_id()) {
                (true, Some(user)) => println!("Logged in as {}", user),
                (true, None) => println!("Logged in"),
                (false, _) => println!("Not logged in"),
            }
            return Ok(true);
        }
        _ => {}
    }

    let api = Arc::new(ApiClient::new(&config.api_url)?);

    if let Command::Quota = command {
        let token = session.require_token()?;
        let quota = files::fetch_quota(&api, &token).await?;
        println!(
            "{} used of {} ({} available)",
            format_bytes(quota.used_bytes),
            format_bytes(quota.capacity_bytes),
            format_bytes(quota.available())
        );
        return Ok(true);
    }

    let (workflow, mut completions) = TransferWorkflow::new(api, session, config.download_dir);
    let mut browser = FileBrowser::new();

    let ok = match command {
        Command::Ls => {
            let ok = settle(&workflow, &mut completions, &mut browser, vec![Action::Refresh]).await;
            print_listing(&browser);
            ok
        }
        Command::Upload { paths } => {
            let actions = paths.into_iter().map(Action::UploadFile).collect();
            let ok = settle(&workflow, &mut completions, &mut browser, actions).await;
            if browser.refreshes_applied() > 0 {
                print_listing(&browser);
            }
            ok
        }
        Command::Download { files } => {
            // Resolve ids/names against a fresh listing first.
            if !settle(&workflow, &mut completions, &mut browser, vec![Action::Refresh]).await {
                return Ok(false);
            }
            let mut missing = false;
            let mut actions = Vec::new();
            for wanted in &files {
                match browser.find(wanted) {
                    Some(record) => actions.push(Action::Download(record.clone())),
                    None => {
                        eprintln!("No such file: {}", wanted);
                        missing = true;
                    }
                }
            }
            let ok = settle(&workflow, &mut completions, &mut browser, actions).await;
            ok && !missing
        }
        Command::Rm { ids } => {
            let actions = ids.into_iter().map(Action::Delete).collect();
            settle(&workflow, &mut completions, &mut browser, actions).await
        }
        Command::Login
        | Command::Auth { .. }
        | Command::Logout
        | Command::Status
        | Command::Quota => true,
    };

    Ok(ok)
}

/// Dispatch `actions`, wait for them and their follow-ups, print notifications.
///
/// Returns `false` if any notification was an error.
async fn settle(
    workflow: &TransferWorkflow,
    completions: &mut Completions,
    browser: &mut FileBrowser,
    actions: Vec<Action>,
) -> bool {
    for action in actions {
        browser.dispatch(workflow, action);
    }
    run_until_idle(workflow, completions, browser).await;

    let mut ok = true;
    for note in browser.take_notifications() {
        match note.level {
            NotificationLevel::Info => println!("{}", note.message),
            NotificationLevel::Error => {
                ok = false;
                eprintln!("{}", note.message);
            }
        }
    }
    ok
}

fn print_listing(browser: &FileBrowser) {
    if browser.files().is_empty() {
        println!("No files");
        return;
    }
    for file in browser.files() {
        println!("{:<26} {:>10}  {}", file.id, format_bytes(file.size), file.name);
    }
}
