use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use cosmic_ai::chat::{Intent, SessionController, SessionHandle, SessionRuntime, SessionSnapshot};
use cosmic_ai::console::{
    ConsoleCommand, HELP_TEXT, TranscriptPrinter, parse_line, write_conversation_list,
};
use cosmic_ai::settings::{CosmicSettings, SettingsStore};

/// Prompt submitted once at start-up, as if typed by the user.
const INITIAL_PROMPT_ENV: &str = "COSMIC_INITIAL_PROMPT";
/// Snapshots buffered for the transcript printer before the session waits on it.
const SNAPSHOT_FEED_CAPACITY: usize = 64;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Logs go to stderr so they never interleave with the transcript.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = SettingsStore::load().unwrap_or_else(|error| {
        tracing::error!(error = %error, "failed to load settings, using defaults");
        CosmicSettings::default()
    });

    let controller = SessionController::from_settings(&settings);
    let (mut runtime, handle) = SessionRuntime::new(controller);
    let feed = runtime.snapshot_feed(SNAPSHOT_FEED_CAPACITY);
    let session = tokio::spawn(runtime.run());
    let printer = tokio::spawn(print_snapshots(feed));

    if let Some(prompt) = std::env::var(INITIAL_PROMPT_ENV)
        .ok()
        .filter(|prompt| !prompt.trim().is_empty())
    {
        handle.dispatch(Intent::SetDraft(prompt.clone()));
        handle.send(prompt);
    }

    let quit_requested = read_input(&handle).await;
    drop(handle);
    if quit_requested {
        return;
    }

    // End of input: let replies still streaming finish before exiting.
    if let Err(error) = session.await {
        tracing::error!(error = %error, "session loop panicked");
    }
    if let Err(error) = printer.await {
        tracing::error!(error = %error, "transcript printer panicked");
    }
}

/// Forwards input lines until end of input; returns true when the user asked to quit.
async fn read_input(handle: &SessionHandle) -> bool {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return false,
            Err(error) => {
                tracing::error!(error = %error, "failed to read input");
                return false;
            }
        };

        match parse_line(&line) {
            ConsoleCommand::Session(intent) => {
                if !handle.dispatch(intent) {
                    return false;
                }
            }
            ConsoleCommand::List => {
                let mut stdout = std::io::stdout().lock();
                if let Err(error) = write_conversation_list(&handle.current(), &mut stdout) {
                    tracing::warn!(error = %error, "failed to write conversation list");
                }
            }
            ConsoleCommand::Help => println!("{HELP_TEXT}"),
            ConsoleCommand::Quit => return true,
            ConsoleCommand::Invalid(message) => println!("{message}"),
        }
    }
}

/// Renders every snapshot until the session loop stops.
async fn print_snapshots(mut feed: mpsc::Receiver<SessionSnapshot>) {
    let mut printer = TranscriptPrinter::new();

    while let Some(snapshot) = feed.recv().await {
        // The lock must not be held across the next `recv`.
        {
            let mut stdout = std::io::stdout().lock();
            if let Err(error) = printer.render(&snapshot, &mut stdout) {
                tracing::warn!(error = %error, "failed to render transcript");
            }
        }
    }
}
