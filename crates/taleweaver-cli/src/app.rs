use anyhow::Result;
use crossterm::style::Stylize;
use std::io::Write;
use taleweaver_core::{InputOutcome, Role, Session, Settings, TaleError, TurnEvent};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::theme::Theme;

type InputLines = Lines<BufReader<Stdin>>;

pub struct RunOptions {
    /// Theme for a new game; prompted for when absent.
    pub theme: Option<String>,
    /// Skip the offer to resume a saved game.
    pub fresh: bool,
    pub palette: Theme,
}

/// Play until end of input or Ctrl-C.
pub async fn run(settings: &Settings, mut options: RunOptions) -> Result<()> {
    let client = settings.build_client()?;
    let engine = settings.build_engine(client);
    let mut session = Session::new(engine, settings.save_file()?);
    let palette = options.palette.clone();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    if !bootstrap(&mut session, &mut lines, &mut options).await? {
        session.terminate();
        return Ok(());
    }

    println!(
        "{}",
        "Type a command to play. `save` and `load` manage your saved game; Ctrl-C quits."
            .with(palette.muted)
    );

    while let Some(line) = read_line(&mut lines, &palette).await? {
        if !play_line(&mut session, &line, &palette).await {
            break;
        }
    }

    session.terminate();
    println!();
    Ok(())
}

/// Resume a saved game or narrate a fresh opening scene.
/// Returns false if input ended before a game was started.
async fn bootstrap(
    session: &mut Session,
    lines: &mut InputLines,
    options: &mut RunOptions,
) -> Result<bool> {
    let palette = options.palette.clone();

    if !options.fresh && session.has_saved_game() {
        print_prompt("A saved adventure was found. Resume it? [Y/n] ", &palette);
        let Some(answer) = read_raw_line(lines).await? else {
            return Ok(false);
        };
        if is_affirmative(&answer) {
            match session.resume() {
                Ok(count) => {
                    notice(&format!("Resumed saved game ({count} messages)."), &palette);
                    replay_last_scene(session, &palette);
                    return Ok(true);
                }
                Err(e) => {
                    warn_user(&format!("{e}. Starting a new game instead."), &palette);
                }
            }
        }
    }

    loop {
        let theme = match options.theme.take() {
            Some(theme) => theme,
            None => {
                print_prompt("Choose a theme for your adventure: ", &palette);
                match read_raw_line(lines).await? {
                    Some(theme) => theme,
                    None => return Ok(false),
                }
            }
        };

        let (tx, renderer) = spawn_renderer(palette.clone());
        let result = tokio::select! {
            result = session.new_game(&theme, &tx) => Some(result),
            _ = tokio::signal::ctrl_c() => None,
        };
        drop(tx);
        let _ = renderer.await;

        match result {
            Some(Ok(_)) => return Ok(true),
            Some(Err(e)) => {
                if let Some(message) = error_notice(&e) {
                    warn_user(&message, &palette);
                }
            }
            None => return Ok(false),
        }
    }
}

/// Service one line of input. Returns false when the player interrupted.
async fn play_line(session: &mut Session, line: &str, palette: &Theme) -> bool {
    let (tx, renderer) = spawn_renderer(palette.clone());
    let result = tokio::select! {
        result = session.handle_input(line, &tx) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    drop(tx);
    let _ = renderer.await;

    match result {
        Some(Ok(InputOutcome::Saved { messages })) => {
            notice(
                &format!(
                    "Game saved ({messages} messages) to {}.",
                    session.save_file().path().display()
                ),
                palette,
            );
        }
        Some(Ok(InputOutcome::Loaded { messages })) => {
            notice(&format!("Game loaded ({messages} messages)."), palette);
            replay_last_scene(session, palette);
        }
        Some(Ok(InputOutcome::Narrated(_))) => {}
        Some(Err(e)) => {
            if let Some(message) = error_notice(&e) {
                warn_user(&message, palette);
            }
        }
        None => return false,
    }
    true
}

/// Print narration as it streams in. The task ends when the sender is dropped.
fn spawn_renderer(palette: Theme) -> (mpsc::UnboundedSender<TurnEvent>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<TurnEvent>();
    let handle = tokio::spawn(async move {
        let mut stdout = std::io::stdout();
        while let Some(event) = rx.recv().await {
            match event {
                TurnEvent::TextDelta(text) => {
                    let _ = write!(stdout, "{}", text.with(palette.narration));
                    let _ = stdout.flush();
                }
                TurnEvent::Retrying {
                    attempt,
                    max_attempts,
                    error,
                } => {
                    eprintln!(
                        "{}",
                        format!("[attempt {attempt}/{max_attempts} failed: {error}; retrying]")
                            .with(palette.muted)
                    );
                }
                TurnEvent::Compacting => {
                    tracing::debug!("compacting narration");
                }
                TurnEvent::Complete { .. } => {
                    let _ = writeln!(stdout);
                }
                TurnEvent::Error(_) => {
                    let _ = writeln!(stdout);
                }
            }
        }
    });
    (tx, handle)
}

fn replay_last_scene(session: &Session, palette: &Theme) {
    if let Some(last) = session
        .store()
        .iter()
        .rev()
        .find(|m| m.role == Role::Assistant)
    {
        println!("{}", last.content.as_str().with(palette.narration));
    }
}

/// What to tell the player about a failed input, if anything.
pub fn error_notice(error: &TaleError) -> Option<String> {
    match error {
        TaleError::InvalidInput(_) => None,
        TaleError::NotFound(_) => Some("No saved game found.".to_string()),
        TaleError::CorruptData(detail) => Some(format!("The saved game could not be read: {detail}")),
        TaleError::FatalService { .. } => Some(format!("{error}. Your last command was not recorded; try again.")),
        other => Some(format!("Error: {other}")),
    }
}

/// Empty answers default to yes.
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "" | "y" | "yes")
}

async fn read_line(lines: &mut InputLines, palette: &Theme) -> Result<Option<String>> {
    print_prompt("> ", palette);
    read_raw_line(lines).await
}

async fn read_raw_line(lines: &mut InputLines) -> Result<Option<String>> {
    tokio::select! {
        line = lines.next_line() => Ok(line?),
        _ = tokio::signal::ctrl_c() => Ok(None),
    }
}

fn print_prompt(prompt: &str, palette: &Theme) {
    print!("{}", prompt.with(palette.prompt));
    let _ = std::io::stdout().flush();
}

fn notice(message: &str, palette: &Theme) {
    println!("{}", message.with(palette.system));
}

fn warn_user(message: &str, palette: &Theme) {
    eprintln!("{}", message.with(palette.error));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_and_yes_answers_confirm() {
        assert!(is_affirmative(""));
        assert!(is_affirmative(" Y "));
        assert!(is_affirmative("yes"));
        assert!(!is_affirmative("n"));
        assert!(!is_affirmative("nope"));
    }
}
