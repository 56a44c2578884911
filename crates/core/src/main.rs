use std::io::{self, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cogito_core::config::AgentCfg;
use cogito_core::runtime::{Orchestrator, ShutdownGuard};
use cogito_core::types::{AgentResponse, UserPreferences};
use cogito_llm::provider::LlmProvider;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const SPINNER: [&str; 4] = ["-", "\\", "|", "/"];
const PROMPT: &str = "You> ";
const SETUP_QUESTIONS: [&str; 3] = [
    "What are your interests? (comma-separated) ",
    "Where are you located? ",
    "Favorite topics? (comma-separated) ",
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cfg = Arc::new(AgentCfg::from_env()?);
    let provider: Arc<dyn LlmProvider> = Arc::new(cfg.http_provider());
    let mut orchestrator = Orchestrator::new(cfg.clone(), provider);

    let shutdown = ShutdownGuard::new();
    shutdown.spawn_signal_listener();
    let token = shutdown.token();

    let (line_tx, mut line_rx) = mpsc::unbounded_channel::<InputEvent>();
    let (prompt_tx, prompt_rx) = std::sync::mpsc::channel::<String>();
    spawn_input_thread(line_tx, prompt_rx);

    println!("cogito ({}) - type 'exit' to quit, '/forget' to clear memory", cfg.model);

    let mut answers = Vec::with_capacity(SETUP_QUESTIONS.len());
    for question in SETUP_QUESTIONS {
        let Some(answer) = ask(&prompt_tx, &mut line_rx, question, &token).await else {
            return Ok(());
        };
        answers.push(answer);
    }
    let [likes, location, topics] = &answers[..] else {
        return Ok(());
    };
    orchestrator.set_preferences(UserPreferences::new(
        UserPreferences::parse_list(likes),
        location.trim(),
        UserPreferences::parse_list(topics),
    ))?;

    run_repl(&mut orchestrator, &prompt_tx, &mut line_rx, &token).await?;
    drop(prompt_tx);
    println!("Goodbye.");
    Ok(())
}

async fn run_repl(
    orchestrator: &mut Orchestrator,
    prompt_tx: &std::sync::mpsc::Sender<String>,
    line_rx: &mut mpsc::UnboundedReceiver<InputEvent>,
    token: &CancellationToken,
) -> anyhow::Result<()> {
    loop {
        let Some(line) = next_line(prompt_tx, line_rx, PROMPT, token).await else {
            break;
        };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if is_exit(text) {
            break;
        }
        if text == "/forget" {
            orchestrator.clear_memory();
            println!("Memory cleared.");
            continue;
        }

        let start = Instant::now();
        let fut = orchestrator.process(text);
        tokio::pin!(fut);
        let mut spinner_idx = 0usize;
        let mut spinner = tokio::time::interval(Duration::from_millis(100));
        spinner.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let result = loop {
            tokio::select! {
                result = &mut fut => break Some(result),
                _ = token.cancelled() => break None,
                _ = spinner.tick() => {
                    spinner_idx = (spinner_idx + 1) % SPINNER.len();
                    print!("\rthinking... {}", SPINNER[spinner_idx]);
                    io::stdout().flush()?;
                }
            }
        };
        clear_current_line()?;

        match result {
            Some(Ok(response)) => print_response(&response),
            Some(Err(e)) => {
                println!("Error: {e}");
                println!("Time: {:.2}s", start.elapsed().as_secs_f64());
            }
            None => break,
        }
    }
    Ok(())
}

fn is_exit(text: &str) -> bool {
    ["exit", "quit", "bye"]
        .iter()
        .any(|w| text.eq_ignore_ascii_case(w))
}

fn print_response(response: &AgentResponse) {
    match &response.action_error {
        Some(err) => println!("Action failed: {err}"),
        None => println!("{}", response.output_text()),
    }
    println!("Confidence: {:.2}", response.confidence);
    println!("Model: {}", response.model_used);
    println!("Time: {:.2}s", response.execution_time);
    println!("Reasoning steps:");
    for (i, step) in response.reasoning_chain.iter().enumerate() {
        println!("  {}. {step}", i + 1);
    }
}

async fn ask(
    prompt_tx: &std::sync::mpsc::Sender<String>,
    line_rx: &mut mpsc::UnboundedReceiver<InputEvent>,
    question: &str,
    token: &CancellationToken,
) -> Option<String> {
    loop {
        let line = next_line(prompt_tx, line_rx, question, token).await?;
        if !line.trim().is_empty() {
            return Some(line);
        }
    }
}

/// Ask the input thread for one line. `None` on EOF, Ctrl+C or shutdown.
async fn next_line(
    prompt_tx: &std::sync::mpsc::Sender<String>,
    line_rx: &mut mpsc::UnboundedReceiver<InputEvent>,
    prompt: &str,
    token: &CancellationToken,
) -> Option<String> {
    prompt_tx.send(prompt.to_owned()).ok()?;
    let event = tokio::select! {
        _ = token.cancelled() => return None,
        e = line_rx.recv() => e?,
    };
    match event {
        InputEvent::Line(line) => Some(line),
        InputEvent::Interrupted | InputEvent::Eof => None,
        InputEvent::Error(err) => {
            eprintln!("input error: {err}");
            None
        }
    }
}

fn clear_current_line() -> anyhow::Result<()> {
    print!("\r\x1b[2K");
    io::stdout().flush()?;
    Ok(())
}

/// Blocking readline loop; reads one line per prompt received.
fn spawn_input_thread(
    line_tx: mpsc::UnboundedSender<InputEvent>,
    prompt_rx: std::sync::mpsc::Receiver<String>,
) {
    std::thread::spawn(move || {
        let mut editor = match rustyline::DefaultEditor::new() {
            Ok(editor) => editor,
            Err(e) => {
                let _ = line_tx.send(InputEvent::Error(e.to_string()));
                return;
            }
        };

        while let Ok(prompt) = prompt_rx.recv() {
            match editor.readline(&prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        let _ = editor.add_history_entry(line.as_str());
                    }
                    if line_tx.send(InputEvent::Line(line)).is_err() {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    let _ = line_tx.send(InputEvent::Interrupted);
                    break;
                }
                Err(ReadlineError::Eof) => {
                    let _ = line_tx.send(InputEvent::Eof);
                    break;
                }
                Err(e) => {
                    let _ = line_tx.send(InputEvent::Error(e.to_string()));
                    break;
                }
            }
        }
    });
}

enum InputEvent {
    Line(String),
    Interrupted,
    Eof,
    Error(String),
}
