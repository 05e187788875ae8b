use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use agent_console::ui::{self, InputCommand};
use agent_console::voice::{AudioCapture, AudioPlayer, Microphone, SilentPlayer, SpeakerPlayer};
use agent_console::{
    ActionOutcome, AgentDraft, AgentPatch, Config, Error, HttpGateway, Orchestrator,
};

/// Agent Console - chat with AI agents by text or voice
#[derive(Parser)]
#[command(name = "agent-console", version, about)]
struct Cli {
    /// Backend base URL (e.g. "http://localhost:8000")
    #[arg(long, env = "AGENT_CONSOLE_BACKEND_URL")]
    backend_url: Option<String>,

    /// Config file to load instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage agents
    Agents {
        #[command(subcommand)]
        action: AgentsCommand,
    },
    /// Manage an agent's sessions
    Sessions {
        /// Agent ID
        agent: String,
        #[command(subcommand)]
        action: SessionsCommand,
    },
    /// Interactive chat
    Chat {
        /// Agent to select on start
        #[arg(short, long)]
        agent: Option<String>,
        /// Session to open on start (requires --agent)
        #[arg(short, long, requires = "agent")]
        session: Option<String>,
    },
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
        /// Write the recording to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum AgentsCommand {
    /// List agents
    List,
    /// Show one agent
    Show {
        /// Agent ID
        id: String,
    },
    /// Create an agent
    Create {
        /// Display name
        #[arg(short, long)]
        name: String,
        /// Instruction text
        #[arg(short, long)]
        prompt: String,
    },
    /// Update an agent
    Update {
        /// Agent ID
        id: String,
        /// New display name
        #[arg(short, long)]
        name: Option<String>,
        /// New instruction text
        #[arg(short, long)]
        prompt: Option<String>,
    },
    /// Delete an agent and its sessions
    Delete {
        /// Agent ID
        id: String,
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum SessionsCommand {
    /// List sessions
    List,
    /// Create a session
    Create {
        /// Session title (generated by the backend when omitted)
        #[arg(short, long)]
        title: Option<String>,
    },
    /// Delete a session
    Delete {
        /// Session ID
        id: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,agent_console=info",
        1 => "info,agent_console=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(url) = cli.backend_url {
        config = config.with_backend_url(url);
        config.validate()?;
    }
    tracing::debug!(backend = %config.backend.base_url, "loaded configuration");

    match cli.command {
        Command::Agents { action } => agents(&build_orchestrator(&config)?, action).await,
        Command::Sessions { agent, action } => {
            sessions(&build_orchestrator(&config)?, &agent, action).await
        }
        Command::Chat { agent, session } => {
            chat(&config, agent.as_deref(), session.as_deref()).await
        }
        Command::TestMic { duration, output } => test_mic(&config, duration, output).await,
    }
}

fn build_orchestrator(config: &Config) -> anyhow::Result<Orchestrator> {
    let gateway = Arc::new(HttpGateway::new(&config.backend)?);
    let player: Arc<dyn AudioPlayer> = if config.playback.enabled {
        Arc::new(SpeakerPlayer::new(&config.backend.base_url)?)
    } else {
        Arc::new(SilentPlayer)
    };
    Ok(Orchestrator::new(gateway, player))
}

/// Turn a failed outcome into an error for one-shot commands
fn expect_applied(orchestrator: &Orchestrator, outcome: ActionOutcome) -> anyhow::Result<()> {
    match outcome {
        ActionOutcome::Applied => Ok(()),
        ActionOutcome::Failed => {
            let error = orchestrator
                .snapshot()
                .last_error
                .map_or_else(|| "unknown error".to_string(), |e| e.to_string());
            anyhow::bail!(error)
        }
        ActionOutcome::Ignored => anyhow::bail!("nothing to do"),
        ActionOutcome::Stale => anyhow::bail!("result superseded by a newer request"),
    }
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}

async fn agents(orchestrator: &Orchestrator, action: AgentsCommand) -> anyhow::Result<()> {
    match action {
        AgentsCommand::List => {
            expect_applied(orchestrator, orchestrator.load_agents().await)?;
            print_lines(&ui::render_agents(&orchestrator.snapshot()));
        }
        AgentsCommand::Show { id } => {
            let agent = orchestrator.gateway().get_agent(&id).await?;
            println!("id:     {}", agent.id);
            println!("name:   {}", agent.name);
            if let Some(created) = agent.created_at {
                println!("created: {}", created.to_rfc3339());
            }
            println!("prompt:\n{}", agent.prompt);
        }
        AgentsCommand::Create { name, prompt } => {
            let outcome = orchestrator.create_agent(AgentDraft { name, prompt }).await;
            expect_applied(orchestrator, outcome)?;
            print_lines(&ui::render_agents(&orchestrator.snapshot()));
        }
        AgentsCommand::Update { id, name, prompt } => {
            let patch = AgentPatch { name, prompt };
            if patch.is_empty() {
                anyhow::bail!("nothing to update: pass --name and/or --prompt");
            }
            expect_applied(orchestrator, orchestrator.update_agent(&id, patch).await)?;
            print_lines(&ui::render_agents(&orchestrator.snapshot()));
        }
        AgentsCommand::Delete { id, yes } => {
            let confirmed = yes
                || dialoguer::Confirm::new()
                    .with_prompt(format!("Delete agent {id} and all its sessions?"))
                    .default(false)
                    .interact()?;
            if !confirmed {
                println!("Aborted");
                return Ok(());
            }
            expect_applied(orchestrator, orchestrator.delete_agent(&id).await)?;
            println!("Deleted agent {id}");
        }
    }
    Ok(())
}

async fn sessions(
    orchestrator: &Orchestrator,
    agent_id: &str,
    action: SessionsCommand,
) -> anyhow::Result<()> {
    expect_applied(orchestrator, orchestrator.load_agents().await)?;
    if orchestrator.select_agent(agent_id).await == ActionOutcome::Ignored {
        anyhow::bail!("agent not found: {agent_id}");
    }

    match action {
        SessionsCommand::List => {}
        SessionsCommand::Create { title } => {
            expect_applied(orchestrator, orchestrator.create_session(title).await)?;
        }
        SessionsCommand::Delete { id } => {
            expect_applied(orchestrator, orchestrator.delete_session(&id).await)?;
        }
    }

    let snapshot = orchestrator.snapshot();
    if let Some(error) = &snapshot.last_error {
        anyhow::bail!("{error}");
    }
    print_lines(&ui::render_sessions(&snapshot));
    Ok(())
}

/// Interactive chat loop
#[allow(clippy::future_not_send, clippy::too_many_lines)]
async fn chat(config: &Config, agent: Option<&str>, session: Option<&str>) -> anyhow::Result<()> {
    let orchestrator = build_orchestrator(config)?;
    let mut capture = AudioCapture::new(Microphone::new(config.audio.sample_rate), &config.audio);

    orchestrator.load_agents().await;
    if let Some(agent_id) = agent {
        if orchestrator.select_agent(agent_id).await == ActionOutcome::Ignored {
            println!("agent not found: {agent_id}");
        }
    }
    if let Some(session_id) = session {
        if orchestrator.select_session(session_id).await == ActionOutcome::Ignored {
            println!("session not found: {session_id}");
        }
    }

    println!("{}", ui::HELP);
    print_lines(&ui::render(&orchestrator.snapshot()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("{}", ui::prompt(&orchestrator.snapshot(), capture.is_recording()));
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };

        match ui::parse(&line) {
            InputCommand::Empty => continue,
            InputCommand::Quit => break,
            InputCommand::Help => println!("{}", ui::HELP),
            InputCommand::Invalid(reason) => println!("{reason}"),
            InputCommand::Dismiss => orchestrator.dismiss_error(),
            InputCommand::Agents => {
                orchestrator.load_agents().await;
                print_lines(&ui::render_agents(&orchestrator.snapshot()));
            }
            InputCommand::SelectAgent(id) => {
                capture.teardown();
                if orchestrator.select_agent(&id).await == ActionOutcome::Ignored {
                    println!("agent not found: {id}");
                }
                print_lines(&ui::render_sessions(&orchestrator.snapshot()));
            }
            InputCommand::ClearAgent => {
                capture.teardown();
                orchestrator.clear_agent();
            }
            InputCommand::Sessions => print_lines(&ui::render_sessions(&orchestrator.snapshot())),
            InputCommand::NewSession(title) => {
                if orchestrator.create_session(title).await == ActionOutcome::Ignored {
                    println!("select an agent first");
                }
                print_lines(&ui::render(&orchestrator.snapshot()));
            }
            InputCommand::OpenSession(id) => {
                if orchestrator.select_session(&id).await == ActionOutcome::Ignored {
                    println!("no session {id} for the selected agent");
                }
                print_lines(&ui::render(&orchestrator.snapshot()));
            }
            InputCommand::DeleteSession(id) => {
                if orchestrator.delete_session(&id).await == ActionOutcome::Ignored {
                    println!("select an agent first");
                }
                print_lines(&ui::render_sessions(&orchestrator.snapshot()));
            }
            InputCommand::Text(text) => {
                if !ui::send_enabled(&orchestrator.snapshot()) {
                    println!("open a session first");
                    continue;
                }
                orchestrator.send_text(&text).await;
                print_lines(&ui::render(&orchestrator.snapshot()));
            }
            InputCommand::ToggleRecording => {
                if capture.is_recording() {
                    match capture.stop().await {
                        Ok(Some(payload)) if !payload.is_empty() => {
                            println!("sending {} bytes of audio...", payload.len());
                            orchestrator.send_voice(payload).await;
                            print_lines(&ui::render(&orchestrator.snapshot()));
                        }
                        Ok(_) => println!("nothing was recorded"),
                        Err(e) => println!("recording failed: {e}"),
                    }
                } else if !ui::send_enabled(&orchestrator.snapshot()) {
                    println!("open a session first");
                } else {
                    match capture.start() {
                        Ok(()) => println!("recording... /record again to send"),
                        Err(Error::PermissionDenied) => {
                            println!("microphone access was denied; allow it and try again");
                        }
                        Err(e) => println!("cannot record: {e}"),
                    }
                }
            }
        }
    }

    capture.teardown();
    Ok(())
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(config: &Config, duration: u64, output: Option<PathBuf>) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new(Microphone::new(config.audio.sample_rate), &config.audio);
    capture.start()?;

    tokio::time::sleep(Duration::from_secs(duration)).await;

    let Some(payload) = capture.stop().await? else {
        anyhow::bail!("recording was not active");
    };

    println!("Captured {} bytes ({})", payload.len(), payload.mime_type());

    if payload.is_empty() {
        println!("\n---");
        println!("No audio arrived. Check:");
        println!("  1. Is your mic plugged in?");
        println!("  2. Run: arecord -l (to list devices)");
        println!("  3. Try: pavucontrol (to check levels)");
        return Ok(());
    }

    if let Some(path) = output {
        std::fs::write(&path, &payload.data)?;
        println!("Wrote recording to {}", path.display());
    }

    Ok(())
}
