//! CLI (Command Line Interface) mode
//!
//! Interactive REPL plus the one-shot prompt mode.

use std::io::Write;

use cgw_core::{ChatGpt, PageController};
use nu_ansi_term::{Color, Style};
use reedline::{
    ColumnarMenu, Completer, DefaultHinter, Emacs, KeyCode, KeyModifiers, Keybindings,
    MenuBuilder, Prompt, Reedline, ReedlineEvent, ReedlineMenu, Signal, Suggestion,
};
use tracing::info;

use crate::transcript::Transcript;

/// Available commands for autocomplete display
const COMMANDS: &[(&str, &str)] = &[
    ("/help", "Show this help"),
    ("/new", "Start a new conversation"),
    ("/session", "Refresh and show the ChatGPT session"),
    ("/exit", "Exit the program"),
    ("/quit", "Exit the program"),
];

/// Command completer for reedline
#[derive(Clone)]
pub struct CommandCompleter {
    commands: Vec<(&'static str, &'static str)>,
}

impl CommandCompleter {
    pub fn new() -> Self {
        Self {
            commands: COMMANDS.to_vec(),
        }
    }
}

impl Default for CommandCompleter {
    fn default() -> Self {
        Self::new()
    }
}

impl Completer for CommandCompleter {
    fn complete(&mut self, line: &str, pos: usize) -> Vec<Suggestion> {
        if !line.starts_with('/') {
            return Vec::new();
        }

        self.commands
            .iter()
            .filter(|(cmd, _)| cmd.starts_with(line))
            .map(|(cmd, desc)| Suggestion {
                value: cmd.to_string(),
                description: Some(desc.to_string()),
                extra: None,
                span: reedline::Span::new(0, pos),
                append_whitespace: true,
                style: None,
            })
            .collect()
    }
}

/// Custom prompt with colored styling
struct ColoredPrompt {
    style: Style,
}

impl ColoredPrompt {
    fn new() -> Self {
        Self {
            style: Color::Green.bold(),
        }
    }
}

impl Prompt for ColoredPrompt {
    fn render_prompt_left(&self) -> std::borrow::Cow<'_, str> {
        std::borrow::Cow::Owned(self.style.paint("> ").to_string())
    }

    fn render_prompt_right(&self) -> std::borrow::Cow<'_, str> {
        std::borrow::Cow::Borrowed("")
    }

    fn render_prompt_indicator(
        &self,
        _prompt_mode: reedline::PromptEditMode,
    ) -> std::borrow::Cow<'_, str> {
        std::borrow::Cow::Borrowed("")
    }

    fn render_prompt_multiline_indicator(&self) -> std::borrow::Cow<'_, str> {
        std::borrow::Cow::Borrowed("")
    }

    fn render_prompt_history_search_indicator(
        &self,
        _history_search: reedline::PromptHistorySearch,
    ) -> std::borrow::Cow<'_, str> {
        std::borrow::Cow::Borrowed("")
    }
}

/// How replies are printed
#[derive(Debug, Clone)]
pub struct CliOptions {
    /// Print reply text as it streams in
    pub stream: bool,
    pub transcript: Transcript,
}

/// Parsed REPL input
#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Help,
    New,
    Session,
    Exit,
    Unknown(&'a str),
    Prompt(&'a str),
}

fn parse_command(input: &str) -> Command<'_> {
    match input.to_lowercase().as_str() {
        "/help" | "/?" => Command::Help,
        "/new" => Command::New,
        "/session" => Command::Session,
        "/exit" | "/quit" | "/q" => Command::Exit,
        lower if lower.starts_with('/') => Command::Unknown(input),
        _ => Command::Prompt(input),
    }
}

/// Run the interactive REPL
pub async fn run_repl<P>(chatgpt: &ChatGpt<P>, options: &CliOptions) -> anyhow::Result<()>
where
    P: PageController + ?Sized,
{
    info!("Starting interactive mode");

    print_welcome();

    let mut keybindings = default_keybindings();
    keybindings.add_binding(
        KeyModifiers::NONE,
        KeyCode::Char('/'),
        ReedlineEvent::Edit(vec![reedline::EditCommand::Complete]),
    );

    let menu = Box::new(
        ColumnarMenu::default()
            .with_name("command_menu")
            .with_columns(1)
            .with_column_width(Some(40))
            .with_only_buffer_difference(false),
    );

    let hinter = DefaultHinter::default().with_style(Style::new().dimmed());

    let mut line_editor = Reedline::create()
        .with_completer(Box::new(CommandCompleter::new()))
        .with_menu(ReedlineMenu::EngineCompleter(menu))
        .with_hinter(Box::new(hinter))
        .with_edit_mode(Box::new(Emacs::new(keybindings)));

    let prompt = ColoredPrompt::new();

    loop {
        match line_editor.read_line(&prompt) {
            Ok(Signal::Success(line)) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }

                match parse_command(input) {
                    Command::Help => print_help(),
                    Command::New => {
                        chatgpt.new_conversation().await;
                        println!("\nStarted a new conversation.\n");
                    }
                    Command::Session => show_session(chatgpt).await,
                    Command::Exit => break,
                    Command::Unknown(cmd) => {
                        eprintln!("\nUnknown command: {}. Type /help for the list.\n", cmd);
                    }
                    Command::Prompt(text) => {
                        if let Err(e) = run_turn(chatgpt, text, options).await {
                            eprintln!("\n{}\n", e);
                        }
                    }
                }
            }
            Ok(Signal::CtrlC) => {
                println!("^C");
                continue;
            }
            Ok(Signal::CtrlD) => break,
            Err(err) => {
                eprintln!("\nError: {}\n", err);
                break;
            }
        }
    }

    println!("\nBye!\n");
    Ok(())
}

/// Answer a single prompt and return
pub async fn run_once<P>(
    chatgpt: &ChatGpt<P>,
    prompt: &str,
    options: &CliOptions,
) -> anyhow::Result<()>
where
    P: PageController + ?Sized,
{
    let prompt = prompt.trim();
    if prompt.is_empty() {
        anyhow::bail!("Prompt is empty");
    }

    run_turn(chatgpt, prompt, options).await?;
    Ok(())
}

/// Send one prompt; Ctrl+C cancels the turn and clears its markers
async fn run_turn<P>(chatgpt: &ChatGpt<P>, prompt: &str, options: &CliOptions) -> anyhow::Result<()>
where
    P: PageController + ?Sized,
{
    let turn = async {
        if options.stream {
            let mut stdout = std::io::stdout();
            println!();
            let reply = chatgpt
                .ask_with(prompt, |delta| {
                    if delta.restart {
                        let _ = writeln!(stdout);
                    }
                    let _ = write!(stdout, "{}", delta.text);
                    let _ = stdout.flush();
                })
                .await?;
            println!("\n");
            Ok::<_, cgw_core::Error>(reply)
        } else {
            let reply = chatgpt.ask(prompt).await?;
            println!("\n{}\n", reply);
            Ok(reply)
        }
    };

    // the turn future (and the lock it holds) is dropped when select! returns
    let outcome = tokio::select! {
        result = turn => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    match outcome {
        Some(result) => {
            let reply = result?;
            options.transcript.record(prompt, &reply).await;
            Ok(())
        }
        None => {
            chatgpt.abort_turn().await;
            println!("\n^C (turn cancelled)\n");
            Ok(())
        }
    }
}

async fn show_session<P>(chatgpt: &ChatGpt<P>)
where
    P: PageController + ?Sized,
{
    match chatgpt.refresh_session().await {
        Ok(session) if session.is_usable() => {
            let user = session
                .user_display()
                .unwrap_or_else(|| "unknown user".to_string());
            let expires = session.expires.as_deref().unwrap_or("unknown");
            println!("\nSession OK: logged in as {} (expires {}).\n", user, expires);
        }
        Ok(session) => {
            if let Err(e) = session.bearer() {
                eprintln!("\n{}\n", e);
            }
        }
        Err(e) => eprintln!("\n{}\n", e),
    }
}

/// Default keybindings for reedline
fn default_keybindings() -> Keybindings {
    let mut keybindings = Keybindings::new();
    keybindings.add_binding(
        KeyModifiers::NONE,
        KeyCode::Tab,
        ReedlineEvent::Edit(vec![reedline::EditCommand::Complete]),
    );
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Enter, ReedlineEvent::Submit);
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Esc, ReedlineEvent::Esc);
    keybindings.add_binding(
        KeyModifiers::CONTROL,
        KeyCode::Char('c'),
        ReedlineEvent::CtrlC,
    );
    keybindings.add_binding(
        KeyModifiers::CONTROL,
        KeyCode::Char('d'),
        ReedlineEvent::CtrlD,
    );
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Up, ReedlineEvent::Up);
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Down, ReedlineEvent::Down);
    keybindings
}

fn print_welcome() {
    println!();
    println!("ChatGPT CLI. Type a message and press Enter.");
    println!("Commands: /help, /new, /session, /exit");
    println!();
}

fn print_help() {
    println!();
    println!("Available commands:");
    for (cmd, desc) in COMMANDS {
        println!("  {:<10} {}", cmd, desc);
    }
    println!();
    println!("Ctrl+C while a reply is generating cancels it.");
    println!();
}
