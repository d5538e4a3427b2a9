//! Line-oriented terminal front end
//!
//! Plain lines are prompts, lines starting with `/` are commands. One loop
//! multiplexes input lines, store notifications and the in-flight submit, so
//! answers show up while input is still being read. When input ends the loop
//! keeps going until the pending answer has been printed.

use crate::config::{ChatConfig, DEFAULT_SERVICE_URL};
use crate::session::{ConversationStore, Message, SessionError, SessionState, SessionUpdate};
use crossterm::style::{StyledContent, Stylize};
use std::fmt::Display;
use std::io::{self, IsTerminal, Write};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::{JoinError, JoinHandle};

const HELP: &str = "\
Commands:
  /new       start a new conversation
  /config    change UserId, service URL or simulation mode
  /sql       show the SQL queries behind the latest answer
  /dismiss   hide the current error notice
  /status    show session details
  /help      show this help
  /quit      exit";

type SubmitTask = JoinHandle<Result<Option<Message>, SessionError>>;

/// One line of user input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Prompt(&'a str),
    NewConversation,
    Configure,
    ShowSql,
    Dismiss,
    Status,
    Help,
    Quit,
    Unknown(&'a str),
    Empty,
}

pub fn parse_command(line: &str) -> Command<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Command::Prompt(line);
    };
    match rest.split_whitespace().next().unwrap_or_default() {
        "new" => Command::NewConversation,
        "config" => Command::Configure,
        "sql" => Command::ShowSql,
        "dismiss" => Command::Dismiss,
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ => Command::Unknown(line),
    }
}

/// Whether styling escapes are written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    color: bool,
}

impl Palette {
    /// Color only on a terminal, and never when `NO_COLOR` is set
    pub fn detect() -> Self {
        let no_color = std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty());
        Self {
            color: io::stdout().is_terminal() && !no_color,
        }
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    fn paint<D: Display>(self, styled: StyledContent<D>) -> String {
        if self.color {
            styled.to_string()
        } else {
            styled.content().to_string()
        }
    }
}

enum Flow {
    Continue,
    Stop,
}

/// Run the interactive loop on stdin/stdout until `/quit` or end of input
pub async fn run(store: Arc<ConversationStore>) -> io::Result<()> {
    drive(
        store,
        BufReader::new(tokio::io::stdin()),
        io::stdout(),
        Palette::detect(),
    )
    .await
}

async fn drive<R, W>(
    store: Arc<ConversationStore>,
    input: R,
    mut out: W,
    palette: Palette,
) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    let mut updates = store.subscribe();

    match store.get_configuration() {
        Some(config) => writeln!(out, "{}", header(&config, palette))?,
        None => {
            if !configure(&store, &mut lines, &mut out, palette).await? {
                return Ok(());
            }
        }
    }
    writeln!(out, "{}", palette.paint("Type a question, or /help for commands.".dim()))?;

    let mut pending: Option<SubmitTask> = None;
    let mut input_open = true;
    let mut updates_open = true;

    while input_open || pending.is_some() {
        tokio::select! {
            update = updates.recv(), if updates_open => match update {
                Ok(update) => print_update(&mut out, &update, palette)?,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Console fell behind on session updates");
                }
                Err(RecvError::Closed) => updates_open = false,
            },
            joined = join(&mut pending) => {
                pending = None;
                report_submit(&mut out, joined, palette)?;
            }
            line = lines.next_line(), if input_open => {
                let flow = match line? {
                    Some(line) => {
                        handle_line(&line, &store, &mut lines, &mut out, palette, &mut pending).await?
                    }
                    None => Flow::Stop,
                };
                if matches!(flow, Flow::Stop) {
                    input_open = false;
                }
            }
        }
    }

    // Updates published by the last completed submit
    loop {
        match updates.try_recv() {
            Ok(update) => print_update(&mut out, &update, palette)?,
            Err(TryRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Console fell behind on session updates");
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
    out.flush()
}

/// Resolves when the pending submit finishes; never resolves without one
async fn join(
    pending: &mut Option<SubmitTask>,
) -> Result<Result<Option<Message>, SessionError>, JoinError> {
    match pending {
        Some(task) => task.await,
        None => std::future::pending().await,
    }
}

fn report_submit<W: Write>(
    out: &mut W,
    joined: Result<Result<Option<Message>, SessionError>, JoinError>,
    palette: Palette,
) -> io::Result<()> {
    match joined {
        // Missing configuration is already shown as the session error notice
        Ok(Ok(_) | Err(SessionError::ConfigurationMissing)) => Ok(()),
        Ok(Err(e)) => writeln!(out, "{}", palette.paint(e.to_string().yellow())),
        Err(e) => {
            tracing::error!(error = %e, "Submit task failed");
            Ok(())
        }
    }
}

fn print_update<W: Write>(out: &mut W, update: &SessionUpdate, palette: Palette) -> io::Result<()> {
    if let Some(text) = render(update, palette) {
        writeln!(out, "{text}")?;
    }
    Ok(())
}

async fn handle_line<R, W>(
    line: &str,
    store: &Arc<ConversationStore>,
    lines: &mut Lines<R>,
    out: &mut W,
    palette: Palette,
    pending: &mut Option<SubmitTask>,
) -> io::Result<Flow>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    match parse_command(line) {
        Command::Empty => {}
        Command::Prompt(prompt) => {
            if pending.is_some() || store.is_loading() {
                writeln!(
                    out,
                    "{}",
                    palette.paint("Still waiting for the previous answer.".yellow())
                )?;
                return Ok(Flow::Continue);
            }
            let store = Arc::clone(store);
            let prompt = prompt.to_string();
            *pending = Some(tokio::spawn(async move { store.submit(&prompt).await }));
        }
        Command::NewConversation => match store.reset_conversation() {
            Ok(()) => {
                tracing::debug!(conversation_id = %store.conversation_id(), "Conversation reset");
            }
            Err(e) => writeln!(out, "{}", palette.paint(e.to_string().yellow()))?,
        },
        Command::Configure => {
            if !configure(store, lines, out, palette).await? {
                return Ok(Flow::Stop);
            }
        }
        Command::ShowSql => writeln!(out, "{}", render_traces(&store.messages(), palette))?,
        Command::Dismiss => {
            if store.error().is_none() {
                writeln!(out, "{}", palette.paint("Nothing to dismiss.".dim()))?;
            }
            store.clear_error();
        }
        Command::Status => writeln!(out, "{}", status(&store.snapshot()))?,
        Command::Help => writeln!(out, "{HELP}")?,
        Command::Quit => return Ok(Flow::Stop),
        Command::Unknown(command) => {
            let hint = format!("Unknown command {command}, try /help");
            writeln!(out, "{}", palette.paint(hint.yellow()))?;
        }
    }
    Ok(Flow::Continue)
}

/// Show the configuration form and apply the result.
///
/// Returns `false` when input ended before the form was completed.
async fn configure<R, W>(
    store: &ConversationStore,
    lines: &mut Lines<R>,
    out: &mut W,
    palette: Palette,
) -> io::Result<bool>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let current = store.get_configuration();
    let Some(config) = read_config(lines, out, current.as_ref(), palette).await? else {
        return Ok(false);
    };
    if let Err(e) = store.set_configuration(config) {
        writeln!(out, "{}", palette.paint(e.to_string().yellow()))?;
    }
    Ok(true)
}

/// Ask for each field until the answers form a valid configuration.
///
/// Returns `None` at end of input.
async fn read_config<R, W>(
    lines: &mut Lines<R>,
    out: &mut W,
    current: Option<&ChatConfig>,
    palette: Palette,
) -> io::Result<Option<ChatConfig>>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    loop {
        writeln!(out, "{}", palette.paint("Chat configuration".bold()))?;

        let Some(user_id) = ask(lines, out, "UserId", current.map(|c| c.user_id.as_str())).await?
        else {
            return Ok(None);
        };

        let mock_default = current.map(|c| if c.use_mock { "y" } else { "n" });
        let Some(mock) = ask(lines, out, "Simulation mode (y/n)", mock_default).await? else {
            return Ok(None);
        };
        let use_mock = matches!(mock.to_ascii_lowercase().as_str(), "y" | "yes" | "s" | "si");

        let default_url = current
            .map(|c| c.service_url.as_str())
            .filter(|url| !url.is_empty())
            .unwrap_or(DEFAULT_SERVICE_URL);
        let service_url = if use_mock {
            default_url.to_string()
        } else {
            let Some(url) = ask(lines, out, "Service URL", Some(default_url)).await? else {
                return Ok(None);
            };
            url
        };

        let Some(user_email) = ask(
            lines,
            out,
            "User email (optional, - to clear)",
            current.and_then(|c| c.user_email.as_deref()),
        )
        .await?
        else {
            return Ok(None);
        };
        let Some(attachment_uri) = ask(
            lines,
            out,
            "Attachment URI (optional, - to clear)",
            current.and_then(|c| c.attachment_uri.as_deref()),
        )
        .await?
        else {
            return Ok(None);
        };

        let config = ChatConfig {
            user_id,
            service_url,
            user_email: optional(user_email),
            attachment_uri: optional(attachment_uri),
            use_mock,
        };
        match config.validate() {
            Ok(()) => return Ok(Some(config)),
            Err(e) => writeln!(out, "{}", palette.paint(e.to_string().red()))?,
        }
    }
}

/// Prompt for one field; blank input keeps `default`. Answers are trimmed.
async fn ask<R, W>(
    lines: &mut Lines<R>,
    out: &mut W,
    label: &str,
    default: Option<&str>,
) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let default = default.filter(|d| !d.is_empty());
    match default {
        Some(d) => write!(out, "{label} [{d}]: ")?,
        None => write!(out, "{label}: ")?,
    }
    out.flush()?;

    let Some(line) = lines.next_line().await? else {
        return Ok(None);
    };
    let answer = line.trim();
    Ok(Some(if answer.is_empty() {
        default.unwrap_or_default().to_string()
    } else {
        answer.to_string()
    }))
}

fn optional(answer: String) -> Option<String> {
    if answer.is_empty() || answer == "-" {
        None
    } else {
        Some(answer)
    }
}

pub fn header(config: &ChatConfig, palette: Palette) -> String {
    let target = if config.use_mock {
        palette.paint(" MOCK MODE ".black().on_yellow())
    } else {
        palette.paint(config.service_url.as_str().underlined())
    };
    format!(
        "{} {} {}",
        palette.paint("Query Chat".bold()),
        palette.paint(format!("user {}", config.user_id).dim()),
        target
    )
}

fn status(snapshot: &SessionState) -> String {
    let mode = match &snapshot.config {
        Some(c) if c.use_mock => "simulation".to_string(),
        Some(c) => c.service_url.clone(),
        None => "not configured".to_string(),
    };
    format!(
        "conversation {}\nbackend      {}\nmessages     {}\nwaiting      {}\nerror        {}",
        snapshot.conversation_id,
        mode,
        snapshot.messages.len(),
        snapshot.is_loading(),
        snapshot.error.as_deref().unwrap_or("-"),
    )
}

fn traces_summary(count: usize) -> String {
    match count {
        1 => "1 SQL query".to_string(),
        n => format!("{n} SQL queries"),
    }
}

/// Queries behind the most recent answer that has any
fn render_traces(messages: &[Message], palette: Palette) -> String {
    let Some(message) = messages
        .iter()
        .rev()
        .find(|m| !m.is_user() && !m.traces().is_empty())
    else {
        return palette.paint("No SQL queries yet.".dim());
    };

    let mut text = format!(
        "{} for \"{}\"",
        palette.paint(traces_summary(message.traces().len()).bold()),
        message.prompt
    );
    for (i, query) in message.traces().iter().enumerate() {
        let label = palette.paint(format!("-- query {}", i + 1).dim());
        text.push_str(&format!("\n{label}\n{}", query.trim()));
    }
    text
}

fn render_message(message: &Message, palette: Palette) -> String {
    let time = message.timestamp.format("%H:%M:%S");
    if message.is_user() {
        let who = palette.paint(format!("[{time}] you:").cyan().bold());
        return format!("{who} {}", message.prompt);
    }
    if let Some(error) = &message.error {
        return format!(
            "{} {}",
            palette.paint(format!("[{time}]").dim()),
            palette.paint(error.as_str().red())
        );
    }

    let mut text = format!(
        "{}\n{}",
        palette.paint(format!("[{time}] assistant:").green().bold()),
        message.answer.as_deref().unwrap_or_default()
    );
    let traces = message.traces().len();
    if traces > 0 {
        let hint = format!("> {} (/sql to show)", traces_summary(traces));
        text.push('\n');
        text.push_str(&palette.paint(hint.dim()));
    }
    text
}

/// Text for one store notification, `None` when nothing should be printed
pub fn render(update: &SessionUpdate, palette: Palette) -> Option<String> {
    match update {
        SessionUpdate::MessageAppended(message) => Some(render_message(message, palette)),
        SessionUpdate::LoadingChanged(true) => {
            Some(palette.paint("... waiting for the answer".dim()))
        }
        SessionUpdate::LoadingChanged(false) | SessionUpdate::ErrorChanged(None) => None,
        SessionUpdate::ErrorChanged(Some(error)) => Some(format!(
            "{} {}",
            palette.paint(format!("! {error}").yellow().bold()),
            palette.paint("(/dismiss to hide)".dim())
        )),
        SessionUpdate::TimelineCleared { conversation_id } => Some(
            palette.paint(format!("New conversation {conversation_id}").dim()),
        ),
        SessionUpdate::ConfigurationChanged(config) => Some(header(config, palette)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{ChatClient, HttpBackend, Simulator};
    use crate::testing::{answer_response, GatedTransport, MemoryConfigRepository};
    use chrono::Utc;
    use std::time::Duration;

    fn script(input: &'static str) -> Lines<BufReader<&'static [u8]>> {
        BufReader::new(input.as_bytes()).lines()
    }

    fn mock_store(latency_ms: std::ops::Range<u64>, config: Option<ChatConfig>) -> Arc<ConversationStore> {
        let client = ChatClient::new(
            HttpBackend::new(Duration::from_secs(1)).unwrap(),
            Simulator::new(latency_ms),
        );
        Arc::new(ConversationStore::new(
            Arc::new(client),
            Arc::new(MemoryConfigRepository::new(config)),
        ))
    }

    async fn transcript(store: Arc<ConversationStore>, input: &'static str) -> String {
        let mut out = Vec::new();
        drive(store, BufReader::new(input.as_bytes()), &mut out, Palette::plain())
            .await
            .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("  "), Command::Empty);
        assert_eq!(parse_command("  ventas 2025 "), Command::Prompt("ventas 2025"));
        assert_eq!(parse_command("/new"), Command::NewConversation);
        assert_eq!(parse_command(" /config "), Command::Configure);
        assert_eq!(parse_command("/sql"), Command::ShowSql);
        assert_eq!(parse_command("/dismiss"), Command::Dismiss);
        assert_eq!(parse_command("/status"), Command::Status);
        assert_eq!(parse_command("/help"), Command::Help);
        assert_eq!(parse_command("/exit"), Command::Quit);
        assert_eq!(parse_command("/nope now"), Command::Unknown("/nope now"));
    }

    #[tokio::test]
    async fn test_answer_arriving_after_end_of_input_is_printed() {
        let store = mock_store(50..60, Some(ChatConfig::mock("u1")));

        let printed = transcript(store.clone(), "ventas 2025\n").await;

        assert!(printed.contains("you: ventas 2025"), "{printed}");
        assert!(printed.contains("... waiting for the answer"));
        assert!(printed.contains("assistant:"));
        assert!(printed.contains("Brasil"));
        assert!(printed.contains("> 1 SQL query (/sql to show)"));
        assert!(!store.is_loading());
        assert_eq!(store.messages().len(), 2);
    }

    #[tokio::test]
    async fn test_quit_waits_for_pending_answer() {
        let store = mock_store(30..40, Some(ChatConfig::mock("u1")));

        let printed = transcript(store, "hola\n/quit\nnever read\n").await;

        assert!(printed.contains("assistant:"));
        assert!(printed.contains("\"hola\""));
        assert!(!printed.contains("never read"));
    }

    #[tokio::test]
    async fn test_prompt_while_waiting_is_refused() {
        let transport = Arc::new(GatedTransport::new(Ok(answer_response("ok", vec![], ""))));
        let store = Arc::new(ConversationStore::new(
            transport.clone(),
            Arc::new(MemoryConfigRepository::new(Some(ChatConfig::mock("u1")))),
        ));
        let run = tokio::spawn(transcript(store.clone(), "uno\ndos\n"));
        transport.started.notified().await;
        transport.release.notify_one();

        let printed = run.await.unwrap();
        assert!(printed.contains("Still waiting for the previous answer."));
        assert!(!printed.contains("you: dos"));
        assert_eq!(store.messages().len(), 2);
    }

    #[tokio::test]
    async fn test_first_run_shows_form_then_chats() {
        let store = mock_store(0..0, None);

        let printed = transcript(store.clone(), "u1\ny\n\n\n/status\nhola\n").await;

        assert!(printed.contains("Chat configuration"));
        assert!(printed.contains("Query Chat user u1  MOCK MODE "));
        assert!(printed.contains("backend      simulation"));
        assert!(printed.contains("assistant:"));
        let saved = store.get_configuration().unwrap();
        assert_eq!(saved.user_id, "u1");
        assert!(saved.use_mock);
    }

    #[tokio::test]
    async fn test_plain_palette_writes_no_escapes() {
        let store = mock_store(0..0, Some(ChatConfig::mock("u1")));

        let printed = transcript(store, "/nope\nventas\n/sql\n").await;

        assert!(!printed.contains('\u{1b}'), "{printed:?}");
        assert!(printed.contains("Unknown command /nope, try /help"));
    }

    #[test]
    fn test_color_palette_styles_output() {
        let colored = Palette { color: true };
        assert!(colored.paint("x".bold()).contains('\u{1b}'));
        assert_eq!(Palette::plain().paint("x".red().bold()), "x");
    }

    #[tokio::test]
    async fn test_form_mock_mode_skips_url() {
        let mut lines = script("  u1  \ny\n\n\n");
        let mut out = Vec::new();

        let config = read_config(&mut lines, &mut out, None, Palette::plain())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(config.user_id, "u1");
        assert!(config.use_mock);
        assert_eq!(config.service_url, DEFAULT_SERVICE_URL);
        assert_eq!(config.user_email, None);
        assert_eq!(config.attachment_uri, None);
        assert!(!String::from_utf8(out).unwrap().contains("Service URL"));
    }

    #[tokio::test]
    async fn test_form_reprompts_until_valid() {
        let mut lines = script("\nn\n\n\n\nu2\nn\n http://svc.example \nana@example.com\n\n");
        let mut out = Vec::new();

        let config = read_config(&mut lines, &mut out, None, Palette::plain())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            config,
            ChatConfig::new("u2", "http://svc.example").with_user_email("ana@example.com")
        );
        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains("Please enter a UserId"));
        assert!(printed.contains(&format!("Service URL [{DEFAULT_SERVICE_URL}]")));
    }

    #[tokio::test]
    async fn test_form_keeps_current_values() {
        let current = ChatConfig::new("u1", "https://api.example.com").with_attachment_uri("doc.pdf");
        let mut lines = script("\n\n\n\n-\n");
        let mut out = Vec::new();

        let config = read_config(&mut lines, &mut out, Some(&current), Palette::plain())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(config, ChatConfig::new("u1", "https://api.example.com"));
    }

    #[tokio::test]
    async fn test_form_end_of_input() {
        let mut lines = script("u1\n");
        let mut out = Vec::new();
        assert_eq!(
            read_config(&mut lines, &mut out, None, Palette::plain())
                .await
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_header_shows_mode() {
        assert!(header(&ChatConfig::mock("u1"), Palette::plain()).contains("MOCK MODE"));
        let live = header(&ChatConfig::new("u1", "http://localhost:7071"), Palette::plain());
        assert_eq!(live, "Query Chat user u1 http://localhost:7071");
    }

    #[test]
    fn test_answer_traces_are_collapsed() {
        let message = Message::answer(
            "m1",
            "ventas",
            "### Ventas",
            vec!["SELECT 1".to_string(), "SELECT 2".to_string()],
            Utc::now(),
        );
        let text = render(&SessionUpdate::MessageAppended(message.clone()), Palette::plain()).unwrap();
        assert!(text.contains("### Ventas"));
        assert!(text.contains("2 SQL queries"));
        assert!(!text.contains("SELECT 1"));

        let expanded = render_traces(
            &[Message::user("u", "ventas", Utc::now()), message],
            Palette::plain(),
        );
        assert!(expanded.contains("SELECT 1"));
        assert!(expanded.contains("SELECT 2"));
    }

    #[test]
    fn test_render_failure_and_notices() {
        let plain = Palette::plain();
        let failure = Message::failure("m1", "ventas", "bad request", Utc::now());
        let text = render(&SessionUpdate::MessageAppended(failure), plain).unwrap();
        assert!(text.ends_with("bad request"));
        assert!(!text.contains("SQL"));

        let notice = render(&SessionUpdate::ErrorChanged(Some("boom".to_string())), plain).unwrap();
        assert_eq!(notice, "! boom (/dismiss to hide)");
        assert_eq!(render(&SessionUpdate::ErrorChanged(None), plain), None);
        assert_eq!(render(&SessionUpdate::LoadingChanged(false), plain), None);
    }

    #[test]
    fn test_status_lists_session() {
        let mut snapshot = SessionState::new("conv-1");
        snapshot.config = Some(ChatConfig::mock("u1"));
        snapshot.error = Some("bad request".to_string());
        let text = status(&snapshot);
        assert!(text.contains("conv-1"));
        assert!(text.contains("simulation"));
        assert!(text.contains("bad request"));
    }

    #[test]
    fn test_no_traces_yet() {
        let only_user = [Message::user("u", "hola", Utc::now())];
        assert_eq!(
            render_traces(&only_user, Palette::plain()),
            "No SQL queries yet."
        );
    }
}
