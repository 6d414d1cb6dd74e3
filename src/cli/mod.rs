//! CLI mode for protube - submit links from the command line.

mod progress;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use console::style;
use indicatif::{MultiProgress, ProgressBar};
use parking_lot::Mutex;
use tokio::io::AsyncReadExt;

use crate::{
    AppConfig, ClientConfig, Coordinator, DiskSaver, Error, HttpRemote, NoticeBoard, NoticeKind,
    PresentationSink, ProgressMode, PushChannel, Result, Session,
};

use progress::{
    apply_session, make_notice_line, make_progress_bar, print_playlist_result, print_summary,
};

/// How often expired notices are cleared from the screen.
const NOTICE_REFRESH: Duration = Duration::from_secs(1);

/// Parsed command line.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CliOptions {
    pub links: Vec<String>,
    pub read_stdin: bool,
    pub playlist: Option<String>,
    pub resolution: Option<String>,
    pub format: Option<String>,
    pub api_url: Option<String>,
    pub output: Option<PathBuf>,
    pub jobs: Option<usize>,
    pub push: bool,
    pub config: Option<PathBuf>,
}

/// What the command line asks for.
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Help,
    Run(CliOptions),
}

pub fn print_usage() {
    eprintln!("Usage: protube [OPTIONS] <link>...");
    eprintln!("       protube [OPTIONS] --playlist <link>");
    eprintln!();
    eprintln!("Each argument is one link; '-' reads more links from stdin, one per line.");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --playlist <LINK>       Queue a whole playlist on the service");
    eprintln!("  -r, --resolution <RES>  Requested resolution (default: from config, 720p)");
    eprintln!("  -f, --format <FMT>      mp4 or mp3 (default: from config, mp4)");
    eprintln!("  --api-url <URL>         Service base URL (env: PROTUBE_API_URL)");
    eprintln!("  -o, --output <DIR>      Directory for saved files");
    eprintln!("  -j, --jobs <N>          Links processed at once (default: 1)");
    eprintln!("  --push                  Use live progress events from the service");
    eprintln!("  --config <PATH>         Config file (default: {})", AppConfig::default_path().display());
    eprintln!("  -h, --help              Show this help");
}

fn missing_value(flag: &str) -> Error {
    Error::UserInput(format!("{flag} requires a value"))
}

/// Scans `args` (without the program name).
///
/// # Errors
///
/// Returns [`Error::UserInput`] for unknown flags, flags without a value and
/// a non-numeric job count.
pub fn parse_args(args: &[String]) -> Result<Command> {
    let mut opts = CliOptions::default();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        let arg = arg.as_str();
        let mut value = |flag: &str| iter.next().cloned().ok_or_else(|| missing_value(flag));
        match arg {
            "-h" | "--help" => return Ok(Command::Help),
            "-" => opts.read_stdin = true,
            "--playlist" => opts.playlist = Some(value(arg)?),
            "-r" | "--resolution" => opts.resolution = Some(value(arg)?),
            "-f" | "--format" => opts.format = Some(value(arg)?),
            "--api-url" => opts.api_url = Some(value(arg)?),
            "-o" | "--output" => opts.output = Some(PathBuf::from(value(arg)?)),
            "-j" | "--jobs" => {
                let raw = value(arg)?;
                let jobs = raw
                    .parse::<usize>()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| Error::UserInput(format!("invalid job count: {raw}")))?;
                opts.jobs = Some(jobs);
            }
            "--push" => opts.push = true,
            "--config" => opts.config = Some(PathBuf::from(value(arg)?)),
            flag if flag.starts_with('-') => {
                return Err(Error::UserInput(format!("unknown option: {flag}")));
            }
            link => opts.links.push(link.to_string()),
        }
    }

    if opts.links.is_empty() && !opts.read_stdin && opts.playlist.is_none() {
        return Ok(Command::Help);
    }
    Ok(Command::Run(opts))
}

/// Applies command line overrides on top of the loaded configuration.
fn apply_overrides(mut config: ClientConfig, opts: &CliOptions) -> ClientConfig {
    if let Some(url) = &opts.api_url {
        config = config.with_api_url(url.clone());
    }
    if let Some(dir) = &opts.output {
        config = config.with_output_dir(dir.clone());
    }
    if let Some(jobs) = opts.jobs {
        config = config.with_concurrent_links(jobs);
    }
    if opts.push {
        config = config.with_progress_mode(ProgressMode::Push);
    }
    config
}

/// Terminal sink: one bar per session, live notices on a line above them.
pub struct CliSink {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
    notices: NoticeBoard,
    notice_line: ProgressBar,
    saver: DiskSaver,
}

impl CliSink {
    #[must_use]
    pub fn new(config: &ClientConfig) -> Self {
        let multi = MultiProgress::new();
        let notice_line = multi.add(make_notice_line());
        Self {
            multi,
            bars: Mutex::new(HashMap::new()),
            notices: NoticeBoard::new(config.notice_ttl()),
            notice_line,
            saver: DiskSaver::new(config.output_dir.clone()),
        }
    }

    /// Visible notices, newest first, one per line.
    pub fn notice_text(&self) -> String {
        self.notices
            .active()
            .iter()
            .map(|n| match n.kind {
                NoticeKind::Info => format!("{} {}", style("info:").cyan(), n.message),
                NoticeKind::Error => format!("{} {}", style("error:").red().bold(), n.message),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Redraws the notice line, dropping expired notices.
    pub fn refresh_notices(&self) {
        self.notice_line.set_message(self.notice_text());
    }
}

#[async_trait]
impl PresentationSink for CliSink {
    fn render_session(&self, session: &Session) {
        let mut bars = self.bars.lock();
        // Sessions start keyed by their link and move to the filename later.
        let bar = match bars.remove(&session.id) {
            Some(bar) => bar,
            None => bars.remove(session.source_link()).unwrap_or_else(|| {
                self.multi
                    .add(make_progress_bar(&progress::session_label(session)))
            }),
        };
        apply_session(&bar, session);
        bars.insert(session.id.clone(), bar);
    }

    fn notify(&self, message: &str, kind: NoticeKind) {
        self.notices.push(message, kind);
        self.refresh_notices();
    }

    async fn prompt_save(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        Ok(self.saver.save(filename, bytes).await?)
    }

    fn session_removed(&self, id: &str) {
        self.bars.lock().remove(id);
    }
}

async fn read_stdin() -> Result<String> {
    let mut input = String::new();
    tokio::io::stdin().read_to_string(&mut input).await?;
    Ok(input)
}

/// Runs the CLI with `args` (without the program name).
///
/// Returns `Ok(true)` when every submitted link completed.
///
/// # Errors
///
/// Returns an error for bad arguments, an unreadable config, an empty
/// submission, or an interrupted run.
pub async fn run(args: &[String]) -> Result<bool> {
    let opts = match parse_args(args)? {
        Command::Help => {
            print_usage();
            return Ok(true);
        }
        Command::Run(opts) => opts,
    };

    let app = AppConfig::load(opts.config.as_deref())?;
    let config = apply_overrides(app.client, &opts);
    let resolution = opts
        .resolution
        .clone()
        .unwrap_or_else(|| config.default_resolution.clone());
    let format = opts
        .format
        .clone()
        .unwrap_or_else(|| config.default_format.clone());

    let sink = Arc::new(CliSink::new(&config));
    let remote = HttpRemote::new(&config)?;
    let mut coordinator = Coordinator::new(remote, config.clone(), Arc::clone(&sink) as _);

    let mut pump = None;
    if config.progress_mode == ProgressMode::Push {
        let client_id = coordinator.source().correlation_id().map(ToString::to_string);
        match PushChannel::connect(&config, client_id).await {
            Ok((channel, events)) => pump = Some(coordinator.attach_channel(channel, events)),
            Err(e) => {
                log::warn!("Live channel unavailable: {e}");
                sink.notify(&format!("Live progress unavailable: {}", e.user_message()), NoticeKind::Error);
            }
        }
    }

    let refresher = {
        let sink = Arc::clone(&sink);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(NOTICE_REFRESH);
            loop {
                interval.tick().await;
                sink.refresh_notices();
            }
        })
    };

    let outcome = tokio::select! {
        result = submit(&coordinator, &opts, &resolution, &format) => result,
        _ = tokio::signal::ctrl_c() => {
            log::info!("Interrupted, cancelling downloads");
            Err(Error::Cancelled)
        }
    };

    coordinator.shutdown();
    if let Some(pump) = pump {
        pump.abort();
    }
    refresher.abort();
    sink.notice_line.finish_and_clear();
    outcome
}

async fn submit(
    coordinator: &Coordinator<HttpRemote>,
    opts: &CliOptions,
    resolution: &str,
    format: &str,
) -> Result<bool> {
    if let Some(playlist) = &opts.playlist {
        let session = coordinator.submit_playlist(playlist, resolution, format).await?;
        print_playlist_result(&session);
        return Ok(session.state() == crate::SessionState::Completed);
    }

    let mut input = opts.links.join("\n");
    if opts.read_stdin {
        input.push('\n');
        input.push_str(&read_stdin().await?);
    }

    let summary = coordinator.submit_links(&input, resolution, format).await?;
    print_summary(&summary);
    Ok(summary.all_completed())
}
