use std::{
    cell::RefCell,
    error::Error,
    fs::{self, OpenOptions},
    io::{self, stdin},
    path::PathBuf,
    rc::Rc,
    time::{Duration, Instant},
};

use chrono::Utc;
use clap::{error::ErrorKind, CommandFactory, Parser, ValueEnum};
use crossterm::{
    event::{
        DisableBracketedPaste, DisableFocusChange, DisableMouseCapture, EnableBracketedPaste,
        EnableFocusChange, EnableMouseCapture,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};

use ielts_coach::{
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore},
    history::AttemptLog,
    host::AlternateScreen,
    runtime::{CrosstermEventSource, FixedTicker, Runner},
    speaking::{
        model::fill_default_durations,
        narration::{MutedNarrator, Narrator, PacedNarrator},
        recorder::SilentRecorder,
        source::{FixtureSource, JsonFileSource, PartsSource},
        storage::FileSessionStorage,
        Mode,
    },
    ui::screen::current_screen,
    util::relative_time,
    App, HostKit, SessionPlan,
};

const TICK_RATE_MS: u64 = 100;
const HISTORY_LIMIT: usize = 20;

/// IELTS speaking practice in the terminal, with an optional exam lockdown
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Practise the IELTS speaking test in the terminal: narrated questions, shadowing clips or a human examiner, recorded answers, and an exam-style lockdown that keeps you in the test until you finish."
)]
pub struct Cli {
    /// built-in test to run
    #[clap(short = 't', long, default_value = "speaking-sample")]
    test: String,

    /// load the test's parts from a JSON file instead
    #[clap(short = 'p', long)]
    parts: Option<PathBuf>,

    /// how questions are delivered
    #[clap(short = 'm', long, value_enum)]
    mode: Option<ModeArg>,

    /// response window in seconds for questions without their own
    #[clap(short = 'd', long)]
    duration: Option<u32>,

    /// narration pace in words per minute, 0 to skip narration
    #[clap(long)]
    wpm: Option<u32>,

    /// practise without the exam lockdown
    #[clap(long)]
    no_lockdown: bool,

    /// do not open shadowing clips in the browser
    #[clap(long)]
    no_videos: bool,

    /// list the built-in tests and exit
    #[clap(long)]
    list: bool,

    /// show recent attempts and exit
    #[clap(long)]
    history: bool,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum ModeArg {
    Tts,
    Shadowing,
    Human,
}

impl From<ModeArg> for Mode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Tts => Mode::TextToSpeech,
            ModeArg::Shadowing => Mode::Shadowing,
            ModeArg::Human => Mode::Human,
        }
    }
}

impl Cli {
    /// Fold command-line overrides into the stored settings
    fn apply_to(&self, mut config: Config) -> Config {
        if let Some(mode) = self.mode {
            config.mode = mode.into();
        }
        if let Some(secs) = self.duration {
            config.default_duration_secs = secs;
        }
        if let Some(wpm) = self.wpm {
            config.narration_wpm = wpm;
        }
        if self.no_lockdown {
            config.lockdown = false;
        }
        if self.no_videos {
            config.open_videos = false;
        }
        config
    }

    fn load_parts(&self) -> Result<(String, Vec<ielts_coach::speaking::Part>), Box<dyn Error>> {
        match &self.parts {
            Some(path) => {
                let (source, test_id) = JsonFileSource::for_file(path)
                    .ok_or_else(|| format!("not a usable parts file: {}", path.display()))?;
                let parts = source.parts_for_test(&test_id)?;
                Ok((test_id, parts))
            }
            None => Ok((self.test.clone(), FixtureSource.parts_for_test(&self.test)?)),
        }
    }
}

fn init_logging() {
    let path = AppDirs::log_path();
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        // nowhere to write without clobbering the screen
        Err(_) => {
            builder.filter_level(log::LevelFilter::Off);
        }
    }
    let _ = builder.try_init();
}

fn print_history() -> Result<(), Box<dyn Error>> {
    let log = AttemptLog::open_default()?;
    let attempts = log.recent(HISTORY_LIMIT)?;
    if attempts.is_empty() {
        println!("no attempts yet");
        return Ok(());
    }
    let now = Utc::now();
    for a in &attempts {
        println!(
            "{:<16} {:<12} {:>3}%  {}/{}  {}",
            a.test_id,
            a.mode.to_string(),
            a.completion_pct(),
            a.recorded,
            a.questions,
            relative_time(a.completed_at, now)
        );
    }
    let summary = log.summary()?;
    if let Some(avg) = summary.avg_completion_pct {
        println!("\n{} attempts, {avg:.0}% answered on average", summary.attempts);
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging();

    if cli.list {
        for id in FixtureSource.test_ids() {
            println!("{id}");
        }
        return Ok(());
    }
    if cli.history {
        return print_history();
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let store = FileConfigStore::new();
    let config = cli.apply_to(store.load());
    if let Err(e) = store.save(&config) {
        log::warn!("could not save settings: {e}");
    }

    let (test_id, mut parts) = match cli.load_parts() {
        Ok(loaded) => loaded,
        Err(e) => {
            let mut cmd = Cli::command();
            cmd.error(ErrorKind::InvalidValue, e.to_string()).exit();
        }
    };
    fill_default_durations(&mut parts, config.default_duration_secs);

    // session storage lives as long as this process run
    let storage = FileSessionStorage::new(AppDirs::session_dir());
    if let Err(e) = storage.clear() {
        log::warn!("could not clear session storage: {e}");
    }

    let narrator: Box<dyn Narrator> = if config.narration_wpm == 0 {
        Box::new(MutedNarrator)
    } else {
        Box::new(PacedNarrator::new(config.narration_wpm))
    };
    let history = match AttemptLog::open_default() {
        Ok(log) => Some(log),
        Err(e) => {
            log::warn!("attempt history unavailable: {e}");
            None
        }
    };

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(
        stdout,
        EnterAlternateScreen,
        EnableFocusChange,
        EnableBracketedPaste,
        EnableMouseCapture
    )?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let plan = SessionPlan {
        test_id,
        parts,
        mode: config.mode,
        proctored: config.lockdown,
        open_videos: config.open_videos,
    };
    let host = HostKit {
        fullscreen: Box::new(AlternateScreen::entered()),
        narrator,
        recorder: Box::new(SilentRecorder::default()),
        history,
    };
    let mut app = App::new(plan, host, Rc::new(RefCell::new(storage)));
    let outcome = start_tui(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableMouseCapture,
        DisableBracketedPaste,
        DisableFocusChange,
        LeaveAlternateScreen,
    )?;
    terminal.show_cursor()?;

    outcome
}

fn start_tui<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );

    loop {
        terminal.draw(|f| current_screen(&app.state).render(app, f))?;
        let event = runner.step();
        app.on_event(event, Instant::now());
        if app.should_quit() {
            break;
        }
    }

    Ok(())
}
