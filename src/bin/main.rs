use crossterm::cursor::MoveTo;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::Print;
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, queue};
use nlp_core::{Candidate, EngineConfig, NlpEngine, SpellingResult};
use std::io::{self, stdout, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

const STATE_PATH: &str = "personal_state.bin";
const SUGGESTION_COUNT: usize = 5;
const HISTORY_LEN: usize = 12;

struct Args {
    dictionary: PathBuf,
    state: PathBuf,
    config: Option<PathBuf>,
    ngrams: Option<PathBuf>,
}

fn parse_args() -> Option<Args> {
    let mut args = std::env::args().skip(1);
    let dictionary = PathBuf::from(args.next()?);
    let state = args.next().map(PathBuf::from).unwrap_or_else(|| PathBuf::from(STATE_PATH));
    let config = args.next().map(PathBuf::from);
    let ngrams = args.next().map(PathBuf::from);
    Some(Args { dictionary, state, config, ngrams })
}

fn main() -> ExitCode {
    env_logger::init();

    let Some(args) = parse_args() else {
        eprintln!("usage: nlp_engine <dictionary.json> [state.bin] [config.toml] [ngrams.json]");
        return ExitCode::FAILURE;
    };
    let config = match &args.config {
        Some(path) => match EngineConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("[ERROR] Invalid config {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => EngineConfig::default(),
    };

    let engine = NlpEngine::from_file_or_new(config, &args.state);
    if let Err(e) = load_dictionary(&engine, &args.dictionary) {
        eprintln!("[ERROR] {}", e);
        return ExitCode::FAILURE;
    }
    if let Some(path) = &args.ngrams {
        if let Err(e) = load_ngrams(&engine, path) {
            eprintln!("[ERROR] {}", e);
            return ExitCode::FAILURE;
        }
    }

    let session = run(&engine);
    if let Err(e) = session {
        eprintln!("[ERROR] Terminal session failed: {}", e);
    }

    println!("Saving personal state...");
    match engine.save() {
        Ok(()) => println!("Personal state saved to '{}'", args.state.display()),
        Err(e) => eprintln!("[ERROR] Could not save personal state: {}", e),
    }
    ExitCode::SUCCESS
}

fn load_dictionary(engine: &NlpEngine, path: &Path) -> io::Result<()> {
    let payload = std::fs::read_to_string(path)?;
    if !engine.load_dictionary(&payload) {
        let message = format!("{} is not a usable dictionary", path.display());
        return Err(io::Error::new(io::ErrorKind::InvalidData, message));
    }
    Ok(())
}

fn load_ngrams(engine: &NlpEngine, path: &Path) -> io::Result<()> {
    let payload = std::fs::read_to_string(path)?;
    let language = engine.config().language.default_language.clone();
    if !engine.load_ngrams_for_language(&language, &payload) {
        let message = format!("{} is not a usable n-gram table", path.display());
        return Err(io::Error::new(io::ErrorKind::InvalidData, message));
    }
    Ok(())
}

/// Typing state of the simulated keyboard.
#[derive(Default)]
struct Session {
    preedit: String,
    committed: Vec<String>,
    last_check: Option<(String, SpellingResult)>,
    status: String,
}

impl Session {
    fn context(&self) -> &[String] {
        let start = self.committed.len().saturating_sub(HISTORY_LEN);
        &self.committed[start..]
    }

    /// Commits `word`, teaches it to the engine and clears the preedit. The
    /// recent text then picks the active dictionary.
    fn commit(&mut self, engine: &NlpEngine, word: String) {
        engine.learn_word(&word, self.context());
        self.status = format!("Committed '{}'", word);
        self.committed.push(word);
        self.preedit.clear();
        engine.select_language_for(&self.context().join(" "));
    }

    /// Space or Enter: spell-check the preedit and auto-correct when the top
    /// correction is eligible.
    fn finish_word(&mut self, engine: &NlpEngine) {
        if self.preedit.is_empty() {
            return;
        }
        let typed = self.preedit.clone();
        let check = engine.spell_check(&typed, self.context(), SUGGESTION_COUNT);
        let word = match check.as_ref().and_then(|r| r.suggestions.first()) {
            Some(top) if top.is_eligible_for_auto_commit => top.text.clone(),
            _ => typed.clone(),
        };
        if let Some(result) = check {
            self.last_check = Some((typed, result));
        }
        self.commit(engine, word);
    }

    fn accept_suggestion(&mut self, engine: &NlpEngine, suggestions: &[Candidate], index: usize) {
        if let Some(candidate) = suggestions.get(index) {
            self.commit(engine, candidate.text.clone());
        }
    }

    fn penalize_last(&mut self, engine: &NlpEngine) {
        if let Some(word) = self.committed.last() {
            engine.penalize_word(word);
            self.status = format!("Penalized '{}' (now {})", word, engine.frequency_of(word));
        }
    }

    fn remove_last(&mut self, engine: &NlpEngine) {
        if let Some(word) = self.committed.pop() {
            let removed = engine.remove_word(&word);
            self.status = format!("Removed '{}': {}", word, removed);
        }
    }
}

fn run(engine: &NlpEngine) -> io::Result<()> {
    let mut out = stdout();
    terminal::enable_raw_mode()?;
    execute!(out, EnterAlternateScreen)?;
    let result = event_loop(engine, &mut out);
    execute!(out, LeaveAlternateScreen)?;
    terminal::disable_raw_mode()?;
    result
}

fn event_loop(engine: &NlpEngine, out: &mut impl Write) -> io::Result<()> {
    let mut session = Session::default();
    loop {
        // With nothing typed yet, the candidate bar shows next-word predictions.
        let suggestions = if session.preedit.is_empty() {
            engine.predict_next_word(session.context(), SUGGESTION_COUNT)
        } else {
            engine.suggest(&session.preedit, session.context(), SUGGESTION_COUNT)
        };
        render(out, engine, &session, &suggestions)?;

        let Event::Key(KeyEvent { code, modifiers, kind, .. }) = event::read()? else {
            continue;
        };
        if kind != KeyEventKind::Press {
            continue;
        }
        let ctrl = modifiers.contains(KeyModifiers::CONTROL);
        match code {
            KeyCode::Esc => break,
            KeyCode::Char('c') if ctrl => break,
            KeyCode::Char('p') if ctrl => session.penalize_last(engine),
            KeyCode::Char('r') if ctrl => session.remove_last(engine),
            KeyCode::Char('x') if ctrl => {
                engine.reset_all();
                session.status = "Personal state reset".to_string();
            }
            KeyCode::Char(' ') | KeyCode::Enter => session.finish_word(engine),
            KeyCode::Tab => session.accept_suggestion(engine, &suggestions, 0),
            KeyCode::F(n @ 1..=5) => session.accept_suggestion(engine, &suggestions, usize::from(n - 1)),
            KeyCode::Backspace => {
                session.preedit.pop();
            }
            KeyCode::Char(c) if !ctrl => session.preedit.push(c),
            _ => {}
        }
    }
    Ok(())
}

fn render(
    out: &mut impl Write,
    engine: &NlpEngine,
    session: &Session,
    suggestions: &[Candidate],
) -> io::Result<()> {
    let mut lines = vec![
        "Smart Keyboard Simulator".to_string(),
        "-------------------------------------------------------------".to_string(),
        "Space/Enter commit (auto-corrects), Tab or F1-F5 pick a suggestion,".to_string(),
        "Ctrl-P penalize last word, Ctrl-R remove it, Ctrl-X reset, Esc quit.".to_string(),
        String::new(),
        format!("Text:      {}", session.committed.join(" ")),
        format!("Pre-edit:  [{}]", session.preedit),
        format!(
            "Language:  {:?} (dictionary {})",
            engine.detect_language(&session.committed.join(" ")),
            engine.active_language()
        ),
        String::new(),
    ];

    let heading = if session.preedit.is_empty() { "Next word:" } else { "Suggestions:" };
    if suggestions.is_empty() {
        lines.push("No suggestions.".to_string());
    } else {
        lines.push(heading.to_string());
        for (i, candidate) in suggestions.iter().enumerate() {
            let marker = if candidate.is_eligible_for_auto_commit { "*" } else { " " };
            lines.push(format!("  F{}{} {} ({:.3})", i + 1, marker, candidate.text, candidate.confidence));
        }
    }

    if let Some((typed, result)) = &session.last_check {
        lines.push(String::new());
        let verdict = if result.is_valid {
            "valid"
        } else if result.is_typo {
            "typo"
        } else {
            "unknown"
        };
        let corrections: Vec<&str> = result.suggestions.iter().map(|c| c.text.as_str()).collect();
        lines.push(format!("Last check: '{}' is {} {:?}", typed, verdict, corrections));
    }
    if !session.status.is_empty() {
        lines.push(String::new());
        lines.push(session.status.clone());
    }

    queue!(out, Clear(ClearType::All))?;
    for (row, line) in lines.iter().enumerate() {
        let row = u16::try_from(row).unwrap_or(u16::MAX);
        queue!(out, MoveTo(0, row), Print(line))?;
    }
    out.flush()
}
