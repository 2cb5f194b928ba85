//! Terminal abstraction used by [`IoUtils`](super::IoUtils).

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use console::Term;

/// A line-oriented terminal.
pub trait Console {
    /// Whether output is going to an interactive terminal (enables colors)
    fn is_tty(&self) -> bool;

    /// Write text exactly as given (no newline is appended)
    fn write(&mut self, text: &str) -> io::Result<()>;

    /// Read one line of input.
    ///
    /// Returns `Ok(None)` when input ended or the operator pressed Ctrl-C.
    fn read_line(&mut self) -> io::Result<Option<String>>;
}

/// How often a pending prompt checks for Ctrl-C
const INTERRUPT_POLL: Duration = Duration::from_millis(50);

/// Lines from an input, read on a background thread so that a waiting
/// prompt can give up as soon as the operator presses Ctrl-C.
struct LineReader {
    lines: Receiver<io::Result<Option<String>>>,
}

impl LineReader {
    fn spawn<R: BufRead + Send + 'static>(mut input: R) -> Self {
        let (sender, lines) = mpsc::channel();
        thread::spawn(move || loop {
            let mut buf = String::new();
            let line = match input.read_line(&mut buf) {
                Ok(0) => Ok(None),
                Ok(_) => Ok(Some(buf)),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => Err(e),
            };
            let more = matches!(line, Ok(Some(_)));
            if sender.send(line).is_err() || !more {
                break;
            }
        });
        LineReader { lines }
    }

    /// The next line, or `Ok(None)` at end of input or once `interrupted` is raised.
    ///
    /// A line typed after an interruption is kept for the next call.
    fn next_line(&self, interrupted: &AtomicBool) -> io::Result<Option<String>> {
        loop {
            if interrupted.swap(false, Ordering::SeqCst) {
                return Ok(None);
            }
            match self.lines.recv_timeout(INTERRUPT_POLL) {
                Ok(line) => return line,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Ok(None),
            }
        }
    }
}

/// The process's stdout/stdin.
pub struct StdConsole {
    term: Term,
    interrupted: Arc<AtomicBool>,
    input: Option<LineReader>,
}

impl StdConsole {
    /// Create a console on stdout and install a SIGINT flag so that Ctrl-C at a
    /// prompt is reported as an interruption instead of killing the process.
    pub fn new() -> Self {
        let interrupted = Arc::new(AtomicBool::new(false));
        if let Err(e) = signal_hook::flag::register(
            signal_hook::consts::SIGINT,
            Arc::clone(&interrupted),
        ) {
            tracing::warn!("Could not install interrupt handler: {}", e);
        }

        StdConsole {
            term: Term::stdout(),
            interrupted,
            input: None,
        }
    }
}

impl Default for StdConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl Console for StdConsole {
    fn is_tty(&self) -> bool {
        self.term.is_term()
    }

    fn write(&mut self, text: &str) -> io::Result<()> {
        self.term.write_str(text)?;
        self.term.flush()
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        io::stdout().flush()?;

        // Stdin is only read once something actually prompts
        let input = self
            .input
            .get_or_insert_with(|| LineReader::spawn(io::BufReader::new(io::stdin())));
        let line = input.next_line(&self.interrupted)?;

        if line.is_none() {
            // Leave the cursor on a fresh line after ^C / ^D
            self.term.write_line("")?;
        }
        Ok(line)
    }
}

#[derive(Debug, Default)]
struct Transcript {
    answers: VecDeque<String>,
    output: String,
    prompts: Vec<String>,
}

/// Console with pre-recorded answers, capturing everything written to it.
///
/// Clones share the same transcript, so a test can hand one clone to the task
/// and inspect the other afterwards. Once the answers run out, every further
/// prompt reads as an interruption.
#[derive(Debug, Clone, Default)]
pub struct ScriptedConsole {
    state: Arc<Mutex<Transcript>>,
    tty: bool,
}

impl ScriptedConsole {
    pub fn new(answers: &[&str]) -> Self {
        let transcript = Transcript {
            answers: answers.iter().map(|a| a.to_string()).collect(),
            ..Transcript::default()
        };
        ScriptedConsole {
            state: Arc::new(Mutex::new(transcript)),
            tty: false,
        }
    }

    /// Pretend to be an interactive terminal.
    pub fn with_tty(mut self) -> Self {
        self.tty = true;
        self
    }

    /// Everything written so far
    pub fn output(&self) -> String {
        self.lock().output.clone()
    }

    /// The prompt text shown before each read, in order
    pub fn prompts(&self) -> Vec<String> {
        self.lock().prompts.clone()
    }

    /// Answers that were never consumed
    pub fn remaining_answers(&self) -> usize {
        self.lock().answers.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Transcript> {
        // A poisoned transcript only happens after a panicking test thread.
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Console for ScriptedConsole {
    fn is_tty(&self) -> bool {
        self.tty
    }

    fn write(&mut self, text: &str) -> io::Result<()> {
        self.lock().output.push_str(text);
        Ok(())
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut state = self.lock();
        let prompt = match state.output.rfind('\n') {
            Some(idx) => state.output[idx + 1..].trim_end().to_string(),
            None => state.output.trim_end().to_string(),
        };
        state.prompts.push(prompt);

        let answer = state.answers.pop_front();
        if let Some(ref a) = answer {
            state.output.push_str(a);
            state.output.push('\n');
        }
        Ok(answer.map(|a| format!("{}\n", a)))
    }
}
