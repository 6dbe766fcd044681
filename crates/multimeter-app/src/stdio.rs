//! Line-oriented terminal on stdin/stdout.
//!
//! Input is read on a helper thread and handed over through a channel so
//! the session loop never blocks on the tty. Output is buffered until
//! `render`, and the gauge status line is only reprinted when it changes.

use std::fs::OpenOptions;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use multimeter_core::backend::{GaugeReadout, LineKind, Terminal, TerminalEvent};
use multimeter_core::error::{MultimeterError, Result};

/// Width of each gauge bar in characters.
pub const BAR_WIDTH: usize = 20;

/// Ctrl-L, sent as a line of its own.
const FORM_FEED: &str = "\x0c";

pub struct StdioTerminal<W: Write> {
    out: W,
    input: Receiver<TerminalEvent>,
    history: Option<PathBuf>,
    pending: Vec<String>,
    status: Option<String>,
    printed_status: Option<String>,
    closed: bool,
}

impl StdioTerminal<io::Stdout> {
    /// Terminal on the process's stdin and stdout.
    pub fn new(history: Option<PathBuf>) -> Self {
        Self::with_parts(io::stdout(), spawn_reader(BufReader::new(io::stdin())), history)
    }
}

impl<W: Write> StdioTerminal<W> {
    pub fn with_parts(out: W, input: Receiver<TerminalEvent>, history: Option<PathBuf>) -> Self {
        Self {
            out,
            input,
            history,
            pending: Vec::new(),
            status: None,
            printed_status: None,
            closed: false,
        }
    }

    fn append_history(&mut self, line: &str) {
        let Some(path) = self.history.as_ref() else {
            return;
        };
        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| writeln!(file, "{line}"));
        if let Err(e) = written {
            log::warn!("history disabled: {}: {e}", path.display());
            self.history = None;
        }
    }

    fn write_out(&mut self, force_status: bool) -> io::Result<()> {
        for line in self.pending.drain(..) {
            writeln!(self.out, "{line}")?;
        }
        if let Some(status) = &self.status {
            if force_status || self.printed_status.as_ref() != Some(status) {
                writeln!(self.out, "{status}")?;
                self.printed_status = Some(status.clone());
            }
        }
        self.out.flush()
    }
}

/// Prefix marking the kind of each printed line.
pub fn prefix(kind: LineKind) -> &'static str {
    match kind {
        LineKind::Log => "",
        LineKind::Result => "< ",
        LineKind::Error => "! ",
        LineKind::Console => "> ",
        LineKind::System => "* ",
    }
}

/// `width` characters: `|` for the filled share, spaces for the rest.
pub fn render_bar(fill: f64, width: usize) -> String {
    let share = if fill.is_finite() {
        fill.clamp(0.0, 100.0) / 100.0
    } else {
        1.0
    };
    let filled = ((share * width as f64).round() as usize).min(width);
    format!("{}{}", "|".repeat(filled), " ".repeat(width - filled))
}

pub fn status_line(readout: &GaugeReadout) -> String {
    format!(
        "[{}] {}  [{}] {}",
        render_bar(readout.cpu_fill, BAR_WIDTH),
        readout.cpu_label,
        render_bar(readout.mem_fill, BAR_WIDTH),
        readout.mem_label
    )
}

/// Map one line of raw input to an event. A trailing tab asks for
/// completions of the rest of the line.
pub fn classify_input(line: &str) -> TerminalEvent {
    let line = line.trim_end_matches(['\r', '\n']);
    if line == FORM_FEED {
        TerminalEvent::Redraw
    } else if let Some(partial) = line.strip_suffix('\t') {
        TerminalEvent::Complete(partial.to_string())
    } else {
        TerminalEvent::Line(line.to_string())
    }
}

/// Read lines from `reader` on a helper thread. Invalid UTF-8 is replaced,
/// not fatal. End of input or a read error becomes a final
/// [`TerminalEvent::Interrupt`].
pub fn spawn_reader<R>(mut reader: R) -> Receiver<TerminalEvent>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    if tx.send(classify_input(&line)).is_err() {
                        return;
                    }
                },
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {},
                Err(e) => {
                    log::warn!("stdin read failed: {e}");
                    break;
                },
            }
        }
        let _ = tx.send(TerminalEvent::Interrupt);
    });
    rx
}

impl<W: Write> Terminal for StdioTerminal<W> {
    fn add_line(&mut self, kind: LineKind, text: &str) {
        self.pending.push(format!("{}{text}", prefix(kind)));
    }

    fn set_gauges(&mut self, readout: &GaugeReadout) {
        self.status = Some(status_line(readout));
    }

    fn render(&mut self) -> Result<()> {
        self.write_out(false)
            .map_err(|e| MultimeterError::Terminal(format!("write: {e}")))
    }

    fn redraw(&mut self) -> Result<()> {
        self.write_out(true)
            .map_err(|e| MultimeterError::Terminal(format!("write: {e}")))
    }

    fn poll_events(&mut self) -> Vec<TerminalEvent> {
        let mut events = Vec::new();
        while !self.closed {
            match self.input.try_recv() {
                Ok(event) => {
                    if let TerminalEvent::Line(line) = &event {
                        if !line.is_empty() {
                            self.append_history(line);
                        }
                    }
                    events.push(event);
                },
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                },
            }
        }
        events
    }
}
