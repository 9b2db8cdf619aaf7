//! The interactive question loop.
//!
//! One question at a time: route, retrieve, generate, render. A failure in
//! any step is logged and rendered as an apology; it never ends the session.
use std::io::{self, Write};

use graphrag_core::error::Error;
use graphrag_core::traits::{AnswerGenerator, QueryRouter};
use graphrag_core::types::{RetrievedDocument, RouteAnalysis};

pub const EXIT_TOKENS: &[&str] = &["exit", "quit", "退出"];
pub const FAREWELL: &str = "Thanks for using GraphRAG. Goodbye!";
pub const PROMPT: &str = "\n💬 Your question: ";
const SEPARATOR_WIDTH: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionInput {
    Line(String),
    Interrupt,
    Closed,
}

/// Source of user events. Blocks until the next one is available.
pub trait InputSource {
    fn next_input(&mut self) -> SessionInput;

    /// Whether an interrupt is pending. Checked after every collaborator call
    /// so a question in flight stops at the next step boundary.
    fn interrupted(&self) -> bool {
        false
    }
}

enum QueryOutcome {
    Answered,
    Failed(Error),
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingInput,
    Routing,
    Generating,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    ExitCommand,
    Interrupted,
    InputClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub exit: ExitReason,
    pub answered: usize,
    pub failed: usize,
}

pub fn is_exit_command(line: &str) -> bool {
    let line = line.trim();
    EXIT_TOKENS.iter().any(|t| line.eq_ignore_ascii_case(t))
}

pub struct InteractiveSession<I, W> {
    input: I,
    out: W,
    top_k: usize,
    state: SessionState,
}

impl<I: InputSource, W: Write> InteractiveSession<I, W> {
    pub fn new(input: I, out: W, top_k: usize) -> Self {
        Self { input, out, top_k, state: SessionState::AwaitingInput }
    }

    /// Runs until an exit command, an interrupt or the end of input.
    /// Only write failures on the output end the loop early.
    pub fn run<R, G>(mut self, router: &R, generator: &G) -> io::Result<SessionSummary>
    where
        R: QueryRouter + ?Sized,
        G: AnswerGenerator + ?Sized,
    {
        writeln!(self.out, "💡 Type 'exit', 'quit' or '退出' to leave.")?;
        let (mut answered, mut failed) = (0usize, 0usize);
        let exit = loop {
            self.enter(SessionState::AwaitingInput);
            write!(self.out, "{PROMPT}")?;
            self.out.flush()?;

            let question = match self.input.next_input() {
                SessionInput::Line(line) => line.trim().to_string(),
                SessionInput::Interrupt => break ExitReason::Interrupted,
                SessionInput::Closed => break ExitReason::InputClosed,
            };
            if is_exit_command(&question) {
                break ExitReason::ExitCommand;
            }
            if question.is_empty() {
                continue;
            }

            match self.answer(&question, router, generator)? {
                QueryOutcome::Answered => answered += 1,
                QueryOutcome::Interrupted => break ExitReason::Interrupted,
                QueryOutcome::Failed(e) => {
                    failed += 1;
                    tracing::error!(error = %e, question = %question, "query failed");
                    writeln!(self.out, "\n❌ Sorry, something went wrong while answering: {e}")?;
                }
            }
        };

        self.enter(SessionState::Terminated);
        if exit == ExitReason::ExitCommand {
            writeln!(self.out, "\n👋 {FAREWELL}")?;
        } else {
            writeln!(self.out, "\n\n👋 {FAREWELL}")?;
        }
        self.out.flush()?;
        tracing::info!(?exit, answered, failed, "session ended");
        Ok(SessionSummary { exit, answered, failed })
    }

    /// The io error is the terminal's; query errors live in the outcome.
    fn answer<R, G>(&mut self, question: &str, router: &R, generator: &G) -> io::Result<QueryOutcome>
    where
        R: QueryRouter + ?Sized,
        G: AnswerGenerator + ?Sized,
    {
        self.enter(SessionState::Routing);
        writeln!(self.out, "\n🤔 Thinking...")?;
        let routed = router.route_query(question, self.top_k);
        if self.input.interrupted() {
            return Ok(QueryOutcome::Interrupted);
        }
        let (docs, analysis) = match routed {
            Ok(routed) => routed,
            Err(e) => return Ok(QueryOutcome::Failed(e)),
        };
        self.render_route(&analysis, &docs)?;

        self.enter(SessionState::Generating);
        let generated = generator.generate_adaptive_answer(question, &docs);
        if self.input.interrupted() {
            return Ok(QueryOutcome::Interrupted);
        }
        let answer = match generated {
            Ok(answer) => answer,
            Err(e) => return Ok(QueryOutcome::Failed(e)),
        };
        writeln!(self.out, "\n📝 Answer:\n{answer}")?;
        writeln!(self.out, "\n{}", "-".repeat(SEPARATOR_WIDTH))?;
        Ok(QueryOutcome::Answered)
    }

    fn enter(&mut self, next: SessionState) {
        tracing::trace!(from = ?self.state, to = ?next, "session state");
        self.state = next;
    }

    fn render_route(&mut self, analysis: &RouteAnalysis, docs: &[RetrievedDocument]) -> io::Result<()> {
        writeln!(self.out, "🧭 Strategy: {}", analysis.recommended_strategy)?;
        writeln!(self.out, "📊 Confidence: {:.2}", analysis.confidence)?;
        writeln!(self.out, "🔍 Reasoning: {}", analysis.reasoning)?;
        writeln!(self.out, "📚 Retrieved {} documents", docs.len())
    }
}
