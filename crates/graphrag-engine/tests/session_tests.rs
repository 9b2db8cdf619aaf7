use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use graphrag_core::traits::{AnswerGenerator, QueryRouter};
use graphrag_core::types::{RetrievedDocument, RouteAnalysis, SourceKind, Strategy};
use graphrag_core::{Error, Result};
use graphrag_engine::session::{is_exit_command, FAREWELL};
use graphrag_engine::{ExitReason, InputSource, InteractiveSession, SessionInput};

/// Replays events; a raised interrupt flag outranks anything still queued.
struct Scripted {
    events: VecDeque<SessionInput>,
    interrupt: Rc<Cell<bool>>,
}

impl Scripted {
    fn lines(lines: &[&str]) -> Self {
        Scripted {
            events: lines.iter().map(|l| SessionInput::Line(l.to_string())).collect(),
            interrupt: Rc::default(),
        }
    }

    fn then(mut self, event: SessionInput) -> Self {
        self.events.push_back(event);
        self
    }
}

impl InputSource for Scripted {
    fn next_input(&mut self) -> SessionInput {
        if self.interrupt.get() {
            return SessionInput::Interrupt;
        }
        self.events.pop_front().unwrap_or(SessionInput::Closed)
    }

    fn interrupted(&self) -> bool {
        self.interrupt.get()
    }
}

/// Fails on questions containing "boom", answers everything else from one
/// chunk. With `interrupt_on_route` set it raises Ctrl-C while routing.
#[derive(Default)]
struct StubRouter {
    questions: RefCell<Vec<(String, usize)>>,
    interrupt_on_route: Option<Rc<Cell<bool>>>,
}

impl QueryRouter for StubRouter {
    fn route_query(&self, question: &str, top_k: usize) -> Result<(Vec<RetrievedDocument>, RouteAnalysis)> {
        self.questions.borrow_mut().push((question.to_string(), top_k));
        if let Some(flag) = &self.interrupt_on_route {
            flag.set(true);
        }
        if question.contains("boom") {
            return Err(Error::ExternalService("routing model timed out".to_string()));
        }
        let doc = RetrievedDocument {
            chunk_id: Some("chunk_0".to_string()),
            title: "Document chunk 0".to_string(),
            content: "Blanch the pork belly first.".to_string(),
            score: 0.91,
            source: SourceKind::Vector,
        };
        Ok((vec![doc], RouteAnalysis::new(Strategy::Hybrid, 0.876, "specific question")))
    }
}

#[derive(Default)]
struct StubGenerator {
    calls: Cell<usize>,
    fail_on: Option<&'static str>,
}

impl AnswerGenerator for StubGenerator {
    fn generate_adaptive_answer(&self, question: &str, documents: &[RetrievedDocument]) -> Result<String> {
        self.calls.set(self.calls.get() + 1);
        if self.fail_on.is_some_and(|needle| question.contains(needle)) {
            return Err(Error::ExternalService("chat endpoint returned 502".to_string()));
        }
        Ok(format!("Answer to {question:?} from {} documents", documents.len()))
    }
}

fn run(input: Scripted, router: &StubRouter, generator: &StubGenerator) -> (graphrag_engine::SessionSummary, String) {
    let mut out = Vec::new();
    let summary = InteractiveSession::new(input, &mut out, 5).run(router, generator).unwrap();
    (summary, String::from_utf8(out).unwrap())
}

#[test]
fn exit_tokens_are_case_insensitive() {
    for token in ["exit", "EXIT", "Quit", "  quit  ", "退出"] {
        assert!(is_exit_command(token), "{token}");
    }
    assert!(!is_exit_command("exit now"));
    assert!(!is_exit_command(""));
}

#[test]
fn exit_command_ends_without_routing() {
    let router = StubRouter::default();
    let generator = StubGenerator::default();
    let (summary, out) = run(Scripted::lines(&["退出", "never read"]), &router, &generator);

    assert_eq!(summary.exit, ExitReason::ExitCommand);
    assert_eq!(summary.answered, 0);
    assert!(router.questions.borrow().is_empty());
    assert!(out.contains(FAREWELL));
}

#[test]
fn blank_lines_reprompt_without_collaborator_calls() {
    let router = StubRouter::default();
    let generator = StubGenerator::default();
    let (summary, _) = run(Scripted::lines(&["", "   ", "\t", "QUIT"]), &router, &generator);

    assert_eq!(summary.exit, ExitReason::ExitCommand);
    assert!(router.questions.borrow().is_empty());
    assert_eq!(generator.calls.get(), 0);
}

#[test]
fn answers_are_rendered_with_route_details() {
    let router = StubRouter::default();
    let generator = StubGenerator::default();
    let (summary, out) = run(Scripted::lines(&["  how do I braise pork?  ", "exit"]), &router, &generator);

    assert_eq!(summary.answered, 1);
    assert_eq!(router.questions.borrow()[0], ("how do I braise pork?".to_string(), 5));
    assert!(out.contains("Strategy: hybrid"), "{out}");
    assert!(out.contains("Confidence: 0.88"), "{out}");
    assert!(out.contains("Reasoning: specific question"));
    assert!(out.contains("Answer to \"how do I braise pork?\" from 1 documents"));
    assert!(out.contains(&"-".repeat(80)));
}

#[test]
fn a_failed_query_does_not_end_the_session() {
    let router = StubRouter::default();
    let generator = StubGenerator::default();
    let (summary, out) = run(Scripted::lines(&["boom", "what is mapo tofu", "exit"]), &router, &generator);

    assert_eq!(summary.exit, ExitReason::ExitCommand);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.answered, 1);
    assert_eq!(generator.calls.get(), 1, "generation skipped for the failed route");
    assert!(out.contains("Sorry"));
    assert!(out.contains("routing model timed out"));
    assert!(out.contains("Answer to \"what is mapo tofu\""));
}

#[test]
fn generation_failure_is_contained() {
    let router = StubRouter::default();
    let generator = StubGenerator { fail_on: Some("tofu"), ..StubGenerator::default() };
    let (summary, out) = run(Scripted::lines(&["tofu?", "pork?"]), &router, &generator);

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.answered, 1);
    assert_eq!(summary.exit, ExitReason::InputClosed);
    assert!(out.contains("chat endpoint returned 502"));
}

#[test]
fn interrupt_ends_with_farewell() {
    let router = StubRouter::default();
    let generator = StubGenerator::default();
    let input = Scripted::lines(&["pork?"]).then(SessionInput::Interrupt).then(SessionInput::Line("ignored".into()));
    let (summary, out) = run(input, &router, &generator);

    assert_eq!(summary.exit, ExitReason::Interrupted);
    assert_eq!(summary.answered, 1);
    assert_eq!(router.questions.borrow().len(), 1);
    assert_eq!(out.matches(FAREWELL).count(), 1);
}

#[test]
fn interrupt_during_routing_skips_generation_and_pending_lines() {
    let input = Scripted::lines(&["pork?", "tofu?"]);
    let router = StubRouter { interrupt_on_route: Some(input.interrupt.clone()), ..StubRouter::default() };
    let generator = StubGenerator::default();
    let (summary, out) = run(input, &router, &generator);

    assert_eq!(summary, graphrag_engine::SessionSummary { exit: ExitReason::Interrupted, answered: 0, failed: 0 });
    assert_eq!(router.questions.borrow().len(), 1, "typed-ahead question never routed");
    assert_eq!(generator.calls.get(), 0);
    assert!(!out.contains("Answer:"));
    assert_eq!(out.matches(FAREWELL).count(), 1);
}

#[test]
fn pending_interrupt_outranks_typed_ahead_lines() {
    let input = Scripted::lines(&["pork?", "tofu?"]);
    input.interrupt.set(true);
    let router = StubRouter::default();
    let generator = StubGenerator::default();
    let (summary, _) = run(input, &router, &generator);

    assert_eq!(summary.exit, ExitReason::Interrupted);
    assert!(router.questions.borrow().is_empty());
}

#[test]
fn end_of_input_terminates() {
    let router = StubRouter::default();
    let generator = StubGenerator::default();
    let (summary, out) = run(Scripted::lines(&[]), &router, &generator);

    assert_eq!(summary.exit, ExitReason::InputClosed);
    assert!(out.ends_with(&format!("{FAREWELL}\n")));
}
