use crate::error::{
    ErrorContext, GrammarErrors, ParseFault, ParseOutput, RecognitionError, RecognitionErrorKind,
    Recovery,
};
use crate::grammar::{
    AcceptFn, Alternation, AnalyzedGrammar, ArgValue, CallArgs, DecisionKind, FollowKey,
    GrammarDefinition, Guard, GuardContext, OptionalProd, Production, Reference, Repetition, Rule,
    TokenSet, analyzed,
};
use crate::lexer::{Token, TokenCursor};
use crate::lookahead::{Decision, NextTerminal};
use crate::parser::recovery::{self, InRuleRepair};
use crate::parser::state::{Frame, RecognizerPhase, Session};
use crate::parser::{NullEventHandler, ParseEvent, ParseEventHandler, ParserConfig};
use crate::syntax::{ParseTree, TokenKind};
use compact_str::CompactString;
use std::sync::Arc;
use std::time::Instant;

/// Why a production stopped early.
enum Unwind {
    /// A syntax error was recorded; an enclosing rule may resync.
    Recognition,
    /// Abort the whole parse.
    Fault(ParseFault),
}

impl From<ParseFault> for Unwind {
    fn from(fault: ParseFault) -> Self {
        Self::Fault(fault)
    }
}

type Step<T> = Result<T, Unwind>;

/// Recursive-descent recognizer driven by an [`AnalyzedGrammar`].
///
/// A parser owns its input and session state; the grammar is shared. The
/// same instance can be reused for any number of inputs through
/// [`Parser::set_input`] or [`Parser::parse_tokens`].
///
/// # Example
///
/// ```rust
/// use cairn::grammar::{GrammarBuilder, Production};
/// use cairn::lexer::Token;
/// use cairn::parser::{Parser, ParserConfig};
/// use cairn::syntax::{TextRange, TextSize, TokenKind};
/// # #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// # enum Kind { Ident, Dot, Eof }
/// # impl TokenKind for Kind { fn eof() -> Self { Kind::Eof } }
///
/// let grammar = GrammarBuilder::new()
///     .rule(
///         "qualifiedName",
///         [
///             Production::token(Kind::Ident),
///             Production::star([Production::token(Kind::Dot), Production::token(Kind::Ident).at(2)]),
///         ],
///     )
///     .build()
///     .expect("grammar is well formed");
///
/// let tokens = vec![
///     Token::new(Kind::Ident, "a", TextRange::at(TextSize::from(0), TextSize::from(1))),
///     Token::new(Kind::Dot, ".", TextRange::at(TextSize::from(1), TextSize::from(1))),
///     Token::new(Kind::Ident, "b", TextRange::at(TextSize::from(2), TextSize::from(1))),
/// ];
/// let mut parser = Parser::new(grammar, ParserConfig::default());
/// let output = parser.parse_tokens(tokens).expect("no fault");
/// assert!(output.is_clean());
/// assert_eq!(output.tree.tokens().len(), 3);
/// ```
pub struct Parser<K: TokenKind> {
    grammar: Arc<AnalyzedGrammar<K>>,
    config: ParserConfig,
    handler: Box<dyn ParseEventHandler<K>>,
    session: Session<K>,
}

impl<K: TokenKind> Parser<K> {
    #[must_use]
    pub fn new(grammar: Arc<AnalyzedGrammar<K>>, config: ParserConfig) -> Self {
        Self {
            grammar,
            config,
            handler: Box::new(NullEventHandler),
            session: Session::new(Vec::new()),
        }
    }

    /// A parser for the registered grammar `G`, analyzing it on first use.
    ///
    /// # Errors
    ///
    /// The cached grammar errors of `G`.
    pub fn for_definition<G: GrammarDefinition<Kind = K>>(
        config: ParserConfig,
    ) -> Result<Self, GrammarErrors> {
        Ok(Self::new(analyzed::<G>()?, config))
    }

    #[must_use]
    pub fn with_event_handler(mut self, handler: impl ParseEventHandler<K> + 'static) -> Self {
        self.handler = Box::new(handler);
        self
    }

    /// Replace the input and clear all results of earlier parses.
    pub fn set_input(&mut self, tokens: Vec<Token<K>>) {
        self.session = Session::new(tokens);
    }

    /// Rewind to the start of the current input.
    pub fn reset(&mut self) {
        self.session.rewind();
    }

    /// Parse the current input from the grammar's entry point.
    ///
    /// # Errors
    ///
    /// Only [`ParseFault`]s. Syntax errors are reported in
    /// [`ParseOutput::errors`].
    pub fn parse(&mut self) -> Result<ParseOutput<K>, ParseFault> {
        let entry = CompactString::from(self.grammar.entry_point());
        self.parse_rule(&entry, &[])
    }

    /// Replace the input and parse it from the entry point.
    ///
    /// # Errors
    ///
    /// As for [`Parser::parse`].
    pub fn parse_tokens(&mut self, tokens: Vec<Token<K>>) -> Result<ParseOutput<K>, ParseFault> {
        self.set_input(tokens);
        self.parse()
    }

    /// Parse the current input starting from `rule`, passing it `args`.
    /// Every call starts over from the first token.
    ///
    /// # Errors
    ///
    /// [`ParseFault::UnknownRule`] when `rule` or a rule it needs is not
    /// defined, and [`ParseFault::RecursionLimit`] when rule nesting
    /// exceeds [`ParserConfig::max_depth`].
    pub fn parse_rule(&mut self, rule: &str, args: &[ArgValue]) -> Result<ParseOutput<K>, ParseFault> {
        let started = Instant::now();
        self.session.rewind();
        self.session.phase = RecognizerPhase::Running;

        let mut recognizer = Recognizer {
            grammar: &self.grammar,
            config: &self.config,
            handler: self.handler.as_mut(),
            session: &mut self.session,
        };
        let outcome = recognizer.start(rule, args);
        self.session.metrics.parse_time = started.elapsed();

        match outcome {
            Ok(tree) => Ok(ParseOutput {
                tree,
                errors: self.session.errors.clone(),
                metrics: self.session.metrics.clone(),
            }),
            Err(fault) => {
                self.session.phase = RecognizerPhase::Failed;
                Err(fault)
            }
        }
    }

    /// Syntax errors of the last parse.
    #[must_use]
    pub fn errors(&self) -> &[RecognitionError<K>] {
        &self.session.errors
    }

    #[must_use]
    pub const fn phase(&self) -> RecognizerPhase {
        self.session.phase
    }

    #[must_use]
    pub const fn cursor(&self) -> &TokenCursor<K> {
        &self.session.cursor
    }

    #[must_use]
    pub const fn grammar(&self) -> &Arc<AnalyzedGrammar<K>> {
        &self.grammar
    }

    #[must_use]
    pub const fn config(&self) -> &ParserConfig {
        &self.config
    }
}

/// One parse in progress. Borrows the grammar separately from the session
/// so productions can be walked while state changes.
struct Recognizer<'g, K: TokenKind> {
    grammar: &'g AnalyzedGrammar<K>,
    config: &'g ParserConfig,
    handler: &'g mut dyn ParseEventHandler<K>,
    session: &'g mut Session<K>,
}

impl<'g, K: TokenKind> Recognizer<'g, K> {
    fn start(&mut self, name: &str, args: &[ArgValue]) -> Result<ParseTree<K>, ParseFault> {
        let rule = self
            .grammar
            .rule(name)
            .ok_or_else(|| ParseFault::UnknownRule(name.into()))?;
        let tree = match self.invoke_rule(rule, 1, Arc::from(args)) {
            Ok(tree) => tree,
            Err(Unwind::Fault(fault)) => return Err(fault),
            Err(Unwind::Recognition) => ParseTree::Node {
                rule: rule.name().into(),
                children: Vec::new(),
                recovered: true,
            },
        };

        if !self.session.cursor.is_at_end() {
            let token = self.session.cursor.la(1).clone();
            let found = token.text.clone();
            self.record(RecognitionErrorKind::NotAllInputConsumed { found }, token, None);
        }
        if self.session.phase != RecognizerPhase::Failed {
            self.session.phase = RecognizerPhase::Done;
        }
        Ok(tree)
    }

    fn emit(&mut self, event: impl FnOnce() -> ParseEvent<K>) {
        if self.config.trace_events {
            self.handler.handle(event());
        }
    }

    fn resume_phase(&mut self) {
        self.session.phase = if self.session.is_backtracking() {
            RecognizerPhase::Backtracking
        } else {
            RecognizerPhase::Running
        };
    }

    fn guard_context(&self) -> GuardContext<'_, K> {
        GuardContext::new(&self.session.cursor, self.session.args(), self.grammar)
    }

    fn evaluate_args(&self, args: &CallArgs<K>) -> Arc<[ArgValue]> {
        Arc::from(args.evaluate(&self.guard_context()))
    }

    /// Decision of a production in the innermost live rule.
    fn decision(&self, kind: DecisionKind, occurrence: u32) -> Option<&'g Decision<K>> {
        let rule = self.session.current_rule()?;
        self.grammar.decision(rule.name(), kind, occurrence)
    }

    fn invoke_rule(
        &mut self,
        rule: &Arc<Rule<K>>,
        occurrence: u32,
        args: Arc<[ArgValue]>,
    ) -> Step<ParseTree<K>> {
        let limit = self.config.max_depth;
        if self.session.frames.len() >= limit {
            return Err(ParseFault::RecursionLimit {
                rule: rule.name().into(),
                limit,
            }
            .into());
        }

        let position = self.session.cursor.position();
        self.session.frames.push(Frame {
            rule: Arc::clone(rule),
            occurrence,
            args,
            children: Vec::new(),
        });
        let depth = self.session.frames.len();
        self.session.metrics.max_depth = self.session.metrics.max_depth.max(depth);
        self.emit(|| ParseEvent::EnterRule {
            rule: rule.name().into(),
            position,
        });

        let outcome = match self.run_items(rule.body()) {
            Ok(()) => Ok(false),
            Err(Unwind::Recognition) => self.rule_catch(rule),
            Err(fault) => Err(fault),
        };
        let children = self
            .session
            .frames
            .pop()
            .map(|frame| frame.children)
            .unwrap_or_default();
        let recovered = matches!(outcome, Ok(true));
        self.emit(|| ParseEvent::ExitRule {
            rule: rule.name().into(),
            recovered,
        });
        outcome?;

        let tree = ParseTree::Node {
            rule: rule.name().into(),
            children,
            recovered,
        };
        Ok(if recovered {
            rule.options().recovery_value(tree)
        } else {
            tree
        })
    }

    /// Handle a syntax error that escaped the body of the innermost rule.
    /// Returns `true` when the rule recovered.
    fn rule_catch(&mut self, rule: &Rule<K>) -> Step<bool> {
        let first_invoked = self.session.frames.len() == 1;
        let may_resync = (rule.options().resync_enabled() || first_invoked)
            && !self.session.is_backtracking()
            && self.config.error_recovery;

        if may_resync {
            let follows = self.resync_follows();
            let kind = recovery::find_resync_kind(&self.session.cursor, &follows);
            let current = self.frame_follows(self.session.frames.len() - 1);
            if !current.matches(kind) {
                return Err(Unwind::Recognition);
            }
            self.session.phase = RecognizerPhase::Recovering;
            let skipped = recovery::resync_to(&mut self.session.cursor, kind);
            self.resume_phase();
            if let Some(error) = self.session.errors.last_mut()
                && error.context.recovery.is_none()
            {
                error.context.recovery = Some(Recovery::Resync { skipped });
            }
            self.note_recovery(Recovery::Resync { skipped });
            Ok(true)
        } else if first_invoked && !self.session.is_backtracking() {
            self.session.cursor.move_to_end();
            self.session.phase = RecognizerPhase::Failed;
            Ok(true)
        } else {
            Err(Unwind::Recognition)
        }
    }

    /// Follow set of the call that entered frame `index`. The outermost
    /// frame is followed by end of input.
    fn frame_follows(&self, index: usize) -> TokenSet<K> {
        let frames = &self.session.frames;
        match index.checked_sub(1).and_then(|caller| frames.get(caller)) {
            None => [K::eof()].into_iter().collect(),
            Some(caller) => {
                let frame = &frames[index];
                let key = FollowKey::new(frame.rule.name(), frame.occurrence, caller.rule.name());
                self.grammar.follow_set(&key).cloned().unwrap_or_default()
            }
        }
    }

    /// Union of the follow sets of every live call.
    fn resync_follows(&self) -> TokenSet<K> {
        let mut all = TokenSet::new();
        for index in 0..self.session.frames.len() {
            all.extend(&self.frame_follows(index));
        }
        all
    }

    /// Tokens that may follow the terminal `kind` at `occurrence` in the
    /// innermost rule, given the live call chain. End of input is included
    /// when the rest of the chain can be empty.
    fn follows_after(&self, kind: K, occurrence: u32) -> Step<TokenSet<K>> {
        let Some((root, calls)) = self.session.frames.split_first() else {
            return Ok(TokenSet::new());
        };
        let found = self.grammar.tokens_after(
            root.rule.name(),
            calls.iter().map(|frame| (frame.rule.name(), frame.occurrence)),
            kind,
            occurrence,
        )?;
        let mut tokens = found.tokens;
        if found.reaches_end {
            tokens.insert(K::eof());
        }
        Ok(tokens)
    }

    fn record(&mut self, kind: RecognitionErrorKind<K>, token: Token<K>, recovery: Option<Recovery>) {
        let previous = self.session.cursor.previous().cloned();
        self.push_error(kind, token, previous, recovery);
    }

    fn push_error(
        &mut self,
        kind: RecognitionErrorKind<K>,
        token: Token<K>,
        previous: Option<Token<K>>,
        recovery: Option<Recovery>,
    ) {
        let context = ErrorContext {
            rule_stack: self.session.rule_stack(),
            recovery,
        };
        self.session.errors.push(RecognitionError {
            kind,
            token,
            previous,
            context,
        });
        if let Some(recovery) = recovery {
            self.note_recovery(recovery);
        }
    }

    fn note_recovery(&mut self, recovery: Recovery) {
        self.session.metrics.errors_recovered += 1;
        let rule = self
            .session
            .current_rule()
            .map(|rule| CompactString::from(rule.name()))
            .unwrap_or_default();
        self.emit(|| ParseEvent::Recovered { rule, recovery });
    }

    fn mismatch(&mut self, expected: K, found: Token<K>, recovery: Option<Recovery>) {
        let kind = RecognitionErrorKind::MismatchedToken {
            expected,
            found: found.text.clone(),
        };
        self.record(kind, found, recovery);
    }

    fn push_token(&mut self, token: Token<K>) {
        if !token.inserted {
            self.session.metrics.tokens_consumed += 1;
        }
        self.emit(|| ParseEvent::ConsumeToken {
            kind: token.kind,
            text: token.text.clone(),
        });
        self.session.push_child(ParseTree::Token(token));
    }

    fn run_items(&mut self, items: &[Production<K>]) -> Step<()> {
        for item in items {
            self.run(item)?;
        }
        Ok(())
    }

    fn run(&mut self, prod: &Production<K>) -> Step<()> {
        match prod {
            Production::Terminal(terminal) => self.consume(terminal.kind, terminal.occurrence),
            Production::Reference(reference) => self.call(reference),
            Production::Sequence(items) => self.run_items(items),
            Production::Optional(opt) => self.optional(opt),
            Production::ZeroOrMore(rep) => self.repetition(rep, DecisionKind::ZeroOrMore),
            Production::OneOrMore(rep) => self.repetition(rep, DecisionKind::OneOrMore),
            Production::Alternation(alt) => self.alternation(alt),
        }
    }

    fn consume(&mut self, kind: K, occurrence: u32) -> Step<()> {
        if self.session.cursor.la(1).matches(kind) {
            let token = self.session.cursor.advance();
            self.push_token(token);
            return Ok(());
        }

        let found = self.session.cursor.la(1).clone();
        if self.config.error_recovery && !self.session.is_backtracking() {
            let follows = self.follows_after(kind, occurrence)?;
            match recovery::single_token_repair(&self.session.cursor, kind, &follows) {
                Some(InRuleRepair::Insert(token)) => {
                    self.mismatch(kind, found, Some(Recovery::SingleTokenInsertion));
                    self.push_token(token);
                    return Ok(());
                }
                Some(InRuleRepair::Delete) => {
                    self.mismatch(kind, found, Some(Recovery::SingleTokenDeletion));
                    self.session.cursor.skip();
                    let token = self.session.cursor.advance();
                    self.push_token(token);
                    return Ok(());
                }
                None => {}
            }
        }
        self.mismatch(kind, found, None);
        Err(Unwind::Recognition)
    }

    fn call(&mut self, reference: &Reference<K>) -> Step<()> {
        let tree = match reference.definition() {
            Some(rule) => {
                let args = self.evaluate_args(&reference.args);
                self.invoke_rule(&rule, reference.occurrence, args)?
            }
            // An unresolved call matches the empty input.
            None => ParseTree::node(reference.name.clone(), Vec::new()),
        };
        self.session.push_child(tree);
        Ok(())
    }

    fn check_guard(&mut self, guard: &Guard<K>) -> Step<bool> {
        match guard {
            Guard::When(predicate) => Ok(predicate(&self.guard_context())),
            Guard::Backtrack { rule, args, accept } => self.backtrack(rule, args, accept.as_ref()),
        }
    }

    /// Whether an optional or repetition body should be entered.
    fn enters(&mut self, guard: Option<&Guard<K>>, decision: Option<&'g Decision<K>>) -> Step<bool> {
        match guard {
            Some(guard) => self.check_guard(guard),
            None => Ok(decision.is_some_and(|decision| decision.accepts(&self.session.cursor))),
        }
    }

    /// Run `name` speculatively and roll every effect back.
    fn backtrack(
        &mut self,
        name: &str,
        args: &CallArgs<K>,
        accept: Option<&AcceptFn<K>>,
    ) -> Step<bool> {
        let rule = self
            .grammar
            .rule(name)
            .ok_or_else(|| ParseFault::UnknownRule(name.into()))?;
        let args = self.evaluate_args(args);
        let snapshot = self.session.snapshot();
        let phase = self.session.phase;

        self.session.backtracking += 1;
        self.session.metrics.backtracks += 1;
        self.session.phase = RecognizerPhase::Backtracking;
        let outcome = self.invoke_rule(rule, 0, args);
        self.session.backtracking -= 1;
        self.session.restore(snapshot);
        self.session.phase = phase;

        let accepted = match outcome {
            Ok(tree) => accept.is_none_or(|accept| accept(&tree)),
            Err(Unwind::Recognition) => false,
            Err(fault) => return Err(fault),
        };
        self.emit(|| ParseEvent::Backtrack {
            rule: name.into(),
            accepted,
        });
        Ok(accepted)
    }

    fn optional(&mut self, opt: &OptionalProd<K>) -> Step<()> {
        let decision = self.decision(DecisionKind::Optional, opt.occurrence);
        if self.enters(opt.guard.as_ref(), decision)? {
            self.run_items(&opt.body)?;
        }
        Ok(())
    }

    fn repetition(&mut self, rep: &Repetition<K>, kind: DecisionKind) -> Step<()> {
        let decision = self.decision(kind, rep.occurrence);
        if self.enters(rep.guard.as_ref(), decision)? {
            self.run_items(&rep.body)?;
            self.repetition_tail(rep, decision)
        } else if kind == DecisionKind::OneOrMore {
            let token = self.session.cursor.la(1).clone();
            let error = RecognitionErrorKind::EarlyExit {
                expected: decision.map(Decision::expected).unwrap_or_default(),
                label: rep.label.clone(),
                found: token.text.clone(),
            };
            self.record(error, token, None);
            Err(Unwind::Recognition)
        } else {
            self.recover_in_repetition(rep, decision)
        }
    }

    /// Iterations after the first, then in-repetition recovery.
    fn repetition_tail(&mut self, rep: &Repetition<K>, decision: Option<&'g Decision<K>>) -> Step<()> {
        match rep.separator {
            Some(separator) => {
                while self.session.cursor.la(1).matches(separator) {
                    let token = self.session.cursor.advance();
                    self.push_token(token);
                    self.run_items(&rep.body)?;
                }
            }
            None => {
                while self.enters(rep.guard.as_ref(), decision)? {
                    let before = self.session.cursor.position();
                    self.run_items(&rep.body)?;
                    if self.session.cursor.position() == before {
                        break;
                    }
                }
            }
        }
        self.recover_in_repetition(rep, decision)
    }

    /// After a repetition stops, skip ahead to a point where it can go on,
    /// unless the token after it in the rule is next or a single-token
    /// repair will handle the mismatch. Gives up without consuming anything
    /// when a resync token comes first.
    fn recover_in_repetition(
        &mut self,
        rep: &Repetition<K>,
        decision: Option<&'g Decision<K>>,
    ) -> Step<()> {
        if !self.config.error_recovery || self.session.is_backtracking() {
            return Ok(());
        }
        let Some(next) = decision.and_then(Decision::next_terminal) else {
            return Ok(());
        };
        let (expected, occurrence) = match next {
            NextTerminal::Token { kind, occurrence } => (kind, occurrence),
            NextTerminal::EndOfRule if self.session.frames.len() == 1 => (K::eof(), 1),
            NextTerminal::EndOfRule | NextTerminal::Other => return Ok(()),
        };
        if self.session.cursor.la(1).matches(expected) {
            return Ok(());
        }
        let follows = self.follows_after(expected, occurrence)?;
        if recovery::single_token_repair(&self.session.cursor, expected, &follows).is_some() {
            return Ok(());
        }

        let resync = recovery::find_resync_kind(&self.session.cursor, &self.resync_follows());
        let checkpoint = self.session.cursor.checkpoint();
        let previous = self.session.cursor.previous().cloned();
        let found = self.session.cursor.la(1).clone();
        let mut skipped = 0;
        self.session.phase = RecognizerPhase::Recovering;
        loop {
            let next = self.session.cursor.la(1).kind;
            let resumes = next.is_a(expected)
                || (skipped > 0
                    && match rep.separator {
                        Some(separator) => next.is_a(separator),
                        None => self.enters(rep.guard.as_ref(), decision)?,
                    });
            if resumes {
                self.resume_phase();
                let error = RecognitionErrorKind::MismatchedToken {
                    expected,
                    found: found.text.clone(),
                };
                self.push_error(error, found, previous, Some(Recovery::InRepetition { skipped }));
                if next.is_a(expected) {
                    return Ok(());
                }
                return self.repetition_tail(rep, decision);
            }
            if next == resync || self.session.cursor.is_at_end() {
                break;
            }
            self.session.cursor.skip();
            skipped += 1;
        }
        self.session.cursor.restore(checkpoint);
        self.resume_phase();
        Ok(())
    }

    fn alternation(&mut self, alt: &Alternation<K>) -> Step<()> {
        let decision = self.decision(DecisionKind::Alternation, alt.occurrence);
        let chosen = if alt.is_guarded() {
            let mut chosen = None;
            for (index, branch) in alt.branches.iter().enumerate() {
                if let Some(guard) = &branch.guard
                    && self.check_guard(guard)?
                {
                    chosen = Some(index);
                    break;
                }
            }
            chosen
        } else {
            decision.and_then(|decision| decision.select(&self.session.cursor))
        };

        match chosen.and_then(|index| alt.branches.get(index)) {
            Some(branch) => self.run_items(&branch.sequence),
            None => {
                let token = self.session.cursor.la(1).clone();
                let error = RecognitionErrorKind::NoViableAlternative {
                    expected: decision.map(Decision::expected).unwrap_or_default(),
                    label: alt.label.clone(),
                    found: token.text.clone(),
                };
                self.record(error, token, None);
                Err(Unwind::Recognition)
            }
        }
    }
}
