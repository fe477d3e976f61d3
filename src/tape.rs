use crate::{
    AdjointVector, ChunkPosition, ChunkVector, Config, ExternalFunction, ExternalFunctionHandle,
    ExternalFunctionLog, Index, IndexHandler, IndexLog, NestedLog, Segment, UNTRACKED,
};

/// Number of operands of a recorded statement.
pub type ArgumentCount = u8;

/// Argument count marking a statement that registers an input.
pub const INPUT_TAG: ArgumentCount = ArgumentCount::MAX;

/// Most operands a single statement may have.
pub const MAX_ARGUMENTS: usize = INPUT_TAG as usize - 1;

type StatementRecord = (Index, ArgumentCount);
type JacobianRecord = (f64, Index);

/// Left hand side identifier and operand count of every statement.
pub type StatementLog<H> = ChunkVector<StatementRecord, IndexLog<H>>;

/// Partial derivative and operand identifier of every operand.
pub type JacobianLog<H> = ChunkVector<JacobianRecord, StatementLog<H>>;

/// Checkpoint into a `JacobianTape`.
pub type TapePosition<H> = ChunkPosition<<JacobianLog<H> as NestedLog>::Position>;

type JacobianFrames<'a> = (
    ((), Segment<'a, JacobianRecord>),
    Segment<'a, StatementRecord>,
);

/// A Jacobian tape: every statement `w = f(u, v, ...)` is recorded as the
/// identifier of `w` followed by the pairs `(df/du, u)`, `(df/dv, v)` and
/// so on. Reverse evaluation accumulates gradients from the recorded
/// partial derivatives.
///
/// Identifiers come from the `IndexHandler` `H`, which sits at the bottom
/// of the stack of logs so that rewinding the tape also rewinds identifier
/// allocation where that applies.
///
/// ```
/// use chunktape::{Config, UNTRACKED};
///
/// let mut tape = Config::default().tape(Config::default().linear_index_handler()).unwrap();
/// tape.set_active();
///
/// let (mut x, mut y) = (UNTRACKED, UNTRACKED);
/// tape.register_input(&mut x);
/// tape.register_input(&mut y);
///
/// // z = x * y at x = 3, y = 4
/// let mut z = UNTRACKED;
/// tape.push_statement(&mut z, &[(4.0, x), (3.0, y)]);
/// tape.register_output(&mut z);
/// tape.set_passive();
///
/// tape.set_gradient(z, 1.0);
/// tape.evaluate_full();
///
/// assert_eq!(tape.gradient(x), 4.0);
/// assert_eq!(tape.gradient(y), 3.0);
/// ```
pub struct JacobianTape<H: IndexHandler> {
    log: ExternalFunctionLog<JacobianLog<H>>,
    adjoints: AdjointVector,
    active: bool,
    config: Config,
}

impl<H: IndexHandler> std::fmt::Debug for JacobianTape<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JacobianTape")
            .field("active", &self.active)
            .field("statements", &self.statement_count())
            .field("jacobians", &self.jacobian_count())
            .field("external_functions", &self.external_function_count())
            .field("adjoints", &self.adjoints.len())
            .finish()
    }
}

impl<H: IndexHandler> JacobianTape<H> {
    /// A tape with the default `Config`.
    pub fn new(handler: H) -> JacobianTape<H> {
        JacobianTape::with_config(Config::default(), handler)
    }

    pub(crate) fn with_config(config: Config, handler: H) -> JacobianTape<H> {
        log::debug!(
            "creating tape with chunks of {} records and {} external functions",
            config.chunk_size,
            config.external_function_chunk_size
        );

        let statements = ChunkVector::new(config.chunk_size, IndexLog::new(handler));
        let jacobians = ChunkVector::new(config.chunk_size, statements);
        let log = ExternalFunctionLog::new(config.external_function_chunk_size, jacobians);

        JacobianTape {
            log,
            adjoints: AdjointVector::new(),
            active: false,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn set_active(&mut self) {
        self.active = true;
    }

    pub fn set_passive(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    fn jacobians(&self) -> &JacobianLog<H> {
        self.log.nested()
    }

    fn jacobians_mut(&mut self) -> &mut JacobianLog<H> {
        self.log.nested_mut()
    }

    pub fn index_handler(&self) -> &H {
        self.jacobians().nested().nested().handler()
    }

    pub fn index_handler_mut(&mut self) -> &mut H {
        self.jacobians_mut().nested_mut().nested_mut().handler_mut()
    }

    pub fn statement_count(&self) -> usize {
        self.jacobians().nested().data_size()
    }

    pub fn jacobian_count(&self) -> usize {
        self.jacobians().data_size()
    }

    pub fn external_function_count(&self) -> usize {
        self.log.len()
    }

    /// Pre-allocates room for `jacobians` operands and `statements`
    /// statements.
    pub fn resize(&mut self, jacobians: usize, statements: usize) {
        let jacobian_log = self.jacobians_mut();
        jacobian_log.resize(jacobians);
        jacobian_log.nested_mut().resize(statements);
    }

    /// Gives `index` an identifier that was never used before in this
    /// recording, marking the value as an independent variable.
    pub fn register_input(&mut self, index: &mut Index) {
        if !self.active {
            return;
        }

        let statements = self.jacobians_mut().nested_mut();
        statements.reserve_items(1);
        statements.nested_mut().handler_mut().assign_unused_index(index);
        statements.push((*index, INPUT_TAG));
    }

    /// Records an identity statement for a tracked output so that it owns
    /// an identifier no other value shares.
    pub fn register_output(&mut self, index: &mut Index) {
        if self.active && *index != UNTRACKED {
            let rhs = *index;
            self.push_statement(index, &[(1.0, rhs)]);
        }
    }

    /// Gives an output of an external function a fresh identifier without
    /// recording a statement for it.
    pub fn register_external_function_output(&mut self, index: &mut Index) {
        if self.active {
            self.index_handler_mut().assign_index(index);
        }
    }

    /// Records `lhs = f(arguments)` where every argument is the pair of
    /// partial derivative and operand identifier.
    ///
    /// Untracked operands are dropped, and so are zero or non-finite
    /// derivatives if the `Config` asks for it. When nothing is left, or
    /// the tape is passive, `lhs` becomes untracked.
    pub fn push_statement(&mut self, lhs: &mut Index, arguments: &[(f64, Index)]) {
        if !self.active {
            self.index_handler_mut().free_index(lhs);
            return;
        }

        let skip_zero = self.config.skip_zero_jacobians;
        let skip_invalid = self.config.skip_invalid_jacobians;
        let recorded = |&&(jacobian, rhs): &&(f64, Index)| {
            rhs != UNTRACKED
                && !(skip_zero && jacobian == 0.0)
                && !(skip_invalid && !jacobian.is_finite())
        };

        let count = arguments.iter().filter(recorded).count();
        if count == 0 {
            self.index_handler_mut().free_index(lhs);
            return;
        }
        // a larger count would be read back as the input tag or wrap around
        assert!(
            count <= MAX_ARGUMENTS,
            "a statement takes at most {MAX_ARGUMENTS} operands, got {count}"
        );

        let jacobian_log = self.jacobians_mut();
        jacobian_log.reserve_items(count);
        jacobian_log.nested_mut().reserve_items(1);
        jacobian_log
            .nested_mut()
            .nested_mut()
            .handler_mut()
            .assign_index(lhs);

        for &(jacobian, rhs) in arguments.iter().filter(recorded) {
            jacobian_log.push((jacobian, rhs));
        }
        jacobian_log.nested_mut().push((*lhs, count as ArgumentCount));
    }

    /// Makes `lhs` a copy of `rhs`, sharing the identifier when the index
    /// handler supports it.
    pub fn copy(&mut self, lhs: &mut Index, rhs: Index) {
        if self.active && H::COPY_OPTIMIZATION {
            self.index_handler_mut().copy_index(lhs, rhs);
        } else {
            self.push_statement(lhs, &[(1.0, rhs)]);
        }
    }

    pub fn push_external_function(&mut self, function: Box<dyn ExternalFunction>) {
        if self.active {
            self.log.push(function);
        }
    }

    /// Pushes an external function built from function pointers. See
    /// `ExternalFunctionHandle`.
    pub fn push_external_function_handle<D: 'static>(
        &mut self,
        data: D,
        reverse: fn(&mut D, &mut AdjointVector),
        deleter: Option<fn(D)>,
        forward: Option<fn(&mut D, &mut AdjointVector)>,
        primal: Option<fn(&mut D)>,
    ) {
        let mut handle = ExternalFunctionHandle::new(data, reverse);
        if let Some(deleter) = deleter {
            handle = handle.deleter(deleter);
        }
        if let Some(forward) = forward {
            handle = handle.forward(forward);
        }
        if let Some(primal) = primal {
            handle = handle.primal(primal);
        }
        // a passive tape drops the handle right away, which runs the deleter
        self.push_external_function(Box::new(handle));
    }

    #[inline]
    pub fn gradient(&self, index: Index) -> f64 {
        self.adjoints.get(index)
    }

    #[inline]
    pub fn gradient_mut(&mut self, index: Index) -> &mut f64 {
        self.adjoints.get_mut(index)
    }

    #[inline]
    pub fn set_gradient(&mut self, index: Index, value: f64) {
        self.adjoints.set(index, value);
    }

    pub fn adjoints(&self) -> &AdjointVector {
        &self.adjoints
    }

    pub fn clear_adjoints(&mut self) {
        self.adjoints.clear();
    }

    pub fn position(&self) -> TapePosition<H> {
        self.log.position()
    }

    pub fn zero_position(&self) -> TapePosition<H> {
        self.log.zero_position()
    }

    /// Discards everything recorded after `position`. Gradients are kept.
    pub fn reset_to(&mut self, position: &TapePosition<H>) {
        self.log.reset_to(position);
    }

    /// Discards the whole recording, lets the index handler recycle its
    /// identifiers and zeroes all gradients. Memory is kept for the next
    /// recording.
    pub fn reset(&mut self) {
        log::debug!(
            "resetting tape with {} statements and {} jacobians",
            self.statement_count(),
            self.jacobian_count()
        );

        let zero = self.zero_position();
        self.log.reset_to(&zero);
        self.index_handler_mut().reset();
        self.adjoints.clear();
    }

    /// Like `reset` but also releases all memory but the first chunk of
    /// every log.
    pub fn reset_hard(&mut self) {
        log::debug!("hard reset of tape");

        self.log.reset_hard();
        self.index_handler_mut().reset();
        self.adjoints = AdjointVector::new();
    }

    fn prepare_adjoints(&mut self) {
        let maximum = self.index_handler().maximum_global_index();
        self.adjoints.resize(maximum as usize + 1);
    }

    /// Reverse sweep over `[end, start)`: propagates the gradients of the
    /// statements' left hand sides to their operands.
    ///
    /// With an index handler that recycles identifiers the gradients of
    /// the left hand sides are consumed and read 0.0 afterwards. With
    /// `LinearIndexHandler` and `GlobalIndexHandler` they stay readable,
    /// so evaluating twice without `clear_adjoints` accumulates twice.
    pub fn evaluate(&mut self, start: &TapePosition<H>, end: &TapePosition<H>) {
        self.prepare_adjoints();
        let JacobianTape { log, adjoints, .. } = self;
        log.evaluate_reverse(start, end, adjoints, replay_reverse::<H>);
    }

    /// Reverse sweep over the whole recording.
    pub fn evaluate_full(&mut self) {
        let start = self.position();
        let end = self.zero_position();
        self.evaluate(&start, &end);
    }

    /// Forward sweep over `[start, end)`: computes the tangent of every
    /// left hand side from the tangents of its operands. Tangents share
    /// the gradient storage.
    pub fn evaluate_forward(&mut self, start: &TapePosition<H>, end: &TapePosition<H>) {
        self.prepare_adjoints();
        let JacobianTape { log, adjoints, .. } = self;
        log.evaluate_forward(start, end, adjoints, replay_forward::<H>);
    }

    /// Invokes the primal hooks of the external functions in
    /// `[start, end)`. Statements carry no primal values.
    pub fn evaluate_primal(&mut self, start: &TapePosition<H>, end: &TapePosition<H>) {
        self.log.evaluate_primal(start, end);
    }
}

fn replay_reverse<H: IndexHandler>(
    jacobians: &JacobianLog<H>,
    start: &<JacobianLog<H> as NestedLog>::Position,
    end: &<JacobianLog<H> as NestedLog>::Position,
    adjoints: &mut AdjointVector,
) {
    jacobians.evaluate_reverse(start, end, (), &mut |frames| {
        reverse_statements(frames, adjoints, H::RECYCLES_INDICES)
    });
}

fn replay_forward<H: IndexHandler>(
    jacobians: &JacobianLog<H>,
    start: &<JacobianLog<H> as NestedLog>::Position,
    end: &<JacobianLog<H> as NestedLog>::Position,
    tangents: &mut AdjointVector,
) {
    jacobians.evaluate_forward(start, end, (), &mut |frames| {
        forward_statements(frames, tangents)
    });
}

fn reverse_statements(
    frames: &mut JacobianFrames<'_>,
    adjoints: &mut AdjointVector,
    clear_lhs: bool,
) {
    let ((_, jacobians), statements) = frames;
    let (values, operands) = jacobians.data;
    let (lhs, counts) = statements.data;

    while statements.cursor > statements.end {
        statements.cursor -= 1;

        let count = counts[statements.cursor];
        if count == INPUT_TAG {
            continue;
        }

        // with recycled identifiers the slot belonged to another value before
        let slot = adjoints.get_mut(lhs[statements.cursor]);
        let adjoint = if clear_lhs { std::mem::take(slot) } else { *slot };

        let first = jacobians.cursor - count as usize;
        if adjoint != 0.0 {
            for at in first..jacobians.cursor {
                adjoints.add(operands[at], values[at] * adjoint);
            }
        }
        jacobians.cursor = first;
    }
}

fn forward_statements(frames: &mut JacobianFrames<'_>, tangents: &mut AdjointVector) {
    let ((_, jacobians), statements) = frames;
    let (values, operands) = jacobians.data;
    let (lhs, counts) = statements.data;

    while statements.cursor < statements.end {
        let at = statements.cursor;
        statements.cursor += 1;

        let count = counts[at];
        if count == INPUT_TAG {
            continue;
        }

        let last = jacobians.cursor + count as usize;
        let tangent = (jacobians.cursor..last)
            .map(|operand| values[operand] * tangents.get(operands[operand]))
            .sum::<f64>();
        jacobians.cursor = last;

        tangents.set(lhs[at], tangent);
    }
}
