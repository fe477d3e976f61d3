use std::fmt;

use crate::{AdjointVector, ChunkPosition, ChunkVector, NestedLog};

/// User code spliced into tape evaluation.
///
/// The tape invokes the hooks at the point of the recording where the
/// function was pushed. Dropping the boxed function releases its data.
pub trait ExternalFunction {
    /// Propagates adjoints backwards through the function.
    fn evaluate_reverse(&mut self, adjoints: &mut AdjointVector);

    /// Propagates tangents forwards through the function.
    fn evaluate_forward(&mut self, _tangents: &mut AdjointVector) {}

    /// Recomputes primal values.
    fn evaluate_primal(&mut self) {}
}

/// An `ExternalFunction` assembled from plain function pointers and a
/// piece of user data.
///
/// The deleter, when given, receives the data exactly once when the
/// handle is dropped, that is when the tape is rewound past the
/// function, reset or dropped.
pub struct ExternalFunctionHandle<D> {
    data: Option<D>,
    reverse: fn(&mut D, &mut AdjointVector),
    forward: Option<fn(&mut D, &mut AdjointVector)>,
    primal: Option<fn(&mut D)>,
    deleter: Option<fn(D)>,
}

impl<D> fmt::Debug for ExternalFunctionHandle<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalFunctionHandle")
            .field("live", &self.data.is_some())
            .field("forward", &self.forward.is_some())
            .field("primal", &self.primal.is_some())
            .field("deleter", &self.deleter.is_some())
            .finish()
    }
}

impl<D> ExternalFunctionHandle<D> {
    pub fn new(data: D, reverse: fn(&mut D, &mut AdjointVector)) -> ExternalFunctionHandle<D> {
        ExternalFunctionHandle {
            data: Some(data),
            reverse,
            forward: None,
            primal: None,
            deleter: None,
        }
    }

    pub fn forward(mut self, forward: fn(&mut D, &mut AdjointVector)) -> ExternalFunctionHandle<D> {
        self.forward = Some(forward);
        self
    }

    pub fn primal(mut self, primal: fn(&mut D)) -> ExternalFunctionHandle<D> {
        self.primal = Some(primal);
        self
    }

    pub fn deleter(mut self, deleter: fn(D)) -> ExternalFunctionHandle<D> {
        self.deleter = Some(deleter);
        self
    }
}

impl<D> ExternalFunction for ExternalFunctionHandle<D> {
    fn evaluate_reverse(&mut self, adjoints: &mut AdjointVector) {
        if let Some(data) = &mut self.data {
            (self.reverse)(data, adjoints);
        }
    }

    fn evaluate_forward(&mut self, tangents: &mut AdjointVector) {
        if let (Some(forward), Some(data)) = (self.forward, &mut self.data) {
            forward(data, tangents);
        }
    }

    fn evaluate_primal(&mut self) {
        if let (Some(primal), Some(data)) = (self.primal, &mut self.data) {
            primal(data);
        }
    }
}

impl<D> Drop for ExternalFunctionHandle<D> {
    fn drop(&mut self) {
        if let (Some(deleter), Some(data)) = (self.deleter, self.data.take()) {
            deleter(data);
        }
    }
}

/// One external function together with the position the nested log had
/// reached when it was pushed.
type ExternalRecord<P> = (Option<Box<dyn ExternalFunction>>, P);

/// The outermost log of a tape: external functions interleaved with the
/// recording held by `N`.
///
/// A slot whose function has been released holds `None`. Slots past the
/// head never hold a function.
pub struct ExternalFunctionLog<N: NestedLog> {
    log: ChunkVector<ExternalRecord<N::Position>, N>,
}

impl<N: NestedLog> fmt::Debug for ExternalFunctionLog<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalFunctionLog")
            .field("log", &self.log)
            .finish()
    }
}

impl<N: NestedLog> ExternalFunctionLog<N> {
    pub fn new(chunk_size: usize, nested: N) -> ExternalFunctionLog<N> {
        ExternalFunctionLog {
            log: ChunkVector::new(chunk_size, nested),
        }
    }

    pub fn nested(&self) -> &N {
        self.log.nested()
    }

    pub fn nested_mut(&mut self) -> &mut N {
        self.log.nested_mut()
    }

    /// Number of external functions up to the head.
    pub fn len(&self) -> usize {
        self.log.data_size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push(&mut self, function: Box<dyn ExternalFunction>) {
        self.log.reserve_items(1);
        let position = self.log.nested().position();
        self.log.push((Some(function), position));
    }

    pub fn resize(&mut self, total_items: usize) {
        self.log.resize(total_items);
    }

    pub fn position(&self) -> ChunkPosition<N::Position> {
        self.log.position()
    }

    pub fn zero_position(&self) -> ChunkPosition<N::Position> {
        self.log.zero_position()
    }

    /// Releases every function at or after `position`, then rewinds the
    /// whole stack to it.
    pub fn reset_to(&mut self, position: &ChunkPosition<N::Position>) {
        self.release_from(position);
        self.log.reset_to(position);
    }

    pub fn reset_hard(&mut self) {
        let zero = self.log.zero_position();
        self.release_from(&zero);
        self.log.reset_hard();
    }

    fn release_from(&mut self, position: &ChunkPosition<N::Position>) {
        let head = self.log.position();
        let mut chunk = position.chunk;
        let mut at = position.data;
        let mut released = 0_usize;

        while (chunk, at) < (head.chunk, head.data) {
            let current = &mut self.log.chunks[chunk];
            if at < current.used_size() {
                let (function, _) = current.refs_mut(at);
                if function.take().is_some() {
                    released += 1;
                }
                at += 1;
            } else {
                chunk += 1;
                at = 0;
            }
        }

        if released > 0 {
            log::debug!("released {} external functions from {}", released, position);
        }
    }

    /// Runs the range `[end, start)` newest first. `inner` replays the
    /// nested recording between two nested positions and the reverse
    /// hook of every function runs once the recording after it is done.
    pub fn evaluate_reverse<F>(
        &mut self,
        start: &ChunkPosition<N::Position>,
        end: &ChunkPosition<N::Position>,
        adjoints: &mut AdjointVector,
        mut inner: F,
    ) where
        F: FnMut(&N, &N::Position, &N::Position, &mut AdjointVector),
    {
        debug_assert!(start >= end, "reverse evaluation from {start} to {end} runs backwards");

        let ChunkVector { chunks, nested, .. } = &mut self.log;
        let nested: &N = nested;

        let mut inner_start = start.inner;

        for chunk in (end.chunk..=start.chunk).rev() {
            let current = &mut chunks[chunk];
            let data_start = if chunk == start.chunk {
                start.data
            } else {
                current.used_size()
            };
            let data_end = if chunk == end.chunk { end.data } else { 0 };

            for at in (data_end..data_start).rev() {
                let (function, position) = current.refs_mut(at);
                inner(nested, &inner_start, &*position, adjoints);
                if let Some(function) = function {
                    function.evaluate_reverse(adjoints);
                }
                inner_start = *position;
            }
        }

        inner(nested, &inner_start, &end.inner, adjoints);
    }

    /// Runs the range `[start, end)` oldest first with the forward
    /// hooks.
    pub fn evaluate_forward<F>(
        &mut self,
        start: &ChunkPosition<N::Position>,
        end: &ChunkPosition<N::Position>,
        tangents: &mut AdjointVector,
        mut inner: F,
    ) where
        F: FnMut(&N, &N::Position, &N::Position, &mut AdjointVector),
    {
        self.walk_forward(start, end, |nested, from, to, function| {
            inner(nested, from, to, tangents);
            if let Some(function) = function {
                function.evaluate_forward(tangents);
            }
        });
    }

    /// Invokes the primal hooks in `[start, end)` oldest first.
    pub fn evaluate_primal(
        &mut self,
        start: &ChunkPosition<N::Position>,
        end: &ChunkPosition<N::Position>,
    ) {
        self.walk_forward(start, end, |_, _, _, function| {
            if let Some(function) = function {
                function.evaluate_primal();
            }
        });
    }

    // `visit` gets the nested range preceding each function and then the
    // trailing nested range with no function.
    fn walk_forward<F>(
        &mut self,
        start: &ChunkPosition<N::Position>,
        end: &ChunkPosition<N::Position>,
        mut visit: F,
    ) where
        F: FnMut(&N, &N::Position, &N::Position, Option<&mut Box<dyn ExternalFunction>>),
    {
        debug_assert!(start <= end, "forward evaluation from {start} to {end} runs backwards");

        let ChunkVector { chunks, nested, .. } = &mut self.log;
        let nested: &N = nested;

        let mut inner_start = start.inner;

        for chunk in start.chunk..=end.chunk {
            let current = &mut chunks[chunk];
            let data_start = if chunk == start.chunk { start.data } else { 0 };
            let data_end = if chunk == end.chunk {
                end.data
            } else {
                current.used_size()
            };

            for at in data_start..data_end {
                let (function, position) = current.refs_mut(at);
                visit(nested, &inner_start, &*position, function.as_mut());
                inner_start = *position;
            }
        }

        visit(nested, &inner_start, &end.inner, None);
    }
}
