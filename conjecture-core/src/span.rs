//! Labelled spans over a choice sequence.
//!
//! Strategies open and close spans around the choices they make, giving the
//! shrinker a tree of structure to work with. Spans are stored flat in the
//! order they were opened, with parent links instead of owning pointers.

/// A labelled, contiguous range of choices `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub label: u64,
    pub start: usize,
    pub end: usize,
    pub depth: usize,
    pub parent: Option<usize>,
    pub discarded: bool,
}

impl Span {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// The finished span tree of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Spans {
    spans: Vec<Span>,
    children: Vec<Vec<usize>>,
}

impl Spans {
    pub fn new(spans: Vec<Span>) -> Self {
        let mut children = vec![Vec::new(); spans.len()];
        for (i, span) in spans.iter().enumerate() {
            if let Some(parent) = span.parent {
                children[parent].push(i);
            }
        }
        Spans { spans, children }
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Span> {
        self.spans.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Span> {
        self.spans.iter()
    }

    pub fn children(&self, index: usize) -> &[usize] {
        self.children.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All spans strictly below `index`, in pre-order.
    pub fn descendants(&self, index: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack: Vec<usize> = self.children(index).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    pub fn discarded(&self) -> impl Iterator<Item = &Span> {
        self.spans.iter().filter(|s| s.discarded)
    }
}

/// Builds spans while a session runs.
#[derive(Debug, Default)]
pub(crate) struct SpanRecorder {
    spans: Vec<Span>,
    open: Vec<usize>,
}

impl SpanRecorder {
    pub(crate) fn start(&mut self, label: u64, position: usize) {
        let index = self.spans.len();
        self.spans.push(Span {
            label,
            start: position,
            end: position,
            depth: self.open.len(),
            parent: self.open.last().copied(),
            discarded: false,
        });
        self.open.push(index);
    }

    /// Close the innermost open span. Returns false if none is open.
    pub(crate) fn stop(&mut self, position: usize, discard: bool) -> bool {
        match self.open.pop() {
            Some(index) => {
                let span = &mut self.spans[index];
                span.end = position;
                span.discarded = discard;
                true
            }
            None => false,
        }
    }

    pub(crate) fn depth(&self) -> usize {
        self.open.len()
    }

    pub(crate) fn finish(mut self, position: usize) -> Spans {
        while self.stop(position, false) {}
        Spans::new(self.spans)
    }
}
