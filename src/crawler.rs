use crate::token::Token;

/// A cursor over an indexable sequence, owned by whichever stage is scanning.
#[derive(Debug, Clone)]
pub struct Crawler<T> {
    items: Vec<T>,
    cursor: usize,
}

impl<T: Clone> Crawler<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self { items, cursor: 0 }
    }

    /// Consume the item under the cursor.
    pub fn pop(&mut self) -> Option<T> {
        let item = self.items.get(self.cursor).cloned()?;
        self.cursor += 1;
        Some(item)
    }

    /// Rewind by `count` items. Never moves before the start.
    pub fn back(&mut self, count: usize) {
        self.cursor = self.cursor.saturating_sub(count);
    }

    /// Up to `count` items from the cursor, without consuming them.
    pub fn peek(&self, count: usize) -> &[T] {
        let end = (self.cursor + count).min(self.items.len());
        &self.items[self.cursor..end]
    }

    pub fn peek_at(&self, offset: usize) -> Option<&T> {
        self.items.get(self.cursor + offset)
    }

    /// First item from the cursor for which `skip` is false.
    pub fn peek_skipping(&self, skip: impl Fn(&T) -> bool) -> Option<&T> {
        self.items[self.cursor..].iter().find(|item| !skip(item))
    }

    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Items consumed since `start`.
    pub fn since(&self, start: usize) -> &[T] {
        &self.items[start.min(self.cursor)..self.cursor]
    }
}

impl Crawler<Token> {
    /// Next token that is not SPACE or INDENT.
    pub fn peek_significant(&self) -> Option<&Token> {
        self.peek_skipping(|token| token.kind.is_whitespace())
    }
}
