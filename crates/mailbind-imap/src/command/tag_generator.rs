//! Command tag generation.

/// Produces the per-connection tag sequence `A0000`, `A0001`, ...
///
/// Tags only need to be unique among in-flight commands, so the counter
/// wraps instead of failing on overflow.
#[derive(Debug, Clone)]
pub struct TagGenerator {
    prefix: char,
    counter: u32,
}

impl TagGenerator {
    /// Creates a generator with the given prefix letter.
    #[must_use]
    pub const fn new(prefix: char) -> Self {
        Self { prefix, counter: 0 }
    }

    /// Returns the next tag.
    pub fn next_tag(&mut self) -> String {
        let n = self.counter;
        self.counter = self.counter.wrapping_add(1);
        format!("{}{n:04}", self.prefix)
    }

    /// Number of tags issued so far (modulo wrap-around).
    #[must_use]
    pub const fn issued(&self) -> u32 {
        self.counter
    }
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self::new('A')
    }
}
