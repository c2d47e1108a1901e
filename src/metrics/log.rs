/// Upper bound for the capacity reserved up front; the rest grows on demand
/// until the cap is reached.
const INITIAL_RESERVE: usize = 4096;

/// Append-only sequence with a hard length cap. Appends past the cap are
/// dropped, which keeps memory bounded no matter how many commands run.
#[derive(Debug, Clone)]
pub struct BoundedLog<T> {
    entries: Vec<T>,
    max_len: usize,
    dropped: u64,
}

impl<T> BoundedLog<T> {
    pub fn new(max_len: usize) -> Self {
        Self {
            entries: Vec::with_capacity(max_len.min(INITIAL_RESERVE)),
            max_len,
            dropped: 0,
        }
    }

    /// Returns `false` if the log is full and the entry was dropped.
    #[inline]
    pub fn push(&mut self, entry: T) -> bool {
        if self.entries.len() >= self.max_len {
            self.dropped += 1;
            return false;
        }
        self.entries.push(entry);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.max_len
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Entries dropped since the last clear.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn as_slice(&self) -> &[T] {
        &self.entries
    }

    /// Truncate and give the memory back.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.entries.shrink_to(self.max_len.min(INITIAL_RESERVE));
        self.dropped = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drops_past_cap() {
        let mut log = BoundedLog::new(3);
        assert!(log.push(1));
        assert!(log.push(2));
        assert!(log.push(3));
        assert!(log.is_full());
        assert!(!log.push(4));
        assert!(!log.push(5));

        assert_eq!(log.as_slice(), &[1, 2, 3]);
        assert_eq!(log.dropped(), 2);
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut log = BoundedLog::new(1);
        log.push(1.0);
        log.push(2.0);
        log.clear();

        assert!(log.is_empty());
        assert_eq!(log.dropped(), 0);
        assert!(log.push(3.0));
    }

    #[test]
    fn test_zero_cap_drops_everything() {
        let mut log = BoundedLog::new(0);
        assert!(!log.push(1u64));
        assert!(log.is_empty());
    }
}
