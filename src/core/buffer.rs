/// Initial size of a fresh record buffer
pub const INITIAL_BUFFER_SIZE: usize = 10_000;

/// Growable byte buffer holding the serialized records of one query.
///
/// The backing storage is kept between queries; only the logical length is
/// reset. When a record does not fit, the storage grows to twice the
/// required size.
#[derive(Debug, Clone)]
pub struct RecordBuffer {
    bytes: Vec<u8>,
    len: usize,
}

impl Default for RecordBuffer {
    fn default() -> Self {
        Self::with_capacity(INITIAL_BUFFER_SIZE)
    }
}

impl RecordBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: vec![0; capacity],
            len: 0,
        }
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Append `record` followed by a newline
    pub fn push_record(&mut self, record: &str) {
        let required = self.len + record.len() + 1;
        self.ensure_capacity(required);
        self.bytes[self.len..self.len + record.len()].copy_from_slice(record.as_bytes());
        self.len += record.len();
        self.bytes[self.len] = b'\n';
        self.len += 1;
    }

    fn ensure_capacity(&mut self, required: usize) {
        if required > self.bytes.len() {
            self.bytes.resize(required * 2, 0);
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_clear() {
        let mut buffer = RecordBuffer::with_capacity(4);
        buffer.push_record("read1");
        assert_eq!(buffer.as_bytes(), b"read1\n");
        assert_eq!(buffer.capacity(), 12);

        buffer.clear();
        assert!(buffer.is_empty());
        buffer.push_record("a");
        buffer.push_record("b");
        assert_eq!(buffer.as_bytes(), b"a\nb\n");
        // Storage survives the clear
        assert_eq!(buffer.capacity(), 12);
    }

    #[test]
    fn test_grows_to_twice_required() {
        let mut buffer = RecordBuffer::with_capacity(2);
        buffer.push_record("abcdefghi");
        assert_eq!(buffer.len(), 10);
        assert_eq!(buffer.capacity(), 20);
    }
}
