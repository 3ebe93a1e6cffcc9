use crate::grid::CapacityError;

/// The slice of the payload destined for one page.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub index: u16,
    pub data: Vec<u8>,
    pub is_last: bool,
}

/// Number of pages needed for `len` bytes at `capacity` bytes per page.
/// An empty payload still occupies one page.
pub fn pages_needed(len: usize, capacity: usize) -> usize {
    if capacity == 0 {
        return usize::MAX;
    }
    len.div_ceil(capacity).max(1)
}

/// Split a payload into page-sized chunks, refusing to exceed `max_pages`.
pub fn chunk_bytes(data: &[u8], capacity: usize, max_pages: usize) -> Result<Vec<Chunk>, CapacityError> {
    let needed = pages_needed(data.len(), capacity);
    let max = max_pages.min(u16::MAX as usize);
    if needed > max {
        return Err(CapacityError::TooManyPages { needed, max });
    }

    if data.is_empty() {
        return Ok(vec![Chunk {
            index: 0,
            data: Vec::new(),
            is_last: true,
        }]);
    }

    Ok(data
        .chunks(capacity)
        .enumerate()
        .map(|(i, slice)| Chunk {
            index: i as u16,
            data: slice.to_vec(),
            is_last: i == needed - 1,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_bytes_single() {
        let data = vec![1u8; 100];
        let chunks = chunk_bytes(&data, 1024, 8).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].data.len(), 100);
        assert!(chunks[0].is_last);
    }

    #[test]
    fn test_chunk_bytes_multiple() {
        let data = vec![0xABu8; 2500];
        let chunks = chunk_bytes(&data, 1000, 8).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].data.len(), 1000);
        assert_eq!(chunks[1].data.len(), 1000);
        assert_eq!(chunks[2].data.len(), 500);
        assert!(!chunks[0].is_last);
        assert!(!chunks[1].is_last);
        assert!(chunks[2].is_last);
        assert_eq!(chunks[2].index, 2);
    }

    #[test]
    fn test_chunk_bytes_exact_multiple() {
        let data = vec![0u8; 2048];
        let chunks = chunk_bytes(&data, 1024, 8).unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks[1].is_last);
    }

    #[test]
    fn test_chunk_bytes_empty() {
        let chunks = chunk_bytes(&[], 1024, 1).unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].is_last);
        assert!(chunks[0].data.is_empty());
    }

    #[test]
    fn test_too_many_pages() {
        let data = vec![0u8; 3001];
        assert_eq!(
            chunk_bytes(&data, 1000, 3),
            Err(CapacityError::TooManyPages { needed: 4, max: 3 })
        );
        assert_eq!(pages_needed(3000, 1000), 3);
        assert_eq!(pages_needed(0, 1000), 1);
    }
}
