//! Symbol interleaving across codeword blocks.
//!
//! The stream is split into `G` groups by index modulo `G`; group `g` holds
//! indices `g, g + G, g + 2G, ...` and the groups are written back to back.
//! Neighbouring symbols of the input therefore end up `n / G` positions apart,
//! so a smudge that wipes out a run of cells lands on several blocks instead of
//! exhausting one.

/// A fixed `G`-group interleaving permutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interleaver {
    groups: usize,
}

impl Interleaver {
    /// A group count of zero is treated as one (identity).
    pub fn new(groups: usize) -> Self {
        Self {
            groups: groups.max(1),
        }
    }

    pub fn groups(&self) -> usize {
        self.groups
    }

    /// Length of group `g` for an `n`-symbol stream: `ceil((n - g) / G)`.
    fn group_len(&self, n: usize, g: usize) -> usize {
        n.saturating_sub(g).div_ceil(self.groups)
    }

    pub fn interleave<T: Copy>(&self, symbols: &[T]) -> Vec<T> {
        let mut out = Vec::with_capacity(symbols.len());
        for g in 0..self.groups {
            out.extend(symbols.iter().skip(g).step_by(self.groups).copied());
        }
        out
    }

    pub fn deinterleave<T: Copy>(&self, symbols: &[T]) -> Vec<T> {
        let n = symbols.len();
        if n == 0 {
            return Vec::new();
        }

        let mut out = symbols.to_vec();
        let mut start = 0;
        for g in 0..self.groups {
            let len = self.group_len(n, g);
            for (j, &symbol) in symbols[start..start + len].iter().enumerate() {
                out[g + j * self.groups] = symbol;
            }
            start += len;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_mapping() {
        let il = Interleaver::new(3);
        assert_eq!(il.interleave(&[0, 1, 2, 3, 4, 5]), vec![0, 3, 1, 4, 2, 5]);
        assert_eq!(il.interleave(&[0, 1, 2, 3, 4, 5, 6]), vec![0, 3, 6, 1, 4, 2, 5]);
    }

    #[test]
    fn test_closed_form_when_divisible() {
        let il = Interleaver::new(3);
        let n = 255 * 3;
        let input: Vec<usize> = (0..n).collect();
        let out = il.interleave(&input);
        for i in 0..n {
            assert_eq!(out[(i % 3) * (n / 3) + i / 3], i);
        }
    }

    #[test]
    fn test_inverse_for_all_lengths() {
        for groups in 1..=6 {
            let il = Interleaver::new(groups);
            for n in 0..50u8 {
                let input: Vec<u8> = (0..n).collect();
                let mixed = il.interleave(&input);
                assert_eq!(mixed.len(), input.len());
                assert_eq!(il.deinterleave(&mixed), input, "n={n} G={groups}");
                assert_eq!(il.interleave(&il.deinterleave(&input)), input);
            }
        }
    }

    #[test]
    fn test_single_group_is_identity() {
        let il = Interleaver::new(1);
        let input = [9u8, 8, 7, 6];
        assert_eq!(il.interleave(&input), input);
        assert_eq!(Interleaver::new(0).groups(), 1);
    }

    #[test]
    fn test_burst_is_spread() {
        // A burst of G adjacent interleaved symbols hits G different source positions
        // that are far apart in the original stream
        let il = Interleaver::new(3);
        let input: Vec<usize> = (0..300).collect();
        let mixed = il.interleave(&input);
        let burst = &mixed[99..102];
        assert_eq!(burst, &[297, 1, 4]);
    }

    #[test]
    fn test_works_on_bits() {
        let il = Interleaver::new(4);
        let bits = vec![true, false, false, true, true, true, false];
        assert_eq!(il.deinterleave(&il.interleave(&bits)), bits);
    }
}
