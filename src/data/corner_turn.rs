/// Edge length of the square tiles used while transposing.
const CORNER_TURN_TILE: usize = 32;

/// Transpose `outer` rows of `inner` elements into `inner` rows of `outer`
/// elements: `dst[i * outer + o] = src[o * inner + i]`.
///
/// Turns a time-major block (spectra of channels) into frequency-major
/// order (channels of samples) and back. The copy walks square tiles so
/// both sides stay cache-resident for wide blocks.
pub fn corner_turn<T: Copy>(src: &[T], dst: &mut [T], inner: usize, outer: usize) {
    debug_assert!(src.len() >= inner * outer);
    debug_assert!(dst.len() >= inner * outer);

    for o0 in (0..outer).step_by(CORNER_TURN_TILE) {
        let o1 = (o0 + CORNER_TURN_TILE).min(outer);
        for i0 in (0..inner).step_by(CORNER_TURN_TILE) {
            let i1 = (i0 + CORNER_TURN_TILE).min(inner);
            for o in o0..o1 {
                let row = &src[o * inner..(o + 1) * inner];
                for i in i0..i1 {
                    dst[i * outer + o] = row[i];
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corner_turn_small() {
        // 2 spectra of 3 channels
        let src = [1, 2, 3, 4, 5, 6];
        let mut dst = [0; 6];
        corner_turn(&src, &mut dst, 3, 2);
        assert_eq!(dst, [1, 4, 2, 5, 3, 6]);
    }

    #[test]
    fn test_corner_turn_twice_is_identity() {
        let inner = 45;
        let outer = 70;
        let src: Vec<u16> = (0..(inner * outer) as u16).collect();
        let mut turned = vec![0u16; src.len()];
        let mut back = vec![0u16; src.len()];
        corner_turn(&src, &mut turned, inner, outer);
        corner_turn(&turned, &mut back, outer, inner);
        assert_eq!(src, back);
        assert_eq!(turned[outer + 2], src[2 * inner + 1]);
    }
}
