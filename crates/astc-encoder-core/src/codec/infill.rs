//! Weight infill: mapping a weight grid onto the texels of a block.
//!
//! 2D grids use bilinear interpolation and 3D grids use simplex
//! interpolation. Every texel reads at most four grid weights, each with
//! an integer contribution that sums to 16.

/// Per-texel grid contributions for one (block, grid) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Infill {
    grid: [u32; 3],
    /// `(grid index, contribution)` per texel.
    taps: Vec<[(u16, u8); 4]>,
}

impl Infill {
    pub(crate) fn new(block: [u32; 3], grid: [u32; 3]) -> Self {
        let taps = if block[2] == 1 {
            taps_2d(block, grid)
        } else {
            taps_3d(block, grid)
        };
        Self { grid, taps }
    }

    pub(crate) fn grid_len(&self) -> usize {
        (self.grid[0] * self.grid[1] * self.grid[2]) as usize
    }

    pub(crate) fn taps(&self) -> &[[(u16, u8); 4]] {
        &self.taps
    }

    /// Effective texel weights (0..=64) from unquantised grid weights.
    pub(crate) fn apply(&self, grid_weights: &[u32], out: &mut [u32]) {
        for (texel, dst) in self.taps.iter().zip(out.iter_mut()) {
            let sum: u32 = texel
                .iter()
                .map(|&(idx, w)| grid_weights[idx as usize] * u32::from(w))
                .sum();
            *dst = (sum + 8) >> 4;
        }
    }
}

/// Fixed-point scale from texel position to grid position.
fn axis_scale(block_dim: u32) -> u32 {
    (1024 + block_dim / 2) / (block_dim - 1)
}

/// Integer grid coordinate and 4-bit fraction of texel `t` on one axis.
fn grid_coord(t: u32, block_dim: u32, grid_dim: u32) -> (u32, u32) {
    let c = axis_scale(block_dim) * t;
    let g = (c * (grid_dim - 1) + 32) >> 6;
    (g >> 4, g & 0xF)
}

fn tap(v0: u32, idx: u32, weight: u32) -> (u16, u8) {
    // Zero-weight taps may point past the grid edge; park them on v0.
    let idx = if weight == 0 { v0 } else { idx };
    (idx as u16, weight as u8)
}

fn taps_2d(block: [u32; 3], grid: [u32; 3]) -> Vec<[(u16, u8); 4]> {
    let [bx, by, _] = block;
    let [n, m, _] = grid;
    let mut taps = Vec::with_capacity((bx * by) as usize);
    for t in 0..by {
        let (jt, ft) = grid_coord(t, by, m);
        for s in 0..bx {
            let (js, fs) = grid_coord(s, bx, n);
            let v0 = js + jt * n;
            let w11 = (fs * ft + 8) >> 4;
            let w10 = ft - w11;
            let w01 = fs - w11;
            let w00 = 16 + w11 - fs - ft;
            taps.push([
                tap(v0, v0, w00),
                tap(v0, v0 + 1, w01),
                tap(v0, v0 + n, w10),
                tap(v0, v0 + n + 1, w11),
            ]);
        }
    }
    taps
}

fn taps_3d(block: [u32; 3], grid: [u32; 3]) -> Vec<[(u16, u8); 4]> {
    let [bx, by, bz] = block;
    let [n, m, _] = grid;
    let nm = n * m;
    let mut taps = Vec::with_capacity((bx * by * bz) as usize);
    for r in 0..bz {
        let (jr, fr) = grid_coord(r, bz, grid[2]);
        for t in 0..by {
            let (jt, ft) = grid_coord(t, by, m);
            for s in 0..bx {
                let (js, fs) = grid_coord(s, bx, n);
                let v0 = js + jt * n + jr * nm;

                // Walk the axes from largest fraction to smallest.
                let (s1, s2, w) = if fs > ft {
                    if ft > fr {
                        (1, n, [16 - fs, fs - ft, ft - fr, fr])
                    } else if fs > fr {
                        (1, nm, [16 - fs, fs - fr, fr - ft, ft])
                    } else {
                        (nm, 1, [16 - fr, fr - fs, fs - ft, ft])
                    }
                } else if fs > fr {
                    (n, 1, [16 - ft, ft - fs, fs - fr, fr])
                } else if ft > fr {
                    (n, nm, [16 - ft, ft - fr, fr - fs, fs])
                } else {
                    (nm, n, [16 - fr, fr - ft, ft - fs, fs])
                };

                taps.push([
                    tap(v0, v0, w[0]),
                    tap(v0, v0 + s1, w[1]),
                    tap(v0, v0 + s1 + s2, w[2]),
                    tap(v0, v0 + nm + n + 1, w[3]),
                ]);
            }
        }
    }
    taps
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn check_taps(infill: &Infill) {
        let len = infill.grid_len();
        for texel in infill.taps() {
            let total: u32 = texel.iter().map(|&(_, w)| u32::from(w)).sum();
            assert_eq!(total, 16);
            for &(idx, _) in texel {
                assert!((idx as usize) < len);
            }
        }
    }

    #[rstest]
    #[case([4, 4, 1], [4, 4, 1])]
    #[case([8, 8, 1], [5, 4, 1])]
    #[case([12, 12, 1], [6, 6, 1])]
    #[case([10, 5, 1], [2, 2, 1])]
    #[case([6, 6, 6], [3, 3, 3])]
    #[case([3, 3, 3], [2, 3, 2])]
    #[case([5, 4, 4], [4, 2, 3])]
    fn test_taps_are_complete(#[case] block: [u32; 3], #[case] grid: [u32; 3]) {
        let infill = Infill::new(block, grid);
        assert_eq!(
            infill.taps().len(),
            (block[0] * block[1] * block[2]) as usize
        );
        check_taps(&infill);
    }

    #[test]
    fn test_full_resolution_grid_is_identity() {
        let infill = Infill::new([4, 4, 1], [4, 4, 1]);
        let grid: Vec<u32> = (0..16).map(|i| i * 4).collect();
        let mut out = vec![0; 16];
        infill.apply(&grid, &mut out);
        assert_eq!(out, grid);
    }

    #[test]
    fn test_constant_grid_stays_constant() {
        let infill = Infill::new([6, 6, 6], [3, 2, 4]);
        let grid = vec![40; infill.grid_len()];
        let mut out = vec![0; 216];
        infill.apply(&grid, &mut out);
        assert!(out.iter().all(|&w| w == 40));
    }
}
