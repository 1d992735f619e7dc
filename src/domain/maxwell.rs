//! Yee update kernels for Maxwell's curl equations
//!
//! Normalized units (`c = ε0 = μ0 = 1`). Both kernels read neighbours through
//! the ghost planes of the field arrays, so periodic ghosts must be filled
//! before each half step.

use crate::domain::fields::FieldState;
use crate::domain::grid::GridGeometry;
use crate::domain::material::MaterialTable;

/// First index updated along each axis for `E_c`: tangential nodes on a
/// terminated wall are skipped and keep their zero value.
fn e_start(grid: &GridGeometry, c: usize) -> [usize; 3] {
    let mut start = [0; 3];
    for (a, s) in start.iter_mut().enumerate() {
        if a != c && !grid.is_periodic(a) {
            *s = 1;
        }
    }
    start
}

/// `E_c = ca·E_c + cb·(∂_p H_q − ∂_q H_p)` with backward differences
pub fn update_e(fields: &mut FieldState, grid: &GridGeometry, table: &MaterialTable) {
    let FieldState { e, h, materials, .. } = fields;
    let [nx, ny, nz] = grid.cells();

    for c in 0..3 {
        let p = (c + 1) % 3;
        let q = (c + 2) % 3;
        let (hp, hq) = (&h[p], &h[q]);
        let ec = &mut e[c];
        let start = e_start(grid, c);

        for i in start[0]..nx {
            for j in start[1]..ny {
                for k in start[2]..nz {
                    let idx = [i, j, k];
                    let at = hq.store(idx);

                    let mut back = at;
                    back[p] -= 1;
                    let d_hq = hq.data[at] - hq.data[back];

                    let mut back = at;
                    back[q] -= 1;
                    let d_hp = hp.data[at] - hp.data[back];

                    let curl = d_hq * grid.inv_int[p][idx[p]] - d_hp * grid.inv_int[q][idx[q]];
                    let m = materials.get(idx) as usize;
                    let v = ec.get_mut(idx);
                    *v = table.ca[m] * *v + table.cb[m] * curl;
                }
            }
        }
    }
}

/// `H_c -= dt·(∂_p E_q − ∂_q E_p)` with forward differences
pub fn update_h(fields: &mut FieldState, grid: &GridGeometry, dt: f64) {
    let FieldState { e, h, .. } = fields;
    let [nx, ny, nz] = grid.cells();

    for c in 0..3 {
        let p = (c + 1) % 3;
        let q = (c + 2) % 3;
        let (ep, eq) = (&e[p], &e[q]);
        let hc = &mut h[c];

        for i in 0..nx {
            for j in 0..ny {
                for k in 0..nz {
                    let idx = [i, j, k];

                    let mut ahead = idx;
                    ahead[p] += 1;
                    let d_eq = eq.data[ahead] - eq.data[idx];

                    let mut ahead = idx;
                    ahead[q] += 1;
                    let d_ep = ep.data[ahead] - ep.data[idx];

                    let curl = d_eq * grid.inv_half[p][idx[p]] - d_ep * grid.inv_half[q][idx[q]];
                    *hc.get_mut(idx) -= dt * curl;
                }
            }
        }
    }
}
