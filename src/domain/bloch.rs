//! Bloch-periodic ghost exchange between a real and an imaginary field grid
//!
//! A complex field `F = F_r + i·F_i` obeying `F(x + L) = F(x)·e^{ik L}` is
//! advanced as two real grids. Only the ghost planes along the Bloch axis
//! couple the two: the high E ghost receives `E(0)·e^{+ikL}` and the low H
//! ghost receives `H(L − Δ)·e^{−ikL}`. At zero phase this is the ordinary
//! periodic copy.

use ndarray::Zip;

use crate::domain::fields::FieldState;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlochAdapter {
    axis: usize,
    phase: f64,
    cos: f64,
    sin: f64,
}

impl BlochAdapter {
    /// Adapter for wavevector `k` along `axis` of length `period`
    pub fn new(axis: usize, k: f64, period: f64) -> Self {
        let phase = k * period;
        Self {
            axis,
            phase,
            cos: phase.cos(),
            sin: phase.sin(),
        }
    }

    pub fn axis(&self) -> usize {
        self.axis
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    pub fn is_identity(&self) -> bool {
        self.phase == 0.0
    }

    /// Fill the low H ghosts with `H[n−1]·e^{−iφ}`
    pub fn exchange_h(&self, real: &mut FieldState, imag: &mut FieldState) {
        let (c, s) = (self.cos, self.sin);
        for comp in 0..3 {
            let (hr, hi) = (&mut real.h[comp], &mut imag.h[comp]);
            let src = hr.source_plane(self.axis);
            let ghost = hr.ghost_plane(self.axis);
            let re_src = hr.plane(self.axis, src).to_owned();
            let im_src = hi.plane(self.axis, src).to_owned();

            Zip::from(hr.plane_mut(self.axis, ghost))
                .and(&re_src)
                .and(&im_src)
                .for_each(|g, &a, &b| *g = a * c + b * s);
            Zip::from(hi.plane_mut(self.axis, ghost))
                .and(&re_src)
                .and(&im_src)
                .for_each(|g, &a, &b| *g = b * c - a * s);
        }
    }

    /// Fill the high E ghosts with `E[0]·e^{+iφ}`
    pub fn exchange_e(&self, real: &mut FieldState, imag: &mut FieldState) {
        let (c, s) = (self.cos, self.sin);
        for comp in 0..3 {
            let (er, ei) = (&mut real.e[comp], &mut imag.e[comp]);
            let src = er.source_plane(self.axis);
            let ghost = er.ghost_plane(self.axis);
            let re_src = er.plane(self.axis, src).to_owned();
            let im_src = ei.plane(self.axis, src).to_owned();

            Zip::from(er.plane_mut(self.axis, ghost))
                .and(&re_src)
                .and(&im_src)
                .for_each(|g, &a, &b| *g = a * c - b * s);
            Zip::from(ei.plane_mut(self.axis, ghost))
                .and(&re_src)
                .and(&im_src)
                .for_each(|g, &a, &b| *g = b * c + a * s);
        }
    }
}
