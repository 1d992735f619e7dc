//! Discrete energy conservation of the leapfrog update


use std::sync::Arc;

use nanofdtd::prelude::*;
use test_utils::*;

fn conserved_over(periodic: [bool; 3], index: f64, steps: usize) {
    let cells = [6, 5, 7];
    let config = cavity_config(cells, periodic, steps);
    let mut sim = Simulation::new(
        config,
        Arc::new(MaterialLibrary::from_indices(&[index])),
        MaterialVolume::uniform(cells, 0),
    )
    .unwrap();
    sim.finalize().unwrap();
    randomize(sim.fields_mut(), 7);
    sim.fields_mut().zero_walls();

    let eps = sim.table().unwrap().eps.clone();
    let mut h_before = sim.fields().h.clone();
    let mut reference = None;
    for _ in 0..steps {
        sim.step().unwrap();
        let w = yee_energy(sim.fields(), &h_before, &eps);
        let w0 = *reference.get_or_insert(w);
        assert!(w0 > 0.0);
        assert_close!(w / w0, 1.0, 1e-10, "step {}", sim.steps());
        h_before = sim.fields().h.clone();
    }
}

#[test]
fn test_periodic_box_conserves_energy() {
    conserved_over([true; 3], 1.0, 200);
}

#[test]
fn test_conducting_box_conserves_energy() {
    conserved_over([false; 3], 1.0, 200);
}

#[test]
fn test_dielectric_box_conserves_energy() {
    conserved_over([true, false, true], 1.5, 200);
}

#[test]
fn test_walls_stay_conducting() {
    let cells = [4, 4, 4];
    let mut sim = Simulation::new(
        cavity_config(cells, [false; 3], 20),
        Arc::new(MaterialLibrary::from_indices(&[1.0])),
        MaterialVolume::uniform(cells, 0),
    )
    .unwrap();
    sim.finalize().unwrap();
    randomize(sim.fields_mut(), 11);
    sim.fields_mut().zero_walls();
    sim.run().unwrap();

    let fields = sim.fields();
    for a in 0..3 {
        for (c, e) in fields.e.iter().enumerate() {
            if c != a {
                assert!(e.plane(a, 0).iter().all(|&v| v == 0.0));
            }
        }
    }
}
