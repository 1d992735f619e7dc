//! Field sensors attached to plane-wave runs


use nanofdtd::io;
use nanofdtd::prelude::*;
use test_utils::*;

const CELLS: [usize; 3] = [4, 1, 80];

fn field_run(sensors: Vec<FieldSensor>, prefix: Option<std::path::PathBuf>) -> Vec<SensorReport> {
    let mut config = column_config(CELLS, 10, 3500);
    config.output_prefix = prefix;
    let (model, volume) = half_space(CELLS, 45, 1.5);
    let mut sim = Simulation::new(config, model, volume).unwrap();
    for sensor in sensors {
        sim.attach_sensor(Box::new(sensor)).unwrap();
    }
    sim.finalize().unwrap();
    sim.run().unwrap();
    sim.finish().unwrap()
}

fn wavelengths() -> Vec<f64> {
    column_config(CELLS, 10, 1).spectrum.wavelengths()
}

#[test]
fn test_cumulative_sums_along_axis() {
    let region = SensorRegion::volume([0, 0, 25], [4, 1, 35]);
    let plain = FieldSensor::new("plain", region, &wavelengths(), 2).unwrap();
    let summed = FieldSensor::with_options(
        "summed",
        region,
        &wavelengths(),
        3,
        FieldSensorOptions {
            cumulative: Some(Axis::X),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(summed.output_region().extents(), [1, 1, 10]);

    let reports = field_run(vec![plain, summed], None);
    let plain = reports[0].as_fields().unwrap();
    let summed = reports[1].as_fields().unwrap();
    assert_eq!(plain.blocks.len(), 5);
    assert_eq!(summed.maps.len(), 5);

    let factor = CELLS[0] as f64 * 5.0;
    for (block, map) in plain.blocks.iter().zip(&summed.maps) {
        assert_eq!(map.axis, Axis::X);
        assert_eq!(map.extents, [1, 10]);
        let peak = block
            .values
            .iter()
            .flat_map(|cell| cell.iter().map(|z| z.norm()))
            .fold(0.0, f64::max);
        assert!(peak > 0.0);
        // x = 0 layer of the block lines up with the collapsed map
        for (n, cell) in map.values.iter().enumerate() {
            for c in 0..6 {
                let expected = block.values[n][c] * factor;
                assert!((cell[c] - expected).norm() < 1e-9 * peak * factor);
            }
        }
    }
}

#[test]
fn test_normalized_phasors_use_incident_amplitude() {
    let region = SensorRegion::volume([0, 0, 25], [1, 1, 26]);
    let normalized = FieldSensor::with_options(
        "normalized",
        region,
        &wavelengths(),
        1,
        FieldSensorOptions {
            normalize: true,
            ..Default::default()
        },
    )
    .unwrap();
    let reports = field_run(vec![normalized], None);
    let fields = reports[0].as_fields().unwrap();

    // In front of the slab the total field is the incident wave plus a weak
    // reflection, so |E_y| stays close to one
    for block in &fields.blocks {
        let ey = block.values[0][1].norm();
        assert!(ey > 0.7 && ey < 1.3, "|Ey| = {ey} at {} nm", block.wavelength);
    }
}

#[test]
fn test_plane_outputs_are_written() {
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("run");
    let plane = SensorRegion::plane(Axis::Y, 0, CELLS);
    let sensor = FieldSensor::with_options(
        "section",
        plane,
        &wavelengths(),
        2,
        FieldSensorOptions {
            magnitude: true,
            wireframe: true,
            ..Default::default()
        },
    )
    .unwrap();
    let volume = FieldSensor::new("box", SensorRegion::volume([0, 0, 40], [2, 1, 50]), &wavelengths(), 1).unwrap();

    let reports = field_run(vec![sensor, volume], Some(prefix));
    let section = reports[0].as_fields().unwrap();
    assert_eq!(section.files.len(), 5 * 3);
    for file in &section.files {
        assert!(file.exists(), "{} missing", file.display());
    }

    let first = &section.maps[0];
    let read = io::read_map(&section.files[0]).unwrap();
    assert_eq!(&read, first);
    assert_eq!(read.axis, Axis::Y);
    assert_eq!(read.extents, [4, 80]);
    // the slab starts at z = 45
    assert_eq!(read.materials[44], 0);
    assert_eq!(read.materials[45], 1);
    assert!(io::material_path(&section.files[0]).exists());

    let boxed = reports[1].as_fields().unwrap();
    assert_eq!(boxed.files.len(), 5);
    let block = io::read_block(&boxed.files[2]).unwrap();
    assert_eq!(&block, &boxed.blocks[2]);
    assert_eq!(block.origin, [0, 0, 40]);
    assert_eq!(block.extents, [2, 1, 10]);
}

#[test]
fn test_sensor_outside_grid_is_rejected() {
    let config = column_config(CELLS, 10, 10);
    let (model, volume) = vacuum(CELLS);
    let mut sim = Simulation::new(config, model, volume).unwrap();
    let sensor = FieldSensor::new("outside", SensorRegion::volume([0, 0, 70], [1, 1, 90]), &[500.0], 1).unwrap();
    let err = sim.attach_sensor(Box::new(sensor)).unwrap_err();
    assert!(matches!(err, FdtdError::InvalidSensor { .. }));
}

#[test]
fn test_spectrum_needs_a_source() {
    let cells = [2, 2, 20];
    let mut sim = Simulation::new(cavity_config(cells, [true, true, false], 5), vacuum(cells).0, vacuum(cells).1).unwrap();
    sim.attach_sensor(Box::new(
        SpectrumSensor::new("r", Axis::Z, 5, cells, &[500.0], SpectrumKind::Reflection, 1).unwrap(),
    ))
    .unwrap();
    sim.finalize().unwrap();
    sim.run().unwrap();
    assert!(matches!(sim.finish(), Err(FdtdError::InvalidSensor { .. })));
}
