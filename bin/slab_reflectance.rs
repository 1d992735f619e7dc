//! Reflectance and transmittance of a dielectric half-space
//!
//! Runs a plane wave from vacuum onto a slab filling the far part of the
//! grid and prints the spectra recorded by a reflection plane in front of
//! the source and a transmission plane inside the slab. A TOML file can
//! replace the built-in run description.

use anyhow::{bail, Context};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use nanofdtd::prelude::*;
use nanofdtd::utilities::to_db;

/// Command-line arguments for the slab run
#[derive(Parser, Debug)]
#[command(name = "slab_reflectance")]
#[command(about = "Plane-wave reflectance of a dielectric slab with the FDTD core", long_about = None)]
struct Args {
    /// TOML run description; overrides the grid and spectrum options below
    #[arg(long)]
    config: Option<PathBuf>,

    /// Refractive index of the slab
    #[arg(long, default_value_t = 1.5)]
    index: f64,

    /// First cell of the slab along z
    #[arg(long, default_value_t = 50)]
    slab_start: usize,

    /// Cells along z
    #[arg(long, default_value_t = 100)]
    cells: usize,

    /// Cell size in nanometres
    #[arg(long, default_value_t = 5.0)]
    spacing: f64,

    /// CPML thickness on both z faces
    #[arg(long, default_value_t = 10)]
    cpml: usize,

    /// Shortest wavelength in nanometres
    #[arg(long, default_value_t = 450.0)]
    min_wavelength: f64,

    /// Longest wavelength in nanometres
    #[arg(long, default_value_t = 550.0)]
    max_wavelength: f64,

    /// Number of wavelengths
    #[arg(long, default_value_t = 11)]
    points: usize,

    /// Angle of incidence in degrees
    #[arg(long, default_value_t = 0.0)]
    angle: f64,

    /// Maximum number of time steps
    #[arg(long, default_value_t = 5000)]
    steps: usize,

    /// Stop early once the spectral energy settles to this tolerance
    #[arg(long)]
    tolerance: Option<f64>,

    /// Output file prefix for field maps
    #[arg(long)]
    output: Option<PathBuf>,

    /// Worker threads per sensor
    #[arg(long, default_value_t = 2)]
    threads: usize,
}

fn config_from_args(args: &Args) -> SimulationConfig {
    let periodic_x = args.angle != 0.0;
    SimulationConfig {
        grid: GridConfig {
            cells: [if periodic_x { 8 } else { 1 }, 1, args.cells],
            spacing: [args.spacing; 3],
            periodic: [true, true, false],
        },
        max_steps: args.steps,
        boundaries: BoundaryConfig {
            thickness: [0, 0, 0, 0, args.cpml, args.cpml],
            ..Default::default()
        },
        spectrum: SpectrumConfig {
            min_wavelength: args.min_wavelength,
            max_wavelength: args.max_wavelength,
            points: args.points,
        },
        incidence: Some(IncidenceConfig {
            axis: Axis::Z,
            plane_index: args.cpml + 10,
            angle: args.angle.to_radians(),
            ..Default::default()
        }),
        completion: args.tolerance.map(|tolerance| CompletionConfig {
            tolerance,
            ..Default::default()
        }),
        sensor_threads: args.threads,
        output_prefix: args.output.clone(),
        ..Default::default()
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config(path).with_context(|| format!("loading {}", path.display()))?,
        None => config_from_args(&args),
    };

    let cells = config.grid.cells;
    let Some(incidence) = config.incidence.clone() else {
        bail!("the run needs an incidence section");
    };
    let a = incidence.axis;
    let n = cells[a.index()];
    let hi = config.boundaries.high(a);
    let lo = config.boundaries.low(a);
    let slab_start = args.slab_start.min(n.saturating_sub(hi + 1));
    if slab_start <= incidence.plane_index + 1 || incidence.plane_index <= lo + 1 {
        bail!(
            "slab start {} and plane {} leave no room for the sensors",
            slab_start,
            incidence.plane_index
        );
    }

    let mut volume = MaterialVolume::uniform(cells, 0);
    let mut hi_corner = cells;
    let mut lo_corner = [0; 3];
    lo_corner[a.index()] = slab_start;
    hi_corner[a.index()] = n;
    volume.fill_box(lo_corner, hi_corner, 1);
    let model = Arc::new(MaterialLibrary::from_indices(&[1.0, args.index]));

    let wavelengths = config.spectrum.wavelengths();
    let threads = config.sensor_threads;
    let reflection_plane = (lo + incidence.plane_index) / 2;
    let transmission_plane = (slab_start + n - hi) / 2;

    println!("\nSlab Reflectance");
    println!("================\n");
    println!("  Grid: {:?} cells of {:?} nm", cells, config.grid.spacing);
    println!("  Slab index: {} from cell {}", args.index, slab_start);
    println!(
        "  Spectrum: {:.1}-{:.1} nm, {} points",
        config.spectrum.min_wavelength, config.spectrum.max_wavelength, config.spectrum.points
    );
    println!("  Incidence angle: {:.2} deg\n", incidence.angle.to_degrees());

    let mut sim = Simulation::new(config, model, volume)?;
    sim.attach_sensor(Box::new(SpectrumSensor::new(
        "reflection",
        a,
        reflection_plane,
        cells,
        &wavelengths,
        SpectrumKind::Reflection,
        threads,
    )?))?;
    sim.attach_sensor(Box::new(SpectrumSensor::new(
        "transmission",
        a,
        transmission_plane,
        cells,
        &wavelengths,
        SpectrumKind::Transmission,
        threads,
    )?))?;
    if sim.config().output_prefix.is_some() {
        let plane = SensorRegion::plane(incidence.bloch_axis().next(), 0, cells);
        sim.attach_sensor(Box::new(FieldSensor::with_options(
            "section",
            plane,
            &wavelengths,
            threads,
            FieldSensorOptions {
                magnitude: true,
                wireframe: true,
                ..Default::default()
            },
        )?))?;
    }

    sim.finalize()?;
    let summary = sim.run()?;
    let reports = sim.finish()?;

    println!(
        "Finished after {} steps ({})\n",
        summary.steps, summary.state
    );
    let spectra: Vec<&Spectrum> = reports.iter().filter_map(|r| r.as_spectrum()).collect();
    if let [reflection, transmission] = spectra.as_slice() {
        println!("  {:>10}  {:>10}  {:>10}  {:>10}  {:>10}", "λ (nm)", "R", "R (dB)", "T", "R+T");
        for (w, &wavelength) in reflection.wavelengths.iter().enumerate() {
            let r = reflection.values[w];
            let t = transmission.value_at(wavelength).unwrap_or(0.0);
            println!(
                "  {:>10.1}  {:>10.5}  {:>10.2}  {:>10.5}  {:>10.5}",
                wavelength,
                r,
                to_db(r),
                t,
                r + t
            );
        }
        for wavelength in &reflection.omitted {
            println!("  {:>10.1}  evanescent", wavelength);
        }
    }
    for report in &reports {
        if let Some(fields) = report.as_fields() {
            for file in &fields.files {
                println!("  wrote {}", file.display());
            }
        }
    }
    Ok(())
}
