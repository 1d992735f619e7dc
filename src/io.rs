//! Binary field-block and field-map files
//!
//! All values are little-endian. A field block holds a 3-D region:
//!
//! ```text
//! wavelength f64 | origin 3×i32 | extents 3×i32 | spacing 3×f64
//! per cell (x slowest, z fastest): 6 × (re f64, im f64), material u32
//! ```
//!
//! A field map holds a plane with one axis collapsed:
//!
//! ```text
//! wavelength f64 | collapsed axis i32 | origin 2×i32 | extents 2×i32 | spacing 2×f64
//! per cell: 6 × (re f64, im f64)
//! ```
//!
//! The map's material indices go to a sibling `<path>.mat` file holding the
//! two extents as i32 followed by one u32 per cell.

use ndarray::Array2;
use num_complex::Complex64;
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::domain::grid::Axis;
use crate::error::{FdtdError, Result};

/// Ex, Ey, Ez, Hx, Hy, Hz phasors of one cell
pub type CellPhasors = [Complex64; 6];

/// Phasors over a 3-D region at one wavelength
#[derive(Debug, Clone, PartialEq)]
pub struct FieldBlock {
    pub wavelength: f64,
    pub origin: [i32; 3],
    pub extents: [i32; 3],
    pub spacing: [f64; 3],
    pub values: Vec<CellPhasors>,
    pub materials: Vec<u32>,
}

/// Phasors over a plane at one wavelength
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMap {
    pub wavelength: f64,
    pub axis: Axis,
    pub origin: [i32; 2],
    pub extents: [i32; 2],
    pub spacing: [f64; 2],
    pub values: Vec<CellPhasors>,
    pub materials: Vec<u32>,
}

impl FieldBlock {
    pub fn cell_count(&self) -> usize {
        self.extents.iter().map(|&e| e.max(0) as usize).product()
    }
}

impl FieldMap {
    pub fn cell_count(&self) -> usize {
        self.extents.iter().map(|&e| e.max(0) as usize).product()
    }

    fn shape(&self) -> (usize, usize) {
        (self.extents[0].max(0) as usize, self.extents[1].max(0) as usize)
    }

    /// `|E|` per cell
    pub fn magnitude(&self) -> Array2<f64> {
        let (n0, n1) = self.shape();
        Array2::from_shape_fn((n0, n1), |(i, j)| {
            self.values[i * n1 + j][..3]
                .iter()
                .map(|z| z.norm_sqr())
                .sum::<f64>()
                .sqrt()
        })
    }

    /// 1 where a cell's material differs from its next neighbour along
    /// either in-plane axis
    pub fn wireframe(&self) -> Array2<u8> {
        let (n0, n1) = self.shape();
        let at = |i: usize, j: usize| self.materials.get(i * n1 + j).copied();
        Array2::from_shape_fn((n0, n1), |(i, j)| {
            let here = at(i, j);
            let edge = (i + 1 < n0 && at(i + 1, j) != here) || (j + 1 < n1 && at(i, j + 1) != here);
            u8::from(edge)
        })
    }
}

/// Path of the material file paired with a field map
pub fn material_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".mat");
    PathBuf::from(name)
}

fn push_complex(buf: &mut Vec<u8>, z: Complex64) {
    buf.extend_from_slice(&z.re.to_le_bytes());
    buf.extend_from_slice(&z.im.to_le_bytes());
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let file = File::create(path).map_err(|e| FdtdError::io(path, e))?;
    let mut out = BufWriter::new(file);
    out.write_all(bytes).map_err(|e| FdtdError::io(path, e))?;
    out.flush().map_err(|e| FdtdError::io(path, e))
}

impl FieldBlock {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(68 + self.values.len() * 100);
        buf.extend_from_slice(&self.wavelength.to_le_bytes());
        for v in self.origin.iter().chain(self.extents.iter()) {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        for d in &self.spacing {
            buf.extend_from_slice(&d.to_le_bytes());
        }
        for (cell, m) in self.values.iter().zip(self.materials.iter()) {
            for &z in cell {
                push_complex(&mut buf, z);
            }
            buf.extend_from_slice(&m.to_le_bytes());
        }
        buf
    }
}

impl FieldMap {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(44 + self.values.len() * 96);
        buf.extend_from_slice(&self.wavelength.to_le_bytes());
        buf.extend_from_slice(&(self.axis.index() as i32).to_le_bytes());
        for v in self.origin.iter().chain(self.extents.iter()) {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        for d in &self.spacing {
            buf.extend_from_slice(&d.to_le_bytes());
        }
        for cell in &self.values {
            for &z in cell {
                push_complex(&mut buf, z);
            }
        }
        buf
    }

    pub fn material_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8 + self.materials.len() * 4);
        for v in &self.extents {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        for m in &self.materials {
            buf.extend_from_slice(&m.to_le_bytes());
        }
        buf
    }
}

pub fn write_block(path: &Path, block: &FieldBlock) -> Result<()> {
    write_file(path, &block.to_bytes())
}

/// Write a field map and its sibling material file
pub fn write_map(path: &Path, map: &FieldMap) -> Result<()> {
    write_file(path, &map.to_bytes())?;
    write_file(&material_path(path), &map.material_bytes())
}

/// Write a real-valued 2-D map: extents as 2×i32 then f64 per cell
pub fn write_scalar_map(path: &Path, values: &Array2<f64>) -> Result<()> {
    let (n0, n1) = values.dim();
    let mut buf = Vec::with_capacity(8 + values.len() * 8);
    buf.extend_from_slice(&(n0 as i32).to_le_bytes());
    buf.extend_from_slice(&(n1 as i32).to_le_bytes());
    for v in values.iter() {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    write_file(path, &buf)
}

/// Little-endian cursor over a file's bytes
struct Reader<'a> {
    path: &'a Path,
    bytes: &'a [u8],
    at: usize,
}

impl<'a> Reader<'a> {
    fn new(path: &'a Path, bytes: &'a [u8]) -> Self {
        Self { path, bytes, at: 0 }
    }

    fn malformed(&self, reason: String) -> FdtdError {
        FdtdError::Format {
            path: self.path.to_path_buf(),
            reason,
        }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let end = self.at + N;
        let slice = self
            .bytes
            .get(self.at..end)
            .ok_or_else(|| self.malformed(format!("truncated at byte {}", self.at)))?;
        self.at = end;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    fn f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.take()?))
    }

    fn i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.take()?))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take()?))
    }

    fn complex(&mut self) -> Result<Complex64> {
        let re = self.f64()?;
        let im = self.f64()?;
        Ok(Complex64::new(re, im))
    }

    fn cell(&mut self) -> Result<CellPhasors> {
        let mut cell = [Complex64::default(); 6];
        for z in cell.iter_mut() {
            *z = self.complex()?;
        }
        Ok(cell)
    }

    /// Cell count of a header's `extents`, each cell taking `record` bytes
    /// of what is left
    fn cells(&self, extents: &[i32], record: usize) -> Result<usize> {
        let count = extents.iter().try_fold(1usize, |n, &e| {
            usize::try_from(e).ok().and_then(|e| n.checked_mul(e))
        });
        let left = self.bytes.len() - self.at;
        match count {
            Some(n) if n.checked_mul(record).is_some_and(|b| b <= left) => Ok(n),
            _ => Err(self.malformed(format!(
                "extents {extents:?} do not fit the {left} bytes left"
            ))),
        }
    }

    fn finish(&self) -> Result<()> {
        if self.at != self.bytes.len() {
            return Err(self.malformed(format!("{} trailing bytes", self.bytes.len() - self.at)));
        }
        Ok(())
    }
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| FdtdError::io(path, e))
}

pub fn read_block(path: &Path) -> Result<FieldBlock> {
    let bytes = read_bytes(path)?;
    let mut r = Reader::new(path, &bytes);

    let wavelength = r.f64()?;
    let origin = [r.i32()?, r.i32()?, r.i32()?];
    let extents = [r.i32()?, r.i32()?, r.i32()?];
    let spacing = [r.f64()?, r.f64()?, r.f64()?];

    let mut block = FieldBlock {
        wavelength,
        origin,
        extents,
        spacing,
        values: Vec::new(),
        materials: Vec::new(),
    };
    for _ in 0..r.cells(&extents, 100)? {
        block.values.push(r.cell()?);
        block.materials.push(r.u32()?);
    }
    r.finish()?;
    Ok(block)
}

/// Read a field map; materials are loaded when the sibling file exists
pub fn read_map(path: &Path) -> Result<FieldMap> {
    let bytes = read_bytes(path)?;
    let mut r = Reader::new(path, &bytes);

    let wavelength = r.f64()?;
    let tag = r.i32()?;
    let axis = match tag {
        0..=2 => Axis::from_index(tag as usize),
        _ => {
            return Err(FdtdError::Format {
                path: path.to_path_buf(),
                reason: format!("unknown axis tag {tag}"),
            })
        }
    };
    let origin = [r.i32()?, r.i32()?];
    let extents = [r.i32()?, r.i32()?];
    let spacing = [r.f64()?, r.f64()?];

    let mut map = FieldMap {
        wavelength,
        axis,
        origin,
        extents,
        spacing,
        values: Vec::new(),
        materials: Vec::new(),
    };
    for _ in 0..r.cells(&extents, 96)? {
        map.values.push(r.cell()?);
    }
    r.finish()?;

    let mat_path = material_path(path);
    if mat_path.exists() {
        let bytes = read_bytes(&mat_path)?;
        let mut r = Reader::new(&mat_path, &bytes);
        let mat_extents = [r.i32()?, r.i32()?];
        if mat_extents != map.extents {
            return Err(FdtdError::Format {
                path: mat_path.clone(),
                reason: format!("extents {mat_extents:?} do not match {:?}", map.extents),
            });
        }
        for _ in 0..r.cells(&mat_extents, 4)? {
            map.materials.push(r.u32()?);
        }
        r.finish()?;
    }
    Ok(map)
}
