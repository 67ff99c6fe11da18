//! Multi-extension FITS files holding a datacube.

use std::path::Path;

use ndarray::{Array3, Ix3};
use tracing::info;

use crate::cube::DataCube;
use crate::error::{CubeError, Result};
use crate::grid::CubeWcs;

use super::fits::{wcs_from_header, wcs_to_header, write_primary, FitsHeader, FitsReader, FitsWriter, HduData};

/// Extension names, in file order after the primary HDU.
pub const FLUX_EXT: &str = "FLUX";
pub const SIG_EXT: &str = "SIG";
pub const BPM_EXT: &str = "BPM";

/// Write a header-only primary HDU and the `FLUX`, `SIG` and `BPM` image
/// extensions, each carrying the cube's WCS. `extra` cards go into every header.
pub fn write_cube(path: &Path, cube: &DataCube, extra: &FitsHeader) -> Result<()> {
    let mut header = extra.clone();
    wcs_to_header(&mut header, &cube.wcs, 3);

    let mut writer = FitsWriter::create(path, &header)?;
    writer.write_extension(FLUX_EXT, &header, &HduData::F64(cube.flux.clone().into_dyn()))?;
    writer.write_extension(SIG_EXT, &header, &HduData::F64(cube.sigma.clone().into_dyn()))?;
    writer.write_extension(BPM_EXT, &header, &HduData::U8(cube.bpm.clone().into_dyn()))?;
    writer.finalize()?;

    info!(path = %path.display(), shape = ?cube.shape(), "Saved datacube");
    Ok(())
}

/// Write a bare cube (e.g. residuals) as a single primary HDU.
pub fn write_primary_cube(path: &Path, data: &Array3<f64>, wcs: &CubeWcs) -> Result<()> {
    let mut header = FitsHeader::new();
    wcs_to_header(&mut header, wcs, 3);
    write_primary(path, &header, &HduData::F64(data.clone().into_dyn()))?;
    info!(path = %path.display(), "Saved cube");
    Ok(())
}

/// Read a cube written by [`write_cube`].
pub fn read_cube(path: &Path) -> Result<DataCube> {
    let reader = FitsReader::open(path)?;
    let load = |extname: &str| -> Result<(usize, Array3<f64>)> {
        let index = reader
            .find(extname)
            .ok_or_else(|| CubeError::InvalidFits(format!("missing {extname} extension")))?;
        let data = reader
            .read_f64(index)?
            .into_dimensionality::<Ix3>()
            .map_err(|_| CubeError::InvalidFits(format!("{extname} extension is not a 3D cube")))?;
        Ok((index, data))
    };

    let (flux_index, flux) = load(FLUX_EXT)?;
    let (_, sigma) = load(SIG_EXT)?;
    let (_, bpm) = load(BPM_EXT)?;
    if sigma.dim() != flux.dim() || bpm.dim() != flux.dim() {
        return Err(CubeError::InvalidFits("cube extensions have different shapes".into()));
    }

    let wcs = wcs_from_header(&reader.header(flux_index)?, flux.shape());
    let wave = wcs.wavelengths(flux.dim().2);
    Ok(DataCube {
        flux,
        sigma,
        bpm: bpm.mapv(|v| u8::from(v != 0.0)),
        wave,
        wcs,
        residual: None,
    })
}
