//! FITS images and headers on top of `fitsio`.
//!
//! Arrays handed to and returned from this module are indexed with `NAXIS1`
//! first (`[x, y, wave]` for cubes), the reverse of fitsio's row-major shapes.

use std::path::Path;

use fitsio::compat::fitsfile::FitsFile;
use fitsio::compat::hdu::{FitsHdu, HduInfo};
use fitsio::compat::images::{ImageDescription, ImageType};
use fitsio::header::Card;
use fitsio::value::Value;
use ndarray::{Array2, ArrayD, Axis, IxDyn};

use crate::consts::{ANGSTROM_TO_METRE, DEFAULT_EQUINOX};
use crate::error::{CubeError, Result};
use crate::grid::CubeWcs;

/// Keywords describing the data layout; fitsio writes these itself.
const STRUCTURAL: [&str; 8] = [
    "SIMPLE", "XTENSION", "BITPIX", "EXTEND", "PCOUNT", "GCOUNT", "BSCALE", "BZERO",
];

/// Value of a header card.
#[derive(Clone, Debug, PartialEq)]
pub enum HeaderValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl HeaderValue {
    fn from_card(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::Str(s.trim_end().to_string())),
            Value::Integer(i) => Some(Self::Int(*i)),
            Value::Float(f) => Some(Self::Float(*f)),
            Value::Logical(b) => Some(Self::Bool(*b)),
            _ => None,
        }
    }
}

/// Ordered list of header cards (structural keywords excluded).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FitsHeader {
    cards: Vec<(String, HeaderValue)>,
}

impl FitsHeader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: HeaderValue) {
        let key = key.to_ascii_uppercase();
        match self.cards.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.cards.push((key, value)),
        }
    }

    pub fn set_str(&mut self, key: &str, value: &str) {
        self.set(key, HeaderValue::Str(value.to_string()));
    }

    pub fn set_int(&mut self, key: &str, value: i64) {
        self.set(key, HeaderValue::Int(value));
    }

    pub fn set_float(&mut self, key: &str, value: f64) {
        self.set(key, HeaderValue::Float(value));
    }

    pub fn set_bool(&mut self, key: &str, value: bool) {
        self.set(key, HeaderValue::Bool(value));
    }

    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        self.cards.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            HeaderValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            HeaderValue::Int(i) => Some(*i),
            HeaderValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn get_float(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            HeaderValue::Float(f) => Some(*f),
            HeaderValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            HeaderValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn cards(&self) -> impl Iterator<Item = (&str, &HeaderValue)> {
        self.cards.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn from_cards(cards: &[Card]) -> Self {
        let mut header = Self::new();
        for card in cards {
            let key = card.keyword_str();
            if STRUCTURAL.contains(&key) || key.starts_with("NAXIS") {
                continue;
            }
            if let Some(value) = card.value.as_ref().and_then(HeaderValue::from_card) {
                header.set(key, value);
            }
        }
        header
    }

    fn write_to(&self, file: &mut FitsFile, hdu: &FitsHdu) -> Result<()> {
        for (key, value) in self.cards() {
            match value {
                HeaderValue::Str(s) => hdu.write_key(file, key, s.as_str())?,
                HeaderValue::Int(i) => hdu.write_key(file, key, *i)?,
                HeaderValue::Float(f) => hdu.write_key(file, key, *f)?,
                HeaderValue::Bool(b) => hdu.write_key(file, key, *b)?,
            }
        }
        Ok(())
    }
}

/// Pixel data of one HDU.
#[derive(Clone, Debug)]
pub enum HduData {
    F64(ArrayD<f64>),
    U8(ArrayD<u8>),
}

impl HduData {
    fn image_type(&self) -> ImageType {
        match self {
            Self::F64(_) => ImageType::Double,
            Self::U8(_) => ImageType::UnsignedByte,
        }
    }

    fn shape(&self) -> &[usize] {
        match self {
            Self::F64(a) => a.shape(),
            Self::U8(a) => a.shape(),
        }
    }

    fn write(&self, file: &mut FitsFile, hdu: &FitsHdu) -> Result<()> {
        // Iterating the transposed view yields NAXIS1 fastest, the on-disk order.
        match self {
            Self::F64(a) => {
                let pixels: Vec<f64> = a.t().iter().copied().collect();
                hdu.write_image(file, &pixels)?;
            }
            Self::U8(a) => {
                let pixels: Vec<u8> = a.t().iter().copied().collect();
                hdu.write_image(file, &pixels)?;
            }
        }
        Ok(())
    }
}

/// fitsio lists the slowest axis first.
fn row_major(shape: &[usize]) -> Vec<usize> {
    shape.iter().rev().copied().collect()
}

/// Writes a file with a header-only primary HDU followed by IMAGE extensions.
pub struct FitsWriter {
    file: FitsFile,
}

impl FitsWriter {
    /// Create (or replace) `path`, putting `primary` cards in the empty primary HDU.
    pub fn create(path: &Path, primary: &FitsHeader) -> Result<Self> {
        let mut file = FitsFile::create(path).overwrite().open()?;
        let hdu = file.primary_hdu()?;
        primary.write_to(&mut file, &hdu)?;
        Ok(Self { file })
    }

    /// Append an IMAGE extension named `extname`.
    pub fn write_extension(&mut self, extname: &str, header: &FitsHeader, data: &HduData) -> Result<()> {
        let dimensions = row_major(data.shape());
        let description = ImageDescription {
            data_type: data.image_type(),
            dimensions: &dimensions,
        };
        let hdu = self.file.create_image(extname, &description)?;
        header.write_to(&mut self.file, &hdu)?;
        data.write(&mut self.file, &hdu)
    }

    pub fn finalize(self) -> Result<()> {
        save(self.file)
    }
}

/// Nothing reaches the disk until the file is saved; consuming it here
/// surfaces write errors that a drop would swallow.
fn save(file: FitsFile) -> Result<()> {
    file.into_bytes()?;
    Ok(())
}

/// Write `data` as the primary HDU of a single-image file.
pub fn write_primary(path: &Path, header: &FitsHeader, data: &HduData) -> Result<()> {
    let dimensions = row_major(data.shape());
    let description = ImageDescription {
        data_type: data.image_type(),
        dimensions: &dimensions,
    };
    let mut file = FitsFile::create(path)
        .overwrite()
        .with_custom_primary(&description)
        .open()?;
    let hdu = file.primary_hdu()?;
    header.write_to(&mut file, &hdu)?;
    data.write(&mut file, &hdu)?;
    save(file)
}

/// Read access to the HDUs of an existing file.
pub struct FitsReader {
    file: FitsFile,
}

impl FitsReader {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            file: FitsFile::open(path)?,
        })
    }

    pub fn hdu_count(&self) -> Result<usize> {
        Ok(self.file.num_hdus()?)
    }

    /// Index of the HDU with the given `EXTNAME` (case-insensitive).
    pub fn find(&self, extname: &str) -> Option<usize> {
        self.file.hdu(extname).ok().map(|hdu| hdu.number)
    }

    /// Non-structural cards of an HDU.
    pub fn header(&self, index: usize) -> Result<FitsHeader> {
        let parsed = self.file.parsed()?;
        let hdu = parsed.get(index).ok_or_else(|| {
            CubeError::InvalidFits(format!("HDU {index} requested, file has {}", parsed.len()))
        })?;
        Ok(FitsHeader::from_cards(&hdu.cards))
    }

    /// Data of an image HDU as `f64`, with `BSCALE`/`BZERO` applied.
    pub fn read_f64(&self, index: usize) -> Result<ArrayD<f64>> {
        let hdu = self.file.hdu(index)?;
        let shape = match &hdu.info {
            HduInfo::ImageInfo { shape, .. } => shape.clone(),
            _ => return Err(CubeError::InvalidFits(format!("HDU {index} is not an image"))),
        };
        if shape.is_empty() {
            return Ok(ArrayD::zeros(IxDyn(&[0])));
        }
        let pixels: Vec<f64> = hdu.read_image(&self.file)?;
        let array = ArrayD::from_shape_vec(IxDyn(&shape), pixels)
            .map_err(|e| CubeError::InvalidFits(format!("HDU {index}: {e}")))?;
        Ok(array.reversed_axes())
    }
}

/// Add the grid's WCS cards for its first `naxis` axes.
pub fn wcs_to_header(header: &mut FitsHeader, wcs: &CubeWcs, naxis: usize) {
    const CTYPE: [&str; 3] = ["RA---TAN", "DEC--TAN", "WAVE"];
    const CUNIT: [&str; 3] = ["deg", "deg", "m"];
    const CNAME: [&str; 3] = ["RA", "DEC", "Wavelength"];

    header.set_str("WCSNAME", &wcs.name);
    header.set_str("RADESYS", "FK5");
    header.set_float("EQUINOX", wcs.equinox);
    for i in 0..naxis.min(3) {
        let n = i + 1;
        header.set_str(&format!("CTYPE{n}"), CTYPE[i]);
        header.set_str(&format!("CUNIT{n}"), CUNIT[i]);
        header.set_str(&format!("CNAME{n}"), CNAME[i]);
        header.set_float(&format!("CRVAL{n}"), wcs.crval[i]);
        header.set_float(&format!("CDELT{n}"), wcs.cdelt[i]);
        header.set_float(&format!("CRPIX{n}"), wcs.crpix[i] + 1.0);
    }
    header.set_float("LONPOLE", 180.0);
    header.set_float("LATPOLE", 0.0);
    header.set_float("DEC_REF", wcs.dec_ref);
}

/// Rebuild a grid WCS from header cards. `shape` is used to place the
/// compression declination at the image centre when `DEC_REF` is absent.
pub fn wcs_from_header(header: &FitsHeader, shape: &[usize]) -> CubeWcs {
    let mut wcs = CubeWcs::default();
    for i in 0..3 {
        let n = i + 1;
        wcs.crval[i] = header.get_float(&format!("CRVAL{n}")).unwrap_or(0.0);
        wcs.cdelt[i] = header
            .get_float(&format!("CDELT{n}"))
            .or_else(|| header.get_float(&format!("CD{n}_{n}")))
            .unwrap_or(1.0);
        wcs.crpix[i] = header.get_float(&format!("CRPIX{n}")).unwrap_or(1.0) - 1.0;
    }
    if let Some(unit) = header.get_str("CUNIT3") {
        if unit.trim().eq_ignore_ascii_case("angstrom") {
            wcs.crval[2] *= ANGSTROM_TO_METRE;
            wcs.cdelt[2] *= ANGSTROM_TO_METRE;
        }
    }
    wcs.dec_ref = header.get_float("DEC_REF").unwrap_or_else(|| {
        let centre = shape.get(1).map_or(0.0, |&ny| (ny as f64 - 1.0) / 2.0);
        wcs.crval[1] + (centre - wcs.crpix[1]) * wcs.cdelt[1]
    });
    wcs.equinox = header.get_float("EQUINOX").unwrap_or(DEFAULT_EQUINOX);
    if let Some(name) = header.get_str("WCSNAME") {
        wcs.name = name.to_string();
    }
    wcs
}

/// Write a 2D image (indexed `[x, y]`) with the celestial part of `wcs` in
/// the primary header.
pub fn write_image(path: &Path, image: &Array2<f64>, wcs: &CubeWcs, extra: &FitsHeader) -> Result<()> {
    let mut header = extra.clone();
    wcs_to_header(&mut header, wcs, 2);
    write_primary(path, &header, &HduData::F64(image.clone().into_dyn()))
}

/// Load a 2D image from `ext` and its WCS.
///
/// A 3D HDU is collapsed by taking its first spectral plane.
pub fn load_image_wcs_ext(path: &Path, ext: usize) -> Result<(Array2<f64>, CubeWcs)> {
    let reader = FitsReader::open(path)?;
    let data = reader.read_f64(ext)?;
    let shape = data.shape().to_vec();
    let image = match data.ndim() {
        2 => data.into_dimensionality::<ndarray::Ix2>(),
        3 => data.index_axis(Axis(2), 0).to_owned().into_dimensionality::<ndarray::Ix2>(),
        n => {
            return Err(CubeError::InvalidFits(format!(
                "expected a 2D image in HDU {ext}, found {n} axes"
            )));
        }
    }
    .map_err(|e| CubeError::InvalidFits(e.to_string()))?;
    let wcs = wcs_from_header(&reader.header(ext)?, &shape);
    Ok((image, wcs))
}

/// Load the primary-HDU image of a reference file and its WCS.
pub fn load_image_wcs(path: &Path) -> Result<(Array2<f64>, CubeWcs)> {
    load_image_wcs_ext(path, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;
    use tempfile::TempDir;

    #[test]
    fn test_header_cards_survive_a_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cards.fits");
        let mut header = FitsHeader::new();
        header.set_str("OBJECT", "O'Brien field");
        header.set_int("NFRAMES", 3);
        header.set_float("CDELT3", -1.25e-10);
        header.set_bool("FLUXED", true);
        let image = Array2::from_shape_fn((3, 2), |(x, y)| (x + 10 * y) as f64);
        write_primary(&path, &header, &HduData::F64(image.into_dyn())).unwrap();

        let read = FitsReader::open(&path).unwrap().header(0).unwrap();
        assert_eq!(read.get_str("OBJECT"), Some("O'Brien field"));
        assert_eq!(read.get_int("NFRAMES"), Some(3));
        assert_eq!(read.get_float("CDELT3"), Some(-1.25e-10));
        assert_eq!(read.get_bool("FLUXED"), Some(true));
        // Layout keywords stay out of the user-facing header.
        assert!(read.get("BITPIX").is_none());
        assert!(read.get("NAXIS1").is_none());
    }

    #[test]
    fn test_axis_order_matches_naxis() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("order.fits");
        let cube = Array3::from_shape_fn((4, 3, 2), |(x, y, z)| (x + 10 * y + 100 * z) as f64);
        let mut writer = FitsWriter::create(&path, &FitsHeader::new()).unwrap();
        writer
            .write_extension("DATA", &FitsHeader::new(), &HduData::F64(cube.clone().into_dyn()))
            .unwrap();
        writer.finalize().unwrap();

        let reader = FitsReader::open(&path).unwrap();
        let index = reader.find("data").unwrap();
        assert_eq!(index, 1);
        let back = reader.read_f64(index).unwrap();
        assert_eq!(back.shape(), &[4, 3, 2]);
        assert_eq!(back, cube.into_dyn());
        // The primary HDU has no data unit.
        assert_eq!(reader.read_f64(0).unwrap().len(), 0);
    }
}
