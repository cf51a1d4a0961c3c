//! Raster load/save.
//!
//! GeoTIFF support is native (the `tiff` crate) and limited to what the
//! pipeline needs: a single float band, a north-up pixel scale and tiepoint,
//! and the GDAL no-data tag. Projection keys are not interpreted.
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;

use tiff::decoder::ifd::Value;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;
use tracing::debug;

use crate::error::{CanopyError, Result};
use crate::grid::Grid;

/// Somewhere grids can be loaded from and saved to.
pub trait RasterStore {
    fn load(&self, path: &Path) -> Result<Grid>;
    fn save(&self, grid: &Grid, path: &Path) -> Result<()>;
}

/// Single-band float32 GeoTIFF files.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoTiffStore;

/// serde_json encoding of [`Grid`].
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonStore;

/// Pick a store from the file extension: `.json` → JSON, anything else → GeoTIFF.
pub fn store_for_path(path: &Path) -> Box<dyn RasterStore> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => Box::new(JsonStore),
        _ => Box::new(GeoTiffStore),
    }
}

pub fn read_raster(path: &Path) -> Result<Grid> {
    store_for_path(path).load(path)
}

pub fn write_raster(grid: &Grid, path: &Path) -> Result<()> {
    store_for_path(path).save(grid, path)
}

impl RasterStore for GeoTiffStore {
    fn load(&self, path: &Path) -> Result<Grid> {
        let file = File::open(path)?;
        let grid = decode_geotiff(BufReader::new(file))?;
        grid.validate()?;
        debug!(path = %path.display(), width = grid.width, height = grid.height, "raster loaded");
        Ok(grid)
    }

    fn save(&self, grid: &Grid, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        encode_geotiff(grid, BufWriter::new(file))?;
        debug!(path = %path.display(), "raster saved");
        Ok(())
    }
}

impl RasterStore for JsonStore {
    fn load(&self, path: &Path) -> Result<Grid> {
        let grid: Grid = serde_json::from_str(&fs::read_to_string(path)?)?;
        grid.validate()?;
        Ok(grid)
    }

    fn save(&self, grid: &Grid, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string(grid)?)?;
        Ok(())
    }
}

fn widen<T: Copy>(buf: Vec<T>, f: impl Fn(T) -> f32) -> Vec<f32> {
    buf.into_iter().map(f).collect()
}

/// Pixel scale, tiepoint and GDAL no-data tags of the current image.
struct GeoTags {
    scale: Option<Vec<f64>>,
    tiepoint: Option<Vec<f64>>,
    nodata: Option<String>,
}

fn read_geo_tags<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<GeoTags> {
    Ok(GeoTags {
        scale: decoder.find_tag(Tag::ModelPixelScaleTag)?.map(Value::into_f64_vec).transpose()?,
        tiepoint: decoder.find_tag(Tag::ModelTiepointTag)?.map(Value::into_f64_vec).transpose()?,
        nodata: decoder.find_tag(Tag::GdalNodata)?.map(Value::into_string).transpose()?,
    })
}

fn parse_nodata(text: &str) -> Result<f32> {
    let s = text.trim_matches(char::from(0)).trim();
    if s.eq_ignore_ascii_case("nan") {
        return Ok(f32::NAN);
    }
    s.parse::<f32>()
        .map_err(|_| CanopyError::Tiff(format!("unreadable GDAL no-data value {s:?}")))
}

fn decode_geotiff<R: Read + Seek>(reader: R) -> Result<Grid> {
    let mut decoder = Decoder::new(reader)?;
    let (width, height) = decoder.dimensions()?;
    let (cols, rows) = (width as usize, height as usize);
    let tags = read_geo_tags(&mut decoder)?;

    let data = match decoder.read_image()? {
        DecodingResult::F32(buf) => buf,
        DecodingResult::F64(buf) => widen(buf, |v| v as f32),
        DecodingResult::U8(buf) => widen(buf, f32::from),
        DecodingResult::U16(buf) => widen(buf, f32::from),
        DecodingResult::U32(buf) => widen(buf, |v| v as f32),
        DecodingResult::I8(buf) => widen(buf, f32::from),
        DecodingResult::I16(buf) => widen(buf, f32::from),
        DecodingResult::I32(buf) => widen(buf, |v| v as f32),
        _ => return Err(CanopyError::Tiff("unsupported pixel format".into())),
    };
    if data.len() != rows * cols {
        // Multi-band images decode to interleaved samples.
        return Err(CanopyError::Tiff(format!(
            "expected one band of {cols}x{rows} samples, got {}",
            data.len()
        )));
    }

    let mut grid = Grid::from_vec(data, cols, rows)?;

    if let (Some(scale), Some(tp)) = (tags.scale, tags.tiepoint) {
        if scale.len() >= 2 && tp.len() >= 6 {
            // tiepoint: raster (I, J, K) → model (X, Y, Z)
            grid.cell_size = scale[0];
            grid.origin_x = tp[3] - tp[0] * scale[0];
            grid.origin_y = tp[4] + tp[1] * scale[1];
        }
    }
    if let Some(text) = tags.nodata {
        grid.nodata = Some(parse_nodata(&text)?);
    }

    Ok(grid)
}

fn encode_geotiff<W: Write + Seek>(grid: &Grid, writer: W) -> Result<()> {
    grid.validate()?;
    let mut encoder = TiffEncoder::new(writer)?;
    let mut image = encoder.new_image::<Gray32Float>(grid.width as u32, grid.height as u32)?;

    let scale = [grid.cell_size, grid.cell_size, 0.0];
    image.encoder().write_tag(Tag::ModelPixelScaleTag, &scale[..])?;

    let tiepoint = [0.0, 0.0, 0.0, grid.origin_x, grid.origin_y, 0.0];
    image.encoder().write_tag(Tag::ModelTiepointTag, &tiepoint[..])?;

    // Version 1.1.0, two keys: projected model, pixel-is-area.
    let geokeys: [u16; 12] = [1, 1, 0, 2, 1024, 0, 1, 1, 1025, 0, 1, 1];
    image.encoder().write_tag(Tag::GeoKeyDirectoryTag, &geokeys[..])?;

    if let Some(nd) = grid.nodata {
        let text = if nd.is_nan() { "nan".to_string() } else { nd.to_string() };
        image.encoder().write_tag(Tag::GdalNodata, text.as_str())?;
    }

    image.write_data(&grid.data)?;
    Ok(())
}
