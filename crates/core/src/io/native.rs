//! Native GeoTIFF reading/writing with the `tiff` crate.
//!
//! Only north-up grids are supported. Besides the cell values the file keeps
//! what a surface needs to be reloaded faithfully: pixel scale and tie point,
//! a GeoKey directory with the EPSG code (or WKT citation) and the
//! GDAL_NODATA tag.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::{BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray64Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GEO_ASCII_PARAMS: u16 = 34737;
const GDAL_NODATA: u16 = 42113;

const KEY_MODEL_TYPE: u16 = 1024;
const KEY_RASTER_TYPE: u16 = 1025;
const KEY_CITATION: u16 = 1026;
const KEY_GEOGRAPHIC_TYPE: u16 = 2048;
const KEY_PROJECTED_TYPE: u16 = 3072;

const EPSG_CITATION: &str = "EPSG:";

const MODEL_PROJECTED: u16 = 1;
const MODEL_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

/// Read a GeoTIFF file into a Raster
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    decode_geotiff(file)
}

/// Read a GeoTIFF from an in-memory buffer into a Raster
pub fn read_geotiff_from_buffer<T: RasterElement>(data: &[u8]) -> Result<Raster<T>> {
    decode_geotiff(Cursor::new(data))
}

fn tiff_err(what: &str) -> impl Fn(tiff::TiffError) -> Error + '_ {
    move |e| Error::Parse(format!("{}: {}", what, e))
}

fn decode_geotiff<T, R>(reader: R) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut decoder = Decoder::new(reader).map_err(tiff_err("TIFF decode error"))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(tiff_err("Cannot read dimensions"))?;
    let rows = height as usize;
    let cols = width as usize;

    let result = decoder
        .read_image()
        .map_err(tiff_err("Cannot read image data"))?;

    let data: Vec<T> = match result {
        DecodingResult::F64(buf) => cast_all(buf),
        DecodingResult::F32(buf) => cast_all(buf),
        DecodingResult::I16(buf) => cast_all(buf),
        DecodingResult::I32(buf) => cast_all(buf),
        DecodingResult::U8(buf) => cast_all(buf),
        DecodingResult::U16(buf) => cast_all(buf),
        _ => {
            return Err(Error::Parse(
                "Unsupported TIFF pixel format for a surface".to_string(),
            ))
        }
    };

    let mut raster = Raster::from_vec(data, rows, cols)?;

    if let Some(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(transform);
    }
    raster.set_crs(read_crs(&mut decoder));

    let nodata = decoder
        .get_tag_ascii_string(Tag::from_u16_exhaustive(GDAL_NODATA))
        .ok()
        .and_then(|s| s.trim_matches(char::from(0)).trim().parse::<f64>().ok())
        .and_then(num_traits::cast::<f64, T>);
    raster.set_nodata(Some(nodata.unwrap_or_else(T::default_nodata)));

    Ok(raster)
}

fn cast_all<S, T>(buf: Vec<S>) -> Vec<T>
where
    S: num_traits::NumCast + Copy,
    T: RasterElement,
{
    buf.into_iter()
        .map(|v| num_traits::cast(v).unwrap_or_else(T::default_nodata))
        .collect()
}

fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder
        .get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE))
        .ok()?;
    let tiepoint = decoder.get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_TIEPOINT)).ok()?;

    if scale.len() < 2 || tiepoint.len() < 6 {
        return None;
    }
    // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
    Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]))
}

fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder
        .get_tag_u16_vec(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY))
        .ok()?;
    if keys.len() < 4 {
        return None;
    }

    let mut citation = None;
    for entry in keys[4..].chunks_exact(4) {
        let (id, location, count, value) = (entry[0], entry[1], entry[2], entry[3]);
        match id {
            KEY_GEOGRAPHIC_TYPE | KEY_PROJECTED_TYPE if location == 0 && value != 0 => {
                return Some(CRS::from_epsg(value as u32));
            }
            KEY_CITATION if location == GEO_ASCII_PARAMS => {
                citation = Some((value as usize, count as usize));
            }
            _ => {}
        }
    }

    let (offset, count) = citation?;
    let params = decoder
        .get_tag_ascii_string(Tag::from_u16_exhaustive(GEO_ASCII_PARAMS))
        .ok()?;
    let text: String = params.chars().skip(offset).take(count).collect();
    let text = text.trim_end_matches('|').trim();
    if let Some(code) = text
        .strip_prefix(EPSG_CITATION)
        .and_then(|c| c.parse::<u32>().ok())
    {
        return Some(CRS::from_epsg(code));
    }
    (!text.is_empty()).then(|| CRS::from_wkt(text))
}

/// Write a Raster to a GeoTIFF file (64-bit float cells)
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    encode_geotiff(raster, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Write a Raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer<T: RasterElement>(raster: &Raster<T>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf))?;
    Ok(buf)
}

fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    let mut encoder = TiffEncoder::new(writer).map_err(tiff_err("TIFF encoder error"))?;

    let (rows, cols) = raster.shape();
    let data: Vec<f64> = raster
        .data()
        .iter()
        .map(|&v| v.to_f64().unwrap_or(f64::NAN))
        .collect();

    let mut image = encoder
        .new_image::<Gray64Float>(cols as u32, rows as u32)
        .map_err(tiff_err("Cannot create TIFF image"))?;

    let gt = raster.transform();
    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE), &scale[..])
        .map_err(tiff_err("Cannot write scale tag"))?;

    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::from_u16_exhaustive(MODEL_TIEPOINT), &tiepoint[..])
        .map_err(tiff_err("Cannot write tiepoint tag"))?;

    let (geokeys, ascii) = geokey_directory(raster.crs());
    image
        .encoder()
        .write_tag(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY), geokeys.as_slice())
        .map_err(tiff_err("Cannot write geokey tag"))?;
    if let Some(ascii) = ascii {
        image
            .encoder()
            .write_tag(Tag::from_u16_exhaustive(GEO_ASCII_PARAMS), ascii.as_str())
            .map_err(tiff_err("Cannot write geo ascii params"))?;
    }

    let nodata = raster
        .nodata()
        .and_then(|v| v.to_f64())
        .filter(|v| !v.is_nan())
        .map(|v| v.to_string())
        .unwrap_or_else(|| "nan".to_string());
    image
        .encoder()
        .write_tag(Tag::from_u16_exhaustive(GDAL_NODATA), nodata.as_str())
        .map_err(tiff_err("Cannot write nodata tag"))?;

    image
        .write_data(&data)
        .map_err(tiff_err("Cannot write image data"))?;

    Ok(())
}

/// GeoKey directory for `crs`, plus the GeoAsciiParams string when the CRS
/// is only known as WKT or its EPSG code does not fit a GeoKey value.
fn geokey_directory(crs: Option<&CRS>) -> (Vec<u16>, Option<String>) {
    let mut keys: Vec<[u16; 4]> = vec![[KEY_RASTER_TYPE, 0, 1, RASTER_PIXEL_IS_AREA]];
    let mut ascii = None;

    let citation = match (crs.and_then(CRS::epsg), crs.and_then(CRS::wkt)) {
        (Some(code), _) => match u16::try_from(code) {
            Ok(code) => {
                // 4000-4999 are geographic CRS codes
                if (4000..5000).contains(&code) {
                    keys.push([KEY_MODEL_TYPE, 0, 1, MODEL_GEOGRAPHIC]);
                    keys.push([KEY_GEOGRAPHIC_TYPE, 0, 1, code]);
                } else {
                    keys.push([KEY_MODEL_TYPE, 0, 1, MODEL_PROJECTED]);
                    keys.push([KEY_PROJECTED_TYPE, 0, 1, code]);
                }
                None
            }
            // e.g. ESRI 102100
            Err(_) => Some(format!("{}{}|", EPSG_CITATION, code)),
        },
        (None, Some(wkt)) => Some(format!("{}|", wkt)),
        (None, None) => None,
    };
    if let Some(text) = citation {
        keys.push([KEY_CITATION, GEO_ASCII_PARAMS, text.len() as u16, 0]);
        ascii = Some(text);
    }
    if !keys.iter().any(|k| k[0] == KEY_MODEL_TYPE) {
        keys.push([KEY_MODEL_TYPE, 0, 1, MODEL_PROJECTED]);
    }
    // GeoKeys are sorted by id
    keys.sort_by_key(|k| k[0]);

    let mut directory = vec![1, 1, 0, keys.len() as u16];
    directory.extend(keys.into_iter().flatten());
    (directory, ascii)
}
