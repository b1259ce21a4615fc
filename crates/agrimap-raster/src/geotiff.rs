//! GeoTIFF decoding and encoding on top of the `tiff` crate.

use std::fs::File;
use std::io::{BufReader, Read, Seek, Write};
use std::path::Path;

use ndarray::{Array2, Array3};
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::compression::Lzw;
use tiff::encoder::{DirectoryEncoder, TiffEncoder, TiffKind, colortype};
use tiff::tags::Tag;
use tiff::{TiffError, TiffResult};
use tracing::{debug, info, instrument, warn};

use crate::error::RasterError;
use crate::grid::{ClassRaster, Raster, RasterGrid};
use crate::spatial_ref::SpatialRef;
use crate::transform::GeoTransform;

const GDAL_NODATA: Tag = Tag::Unknown(42113);

/// `NewSubfileType` bits for reduced-resolution overviews and transparency masks.
const SUBFILE_REDUCED: u32 = 1;
const SUBFILE_MASK: u32 = 4;

/// Read every band of a GeoTIFF as `f32`.
///
/// Bands may be interleaved samples of one page, separate pages, or both;
/// they are stacked in file order. Overview and mask pages, flagged through
/// `NewSubfileType`, are skipped. Pixels equal to the `GDAL_NODATA` value
/// become NaN. Files without georeferencing get a unit pixel-space transform.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`RasterError::Io`] | file cannot be opened |
/// | [`RasterError::Decode`] | not a readable TIFF |
/// | [`RasterError::UnsupportedSampleType`] | sample format not handled |
/// | [`RasterError::PageShapeMismatch`] | full-resolution pages differ in size |
/// | [`RasterError::RaggedBuffer`] | sample count is not a multiple of the pixel count |
#[instrument(fields(path = %path.as_ref().display()))]
pub fn read_raster(path: impl AsRef<Path>) -> Result<Raster, RasterError> {
    let path = path.as_ref();
    let decode_err = |source: TiffError| RasterError::Decode {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(|source| RasterError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut decoder = Decoder::new(BufReader::new(file))
        .map_err(decode_err)?
        .with_limits(Limits::unlimited());

    let (width, height) = decoder.dimensions().map_err(decode_err)?;
    let (cols, rows) = (width as usize, height as usize);
    let n_pixels = rows * cols;
    let (transform, spatial_ref, nodata) = read_georeferencing(&mut decoder).map_err(decode_err)?;

    let mut band_major: Vec<f32> = Vec::new();
    let mut page = 0;
    loop {
        let subfile = decoder
            .find_tag(Tag::NewSubfileType)
            .map_err(decode_err)?
            .map(|v| v.into_u32())
            .transpose()
            .map_err(decode_err)?
            .unwrap_or(0);
        let (w, h) = decoder.dimensions().map_err(decode_err)?;
        if page > 0 && subfile & (SUBFILE_REDUCED | SUBFILE_MASK) != 0 {
            debug!(page, subfile, width = w, height = h, "skipping overview page");
        } else if (w as usize, h as usize) != (cols, rows) {
            return Err(RasterError::PageShapeMismatch {
                path: path.to_path_buf(),
                page,
                cols,
                rows,
                found_cols: w as usize,
                found_rows: h as usize,
            });
        } else {
            let samples = to_f32(decoder.read_image().map_err(decode_err)?)
                .ok_or_else(|| RasterError::UnsupportedSampleType {
                    path: path.to_path_buf(),
                })?;
            if n_pixels == 0 || samples.len() % n_pixels != 0 {
                return Err(RasterError::RaggedBuffer {
                    path: path.to_path_buf(),
                    len: samples.len(),
                    cols,
                    rows,
                });
            }
            let per_pixel = samples.len() / n_pixels;
            for band in 0..per_pixel {
                band_major.extend(samples.iter().skip(band).step_by(per_pixel));
            }
            debug!(page, samples_per_pixel = per_pixel, "decoded page");
        }

        if !decoder.more_images() {
            break;
        }
        decoder.next_image().map_err(decode_err)?;
        page += 1;
    }

    if let Some(sentinel) = nodata.filter(|v| !v.is_nan()) {
        let sentinel = sentinel as f32;
        band_major.iter_mut().filter(|v| **v == sentinel).for_each(|v| *v = f32::NAN);
    }

    let n_bands = band_major.len() / n_pixels;
    let data = Array3::from_shape_vec((n_bands, rows, cols), band_major)?;
    let grid = RasterGrid::new(rows, cols, transform)
        .with_spatial_ref(spatial_ref)
        .with_nodata(nodata);
    info!(
        bands = n_bands,
        rows,
        cols,
        epsg = ?grid.spatial_ref.epsg(),
        "raster loaded"
    );
    Raster::new(data, grid)
}

/// Read a single-band integer raster as class ids; NaN or nodata becomes 0.
///
/// # Errors
///
/// Everything [`read_raster`] returns, plus [`RasterError::NotSingleBand`] and
/// [`RasterError::ClassOutOfRange`] for values that are not integers in `0..=255`.
pub fn read_class_raster(path: impl AsRef<Path>) -> Result<ClassRaster, RasterError> {
    let path = path.as_ref();
    let raster = read_raster(path)?;
    if raster.n_bands() != 1 {
        return Err(RasterError::NotSingleBand {
            path: path.to_path_buf(),
            bands: raster.n_bands(),
        });
    }
    let mut classes = Array2::zeros((raster.grid().rows, raster.grid().cols));
    for (out, &v) in classes.iter_mut().zip(raster.band(0).iter()) {
        if v.is_nan() {
            continue;
        }
        if v.fract() != 0.0 || !(0.0..=255.0).contains(&v) {
            return Err(RasterError::ClassOutOfRange {
                path: path.to_path_buf(),
                value: f64::from(v),
            });
        }
        *out = v as u8;
    }
    ClassRaster::new(classes, raster.grid().clone())
}

/// Write a float raster, one LZW-compressed `f32` page per band.
///
/// # Errors
///
/// [`RasterError::Io`] when the file cannot be created, [`RasterError::Encode`]
/// when encoding fails.
#[instrument(skip(raster), fields(path = %path.as_ref().display(), bands = raster.n_bands()))]
pub fn write_raster(path: impl AsRef<Path>, raster: &Raster) -> Result<(), RasterError> {
    let path = path.as_ref();
    let grid = raster.grid();
    let nodata = grid.nodata.map(|_| "nan".to_string());
    encode(path, |encoder| {
        for b in 0..raster.n_bands() {
            let band: Vec<f32> = raster.band(b).iter().copied().collect();
            let mut image = encoder.new_image_with_compression::<colortype::Gray32Float, _>(
                grid.cols as u32,
                grid.rows as u32,
                Lzw::default(),
            )?;
            write_georeferencing(image.encoder(), grid, nodata.as_deref())?;
            image.write_data(&band)?;
        }
        Ok(())
    })?;
    info!(rows = grid.rows, cols = grid.cols, "raster written");
    Ok(())
}

/// Write a class map as a single LZW-compressed `u8` band with nodata 0.
///
/// # Errors
///
/// [`RasterError::Io`] when the file cannot be created, [`RasterError::Encode`]
/// when encoding fails.
#[instrument(skip(classes), fields(path = %path.as_ref().display()))]
pub fn write_class_raster(path: impl AsRef<Path>, classes: &ClassRaster) -> Result<(), RasterError> {
    let path = path.as_ref();
    let grid = classes.grid();
    let pixels: Vec<u8> = classes.classes().iter().copied().collect();
    encode(path, |encoder| {
        let mut image = encoder.new_image_with_compression::<colortype::Gray8, _>(
            grid.cols as u32,
            grid.rows as u32,
            Lzw::default(),
        )?;
        write_georeferencing(image.encoder(), grid, Some("0"))?;
        image.write_data(&pixels)
    })?;
    info!(rows = grid.rows, cols = grid.cols, "class raster written");
    Ok(())
}

fn encode<F>(path: &Path, body: F) -> Result<(), RasterError>
where
    F: FnOnce(&mut TiffEncoder<File>) -> TiffResult<()>,
{
    let file = File::create(path).map_err(|source| RasterError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let encode_err = |source: TiffError| RasterError::Encode {
        path: path.to_path_buf(),
        source,
    };
    let mut encoder = TiffEncoder::new(file).map_err(encode_err)?;
    body(&mut encoder).map_err(encode_err)
}

fn read_georeferencing<R: Read + Seek>(
    decoder: &mut Decoder<R>,
) -> TiffResult<(GeoTransform, SpatialRef, Option<f64>)> {
    let matrix = decoder
        .find_tag(Tag::ModelTransformationTag)?
        .map(|v| v.into_f64_vec())
        .transpose()?
        .filter(|m| m.len() >= 16);
    let scale = decoder
        .find_tag(Tag::ModelPixelScaleTag)?
        .map(|v| v.into_f64_vec())
        .transpose()?
        .filter(|s| s.len() >= 2);
    let tiepoint = decoder
        .find_tag(Tag::ModelTiepointTag)?
        .map(|v| v.into_f64_vec())
        .transpose()?
        .filter(|t| t.len() >= 6);

    let transform = match (matrix, scale, tiepoint) {
        (Some(m), _, _) => GeoTransform {
            origin_x: m[3],
            pixel_width: m[0],
            row_rotation: m[1],
            origin_y: m[7],
            col_rotation: m[4],
            pixel_height: m[5],
        },
        (None, Some(s), Some(t)) => GeoTransform {
            origin_x: t[3] - t[0] * s[0],
            pixel_width: s[0],
            row_rotation: 0.0,
            origin_y: t[4] + t[1] * s[1],
            col_rotation: 0.0,
            pixel_height: -s[1],
        },
        _ => {
            warn!("no georeferencing tags, using pixel coordinates");
            GeoTransform::default()
        }
    };

    let spatial_ref = SpatialRef {
        geo_keys: decoder
            .find_tag(Tag::GeoKeyDirectoryTag)?
            .map(|v| v.into_u16_vec())
            .transpose()?
            .unwrap_or_default(),
        double_params: decoder
            .find_tag(Tag::GeoDoubleParamsTag)?
            .map(|v| v.into_f64_vec())
            .transpose()?
            .unwrap_or_default(),
        ascii_params: decoder
            .find_tag(Tag::GeoAsciiParamsTag)?
            .map(|v| v.into_string())
            .transpose()?,
    };

    let nodata = decoder
        .find_tag(GDAL_NODATA)?
        .map(|v| v.into_string())
        .transpose()?
        .and_then(|s| s.trim_matches(|c: char| c == '\0' || c.is_whitespace()).parse::<f64>().ok());

    Ok((transform, spatial_ref, nodata))
}

fn write_georeferencing<W: Write + Seek, K: TiffKind>(
    dir: &mut DirectoryEncoder<'_, W, K>,
    grid: &RasterGrid,
    nodata: Option<&str>,
) -> TiffResult<()> {
    let t = &grid.transform;
    if t.is_rotated() {
        let matrix = [
            t.pixel_width, t.row_rotation, 0.0, t.origin_x,
            t.col_rotation, t.pixel_height, 0.0, t.origin_y,
            0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        dir.write_tag(Tag::ModelTransformationTag, &matrix[..])?;
    } else {
        dir.write_tag(Tag::ModelPixelScaleTag, &[t.pixel_width, -t.pixel_height, 0.0][..])?;
        dir.write_tag(Tag::ModelTiepointTag, &[0.0, 0.0, 0.0, t.origin_x, t.origin_y, 0.0][..])?;
    }
    let srs = &grid.spatial_ref;
    if !srs.geo_keys.is_empty() {
        dir.write_tag(Tag::GeoKeyDirectoryTag, &srs.geo_keys[..])?;
    }
    if !srs.double_params.is_empty() {
        dir.write_tag(Tag::GeoDoubleParamsTag, &srs.double_params[..])?;
    }
    if let Some(ascii) = &srs.ascii_params {
        dir.write_tag(Tag::GeoAsciiParamsTag, ascii.as_str())?;
    }
    if let Some(nodata) = nodata {
        dir.write_tag(GDAL_NODATA, nodata)?;
    }
    Ok(())
}

fn to_f32(result: DecodingResult) -> Option<Vec<f32>> {
    let samples = match result {
        DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|x| x as f32).collect(),
        #[allow(unreachable_patterns)]
        _ => return None,
    };
    Some(samples)
}
