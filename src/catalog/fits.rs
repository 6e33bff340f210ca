//! Minimal FITS binary-table reader for photometry catalogs.
//!
//! Only what the region pipeline needs is implemented: walk the HDUs of a
//! FITS file (2880-byte blocks of 80-character header cards), find the
//! first `BINTABLE` extension and pull three named scalar columns out of
//! its fixed-width, big-endian rows.

use std::{
    collections::HashMap,
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use super::{CatalogError, CatalogReader, PhotometryTable, DEC_COLUMN, FLUX_COLUMN, RA_COLUMN};

const BLOCK_LEN: usize = 2880;
const CARD_LEN: usize = 80;

/// Reads the `ra`, `dec` and flux-proxy columns from the first binary
/// table extension of a FITS photometry file.
#[derive(Debug, Default, Clone, Copy)]
pub struct FitsCatalogReader;

impl CatalogReader for FitsCatalogReader {
    fn read_table(&self, path: &Path) -> Result<PhotometryTable, CatalogError> {
        let file = File::open(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        read_photometry(BufReader::new(file), path)
    }
}

type Header = HashMap<String, String>;

/// Walks the HDU sequence until a `BINTABLE` extension turns up, then
/// reads the photometry columns from it.
pub(crate) fn read_photometry<R: Read>(
    mut reader: R,
    path: &Path,
) -> Result<PhotometryTable, CatalogError> {
    loop {
        let header = match read_header(&mut reader, path)? {
            Some(header) => header,
            None => {
                return Err(CatalogError::MissingTable {
                    path: path.to_path_buf(),
                })
            }
        };
        if str_value(&header, "XTENSION").as_deref() == Some("BINTABLE") {
            return read_bintable(&mut reader, &header, path);
        }
        skip_data(&mut reader, &header, path)?;
    }
}

/// Reads one header unit, cards accumulated block by block until `END`.
/// Returns `None` on a clean end-of-file before the first block.
fn read_header<R: Read>(reader: &mut R, path: &Path) -> Result<Option<Header>, CatalogError> {
    let mut header = Header::new();
    let mut block = [0u8; BLOCK_LEN];
    let mut first = true;
    loop {
        if let Err(error) = reader.read_exact(&mut block) {
            if first && error.kind() == std::io::ErrorKind::UnexpectedEof {
                return Ok(None);
            }
            return Err(CatalogError::MalformedHeader {
                path: path.to_path_buf(),
                reason: format!("truncated header unit: {}", error),
            });
        }
        for card in block.chunks_exact(CARD_LEN) {
            let keyword = String::from_utf8_lossy(&card[..8]);
            let keyword = keyword.trim_end();
            if keyword == "END" {
                return Ok(Some(header));
            }
            if &card[8..10] == b"= " {
                let value = String::from_utf8_lossy(&card[10..]);
                header.insert(keyword.to_owned(), value.trim().to_owned());
            }
        }
        first = false;
    }
}

/// Skips the (block-padded) data unit that follows a non-table header.
fn skip_data<R: Read>(reader: &mut R, header: &Header, path: &Path) -> Result<(), CatalogError> {
    let data_len = hdu_data_len(header, path)?;
    let padded = data_len.div_ceil(BLOCK_LEN) * BLOCK_LEN;
    let copied = std::io::copy(&mut reader.take(padded as u64), &mut std::io::sink()).map_err(
        |source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        },
    )?;
    if copied < padded as u64 {
        return Err(CatalogError::MalformedHeader {
            path: path.to_path_buf(),
            reason: "truncated data unit".into(),
        });
    }
    Ok(())
}

/// Data unit byte count per the FITS standard:
/// `|BITPIX|/8 x GCOUNT x (PCOUNT + NAXIS1 x ... x NAXISn)`.
fn hdu_data_len(header: &Header, path: &Path) -> Result<usize, CatalogError> {
    let bitpix = require_int(header, "BITPIX", path)?.unsigned_abs() as usize / 8;
    let naxis = require_int(header, "NAXIS", path)?;
    if naxis == 0 {
        return Ok(0);
    }
    let mut len = 1usize;
    for n in 1..=naxis {
        len *= require_uint(header, &format!("NAXIS{}", n), path)?;
    }
    let pcount = int_value(header, "PCOUNT").unwrap_or(0).max(0) as usize;
    let gcount = int_value(header, "GCOUNT").unwrap_or(1).max(1) as usize;
    Ok(bitpix * gcount * (pcount + len))
}

/// One scalar field within a table row.
struct Column {
    offset: usize,
    ty: char,
}

fn read_bintable<R: Read>(
    reader: &mut R,
    header: &Header,
    path: &Path,
) -> Result<PhotometryTable, CatalogError> {
    let row_len = require_uint(header, "NAXIS1", path)?;
    let n_rows = require_uint(header, "NAXIS2", path)?;
    let tfields = require_uint(header, "TFIELDS", path)?;

    let mut ra_col = None;
    let mut dec_col = None;
    let mut flux_col = None;
    let mut offset = 0usize;
    for n in 1..=tfields {
        let name = str_value(header, &format!("TTYPE{}", n)).unwrap_or_default();
        let tform =
            str_value(header, &format!("TFORM{}", n)).ok_or_else(|| CatalogError::MalformedHeader {
                path: path.to_path_buf(),
                reason: format!("missing TFORM{} keyword", n),
            })?;
        let (repeat, ty) = parse_tform(&tform).ok_or_else(|| CatalogError::MalformedHeader {
            path: path.to_path_buf(),
            reason: format!("invalid column format {:?}", tform),
        })?;
        let len = field_len(repeat, ty).ok_or_else(|| CatalogError::MalformedHeader {
            path: path.to_path_buf(),
            reason: format!("unknown column format {:?}", tform),
        })?;
        for (column, slot) in [
            (RA_COLUMN, &mut ra_col),
            (DEC_COLUMN, &mut dec_col),
            (FLUX_COLUMN, &mut flux_col),
        ] {
            if name.eq_ignore_ascii_case(column) {
                *slot = Some(scalar_column(offset, repeat, ty, row_len, path, column, &tform)?);
            }
        }
        offset += len;
    }
    let [ra_col, dec_col, flux_col] = [
        (RA_COLUMN, ra_col),
        (DEC_COLUMN, dec_col),
        (FLUX_COLUMN, flux_col),
    ]
    .map(|(column, slot)| {
        slot.ok_or_else(|| CatalogError::MissingColumn {
            path: path.to_path_buf(),
            column: column.to_owned(),
        })
    });
    let (ra_col, dec_col, flux_col) = (ra_col?, dec_col?, flux_col?);

    let mut row = vec![0u8; row_len];
    let mut table = PhotometryTable::default();
    for _ in 0..n_rows {
        reader.read_exact(&mut row).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        table.ra.push(decode_field(&row, &ra_col));
        table.dec.push(decode_field(&row, &dec_col));
        table.flux.push(decode_field(&row, &flux_col));
    }
    Ok(table)
}

/// Validates that a wanted column is a scalar numeric field that fits
/// inside the row.
fn scalar_column(
    offset: usize,
    repeat: usize,
    ty: char,
    row_len: usize,
    path: &Path,
    column: &str,
    tform: &str,
) -> Result<Column, CatalogError> {
    let unsupported = || CatalogError::UnsupportedColumn {
        path: path.to_path_buf(),
        column: column.to_owned(),
        tform: tform.to_owned(),
    };
    if repeat != 1 || !matches!(ty, 'I' | 'J' | 'K' | 'E' | 'D') {
        return Err(unsupported());
    }
    let len = field_len(repeat, ty).ok_or_else(unsupported)?;
    if offset + len > row_len {
        return Err(CatalogError::MalformedHeader {
            path: path.to_path_buf(),
            reason: format!("column {:?} extends past the row end", column),
        });
    }
    Ok(Column { offset, ty })
}

/// Splits a `TFORMn` value into its repeat count and type letter.
fn parse_tform(tform: &str) -> Option<(usize, char)> {
    let split = tform.find(|c: char| c.is_ascii_alphabetic())?;
    let repeat = if split == 0 {
        1
    } else {
        tform[..split].parse().ok()?
    };
    let ty = tform[split..].chars().next()?;
    Some((repeat, ty))
}

/// Field byte count for a `TFORMn` repeat count and type letter.
fn field_len(repeat: usize, ty: char) -> Option<usize> {
    let size = match ty {
        'L' | 'A' | 'B' => 1,
        'I' => 2,
        'J' | 'E' => 4,
        'K' | 'D' | 'C' | 'P' => 8,
        'M' | 'Q' => 16,
        // X fields are bit arrays
        'X' => return Some(repeat.div_ceil(8)),
        _ => return None,
    };
    Some(repeat * size)
}

/// Decodes one big-endian scalar field to `f64`.
fn decode_field(row: &[u8], column: &Column) -> f64 {
    let f = &row[column.offset..];
    match column.ty {
        'I' => i16::from_be_bytes([f[0], f[1]]) as f64,
        'J' => i32::from_be_bytes([f[0], f[1], f[2], f[3]]) as f64,
        'K' => i64::from_be_bytes([f[0], f[1], f[2], f[3], f[4], f[5], f[6], f[7]]) as f64,
        'E' => f32::from_be_bytes([f[0], f[1], f[2], f[3]]) as f64,
        'D' => f64::from_be_bytes([f[0], f[1], f[2], f[3], f[4], f[5], f[6], f[7]]),
        _ => f64::NAN,
    }
}

fn int_value(header: &Header, key: &str) -> Option<i64> {
    let raw = header.get(key)?;
    let value = raw.split('/').next().unwrap_or(raw).trim();
    value.parse().ok()
}

fn require_int(header: &Header, key: &str, path: &Path) -> Result<i64, CatalogError> {
    int_value(header, key).ok_or_else(|| CatalogError::MalformedHeader {
        path: path.to_path_buf(),
        reason: format!("missing or invalid {} keyword", key),
    })
}

fn require_uint(header: &Header, key: &str, path: &Path) -> Result<usize, CatalogError> {
    let value = require_int(header, key, path)?;
    usize::try_from(value).map_err(|_| CatalogError::MalformedHeader {
        path: path.to_path_buf(),
        reason: format!("negative {} keyword", key),
    })
}

/// Quoted string value of a card, trailing pad spaces stripped.
fn str_value(header: &Header, key: &str) -> Option<String> {
    let raw = header.get(key)?;
    let start = raw.find('\'')? + 1;
    let end = raw[start..].find('\'')? + start;
    Some(raw[start..end].trim_end().to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn card(keyword: &str, value: &str) -> Vec<u8> {
        format!("{:<8}= {:<70}", keyword, value).into_bytes()
    }

    fn end_card() -> Vec<u8> {
        format!("{:<80}", "END").into_bytes()
    }

    fn pad_block(bytes: &mut Vec<u8>, fill: u8) {
        while bytes.len() % BLOCK_LEN != 0 {
            bytes.push(fill);
        }
    }

    fn primary_hdu() -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend(card("SIMPLE", "T"));
        bytes.extend(card("BITPIX", "8"));
        bytes.extend(card("NAXIS", "0"));
        bytes.extend(end_card());
        pad_block(&mut bytes, b' ');
        bytes
    }

    fn photometry_fits(flux_name: &str, flux_form: &str) -> Vec<u8> {
        let ra = [10f64, 11f64, 12f64, 13f64];
        let dec = [20f64, 21f64, 22f64, 23f64];
        let flux = [50f32, 150f32, 99.9f32, 500f32];

        let mut bytes = primary_hdu();
        bytes.extend(card("XTENSION", "'BINTABLE'"));
        bytes.extend(card("BITPIX", "8"));
        bytes.extend(card("NAXIS", "2"));
        bytes.extend(card("NAXIS1", "20"));
        bytes.extend(card("NAXIS2", "4"));
        bytes.extend(card("PCOUNT", "0"));
        bytes.extend(card("GCOUNT", "1"));
        bytes.extend(card("TFIELDS", "3"));
        bytes.extend(card("TTYPE1", "'ra      '"));
        bytes.extend(card("TFORM1", "'D'"));
        bytes.extend(card("TTYPE2", "'dec     '"));
        bytes.extend(card("TFORM2", "'1D'"));
        bytes.extend(card("TTYPE3", &format!("'{}'", flux_name)));
        bytes.extend(card("TFORM3", &format!("'{}'", flux_form)));
        bytes.extend(end_card());
        pad_block(&mut bytes, b' ');
        for i in 0..4 {
            bytes.extend(ra[i].to_be_bytes());
            bytes.extend(dec[i].to_be_bytes());
            bytes.extend(flux[i].to_be_bytes());
        }
        pad_block(&mut bytes, 0);
        bytes
    }

    #[test]
    fn reads_photometry_columns() {
        let bytes = photometry_fits("core3_flux", "E");
        let table = read_photometry(Cursor::new(bytes), Path::new("synthetic.phot")).unwrap();
        assert_eq!(table.ra, vec![10., 11., 12., 13.]);
        assert_eq!(table.dec, vec![20., 21., 22., 23.]);
        for (got, want) in table.flux.iter().zip([50., 150., 99.9, 500.]) {
            assert!((got - want).abs() < 1e-3, "{} != {}", got, want);
        }
    }

    #[test]
    fn missing_flux_column() {
        let bytes = photometry_fits("flux", "E");
        let error = read_photometry(Cursor::new(bytes), Path::new("synthetic.phot")).unwrap_err();
        match error {
            CatalogError::MissingColumn { column, path } => {
                assert_eq!(column, FLUX_COLUMN);
                assert_eq!(path, Path::new("synthetic.phot"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn vector_flux_column_is_unsupported() {
        let bytes = photometry_fits("core3_flux", "3E");
        let error = read_photometry(Cursor::new(bytes), Path::new("synthetic.phot")).unwrap_err();
        assert!(matches!(error, CatalogError::UnsupportedColumn { .. }));
    }

    #[test]
    fn no_table_extension() {
        let bytes = primary_hdu();
        let error = read_photometry(Cursor::new(bytes), Path::new("synthetic.phot")).unwrap_err();
        assert!(matches!(error, CatalogError::MissingTable { .. }));
    }

    #[test]
    fn reads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proc0001.fits.phot");
        std::fs::write(&path, photometry_fits("core3_flux", "E")).unwrap();
        let table = FitsCatalogReader.read_table(&path).unwrap();
        assert_eq!(table.ra.len(), 4);
    }

    #[test]
    fn missing_file_reports_path() {
        let error = FitsCatalogReader
            .read_table(Path::new("no/such/catalog.phot"))
            .unwrap_err();
        assert!(matches!(error, CatalogError::Io { .. }));
    }
}
