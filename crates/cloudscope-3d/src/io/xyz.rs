use std::io::{BufRead, BufWriter, Write};
use std::path::Path;

use super::{LoaderError, PointLoader};
use crate::point::{Point, PointStore};

/// Loads whitespace separated `x y z` triplets from a text file.
#[derive(Debug, Clone, Copy, Default)]
pub struct AsciiXyzLoader;

impl PointLoader for AsciiXyzLoader {
    fn load(&self, path: &Path) -> Result<PointStore, LoaderError> {
        read_xyz_ascii(path)
    }
}

/// Parse `x y z` triplets from a buffered reader.
///
/// Tokens may be split across lines arbitrarily. Reading stops silently at the
/// first token that is not a finite number or not valid UTF-8, and an
/// incomplete trailing triplet is discarded. Only failures of the underlying
/// reader are reported.
///
/// Example:
/// ```
/// use cloudscope_3d::io::parse_xyz;
///
/// let store = parse_xyz("0 0 0\n1.5 2 3\n".as_bytes()).unwrap();
/// assert_eq!(store.len(), 2);
/// assert_eq!(store.position(1), &[1.5, 2.0, 3.0]);
/// ```
pub fn parse_xyz<R: BufRead>(mut reader: R) -> Result<PointStore, LoaderError> {
    let mut points = Vec::new();
    let mut coords = [0.0; 3];
    let mut filled = 0;
    let mut buf = Vec::new();

    'lines: loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        // invalid utf-8 becomes replacement characters, which fail to parse below
        let line = String::from_utf8_lossy(&buf);
        for token in line.split_whitespace() {
            match token.parse::<f64>() {
                Ok(value) if value.is_finite() => {
                    coords[filled] = value;
                    filled += 1;
                }
                _ => {
                    log::warn!(
                        "Stopped reading points at malformed token {token:?} after {} points",
                        points.len()
                    );
                    break 'lines;
                }
            }
            if filled == 3 {
                points.push(Point::new(coords));
                filled = 0;
            }
        }
    }

    if filled != 0 {
        log::warn!("Discarded an incomplete trailing point with {filled} coordinates");
    }

    Ok(PointStore::from_points(points))
}

/// Read an ASCII point file with one `x y z` triplet per point.
///
/// # Arguments
///
/// * `path` - The path to the file.
///
/// # Returns
///
/// The points in file order, or an error if the file cannot be read.
pub fn read_xyz_ascii(path: impl AsRef<Path>) -> Result<PointStore, LoaderError> {
    let file = std::fs::File::open(path.as_ref())?;
    let store = parse_xyz(std::io::BufReader::new(file))?;
    log::debug!("Read {} points from {}", store.len(), path.as_ref().display());
    Ok(store)
}

/// Write the positions of a store as an ASCII point file.
///
/// Points flagged as removed are skipped.
pub fn write_xyz_ascii(path: impl AsRef<Path>, store: &PointStore) -> Result<(), LoaderError> {
    let file = std::fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    for p in store.points().iter().filter(|p| !p.removed) {
        let [x, y, z] = p.position;
        writeln!(writer, "{x} {y} {z}")?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_xyz_tokens_across_lines() -> Result<(), LoaderError> {
        let store = parse_xyz("0 0\n0 1\n2 3 -4.5 5 6\n".as_bytes())?;
        assert_eq!(
            store.positions(),
            vec![[0.0, 0.0, 0.0], [1.0, 2.0, 3.0], [-4.5, 5.0, 6.0]]
        );
        Ok(())
    }

    #[test]
    fn test_parse_xyz_stops_at_malformed() -> Result<(), LoaderError> {
        let store = parse_xyz("1 2 3\n4 5 6\n7 oops 9\n10 11 12\n".as_bytes())?;
        assert_eq!(store.positions(), vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);

        let store = parse_xyz("1 2 3\n4 nan 6\n".as_bytes())?;
        assert_eq!(store.len(), 1);
        Ok(())
    }

    #[test]
    fn test_parse_xyz_stops_at_invalid_utf8() -> Result<(), LoaderError> {
        let store = parse_xyz(&b"1 2 3\n4 5 6\n\xff\xfe\n7 8 9\n"[..])?;
        assert_eq!(store.positions(), vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);

        // a partial triplet before the bad bytes is dropped as well
        let store = parse_xyz(&b"1 2 3 4\xff 5 6\n"[..])?;
        assert_eq!(store.positions(), vec![[1.0, 2.0, 3.0]]);
        Ok(())
    }

    #[test]
    fn test_parse_xyz_drops_incomplete_triplet() -> Result<(), LoaderError> {
        let store = parse_xyz("1 2 3\n4 5\n".as_bytes())?;
        assert_eq!(store.positions(), vec![[1.0, 2.0, 3.0]]);

        let store = parse_xyz("".as_bytes())?;
        assert!(store.is_empty());
        Ok(())
    }

    #[test]
    fn test_read_xyz_ascii() -> Result<(), Box<dyn std::error::Error>> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "0.5 1.5 2.5")?;
        writeln!(file, "-1 -2 -3")?;
        file.flush()?;

        let store = AsciiXyzLoader.load(file.path())?;
        assert_eq!(store.positions(), vec![[0.5, 1.5, 2.5], [-1.0, -2.0, -3.0]]);
        Ok(())
    }

    #[test]
    fn test_read_xyz_ascii_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let res = read_xyz_ascii(dir.path().join("missing.xyz"));
        assert!(matches!(res, Err(LoaderError::Io(_))));
    }

    #[test]
    fn test_write_then_read() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("cloud.xyz");

        let mut store = PointStore::from_positions(&[[0.1, 0.2, 0.3], [1.0, 2.0, 3.0], [4.0; 3]]);
        store.set_removed(1, true);
        write_xyz_ascii(&path, &store)?;

        let read = read_xyz_ascii(&path)?;
        assert_eq!(read.positions(), vec![[0.1, 0.2, 0.3], [4.0; 3]]);
        Ok(())
    }
}
