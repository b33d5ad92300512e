//! Headerless comma-separated coordinate files.
//!
//! One point per line, coordinates separated by `,`, no header row and no
//! index column. Values are written in the shortest form that parses back to
//! the same `f64`.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use ndarray::{Array2, ArrayBase, Data, Ix2};

use crate::error::{Error, Result};

/// Writes every row of `points` to `path`, replacing any existing file.
pub fn write_points<S>(path: &Path, points: &ArrayBase<S, Ix2>) -> Result<()>
where
    S: Data<Elem = f64>,
{
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut out = BufWriter::new(file);
    for row in points.rows() {
        let line = row
            .iter()
            .map(|v| format!("{v:?}"))
            .collect::<Vec<_>>()
            .join(",");
        writeln!(out, "{line}").map_err(|e| Error::io(path, e))?;
    }
    out.flush().map_err(|e| Error::io(path, e))
}

/// Reads an `x,y` file back into an (n, 2) array.
///
/// Blank lines are skipped and fields past the second are ignored.
pub fn read_points(path: &Path) -> Result<Array2<f64>> {
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let parse_error = |line: usize, message: String| Error::Parse {
        path: path.to_path_buf(),
        line,
        message,
    };

    let mut values = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split(',');
        for axis in ["x", "y"] {
            let field = fields
                .next()
                .ok_or_else(|| parse_error(line_no, format!("missing {axis} coordinate")))?
                .trim();
            let value = field
                .parse::<f64>()
                .map_err(|e| parse_error(line_no, format!("bad {axis} coordinate {field:?}: {e}")))?;
            values.push(value);
        }
    }

    let rows = values.len() / 2;
    Array2::from_shape_vec((rows, 2), values).map_err(|e| Error::InvalidParameter {
        name: "points",
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use tempfile::TempDir;

    #[test]
    fn writes_headerless_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        write_points(&path, &array![[1.5, 2.0], [3685.901863019417, 0.25]]).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "1.5,2.0\n3685.901863019417,0.25\n");
    }

    #[test]
    fn round_trip_is_exact() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("points.csv");
        let points = crate::coords::generate_coords(200, 7000.0, 42).unwrap();
        write_points(&path, &points).unwrap();
        assert_eq!(read_points(&path).unwrap(), points);
    }

    #[test]
    fn empty_array_writes_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.csv");
        write_points(&path, &Array2::<f64>::zeros((0, 2))).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
        assert_eq!(read_points(&path).unwrap().dim(), (0, 2));
    }

    #[test]
    fn skips_blank_lines_and_extra_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gw.csv");
        fs::write(&path, "1,2\n\n  \n3.5, 4.5,30\r\n").unwrap();
        assert_eq!(read_points(&path).unwrap(), array![[1.0, 2.0], [3.5, 4.5]]);
    }

    #[test]
    fn reports_bad_rows_with_line_numbers() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, "1,2\n3\n").unwrap();
        assert!(matches!(read_points(&path), Err(Error::Parse { line: 2, .. })));

        fs::write(&path, "1,2\n\nx,4\n").unwrap();
        assert!(matches!(read_points(&path), Err(Error::Parse { line: 3, .. })));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nope.csv");
        assert!(matches!(read_points(&path), Err(Error::Io { .. })));
    }
}
