//! Replace-on-success file writes.
//!
//! The output is written to a temp file in the destination directory (no cross-device rename),
//! flushed and synced, then renamed over the destination.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::ExportError;

fn parent_dir_or_dot(path: &Path) -> &Path {
    // `Path::parent` is `Some("")` for bare file names like `risultati.csv`.
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Run `write_fn` against a temp file and move the result to `dest`.
///
/// If `write_fn` fails, `dest` is left untouched and the temp file is removed.
pub(crate) fn write_atomically<T>(
    dest: &Path,
    write_fn: impl FnOnce(&mut File) -> Result<T, ExportError>,
) -> Result<T, ExportError> {
    let destination = |source: io::Error| ExportError::Destination {
        path: dest.to_path_buf(),
        source,
    };

    let dir = parent_dir_or_dot(dest);
    fs::create_dir_all(dir).map_err(destination)?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(destination)?;
    let out = write_fn(tmp.as_file_mut())?;

    tmp.as_file_mut().flush().map_err(destination)?;
    tmp.as_file().sync_all().map_err(destination)?;

    let tmp_path = tmp.into_temp_path();
    replace_file(tmp_path.as_ref(), dest).map_err(destination)?;

    // Directory sync is best-effort; the file is already in place.
    let _ = File::open(dir).and_then(|d| d.sync_all());

    Ok(out)
}

/// Write `bytes` to `dest`, replacing any existing file only once the write succeeded.
pub fn export_bytes(dest: &Path, bytes: &[u8]) -> Result<(), ExportError> {
    write_atomically(dest, |file| Ok(file.write_all(bytes)?))
}

fn replace_file(from: &Path, to: &Path) -> io::Result<()> {
    #[cfg(windows)]
    {
        use std::os::windows::ffi::OsStrExt as _;
        use windows_sys::Win32::Storage::FileSystem::{MoveFileExW, MOVEFILE_REPLACE_EXISTING};

        fn to_wide_null(path: &Path) -> Vec<u16> {
            let mut wide: Vec<u16> = path.as_os_str().encode_wide().collect();
            wide.push(0);
            wide
        }

        let from_w = to_wide_null(from);
        let to_w = to_wide_null(to);
        // SAFETY: both buffers are NUL-terminated and outlive the call.
        let ok = unsafe {
            MoveFileExW(
                from_w.as_ptr(),
                to_w.as_ptr(),
                MOVEFILE_REPLACE_EXISTING,
            )
        };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    #[cfg(not(windows))]
    {
        fs::rename(from, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn files_in(dir: &Path) -> Vec<std::path::PathBuf> {
        let mut files: Vec<_> = fs::read_dir(dir)
            .expect("read_dir")
            .map(|e| e.expect("dir entry").path())
            .filter(|p| p.is_file())
            .collect();
        files.sort();
        files
    }

    #[test]
    fn replaces_existing_destination() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let dest = tmp.path().join("out.csv");
        fs::write(&dest, b"old").expect("seed dest");

        write_atomically(&dest, |file| Ok(file.write_all(b"new")?)).expect("write");

        assert_eq!(fs::read(&dest).expect("read dest"), b"new");
        assert_eq!(files_in(tmp.path()), vec![dest]);
    }

    #[test]
    fn failed_writes_leave_destination_untouched() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let dest = tmp.path().join("out.csv");
        fs::write(&dest, b"sentinel").expect("seed dest");

        let err = write_atomically(&dest, |file| {
            file.write_all(b"partial")?;
            Err::<(), _>(ExportError::Io(io::Error::new(
                io::ErrorKind::Other,
                "simulated failure",
            )))
        })
        .unwrap_err();

        assert_eq!(fs::read(&dest).expect("read dest"), b"sentinel", "{err}");
        assert_eq!(files_in(tmp.path()), vec![dest]);
    }

    #[test]
    fn creates_missing_parent_directories() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let dest = tmp.path().join("nested").join("dir").join("out.csv");
        export_bytes(&dest, b"x").expect("write");
        assert_eq!(fs::read(&dest).expect("read dest"), b"x");
    }
}
