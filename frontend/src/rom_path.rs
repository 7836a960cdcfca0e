//! Program image resolution: loads a cartridge image from a plain file or
//! from the first `.gb`/`.gbc` entry of a ZIP archive.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Errors that can occur when loading a program image.
#[derive(Debug)]
pub enum ProgramLoadError {
    /// Underlying I/O error (file not found, permission denied, etc.)
    Io(std::io::Error),

    /// The archive could not be read.
    Zip(String),

    /// The archive holds no `.gb`/`.gbc` entry.
    NoProgram(String),
}

impl std::fmt::Display for ProgramLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Zip(e) => write!(f, "invalid ZIP: {e}"),
            Self::NoProgram(path) => write!(f, "no .gb or .gbc file in {path}"),
        }
    }
}

impl std::error::Error for ProgramLoadError {}

impl From<std::io::Error> for ProgramLoadError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<zip::result::ZipError> for ProgramLoadError {
    fn from(e: zip::result::ZipError) -> Self {
        Self::Zip(e.to_string())
    }
}

/// A loaded program image and the name saves are keyed on.
#[derive(Debug)]
pub struct Program {
    /// The path itself, or the chosen entry's name inside an archive.
    pub name: String,
    pub image: Vec<u8>,
}

/// Resolve a program path and read the image bytes.
///
/// A path ending in `.zip` is opened as an archive; anything else is read
/// as a raw image.
pub fn load_program(path: &str) -> Result<Program, ProgramLoadError> {
    if is_zip(Path::new(path)) {
        return load_from_zip(Path::new(path));
    }
    Ok(Program {
        name: path.to_string(),
        image: std::fs::read(path)?,
    })
}

/// The name [`load_program`] would report for `path`, without reading the
/// image.
pub fn program_name(path: &str) -> Result<String, ProgramLoadError> {
    if !is_zip(Path::new(path)) {
        return Ok(path.to_string());
    }
    let mut archive = open_zip(Path::new(path))?;
    let index = first_program(&mut archive, Path::new(path))?;
    Ok(archive.by_index(index)?.name().to_string())
}

fn is_zip(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
}

fn is_program_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".gb") || lower.ends_with(".gbc")
}

fn open_zip(path: &Path) -> Result<zip::ZipArchive<BufReader<File>>, ProgramLoadError> {
    let file = File::open(path)?;
    Ok(zip::ZipArchive::new(BufReader::new(file))?)
}

/// Index of the first `.gb`/`.gbc` file entry.
fn first_program(
    archive: &mut zip::ZipArchive<BufReader<File>>,
    path: &Path,
) -> Result<usize, ProgramLoadError> {
    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        if !entry.is_dir() && is_program_name(entry.name()) {
            return Ok(i);
        }
    }
    Err(ProgramLoadError::NoProgram(path.display().to_string()))
}

/// Extract the first program entry from a ZIP archive.
fn load_from_zip(path: &Path) -> Result<Program, ProgramLoadError> {
    let mut archive = open_zip(path)?;
    let index = first_program(&mut archive, path)?;
    let mut entry = archive.by_index(index)?;
    let mut image = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut image)?;
    Ok(Program {
        name: entry.name().to_string(),
        image,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn create_test_zip(dir: &Path, name: &str, files: &[(&str, &[u8])]) -> std::path::PathBuf {
        let zip_path = dir.join(name);
        let file = File::create(&zip_path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        for (fname, data) in files {
            zip.start_file(*fname, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
        zip_path
    }

    fn scratch(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(name);
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn load_plain_file() {
        let dir = scratch("gbhost_rompath_test_plain");
        let path = dir.join("tetris.gb");
        std::fs::write(&path, [0xAA; 16]).unwrap();

        let program = load_program(path.to_str().unwrap()).unwrap();
        assert_eq!(program.image, [0xAA; 16]);
        assert_eq!(program.name, path.to_str().unwrap());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn load_first_program_from_zip() {
        let dir = scratch("gbhost_rompath_test_zip");
        let zip_path = create_test_zip(
            &dir,
            "bundle.ZIP",
            &[
                ("readme.txt", b"hello"),
                ("game.GBC", &[0xBB; 8]),
                ("other.gb", &[0xCC; 8]),
            ],
        );

        let program = load_program(zip_path.to_str().unwrap()).unwrap();
        assert_eq!(program.image, [0xBB; 8]);
        assert_eq!(program.name, "game.GBC");
        assert_eq!(
            program_name(zip_path.to_str().unwrap()).unwrap(),
            "game.GBC"
        );
        assert_eq!(
            gbhost_core::savestate::base_title(&program.name),
            "game"
        );

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn zip_saves_are_keyed_on_entry_title() {
        let dir = scratch("gbhost_rompath_test_zip_title");
        let zip_path = create_test_zip(&dir, "pack.zip", &[("roms/Tetris.gb", &[0xDD; 4])]);
        let zip_str = zip_path.to_str().unwrap();

        let name = program_name(zip_str).unwrap();
        assert_eq!(name, load_program(zip_str).unwrap().name);

        let saves = dir.join("saves");
        let store = gbhost_core::savestate::SaveStateStore::open(&saves, &name, "sav").unwrap();
        assert_eq!(store.base_title(), "Tetris");
        assert_eq!(store.auto_path(), saves.join("Tetris_auto.sav"));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn zip_without_program_is_rejected() {
        let dir = scratch("gbhost_rompath_test_empty_zip");
        let zip_path = create_test_zip(&dir, "docs.zip", &[("manual.pdf", &[0; 4])]);

        let err = load_program(zip_path.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, ProgramLoadError::NoProgram(_)));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_program("/definitely/not/here.gb").unwrap_err();
        assert!(matches!(err, ProgramLoadError::Io(_)));
    }
}
