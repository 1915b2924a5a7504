use std::path::{Path, PathBuf};

use genpdf::fonts::{FontData, FontFamily};

use crate::ReportError;

/// Font family used by every document.
pub const FONT_FAMILY: &str = "LiberationSans";

/// Directory holding `LiberationSans-{Regular,Bold,Italic,BoldItalic}.ttf`.
#[derive(Debug, Clone)]
pub struct FontSource {
    dir: PathBuf,
}

impl FontSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn load(&self) -> Result<FontFamily<FontData>, ReportError> {
        if !self.dir.is_dir() {
            return Err(ReportError::Fonts(format!(
                "font directory {} does not exist",
                self.dir.display()
            )));
        }

        genpdf::fonts::from_files(&self.dir, FONT_FAMILY, None).map_err(|e| {
            tracing::warn!(dir = %self.dir.display(), error = %e, "failed to load fonts");
            ReportError::Fonts(e.to_string())
        })
    }
}

/// Font directory checked in for rendering tests.
#[cfg(test)]
pub(crate) fn fixture() -> FontSource {
    FontSource::new(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/fonts"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_family_loads() {
        assert!(fixture().load().is_ok());
    }

    #[test]
    fn missing_directory_is_a_font_error() {
        let fonts = FontSource::new("/definitely/not/a/font/dir");
        assert!(matches!(fonts.load(), Err(ReportError::Fonts(_))));
    }
}
