//! TrueType font discovery shared by chart rendering and PDF assembly.
//!
//! A family is usable when one directory holds all four variants. Both the
//! `<family>-Regular.ttf`/`-Italic.ttf` naming and the `<family>.ttf`/`-Oblique.ttf`
//! naming are recognized. Families are tried in configured order.

use crate::config::ReportConfig;
use genpdf::fonts::{FontData, FontFamily};
use plotters::style::FontStyle;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

const REGULAR: [&str; 2] = ["-Regular", ""];
const BOLD: [&str; 1] = ["-Bold"];
const ITALIC: [&str; 2] = ["-Italic", "-Oblique"];
const BOLD_ITALIC: [&str; 2] = ["-BoldItalic", "-BoldOblique"];

static CHART_FONT: OnceLock<bool> = OnceLock::new();

/// Files of one located font family.
#[derive(Debug, Clone, PartialEq)]
pub struct FamilyFiles {
    pub family: String,
    pub regular: PathBuf,
    pub bold: PathBuf,
    pub italic: PathBuf,
    pub bold_italic: PathBuf,
}

impl FamilyFiles {
    /// Read all four variants for embedding into a PDF.
    pub fn load(&self) -> Result<FontFamily<FontData>, genpdf::error::Error> {
        Ok(FontFamily {
            regular: FontData::load(&self.regular, None)?,
            bold: FontData::load(&self.bold, None)?,
            italic: FontData::load(&self.italic, None)?,
            bold_italic: FontData::load(&self.bold_italic, None)?,
        })
    }
}

/// First family in `families`, searched across `dirs`, with every variant present.
pub fn locate_family(dirs: &[PathBuf], families: &[String]) -> Option<FamilyFiles> {
    families.iter().find_map(|family| {
        dirs.iter()
            .find_map(|dir| family_files(dir, family))
    })
}

fn family_files(dir: &Path, family: &str) -> Option<FamilyFiles> {
    Some(FamilyFiles {
        family: family.to_string(),
        regular: variant(dir, family, &REGULAR)?,
        bold: variant(dir, family, &BOLD)?,
        italic: variant(dir, family, &ITALIC)?,
        bold_italic: variant(dir, family, &BOLD_ITALIC)?,
    })
}

fn variant(dir: &Path, family: &str, suffixes: &[&str]) -> Option<PathBuf> {
    suffixes
        .iter()
        .map(|suffix| dir.join(format!("{}{}.ttf", family, suffix)))
        .find(|path| path.is_file())
}

/// Searched directories as one display string, for error messages.
pub fn searched(dirs: &[PathBuf]) -> String {
    dirs.iter()
        .map(|d| d.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Make the first available family usable by chart text as `sans-serif`.
///
/// Registration happens once per process; later calls return the first outcome.
/// Returns `false` when no font could be registered, in which case charts are
/// drawn without text.
pub fn ensure_chart_font(config: &ReportConfig) -> bool {
    *CHART_FONT.get_or_init(|| {
        let Some(files) = locate_family(&config.font_dirs, &config.font_families) else {
            warn!(
                families = %config.font_families.join(", "),
                searched = %searched(&config.font_dirs),
                "No chart font found; charts will be drawn without labels"
            );
            return false;
        };
        let path = &files.regular;
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read chart font");
                return false;
            }
        };
        // plotters keeps registered fonts for the life of the process
        let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
        match plotters::style::register_font("sans-serif", FontStyle::Normal, bytes) {
            Ok(()) => {
                debug!(path = %path.display(), "Registered chart font");
                true
            }
            Err(_) => {
                warn!(path = %path.display(), "Chart font is not a valid TrueType file");
                false
            }
        }
    })
}


#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn touch(dir: &Path, names: &[&str]) {
        for name in names {
            std::fs::write(dir.join(name), b"").unwrap();
        }
    }

    fn families(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_locate_family_needs_all_variants() {
        let partial = tempfile::tempdir().unwrap();
        let full = tempfile::tempdir().unwrap();
        touch(partial.path(), &["Demo-Regular.ttf", "Demo-Bold.ttf"]);
        touch(
            full.path(),
            &["Demo-Regular.ttf", "Demo-Bold.ttf", "Demo-Italic.ttf", "Demo-BoldItalic.ttf"],
        );

        let dirs = vec![partial.path().to_path_buf(), full.path().to_path_buf()];
        let found = locate_family(&dirs, &families(&["Demo"])).unwrap();
        assert_eq!(found.regular, full.path().join("Demo-Regular.ttf"));
        assert_eq!(found.bold_italic, full.path().join("Demo-BoldItalic.ttf"));
        assert_eq!(locate_family(&dirs, &families(&["Other"])), None);
    }

    #[test]
    fn test_locate_family_falls_back_in_order() {
        let dir = tempfile::tempdir().unwrap();
        touch(
            dir.path(),
            &["DejaVuSans.ttf", "DejaVuSans-Bold.ttf", "DejaVuSans-Oblique.ttf", "DejaVuSans-BoldOblique.ttf"],
        );
        let dirs = vec![dir.path().to_path_buf()];
        let found = locate_family(&dirs, &families(&["LiberationSans", "DejaVuSans", "Arial"])).unwrap();
        assert_eq!(found.family, "DejaVuSans");
        assert_eq!(found.regular, dir.path().join("DejaVuSans.ttf"));
        assert_eq!(found.italic, dir.path().join("DejaVuSans-Oblique.ttf"));
    }

    #[test]
    fn test_earlier_family_wins() {
        let dir = tempfile::tempdir().unwrap();
        for family in ["A", "B"] {
            for suffix in ["-Regular", "-Bold", "-Italic", "-BoldItalic"] {
                touch(dir.path(), &[format!("{family}{suffix}.ttf").as_str()]);
            }
        }
        let dirs = vec![dir.path().to_path_buf()];
        assert_eq!(locate_family(&dirs, &families(&["B", "A"])).unwrap().family, "B");
    }

    #[test]
    fn test_fixture_family_loads() {
        let dir = tempfile::tempdir().unwrap();
        let config = testing::fixture_config(dir.path());
        let files = locate_family(&config.font_dirs, &config.font_families).unwrap();
        assert!(files.load().is_ok());
    }

    #[test]
    fn test_searched_joins_dirs() {
        let dirs = vec![PathBuf::from("fonts"), PathBuf::from("/usr/share/fonts")];
        assert_eq!(searched(&dirs), "fonts, /usr/share/fonts");
    }
}
