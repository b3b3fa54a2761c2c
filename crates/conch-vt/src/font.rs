//! Monospace font loading for the rendering surface.
//!
//! The glyph asset is loaded once per process and shared by every session.
//! Loading never fails: a missing or unreadable font file falls back to a
//! system monospace face, and when none can be found the surface uses
//! built-in approximate cell metrics.

use std::path::PathBuf;
use std::sync::Arc;

use fontdb::{Database, Family, Query};
use swash::FontRef;
use tokio::sync::OnceCell;

use crate::fit::CellMetrics;

/// Which font to load and at what size.
#[derive(Clone, Debug)]
pub struct FontSpec {
    /// Preferred family name, also used for the system lookup.
    pub family: String,
    /// Font file bundled with the application.
    pub path: Option<PathBuf>,
    /// Font size in pixels.
    pub size_px: f32,
    /// Line height multiplier (1.0 = the font's natural line height).
    pub line_height: f32,
    /// Whether to query installed system fonts when the file is unusable.
    pub use_system_fonts: bool,
}

impl Default for FontSpec {
    fn default() -> Self {
        Self {
            family: "FiraCodeNerdFont".to_string(),
            path: None,
            size_px: 14.0,
            line_height: 1.0,
            use_system_fonts: true,
        }
    }
}

/// Where the loaded metrics came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FontSource {
    File(PathBuf),
    System(String),
    Builtin,
}

/// A resolved font: family name plus the cell size it produces.
#[derive(Clone, Debug)]
pub struct LoadedFont {
    pub family: String,
    pub source: FontSource,
    pub size_px: f32,
    pub cell: CellMetrics,
}

impl LoadedFont {
    /// Approximate metrics for a generic monospace face.
    pub fn builtin(spec: &FontSpec) -> Self {
        let size = spec.size_px.max(1.0);
        Self {
            family: "monospace".to_string(),
            source: FontSource::Builtin,
            size_px: size,
            cell: CellMetrics {
                width: (size * 0.6).max(1.0),
                height: (size * 1.2 * spec.line_height).max(1.0),
            },
        }
    }
}

/// Measure the cell size of the face at `index` in `data`.
///
/// Returns `None` if the data is not a parsable font.
pub fn measure(data: &[u8], index: usize, size_px: f32, line_height: f32) -> Option<CellMetrics> {
    let font = FontRef::from_index(data, index)?;

    let metrics = font.metrics(&[]);
    if metrics.units_per_em == 0 {
        return None;
    }
    let scale = size_px / metrics.units_per_em as f32;

    let natural_line_height = (metrics.ascent + metrics.descent + metrics.leading) * scale;

    // 'm' is the usual monospace reference glyph.
    let glyph_id = font.charmap().map('m');
    let advance = font.glyph_metrics(&[]).advance_width(glyph_id) * scale;

    Some(CellMetrics {
        width: advance.max(1.0),
        height: (natural_line_height * line_height).max(1.0),
    })
}

/// Resolve the font described by `spec`, falling back as needed.
pub async fn load_font(spec: &FontSpec) -> LoadedFont {
    if let Some(path) = &spec.path {
        match tokio::fs::read(path).await {
            Ok(data) => match measure(&data, 0, spec.size_px, spec.line_height) {
                Some(cell) => {
                    log::info!("Loaded font {} from {}", spec.family, path.display());
                    return LoadedFont {
                        family: spec.family.clone(),
                        source: FontSource::File(path.clone()),
                        size_px: spec.size_px,
                        cell,
                    };
                }
                None => log::warn!("Font fallback: {} is not a usable font", path.display()),
            },
            Err(e) => log::warn!("Font fallback: failed to read {}: {e}", path.display()),
        }
    }

    if spec.use_system_fonts {
        let lookup = spec.clone();
        match tokio::task::spawn_blocking(move || load_system_monospace(&lookup)).await {
            Ok(Some(font)) => return font,
            Ok(None) => log::warn!("No system monospace font found, using built-in metrics"),
            Err(e) => log::warn!("System font lookup failed: {e}"),
        }
    }

    LoadedFont::builtin(spec)
}

/// Find the preferred family, or any monospace face, among the system fonts.
fn load_system_monospace(spec: &FontSpec) -> Option<LoadedFont> {
    let mut db = Database::new();
    db.load_system_fonts();

    let by_family = |family: Family<'_>| {
        db.query(&Query {
            families: &[family],
            weight: fontdb::Weight::NORMAL,
            style: fontdb::Style::Normal,
            ..Query::default()
        })
    };

    let id = by_family(Family::Name(&spec.family))
        .or_else(|| by_family(Family::Monospace))
        .or_else(|| db.faces().find(|face| face.monospaced).map(|face| face.id))?;

    let family = db
        .face(id)
        .and_then(|face| face.families.first().map(|(name, _)| name.clone()))
        .unwrap_or_else(|| "monospace".to_string());

    let cell = db.with_face_data(id, |data, index| {
        measure(data, index as usize, spec.size_px, spec.line_height)
    })??;

    log::info!("Using system font {family}");
    Some(LoadedFont {
        family: family.clone(),
        source: FontSource::System(family),
        size_px: spec.size_px,
        cell,
    })
}

/// Process-wide font cache: the first caller loads, everyone else shares.
pub struct FontCache {
    spec: FontSpec,
    font: OnceCell<Arc<LoadedFont>>,
}

impl FontCache {
    pub fn new(spec: FontSpec) -> Self {
        Self {
            spec,
            font: OnceCell::new(),
        }
    }

    /// Get the loaded font, loading it on first use.
    pub async fn get(&self) -> Arc<LoadedFont> {
        self.font
            .get_or_init(|| async { Arc::new(load_font(&self.spec).await) })
            .await
            .clone()
    }

    /// The font if it has already been loaded.
    pub fn loaded(&self) -> Option<Arc<LoadedFont>> {
        self.font.get().cloned()
    }
}
