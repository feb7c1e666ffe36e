//! Weather icon loading and the per-face icon cache.

use std::collections::HashMap;

use sunlink_weather::IconKind;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IconError {
    #[error("Icon resource not found: {0}")]
    NotFound(String),

    #[error("Failed to decode icon {name}: {reason}")]
    Decode { name: String, reason: String },
}

/// A decoded bitmap. Only the dimensions matter to layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IconBitmap {
    pub width: u32,
    pub height: u32,
}

/// An icon scaled for drawing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaledIcon {
    pub kind: IconKind,
    pub width: f32,
    pub height: f32,
}

/// Decodes icon resources by name.
pub trait IconLoader: Send {
    fn load(&self, resource: &str) -> Result<IconBitmap, IconError>;
}

/// Icons bundled with the face, all 48px tall.
#[derive(Debug, Default, Clone, Copy)]
pub struct BundledIcons;

impl IconLoader for BundledIcons {
    fn load(&self, resource: &str) -> Result<IconBitmap, IconError> {
        let (width, height) = match resource {
            "ic_storm" | "ic_light_rain" | "ic_rain" | "ic_snow" => (48, 48),
            "ic_clear" => (48, 48),
            "ic_fog" => (64, 48),
            "ic_light_clouds" | "ic_cloudy" => (60, 48),
            other => return Err(IconError::NotFound(other.to_string())),
        };
        Ok(IconBitmap { width, height })
    }
}

/// Memoizes scaled icons for the lifetime of a face.
///
/// Every icon is scaled to `target_height` keeping its aspect ratio. Failed
/// loads are not cached, so the next frame tries again.
pub struct IconCache {
    loader: Box<dyn IconLoader>,
    target_height: f32,
    entries: HashMap<IconKind, ScaledIcon>,
}

impl IconCache {
    pub fn new(loader: Box<dyn IconLoader>, target_height: f32) -> Self {
        Self {
            loader,
            target_height,
            entries: HashMap::new(),
        }
    }

    pub fn target_height(&self) -> f32 {
        self.target_height
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Scaled icon for `kind`, or `None` when nothing should be drawn.
    pub fn get(&mut self, kind: IconKind) -> Option<ScaledIcon> {
        if let Some(icon) = self.entries.get(&kind) {
            return Some(*icon);
        }

        let resource = kind.resource_name()?;
        let bitmap = match self.loader.load(resource) {
            Ok(bitmap) => bitmap,
            Err(e) => {
                tracing::warn!("Skipping icon: {}", e);
                return None;
            }
        };
        if bitmap.height == 0 {
            tracing::warn!("Skipping icon {}: zero height", resource);
            return None;
        }

        let scale = self.target_height / bitmap.height as f32;
        let icon = ScaledIcon {
            kind,
            width: (bitmap.width as f32 * scale).round(),
            height: self.target_height,
        };
        tracing::debug!("Cached icon {} at {}x{}", resource, icon.width, icon.height);
        self.entries.insert(kind, icon);
        Some(icon)
    }
}
