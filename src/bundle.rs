//! Bundles group animations with the sheets they are exported to.

use crate::atlas::{SheetExportSettings, TextureAtlas};
use crate::models::{Animation, AnimationId, FrameId};
use thiserror::Error;

/// Data-integrity errors found while resolving bundle contents.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BundleError {
    /// A sheet references an animation that is not in the bundle
    #[error("sheet '{sheet}' references missing {animation}")]
    MissingAnimation { sheet: String, animation: AnimationId },
    /// Two animations were added with the same id
    #[error("duplicate {0}")]
    DuplicateAnimation(AnimationId),
}

/// A named group of animations packed into one sprite sheet.
#[derive(Debug, Clone)]
pub struct AnimationSheet {
    pub id: i32,
    pub name: String,
    pub animation_ids: Vec<AnimationId>,
    pub settings: SheetExportSettings,
}

impl AnimationSheet {
    pub fn new(id: i32, name: impl Into<String>) -> Self {
        Self { id, name: name.into(), animation_ids: vec![], settings: SheetExportSettings::default() }
    }

    pub fn with_settings(mut self, settings: SheetExportSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Add an animation reference; duplicates are ignored.
    pub fn add_animation(&mut self, id: AnimationId) {
        if !self.animation_ids.contains(&id) {
            self.animation_ids.push(id);
        }
    }
}

/// All animations of a project plus the sheets that export them.
#[derive(Debug, Clone, Default)]
pub struct Bundle {
    pub name: String,
    animations: Vec<Animation>,
    sheets: Vec<AnimationSheet>,
    next_frame_id: i32,
    next_animation_id: i32,
}

impl Bundle {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    /// Hand out a fresh frame id.
    pub fn next_frame_id(&mut self) -> FrameId {
        let id = FrameId(self.next_frame_id);
        self.next_frame_id += 1;
        id
    }

    /// Hand out a fresh animation id.
    pub fn next_animation_id(&mut self) -> AnimationId {
        let id = AnimationId(self.next_animation_id);
        self.next_animation_id += 1;
        id
    }

    /// Add an animation. Ids handed out later never collide with its ids.
    pub fn add_animation(&mut self, animation: Animation) -> Result<(), BundleError> {
        if self.animation(animation.id).is_some() {
            return Err(BundleError::DuplicateAnimation(animation.id));
        }

        self.next_animation_id = self.next_animation_id.max(animation.id.0 + 1);
        if let Some(max_frame) = animation.frames().iter().map(|f| f.id().0).max() {
            self.next_frame_id = self.next_frame_id.max(max_frame + 1);
        }
        self.animations.push(animation);
        Ok(())
    }

    pub fn add_sheet(&mut self, sheet: AnimationSheet) {
        self.sheets.push(sheet);
    }

    pub fn animations(&self) -> &[Animation] {
        &self.animations
    }

    pub fn sheets(&self) -> &[AnimationSheet] {
        &self.sheets
    }

    pub fn animation(&self, id: AnimationId) -> Option<&Animation> {
        self.animations.iter().find(|a| a.id == id)
    }

    pub fn animation_by_name(&self, name: &str) -> Option<&Animation> {
        self.animations.iter().find(|a| a.name == name)
    }

    /// Resolve every animation a sheet references, in sheet order.
    pub fn sheet_animations(&self, sheet: &AnimationSheet) -> Result<Vec<&Animation>, BundleError> {
        sheet
            .animation_ids
            .iter()
            .map(|&id| {
                self.animation(id).ok_or_else(|| BundleError::MissingAnimation {
                    sheet: sheet.name.clone(),
                    animation: id,
                })
            })
            .collect()
    }

    /// Build an atlas holding every frame of a sheet's animations.
    pub fn atlas_for_sheet(&self, sheet: &AnimationSheet) -> Result<TextureAtlas<'_>, BundleError> {
        let mut atlas = TextureAtlas::new(sheet.name.clone(), sheet.settings.clone());
        for animation in self.sheet_animations(sheet)? {
            atlas.insert_frames_from_animation(animation);
        }
        Ok(atlas)
    }
}
