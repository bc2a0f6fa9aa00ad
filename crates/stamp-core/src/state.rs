//! Application state
//!
//! [`AppState`] owns everything a stamping session needs: the loaded
//! document, its page images, the edit history and the UI mode flags. Every
//! stamp change goes through [`EditHistory::record`], and the active stamp
//! collection is always the history's current snapshot, so the two cannot
//! diverge.

use lopdf::Document;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::StampError;
use crate::export::{export_pdf, ExportOptions, ExportOutput};
use crate::history::EditHistory;
use crate::raster::{PageImage, Rasterizer};
use crate::stamp::{
    CheckmarkVariant, Point, Size, Stamp, StampCollection, StampId, StampKind, StampPatch,
};

/// Default suffix inserted before `.pdf` in export filenames
pub const DEFAULT_OUTPUT_SUFFIX: &str = "_signed";

/// Content given to text stamps created from the context menu
const CONTEXT_MENU_TEXT: &str = "Text";

/// What a click on a page does
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    Select,
    #[default]
    Signature,
    Text,
    Date,
    Checkmark,
}

/// Right-click menu anchored at a page position
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextMenu {
    pub visible: bool,
    /// Page position in raster pixels
    pub x: f64,
    pub y: f64,
    pub page_index: usize,
    /// Where the menu is shown on screen
    pub viewport_x: f64,
    pub viewport_y: f64,
}

/// Signature entry dialog, remembering where the signature goes
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureModal {
    pub visible: bool,
    pub x: f64,
    pub y: f64,
    pub page_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContextMenuAction {
    AddSignature,
    AddText,
    AddDate,
}

/// The PDF being stamped
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDocument {
    pub name: String,
    pub bytes: Vec<u8>,
    pub page_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct AppState {
    document: Option<LoadedDocument>,
    page_images: Vec<PageImage>,
    history: EditHistory,
    selected_stamp_id: Option<StampId>,
    editing_stamp_id: Option<StampId>,
    tool: Tool,
    checkmark_variant: CheckmarkVariant,
    context_menu: ContextMenu,
    signature_modal: SignatureModal,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a document and render its pages, discarding the previous session.
    ///
    /// Nothing changes if the bytes do not parse or rendering fails.
    pub fn load_document(
        &mut self,
        name: impl Into<String>,
        bytes: Vec<u8>,
        rasterizer: &dyn Rasterizer,
    ) -> Result<(), StampError> {
        let name = name.into();
        let doc = Document::load_mem(&bytes).map_err(|e| StampError::ParseError(e.to_string()))?;
        let page_count = doc.get_pages().len();
        let page_images = rasterizer.rasterize(&bytes)?;

        info!(name = %name, page_count, size = bytes.len(), "Document loaded");

        self.reset();
        self.document = Some(LoadedDocument {
            name,
            bytes,
            page_count,
        });
        self.page_images = page_images;
        Ok(())
    }

    /// Replace the page images, e.g. after re-rendering at another scale
    pub fn set_page_images(&mut self, page_images: Vec<PageImage>) {
        self.page_images = page_images;
    }

    pub fn document(&self) -> Option<&LoadedDocument> {
        self.document.as_ref()
    }

    pub fn page_count(&self) -> Option<usize> {
        self.document.as_ref().map(|d| d.page_count)
    }

    pub fn page_images(&self) -> &[PageImage] {
        &self.page_images
    }

    /// The active stamp collection
    pub fn stamps(&self) -> &StampCollection {
        self.history.current()
    }

    pub fn history(&self) -> &EditHistory {
        &self.history
    }

    pub fn selected_stamp_id(&self) -> Option<&StampId> {
        self.selected_stamp_id.as_ref()
    }

    pub fn editing_stamp_id(&self) -> Option<&StampId> {
        self.editing_stamp_id.as_ref()
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn checkmark_variant(&self) -> CheckmarkVariant {
        self.checkmark_variant
    }

    pub fn context_menu(&self) -> &ContextMenu {
        &self.context_menu
    }

    pub fn signature_modal(&self) -> &SignatureModal {
        &self.signature_modal
    }

    fn check_page(&self, page_index: usize) -> Result<(), StampError> {
        match self.page_count() {
            Some(page_count) if page_index >= page_count => Err(StampError::PageOutOfRange {
                page_index,
                page_count,
            }),
            _ => Ok(()),
        }
    }

    // Stamp mutations

    /// Ids must be unique within the active collection
    pub fn add_stamp(&mut self, stamp: Stamp) -> Result<StampId, StampError> {
        self.check_page(stamp.page_index)?;
        if self.stamps().contains(&stamp.id) {
            return Err(StampError::DuplicateStampId(stamp.id));
        }
        let id = stamp.id.clone();
        debug!(stamp_id = %id, kind = ?stamp.kind, page_index = stamp.page_index, "Stamp added");
        let next = self.stamps().with_added(stamp);
        self.history.record(next);
        Ok(id)
    }

    pub fn update_stamp(&mut self, id: &StampId, patch: &StampPatch) -> Result<(), StampError> {
        let next = self
            .stamps()
            .with_updated(id, patch)
            .ok_or_else(|| StampError::StampNotFound(id.clone()))?;
        self.history.record(next);
        Ok(())
    }

    pub fn move_stamp(&mut self, id: &StampId, position: Point) -> Result<(), StampError> {
        self.update_stamp(id, &StampPatch::position(position.x, position.y))
    }

    /// Resize to at least the interactive minimum size
    pub fn resize_stamp(&mut self, id: &StampId, size: Size) -> Result<(), StampError> {
        self.update_stamp(id, &StampPatch::size(size.clamped_for_resize()))
    }

    pub fn edit_content(
        &mut self,
        id: &StampId,
        content: impl Into<String>,
    ) -> Result<(), StampError> {
        self.update_stamp(id, &StampPatch::content(content))
    }

    pub fn set_font_family(
        &mut self,
        id: &StampId,
        font_family: impl Into<String>,
    ) -> Result<(), StampError> {
        self.update_stamp(id, &StampPatch::font_family(font_family))
    }

    /// Remove a stamp, dropping it from the selection and editing state
    pub fn remove_stamp(&mut self, id: &StampId) -> Result<(), StampError> {
        let next = self
            .stamps()
            .without(id)
            .ok_or_else(|| StampError::StampNotFound(id.clone()))?;
        self.history.record(next);

        if self.selected_stamp_id.as_ref() == Some(id) {
            self.selected_stamp_id = None;
        }
        if self.editing_stamp_id.as_ref() == Some(id) {
            self.editing_stamp_id = None;
        }
        debug!(stamp_id = %id, "Stamp removed");
        Ok(())
    }

    // History

    /// Step back one snapshot, clearing the selection. A no-op at the
    /// first snapshot.
    pub fn undo(&mut self) -> bool {
        let moved = self.history.undo();
        if moved {
            self.after_history_move();
        }
        moved
    }

    /// Step forward one snapshot, clearing the selection. A no-op at the
    /// last snapshot.
    pub fn redo(&mut self) -> bool {
        let moved = self.history.redo();
        if moved {
            self.after_history_move();
        }
        moved
    }

    fn after_history_move(&mut self) {
        self.selected_stamp_id = None;
        let editing_gone = self
            .editing_stamp_id
            .as_ref()
            .is_some_and(|id| !self.stamps().contains(id));
        if editing_gone {
            self.editing_stamp_id = None;
        }
    }

    // Selection and editing

    pub fn select(&mut self, id: Option<StampId>) -> Result<(), StampError> {
        if let Some(id) = &id {
            if !self.stamps().contains(id) {
                return Err(StampError::StampNotFound(id.clone()));
            }
        }
        self.selected_stamp_id = id;
        Ok(())
    }

    pub fn begin_editing(&mut self, id: &StampId) -> Result<(), StampError> {
        if !self.stamps().contains(id) {
            return Err(StampError::StampNotFound(id.clone()));
        }
        self.editing_stamp_id = Some(id.clone());
        Ok(())
    }

    pub fn end_editing(&mut self) {
        self.editing_stamp_id = None;
    }

    // Tools

    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
    }

    pub fn set_checkmark_variant(&mut self, variant: CheckmarkVariant) {
        self.checkmark_variant = variant;
    }

    /// Apply the current tool at a page position.
    ///
    /// Returns the id of the stamp created, if any.
    pub fn click(&mut self, at: Point, page_index: usize) -> Result<Option<StampId>, StampError> {
        self.check_page(page_index)?;

        match self.tool {
            Tool::Select => {
                self.selected_stamp_id = None;
                Ok(None)
            }
            Tool::Signature => {
                self.show_signature_modal(at, page_index);
                Ok(None)
            }
            Tool::Text => {
                let id = self.add_stamp(Stamp::centered_at(StampKind::Text, at, page_index, ""))?;
                self.selected_stamp_id = Some(id.clone());
                self.editing_stamp_id = Some(id.clone());
                Ok(Some(id))
            }
            Tool::Date => {
                let stamp = Stamp::centered_at(StampKind::Date, at, page_index, today());
                self.add_stamp(stamp).map(Some)
            }
            Tool::Checkmark => {
                let glyph = self.checkmark_variant.glyph();
                let stamp = Stamp::centered_at(StampKind::Checkmark, at, page_index, glyph);
                self.add_stamp(stamp).map(Some)
            }
        }
    }

    // Popovers

    pub fn show_context_menu(&mut self, at: Point, page_index: usize, viewport: Point) {
        self.context_menu = ContextMenu {
            visible: true,
            x: at.x,
            y: at.y,
            page_index,
            viewport_x: viewport.x,
            viewport_y: viewport.y,
        };
    }

    pub fn hide_context_menu(&mut self) {
        self.context_menu = ContextMenu::default();
    }

    /// Run a context menu entry at the menu's page position and close the menu.
    ///
    /// Does nothing while the menu is hidden.
    pub fn context_menu_action(
        &mut self,
        action: ContextMenuAction,
    ) -> Result<Option<StampId>, StampError> {
        let menu = self.context_menu;
        if !menu.visible {
            return Ok(None);
        }
        let at = Point::new(menu.x, menu.y);

        let created = match action {
            ContextMenuAction::AddSignature => {
                self.check_page(menu.page_index)?;
                self.show_signature_modal(at, menu.page_index);
                None
            }
            ContextMenuAction::AddText => Some(self.add_stamp(Stamp::centered_at(
                StampKind::Text,
                at,
                menu.page_index,
                CONTEXT_MENU_TEXT,
            ))?),
            ContextMenuAction::AddDate => Some(self.add_stamp(Stamp::centered_at(
                StampKind::Date,
                at,
                menu.page_index,
                today(),
            ))?),
        };

        self.hide_context_menu();
        Ok(created)
    }

    pub fn show_signature_modal(&mut self, at: Point, page_index: usize) {
        self.signature_modal = SignatureModal {
            visible: true,
            x: at.x,
            y: at.y,
            page_index,
        };
    }

    pub fn hide_signature_modal(&mut self) {
        self.signature_modal = SignatureModal::default();
    }

    /// Place a captured signature where the modal was opened and close it.
    ///
    /// Does nothing while the modal is hidden. An empty payload is ignored
    /// and leaves the modal open.
    pub fn commit_signature(
        &mut self,
        data_uri: impl Into<String>,
    ) -> Result<Option<StampId>, StampError> {
        let modal = self.signature_modal;
        if !modal.visible {
            return Ok(None);
        }
        let data_uri = data_uri.into();
        if data_uri.trim().is_empty() {
            return Ok(None);
        }

        let stamp = Stamp::centered_at(
            StampKind::Signature,
            Point::new(modal.x, modal.y),
            modal.page_index,
            data_uri,
        );
        let id = self.add_stamp(stamp)?;
        self.hide_signature_modal();
        Ok(Some(id))
    }

    // Session

    /// Tear everything down to the initial empty state. Not undoable.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn has_unsaved_changes(&self) -> bool {
        !self.stamps().is_empty()
    }

    /// Filename for the exported document, if one is loaded
    pub fn output_filename(&self, suffix: &str) -> Option<String> {
        self.document
            .as_ref()
            .map(|doc| output_filename(&doc.name, suffix))
    }

    /// Export the active collection onto the loaded document
    pub fn export(&self, options: &ExportOptions) -> Result<ExportOutput, StampError> {
        let document = self.document.as_ref().ok_or(StampError::NoDocument)?;
        export_pdf(&document.bytes, self.stamps(), &self.page_images, options)
    }
}

/// `contract.pdf` becomes `contract<suffix>.pdf`; names without a `.pdf`
/// extension get `<suffix>.pdf` appended.
pub fn output_filename(input: &str, suffix: &str) -> String {
    const EXTENSION: &str = ".pdf";
    let split = input.len().checked_sub(EXTENSION.len());
    match split {
        Some(at) if input.is_char_boundary(at) && input[at..].eq_ignore_ascii_case(EXTENSION) => {
            format!("{}{}{}", &input[..at], suffix, EXTENSION)
        }
        _ => format!("{}{}{}", input, suffix, EXTENSION),
    }
}

/// Today's date as MM/DD/YYYY
fn today() -> String {
    chrono::Local::now().format("%m/%d/%Y").to_string()
}
