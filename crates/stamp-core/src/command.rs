//! Commands a UI sends into [`AppState`]
//!
//! Pointer and keyboard handling stays outside the core. Each user action
//! arrives as one [`StampCommand`], which also makes sessions scriptable
//! (see `stamp-cli replay`).

use serde::{Deserialize, Serialize};

use crate::error::StampError;
use crate::stamp::{CheckmarkVariant, Point, Size, Stamp, StampId, StampKind, StampPatch};
use crate::state::{AppState, ContextMenuAction, Tool};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StampCommand {
    /// Place a stamp with explicit geometry
    #[serde(rename_all = "camelCase")]
    CreateStamp {
        kind: StampKind,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        content: String,
        page_index: usize,
        #[serde(default)]
        font_family: Option<String>,
    },
    MoveStamp {
        id: StampId,
        x: f64,
        y: f64,
    },
    /// Subject to the interactive minimum size
    ResizeStamp {
        id: StampId,
        width: f64,
        height: f64,
    },
    EditContent {
        id: StampId,
        content: String,
    },
    #[serde(rename_all = "camelCase")]
    SetFontFamily {
        id: StampId,
        font_family: String,
    },
    DeleteStamp {
        id: StampId,
    },
    Undo,
    Redo,
    /// Apply the current tool at a page position
    #[serde(rename_all = "camelCase")]
    Click {
        x: f64,
        y: f64,
        page_index: usize,
    },
    #[serde(rename_all = "camelCase")]
    CommitSignature {
        data_uri: String,
    },
    SelectStamp {
        #[serde(default)]
        id: Option<StampId>,
    },
    BeginEditing {
        id: StampId,
    },
    EndEditing,
    SetTool {
        tool: Tool,
    },
    SetCheckmarkVariant {
        variant: CheckmarkVariant,
    },
    #[serde(rename_all = "camelCase")]
    ShowContextMenu {
        x: f64,
        y: f64,
        page_index: usize,
        viewport_x: f64,
        viewport_y: f64,
    },
    HideContextMenu,
    ContextMenuAction {
        action: ContextMenuAction,
    },
    #[serde(rename_all = "camelCase")]
    ShowSignatureModal {
        x: f64,
        y: f64,
        page_index: usize,
    },
    HideSignatureModal,
    Reset,
}

impl StampCommand {
    /// Parse a JSON array of commands
    pub fn list_from_json(json: &str) -> Result<Vec<Self>, StampError> {
        serde_json::from_str(json).map_err(|e| StampError::SerializationError(e.to_string()))
    }
}

impl AppState {
    /// Execute one command, returning the id of any stamp it created
    pub fn dispatch(&mut self, command: StampCommand) -> Result<Option<StampId>, StampError> {
        match command {
            StampCommand::CreateStamp {
                kind,
                x,
                y,
                width,
                height,
                content,
                page_index,
                font_family,
            } => {
                let mut stamp = Stamp::create(
                    kind,
                    Point::new(x, y),
                    page_index,
                    content,
                    Size::new(width, height),
                );
                stamp.font_family = font_family;
                self.add_stamp(stamp).map(Some)
            }
            StampCommand::MoveStamp { id, x, y } => {
                self.move_stamp(&id, Point::new(x, y)).map(|_| None)
            }
            StampCommand::ResizeStamp { id, width, height } => self
                .resize_stamp(&id, Size::new(width, height))
                .map(|_| None),
            StampCommand::EditContent { id, content } => {
                self.update_stamp(&id, &StampPatch::content(content)).map(|_| None)
            }
            StampCommand::SetFontFamily { id, font_family } => {
                self.set_font_family(&id, font_family).map(|_| None)
            }
            StampCommand::DeleteStamp { id } => self.remove_stamp(&id).map(|_| None),
            StampCommand::Undo => {
                self.undo();
                Ok(None)
            }
            StampCommand::Redo => {
                self.redo();
                Ok(None)
            }
            StampCommand::Click { x, y, page_index } => self.click(Point::new(x, y), page_index),
            StampCommand::CommitSignature { data_uri } => self.commit_signature(data_uri),
            StampCommand::SelectStamp { id } => self.select(id).map(|_| None),
            StampCommand::BeginEditing { id } => self.begin_editing(&id).map(|_| None),
            StampCommand::EndEditing => {
                self.end_editing();
                Ok(None)
            }
            StampCommand::SetTool { tool } => {
                self.set_tool(tool);
                Ok(None)
            }
            StampCommand::SetCheckmarkVariant { variant } => {
                self.set_checkmark_variant(variant);
                Ok(None)
            }
            StampCommand::ShowContextMenu {
                x,
                y,
                page_index,
                viewport_x,
                viewport_y,
            } => {
                self.show_context_menu(
                    Point::new(x, y),
                    page_index,
                    Point::new(viewport_x, viewport_y),
                );
                Ok(None)
            }
            StampCommand::HideContextMenu => {
                self.hide_context_menu();
                Ok(None)
            }
            StampCommand::ContextMenuAction { action } => self.context_menu_action(action),
            StampCommand::ShowSignatureModal { x, y, page_index } => {
                self.show_signature_modal(Point::new(x, y), page_index);
                Ok(None)
            }
            StampCommand::HideSignatureModal => {
                self.hide_signature_modal();
                Ok(None)
            }
            StampCommand::Reset => {
                self.reset();
                Ok(None)
            }
        }
    }
}
