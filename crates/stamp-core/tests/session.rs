//! Full sessions: load, edit through commands, export

mod common;

use common::{create_test_pdf, page_operators, signature_data_uri};
use pretty_assertions::assert_eq;
use stamp_core::stamp::Point;
use stamp_core::{
    AppState, ExportOptions, ScaledPageRasterizer, StampCommand, StampError, StampKind, Tool,
};

fn loaded_state(num_pages: usize) -> AppState {
    let mut state = AppState::new();
    state
        .load_document(
            "lease.pdf",
            create_test_pdf(num_pages),
            &ScaledPageRasterizer::default(),
        )
        .unwrap();
    state
}

#[test]
fn test_replayed_session_exports_every_stamp() {
    let mut state = loaded_state(2);
    let script = format!(
        r#"[
            {{"type":"Click","x":300,"y":900,"pageIndex":1}},
            {{"type":"CommitSignature","dataUri":"{}"}},
            {{"type":"SetTool","tool":"date"}},
            {{"type":"Click","x":300,"y":960,"pageIndex":1}},
            {{"type":"SetTool","tool":"checkmark"}},
            {{"type":"Click","x":40,"y":40,"pageIndex":0}},
            {{"type":"ShowContextMenu","x":200,"y":200,"pageIndex":0,"viewportX":10,"viewportY":10}},
            {{"type":"ContextMenuAction","action":"addText"}}
        ]"#,
        signature_data_uri(8, 4)
    );

    for command in StampCommand::list_from_json(&script).unwrap() {
        state.dispatch(command).unwrap();
    }

    let kinds: Vec<_> = state.stamps().iter().map(|s| s.kind).collect();
    assert_eq!(
        kinds,
        vec![
            StampKind::Signature,
            StampKind::Date,
            StampKind::Checkmark,
            StampKind::Text
        ]
    );
    assert!(state.has_unsaved_changes());

    let output = state.export(&ExportOptions::default()).unwrap();
    assert_eq!(output.metrics.stamps_drawn, 4);
    assert_eq!(output.metrics.stamps_skipped, 0);

    let first = page_operators(&output.bytes, 1);
    assert_eq!(first.iter().filter(|op| *op == "S").count(), 2);
    assert!(first.contains(&"Tj".to_string()));

    let second = page_operators(&output.bytes, 2);
    assert!(second.contains(&"Do".to_string()));
    assert_eq!(
        state.output_filename("_signed"),
        Some("lease_signed.pdf".to_string())
    );
}

#[test]
fn test_undo_all_then_export_matches_original() {
    let mut state = loaded_state(1);
    state.set_tool(Tool::Text);
    let id = state.click(Point::new(100.0, 100.0), 0).unwrap().unwrap();
    state.edit_content(&id, "Signed by J. Doe").unwrap();

    while state.undo() {}
    assert!(state.stamps().is_empty());
    assert!(!state.has_unsaved_changes());

    let output = state.export(&ExportOptions::default()).unwrap();
    assert_eq!(output.bytes, state.document().unwrap().bytes);
}

#[test]
fn test_failed_export_keeps_session() {
    let mut state = loaded_state(1);
    state.show_signature_modal(Point::new(100.0, 100.0), 0);
    state
        .commit_signature("data:image/png;base64,AAAA")
        .unwrap();

    let result = state.export(&ExportOptions::default());
    assert!(matches!(result, Err(StampError::ImageDecode(_))));
    // The stamp is still there to fix or delete
    assert_eq!(state.stamps().len(), 1);
}

#[test]
fn test_reset_then_reload() {
    let mut state = loaded_state(1);
    state.set_tool(Tool::Checkmark);
    state.click(Point::new(10.0, 10.0), 0).unwrap();

    state.reset();
    assert_eq!(state.stamps().len(), 0);
    assert_eq!(state.history().len(), 1);
    assert_eq!(state.history().index(), 0);
    assert!(matches!(
        state.export(&ExportOptions::default()),
        Err(StampError::NoDocument)
    ));

    state
        .load_document("next.pdf", create_test_pdf(3), &ScaledPageRasterizer::new(2.0))
        .unwrap();
    assert_eq!(state.page_images().len(), 3);
    assert_eq!(state.page_images()[2].width, 1224);
}
