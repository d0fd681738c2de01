//! End-to-end replay against the in-memory editor

use std::sync::Arc;
use std::time::Duration;

use pretender::codegen;
use pretender::typing::{
    BACKSPACE, CursorMoved, Disposition, Editor, EditorId, EngineEvent, EngineSettings,
    MemoryEditor, Motion, SessionStatus, TypingEngine,
};

const ID: EditorId = EditorId(42);

fn engine_for(editor: &Arc<MemoryEditor>, delay: Duration) -> (TypingEngine<MemoryEditor>, flume::Receiver<EngineEvent>) {
    TypingEngine::new(
        Arc::clone(editor),
        EngineSettings {
            keystroke_delay: delay,
            queue_capacity: 256,
        },
    )
}

async fn mash(engine: &TypingEngine<MemoryEditor>, count: usize) {
    for i in 0..count {
        let key = if i % 2 == 0 { "j" } else { "k" };
        engine.consume_keystroke(key).await;
    }
}

#[tokio::test]
async fn replays_generated_code_verbatim() {
    let completion = "```python\ndef greet(name):\n\tif name:\n\t\tprint('yo', name)\n```";
    let code = codegen::prepare(completion, 4);

    let editor = Arc::new(MemoryEditor::new(ID));
    let (engine, events) = engine_for(&editor, Duration::ZERO);
    assert!(engine.start(&code));

    // Far more keystrokes than needed; the extra ones are ignored once done
    mash(&engine, code.chars().count() + 5).await;

    assert_eq!(editor.text(), code);
    assert_eq!(engine.status(), SessionStatus::Stopped);
    assert_eq!(engine.cursor_index(), code.chars().count());
    assert!(events.try_iter().any(|e| e == EngineEvent::Completed));
}

#[tokio::test]
async fn types_into_the_middle_of_a_document() {
    let editor = Arc::new(MemoryEditor::with_text(ID, "fn main() {\r\n}"));
    // Cursor after the opening brace line
    editor.set_cursor(13);

    let (engine, _events) = engine_for(&editor, Duration::ZERO);
    engine.start("    run();\n");
    mash(&engine, 12).await;

    assert_eq!(editor.text(), "fn main() {\r\n    run();\r\n}");
    assert_eq!(engine.status(), SessionStatus::Stopped);
}

#[tokio::test]
async fn backspace_then_retype() {
    let editor = Arc::new(MemoryEditor::new(ID));
    let (engine, _events) = engine_for(&editor, Duration::ZERO);
    engine.start("let x = 1;");

    mash(&engine, 5).await;
    assert_eq!(editor.text(), "let x");

    for _ in 0..5 {
        engine.consume_keystroke(BACKSPACE).await;
    }
    assert_eq!(editor.text(), "");

    mash(&engine, 10).await;
    assert_eq!(editor.text(), "let x = 1;");
}

#[tokio::test]
async fn pause_lets_the_user_type_then_resumes() {
    let editor = Arc::new(MemoryEditor::new(ID));
    let (engine, _events) = engine_for(&editor, Duration::ZERO);
    engine.start("abcdef");
    mash(&engine, 3).await;

    engine.pause();
    // Host handles keys itself while paused
    assert_eq!(engine.consume_keystroke("Z").await, Disposition::PassThrough);
    assert_eq!(engine.queued(), 0);

    engine.resume().await;
    mash(&engine, 3).await;
    assert_eq!(editor.text(), "abcdef");
}

#[tokio::test]
async fn resumes_at_recorded_index_after_wandering() {
    let editor = Arc::new(MemoryEditor::new(ID));
    let (engine, _events) = engine_for(&editor, Duration::ZERO);
    engine.start("one\ntwo");
    mash(&engine, 6).await;
    assert_eq!(editor.text(), "one\r\ntw");

    let offset = editor.move_cursor(Motion::Up);
    let point = engine.on_cursor_moved(CursorMoved { editor: ID, offset });
    assert_eq!(point.map(|p| p.index), Some(7));

    // Replay continues from the recorded index, whatever the cursor did
    mash(&engine, 1).await;
    assert_eq!(editor.text(), "one\r\ntwo");
    assert_eq!(engine.status(), SessionStatus::Stopped);
}

#[tokio::test]
async fn stop_mid_delay_halts_replay() {
    let editor = Arc::new(MemoryEditor::new(ID));
    let (engine, _events) = engine_for(&editor, Duration::from_millis(5));
    engine.start("abcdef");

    for _ in 0..4 {
        assert_eq!(engine.intercept("x"), Disposition::Suppress);
    }

    // Let the first edit land, then stop while the pass sleeps
    tokio::time::sleep(Duration::from_millis(2)).await;
    engine.stop();
    tokio::time::sleep(Duration::from_millis(30)).await;

    assert_eq!(engine.status(), SessionStatus::Stopped);
    assert_eq!(engine.queued(), 0);
    assert!(editor.text().len() < 4);
}

#[tokio::test(start_paused = true)]
async fn keystrokes_are_paced() {
    let editor = Arc::new(MemoryEditor::new(ID));
    let (engine, _events) = engine_for(&editor, Duration::from_millis(50));
    engine.start("abc");

    let started = tokio::time::Instant::now();
    for _ in 0..3 {
        engine.intercept("x");
    }
    engine.drain().await;
    while engine.status() == SessionStatus::Running {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(editor.text(), "abc");
    assert!(started.elapsed() >= Duration::from_millis(100));
}
