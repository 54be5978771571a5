use std::collections::HashSet;

use hyperblocks_engine::editing::{get_node_by_id, invariants};
use hyperblocks_engine::exchange::{blocks_to_markdown, markdown_to_blocks};
use hyperblocks_engine::model::InlineContent;
use hyperblocks_engine::{
    Block, BlockEditor, BlockType, EditorOptions, EngineError, IdStrategy, PartialBlock, Placement,
};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn editor(blocks: Vec<PartialBlock>) -> BlockEditor {
    BlockEditor::new(EditorOptions {
        id_strategy: IdStrategy::Monotonic {
            prefix: "new".to_string(),
        },
        initial_content: blocks,
        ..Default::default()
    })
    .expect("Should build editor")
}

fn top_ids(editor: &BlockEditor) -> Vec<String> {
    editor
        .top_level_blocks()
        .expect("Should read blocks")
        .into_iter()
        .map(|block| block.id)
        .collect()
}

fn all_ids(editor: &BlockEditor) -> Vec<String> {
    let mut ids = Vec::new();
    editor
        .for_each_block(false, |block| {
            ids.push(block.id.clone());
            true
        })
        .expect("Should walk blocks");
    ids
}

fn assert_valid(editor: &BlockEditor) {
    invariants::check(editor.document(), editor.schema()).expect("Document should satisfy invariants");
}

fn strings(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

// ============ Scenarios ============

#[test]
fn test_insert_after_reference_block() {
    let mut editor = editor(vec![PartialBlock::paragraph("first").with_id("p1")]);

    let inserted = editor
        .insert_blocks(vec![PartialBlock::paragraph("hello")], "p1", Placement::After)
        .expect("Should insert");

    let top = editor.top_level_blocks().unwrap();
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].id, "p1");
    assert_eq!(top[1], inserted[0]);
    assert_eq!(top[1].content[0], InlineContent::text("hello"));
    assert_valid(&editor);
}

#[test]
fn test_update_paragraph_to_heading_keeps_content() {
    let mut editor = editor(vec![PartialBlock::paragraph("Title").with_id("p1")]);

    let updated = editor
        .update_block(
            "p1",
            PartialBlock::new(BlockType::Heading).with_prop("level", "2"),
            false,
        )
        .expect("Should update");

    assert_eq!(updated.block_type, BlockType::Heading);
    assert_eq!(updated.prop("level"), Some("2"));
    assert_eq!(updated.content, vec![InlineContent::text("Title")]);
    assert_valid(&editor);
}

#[test]
fn test_removing_only_child_drops_group() {
    let mut editor = editor(vec![
        PartialBlock::paragraph("parent")
            .with_id("parent1")
            .with_children(vec![PartialBlock::paragraph("child").with_id("child1")]),
    ]);

    editor.remove_blocks(&strings(&["child1"])).expect("Should remove");

    let parent = editor.get_block("parent1").unwrap().expect("Parent should remain");
    assert_eq!(parent.children, vec![]);
    let container = get_node_by_id("parent1", editor.document()).unwrap().node;
    assert!(container.group_node().is_none());
    assert_valid(&editor);
}

#[test]
fn test_replace_adjacent_blocks() {
    let mut editor = editor(vec![
        PartialBlock::paragraph("before").with_id("z"),
        PartialBlock::paragraph("a").with_id("a"),
        PartialBlock::paragraph("b").with_id("b"),
        PartialBlock::paragraph("after").with_id("c"),
    ]);

    let (inserted, removed) = editor
        .replace_blocks(&strings(&["a", "b"]), vec![PartialBlock::paragraph("x")])
        .expect("Should replace");

    let new_id = inserted[0].id.clone();
    assert_eq!(top_ids(&editor), vec!["z".to_string(), new_id, "c".to_string()]);
    assert_eq!(removed.iter().map(|b| b.id.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);
    assert!(get_node_by_id("a", editor.document()).is_err());
    assert!(get_node_by_id("b", editor.document()).is_err());
    assert_valid(&editor);
}

// ============ Properties ============

#[test]
fn test_generated_ids_are_distinct() {
    let mut editor = editor(vec![
        PartialBlock::paragraph("x").with_id("new1"),
        PartialBlock::paragraph("y").with_id("new3"),
    ]);
    let before: HashSet<String> = all_ids(&editor).into_iter().collect();

    let mut generated = Vec::new();
    for i in 0..10 {
        let reference = top_ids(&editor).last().cloned().unwrap();
        let inserted = editor
            .insert_blocks(vec![PartialBlock::paragraph(format!("n{i}"))], &reference, Placement::After)
            .unwrap();
        generated.push(inserted[0].id.clone());
    }

    let unique: HashSet<&String> = generated.iter().collect();
    assert_eq!(unique.len(), generated.len());
    assert!(generated.iter().all(|id| !before.contains(id)));
    assert_valid(&editor);
}

fn numbered(count: usize) -> Vec<PartialBlock> {
    (1..=count)
        .map(|n| PartialBlock::paragraph(format!("p{n}")).with_id(format!("new{n}")))
        .collect()
}

#[test]
fn test_fresh_id_after_long_run_of_explicit_ids() {
    let mut editor = editor(numbered(40));

    let inserted = editor
        .insert_blocks(vec![PartialBlock::paragraph("x")], "new1", Placement::After)
        .expect("Should insert after explicit ids");
    assert_eq!(inserted[0].id, "new41");

    editor.replace_all(numbered(60)).expect("Should replace document");
    let inserted = editor
        .insert_blocks(vec![PartialBlock::paragraph("y")], "new1", Placement::After)
        .expect("Should insert after replace_all");
    assert_eq!(inserted[0].id, "new61");
    assert_valid(&editor);
}

#[test]
fn test_fresh_id_after_inserting_explicit_ids() {
    let mut editor = editor(vec![PartialBlock::paragraph("a").with_id("a")]);
    editor
        .insert_blocks(numbered(40), "a", Placement::After)
        .expect("Should insert explicit ids");

    let inserted = editor
        .insert_blocks(vec![PartialBlock::paragraph("x")], "a", Placement::After)
        .expect("Should insert without an id");
    assert_eq!(inserted[0].id, "new41");
}

#[test]
fn test_invariants_hold_across_mixed_edits() {
    let mut editor = editor(vec![
        PartialBlock::paragraph("a").with_id("a").with_children(vec![
            PartialBlock::paragraph("a1").with_id("a1"),
            PartialBlock::paragraph("a2").with_id("a2"),
        ]),
        PartialBlock::paragraph("b").with_id("b"),
    ]);

    editor
        .insert_blocks(vec![PartialBlock::paragraph("a0").with_id("a0")], "a1", Placement::Before)
        .unwrap();
    assert_valid(&editor);
    editor
        .update_block("b", PartialBlock::default().with_children(vec![PartialBlock::paragraph("b1").with_id("b1")]), false)
        .unwrap();
    assert_valid(&editor);
    editor.remove_blocks(&strings(&["a0", "a1", "a2"])).unwrap();
    assert_valid(&editor);
    editor
        .replace_blocks(&strings(&["b1"]), vec![PartialBlock::paragraph("c1").with_id("c1")])
        .unwrap();
    assert_valid(&editor);

    assert_eq!(all_ids(&editor), strings(&["a", "b", "c1"]));
    assert_eq!(editor.get_block("a").unwrap().unwrap().children, vec![]);
}

#[test]
fn test_children_keep_document_order() {
    let mut editor = editor(vec![
        PartialBlock::paragraph("p")
            .with_id("p")
            .with_children(vec![PartialBlock::paragraph("c2").with_id("c2")]),
    ]);

    editor
        .insert_blocks(vec![PartialBlock::paragraph("c1").with_id("c1")], "c2", Placement::Before)
        .unwrap();
    editor
        .insert_blocks(vec![PartialBlock::paragraph("c3").with_id("c3")], "c2", Placement::After)
        .unwrap();

    let parent = editor.get_block("p").unwrap().unwrap();
    let children: Vec<&str> = parent.children.iter().map(|b| b.id.as_str()).collect();
    assert_eq!(children, vec!["c1", "c2", "c3"]);
}

#[test]
fn test_repeated_reads_are_equal() {
    let editor = BlockEditor::new(EditorOptions {
        block_cache: true,
        initial_content: vec![
            PartialBlock::paragraph("p")
                .with_id("p")
                .with_children(vec![PartialBlock::paragraph("c").with_id("c")]),
        ],
        ..Default::default()
    })
    .unwrap();

    let first = editor.get_block("p").unwrap();
    let second = editor.get_block("p").unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_navigation_agrees_with_walk_order() {
    let editor = editor(vec![
        PartialBlock::paragraph("a").with_id("a").with_children(vec![
            PartialBlock::paragraph("a1")
                .with_id("a1")
                .with_children(vec![PartialBlock::paragraph("a1x").with_id("a1x")]),
            PartialBlock::paragraph("a2").with_id("a2"),
        ]),
        PartialBlock::paragraph("b").with_id("b"),
    ]);
    let order = all_ids(&editor);

    for pair in order.windows(2) {
        let next = editor.get_next_block(&pair[0]).unwrap().map(|b| b.id);
        let prev = editor.get_prev_block(&pair[1]).unwrap().map(|b| b.id);
        assert_eq!(next.as_deref(), Some(pair[1].as_str()));
        assert_eq!(prev.as_deref(), Some(pair[0].as_str()));
    }
    assert!(editor.get_next_block("b").unwrap().is_none());
    assert!(editor.get_prev_block("a").unwrap().is_none());

    let mut reversed = Vec::new();
    editor
        .for_each_block(true, |block| {
            reversed.push(block.id.clone());
            true
        })
        .unwrap();
    reversed.reverse();
    assert_eq!(reversed, order);
}

// ============ Errors ============

#[rstest]
#[case(vec!["missing"], vec!["missing"])]
#[case(vec!["a", "ghost", "gone"], vec!["ghost", "gone"])]
fn test_remove_names_every_missing_id(#[case] ids: Vec<&str>, #[case] missing: Vec<&str>) {
    let mut editor = editor(vec![PartialBlock::paragraph("a").with_id("a")]);
    let before = editor.top_level_blocks().unwrap();

    match editor.remove_blocks(&strings(&ids)) {
        Err(EngineError::BlockNotFound(names)) => assert_eq!(names, strings(&missing)),
        other => panic!("Expected BlockNotFound, got {other:?}"),
    }
    assert_eq!(editor.top_level_blocks().unwrap(), before);
    assert_eq!(editor.version(), 0);
}

#[test]
fn test_insert_with_duplicate_id_fails() {
    let mut editor = editor(vec![PartialBlock::paragraph("a").with_id("a")]);
    let result = editor.insert_blocks(vec![PartialBlock::paragraph("dup").with_id("a")], "a", Placement::After);
    assert!(matches!(result, Err(EngineError::DuplicateBlockId(id)) if id == "a"));
}

// ============ Exchange ============

#[test]
fn test_markdown_document_loads_into_editor() {
    let markdown = "# Notes\n\nIntro\n\n- one\n- two\n";
    let mut editor = editor(markdown_to_blocks(markdown));
    assert_valid(&editor);

    let top = editor.top_level_blocks().unwrap();
    assert_eq!(top.len(), 1);
    let heading: &Block = &top[0];
    assert_eq!(heading.block_type, BlockType::Heading);
    assert_eq!(heading.children[0].children.len(), 2);

    editor.replace_all(markdown_to_blocks("plain")).unwrap();
    assert_eq!(blocks_to_markdown(&editor.top_level_blocks().unwrap()), "plain\n");
}
