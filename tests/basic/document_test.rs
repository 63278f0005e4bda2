use chronicle::story::document::StoryDocument;
use chronicle::story::StoryRecord;

use crate::story_testtools::DEFAULT_HEADER;

fn story_doc(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let td = tempfile::tempdir().unwrap();
    let path = td.path().join("README.md");
    std::fs::write(&path, content).unwrap();
    (td, path)
}

#[test]
fn test_insert_entry_when_valid_record_expect_entry_at_line_three() {
    let (_td, path) = story_doc(DEFAULT_HEADER);
    let mut document = StoryDocument::open(&path, 2).unwrap();
    let record =
        StoryRecord::new(42, "https://x/issues/42", "Done", "As a user, I want X").unwrap();

    document.insert_entry(&record);
    document.write().unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = raw.lines().collect();
    assert_eq!(lines[0], "# User Stories");
    assert_eq!(lines[1], "");
    assert!(
        lines[2].starts_with("### [#42](https://x/issues/42) - Done ("),
        "unexpected entry heading: {}",
        lines[2]
    );
    assert_eq!(lines[3], "");
    assert_eq!(lines[4], "As a user, I want X");
}

#[test]
fn test_insert_entry_when_inserted_twice_expect_two_entries_newest_first() {
    let (_td, path) = story_doc(DEFAULT_HEADER);

    for issue_number in [1_u64, 2] {
        let mut document = StoryDocument::open(&path, 2).unwrap();
        let record = StoryRecord::new(
            issue_number,
            &format!("https://x/issues/{issue_number}"),
            "In-Progress",
            "As a user, I want X",
        )
        .unwrap();
        document.insert_entry(&record);
        document.write().unwrap();
    }

    let document = StoryDocument::open(&path, 2).unwrap();
    let actual = document.entry_numbers();
    let expected = vec![2, 1];
    assert_eq!(actual, expected);
}

#[test]
fn test_insert_entry_when_identical_input_expect_duplicate_entries() {
    let (_td, path) = story_doc(DEFAULT_HEADER);

    for _ in 0..2 {
        let mut document = StoryDocument::open(&path, 2).unwrap();
        let record =
            StoryRecord::new(7, "https://x/issues/7", "Done", "As a user, I want X").unwrap();
        document.insert_entry(&record);
        document.write().unwrap();
    }

    let document = StoryDocument::open(&path, 2).unwrap();
    let actual = document.entry_numbers();
    let expected = vec![7, 7];
    assert_eq!(actual, expected);
}

#[test]
fn test_open_when_skip_exceeds_file_length_expect_error() {
    let (_td, path) = story_doc("# Only one line\n");
    let actual = StoryDocument::open(&path, 2).unwrap_err();
    let expected = "fewer than the 2 header lines";
    assert!(
        actual.to_string().contains(expected),
        "\"{actual}\" doesn't contain {expected}"
    );
}

#[test]
fn test_open_when_file_missing_expect_error() {
    let td = tempfile::tempdir().unwrap();
    let path = td.path().join("does_not_exist.md");
    let actual = StoryDocument::open(&path, 2).unwrap_err();
    let expected = "could not read story document";
    assert!(
        actual.to_string().contains(expected),
        "\"{actual}\" doesn't contain {expected}"
    );
}

#[test]
fn test_entry_numbers_when_fresh_document_expect_empty() {
    let (_td, path) = story_doc(DEFAULT_HEADER);
    let document = StoryDocument::open(&path, 2).unwrap();
    assert!(document.entry_numbers().is_empty());
}

#[test]
fn test_insert_entry_when_larger_header_expect_header_untouched() {
    let header = "# User Stories\n\nEverything below is generated.\n";
    let (_td, path) = story_doc(header);
    let mut document = StoryDocument::open(&path, 3).unwrap();
    let record =
        StoryRecord::new(9, "https://x/issues/9", "Done", "As a user, I want X").unwrap();

    document.insert_entry(&record);
    document.write().unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(raw.starts_with(header));
    let lines: Vec<&str> = raw.lines().collect();
    assert!(lines[3].starts_with("### [#9]"));
}
