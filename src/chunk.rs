//! Markdown heading splitter.
//!
//! Splits a document into [`Chunk`]s at heading lines of the configured
//! levels (`#`, `##`, `###` by default). Each chunk records the heading
//! hierarchy above it, so a section under `## Refunds` inside `# Billing`
//! carries both titles.
//!
//! # Rules
//!
//! - A heading is a line whose first non-blank characters are 1–6 `#`
//!   followed by a space or the end of the line. Only levels listed in
//!   `levels` split; other headings stay in the chunk text.
//! - Lines inside fenced code blocks (```` ``` ```` or `~~~`) never split.
//! - Heading lines are not repeated in chunk text. A heading with no body
//!   before the next heading yields no chunk of its own.
//! - Text before the first heading is a chunk with an empty header path.
//! - A document with no splitting heading yields exactly one chunk holding
//!   the full, unmodified text. Whitespace-only documents yield none.
//! - `total_chunks` is filled in after the whole document is split, so it is
//!   identical on every chunk of the document.

use crate::models::{Chunk, ChunkMetadata, Heading, MARKDOWN_SECTION};

pub fn split_markdown(source_file: &str, text: &str, levels: &[usize]) -> Vec<Chunk> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let mut sections: Vec<(Vec<Heading>, String)> = Vec::new();
    let mut stack: Vec<Heading> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut fence: Option<&'static str> = None;
    let mut saw_heading = false;

    for line in text.lines() {
        let trimmed = line.trim_start();

        if let Some(open) = fence {
            if trimmed.starts_with(open) {
                fence = None;
            }
            current.push(line);
            continue;
        }
        if let Some(open) = fence_marker(trimmed) {
            fence = Some(open);
            current.push(line);
            continue;
        }

        match parse_heading(trimmed) {
            Some(heading) if levels.contains(&heading.level) => {
                saw_heading = true;
                flush(&mut sections, &stack, &mut current);
                while stack.last().is_some_and(|h| h.level >= heading.level) {
                    stack.pop();
                }
                stack.push(heading);
            }
            _ => current.push(line),
        }
    }
    flush(&mut sections, &stack, &mut current);

    if !saw_heading {
        sections = vec![(Vec::new(), text.to_string())];
    }

    let total = sections.len();
    sections
        .into_iter()
        .enumerate()
        .map(|(position, (header_path, text))| Chunk {
            text,
            metadata: ChunkMetadata {
                source_file: source_file.to_string(),
                header_path,
                chunk_type: MARKDOWN_SECTION.to_string(),
                total_chunks: total,
                position,
            },
        })
        .collect()
}

/// Close the open section if it holds any non-blank line.
fn flush(sections: &mut Vec<(Vec<Heading>, String)>, stack: &[Heading], current: &mut Vec<&str>) {
    let first = current.iter().position(|l| !l.trim().is_empty());
    let last = current.iter().rposition(|l| !l.trim().is_empty());
    if let (Some(first), Some(last)) = (first, last) {
        sections.push((stack.to_vec(), current[first..=last].join("\n")));
    }
    current.clear();
}

fn fence_marker(trimmed: &str) -> Option<&'static str> {
    if trimmed.starts_with("```") {
        Some("```")
    } else if trimmed.starts_with("~~~") {
        Some("~~~")
    } else {
        None
    }
}

fn parse_heading(trimmed: &str) -> Option<Heading> {
    let level = trimmed.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = &trimmed[level..];
    if !rest.is_empty() && !rest.starts_with([' ', '\t']) {
        return None;
    }
    Some(Heading {
        level,
        title: rest.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEVELS: &[usize] = &[1, 2, 3];

    fn titles(chunk: &Chunk) -> Vec<&str> {
        chunk
            .metadata
            .header_path
            .iter()
            .map(|h| h.title.as_str())
            .collect()
    }

    #[test]
    fn test_no_headings_single_chunk_full_text() {
        let text = "Plain notes.\n\nSecond paragraph with trailing newline.\n";
        let chunks = split_markdown("notes.md", text, LEVELS);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, text);
        assert!(chunks[0].metadata.header_path.is_empty());
        assert_eq!(chunks[0].metadata.total_chunks, 1);
    }

    #[test]
    fn test_whitespace_only_yields_nothing() {
        assert!(split_markdown("empty.md", " \n\n\t\n", LEVELS).is_empty());
    }

    #[test]
    fn test_preamble_and_hierarchy() {
        let text = "\
Intro text.

# Billing
Billing overview.

## Refunds
Refunds within 30 days.

### Exceptions
Gift cards are final.

## Invoices
Invoices are monthly.

# Support
Email us.";
        let chunks = split_markdown("kb/policies.md", text, LEVELS);
        assert_eq!(chunks.len(), 6);

        assert_eq!(chunks[0].text, "Intro text.");
        assert!(titles(&chunks[0]).is_empty());

        assert_eq!(chunks[1].text, "Billing overview.");
        assert_eq!(titles(&chunks[1]), vec!["Billing"]);

        assert_eq!(titles(&chunks[2]), vec!["Billing", "Refunds"]);
        assert_eq!(titles(&chunks[3]), vec!["Billing", "Refunds", "Exceptions"]);
        assert_eq!(chunks[3].text, "Gift cards are final.");

        // Sibling H2 pops the H3 and the previous H2
        assert_eq!(titles(&chunks[4]), vec!["Billing", "Invoices"]);
        // New H1 resets everything below it
        assert_eq!(titles(&chunks[5]), vec!["Support"]);
    }

    #[test]
    fn test_total_chunks_and_positions() {
        let text = "# A\none\n## B\ntwo\n## C\nthree";
        let chunks = split_markdown("doc.md", text, LEVELS);
        assert_eq!(chunks.len(), 3);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.metadata.total_chunks, 3);
            assert_eq!(c.metadata.position, i);
            assert_eq!(c.metadata.source_file, "doc.md");
            assert_eq!(c.metadata.chunk_type, "markdown_section");
        }
    }

    #[test]
    fn test_empty_heading_yields_no_chunk() {
        let chunks = split_markdown("doc.md", "# Title\n## Sub\nBody", LEVELS);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Body");
        assert_eq!(titles(&chunks[0]), vec!["Title", "Sub"]);
    }

    #[test]
    fn test_code_fence_is_not_split() {
        let text = "# Setup\n```bash\n# install deps\nmake\n```\nDone.";
        let chunks = split_markdown("doc.md", text, LEVELS);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.contains("# install deps"));
        assert!(chunks[0].text.ends_with("Done."));
    }

    #[test]
    fn test_unlisted_level_stays_in_text() {
        let text = "# Top\nintro\n#### Deep\ndetail";
        let chunks = split_markdown("doc.md", text, LEVELS);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "intro\n#### Deep\ndetail");
    }

    #[test]
    fn test_hashtag_is_not_heading() {
        let text = "#hashtag at start\nmore";
        let chunks = split_markdown("doc.md", text, LEVELS);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, text);
    }

    #[test]
    fn test_custom_levels() {
        let text = "# A\none\n## B\ntwo";
        let chunks = split_markdown("doc.md", text, &[1]);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "one\n## B\ntwo");
    }
}
