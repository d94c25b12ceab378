//! Markdown heading splitter
//!
//! Splits a document into sections at heading boundaries. Section text is
//! the verbatim lines between the section's heading and the next heading at
//! or above the split level, which keeps the parent/child substring
//! invariant: a child section's text always appears verbatim inside the
//! parent section that encloses it.

/// Deepest heading level used for child chunks
pub const CHILD_SPLIT_DEPTH: usize = 5;

/// Heading level used for parent chunks
pub const PARENT_SPLIT_DEPTH: usize = 1;

/// One split section of a document
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    /// Heading hierarchy down to this section, outermost first
    pub header_path: Vec<String>,

    /// Section body, heading lines at or above the split depth excluded
    pub text: String,
}

/// Split markdown into sections at headings of level 1..=`max_level`.
/// Deeper headings are treated as body text. Text before the first heading
/// becomes a section with an empty header path. Empty sections are dropped.
pub fn split_by_headings(markdown: &str, max_level: usize) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut header_stack: Vec<String> = Vec::new();
    let mut body: Vec<&str> = Vec::new();

    for line in markdown.lines() {
        match heading_of(line, max_level) {
            Some((level, title)) => {
                flush(&mut sections, &header_stack, &mut body);
                header_stack.truncate(level - 1);
                header_stack.push(title.to_string());
            }
            None => body.push(line),
        }
    }
    flush(&mut sections, &header_stack, &mut body);

    sections
}

fn flush(sections: &mut Vec<Section>, header_stack: &[String], body: &mut Vec<&str>) {
    let text = body.join("\n").trim().to_string();
    body.clear();

    if !text.is_empty() {
        sections.push(Section {
            header_path: header_stack.to_vec(),
            text,
        });
    }
}

/// Parse a markdown heading line of level 1..=`max_level`
fn heading_of(line: &str, max_level: usize) -> Option<(usize, &str)> {
    let trimmed = line.trim_start();
    let hashes = trimmed.bytes().take_while(|&b| b == b'#').count();

    if hashes == 0 || hashes > max_level {
        return None;
    }

    let rest = &trimmed[hashes..];
    if !rest.starts_with(' ') && !rest.is_empty() {
        // Not a heading (e.g. "#anchor")
        return None;
    }

    Some((hashes, rest.trim()))
}
