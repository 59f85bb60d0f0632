//! Bounded summary of earlier sections handed to the writer and the checker.
//!
//! The full document is never sent. The digest holds the ordered outline headings
//! plus excerpts of reviewed sections before the current one, newest first, until
//! the character budget runs out.

use crate::config::DigestConfig;
use crate::model::Section;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestEntry {
    pub index: u32,
    pub heading: String,
    pub excerpt: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Digest {
    /// Every heading of the outline, in index order.
    pub headings: Vec<String>,
    /// Newest first.
    pub entries: Vec<DigestEntry>,
}

impl Digest {
    pub fn is_empty(&self) -> bool {
        self.headings.is_empty() && self.entries.is_empty()
    }

    /// Characters spent on excerpts and their headings.
    pub fn excerpt_chars(&self) -> usize {
        self.entries
            .iter()
            .map(|e| e.heading.chars().count() + e.excerpt.chars().count())
            .sum()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        if !self.headings.is_empty() {
            out.push_str("Outline:\n");
            for (i, heading) in self.headings.iter().enumerate() {
                out.push_str(&format!("{}. {}\n", i + 1, heading));
            }
        }
        if !self.entries.is_empty() {
            out.push_str("\nEarlier sections (most recent first):\n");
            for entry in &self.entries {
                out.push_str(&format!("## {}\n{}\n\n", entry.heading, entry.excerpt));
            }
        }
        out.trim_end().to_string()
    }
}

/// Builds the digest for the section at `before_index`.
///
/// `config.max_chars` bounds the excerpt entries only. The heading list is always
/// complete and is bounded by the outline's `max_sections` instead.
pub fn build_digest(sections: &[Section], before_index: u32, config: &DigestConfig) -> Digest {
    let mut ordered: Vec<&Section> = sections.iter().collect();
    ordered.sort_by_key(|s| s.index);

    let headings = ordered.iter().map(|s| s.heading()).collect();

    let mut entries = Vec::new();
    let mut used = 0usize;
    for section in ordered.iter().rev() {
        if section.index >= before_index || !section.is_reviewed() {
            continue;
        }
        let Some(content) = section.content.as_deref() else {
            continue;
        };
        let heading = section.heading();
        let excerpt = excerpt(content, config.per_section_chars);
        let cost = heading.chars().count() + excerpt.chars().count();
        if used + cost > config.max_chars {
            break;
        }
        used += cost;
        entries.push(DigestEntry {
            index: section.index,
            heading,
            excerpt,
        });
    }

    Digest { headings, entries }
}

/// The first `limit` characters of `content`, cut at a char boundary, with an
/// ellipsis when shortened.
fn excerpt(content: &str, limit: usize) -> String {
    let content = content.trim();
    if content.chars().count() <= limit {
        return content.to_string();
    }
    let mut out: String = content.chars().take(limit.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SectionStatus;

    fn section(index: u32, heading: &str, content: &str, status: SectionStatus) -> Section {
        let mut s = Section::planned("doc", "job", index, heading, 500);
        s.content = Some(content.to_string());
        s.status = status;
        s
    }

    fn config(max_chars: usize, per_section_chars: usize) -> DigestConfig {
        DigestConfig {
            max_chars,
            per_section_chars,
        }
    }

    #[test]
    fn test_only_reviewed_sections_before_index() {
        let sections = vec![
            section(0, "Intro", "alpha", SectionStatus::Reviewed),
            section(1, "Middle", "beta", SectionStatus::Failed),
            section(2, "Late", "gamma", SectionStatus::Reviewed),
            section(3, "End", "delta", SectionStatus::Reviewed),
        ];
        let digest = build_digest(&sections, 3, &config(1000, 100));

        assert_eq!(digest.headings, vec!["Intro", "Middle", "Late", "End"]);
        let indexes: Vec<u32> = digest.entries.iter().map(|e| e.index).collect();
        assert_eq!(indexes, vec![2, 0]);
    }

    #[test]
    fn test_budget_keeps_newest() {
        let long = "x".repeat(100);
        let sections: Vec<Section> = (0..5)
            .map(|i| section(i, &format!("H{}", i), &long, SectionStatus::Reviewed))
            .collect();
        // each entry costs 2 (heading) + 50 (excerpt)
        let digest = build_digest(&sections, 5, &config(110, 50));

        let indexes: Vec<u32> = digest.entries.iter().map(|e| e.index).collect();
        assert_eq!(indexes, vec![4, 3]);
        assert!(digest.excerpt_chars() <= 110);
        assert!(digest.entries[0].excerpt.ends_with('…'));
        assert_eq!(digest.entries[0].excerpt.chars().count(), 50);
    }

    #[test]
    fn test_headings_are_outside_the_budget() {
        let sections: Vec<Section> = (0..6)
            .map(|i| {
                section(
                    i,
                    &format!("A rather long heading number {}", i),
                    "body",
                    SectionStatus::Reviewed,
                )
            })
            .collect();
        let digest = build_digest(&sections, 6, &config(10, 50));

        assert_eq!(digest.headings.len(), 6);
        assert!(digest.entries.is_empty());
        assert_eq!(digest.excerpt_chars(), 0);
    }

    #[test]
    fn test_excerpt_respects_char_boundaries() {
        assert_eq!(excerpt("héllo wörld", 5), "héll…");
        assert_eq!(excerpt("  short  ", 10), "short");
    }

    #[test]
    fn test_render() {
        let sections = vec![section(0, "Intro", "alpha", SectionStatus::Reviewed)];
        let digest = build_digest(&sections, 1, &config(1000, 100));
        let text = digest.render();
        assert!(text.starts_with("Outline:\n1. Intro"));
        assert!(text.contains("## Intro\nalpha"));
        assert!(Digest::default().render().is_empty());
    }
}
