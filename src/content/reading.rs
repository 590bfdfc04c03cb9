//! Reading-time estimate

use super::post::ContentSection;
use super::richtext;

pub const WORDS_PER_MINUTE: usize = 200;

/// Number of whitespace-separated words
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Minutes for one section, rounded up. An empty section takes 0.
pub fn section_minutes(section: &ContentSection) -> usize {
    word_count(&richtext::as_text(&section.body)).div_ceil(WORDS_PER_MINUTE)
}

/// Reading time of a post in whole minutes, summed per section
pub fn reading_time(content: &[ContentSection]) -> usize {
    content.iter().map(section_minutes).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::richtext::Block;

    fn section_with_words(n: usize) -> ContentSection {
        let text = vec!["palavra"; n].join(" ");
        ContentSection {
            heading: "Heading words are not counted".to_string(),
            body: vec![Block::paragraph(text, vec![])],
        }
    }

    #[test]
    fn test_reading_time_boundaries() {
        assert_eq!(reading_time(&[section_with_words(200)]), 1);
        assert_eq!(reading_time(&[section_with_words(201)]), 2);
        assert_eq!(reading_time(&[section_with_words(0)]), 0);
        assert_eq!(reading_time(&[]), 0);
    }

    #[test]
    fn test_sections_round_up_independently() {
        let sections = [section_with_words(10), section_with_words(10)];
        assert_eq!(reading_time(&sections), 2);
    }

    #[test]
    fn test_whitespace_runs_count_once() {
        assert_eq!(word_count("  um\n\ndois\t tres  "), 3);
        assert_eq!(word_count(""), 0);
    }

    #[test]
    fn test_words_span_blocks() {
        let section = ContentSection {
            heading: String::new(),
            body: vec![
                Block::paragraph(vec!["a"; 150].join(" "), vec![]),
                Block::paragraph(vec!["b"; 100].join(" "), vec![]),
            ],
        };
        assert_eq!(section_minutes(&section), 2);
    }
}
