// src/generate/prompt.rs
use crate::ingest::types::CandidateItem;

/// Coarse story angle from keywords; also the fallback `type_tag`.
pub fn content_angle(item: &CandidateItem) -> &'static str {
    let text = item.topic_text();
    let has = |words: &[&str]| words.iter().any(|w| text.contains(w));
    if has(&["transfer", "signing", "signs", "deal", "loan"]) {
        "transfer"
    } else if has(&["injury", "injured", "ruled out", "fitness"]) {
        "injury"
    } else if has(&["manager", "sacked", "appointed", "tactics", "head coach"]) {
        "management"
    } else if has(&["win", "defeat", "draw", "goal", "victory", "beat"]) {
        "match-report"
    } else {
        "analysis"
    }
}

pub fn build_prompt(item: &CandidateItem) -> String {
    let angle = content_angle(item);
    format!(
        r#"You are an experienced football journalist writing for an independent Premier League blog.

Write an original article based on this news item. Do not copy sentences from the source.

SOURCE: {source}
HEADLINE: {title}
SUMMARY: {summary}
LINK: {link}
ANGLE: {angle}

Requirements:
- 400 to 700 words, HTML paragraphs and at most two <h2> subheadings
- a fresh headline of your own
- a one or two sentence teaser for a chat channel

Respond with JSON only:
{{
  "title": "headline",
  "content": "<p>full article HTML</p>",
  "teaser": "short teaser",
  "type_tag": "{angle}"
}}"#,
        source = item.source_name,
        title = item.title,
        summary = item.summary,
        link = item.canonical_link,
        angle = angle,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn angle_prefers_transfer_over_match_words() {
        let it = CandidateItem::new("Deal agreed after derby win", "", "https://n/3", "BBC");
        assert_eq!(content_angle(&it), "transfer");
        let it = CandidateItem::new("Spurs beat Villa", "", "https://n/4", "BBC");
        assert_eq!(content_angle(&it), "match-report");
    }

    #[test]
    fn prompt_carries_item_fields() {
        let it = CandidateItem::new("Spurs beat Villa", "Late goal", "https://n/4", "BBC");
        let p = build_prompt(&it);
        assert!(p.contains("HEADLINE: Spurs beat Villa"));
        assert!(p.contains("\"type_tag\": \"match-report\""));
    }
}
