//! Generation state machine.
//!
//! The transition function is pure over the item's current fields;
//! stages mutate the item, the table decides where to go next.

use common::types::{Post, WorkItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenState {
    Start,
    ExtractQuery,
    CheckExternalLink,
    NewsSearch,
    TavilySearch,
    SynthesizeIdea,
    GenerateImage,
    PublishMarket,
    Persist,
    End,
}

/// Idempotency checkpoint evaluated before every side-effecting stage:
/// an item that was skipped, or that already carries a ledger
/// identifier, must not run another stage.
pub fn should_continue(item: &WorkItem) -> bool {
    item.should_process && !item.is_published()
}

/// The attached link of a post, or the first link-like token in its text.
pub fn external_link(post: &Post) -> Option<String> {
    if let Some(link) = &post.link {
        if !link.is_empty() {
            return Some(link.clone());
        }
    }
    post.text
        .split_whitespace()
        .find(|token| token.starts_with("http://") || token.starts_with("https://"))
        .map(|token| token.trim_end_matches([')', ',', '.']).to_string())
}

pub fn has_external_link(post: &Post) -> bool {
    external_link(post).is_some()
}

fn gate(item: &WorkItem, next: GenState) -> GenState {
    if should_continue(item) {
        next
    } else {
        GenState::Persist
    }
}

/// `state × item fields → next state`.
pub fn next_state(state: GenState, item: &WorkItem) -> GenState {
    use GenState::*;
    match state {
        Start => {
            if !item.should_process {
                // Filtered before or during intake: the run leaves the
                // item exactly as it found it.
                End
            } else if item.is_published() {
                // Terminal-success from a prior run: straight to persistence.
                Persist
            } else {
                ExtractQuery
            }
        }
        ExtractQuery => {
            if !should_continue(item) {
                Persist
            } else if has_external_link(&item.post) {
                CheckExternalLink
            } else {
                NewsSearch
            }
        }
        CheckExternalLink => gate(item, NewsSearch),
        NewsSearch => gate(item, TavilySearch),
        TavilySearch => gate(item, SynthesizeIdea),
        SynthesizeIdea => gate(item, GenerateImage),
        GenerateImage => gate(item, PublishMarket),
        PublishMarket => Persist,
        Persist => End,
        End => End,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn post(text: &str, link: Option<&str>) -> Post {
        Post {
            id: "1".into(),
            author: "feed".into(),
            text: text.into(),
            created_at: Utc::now(),
            link: link.map(String::from),
        }
    }

    fn fresh(text: &str, link: Option<&str>) -> WorkItem {
        WorkItem::new(post(text, link))
    }

    #[test]
    fn test_happy_path_traversal() {
        let mut item = fresh("plain post", None);
        let mut state = GenState::Start;
        let mut visited = vec![];
        loop {
            state = next_state(state, &item);
            visited.push(state);
            if state == GenState::End {
                break;
            }
            if state == GenState::PublishMarket {
                item.transaction_hash = Some("0xabc".into());
            }
        }
        assert_eq!(
            visited,
            vec![
                GenState::ExtractQuery,
                GenState::NewsSearch,
                GenState::TavilySearch,
                GenState::SynthesizeIdea,
                GenState::GenerateImage,
                GenState::PublishMarket,
                GenState::Persist,
                GenState::End,
            ]
        );
    }

    #[test]
    fn test_external_link_branch_taken() {
        let item = fresh("see https://example.com/story.", None);
        assert_eq!(
            next_state(GenState::ExtractQuery, &item),
            GenState::CheckExternalLink
        );
        assert_eq!(
            external_link(&item.post).as_deref(),
            Some("https://example.com/story")
        );
    }

    #[test]
    fn test_attached_link_wins_over_text() {
        let item = fresh("no links here", Some("https://attached.example"));
        assert!(has_external_link(&item.post));
    }

    #[test]
    fn test_published_item_goes_straight_to_persist() {
        let mut item = fresh("post", None);
        item.market_id = Some("42".into());
        assert_eq!(next_state(GenState::Start, &item), GenState::Persist);
        assert_eq!(next_state(GenState::Persist, &item), GenState::End);
    }

    #[test]
    fn test_filtered_item_short_circuits_to_end() {
        let mut item = fresh("post", None);
        item.skip("filtered");
        assert_eq!(next_state(GenState::Start, &item), GenState::End);
    }

    #[test]
    fn test_mid_run_skip_routes_to_persist() {
        let mut item = fresh("post", None);
        item.skip("no_question");
        assert_eq!(next_state(GenState::SynthesizeIdea, &item), GenState::Persist);
        assert_eq!(next_state(GenState::GenerateImage, &item), GenState::Persist);
    }

    #[test]
    fn test_guard_blocks_every_side_effecting_stage() {
        let mut item = fresh("post", None);
        item.transaction_hash = Some("0xabc".into());
        for state in [
            GenState::ExtractQuery,
            GenState::CheckExternalLink,
            GenState::NewsSearch,
            GenState::TavilySearch,
            GenState::SynthesizeIdea,
            GenState::GenerateImage,
        ] {
            assert_eq!(next_state(state, &item), GenState::Persist);
        }
    }
}
