//! Plain-text rendering of a [`RankedResult`].

use std::fmt::Write;

use crate::types::RankedResult;

/// Report returned when fusion produced no candidates.
pub const NO_RESULTS: &str = "No similar tickets found in the database.";

/// Render ranked candidates as the human-readable report.
///
/// One block per candidate, in rank order, each followed by a blank line.
/// Scores are shown as percentages with exactly two decimals.
pub fn format_results(ranked: &RankedResult) -> String {
    if ranked.is_empty() {
        return NO_RESULTS.to_string();
    }

    let mut out = String::new();
    for c in ranked {
        // Writing into a String cannot fail.
        let _ = write!(
            out,
            "Ticket #{}: {}\nSummary: {}\nSemantic: {:.2}% | Keywords: {:.2}% | Combined: {:.2}%\n\n",
            c.ticket_id,
            c.subject,
            c.summary,
            c.semantic_score * 100.0,
            c.keyword_score * 100.0,
            c.combined_score * 100.0,
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::fusion::{fuse, FusionParams};
    use crate::types::IndexHit;
    use pretty_assertions::assert_eq;

    fn hit(id: i64, subject: &str, summary: &str, score: f64) -> IndexHit {
        IndexHit {
            ticket_id: id,
            subject: subject.into(),
            summary: summary.into(),
            score,
        }
    }

    #[test]
    fn empty_result_renders_sentinel() {
        assert_eq!(format_results(&RankedResult::default()), NO_RESULTS);
    }

    #[test]
    fn renders_blocks_in_rank_order() {
        let ranked = fuse(
            &[hit(101, "Card declined", "Payment failed at checkout", 0.95)],
            &[hit(202, "Refund delay", "Refund pending for a week", 0.02)],
            &FusionParams::default(),
        );
        let expected = "\
Ticket #101: Card declined
Summary: Payment failed at checkout
Semantic: 95.00% | Keywords: 0.00% | Combined: 66.50%

Ticket #202: Refund delay
Summary: Refund pending for a week
Semantic: 0.00% | Keywords: 2.00% | Combined: 60.00%

";
        assert_eq!(format_results(&ranked), expected);
    }

    #[test]
    fn combined_can_exceed_one_hundred_percent() {
        let ranked = fuse(
            &[hit(1, "s", "m", 0.9)],
            &[hit(1, "s", "m", 0.05)],
            &FusionParams::default(),
        );
        let report = format_results(&ranked);
        assert!(report.contains("Combined: 213.00%"), "{report}");
    }

    #[test]
    fn empty_summary_still_prints_label() {
        let ranked = fuse(&[hit(5, "VPN", "", 0.5)], &[], &FusionParams::default());
        assert!(format_results(&ranked).starts_with("Ticket #5: VPN\nSummary: \n"));
    }
}
