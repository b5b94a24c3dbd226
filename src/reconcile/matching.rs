use super::{Match, MatchPolicy, MatchTier, Numbered};

/// Strip leading zeros from a card number (`"076"` → `"76"`).
///
/// A number made only of zeros normalizes to `"0"`. Non-numeric prefixes are
/// left alone (`"TG05"` stays `"TG05"`).
pub fn normalize_number(number: &str) -> String {
    let trimmed = number.trim();
    let stripped = trimmed.trim_start_matches('0');
    if stripped.is_empty() && !trimmed.is_empty() {
        "0".to_string()
    } else {
        stripped.to_string()
    }
}

/// Leading run of ASCII digits with zeros stripped, as an integer parse
/// would read it (`"076a"` → `"76"`). `None` when the number doesn't start
/// with a digit.
pub fn leading_digits(number: &str) -> Option<String> {
    let trimmed = number.trim();
    let end = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    if end == 0 {
        return None;
    }
    Some(normalize_number(&trimmed[..end]))
}

/// Find the candidate matching `target`, trying each allowed tier in order
/// and stopping at the first match. Within a tier the first candidate wins.
pub fn find_native_id<C: Numbered>(
    candidates: &[C],
    target: &str,
    policy: MatchPolicy,
) -> Option<Match<C::Id>> {
    let found = find_in_tier(candidates, MatchTier::Exact, |n| n == target)
        .or_else(|| {
            let stripped = normalize_number(target);
            find_in_tier(candidates, MatchTier::ZeroStripped, |n| n == stripped)
        })
        .or_else(|| {
            if !policy.allows(MatchTier::NumericSubstring) {
                return None;
            }
            let run = leading_digits(target)?;
            find_in_tier(candidates, MatchTier::NumericSubstring, |n| {
                n.contains(run.as_str())
            })
        });

    match &found {
        Some(m) if m.tier.is_low_confidence() => {
            log::warn!("Number {} matched only via {} tier", target, m.tier)
        }
        Some(m) => log::debug!("Number {} matched via {} tier", target, m.tier),
        None => log::debug!("No candidate matched number {}", target),
    }
    found
}

fn find_in_tier<C, P>(candidates: &[C], tier: MatchTier, predicate: P) -> Option<Match<C::Id>>
where
    C: Numbered,
    P: Fn(&str) -> bool,
{
    candidates
        .iter()
        .find(|c| predicate(c.number()))
        .map(|c| Match {
            id: c.native_id(),
            tier,
        })
}
