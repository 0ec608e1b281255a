//! Telegram message rendering (HTML parse mode)

use crate::types::{Event, Market};
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};

/// Telegram rejects longer message texts
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Context longer than this is split into parts
pub const MAX_CONTEXT_MESSAGE_CHARS: usize = 4000;

/// Escaped size of each context part
pub const CONTEXT_CHUNK_CHARS: usize = 3900;

/// Appended when an event body is cut at `MAX_MESSAGE_CHARS`
pub const TRUNCATED_SUFFIX: &str = "\n…";

/// Outcomes listed per market in multi-market events
const MAX_OUTCOMES_PER_MARKET: usize = 5;

/// Escape text for Telegram's HTML parse mode
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        push_escaped(&mut out, c);
    }
    out
}

fn push_escaped(out: &mut String, c: char) {
    match c {
        '&' => out.push_str("&amp;"),
        '<' => out.push_str("&lt;"),
        '>' => out.push_str("&gt;"),
        _ => out.push(c),
    }
}

fn escaped_width(c: char) -> usize {
    match c {
        '&' => 5,
        '<' | '>' => 4,
        _ => 1,
    }
}

/// Cut `text` to `MAX_MESSAGE_CHARS` at a line boundary so no tag or
/// entity is split
pub fn fit_message(text: &str) -> String {
    if text.chars().count() <= MAX_MESSAGE_CHARS {
        return text.to_string();
    }

    let budget = MAX_MESSAGE_CHARS - TRUNCATED_SUFFIX.chars().count();
    let mut out = String::new();
    let mut used = 0;
    for line in text.split('\n') {
        let width = line.chars().count() + usize::from(!out.is_empty());
        if used + width > budget {
            break;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(line);
        used += width;
    }
    if out.is_empty() {
        out.push('…');
    } else {
        out.push_str(TRUNCATED_SUFFIX);
    }
    out
}

/// `$1,234,568`, rounded to whole dollars
pub fn format_money(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven);
    let digits = rounded.abs().trunc().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    if rounded.is_sign_negative() && !rounded.is_zero() {
        format!("-${}", grouped)
    } else {
        format!("${}", grouped)
    }
}

/// `March 31, 2025 at 16:00 UTC`
pub fn format_date(date: Option<DateTime<Utc>>) -> String {
    match date {
        Some(d) => d.format("%B %d, %Y at %H:%M UTC").to_string(),
        None => "N/A".to_string(),
    }
}

/// Prices are probabilities in [0, 1]; anything larger is already a percentage
pub fn format_percentage(price: Decimal) -> String {
    let pct = if price <= Decimal::ONE {
        price * Decimal::ONE_HUNDRED
    } else {
        price
    };
    let mut rounded = pct.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(1);
    format!("{}%", rounded)
}

/// Full event summary used by notifications and `/deal`
pub fn format_event(event: &Event) -> String {
    fit_message(&render_event(event))
}

fn render_event(event: &Event) -> String {
    if event.markets.is_empty() {
        return "No market data available".to_string();
    }

    let (liquidity, volume) = event.totals();

    let mut lines = vec![
        format!("🔶 <b>{}</b>\n", escape_html(&event.title)),
        format!("🔗 <b>Link:</b> {}\n", event.link()),
        "🧡 <b>Market stats:</b>".to_string(),
        format!("<b>Closes:</b> {}", format_date(event.closes_at())),
        format!("<b>Total Liquidity:</b> {}", format_money(liquidity)),
        format!("<b>Total Volume:</b> {}\n", format_money(volume)),
    ];

    if let [market] = event.markets.as_slice() {
        push_single_market(&mut lines, market);
    } else {
        push_multi_market(&mut lines, &event.markets);
    }

    lines.join("\n")
}

fn push_single_market(lines: &mut Vec<String>, market: &Market) {
    if market.outcomes.len() == 2 {
        lines.push("📙 <b>Current Odds:</b>".to_string());
        for outcome in &market.outcomes {
            if let Some(price) = outcome.price {
                lines.push(format!(
                    "  • {}: {}",
                    escape_html(&outcome.name),
                    format_percentage(price)
                ));
            }
        }
    } else {
        lines.push("📙 <b>Options:</b>".to_string());
        for (idx, outcome) in market.outcomes.iter().enumerate() {
            if let Some(price) = outcome.price {
                lines.push(format!(
                    "  {}. {}: {}",
                    idx + 1,
                    escape_html(&outcome.name),
                    format_percentage(price)
                ));
            }
        }
    }
}

fn push_multi_market(lines: &mut Vec<String>, markets: &[Market]) {
    let valid: Vec<&Market> = markets.iter().filter(|m| m.has_prices()).collect();

    lines.push(format!("📙 <b>Markets ({}):</b>", valid.len()));
    for (idx, market) in valid.iter().enumerate() {
        let question = if market.question.is_empty() {
            format!("Market {}", idx + 1)
        } else {
            escape_html(&market.question)
        };
        lines.push(format!("  {}. {}", idx + 1, question));

        for outcome in market.outcomes.iter().take(MAX_OUTCOMES_PER_MARKET) {
            if let Some(price) = outcome.price {
                lines.push(format!(
                    "     • {}: {}",
                    escape_html(&outcome.name),
                    format_percentage(price)
                ));
            }
        }
    }
}

/// Automatic announcement of a new event
pub fn format_notification(event: &Event) -> String {
    fit_message(&format!("<b>New Polymarket Event</b>\n\n{}", render_event(event)))
}

/// Market context as one or more messages
pub fn format_context_messages(context: &str) -> Vec<String> {
    let single = format!("🧠 <b>Market Context:</b>\n\n{}", escape_html(context));
    if single.chars().count() <= MAX_CONTEXT_MESSAGE_CHARS {
        return vec![single];
    }

    split_escaped(context, CONTEXT_CHUNK_CHARS)
        .into_iter()
        .enumerate()
        .map(|(idx, chunk)| format!("🧠 <b>Market Context (Part {}):</b>\n\n{}", idx + 1, chunk))
        .collect()
}

/// Escape `text` into chunks of at most `max` chars; entities stay whole
fn split_escaped(text: &str, max: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut width = 0;

    for c in text.chars() {
        let w = escaped_width(c);
        if width + w > max && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            width = 0;
        }
        push_escaped(&mut current, c);
        width += w;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
