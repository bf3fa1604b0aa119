/// A piece of a text template: literal text or a `{{name}}` slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Segment {
    Literal(String),
    Slot(String),
}

/// Splits `input` into literal and slot segments. An unterminated `{{` is kept
/// as literal text.
pub(super) fn parse_segments(input: &str) -> Vec<Segment> {
    let mut rest = input;
    let mut segments = Vec::new();
    let mut literal = String::new();

    loop {
        let Some(start) = rest.find("{{") else {
            literal.push_str(rest);
            break;
        };
        let (before, after_start) = rest.split_at(start);
        literal.push_str(before);
        let Some(after) = after_start.strip_prefix("{{") else {
            literal.push_str(after_start);
            break;
        };
        let Some(end) = after.find("}}") else {
            literal.push_str("{{");
            literal.push_str(after);
            break;
        };
        let (key_part, after_end) = after.split_at(end);
        let key = key_part.trim();
        if key.is_empty() {
            literal.push_str("{{}}");
        } else {
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Slot(key.to_owned()));
        }
        rest = match after_end.strip_prefix("}}") {
            Some(remaining) => remaining,
            None => {
                literal.push_str(after_end);
                break;
            }
        };
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    segments
}

/// Returns the slot name when `input` is exactly one slot, e.g. `"{{qty}}"`.
pub(super) fn whole_slot(input: &str) -> Option<String> {
    match parse_segments(input).as_slice() {
        [Segment::Slot(name)] if input.trim() == input => Some(name.clone()),
        _ => None,
    }
}
