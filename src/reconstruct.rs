use std::borrow::Cow;

use crate::params::BindParameterTracker;

/// Replace each `?` in `template` with the tracked value for its position.
///
/// The Nth `?` (counting from 1) takes the tracker's value N. Placeholders with no tracked
/// value stay as a literal `?`; tracked values beyond the last placeholder are ignored. Every
/// `?` counts, including ones inside quoted text, since the SQL is never parsed.
#[must_use]
pub fn reconstruct<'a>(
    template: &'a str,
    tracker: &BindParameterTracker,
    with_type_hints: bool,
) -> Cow<'a, str> {
    if !template.contains('?') {
        return Cow::Borrowed(template);
    }
    let values = tracker.snapshot(with_type_hints);
    reconstruct_with(template, &values)
}

/// [`reconstruct`] over an already captured list of rendered values (slot 0 = placeholder 1).
///
/// Returns a borrowed `Cow` when the template has no placeholders.
#[must_use]
pub fn reconstruct_with<'a>(template: &'a str, values: &[Option<String>]) -> Cow<'a, str> {
    let mut out: Option<String> = None;
    let mut last = 0;

    for (placeholder, (pos, _)) in template.match_indices('?').enumerate() {
        let buf =
            out.get_or_insert_with(|| String::with_capacity(template.len() + 16 * values.len()));
        buf.push_str(&template[last..pos]);
        match values.get(placeholder) {
            Some(Some(value)) => buf.push_str(value),
            _ => buf.push('?'),
        }
        last = pos + 1;
    }

    match out {
        Some(mut buf) => {
            buf.push_str(&template[last..]);
            Cow::Owned(buf)
        }
        None => Cow::Borrowed(template),
    }
}
