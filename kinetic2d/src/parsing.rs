//! Vector and vertex-list parsing for map object data.

use glam::Vec2;

/// Parse `"x,y"`. Whitespace around either component is ignored.
pub fn try_parse_vec2(text: &str) -> Option<Vec2> {
    let (x, y) = text.split_once(',')?;
    let x = x.trim().parse::<f32>().ok()?;
    let y = y.trim().parse::<f32>().ok()?;
    Some(Vec2::new(x, y))
}

/// Parse a space separated list of `"x,y"` points.
///
/// A single malformed point rejects the whole list, as does an empty one.
pub fn try_parse_vertices(text: &str) -> Option<Vec<Vec2>> {
    let points = text
        .split_whitespace()
        .map(try_parse_vec2)
        .collect::<Option<Vec<_>>>()?;
    (!points.is_empty()).then_some(points)
}
