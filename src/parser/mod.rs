pub mod normalize;
pub mod points;

use points::PointCandidate;

/// Two-step pipeline: decoded text → normalized text → ordered points.
pub fn parse_points(raw: &str) -> Vec<PointCandidate> {
    points::extract(&normalize::normalize(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_document_keeps_all_points() {
        let raw = "1.(губер-57)   Первый   текст\r\nпункта\r\n2)\u{a0}(админ 49) Второй текст пункта";
        let points = parse_points(raw);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].body, "Первый текст\nпункта");
        assert_eq!(points[1].seconds, 49);
    }
}
