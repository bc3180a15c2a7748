/// Keeps letters, digits and plain spaces, dropping everything else in place.
pub fn sanitize_input(input: &str) -> String {
    input
        .chars()
        .filter(|ch| ch.is_alphabetic() || ch.is_numeric() || *ch == ' ')
        .collect()
}
